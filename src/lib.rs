//! SoftSell assistant library exports for the binary and integration tests

pub mod core;
pub mod inference;
pub mod session;
pub mod tui;

#[cfg(test)]
pub mod test_support;
