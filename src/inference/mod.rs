pub mod client;
pub mod provider;
pub mod providers;
pub mod retry;

pub use client::{CompletionClient, ModelParams};
pub use provider::{CompletionError, CompletionProvider, CompletionRequest};
pub use providers::OpenAiProvider;
pub use retry::{PolicyError, RetryPolicy};
