//! # Core Session Logic
//!
//! Everything the chat assistant decides lives here.
//! It knows nothing about terminals, HTTP, or tokio tasks.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • Conversation store   │
//!                    │  • Quick responses      │
//!                    │  • Action / update()    │
//!                    │                         │
//!                    │  No I/O. No UI. Pure.   │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌────────────┐      ┌────────────┐      ┌────────────┐
//!     │  session   │      │ inference  │      │    TUI     │
//!     │  (driver)  │      │  (remote)  │      │ (consumer) │
//!     └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`message`]: `Message`, `MessageId`, `Sender`
//! - [`state`]: `ConversationState` snapshot and `Mode`
//! - [`store`]: the append-only `ConversationStore`
//! - [`quick`]: exact-match canned answers
//! - [`clock`]: time, id and sleep capabilities
//! - [`action`]: the `Action` enum and `update()` transitions
//! - [`config`]: layered settings

pub mod action;
pub mod clock;
pub mod config;
pub mod message;
pub mod quick;
pub mod state;
pub mod store;
