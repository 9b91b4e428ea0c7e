//! Command handlers for the ragchat CLI.

pub mod ask;

// Re-export command types for convenience
pub use ask::AskCommand;
