//! Chat turns against the code-generation backend.

mod client;
mod transcript;

pub use client::{ChatBackend, HttpChatClient};
pub use transcript::{ChatMessage, Role, Transcript};
