mod assistant;
mod client;
mod json;

pub use client::{AiClient, ChatMessage};
pub use json::extract_json;

#[cfg(test)]
pub(crate) use client::tests as testing;
