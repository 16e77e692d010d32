//! Request and reply bodies of the assistant endpoints.
//!
//! The assistant is a stateless proxy: one request, one reply. Nothing
//! here touches the task cache.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/ai/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
}

/// Reply of `POST /api/ai/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// The assistant's answer.
    pub response: String,
}
