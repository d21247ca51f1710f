//! Transport: the boundary between the pipeline and the remote service
//!
//! This module provides:
//! - `Transport` trait: send a conversation, get reply text back
//! - `HttpTransport`: chat-completions over HTTPS (feature `http`)
//! - Offline implementations for tests and dry runs

mod http;
mod mock;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

pub use http::{
    HttpTransport, HttpTransportConfig, DEFAULT_API_URL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_MS,
};
pub use mock::{EchoTransport, FixedReplyTransport, ScriptedTransport};

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of the conversation sent to the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Single-method capability: send a conversation, return text or fail.
///
/// Retry, backoff and rate limiting belong in implementations of this
/// trait; the engine calls `send` exactly once per layer.
pub trait Transport: Send + Sync {
    /// Send the ordered conversation and return the raw reply text
    fn send(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Short label used in logs
    fn name(&self) -> &str {
        "custom"
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, messages: &[ChatMessage]) -> Result<String> {
        (**self).send(messages)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, messages: &[ChatMessage]) -> Result<String> {
        (**self).send(messages)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
