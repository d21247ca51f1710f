//! Offline transports
//!
//! These never touch the network. They count calls so tests can assert
//! exactly how many times the engine reached the boundary.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ChatMessage, Transport};
use crate::engine::prior_output;
use crate::error::{DaxError, Result};

/// Replies with the text the layer was asked to transform, unchanged
#[derive(Debug, Default)]
pub struct EchoTransport {
    calls: AtomicUsize,
}

impl EchoTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for EchoTransport {
    fn send(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let content = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        Ok(prior_output(content).unwrap_or(content).to_string())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Returns the same reply for every call
#[derive(Debug)]
pub struct FixedReplyTransport {
    reply: String,
    calls: AtomicUsize,
}

impl FixedReplyTransport {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for FixedReplyTransport {
    fn send(&self, _messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

#[derive(Debug)]
enum ScriptStep {
    Reply(String),
    Fail(String),
}

/// Plays back a queue of replies and failures, recording every conversation.
///
/// Running past the end of the script is a transport failure.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<ScriptStep>>,
    received: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(ScriptStep::Reply(text.into()))
    }

    /// Queue a transport failure
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(ScriptStep::Fail(message.into()))
    }

    fn push(self, step: ScriptStep) -> Self {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push_back(step);
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Conversations sent so far, in call order
    pub fn received(&self) -> Vec<Vec<ChatMessage>> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, messages: &[ChatMessage]) -> Result<String> {
        let call = {
            let mut received = self
                .received
                .lock()
                .map_err(|_| DaxError::transport("scripted transport poisoned"))?;
            received.push(messages.to_vec());
            received.len()
        };

        let step = self
            .steps
            .lock()
            .map_err(|_| DaxError::transport("scripted transport poisoned"))?
            .pop_front();

        match step {
            Some(ScriptStep::Reply(text)) => Ok(text),
            Some(ScriptStep::Fail(message)) => Err(DaxError::transport(message)),
            None => Err(DaxError::transport(format!(
                "script exhausted at call {}",
                call
            ))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ResponseMode;
    use crate::layers::{LayerDefinition, LayerId};

    fn layer() -> LayerDefinition {
        LayerDefinition {
            id: LayerId::new("1"),
            name: "DA-1".to_string(),
            agent: "Clerk".to_string(),
            desc: "Tidy".to_string(),
            prompt: "Fix spacing.".to_string(),
        }
    }

    #[test]
    fn test_echo_returns_prior_output() {
        let transport = EchoTransport::new();
        let message = ChatMessage::user(ResponseMode::Plain.build_prompt(&layer(), "some text"));

        assert_eq!(transport.send(&[message]).unwrap(), "some text");
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_echo_keeps_marker_inside_text() {
        let transport = EchoTransport::new();
        let text = "draft\nPrior output:\nold draft";
        let message = ChatMessage::user(ResponseMode::Audit.build_prompt(&layer(), text));

        assert_eq!(transport.send(&[message]).unwrap(), text);
    }

    #[test]
    fn test_echo_without_marker_returns_content() {
        let transport = EchoTransport::new();
        assert_eq!(transport.send(&[ChatMessage::user("raw")]).unwrap(), "raw");
    }

    #[test]
    fn test_scripted_plays_in_order() {
        let transport = ScriptedTransport::new().reply("one").fail("down");

        assert_eq!(transport.send(&[ChatMessage::user("a")]).unwrap(), "one");
        let err = transport.send(&[ChatMessage::user("b")]).unwrap_err();
        assert!(err.to_string().contains("down"));
        let err = transport.send(&[ChatMessage::user("c")]).unwrap_err();
        assert!(err.to_string().contains("script exhausted at call 3"));

        assert_eq!(transport.call_count(), 3);
        assert_eq!(transport.received()[1][0].content, "b");
    }
}
