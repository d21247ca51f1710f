//! Pipeline Tests
//!
//! End-to-end runs of the recursion engine over offline transports.

use std::sync::Arc;

use dax::engine::PRIOR_OUTPUT_MARKER;
use dax::layers::merge_layers;
use dax::transport::{EchoTransport, FixedReplyTransport, ScriptedTransport};
use dax::{
    run_dax, ChatMessage, DaxError, ErrorCategory, LayerId, LayerOverride, LayerOverrides,
    LayerRegistry, RecursionEngine, ResponseMode, RunRequest, Transport,
};
use pretty_assertions::assert_eq;

fn builtin_engine() -> RecursionEngine {
    RecursionEngine::new(Arc::new(LayerRegistry::builtin().unwrap()))
}

/// Fails on the given call number, echoes otherwise
struct FailOnCall {
    fail_at: usize,
    inner: EchoTransport,
}

impl Transport for FailOnCall {
    fn send(&self, messages: &[ChatMessage]) -> dax::Result<String> {
        if self.inner.call_count() + 1 == self.fail_at {
            return Err(DaxError::Transport {
                message: "HTTP 502: bad gateway".to_string(),
                status: Some(502),
                body: Some("bad gateway".to_string()),
                source: None,
            });
        }
        self.inner.send(messages)
    }
}

// === Override Merge Tests ===

#[test]
fn test_merge_preserves_registry_length_and_order() {
    let registry = LayerRegistry::builtin().unwrap();
    let mut overrides = LayerOverrides::new();
    overrides.insert(LayerId::from("5"), LayerOverride::new().with_prompt("Be brief."));
    overrides.insert(LayerId::from("13"), LayerOverride::new().with_name("Final"));

    let merged = merge_layers(&registry, Some(&overrides));

    assert_eq!(merged.len(), registry.len());
    for (merged, default) in merged.iter().zip(registry.iter()) {
        assert_eq!(merged.id, default.id);
    }
    assert_eq!(merged[4].prompt, "Be brief.");
    assert_eq!(merged[4].agent, registry.layers()[4].agent);
    assert_eq!(merged[12].name, "Final");
}

#[test]
fn test_unknown_override_id_is_no_op() {
    let registry = LayerRegistry::builtin().unwrap();
    let mut overrides = LayerOverrides::new();
    overrides.insert(LayerId::from("DA-99"), LayerOverride::new().with_prompt("ignored"));

    assert_eq!(
        merge_layers(&registry, Some(&overrides)),
        merge_layers(&registry, None)
    );
}

#[test]
fn test_override_changes_prompt_sent_to_transport() {
    let mut overrides = LayerOverrides::new();
    overrides.insert(
        LayerId::from("1"),
        LayerOverride::new()
            .with_agent("Pirate")
            .with_prompt("Talk like a pirate."),
    );

    let scripted = Arc::new(ScriptedTransport::new().reply("arr"));
    let engine = RecursionEngine::new(Arc::new(
        LayerRegistry::from_json(
            r#"[{"id": 1, "name": "Only", "agent": "Clerk", "desc": "Tidy", "prompt": "Tidy up."}]"#,
        )
        .unwrap(),
    ));

    engine
        .run(
            RunRequest::new("ahoy", "key")
                .with_overrides(overrides)
                .with_transport(scripted.clone()),
        )
        .unwrap();

    let sent = &scripted.received()[0][0].content;
    assert!(sent.starts_with("You are Only acting as Pirate.\n"));
    assert!(sent.contains("Protocol: Talk like a pirate.\n"));
}

// === Plain Mode Tests ===

#[test]
fn test_echo_transport_returns_input_unchanged() {
    let transport = Arc::new(EchoTransport::new());
    let input = "The system is stable.\nSecond line.";

    let result = builtin_engine()
        .run(RunRequest::new(input, "key").with_transport(transport.clone()))
        .unwrap();

    assert_eq!(result.output, input);
    assert_eq!(result.trace.len(), 13);
    assert!(result.trace.iter().all(|entry| entry.output == input));
    assert!(result.trace.iter().all(|entry| entry.reason.is_none()));
    assert_eq!(transport.call_count(), 13);
}

#[test]
fn test_echo_keeps_marker_text_in_input() {
    let input = "notes\nPrior output:\nquoted tail";

    let result = builtin_engine()
        .run(RunRequest::new(input, "key").with_transport(Arc::new(EchoTransport::new())))
        .unwrap();

    assert_eq!(result.output, input);
    assert!(result.trace.iter().all(|entry| entry.output == input));
}

#[test]
fn test_trace_names_follow_registry_order() {
    let result = builtin_engine()
        .run(RunRequest::new("x", "key").with_transport(Arc::new(EchoTransport::new())))
        .unwrap();

    let names: Vec<&str> = result.trace.iter().map(|e| e.layer.as_str()).collect();
    let expected: Vec<String> = (1..=13).map(|n| format!("DA-{}", n)).collect();
    assert_eq!(names, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[test]
fn test_each_call_is_single_user_message() {
    let transport = Arc::new(ScriptedTransport::new().reply("a").reply("b"));
    let engine = RecursionEngine::new(Arc::new(
        LayerRegistry::from_json(
            r#"[
                {"id": 1, "name": "A", "agent": "x", "desc": "d", "prompt": "p"},
                {"id": 2, "name": "B", "agent": "y", "desc": "d", "prompt": "p"}
            ]"#,
        )
        .unwrap(),
    ));

    engine
        .run(RunRequest::new("in", "key").with_transport(transport.clone()))
        .unwrap();

    for conversation in transport.received() {
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation[0].role, dax::Role::User);
        assert!(conversation[0].content.contains(PRIOR_OUTPUT_MARKER));
    }
}

// === Audit Mode Tests ===

#[test]
fn test_audit_mode_collects_reasons() {
    let transport = Arc::new(FixedReplyTransport::new(r#"{"output": "X", "reason": "ok"}"#));

    let result = builtin_engine()
        .run(
            RunRequest::new("anything", "key")
                .with_mode(ResponseMode::Audit)
                .with_transport(transport),
        )
        .unwrap();

    assert_eq!(result.output, "X");
    assert_eq!(result.trace.len(), 13);
    assert!(result
        .trace
        .iter()
        .all(|entry| entry.reason.as_deref() == Some("ok")));
}

#[test]
fn test_audit_mode_rejects_non_json() {
    let transport = Arc::new(FixedReplyTransport::new("Sure! Here is the text."));

    let err = builtin_engine()
        .run(RunRequest::new("x", "key").audit().with_transport(transport.clone()))
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::ProtocolViolation);
    assert!(err.to_string().contains("Sure! Here is the text."));
    assert_eq!(transport.call_count(), 1);
}

// === Failure Propagation Tests ===

#[test]
fn test_transport_failure_on_second_layer_aborts_run() {
    let transport = Arc::new(FailOnCall {
        fail_at: 2,
        inner: EchoTransport::new(),
    });

    let err = builtin_engine()
        .run(RunRequest::new("x", "key").with_transport(transport.clone()))
        .unwrap_err();

    match &err {
        DaxError::Transport { status, body, .. } => {
            assert_eq!(*status, Some(502));
            assert_eq!(body.as_deref(), Some("bad gateway"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert!(err.is_retryable());
    assert_eq!(transport.inner.call_count(), 1);
}

#[test]
fn test_empty_credential_fails_before_transport() {
    let transport = Arc::new(EchoTransport::new());

    let err = builtin_engine()
        .run(RunRequest::new("x", "").with_transport(transport.clone()))
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(transport.call_count(), 0);
}

// === Concurrency Tests ===

#[test]
fn test_concurrent_runs_share_registry() {
    let engine = Arc::new(builtin_engine());

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let input = format!("input {}", n);
                let request = RunRequest::new(input.clone(), "key")
                    .with_transport(Arc::new(EchoTransport::new()));
                let result = engine.run(request).unwrap();
                (input, result.output)
            })
        })
        .collect();

    for handle in handles {
        let (input, output) = handle.join().unwrap();
        assert_eq!(input, output);
    }
}

// === Process-wide Entry Point Tests ===

#[test]
fn test_global_registry_is_shared() {
    let first = LayerRegistry::global().unwrap();
    let second = LayerRegistry::global().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.len(), 13);
}

#[test]
fn test_run_dax_uses_global_registry() {
    let transport = Arc::new(EchoTransport::new());

    let request = RunRequest::new("steady", "key").with_transport(transport.clone());
    let result = run_dax(request).unwrap();

    assert_eq!(result.output, "steady");
    assert_eq!(result.trace.len(), 13);
    assert_eq!(transport.call_count(), 13);
}

#[test]
fn test_run_dax_rejects_empty_credential() {
    let transport = Arc::new(EchoTransport::new());

    let err = run_dax(RunRequest::new("x", "").with_transport(transport.clone())).unwrap_err();

    assert!(matches!(err, DaxError::MissingCredential));
    assert_eq!(transport.call_count(), 0);
}
