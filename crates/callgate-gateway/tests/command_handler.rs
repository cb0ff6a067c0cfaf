// crates/callgate-gateway/tests/command_handler.rs
// ============================================================================
// Module: Command Handler Tests
// Description: Argv rendering, output parsing and bounded process execution.
// ============================================================================
//! ## Overview
//! Exercises argv templates as a pure function, control-sequence stripping,
//! output formats, and real child processes under caps and deadlines.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use callgate_core::ActionDefinition;
use callgate_core::ArgTemplate;
use callgate_core::CallerContext;
use callgate_core::CaptureStreams;
use callgate_core::Classification;
use callgate_core::CommandSpec;
use callgate_core::ErrorCode;
use callgate_core::FieldAction;
use callgate_core::HandlerRef;
use callgate_core::InternalDetail;
use callgate_core::OutputFormat;
use callgate_core::OutputPolicy;
use callgate_core::Stage;
use callgate_gateway::ActionHandler;
use callgate_gateway::BuildError;
use callgate_gateway::CommandHandler;
use callgate_gateway::HandlerContext;
use callgate_gateway::TransformSet;
use callgate_gateway::build_argv;
use callgate_gateway::parse_output;
use callgate_gateway::strip_control_sequences;
use serde_json::json;

use crate::common::builder;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Literal template.
fn literal(value: &str) -> ArgTemplate {
    ArgTemplate::Literal {
        value: value.to_string(),
    }
}

/// Field template.
fn field(name: &str, optional: bool) -> ArgTemplate {
    ArgTemplate::Field {
        name: name.to_string(),
        optional,
    }
}

/// Handler context for direct handler calls.
fn context() -> HandlerContext {
    HandlerContext {
        trace_id: callgate_core::TraceId::new("trace-1"),
        action: "cmd".into(),
        subject: "agent-1".to_string(),
        timeout: Duration::from_secs(5),
    }
}

/// Command action allowing every output field.
fn command_action(name: &str, spec: CommandSpec) -> ActionDefinition {
    ActionDefinition::new(name, Classification::Read, HandlerRef::Command(spec))
        .with_output_policy(OutputPolicy::from_rules([("*", FieldAction::Allow)]).unwrap())
}

// ============================================================================
// SECTION: Argv Rendering
// ============================================================================

/// Tests scalars, arrays, flags and options render as whole entries.
#[test]
fn argv_renders_each_template_kind() {
    let templates = vec![
        literal("-l"),
        field("paths", false),
        ArgTemplate::Flag {
            name: "all".to_string(),
            flag: "--all".to_string(),
        },
        ArgTemplate::Param {
            name: "depth".to_string(),
            flag: "--depth".to_string(),
        },
        field("suffix", true),
    ];
    let input = json!({"paths": ["/tmp", "a b; rm -rf /"], "all": true, "depth": 2});

    let argv = build_argv(&templates, &input).unwrap();

    assert_eq!(argv, vec!["-l", "/tmp", "a b; rm -rf /", "--all", "--depth", "2"]);
}

/// Tests false flags and absent options emit nothing.
#[test]
fn argv_skips_false_flags_and_absent_options() {
    let templates = vec![
        ArgTemplate::Flag {
            name: "all".to_string(),
            flag: "--all".to_string(),
        },
        ArgTemplate::Param {
            name: "depth".to_string(),
            flag: "--depth".to_string(),
        },
    ];
    assert!(build_argv(&templates, &json!({"all": false, "depth": null})).unwrap().is_empty());
}

/// Tests missing required fields and object values are errors.
#[test]
fn argv_rejects_missing_and_object_fields() {
    let missing = build_argv(&[field("path", false)], &json!({})).unwrap_err();
    assert!(missing.reason.contains("missing argument field path"));

    let object = build_argv(&[field("path", false)], &json!({"path": {"a": 1}})).unwrap_err();
    assert!(object.reason.contains("not a scalar"));

    let nested = build_argv(&[field("path", false)], &json!({"path": [["a"]]})).unwrap_err();
    assert!(nested.reason.contains("non-scalar element"));
}

// ============================================================================
// SECTION: Output Parsing
// ============================================================================

/// Tests CSI, OSC, two-byte escapes and stray controls are stripped.
#[test]
fn control_sequences_are_stripped() {
    let raw = "\u{1b}[31mred\u{1b}[0m\t\u{1b}]0;title\u{7}ok\u{1b}=\r\n\u{7}\u{0}done\u{9b}2Jx";
    assert_eq!(strip_control_sequences(raw), "red\tok\ndonex");
}

/// Tests OSC terminated by ST is stripped.
#[test]
fn osc_with_string_terminator_is_stripped() {
    assert_eq!(strip_control_sequences("a\u{1b}]8;;http://x\u{1b}\\b"), "ab");
}

/// Tests each output format.
#[test]
fn output_formats_parse() {
    let transforms = TransformSet::new();
    assert_eq!(parse_output("hi\n", &OutputFormat::Text, &transforms).unwrap(), json!("hi\n"));
    assert_eq!(
        parse_output(" {\"a\": 1}\n", &OutputFormat::Json, &transforms).unwrap(),
        json!({"a": 1})
    );
    assert_eq!(
        parse_output("{\"a\":1}\n\n{\"a\":2}\n", &OutputFormat::JsonLines, &transforms).unwrap(),
        json!([{"a": 1}, {"a": 2}])
    );
    assert!(parse_output("nope", &OutputFormat::Json, &transforms).is_err());
}

/// Tests custom transforms are looked up by name.
#[test]
fn custom_transform_applies() {
    let mut transforms = TransformSet::new();
    transforms.insert("count_lines", |text: &str| Ok(json!(text.lines().count())));
    let format = OutputFormat::Custom {
        transform: "count_lines".to_string(),
    };
    assert_eq!(parse_output("a\nb\nc\n", &format, &transforms).unwrap(), json!(3));

    let unknown = OutputFormat::Custom {
        transform: "missing".to_string(),
    };
    assert!(parse_output("a", &unknown, &transforms).is_err());
}

// ============================================================================
// SECTION: Process Execution
// ============================================================================

/// Tests a real command runs with rendered argv and a clean environment.
#[tokio::test]
async fn echo_runs_with_rendered_argv() {
    let spec = CommandSpec::new("/bin/echo").with_args(vec![literal("-n"), field("word", false)]);
    let handler = CommandHandler::new(spec, Arc::new(TransformSet::new()));

    let output = handler.execute(&json!({"word": "$HOME"}), &context()).await.unwrap();

    assert_eq!(output, json!("$HOME"));
}

/// Tests separate capture returns both streams.
#[tokio::test]
async fn separate_capture_shapes_output() {
    let mut spec = CommandSpec::new("/bin/echo")
        .with_args(vec![literal("{\"n\": 1}")])
        .with_output(OutputFormat::Json);
    spec.capture = CaptureStreams::Separate;
    let handler = CommandHandler::new(spec, Arc::new(TransformSet::new()));

    let output = handler.execute(&json!({}), &context()).await.unwrap();

    assert_eq!(output, json!({"stdout": {"n": 1}, "stderr": ""}));
}

/// Tests a non-zero exit is a failure carrying the exit code.
#[tokio::test]
async fn nonzero_exit_is_failure() {
    let handler =
        CommandHandler::new(CommandSpec::new("/bin/false"), Arc::new(TransformSet::new()));

    let failure = handler.execute(&json!({}), &context()).await.unwrap_err();

    assert_eq!(failure.exit_code, Some(1));
    assert!(!failure.signal);
}

/// Tests output beyond the cap fails the call.
#[tokio::test]
async fn oversized_output_fails() {
    let mut spec = CommandSpec::new("/bin/echo").with_args(vec![literal(&"x".repeat(64))]);
    spec.max_output_bytes = 16;
    let handler = CommandHandler::new(spec, Arc::new(TransformSet::new()));

    let failure = handler.execute(&json!({}), &context()).await.unwrap_err();

    assert!(failure.reason.contains("exceeded 16 bytes"));
}

/// Tests spawn failures are reported without panicking.
#[tokio::test]
async fn missing_executable_fails() {
    let handler = CommandHandler::new(
        CommandSpec::new("/nonexistent/callgate-tool"),
        Arc::new(TransformSet::new()),
    );
    let failure = handler.execute(&json!({}), &context()).await.unwrap_err();
    assert!(failure.reason.starts_with("spawn failed"));
}

/// Tests a command exceeding its deadline is killed and reported.
#[tokio::test]
async fn slow_command_times_out() {
    let spec = CommandSpec::new("/bin/sleep").with_args(vec![literal("30")]);
    let action = command_action("jobs.sleep", spec).with_timeout(Duration::from_millis(200));
    let (builder, audit, _) = builder(vec![action]);
    let engine = builder.allowed_executables(["/bin/sleep"]).build().unwrap();

    let started = Instant::now();
    let result = engine.call(&CallerContext::new("agent-1", ["x"]), "jobs.sleep", json!({})).await;
    engine.flush_audit().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    let failure = result.failure().unwrap();
    assert_eq!(failure.code, ErrorCode::ExecutionFailure);
    assert_eq!(failure.stage, Stage::Execution);
    let entries = audit.entries();
    assert!(matches!(
        entries[0].denial.as_ref().unwrap().detail,
        Some(InternalDetail::Execution { timed_out: true, .. })
    ));
}

/// Tests a command action runs through the engine end to end.
#[tokio::test]
async fn command_action_through_engine() {
    let spec = CommandSpec::new("/bin/echo")
        .with_args(vec![literal("{\"name\": \"report\", \"token\": \"abc123\"}")])
        .with_output(OutputFormat::Json);
    let action = ActionDefinition::new("reports.get", Classification::Read, HandlerRef::Command(spec))
        .with_output_policy(
            OutputPolicy::from_rules([("*", FieldAction::Allow), (".token", FieldAction::Mask)])
                .unwrap(),
        );
    let (builder, _, _) = builder(vec![action]);
    let engine = builder.allowed_executables(["/bin/echo"]).build().unwrap();

    let result = engine.call(&CallerContext::new("agent-1", ["x"]), "reports.get", json!({})).await;

    assert_eq!(result.data(), Some(&json!({"name": "report", "token": "a****3"})));
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

/// Tests executables outside the allow-list fail the build.
#[tokio::test]
async fn executable_must_be_allow_listed() {
    let action = command_action("files.list", CommandSpec::new("/bin/ls"));
    let (builder, _, _) = builder(vec![action]);

    let err = builder.allowed_executables(["/bin/echo"]).build().err().unwrap();

    assert!(matches!(err, BuildError::ExecutableNotAllowed { .. }));
}

/// Tests unknown custom transforms fail the build.
#[tokio::test]
async fn unknown_transform_fails_build() {
    let spec = CommandSpec::new("/bin/echo").with_output(OutputFormat::Custom {
        transform: "parse_df".to_string(),
    });
    let (builder, _, _) = builder(vec![command_action("disk.usage", spec)]);

    let err = builder.allowed_executables(["/bin/echo"]).build().err().unwrap();

    assert!(matches!(err, BuildError::UnknownTransform { .. }));
}
