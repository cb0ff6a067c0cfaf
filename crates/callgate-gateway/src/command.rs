// crates/callgate-gateway/src/command.rs
// ============================================================================
// Module: Call Gate Command Handler
// Description: Bounded local execution of fixed, allow-listed commands.
// Purpose: Run a data-only command spec over validated input.
// Dependencies: async-trait, callgate-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! A [`CommandHandler`] renders argv with [`build_argv`], a pure function of
//! the validated input, and spawns the executable directly. There is no
//! shell and no string concatenation: each template yields whole argv
//! entries. Captured output is capped, stripped of terminal control
//! sequences and parsed into the action output.
//!
//! Security posture: the child starts with a clean environment unless the
//! spec opts in, stdin is closed, and the child is killed when the call
//! future is dropped at the deadline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use callgate_core::ArgTemplate;
use callgate_core::CaptureStreams;
use callgate_core::CommandSpec;
use callgate_core::OutputFormat;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::handler::ActionHandler;
use crate::handler::ExecutionFailure;
use crate::handler::HandlerContext;

// ============================================================================
// SECTION: Custom Transforms
// ============================================================================

/// Named output transform over stripped text.
pub type TransformFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;

/// Registry of named output transforms.
#[derive(Clone, Default)]
pub struct TransformSet {
    /// Transforms by name.
    transforms: BTreeMap<String, Arc<TransformFn>>,
}

impl TransformSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transform, replacing any previous one with the same name.
    pub fn insert<F>(&mut self, name: impl Into<String>, transform: F)
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(transform));
    }

    /// Returns true when a transform is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Returns the transform registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TransformFn> {
        self.transforms.get(name).map(AsRef::as_ref)
    }
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Handler executing one fixed [`CommandSpec`].
pub struct CommandHandler {
    /// Fixed command description.
    spec: CommandSpec,
    /// Transforms available to `custom` output formats.
    transforms: Arc<TransformSet>,
}

impl CommandHandler {
    /// Creates a handler for `spec`.
    #[must_use]
    pub const fn new(spec: CommandSpec, transforms: Arc<TransformSet>) -> Self {
        Self {
            spec,
            transforms,
        }
    }

    /// Returns the command spec.
    #[must_use]
    pub const fn spec(&self) -> &CommandSpec {
        &self.spec
    }
}

#[async_trait]
impl ActionHandler for CommandHandler {
    async fn execute(&self, input: &Value, _ctx: &HandlerContext) -> Result<Value, ExecutionFailure> {
        let argv = build_argv(&self.spec.args, input)?;
        let captured = run_command(&self.spec, &argv).await?;
        let stdout = strip_control_sequences(&String::from_utf8_lossy(&captured.stdout));
        let stderr = strip_control_sequences(&String::from_utf8_lossy(&captured.stderr));
        match self.spec.capture {
            CaptureStreams::Stdout => parse_output(&stdout, &self.spec.output, &self.transforms),
            CaptureStreams::Combined => {
                let combined = format!("{stdout}{stderr}");
                parse_output(&combined, &self.spec.output, &self.transforms)
            }
            CaptureStreams::Separate => {
                let parsed = parse_output(&stdout, &self.spec.output, &self.transforms)?;
                Ok(json!({"stdout": parsed, "stderr": stderr}))
            }
        }
    }
}

// ============================================================================
// SECTION: Argument Rendering
// ============================================================================

/// Renders argv from templates over validated input.
///
/// # Errors
///
/// Returns [`ExecutionFailure`] when a required field is missing or a field
/// holds an object or a nested non-scalar. Messages name fields, never values.
pub fn build_argv(templates: &[ArgTemplate], input: &Value) -> Result<Vec<String>, ExecutionFailure> {
    let mut argv = Vec::new();
    for template in templates {
        match template {
            ArgTemplate::Literal {
                value,
            } => argv.push(value.clone()),
            ArgTemplate::Field {
                name,
                optional,
            } => match present(input, name) {
                Some(value) => argv.extend(field_values(name, value)?),
                None if *optional => {}
                None => {
                    return Err(ExecutionFailure::new(format!("missing argument field {name}")));
                }
            },
            ArgTemplate::Flag {
                name,
                flag,
            } => {
                if present(input, name) == Some(&Value::Bool(true)) {
                    argv.push(flag.clone());
                }
            }
            ArgTemplate::Param {
                name,
                flag,
            } => {
                if let Some(value) = present(input, name) {
                    for rendered in field_values(name, value)? {
                        argv.push(flag.clone());
                        argv.push(rendered);
                    }
                }
            }
        }
    }
    Ok(argv)
}

/// Returns a top-level field unless it is absent or null.
fn present<'a>(input: &'a Value, name: &str) -> Option<&'a Value> {
    input.get(name).filter(|value| !value.is_null())
}

/// Renders a scalar or an array of scalars as argv entries.
fn field_values(name: &str, value: &Value) -> Result<Vec<String>, ExecutionFailure> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                scalar_arg(item).ok_or_else(|| {
                    ExecutionFailure::new(format!("argument field {name} has a non-scalar element"))
                })
            })
            .collect(),
        other => scalar_arg(other)
            .map(|arg| vec![arg])
            .ok_or_else(|| ExecutionFailure::new(format!("argument field {name} is not a scalar"))),
    }
}

/// Renders a scalar as a single argument.
fn scalar_arg(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// ============================================================================
// SECTION: Process Execution
// ============================================================================

/// Raw captured streams.
struct Captured {
    /// Captured standard output.
    stdout: Vec<u8>,
    /// Captured standard error (empty when not captured).
    stderr: Vec<u8>,
}

/// Spawns the command and captures its output within the byte cap.
async fn run_command(spec: &CommandSpec, argv: &[String]) -> Result<Captured, ExecutionFailure> {
    let capture_stderr = spec.capture != CaptureStreams::Stdout;
    let mut command = Command::new(&spec.executable);
    command
        .args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(if capture_stderr { Stdio::piped() } else { Stdio::null() })
        .kill_on_drop(true);
    if !spec.inherit_env {
        command.env_clear();
    }
    command.envs(&spec.env);
    if let Some(dir) = &spec.working_dir {
        command.current_dir(dir);
    }
    let mut child = command
        .spawn()
        .map_err(|err| ExecutionFailure::new(format!("spawn failed: {}", err.kind())))?;
    let limit = u64::try_from(spec.max_output_bytes).unwrap_or(u64::MAX).saturating_add(1);
    let (stdout, stderr) =
        tokio::join!(read_limited(child.stdout.take(), limit), read_limited(child.stderr.take(), limit));
    let stdout = stdout?;
    let stderr = stderr?;
    if stdout.len().saturating_add(stderr.len()) > spec.max_output_bytes {
        let _ = child.kill().await;
        return Err(ExecutionFailure::new(format!(
            "output exceeded {} bytes",
            spec.max_output_bytes
        )));
    }
    let status = child
        .wait()
        .await
        .map_err(|err| ExecutionFailure::new(format!("wait failed: {}", err.kind())))?;
    if !status.success() {
        let exit_code = status.code();
        return Err(ExecutionFailure {
            reason: exit_code.map_or_else(
                || "terminated by signal".to_string(),
                |code| format!("exited with status {code}"),
            ),
            exit_code,
            signal: exit_code.is_none(),
            timed_out: false,
        });
    }
    Ok(Captured {
        stdout,
        stderr,
    })
}

/// Reads at most `limit` bytes from an optional stream, then drops it.
async fn read_limited<R>(stream: Option<R>, limit: u64) -> Result<Vec<u8>, ExecutionFailure>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    if let Some(stream) = stream {
        stream
            .take(limit)
            .read_to_end(&mut buffer)
            .await
            .map_err(|err| ExecutionFailure::new(format!("read failed: {}", err.kind())))?;
    }
    Ok(buffer)
}

// ============================================================================
// SECTION: Output Parsing
// ============================================================================

/// Parses stripped text into the action output.
///
/// # Errors
///
/// Returns [`ExecutionFailure`] when the text does not parse or the custom
/// transform is unknown or fails.
pub fn parse_output(
    text: &str,
    format: &OutputFormat,
    transforms: &TransformSet,
) -> Result<Value, ExecutionFailure> {
    match format {
        OutputFormat::Text => Ok(Value::String(text.to_string())),
        OutputFormat::Json => serde_json::from_str(text.trim())
            .map_err(|err| ExecutionFailure::new(format!("output is not json: line {}", err.line()))),
        OutputFormat::JsonLines => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|_| {
                    ExecutionFailure::new(format!("output record {} is not json", index + 1))
                })
            })
            .collect::<Result<Vec<Value>, _>>()
            .map(Value::Array),
        OutputFormat::Custom {
            transform,
        } => {
            let func = transforms
                .get(transform)
                .ok_or_else(|| ExecutionFailure::new(format!("unknown transform {transform}")))?;
            func(text).map_err(|err| ExecutionFailure::new(format!("transform {transform}: {err}")))
        }
    }
}

/// Removes terminal control sequences and stray control characters.
///
/// CSI, OSC/DCS-style string sequences, two-byte escapes and C1 controls are
/// dropped; newline and tab are kept.
#[must_use]
pub fn strip_control_sequences(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\u{1b}' => match chars.next() {
                Some('[') => skip_csi(&mut chars),
                Some(']' | 'P' | 'X' | '^' | '_') => skip_string(&mut chars),
                _ => {}
            },
            '\u{9b}' => skip_csi(&mut chars),
            '\u{9d}' | '\u{90}' | '\u{98}' | '\u{9e}' | '\u{9f}' => skip_string(&mut chars),
            '\n' | '\t' => cleaned.push(ch),
            other if other.is_control() => {}
            other => cleaned.push(other),
        }
    }
    cleaned
}

/// Skips CSI parameters through the final byte.
fn skip_csi(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    for ch in chars.by_ref() {
        if ('\u{40}'..='\u{7e}').contains(&ch) {
            break;
        }
    }
}

/// Skips a string sequence through BEL or ST.
fn skip_string(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while let Some(ch) = chars.next() {
        match ch {
            '\u{7}' | '\u{9c}' => break,
            '\u{1b}' => {
                if chars.peek() == Some(&'\\') {
                    chars.next();
                }
                break;
            }
            _ => {}
        }
    }
}
