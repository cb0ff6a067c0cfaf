// crates/callgate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example gateway configuration.
// Purpose: Deterministic example for docs, tooling and tests.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example `callgate.toml`. It declares one command action and one
//! named action and is kept loadable by the config test suite.

/// Returns a canonical example `callgate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[audit]
dir = "/var/log/callgate"
debug_capture = false
queue_capacity = 1024

[auth]
max_clock_skew_secs = 60

[[auth.static_identities]]
id = "local-operator"
subject = "operator"
permissions = ["files.list", "tickets.read"]

[execution]
allowed_executables = ["/bin/ls"]
default_timeout_secs = 30
max_output_bytes = 1048576

[execution.timeout_overrides]
"files.list" = 10

[[actions]]
name = "files.list"
description = "List entries of an approved directory."
classification = "read"
required_permissions = ["files.list"]
sensitive_inputs = []
output_policy = { "*" = "allow" }

[actions.input_schema]
type = "object"
required = ["dir"]
additionalProperties = false

[actions.input_schema.properties.dir]
enum = ["/srv/data", "/srv/logs"]

[actions.input_schema.properties.all]
type = "boolean"

[actions.handler]
kind = "command"
executable = "/bin/ls"
args = [
  { kind = "flag", name = "all", flag = "-a" },
  { kind = "field", name = "dir" },
]
output = { kind = "text" }

[[actions]]
name = "tickets.read"
description = "Fetch a support ticket."
classification = "read"
required_permissions = ["tickets.read"]
elevated_permissions = ["tickets.read_vip"]
elevate_when = { kind = "string_prefix", field = "ticket_id", prefix = "VIP-" }
sensitive_inputs = ["ticket_id"]
handler = { kind = "named", name = "tickets" }

[actions.input_schema]
type = "object"
required = ["ticket_id"]

[actions.input_schema.properties.ticket_id]
type = "string"

[actions.output_policy]
".ticket.subject" = "allow"
".ticket.requester.email" = "mask"
".ticket.status" = "allow"
"..internal_notes" = "redact"
"#,
    )
}
