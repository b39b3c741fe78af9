//! Install progress events.
//!
//! Events are serialized with a `type` discriminator so transports can
//! forward them verbatim:
//!
//! ```json
//! {"type":"line","line":"[installer] Running steamcmd..."}
//! {"type":"done","ok":true,"payload":{"slug":"alpha"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One item of an install stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallEvent {
    /// A progress line.
    Line { line: String },
    /// Terminal event; exactly one per stream.
    Done {
        ok: bool,
        #[serde(default)]
        payload: Value,
    },
}

impl InstallEvent {
    pub fn line(line: impl Into<String>) -> Self {
        Self::Line { line: line.into() }
    }

    pub fn done(ok: bool, payload: Value) -> Self {
        Self::Done { ok, payload }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let line = serde_json::to_value(InstallEvent::line("hello")).unwrap();
        assert_eq!(line, json!({"type": "line", "line": "hello"}));

        let done = serde_json::to_value(InstallEvent::done(false, json!({"error": "boom"})))
            .unwrap();
        assert_eq!(
            done,
            json!({"type": "done", "ok": false, "payload": {"error": "boom"}})
        );
    }

    #[test]
    fn test_is_terminal() {
        assert!(!InstallEvent::line("x").is_terminal());
        assert!(InstallEvent::done(true, Value::Null).is_terminal());
    }
}
