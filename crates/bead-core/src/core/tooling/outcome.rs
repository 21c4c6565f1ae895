use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a `bead` command reports back: a status, a one-line message, and
/// machine-readable details (`reason`, `code` and `hint` on errors).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: CommandStatus,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

impl ExecutionOutcome {
    pub fn success(message: impl Into<String>, details: Value) -> Self {
        Self::with_status(CommandStatus::Ok, message, details)
    }

    /// The cache or its storage misbehaved.
    pub fn failure(message: impl Into<String>, details: Value) -> Self {
        Self::with_status(CommandStatus::Failure, message, details)
    }

    /// The request itself was wrong: bad id, missing entry, row out of range.
    pub fn user_error(message: impl Into<String>, details: Value) -> Self {
        Self::with_status(CommandStatus::UserError, message, details)
    }

    fn with_status(status: CommandStatus, message: impl Into<String>, details: Value) -> Self {
        Self {
            status,
            message: message.into(),
            details,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == CommandStatus::Ok
    }

    /// Machine-readable cause, e.g. `not_found` or `invalid_config`.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.detail_str("reason")
    }

    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.detail_str("hint")
    }

    fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    UserError,
    Failure,
}

impl CommandStatus {
    /// Process exit code for the `bead` binary.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            CommandStatus::Ok => 0,
            CommandStatus::UserError => 1,
            CommandStatus::Failure => 2,
        }
    }

    /// Label used in JSON envelopes.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            CommandStatus::Ok => "ok",
            CommandStatus::UserError => "user-error",
            CommandStatus::Failure => "error",
        }
    }
}
