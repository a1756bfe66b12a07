//! The message envelope carried on every saga exchange message (spec §4.1).

use serde::{Deserialize, Serialize};

/// What a command asks a participant to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Execute,
    Compensate,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Execute => write!(f, "execute"),
            Operation::Compensate => write!(f, "compensate"),
        }
    }
}

/// The outcome encoded on a reply envelope. See spec §4.1 reply-encoding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Pending,
    Completed,
    Failed,
    Compensated,
}

impl std::fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplyStatus::Pending => write!(f, "pending"),
            ReplyStatus::Completed => write!(f, "completed"),
            ReplyStatus::Failed => write!(f, "failed"),
            ReplyStatus::Compensated => write!(f, "compensated"),
        }
    }
}

/// Every message on the saga exchange carries this typed envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub saga_id: String,
    pub step_name: String,
    pub operation: Operation,
    pub status: ReplyStatus,
    pub data: Vec<u8>,
    pub error: Option<String>,
    pub timestamp: i64,
}

impl Envelope {
    /// Builds an execute command for a step, carrying the current payload.
    pub fn execute_command(saga_id: impl Into<String>, step_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            saga_id: saga_id.into(),
            step_name: step_name.into(),
            operation: Operation::Execute,
            status: ReplyStatus::Pending,
            data,
            error: None,
            timestamp: now_unix(),
        }
    }

    /// Builds a compensate command for a step, carrying the current payload.
    pub fn compensate_command(saga_id: impl Into<String>, step_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            saga_id: saga_id.into(),
            step_name: step_name.into(),
            operation: Operation::Compensate,
            status: ReplyStatus::Pending,
            data,
            error: None,
            timestamp: now_unix(),
        }
    }

    /// Builds an `execute/completed` reply.
    pub fn execute_completed(saga_id: impl Into<String>, step_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::reply(saga_id, step_name, Operation::Execute, ReplyStatus::Completed, data, None)
    }

    /// Builds an `execute/failed` reply.
    pub fn execute_failed(
        saga_id: impl Into<String>,
        step_name: impl Into<String>,
        data: Vec<u8>,
        reason: impl Into<String>,
    ) -> Self {
        Self::reply(
            saga_id,
            step_name,
            Operation::Execute,
            ReplyStatus::Failed,
            data,
            Some(reason.into()),
        )
    }

    /// Builds a `compensate/compensated` reply.
    pub fn compensated(saga_id: impl Into<String>, step_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::reply(
            saga_id,
            step_name,
            Operation::Compensate,
            ReplyStatus::Compensated,
            data,
            None,
        )
    }

    /// Builds a `compensate/failed` reply (the undo itself could not complete).
    pub fn compensate_failed(
        saga_id: impl Into<String>,
        step_name: impl Into<String>,
        data: Vec<u8>,
        reason: impl Into<String>,
    ) -> Self {
        Self::reply(
            saga_id,
            step_name,
            Operation::Compensate,
            ReplyStatus::Failed,
            data,
            Some(reason.into()),
        )
    }

    fn reply(
        saga_id: impl Into<String>,
        step_name: impl Into<String>,
        operation: Operation,
        status: ReplyStatus,
        data: Vec<u8>,
        error: Option<String>,
    ) -> Self {
        Self {
            saga_id: saga_id.into(),
            step_name: step_name.into(),
            operation,
            status,
            data,
            error,
            timestamp: now_unix(),
        }
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Envelope {
    /// Serializes the envelope to the JSON bytes carried as a message body.
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes an envelope from a message body.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
