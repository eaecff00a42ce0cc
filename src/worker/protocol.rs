//! Messages exchanged between the coordinator and the background context.
//!
//! | Direction | Message                                   |
//! |-----------|-------------------------------------------|
//! | → worker  | `Init`                                    |
//! | ← worker  | `Success(Initialized)`                    |
//! | ← worker  | `Error { kind: ImportFailure, .. }`       |
//! | → worker  | `Render`                                  |
//! | ← worker  | `Success(Rendered(frame))`                |
//! | ← worker  | `Error { kind: RenderFailure, detail }`   |

use crate::compute::RawFrame;

/// Requests sent from the coordinator to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRequest {
    /// Load the compute module and initialize it
    Init,
    /// Run one render pass
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerErrorKind {
    ImportFailure,
    RenderFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SuccessPayload {
    Initialized,
    Rendered(RawFrame),
}

/// Replies emitted by the worker, exactly one per request.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerReply {
    Success(SuccessPayload),
    Error {
        kind: WorkerErrorKind,
        detail: String,
    },
}

impl WorkerReply {
    pub fn initialized() -> Self {
        Self::Success(SuccessPayload::Initialized)
    }

    pub fn rendered(frame: RawFrame) -> Self {
        Self::Success(SuccessPayload::Rendered(frame))
    }

    pub fn import_failure(detail: impl Into<String>) -> Self {
        Self::Error {
            kind: WorkerErrorKind::ImportFailure,
            detail: detail.into(),
        }
    }

    pub fn render_failure(detail: impl Into<String>) -> Self {
        Self::Error {
            kind: WorkerErrorKind::RenderFailure,
            detail: detail.into(),
        }
    }

    /// Short tag for diagnostics, without the payload.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Success(SuccessPayload::Initialized) => "Success(Initialized)",
            Self::Success(SuccessPayload::Rendered(_)) => "Success(Rendered)",
            Self::Error {
                kind: WorkerErrorKind::ImportFailure,
                ..
            } => "Error(ImportFailure)",
            Self::Error {
                kind: WorkerErrorKind::RenderFailure,
                ..
            } => "Error(RenderFailure)",
        }
    }
}
