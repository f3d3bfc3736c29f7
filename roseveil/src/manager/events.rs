//! Events published by the install, repair and update flows.
//!
//! Events are plain serializable values so any shell (terminal, GUI, IPC
//! bridge) can render them. Flows publish through an [`EventSink`]:
//! closures, channels and the no-op [`NullSink`] all qualify.

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use super::download::DownloadProgress;

/// Phase of the install state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPhase {
    Manifest,
    Precondition,
    Download,
    VerifyChecksum,
    Extract,
    PostVerify,
    Commit,
    Done,
}

impl InstallPhase {
    /// Machine tag of the phase.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Manifest => "manifest",
            Self::Precondition => "precondition",
            Self::Download => "download",
            Self::VerifyChecksum => "verify-checksum",
            Self::Extract => "extract",
            Self::PostVerify => "post-verify",
            Self::Commit => "commit",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Event emitted to the shell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Phase transition with a human message.
    Status { phase: InstallPhase, message: String },
    /// Download progress.
    Progress(DownloadProgress),
    /// Terminal outcome of an install or update.
    Done {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Terminal outcome of a verify/repair run.
    VerifyDone {
        ok: bool,
        repaired: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        issues: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl PipelineEvent {
    pub fn status(phase: InstallPhase, message: impl Into<String>) -> Self {
        Self::Status {
            phase,
            message: message.into(),
        }
    }

    pub fn succeeded(message: impl Into<String>) -> Self {
        Self::Done {
            ok: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self::Done {
            ok: false,
            message: None,
            error: Some(error.to_string()),
        }
    }

    /// Whether this event ends a flow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::VerifyDone { .. })
    }
}

/// Receiver of pipeline events.
///
/// Called on the flow's own task, in order. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

impl<F> EventSink for F
where
    F: Fn(&PipelineEvent) + Send + Sync,
{
    fn emit(&self, event: &PipelineEvent) {
        self(event)
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &PipelineEvent) {}
}

/// Sink that forwards events into an unbounded channel.
///
/// Sends to a closed channel are ignored; the flow keeps running.
#[derive(Debug, Clone)]
pub struct ChannelSink(pub UnboundedSender<PipelineEvent>);

impl EventSink for ChannelSink {
    fn emit(&self, event: &PipelineEvent) {
        let _ = self.0.send(event.clone());
    }
}
