// src/engine/signals.rs

//! Lifecycle signals and the sinks that carry them to the host.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::job::JobScope;
use crate::types::JobName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Accepted,
    Rejected,
    Finished,
    Failed,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalKind::Accepted => "JOB_ACCEPTED",
            SignalKind::Rejected => "JOB_REJECTED",
            SignalKind::Finished => "JOB_FINISHED",
            SignalKind::Failed => "JOB_FAILED",
        };
        f.write_str(s)
    }
}

/// Signal emitted by the engine.
#[derive(Debug, Clone)]
pub enum JobSignal {
    /// A submission was registered and its runner started.
    Accepted { job_name: JobName },
    /// A submission failed to parse, validate or compile.
    Rejected { reason: String },
    /// A job completed without an exception.
    Finished { scope: Arc<JobScope> },
    /// A job completed with an exception.
    Failed { scope: Arc<JobScope> },
}

impl JobSignal {
    pub fn kind(&self) -> SignalKind {
        match self {
            JobSignal::Accepted { .. } => SignalKind::Accepted,
            JobSignal::Rejected { .. } => SignalKind::Rejected,
            JobSignal::Finished { .. } => SignalKind::Finished,
            JobSignal::Failed { .. } => SignalKind::Failed,
        }
    }

    /// Job the signal is about; `None` for rejections.
    pub fn job_name(&self) -> Option<&str> {
        match self {
            JobSignal::Accepted { job_name } => Some(job_name),
            JobSignal::Rejected { .. } => None,
            JobSignal::Finished { scope } | JobSignal::Failed { scope } => Some(scope.name()),
        }
    }

    pub fn scope(&self) -> Option<&Arc<JobScope>> {
        match self {
            JobSignal::Finished { scope } | JobSignal::Failed { scope } => Some(scope),
            _ => None,
        }
    }
}

/// Host-side receiver of engine signals.
///
/// The engine never holds a lock while calling `send`, so an implementation
/// may call back into the engine (query it, submit, report completion).
/// `JOB_ACCEPTED` for a job is always sent before its terminal signal.
pub trait EventSink: Send + Sync {
    fn send(&self, signal: JobSignal);
}

/// Forwards signals into an unbounded Tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<JobSignal>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, signal: JobSignal) {
        if let Err(err) = self.tx.send(signal) {
            debug!(signal = %err.0.kind(), "signal receiver dropped");
        }
    }
}

/// Logs every signal; used by the CLI host.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn send(&self, signal: JobSignal) {
        let kind = signal.kind();
        match &signal {
            JobSignal::Accepted { job_name } => {
                info!(signal = %kind, job = %job_name, "job accepted")
            }
            JobSignal::Rejected { reason } => warn!(signal = %kind, %reason, "job rejected"),
            JobSignal::Finished { scope } => match scope.result() {
                Some(result) => info!(
                    signal = %kind,
                    job = %scope.name(),
                    result = %result.repr(),
                    "job finished"
                ),
                None => info!(signal = %kind, job = %scope.name(), "job finished"),
            },
            JobSignal::Failed { scope } => {
                let error = scope
                    .exception()
                    .map(|fault| fault.to_string())
                    .unwrap_or_default();
                warn!(signal = %kind, job = %scope.name(), %error, "job failed")
            }
        }
    }
}
