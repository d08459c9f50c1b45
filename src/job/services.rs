// src/job/services.rs

//! Host collaborators injected into the engine.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::engine::EventSink;

/// Services a job can reach through its `job` handle, beyond sleeping and
/// logging (which the runtime provides itself).
pub trait HostServices: Send + Sync {
    /// Show `message` to the user.
    fn notify_user(&self, message: &str, title: &str);
}

/// Notifier that only logs; used by the CLI host.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl HostServices for LogNotifier {
    fn notify_user(&self, message: &str, title: &str) {
        info!(target: "jobhost::notify", %title, "{message}");
    }
}

/// Everything the engine needs from its host.
#[derive(Clone)]
pub struct JobEnvironment {
    pub services: Arc<dyn HostServices>,
    pub sink: Arc<dyn EventSink>,
}

impl JobEnvironment {
    pub fn new(services: Arc<dyn HostServices>, sink: Arc<dyn EventSink>) -> Self {
        Self { services, sink }
    }
}

impl fmt::Debug for JobEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobEnvironment").finish_non_exhaustive()
    }
}
