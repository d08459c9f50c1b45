use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use jobhost::engine::{NameGenerator, UlidNameGenerator};
use jobhost::job::HostServices;
use jobhost::script::{ScriptHost, ScriptLogLevel};
use jobhost::types::JobName;

/// Host services that remember every notification as `(title, message)`.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notes: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notes.lock().unwrap().clone()
    }
}

impl HostServices for RecordingNotifier {
    fn notify_user(&self, message: &str, title: &str) {
        self.notes
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

/// Hands out a scripted list of names, then falls back to ULID names.
#[derive(Debug)]
pub struct SequenceNameGenerator {
    scripted: Mutex<VecDeque<JobName>>,
    fallback: UlidNameGenerator,
}

impl SequenceNameGenerator {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<JobName>,
    {
        Self {
            scripted: Mutex::new(names.into_iter().map(Into::into).collect()),
            fallback: UlidNameGenerator::default(),
        }
    }

    /// Scripted names not handed out yet.
    pub fn remaining(&self) -> usize {
        self.scripted.lock().unwrap().len()
    }
}

impl NameGenerator for SequenceNameGenerator {
    fn candidate(&self) -> JobName {
        self.scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.candidate())
    }
}

/// Always proposes the same name.
#[derive(Debug, Clone)]
pub struct FixedNameGenerator(pub JobName);

impl NameGenerator for FixedNameGenerator {
    fn candidate(&self) -> JobName {
        self.0.clone()
    }
}

/// Script host that records log lines and notifications.
#[derive(Debug, Default)]
pub struct RecordingHost {
    name: String,
    logs: Mutex<Vec<(ScriptLogLevel, String)>>,
    notes: Mutex<Vec<(String, String)>>,
}

impl RecordingHost {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn logs(&self) -> Vec<(ScriptLogLevel, String)> {
        self.logs.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notes.lock().unwrap().clone()
    }
}

impl ScriptHost for RecordingHost {
    fn job_name(&self) -> &str {
        &self.name
    }

    fn notify(&self, message: &str, title: &str) {
        self.notes
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }

    fn log(&self, level: ScriptLogLevel, message: &str) {
        self.logs.lock().unwrap().push((level, message.to_string()));
    }
}
