// src/job/mod.rs

//! Jobs: descriptors, scopes, runners, and discovery from disk.

pub mod descriptor;
pub mod loader;
pub mod prepare;
pub mod runner;
pub mod scope;
pub mod services;

pub use descriptor::JobDescriptor;
pub use loader::{CheckReport, DiscoveryError, JobLoader, job_name_for};
pub use prepare::{PrepareError, compile_source, prepare};
pub use runner::{CompletionSender, JobRunner, RunnerHandle};
pub use scope::{JOB_HANDLE_BINDING, JobScope, RESULT_BINDING};
pub use services::{HostServices, JobEnvironment, LogNotifier};
