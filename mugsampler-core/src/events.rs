use crate::progress::Level;
use std::sync::Arc;

/// Progress notifications emitted while sampling.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEvent {
    CycleStarted { cycle: usize },
    Visiting { level: Level, url: String },
    PhotoUploaded { url: String, key: String },
    CycleFinished { cycle: usize, collected: usize, target: usize },
}

/// Callback for reporting sampling progress
pub type EventCallback = Arc<dyn Fn(SampleEvent) + Send + Sync>;
