pub mod collector;
pub mod config;
pub mod cycle;
pub mod data;
pub mod error;
pub mod events;
pub mod progress;
pub mod report;
pub mod sampler;
pub mod walker;

pub use collector::{CollectResult, PhotoCollector};
pub use config::{CycleLimits, SamplingConfig, SiteLayout};
pub use cycle::{CycleController, CycleReport, ExhaustionReason, RunOutcome, RunSummary};
pub use data::SqliteState;
pub use error::{PersistenceError, SampleError};
pub use events::{EventCallback, SampleEvent};
pub use progress::{
    JsonStateFiles, Level, ProgressState, ProgressStore, SampledPhotoSet, StateBackend,
};
pub use sampler::RandomSampler;
pub use walker::{Flow, RunYield, TreeWalker};
