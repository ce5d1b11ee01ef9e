use crate::config::{CycleLimits, SamplingConfig};
use crate::error::{PersistenceError, SampleError};
use crate::events::{EventCallback, SampleEvent};
use crate::walker::{RunYield, TreeWalker};
use chrono::{DateTime, Local};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Why a run stopped before any cycle reached its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionReason {
    CycleLimit,
    IdleCycles,
    TimeLimit,
}

impl ExhaustionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExhaustionReason::CycleLimit => "cycle limit reached",
            ExhaustionReason::IdleCycles => "no new photos in consecutive cycles",
            ExhaustionReason::TimeLimit => "time limit reached",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Satisfied,
    Exhausted(ExhaustionReason),
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: usize,
    pub collected: usize,
    pub duration: Duration,
    /// Set when the cycle was abandoned at the root listing.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub target: usize,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub outcome: RunOutcome,
    pub cycles: Vec<CycleReport>,
}

impl RunSummary {
    pub fn total_collected(&self) -> usize {
        self.cycles.iter().map(|c| c.collected).sum()
    }

    pub fn best_cycle(&self) -> Option<&CycleReport> {
        self.cycles.iter().max_by_key(|c| c.collected)
    }
}

/// The first guard that forbids starting another cycle, if any. The time
/// limit is only consulted once at least one cycle has run.
fn check_limits(
    limits: &CycleLimits,
    cycles: &[CycleReport],
    elapsed: Duration,
) -> Option<ExhaustionReason> {
    if let Some(max) = limits.max_cycles
        && cycles.len() >= max
    {
        return Some(ExhaustionReason::CycleLimit);
    }

    if let Some(max_idle) = limits.max_idle_cycles {
        let idle = cycles.iter().rev().take_while(|c| c.collected == 0).count();
        if max_idle > 0 && idle >= max_idle {
            return Some(ExhaustionReason::IdleCycles);
        }
    }

    if let Some(max_duration) = limits.max_duration
        && !cycles.is_empty()
        && elapsed >= max_duration
    {
        return Some(ExhaustionReason::TimeLimit);
    }

    None
}

/// Repeats full traversals until one cycle collects at least the configured
/// minimum, or a guard in `CycleLimits` fires.
pub struct CycleController {
    walker: TreeWalker,
    limits: CycleLimits,
    event_callback: Option<EventCallback>,
}

impl CycleController {
    pub fn new(walker: TreeWalker, limits: CycleLimits) -> Self {
        Self {
            walker,
            limits,
            event_callback: None,
        }
    }

    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.walker.set_event_callback(callback.clone());
        self.event_callback = Some(callback);
        self
    }

    pub fn walker(&self) -> &TreeWalker {
        &self.walker
    }

    fn notify(&self, event: SampleEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }

    /// Run cycles until one meets `cfg.min_photos_per_cycle`. Only a
    /// persistence failure aborts the run.
    pub async fn run_until_satisfied(
        &mut self,
        cfg: &SamplingConfig,
    ) -> Result<RunSummary, PersistenceError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Local::now();
        let started = Instant::now();
        let target = cfg.min_photos_per_cycle;
        let mut cycles: Vec<CycleReport> = Vec::new();

        info!(run_id = %run_id, target, "Starting sampling run");

        let outcome = loop {
            if let Some(reason) = check_limits(&self.limits, &cycles, started.elapsed()) {
                warn!(
                    cycles = cycles.len(),
                    "Giving up before reaching {} photos: {}",
                    target,
                    reason.as_str()
                );
                break RunOutcome::Exhausted(reason);
            }

            let cycle = cycles.len() + 1;
            info!("Starting a new scraping cycle ({})...", cycle);
            self.notify(SampleEvent::CycleStarted { cycle });

            let cycle_started = Instant::now();
            let mut run = RunYield::new(target);
            let error = match self.walker.walk_states(cfg, &mut run).await {
                Ok(_) => None,
                Err(SampleError::Persistence(e)) => {
                    error!(error = %e, "Cannot persist sampling state, aborting run");
                    return Err(e);
                }
                Err(e) => {
                    error!(error = %e, "Error during scraping cycle");
                    Some(e.to_string())
                }
            };

            let collected = run.collected();
            info!("Total new photos scraped this cycle: {}", collected);
            self.notify(SampleEvent::CycleFinished {
                cycle,
                collected,
                target,
            });
            cycles.push(CycleReport {
                cycle,
                collected,
                duration: cycle_started.elapsed(),
                error,
            });

            if collected >= target {
                info!("Reached the target of {} photos. Exiting cycle.", target);
                break RunOutcome::Satisfied;
            }
            info!("Reached fewer than {} photos. Retrying...", target);
        };

        Ok(RunSummary {
            run_id,
            target,
            started_at,
            finished_at: Local::now(),
            outcome,
            cycles,
        })
    }
}
