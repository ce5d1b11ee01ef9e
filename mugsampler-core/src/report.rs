use crate::cycle::{RunOutcome, RunSummary};

const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n";

/// Generate a run report from a finished summary
pub fn generate_run_report(summary: &RunSummary) -> String {
    let mut report = String::new();
    report.push_str(DIVIDER);
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Run: {}\n", summary.run_id));
    report.push_str(&format!(
        "  Started: {}\n",
        summary.started_at.format("%Y-%m-%d %H:%M:%S")
    ));
    let elapsed = summary.finished_at - summary.started_at;
    report.push_str(&format!("  Elapsed: {}s\n", elapsed.num_seconds()));
    report.push_str(&format!("  Cycles: {}\n", summary.cycles.len()));
    report.push_str(&format!("  Photos collected: {}\n", summary.total_collected()));
    report.push_str(&format!("  Target per cycle: {}\n", summary.target));

    let outcome = match summary.outcome {
        RunOutcome::Satisfied => "\x1b[32msatisfied\x1b[0m".to_string(),
        RunOutcome::Exhausted(reason) => format!("\x1b[33mexhausted\x1b[0m ({})", reason.as_str()),
    };
    report.push_str(&format!("  Outcome: {}\n", outcome));

    report.push('\n');
    report.push_str(DIVIDER);

    if summary.cycles.is_empty() {
        return report;
    }

    report.push_str("## Cycles\n");
    for cycle in &summary.cycles {
        let count = if cycle.collected >= summary.target {
            format!("\x1b[32m{}\x1b[0m", cycle.collected)
        } else if cycle.collected == 0 {
            format!("\x1b[90m{}\x1b[0m", cycle.collected)
        } else {
            format!("{}", cycle.collected)
        };

        let mut line = format!(
            "  #{:<3} {} photos in {:.1}s",
            cycle.cycle,
            count,
            cycle.duration.as_secs_f64()
        );
        if let Some(ref error) = cycle.error {
            line.push_str(&format!(" \x1b[31m{}\x1b[0m", error));
        }
        report.push_str(&line);
        report.push('\n');
    }
    report.push('\n');

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::{CycleReport, ExhaustionReason};
    use chrono::Local;
    use std::time::Duration;

    fn summary(outcome: RunOutcome, cycles: Vec<CycleReport>) -> RunSummary {
        RunSummary {
            run_id: "0b7c1d2e".to_string(),
            target: 4,
            started_at: Local::now(),
            finished_at: Local::now(),
            outcome,
            cycles,
        }
    }

    #[test]
    fn test_report_lists_every_cycle() {
        let report = generate_run_report(&summary(
            RunOutcome::Satisfied,
            vec![
                CycleReport {
                    cycle: 1,
                    collected: 0,
                    duration: Duration::from_millis(1500),
                    error: Some("failed to load root".to_string()),
                },
                CycleReport {
                    cycle: 2,
                    collected: 5,
                    duration: Duration::from_secs(3),
                    error: None,
                },
            ],
        ));

        assert!(report.contains("Run: 0b7c1d2e"));
        assert!(report.contains("Cycles: 2"));
        assert!(report.contains("Photos collected: 5"));
        assert!(report.contains("satisfied"));
        assert!(report.contains("#1"));
        assert!(report.contains("failed to load root"));
        assert!(report.contains("#2"));
    }

    #[test]
    fn test_report_names_exhaustion_reason() {
        let report = generate_run_report(&summary(
            RunOutcome::Exhausted(ExhaustionReason::IdleCycles),
            Vec::new(),
        ));

        assert!(report.contains("exhausted"));
        assert!(report.contains(ExhaustionReason::IdleCycles.as_str()));
        assert!(!report.contains("## Cycles"));
    }
}
