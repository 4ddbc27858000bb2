//! Bootstrap steps and the fixed `setup` sequence.

use std::fmt;

use anyhow::Result;
use clap::ValueEnum;
use console::style;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::container::Container;
use crate::manifest::FilterOutcome;
use crate::{deps, lab, spinner, toolcheck};

/// One named bootstrap step.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CheckTools,
    Deploy,
    Destroy,
    FetchDeps,
    FilterDeps,
    InstallDeps,
    FetchCli,
}

/// Order in which `setup` runs the steps.
pub const SETUP_SEQUENCE: [Step; 6] = [
    Step::CheckTools,
    Step::Deploy,
    Step::FetchDeps,
    Step::FilterDeps,
    Step::InstallDeps,
    Step::FetchCli,
];

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Self::CheckTools => "check-tools",
            Self::Deploy => "deploy",
            Self::Destroy => "destroy",
            Self::FetchDeps => "fetch-deps",
            Self::FilterDeps => "filter-deps",
            Self::InstallDeps => "install-deps",
            Self::FetchCli => "fetch-cli",
        }
    }

    /// Advisory steps report problems but never stop a sequence.
    pub fn is_advisory(self) -> bool {
        matches!(self, Self::CheckTools)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned (as error context) when a sequence stops on a failing step.
#[derive(Debug, thiserror::Error)]
#[error("step '{step}' failed after {completed} completed step(s)")]
pub struct StepFailed {
    pub step: Step,
    pub completed: usize,
}

#[derive(Debug)]
pub enum StepOutcome {
    Succeeded,
    /// An advisory step hit an error; the sequence went on
    Warned(anyhow::Error),
    Failed(anyhow::Error),
}

#[derive(Debug)]
pub struct StepReport {
    pub step: Step,
    pub outcome: StepOutcome,
}

/// Ordered results of a sequence run. Steps after a failure are absent.
#[derive(Debug, Default)]
pub struct SequenceReport {
    pub steps: Vec<StepReport>,
}

impl SequenceReport {
    pub fn completed(&self) -> usize {
        self.steps
            .iter()
            .filter(|r| !matches!(r.outcome, StepOutcome::Failed(_)))
            .count()
    }

    pub fn failed_step(&self) -> Option<Step> {
        self.steps.iter().find_map(|r| match r.outcome {
            StepOutcome::Failed(_) => Some(r.step),
            _ => None,
        })
    }

    /// Collapse the report into a result, keeping the failing step's error chain.
    pub fn into_result(self) -> Result<()> {
        let completed = self.completed();
        for report in self.steps {
            if let StepOutcome::Failed(err) = report.outcome {
                return Err(err.context(StepFailed {
                    step: report.step,
                    completed,
                }));
            }
        }
        Ok(())
    }
}

/// Run `steps` in order through `exec`, stopping at the first non-advisory failure.
pub fn run_sequence<F>(steps: &[Step], mut exec: F) -> SequenceReport
where
    F: FnMut(Step) -> Result<()>,
{
    let mut report = SequenceReport::default();
    for &step in steps {
        info!(step = step.name(), "pipeline:step start");
        let outcome = match exec(step) {
            Ok(()) => StepOutcome::Succeeded,
            Err(err) if step.is_advisory() => {
                warn!(step = step.name(), error = %err, "pipeline:advisory step failed");
                StepOutcome::Warned(err)
            }
            Err(err) => {
                error!(step = step.name(), error = %err, "pipeline:step failed");
                StepOutcome::Failed(err)
            }
        };
        let stop = matches!(outcome, StepOutcome::Failed(_));
        report.steps.push(StepReport { step, outcome });
        if stop {
            break;
        }
    }
    report
}

fn announce(step: Step) {
    println!("{} {}", style("==>").cyan().bold(), style(step.name()).bold());
}

/// Execute a single step against the configured lab.
pub fn execute(step: Step, config: &Config, container: &Container) -> Result<()> {
    match step {
        Step::CheckTools => {
            toolcheck::require(config.installer())?;
            Ok(())
        }
        Step::Deploy => {
            announce(step);
            lab::deploy(config)
        }
        Step::Destroy => {
            announce(step);
            lab::destroy(config)
        }
        Step::FetchDeps => {
            let path = spinner::with_spinner("Fetching dependency manifest", || {
                deps::fetch_manifest(config, container)
            })?;
            println!("  manifest written to {}", path.display());
            Ok(())
        }
        Step::FilterDeps => {
            match deps::filter_manifest(config)? {
                FilterOutcome::Filtered(summary) => println!(
                    "{} manifest filtered: {} kept, {} commented out",
                    style("✔").green(),
                    summary.kept,
                    summary.commented
                ),
                FilterOutcome::Missing => eprintln!(
                    "{} no manifest at {}, nothing to filter",
                    style("warning:").yellow().bold(),
                    config.manifest_path().display()
                ),
            }
            Ok(())
        }
        Step::InstallDeps => {
            announce(step);
            deps::install(config)
        }
        Step::FetchCli => {
            let path = spinner::with_spinner("Copying vendor CLI package", || {
                deps::fetch_vendor_package(config, container)
            })?;
            println!("  vendor package copied to {}", path.display());
            Ok(())
        }
    }
}

/// Run `steps` against the configured lab, then print advisory warnings and where
/// the sequence stopped.
pub fn run_steps(steps: &[Step], config: &Config, container: &Container) -> Result<()> {
    let report = run_sequence(steps, |step| execute(step, config, container));
    for r in &report.steps {
        if let StepOutcome::Warned(err) = &r.outcome {
            eprintln!("{} {}: {:#}", style("warning:").yellow().bold(), r.step, err);
        }
    }
    if let Some(step) = report.failed_step() {
        eprintln!(
            "{} stopped at '{}' ({} of {} steps completed)",
            style("✘").red(),
            step,
            report.completed(),
            steps.len()
        );
    }
    report.into_result()
}

/// The `setup` umbrella: every bootstrap step in order, halting on the first failure.
pub fn run_setup(config: &Config, container: &Container) -> Result<()> {
    run_steps(&SETUP_SEQUENCE, config, container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn setup_order_is_fixed() {
        let mut seen = Vec::new();
        let report = run_sequence(&SETUP_SEQUENCE, |step| {
            seen.push(step);
            Ok(())
        });
        assert_eq!(
            seen,
            vec![
                Step::CheckTools,
                Step::Deploy,
                Step::FetchDeps,
                Step::FilterDeps,
                Step::InstallDeps,
                Step::FetchCli
            ]
        );
        assert_eq!(report.completed(), 6);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn sequence_stops_at_first_failure() {
        let mut seen = Vec::new();
        let report = run_sequence(&SETUP_SEQUENCE, |step| {
            seen.push(step);
            if step == Step::FetchDeps {
                Err(anyhow!("container unreachable"))
            } else {
                Ok(())
            }
        });
        assert_eq!(seen.last(), Some(&Step::FetchDeps));
        assert_eq!(seen.len(), 3);
        assert_eq!(report.failed_step(), Some(Step::FetchDeps));
        assert_eq!(report.completed(), 2);

        let err = report.into_result().unwrap_err();
        let failed = err.downcast_ref::<StepFailed>().unwrap();
        assert_eq!(failed.step, Step::FetchDeps);
        assert_eq!(failed.completed, 2);
        assert!(format!("{err:#}").contains("container unreachable"));
    }

    #[test]
    fn advisory_failure_does_not_stop_sequence() {
        let report = run_sequence(&SETUP_SEQUENCE, |step| {
            if step == Step::CheckTools {
                Err(anyhow!("uv missing"))
            } else {
                Ok(())
            }
        });
        assert_eq!(report.steps.len(), SETUP_SEQUENCE.len());
        assert!(matches!(report.steps[0].outcome, StepOutcome::Warned(_)));
        assert!(report.failed_step().is_none());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn missing_installer_warns_and_setup_continues() {
        let config = Config {
            installer: Some("labdev-surely-not-installed".to_string()),
            ..Config::default()
        };
        let container = Container::from_config(&config);

        let mut later = Vec::new();
        let report = run_sequence(&SETUP_SEQUENCE, |step| match step {
            Step::CheckTools => execute(step, &config, &container),
            other => {
                later.push(other);
                Ok(())
            }
        });

        match &report.steps[0].outcome {
            StepOutcome::Warned(err) => {
                assert!(err.downcast_ref::<toolcheck::ToolMissing>().is_some());
            }
            other => panic!("expected a warning, got {other:?}"),
        }
        assert_eq!(later.len(), SETUP_SEQUENCE.len() - 1);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn step_names_match_cli_values() {
        for step in Step::value_variants() {
            let parsed = Step::from_str(step.name(), false).unwrap();
            assert_eq!(parsed, *step);
        }
    }

    #[test]
    fn setup_excludes_destroy() {
        assert!(!SETUP_SEQUENCE.contains(&Step::Destroy));
    }
}
