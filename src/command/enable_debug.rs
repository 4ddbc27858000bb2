use anyhow::Result;
use console::style;

use crate::config::Config;
use crate::container::Container;
use crate::debug::{self, PatchOutcome};

fn describe(outcome: PatchOutcome) -> &'static str {
    match outcome {
        PatchOutcome::Applied => "patched",
        PatchOutcome::AlreadyApplied => "already patched",
    }
}

pub fn run(config: &Config, container: &Container, wait: bool) -> Result<()> {
    let report = debug::enable(config, container, wait)?;

    println!(
        "{} remote debugging enabled in {}",
        style("✔").green(),
        style(container.name()).bold()
    );
    println!("  plugin loader: {}", describe(report.plugin_loader));
    println!("  launch script: {}", describe(report.launch_script));
    println!("  attach to port {}", report.port);
    if report.wait_for_client {
        println!(
            "  {}",
            style("the CLI waits for a debugger before starting").dim()
        );
    }
    Ok(())
}
