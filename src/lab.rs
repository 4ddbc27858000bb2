//! containerlab topology lifecycle.

use anyhow::{Context, Result};
use tracing::info;

use crate::cmd::Cmd;
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabAction {
    Deploy,
    Destroy,
}

impl LabAction {
    fn args(self) -> &'static [&'static str] {
        match self {
            Self::Deploy => &["deploy", "--reconfigure"],
            Self::Destroy => &["destroy", "--cleanup"],
        }
    }
}

/// Program and arguments for a containerlab invocation.
fn command_line(config: &Config, action: LabAction) -> Vec<&str> {
    let mut line = Vec::new();
    if config.use_sudo() {
        line.push("sudo");
    }
    line.push("containerlab");
    line.extend_from_slice(action.args());
    line.extend_from_slice(&["-t", config.topology()]);
    line
}

/// Run containerlab with its output attached to the terminal.
pub fn run(config: &Config, action: LabAction) -> Result<()> {
    let line = command_line(config, action);
    let (program, args) = line
        .split_first()
        .context("containerlab command line is empty")?;
    info!(action = ?action, topology = config.topology(), "lab:run");

    let mut cmd = Cmd::new(program).args(args);
    if !config.base_dir.as_os_str().is_empty() {
        cmd = cmd.workdir(&config.base_dir);
    }
    cmd.run_interactive()
        .with_context(|| format!("containerlab {:?} failed", action))
}

pub fn deploy(config: &Config) -> Result<()> {
    run(config, LabAction::Deploy)
}

pub fn destroy(config: &Config) -> Result<()> {
    run(config, LabAction::Destroy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_uses_sudo_by_default() {
        let config = Config::default();
        assert_eq!(
            command_line(&config, LabAction::Deploy),
            vec![
                "sudo",
                "containerlab",
                "deploy",
                "--reconfigure",
                "-t",
                "srl.clab.yml"
            ]
        );
    }

    #[test]
    fn destroy_without_sudo() {
        let config = Config {
            sudo: Some(false),
            topology: Some("lab/dev.clab.yml".to_string()),
            ..Config::default()
        };
        assert_eq!(
            command_line(&config, LabAction::Destroy),
            vec!["containerlab", "destroy", "--cleanup", "-t", "lab/dev.clab.yml"]
        );
    }
}
