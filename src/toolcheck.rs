//! Advisory PATH probes for external tools.

use std::path::PathBuf;

use console::style;
use tracing::{info, warn};

/// Result of looking a tool up on PATH
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Present(PathBuf),
    Missing,
}

impl ToolStatus {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{tool} is not installed or not on PATH. Install it before running install-deps.")]
pub struct ToolMissing {
    pub tool: String,
}

/// Look `tool` up on PATH without running it.
pub fn probe(tool: &str) -> ToolStatus {
    match which::which(tool) {
        Ok(path) => ToolStatus::Present(path),
        Err(_) => ToolStatus::Missing,
    }
}

/// Probe for `tool`, returning its path or a [`ToolMissing`] error.
pub fn require(tool: &str) -> Result<PathBuf, ToolMissing> {
    match probe(tool) {
        ToolStatus::Present(path) => {
            info!(tool, path = %path.display(), "toolcheck:present");
            Ok(path)
        }
        ToolStatus::Missing => {
            warn!(tool, "toolcheck:missing");
            Err(ToolMissing {
                tool: tool.to_string(),
            })
        }
    }
}

/// Probe for `tool` and print a warning to stderr if it is not installed.
/// Never fails: the caller decides whether a missing tool matters.
pub fn check_available(tool: &str) -> ToolStatus {
    match require(tool) {
        Ok(path) => ToolStatus::Present(path),
        Err(err) => {
            eprintln!("{} {}", style("warning:").yellow().bold(), err);
            ToolStatus::Missing
        }
    }
}
