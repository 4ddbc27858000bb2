//! Docker/Podman exec and copy helpers for the running lab container.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cmd::Cmd;
use crate::config::{Config, ContainerRuntime};

/// A named container reached through a container engine CLI.
#[derive(Debug, Clone)]
pub struct Container {
    runtime: ContainerRuntime,
    name: String,
}

/// Build `exec` arguments. `-i` keeps stdin open for commands that read from it.
fn exec_args<'a>(name: &'a str, interactive: bool, command: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec!["exec"];
    if interactive {
        args.push("-i");
    }
    args.push(name);
    args.extend_from_slice(command);
    args
}

impl Container {
    pub fn new(runtime: ContainerRuntime, name: impl Into<String>) -> Self {
        Self {
            runtime,
            name: name.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.runtime(), config.container())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run a command inside the container and return its stdout.
    pub fn exec_capture(&self, command: &[&str]) -> Result<String> {
        debug!(container = %self.name, command = ?command, "container:exec");
        Cmd::new(self.runtime.binary())
            .args(&exec_args(&self.name, false, command))
            .run_and_capture_stdout()
    }

    /// Run a command inside the container with `input` on its stdin.
    pub fn exec_with_stdin(&self, command: &[&str], input: &str) -> Result<String> {
        debug!(container = %self.name, command = ?command, "container:exec with stdin");
        Cmd::new(self.runtime.binary())
            .args(&exec_args(&self.name, true, command))
            .stdin(input)
            .run_and_capture_stdout()
    }

    pub fn read_file(&self, path: &str) -> Result<String> {
        self.exec_capture(&["cat", path])
            .with_context(|| format!("Failed to read {} in container {}", path, self.name))
    }

    /// Replace the contents of a file inside the container.
    pub fn write_file(&self, path: &str, contents: &str) -> Result<()> {
        // The path is passed as a positional parameter so it never needs quoting
        self.exec_with_stdin(&["sh", "-c", "cat > \"$1\"", "sh", path], contents)
            .with_context(|| format!("Failed to write {} in container {}", path, self.name))?;
        Ok(())
    }

    /// Copy `source` out of the container into the host directory `dest_dir`.
    pub fn copy_out(&self, source: &str, dest_dir: &Path) -> Result<()> {
        let from = format!("{}:{}", self.name, source);
        let to = dest_dir.to_string_lossy();
        debug!(from = %from, to = %to, "container:copy out");
        Cmd::new(self.runtime.binary())
            .args(&["cp", from.as_str(), &*to])
            .run()
            .with_context(|| format!("Failed to copy {} out of container {}", source, self.name))?;
        Ok(())
    }

    /// Start time as reported by the engine, RFC 3339.
    pub fn started_at(&self) -> Result<String> {
        Cmd::new(self.runtime.binary())
            .args(&["inspect", "-f", "{{.State.StartedAt}}", self.name.as_str()])
            .run_and_capture_stdout()
            .with_context(|| format!("Failed to inspect container {}", self.name))
    }

    /// Whether the container exists and is running.
    pub fn is_running(&self) -> bool {
        let output = Cmd::new(self.runtime.binary())
            .args(&["inspect", "-f", "{{.State.Running}}", self.name.as_str()])
            .run();
        match output {
            Ok(output) => String::from_utf8_lossy(&output.stdout).trim() == "true",
            Err(e) => {
                debug!(container = %self.name, error = %e, "container:inspect failed");
                false
            }
        }
    }
}
