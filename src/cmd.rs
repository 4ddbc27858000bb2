use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tracing::{debug, trace};

/// A builder for executing external tools with unified error handling
pub struct Cmd<'a> {
    command: &'a str,
    args: Vec<&'a str>,
    workdir: Option<&'a Path>,
    stdin: Option<&'a str>,
}

impl<'a> Cmd<'a> {
    /// Create a new command builder
    pub fn new(command: &'a str) -> Self {
        Self {
            command,
            args: Vec::new(),
            workdir: None,
            stdin: None,
        }
    }

    /// Add multiple arguments
    pub fn args(mut self, args: &[&'a str]) -> Self {
        self.args.extend_from_slice(args);
        self
    }

    /// Set the working directory for the command
    pub fn workdir(mut self, path: &'a Path) -> Self {
        self.workdir = Some(path);
        self
    }

    /// Feed the given text to the command's stdin
    pub fn stdin(mut self, input: &'a str) -> Self {
        self.stdin = Some(input);
        self
    }

    /// The full command line, for messages and logs
    pub fn display(&self) -> String {
        std::iter::once(self.command)
            .chain(self.args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(self.command);
        cmd.args(&self.args);
        if let Some(dir) = self.workdir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn output(&self) -> Result<Output> {
        let mut cmd = self.build();
        let Some(input) = self.stdin else {
            return cmd
                .output()
                .with_context(|| format!("Failed to execute command: {}", self.display()));
        };

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute command: {}", self.display()))?;

        // Dropping the handle closes the pipe so the child sees EOF
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input.as_bytes())
                .with_context(|| format!("Failed to write stdin of: {}", self.display()))?;
        }

        child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for command: {}", self.display()))
    }

    /// Execute the command and return the output
    /// Returns an error if the command fails (non-zero exit code)
    pub fn run(self) -> Result<Output> {
        let workdir_display = self.workdir.map(|p| p.display().to_string());
        trace!(command = self.command, args = ?self.args, workdir = ?workdir_display, "cmd:run start");

        let output = self.output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(
                command = self.command,
                args = ?self.args,
                status = ?output.status.code(),
                stderr = %stderr.trim(),
                "cmd:run failure"
            );
            return Err(anyhow!(
                "Command failed: {}\n{}",
                self.display(),
                stderr.trim()
            ));
        }
        trace!(command = self.command, "cmd:run success");
        Ok(output)
    }

    /// Execute the command and return stdout untrimmed
    pub fn run_and_capture_stdout(self) -> Result<String> {
        let output = self.run()?;
        Ok(String::from_utf8(output.stdout)?)
    }

    /// Execute the command with stdio attached to the terminal.
    /// Used for long-running tools whose own progress output should stay visible.
    pub fn run_interactive(self) -> Result<()> {
        debug!(command = %self.display(), "cmd:interactive start");
        let status = self
            .build()
            .status()
            .with_context(|| format!("Failed to execute command: {}", self.display()))?;

        if !status.success() {
            return Err(anyhow!(
                "Command failed with exit code {}: {}",
                status.code().unwrap_or(-1),
                self.display()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_command_and_args() {
        let cmd = Cmd::new("docker").args(&["exec", "srl"]).args(&["ls"]);
        assert_eq!(cmd.display(), "docker exec srl ls");
    }

    #[cfg(unix)]
    #[test]
    fn run_reports_stderr_on_failure() {
        let err = Cmd::new("sh")
            .args(&["-c", "echo boom >&2; exit 3"])
            .run()
            .unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Command failed: sh -c"));
        assert!(msg.contains("boom"));
    }

    #[cfg(unix)]
    #[test]
    fn stdin_is_forwarded() {
        let out = Cmd::new("cat")
            .stdin("hello\n")
            .run_and_capture_stdout()
            .unwrap();
        assert_eq!(out, "hello\n");
    }

    #[cfg(unix)]
    #[test]
    fn workdir_is_applied() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().canonicalize().unwrap();
        let out = Cmd::new("pwd").workdir(&dir).run_and_capture_stdout().unwrap();
        assert_eq!(out.trim(), dir.to_str().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn run_interactive_propagates_exit_code() {
        let err = Cmd::new("sh")
            .args(&["-c", "exit 4"])
            .run_interactive()
            .unwrap_err();
        assert!(err.to_string().contains("exit code 4"));
    }

    #[test]
    fn missing_binary_is_an_error() {
        assert!(Cmd::new("labdev-no-such-binary").run().is_err());
    }
}
