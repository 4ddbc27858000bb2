//! Remote debugging of the vendor CLI inside the lab container.
//!
//! The procedure installs `debugpy` from the management namespace, opens the debug
//! port on the control-plane filter, patches the plugin loader so loaded plugin code
//! keeps its file name, and rewrites the CLI launch script to start under `debugpy`.
//! File contents are transformed locally; the container only serves reads and writes.

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use tracing::info;

use crate::config::Config;
use crate::container::Container;

/// Environment variable that makes the CLI block until a debugger attaches.
pub const WAIT_ENV: &str = "WAIT_FOR_DEBUG_CONN";

const LOADER_ORIGINAL: &str = "exec(source, globals(), globals())";
const LOADER_COMPILE: &str = r#"code_object = compile(source, self.path, "exec")"#;
const LOADER_EXEC: &str = "exec(code_object, globals(), globals())";
/// Single-line form written by earlier releases; still counts as patched.
const LOADER_PATCHED_INLINE: &str =
    r#"exec(compile(source, self.path, "exec"), globals(), globals())"#;

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("{path}: neither the original nor the patched plugin loader line was found")]
    LoaderLineNotFound { path: String },
    #[error("{path}: no line launches {interpreter}")]
    InterpreterNotFound { path: String, interpreter: String },
    #[error("invalid interpreter pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    AlreadyApplied,
}

/// Only the literal string `true` enables waiting.
pub fn wait_requested(value: Option<&str>) -> bool {
    value == Some("true")
}

fn wait_from_env() -> bool {
    wait_requested(std::env::var(WAIT_ENV).ok().as_deref())
}

/// Flat-config lines accepting inbound TCP to `port` on the control-plane filter.
pub fn firewall_rule(port: u16, entry: u32) -> String {
    let prefix = format!("set / acl acl-filter cpm type ipv4 entry {entry}");
    let mut rule = [
        format!("{prefix} description \"labdev remote debugging\""),
        format!("{prefix} match ipv4 protocol tcp"),
        format!("{prefix} match transport destination-port operator eq value {port}"),
        format!("{prefix} action accept"),
    ]
    .join("\n");
    rule.push('\n');
    rule
}

fn loader_is_patched(source: &str) -> bool {
    (source.contains(LOADER_COMPILE) && source.contains(LOADER_EXEC))
        || source.contains(LOADER_PATCHED_INLINE)
}

/// Replace the plugin loader's `exec` line so plugin code is compiled with its file path.
/// The call is split into a `compile` line and an `exec` line at the same indentation.
pub fn patch_plugin_loader(source: &str, path: &str) -> Result<(String, PatchOutcome), PatchError> {
    if loader_is_patched(source) {
        return Ok((source.to_string(), PatchOutcome::AlreadyApplied));
    }
    let re = Regex::new(&format!(
        r"(?m)^(?P<indent>[ \t]*){}",
        regex::escape(LOADER_ORIGINAL)
    ))?;
    if re.is_match(source) {
        let patched = re
            .replacen(source, 1, |caps: &Captures| {
                let indent = &caps["indent"];
                format!("{indent}{LOADER_COMPILE}\n{indent}{LOADER_EXEC}")
            })
            .into_owned();
        return Ok((patched, PatchOutcome::Applied));
    }
    if source.contains(LOADER_ORIGINAL) {
        return Ok((
            source.replacen(LOADER_ORIGINAL, LOADER_PATCHED_INLINE, 1),
            PatchOutcome::Applied,
        ));
    }
    Err(PatchError::LoaderLineNotFound {
        path: path.to_string(),
    })
}

pub fn debugger_flags(port: u16, wait: bool) -> String {
    let mut flags = format!("-m debugpy --listen 0.0.0.0:{port}");
    if wait {
        flags.push_str(" --wait-for-client");
    }
    flags
}

/// Insert debugger flags after the interpreter on the first non-comment line that
/// launches it. The interpreter must sit in command position: at the start of the
/// line or after whitespace, so assignments like `PY=<interpreter>` are skipped.
/// Flags from an earlier run are replaced.
pub fn inject_debugger(
    script: &str,
    path: &str,
    interpreter: &str,
    port: u16,
    wait: bool,
) -> Result<(String, PatchOutcome), PatchError> {
    let pattern = format!(
        r"(?m)^(?P<pre>(?:[^#\n]*?[ \t])?)(?P<interp>{})(?:[ \t]+-m debugpy --listen \S+(?:[ \t]+--wait-for-client)?)?(?P<post>[ \t\r\n]|$)",
        regex::escape(interpreter)
    );
    let re = Regex::new(&pattern)?;

    if !re.is_match(script) {
        return Err(PatchError::InterpreterNotFound {
            path: path.to_string(),
            interpreter: interpreter.to_string(),
        });
    }

    let flags = debugger_flags(port, wait);
    let patched = re
        .replacen(script, 1, |caps: &Captures| {
            format!("{}{} {}{}", &caps["pre"], &caps["interp"], flags, &caps["post"])
        })
        .into_owned();

    let outcome = if patched == script {
        PatchOutcome::AlreadyApplied
    } else {
        PatchOutcome::Applied
    };
    Ok((patched, outcome))
}

/// What the debug-enablement procedure did.
#[derive(Debug)]
pub struct DebugReport {
    pub port: u16,
    pub wait_for_client: bool,
    pub plugin_loader: PatchOutcome,
    pub launch_script: PatchOutcome,
}

fn install_agent(config: &Config, container: &Container) -> Result<()> {
    let python = config.container_python();
    container
        .exec_capture(&[
            "ip",
            "netns",
            "exec",
            config.debug.namespace(),
            python,
            "-m",
            "pip",
            "install",
            "debugpy",
        ])
        .context("Failed to install debugpy in the container")?;
    Ok(())
}

fn open_port(config: &Config, container: &Container) -> Result<()> {
    let rule = firewall_rule(config.debug.port(), config.debug.acl_entry());
    container
        .exec_with_stdin(&["sr_cli", "-ed", "--post", "commit save"], &rule)
        .context("Failed to push the debug port filter entry")?;
    Ok(())
}

fn patch_loader(config: &Config, container: &Container) -> Result<PatchOutcome> {
    let path = config.debug.plugin_loader();
    let source = container.read_file(&path)?;
    let (patched, outcome) = patch_plugin_loader(&source, &path)?;
    if outcome == PatchOutcome::Applied {
        container.write_file(&path, &patched)?;
    }
    Ok(outcome)
}

fn patch_launch_script(config: &Config, container: &Container, wait: bool) -> Result<PatchOutcome> {
    let path = config.debug.launch_script();
    let script = container.read_file(path)?;
    let (patched, outcome) = inject_debugger(
        &script,
        path,
        config.container_python(),
        config.debug.port(),
        wait,
    )?;
    if outcome == PatchOutcome::Applied {
        container.write_file(path, &patched)?;
    }
    Ok(outcome)
}

/// Run the whole debug-enablement procedure against the configured container.
/// `wait` forces `--wait-for-client`; otherwise the environment decides.
pub fn enable(config: &Config, container: &Container, wait: bool) -> Result<DebugReport> {
    let wait_for_client = wait || wait_from_env();
    info!(container = container.name(), port = config.debug.port(), wait_for_client, "debug:enable");

    install_agent(config, container)?;
    open_port(config, container)?;
    let plugin_loader = patch_loader(config, container)?;
    let launch_script = patch_launch_script(config, container, wait_for_client)?;

    info!(?plugin_loader, ?launch_script, "debug:enabled");
    Ok(DebugReport {
        port: config.debug.port(),
        wait_for_client,
        plugin_loader,
        launch_script,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PY: &str = "/opt/srlinux/python/virtual-env/bin/python";

    fn script() -> String {
        format!("#!/bin/bash\n# launches {PY}\nexport PYTHONPATH=/opt\nexec {PY} -m srlinux.mgmt.cli.main \"$@\"\n")
    }

    #[test]
    fn wait_requires_literal_true() {
        assert!(wait_requested(Some("true")));
        assert!(!wait_requested(Some("TRUE")));
        assert!(!wait_requested(Some("1")));
        assert!(!wait_requested(None));
    }

    #[test]
    fn firewall_rule_mentions_port() {
        let rule = firewall_rule(5678, 99);
        assert_eq!(rule.lines().count(), 4);
        assert!(rule.lines().all(|l| l.starts_with("set / acl acl-filter cpm type ipv4 entry 99 ")));
        assert!(rule.contains("destination-port operator eq value 5678"));
        assert!(rule.contains("match ipv4 protocol tcp"));
        assert!(rule.ends_with("action accept\n"));
    }

    #[test]
    fn loader_patch_applies_once() {
        let source = "        source = open(self.path).read()\n        exec(source, globals(), globals())\n";
        let (patched, outcome) = patch_plugin_loader(source, "loader.py").unwrap();
        assert_eq!(outcome, PatchOutcome::Applied);
        assert_eq!(
            patched,
            "        source = open(self.path).read()\n        code_object = compile(source, self.path, \"exec\")\n        exec(code_object, globals(), globals())\n"
        );

        let (again, outcome) = patch_plugin_loader(&patched, "loader.py").unwrap();
        assert_eq!(outcome, PatchOutcome::AlreadyApplied);
        assert_eq!(again, patched);
    }

    #[test]
    fn loader_in_two_line_compiled_form_is_already_patched() {
        let source = concat!(
            "    def load(self):\n",
            "        with open(self.path) as f:\n",
            "            source = f.read()\n",
            "        code_object = compile(source, self.path, \"exec\")\n",
            "        exec(code_object, globals(), globals())\n",
        );
        let (out, outcome) = patch_plugin_loader(source, "plugin_loader.py").unwrap();
        assert_eq!(outcome, PatchOutcome::AlreadyApplied);
        assert_eq!(out, source);
    }

    #[test]
    fn loader_in_inline_compiled_form_is_already_patched() {
        let source = "        exec(compile(source, self.path, \"exec\"), globals(), globals())\n";
        let (_, outcome) = patch_plugin_loader(source, "loader.py").unwrap();
        assert_eq!(outcome, PatchOutcome::AlreadyApplied);
    }

    #[test]
    fn loader_patch_rejects_unknown_source() {
        let err = patch_plugin_loader("print('hi')\n", "loader.py").unwrap_err();
        assert!(matches!(err, PatchError::LoaderLineNotFound { .. }));
        assert!(err.to_string().starts_with("loader.py:"));
    }

    #[test]
    fn launch_script_gets_flags_after_interpreter() {
        let (patched, outcome) = inject_debugger(&script(), "sr_cli", PY, 5678, false).unwrap();
        assert_eq!(outcome, PatchOutcome::Applied);
        assert!(patched.contains(&format!(
            "exec {PY} -m debugpy --listen 0.0.0.0:5678 -m srlinux.mgmt.cli.main \"$@\"\n"
        )));
        // Comment line mentioning the interpreter is left alone
        assert!(patched.contains(&format!("# launches {PY}\n")));
    }

    #[test]
    fn launch_script_wait_flag() {
        let (patched, _) = inject_debugger(&script(), "sr_cli", PY, 5678, true).unwrap();
        assert!(patched.contains("--listen 0.0.0.0:5678 --wait-for-client -m srlinux"));
    }

    #[test]
    fn launch_script_reapplication_converges() {
        let (once, _) = inject_debugger(&script(), "sr_cli", PY, 5678, true).unwrap();
        let (twice, outcome) = inject_debugger(&once, "sr_cli", PY, 5678, true).unwrap();
        assert_eq!(outcome, PatchOutcome::AlreadyApplied);
        assert_eq!(once, twice);

        let (toggled, outcome) = inject_debugger(&once, "sr_cli", PY, 5678, false).unwrap();
        assert_eq!(outcome, PatchOutcome::Applied);
        assert!(!toggled.contains("--wait-for-client"));
        assert_eq!(toggled.matches("-m debugpy").count(), 1);
    }

    #[test]
    fn launch_script_skips_interpreter_assignment() {
        let text = format!("#!/bin/bash\nPY={PY}\nexec $PY -m srlinux.mgmt.cli.main \"$@\"\n");
        let err = inject_debugger(&text, "sr_cli", PY, 5678, false).unwrap_err();
        assert!(matches!(err, PatchError::InterpreterNotFound { .. }));

        let text = format!("PY={PY}\nexport PYTHONPATH=/opt\nexec {PY} -m srlinux\n");
        let (patched, outcome) = inject_debugger(&text, "sr_cli", PY, 5678, false).unwrap();
        assert_eq!(outcome, PatchOutcome::Applied);
        assert_eq!(
            patched,
            format!("PY={PY}\nexport PYTHONPATH=/opt\nexec {PY} -m debugpy --listen 0.0.0.0:5678 -m srlinux\n")
        );
    }

    #[test]
    fn launch_script_interpreter_at_line_start() {
        let text = format!("{PY} -m srlinux\n");
        let (patched, _) = inject_debugger(&text, "sr_cli", PY, 5678, false).unwrap();
        assert_eq!(patched, format!("{PY} -m debugpy --listen 0.0.0.0:5678 -m srlinux\n"));
    }

    #[test]
    fn launch_script_interpreter_must_be_whole_token() {
        let text = format!("exec {PY}3 -m srlinux\n");
        let err = inject_debugger(&text, "sr_cli", PY, 5678, false).unwrap_err();
        assert!(matches!(err, PatchError::InterpreterNotFound { .. }));
    }

    #[test]
    fn launch_script_interpreter_at_end_of_file() {
        let text = format!("exec {PY}");
        let (patched, _) = inject_debugger(&text, "sr_cli", PY, 7000, false).unwrap();
        assert_eq!(patched, format!("exec {PY} -m debugpy --listen 0.0.0.0:7000"));
    }
}
