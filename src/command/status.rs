use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use pathdiff::diff_paths;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Padding, Style, object::Columns},
};

use crate::config::{Config, ConfigLocation};
use crate::container::Container;
use crate::{logger, toolcheck, uptime};

#[derive(Tabled, Serialize)]
struct StatusRow {
    #[tabled(rename = "ITEM")]
    item: &'static str,
    #[tabled(rename = "VALUE")]
    value: String,
    #[tabled(rename = "STATE")]
    state: &'static str,
}

fn row(item: &'static str, value: String, state: &'static str) -> StatusRow {
    StatusRow { item, value, state }
}

fn mark(ok: bool) -> &'static str {
    if ok { "✓" } else { "-" }
}

/// Show a path relative to the current directory when it lives below it.
fn display_path(path: &Path, cwd: &Path) -> String {
    match diff_paths(path, cwd) {
        Some(rel) if !rel.starts_with("..") => {
            let s = rel.display().to_string();
            if s.is_empty() { ".".to_string() } else { s }
        }
        _ => path.display().to_string(),
    }
}

fn collect_rows(
    config: &Config,
    location: Option<&ConfigLocation>,
    container_running: bool,
    uptime: String,
    installer_present: bool,
    cwd: &Path,
) -> Vec<StatusRow> {
    let config_file = location
        .map(|loc| display_path(&loc.config_path, cwd))
        .unwrap_or_else(|| "(defaults)".to_string());
    let manifest = config.manifest_path();
    let vendor = config.vendor_package_local();

    vec![
        row("config", config_file, mark(location.is_some())),
        row("topology", config.topology().to_string(), ""),
        row(
            "container",
            format!("{} ({})", config.container(), config.runtime().binary()),
            mark(container_running),
        ),
        row("uptime", uptime, ""),
        row(
            "installer",
            config.installer().to_string(),
            mark(installer_present),
        ),
        row("manifest", display_path(&manifest, cwd), mark(manifest.is_file())),
        row("vendor package", display_path(&vendor, cwd), mark(vendor.is_dir())),
        row("debug port", config.debug.port().to_string(), ""),
    ]
}

pub fn run(
    config: &Config,
    location: Option<&ConfigLocation>,
    container: &Container,
    json: bool,
) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let running = container.is_running();
    let boot = if running {
        uptime::last_booted(container)
    } else {
        None
    };
    let rows = collect_rows(
        config,
        location,
        running,
        uptime::describe(boot, Utc::now()),
        toolcheck::probe(config.installer()).is_present(),
        &cwd,
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = Table::new(rows);
    table
        .with(Style::blank())
        .modify(Columns::new(0..3), Padding::new(0, 1, 0, 0));
    println!("{table}");

    if let Ok(log_path) = logger::determine_log_path() {
        println!("\nlog: {}", log_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn display_path_prefers_relative() {
        let cwd = PathBuf::from("/work/lab");
        assert_eq!(
            display_path(Path::new("/work/lab/private/requirements.txt"), &cwd),
            "private/requirements.txt"
        );
        assert_eq!(display_path(Path::new("/etc/labdev"), &cwd), "/etc/labdev");
    }

    #[test]
    fn rows_reflect_artifacts() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            base_dir: temp.path().to_path_buf(),
            ..Config::default()
        };
        fs::create_dir_all(config.staging_dir()).unwrap();
        fs::write(config.manifest_path(), "jinja2==3.1.2\n").unwrap();

        let rows = collect_rows(
            &config,
            None,
            false,
            uptime::UNKNOWN.to_string(),
            true,
            temp.path(),
        );
        let get = |name: &str| rows.iter().find(|r| r.item == name).unwrap();

        assert_eq!(get("config").value, "(defaults)");
        assert_eq!(get("manifest").state, "✓");
        assert_eq!(get("manifest").value, "private/requirements.txt");
        assert_eq!(get("vendor package").state, "-");
        assert_eq!(get("container").value, "srl (docker)");
        assert_eq!(get("container").state, "-");
        assert_eq!(get("installer").state, "✓");
        assert_eq!(get("uptime").value, "<Unknown>");
    }

    #[test]
    fn rows_serialize_as_json_objects() {
        let rows = vec![row("debug port", "5678".to_string(), "")];
        let json: serde_json::Value = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[0]["item"], "debug port");
        assert_eq!(json[0]["value"], "5678");
    }
}
