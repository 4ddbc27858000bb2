//! Host-side Python environment steps: fetch the container's package list, filter it,
//! install it, and copy the vendor CLI package out for editor support.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cmd::Cmd;
use crate::config::Config;
use crate::container::Container;
use crate::manifest::{self, AllowList, FilterOutcome};

/// Arguments that list installed packages in `name==version` form.
fn freeze_command(python: &str) -> [&str; 5] {
    [python, "-m", "pip", "list", "--format=freeze"]
}

/// Write the container's installed package list to the manifest, overwriting it.
/// On failure the existing manifest is left as it was.
pub fn fetch_manifest(config: &Config, container: &Container) -> Result<PathBuf> {
    let path = config.manifest_path();
    let staging = config.staging_dir();
    fs::create_dir_all(&staging)
        .with_context(|| format!("Failed to create staging directory {}", staging.display()))?;

    let listing = container
        .exec_capture(&freeze_command(config.container_python()))
        .with_context(|| format!("Failed to list packages in container {}", container.name()))?;

    manifest::write_manifest(&path, &listing)?;
    info!(path = %path.display(), lines = listing.lines().count(), "deps:manifest fetched");
    Ok(path)
}

/// Comment out every manifest line not covered by the allow-list.
pub fn filter_manifest(config: &Config) -> Result<FilterOutcome> {
    let allow = AllowList::new(&config.allow_list())?;
    manifest::filter_file(&config.manifest_path(), &allow)
}

/// Install the active manifest entries into the host environment.
pub fn install(config: &Config) -> Result<()> {
    let path = config.manifest_path();
    let path_str = path.to_string_lossy();
    info!(installer = config.installer(), path = %path_str, "deps:install");

    let mut cmd = Cmd::new(config.installer()).args(&["pip", "install", "-r", &*path_str]);
    if !config.base_dir.as_os_str().is_empty() {
        cmd = cmd.workdir(&config.base_dir);
    }
    cmd.run_interactive()
        .with_context(|| format!("Failed to install dependencies from {}", path.display()))
}

fn remove_existing(path: &Path) -> Result<()> {
    if path.is_dir() {
        debug!(path = %path.display(), "deps:removing previous vendor package");
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    } else if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Copy the vendor CLI package out of the container, replacing any earlier copy.
pub fn fetch_vendor_package(config: &Config, container: &Container) -> Result<PathBuf> {
    let dest = config.vendor_package_dest();
    fs::create_dir_all(&dest)
        .with_context(|| format!("Failed to create {}", dest.display()))?;

    let local = config.vendor_package_local();
    remove_existing(&local)?;

    container.copy_out(&config.vendor_package_path(), &dest)?;
    info!(path = %local.display(), "deps:vendor package fetched");
    Ok(local)
}
