use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_NAMES: [&str; 2] = [".labdev.yaml", ".labdev.yml"];

/// Package name prefixes kept active in the manifest when no `allow_list` is configured.
/// These are the packages the vendor CLI plugins import at runtime.
pub const DEFAULT_ALLOW_LIST: &[&str] = &[
    "jinja2",
    "markupsafe",
    "mypy",
    "pydantic",
    "pyyaml",
    "prompt-toolkit",
    "prompt_toolkit",
    "wcwidth",
    "grpcio",
    "protobuf",
    "python-dateutil",
    "typing-extensions",
    "typing_extensions",
];

const DEFAULT_PYTHON: &str = "/opt/srlinux/python/virtual-env/bin/python";
const DEFAULT_SITE_PACKAGES: &str = "/opt/srlinux/python/virtual-env/lib/python3.11/dist-packages";

/// Container engine used for exec and copy operations
#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    #[default]
    Docker,
    Podman,
}

impl ContainerRuntime {
    pub fn binary(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

/// Settings for the debug-enablement procedure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct DebugConfig {
    /// TCP port the debug agent listens on. Default: 5678
    pub port: Option<u16>,

    /// Management network namespace the debug agent is installed from. Default: srbase-mgmt
    pub namespace: Option<String>,

    /// Absolute path of the vendor plugin loader inside the container
    pub plugin_loader: Option<String>,

    /// Absolute path of the vendor CLI launch script inside the container
    pub launch_script: Option<String>,

    /// Control-plane filter entry id used for the debug port. Default: 99
    pub acl_entry: Option<u32>,
}

impl DebugConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(5678)
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("srbase-mgmt")
    }

    pub fn plugin_loader(&self) -> String {
        self.plugin_loader.clone().unwrap_or_else(|| {
            format!("{DEFAULT_SITE_PACKAGES}/srlinux/mgmt/cli/plugin_loader.py")
        })
    }

    pub fn launch_script(&self) -> &str {
        self.launch_script.as_deref().unwrap_or("/opt/srlinux/bin/sr_cli")
    }

    pub fn acl_entry(&self) -> u32 {
        self.acl_entry.unwrap_or(99)
    }
}

/// Configuration for labdev, read from .labdev.yaml
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// containerlab topology file. Default: srl.clab.yml
    #[serde(default)]
    pub topology: Option<String>,

    /// Run containerlab through sudo. Default: true
    #[serde(default)]
    pub sudo: Option<bool>,

    /// Name of the running lab container. Default: srl
    #[serde(default)]
    pub container: Option<String>,

    /// Container engine for exec/cp. Default: docker
    #[serde(default)]
    pub runtime: Option<ContainerRuntime>,

    /// Local staging directory for fetched artifacts. Default: private
    #[serde(default)]
    pub staging_dir: Option<String>,

    /// Manifest file name inside the staging directory. Default: requirements.txt
    #[serde(default)]
    pub manifest: Option<String>,

    /// Interpreter the vendor CLI runs under inside the container
    #[serde(default)]
    pub container_python: Option<String>,

    /// Package name prefixes that stay active after filtering
    #[serde(default)]
    pub allow_list: Option<Vec<String>>,

    /// Python package installer used on the host. Default: uv
    #[serde(default)]
    pub installer: Option<String>,

    /// Directory copied out of the container as the vendor CLI package
    #[serde(default)]
    pub vendor_package_path: Option<String>,

    /// Local directory receiving the vendor CLI package. Default: private
    #[serde(default)]
    pub vendor_package_dest: Option<String>,

    #[serde(default)]
    pub debug: DebugConfig,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Result of config discovery
#[derive(Debug, Clone)]
pub struct ConfigLocation {
    /// Absolute path to the config file
    pub config_path: PathBuf,
    /// Absolute path to the directory containing the config
    pub config_dir: PathBuf,
}

/// Find the nearest .labdev.yaml by walking up from start_dir to the filesystem root.
pub fn find_project_config(start_dir: &Path) -> Option<ConfigLocation> {
    let mut dir = start_dir
        .canonicalize()
        .unwrap_or_else(|_| start_dir.to_path_buf());

    loop {
        for name in &CONFIG_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "config:found project config");
                return Some(ConfigLocation {
                    config_path: candidate,
                    config_dir: dir,
                });
            }
        }
        if !dir.pop() {
            return None;
        }
    }
}

impl Config {
    /// Load the project configuration, falling back to defaults rooted at the current directory.
    pub fn load() -> anyhow::Result<(Self, Option<ConfigLocation>)> {
        let cwd = std::env::current_dir()?;
        Self::load_from_dir(&cwd)
    }

    /// Discover and load configuration starting at `start_dir`.
    pub fn load_from_dir(start_dir: &Path) -> anyhow::Result<(Self, Option<ConfigLocation>)> {
        debug!(start = %start_dir.display(), "config:loading");
        let Some(location) = find_project_config(start_dir) else {
            let config = Self {
                base_dir: start_dir.to_path_buf(),
                ..Self::default()
            };
            return Ok((config, None));
        };

        let mut config = Self::load_from_path(&location.config_path)?;
        config.base_dir = location.config_dir.clone();
        debug!(
            container = config.container(),
            topology = config.topology(),
            "config:loaded"
        );
        Ok((config, Some(location)))
    }

    fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        debug!(path = %path.display(), "config:reading file");
        let contents = fs::read_to_string(path)?;
        // An empty file is a valid "all defaults" config
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config at {}: {}", path.display(), e))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn topology(&self) -> &str {
        self.topology.as_deref().unwrap_or("srl.clab.yml")
    }

    pub fn use_sudo(&self) -> bool {
        self.sudo.unwrap_or(true)
    }

    pub fn container(&self) -> &str {
        self.container.as_deref().unwrap_or("srl")
    }

    pub fn runtime(&self) -> ContainerRuntime {
        self.runtime.unwrap_or_default()
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.resolve(self.staging_dir.as_deref().unwrap_or("private"))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.staging_dir()
            .join(self.manifest.as_deref().unwrap_or("requirements.txt"))
    }

    pub fn container_python(&self) -> &str {
        self.container_python.as_deref().unwrap_or(DEFAULT_PYTHON)
    }

    pub fn allow_list(&self) -> Vec<String> {
        match &self.allow_list {
            Some(list) => list.clone(),
            None => DEFAULT_ALLOW_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn installer(&self) -> &str {
        self.installer.as_deref().unwrap_or("uv")
    }

    pub fn vendor_package_path(&self) -> String {
        self.vendor_package_path
            .clone()
            .unwrap_or_else(|| format!("{DEFAULT_SITE_PACKAGES}/srlinux"))
    }

    pub fn vendor_package_dest(&self) -> PathBuf {
        self.resolve(self.vendor_package_dest.as_deref().unwrap_or("private"))
    }

    /// Local path the vendor package lands at after copying
    pub fn vendor_package_local(&self) -> PathBuf {
        let path = self.vendor_package_path();
        let name = Path::new(&path)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "package".into());
        self.vendor_package_dest().join(name)
    }
}
