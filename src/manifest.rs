//! Dependency manifest filtering.
//!
//! The manifest is the `name==version` listing produced by `pip list --format=freeze`
//! inside the lab container. Filtering comments out every package that is not on the
//! allow-list so that the host installs only what plugin development needs. Lines are
//! never removed or reordered.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

const COMMENT: char = '#';

/// Case-insensitive set of package name prefixes.
#[derive(Debug, Clone)]
pub struct AllowList {
    pattern: Option<Regex>,
}

impl AllowList {
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        let alternatives: Vec<String> = entries
            .iter()
            .map(|e| e.as_ref().trim())
            .filter(|e| !e.is_empty())
            .map(regex::escape)
            .collect();

        // An empty alternation would match every line
        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = RegexBuilder::new(&format!("^(?:{})", alternatives.join("|")))
            .case_insensitive(true)
            .build()
            .context("Failed to build allow-list pattern")?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn matches(&self, line: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(line))
    }
}

/// Counts of what a filter pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterSummary {
    /// Lines left active because they match the allow-list
    pub kept: usize,
    /// Lines that received a comment marker in this pass
    pub commented: usize,
    /// Blank lines and lines that were already comments
    pub untouched: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FilterOutcome {
    Filtered(FilterSummary),
    /// The manifest does not exist; nothing was written
    Missing,
}

/// Filter a single line (without its line terminator).
fn filter_line(line: &str, allow: &AllowList, summary: &mut FilterSummary) -> Option<String> {
    if line.trim().is_empty() || line.starts_with(COMMENT) {
        summary.untouched += 1;
        return None;
    }
    if allow.matches(line) {
        summary.kept += 1;
        return None;
    }
    summary.commented += 1;
    Some(format!("{COMMENT}{line}"))
}

/// Filter manifest text, preserving line terminators and line order.
pub fn filter_text(text: &str, allow: &AllowList) -> (String, FilterSummary) {
    let mut summary = FilterSummary::default();
    let mut out = String::with_capacity(text.len() + 64);

    for raw in text.split_inclusive('\n') {
        let body = raw.trim_end_matches(['\n', '\r']);
        let terminator = &raw[body.len()..];
        match filter_line(body, allow, &mut summary) {
            Some(rewritten) => out.push_str(&rewritten),
            None => out.push_str(body),
        }
        out.push_str(terminator);
    }

    (out, summary)
}

/// Rewrite the manifest at `path` in place.
///
/// A missing manifest is not an error: a warning is logged and nothing is written.
pub fn filter_file(path: &Path, allow: &AllowList) -> Result<FilterOutcome> {
    if !path.exists() {
        warn!(path = %path.display(), "manifest:missing, skipping filter");
        return Ok(FilterOutcome::Missing);
    }

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let (filtered, summary) = filter_text(&text, allow);

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    tmp.write_all(filtered.as_bytes())?;
    let permissions = fs::metadata(path)
        .with_context(|| format!("Failed to stat manifest {}", path.display()))?
        .permissions();
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace manifest {}", path.display()))?;

    debug!(
        path = %path.display(),
        kept = summary.kept,
        commented = summary.commented,
        untouched = summary.untouched,
        "manifest:filtered"
    );
    Ok(FilterOutcome::Filtered(summary))
}

/// Write freshly fetched manifest text to `path`, creating the parent directory.
pub fn write_manifest(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create staging directory {}", parent.display()))?;
    }
    fs::write(path, contents)
        .with_context(|| format!("Failed to write manifest {}", path.display()))
}
