//! Configuration document and invocation options.
//!
//! Configuration sources (highest priority first):
//! 1. `--config <path>` or the OVERSEER_CONFIG environment variable
//! 2. `overseer.yaml` in the current directory or any parent
//!
//! Relative paths in the document resolve against the directory holding
//! it. Source locators may reference environment variables as `${VAR}` or
//! `$VAR`; they are substituted when an action runs, not at load time, so
//! a document can be validated without its environment.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::action::ActionSpec;
use crate::core::pipeline::PipelineSpec;

/// File name searched for when no explicit path is given
pub const CONFIG_FILE_NAME: &str = "overseer.yaml";

/// Parsed configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    #[serde(default = "default_version")]
    pub version: String,

    /// SQLite database file (relative to the document)
    #[serde(default)]
    pub database: Option<String>,

    /// Named actions
    #[serde(default)]
    pub actions: BTreeMap<String, ActionSpec>,

    /// Named pipelines
    #[serde(default)]
    pub pipelines: BTreeMap<String, PipelineSpec>,

    /// Directory relative locators resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_version() -> String {
    "1".to_string()
}

impl EtlConfig {
    /// Load a document from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        Ok(config)
    }

    /// Parse a document from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config YAML")
    }

    /// Resolve relative locators against `dir` instead of the document's
    /// own directory.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Check cross references before anything runs
    pub fn validate(&self) -> Result<()> {
        for (name, action) in &self.actions {
            if name.trim().is_empty() {
                anyhow::bail!("Action names cannot be empty");
            }
            if action.target.trim().is_empty() {
                anyhow::bail!("Action '{}' has an empty target table", name);
            }
            if self.pipelines.contains_key(name) {
                anyhow::bail!(
                    "'{}' is defined both as an action and as a pipeline",
                    name
                );
            }
            action
                .source
                .validate()
                .with_context(|| format!("Action '{}' has an invalid source", name))?;
        }

        for (name, pipeline) in &self.pipelines {
            if name.trim().is_empty() {
                anyhow::bail!("Pipeline names cannot be empty");
            }
            pipeline.validate(name, &self.actions)?;
        }

        Ok(())
    }

    /// Database path from the document, resolved against its directory
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database
            .as_deref()
            .map(|db| resolve_path(&self.base_dir, db))
    }

    /// Expand environment references in a locator and resolve it against
    /// the document's directory.
    pub fn resolve_locator(&self, raw: &str) -> std::result::Result<PathBuf, String> {
        let expanded = expand_env(raw)?;
        Ok(resolve_path(&self.base_dir, &expanded))
    }
}

/// Find the config file: explicit path first, then search upwards from
/// the current directory.
pub fn locate_config(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    find_config_file().with_context(|| {
        format!(
            "No config given and no {} found in the current directory or its parents",
            CONFIG_FILE_NAME
        )
    })
}

fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Some(candidate);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Resolve a path that may be relative to `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Substitute `${VAR}` and `$VAR` from the process environment.
///
/// `$$` yields a literal `$`. An unset variable is an error naming it.
pub fn expand_env(input: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let name = match chars.peek() {
            Some('$') => {
                chars.next();
                out.push('$');
                continue;
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(format!("unterminated '${{' in '{}'", input)),
                    }
                }
                name
            }
            Some(ch) if ch.is_ascii_alphabetic() || *ch == '_' => {
                let mut name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                name
            }
            _ => {
                out.push('$');
                continue;
            }
        };

        if name.is_empty() {
            return Err(format!("empty variable reference in '{}'", input));
        }

        let value = std::env::var(&name)
            .map_err(|_| format!("environment variable {} is not set", name))?;
        out.push_str(&value);
    }

    Ok(out)
}

/// One code or a list of codes, as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeList {
    One(u32),
    Many(Vec<u32>),
}

impl CodeList {
    pub fn to_set(&self) -> BTreeSet<u32> {
        match self {
            Self::One(code) => BTreeSet::from([*code]),
            Self::Many(codes) => codes.iter().copied().collect(),
        }
    }
}

/// Warning visibility options, configured per action or given per
/// invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WarningOptions {
    #[serde(default)]
    pub hide_sql_warnings: Option<bool>,

    #[serde(default)]
    pub hide_sql_warning_codes: Option<CodeList>,
}

impl WarningOptions {
    /// Configured codes as a set (empty when unset)
    pub fn codes(&self) -> BTreeSet<u32> {
        self.hide_sql_warning_codes
            .as_ref()
            .map(CodeList::to_set)
            .unwrap_or_default()
    }

    /// Parse `key=value` assignments from the command line.
    ///
    /// Values follow YAML scalar rules, so `hide_sql_warning_codes=1366`
    /// and `hide_sql_warning_codes=[1264,1366]` both work; a bare
    /// comma-separated list is accepted too.
    pub fn from_assignments<S: AsRef<str>>(assignments: &[S]) -> Result<Self> {
        let mut mapping = serde_yaml::Mapping::new();

        for assignment in assignments {
            let assignment = assignment.as_ref();
            let (key, raw) = assignment
                .split_once('=')
                .with_context(|| format!("Option '{}' is not of the form key=value", assignment))?;
            let key = key.trim();
            let mut raw = raw.trim().to_string();

            if key == "hide_sql_warning_codes" && raw.contains(',') && !raw.starts_with('[') {
                raw = format!("[{}]", raw);
            }

            let value: serde_yaml::Value = serde_yaml::from_str(&raw)
                .with_context(|| format!("Option '{}' has an unreadable value", key))?;
            mapping.insert(serde_yaml::Value::String(key.to_string()), value);
        }

        serde_yaml::from_value(serde_yaml::Value::Mapping(mapping))
            .context("Invalid local options")
    }
}
