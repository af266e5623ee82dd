//! Explicit, inspectable set of experiments.
//!
//! Built-ins are registered in code; additional experiments come from plugin units:
//! YAML/JSON files in a plugin directory, each declaring one or more experiments of a
//! kind the [`PluginFactory`] knows how to build. A unit that fails to load is logged,
//! recorded in [`ExperimentRegistry::load_errors`] and skipped; the remaining units still load.

use crate::errors::ConfigError;
use crate::metrics_api::{Experiment, ExperimentKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Unit file names starting with these are never loaded.
pub const EXCLUDED_PREFIXES: &[&str] = &["_", "private", "template"];

const UNIT_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginUnit {
    pub experiments: Vec<PluginExperimentSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginExperimentSpec {
    pub kind: String,
    pub name: String,
    /// Kind-specific options, validated by the factory.
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// Turns a declared plugin experiment into an instance.
pub trait PluginFactory: Send + Sync {
    fn kinds(&self) -> Vec<&'static str>;

    /// `unit_dir` is the directory holding the unit, for resolving relative paths.
    fn build(&self, spec: &PluginExperimentSpec, unit_dir: &Path) -> anyhow::Result<Experiment>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("failed to load plugin unit {}: {}", .path.display(), .message)]
pub struct PluginLoadError {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentInfo {
    pub name: String,
    pub kind: ExperimentKind,
}

#[derive(Debug, Clone, Default)]
pub struct ExperimentRegistry {
    experiments: Vec<Experiment>,
    load_errors: Vec<PluginLoadError>,
}

impl ExperimentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an experiment unless one with the same name is registered. Returns whether it was added.
    pub fn register(&mut self, experiment: Experiment) -> bool {
        if self.get(experiment.name()).is_some() {
            tracing::warn!(
                experiment = experiment.name(),
                "duplicate experiment name; keeping the first registration"
            );
            return false;
        }
        self.experiments.push(experiment);
        true
    }

    pub fn extend(&mut self, experiments: impl IntoIterator<Item = Experiment>) {
        for e in experiments {
            self.register(e);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Experiment> {
        self.experiments.iter().find(|e| e.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.experiments.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn experiments(&self) -> &[Experiment] {
        &self.experiments
    }

    pub fn infos(&self) -> Vec<ExperimentInfo> {
        self.experiments
            .iter()
            .map(|e| ExperimentInfo {
                name: e.name().to_string(),
                kind: e.kind(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    pub fn load_errors(&self) -> &[PluginLoadError] {
        &self.load_errors
    }

    /// Loads every plugin unit in `dir` (file-name order). Returns how many experiments were added.
    pub fn discover(&mut self, dir: &Path, factory: &dyn PluginFactory) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "plugin directory not readable; no plugins loaded");
                return 0;
            }
        };

        let mut units: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_plugin_unit(p))
            .collect();
        units.sort();

        let mut added = 0;
        for path in units {
            match load_unit(&path, factory) {
                Ok(experiments) => {
                    for e in experiments {
                        if self.register(e) {
                            added += 1;
                        }
                    }
                }
                Err(e) => {
                    let err = PluginLoadError {
                        path: path.clone(),
                        message: format!("{:#}", e),
                    };
                    tracing::error!(unit = %path.display(), error = %err.message, "plugin unit failed to load");
                    self.load_errors.push(err);
                }
            }
        }
        tracing::info!(dir = %dir.display(), added, "plugin discovery complete");
        added
    }

    /// Applies an allow-list. Empty selects everything; any name not registered is fatal.
    pub fn select(&self, allow_list: &[String]) -> Result<ExperimentRegistry, ConfigError> {
        let wanted: Vec<&str> = allow_list
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if wanted.is_empty() {
            return Ok(self.clone());
        }

        let unknown: Vec<String> = wanted
            .iter()
            .filter(|name| self.get(name).is_none())
            .map(|s| s.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownExperiment {
                unknown,
                available: self.names(),
            });
        }

        Ok(ExperimentRegistry {
            experiments: self
                .experiments
                .iter()
                .filter(|e| wanted.contains(&e.name()))
                .cloned()
                .collect(),
            load_errors: self.load_errors.clone(),
        })
    }
}

/// Splits a comma-separated allow-list as given on the command line.
pub fn parse_allow_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_plugin_unit(path: &Path) -> bool {
    let Some(stem) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if EXCLUDED_PREFIXES.iter().any(|p| stem.starts_with(p)) {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| UNIT_EXTENSIONS.contains(&ext))
}

fn load_unit(path: &Path, factory: &dyn PluginFactory) -> anyhow::Result<Vec<Experiment>> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_yaml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("invalid plugin YAML/JSON: {}", e))?;
    let unit: PluginUnit = serde_json::from_value(value)
        .map_err(|e| anyhow::anyhow!("invalid plugin unit: {}", e))?;
    if unit.experiments.is_empty() {
        anyhow::bail!("plugin unit declares no experiments");
    }

    let unit_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut out = Vec::with_capacity(unit.experiments.len());
    for spec in &unit.experiments {
        if !factory.kinds().contains(&spec.kind.as_str()) {
            anyhow::bail!(
                "experiment '{}' has unknown kind '{}' (known: {})",
                spec.name,
                spec.kind,
                factory.kinds().join(", ")
            );
        }
        let experiment = factory
            .build(spec, unit_dir)
            .map_err(|e| e.context(format!("building experiment '{}'", spec.name)))?;
        out.push(experiment);
    }
    Ok(out)
}
