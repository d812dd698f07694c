// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{DEFAULT_COMMIT_EVERY, DEFAULT_QUEUE_CAPACITY};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Run options and named wiring for a pipeline.
///
/// Processors themselves are added in code; the file only says how big the
/// queues are, where processors may write, whether the run is traced, and
/// which ports connect to which.
///
/// # Example
/// ```yaml
/// queue_capacity: 64
/// work_dir: /var/tmp/conduit
/// trace:
///   path: run.trace
///   commit_every: 512
/// connections:
///   - from: source.out
///     to: mapper.in
///   - from: mapper.out
///     to: collector.in
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default)]
    pub trace: Option<TraceConfig>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            work_dir: None,
            trace: None,
            connections: Vec::new(),
        }
    }
}

/// Trace store settings. The store at `path` is created by the run and must
/// not exist yet.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceConfig {
    pub path: PathBuf,
    #[serde(default = "default_commit_every")]
    pub commit_every: usize,
}

impl TraceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            commit_every: DEFAULT_COMMIT_EVERY,
        }
    }
}

/// One `component.port -> component.port` connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    pub from: String,
    pub to: String,
}

/// A parsed `component.port` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub component: String,
    pub port: String,
}

impl Endpoint {
    /// Split at the last `.`; both halves must be non-empty.
    pub fn parse(endpoint: &str) -> Result<Self, ConfigError> {
        match endpoint.rsplit_once('.') {
            Some((component, port)) if !component.is_empty() && !port.is_empty() => Ok(Self {
                component: component.to_string(),
                port: port.to_string(),
            }),
            _ => Err(ConfigError::MalformedEndpoint {
                endpoint: endpoint.to_string(),
            }),
        }
    }
}

impl ConnectionConfig {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn endpoints(&self) -> Result<(Endpoint, Endpoint), ConfigError> {
        Ok((Endpoint::parse(&self.from)?, Endpoint::parse(&self.to)?))
    }
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_commit_every() -> usize {
    DEFAULT_COMMIT_EVERY
}

/// Load a config from a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let is_yaml = match format.as_deref() {
        Some("yaml") | Some("yml") => true,
        Some("toml") => false,
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        toml::from_str(&content)?
    };
    Ok(cfg)
}

/// Load a config and reject it if validation finds any problem.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_config(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_yaml_uses_defaults() {
        let cfg: PipelineConfig = serde_yaml::from_str("connections: []").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
queue_capacity: 8
work_dir: /tmp/conduit
trace:
  path: run.trace
connections:
  - from: source.out
    to: sink.in
"#;
        let cfg: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.queue_capacity, 8);
        assert_eq!(cfg.work_dir, Some(PathBuf::from("/tmp/conduit")));
        let trace = cfg.trace.unwrap();
        assert_eq!(trace.path, PathBuf::from("run.trace"));
        assert_eq!(trace.commit_every, DEFAULT_COMMIT_EVERY);
        assert_eq!(cfg.connections, vec![ConnectionConfig::new("source.out", "sink.in")]);
    }

    #[test]
    fn test_parse_toml() {
        let toml_src = r#"
queue_capacity = 4

[trace]
path = "run.trace"
commit_every = 16

[[connections]]
from = "source.out"
to = "sink.in"
"#;
        let cfg: PipelineConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.queue_capacity, 4);
        assert_eq!(cfg.trace.unwrap().commit_every, 16);
        assert_eq!(cfg.connections.len(), 1);
    }

    #[test]
    fn test_endpoint_parsing() {
        let endpoint = Endpoint::parse("stage.one.out").unwrap();
        assert_eq!(endpoint.component, "stage.one");
        assert_eq!(endpoint.port, "out");

        for bad in ["noport", ".out", "source.", ""] {
            assert!(
                matches!(Endpoint::parse(bad), Err(ConfigError::MalformedEndpoint { .. })),
                "accepted '{}'",
                bad
            );
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let result = load_config("pipeline.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_and_validate_reports_every_problem() {
        let yaml = r#"
queue_capacity: 0
trace:
  path: run.trace
  commit_every: 0
connections:
  - from: source
    to: sink.in
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, yaml).unwrap();

        match load_and_validate_config(&path) {
            Err(ConfigError::Invalid(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }
}
