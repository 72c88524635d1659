//! Scenario file loader.
//!
//! Pipeline:
//! 1. Size check and UTF-8 BOM strip
//! 2. Environment variable expansion (on raw text)
//! 3. YAML/JSON parsing into a single scenario or a `scenarios:` list
//! 4. Limit checks
//! 5. Validation, collecting every issue

use std::path::Path;

use serde::Deserialize;

use scenarist_core::config::schema::ScenarioDefinition;
use scenarist_core::config::validation::Validator;

use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Limits guarding against oversized scenario files.
#[derive(Debug, Clone)]
pub struct LoaderLimits {
    /// Maximum scenarios per file.
    pub max_scenarios: usize,

    /// Maximum mocks across all scenarios in a file.
    pub max_mocks: usize,

    /// Maximum file size in bytes.
    pub max_config_size: usize,
}

impl Default for LoaderLimits {
    fn default() -> Self {
        Self {
            max_scenarios: env_or("SCENARIST_MAX_SCENARIOS", 500),
            max_mocks: env_or("SCENARIST_MAX_MOCKS", 10_000),
            max_config_size: env_or("SCENARIST_MAX_CONFIG_SIZE", 10 * 1024 * 1024),
        }
    }
}

/// Result of loading a scenario file.
#[derive(Debug)]
pub struct LoadResult {
    /// Validated scenario definitions, in file order.
    pub scenarios: Vec<ScenarioDefinition>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Non-fatal issue found while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Where the warning applies (field path or file).
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {location}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Multi-scenario file layout.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    scenarios: Vec<ScenarioDefinition>,
}

/// Loads scenario definitions from YAML or JSON files.
#[derive(Debug, Clone, Default)]
pub struct ScenarioLoader {
    limits: LoaderLimits,
}

impl ScenarioLoader {
    /// Creates a loader with the given limits.
    #[must_use]
    pub const fn new(limits: LoaderLimits) -> Self {
        Self { limits }
    }

    /// Creates a loader with limits read from the environment.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Loads and validates a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is missing, unreadable or over the size limit
    /// - A required environment variable is unset
    /// - Parsing fails
    /// - A limit is exceeded or validation finds an error
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;

        let file_size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if file_size > self.limits.max_config_size {
            return Err(ConfigError::InvalidValue {
                field: "file_size".to_string(),
                value: format!("{file_size} bytes"),
                expected: format!("at most {} bytes", self.limits.max_config_size),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        self.load_str(&content, path)
    }

    /// Loads and validates scenario definitions from a string.
    ///
    /// `path` is used only for error messages.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), minus file access.
    pub fn load_str(&self, content: &str, path: &Path) -> Result<LoadResult, ConfigError> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let mut warnings = Vec::new();
        let expanded = substitute_env(content, path, &mut warnings)?;

        let parse_error = |e: serde_yaml::Error| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        };

        let root: serde_yaml::Value = serde_yaml::from_str(&expanded).map_err(parse_error)?;
        let scenarios = match &root {
            serde_yaml::Value::Null => {
                return Err(ConfigError::ParseError {
                    path: path.to_path_buf(),
                    line: None,
                    message: "scenario file is empty".to_string(),
                });
            }
            serde_yaml::Value::Mapping(map) if map.contains_key("scenarios") => {
                serde_yaml::from_str::<ScenarioFile>(&expanded)
                    .map_err(parse_error)?
                    .scenarios
            }
            _ => vec![serde_yaml::from_str::<ScenarioDefinition>(&expanded).map_err(parse_error)?],
        };

        self.check_limits(&scenarios)?;

        let result = Validator::new().validate_all(&scenarios);
        if !result.is_valid() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: result.errors,
            });
        }
        warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
            message: issue.message,
            location: Some(issue.path),
        }));

        tracing::debug!(path = %path.display(), scenarios = scenarios.len(), "scenario file loaded");
        Ok(LoadResult {
            scenarios,
            warnings,
        })
    }

    fn check_limits(&self, scenarios: &[ScenarioDefinition]) -> Result<(), ConfigError> {
        if scenarios.len() > self.limits.max_scenarios {
            return Err(ConfigError::InvalidValue {
                field: "scenarios".to_string(),
                value: scenarios.len().to_string(),
                expected: format!("at most {} scenarios", self.limits.max_scenarios),
            });
        }
        let mocks: usize = scenarios.iter().map(|s| s.mocks.len()).sum();
        if mocks > self.limits.max_mocks {
            return Err(ConfigError::InvalidValue {
                field: "mocks".to_string(),
                value: mocks.to_string(),
                expected: format!("at most {} mocks", self.limits.max_mocks),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Environment Variable Substitution
// ============================================================================

/// Expands environment references in raw scenario text.
///
/// Supports:
/// - `${VAR}`: value, or empty string with a warning if unset
/// - `${VAR:-default}`: value, or `default` if unset
/// - `${VAR:?message}`: value, or an error if unset
/// - `$$`: literal `$`
fn substitute_env(
    raw: &str,
    source: &Path,
    warnings: &mut Vec<LoadWarning>,
) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(tail) = after.strip_prefix('$') {
            result.push('$');
            rest = tail;
        } else if let Some(spec_start) = after.strip_prefix('{')
            && let Some(end) = spec_start.find('}')
        {
            let spec = &spec_start[..end];
            rest = &spec_start[end + 1..];
            let (name, fallback) = match spec.split_once(':') {
                Some((name, tail)) => (name, Some(tail)),
                None => (spec, None),
            };
            if let Ok(value) = std::env::var(name) {
                result.push_str(&value);
            } else if let Some(default) = fallback.and_then(|f| f.strip_prefix('-')) {
                result.push_str(default);
            } else if let Some(message) = fallback.and_then(|f| f.strip_prefix('?')) {
                return Err(ConfigError::EnvVarNotSet {
                    var: name.to_string(),
                    location: message.to_string(),
                });
            } else {
                warnings.push(LoadWarning {
                    message: format!("environment variable '{name}' is not set, using empty string"),
                    location: Some(source.display().to_string()),
                });
            }
        } else {
            result.push('$');
            rest = after;
        }
    }
    result.push_str(rest);
    Ok(result)
}

/// Reads a numeric limit from the environment, falling back to `default`.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================
