//! `validate` command.
//!
//! Loads every file, registers its scenarios into a scratch manager so
//! URL patterns and regexes are compiled too, and reports every issue
//! before deciding the exit status. Scenario ids must be unique across
//! all files given on one command line.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::loader::ScenarioLoader;
use crate::error::{ConfigError, ScenarioError, ScenaristError};
use crate::scenarios::ScenarioManager;

/// Validation outcome for one file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    /// File that was checked.
    pub file: PathBuf,
    /// Ids of the scenarios that registered cleanly.
    pub scenarios: Vec<String>,
    /// Error-level findings.
    pub errors: Vec<String>,
    /// Warning-level findings.
    pub warnings: Vec<String>,
}

impl FileReport {
    /// Returns `true` if the file passes, counting warnings when `strict`.
    #[must_use]
    pub fn passed(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.warnings.is_empty())
    }
}

/// Validate scenario files without serving them.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationFailed`] if any file has errors (or
/// warnings, with `--strict`).
pub fn run(args: &ValidateArgs) -> Result<(), ScenaristError> {
    let reports = check_files(&args.files);

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                print_human(report, args.strict);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    let count = reports.iter().filter(|r| !r.passed(args.strict)).count();
    if count > 0 {
        return Err(ConfigError::ValidationFailed { count }.into());
    }
    Ok(())
}

/// Checks each file in order against one shared scratch manager.
#[must_use]
pub fn check_files(files: &[PathBuf]) -> Vec<FileReport> {
    let loader = ScenarioLoader::with_defaults();
    let manager = ScenarioManager::in_memory();
    files
        .iter()
        .map(|path| check_file(&loader, &manager, path))
        .collect()
}

fn check_file(loader: &ScenarioLoader, manager: &ScenarioManager, path: &Path) -> FileReport {
    tracing::info!(file = %path.display(), "validating scenario file");
    let mut report = FileReport {
        file: path.to_path_buf(),
        scenarios: Vec::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let loaded = match loader.load(path) {
        Ok(loaded) => loaded,
        Err(ConfigError::ValidationError { errors, .. }) => {
            report.errors = errors.iter().map(ToString::to_string).collect();
            return report;
        }
        Err(e) => {
            report.errors.push(e.to_string());
            return report;
        }
    };
    report.warnings = loaded.warnings.iter().map(ToString::to_string).collect();

    for definition in loaded.scenarios {
        let id = definition.id.clone();
        match manager.register_scenario(definition) {
            Ok(_) => report.scenarios.push(id),
            Err(ScenarioError::Invalid { issues, .. }) => report
                .errors
                .extend(issues.iter().map(|issue| format!("scenario '{id}': {issue}"))),
            Err(e) => report.errors.push(e.to_string()),
        }
    }
    report
}

fn print_human(report: &FileReport, strict: bool) {
    let file = report.file.display();
    if report.passed(strict) {
        println!("✓ {file} ({} scenario(s))", report.scenarios.len());
    } else {
        println!("✗ {file}");
    }
    for error in &report.errors {
        println!("    {error}");
    }
    for warning in &report.warnings {
        println!("    warning: {warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(content: &str) -> NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    const VALID: &str = r"
id: default
name: Default
mocks:
  - method: GET
    url: /api/user
    response:
      body: {tier: standard}
";

    #[test]
    fn test_valid_file_passes() {
        let f = file(VALID);
        let reports = check_files(&[f.path().to_path_buf()]);
        assert!(reports[0].passed(true), "{:?}", reports[0]);
        assert_eq!(reports[0].scenarios, vec!["default"]);
    }

    #[test]
    fn test_all_errors_reported() {
        let f = file(
            r"
id: broken
name: Broken
mocks:
  - method: GET
    url: /a
    sequence: {responses: []}
  - method: GET
    url: /b
    stateResponse:
      default: {status: 200}
      conditions:
        - when: {}
          then: {status: 201}
",
        );
        let reports = check_files(&[f.path().to_path_buf()]);
        assert!(!reports[0].passed(false));
        assert!(reports[0].errors.len() >= 2, "{:?}", reports[0].errors);
    }

    #[test]
    fn test_bad_url_pattern_caught_at_compile() {
        let f = file(
            r"
id: broken
name: Broken
mocks:
  - method: GET
    url: /users/:
",
        );
        let reports = check_files(&[f.path().to_path_buf()]);
        assert_eq!(reports[0].errors.len(), 1);
        assert!(reports[0].errors[0].contains("mocks[0].url"));
    }

    #[test]
    fn test_duplicate_across_files() {
        let a = file(VALID);
        let b = file(&VALID.replace("standard", "premium"));
        let reports = check_files(&[a.path().to_path_buf(), b.path().to_path_buf()]);
        assert!(reports[0].passed(false));
        assert!(reports[1].errors[0].contains("already registered"));
    }

    #[test]
    fn test_missing_file_reported() {
        let reports = check_files(&[PathBuf::from("/nonexistent/scenarios.yaml")]);
        assert!(reports[0].errors[0].contains("file not found"));
    }

    #[test]
    fn test_run_fails_with_count() {
        let f = file("id: x\nname: x\nmocks: [{method: GET, url: '/users/:'}]\n");
        let args = ValidateArgs {
            files: vec![f.path().to_path_buf()],
            format: OutputFormat::Json,
            strict: false,
        };
        let err = run(&args).unwrap_err();
        assert!(matches!(
            err,
            ScenaristError::Config(ConfigError::ValidationFailed { count: 1 })
        ));
    }
}
