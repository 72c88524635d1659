//! `list` command.

use std::path::PathBuf;

use serde::Serialize;

use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::loader::ScenarioLoader;
use crate::error::ScenaristError;

/// One row of `list` output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub mock_count: usize,
    pub file: PathBuf,
}

/// List the scenarios defined in scenario files.
///
/// # Errors
///
/// Returns a config error for the first file that fails to load.
pub fn run(args: &ListArgs) -> Result<(), ScenaristError> {
    let summaries = collect(&args.files)?;

    match args.format {
        OutputFormat::Human => {
            let width = summaries.iter().map(|s| s.id.len()).max().unwrap_or(0);
            for s in &summaries {
                println!("{:<width$}  {} ({} mock(s))", s.id, s.name, s.mock_count);
                if !s.description.is_empty() {
                    println!("{:<width$}  {}", "", s.description);
                }
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
    }
    Ok(())
}

/// Loads every file and summarizes its scenarios, sorted by id.
///
/// # Errors
///
/// Returns a config error for the first file that fails to load.
pub fn collect(files: &[PathBuf]) -> Result<Vec<ScenarioSummary>, ScenaristError> {
    let loader = ScenarioLoader::with_defaults();
    let mut summaries = Vec::new();
    for path in files {
        let loaded = loader.load(path)?;
        summaries.extend(loaded.scenarios.into_iter().map(|s| ScenarioSummary {
            mock_count: s.mocks.len(),
            id: s.id,
            name: s.name,
            description: s.description,
            file: path.clone(),
        }));
    }
    summaries.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(summaries)
}
