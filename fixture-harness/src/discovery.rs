//! Fixture discovery and precondition checks

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::HarnessConfig;
use crate::HarnessError;

/// A paired input/reference fixture, identified by the input file stem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Stable fixture name
    pub name: String,
    /// Path of the stdin input file
    pub input_path: PathBuf,
    /// Path of the expected stdout file
    pub reference_path: PathBuf,
}

/// Fixture contents read from disk by a worker
#[derive(Debug, Clone)]
pub struct LoadedFixture {
    pub input: String,
    pub reference: String,
}

impl Fixture {
    /// Read both files of the fixture
    pub async fn load(&self) -> Result<LoadedFixture, HarnessError> {
        let input = tokio::fs::read_to_string(&self.input_path).await.map_err(|e| {
            HarnessError::Discovery(format!(
                "Error reading fixture {}: {}",
                self.input_path.display(),
                e
            ))
        })?;

        let reference = tokio::fs::read_to_string(&self.reference_path).await.map_err(|e| {
            HarnessError::Discovery(format!(
                "Error reading reference output {}: {}",
                self.reference_path.display(),
                e
            ))
        })?;

        Ok(LoadedFixture { input, reference })
    }
}

/// Enumerates fixtures in a directory and checks that each one is complete
pub struct CorpusLoader {
    directory: PathBuf,
    input_suffix: String,
    output_suffix: String,
}

impl CorpusLoader {
    pub fn new(
        directory: impl Into<PathBuf>,
        input_suffix: impl Into<String>,
        output_suffix: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            input_suffix: input_suffix.into(),
            output_suffix: output_suffix.into(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(&config.fixtures, &config.input_suffix, &config.output_suffix)
    }

    /// Discover all fixtures, sorted by input file name.
    ///
    /// Fails when the directory is missing, holds no inputs, or any input lacks
    /// its reference output. In the last case every missing reference is listed.
    pub fn load(&self) -> Result<Vec<Fixture>, HarnessError> {
        if !self.directory.is_dir() {
            return Err(HarnessError::Discovery(format!(
                "Fixture directory {} not found.",
                self.directory.display()
            )));
        }

        let mut inputs: Vec<PathBuf> = WalkDir::new(&self.directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable directory entry: {}", e);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| self.is_input(path))
            .collect();

        inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        if inputs.is_empty() {
            return Err(HarnessError::Discovery(format!(
                "No fixture inputs (*.{}) found in {}",
                self.input_suffix,
                self.directory.display()
            )));
        }

        let fixtures: Vec<Fixture> = inputs
            .into_iter()
            .map(|input_path| {
                let name = input_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let reference_path = input_path.with_extension(&self.output_suffix);
                Fixture { name, input_path, reference_path }
            })
            .collect();

        let missing: Vec<PathBuf> = fixtures
            .iter()
            .filter(|f| !f.reference_path.exists())
            .map(|f| f.reference_path.clone())
            .collect();

        if !missing.is_empty() {
            return Err(HarnessError::MissingReferences(missing));
        }

        log::debug!("Discovered {} fixtures in {}", fixtures.len(), self.directory.display());

        Ok(fixtures)
    }

    fn is_input(&self, path: &Path) -> bool {
        path.extension().and_then(|ext| ext.to_str()).map(|ext| ext == self.input_suffix).unwrap_or(false)
    }
}
