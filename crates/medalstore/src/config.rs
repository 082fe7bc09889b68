//! Pipeline configuration
//!
//! Loaded from YAML. Fields left out take their defaults, which reproduce
//! the fixed layout:
//!
//! ```yaml
//! data_dir: datasets/olympics
//! reference_file: "datasets/countries/countries of the world.csv"
//! output_dir: outputs
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::join::JoinSuffixes;
use crate::normalize::FrameRules;
use crate::{Error, Result};

pub const FACT_TABLE_FILE: &str = "olympics.parquet";
pub const REFERENCE_TABLE_FILE: &str = "countries.parquet";
pub const DENORMALIZED_FILE: &str = "olympics_denormalized.parquet";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory of per-period results files.
    pub data_dir: PathBuf,
    /// National attributes file.
    pub reference_file: PathBuf,
    /// Where the three Parquet artifacts are written.
    pub output_dir: PathBuf,
    pub fact: FrameRules,
    pub reference: FrameRules,
    pub join_suffixes: JoinSuffixes,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("datasets").join("olympics"),
            reference_file: PathBuf::from("datasets")
                .join("countries")
                .join("countries of the world.csv"),
            output_dir: PathBuf::from("outputs"),
            fact: FrameRules::fact(),
            reference: FrameRules::reference(),
            join_suffixes: JoinSuffixes::default(),
        }
    }
}

impl PipelineConfig {
    /// Default layout rooted at `root`.
    pub fn rooted_at<P: AsRef<Path>>(root: P) -> Self {
        Self::default().resolve_relative_to(root)
    }

    /// Make relative paths relative to `base` instead of the working directory.
    #[must_use]
    pub fn resolve_relative_to<P: AsRef<Path>>(mut self, base: P) -> Self {
        let base = base.as_ref();
        for path in [&mut self.data_dir, &mut self.reference_file, &mut self.output_dir] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    pub fn fact_table_path(&self) -> PathBuf {
        self.output_dir.join(FACT_TABLE_FILE)
    }

    pub fn reference_table_path(&self) -> PathBuf {
        self.output_dir.join(REFERENCE_TABLE_FILE)
    }

    pub fn denormalized_path(&self) -> PathBuf {
        self.output_dir.join(DENORMALIZED_FILE)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("data_dir", &self.data_dir),
            ("reference_file", &self.reference_file),
            ("output_dir", &self.output_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(Error::Config(format!("{name} cannot be empty")));
            }
        }

        for (side, rules) in [("fact", &self.fact), ("reference", &self.reference)] {
            if rules.canonical.is_empty() {
                return Err(Error::Config(format!("{side}.canonical cannot be empty")));
            }
            if rules.aliases.is_empty() {
                return Err(Error::Config(format!("{side}.aliases needs at least one name")));
            }
        }

        if self.join_suffixes.fact == self.join_suffixes.reference {
            return Err(Error::Config("join_suffixes must differ".into()));
        }
        Ok(())
    }
}

/// Load configuration from a YAML file; relative paths resolve against the file's directory.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let config: PipelineConfig = serde_yaml_ng::from_str(&content)?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let config = config.resolve_relative_to(base);
    config.validate()?;
    Ok(config)
}
