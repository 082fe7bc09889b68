use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use medalstore::{PipelineConfig, load_config};

/// Environment variable naming a YAML configuration file.
pub const CONFIG_ENV: &str = "MEDALPOND_CONFIG";

/// Which persisted table to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TableChoice {
    /// Per-period results keyed by country and year
    Olympics,
    /// National attributes keyed by country
    Countries,
    /// Results joined with national attributes
    Denormalized,
}

impl TableChoice {
    #[must_use]
    pub fn path(self, config: &PipelineConfig) -> PathBuf {
        match self {
            Self::Olympics => config.fact_table_path(),
            Self::Countries => config.reference_table_path(),
            Self::Denormalized => config.denormalized_path(),
        }
    }
}

/// Resolve the pipeline configuration.
///
/// An explicit `--config` wins, then `MEDALPOND_CONFIG`, then the default
/// layout rooted at `root` (or the current directory).
pub fn resolve_config(config_path: Option<&Path>, root: Option<&Path>) -> Result<PipelineConfig> {
    let from_env = env::var_os(CONFIG_ENV).map(PathBuf::from);
    if let Some(path) = config_path.map(Path::to_path_buf).or(from_env) {
        return load_config(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }

    let root = match root {
        Some(root) => root.to_path_buf(),
        None => env::current_dir().context("Failed to determine current directory")?,
    };
    let config = PipelineConfig::rooted_at(root);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_layout() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let config = resolve_config(None, Some(tmp.path()))?;
        assert_eq!(config.output_dir, tmp.path().join("outputs"));
        assert_eq!(
            TableChoice::Denormalized.path(&config),
            tmp.path().join("outputs").join("olympics_denormalized.parquet")
        );
        Ok(())
    }

    #[test]
    fn test_explicit_config_file() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("pipeline.yaml");
        std::fs::write(&path, "output_dir: artifacts\n")?;

        let config = resolve_config(Some(&path), None)?;
        assert_eq!(config.output_dir, tmp.path().join("artifacts"));
        assert_eq!(
            TableChoice::Olympics.path(&config),
            tmp.path().join("artifacts/olympics.parquet")
        );
        Ok(())
    }

    #[test]
    fn test_missing_config_file() {
        let err = resolve_config(Some(Path::new("/nonexistent/medalpond.yaml")), None).unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }
}
