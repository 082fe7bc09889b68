//! One full run: reference upsert, fact upsert, denormalization
//!
//! A run either completes or fails as a whole. There is no rollback:
//! artifacts written by earlier steps stay on disk when a later step fails.

use arrow_array::RecordBatch;
use diagnostics::*;

use crate::Result;
use crate::assemble::{ID_COLUMN, YEAR_COLUMN, assemble_fact_batch, build_reference_table};
use crate::config::PipelineConfig;
use crate::join::left_join;
use crate::source::discover_csv_files;
use crate::store::{ParquetStore, TableStore};
use crate::upsert::upsert;

/// Row counts of the three artifacts after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub countries: usize,
    pub olympics: usize,
    pub denormalized: usize,
}

/// Tables produced by a run, as persisted.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub countries: RecordBatch,
    pub olympics: RecordBatch,
    pub denormalized: RecordBatch,
}

impl RunArtifacts {
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            countries: self.countries.num_rows(),
            olympics: self.olympics.num_rows(),
            denormalized: self.denormalized.num_rows(),
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    countries: Box<dyn TableStore>,
    olympics: Box<dyn TableStore>,
    denormalized: Box<dyn TableStore>,
}

impl Pipeline {
    /// A pipeline persisting to Parquet files under `config.output_dir`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let countries = Box::new(ParquetStore::new(config.reference_table_path()));
        let olympics = Box::new(ParquetStore::new(config.fact_table_path()));
        let denormalized = Box::new(ParquetStore::new(config.denormalized_path()));
        Self::with_stores(config, countries, olympics, denormalized)
    }

    /// A pipeline persisting to caller-supplied stores.
    #[must_use]
    pub fn with_stores(
        config: PipelineConfig,
        countries: Box<dyn TableStore>,
        olympics: Box<dyn TableStore>,
        denormalized: Box<dyn TableStore>,
    ) -> Self {
        Self {
            config,
            countries,
            olympics,
            denormalized,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every step in order. The first failing step aborts the run.
    pub fn run(&self) -> Result<RunArtifacts> {
        let config = &self.config;

        info!("reading reference table");
        let reference = build_reference_table(&config.reference_file, &config.reference)?;
        let countries = upsert(self.countries.as_ref(), &reference, &[ID_COLUMN])?;
        let count = countries.num_rows();
        info!("wrote {count} country rows", count: count);

        info!("reading results files");
        let files = discover_csv_files(&config.data_dir)?;
        let batch = assemble_fact_batch(&files, &config.fact)?;
        let olympics = upsert(self.olympics.as_ref(), &batch, &[ID_COLUMN, YEAR_COLUMN])?;
        let count = olympics.num_rows();
        info!("wrote {count} olympics rows", count: count);

        info!("creating denormalized artifact");
        let denormalized = left_join(&olympics, &countries, ID_COLUMN, &config.join_suffixes)?;
        let location = self.denormalized.describe();
        if denormalized.num_columns() == 0 {
            warn!("no fact data, skipping {location}", location: location);
        } else {
            self.denormalized.save(&denormalized)?;
        }
        let count = denormalized.num_rows();
        info!("wrote denormalized {location} ({count} rows)", location: location, count: count);

        Ok(RunArtifacts {
            countries,
            olympics,
            denormalized,
        })
    }
}
