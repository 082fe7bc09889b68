//! medalstore: incremental upsert of results and reference tables into Parquet
//!
//! Per-period results files and a national attributes file are normalized,
//! keyed by a token derived from the country name, merged last-write-wins
//! into persisted tables, and joined into a denormalized artifact.

pub mod assemble;
pub mod config;
mod error;
pub mod identity;
pub mod join;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod source;
pub mod store;
pub mod upsert;

pub use assemble::{
    ID_COLUMN, SOURCE_FILE_COLUMN, YEAR_COLUMN, assemble_fact_batch, build_reference_table,
    extract_period,
};
pub use config::{PipelineConfig, load_config};
pub use error::{Error, Result};
pub use identity::{derive_identity, normalize_name};
pub use join::{JoinSuffixes, left_join};
pub use normalize::{FrameRules, NumericSelector, parse_numeric};
pub use pipeline::{Pipeline, RunArtifacts, RunSummary};
pub use store::{MemoryStore, ParquetStore, TableStore};
pub use upsert::upsert;
