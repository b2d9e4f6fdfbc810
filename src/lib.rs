//! Breath Flux - Offline compute engine for pupillary and respiratory cognitive-load signals
//!
//! Breath Flux turns per-stage pupil-diameter and respiratory-rate recordings into
//! comparable signals and cognitive-load indicators through a deterministic
//! pipeline: record adaptation → resampling and outlier treatment → activity
//! indices and behavioral metrics → cross-candidate grand averages → report
//! encoding.
//!
//! ## Modules
//!
//! - **Signal conditioning**: [`normalizer`], [`resample`], [`smoothing`]
//! - **Activity indices**: [`wavelet`], [`activity`] (IPA, LHIPA, RIPA)
//! - **Aggregation**: [`metrics`], [`aggregate`]
//! - **Orchestration**: [`adapter`], [`pipeline`], [`encoder`], [`ffi`]

pub mod activity;
pub mod adapter;
pub mod aggregate;
pub mod config;
pub mod encoder;
pub mod error;
pub mod metrics;
pub mod normalizer;
pub mod pipeline;
pub mod resample;
pub mod smoothing;
pub mod types;
pub mod wavelet;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use activity::ActivityAnalyzer;
pub use adapter::{BreathActivityAdapter, RecordAdapter};
pub use aggregate::{Aggregation, Aggregator, GrandAverage, ScalarGrandAverage};
pub use config::PipelineConfig;
pub use error::ComputeError;
pub use pipeline::{analyze_batch, analyze_records_json, AnalysisProcessor, AnalysisReport};

/// Version embedded in all encoded reports
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for encoded reports
pub const PRODUCER_NAME: &str = "breath-flux";
