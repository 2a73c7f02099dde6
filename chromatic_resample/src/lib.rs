//! # Chromatic Resample
//!
//! A deterministic Rust engine that resamples sparse, per-sample color
//! measurements (CIELAB or any other named channel layout) onto a shared time
//! grid. Each channel of each sample is interpolated independently and
//! extrapolated past the observed range by extending the boundary piece of
//! the fitted polynomial.
//!
//! ## Quick Start
//!
//! ```rust
//! use chromatic_resample::{Measurement, ResampleEngine, ResampleOptions, TargetGrid};
//!
//! let records = vec![
//!     Measurement::new("A", 0.0, [("L", 10.0), ("a", 8.9), ("b", -10.9)]),
//!     Measurement::new("A", 30.0, [("L", 20.0), ("a", 8.4), ("b", -7.6)]),
//! ];
//! let grid = TargetGrid::new(vec![0.0, 15.0, 30.0, 60.0]).unwrap();
//!
//! let report = ResampleEngine::new(ResampleOptions::default())
//!     .run(&records, &grid)
//!     .unwrap();
//!
//! for row in report.table.iter() {
//!     println!("{} @ {}h: {:?}", row.sample_id, row.time, row.channel_values);
//! }
//! ```
//!
//! ## Core Modules
//!
//! - [`grouping`] - Partition records into per-sample series
//! - [`resampler`] - Per-channel fit and evaluation
//! - [`assembler`] - Rounding and output table assembly
//! - [`engine`] - Whole runs with failure policy and optional parallelism
//! - [`spline`] - Interpolation kernels
//! - [`config`] - Run configuration via TOML
//! - [`logging`] - JSON line-delimited run logs

pub mod assembler;
pub mod config;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod logging;
pub mod measurement;
pub mod resampler;
pub mod spline;

pub use assembler::{Precision, ResampledRow, ResampledTable, ResultAssembler};
pub use config::{ConfigError, GridConfig, ResampleConfig};
pub use engine::{FailurePolicy, ResampleEngine, ResampleOptions, ResampleReport, SkippedSample};
pub use error::{ResampleError, ResampleResult};
pub use grouping::{GroupedMeasurements, SampleGrouper, SampleSeries};
pub use logging::log_resample_run;
pub use measurement::{ChannelSet, ChannelValues, Measurement, SampleId, TargetGrid};
pub use resampler::{ChannelResampler, DuplicateTimePolicy, ResampledChannels};
pub use spline::{BSpline, FitError, Interpolant, InterpolationKind};
