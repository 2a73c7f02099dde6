//! Run configuration via TOML files.
//!
//! ```toml
//! [resample]
//! kind = "linear"
//! channels = ["L", "a", "b"]
//! precision = 2
//! on_failure = "abort"
//! duplicate_times = "reject"
//! parallel = false
//!
//! [grid]
//! start = 0.0
//! stop = 1001.0
//! step = 30.0
//! ```
//!
//! Every key is optional. Without a `[grid]` section the caller supplies the
//! target grid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assembler::Precision;
use crate::engine::{FailurePolicy, ResampleEngine, ResampleOptions};
use crate::error::{ResampleError, ResampleResult};
use crate::measurement::{ChannelSet, TargetGrid};
use crate::resampler::DuplicateTimePolicy;
use crate::spline::InterpolationKind;

/// Resampling configuration loaded from a TOML file.
///
/// # Examples
///
/// ```
/// use chromatic_resample::ResampleConfig;
///
/// let config = ResampleConfig::load_from_file("config/resample.toml")
///     .unwrap_or_else(|_| ResampleConfig::default());
///
/// println!("Interpolation kind: {}", config.options.kind);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ResampleConfig {
    pub options: ResampleOptions,
    pub grid: Option<GridConfig>,
}

impl ResampleConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path)?;
        Self::from_str(&contents)
    }

    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(toml_str).map_err(|err| ConfigError::Parse(err.to_string()))?;

        let options = raw.resample.try_into_options()?;
        let grid = raw.grid.map(GridConfig::try_from).transpose()?;

        Ok(Self { options, grid })
    }

    pub fn engine(&self) -> ResampleEngine {
        ResampleEngine::new(self.options.clone())
    }

    /// Configured target grid, if the file declares one
    pub fn target_grid(&self) -> ResampleResult<Option<TargetGrid>> {
        self.grid.as_ref().map(GridConfig::target_grid).transpose()
    }
}

/// Target grid declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GridConfig {
    /// `start, start + step, ...` strictly below `stop`
    Range { start: f64, stop: f64, step: f64 },
    /// Explicit list of hours
    Hours(Vec<f64>),
}

impl GridConfig {
    pub fn target_grid(&self) -> ResampleResult<TargetGrid> {
        match self {
            GridConfig::Range { start, stop, step } => TargetGrid::arange(*start, *stop, *step),
            GridConfig::Hours(hours) => TargetGrid::new(hours.clone()),
        }
    }

    fn try_from(raw: RawGrid) -> Result<Self, ConfigError> {
        let has_range = raw.start.is_some() || raw.stop.is_some() || raw.step.is_some();
        let grid = match (raw.hours, has_range) {
            (Some(_), true) => {
                return Err(ConfigError::Parse(
                    "grid: use either hours or start/stop/step, not both".into(),
                ))
            }
            (Some(hours), false) => GridConfig::Hours(hours),
            (None, _) => {
                let stop = raw
                    .stop
                    .ok_or_else(|| ConfigError::Parse("grid.stop is required".into()))?;
                let step = raw
                    .step
                    .ok_or_else(|| ConfigError::Parse("grid.step is required".into()))?;
                GridConfig::Range {
                    start: raw.start.unwrap_or(0.0),
                    stop,
                    step,
                }
            }
        };

        // Surface invalid bounds at load time rather than at run time.
        grid.target_grid()?;
        Ok(grid)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    resample: RawResample,
    grid: Option<RawGrid>,
}

#[derive(Debug, Deserialize)]
struct RawResample {
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default = "default_channels")]
    channels: Vec<String>,
    #[serde(default = "default_precision")]
    precision: i64,
    #[serde(default = "default_on_failure")]
    on_failure: String,
    #[serde(default = "default_duplicate_times")]
    duplicate_times: String,
    #[serde(default)]
    parallel: bool,
}

impl Default for RawResample {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            channels: default_channels(),
            precision: default_precision(),
            on_failure: default_on_failure(),
            duplicate_times: default_duplicate_times(),
            parallel: false,
        }
    }
}

impl RawResample {
    fn try_into_options(self) -> Result<ResampleOptions, ConfigError> {
        let kind = self
            .kind
            .parse::<InterpolationKind>()
            .map_err(|err| ConfigError::Parse(format!("resample.kind: {}", err)))?;
        let on_failure = self
            .on_failure
            .parse::<FailurePolicy>()
            .map_err(|err| ConfigError::Parse(format!("resample.on_failure: {}", err)))?;
        let duplicate_times = self
            .duplicate_times
            .parse::<DuplicateTimePolicy>()
            .map_err(|err| ConfigError::Parse(format!("resample.duplicate_times: {}", err)))?;
        let channels = ChannelSet::new(self.channels)?;
        let precision = Precision::new(self.precision)?;

        Ok(ResampleOptions {
            kind,
            channels,
            precision,
            on_failure,
            duplicate_times,
            parallel: self.parallel,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawGrid {
    start: Option<f64>,
    stop: Option<f64>,
    step: Option<f64>,
    hours: Option<Vec<f64>>,
}

fn default_kind() -> String {
    "linear".to_string()
}

fn default_channels() -> Vec<String> {
    vec!["L".to_string(), "a".to_string(), "b".to_string()]
}

fn default_precision() -> i64 {
    2
}

fn default_on_failure() -> String {
    "abort".to_string()
}

fn default_duplicate_times() -> String {
    "reject".to_string()
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Resample(ResampleError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {}", err),
            ConfigError::Parse(err) => write!(f, "Parse error: {}", err),
            ConfigError::Resample(err) => write!(f, "Invalid configuration: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<ResampleError> for ConfigError {
    fn from(value: ResampleError) -> Self {
        ConfigError::Resample(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_sections_missing() {
        let config = ResampleConfig::from_str("").unwrap();
        assert_eq!(config.options, ResampleOptions::default());
        assert!(config.grid.is_none());
        assert_eq!(config.target_grid().unwrap(), None);
    }

    #[test]
    fn parses_custom_values() {
        let toml = r#"
[resample]
kind = "cubic"
channels = ["L", "a", "b", "E"]
precision = 3
on_failure = "skip"
duplicate_times = "average"
parallel = true

[grid]
start = 0.0
stop = 1001.0
step = 30.0
"#;
        let config = ResampleConfig::from_str(toml).unwrap();
        assert_eq!(config.options.kind, InterpolationKind::Cubic);
        assert_eq!(config.options.channels, ChannelSet::labe());
        assert_eq!(config.options.precision.decimals(), 3);
        assert_eq!(config.options.on_failure, FailurePolicy::Skip);
        assert_eq!(config.options.duplicate_times, DuplicateTimePolicy::Average);
        assert!(config.options.parallel);

        let grid = config.target_grid().unwrap().unwrap();
        assert_eq!(grid.len(), 34);
        assert_eq!(config.engine().options().kind, InterpolationKind::Cubic);
    }

    #[test]
    fn parses_explicit_hours() {
        let toml = "[grid]\nhours = [0.0, 30.0, 60.0, 90.0]";
        let config = ResampleConfig::from_str(toml).unwrap();
        assert_eq!(
            config.grid,
            Some(GridConfig::Hours(vec![0.0, 30.0, 60.0, 90.0]))
        );
    }

    #[test]
    fn negative_precision_is_a_precision_error() {
        let toml = "[resample]\nprecision = -1";
        let err = ResampleConfig::from_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Resample(ResampleError::PrecisionConfig { value: -1, .. })
        ));
    }

    #[test]
    fn rejects_unknown_kind() {
        let toml = "[resample]\nkind = \"spline\"";
        let err = ResampleConfig::from_str(toml).unwrap_err();
        assert!(err.to_string().contains("resample.kind"));
    }

    #[test]
    fn rejects_mixed_grid_forms() {
        let toml = "[grid]\nstop = 10.0\nstep = 1.0\nhours = [1.0]";
        assert!(ResampleConfig::from_str(toml).is_err());
    }

    #[test]
    fn rejects_non_positive_step() {
        let toml = "[grid]\nstop = 10.0\nstep = 0.0";
        let err = ResampleConfig::from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Resample(_)));
    }

    #[test]
    fn rejects_grid_with_too_many_points() {
        let toml = "[grid]\nstop = 1.0\nstep = 1e-300";
        let err = ResampleConfig::from_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Resample(ResampleError::MalformedInput { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_channels() {
        let toml = "[resample]\nchannels = [\"L\", \"L\"]";
        assert!(ResampleConfig::from_str(toml).is_err());
    }
}
