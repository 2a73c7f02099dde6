//! Per-sample channel resampling.
//!
//! Each declared channel of a [`SampleSeries`] is fitted independently with
//! the configured [`InterpolationKind`] and evaluated at every target time.
//! No coupling is introduced between channels, so a resampled `(L, a, b)`
//! triple need not correspond to any single physical measurement.

use std::fmt;
use std::str::FromStr;

use ndarray::{s, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ResampleError, ResampleResult};
use crate::grouping::SampleSeries;
use crate::measurement::{ChannelSet, SampleId, TargetGrid};
use crate::spline::{self, FitError, InterpolationKind};

/// What to do when one sample has several measurements at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateTimePolicy {
    /// Fail the sample with an interpolation error
    #[default]
    Reject,
    /// Merge equal-time rows into one knot holding the mean of each channel
    Average,
}

impl DuplicateTimePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateTimePolicy::Reject => "reject",
            DuplicateTimePolicy::Average => "average",
        }
    }
}

impl fmt::Display for DuplicateTimePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuplicateTimePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(DuplicateTimePolicy::Reject),
            "average" => Ok(DuplicateTimePolicy::Average),
            other => Err(format!("unknown duplicate time policy '{}'", other)),
        }
    }
}

/// Dense resampled values of one sample: one row per target time, one
/// column per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledChannels {
    channels: ChannelSet,
    values: Array2<f64>,
}

impl ResampledChannels {
    pub fn new(channels: ChannelSet, values: Array2<f64>) -> ResampleResult<Self> {
        if values.ncols() != channels.len() {
            return Err(ResampleError::malformed(format!(
                "resampled matrix has {} columns for {} channels",
                values.ncols(),
                channels.len()
            )));
        }
        Ok(Self { channels, values })
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of target times
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    /// Values of one channel, aligned with the target grid
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.channels
            .index_of(name)
            .map(|index| self.values.index_axis(Axis(1), index))
    }

    /// All channel values at one target index
    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.row(index)
    }
}

/// Fits and evaluates one interpolant per channel of a sample series.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelResampler {
    kind: InterpolationKind,
    duplicates: DuplicateTimePolicy,
}

impl ChannelResampler {
    pub fn new(kind: InterpolationKind) -> Self {
        Self {
            kind,
            duplicates: DuplicateTimePolicy::default(),
        }
    }

    pub fn with_duplicate_policy(mut self, duplicates: DuplicateTimePolicy) -> Self {
        self.duplicates = duplicates;
        self
    }

    pub fn kind(&self) -> InterpolationKind {
        self.kind
    }

    pub fn duplicate_policy(&self) -> DuplicateTimePolicy {
        self.duplicates
    }

    /// Resample `channels` of `series` at every time of `targets`.
    ///
    /// Values are returned unrounded.
    pub fn resample(
        &self,
        series: &SampleSeries<'_>,
        targets: &TargetGrid,
        channels: &ChannelSet,
    ) -> ResampleResult<ResampledChannels> {
        let columns = channels
            .iter()
            .map(|name| {
                series.channels.index_of(name).ok_or_else(|| {
                    ResampleError::malformed(format!(
                        "sample '{}' has no channel '{}'",
                        series.id, name
                    ))
                })
            })
            .collect::<ResampleResult<Vec<usize>>>()?;

        let knots = self.prepare_knots(series, &columns)?;
        let required = self.kind.min_points();
        if knots.times.len() < required {
            return Err(ResampleError::insufficient_data(
                series.id,
                self.kind.as_str(),
                required,
                knots.times.len(),
            ));
        }

        let grid = targets.as_slice();
        let mut values = Array2::<f64>::zeros((grid.len(), channels.len()));
        for (position, name) in channels.iter().enumerate() {
            let interpolant = spline::fit(self.kind, &knots.times, &knots.values[position])
                .map_err(|err| self.fit_error(series.id, name, err))?;
            for (row, &time) in grid.iter().enumerate() {
                values[[row, position]] = interpolant.evaluate(time);
            }
        }

        let (min, max) = (knots.times[0], knots.times[knots.times.len() - 1]);
        let extrapolated = grid.iter().filter(|&&t| t < min || t > max).count();
        tracing::debug!(
            "Resampled sample '{}' ({} kind, {} knots) at {} targets, {} extrapolated",
            series.id,
            self.kind,
            knots.times.len(),
            grid.len(),
            extrapolated
        );

        ResampledChannels::new(channels.clone(), values)
    }

    /// Distinct knot times and the matching per-channel values.
    fn prepare_knots(&self, series: &SampleSeries<'_>, columns: &[usize]) -> ResampleResult<Knots> {
        let mut knots = Knots {
            times: Vec::with_capacity(series.len()),
            values: vec![Vec::with_capacity(series.len()); columns.len()],
        };

        let mut row = 0;
        while row < series.len() {
            let time = series.times[row];
            let mut end = row + 1;
            while end < series.len() && series.times[end] == time {
                end += 1;
            }

            if end - row > 1 && self.duplicates == DuplicateTimePolicy::Reject {
                return Err(ResampleError::interpolation(
                    series.id,
                    "duplicate times",
                    format!("{} measurements at time {}", end - row, time),
                ));
            }

            knots.times.push(time);
            for (position, &column) in columns.iter().enumerate() {
                let run = series.values.slice(s![row..end, column]);
                let mean = run.sum() / run.len() as f64;
                knots.values[position].push(mean);
            }
            row = end;
        }

        Ok(knots)
    }

    fn fit_error(&self, sample: &SampleId, channel: &str, err: FitError) -> ResampleError {
        match err {
            FitError::TooFewPoints { required, got } => {
                ResampleError::insufficient_data(sample, self.kind.as_str(), required, got)
            }
            other => ResampleError::interpolation(
                sample,
                format!("{} fit of channel {}", self.kind, channel),
                other.to_string(),
            ),
        }
    }
}

struct Knots {
    times: Vec<f64>,
    /// One vector per requested channel, aligned with `times`
    values: Vec<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::SampleGrouper;
    use crate::measurement::Measurement;

    fn lab(id: &str, time: f64, l: f64, a: f64, b: f64) -> Measurement {
        Measurement::new(id, time, [("L", l), ("a", a), ("b", b)])
    }

    fn resample(
        records: &[Measurement],
        targets: &[f64],
        resampler: ChannelResampler,
    ) -> ResampleResult<ResampledChannels> {
        let grouped = SampleGrouper::new(ChannelSet::lab()).group(records)?;
        let series = grouped.iter().next().expect("one sample");
        let grid = TargetGrid::new(targets.to_vec())?;
        resampler.resample(&series, &grid, &ChannelSet::lab())
    }

    #[test]
    fn linear_channels_are_fitted_independently() {
        let records = vec![lab("A", 0.0, 10.0, 5.0, -2.0), lab("A", 30.0, 20.0, 2.0, 4.0)];
        let out = resample(&records, &[0.0, 15.0, 30.0, 60.0], ChannelResampler::default()).unwrap();

        assert_eq!(out.len(), 4);
        let l = out.column("L").unwrap().to_vec();
        let a = out.column("a").unwrap().to_vec();
        let b = out.column("b").unwrap().to_vec();
        assert!((l[3] - 30.0).abs() < 1e-9);
        assert!((a[1] - 3.5).abs() < 1e-9);
        assert!((a[3] + 1.0).abs() < 1e-9);
        assert!((b[3] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_times_are_rejected_by_default() {
        let records = vec![
            lab("A", 0.0, 10.0, 0.0, 0.0),
            lab("A", 30.0, 20.0, 0.0, 0.0),
            lab("A", 30.0, 22.0, 0.0, 0.0),
        ];
        let err = resample(&records, &[15.0], ChannelResampler::default()).unwrap_err();
        assert!(matches!(err, ResampleError::Interpolation { .. }));
        assert!(err.to_string().contains("duplicate times"));
    }

    #[test]
    fn duplicate_times_can_be_averaged() {
        let records = vec![
            lab("A", 0.0, 10.0, 0.0, 0.0),
            lab("A", 30.0, 20.0, 0.0, 0.0),
            lab("A", 30.0, 22.0, 0.0, 0.0),
        ];
        let resampler = ChannelResampler::new(InterpolationKind::Linear)
            .with_duplicate_policy(DuplicateTimePolicy::Average);
        let out = resample(&records, &[30.0, 60.0], resampler).unwrap();
        let l = out.column("L").unwrap().to_vec();
        assert!((l[0] - 21.0).abs() < 1e-9);
        assert!((l[1] - 32.0).abs() < 1e-9);
    }

    #[test]
    fn averaging_can_leave_too_few_points() {
        let records = vec![lab("A", 5.0, 10.0, 0.0, 0.0), lab("A", 5.0, 12.0, 0.0, 0.0)];
        let resampler = ChannelResampler::default().with_duplicate_policy(DuplicateTimePolicy::Average);
        let err = resample(&records, &[0.0], resampler).unwrap_err();
        assert_eq!(
            err,
            ResampleError::InsufficientData {
                sample: "A".into(),
                kind: "linear".into(),
                required: 2,
                got: 1,
            }
        );
    }

    #[test]
    fn single_point_is_insufficient() {
        let records = vec![lab("A", 0.0, 10.0, 0.0, 0.0)];
        let err = resample(&records, &[0.0, 30.0], ChannelResampler::default()).unwrap_err();
        assert!(matches!(err, ResampleError::InsufficientData { required: 2, got: 1, .. }));
    }

    #[test]
    fn cubic_needs_four_points() {
        let records = vec![
            lab("A", 0.0, 10.0, 0.0, 0.0),
            lab("A", 30.0, 20.0, 0.0, 0.0),
            lab("A", 45.0, 22.0, 0.0, 0.0),
        ];
        let err = resample(&records, &[0.0], ChannelResampler::new(InterpolationKind::Cubic))
            .unwrap_err();
        assert!(matches!(err, ResampleError::InsufficientData { required: 4, got: 3, .. }));
    }

    #[test]
    fn unknown_channel_is_malformed() {
        let records = vec![lab("A", 0.0, 1.0, 0.0, 0.0), lab("A", 1.0, 2.0, 0.0, 0.0)];
        let grouped = SampleGrouper::new(ChannelSet::lab()).group(&records).unwrap();
        let series = grouped.iter().next().unwrap();
        let grid = TargetGrid::new(vec![0.5]).unwrap();
        let err = ChannelResampler::default()
            .resample(&series, &grid, &ChannelSet::labe())
            .unwrap_err();
        assert!(err.to_string().contains("no channel 'E'"));
    }

    #[test]
    fn channel_subset_keeps_requested_order() {
        let records = vec![lab("A", 0.0, 1.0, 2.0, 3.0), lab("A", 1.0, 1.0, 2.0, 3.0)];
        let grouped = SampleGrouper::new(ChannelSet::lab()).group(&records).unwrap();
        let series = grouped.iter().next().unwrap();
        let grid = TargetGrid::new(vec![0.5]).unwrap();
        let subset = ChannelSet::new(["b", "L"]).unwrap();
        let out = ChannelResampler::default().resample(&series, &grid, &subset).unwrap();
        assert_eq!(out.row(0).to_vec(), vec![3.0, 1.0]);
    }

    #[test]
    fn duplicate_policy_parses() {
        assert_eq!("Average".parse::<DuplicateTimePolicy>(), Ok(DuplicateTimePolicy::Average));
        assert_eq!("reject".parse::<DuplicateTimePolicy>(), Ok(DuplicateTimePolicy::Reject));
        assert!("drop".parse::<DuplicateTimePolicy>().is_err());
    }
}
