//! End-to-end resampling runs.
//!
//! A run groups the input records, resamples every sample independently
//! (optionally on the rayon thread pool) and assembles the rounded output
//! table. Per-sample failures are handled according to a fixed
//! [`FailurePolicy`]; whichever policy is active, the caller can always tell
//! a partial run from a complete one through [`ResampleReport::skipped`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::assembler::{Precision, ResampledTable, ResultAssembler};
use crate::error::{ResampleError, ResampleResult};
use crate::grouping::{SampleGrouper, SampleSeries};
use crate::measurement::{ChannelSet, Measurement, SampleId, TargetGrid};
use crate::resampler::{ChannelResampler, DuplicateTimePolicy, ResampledChannels};
use crate::spline::InterpolationKind;

/// Run-level reaction to a sample that cannot be resampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Fail the whole run with the first failing sample in output order
    #[default]
    Abort,
    /// Leave the sample out of the table and list it in the report
    Skip,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Abort => "abort",
            FailurePolicy::Skip => "skip",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "skip" => Ok(FailurePolicy::Skip),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

/// Settings for one resampling run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResampleOptions {
    pub kind: InterpolationKind,
    pub channels: ChannelSet,
    pub precision: Precision,
    pub on_failure: FailurePolicy,
    pub duplicate_times: DuplicateTimePolicy,
    /// Resample samples concurrently on the rayon global pool
    pub parallel: bool,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            kind: InterpolationKind::Linear,
            channels: ChannelSet::lab(),
            precision: Precision::default(),
            on_failure: FailurePolicy::Abort,
            duplicate_times: DuplicateTimePolicy::Reject,
            parallel: false,
        }
    }
}

/// A sample left out of the output under [`FailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSample {
    pub sample_id: SampleId,
    pub error: ResampleError,
}

/// Outcome of a run: the output table plus every skipped sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleReport {
    pub table: ResampledTable,
    pub skipped: Vec<SkippedSample>,
}

impl ResampleReport {
    /// True when every input sample produced rows
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn skipped_ids(&self) -> Vec<&SampleId> {
        self.skipped.iter().map(|skip| &skip.sample_id).collect()
    }
}

/// Stateless driver tying grouping, resampling and assembly together.
#[derive(Debug, Clone, Default)]
pub struct ResampleEngine {
    options: ResampleOptions,
}

impl ResampleEngine {
    pub fn new(options: ResampleOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ResampleOptions {
        &self.options
    }

    /// Resample every sample in `records` onto `targets`.
    ///
    /// Malformed input fails the whole run. Sample failures follow
    /// [`ResampleOptions::on_failure`]. Output order never depends on the
    /// order in which parallel work completes.
    pub fn run(
        &self,
        records: &[Measurement],
        targets: &TargetGrid,
    ) -> ResampleResult<ResampleReport> {
        let options = &self.options;
        let grouped = SampleGrouper::new(options.channels.clone()).group(records)?;
        let resampler =
            ChannelResampler::new(options.kind).with_duplicate_policy(options.duplicate_times);

        let series = grouped.series();
        let outcomes = self.resample_all(&resampler, &series, targets);

        let mut per_sample: BTreeMap<SampleId, ResampledChannels> = BTreeMap::new();
        let mut skipped = Vec::new();
        for (series, outcome) in series.iter().zip(outcomes) {
            match outcome {
                Ok(resampled) => {
                    per_sample.insert(series.id.clone(), resampled);
                }
                Err(error) => match options.on_failure {
                    FailurePolicy::Abort => return Err(error),
                    FailurePolicy::Skip => {
                        tracing::warn!("Skipping sample '{}': {}", series.id, error);
                        skipped.push(SkippedSample {
                            sample_id: series.id.clone(),
                            error,
                        });
                    }
                },
            }
        }

        let table = ResultAssembler::new(options.precision).assemble(
            &per_sample,
            targets,
            &options.channels,
        )?;

        tracing::info!(
            "Resampled {} of {} samples ({} kind) onto {} target times: {} rows, {} skipped",
            per_sample.len(),
            grouped.len(),
            options.kind,
            targets.len(),
            table.len(),
            skipped.len()
        );

        Ok(ResampleReport { table, skipped })
    }

    /// One outcome per series, in the same order as `series`.
    fn resample_all(
        &self,
        resampler: &ChannelResampler,
        series: &[SampleSeries<'_>],
        targets: &TargetGrid,
    ) -> Vec<ResampleResult<ResampledChannels>> {
        let channels = &self.options.channels;
        if self.options.parallel {
            series
                .par_iter()
                .map(|one| resampler.resample(one, targets, channels))
                .collect()
        } else {
            series
                .iter()
                .map(|one| resampler.resample(one, targets, channels))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_only(id: &str, time: f64, l: f64) -> Measurement {
        Measurement::new(id, time, [("L", l)])
    }

    fn l_options() -> ResampleOptions {
        ResampleOptions {
            channels: ChannelSet::new(["L"]).unwrap(),
            ..ResampleOptions::default()
        }
    }

    #[test]
    fn abort_policy_fails_on_first_bad_sample() {
        let records = vec![
            l_only("A", 0.0, 10.0),
            l_only("A", 30.0, 20.0),
            l_only("B", 0.0, 5.0),
        ];
        let targets = TargetGrid::new(vec![0.0, 15.0]).unwrap();
        let err = ResampleEngine::new(l_options())
            .run(&records, &targets)
            .unwrap_err();
        assert!(matches!(err, ResampleError::InsufficientData { ref sample, .. } if sample == "B"));
    }

    #[test]
    fn parallel_abort_reports_first_failure_in_output_order() {
        let mut records = Vec::new();
        for sample in 0..50u64 {
            let points = if sample == 3 || sample == 40 { 1 } else { 4 };
            for step in 0..points {
                let t = step as f64 * 20.0;
                records.push(l_only(&sample.to_string(), t, 10.0 + t));
            }
        }
        let targets = TargetGrid::arange(0.0, 100.0, 10.0).unwrap();
        let options = ResampleOptions {
            parallel: true,
            ..l_options()
        };

        for _ in 0..10 {
            let err = ResampleEngine::new(options.clone())
                .run(&records, &targets)
                .unwrap_err();
            assert!(
                matches!(err, ResampleError::InsufficientData { ref sample, .. } if sample == "3"),
                "unexpected error: {}",
                err
            );
        }
    }

    #[test]
    fn skip_policy_reports_skipped_samples() {
        let records = vec![
            l_only("A", 0.0, 10.0),
            l_only("A", 30.0, 20.0),
            l_only("B", 0.0, 5.0),
        ];
        let targets = TargetGrid::new(vec![0.0, 15.0]).unwrap();
        let options = ResampleOptions {
            on_failure: FailurePolicy::Skip,
            ..l_options()
        };

        let report = ResampleEngine::new(options).run(&records, &targets).unwrap();
        assert!(!report.is_complete());
        assert_eq!(report.skipped_ids(), vec![&SampleId::from("B")]);
        assert_eq!(report.table.len(), 2);
        assert!(report.table.iter().all(|row| row.sample_id.as_str() == "A"));
    }

    #[test]
    fn malformed_input_aborts_even_when_skipping() {
        let records = vec![
            l_only("A", 0.0, 10.0),
            Measurement::new("B", 0.0, [("a", 1.0)]),
        ];
        let targets = TargetGrid::new(vec![0.0]).unwrap();
        let options = ResampleOptions {
            on_failure: FailurePolicy::Skip,
            ..l_options()
        };
        let err = ResampleEngine::new(options).run(&records, &targets).unwrap_err();
        assert!(matches!(err, ResampleError::MalformedInput { .. }));
    }

    #[test]
    fn parallel_and_sequential_runs_match() {
        let mut records = Vec::new();
        for sample in 0..20u64 {
            for step in 0..5 {
                let t = step as f64 * 15.0;
                records.push(l_only(&sample.to_string(), t, sample as f64 + 0.37 * t));
            }
        }
        let targets = TargetGrid::arange(0.0, 200.0, 10.0).unwrap();

        let sequential = ResampleEngine::new(l_options()).run(&records, &targets).unwrap();
        let parallel = ResampleEngine::new(ResampleOptions {
            parallel: true,
            ..l_options()
        })
        .run(&records, &targets)
        .unwrap();

        assert_eq!(sequential, parallel);
        assert_eq!(sequential.table.len(), 20 * targets.len());
    }

    #[test]
    fn failure_policy_parses() {
        assert_eq!("Skip".parse::<FailurePolicy>(), Ok(FailurePolicy::Skip));
        assert_eq!("abort".parse::<FailurePolicy>(), Ok(FailurePolicy::Abort));
        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
