//! Reassembly of per-sample results into one output table.
//!
//! Rows are emitted sample by sample in [`SampleId`] order and, within a
//! sample, exactly in target-grid order. Every channel value is rounded to a
//! fixed number of decimal places with round-half-to-even applied to the
//! scaled value (`round_ties_even(v * 10^p) / 10^p`); negative zero is
//! normalized to `0.0`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{ResampleError, ResampleResult};
use crate::measurement::{ChannelSet, ChannelValues, SampleId, TargetGrid};
use crate::resampler::ResampledChannels;

/// Number of decimal places kept in output values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Precision(u32);

impl Precision {
    /// Largest supported precision; beyond this `f64` cannot represent the
    /// scaled value exactly.
    pub const MAX: u32 = 15;

    pub fn new(decimals: i64) -> ResampleResult<Self> {
        if decimals < 0 {
            return Err(ResampleError::precision(
                decimals,
                "number of decimal places must be non-negative",
            ));
        }
        if decimals > i64::from(Self::MAX) {
            return Err(ResampleError::precision(
                decimals,
                format!("at most {} decimal places are supported", Self::MAX),
            ));
        }
        Ok(Self(decimals as u32))
    }

    pub fn decimals(&self) -> u32 {
        self.0
    }

    pub fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.0 as i32);
        let scaled = value * scale;
        if !scaled.is_finite() {
            return value;
        }
        let rounded = scaled.round_ties_even() / scale;
        if rounded == 0.0 {
            0.0
        } else {
            rounded
        }
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self(2)
    }
}

/// One output row: a sample evaluated at one target time.
///
/// Serializes flat, matching the `id, hours, <channel>...` table layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResampledRow {
    #[serde(rename = "id")]
    pub sample_id: SampleId,
    #[serde(rename = "hours")]
    pub time: f64,
    #[serde(flatten)]
    pub channel_values: ChannelValues,
}

/// Ordered output of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResampledTable {
    channels: ChannelSet,
    rows: Vec<ResampledRow>,
}

impl ResampledTable {
    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn rows(&self) -> &[ResampledRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ResampledRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResampledRow> {
        self.rows.iter()
    }

    /// Rows of one sample, in target-grid order
    pub fn rows_for(&self, id: &SampleId) -> std::slice::Iter<'_, ResampledRow> {
        let start = self.rows.partition_point(|row| row.sample_id < *id);
        let end = self.rows.partition_point(|row| row.sample_id <= *id);
        self.rows[start..end].iter()
    }

    /// Distinct sample ids in output order
    pub fn sample_ids(&self) -> Vec<&SampleId> {
        let mut ids: Vec<&SampleId> = Vec::new();
        for row in &self.rows {
            if ids.last() != Some(&&row.sample_id) {
                ids.push(&row.sample_id);
            }
        }
        ids
    }
}

/// Merges per-sample resampled channels into a rounded, ordered table.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAssembler {
    precision: Precision,
}

impl ResultAssembler {
    pub fn new(precision: Precision) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Build the output table for `channels` from every sample's results.
    ///
    /// Each entry of `per_sample` must hold one row per target time and carry
    /// exactly `channels`.
    pub fn assemble(
        &self,
        per_sample: &BTreeMap<SampleId, ResampledChannels>,
        targets: &TargetGrid,
        channels: &ChannelSet,
    ) -> ResampleResult<ResampledTable> {
        let times = targets.as_slice();
        let mut rows = Vec::with_capacity(per_sample.len() * times.len());

        for (sample_id, resampled) in per_sample {
            if resampled.channels() != channels {
                return Err(ResampleError::malformed(format!(
                    "sample '{}' was resampled with a different channel set",
                    sample_id
                )));
            }
            if resampled.len() != times.len() {
                return Err(ResampleError::malformed(format!(
                    "sample '{}' has {} resampled rows for {} target times",
                    sample_id,
                    resampled.len(),
                    times.len()
                )));
            }

            for (index, &time) in times.iter().enumerate() {
                let values = resampled.row(index);
                let channel_values = channels
                    .iter()
                    .zip(values.iter())
                    .map(|(name, &value)| (name, self.precision.round(value)))
                    .collect();
                rows.push(ResampledRow {
                    sample_id: sample_id.clone(),
                    time,
                    channel_values,
                });
            }
        }

        Ok(ResampledTable {
            channels: channels.clone(),
            rows,
        })
    }
}
