//! Partitioning of raw measurements into per-sample time series.
//!
//! Grouping copies the input once into a column store (`times` plus a dense
//! `rows x channels` value matrix) sorted by sample then time, and hands out
//! borrowed [`SampleSeries`] views over index ranges of that store. Views
//! share nothing mutable, so they can be resampled on any thread.

use std::ops::Range;

use ndarray::{s, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{ResampleError, ResampleResult};
use crate::measurement::{ChannelSet, Measurement, SampleId};

/// Splits a record set into one ordered series per sample.
#[derive(Debug, Clone)]
pub struct SampleGrouper {
    channels: ChannelSet,
}

impl SampleGrouper {
    pub fn new(channels: ChannelSet) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Partition `records` by sample id and sort each partition by time.
    ///
    /// The sort is stable, so equal times keep their input order. Any record
    /// whose channel set differs from the declared one fails the whole batch.
    pub fn group(&self, records: &[Measurement]) -> ResampleResult<GroupedMeasurements> {
        for (index, record) in records.iter().enumerate() {
            self.validate(index, record)?;
        }

        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| {
            let (ra, rb) = (&records[a], &records[b]);
            ra.sample_id
                .cmp(&rb.sample_id)
                .then_with(|| ra.time.total_cmp(&rb.time))
        });

        let width = self.channels.len();
        let mut times = Vec::with_capacity(order.len());
        let mut values = Array2::<f64>::zeros((order.len(), width));
        let mut ids: Vec<SampleId> = Vec::new();
        let mut ranges: Vec<Range<usize>> = Vec::new();

        for (row, &source) in order.iter().enumerate() {
            let record = &records[source];
            times.push(record.time);
            for (col, name) in self.channels.iter().enumerate() {
                // Presence was checked in validate.
                values[[row, col]] = record.channel_values.get(name).unwrap_or(f64::NAN);
            }

            if ids.last() == Some(&record.sample_id) {
                if let Some(range) = ranges.last_mut() {
                    range.end = row + 1;
                }
            } else {
                ids.push(record.sample_id.clone());
                ranges.push(row..row + 1);
            }
        }

        tracing::debug!(
            "Grouped {} measurements into {} samples",
            records.len(),
            ids.len()
        );

        Ok(GroupedMeasurements {
            channels: self.channels.clone(),
            ids,
            ranges,
            times,
            values,
        })
    }

    fn validate(&self, index: usize, record: &Measurement) -> ResampleResult<()> {
        if !record.time.is_finite() || record.time < 0.0 {
            return Err(ResampleError::malformed(format!(
                "record {} (sample '{}'): time must be a non-negative finite number, got {}",
                index, record.sample_id, record.time
            )));
        }

        let provided = &record.channel_values;
        if let Some(missing) = self.channels.iter().find(|name| provided.get(name).is_none()) {
            return Err(ResampleError::malformed(format!(
                "record {} (sample '{}'): missing channel '{}'",
                index, record.sample_id, missing
            )));
        }

        let mut seen: Vec<&str> = Vec::with_capacity(provided.len());
        for (name, value) in provided.iter() {
            if !self.channels.contains(name) {
                return Err(ResampleError::malformed(format!(
                    "record {} (sample '{}'): unexpected channel '{}'",
                    index, record.sample_id, name
                )));
            }
            if seen.contains(&name) {
                return Err(ResampleError::malformed(format!(
                    "record {} (sample '{}'): channel '{}' given twice",
                    index, record.sample_id, name
                )));
            }
            if !value.is_finite() {
                return Err(ResampleError::malformed(format!(
                    "record {} (sample '{}'): channel '{}' is not finite",
                    index, record.sample_id, name
                )));
            }
            seen.push(name);
        }

        Ok(())
    }
}

/// Column store of all measurements, ordered by sample id then time.
#[derive(Debug, Clone)]
pub struct GroupedMeasurements {
    channels: ChannelSet,
    ids: Vec<SampleId>,
    ranges: Vec<Range<usize>>,
    times: Vec<f64>,
    values: Array2<f64>,
}

impl GroupedMeasurements {
    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Number of distinct samples
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sample ids in ascending order
    pub fn sample_ids(&self) -> &[SampleId] {
        &self.ids
    }

    /// Total number of measurements across all samples
    pub fn measurement_count(&self) -> usize {
        self.times.len()
    }

    pub fn get(&self, id: &SampleId) -> Option<SampleSeries<'_>> {
        self.ids
            .binary_search(id)
            .ok()
            .map(|index| self.series_at(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = SampleSeries<'_>> + '_ {
        (0..self.ids.len()).map(move |index| self.series_at(index))
    }

    /// All series collected up front, e.g. for handing to a thread pool
    pub fn series(&self) -> Vec<SampleSeries<'_>> {
        self.iter().collect()
    }

    fn series_at(&self, index: usize) -> SampleSeries<'_> {
        let range = self.ranges[index].clone();
        SampleSeries {
            id: &self.ids[index],
            channels: &self.channels,
            times: &self.times[range.clone()],
            values: self.values.slice(s![range, ..]),
        }
    }
}

/// Borrowed view over one sample's measurements, sorted by time.
#[derive(Debug, Clone)]
pub struct SampleSeries<'a> {
    pub id: &'a SampleId,
    pub channels: &'a ChannelSet,
    pub times: &'a [f64],
    /// `times.len() x channels.len()` matrix, row-aligned with `times`
    pub values: ArrayView2<'a, f64>,
}

impl<'a> SampleSeries<'a> {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Values of one channel, aligned with `times`
    pub fn channel(&self, name: &str) -> Option<ArrayView1<'a, f64>> {
        let column = self.channels.index_of(name)?;
        let values = self.values;
        Some(values.index_axis_move(Axis(1), column))
    }

    /// Observed time range, `None` for an empty series
    pub fn time_range(&self) -> Option<(f64, f64)> {
        match (self.times.first(), self.times.last()) {
            (Some(&min), Some(&max)) => Some((min, max)),
            _ => None,
        }
    }
}
