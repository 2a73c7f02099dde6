//! Input and output record types shared by every stage of a run.
//!
//! Color channels are carried by name (e.g. `L`, `a`, `b`) so that the same
//! engine serves any perceptual channel layout.

use std::cmp::Ordering;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ResampleError, ResampleResult};

/// Identifier of one physical sample.
///
/// Ordering is "natural": identifiers that parse as integers sort numerically
/// and come before every other identifier, the rest sort lexicographically.
/// Numerically equal spellings (`"7"`, `"07"`) fall back to string order so
/// that the ordering stays consistent with equality. The integer key is
/// parsed once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SampleId {
    id: String,
    numeric: Option<i64>,
}

impl SampleId {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let numeric = id.parse().ok();
        Self { id, numeric }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl Ord for SampleId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric, other.numeric) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.id.cmp(&other.id)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.id.cmp(&other.id),
        }
    }
}

impl PartialOrd for SampleId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl From<&str> for SampleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SampleId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<u64> for SampleId {
    fn from(value: u64) -> Self {
        Self::new(value.to_string())
    }
}

impl From<SampleId> for String {
    fn from(value: SampleId) -> Self {
        value.id
    }
}

/// Ordered list of named channel values.
///
/// Serializes as a map in insertion order, so a row renders as
/// `{"L": .., "a": .., "b": ..}`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelValues(Vec<(String, f64)>);

impl ChannelValues {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.0.push((name.into(), value));
    }

    /// Value of the named channel, if present
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|(channel, _)| channel == name)
            .map(|&(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for ChannelValues {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }
}

impl Serialize for ChannelValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ChannelValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ChannelValuesVisitor;

        impl<'de> Visitor<'de> for ChannelValuesVisitor {
            type Value = ChannelValues;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of channel names to numbers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut values = ChannelValues::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, f64>()? {
                    values.push(name, value);
                }
                Ok(values)
            }
        }

        deserializer.deserialize_map(ChannelValuesVisitor)
    }
}

/// Ordered, duplicate-free set of channel names declared for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChannelSet(Vec<String>);

impl ChannelSet {
    pub fn new<I, S>(names: I) -> ResampleResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut channels: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(ResampleError::malformed("channel names must be non-empty"));
            }
            if channels.contains(&name) {
                return Err(ResampleError::malformed(format!(
                    "channel '{}' declared more than once",
                    name
                )));
            }
            channels.push(name);
        }
        if channels.is_empty() {
            return Err(ResampleError::malformed(
                "at least one channel must be declared",
            ));
        }
        Ok(Self(channels))
    }

    /// CIELAB triple `L, a, b`
    pub fn lab() -> Self {
        Self(vec!["L".into(), "a".into(), "b".into()])
    }

    /// CIELAB triple plus the color-difference column `E`
    pub fn labe() -> Self {
        Self(vec!["L".into(), "a".into(), "b".into(), "E".into()])
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|channel| channel == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::lab()
    }
}

/// One observed color measurement of one sample at one time.
///
/// Uses the same flat `id, hours, <channel>...` layout as output rows, so a
/// resampled table can be read back as input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(rename = "id")]
    pub sample_id: SampleId,
    /// Hours since the start of exposure
    #[serde(rename = "hours")]
    pub time: f64,
    #[serde(flatten)]
    pub channel_values: ChannelValues,
}

impl Measurement {
    pub fn new<I, S>(sample_id: impl Into<SampleId>, time: f64, values: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            sample_id: sample_id.into(),
            time,
            channel_values: values.into_iter().collect(),
        }
    }
}

/// Ordered time values at which resampled output is requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TargetGrid(Vec<f64>);

impl TargetGrid {
    /// Upper bound on the number of times [`TargetGrid::arange`] generates
    pub const MAX_POINTS: usize = 10_000_000;

    /// Grid from explicit times; order is preserved as given.
    pub fn new(times: Vec<f64>) -> ResampleResult<Self> {
        if let Some(bad) = times.iter().find(|t| !t.is_finite()) {
            return Err(ResampleError::malformed(format!(
                "target grid contains non-finite time {}",
                bad
            )));
        }
        Ok(Self(times))
    }

    /// Fixed-step grid `start, start + step, ...` strictly below `stop`.
    pub fn arange(start: f64, stop: f64, step: f64) -> ResampleResult<Self> {
        if !start.is_finite() || !stop.is_finite() || !step.is_finite() {
            return Err(ResampleError::malformed(
                "grid bounds and step must be finite",
            ));
        }
        if step <= 0.0 {
            return Err(ResampleError::malformed(format!(
                "grid step must be positive, got {}",
                step
            )));
        }

        let span = stop - start;
        let count = if span > 0.0 { (span / step).ceil() } else { 0.0 };
        if !count.is_finite() || count > Self::MAX_POINTS as f64 {
            return Err(ResampleError::malformed(format!(
                "grid [{}, {}) with step {} exceeds {} points",
                start,
                stop,
                step,
                Self::MAX_POINTS
            )));
        }
        let count = count as usize;
        let times = (0..count).map(|i| start + i as f64 * step).collect();
        Ok(Self(times))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_ids_sort_naturally() {
        let mut ids: Vec<SampleId> = ["b", "10", "2", "a", "02"]
            .into_iter()
            .map(SampleId::from)
            .collect();
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(SampleId::as_str).collect();
        assert_eq!(sorted, vec!["02", "2", "10", "a", "b"]);
    }

    #[test]
    fn channel_set_rejects_duplicates_and_empty() {
        assert!(ChannelSet::new(["L", "a", "L"]).is_err());
        assert!(ChannelSet::new(Vec::<String>::new()).is_err());
        assert!(ChannelSet::new(["L", " "]).is_err());
        let set = ChannelSet::new(["L", "a", "b", "E"]).unwrap();
        assert_eq!(set, ChannelSet::labe());
        assert_eq!(set.index_of("E"), Some(3));
    }

    #[test]
    fn channel_values_serialize_in_order() {
        let values: ChannelValues = [("L", 10.0), ("a", -1.5), ("b", 2.0)].into_iter().collect();
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"{"L":10.0,"a":-1.5,"b":2.0}"#);
        assert_eq!(values.get("a"), Some(-1.5));
        assert_eq!(values.get("E"), None);
    }

    #[test]
    fn arange_excludes_stop() {
        let grid = TargetGrid::arange(0.0, 1001.0, 30.0).unwrap();
        assert_eq!(grid.len(), 34);
        assert_eq!(grid.as_slice()[0], 0.0);
        assert_eq!(grid.as_slice()[33], 990.0);

        let exact = TargetGrid::arange(0.0, 90.0, 30.0).unwrap();
        assert_eq!(exact.as_slice(), &[0.0, 30.0, 60.0]);

        assert!(TargetGrid::arange(5.0, 0.0, 1.0).unwrap().is_empty());
        assert!(TargetGrid::arange(0.0, 10.0, 0.0).is_err());
    }

    #[test]
    fn arange_rejects_oversized_grids() {
        let err = TargetGrid::arange(0.0, 1.0, 1e-300).unwrap_err();
        assert!(matches!(err, ResampleError::MalformedInput { .. }));
        assert!(TargetGrid::arange(0.0, 1e6, 1e-9).is_err());
        assert!(TargetGrid::arange(f64::MIN, f64::MAX, 1.0).is_err());

        let just_over = (TargetGrid::MAX_POINTS + 1) as f64;
        assert!(TargetGrid::arange(0.0, just_over, 1.0).is_err());
    }

    #[test]
    fn sample_id_serializes_as_plain_string() {
        let id: SampleId = serde_json::from_str("\"017\"").unwrap();
        assert_eq!(id.as_str(), "017");
        assert!(id < SampleId::from("18"));
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"017\"");
    }

    #[test]
    fn measurement_reads_flat_row_layout() {
        let json = r#"{"id":"Echantillon1","hours":30.0,"L":19.0,"a":8.38,"b":-7.56}"#;
        let record: Measurement = serde_json::from_str(json).unwrap();
        assert_eq!(
            record,
            Measurement::new("Echantillon1", 30.0, [("L", 19.0), ("a", 8.38), ("b", -7.56)])
        );
        let names: Vec<&str> = record.channel_values.names().collect();
        assert_eq!(names, vec!["L", "a", "b"]);
        assert_eq!(serde_json::to_string(&record).unwrap(), json);
    }

    #[test]
    fn target_grid_rejects_non_finite() {
        assert!(TargetGrid::new(vec![0.0, f64::NAN]).is_err());
        assert!(TargetGrid::new(vec![f64::INFINITY]).is_err());
        let grid = TargetGrid::new(vec![60.0, -30.0, 0.0]).unwrap();
        assert_eq!(grid.as_slice(), &[60.0, -30.0, 0.0]);
    }
}
