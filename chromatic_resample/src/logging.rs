use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::engine::{ResampleOptions, ResampleReport};

pub const RUN_LOG_FILE: &str = "resample.jsonl";

fn append_json_line<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    serde_json::to_writer(&mut file, value)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    file.write_all(b"\n")
}

#[derive(Debug, Serialize)]
pub struct SkippedLogEntry {
    pub sample_id: String,
    pub error_kind: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RunLogEntry {
    pub timestamp_ms: u128,
    pub kind: String,
    pub channels: Vec<String>,
    pub precision: u32,
    pub on_failure: String,
    pub samples: usize,
    pub rows: usize,
    pub skipped: Vec<SkippedLogEntry>,
}

impl RunLogEntry {
    pub fn from_report(report: &ResampleReport, options: &ResampleOptions) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
            kind: options.kind.to_string(),
            channels: options.channels.names().to_vec(),
            precision: options.precision.decimals(),
            on_failure: options.on_failure.to_string(),
            samples: report.table.sample_ids().len(),
            rows: report.table.len(),
            skipped: report
                .skipped
                .iter()
                .map(|skip| SkippedLogEntry {
                    sample_id: skip.sample_id.to_string(),
                    error_kind: skip.error.kind_name(),
                    message: skip.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Append one JSON line describing `report` to `<dir>/resample.jsonl`.
pub fn log_resample_run<P: AsRef<Path>>(
    dir: P,
    report: &ResampleReport,
    options: &ResampleOptions,
) -> io::Result<()> {
    fs::create_dir_all(&dir)?;
    let entry = RunLogEntry::from_report(report, options);
    append_json_line(dir.as_ref().join(RUN_LOG_FILE), &entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FailurePolicy, ResampleEngine};
    use crate::measurement::{ChannelSet, Measurement, TargetGrid};

    #[test]
    fn appends_one_line_per_run() {
        let options = ResampleOptions {
            channels: ChannelSet::new(["L"]).unwrap(),
            on_failure: FailurePolicy::Skip,
            ..ResampleOptions::default()
        };
        let records = vec![
            Measurement::new("A", 0.0, [("L", 10.0)]),
            Measurement::new("A", 30.0, [("L", 20.0)]),
            Measurement::new("B", 0.0, [("L", 5.0)]),
        ];
        let targets = TargetGrid::new(vec![0.0, 60.0]).unwrap();
        let report = ResampleEngine::new(options.clone())
            .run(&records, &targets)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        log_resample_run(dir.path(), &report, &options).unwrap();
        log_resample_run(dir.path(), &report, &options).unwrap();

        let contents = fs::read_to_string(dir.path().join(RUN_LOG_FILE)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let entry: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(entry["kind"], "linear");
        assert_eq!(entry["rows"], 2);
        assert_eq!(entry["samples"], 1);
        assert_eq!(entry["skipped"][0]["sample_id"], "B");
        assert_eq!(entry["skipped"][0]["error_kind"], "insufficient_data");
    }
}
