use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::Summary;

#[derive(Serialize)]
struct RunReport<'a> {
    generated_at: DateTime<Utc>,
    root: &'a Path,
    result_dir: PathBuf,
    summary: &'a Summary,
}

/// Write the run summary as pretty JSON.
pub fn write_report(summary: &Summary, config: &Config, path: &Path) -> anyhow::Result<()> {
    let report = RunReport {
        generated_at: Utc::now(),
        root: &config.root,
        result_dir: config.result_dir(),
        summary,
    };
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, &report)?;
    Ok(())
}
