//! Writes batch results to disk: one directory per item plus `report.json`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use audioclean_core::artifact::base_name;
use audioclean_core::{BatchReport, DiagnosticsSnapshot, ItemReport, ItemStats, Stage};
use serde::Serialize;

pub const REPORT_FILE: &str = "report.json";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub name: String,
    pub status: EntryStatus,
    pub stage: Option<Stage>,
    pub error: Option<String>,
    pub artifacts: Vec<PathBuf>,
    pub stats: Option<ItemStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub items: Vec<ReportEntry>,
    pub diagnostics: DiagnosticsSnapshot,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.items
            .iter()
            .filter(|e| e.status == EntryStatus::Failed)
            .count()
    }
}

/// Entry for an input that could not be read, so it never reached the pipeline.
pub fn unreadable_entry(path: &Path, error: &impl std::fmt::Display) -> ReportEntry {
    ReportEntry {
        name: path.display().to_string(),
        status: EntryStatus::Failed,
        stage: None,
        error: Some(error.to_string()),
        artifacts: Vec::new(),
        stats: None,
    }
}

/// Put unreadable inputs back at their positions among the processed ones.
///
/// `unreadable` holds `(input position, entry)` pairs in ascending position
/// order; `processed` holds the remaining inputs in their original order.
pub fn merge_in_input_order(
    processed: Vec<ReportEntry>,
    unreadable: Vec<(usize, ReportEntry)>,
) -> Vec<ReportEntry> {
    let mut merged = Vec::with_capacity(processed.len() + unreadable.len());
    let mut processed = processed.into_iter();
    for (position, entry) in unreadable {
        while merged.len() < position {
            match processed.next() {
                Some(next) => merged.push(next),
                None => break,
            }
        }
        merged.push(entry);
    }
    merged.extend(processed);
    merged
}

/// Write every successful item's artifacts under `out_dir/<base name>/`.
///
/// Items sharing a base name get `-2`, `-3`, ... suffixes.
pub fn write_batch(out_dir: &Path, batch: &BatchReport) -> Result<Vec<ReportEntry>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut used = HashSet::new();
    batch
        .items
        .iter()
        .map(|item| {
            let dir = unique_dir(out_dir, base_name(&item.name), &mut used);
            write_item(&dir, item)
        })
        .collect()
}

fn unique_dir(out_dir: &Path, base: &str, used: &mut HashSet<String>) -> PathBuf {
    let mut name = base.to_string();
    let mut n = 2;
    while !used.insert(name.clone()) {
        name = format!("{base}-{n}");
        n += 1;
    }
    out_dir.join(name)
}

fn write_item(dir: &Path, item: &ItemReport) -> Result<ReportEntry> {
    match &item.outcome {
        Ok(output) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            let mut artifacts = Vec::with_capacity(output.artifacts.len());
            for artifact in &output.artifacts {
                let path = dir.join(&artifact.name);
                fs::write(&path, &artifact.bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                artifacts.push(path);
            }
            Ok(ReportEntry {
                name: item.name.clone(),
                status: EntryStatus::Done,
                stage: None,
                error: None,
                artifacts,
                stats: Some(output.stats),
            })
        }
        Err(failure) => Ok(ReportEntry {
            name: item.name.clone(),
            status: EntryStatus::Failed,
            stage: Some(failure.stage),
            error: Some(failure.error.to_string()),
            artifacts: Vec::new(),
            stats: None,
        }),
    }
}

pub fn write_report(out_dir: &Path, report: &RunReport) -> Result<PathBuf> {
    let path = out_dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// One line per item for the terminal.
pub fn summary_line(entry: &ReportEntry) -> String {
    match (entry.status, &entry.stats) {
        (EntryStatus::Done, Some(stats)) => format!(
            "ok     {}  {} ms -> {} ms, {} segment(s), {} file(s)",
            entry.name,
            stats.input_duration_ms,
            stats.output_duration_ms,
            stats.segments,
            entry.artifacts.len()
        ),
        _ => format!(
            "FAILED {}  [{}] {}",
            entry.name,
            entry.stage.map_or("read", Stage::as_str),
            entry.error.as_deref().unwrap_or("unknown error")
        ),
    }
}
