//! Event sample downloads from configured searches

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Map, Value};
use spl_client::SearchRequest;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::SampleConfig;
use crate::connection::ConnectionAdapter;
use crate::prompt::{Prompter, pick};
use crate::table::Table;
use crate::{Error, Result};

const EVENTGEN_SAMPLES: &str = "apps/SA-Eventgen/samples";
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// What a download run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub written: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Downloads results of the configured sample searches into CSV files.
pub struct SamplesManager {
    samples: BTreeMap<String, SampleConfig>,
    work_dir: PathBuf,
    interactive: bool,
    poll_interval: Duration,
}

impl SamplesManager {
    pub fn new(
        samples: &BTreeMap<String, SampleConfig>,
        work_dir: impl Into<PathBuf>,
        interactive: bool,
    ) -> Self {
        Self {
            samples: samples.clone(),
            work_dir: work_dir.into(),
            interactive,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.samples.keys().cloned().collect()
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new("Samples", ["Name", "Source", "Query", "Earliest", "Latest"]);
        for (name, sample) in &self.samples {
            table.push(vec![
                name.clone(),
                sample.src.clone(),
                sample.query.clone(),
                sample.earliest.clone(),
                sample.latest.clone(),
            ]);
        }
        table
    }

    /// Connection a download runs against: explicit first, then `--src`.
    pub fn resolve_connection(explicit: Option<&str>, src: Option<&str>) -> Result<String> {
        explicit
            .or(src)
            .map(str::to_string)
            .ok_or(Error::NoConnection)
    }

    /// Samples to download for `connection`.
    pub fn select(
        &self,
        name: Option<&str>,
        connection: &str,
        prompter: &dyn Prompter,
    ) -> Result<Vec<String>> {
        if let Some(name) = name {
            return match self.samples.get(name) {
                Some(sample) if sample.src == connection => Ok(vec![name.to_string()]),
                _ => Err(Error::UnknownSample {
                    name: name.to_string(),
                    connection: connection.to_string(),
                }),
            };
        }
        if !self.interactive {
            return Err(Error::SampleRequired);
        }

        let candidates: Vec<String> = self
            .samples
            .iter()
            .filter(|(_, s)| s.src == connection)
            .map(|(n, _)| n.clone())
            .collect();
        if candidates.is_empty() {
            warn!("No samples configured for connection '{}'.", connection);
            return Ok(Vec::new());
        }
        let chosen = prompter.multi_select(
            "Select the samples you want to download:",
            &candidates,
            &vec![false; candidates.len()],
        )?;
        Ok(pick(&candidates, &chosen))
    }

    /// Directory the CSV files are written to.
    pub fn target_dir(&self, prompter: &dyn Prompter) -> Result<PathBuf> {
        if !self.interactive {
            let eventgen = self.work_dir.join(EVENTGEN_SAMPLES);
            let samples = self.work_dir.join("samples");
            return Ok(if eventgen.is_dir() {
                eventgen
            } else if samples.is_dir() {
                samples
            } else {
                self.work_dir.clone()
            });
        }

        let candidates = sample_dir_candidates(&self.work_dir);
        let labels: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        let index = prompter.select("Select the target directory:", &labels, 0)?;
        candidates
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Prompt(format!("selection {index} out of range")))
    }

    /// Run the searches of the selected samples concurrently and store the results.
    pub async fn download(
        &self,
        adapter: &ConnectionAdapter,
        name: Option<&str>,
        prompter: &dyn Prompter,
    ) -> Result<DownloadReport> {
        let selected = self.select(name, adapter.name(), prompter)?;
        let mut report = DownloadReport::default();
        if selected.is_empty() {
            return Ok(report);
        }
        let dir = self.target_dir(prompter)?;
        std::fs::create_dir_all(&dir)?;

        let mut tasks = JoinSet::new();
        for sample_name in selected {
            let Some(sample) = self.samples.get(&sample_name).cloned() else {
                continue;
            };
            let adapter = adapter.clone();
            let target = dir.join(format!("{sample_name}.csv"));
            let poll = self.poll_interval;
            tasks.spawn(async move {
                let outcome = fetch_sample(&adapter, &sample_name, &sample, &target, poll).await;
                (sample_name, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (sample_name, outcome) = joined?;
            match outcome {
                Ok(Some(path)) => report.written.push(path),
                Ok(None) => report
                    .warnings
                    .push(format!("Sample '{sample_name}' returned no results")),
                Err(e) => {
                    warn!("Sample '{}' failed: {}", sample_name, e);
                    report.errors.push(format!("{sample_name}: {e}"));
                }
            }
        }
        report.written.sort();
        Ok(report)
    }
}

/// Search query as dispatched: plain queries get the `search` command.
pub fn search_query(query: &str) -> String {
    let trimmed = query.trim_start();
    if trimmed.starts_with('|') || trimmed.starts_with("search ") {
        trimmed.to_string()
    } else {
        format!("search {trimmed}")
    }
}

async fn fetch_sample(
    adapter: &ConnectionAdapter,
    name: &str,
    sample: &SampleConfig,
    target: &Path,
    poll: Duration,
) -> Result<Option<PathBuf>> {
    let service = adapter.service();
    let request = SearchRequest {
        query: search_query(&sample.query),
        earliest: sample.earliest.clone(),
        latest: sample.latest.clone(),
    };
    info!("Running search for sample '{}' on '{}'", name, adapter.name());
    let job = service.create_search(&request).await?;

    loop {
        let status = service.job_status(&job).await?;
        if status.is_done {
            info!(
                "Sample '{}' search done: {} results ({} events scanned)",
                name, status.result_count, status.scan_count
            );
            break;
        }
        debug!(
            "Sample '{}': {:.0}% done, {} scanned, {} matched, {} results",
            name,
            status.done_progress * 100.0,
            status.scan_count,
            status.event_count,
            status.result_count
        );
        tokio::time::sleep(poll).await;
    }

    let results = service.job_results(&job).await?;
    if results.is_empty() {
        warn!("Sample '{}' returned no results, no file written.", name);
        return Ok(None);
    }
    write_csv(target, &results)?;
    info!("Wrote {} rows of sample '{}' to {}", results.len(), name, target.display());
    Ok(Some(target.to_path_buf()))
}

/// Write rows with a header of all keys in first-seen order.
pub fn write_csv(path: &Path, rows: &[Map<String, Value>]) -> Result<()> {
    let mut header: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !header.contains(&key.as_str()) {
                header.push(key);
            }
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&header)?;
    for row in rows {
        writer.write_record(header.iter().map(|key| cell(row.get(*key))))?;
    }
    writer.flush()?;
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| cell(Some(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}

/// Work dir, its `samples/`, eventgen sample dirs, then other sample dirs.
fn sample_dir_candidates(work_dir: &Path) -> Vec<PathBuf> {
    let mut eventgen = Vec::new();
    let mut others = Vec::new();
    let found = WalkDir::new(work_dir)
        .max_depth(6)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.file_name() == "samples")
        .map(|e| e.into_path());
    for path in found {
        if path.parent().and_then(Path::file_name).is_some_and(|n| n == "SA-Eventgen") {
            eventgen.push(path);
        } else {
            others.push(path);
        }
    }
    eventgen.sort();
    others.sort();

    let mut candidates = vec![work_dir.to_path_buf(), work_dir.join("samples")];
    for path in eventgen.into_iter().chain(others) {
        if !candidates.contains(&path) {
            candidates.push(path);
        }
    }
    candidates
}
