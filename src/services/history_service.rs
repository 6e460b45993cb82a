use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tracing::{debug, info};

use crate::models::observation::MAX_PRICE;
use crate::models::{History, Observation};
use crate::utils::errors::WatchError;

const DATE_COLUMN: &str = "date";

/// Durable, append-only record of every price observation.
///
/// Backed by a single CSV file: a `date` column followed by one column per
/// category. An empty cell means the category was not quoted at that time.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the persisted history. A missing file is an empty history.
    pub fn load(&self) -> Result<History, WatchError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No history at {}, starting empty", self.path.display());
                return Ok(History::new());
            }
            Err(e) => {
                return Err(WatchError::CorruptHistory(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let history = parse_history(&content)?;
        debug!(
            "Loaded {} observations from {}",
            history.len(),
            self.path.display()
        );
        Ok(history)
    }

    /// Return `history` with `observation` added in timestamp order.
    ///
    /// The input is left as it was, including when the timestamp is taken.
    pub fn append(&self, history: &History, observation: Observation) -> Result<History, WatchError> {
        if history.contains(observation.timestamp()) {
            return Err(WatchError::DuplicateTimestamp(observation.timestamp()));
        }
        let mut updated = history.clone();
        updated.insert(observation)?;
        Ok(updated)
    }

    /// Write the whole history, replacing the previous file.
    ///
    /// The table goes to a sibling temp file first and is renamed over the
    /// target only once fully synced. The previous file is untouched on error.
    pub fn persist(&self, history: &History) -> Result<(), WatchError> {
        self.persist_via(history, &self.temp_path())
    }

    fn persist_via(&self, history: &History, tmp_path: &Path) -> Result<(), WatchError> {
        let body = render_history(history);

        if let Err(e) = write_synced(tmp_path, body.as_bytes()) {
            let _ = fs::remove_file(tmp_path);
            return Err(WatchError::Persistence(format!(
                "failed to write {}: {}",
                tmp_path.display(),
                e
            )));
        }

        if let Err(e) = fs::rename(tmp_path, &self.path) {
            let _ = fs::remove_file(tmp_path);
            return Err(WatchError::Persistence(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            )));
        }

        // The rename is only durable once the directory entry is on disk.
        sync_parent_dir(&self.path).map_err(|e| {
            WatchError::Persistence(format!(
                "failed to sync directory of {}: {}",
                self.path.display(),
                e
            ))
        })?;

        info!(
            "Persisted {} observations to {}",
            history.len(),
            self.path.display()
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()))
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Serialize a history as CSV with a header row.
pub fn render_history(history: &History) -> String {
    let columns = history.categories();

    let mut out = String::from(DATE_COLUMN);
    for column in &columns {
        out.push(',');
        out.push_str(column);
    }
    out.push('\n');

    for observation in history.iter() {
        out.push_str(&format_timestamp(observation.timestamp()));
        for column in &columns {
            out.push(',');
            if let Some(price) = observation.price(column) {
                out.push_str(&price.to_string());
            }
        }
        out.push('\n');
    }
    out
}

/// Parse the CSV written by [`render_history`] or by older data files.
pub fn parse_history(content: &str) -> Result<History, WatchError> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let header = match lines.next() {
        Some((_, header)) => header,
        None => return Ok(History::new()),
    };

    let columns: Vec<String> = header.split(',').map(|c| c.trim().to_lowercase()).collect();
    if columns.first().map(String::as_str) != Some(DATE_COLUMN) {
        return Err(WatchError::CorruptHistory(format!(
            "expected first column '{}', found '{}'",
            DATE_COLUMN, header
        )));
    }
    for (i, column) in columns.iter().enumerate().skip(1) {
        if column.is_empty() || columns[..i].contains(column) {
            return Err(WatchError::CorruptHistory(format!(
                "header column '{}' is blank or repeated",
                column
            )));
        }
    }

    let mut history = History::new();
    for (index, line) in lines {
        let row = index + 1;
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if cells.len() > columns.len() {
            return Err(WatchError::CorruptHistory(format!(
                "row {} has {} cells but the header has {}",
                row,
                cells.len(),
                columns.len()
            )));
        }

        let timestamp = parse_timestamp(cells[0]).ok_or_else(|| {
            WatchError::CorruptHistory(format!("row {}: bad timestamp '{}'", row, cells[0]))
        })?;

        let mut prices = BTreeMap::new();
        for (column, cell) in columns.iter().zip(&cells).skip(1) {
            if cell.is_empty() {
                continue;
            }
            let price = parse_cell(cell).ok_or_else(|| {
                WatchError::CorruptHistory(format!(
                    "row {}: bad price '{}' for '{}'",
                    row, cell, column
                ))
            })?;
            prices.insert(column.clone(), price);
        }

        // A row with no prices carries nothing worth keeping.
        if prices.is_empty() {
            continue;
        }

        let observation = Observation::new(timestamp, prices)
            .map_err(|e| WatchError::CorruptHistory(format!("row {}: {}", row, e)))?;
        history.insert(observation).map_err(|e| {
            WatchError::CorruptHistory(format!("row {}: {}", row, e))
        })?;
    }
    Ok(history)
}

fn parse_cell(cell: &str) -> Option<u64> {
    if let Ok(price) = cell.parse::<u64>() {
        return (price <= MAX_PRICE).then_some(price);
    }
    // Older files were written by a tool that stored whole prices as floats.
    let value: f64 = cell.parse().ok()?;
    if value >= 0.0 && value.fract() == 0.0 && value < MAX_PRICE as f64 {
        Some(value as u64)
    } else {
        None
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 and the naive `YYYY-MM-DD HH:MM:SS[.ffffff]` form, read as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}
