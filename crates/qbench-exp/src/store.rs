//! Durable storage for named result series.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use qbench_core::errors::{BenchError, ErrorInfo};
use qbench_core::{EngineConfig, ParamPoint, ResultSeries, TrialOutcome};
use rusqlite::{params, Connection, OptionalExtension};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::serde::{from_json_slice, to_canonical_json_bytes, to_canonical_json_string};

/// Supported store backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultStore {
    /// One canonical JSON document per series inside a directory.
    Json(PathBuf),
    /// A single CSV file with one row per entry.
    Csv(PathBuf),
    Sqlite(PathBuf),
}

impl ResultStore {
    /// Chooses the backend from the path extension; anything else is a directory.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("csv") => ResultStore::Csv(path),
            Some("sqlite") | Some("db") => ResultStore::Sqlite(path),
            _ => ResultStore::Json(path),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ResultStore::Json(path) | ResultStore::Csv(path) | ResultStore::Sqlite(path) => path,
        }
    }

    /// Persists `series`, replacing any series stored under the same name.
    pub fn save(&self, series: &ResultSeries) -> Result<(), BenchError> {
        match self {
            ResultStore::Json(dir) => save_json(dir, series)?,
            ResultStore::Csv(path) => save_csv(path, series)?,
            ResultStore::Sqlite(path) => save_sqlite(path, series)?,
        }
        info!(series = series.name(), store = %self.path().display(), "series saved");
        Ok(())
    }

    pub fn save_all<'a>(
        &self,
        series: impl IntoIterator<Item = &'a ResultSeries>,
    ) -> Result<(), BenchError> {
        series.into_iter().try_for_each(|entry| self.save(entry))
    }

    /// Loads the series stored under `name`, or fails with `NotFound`.
    pub fn load(&self, name: &str) -> Result<ResultSeries, BenchError> {
        let found = match self {
            ResultStore::Json(dir) => load_json(dir, name)?,
            ResultStore::Csv(path) => load_csv(path, name)?,
            ResultStore::Sqlite(path) => load_sqlite(path, name)?,
        };
        found.ok_or_else(|| {
            BenchError::NotFound(
                ErrorInfo::new("series-not-found", "no series stored under this name")
                    .with_context("series", name)
                    .with_context("store", self.path().display().to_string()),
            )
        })
    }

    /// Names of every stored series, sorted.
    pub fn list(&self) -> Result<Vec<String>, BenchError> {
        match self {
            ResultStore::Json(dir) => list_json(dir),
            ResultStore::Csv(path) => list_csv(path),
            ResultStore::Sqlite(path) => list_sqlite(path),
        }
    }
}

fn io_error(code: &str, path: &Path, err: impl ToString) -> BenchError {
    BenchError::Persistence(
        ErrorInfo::new(code, "result store i/o failure")
            .with_context("path", path.display().to_string())
            .with_hint(err.to_string()),
    )
}

fn ensure_parent(path: &Path) -> Result<(), BenchError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| io_error("store-create", parent, err))
        }
        _ => Ok(()),
    }
}

/// Writes `bytes` next to `path` and renames over it.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), BenchError> {
    ensure_parent(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|err| io_error("store-temp", &dir, err))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.flush())
        .map_err(|err| io_error("store-write", path, err))?;
    tmp.persist(path)
        .map_err(|err| io_error("store-persist", path, err.error))?;
    Ok(())
}

// Series names contain `/`; file stems escape it reversibly.
fn file_stem(name: &str) -> String {
    name.replace('%', "%25").replace('/', "%2F")
}

fn name_from_stem(stem: &str) -> String {
    stem.replace("%2F", "/").replace("%25", "%")
}

fn json_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.json", file_stem(name)))
}

fn save_json(dir: &Path, series: &ResultSeries) -> Result<(), BenchError> {
    fs::create_dir_all(dir).map_err(|err| io_error("store-create", dir, err))?;
    let bytes = to_canonical_json_bytes(series)?;
    replace_file(&json_path(dir, series.name()), &bytes)
}

fn load_json(dir: &Path, name: &str) -> Result<Option<ResultSeries>, BenchError> {
    let path = json_path(dir, name);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path).map_err(|err| io_error("store-read", &path, err))?;
    from_json_slice(&bytes).map(Some)
}

fn list_json(dir: &Path) -> Result<Vec<String>, BenchError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| io_error("store-list", dir, err))? {
        let path = entry.map_err(|err| io_error("store-list", dir, err))?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            names.push(name_from_stem(stem));
        }
    }
    names.sort();
    Ok(names)
}

const CSV_COLUMNS: [&str; 10] = [
    "series",
    "family",
    "config",
    "plan_hash",
    "created_at",
    "setup_us",
    "cancelled",
    "ordinal",
    "point",
    "outcome",
];

fn csv_error(code: &str, err: csv::Error) -> BenchError {
    BenchError::persistence(code, err)
}

fn read_csv_rows(path: &Path) -> Result<Vec<StringRecord>, BenchError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| csv_error("store-csv-read", err))?;
    reader
        .records()
        .map(|row| row.map_err(|err| csv_error("store-csv-record", err)))
        .collect()
}

// One row per entry; an empty series keeps a single row with blank point
// and outcome so its metadata survives.
fn csv_rows(series: &ResultSeries) -> Result<Vec<Vec<String>>, BenchError> {
    let head = vec![
        series.name().to_string(),
        series.family().to_string(),
        to_canonical_json_string(&series.config())?,
        series.plan_hash().to_string(),
        series.created_at().to_string(),
        series.setup_us().map(|us| us.to_string()).unwrap_or_default(),
        series.is_cancelled().to_string(),
    ];
    if series.is_empty() {
        let mut row = head;
        row.extend([String::new(), String::new(), String::new()]);
        return Ok(vec![row]);
    }
    series
        .entries()
        .iter()
        .enumerate()
        .map(|(ordinal, entry)| {
            let mut row = head.clone();
            row.push(ordinal.to_string());
            row.push(to_canonical_json_string(&entry.point)?);
            row.push(to_canonical_json_string(&entry.outcome)?);
            Ok(row)
        })
        .collect()
}

fn save_csv(path: &Path, series: &ResultSeries) -> Result<(), BenchError> {
    let kept = read_csv_rows(path)?
        .into_iter()
        .filter(|row| row.get(0) != Some(series.name()))
        .collect::<Vec<_>>();
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(CSV_COLUMNS)
        .map_err(|err| csv_error("store-csv-header", err))?;
    for row in &kept {
        writer
            .write_record(row)
            .map_err(|err| csv_error("store-csv-row", err))?;
    }
    for row in csv_rows(series)? {
        writer
            .write_record(&row)
            .map_err(|err| csv_error("store-csv-row", err))?;
    }
    let buffer = writer
        .into_inner()
        .map_err(|err| BenchError::persistence("store-csv-flush", err))?;
    debug!(rows = kept.len(), "rewriting csv store");
    replace_file(path, &buffer)
}

fn field<'a>(row: &'a StringRecord, idx: usize) -> Result<&'a str, BenchError> {
    row.get(idx).ok_or_else(|| {
        BenchError::Persistence(
            ErrorInfo::new("store-csv-short-row", "csv row has too few columns")
                .with_context("column", CSV_COLUMNS[idx]),
        )
    })
}

fn parse_u64(text: &str, column: &str) -> Result<u64, BenchError> {
    text.parse().map_err(|_| {
        BenchError::Persistence(
            ErrorInfo::new("store-csv-number", "csv column is not an unsigned integer")
                .with_context("column", column)
                .with_context("value", text),
        )
    })
}

fn load_csv(path: &Path, name: &str) -> Result<Option<ResultSeries>, BenchError> {
    let mut rows = read_csv_rows(path)?
        .into_iter()
        .filter(|row| row.get(0) == Some(name))
        .peekable();
    let Some(first) = rows.peek() else {
        return Ok(None);
    };
    let config: EngineConfig = from_json_slice(field(first, 2)?.as_bytes())?;
    let mut series = ResultSeries::new(name, field(first, 1)?, config)
        .with_provenance(field(first, 3)?, field(first, 4)?);
    let setup = field(first, 5)?;
    if !setup.is_empty() {
        series.set_setup_us(parse_u64(setup, "setup_us")?);
    }
    if field(first, 6)? == "true" {
        series.mark_cancelled();
    }
    let mut entries = Vec::new();
    for row in rows {
        let ordinal = field(&row, 7)?;
        if ordinal.is_empty() {
            continue;
        }
        let point: ParamPoint = from_json_slice(field(&row, 8)?.as_bytes())?;
        let outcome: TrialOutcome = from_json_slice(field(&row, 9)?.as_bytes())?;
        entries.push((parse_u64(ordinal, "ordinal")?, point, outcome));
    }
    entries.sort_by_key(|(ordinal, _, _)| *ordinal);
    for (_, point, outcome) in entries {
        series.append(point, outcome)?;
    }
    Ok(Some(series))
}

fn list_csv(path: &Path) -> Result<Vec<String>, BenchError> {
    let names: BTreeSet<String> = read_csv_rows(path)?
        .iter()
        .filter_map(|row| row.get(0).map(str::to_string))
        .collect();
    Ok(names.into_iter().collect())
}

fn sqlite_error(code: &str, err: rusqlite::Error) -> BenchError {
    BenchError::persistence(code, err)
}

fn open_sqlite(path: &Path) -> Result<Connection, BenchError> {
    ensure_parent(path)?;
    let conn = Connection::open(path).map_err(|err| {
        BenchError::Persistence(
            ErrorInfo::new("store-sqlite-open", "failed to open sqlite store")
                .with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )
    })?;
    conn.execute_batch(
        r#"CREATE TABLE IF NOT EXISTS series (
            name TEXT PRIMARY KEY,
            family TEXT NOT NULL,
            config TEXT NOT NULL,
            plan_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            setup_us INTEGER,
            cancelled INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS entries (
            series TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            point TEXT NOT NULL,
            outcome TEXT NOT NULL,
            PRIMARY KEY (series, ordinal)
        );"#,
    )
    .map_err(|err| sqlite_error("store-sqlite-schema", err))?;
    Ok(conn)
}

fn save_sqlite(path: &Path, series: &ResultSeries) -> Result<(), BenchError> {
    let mut conn = open_sqlite(path)?;
    let tx = conn
        .transaction()
        .map_err(|err| sqlite_error("store-sqlite-transaction", err))?;
    tx.execute("DELETE FROM entries WHERE series = ?1", [series.name()])
        .map_err(|err| sqlite_error("store-sqlite-delete", err))?;
    tx.execute(
        "INSERT OR REPLACE INTO series (name, family, config, plan_hash, created_at, setup_us, cancelled)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            series.name(),
            series.family(),
            to_canonical_json_string(&series.config())?,
            series.plan_hash(),
            series.created_at(),
            series.setup_us().map(|us| us as i64),
            series.is_cancelled(),
        ],
    )
    .map_err(|err| sqlite_error("store-sqlite-insert", err))?;
    for (ordinal, entry) in series.entries().iter().enumerate() {
        tx.execute(
            "INSERT INTO entries (series, ordinal, point, outcome) VALUES (?1, ?2, ?3, ?4)",
            params![
                series.name(),
                ordinal as i64,
                to_canonical_json_string(&entry.point)?,
                to_canonical_json_string(&entry.outcome)?,
            ],
        )
        .map_err(|err| sqlite_error("store-sqlite-insert", err))?;
    }
    tx.commit()
        .map_err(|err| sqlite_error("store-sqlite-commit", err))
}

fn load_sqlite(path: &Path, name: &str) -> Result<Option<ResultSeries>, BenchError> {
    if !path.exists() {
        return Ok(None);
    }
    let conn = open_sqlite(path)?;
    let head = conn
        .query_row(
            "SELECT family, config, plan_hash, created_at, setup_us, cancelled FROM series WHERE name = ?1",
            [name],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, bool>(5)?,
                ))
            },
        )
        .optional()
        .map_err(|err| sqlite_error("store-sqlite-query", err))?;
    let Some((family, config, plan_hash, created_at, setup_us, cancelled)) = head else {
        return Ok(None);
    };
    let config: EngineConfig = from_json_slice(config.as_bytes())?;
    let mut series = ResultSeries::new(name, family, config).with_provenance(plan_hash, created_at);
    if let Some(us) = setup_us {
        series.set_setup_us(us as u64);
    }
    if cancelled {
        series.mark_cancelled();
    }

    let mut stmt = conn
        .prepare("SELECT point, outcome FROM entries WHERE series = ?1 ORDER BY ordinal")
        .map_err(|err| sqlite_error("store-sqlite-prepare", err))?;
    let rows = stmt
        .query_map([name], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(|err| sqlite_error("store-sqlite-query", err))?;
    for row in rows {
        let (point, outcome) = row.map_err(|err| sqlite_error("store-sqlite-row", err))?;
        let point: ParamPoint = from_json_slice(point.as_bytes())?;
        let outcome: TrialOutcome = from_json_slice(outcome.as_bytes())?;
        series.append(point, outcome)?;
    }
    Ok(Some(series))
}

fn list_sqlite(path: &Path) -> Result<Vec<String>, BenchError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let conn = open_sqlite(path)?;
    let mut stmt = conn
        .prepare("SELECT name FROM series ORDER BY name")
        .map_err(|err| sqlite_error("store-sqlite-prepare", err))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|err| sqlite_error("store-sqlite-query", err))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| sqlite_error("store-sqlite-row", err))?;
    Ok(names)
}
