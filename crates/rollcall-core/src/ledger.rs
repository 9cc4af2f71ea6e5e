//! Append-only CSV attendance ledger.
//!
//! The ledger is a UTF-8 comma-separated file: a `Name,Date,Time` header
//! followed by one row per mark, in write order. At most one row exists per
//! `(name, date)`; [`Ledger::mark`] scans every stored row before appending.
//!
//! The scan-then-append is not atomic. Only one operator and one process
//! are expected to touch the file at a time.

use crate::clock::{Clock, SystemClock};
use crate::error::ValidationError;
use crate::types::{AttendanceRecord, DATE_FORMAT, TIME_FORMAT};
use chrono::{NaiveDate, NaiveTime};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column names written as the first row of a new ledger.
pub const HEADER: [&str; 3] = ["Name", "Date", "Time"];

const FIELD_COUNT: usize = HEADER.len();

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Result of a [`Ledger::mark`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    /// A new row was appended.
    Marked(AttendanceRecord),
    /// A row for this name and date already exists; nothing was written.
    AlreadyMarked { name: String, date: NaiveDate },
}

impl MarkOutcome {
    /// `true` when the call appended a row.
    pub fn is_marked(&self) -> bool {
        matches!(self, MarkOutcome::Marked(_))
    }

    pub fn name(&self) -> &str {
        match self {
            MarkOutcome::Marked(record) => &record.name,
            MarkOutcome::AlreadyMarked { name, .. } => name,
        }
    }
}

impl fmt::Display for MarkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkOutcome::Marked(record) => write!(
                f,
                "Marked attendance for {} at {}",
                record.name,
                record.time_string()
            ),
            MarkOutcome::AlreadyMarked { name, date } => write!(
                f,
                "{name} is already marked for {}",
                date.format(DATE_FORMAT)
            ),
        }
    }
}

/// A stored row that could not be read as a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow {
    /// 1-based line number in the ledger file.
    pub line: usize,
    pub fields: Vec<String>,
}

/// Read-only snapshot of the ledger, in storage order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerView {
    /// Header fields, `None` when the ledger does not exist yet.
    pub header: Option<Vec<String>>,
    pub records: Vec<AttendanceRecord>,
    /// Rows skipped because they do not hold a name, a date and a time.
    pub malformed: Vec<MalformedRow>,
}

impl LedgerView {
    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.records.is_empty()
    }
}

/// File-backed attendance ledger stamped by a [`Clock`].
#[derive(Debug)]
pub struct Ledger<C = SystemClock> {
    path: PathBuf,
    clock: C,
}

impl Ledger<SystemClock> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, SystemClock)
    }
}

impl<C: Clock> Ledger<C> {
    pub fn with_clock(path: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Create the ledger with its header row if it is missing or empty.
    ///
    /// Safe to call on every start; an existing ledger is left untouched.
    pub fn initialize(&self) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }

        let needs_header = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(self.io_err(e)),
        };

        if needs_header {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| self.io_err(e))?;
            file.write_all(encode_row(&HEADER).as_bytes())
                .map_err(|e| self.io_err(e))?;
            tracing::info!(path = %self.path.display(), "created attendance ledger");
        }

        Ok(())
    }

    /// Mark `name` present for today's date.
    ///
    /// Scans all stored rows; if `name` already has a row dated today, returns
    /// [`MarkOutcome::AlreadyMarked`] without writing. Otherwise appends
    /// `(name, today, now)`.
    pub fn mark(&self, name: &str) -> Result<MarkOutcome, LedgerError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        // A line break would split the row on the next read.
        if name.chars().any(char::is_control) {
            return Err(ValidationError::InvalidName(name.to_string()).into());
        }

        let now = self.clock.now();
        let today = now.date();

        self.initialize()?;

        if self.has_row_for(name, &today.format(DATE_FORMAT).to_string())? {
            tracing::info!(name, date = %today, "already marked today");
            return Ok(MarkOutcome::AlreadyMarked {
                name: name.to_string(),
                date: today,
            });
        }

        let record = AttendanceRecord {
            name: name.to_string(),
            date: today,
            time: now.time(),
        };
        self.append(&record)?;

        tracing::info!(
            name,
            date = %record.date_string(),
            time = %record.time_string(),
            "marked attendance"
        );
        Ok(MarkOutcome::Marked(record))
    }

    /// Read every stored row. A missing ledger reads as empty.
    pub fn view(&self) -> Result<LedgerView, LedgerError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LedgerView::default()),
            Err(e) => return Err(self.io_err(e)),
        };

        let mut view = LedgerView::default();
        for (idx, line) in contents.lines().enumerate() {
            if idx == 0 {
                view.header = Some(split_row(line));
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_row(line);
            match parse_record(&fields) {
                Some(record) => view.records.push(record),
                None => {
                    tracing::warn!(line = idx + 1, fields = fields.len(), "skipping malformed ledger row");
                    view.malformed.push(MalformedRow {
                        line: idx + 1,
                        fields,
                    });
                }
            }
        }

        Ok(view)
    }

    /// Whether any stored row names `name` on `date`.
    ///
    /// Only the first two fields are compared, so a row that `view` would
    /// skip as malformed still blocks a second mark for that day.
    fn has_row_for(&self, name: &str, date: &str) -> Result<bool, LedgerError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(self.io_err(e)),
        };

        Ok(contents
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .map(split_row)
            .any(|fields| fields.len() >= 2 && fields[0] == name && fields[1] == date))
    }

    fn append(&self, record: &AttendanceRecord) -> Result<(), LedgerError> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;

        // A hand-edited ledger may lack the final newline.
        let mut prefix = "";
        let len = file.metadata().map_err(|e| self.io_err(e))?.len();
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::Start(len - 1))
                .and_then(|_| file.read_exact(&mut last))
                .map_err(|e| self.io_err(e))?;
            if last[0] != b'\n' {
                prefix = "\n";
            }
        }

        let date = record.date_string();
        let time = record.time_string();
        let row = encode_row(&[record.name.as_str(), date.as_str(), time.as_str()]);
        file.write_all(format!("{prefix}{row}").as_bytes())
            .map_err(|e| self.io_err(e))
    }

    fn io_err(&self, source: io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn parse_record(fields: &[String]) -> Option<AttendanceRecord> {
    if fields.len() != FIELD_COUNT {
        return None;
    }
    let date = NaiveDate::parse_from_str(&fields[1], DATE_FORMAT).ok()?;
    let time = NaiveTime::parse_from_str(&fields[2], TIME_FORMAT).ok()?;
    Some(AttendanceRecord {
        name: fields[0].clone(),
        date,
        time,
    })
}

/// Encode one row, quoting only fields that need it. Ends with `\n`.
fn encode_row(fields: &[&str]) -> String {
    let mut out = fields
        .iter()
        .map(|f| {
            if f.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", f.replace('"', "\"\""))
            } else {
                (*f).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",");
    out.push('\n');
    out
}

/// Split one line into fields, honouring `"quoted, fields"` and `""` escapes.
fn split_row(line: &str) -> Vec<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
