//! Tabular reader: turns uploaded CSV or Excel bytes into a table of raw cells.

use std::io::Cursor;

use calamine::{Data, DataType, Reader, Xlsx};
use chrono::Timelike;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::AppError;

static ACADEMIC_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(20\d{2})[-_](20\d{2})").expect("valid academic year regex"));
static LEVEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^A-Za-z0-9])(FI[EA]\d)(?:[^A-Za-z0-9]|$)").expect("valid level regex")
});
static SEMESTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^A-Za-z0-9])(S\d{1,2})(?:[^A-Za-z0-9]|$)").expect("valid semester regex")
});

const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Xlsx,
}

impl FileFormat {
    /// Detect the format from a file name extension.
    pub fn from_filename(name: &str) -> Result<Self, AppError> {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" => Ok(FileFormat::Xlsx),
            _ => Err(AppError::UnsupportedFormat(format!(
                "Unsupported file type for '{}': only .csv and .xlsx are accepted",
                name
            ))),
        }
    }
}

/// A parsed table: verbatim headers plus rows of optional raw cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn push_row(&mut self, cells: Vec<Option<String>>) {
        if cells.iter().all(Option::is_none) {
            return;
        }
        let mut row = cells;
        row.resize(self.headers.len(), None);
        self.rows.push(row);
    }
}

/// Academic year, level and semester hints carried by an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchMetadata {
    pub academic_year: Option<(i32, i32)>,
    pub level: Option<String>,
    pub semester: Option<String>,
}

impl BatchMetadata {
    /// Detect metadata from a file name such as `heures_FIE3_S1_2023-2024.csv`.
    pub fn from_filename(name: &str) -> Self {
        let academic_year = ACADEMIC_YEAR_RE.captures(name).and_then(|caps| {
            let start = caps.get(1)?.as_str().parse().ok()?;
            let end = caps.get(2)?.as_str().parse().ok()?;
            Some((start, end))
        });
        let level = LEVEL_RE
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_uppercase());
        let semester = SEMESTER_RE
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_uppercase());

        Self {
            academic_year,
            level,
            semester,
        }
    }

    /// Replace detected values with explicit ones where provided.
    pub fn override_with(mut self, other: BatchMetadata) -> Self {
        if other.academic_year.is_some() {
            self.academic_year = other.academic_year;
        }
        if other.level.is_some() {
            self.level = other.level;
        }
        if other.semester.is_some() {
            self.semester = other.semester;
        }
        self
    }
}

/// One parsed upload, alive for the duration of a request.
#[derive(Debug, Clone)]
pub struct UploadBatch {
    pub filename: String,
    pub format: FileFormat,
    pub table: Table,
    pub metadata: BatchMetadata,
}

impl UploadBatch {
    pub fn parse(filename: &str, bytes: &[u8]) -> Result<Self, AppError> {
        let format = FileFormat::from_filename(filename)?;
        let table = read_table(bytes, format)?;
        tracing::info!(
            "Parsed upload '{}' ({:?}): {} columns, {} rows",
            filename,
            format,
            table.headers.len(),
            table.len()
        );

        Ok(Self {
            filename: filename.to_string(),
            format,
            table,
            metadata: BatchMetadata::from_filename(filename),
        })
    }
}

/// Parse raw bytes of the given format into a table.
pub fn read_table(bytes: &[u8], format: FileFormat) -> Result<Table, AppError> {
    match format {
        FileFormat::Csv => read_csv(bytes),
        FileFormat::Xlsx => read_xlsx(bytes),
    }
}

fn read_csv(bytes: &[u8]) -> Result<Table, AppError> {
    let text = decode_text(bytes);
    let header_line = text.lines().find(|line| !line.trim().is_empty());
    let delimiter = header_line.and_then(detect_delimiter);

    let table = match parse_with_csv(&text, delimiter.unwrap_or(b',')) {
        Ok(table) => table,
        Err(err) => {
            tracing::warn!("CSV parser failed ({}), falling back to line split", err);
            split_lines(&text, delimiter.unwrap_or(b','))
        }
    };

    if delimiter.is_none() && table.is_empty() {
        return Err(AppError::MalformedFile(
            "Could not detect a delimiter and no rows were found".to_string(),
        ));
    }

    Ok(table)
}

/// Decode as UTF-8, falling back to Windows-1252 for spreadsheets exported on Windows.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            tracing::debug!("Upload is not UTF-8, decoded as Windows-1252");
            text.into_owned()
        }
    }
}

/// Pick the most frequent candidate delimiter in the header line.
fn detect_delimiter(line: &str) -> Option<u8> {
    DELIMITERS
        .iter()
        .map(|&d| (d, line.bytes().filter(|&b| b == d).count()))
        .filter(|&(_, count)| count > 0)
        .fold(None, |best: Option<(u8, usize)>, candidate| match best {
            Some(b) if b.1 >= candidate.1 => Some(b),
            _ => Some(candidate),
        })
        .map(|(d, _)| d)
}

fn parse_with_csv(text: &str, delimiter: u8) -> Result<Table, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut table = Table {
        headers,
        rows: Vec::new(),
    };

    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(raw_cell).collect());
    }

    Ok(table)
}

/// Last resort for content the CSV parser rejects: plain split on the delimiter.
fn split_lines(text: &str, delimiter: u8) -> Table {
    let delimiter = delimiter as char;
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let Some(header_line) = lines.next() else {
        return Table::default();
    };

    let unquote = |s: &str| s.trim().trim_matches('"').trim().to_string();
    let mut table = Table {
        headers: header_line.split(delimiter).map(unquote).collect(),
        rows: Vec::new(),
    };

    for line in lines {
        table.push_row(line.split(delimiter).map(|s| raw_cell(&unquote(s))).collect());
    }

    table
}

fn raw_cell(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn read_xlsx(bytes: &[u8]) -> Result<Table, AppError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|e| AppError::MalformedFile(format!("Unreadable Excel workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::MalformedFile("Workbook contains no worksheet".to_string()))?
        .map_err(|e| AppError::MalformedFile(format!("Unreadable worksheet: {}", e)))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Err(AppError::MalformedFile(
            "The first worksheet is empty".to_string(),
        ));
    };

    let mut table = Table {
        headers: header_row
            .iter()
            .map(|cell| excel_cell(cell).unwrap_or_default())
            .collect(),
        rows: Vec::new(),
    };

    for row in rows {
        table.push_row(row.iter().map(excel_cell).collect());
    }

    Ok(table)
}

fn excel_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => raw_cell(s),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 => {
                Some(dt.format("%Y-%m-%d").to_string())
            }
            Some(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => raw_cell(&cell.to_string()),
        },
        other => raw_cell(&other.to_string()),
    }
}
