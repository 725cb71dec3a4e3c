//! Delimited message spreadsheets: decoding, delimiter sniffing, column
//! discovery, and writing the augmented table back out.

use crate::ProblabelError;
use csv::{ReaderBuilder, WriterBuilder};
use std::io::Write;
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const HEADLINE_COLUMN: &str = "Заголовок";
pub const LINK_COLUMN: &str = "Ссылка";

pub const MESSAGE_COLUMN_CANDIDATES: &[&str] = &["Сообщение", "Сообщения", "сообщение", "text", "Текст"];
pub const PROBLEM_COLUMN_CANDIDATES: &[&str] = &["проблема", "problem", "Проблема"];
pub const PROBLEM_RU_COLUMN_CANDIDATES: &[&str] = &[
    "problem_russ",
    "problem_rus",
    "problem_ru",
    "проблема_ru",
    "проблема_rus",
    "проблема_рус",
    "проблема_перевод",
    "проблема (ru)",
    "перевод_проблемы",
];

/// Output column holding the first base-language label.
pub const BASE_PRIMARY_COLUMN: &str = "problem_russ";
/// Output column holding all base-language labels, `|`-joined.
pub const BASE_CANDIDATES_COLUMN: &str = "problem_russ_candidates";

pub fn lang_primary_column(lang: &str) -> String {
    format!("problem_{lang}")
}

pub fn lang_candidates_column(lang: &str) -> String {
    format!("problem_{lang}_candidates")
}

/// An in-memory table of string cells. Every row has `headers.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, ProblabelError> {
        if let Some(i) = rows.iter().position(|r| r.len() != headers.len()) {
            return Err(ProblabelError::Config(format!(
                "row {i} has {} cells, expected {}",
                rows[i].len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    pub fn load(path: &Path) -> Result<Self, ProblabelError> {
        if !path.exists() {
            return Err(ProblabelError::Config(format!("input not found: {}", path.display())));
        }
        let bytes = std::fs::read(path)?;
        let mut dataset = Self::from_bytes(&bytes)?;
        if dataset.column_index(HEADLINE_COLUMN).is_some() {
            let before = dataset.len();
            dataset.dedup_by(HEADLINE_COLUMN);
            if dataset.len() < before {
                log::info!("dropped {} rows with duplicate {HEADLINE_COLUMN}", before - dataset.len());
            }
        }
        Ok(dataset)
    }

    /// Parse raw file bytes: `;` first, `,` when `;` yields a single column.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProblabelError> {
        let text = decode(bytes);
        let dataset = parse_delimited(&text, b';')?;
        if dataset.headers.len() == 1 && dataset.headers[0].contains(',') {
            return parse_delimited(&text, b',');
        }
        Ok(dataset)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        &self.rows[row][column]
    }

    /// Replace a column's cells, or append the column if absent.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<(), ProblabelError> {
        if values.len() != self.rows.len() {
            return Err(ProblabelError::Config(format!(
                "column {name} has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Keep the first row for each distinct value of `column`.
    pub fn dedup_by(&mut self, column: &str) {
        let Some(idx) = self.column_index(column) else { return };
        let mut seen = std::collections::HashSet::new();
        self.rows.retain(|r| seen.insert(r[idx].clone()));
    }

    /// `;`-delimited, UTF-8 with BOM so spreadsheet apps pick the encoding up.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<(), ProblabelError> {
        out.write_all(UTF8_BOM)?;
        let mut writer = WriterBuilder::new().delimiter(b';').from_writer(out);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ProblabelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.write_to(std::io::BufWriter::new(file))
    }
}

/// UTF-8 (BOM optional), else windows-1251.
fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text.into_owned(),
        None => {
            log::info!("input is not valid UTF-8, decoding as windows-1251");
            let (text, _) = encoding_rs::WINDOWS_1251.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

fn parse_delimited(text: &str, delimiter: u8) -> Result<Dataset, ProblabelError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        if record.len() != headers.len() {
            skipped += 1;
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    if skipped > 0 {
        log::warn!("skipped {skipped} malformed rows");
    }
    Ok(Dataset { headers, rows })
}

/// Where the interesting columns live in a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    pub message: String,
    /// Raw label column. Falls back to `problem_ru` when absent.
    pub problem: Option<String>,
    /// Secondary (translated/alternate) label column.
    pub problem_ru: Option<String>,
    pub link: Option<String>,
}

fn detect_column(dataset: &Dataset, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|c| dataset.column_index(c).is_some())
        .map(|c| c.to_string())
}

pub fn detect_columns(dataset: &Dataset, require_problem: bool) -> Result<Columns, ProblabelError> {
    let problem_ru = detect_column(dataset, PROBLEM_RU_COLUMN_CANDIDATES);
    let problem = detect_column(dataset, PROBLEM_COLUMN_CANDIDATES).or_else(|| problem_ru.clone());
    if problem.is_none() && require_problem {
        return Err(ProblabelError::Config(format!(
            "no problem label column found (expected one of {})",
            PROBLEM_COLUMN_CANDIDATES.join(", ")
        )));
    }
    let message = detect_column(dataset, MESSAGE_COLUMN_CANDIDATES).ok_or_else(|| {
        ProblabelError::Config(format!(
            "no message column found (expected one of {})",
            MESSAGE_COLUMN_CANDIDATES.join(", ")
        ))
    })?;
    let link = dataset.column_index(LINK_COLUMN).map(|_| LINK_COLUMN.to_string());

    Ok(Columns {
        message,
        problem,
        problem_ru,
        link,
    })
}

/// `<dir>/<stem>_classified.csv` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    input.with_file_name(format!("{stem}_classified.csv"))
}
