use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::PipelineError;

const DELIMITER: char = ',';
const QUOTE: char = '"';

/// Rectangular-ish grid of trimmed cells. Rows may be ragged; reads past the
/// end of a row yield "".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Matrix {
    rows: Vec<Vec<String>>,
}

impl Matrix {
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Option<&[String]> {
        self.rows.get(idx).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Write the grid back out with the same delimiter and quoting rules,
    /// quoting only where needed. Ragged rows stay ragged.
    pub fn to_csv(&self) -> Result<String, PipelineError> {
        let mut writer = WriterBuilder::new()
            .flexible(true)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        for row in &self.rows {
            writer.write_record(row).map_err(encode_error)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| encode_error(e.into_error()))?;
        String::from_utf8(bytes).map_err(encode_error)
    }
}

fn encode_error(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::MalformedInput(format!("could not re-encode matrix: {}", e))
}

/// Single pass over the raw export text: quotes toggle state, `""` inside a
/// quoted field is a literal quote, `\r` is always dropped.
pub fn parse(text: &str) -> Result<Matrix, PipelineError> {
    if text
        .trim_matches(|c: char| c.is_control() || c.is_whitespace())
        .is_empty()
    {
        return Err(PipelineError::MalformedInput("empty tabular text".into()));
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    // False right after a row-ending newline, so a trailing newline adds no row.
    let mut pending = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\r' {
            pending = true;
        }
        match ch {
            QUOTE if in_quotes && chars.peek() == Some(&QUOTE) => {
                field.push(QUOTE);
                chars.next();
            }
            QUOTE => in_quotes = !in_quotes,
            DELIMITER if !in_quotes => row.push(take_trimmed(&mut field)),
            '\n' if !in_quotes => {
                row.push(take_trimmed(&mut field));
                rows.push(std::mem::take(&mut row));
                pending = false;
            }
            '\r' => {}
            _ => field.push(ch),
        }
    }
    if pending {
        row.push(take_trimmed(&mut field));
        rows.push(row);
    }

    Ok(Matrix { rows })
}

fn take_trimmed(field: &mut String) -> String {
    let cell = field.trim().to_string();
    field.clear();
    cell
}
