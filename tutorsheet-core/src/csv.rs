//! Streaming parser for the spreadsheet CSV export.
//!
//! The export is comma separated with double-quote quoting. The parser never
//! fails: malformed trailing content is flushed as-is.

/// Parse delimited text into rows of trimmed cells.
///
/// - `""` inside a quoted field is a literal quote.
/// - `\n` and `\r\n` both end a row.
/// - Rows whose cells are all empty are dropped.
pub fn parse_delimited(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(ch),
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => row.push(take_cell(&mut field)),
            '\n' => {
                row.push(take_cell(&mut field));
                push_row(&mut rows, std::mem::take(&mut row));
            }
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                row.push(take_cell(&mut field));
                push_row(&mut rows, std::mem::take(&mut row));
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(take_cell(&mut field));
        push_row(&mut rows, row);
    }
    rows
}

fn take_cell(field: &mut String) -> String {
    let cell = field.trim().to_string();
    field.clear();
    cell
}

fn push_row(rows: &mut Vec<Vec<String>>, row: Vec<String>) {
    if row.iter().any(|cell| !cell.is_empty()) {
        rows.push(row);
    }
}
