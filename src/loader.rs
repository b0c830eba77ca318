use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use tracing::{debug, info};

use crate::data::Dataset;
use crate::error::LoadError;

pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_XLS: &str = "application/vnd.ms-excel";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_JSON: &str = "application/json";

const DELIMITER_CANDIDATES: &[u8] = &[b',', b';', b'\t', b'|'];
const SNIFF_LINES: usize = 10;

/// Guess the text encoding of raw bytes: byte-order mark first, then
/// statistical detection.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

/// Decode bytes with the given encoding. Malformed sequences are an error
/// rather than being replaced.
pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> Result<String, LoadError> {
    let body = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => &bytes[bom_len..],
        _ => bytes,
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
        .ok_or(LoadError::Decode {
            encoding: encoding.name(),
        })
}

/// Pick the delimiter whose per-line count is consistent over the first
/// lines. Falls back to the most frequent candidate on the header line, then
/// to a comma.
pub fn detect_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    if lines.is_empty() {
        return b',';
    }

    let mut best: Option<(u8, usize)> = None;
    for &candidate in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| count_unquoted(l, candidate))
            .collect();
        let first = counts[0];
        if first == 0 || counts.iter().any(|&c| c != first) {
            continue;
        }
        if best.map_or(true, |(_, n)| first > n) {
            best = Some((candidate, first));
        }
    }
    if let Some((delimiter, _)) = best {
        return delimiter;
    }

    DELIMITER_CANDIDATES
        .iter()
        .map(|&c| (c, count_unquoted(lines[0], c)))
        .filter(|&(_, n)| n > 0)
        .max_by_key(|&(_, n)| n)
        .map(|(c, _)| c)
        .unwrap_or(b',')
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for &b in line.as_bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

pub fn is_spreadsheet_mime(mime: &str) -> bool {
    let mime = mime.trim().to_ascii_lowercase();
    mime == MIME_XLSX || mime == MIME_XLS
}

/// MIME type guessed from a file extension.
pub fn mime_from_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("xlsx") | Some("xlsm") => MIME_XLSX,
        Some("xls") => MIME_XLS,
        Some("json") => MIME_JSON,
        _ => MIME_CSV,
    }
}

/// Parse an uploaded file into a dataset. Spreadsheet MIME types go through
/// the workbook reader, anything else is treated as delimited text.
pub fn load_bytes(bytes: &[u8], mime: &str) -> Result<Dataset, LoadError> {
    if bytes.is_empty() {
        return Err(LoadError::Empty);
    }
    let dataset = if is_spreadsheet_mime(mime) {
        load_spreadsheet(bytes)?
    } else if mime.trim().eq_ignore_ascii_case(MIME_JSON) {
        load_json(bytes)?
    } else {
        load_csv(bytes)?
    };
    info!(
        rows = dataset.n_rows(),
        columns = dataset.n_cols(),
        mime,
        "dataset loaded"
    );
    Ok(dataset)
}

/// Read a file from disk and load it, guessing the MIME type from the
/// extension when none is given.
pub fn load_path(path: &Path, mime: Option<&str>) -> Result<Dataset, LoadError> {
    let bytes = std::fs::read(path)?;
    let mime = mime.unwrap_or_else(|| mime_from_path(path));
    debug!(path = %path.display(), mime, "reading dataset");
    load_bytes(&bytes, mime)
}

fn load_csv(bytes: &[u8]) -> Result<Dataset, LoadError> {
    let encoding = detect_encoding(bytes);
    let text = decode(bytes, encoding)?;
    let delimiter = detect_delimiter(&text);
    debug!(
        encoding = encoding.name(),
        delimiter = %(delimiter as char).escape_default(),
        "sniffed csv"
    );

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(LoadError::Empty);
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != headers.len() {
            return Err(LoadError::Ragged {
                row: idx + 1,
                found: record.len(),
                expected: headers.len(),
            });
        }
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }
    if rows.is_empty() {
        return Err(LoadError::NoRows);
    }

    Ok(Dataset::from_rows(headers, rows))
}

/// JSON array of objects; keys of the first object are the header.
fn load_json(bytes: &[u8]) -> Result<Dataset, LoadError> {
    let text = decode(bytes, detect_encoding(bytes))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| LoadError::Json(e.to_string()))?;
    Dataset::from_json(&value).map_err(|e| LoadError::Json(format!("{:#}", e)))
}

fn load_spreadsheet(bytes: &[u8]) -> Result<Dataset, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| LoadError::Spreadsheet(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LoadError::Spreadsheet("workbook has no worksheets".to_string()))?
        .map_err(|e| LoadError::Spreadsheet(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(cell_text).collect(),
        None => return Err(LoadError::Empty),
    };
    let body: Vec<Vec<String>> = rows
        .map(|r| r.iter().map(cell_text).collect())
        .filter(|r: &Vec<String>| r.iter().any(|c| !c.is_empty()))
        .collect();
    if body.is_empty() {
        return Err(LoadError::NoRows);
    }

    Ok(Dataset::from_rows(headers, body))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        _ => cell.as_string().unwrap_or_else(|| cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3\n"), b',');
        assert_eq!(detect_delimiter("a;b;c\n1,5;2,5;3\n"), b';');
        assert_eq!(detect_delimiter("a\tb\n1\t2\n"), b'\t');
        assert_eq!(detect_delimiter("a|b\n1|2\n"), b'|');
        assert_eq!(detect_delimiter("single\n1\n"), b',');
    }

    #[test]
    fn test_delimiter_ignores_quoted() {
        assert_eq!(detect_delimiter("name;note\n\"a,b,c\";x\n"), b';');
    }

    #[test]
    fn test_load_simple_csv() {
        let ds = load_bytes(b"x,y\n1,2\n3,4\n5,6\n", MIME_CSV).unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.n_cols(), 2);
    }

    #[test]
    fn test_load_latin1() {
        // "café" in windows-1252
        let bytes = b"name,price\ncaf\xe9,3\nth\xe9,2\n";
        let ds = load_bytes(bytes, MIME_CSV).unwrap();
        let names = ds.column("name").unwrap();
        assert_eq!(names.cells()[0], "café");
    }

    #[test]
    fn test_load_utf8_bom() {
        let bytes = b"\xef\xbb\xbfa,b\n1,2\n";
        let ds = load_bytes(bytes, MIME_CSV).unwrap();
        assert_eq!(ds.headers(), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(load_bytes(b"", MIME_CSV), Err(LoadError::Empty)));
    }

    #[test]
    fn test_header_only() {
        assert!(matches!(load_bytes(b"a,b\n", MIME_CSV), Err(LoadError::NoRows)));
    }

    #[test]
    fn test_ragged_rows() {
        let err = load_bytes(b"a,b\n1,2\n3\n", MIME_CSV).unwrap_err();
        match err {
            LoadError::Ragged { row, found, expected } => {
                assert_eq!(row, 2);
                assert_eq!(found, 1);
                assert_eq!(expected, 2);
            }
            other => panic!("Expected Ragged, got {:?}", other),
        }
    }

    #[test]
    fn test_spreadsheet_mime_rejects_csv_bytes() {
        let err = load_bytes(b"a,b\n1,2\n", MIME_XLSX).unwrap_err();
        assert!(matches!(err, LoadError::Spreadsheet(_)));
    }

    #[test]
    fn test_mime_from_path() {
        assert_eq!(mime_from_path(Path::new("data.XLSX")), MIME_XLSX);
        assert_eq!(mime_from_path(Path::new("data.xls")), MIME_XLS);
        assert_eq!(mime_from_path(Path::new("data.csv")), MIME_CSV);
        assert_eq!(mime_from_path(Path::new("rows.json")), MIME_JSON);
    }

    #[test]
    fn test_load_json_records() {
        let json = br#"[{"day": "Thu", "total": 10.5}, {"day": "Fri", "total": 12}]"#;
        let ds = load_bytes(json, MIME_JSON).unwrap();
        assert_eq!(ds.n_rows(), 2);
        assert!(ds.column("total").unwrap().is_numeric());
        assert!(matches!(load_bytes(b"{}", MIME_JSON), Err(LoadError::Json(_))));
    }
}
