//! Corpus file loading.

use std::path::Path;

use tracing::info;

use hybrid_core::{HybridError, NewDocument, Result};

/// Read corpus records from a JSON Lines file, or a JSON array file.
pub fn load_corpus(path: impl AsRef<Path>) -> Result<Vec<NewDocument>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let records = parse_corpus(&content)?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse corpus text.
///
/// Text starting with `[` is read as one JSON array. Anything else is JSON
/// Lines, one `{title, content, source, document_type}` object per line;
/// blank lines are skipped.
pub fn parse_corpus(content: &str) -> Result<Vec<NewDocument>> {
    if content.trim_start().starts_with('[') {
        return serde_json::from_str(content)
            .map_err(|e| HybridError::invalid_argument(format!("malformed corpus array: {}", e)));
    }

    let mut records = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: NewDocument = serde_json::from_str(line).map_err(|e| {
            HybridError::invalid_argument(format!("malformed corpus line {}: {}", idx + 1, e))
        })?;
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_jsonl_skips_blank_lines() {
        let text = r#"{"title":"A","content":"revenue growth","source":"synthetic","document_type":"annual_report"}

{"title":"B","content":"digital transformation"}
"#;
        let records = parse_corpus(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].document_type, "annual_report");
        assert_eq!(records[1].source, "");
    }

    #[test]
    fn test_malformed_line_is_named() {
        let text = "{\"title\":\"A\",\"content\":\"ok\"}\n{not json}\n";
        let err = parse_corpus(text).unwrap_err();
        assert!(matches!(err, HybridError::InvalidArgument { .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_json_array() {
        let text = r#"[{"title":"A","content":"one"},{"title":"B","content":"two"}]"#;
        let records = parse_corpus(text).unwrap();
        assert_eq!(records[1].title, "B");
    }

    #[test]
    fn test_empty_corpus() {
        assert!(parse_corpus("").unwrap().is_empty());
        assert!(parse_corpus("[]").unwrap().is_empty());
    }

    #[test]
    fn test_load_corpus_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(&path, "{\"title\":\"A\",\"content\":\"revenue growth\"}\n").unwrap();

        let records = load_corpus(&path).unwrap();
        assert_eq!(records.len(), 1);

        let err = load_corpus(dir.path().join("missing.jsonl")).unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
