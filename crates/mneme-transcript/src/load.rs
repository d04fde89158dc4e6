use serde_json::Value;
use tracing::debug;

/// Keys under which whole-document transcripts nest their records.
const WRAPPER_KEYS: &[&str] = &["turns", "messages", "events"];

/// Records parsed out of one transcript file.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<Value>,
    /// JSONL lines that were not valid JSON.
    pub skipped: usize,
}

/// Parse transcript text.
///
/// A file that is one JSON document is read as an array of records, as an
/// object wrapping one under `turns`, `messages` or `events`, or as a single
/// record. Anything else is read as JSONL, one record per non-blank line.
pub fn parse_records(text: &str) -> LoadedRecords {
    let head = text.trim_start();
    if head.starts_with('[') || head.starts_with('{') {
        if let Ok(doc) = serde_json::from_str::<Value>(text) {
            return LoadedRecords {
                records: unwrap_document(doc),
                skipped: 0,
            };
        }
    }

    let mut loaded = LoadedRecords::default();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(v) => loaded.records.push(v),
            Err(e) => {
                debug!(line = line_no + 1, error = %e, "skipping unparsable transcript line");
                loaded.skipped += 1;
            }
        }
    }
    loaded
}

fn unwrap_document(doc: Value) -> Vec<Value> {
    match doc {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in WRAPPER_KEYS {
                if matches!(map.get(*key), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = map.remove(*key) {
                        return items;
                    }
                }
            }
            vec![Value::Object(map)]
        }
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsonl_skips_bad_lines() {
        let loaded = parse_records("{\"role\":\"user\"}\n\nnot json\n{\"role\":\"assistant\"}\n");
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.skipped, 1);
    }

    #[test]
    fn array_document() {
        let loaded = parse_records("[\n  {\"role\": \"user\"},\n  {\"role\": \"assistant\"}\n]");
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.skipped, 0);
    }

    #[test]
    fn wrapped_documents() {
        for key in ["turns", "messages", "events"] {
            let text = format!("{{\"session\": \"s1\", \"{key}\": [{{\"role\": \"user\"}}]}}");
            let loaded = parse_records(&text);
            assert_eq!(loaded.records, [serde_json::json!({"role": "user"})], "{key}");
        }
    }

    #[test]
    fn single_object_is_one_record() {
        let loaded = parse_records("{\"role\": \"user\", \"messages\": \"not a list\"}");
        assert_eq!(loaded.records.len(), 1);
    }
}
