use mneme_core::clock::{format_rfc3339, parse_rfc3339};
use serde_json::Value;
use time::{OffsetDateTime, UtcOffset};

/// Who produced a transcript record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    User,
    Assistant,
    Skip,
}

/// Classify a transcript JSONL record.
///
/// Claude-style records carry `type`; plain exports carry `role`. Meta
/// records (`isMeta`), summaries, progress and system records are skipped.
pub fn classify_record(json: &Value) -> RecordKind {
    if json.get("isMeta").and_then(Value::as_bool) == Some(true) {
        return RecordKind::Skip;
    }
    let kind = json
        .get("type")
        .and_then(Value::as_str)
        .or_else(|| json.get("role").and_then(Value::as_str))
        .unwrap_or("");
    match kind {
        "user" | "human" => RecordKind::User,
        "assistant" => RecordKind::Assistant,
        _ => RecordKind::Skip,
    }
}

/// Normalize a record timestamp to RFC 3339 UTC.
///
/// Accepts RFC 3339 strings, naive `YYYY-MM-DDTHH:MM:SS` strings (read as
/// UTC) and unix epochs in seconds or milliseconds.
pub fn normalize_timestamp(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => {
            let ts = match parse_rfc3339(s) {
                Some(ts) => ts,
                None => parse_rfc3339(&format!("{}Z", s.get(..19)?))?,
            };
            Some(format_rfc3339(ts.to_offset(UtcOffset::UTC)))
        }
        Value::Number(n) => {
            let mut secs = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            if secs > 1_000_000_000_000 {
                secs /= 1000;
            }
            OffsetDateTime::from_unix_timestamp(secs)
                .ok()
                .map(format_rfc3339)
        }
        _ => None,
    }
}

/// First timestamp-looking field of a record that normalizes.
pub fn record_timestamp(record: &Value) -> Option<String> {
    ["timestamp", "ts", "time"]
        .iter()
        .find_map(|key| normalize_timestamp(record.get(*key)))
}
