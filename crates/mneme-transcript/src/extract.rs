use crate::filter::{classify_record, RecordKind};
use mneme_core::text::clip;
use mneme_core::Role;
use serde_json::Value;

const PAYLOAD_CHARS: usize = 2000;
const COMMAND_CHARS: usize = 80;

/// One OTA event pulled out of a transcript record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    /// Index of the content block within the record; part of the dedup key.
    pub block: usize,
    pub role: Role,
    pub payload: String,
}

fn get_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

/// Events in one record: user text is an Observation, assistant text a
/// Thought, and each assistant `tool_use` block an Action. Tool results,
/// thinking blocks and empty text are skipped.
pub fn extract_events(record: &Value) -> Vec<TranscriptEvent> {
    let kind = classify_record(record);
    let text_role = match kind {
        RecordKind::User => Role::Observation,
        RecordKind::Assistant => Role::Thought,
        RecordKind::Skip => return Vec::new(),
    };
    let content = record
        .get("message")
        .and_then(|m| m.get("content"))
        .or_else(|| record.get("content"));

    let mut out = Vec::new();
    match content {
        Some(Value::String(s)) => push_text(&mut out, 0, text_role, s),
        Some(Value::Array(blocks)) => {
            for (i, block) in blocks.iter().enumerate() {
                match get_str(block, "type") {
                    Some("text") => {
                        push_text(&mut out, i, text_role, get_str(block, "text").unwrap_or(""))
                    }
                    Some("tool_use") if kind == RecordKind::Assistant => {
                        let name = get_str(block, "name").unwrap_or("tool");
                        let input = block.get("input").cloned().unwrap_or(Value::Null);
                        out.push(TranscriptEvent {
                            block: i,
                            role: Role::Action,
                            payload: tool_summary(name, &input),
                        });
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    out
}

fn push_text(out: &mut Vec<TranscriptEvent>, block: usize, role: Role, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    out.push(TranscriptEvent {
        block,
        role,
        payload: clip(text, PAYLOAD_CHARS),
    });
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// One-line summary of a tool call.
pub fn tool_summary(name: &str, input: &Value) -> String {
    let lower = name.to_lowercase();
    match name {
        "Edit" | "Write" | "MultiEdit" | "NotebookEdit" | "ApplyPatch" => {
            match get_str(input, "file_path").or_else(|| get_str(input, "path")) {
                Some(p) if !p.is_empty() => format!("{lower}: {}", file_name(p)),
                _ => lower,
            }
        }
        "Bash" => {
            if let Some(desc) = get_str(input, "description").filter(|d| !d.is_empty()) {
                return desc.to_string();
            }
            let cmd = get_str(input, "command")
                .and_then(|c| c.trim().lines().next())
                .unwrap_or("");
            if cmd.is_empty() {
                "bash command".to_string()
            } else {
                clip(cmd, COMMAND_CHARS)
            }
        }
        "Read" | "Glob" => {
            match get_str(input, "file_path").or_else(|| get_str(input, "pattern")) {
                Some(t) if !t.is_empty() => format!("{lower}: {}", file_name(t)),
                _ => lower,
            }
        }
        "Grep" => match get_str(input, "pattern") {
            Some(p) if !p.is_empty() => format!("grep: {}", clip(p, 60)),
            _ => "grep".to_string(),
        },
        "Task" => match get_str(input, "description") {
            Some(d) if !d.is_empty() => format!("task: {d}"),
            _ => "task delegated".to_string(),
        },
        _ => lower,
    }
}
