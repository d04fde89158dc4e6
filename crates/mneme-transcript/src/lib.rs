mod extract;
mod filter;
mod ingest;
mod load;

pub use extract::{extract_events, tool_summary, TranscriptEvent};
pub use filter::{classify_record, RecordKind};
pub use ingest::{ingest_transcript, IngestStats};
pub use load::{parse_records, LoadedRecords};
