//! Chained progress summaries.
//!
//! A commit's previous-progress summary is a pure function of the commits
//! before it: the newest `recent` contributions verbatim (collapsed to one
//! line and clipped), plus one compacted sentence naming everything older.
//! The result stays within `older_chars + recent * (item_chars + 100)` bytes
//! however long the branch gets.

use crate::text::{clip, one_line};
use crate::types::Commit;
use serde::{Deserialize, Serialize};

/// Summary used for the first commit on a branch.
pub const INITIAL_SUMMARY: &str = "Initial commit; no prior progress.";

const TITLE_CHARS: usize = 80;
// "; ... and N more"
const MORE_SUFFIX_CHARS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainPolicy {
    /// Contributions kept verbatim.
    pub recent: usize,
    /// Clip for each verbatim contribution.
    pub item_chars: usize,
    /// Budget for the compacted sentence covering older commits.
    pub older_chars: usize,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            recent: 3,
            item_chars: 280,
            older_chars: 400,
        }
    }
}

/// Fold `prior` (oldest first) into a bounded summary.
pub fn fold_progress(prior: &[Commit], policy: &ChainPolicy) -> String {
    if prior.is_empty() {
        return INITIAL_SUMMARY.to_string();
    }
    let keep = policy.recent.max(1).min(prior.len());
    let (older, recent) = prior.split_at(prior.len() - keep);

    let mut lines = Vec::with_capacity(keep + 1);
    if !older.is_empty() {
        lines.push(compact_older(older, policy.older_chars));
    }
    for c in recent {
        let title = clip(&one_line(&c.title), TITLE_CHARS);
        let contribution = clip(&one_line(&c.contribution), policy.item_chars);
        lines.push(format!("#{} {title}: {contribution}", c.seq));
    }
    lines.join("\n")
}

fn compact_older(older: &[Commit], budget: usize) -> String {
    let first = older.first().map(|c| c.seq).unwrap_or(1);
    let last = older.last().map(|c| c.seq).unwrap_or(first);
    let mut out = format!("Earlier progress (commits {first}-{last}): ");

    let mut listed = 0;
    for c in older {
        let title = clip(&one_line(&c.title), TITLE_CHARS);
        let sep = if listed == 0 { "" } else { "; " };
        let reserve = if listed + 1 < older.len() { MORE_SUFFIX_CHARS } else { 1 };
        if listed > 0 && out.len() + sep.len() + title.len() + reserve > budget {
            break;
        }
        out.push_str(sep);
        out.push_str(&title);
        listed += 1;
    }
    if listed < older.len() {
        out.push_str(&format!("; ... and {} more", older.len() - listed));
    } else {
        out.push('.');
    }
    out
}
