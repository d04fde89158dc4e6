//! `main.md` codec: the project roadmap, one block per fixed section.

use crate::error::{MemoryError, Result};
use crate::text::{push_block, skip_blank, split_lines, take_block};
use crate::types::MainSection;
use std::collections::BTreeMap;
use std::path::Path;

const TITLE: &str = "# Project Context";
const UNSET: &str = "<!-- unset -->";

/// Placeholder shown for a section that was never written.
pub const UNSET_PLACEHOLDER: &str = "(unset)";

/// Section-keyed project roadmap. Sections are replaced whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainDocument {
    sections: BTreeMap<MainSection, String>,
}

impl MainDocument {
    pub fn get(&self, section: MainSection) -> Option<&str> {
        self.sections.get(&section).map(String::as_str)
    }

    /// Content, or [`UNSET_PLACEHOLDER`] when the section was never written.
    pub fn get_or_placeholder(&self, section: MainSection) -> &str {
        self.get(section).unwrap_or(UNSET_PLACEHOLDER)
    }

    pub fn set(&mut self, section: MainSection, content: impl Into<String>) {
        self.sections.insert(section, content.into());
    }

    /// Sections in fixed rendering order.
    pub fn iter(&self) -> impl Iterator<Item = (MainSection, Option<&str>)> + '_ {
        MainSection::ALL.into_iter().map(|s| (s, self.get(s)))
    }

    pub fn render(&self) -> String {
        let mut out = format!("{TITLE}\n\n");
        for (section, content) in self.iter() {
            out.push_str(&format!("## {}\n", section.title()));
            match content {
                Some(text) => push_block(&mut out, text),
                None => out.push_str(&format!("{UNSET}\n\n")),
            }
        }
        out
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let bad = |reason: String| MemoryError::corrupt(path, reason);
        let lines = split_lines(content);
        let mut idx = 0;
        if lines.first() == Some(&TITLE) {
            idx += 1;
        }
        skip_blank(&lines, &mut idx);

        let mut doc = MainDocument::default();
        let mut seen = Vec::new();
        while idx < lines.len() {
            let heading = lines[idx]
                .strip_prefix("## ")
                .ok_or_else(|| bad(format!("line {}: expected section heading", idx + 1)))?;
            let section = MainSection::ALL
                .into_iter()
                .find(|s| s.title() == heading)
                .ok_or_else(|| bad(format!("unknown section {heading:?}")))?;
            if seen.contains(&section) {
                return Err(bad(format!("duplicate section {heading:?}")));
            }
            seen.push(section);
            idx += 1;

            if lines.get(idx) == Some(&UNSET) {
                idx += 1;
                if lines.get(idx).is_some_and(|l| !l.is_empty()) {
                    return Err(bad(format!("line {}: expected blank line", idx + 1)));
                }
                idx += 1;
            } else {
                let text = take_block(&lines, &mut idx).map_err(&bad)?;
                doc.set(section, text);
            }
            skip_blank(&lines, &mut idx);
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_renders_every_section_unset() {
        let doc = MainDocument::default();
        let text = doc.render();
        assert!(text.starts_with("# Project Context\n\n## Purpose\n<!-- unset -->\n"));
        let order: Vec<usize> = MainSection::ALL
            .iter()
            .map(|s| text.find(&format!("## {}\n", s.title())).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(doc.get_or_placeholder(MainSection::Todo), UNSET_PLACEHOLDER);
    }

    #[test]
    fn render_then_parse_is_identity() {
        let mut doc = MainDocument::default();
        doc.set(MainSection::Purpose, "Build a memory store for agents.");
        doc.set(MainSection::Todo, "- wire hooks\n- backfill\n# not a heading");
        doc.set(MainSection::PendingQuestions, "");
        let parsed = MainDocument::parse(&doc.render(), Path::new("main.md")).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(parsed.get(MainSection::Milestones), None);
        assert_eq!(parsed.get(MainSection::PendingQuestions), Some(""));
    }

    #[test]
    fn unknown_section_is_corrupt() {
        let text = "# Project Context\n\n## Status\nfine\n\n";
        assert!(MainDocument::parse(text, Path::new("main.md")).is_err());
    }
}
