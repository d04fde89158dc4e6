//! Main Document store (`main.md`).

use crate::fsio::{read_optional, write_atomic};
use crate::lock::FileLock;
use crate::repository::Repository;
use mneme_core::main_md::MainDocument;
use mneme_core::{MainSection, MemoryError, Result};
use tracing::info;

impl Repository {
    pub fn main_document(&self) -> Result<MainDocument> {
        let path = &self.paths.main_md;
        let content = read_optional(path)?
            .ok_or_else(|| MemoryError::corrupt(path, "main document is missing"))?;
        MainDocument::parse(&content, path)
    }

    /// Section content, or the unset placeholder.
    pub fn main_section(&self, section: MainSection) -> Result<String> {
        Ok(self.main_document()?.get_or_placeholder(section).to_string())
    }

    /// Replace one section wholesale.
    pub fn update_main(&self, section: MainSection, content: &str) -> Result<()> {
        let _lock = FileLock::acquire(&self.paths.main_lock, self.config.lock_timeout())?;
        let mut doc = self.main_document()?;
        doc.set(section, content);
        write_atomic(&self.paths.main_md, doc.render().as_bytes())?;
        info!(section = %section, bytes = content.len(), "main document updated");
        Ok(())
    }
}
