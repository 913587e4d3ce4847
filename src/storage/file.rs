//! File-backed storage: one JSON object of string entries on disk.
//!
//! DESIGN
//! ======
//! Reads always hit the file, so entries removed by another process (or by
//! hand) are observed on the next read. Writes are read-modify-write cycles
//! serialised by an in-process mutex and committed through a temp file plus
//! rename, so a crash mid-write leaves the previous document intact.
//!
//! TRADE-OFFS
//! ==========
//! There is no cross-process lock. Two hosts pointed at the same file can
//! lose each other's writes; the session store treats any resulting
//! inconsistency as "logged out".

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{Storage, StorageError};

type Document = BTreeMap<String, String>;

/// Durable storage rooted at a single JSON file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Document, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Document::new());
        }
        serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    /// Read the document for modification. A corrupt document is replaced
    /// rather than blocking every future write; the flag reports whether
    /// that happened.
    fn read_document_for_write(&self) -> Result<(Document, bool), StorageError> {
        match self.read_document() {
            Ok(doc) => Ok((doc, false)),
            Err(StorageError::Corrupt(reason)) => {
                tracing::warn!(path = %self.path.display(), %reason, "replacing corrupt storage document");
                Ok((Document::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn write_document(&self, doc: &Document) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(doc).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut doc = self.read_document()?;
        Ok(doc.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let (mut doc, _) = self.read_document_for_write()?;
        doc.insert(key.to_owned(), value.to_owned());
        self.write_document(&doc)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let (mut doc, replaced) = self.read_document_for_write()?;
        if doc.remove(key).is_none() && !replaced {
            return Ok(());
        }
        self.write_document(&doc)
    }
}

#[cfg(test)]
#[path = "file_test.rs"]
mod tests;
