//! Persistent key/value storage backing the session store.
//!
//! DESIGN
//! ======
//! The dashboard host keeps the session in a small string-to-string store,
//! the same shape a browser's durable storage has. `FileStorage` is the
//! durable implementation; `MemoryStorage` backs tests and throwaway hosts.
//!
//! Every read goes to the backing medium. Nothing is cached here, so a value
//! removed by another process is gone on the next read.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Errors produced by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing medium could not be read or written.
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing medium holds something that is not a key/value document.
    #[error("storage document is corrupt: {0}")]
    Corrupt(String),

    /// The store has been switched off.
    #[error("storage unavailable")]
    Unavailable,
}

/// String key/value storage with get/set/remove semantics.
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backing medium cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backing medium cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the backing medium cannot be written.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
