use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use crate::Result;
use crate::model::Document;
use log::warn;

#[allow(unused_imports)]
use crate::engine::LocalStore;

/// Durable key-value layer for the [`LocalStore`].
///
/// Each storage key maps to one `<key>.json` file holding the whole document
/// list of a collection. Writes use an atomic "write-then-rename" strategy.
pub struct Persistence {
    data_dir: PathBuf,
}

impl Persistence {
    /// Initializes a new `Persistence` handler in the specified directory.
    ///
    /// If the directory does not exist, it will be created.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { data_dir: dir })
    }

    fn path_for(&self, storage_key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", storage_key))
    }

    /// Writes a collection's full document list atomically.
    ///
    /// The list is written to a temporary file first and then renamed over the
    /// final destination, so a crash never leaves a half-written file behind.
    pub fn save_collection(&self, storage_key: &str, docs: &[Document]) -> Result<()> {
        let file_path = self.path_for(storage_key);
        let temp_path = file_path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(docs)?;

        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &file_path)?;

        Ok(())
    }

    /// Loads the document list stored under `storage_key`.
    ///
    /// Returns `None` when nothing was stored yet, and also when the stored
    /// data cannot be read or parsed; the latter is logged.
    pub fn load_collection(&self, storage_key: &str) -> Option<Vec<Document>> {
        let path = self.path_for(storage_key);

        let content = match fs::read(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read collection file {:?}: {}", path, e);
                return None;
            }
        };

        match serde_json::from_slice(&content) {
            Ok(docs) => Some(docs),
            Err(e) => {
                warn!("Persisted data for {} is corrupt, using defaults: {}", storage_key, e);
                None
            }
        }
    }

    /// Removes whatever is stored under `storage_key`. Missing entries are not an error.
    pub fn remove(&self, storage_key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(storage_key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
