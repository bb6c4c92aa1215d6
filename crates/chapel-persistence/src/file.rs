//! ---
//! chapel_section: "03-persistence-logging"
//! chapel_subsection: "module"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Persistence abstractions and storage bindings."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::{KeyValueStore, Result};

/// Key-value store persisted as a single JSON object on disk.
///
/// Every mutation rewrites the document through a sibling temporary file and
/// renames it into place, so a crash leaves either the old or the new state.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, entries)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), keys = entries.len(), "key-value store persisted");
        Ok(())
    }

    fn mutate<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        if apply(&mut entries) {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.mutate(|entries| {
            entries.insert(key.to_owned(), value);
            true
        })
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.mutate(|entries| entries.remove(key).is_some())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let _guard = self.lock.lock();
        Ok(self
            .read_all()?
            .into_keys()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }
}
