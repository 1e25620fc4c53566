use std::{
    collections::BTreeMap,
    fs::File,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::fs_std::FileExt;
use tracing::{debug, instrument, warn};

use super::KeyValueStore;

const STORE_FILE: &str = "store.json";
const LOCK_FILE: &str = "store.lock";

/// [KeyValueStore] backed by a single json object on disk. The whole object is read once on
/// open and rewritten on every mutation, so the last writer wins.
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    #[instrument]
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STORE_FILE);
        let lock_path = dir.join(LOCK_FILE);

        let lock = open_lock(&lock_path)?;
        FileExt::lock_shared(&lock)?;
        let values = read_values(&path);
        FileExt::unlock(&lock)?;

        Ok(Self {
            path,
            lock_path,
            values: values?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let lock = open_lock(&self.lock_path)?;
        // Semi-safe acquire-release for the store
        FileExt::lock_exclusive(&lock)?;
        let result = self.write_values();
        FileExt::unlock(&lock)?;
        result
    }

    fn write_values(&self) -> Result<()> {
        let temporary = self.path.with_extension("json.tmp");
        let mut file = File::create(&temporary)?;
        serde_json::to_writer_pretty(&mut file, &self.values)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        std::fs::rename(&temporary, &self.path)?;
        debug!("Wrote {} keys to {:?}", self.values.len(), self.path);
        Ok(())
    }
}

fn open_lock(path: &Path) -> Result<File, std::io::Error> {
    File::options()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
}

fn read_values(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => Err(e)?,
    };
    match serde_json::from_str(&content) {
        Ok(values) => Ok(values),
        Err(e) => {
            // A store cut off mid-write is treated as empty
            warn!("Store {path:?} is corrupted, starting empty: {e}");
            Ok(BTreeMap::new())
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        if self.values.get(key) == Some(&value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value);
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        self.persist()
    }
}
