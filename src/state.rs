//! Persistent record of what azabox manages, kept as a JSON array in `state.json`.
//!
//! The file doubles as a lock: [`LocalState::load`] takes an exclusive,
//! non-blocking advisory lock that is held until [`LocalState::save`] completes,
//! so two install/update runs cannot interleave.

use crate::types::BinaryInfo;
use anyhow::{Context, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const MAX_LOCK_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("another install/update command is currently running, try again later")]
    Locked,
}

pub trait State {
    /// Open (creating if needed) and lock the backing store, then read all entries.
    fn load(&mut self) -> Result<()>;
    /// Persist all entries atomically and release the lock.
    fn save(&mut self) -> Result<()>;
    fn has(&self, full_name: &str) -> bool;
    fn get(&self, full_name: &str) -> Option<&BinaryInfo>;
    fn entries(&self) -> &HashMap<String, BinaryInfo>;
    /// Insert or replace the entry keyed by `binary.full_name`.
    fn update_entry(&mut self, binary: BinaryInfo);
}

#[derive(Debug)]
pub struct LocalState {
    path: PathBuf,
    lock: Option<File>,
    binaries: HashMap<String, BinaryInfo>,
}

impl LocalState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalState {
            path: path.into(),
            lock: None,
            binaries: HashMap::new(),
        }
    }

    fn open(&self) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .with_context(|| format!("Could not open state file {}", self.path.display()))
    }

    /// Lock `file`. `None` when the path was replaced by a concurrent save
    /// between opening and locking; the stale handle is dropped.
    fn acquire(&self, file: File) -> Result<Option<File>> {
        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(StateError::Locked.into());
            }
            return Err(e)
                .with_context(|| format!("Could not lock state file {}", self.path.display()));
        }

        if is_same_file(&file, &self.path)? {
            Ok(Some(file))
        } else {
            Ok(None)
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn write_tmp(&self, tmp_path: &Path) -> Result<()> {
        let mut binaries: Vec<&BinaryInfo> = self.binaries.values().collect();
        binaries.sort_by(|a, b| a.full_name.cmp(&b.full_name));

        let mut file = File::create(tmp_path)
            .with_context(|| format!("Could not create {}", tmp_path.display()))?;
        serde_json::to_writer_pretty(&mut file, &binaries)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    }
}

impl State for LocalState {
    fn load(&mut self) -> Result<()> {
        let mut attempts = 0;
        let mut file = loop {
            if let Some(file) = self.acquire(self.open()?)? {
                break file;
            }
            attempts += 1;
            if attempts >= MAX_LOCK_ATTEMPTS {
                return Err(StateError::Locked.into());
            }
            tracing::debug!(
                "State file {} was replaced while locking, reopening",
                self.path.display()
            );
        };

        let mut content = String::new();
        file.read_to_string(&mut content)?;

        let binaries: Vec<BinaryInfo> = if content.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&content).with_context(|| {
                format!("failed to decode state file {}", self.path.display())
            })?
        };

        tracing::debug!(
            "Loaded {} entries from {}",
            binaries.len(),
            self.path.display()
        );

        self.binaries = binaries
            .into_iter()
            .map(|b| (b.full_name.clone(), b))
            .collect();
        self.lock = Some(file);
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        // dropping the handle releases the lock whatever happens below
        let lock = self.lock.take();

        let tmp_path = self.tmp_path();
        let written = self.write_tmp(&tmp_path).and_then(|()| {
            fs::rename(&tmp_path, &self.path).with_context(|| {
                format!(
                    "Could not move {} to {}",
                    tmp_path.display(),
                    self.path.display()
                )
            })
        });
        if let Err(e) = written {
            remove_tmp(&tmp_path);
            return Err(e);
        }
        tracing::debug!(
            "Saved {} entries to {}",
            self.binaries.len(),
            self.path.display()
        );

        if let Some(file) = lock {
            file.unlock()?;
        }
        Ok(())
    }

    fn has(&self, full_name: &str) -> bool {
        self.binaries.contains_key(full_name)
    }

    fn get(&self, full_name: &str) -> Option<&BinaryInfo> {
        self.binaries.get(full_name)
    }

    fn entries(&self) -> &HashMap<String, BinaryInfo> {
        &self.binaries
    }

    fn update_entry(&mut self, binary: BinaryInfo) {
        self.binaries.insert(binary.full_name.clone(), binary);
    }
}

#[cfg(unix)]
fn is_same_file(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

// save() cannot replace a file that another process holds open on Windows
#[cfg(not(unix))]
fn is_same_file(_file: &File, _path: &Path) -> io::Result<bool> {
    Ok(true)
}

fn remove_tmp(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}
