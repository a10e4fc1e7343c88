//! # DiskStore — One File per Block
//!
//! Each block is a file in a single directory, named by the block's
//! encoded fingerprint. Writes go to a temporary file in the same
//! directory which is fsynced and then renamed into place, so a reader
//! never sees a partial block.
//!
//! Reads at or below the mmap threshold are copied into memory; larger
//! files are mapped read-only.
//!
//! ## Naming Rules
//!
//! Names must be non-empty, must not contain path separators or NUL, and
//! must not start with `.` (temporary files do). Zero-length files are
//! treated as absent.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cairn_core::config::DEFAULT_MMAP_THRESHOLD;
use cairn_core::{CairnError, Result};
use memmap2::Mmap;
use tempfile::NamedTempFile;

use crate::bytes::BlockBytes;
use crate::store::Backend;

/// Filesystem-backed block store.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
    mmap_threshold: u64,
}

impl DiskStore {
    /// Open (or create) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
        })
    }

    /// Map files larger than `bytes` instead of copying them.
    pub fn with_mmap_threshold(mut self, bytes: u64) -> Self {
        self.mmap_threshold = bytes;
        self
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `name`.
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        return Err(CairnError::InvalidArgument(format!(
            "'{name}' is not a valid block file name"
        )));
    }
    Ok(())
}

impl Backend for DiskStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(name)?;
        if fs::metadata(&path).is_ok_and(|m| m.len() > 0) {
            return Ok(());
        }

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| CairnError::Io(e.error))?;
        tracing::debug!(name, len = bytes.len(), "wrote block file");
        Ok(())
    }

    fn get(&self, name: &str) -> Result<BlockBytes> {
        let path = self.path_of(name)?;
        let len = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CairnError::no_such_block(name))
            }
            Err(e) => return Err(e.into()),
        };
        if len == 0 {
            return Err(CairnError::no_such_block(name));
        }

        if len <= self.mmap_threshold {
            return Ok(BlockBytes::from(fs::read(&path)?));
        }
        let file = fs::File::open(&path)?;
        // SAFETY: block files are write-once and replaced only by rename,
        // so the mapped inode is never modified while mapped.
        let map = unsafe { Mmap::map(&file)? };
        Ok(BlockBytes::from(map))
    }

    fn list(&self) -> Result<Option<Vec<String>>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 file name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() || meta.len() == 0 {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(Some(names))
    }

    fn kind(&self) -> &'static str {
        "disk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        store.put("sha-256:abc", b"block bytes").unwrap();
        let bytes = store.get("sha-256:abc").unwrap();
        assert_eq!(&bytes[..], b"block bytes");
        assert!(!bytes.is_mapped());
        assert!(dir.path().join("sha-256:abc").exists());
    }

    #[test]
    fn large_files_are_mapped() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap().with_mmap_threshold(64);
        let payload: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
        store.put("big", &payload).unwrap();
        let bytes = store.get("big").unwrap();
        assert!(bytes.is_mapped());
        assert_eq!(&bytes[..], &payload[..]);
    }

    #[test]
    fn zero_length_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("empty"), b"").unwrap();
        assert!(matches!(store.get("empty"), Err(CairnError::NoSuchBlock { .. })));
        assert_eq!(store.list().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn put_replaces_zero_length_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("n"), b"").unwrap();
        store.put("n", b"data").unwrap();
        assert_eq!(&store.get("n").unwrap()[..], b"data");
    }

    #[test]
    fn put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        store.put("n", b"data").unwrap();
        store.put("n", b"data").unwrap();
        assert_eq!(store.list().unwrap().unwrap(), vec!["n".to_string()]);
    }

    #[test]
    fn unsafe_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        for name in ["", "../escape", "a/b", ".hidden", "nul\0byte"] {
            assert!(
                matches!(store.put(name, b"x"), Err(CairnError::InvalidArgument(_))),
                "{name:?}"
            );
            assert!(matches!(store.get(name), Err(CairnError::InvalidArgument(_))));
        }
    }

    #[test]
    fn list_skips_temporaries_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        store.put("b", b"2").unwrap();
        store.put("a", b"1").unwrap();
        fs::write(dir.path().join(".tmpXYZ"), b"partial").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        assert_eq!(
            store.list().unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn missing_file_is_no_such_block() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();
        assert!(matches!(store.get("absent"), Err(CairnError::NoSuchBlock { .. })));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn list_returns_every_stored_name_sorted(
            names in proptest::collection::btree_set("[a-z0-9][a-z0-9:+=-]{0,24}", 1..12),
        ) {
            let dir = tempfile::tempdir().unwrap();
            let store = DiskStore::open(dir.path()).unwrap();
            for name in &names {
                store.put(name, name.as_bytes()).unwrap();
            }
            let expected: Vec<String> = names.iter().cloned().collect();
            prop_assert_eq!(store.list().unwrap(), Some(expected));
            for name in &names {
                prop_assert_eq!(&store.get(name).unwrap()[..], name.as_bytes());
            }
        }
    }
}
