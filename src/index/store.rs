//! Ordered key-value store underneath the index.
//!
//! Everything the index persists lives in one RocksDB instance under four
//! ASCII key prefixes:
//!
//! ```text
//! "fil:" + hex(sha256(file))     -> filename bytes
//! "dat:" + hex(sha256(file))     -> complete file bytes
//! "tri:" + bytes3_be(trigram)    -> roaring-serialised posting list
//! "pat:" + abs_path              -> abs_path (indexed roots)
//! ```
//!
//! Prefix iteration over `[prefix, prefix+0xFF)` enumerates a family.

use crate::error::{Error, Result};
use crate::index::types::{trigram_to_bytes, Trigram};
use rocksdb::{Direction, IteratorMode, Options, DB};
use std::env;
use std::path::{Path, PathBuf};

pub const FILENAME_PREFIX: &[u8] = b"fil:";
pub const DATA_PREFIX: &[u8] = b"dat:";
pub const TRIGRAM_PREFIX: &[u8] = b"tri:";
pub const PATH_PREFIX: &[u8] = b"pat:";

pub fn filename_key(digest: &str) -> Vec<u8> {
    [FILENAME_PREFIX, digest.as_bytes()].concat()
}

pub fn data_key(digest: &str) -> Vec<u8> {
    [DATA_PREFIX, digest.as_bytes()].concat()
}

pub fn trigram_key(t: Trigram) -> Vec<u8> {
    [TRIGRAM_PREFIX, &trigram_to_bytes(t)[..]].concat()
}

pub fn path_key(path: &str) -> Vec<u8> {
    [PATH_PREFIX, path.as_bytes()].concat()
}

/// Directory holding the index store: `$CSEARCHINDEX`, else
/// `$HOME/.csearchindex` (the home directory covers `%USERPROFILE%` on
/// Windows).
pub fn index_dir() -> PathBuf {
    if let Ok(dir) = env::var("CSEARCHINDEX") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".csearchindex")
}

/// Handle on the on-disk store. The writer is the sole mutator; readers open
/// the same directory after the writer has closed.
pub struct IndexStore {
    db: DB,
    dir: PathBuf,
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore").field("dir", &self.dir).finish()
    }
}

impl IndexStore {
    /// Open for writing, creating the store if it does not exist.
    pub fn create(dir: &Path) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, dir)?;
        Ok(Self {
            db,
            dir: dir.to_path_buf(),
        })
    }

    /// Open an existing store for reading.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::IndexMissing(dir.to_path_buf()));
        }
        let opts = Options::default();
        let db = DB::open(&opts, dir).map_err(|_| Error::IndexMissing(dir.to_path_buf()))?;
        Ok(Self {
            db,
            dir: dir.to_path_buf(),
        })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        Ok(self.db.put(key, value)?)
    }

    /// Durability barrier: everything written before this call survives.
    pub fn flush(&self) -> Result<()> {
        Ok(self.db.flush()?)
    }

    /// Iterate every key-value pair whose key starts with `prefix`,
    /// in ascending key order.
    pub fn prefix_iter<'a>(
        &'a self,
        prefix: &[u8],
    ) -> impl Iterator<Item = Result<(Box<[u8]>, Box<[u8]>)>> + 'a {
        let prefix = prefix.to_vec();
        let iter = self
            .db
            .iterator(IteratorMode::From(&prefix, Direction::Forward));
        iter.map(|r| r.map_err(Error::from))
            .take_while(move |r| match r {
                Ok((key, _)) => key.starts_with(&prefix),
                Err(_) => true,
            })
    }

    /// First key-value pair whose key starts with `prefix`, if any.
    pub fn seek_prefix(&self, prefix: &[u8]) -> Result<Option<(Box<[u8]>, Box<[u8]>)>> {
        match self.prefix_iter(prefix).next() {
            Some(Ok(kv)) => Ok(Some(kv)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Discard the whole store. Safe to call while no handle is open.
    pub fn destroy(dir: &Path) -> std::io::Result<()> {
        match std::fs::remove_dir_all(dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
