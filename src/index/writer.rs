//! Index writer: ingests files, accumulates posting lists in memory, and
//! flushes them to the store.
//!
//! The writer is the sole mutator of the store. File ingestion (read, hash,
//! admission scan) is embarrassingly parallel and runs on a rayon pool; the
//! results feed this single writer, which applies them to the posting map and
//! issues the `fil:`/`dat:` writes in order.

use crate::error::Result;
use crate::index::ingest::{SkipReason, TrigramScanner};
use crate::index::store::{self, IndexStore};
use crate::index::types::{digest_file, FileId, Trigram};
use crate::utils::CancelToken;
use crate::walk;
use ahash::AHashMap;
use rayon::prelude::*;
use roaring::RoaringBitmap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What happened to a file handed to the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Indexed(FileId),
    /// A record with the same digest already exists; re-adding is a no-op.
    AlreadyIndexed,
    Skipped(SkipReason),
}

/// A file that passed admission on an ingest worker, ready for the writer.
pub struct ScannedFile {
    pub name: String,
    pub file_id: FileId,
    pub digest: String,
    pub trigrams: Vec<Trigram>,
    pub content: Vec<u8>,
}

/// Counters reported after an indexing run.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexStats {
    pub indexed: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub total_bytes: u64,
}

pub struct IndexWriter {
    store: IndexStore,
    posting_lists: AHashMap<Trigram, RoaringBitmap>,
    scanner: TrigramScanner,
}

impl IndexWriter {
    /// Open the store for writing, creating it if needed.
    pub fn create(dir: &Path) -> Result<Self> {
        Ok(Self {
            store: IndexStore::create(dir)?,
            posting_lists: AHashMap::new(),
            scanner: TrigramScanner::new(),
        })
    }

    /// Persist the given roots under the `pat:` family so a later bare
    /// `csearch index` can re-walk them and `--list` can print them.
    pub fn add_paths<I, P>(&mut self, roots: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for root in roots {
            let path = root.as_ref().to_string_lossy().into_owned();
            self.store.put(&store::path_key(&path), path.as_bytes())?;
        }
        Ok(())
    }

    /// Add one file from disk. I/O errors are logged and skipped; store
    /// errors are fatal.
    pub fn add_file(&mut self, path: &Path) -> Result<Option<AddOutcome>> {
        let content = match std::fs::read(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("{}: {e}", path.display());
                return Ok(None);
            }
        };
        let name = path.to_string_lossy().into_owned();
        self.add_bytes(&name, &content).map(Some)
    }

    /// Add a file from a reader under the given name.
    pub fn add(&mut self, name: &str, mut reader: impl Read) -> Result<AddOutcome> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        self.add_bytes(name, &content)
    }

    /// Add a file's bytes under the given name.
    pub fn add_bytes(&mut self, name: &str, content: &[u8]) -> Result<AddOutcome> {
        let (file_id, digest) = digest_file(content);
        if self.store.get(&store::filename_key(&digest))?.is_some() {
            debug!("{name}: already indexed");
            return Ok(AddOutcome::AlreadyIndexed);
        }
        let trigrams = match self.scanner.scan(content) {
            Ok(t) => t.to_vec(),
            Err(reason) => {
                debug!("{name}: {reason}, ignoring");
                return Ok(AddOutcome::Skipped(reason));
            }
        };
        self.add_scanned(ScannedFile {
            name: name.to_string(),
            file_id,
            digest,
            trigrams,
            content: content.to_vec(),
        })
    }

    /// Apply one admitted file to the posting map and the store. This is the
    /// serialisation point behind the parallel ingest pool.
    pub fn add_scanned(&mut self, file: ScannedFile) -> Result<AddOutcome> {
        let filename_key = store::filename_key(&file.digest);
        if self.store.get(&filename_key)?.is_some() {
            debug!("{}: already indexed", file.name);
            return Ok(AddOutcome::AlreadyIndexed);
        }
        for &trigram in &file.trigrams {
            self.posting_lists
                .entry(trigram)
                .or_default()
                .insert(file.file_id);
        }
        self.store.put(&filename_key, file.name.as_bytes())?;
        self.store
            .put(&store::data_key(&file.digest), &file.content)?;
        Ok(AddOutcome::Indexed(file.file_id))
    }

    /// Serialise every accumulated posting list under its `tri:` key and
    /// flush the store. Posting lists already on disk from earlier runs are
    /// merged in, so adding to an existing index never drops old entries.
    /// Writes before this call are durable after it returns.
    pub fn flush(&mut self) -> Result<()> {
        let mut buf = Vec::new();
        for (&trigram, bitmap) in &self.posting_lists {
            let key = store::trigram_key(trigram);
            let merged = match self.store.get(&key)? {
                Some(existing) => {
                    let on_disk = RoaringBitmap::deserialize_from(&existing[..]).map_err(|e| {
                        crate::error::Error::IndexCorrupt {
                            reason: format!("posting list for trigram {trigram:#08x}: {e}"),
                        }
                    })?;
                    on_disk | bitmap
                }
                None => bitmap.clone(),
            };
            buf.clear();
            merged
                .serialize_into(&mut buf)
                .expect("roaring serialisation to Vec is infallible");
            self.store.put(&key, &buf)?;
        }
        self.posting_lists.clear();
        self.store.flush()
    }

    /// Walk the given roots and index every admitted file, extracting in
    /// parallel and applying results through this single writer.
    pub fn index_paths(&mut self, roots: &[PathBuf], cancel: &CancelToken) -> Result<IndexStats> {
        self.add_paths(roots)?;

        let files = walk::walk_paths(roots);
        info!("indexing {} files", files.len());

        let scanned: Vec<Option<ScannedFile>> = files
            .par_iter()
            .map_init(TrigramScanner::new, |scanner, path| {
                if cancel.is_cancelled() {
                    return None;
                }
                scan_path(scanner, path)
            })
            .collect();

        let mut stats = IndexStats::default();
        for file in scanned {
            if cancel.is_cancelled() {
                return Err(crate::error::Error::Cancelled);
            }
            let Some(file) = file else {
                stats.skipped += 1;
                continue;
            };
            let bytes = file.content.len() as u64;
            match self.add_scanned(file)? {
                AddOutcome::Indexed(_) => {
                    stats.indexed += 1;
                    stats.total_bytes += bytes;
                }
                AddOutcome::AlreadyIndexed => stats.duplicates += 1,
                AddOutcome::Skipped(_) => stats.skipped += 1,
            }
        }
        self.flush()?;
        info!(
            "indexed {} files ({} bytes), {} skipped, {} already present",
            stats.indexed, stats.total_bytes, stats.skipped, stats.duplicates
        );
        Ok(stats)
    }
}

/// Read, hash and scan one file on an ingest worker. Returns None for I/O
/// errors and admission rejects, both logged.
fn scan_path(scanner: &mut TrigramScanner, path: &Path) -> Option<ScannedFile> {
    let content = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("{}: {e}", path.display());
            return None;
        }
    };
    let name = path.to_string_lossy().into_owned();
    let (file_id, digest) = digest_file(&content);
    match scanner.scan(&content) {
        Ok(trigrams) => {
            debug!("{} {} {name}", content.len(), trigrams.len());
            Some(ScannedFile {
                name,
                file_id,
                digest,
                trigrams: trigrams.to_vec(),
                content,
            })
        }
        Err(reason) => {
            debug!("{name}: {reason}, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::store::IndexStore;
    use tempfile::TempDir;

    #[test]
    fn test_add_writes_file_records() {
        let tmp = TempDir::new().unwrap();
        let mut writer = IndexWriter::create(tmp.path()).unwrap();

        let outcome = writer.add_bytes("a.txt", b"hello").unwrap();
        let AddOutcome::Indexed(id) = outcome else {
            panic!("expected Indexed, got {outcome:?}");
        };
        writer.flush().unwrap();
        drop(writer);

        let (_, digest) = digest_file(b"hello");
        let store = IndexStore::open(tmp.path()).unwrap();
        assert_eq!(
            store.get(&store::filename_key(&digest)).unwrap().as_deref(),
            Some(&b"a.txt"[..])
        );
        assert_eq!(
            store.get(&store::data_key(&digest)).unwrap().as_deref(),
            Some(&b"hello"[..])
        );
        let tri = store
            .get(&store::trigram_key(crate::index::types::bytes_to_trigram(
                b'h', b'e', b'l',
            )))
            .unwrap()
            .expect("posting list for 'hel'");
        let bitmap = RoaringBitmap::deserialize_from(&tri[..]).unwrap();
        assert!(bitmap.contains(id));
    }

    #[test]
    fn test_duplicate_digest_is_noop() {
        let tmp = TempDir::new().unwrap();
        let mut writer = IndexWriter::create(tmp.path()).unwrap();

        assert!(matches!(
            writer.add_bytes("a.txt", b"same bytes").unwrap(),
            AddOutcome::Indexed(_)
        ));
        assert_eq!(
            writer.add_bytes("other/name.txt", b"same bytes").unwrap(),
            AddOutcome::AlreadyIndexed
        );
    }

    #[test]
    fn test_rejected_file_leaves_no_records() {
        let tmp = TempDir::new().unwrap();
        let mut writer = IndexWriter::create(tmp.path()).unwrap();

        let outcome = writer.add_bytes("bad.bin", &[0xFF, 0xFE, 0xFD]).unwrap();
        assert_eq!(outcome, AddOutcome::Skipped(SkipReason::InvalidUtf8));
        writer.flush().unwrap();
        drop(writer);

        let (_, digest) = digest_file(&[0xFF, 0xFE, 0xFD]);
        let store = IndexStore::open(tmp.path()).unwrap();
        assert_eq!(store.get(&store::filename_key(&digest)).unwrap(), None);
        assert_eq!(store.get(&store::data_key(&digest)).unwrap(), None);
    }

    #[test]
    fn test_add_paths_persists_roots() {
        let tmp = TempDir::new().unwrap();
        let mut writer = IndexWriter::create(tmp.path()).unwrap();
        writer.add_paths(["/src/a", "/src/b"]).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let store = IndexStore::open(tmp.path()).unwrap();
        let roots: Vec<String> = store
            .prefix_iter(store::PATH_PREFIX)
            .map(|r| String::from_utf8(r.unwrap().1.to_vec()).unwrap())
            .collect();
        assert_eq!(roots, vec!["/src/a".to_string(), "/src/b".to_string()]);
    }

    #[test]
    fn test_flush_merges_with_existing_postings() {
        let tmp = TempDir::new().unwrap();
        let id_a;
        let id_b;
        {
            let mut writer = IndexWriter::create(tmp.path()).unwrap();
            id_a = match writer.add_bytes("a.txt", b"shared").unwrap() {
                AddOutcome::Indexed(id) => id,
                other => panic!("{other:?}"),
            };
            writer.flush().unwrap();
        }
        {
            let mut writer = IndexWriter::create(tmp.path()).unwrap();
            id_b = match writer.add_bytes("b.txt", b"shared too").unwrap() {
                AddOutcome::Indexed(id) => id,
                other => panic!("{other:?}"),
            };
            writer.flush().unwrap();
        }

        let store = IndexStore::open(tmp.path()).unwrap();
        let tri = store
            .get(&store::trigram_key(crate::index::types::bytes_to_trigram(
                b's', b'h', b'a',
            )))
            .unwrap()
            .unwrap();
        let bitmap = RoaringBitmap::deserialize_from(&tri[..]).unwrap();
        assert!(bitmap.contains(id_a));
        assert!(bitmap.contains(id_b));
    }

    #[test]
    fn test_reader_api_accepts_streams() {
        let tmp = TempDir::new().unwrap();
        let mut writer = IndexWriter::create(tmp.path()).unwrap();
        let outcome = writer.add("s.txt", &b"streamed content"[..]).unwrap();
        assert!(matches!(outcome, AddOutcome::Indexed(_)));
    }
}
