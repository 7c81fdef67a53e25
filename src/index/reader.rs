//! Read-only access to the trigram index: file record lookups and boolean
//! posting-list evaluation.

use crate::error::{Error, Result};
use crate::index::store::{self, IndexStore};
use crate::index::types::{file_id_from_digest, file_id_hex_prefix, FileId, Trigram};
use crate::query::{Query, QueryOp};
use crate::utils::CancelToken;
use roaring::RoaringBitmap;
use std::path::Path;
use tracing::debug;

#[derive(Debug)]
pub struct IndexReader {
    store: IndexStore,
}

impl IndexReader {
    /// Open an existing index for reading.
    pub fn open(dir: &Path) -> Result<Self> {
        Ok(Self {
            store: IndexStore::open(dir)?,
        })
    }

    /// The name recorded for a fileid, or None if no record exists (dropped
    /// candidates are "not indexed", never an error).
    pub fn name(&self, file_id: FileId) -> Result<Option<String>> {
        let prefix = record_prefix(store::FILENAME_PREFIX, file_id);
        Ok(self
            .store
            .seek_prefix(&prefix)?
            .map(|(_, value)| String::from_utf8_lossy(&value).into_owned()))
    }

    /// The complete stored bytes for a fileid.
    pub fn contents(&self, file_id: FileId) -> Result<Option<Vec<u8>>> {
        let prefix = record_prefix(store::DATA_PREFIX, file_id);
        Ok(self.store.seek_prefix(&prefix)?.map(|(_, v)| v.into_vec()))
    }

    /// Indexed root paths (the `pat:` family), in key order.
    pub fn paths(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for kv in self.store.prefix_iter(store::PATH_PREFIX) {
            let (_, value) = kv?;
            out.push(String::from_utf8_lossy(&value).into_owned());
        }
        Ok(out)
    }

    /// Names of every indexed file, in digest order.
    pub fn indexed_names(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for kv in self.store.prefix_iter(store::FILENAME_PREFIX) {
            let (_, value) = kv?;
            out.push(String::from_utf8_lossy(&value).into_owned());
        }
        Ok(out)
    }

    /// Every indexed fileid, derived from the `fil:` keyspace.
    fn all_indexed_files(&self) -> Result<RoaringBitmap> {
        let mut found = RoaringBitmap::new();
        for kv in self.store.prefix_iter(store::FILENAME_PREFIX) {
            let (key, _) = kv?;
            let file_id = std::str::from_utf8(&key[store::FILENAME_PREFIX.len()..])
                .ok()
                .and_then(file_id_from_digest)
                .ok_or_else(|| Error::IndexCorrupt {
                    reason: format!("malformed filename key {:?}", String::from_utf8_lossy(&key)),
                })?;
            found.insert(file_id);
        }
        Ok(found)
    }

    /// Fetch one trigram's posting list, intersected with `restrict` when
    /// given. A missing key is an empty list; a bitmap that will not
    /// deserialise is fatal corruption.
    fn posting_list(
        &self,
        trigram: Trigram,
        restrict: Option<&RoaringBitmap>,
    ) -> Result<RoaringBitmap> {
        let mut bitmap = match self.store.get(&store::trigram_key(trigram))? {
            Some(bytes) => {
                RoaringBitmap::deserialize_from(&bytes[..]).map_err(|e| Error::IndexCorrupt {
                    reason: format!("posting list for trigram {trigram:#08x}: {e}"),
                })?
            }
            None => return Ok(RoaringBitmap::new()),
        };
        if let Some(restrict) = restrict {
            bitmap &= restrict;
        }
        Ok(bitmap)
    }

    /// Evaluate a trigram query to the sorted list of candidate fileids.
    pub fn posting_query(&self, query: &Query) -> Result<Vec<FileId>> {
        self.posting_query_cancellable(query, &CancelToken::new())
    }

    /// As [`posting_query`](Self::posting_query) with cooperative
    /// cancellation, checked per trigram fold step and per merge candidate.
    pub fn posting_query_cancellable(
        &self,
        query: &Query,
        cancel: &CancelToken,
    ) -> Result<Vec<FileId>> {
        let candidates = self.eval(query, None, cancel)?;
        debug!("posting query identified {} possible files", candidates.len());
        self.merge(candidates, cancel)
    }

    fn eval(
        &self,
        query: &Query,
        restrict: Option<&RoaringBitmap>,
        cancel: &CancelToken,
    ) -> Result<RoaringBitmap> {
        match query.op {
            QueryOp::None => Ok(RoaringBitmap::new()),
            QueryOp::All => match restrict {
                Some(r) => Ok(r.clone()),
                None => self.all_indexed_files(),
            },
            QueryOp::And => {
                let mut list: Option<RoaringBitmap> = None;
                for &trigram in &query.trigram {
                    if cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    let postings = self.posting_list(trigram, restrict)?;
                    let next = match list {
                        Some(acc) => acc & postings,
                        None => postings,
                    };
                    if next.is_empty() {
                        return Ok(next);
                    }
                    list = Some(next);
                }
                for sub in &query.sub {
                    let next = self.eval(sub, list.as_ref().or(restrict), cancel)?;
                    if next.is_empty() {
                        return Ok(next);
                    }
                    list = Some(next);
                }
                match list {
                    Some(list) => Ok(list),
                    // Degenerate QAnd with no terms constrains nothing.
                    None => match restrict {
                        Some(r) => Ok(r.clone()),
                        None => self.all_indexed_files(),
                    },
                }
            }
            QueryOp::Or => {
                let mut list = RoaringBitmap::new();
                for &trigram in &query.trigram {
                    if cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    list |= self.posting_list(trigram, restrict)?;
                }
                for sub in &query.sub {
                    list |= self.eval(sub, restrict, cancel)?;
                }
                Ok(list)
            }
        }
    }

    /// Final verification pass: keep only fileids that still resolve to a
    /// `fil:` record. Guards against stale posting entries left behind by a
    /// crash or reset, and keeps results ascending.
    fn merge(&self, candidates: RoaringBitmap, cancel: &CancelToken) -> Result<Vec<FileId>> {
        let mut out = Vec::with_capacity(candidates.len() as usize);
        for file_id in candidates {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let prefix = record_prefix(store::FILENAME_PREFIX, file_id);
            if self.store.seek_prefix(&prefix)?.is_some() {
                out.push(file_id);
            }
        }
        Ok(out)
    }
}

/// Key prefix selecting a fileid's record within a family: the family prefix
/// plus the first 8 hex chars of the digest.
fn record_prefix(family: &[u8], file_id: FileId) -> Vec<u8> {
    [family, file_id_hex_prefix(file_id).as_bytes()].concat()
}
