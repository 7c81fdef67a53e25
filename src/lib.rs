//! # csearch - trigram-indexed regex search
//!
//! csearch answers regular-expression queries over a corpus of source files
//! by keeping a persistent inverted index from trigrams (three-byte
//! substrings) to the files containing them, in the style of Russ Cox's
//! codesearch.
//!
//! ## Architecture
//!
//! - [`index`] - Persistent index: KV store schema, admission, writer, reader
//! - [`query`] - Lowering a regex syntax tree into a boolean trigram query
//! - [`grep`] - Running the real regex over the surviving candidates
//! - [`output`] - Grep-style result formatting
//! - [`walk`] - Filesystem enumeration for the indexer
//! - [`utils`] - Sparse set, cancellation
//!
//! ## How a search runs
//!
//! ```ignore
//! use csearch::index::{IndexReader, IndexWriter};
//! use csearch::query::{parse_pattern, regexp_query};
//! use csearch::grep::Grep;
//!
//! let hir = parse_pattern("fn main", false)?;
//! let query = regexp_query(&hir);
//! let reader = IndexReader::open(&csearch::index::store::index_dir())?;
//! let grep = Grep::new("fn main", false)?;
//! for file_id in reader.posting_query(&query)? {
//!     let Some(name) = reader.name(file_id)? else { continue };
//!     let Some(content) = reader.contents(file_id)? else { continue };
//!     let matches = grep.scan(&name, &content);
//!     // format matches...
//! }
//! ```
//!
//! The query is sound but not exact: posting-list evaluation narrows the
//! corpus to files that *could* match, and the regex scan over stored file
//! bytes decides which ones really do.

pub mod error;
pub mod grep;
pub mod index;
pub mod output;
pub mod query;
pub mod utils;
pub mod walk;

pub use error::{Error, Result};
