//! End-to-end tests driving the writer, reader, planner and scanner
//! together over a temporary store.

use csearch::error::Error;
use csearch::grep::Grep;
use csearch::index::store::{self, IndexStore};
use csearch::index::types::{digest_file, FileId};
use csearch::index::writer::AddOutcome;
use csearch::index::{IndexReader, IndexWriter};
use csearch::query::{parse_pattern, regexp_query, Query};
use roaring::RoaringBitmap;
use tempfile::TempDir;

fn build_index(files: &[(&str, &[u8])]) -> (TempDir, Vec<FileId>) {
    let tmp = TempDir::new().unwrap();
    let mut writer = IndexWriter::create(tmp.path()).unwrap();
    let mut ids = Vec::new();
    for (name, content) in files {
        if let AddOutcome::Indexed(id) = writer.add_bytes(name, content).unwrap() {
            ids.push(id);
        }
    }
    writer.flush().unwrap();
    (tmp, ids)
}

fn plan(pattern: &str) -> Query {
    regexp_query(&parse_pattern(pattern, false).unwrap())
}

fn search(reader: &IndexReader, pattern: &str) -> Vec<(String, usize)> {
    let grep = Grep::new(pattern, false).unwrap();
    let mut out = Vec::new();
    for id in reader.posting_query(&plan(pattern)).unwrap() {
        let Some(name) = reader.name(id).unwrap() else {
            continue;
        };
        let Some(content) = reader.contents(id).unwrap() else {
            continue;
        };
        let fm = grep.scan(&name, &content);
        if fm.count > 0 {
            out.push((name, fm.count));
        }
    }
    out
}

#[test]
fn scenario_literal_query_hits_one_file() {
    let (tmp, ids) = build_index(&[("a.txt", b"hello"), ("b.txt", b"world")]);
    let reader = IndexReader::open(tmp.path()).unwrap();

    let candidates = reader.posting_query(&plan("hello")).unwrap();
    assert_eq!(candidates, vec![ids[0]]);

    let hits = search(&reader, "hello");
    assert_eq!(hits, vec![("a.txt".to_string(), 1)]);

    let grep = Grep::new("hello", false).unwrap();
    let fm = grep.scan("a.txt", b"hello");
    assert_eq!(fm.matches[0].line_number, 1);
}

#[test]
fn scenario_bounded_repetition() {
    let (tmp, ids) = build_index(&[("x", b"foobar")]);
    let reader = IndexReader::open(tmp.path()).unwrap();

    let candidates = reader.posting_query(&plan("fo{2}")).unwrap();
    assert_eq!(candidates, vec![ids[0]]);
    assert_eq!(search(&reader, "fo{2}").len(), 1);
}

#[test]
fn scenario_utf8_corpus() {
    let (tmp, _) = build_index(&[("u", "äöü".as_bytes())]);
    let reader = IndexReader::open(tmp.path()).unwrap();

    // "ä" is two bytes, so the plan cannot prune; the scan still finds it.
    let hits = search(&reader, "ä");
    assert_eq!(hits, vec![("u".to_string(), 1)]);

    // A longer UTF-8 literal prunes through its trigrams.
    let candidates = reader.posting_query(&plan("äöü")).unwrap();
    assert_eq!(candidates.len(), 1);
}

#[test]
fn scenario_invalid_utf8_file_absent() {
    let tmp = TempDir::new().unwrap();
    let mut writer = IndexWriter::create(tmp.path()).unwrap();
    let outcome = writer.add_bytes("bad", &[0xFF, 0xFE, 0xFD]).unwrap();
    assert!(matches!(outcome, AddOutcome::Skipped(_)));
    writer.flush().unwrap();
    drop(writer);

    let reader = IndexReader::open(tmp.path()).unwrap();
    assert!(reader.indexed_names().unwrap().is_empty());
    assert!(reader.posting_query(&Query::all()).unwrap().is_empty());
}

#[test]
fn scenario_reset_discards_everything() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("idx");
    {
        let mut writer = IndexWriter::create(&dir).unwrap();
        writer.add_bytes("two.txt", b"file number two").unwrap();
        writer.flush().unwrap();
    }
    IndexStore::destroy(&dir).unwrap();
    {
        let mut writer = IndexWriter::create(&dir).unwrap();
        writer.add_bytes("one.txt", b"file number one").unwrap();
        writer.add_bytes("three.txt", b"file number three").unwrap();
        writer.flush().unwrap();
    }

    let reader = IndexReader::open(&dir).unwrap();
    let mut names = reader.indexed_names().unwrap();
    names.sort();
    assert_eq!(names, vec!["one.txt".to_string(), "three.txt".to_string()]);
    assert!(search(&reader, "number two").is_empty());
    assert_eq!(search(&reader, "number").len(), 2);
}

#[test]
fn scenario_match_all_scans_every_file() {
    let (tmp, mut ids) = build_index(&[("a.txt", b"one\ntwo\n"), ("b.txt", b"three\n")]);
    let reader = IndexReader::open(tmp.path()).unwrap();

    let q = plan(".*");
    assert!(q.is_all());
    let candidates = reader.posting_query(&q).unwrap();
    ids.sort_unstable();
    assert_eq!(candidates, ids);

    let hits = search(&reader, ".*");
    assert_eq!(hits.len(), 2);
}

#[test]
fn merge_drops_externally_deleted_records() {
    let (tmp, ids) = build_index(&[("a.txt", b"shared term alpha"), ("b.txt", b"shared term beta")]);
    let (id_b, digest_b) = digest_file(b"shared term beta");
    assert!(ids.contains(&id_b));

    {
        let db = rocksdb::DB::open_default(tmp.path()).unwrap();
        db.delete(store::filename_key(&digest_b)).unwrap();
    }

    let reader = IndexReader::open(tmp.path()).unwrap();
    let candidates = reader.posting_query(&plan("shared term")).unwrap();
    assert!(!candidates.contains(&id_b), "deleted fileid must be filtered");
    assert_eq!(candidates.len(), 1);
}

#[test]
fn injected_fileid_collision_stays_sound() {
    // Two fabricated records whose digests share the same 4-byte prefix,
    // which the real SHA-256 derivation would only produce by collision.
    let tmp = TempDir::new().unwrap();
    let digest_1 = format!("{}{}", "deadbeef", "a".repeat(56));
    let digest_2 = format!("{}{}", "deadbeef", "b".repeat(56));
    let id = csearch::index::types::file_id_from_digest(&digest_1).unwrap();

    {
        let db = rocksdb::DB::open_default(tmp.path()).unwrap();
        db.put(store::filename_key(&digest_1), b"first.txt").unwrap();
        db.put(store::data_key(&digest_1), b"needle in first").unwrap();
        db.put(store::filename_key(&digest_2), b"second.txt").unwrap();
        db.put(store::data_key(&digest_2), b"other text entirely").unwrap();

        let mut bitmap = RoaringBitmap::new();
        bitmap.insert(id);
        let mut buf = Vec::new();
        bitmap.serialize_into(&mut buf).unwrap();
        for w in b"needle in first".windows(3) {
            let t = csearch::index::types::bytes_to_trigram(w[0], w[1], w[2]);
            db.put(store::trigram_key(t), &buf).unwrap();
        }
    }

    let reader = IndexReader::open(tmp.path()).unwrap();
    let candidates = reader.posting_query(&plan("needle")).unwrap();
    // One id covers both colliding records.
    assert_eq!(candidates, vec![id]);
    // Resolution picks the first record in digest order.
    assert_eq!(reader.name(id).unwrap().as_deref(), Some("first.txt"));
    assert_eq!(
        reader.contents(id).unwrap().as_deref(),
        Some(&b"needle in first"[..])
    );
    // The scan stays sound: only real matches are reported.
    assert_eq!(search(&reader, "needle").len(), 1);
    assert!(search(&reader, "no such text").is_empty());
}

#[test]
fn re_adding_identical_bytes_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let mut writer = IndexWriter::create(tmp.path()).unwrap();
    assert!(matches!(
        writer.add_bytes("a.txt", b"same content").unwrap(),
        AddOutcome::Indexed(_)
    ));
    assert_eq!(
        writer.add_bytes("a.txt", b"same content").unwrap(),
        AddOutcome::AlreadyIndexed
    );
    writer.flush().unwrap();
    drop(writer);

    let reader = IndexReader::open(tmp.path()).unwrap();
    assert_eq!(reader.indexed_names().unwrap().len(), 1);
    let candidates = reader.posting_query(&plan("same content")).unwrap();
    assert_eq!(candidates.len(), 1);
}

#[test]
fn tiny_files_are_not_indexed() {
    let tmp = TempDir::new().unwrap();
    let mut writer = IndexWriter::create(tmp.path()).unwrap();
    for (name, content) in [("empty", &b""[..]), ("one", b"a"), ("two", b"ab")] {
        assert!(matches!(
            writer.add_bytes(name, content).unwrap(),
            AddOutcome::Skipped(_)
        ));
    }
    assert!(matches!(
        writer.add_bytes("three", b"abc").unwrap(),
        AddOutcome::Indexed(_)
    ));
    writer.flush().unwrap();
    drop(writer);

    let reader = IndexReader::open(tmp.path()).unwrap();
    assert_eq!(reader.indexed_names().unwrap(), vec!["three".to_string()]);
}

#[test]
fn indexed_roots_are_listed() {
    let tmp = TempDir::new().unwrap();
    let mut writer = IndexWriter::create(tmp.path()).unwrap();
    writer.add_paths(["/repo/a", "/repo/b"]).unwrap();
    writer.add_bytes("f.txt", b"some indexed content").unwrap();
    writer.flush().unwrap();
    drop(writer);

    let reader = IndexReader::open(tmp.path()).unwrap();
    assert_eq!(
        reader.paths().unwrap(),
        vec!["/repo/a".to_string(), "/repo/b".to_string()]
    );
}

#[test]
fn missing_index_reports_index_missing() {
    let tmp = TempDir::new().unwrap();
    match IndexReader::open(&tmp.path().join("absent")) {
        Err(Error::IndexMissing(_)) => {}
        other => panic!("expected IndexMissing, got {other:?}"),
    }
}

#[test]
fn alternation_end_to_end() {
    let (tmp, _) = build_index(&[
        ("f1", b"the quick brown fox"),
        ("f2", b"lazy dogs sleep"),
        ("f3", b"neither here"),
    ]);
    let reader = IndexReader::open(tmp.path()).unwrap();

    let hits = search(&reader, "quick|lazy");
    let names: Vec<&str> = hits.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"f1"));
    assert!(names.contains(&"f2"));
}

#[test]
fn case_insensitive_search_end_to_end() {
    let (tmp, _) = build_index(&[("upper", b"ERROR: disk full"), ("lower", b"error: retry")]);
    let reader = IndexReader::open(tmp.path()).unwrap();

    let hir = parse_pattern("error", true).unwrap();
    let q = regexp_query(&hir);
    let grep = Grep::new("error", true).unwrap();

    let mut hit_names = Vec::new();
    for id in reader.posting_query(&q).unwrap() {
        let name = reader.name(id).unwrap().unwrap();
        let content = reader.contents(id).unwrap().unwrap();
        if grep.scan(&name, &content).count > 0 {
            hit_names.push(name);
        }
    }
    hit_names.sort();
    assert_eq!(hit_names, vec!["lower".to_string(), "upper".to_string()]);
}
