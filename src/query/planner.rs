//! Lowering of a regex syntax tree into a boolean trigram query.
//!
//! The query is *sound*: for any file, if the regex matches somewhere in the
//! file then the query evaluates true on the file's trigram set. The reverse
//! need not hold; candidates are verified by running the real regex. Every
//! simplification below is equi- or more-permissive, never narrower.

use crate::index::types::{bytes_to_trigram, trigram_to_bytes, Trigram};
use regex_syntax::hir::{Class, Hir, HirKind};
use regex_syntax::ParserBuilder;
use std::collections::BTreeSet;
use std::fmt;

/// Cap on the number of literal alternatives tracked through concatenation
/// and class enumeration. Past this the planner falls back to the trigrams
/// already gathered, which is always a superset.
const MAX_EXACT_STRINGS: usize = 16;
/// Cap on the byte length of a tracked literal alternative.
const MAX_EXACT_LEN: usize = 64;
/// Character classes up to this many members are enumerated; larger ones
/// (including `.`) match too much to prune on.
const MAX_CLASS_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    /// Matches every file.
    All,
    /// Matches no file.
    None,
    /// Every trigram must be present and every subquery true.
    And,
    /// Any trigram present or any subquery true.
    Or,
}

/// A boolean expression over trigrams, evaluated against the posting lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub op: QueryOp,
    pub trigram: BTreeSet<Trigram>,
    pub sub: Vec<Query>,
}

impl Query {
    pub fn all() -> Self {
        Query {
            op: QueryOp::All,
            trigram: BTreeSet::new(),
            sub: Vec::new(),
        }
    }

    pub fn none() -> Self {
        Query {
            op: QueryOp::None,
            trigram: BTreeSet::new(),
            sub: Vec::new(),
        }
    }

    fn and_trigrams(trigrams: BTreeSet<Trigram>) -> Self {
        Query {
            op: QueryOp::And,
            trigram: trigrams,
            sub: Vec::new(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.op == QueryOp::All
    }

    pub fn is_none(&self) -> bool {
        self.op == QueryOp::None
    }

    /// Conjunction, folding same-kind nodes and the All/None identities.
    pub fn and(self, other: Query) -> Query {
        match (self.op, other.op) {
            (QueryOp::None, _) | (_, QueryOp::None) => Query::none(),
            (QueryOp::All, _) => other,
            (_, QueryOp::All) => self,
            (QueryOp::And, QueryOp::And) => {
                let mut q = self;
                let mut o = other;
                q.trigram.append(&mut o.trigram);
                q.sub.append(&mut o.sub);
                q
            }
            (QueryOp::And, _) => {
                let mut q = self;
                q.sub.push(other);
                q
            }
            (_, QueryOp::And) => {
                let mut q = other;
                q.sub.push(self);
                q
            }
            _ => Query {
                op: QueryOp::And,
                trigram: BTreeSet::new(),
                sub: vec![self, other],
            },
        }
    }

    /// Disjunction, folding same-kind nodes and the All/None identities.
    pub fn or(self, other: Query) -> Query {
        match (self.op, other.op) {
            (QueryOp::All, _) | (_, QueryOp::All) => Query::all(),
            (QueryOp::None, _) => other,
            (_, QueryOp::None) => self,
            (QueryOp::Or, QueryOp::Or) => {
                let mut q = self;
                let mut o = other;
                q.trigram.append(&mut o.trigram);
                q.sub.append(&mut o.sub);
                q
            }
            (QueryOp::Or, _) => {
                let mut q = self;
                q.sub.push(other);
                q
            }
            (_, QueryOp::Or) => {
                let mut q = other;
                q.sub.push(self);
                q
            }
            _ => Query {
                op: QueryOp::Or,
                trigram: BTreeSet::new(),
                sub: vec![self, other],
            },
        }
    }

    /// Truth of this query against a file's trigram set. Used by tests to
    /// check soundness; the index evaluates the same semantics over posting
    /// lists.
    pub fn eval(&self, trigrams: &dyn Fn(Trigram) -> bool) -> bool {
        match self.op {
            QueryOp::All => true,
            QueryOp::None => false,
            QueryOp::And => {
                self.trigram.iter().all(|&t| trigrams(t)) && self.sub.iter().all(|s| s.eval(trigrams))
            }
            QueryOp::Or => {
                self.trigram.iter().any(|&t| trigrams(t)) || self.sub.iter().any(|s| s.eval(trigrams))
            }
        }
    }
}

/// Compact form for verbose logging: trigrams quoted, joined with `&`/`|`.
impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            QueryOp::All => f.write_str("+"),
            QueryOp::None => f.write_str("-"),
            QueryOp::And | QueryOp::Or => {
                let sep = if self.op == QueryOp::And { " & " } else { " | " };
                let mut first = true;
                for &t in &self.trigram {
                    if !first {
                        f.write_str(sep)?;
                    }
                    first = false;
                    write!(f, "\"{}\"", trigram_to_bytes(t).escape_ascii())?;
                }
                for s in &self.sub {
                    if !first {
                        f.write_str(sep)?;
                    }
                    first = false;
                    write!(f, "({s})")?;
                }
                Ok(())
            }
        }
    }
}

/// Parse a pattern into the syntax tree the planner and the matcher share.
pub fn parse_pattern(pattern: &str, case_insensitive: bool) -> crate::error::Result<Hir> {
    Ok(ParserBuilder::new()
        .multi_line(true)
        .case_insensitive(case_insensitive)
        .build()
        .parse(pattern)?)
}

/// Lower a regex syntax tree into a sound trigram query.
pub fn regexp_query(hir: &Hir) -> Query {
    lower(hir).query
}

/// Per-node analysis: a sound query, plus (when small) the exact set of
/// literal byte-strings the node can match. Exact sets let concatenation
/// capture trigrams that span child boundaries and enumerate small classes
/// and case variants; the caps above bound the expansion.
struct Lowered {
    exact: Option<Vec<Vec<u8>>>,
    query: Query,
}

impl Lowered {
    fn opaque(query: Query) -> Self {
        Lowered { exact: None, query }
    }

    fn exact(strings: Vec<Vec<u8>>) -> Self {
        let query = exact_query(&strings);
        Lowered {
            exact: Some(strings),
            query,
        }
    }
}

fn lower(hir: &Hir) -> Lowered {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => Lowered::exact(vec![Vec::new()]),
        HirKind::Literal(lit) => {
            let bytes = lit.0.to_vec();
            if bytes.len() <= MAX_EXACT_LEN {
                Lowered::exact(vec![bytes])
            } else {
                Lowered::opaque(trigrams_of(&bytes))
            }
        }
        HirKind::Class(class) => lower_class(class),
        HirKind::Capture(cap) => lower(&cap.sub),
        HirKind::Repetition(rep) => {
            if rep.min == 0 {
                return Lowered::opaque(Query::all());
            }
            let sub = lower(&rep.sub);
            if let Some(ex) = &sub.exact {
                let mut product = vec![Vec::new()];
                for _ in 0..rep.min {
                    match cross(&product, ex) {
                        Some(p) => product = p,
                        None => return Lowered::opaque(sub.query),
                    }
                }
                // The first `min` repetitions are always present, so their
                // product is a sound filter; it is the exact language only
                // for a fixed count.
                if rep.max == Some(rep.min) {
                    Lowered::exact(product)
                } else {
                    Lowered::opaque(exact_query(&product))
                }
            } else {
                Lowered::opaque(sub.query)
            }
        }
        HirKind::Concat(children) => lower_concat(children),
        HirKind::Alternation(children) => lower_alternation(children),
    }
}

fn lower_class(class: &Class) -> Lowered {
    let mut strings: Vec<Vec<u8>> = Vec::new();
    match class {
        Class::Unicode(cls) => {
            let mut count: usize = 0;
            for range in cls.ranges() {
                count += (range.end() as usize) - (range.start() as usize) + 1;
                if count > MAX_CLASS_CHARS {
                    return Lowered::opaque(Query::all());
                }
            }
            for range in cls.ranges() {
                for c in range.start()..=range.end() {
                    let mut buf = [0u8; 4];
                    strings.push(c.encode_utf8(&mut buf).as_bytes().to_vec());
                }
            }
        }
        Class::Bytes(cls) => {
            let mut count: usize = 0;
            for range in cls.ranges() {
                count += (range.end() as usize) - (range.start() as usize) + 1;
                if count > MAX_CLASS_CHARS {
                    return Lowered::opaque(Query::all());
                }
            }
            for range in cls.ranges() {
                for b in range.start()..=range.end() {
                    strings.push(vec![b]);
                }
            }
        }
    }
    // An empty class matches nothing at all.
    if strings.is_empty() {
        return Lowered {
            exact: Some(Vec::new()),
            query: Query::none(),
        };
    }
    Lowered::exact(strings)
}

fn lower_concat(children: &[Hir]) -> Lowered {
    let mut query = Query::all();
    // Literal alternatives for the run of children since the last flush.
    let mut run: Vec<Vec<u8>> = vec![Vec::new()];
    // Whether `run` still covers the concatenation from its start.
    let mut whole = true;

    for child in children {
        let lowered = lower(child);
        match lowered.exact {
            Some(ex) => match cross(&run, &ex) {
                Some(product) => run = product,
                None => {
                    query = query.and(exact_query(&run));
                    run = ex;
                    whole = false;
                }
            },
            None => {
                query = query.and(exact_query(&run)).and(lowered.query);
                run = vec![Vec::new()];
                whole = false;
            }
        }
    }

    if whole {
        Lowered::exact(run)
    } else {
        Lowered::opaque(query.and(exact_query(&run)))
    }
}

fn lower_alternation(children: &[Hir]) -> Lowered {
    let lowered: Vec<Lowered> = children.iter().map(lower).collect();

    let mut query = Query::none();
    for l in &lowered {
        query = query.or(l.query.clone());
    }

    let mut union: Option<Vec<Vec<u8>>> = Some(Vec::new());
    for l in &lowered {
        union = match (union, &l.exact) {
            (Some(mut acc), Some(ex)) if acc.len() + ex.len() <= MAX_EXACT_STRINGS => {
                acc.extend(ex.iter().cloned());
                Some(acc)
            }
            _ => None,
        };
    }

    Lowered {
        exact: union,
        query,
    }
}

/// Sound query for "the text contains one of these strings": OR over each
/// string's trigram conjunction. A string shorter than 3 bytes cannot be
/// pruned on, making its branch (and so the whole OR) `All`. An empty set
/// matches nothing.
fn exact_query(strings: &[Vec<u8>]) -> Query {
    let mut query = Query::none();
    for s in strings {
        query = query.or(trigrams_of(s));
    }
    query
}

/// AND of every contiguous trigram of `bytes`; `All` when too short.
fn trigrams_of(bytes: &[u8]) -> Query {
    if bytes.len() < 3 {
        return Query::all();
    }
    let trigrams: BTreeSet<Trigram> = bytes
        .windows(3)
        .map(|w| bytes_to_trigram(w[0], w[1], w[2]))
        .collect();
    Query::and_trigrams(trigrams)
}

/// Cross product of two literal sets, or None past the size caps.
fn cross(left: &[Vec<u8>], right: &[Vec<u8>]) -> Option<Vec<Vec<u8>>> {
    let size = left.len().checked_mul(right.len())?;
    if size > MAX_EXACT_STRINGS {
        return None;
    }
    let mut out = Vec::with_capacity(size);
    for l in left {
        for r in right {
            if l.len() + r.len() > MAX_EXACT_LEN {
                return None;
            }
            let mut s = l.clone();
            s.extend_from_slice(r);
            out.push(s);
        }
    }
    Some(out)
}
