//! Tabular Plan Rendering Parser
//!
//! Parses lines of the pipe-delimited plan rendering produced by the
//! optimizer's display function:
//!
//! ```text
//! ---------------------------------------------------------------------------
//! | Id  | Operation          | Name      | Rows  | Bytes | Cost (%CPU)| Time     |
//! ---------------------------------------------------------------------------
//! |   0 | SELECT STATEMENT   |           |   107 |  7383 |     3   (0)| 00:00:01 |
//! |*  1 |  TABLE ACCESS FULL | EMPLOYEES |   107 |  7383 |     3   (0)| 00:00:01 |
//! ---------------------------------------------------------------------------
//!
//! Predicate Information (identified by operation id):
//! ---------------------------------------------------
//!    1 - filter("SALARY">1000)
//! ```
//!
//! Columns are located by position, so this module is the only place that
//! knows the rendering layout.

use crate::explain::notation::parse_or_zero;
use crate::explain::plan::ExecutionStep;
use std::sync::LazyLock;

use regex::Regex;

const MIN_FIELDS: usize = 7;
const ID_FIELD: usize = 1;
const OPERATION_FIELD: usize = 2;
const OBJECT_FIELD: usize = 3;
const ROWS_FIELD: usize = 4;
const BYTES_FIELD: usize = 5;
const COST_FIELD: usize = 6;

/// Marker prefixed to the id of steps that carry predicates
const PREDICATE_MARKER: char = '*';

// The closing parenthesis may sit on a later line when the rendering wraps
static PREDICATE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\*?\s*(\d+)\s+-\s+(access|filter)\((.*)$").expect("valid regex")
});

// A step with both kinds lists the second one on its own line without an id
static PREDICATE_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+(access|filter)\((.*)$").expect("valid regex"));

/// Kind of predicate listed in the rendering's predicate section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    Access,
    Filter,
}

/// Parses one data row of the tabular rendering
///
/// Returns `None` for lines that are not data rows: too few fields, or an
/// id column that is empty, a bare `*`, or not an integer. Rows, bytes and
/// cost that fail to parse become zero rather than rejecting the line.
///
/// # Examples
///
/// ```
/// use planscope_analyzer::explain::plan_line::parse_plan_line;
///
/// let step = parse_plan_line("|   1 |  TABLE ACCESS FULL | EMPLOYEES |  1.2K | 20K |   120 (2%)| 00:00:01 |").unwrap();
/// assert_eq!(step.operation, "TABLE ACCESS FULL");
/// assert_eq!(step.cardinality, 1_200);
/// assert_eq!(step.cost, 120.0);
///
/// assert!(parse_plan_line("| Id | Operation |").is_none());
/// ```
pub fn parse_plan_line(line: &str) -> Option<ExecutionStep> {
    let mut fields: Vec<&str> = line.split('|').collect();
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }

    if fields.len() < MIN_FIELDS {
        return None;
    }

    let id_field = fields[ID_FIELD].trim();
    if id_field.is_empty() || id_field == "*" {
        return None;
    }
    let id = id_field
        .trim_start_matches(PREDICATE_MARKER)
        .trim()
        .parse::<u32>()
        .ok()?;

    let mut step = ExecutionStep::new(id, fields[OPERATION_FIELD].trim());

    let object = fields[OBJECT_FIELD].trim();
    if !object.is_empty() {
        step.object_name = Some(object.to_string());
    }

    step.cardinality = parse_or_zero(fields[ROWS_FIELD]);
    step.bytes = parse_or_zero(fields[BYTES_FIELD]);

    // "1622   (1%)" -> "1622"
    step.cost = fields[COST_FIELD]
        .split_whitespace()
        .next()
        .map(parse_or_zero)
        .unwrap_or(0) as f64;

    Some(step)
}

/// Parses one complete entry of the rendering's predicate section
///
/// Returns the step id, the predicate kind and the predicate text. Entries
/// whose parentheses do not close on this line need a [`PredicateCollector`].
///
/// ```
/// use planscope_analyzer::explain::plan_line::{parse_predicate_line, PredicateKind};
///
/// let (id, kind, text) = parse_predicate_line(r#"   2 - access("E"."DEPARTMENT_ID"=10)"#).unwrap();
/// assert_eq!((id, kind), (2, PredicateKind::Access));
/// assert_eq!(text, r#""E"."DEPARTMENT_ID"=10"#);
/// ```
pub fn parse_predicate_line(line: &str) -> Option<(u32, PredicateKind, String)> {
    let mut entry = open_entry(line)?;
    entry.feed(entry_body(line)?).then(|| entry.into_parts())
}

/// Parses an id-less predicate line that continues the previous entry
pub fn parse_predicate_continuation(line: &str) -> Option<(PredicateKind, String)> {
    let captures = PREDICATE_CONTINUATION.captures(line)?;
    let mut entry = PendingPredicate::new(0, predicate_kind(captures.get(1)?.as_str()));
    entry
        .feed(captures.get(2)?.as_str())
        .then(|| entry.into_parts())
        .map(|(_, kind, text)| (kind, text))
}

fn open_entry(line: &str) -> Option<PendingPredicate> {
    let captures = PREDICATE_LINE.captures(line)?;
    let id = captures.get(1)?.as_str().parse::<u32>().ok()?;
    Some(PendingPredicate::new(id, predicate_kind(captures.get(2)?.as_str())))
}

fn entry_body(line: &str) -> Option<&str> {
    Some(PREDICATE_LINE.captures(line)?.get(3)?.as_str())
}

/// A predicate whose opening parenthesis has been seen
#[derive(Debug)]
struct PendingPredicate {
    id: u32,
    kind: PredicateKind,
    text: String,
    depth: usize,
    quote: Option<char>,
}

impl PendingPredicate {
    fn new(id: u32, kind: PredicateKind) -> Self {
        Self {
            id,
            kind,
            text: String::new(),
            depth: 1,
            quote: None,
        }
    }

    /// Appends one line of predicate text; returns true once the outer
    /// parenthesis closes. Parentheses inside quoted literals do not count.
    fn feed(&mut self, chunk: &str) -> bool {
        let chunk = chunk.trim();
        if !self.text.is_empty() && !chunk.is_empty() {
            self.text.push(' ');
        }
        for (i, ch) in chunk.char_indices() {
            match (self.quote, ch) {
                (Some(q), c) if c == q => self.quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') => self.quote = Some(ch),
                (None, '(') => self.depth += 1,
                (None, ')') => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        self.text.push_str(chunk[..i].trim_end());
                        return true;
                    }
                }
                (None, _) => {}
            }
        }
        self.text.push_str(chunk);
        false
    }

    fn into_parts(self) -> (u32, PredicateKind, String) {
        (self.id, self.kind, self.text)
    }
}

/// Gathers predicate entries from the rendering, joining wrapped lines
///
/// The display function wraps long predicates onto indented follow-on
/// lines. An entry stays open until its parentheses balance, a blank line
/// or table line appears, or the next entry starts.
///
/// ```
/// use planscope_analyzer::explain::plan_line::{PredicateCollector, PredicateKind};
///
/// let mut collector = PredicateCollector::new();
/// assert!(collector.push_line(r#"   1 - filter("SALARY">1000 AND"#));
/// assert!(collector.push_line(r#"              "JOB_ID"='IT_PROG')"#));
/// assert_eq!(
///     collector.finish(),
///     vec![(1, PredicateKind::Filter, r#""SALARY">1000 AND "JOB_ID"='IT_PROG'"#.to_string())]
/// );
/// ```
#[derive(Debug, Default)]
pub struct PredicateCollector {
    last_id: Option<u32>,
    pending: Option<PendingPredicate>,
    entries: Vec<(u32, PredicateKind, String)>,
}

impl PredicateCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one rendered line; returns true when it belonged to a predicate entry
    pub fn push_line(&mut self, line: &str) -> bool {
        if let Some(pending) = self.pending.as_mut() {
            let ends_entry = line.trim().is_empty()
                || line.trim_start().starts_with('|')
                || PREDICATE_LINE.is_match(line)
                || PREDICATE_CONTINUATION.is_match(line);
            if !ends_entry {
                if pending.feed(line) {
                    self.close_pending();
                }
                return true;
            }
            tracing::debug!(id = pending.id, "predicate entry ended before its parentheses closed");
            self.close_pending();
        }

        if let Some(mut entry) = open_entry(line) {
            self.last_id = Some(entry.id);
            let closed = entry_body(line).is_some_and(|body| entry.feed(body));
            self.pending = Some(entry);
            if closed {
                self.close_pending();
            }
            return true;
        }

        let Some(id) = self.last_id else {
            return false;
        };
        let Some(captures) = PREDICATE_CONTINUATION.captures(line) else {
            return false;
        };
        let mut entry = PendingPredicate::new(id, predicate_kind(&captures[1]));
        let closed = captures.get(2).is_some_and(|body| entry.feed(body.as_str()));
        self.pending = Some(entry);
        if closed {
            self.close_pending();
        }
        true
    }

    /// Returns every entry in rendering order, including one left open at the end
    pub fn finish(mut self) -> Vec<(u32, PredicateKind, String)> {
        self.close_pending();
        self.entries
    }

    fn close_pending(&mut self) {
        if let Some(entry) = self.pending.take() {
            self.entries.push(entry.into_parts());
        }
    }
}

fn predicate_kind(keyword: &str) -> PredicateKind {
    if keyword == "access" {
        PredicateKind::Access
    } else {
        PredicateKind::Filter
    }
}

/// Attaches a parsed predicate to the step with the matching id
///
/// A second predicate of the same kind for one step is appended after a
/// space. Returns false when no step has the id.
pub fn attach_predicate(
    steps: &mut [ExecutionStep],
    id: u32,
    kind: PredicateKind,
    text: String,
) -> bool {
    let Some(step) = steps.iter_mut().find(|s| s.id == id) else {
        return false;
    };
    let slot = match kind {
        PredicateKind::Access => &mut step.access_predicates,
        PredicateKind::Filter => &mut step.filter_predicates,
    };
    match slot {
        Some(existing) => {
            existing.push(' ');
            existing.push_str(&text);
        }
        None => *slot = Some(text),
    }
    true
}
