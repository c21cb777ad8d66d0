//! ADA-104: Search Commands.
//!
//! Provides search criteria with comparison operators, search/value buffer
//! parsing with AND/OR/NOT/range logic, and ISN list management.

use std::cmp::Ordering;

use crate::acb::{is_field_name, single_char};
use crate::fdt::FieldType;
use crate::storage::{AdabasFile, Isn};
use crate::AdabasError;

// ── SearchOperator ─────────────────────────────────────────────────

/// Comparison operator for search criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOperator {
    /// Equal.
    Eq,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Ge,
    /// Less than or equal.
    Le,
    /// Not equal.
    Ne,
}

impl SearchOperator {
    /// Parse a string operator code.
    pub fn parse(code: &str) -> Result<Self, AdabasError> {
        match code.to_uppercase().as_str() {
            "EQ" => Ok(Self::Eq),
            "GT" => Ok(Self::Gt),
            "LT" => Ok(Self::Lt),
            "GE" => Ok(Self::Ge),
            "LE" => Ok(Self::Le),
            "NE" => Ok(Self::Ne),
            _ => Err(AdabasError::InvalidSearchOperator {
                op: code.to_string(),
            }),
        }
    }

    /// Whether a comparison result satisfies this operator.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
            Self::Ge => ordering != Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Ne => ordering != Ordering::Equal,
        }
    }
}

impl std::fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Eq => "EQ",
            Self::Gt => "GT",
            Self::Lt => "LT",
            Self::Ge => "GE",
            Self::Le => "LE",
            Self::Ne => "NE",
        };
        f.write_str(s)
    }
}

// ── SearchCriteria ─────────────────────────────────────────────────

/// A single search condition: field, operator, and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    /// The descriptor field name.
    pub field: String,
    /// How stored values are compared.
    pub field_type: FieldType,
    /// The comparison operator.
    pub operator: SearchOperator,
    /// The search value (normalized).
    pub value: String,
    /// Inclusive upper bound for a range (`S` connector).
    pub upper: Option<String>,
}

impl SearchCriteria {
    /// Create a new search criteria.
    pub fn new(
        field: impl Into<String>,
        field_type: FieldType,
        operator: SearchOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            field_type,
            operator,
            value: value.into(),
            upper: None,
        }
    }

    /// Evaluate whether a given field value satisfies this criterion.
    pub fn matches(&self, field_value: &str) -> bool {
        let lower = self.field_type.compare(field_value, &self.value);
        match &self.upper {
            Some(upper) => {
                lower != Ordering::Less
                    && self.field_type.compare(field_value, upper) != Ordering::Greater
            }
            None => self.operator.accepts(lower),
        }
    }
}

// ── LogicalOp ──────────────────────────────────────────────────────

/// Logical connectors for compound search expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// Logical AND (`D`, intersection of ISN sets).
    And,
    /// Logical OR (`O`, union of ISN sets).
    Or,
    /// Logical NOT (`N`, subtract from preceding set).
    Not,
}

// ── SearchBuffer ───────────────────────────────────────────────────

/// A parsed search expression: a sequence of criteria connected by
/// logical operators (AND, OR, NOT).
#[derive(Debug, Clone)]
pub struct SearchBuffer {
    /// Criteria with the connector joining each to the result so far.
    pub criteria: Vec<(Option<LogicalOp>, SearchCriteria)>,
}

/// One term of the search buffer before values are attached.
struct Term {
    field: String,
    length: Option<u16>,
    format: Option<FieldType>,
    operator: SearchOperator,
}

impl SearchBuffer {
    /// Create a new search buffer with an initial criterion.
    pub fn new(initial: SearchCriteria) -> Self {
        Self {
            criteria: vec![(None, initial)],
        }
    }

    /// Add a criterion with a logical connector.
    pub fn add(&mut self, op: LogicalOp, criteria: SearchCriteria) {
        self.criteria.push((Some(op), criteria));
    }

    /// Parse a search buffer and its value buffer against a file's FDT.
    ///
    /// Syntax: `AA,8,A,EQ,D,AB,3,U,GE.`. Each term is a descriptor name,
    /// an optional length, an optional format (after a length) and an
    /// optional operator (default `EQ`). Terms are joined by `D` (and),
    /// `O` (or), `N` (not) or `S` (range to the next term). Values are
    /// taken from the value buffer in term order.
    pub fn parse(search: &[u8], value: &[u8], file: &AdabasFile) -> Result<Self, AdabasError> {
        let text = String::from_utf8_lossy(search);
        let invalid = || AdabasError::InvalidSearchBuffer {
            spec: text.to_string(),
        };

        let body = text.trim().strip_suffix('.').ok_or_else(invalid)?;
        let tokens: Vec<String> = body.split(',').map(|t| t.trim().to_uppercase()).collect();

        let mut terms: Vec<(Term, Option<char>)> = Vec::new();
        let mut i = 0;
        loop {
            let field = tokens.get(i).filter(|t| is_field_name(t)).ok_or_else(invalid)?;
            i += 1;

            let mut term = Term {
                field: field.clone(),
                length: None,
                format: None,
                operator: SearchOperator::Eq,
            };
            if let Some(length) = tokens.get(i).and_then(|t| t.parse::<u16>().ok()) {
                if length == 0 {
                    return Err(invalid());
                }
                term.length = Some(length);
                i += 1;
                if let Some(format) = tokens
                    .get(i)
                    .and_then(|t| single_char(t))
                    .and_then(FieldType::from_code)
                {
                    term.format = Some(format);
                    i += 1;
                }
            }
            if let Some(op) = tokens.get(i).and_then(|t| SearchOperator::parse(t).ok()) {
                term.operator = op;
                i += 1;
            }

            match tokens.get(i) {
                None => {
                    terms.push((term, None));
                    break;
                }
                Some(token) => {
                    let connector = single_char(token)
                        .filter(|c| matches!(c, 'D' | 'O' | 'N' | 'S'))
                        .ok_or_else(invalid)?;
                    terms.push((term, Some(connector)));
                    i += 1;
                }
            }
        }

        let mut values = ValueReader::new(value);
        let mut resolved: Vec<(SearchCriteria, Option<char>)> = Vec::with_capacity(terms.len());
        let mut range_open = false;
        for (term, connector) in terms {
            let def = file.fdt.get_field(&term.field).ok_or_else(|| AdabasError::UnknownField {
                file_number: file.file_number,
                field: term.field.clone(),
            })?;
            if !def.is_descriptor {
                return Err(AdabasError::NotDescriptor {
                    field: term.field.clone(),
                });
            }
            let field_type = term.format.unwrap_or(def.field_type);
            let length = usize::from(term.length.unwrap_or(def.length));
            let raw = values.take(length, &term.field)?;
            let normalized = field_type.normalize(raw);

            if range_open {
                // Upper bound of the preceding `S` term.
                let (lower, _) = resolved.last_mut().ok_or_else(invalid)?;
                if lower.field != term.field {
                    return Err(invalid());
                }
                lower.upper = Some(normalized);
                resolved.last_mut().ok_or_else(invalid)?.1 = connector;
            } else {
                resolved.push((
                    SearchCriteria::new(term.field, field_type, term.operator, normalized),
                    connector,
                ));
            }
            range_open = connector == Some('S');
        }
        if range_open {
            return Err(invalid());
        }

        let mut buffer: Option<SearchBuffer> = None;
        let mut pending: Option<LogicalOp> = None;
        for (criteria, connector) in resolved {
            match buffer.as_mut() {
                None => buffer = Some(SearchBuffer::new(criteria)),
                Some(sb) => sb.add(pending.unwrap_or(LogicalOp::And), criteria),
            }
            pending = match connector {
                Some('O') => Some(LogicalOp::Or),
                Some('N') => Some(LogicalOp::Not),
                _ => Some(LogicalOp::And),
            };
        }
        buffer.ok_or_else(invalid)
    }

    /// Evaluate the search expression against a file, returning the
    /// resulting ISN list.
    pub fn evaluate(&self, file: &AdabasFile) -> Isnlist {
        let mut result_isns: Option<Vec<Isn>> = None;

        for (logical_op, criterion) in &self.criteria {
            let matching_isns = find_matching_isns(file, criterion);

            result_isns = Some(match (result_isns, logical_op) {
                (None, _) => matching_isns,
                (Some(current), Some(LogicalOp::Or)) => union_sorted(&current, &matching_isns),
                (Some(current), Some(LogicalOp::Not)) => {
                    subtract_sorted(&current, &matching_isns)
                }
                (Some(current), Some(LogicalOp::And) | None) => {
                    intersect_sorted(&current, &matching_isns)
                }
            });
        }

        Isnlist::new(result_isns.unwrap_or_default())
    }
}

/// Sequential reader over the value buffer.
struct ValueReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ValueReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, length: usize, field: &str) -> Result<&'a str, AdabasError> {
        let end = self.offset + length;
        if end > self.bytes.len() {
            return Err(AdabasError::ValueBufferTooShort {
                needed: end,
                available: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        std::str::from_utf8(slice).map_err(|_| AdabasError::InvalidText {
            field: field.to_string(),
        })
    }
}

/// Find ISNs (ascending) of records matching a criterion.
fn find_matching_isns(file: &AdabasFile, criterion: &SearchCriteria) -> Vec<Isn> {
    file.isns()
        .filter(|&isn| {
            let stored = file
                .read_record(isn)
                .ok()
                .and_then(|r| r.get(&criterion.field))
                .unwrap_or("");
            criterion.matches(stored)
        })
        .collect()
}

/// Compute the intersection of two sorted ISN lists.
fn intersect_sorted(a: &[Isn], b: &[Isn]) -> Vec<Isn> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
        }
    }
    result
}

/// Compute the union of two sorted ISN lists.
fn union_sorted(a: &[Isn], b: &[Isn]) -> Vec<Isn> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                result.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                result.push(b[j]);
                j += 1;
            }
        }
    }
    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}

/// Subtract ISNs in `b` from `a` (both sorted).
fn subtract_sorted(a: &[Isn], b: &[Isn]) -> Vec<Isn> {
    a.iter()
        .copied()
        .filter(|isn| b.binary_search(isn).is_err())
        .collect()
}

// ── Isnlist ────────────────────────────────────────────────────────

/// A sorted list of ISNs matching search criteria.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Isnlist {
    /// The ISNs in sorted order.
    isns: Vec<Isn>,
}

impl Isnlist {
    /// Create a new ISN list from a vector (will be sorted and deduplicated).
    pub fn new(mut isns: Vec<Isn>) -> Self {
        isns.sort_unstable();
        isns.dedup();
        Self { isns }
    }

    /// Return the number of ISNs.
    pub fn count(&self) -> usize {
        self.isns.len()
    }

    /// Return all ISNs.
    pub fn isns(&self) -> &[Isn] {
        &self.isns
    }

    /// ISNs strictly greater than `lower_limit`.
    pub fn above(&self, lower_limit: Isn) -> &[Isn] {
        let start = self.isns.partition_point(|&isn| isn <= lower_limit);
        &self.isns[start..]
    }

    /// Check whether a specific ISN is contained.
    pub fn contains(&self, isn: Isn) -> bool {
        self.isns.binary_search(&isn).is_ok()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.isns.is_empty()
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fdt::{Fdt, FieldDef};
    use crate::storage::Record;

    /// AA name (descriptor), AB age (descriptor), AC city (plain).
    fn people() -> AdabasFile {
        let fdt = Fdt::from_fields([
            FieldDef::new("AA", FieldType::Alpha, 8).with_descriptor(),
            FieldDef::new("AB", FieldType::Unpacked, 3).with_descriptor(),
            FieldDef::new("AC", FieldType::Alpha, 8),
        ])
        .unwrap();
        let mut file = AdabasFile::new(1, "PEOPLE", fdt);
        for (isn, name, age) in [
            (1, "SMITH", "30"),
            (2, "JONES", "45"),
            (3, "SMITH", "52"),
            (5, "SMITH", "17"),
            (8, "BAKER", "30"),
        ] {
            file.store_record(
                isn,
                Record::new().with_field("AA", name).with_field("AB", age),
            )
            .unwrap();
        }
        file
    }

    #[test]
    fn search_operator_parse() {
        assert_eq!(SearchOperator::parse("EQ").unwrap(), SearchOperator::Eq);
        assert_eq!(SearchOperator::parse("gt").unwrap(), SearchOperator::Gt);
        assert!(SearchOperator::parse("XX").is_err());
        assert_eq!(SearchOperator::Ne.to_string(), "NE");
    }

    #[test]
    fn search_criteria_matches() {
        let c = SearchCriteria::new("AA", FieldType::Alpha, SearchOperator::Eq, "SMITH");
        assert!(c.matches("SMITH"));
        assert!(!c.matches("JONES"));

        let c2 = SearchCriteria::new("AB", FieldType::Unpacked, SearchOperator::Gt, "100");
        assert!(c2.matches("200"));
        assert!(!c2.matches("050"));

        let mut range = SearchCriteria::new("AB", FieldType::Unpacked, SearchOperator::Eq, "20");
        range.upper = Some("40".to_string());
        assert!(range.matches("30"));
        assert!(range.matches("40"));
        assert!(!range.matches("41"));
    }

    #[test]
    fn parse_single_criterion() {
        let file = people();
        let sb = SearchBuffer::parse(b"AA.", b"SMITH   ", &file).unwrap();
        assert_eq!(sb.criteria.len(), 1);
        assert_eq!(sb.criteria[0].1.value, "SMITH");
        assert_eq!(sb.evaluate(&file).isns(), &[1, 3, 5]);
    }

    #[test]
    fn parse_with_length_and_operator() {
        let file = people();
        let sb = SearchBuffer::parse(b"AB,2,U,GE.", b"45", &file).unwrap();
        assert_eq!(sb.criteria[0].1.operator, SearchOperator::Ge);
        assert_eq!(sb.evaluate(&file).isns(), &[2, 3]);
    }

    #[test]
    fn parse_and_connector() {
        let file = people();
        let sb = SearchBuffer::parse(b"AA,5,D,AB,2,EQ.", b"SMITH30", &file).unwrap();
        assert_eq!(sb.evaluate(&file).isns(), &[1]);
    }

    #[test]
    fn parse_or_and_not_connectors() {
        let file = people();
        let or = SearchBuffer::parse(b"AA,5,O,AA,5.", b"JONESBAKER", &file).unwrap();
        assert_eq!(or.evaluate(&file).isns(), &[2, 8]);

        let not = SearchBuffer::parse(b"AA,5,N,AB,2,LT.", b"SMITH18", &file).unwrap();
        assert_eq!(not.evaluate(&file).isns(), &[1, 3]);
    }

    #[test]
    fn parse_range_connector() {
        let file = people();
        let sb = SearchBuffer::parse(b"AB,2,S,AB,2.", b"3050", &file).unwrap();
        assert_eq!(sb.criteria.len(), 1);
        assert_eq!(sb.evaluate(&file).isns(), &[1, 2, 8]);
    }

    #[test]
    fn parse_rejects_bad_syntax() {
        let file = people();
        for spec in [&b"AA"[..], b".", b"AA,X.", b"AA,D.", b"AA,S.", b"AB,2,S,AA,5."] {
            let err = SearchBuffer::parse(spec, b"SMITH   3050", &file).unwrap_err();
            assert_eq!(err.response_code(), crate::ResponseCode::SEARCH_BUFFER_SYNTAX, "{spec:?}");
        }
    }

    #[test]
    fn parse_rejects_non_descriptor_and_short_value() {
        let file = people();
        assert!(matches!(
            SearchBuffer::parse(b"AC.", b"PARIS   ", &file),
            Err(AdabasError::NotDescriptor { .. })
        ));
        assert!(matches!(
            SearchBuffer::parse(b"AA.", b"SMI", &file),
            Err(AdabasError::ValueBufferTooShort { needed: 8, available: 3 })
        ));
        assert!(matches!(
            SearchBuffer::parse(b"ZZ.", b"x", &file),
            Err(AdabasError::UnknownField { .. })
        ));
    }

    #[test]
    fn isnlist_creation() {
        let list = Isnlist::new(vec![5, 3, 1, 3, 5]);
        assert_eq!(list.isns(), &[1, 3, 5]);
        assert_eq!(list.count(), 3);
        assert!(list.contains(3));
        assert!(!list.contains(4));
    }

    #[test]
    fn isnlist_above_lower_limit() {
        let list = Isnlist::new(vec![10, 20, 30]);
        assert_eq!(list.above(0), &[10, 20, 30]);
        assert_eq!(list.above(10), &[20, 30]);
        assert_eq!(list.above(25), &[30]);
        assert!(list.above(30).is_empty());
    }

    #[test]
    fn sorted_set_operations() {
        assert_eq!(intersect_sorted(&[1, 2, 3, 4], &[3, 4, 5]), vec![3, 4]);
        assert_eq!(union_sorted(&[1, 3, 5], &[2, 3, 4]), vec![1, 2, 3, 4, 5]);
        assert_eq!(subtract_sorted(&[1, 3, 5], &[3]), vec![1, 5]);
    }

    #[test]
    fn isnlist_empty() {
        let list = Isnlist::new(vec![]);
        assert!(list.is_empty());
        assert_eq!(list.count(), 0);
    }
}
