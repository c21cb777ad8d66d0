//! ADA-101: FDT & Field System.
//!
//! Provides the Field Definition Table (FDT), individual field definitions
//! and the field types a record value is stored and compared as.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::AdabasError;

// ── FieldType ──────────────────────────────────────────────────────

/// The data type of an ADABAS field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Alphanumeric (left-justified, space-padded).
    #[serde(rename = "A")]
    Alpha,
    /// Unpacked decimal.
    #[serde(rename = "U")]
    Unpacked,
    /// Packed decimal (BCD).
    #[serde(rename = "P")]
    Packed,
    /// Fixed-point (binary integer).
    #[serde(rename = "F")]
    FixedPoint,
}

impl FieldType {
    /// Look up a field type by its one-letter format code.
    pub fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'A' => Some(Self::Alpha),
            'U' => Some(Self::Unpacked),
            'P' => Some(Self::Packed),
            'F' => Some(Self::FixedPoint),
            _ => None,
        }
    }

    /// Whether values of this type compare numerically.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Alpha)
    }

    /// Normalize a raw buffer slice into the stored representation.
    ///
    /// Alpha values lose their trailing blanks; numeric values lose all
    /// surrounding blanks.
    pub fn normalize(self, raw: &str) -> String {
        match self {
            Self::Alpha => raw.trim_end_matches(' ').to_string(),
            _ => raw.trim().to_string(),
        }
    }

    /// Compare a stored value against a search value.
    pub fn compare(self, stored: &str, wanted: &str) -> Ordering {
        if self.is_numeric() {
            if let (Ok(a), Ok(b)) = (parse_number(stored), parse_number(wanted)) {
                return a.cmp(&b);
            }
        }
        stored.trim_end_matches(' ').cmp(wanted.trim_end_matches(' '))
    }
}

fn parse_number(value: &str) -> Result<i64, std::num::ParseIntError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Ok(0)
    } else {
        trimmed.parse()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Alpha => "A",
            Self::Unpacked => "U",
            Self::Packed => "P",
            Self::FixedPoint => "F",
        };
        f.write_str(s)
    }
}

// ── FieldDef ───────────────────────────────────────────────────────

/// A single field definition in the FDT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Two-character short name (e.g. "AA", "AB").
    pub name: String,
    /// Field data type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Standard length in bytes.
    pub length: u16,
    /// Whether this field is a descriptor (searchable).
    #[serde(default, rename = "descriptor")]
    pub is_descriptor: bool,
}

impl FieldDef {
    /// Create a new field definition.
    pub fn new(name: impl Into<String>, field_type: FieldType, length: u16) -> Self {
        Self {
            name: name.into(),
            field_type,
            length,
            is_descriptor: false,
        }
    }

    /// Mark this field as a descriptor.
    pub fn with_descriptor(mut self) -> Self {
        self.is_descriptor = true;
        self
    }
}

// ── Fdt ────────────────────────────────────────────────────────────

/// Field Definition Table: the schema of an ADABAS file.
#[derive(Debug, Clone)]
pub struct Fdt {
    /// Ordered list of field definitions.
    fields: Vec<FieldDef>,
    /// Fast lookup by field name.
    index: HashMap<String, usize>,
}

impl Fdt {
    /// Create an empty FDT.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build an FDT from a list of definitions, rejecting duplicates.
    pub fn from_fields(fields: impl IntoIterator<Item = FieldDef>) -> Result<Self, AdabasError> {
        let mut fdt = Self::new();
        for field in fields {
            fdt.add_field(field)?;
        }
        Ok(fdt)
    }

    /// Add a field definition to the FDT.
    pub fn add_field(&mut self, field: FieldDef) -> Result<(), AdabasError> {
        if self.index.contains_key(&field.name) {
            return Err(AdabasError::DuplicateField {
                name: field.name.clone(),
            });
        }
        let pos = self.fields.len();
        self.index.insert(field.name.clone(), pos);
        self.fields.push(field);
        Ok(())
    }

    /// Look up a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Return all field definitions in order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }
}

impl Default for Fdt {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
