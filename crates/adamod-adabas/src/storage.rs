//! ADA-100: Record Storage.
//!
//! Provides the storage abstraction for an ADABAS file: Data Storage holding
//! records in physical (RABN) order, and the Address Converter that maps
//! ISNs to RABNs.

use std::collections::BTreeMap;

use crate::fdt::Fdt;
use crate::AdabasError;

// ── Types ──────────────────────────────────────────────────────────

/// Internal Sequence Number: unique identifier for a record within a file.
pub type Isn = u32;

/// Relative ADABAS Block Number: physical record address.
pub type Rabn = u64;

// ── Record ─────────────────────────────────────────────────────────

/// A decompressed record: field name to normalized value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    /// Field values keyed by field name.
    pub fields: BTreeMap<String, String>,
}

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field value, builder style.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Value of a field, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Set a field value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }
}

// ── AdabasFile ─────────────────────────────────────────────────────

/// An ADABAS file identified by a file number, with its FDT and storage areas.
#[derive(Debug, Clone)]
pub struct AdabasFile {
    /// The file number (1-5000).
    pub file_number: u16,
    /// Human-readable file name.
    pub name: String,
    /// Field Definition Table.
    pub fdt: Fdt,
    /// Data Storage area for this file.
    pub data_storage: DataStorage,
    /// ISN to RABN mapping.
    pub address_converter: AddressConverter,
}

impl AdabasFile {
    /// Create a new, empty ADABAS file.
    pub fn new(file_number: u16, name: impl Into<String>, fdt: Fdt) -> Self {
        Self {
            file_number,
            name: name.into(),
            fdt,
            data_storage: DataStorage::new(),
            address_converter: AddressConverter::new(),
        }
    }

    /// Store a record under an ISN at the end of Data Storage.
    pub fn store_record(&mut self, isn: Isn, record: Record) -> Result<Rabn, AdabasError> {
        if isn == 0 {
            return Err(AdabasError::ZeroIsn);
        }
        if self.address_converter.lookup(isn).is_some() {
            return Err(AdabasError::DuplicateIsn {
                file_number: self.file_number,
                isn,
            });
        }
        for field in record.fields.keys() {
            if self.fdt.get_field(field).is_none() {
                return Err(AdabasError::UnknownField {
                    file_number: self.file_number,
                    field: field.clone(),
                });
            }
        }
        let rabn = self.data_storage.store(isn, record);
        self.address_converter.insert(isn, rabn);
        Ok(rabn)
    }

    /// Read a record by ISN.
    pub fn read_record(&self, isn: Isn) -> Result<&Record, AdabasError> {
        let rabn = self.rabn_of(isn)?;
        self.data_storage
            .read(rabn)
            .map(|stored| &stored.record)
            .ok_or(AdabasError::IsnNotFound { isn })
    }

    /// Whether a record with this ISN exists.
    pub fn contains(&self, isn: Isn) -> bool {
        self.address_converter.lookup(isn).is_some()
    }

    /// Overwrite the given fields of a record, returning its before-image.
    pub fn update_fields(
        &mut self,
        isn: Isn,
        values: Vec<(String, String)>,
    ) -> Result<Record, AdabasError> {
        let rabn = self.rabn_of(isn)?;
        let stored = self
            .data_storage
            .read_mut(rabn)
            .ok_or(AdabasError::IsnNotFound { isn })?;
        let before = stored.record.clone();
        for (name, value) in values {
            stored.record.set(name, value);
        }
        Ok(before)
    }

    /// Replace a whole record in place (used to back out an update).
    pub fn replace_record(&mut self, isn: Isn, record: Record) -> Result<(), AdabasError> {
        let rabn = self.rabn_of(isn)?;
        let stored = self
            .data_storage
            .read_mut(rabn)
            .ok_or(AdabasError::IsnNotFound { isn })?;
        stored.record = record;
        Ok(())
    }

    /// Delete a record by ISN, returning its RABN and before-image.
    pub fn delete_record(&mut self, isn: Isn) -> Result<(Rabn, Record), AdabasError> {
        let rabn = self
            .address_converter
            .remove(isn)
            .ok_or(AdabasError::IsnNotFound { isn })?;
        self.data_storage
            .remove(rabn)
            .map(|stored| (rabn, stored.record))
            .ok_or(AdabasError::IsnNotFound { isn })
    }

    /// Put a deleted record back at its original RABN.
    pub fn restore_record(&mut self, isn: Isn, rabn: Rabn, record: Record) {
        self.data_storage.restore(rabn, isn, record);
        self.address_converter.insert(isn, rabn);
    }

    /// The first record in physical order after `after` (or the very first).
    pub fn next_physical(&self, after: Option<Rabn>) -> Option<(Rabn, Isn)> {
        self.data_storage.next_after(after)
    }

    /// All ISNs in ascending order.
    pub fn isns(&self) -> impl Iterator<Item = Isn> + '_ {
        self.address_converter.isns()
    }

    /// Records in physical order.
    pub fn physical_records(&self) -> impl Iterator<Item = (Isn, &Record)> + '_ {
        self.data_storage.iter().map(|(_, s)| (s.isn, &s.record))
    }

    /// Number of records in the file.
    pub fn record_count(&self) -> usize {
        self.address_converter.len()
    }

    fn rabn_of(&self, isn: Isn) -> Result<Rabn, AdabasError> {
        self.address_converter
            .lookup(isn)
            .ok_or(AdabasError::IsnNotFound { isn })
    }
}

// ── DataStorage ────────────────────────────────────────────────────

/// A record as held in Data Storage, tagged with its ISN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    /// Owning ISN.
    pub isn: Isn,
    /// Field values.
    pub record: Record,
}

/// Stores records keyed by RABN, iterated in physical order.
#[derive(Debug, Clone)]
pub struct DataStorage {
    blocks: BTreeMap<Rabn, StoredRecord>,
    next_rabn: Rabn,
}

impl DataStorage {
    /// Create an empty Data Storage area.
    pub fn new() -> Self {
        Self {
            blocks: BTreeMap::new(),
            next_rabn: 1,
        }
    }

    /// Append a record, returning the assigned RABN.
    pub fn store(&mut self, isn: Isn, record: Record) -> Rabn {
        let rabn = self.next_rabn;
        self.next_rabn += 1;
        self.blocks.insert(rabn, StoredRecord { isn, record });
        rabn
    }

    /// Re-insert a record at a known RABN.
    pub fn restore(&mut self, rabn: Rabn, isn: Isn, record: Record) {
        self.next_rabn = self.next_rabn.max(rabn + 1);
        self.blocks.insert(rabn, StoredRecord { isn, record });
    }

    /// Read a record by RABN.
    pub fn read(&self, rabn: Rabn) -> Option<&StoredRecord> {
        self.blocks.get(&rabn)
    }

    /// Mutable access to a record by RABN.
    pub fn read_mut(&mut self, rabn: Rabn) -> Option<&mut StoredRecord> {
        self.blocks.get_mut(&rabn)
    }

    /// Remove a record by RABN.
    pub fn remove(&mut self, rabn: Rabn) -> Option<StoredRecord> {
        self.blocks.remove(&rabn)
    }

    /// The first block strictly after `after`.
    pub fn next_after(&self, after: Option<Rabn>) -> Option<(Rabn, Isn)> {
        let start = after.map_or(0, |r| r + 1);
        self.blocks
            .range(start..)
            .next()
            .map(|(&rabn, stored)| (rabn, stored.isn))
    }

    /// Iterate blocks in RABN order.
    pub fn iter(&self) -> impl Iterator<Item = (Rabn, &StoredRecord)> + '_ {
        self.blocks.iter().map(|(&rabn, stored)| (rabn, stored))
    }
}

impl Default for DataStorage {
    fn default() -> Self {
        Self::new()
    }
}

// ── AddressConverter ───────────────────────────────────────────────

/// Maps ISN (Internal Sequence Number) to RABN (Relative ADABAS Block Number).
#[derive(Debug, Clone)]
pub struct AddressConverter {
    map: BTreeMap<Isn, Rabn>,
}

impl AddressConverter {
    /// Create an empty address converter.
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    /// Insert an ISN->RABN mapping.
    pub fn insert(&mut self, isn: Isn, rabn: Rabn) {
        self.map.insert(isn, rabn);
    }

    /// Look up the RABN for an ISN.
    pub fn lookup(&self, isn: Isn) -> Option<Rabn> {
        self.map.get(&isn).copied()
    }

    /// Remove the mapping for an ISN, returning the RABN if it existed.
    pub fn remove(&mut self, isn: Isn) -> Option<Rabn> {
        self.map.remove(&isn)
    }

    /// Mapped ISNs in ascending order.
    pub fn isns(&self) -> impl Iterator<Item = Isn> + '_ {
        self.map.keys().copied()
    }

    /// Return how many mappings exist.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the address converter is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for AddressConverter {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────────
