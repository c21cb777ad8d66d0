//! ADA-109: Utilities.
//!
//! ADASAV-style save/restore of a whole database as a JSON image. Loading
//! an image validates it and builds a [`Nucleus`]; saving walks the
//! nucleus' files in physical order.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::fdt::{Fdt, FieldDef};
use crate::nucleus::{Nucleus, NucleusParams};
use crate::storage::{AdabasFile, Isn, Record};
use crate::AdabasError;

// ── DatabaseImage ──────────────────────────────────────────────────

/// A saved database: its id and every file with schema and records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseImage {
    /// Database id served by the restored nucleus.
    pub database: u16,
    /// Files in file-number order.
    #[serde(default)]
    pub files: Vec<FileImage>,
}

/// One file of a [`DatabaseImage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileImage {
    /// File number.
    pub number: u16,
    /// File name.
    #[serde(default)]
    pub name: String,
    /// FDT entries.
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Records in physical order.
    #[serde(default)]
    pub records: Vec<RecordImage>,
}

/// One record of a [`FileImage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordImage {
    /// Record ISN.
    pub isn: Isn,
    /// Field values.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl DatabaseImage {
    /// Read an image from a JSON file.
    pub fn read(path: &Path) -> Result<Self, AdabasError> {
        let text = fs::read_to_string(path).map_err(|source| AdabasError::ImageIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| AdabasError::ImageFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the image as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<(), AdabasError> {
        let text = serde_json::to_string_pretty(self).map_err(|source| AdabasError::ImageFormat {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text + "\n").map_err(|source| AdabasError::ImageIo {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), files = self.files.len(), "database image written");
        Ok(())
    }

    /// Validate the image and build a nucleus serving it.
    pub fn into_nucleus(self, params: NucleusParams) -> Result<Nucleus, AdabasError> {
        let mut nucleus = Nucleus::new(self.database, params);
        for image in self.files {
            let fdt = Fdt::from_fields(image.fields)?;
            let mut file = AdabasFile::new(image.number, image.name, fdt);
            for record in image.records {
                file.store_record(record.isn, Record { fields: record.fields })?;
            }
            nucleus.define_file(file)?;
        }
        Ok(nucleus)
    }

    /// Capture the current contents of a nucleus.
    pub fn from_nucleus(nucleus: &Nucleus) -> Self {
        let files = nucleus
            .files()
            .map(|file| FileImage {
                number: file.file_number,
                name: file.name.clone(),
                fields: file.fdt.fields().to_vec(),
                records: file
                    .physical_records()
                    .map(|(isn, record)| RecordImage {
                        isn,
                        fields: record.fields.clone(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            database: nucleus.db_id(),
            files,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────
