//! Turning manifest rows (or `send` arguments) into submittable documents.
//!
//! [`InvoiceDocument`] is the validated, typed form of one row. [`InvoiceDocument::into_new_document`]
//! resolves the destination node, maps metadata through a [`MetadataPlan`] and reads the file.
//! None of this talks to the remote service; node and catalog lists are passed in.

use chrono::NaiveDate;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

use crate::contract::{ClientError, NewDocument, Node};
use crate::manifest::ManifestRow;
use crate::metadata::MetadataPlan;

/// Invoice date pattern used in manifests: year, day, month. Day and month may be one digit.
pub const MANIFEST_DATE_FORMAT: &str = "%Y-%d-%m";

/// Separator between entries of the `files` column.
pub const FILE_LIST_SEPARATOR: char = ';';

pub const MAX_SUPPLIER_NAME: usize = 255;
pub const MAX_SUPPLIER_CODE: usize = 50;
pub const MAX_SUPPLIER_TAX_ID: usize = 11;
pub const MAX_INVOICE_NUMBER: usize = 50;

#[derive(Debug, Error)]
pub enum RowError {
    #[error("no file given")]
    NoFile,
    #[error("only one file per document is supported, got {0}")]
    MultipleFiles(usize),
    #[error("file {} doesn't exist", .0.display())]
    FileNotFound(PathBuf),
    #[error("failed to read file {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{field} is longer than {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
    #[error("invalid invoice date '{value}'")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("invalid year '{value}'")]
    InvalidYear {
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("year {0} must have four digits")]
    YearOutOfRange(i32),
    #[error("node with code '{0}' not found")]
    UnknownNode(String),
    #[error("value '{value}' doesn't fit metadata field '{label}' of type {data_type}")]
    MetadataValue {
        label: String,
        data_type: String,
        value: String,
    },
    #[error("submission failed: {0}")]
    Submit(#[source] ClientError),
}

/// A validated document description, independent of where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDocument {
    pub file: PathBuf,
    pub title: String,
    pub code: String,
    pub supplier_name: String,
    pub supplier_code: String,
    pub supplier_tax_id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub year: i32,
    pub node_code: String,
}

impl InvoiceDocument {
    /// Validates one manifest row.
    pub fn from_row(row: &ManifestRow) -> Result<Self, RowError> {
        let file = single_file(&row.files)?;
        let invoice_date = parse_manifest_date(&row.invoice_date)?;
        let year = parse_year(&row.year)?;
        let document = InvoiceDocument {
            file,
            title: row.title.clone(),
            code: row.code.clone(),
            supplier_name: row.supplier_name.clone(),
            supplier_code: row.supplier_code.clone(),
            supplier_tax_id: row.supplier_tax_id.clone(),
            invoice_number: row.invoice_number.clone(),
            invoice_date,
            year,
            node_code: row.node.clone(),
        };
        document.validate()?;
        Ok(document)
    }

    /// Checks field limits and that the file exists.
    pub fn validate(&self) -> Result<(), RowError> {
        if self.node_code.trim().is_empty() {
            return Err(RowError::MissingField("Node"));
        }
        check_length("nazivdobavitelja", &self.supplier_name, MAX_SUPPLIER_NAME)?;
        check_length("sifradobavitelja", &self.supplier_code, MAX_SUPPLIER_CODE)?;
        check_length(
            "davcnastevilkadobavitelja",
            &self.supplier_tax_id,
            MAX_SUPPLIER_TAX_ID,
        )?;
        check_length("stevilkaracuna", &self.invoice_number, MAX_INVOICE_NUMBER)?;
        if !(1000..=9999).contains(&self.year) {
            return Err(RowError::YearOutOfRange(self.year));
        }
        if !self.file.is_file() {
            error!(file = %self.file.display(), "Document file doesn't exist");
            return Err(RowError::FileNotFound(self.file.clone()));
        }
        Ok(())
    }

    /// Resolves the node, maps metadata and reads the file into a submittable document.
    pub fn into_new_document(
        self,
        nodes: &[Node],
        plan: &MetadataPlan,
    ) -> Result<NewDocument, RowError> {
        let node = find_node(nodes, &self.node_code)?;
        let metadata = plan.values_for(&self)?;
        let content = std::fs::read(&self.file).map_err(|source| RowError::ReadFile {
            path: self.file.clone(),
            source,
        })?;
        let (file_name, file_extension) = file_name_parts(&self.file);
        debug!(
            file = %self.file.display(),
            node = %node.code,
            metadata = metadata.len(),
            size = content.len(),
            "Prepared document"
        );
        Ok(NewDocument {
            node_id: node.id.clone(),
            label: self.title,
            code: self.code,
            file_name,
            file_extension,
            content,
            metadata,
        })
    }
}

/// Splits the `files` cell; exactly one entry is accepted.
pub fn single_file(files: &str) -> Result<PathBuf, RowError> {
    let entries: Vec<&str> = files
        .split(FILE_LIST_SEPARATOR)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    match entries.as_slice() {
        [] => Err(RowError::NoFile),
        [one] => Ok(PathBuf::from(one)),
        many => Err(RowError::MultipleFiles(many.len())),
    }
}

pub fn parse_manifest_date(value: &str) -> Result<NaiveDate, RowError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, MANIFEST_DATE_FORMAT).map_err(|source| {
        RowError::InvalidDate {
            value: value.to_string(),
            source,
        }
    })
}

/// Date given on the command line: ISO `YYYY-MM-DD` first, then the manifest pattern.
pub fn parse_cli_date(value: &str) -> Result<NaiveDate, RowError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").or_else(|_| parse_manifest_date(value))
}

pub fn parse_year(value: &str) -> Result<i32, RowError> {
    let value = value.trim();
    value.parse::<i32>().map_err(|source| RowError::InvalidYear {
        value: value.to_string(),
        source,
    })
}

pub fn find_node<'a>(nodes: &'a [Node], code: &str) -> Result<&'a Node, RowError> {
    nodes
        .iter()
        .find(|n| n.code == code.trim())
        .ok_or_else(|| RowError::UnknownNode(code.to_string()))
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), RowError> {
    if value.chars().count() > max {
        return Err(RowError::FieldTooLong { field, max });
    }
    Ok(())
}

fn file_name_parts(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (name, extension)
}
