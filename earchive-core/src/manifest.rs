//! # manifest: CSV manifest reading, validation and annotated write-back
//!
//! A manifest is a comma-delimited file with a header row and exactly [`REQUIRED_COLUMNS`]
//! columns, one row per document to archive. The `guid` column is output-only: this module
//! fills it with the transaction identifier of each successfully submitted row and writes
//! the table back next to the input as `out-<name>`.
//!
//! # Responsibilities
//! - Pre-flight validation (existence, extension, row count, column shape) before any remote call
//! - Column lookup by header name, independent of column order
//! - Preserving the input header and column order on save
//!
//! All validation failures are [`ManifestError`]s, each mapped to an [`ExitStatus`].

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::exit_status::ExitStatus;

/// Exact number of columns a manifest must have, the output column included.
pub const REQUIRED_COLUMNS: usize = 11;

/// Prefix of the annotated manifest written next to the input.
pub const OUTPUT_PREFIX: &str = "out-";

/// The logical columns of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Files,
    Title,
    Code,
    SupplierName,
    SupplierCode,
    SupplierTaxId,
    InvoiceNumber,
    Node,
    InvoiceDate,
    Year,
    TransactionId,
}

impl Column {
    pub const ALL: [Column; REQUIRED_COLUMNS] = [
        Column::Files,
        Column::Title,
        Column::Code,
        Column::SupplierName,
        Column::SupplierCode,
        Column::SupplierTaxId,
        Column::InvoiceNumber,
        Column::Node,
        Column::InvoiceDate,
        Column::Year,
        Column::TransactionId,
    ];

    /// Header name as it appears in manifests.
    pub fn header(self) -> &'static str {
        match self {
            Column::Files => "files",
            Column::Title => "naziv",
            Column::Code => "koda",
            Column::SupplierName => "nazivdobavitelja",
            Column::SupplierCode => "sifradobavitelja",
            Column::SupplierTaxId => "davcnastevilkadobavitelja",
            Column::InvoiceNumber => "stevilkaracuna",
            Column::Node => "Node",
            Column::InvoiceDate => "datumizdajeracuna",
            Column::Year => "leto",
            Column::TransactionId => "guid",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no manifest file given")]
    MissingPath,
    #[error("file {} doesn't exist", .0.display())]
    NotFound(PathBuf),
    #[error("file {} should have .csv extension", .0.display())]
    WrongExtension(PathBuf),
    #[error("file {} doesn't contain any rows", .0.display())]
    NoRows(PathBuf),
    #[error("file {} should contain exactly {expected} columns, found {found}", .path.display())]
    ColumnCount {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("file {} is missing required column '{column}'", .path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("failed to read manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to save manifest {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl ManifestError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            ManifestError::MissingPath => ExitStatus::MissingArgument,
            ManifestError::Read { .. } => ExitStatus::ManifestReadFailed,
            ManifestError::Write { .. } => ExitStatus::SaveFailed,
            _ => ExitStatus::InvalidInput,
        }
    }
}

/// One manifest row with its raw, trimmed cell values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    /// Zero-based data row index (header excluded).
    pub index: usize,
    pub files: String,
    pub title: String,
    pub code: String,
    pub supplier_name: String,
    pub supplier_code: String,
    pub supplier_tax_id: String,
    pub invoice_number: String,
    pub node: String,
    pub invoice_date: String,
    pub year: String,
}

impl ManifestRow {
    /// One-based row number as a user counts data rows.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// An in-memory manifest table.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    headers: StringRecord,
    records: Vec<StringRecord>,
    columns: [usize; REQUIRED_COLUMNS],
}

impl Manifest {
    /// Validates and reads a manifest from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        info!(manifest = %path.display(), "Loading manifest");

        if path.as_os_str().is_empty() {
            return Err(ManifestError::MissingPath);
        }
        if !path.is_file() {
            error!(manifest = %path.display(), "Manifest file doesn't exist");
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if !is_csv {
            error!(manifest = %path.display(), "Manifest must have .csv extension");
            return Err(ManifestError::WrongExtension(path.to_path_buf()));
        }

        let file = std::fs::File::open(path).map_err(|e| ManifestError::Read {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        Self::from_reader(path, file)
    }

    /// Reads and validates manifest content; `path` is used for messages and the output location.
    pub fn from_reader<R: Read>(path: &Path, reader: R) -> Result<Self, ManifestError> {
        let read_err = |source: csv::Error| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);
        let headers = reader.headers().map_err(read_err)?.clone();
        debug!(headers = ?headers.iter().collect::<Vec<_>>(), "Manifest headers");

        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                error!(manifest = %path.display(), error = %e, "Failed to parse manifest");
                read_err(e)
            })?;

        if records.is_empty() {
            error!(manifest = %path.display(), "Manifest contains no rows");
            return Err(ManifestError::NoRows(path.to_path_buf()));
        }
        if headers.len() != REQUIRED_COLUMNS {
            error!(
                manifest = %path.display(),
                found = headers.len(),
                expected = REQUIRED_COLUMNS,
                "Manifest has wrong number of columns"
            );
            return Err(ManifestError::ColumnCount {
                path: path.to_path_buf(),
                expected: REQUIRED_COLUMNS,
                found: headers.len(),
            });
        }

        let mut columns = [0usize; REQUIRED_COLUMNS];
        for column in Column::ALL {
            let position = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(column.header()))
                .ok_or(ManifestError::MissingColumn {
                    path: path.to_path_buf(),
                    column: column.header(),
                })?;
            columns[column.slot()] = position;
        }

        info!(manifest = %path.display(), rows = records.len(), "Manifest loaded");
        Ok(Manifest {
            path: path.to_path_buf(),
            headers,
            records,
            columns,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of data rows; never zero for a loaded manifest.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    fn cell(&self, index: usize, column: Column) -> &str {
        self.records[index]
            .get(self.columns[column.slot()])
            .unwrap_or("")
            .trim()
    }

    /// Extracts one row; `None` past the end.
    pub fn row(&self, index: usize) -> Option<ManifestRow> {
        if index >= self.records.len() {
            return None;
        }
        let cell = |column| self.cell(index, column).to_string();
        Some(ManifestRow {
            index,
            files: cell(Column::Files),
            title: cell(Column::Title),
            code: cell(Column::Code),
            supplier_name: cell(Column::SupplierName),
            supplier_code: cell(Column::SupplierCode),
            supplier_tax_id: cell(Column::SupplierTaxId),
            invoice_number: cell(Column::InvoiceNumber),
            node: cell(Column::Node),
            invoice_date: cell(Column::InvoiceDate),
            year: cell(Column::Year),
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = ManifestRow> + '_ {
        (0..self.records.len()).filter_map(move |i| self.row(i))
    }

    /// The `guid` cell of a row, if non-empty.
    pub fn transaction_id(&self, index: usize) -> Option<&str> {
        if index >= self.records.len() {
            return None;
        }
        Some(self.cell(index, Column::TransactionId)).filter(|v| !v.is_empty())
    }

    pub fn set_transaction_id(&mut self, index: usize, id: &Uuid) {
        let target = self.columns[Column::TransactionId.slot()];
        let Some(record) = self.records.get(index) else {
            return;
        };
        let value = id.to_string();
        let updated: StringRecord = record
            .iter()
            .enumerate()
            .map(|(i, field)| if i == target { value.as_str() } else { field })
            .collect();
        self.records[index] = updated;
    }

    /// Sibling path the annotated manifest is written to.
    pub fn output_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!("{OUTPUT_PREFIX}{name}"))
    }

    /// Writes the table, header first, to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ManifestError> {
        let path = path.as_ref();
        let write_err = |source: csv::Error| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = WriterBuilder::new().from_path(path).map_err(write_err)?;
        writer.write_record(&self.headers).map_err(write_err)?;
        for record in &self.records {
            writer.write_record(record).map_err(write_err)?;
        }
        writer.flush().map_err(|e| write_err(e.into()))?;
        info!(output = %path.display(), rows = self.records.len(), "Annotated manifest saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "files,naziv,koda,nazivdobavitelja,sifradobavitelja,davcnastevilkadobavitelja,stevilkaracuna,Node,datumizdajeracuna,leto,guid";

    fn parse(content: &str) -> Result<Manifest, ManifestError> {
        Manifest::from_reader(Path::new("/tmp/list.csv"), content.as_bytes())
    }

    #[test]
    fn reads_rows_by_header_name() {
        let content = format!(
            "{HEADER}\n/tmp/a.pdf,Racun 1,R1,ACME d.o.o.,S-1,12345678,2023-001,N1,2023-15-3,2023,\n"
        );
        let manifest = parse(&content).unwrap();
        assert_eq!(manifest.len(), 1);
        let row = manifest.row(0).unwrap();
        assert_eq!(row.files, "/tmp/a.pdf");
        assert_eq!(row.supplier_name, "ACME d.o.o.");
        assert_eq!(row.node, "N1");
        assert_eq!(row.year, "2023");
        assert_eq!(row.number(), 1);
        assert!(manifest.transaction_id(0).is_none());
    }

    #[test]
    fn column_order_does_not_matter() {
        let content = "guid,leto,datumizdajeracuna,Node,stevilkaracuna,davcnastevilkadobavitelja,sifradobavitelja,nazivdobavitelja,koda,naziv,files\n,2022,2022-1-1,N2,INV,111,S,Sup,K,T,/x.pdf\n";
        let row = parse(content).unwrap().row(0).unwrap();
        assert_eq!(row.files, "/x.pdf");
        assert_eq!(row.title, "T");
        assert_eq!(row.node, "N2");
    }

    #[test]
    fn rejects_manifest_without_rows() {
        let err = parse(&format!("{HEADER}\n")).unwrap_err();
        assert!(matches!(err, ManifestError::NoRows(_)));
        assert_eq!(err.exit_status(), ExitStatus::InvalidInput);
    }

    #[test]
    fn rejects_wrong_column_count() {
        let err = parse("files,naziv\n/a.pdf,x\n").unwrap_err();
        assert!(matches!(
            err,
            ManifestError::ColumnCount {
                found: 2,
                expected: 11,
                ..
            }
        ));
    }

    #[test]
    fn rejects_missing_named_column() {
        let header = HEADER.replace("stevilkaracuna", "something");
        let err = parse(&format!("{header}\na,b,c,d,e,f,g,h,i,j,\n")).unwrap_err();
        match err {
            ManifestError::MissingColumn { column, .. } => assert_eq!(column, "stevilkaracuna"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ragged_rows_are_read_errors() {
        let err = parse(&format!("{HEADER}\na,b,c\n")).unwrap_err();
        assert_eq!(err.exit_status(), ExitStatus::ManifestReadFailed);
    }

    #[test]
    fn transaction_id_is_written_to_guid_column_only() {
        let content = format!("{HEADER}\n/a.pdf,T,K,S,SC,1,INV,N1,2023-1-2,2023,\n");
        let mut manifest = parse(&content).unwrap();
        let id = Uuid::new_v4();
        manifest.set_transaction_id(0, &id);
        let expected = id.to_string();
        assert_eq!(manifest.transaction_id(0), Some(expected.as_str()));
        assert_eq!(manifest.row(0).unwrap().files, "/a.pdf");
    }

    #[test]
    fn output_path_is_prefixed_sibling() {
        let content = format!("{HEADER}\n/a.pdf,T,K,S,SC,1,INV,N1,2023-1-2,2023,\n");
        let manifest = parse(&content).unwrap();
        assert_eq!(manifest.output_path(), PathBuf::from("/tmp/out-list.csv"));
    }
}
