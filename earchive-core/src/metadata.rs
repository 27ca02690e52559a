//! Mapping document fields onto the service's custom metadata catalog.
//!
//! The catalog is fetched at run time; which document field feeds which catalog label is a
//! static table ([`FIELD_LABELS`]). A [`MetadataPlan`] binds that table to one catalog once per
//! run. Catalog labels with no entry in the table are skipped, and so are table entries the
//! catalog doesn't define.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::contract::{CustomMetadataType, MetadataDataType, MetadataScalar, MetadataValue};
use crate::document::{InvoiceDocument, RowError};

/// Document fields that can be sent as custom metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentField {
    SupplierName,
    SupplierCode,
    SupplierTaxId,
    InvoiceNumber,
    InvoiceDate,
    Year,
}

/// Document field → catalog label.
pub const FIELD_LABELS: &[(DocumentField, &str)] = &[
    (DocumentField::SupplierName, "NazivDobavitelja"),
    (DocumentField::SupplierCode, "SifraDobavitelja"),
    (DocumentField::SupplierTaxId, "DavcnaStevilkaDobavitelja"),
    (DocumentField::InvoiceNumber, "StevilkaRacuna"),
    (DocumentField::InvoiceDate, "DatumIzdajeRacuna"),
    (DocumentField::Year, "Leto"),
];

enum FieldValue<'a> {
    Text(&'a str),
    Date(NaiveDate),
    Year(i32),
}

impl DocumentField {
    fn value_of<'a>(self, document: &'a InvoiceDocument) -> FieldValue<'a> {
        match self {
            DocumentField::SupplierName => FieldValue::Text(&document.supplier_name),
            DocumentField::SupplierCode => FieldValue::Text(&document.supplier_code),
            DocumentField::SupplierTaxId => FieldValue::Text(&document.supplier_tax_id),
            DocumentField::InvoiceNumber => FieldValue::Text(&document.invoice_number),
            DocumentField::InvoiceDate => FieldValue::Date(document.invoice_date),
            DocumentField::Year => FieldValue::Year(document.year),
        }
    }
}

/// The field table bound to one fetched catalog.
#[derive(Debug, Clone, Default)]
pub struct MetadataPlan {
    bindings: Vec<(DocumentField, CustomMetadataType)>,
}

impl MetadataPlan {
    pub fn resolve(catalog: &[CustomMetadataType]) -> Self {
        let mut bindings = Vec::new();
        for (field, label) in FIELD_LABELS {
            match catalog.iter().find(|t| t.label == *label) {
                Some(entry) => bindings.push((*field, entry.clone())),
                None => debug!(label, "Catalog has no field for label, skipping"),
            }
        }
        for entry in catalog {
            if !FIELD_LABELS.iter().any(|(_, label)| *label == entry.label) {
                debug!(label = %entry.label, "No document field for catalog label, skipping");
            }
        }
        let plan = MetadataPlan { bindings };
        if plan.is_empty() {
            warn!(
                catalog = catalog.len(),
                "No catalog field matches a document field, documents go out without metadata"
            );
        } else {
            info!(
                catalog = catalog.len(),
                bound = plan.len(),
                "Resolved metadata mapping"
            );
        }
        plan
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Labels that will be sent, in table order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(_, t)| t.label.as_str())
    }

    /// Typed metadata values for one document.
    pub fn values_for(&self, document: &InvoiceDocument) -> Result<Vec<MetadataValue>, RowError> {
        self.bindings
            .iter()
            .map(|(field, entry)| {
                Ok(MetadataValue {
                    type_id: entry.id.clone(),
                    label: entry.label.clone(),
                    value: scalar(field.value_of(document), entry)?,
                })
            })
            .collect()
    }
}

fn scalar(value: FieldValue<'_>, entry: &CustomMetadataType) -> Result<MetadataScalar, RowError> {
    let mismatch = |value: String| RowError::MetadataValue {
        label: entry.label.clone(),
        data_type: entry.data_type.to_string(),
        value,
    };
    match (&entry.data_type, value) {
        (MetadataDataType::DateTime, FieldValue::Date(date)) => {
            Ok(MetadataScalar::DateTime(date.and_time(chrono::NaiveTime::MIN)))
        }
        (MetadataDataType::DateTime, FieldValue::Text(text)) => Err(mismatch(text.to_string())),
        (MetadataDataType::DateTime, FieldValue::Year(year)) => Err(mismatch(year.to_string())),
        (MetadataDataType::Integer, FieldValue::Year(year)) => {
            Ok(MetadataScalar::Integer(i64::from(year)))
        }
        (MetadataDataType::Integer, FieldValue::Text(text)) => {
            // Only canonical integers: "00042" or "+42" would lose characters on the way out.
            let trimmed = text.trim();
            match trimmed.parse::<i64>() {
                Ok(number) if number.to_string() == trimmed => Ok(MetadataScalar::Integer(number)),
                _ => Err(mismatch(text.to_string())),
            }
        }
        (MetadataDataType::Integer, FieldValue::Date(date)) => Err(mismatch(date.to_string())),
        (_, FieldValue::Text(text)) => Ok(MetadataScalar::Text(text.to_string())),
        (_, FieldValue::Date(date)) => Ok(MetadataScalar::Text(date.format("%Y-%m-%d").to_string())),
        (_, FieldValue::Year(year)) => Ok(MetadataScalar::Text(year.to_string())),
    }
}
