#![allow(unused)]

//! # contract: Interface to the remote archive service
//!
//! This module defines the [`ArchiveClient`] trait and the plain data types that cross it:
//! destination [`Node`]s, [`CustomMetadataType`] descriptors, and the [`NewDocument`] payload
//! submitted for archival.
//!
//! ## Interface & Extensibility
//! - Implement [`ArchiveClient`] to talk to a concrete backend (the CLI crate ships an HTTP client).
//! - All methods are async and return boxed errors ([`ClientError`]), so transport, TLS and
//!   decoding failures can be surfaced uniformly at the row or command boundary.
//! - The trait carries no authentication details; an implementation owns its own auth context.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; `MockArchiveClient` is exported with the
//!   `test-export-mocks` feature so integration tests can drive the batch workflow offline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use mockall::{automock, predicate::*};

/// Error type for [`ArchiveClient`] calls (simple boxed error, like the uploader contract).
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// A destination folder in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Service-assigned identifier.
    pub id: String,
    /// Human-facing code used in manifests (`Node` column).
    pub code: String,
    #[serde(default)]
    pub name: String,
}

/// Data type of a custom metadata field, as declared by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetadataDataType {
    String,
    DateTime,
    Integer,
    Decimal,
    Boolean,
    /// A type this client does not know about; values are sent as text.
    Other(String),
}

impl From<String> for MetadataDataType {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "string" | "text" => MetadataDataType::String,
            "datetime" | "date" => MetadataDataType::DateTime,
            "integer" | "int" => MetadataDataType::Integer,
            "decimal" | "number" => MetadataDataType::Decimal,
            "boolean" | "bool" => MetadataDataType::Boolean,
            _ => MetadataDataType::Other(s),
        }
    }
}

impl From<MetadataDataType> for String {
    fn from(t: MetadataDataType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for MetadataDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataDataType::String => f.write_str("String"),
            MetadataDataType::DateTime => f.write_str("DateTime"),
            MetadataDataType::Integer => f.write_str("Integer"),
            MetadataDataType::Decimal => f.write_str("Decimal"),
            MetadataDataType::Boolean => f.write_str("Boolean"),
            MetadataDataType::Other(other) => f.write_str(other),
        }
    }
}

/// A remote-defined metadata field descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMetadataType {
    pub id: String,
    pub label: String,
    pub data_type: MetadataDataType,
}

/// A typed metadata value ready to be attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataScalar {
    Text(String),
    Integer(i64),
    /// Serialised as an ISO-8601 date-time at midnight.
    DateTime(chrono::NaiveDateTime),
}

/// A metadata value bound to one catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataValue {
    pub type_id: String,
    /// Catalog label, kept for logging.
    #[serde(skip)]
    pub label: String,
    pub value: MetadataScalar,
}

/// Everything needed to archive one file.
#[derive(Clone, PartialEq)]
pub struct NewDocument {
    pub node_id: String,
    /// Display title (`naziv`).
    pub label: String,
    /// Document code (`koda`).
    pub code: String,
    pub file_name: String,
    /// Extension including the leading dot, or empty.
    pub file_extension: String,
    pub content: Vec<u8>,
    pub metadata: Vec<MetadataValue>,
}

// File contents are left out of Debug output.
impl fmt::Debug for NewDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewDocument")
            .field("node_id", &self.node_id)
            .field("label", &self.label)
            .field("code", &self.code)
            .field("file_name", &self.file_name)
            .field("file_extension", &self.file_extension)
            .field("content_len", &self.content.len())
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Trait for talking to the archive service.
///
/// Implemented by the real HTTP client and by test mocks. Implementations are expected to be
/// fully authenticated once constructed.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ArchiveClient: Send + Sync {
    /// Whether the service reports itself as up.
    async fn is_running(&self) -> Result<bool, ClientError>;

    /// List all destination nodes visible to the authenticated identity.
    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError>;

    /// List the custom metadata field catalog.
    async fn list_custom_metadata_types(&self) -> Result<Vec<CustomMetadataType>, ClientError>;

    /// Submit one document with its metadata, returning the transaction identifier.
    ///
    /// Every call creates a new archive entry; there is no deduplication.
    async fn submit_document(&self, document: NewDocument) -> Result<Uuid, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_parses_known_names_case_insensitively() {
        assert_eq!(
            MetadataDataType::from("datetime".to_string()),
            MetadataDataType::DateTime
        );
        assert_eq!(
            MetadataDataType::from("String".to_string()),
            MetadataDataType::String
        );
        assert_eq!(
            MetadataDataType::from("Blob".to_string()),
            MetadataDataType::Other("Blob".to_string())
        );
    }

    #[test]
    fn metadata_type_deserialises_from_json() {
        let json = r#"{"id":"m-1","label":"Leto","data_type":"Integer"}"#;
        let parsed: CustomMetadataType = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.label, "Leto");
        assert_eq!(parsed.data_type, MetadataDataType::Integer);
    }

    #[test]
    fn document_debug_hides_content() {
        let doc = NewDocument {
            node_id: "n".into(),
            label: "l".into(),
            code: "c".into(),
            file_name: "a.pdf".into(),
            file_extension: ".pdf".into(),
            content: vec![1, 2, 3],
            metadata: vec![],
        };
        let out = format!("{doc:?}");
        assert!(out.contains("content_len: 3"));
        assert!(!out.contains("[1, 2, 3]"));
    }
}
