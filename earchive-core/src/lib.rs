#![doc = "earchive-core: core logic library for earchive."]

//! This crate contains the data model and workflows for archiving documents: manifest
//! validation and write-back, metadata mapping, client certificate resolution and the
//! fail-soft batch driver. Transport to the archive service is behind [`contract::ArchiveClient`].
//!
//! # Usage
//! Add this as a dependency for anything that submits documents or reads manifests. The CLI crate
//! supplies the HTTP client and the command surface.

pub mod batch;
pub mod certificate;
pub mod config;
pub mod contract;
pub mod document;
pub mod exit_status;
pub mod manifest;
pub mod metadata;
