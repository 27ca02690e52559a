//! High-level pipeline: submits every row of a manifest to the archive.
//!
//! The workflow is fail-soft at row granularity:
//!   - The node list and metadata catalog are fetched once ([`Catalog::fetch`]) and the metadata
//!     mapping is resolved once, before any row is touched
//!   - Each row goes through [`process_row`], a function of the row alone that yields a
//!     transaction id or a [`RowError`]
//!   - [`submit_manifest`] runs rows in order, collects every outcome into a [`BatchReport`]
//!     and writes the transaction ids of successful rows into the manifest's `guid` column
//!
//! A failed row never stops the batch and is never retried. Re-running a manifest submits every
//! row again.
//!
//! # Error Handling
//! Only a catalog fetch failure aborts the batch ([`BatchError::Listing`]). Row failures are
//! logged and reported; saving the annotated manifest is left to the caller.

use futures::try_join;
use thiserror::Error;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use crate::contract::{ArchiveClient, ClientError, CustomMetadataType, NewDocument, Node};
use crate::document::{InvoiceDocument, RowError};
use crate::exit_status::ExitStatus;
use crate::manifest::{Manifest, ManifestRow};
use crate::metadata::MetadataPlan;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to list nodes or metadata types: {0}")]
    Listing(#[source] ClientError),
}

impl BatchError {
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            BatchError::Listing(_) => ExitStatus::ListingFailed,
        }
    }
}

/// Remote lists a run depends on.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub nodes: Vec<Node>,
    pub metadata_types: Vec<CustomMetadataType>,
}

impl Catalog {
    /// Fetches nodes and metadata types concurrently.
    pub async fn fetch<C>(client: &C) -> Result<Self, ClientError>
    where
        C: ArchiveClient + ?Sized,
    {
        let (nodes, metadata_types) =
            try_join!(client.list_nodes(), client.list_custom_metadata_types())?;
        info!(
            nodes = nodes.len(),
            metadata_types = metadata_types.len(),
            "[CATALOG] Fetched nodes and metadata types"
        );
        Ok(Catalog {
            nodes,
            metadata_types,
        })
    }
}

/// Switches set once per run from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Log each outgoing document summary at info level rather than debug.
    pub log_documents: bool,
}

/// Everything a row needs besides itself, resolved once per run.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub nodes: Vec<Node>,
    pub plan: MetadataPlan,
    pub options: BatchOptions,
}

impl BatchContext {
    pub fn new(catalog: Catalog, options: BatchOptions) -> Self {
        let plan = MetadataPlan::resolve(&catalog.metadata_types);
        BatchContext {
            nodes: catalog.nodes,
            plan,
            options,
        }
    }
}

#[derive(Debug)]
pub struct RowOutcome {
    /// Zero-based data row index.
    pub index: usize,
    pub result: Result<Uuid, RowError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RowOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (usize, &Uuid)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|id| (o.index, id)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (usize, &RowError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.index, e)))
    }

    pub fn error_count(&self) -> usize {
        self.failed().count()
    }

    /// `PartialFailure` if any row failed, else `Success`.
    pub fn exit_status(&self) -> ExitStatus {
        if self.error_count() > 0 {
            ExitStatus::PartialFailure
        } else {
            ExitStatus::Success
        }
    }
}

/// Submits one already validated document.
pub async fn submit_document<C>(
    client: &C,
    context: &BatchContext,
    document: InvoiceDocument,
) -> Result<Uuid, RowError>
where
    C: ArchiveClient + ?Sized,
{
    let new_document = document.into_new_document(&context.nodes, &context.plan)?;
    log_document(&new_document, context.options);
    client
        .submit_document(new_document)
        .await
        .map_err(RowError::Submit)
}

/// Validates, prepares and submits a single manifest row.
pub async fn process_row<C>(
    client: &C,
    context: &BatchContext,
    row: &ManifestRow,
) -> Result<Uuid, RowError>
where
    C: ArchiveClient + ?Sized,
{
    let document = InvoiceDocument::from_row(row)?;
    submit_document(client, context, document).await
}

/// Runs every manifest row and annotates the manifest with the resulting transaction ids.
pub async fn submit_manifest<C>(
    client: &C,
    manifest: &mut Manifest,
    options: BatchOptions,
) -> Result<BatchReport, BatchError>
where
    C: ArchiveClient + ?Sized,
{
    info!(
        manifest = %manifest.path().display(),
        rows = manifest.len(),
        "[BATCH] Starting batch submission"
    );
    let catalog = Catalog::fetch(client).await.map_err(|e| {
        error!(error = %e, "[BATCH][ERROR] Failed to fetch catalog");
        BatchError::Listing(e)
    })?;
    let context = BatchContext::new(catalog, options);

    let mut report = BatchReport::default();
    let rows: Vec<ManifestRow> = manifest.rows().collect();
    for row in rows {
        let span = tracing::info_span!("row", number = row.number());
        let result = process_row(client, &context, &row).instrument(span).await;
        match &result {
            Ok(id) => {
                info!(row = row.number(), transaction = %id, "[ROW] Submitted");
                manifest.set_transaction_id(row.index, id);
            }
            Err(e) => {
                error!(row = row.number(), files = %row.files, error = %e, "[ROW][ERROR] Row failed, continuing");
            }
        }
        report.outcomes.push(RowOutcome {
            index: row.index,
            result,
        });
    }

    info!(
        total = report.total(),
        failed = report.error_count(),
        "[BATCH] Batch submission finished"
    );
    Ok(report)
}

fn log_document(document: &NewDocument, options: BatchOptions) {
    let summary = serde_json::json!({
        "node_id": document.node_id,
        "label": document.label,
        "code": document.code,
        "file_name": document.file_name,
        "size": document.content.len(),
        "metadata": document.metadata,
    });
    match serde_json::to_string_pretty(&summary) {
        Ok(json) if options.log_documents => info!(json = %json, "[ROW] Outgoing document"),
        Ok(json) => debug!(json = %json, "[ROW] Outgoing document"),
        Err(e) => error!(error = ?e, "[ROW][ERROR] Failed to serialise document summary"),
    }
}
