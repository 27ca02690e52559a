//! Command implementations behind [`crate::cli::run`].
//!
//! Each command validates its local input first, then resolves the client certificate,
//! connects, checks that the service is up, and finally does its work through the
//! [`ArchiveClient`] trait. The `*_with_client` halves take any client so they can be driven
//! by mocks.

use std::io::Write;

use earchive_core::batch::{submit_document, submit_manifest, BatchContext, BatchOptions, Catalog};
use earchive_core::certificate::{resolve_certificate, PemCertificateStore};
use earchive_core::config::Environment;
use earchive_core::contract::ArchiveClient;
use earchive_core::document::{parse_cli_date, InvoiceDocument, RowError};
use earchive_core::exit_status::ExitStatus;
use earchive_core::manifest::Manifest;
use tracing::{error, info};

use crate::cli::{ConnectionArgs, SendArgs, SendFromCsvArgs};
use crate::client::EArchiveClient;
use crate::load_config::CliConfig;

/// Resolves the certificate, exchanges it for a token and checks the service is running.
pub async fn connect(
    config: &CliConfig,
    args: &ConnectionArgs,
) -> Result<EArchiveClient, ExitStatus> {
    let store = PemCertificateStore::new(&config.certificate_store);
    let certificate = resolve_certificate(&store, &args.certificate).map_err(|e| {
        error!(store = %store.dir().display(), error = %e, "[AUTH][ERROR] Certificate lookup failed");
        println!("ERROR: {e}");
        e.exit_status()
    })?;

    let environment = Environment::from_devel_flag(args.devel);
    let base_url = config.environments.base_url(environment);
    let client = EArchiveClient::connect(base_url, &certificate)
        .await
        .map_err(|e| {
            error!(error = %e, %environment, "[AUTH][ERROR] Connection to webservice failed");
            println!("Connection to webservice failed. Is certificate configured properly?");
            println!("{e}");
            ExitStatus::AuthenticationFailed
        })?;

    ensure_running(&client).await?;
    Ok(client)
}

/// Health check before any work: a service reporting itself down is exit 2, a failed request
/// is a connection problem.
pub async fn ensure_running<C>(client: &C) -> Result<(), ExitStatus>
where
    C: ArchiveClient + ?Sized,
{
    match client.is_running().await {
        Ok(true) => Ok(()),
        Ok(false) => {
            error!("Service reports it is not running");
            println!("Connection to webservice failed. Service is not running.");
            Err(ExitStatus::ServiceNotRunning)
        }
        Err(e) => {
            error!(error = %e, "Service status check failed");
            println!("Connection to webservice failed. Is certificate configured properly?");
            println!("{e}");
            Err(ExitStatus::UsageError)
        }
    }
}

/// Builds the document described by `send` arguments.
pub fn document_from_args(args: &SendArgs) -> Result<InvoiceDocument, RowError> {
    let document = InvoiceDocument {
        file: args.file.clone(),
        title: args.naziv.clone(),
        code: args.koda.clone(),
        supplier_name: args.nazivdobavitelja.clone(),
        supplier_code: args.sifradobavitelja.clone(),
        supplier_tax_id: args.davcnastevilkadobavitelja.clone(),
        invoice_number: args.stevilkaracuna.clone(),
        invoice_date: parse_cli_date(&args.datumizdajeracuna)?,
        year: args.leto,
        node_code: args.node.clone(),
    };
    document.validate()?;
    Ok(document)
}

pub async fn send(config: &CliConfig, args: SendArgs, options: BatchOptions) -> ExitStatus {
    if !args.file.is_file() {
        println!("ERROR: file {} doesn't exist.", args.file.display());
        return ExitStatus::InvalidInput;
    }
    let document = match document_from_args(&args) {
        Ok(document) => document,
        Err(e) => {
            error!(error = %e, "Invalid document arguments");
            println!("Error: {e}");
            return ExitStatus::SubmitFailed;
        }
    };
    let client = match connect(config, &args.connection).await {
        Ok(client) => client,
        Err(status) => return status,
    };
    send_with_client(&client, document, options).await
}

pub async fn send_with_client<C>(
    client: &C,
    document: InvoiceDocument,
    options: BatchOptions,
) -> ExitStatus
where
    C: ArchiveClient + ?Sized,
{
    println!("Sending file: {}", document.file.display());
    let catalog = match Catalog::fetch(client).await {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(error = %e, "Failed to fetch catalog for submission");
            println!("Error: {e}");
            return ExitStatus::SubmitFailed;
        }
    };
    let context = BatchContext::new(catalog, options);
    match submit_document(client, &context, document).await {
        Ok(id) => {
            info!(transaction = %id, "Document submitted");
            println!("Transaction GUID: {id}");
            ExitStatus::Success
        }
        Err(e) => {
            error!(error = %e, "Document submission failed");
            println!("Error: {e}");
            ExitStatus::SubmitFailed
        }
    }
}

pub async fn send_from_csv(
    config: &CliConfig,
    args: SendFromCsvArgs,
    options: BatchOptions,
) -> ExitStatus {
    // Manifest problems must surface before any remote call.
    let path = args.file.clone().unwrap_or_default();
    let manifest = match Manifest::load(&path) {
        Ok(manifest) => manifest,
        Err(e) => {
            println!("ERROR: {e}");
            return e.exit_status();
        }
    };
    let client = match connect(config, &args.connection).await {
        Ok(client) => client,
        Err(status) => return status,
    };
    send_manifest_with_client(&client, manifest, options).await
}

pub async fn send_manifest_with_client<C>(
    client: &C,
    mut manifest: Manifest,
    options: BatchOptions,
) -> ExitStatus
where
    C: ArchiveClient + ?Sized,
{
    let report = match submit_manifest(client, &mut manifest, options).await {
        Ok(report) => report,
        Err(e) => {
            println!("Error: {e}");
            return e.exit_status();
        }
    };

    for (index, e) in report.failed() {
        println!("Error in row {}: {e}", index + 1);
    }

    let output = manifest.output_path();
    if let Err(e) = manifest.save(&output) {
        error!(error = %e, output = %output.display(), "Saving annotated manifest failed");
        println!("Error saving: {e}");
        return e.exit_status();
    }

    println!(
        "Processed {} rows, {} failed. Results written to {}",
        report.total(),
        report.error_count(),
        output.display()
    );
    report.exit_status()
}

pub async fn list_nodes(config: &CliConfig, args: ConnectionArgs) -> ExitStatus {
    let client = match connect(config, &args).await {
        Ok(client) => client,
        Err(status) => return status,
    };
    list_with_client(&client, &mut std::io::stdout()).await
}

pub async fn list_with_client<C, W>(client: &C, out: &mut W) -> ExitStatus
where
    C: ArchiveClient + ?Sized,
    W: Write,
{
    let catalog = match Catalog::fetch(client).await {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(error = %e, "Listing failed");
            println!("Error: {e}");
            return ExitStatus::ListingFailed;
        }
    };
    match print_catalog(&catalog, out) {
        Ok(()) => ExitStatus::Success,
        Err(e) => {
            error!(error = %e, "Failed to write listing");
            ExitStatus::ListingFailed
        }
    }
}

fn print_catalog<W: Write>(catalog: &Catalog, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "Nodes:")?;
    for node in &catalog.nodes {
        writeln!(out, "  {}\t{}\t({})", node.code, node.name, node.id)?;
    }
    writeln!(out, "Custom metadata types:")?;
    for entry in &catalog.metadata_types {
        writeln!(out, "  {}\t{}\t({})", entry.label, entry.data_type, entry.id)?;
    }
    out.flush()
}
