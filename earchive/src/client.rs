#![doc = "HTTP client for the archive service: mutual-TLS token exchange plus the document endpoints behind the core `ArchiveClient` trait."]
//
//! # Archive client (CLI <-> service)
//!
//! This module wires the [`ArchiveClient`] trait from `earchive-core` to the archive service's
//! HTTP API. [`EArchiveClient::connect`] presents the resolved client certificate over TLS,
//! exchanges it for a bearer token once, and keeps both in an [`AuthContext`] owned by the
//! client. There is no global connection state and no token refresh.
//!
//! ## Endpoints (relative to the environment's base URL)
//! - `POST /api/token`: certificate → bearer token
//! - `GET /api/status`: liveness
//! - `GET /api/nodes`, `GET /api/custom-metadata-types`: listings
//! - `POST /api/documents`: base64 file content plus metadata → transaction id
//!
//! Any non-2xx response becomes an error carrying the status and response body.

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use earchive_core::certificate::{ClientCertificate, SerialNumber};
use earchive_core::contract::{
    ArchiveClient, ClientError, CustomMetadataType, MetadataValue, NewDocument, Node,
};

/// Certificate identity plus the bearer token issued for it.
#[derive(Clone)]
pub struct AuthContext {
    pub serial: SerialNumber,
    pub subject: String,
    token: String,
}

impl AuthContext {
    pub fn bearer_token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("serial", &self.serial)
            .field("subject", &self.subject)
            .field("token_set", &!self.token.is_empty())
            .finish()
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    certificate_serial: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Serialize)]
struct SubmitDocumentRequest<'a> {
    node_id: &'a str,
    label: &'a str,
    code: &'a str,
    file_name: &'a str,
    file_extension: &'a str,
    content: String,
    metadata: &'a [MetadataValue],
}

#[derive(Deserialize)]
struct SubmitDocumentResponse {
    transaction_id: Uuid,
}

pub struct EArchiveClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthContext,
}

impl EArchiveClient {
    /// Builds a TLS client presenting `certificate` and obtains a bearer token.
    pub async fn connect(
        base_url: &str,
        certificate: &ClientCertificate,
    ) -> Result<Self, ClientError> {
        let identity = reqwest::Identity::from_pem(&certificate.identity_pem).map_err(|e| {
            tracing::error!(error = ?e, source = %certificate.source.display(), "[AUTH] Certificate is not usable as a TLS identity");
            e
        })?;
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .identity(identity)
            .build()?;
        Self::authenticate(http, base_url, certificate).await
    }

    /// Performs the token exchange over an already configured HTTP client.
    pub async fn authenticate(
        http: reqwest::Client,
        base_url: &str,
        certificate: &ClientCertificate,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::info!(
            base_url = %base_url,
            serial = %certificate.serial,
            "[AUTH] Requesting access token"
        );
        let request = TokenRequest {
            grant_type: "client_certificate",
            certificate_serial: certificate.serial.as_str(),
        };
        let response = http
            .post(format!("{base_url}/api/token"))
            .json(&request)
            .send()
            .await?;
        let token: TokenResponse = check_status(response).await?.json().await?;
        if token.access_token.is_empty() {
            tracing::error!("[AUTH] Token endpoint returned an empty token");
            return Err("token endpoint returned an empty access token".into());
        }
        tracing::info!(
            token_type = token.token_type.as_deref().unwrap_or("Bearer"),
            "[AUTH] Access token obtained"
        );
        Ok(EArchiveClient {
            http,
            base_url,
            auth: AuthContext {
                serial: certificate.serial.clone(),
                subject: certificate.subject.clone(),
                token: token.access_token,
            },
        })
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(self.auth.bearer_token())
            .send()
            .await?;
        Ok(check_status(response).await?.json::<T>().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(%status, %url, body = %body, "Archive service returned an error");
    Err(format!("HTTP {status} from {url}: {body}").into())
}

#[async_trait]
impl ArchiveClient for EArchiveClient {
    async fn is_running(&self) -> Result<bool, ClientError> {
        let response = self
            .http
            .get(self.url("/api/status"))
            .bearer_auth(self.auth.bearer_token())
            .send()
            .await?;
        let running = response.status().is_success();
        tracing::info!(running, status = %response.status(), "Checked service status");
        Ok(running)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClientError> {
        tracing::info!("Listing nodes");
        let nodes: Vec<Node> = self.get_json("/api/nodes").await?;
        tracing::info!(count = nodes.len(), "Fetched nodes");
        Ok(nodes)
    }

    async fn list_custom_metadata_types(&self) -> Result<Vec<CustomMetadataType>, ClientError> {
        tracing::info!("Listing custom metadata types");
        let types: Vec<CustomMetadataType> = self.get_json("/api/custom-metadata-types").await?;
        tracing::info!(count = types.len(), "Fetched custom metadata types");
        Ok(types)
    }

    async fn submit_document(&self, document: NewDocument) -> Result<Uuid, ClientError> {
        tracing::info!(
            file = %document.file_name,
            node_id = %document.node_id,
            size = document.content.len(),
            "Submitting document"
        );
        let body = SubmitDocumentRequest {
            node_id: &document.node_id,
            label: &document.label,
            code: &document.code,
            file_name: &document.file_name,
            file_extension: &document.file_extension,
            content: base64::engine::general_purpose::STANDARD.encode(&document.content),
            metadata: &document.metadata,
        };
        let response = self
            .http
            .post(self.url("/api/documents"))
            .bearer_auth(self.auth.bearer_token())
            .json(&body)
            .send()
            .await?;
        let submitted: SubmitDocumentResponse = check_status(response).await?.json().await?;
        tracing::info!(
            transaction = %submitted.transaction_id,
            file = %document.file_name,
            "Document accepted"
        );
        Ok(submitted.transaction_id)
    }
}
