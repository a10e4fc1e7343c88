//! Route definitions for the block server.
//!
//! Speaks the protocol `cairn_store::RemoteStore` expects: raw block
//! bytes on download, a multipart form on upload, and the stored name
//! echoed back as the first line of a successful upload response.

use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use cairn_core::{DigestAlgorithm, Fingerprint};
use cairn_store::remote::{fields, OCTET_STREAM};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Build the router with all block server routes.
pub fn router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/blocks/{name}", get(download))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

// ── Download ────────────────────────────────────────────────────────

async fn download(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let store = state.store.clone();
    let lookup = name.clone();
    let bytes = tokio::task::spawn_blocking(move || store.retrieve(&lookup))
        .await
        .map_err(|e| AppError::Internal(format!("download task failed: {e}")))??;
    tracing::debug!(name = %name, len = bytes.len(), "serving block");
    Ok((
        [(header::CONTENT_TYPE, OCTET_STREAM)],
        bytes.to_vec(),
    )
        .into_response())
}

// ── Upload ──────────────────────────────────────────────────────────

/// Fields collected from an upload form. Unknown fields are ignored.
#[derive(Default)]
struct UploadForm {
    authenticator: Option<String>,
    digest_algorithm: Option<String>,
    expected_name: Option<String>,
    contents: Option<Bytes>,
}

fn bad_form(err: MultipartError) -> AppError {
    AppError::BadRequest(format!("malformed multipart body: {err}"))
}

async fn text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(bad_form)
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                fields::AUTHENTICATOR => form.authenticator = Some(text(field).await?),
                fields::DIGEST_ALGORITHM => form.digest_algorithm = Some(text(field).await?),
                fields::EXPECTED_NAME => form.expected_name = Some(text(field).await?),
                fields::FILE_CONTENTS => {
                    form.contents = Some(field.bytes().await.map_err(bad_form)?)
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

fn missing(field: &str) -> AppError {
    AppError::BadRequest(format!("missing form field {field}"))
}

async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = UploadForm::read(multipart).await?;

    let authenticator = form.authenticator.unwrap_or_default();
    if !state.authenticate(&authenticator) {
        tracing::warn!("upload rejected: bad authenticator");
        return Err(AppError::Forbidden("bad authenticator".into()));
    }

    let expected = form
        .expected_name
        .ok_or_else(|| missing(fields::EXPECTED_NAME))?;
    let fingerprint = Fingerprint::decode(expected.trim())?;
    if let Some(alg) = form.digest_algorithm.as_deref().filter(|a| !a.trim().is_empty()) {
        if DigestAlgorithm::from_name(alg.trim())? != fingerprint.algorithm() {
            return Err(AppError::BadRequest(format!(
                "{} names {alg} but EXPECTED_NAME uses {}",
                fields::DIGEST_ALGORITHM,
                fingerprint.algorithm()
            )));
        }
    }
    let contents = form.contents.ok_or_else(|| missing(fields::FILE_CONTENTS))?;
    if !fingerprint.matches(&contents) {
        return Err(AppError::BadRequest(format!(
            "contents do not hash to {expected}"
        )));
    }

    let name = fingerprint.encode();
    let store = state.store.clone();
    let stored = name.clone();
    tokio::task::spawn_blocking(move || {
        store.store_bytes(&stored, &contents)?;
        store.flush()
    })
    .await
    .map_err(|e| AppError::Internal(format!("upload task failed: {e}")))??;

    tracing::info!(name = %name, "stored upload");
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("{name}\n"),
    )
        .into_response())
}
