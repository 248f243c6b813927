use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use docgate_types::{composite_key, ArrayReader, BulkItem, Doc, DocumentCodec};
use futures::StreamExt;
use tracing::{info, warn};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Liveness probe.
pub async fn ping() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> ServerError {
    ServerError::MethodNotAllowed
}

/// `POST /{datatype}/{id}`: store the body's `data` as a hash.
pub async fn post_document(
    State(state): State<AppState>,
    path: Option<Path<String>>,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let mut doc = DocumentCodec::decode_doc(&body)?;
    let (datatype, id) = document_path(raw_path(&path))?;
    let fields = doc.fields()?;

    doc.stamp(Utc::now());
    doc.locate(datatype, id);
    state.persist(&doc, &fields).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /{datatype}/{id}`: the stored hash as a flat JSON object.
pub async fn get_document(
    State(state): State<AppState>,
    path: Option<Path<String>>,
) -> ServerResult<Response> {
    let (datatype, id) = document_path(raw_path(&path))?;
    let record = state.store.hgetall(&composite_key(datatype, id)).await?;
    let body = DocumentCodec::encode_record(&record).map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// `POST /bulk`: a JSON array of documents, written one element at a time.
///
/// Elements that fail to decode or validate are skipped and reported; a
/// backend failure stops the request.
pub async fn bulk(State(state): State<AppState>, body: Body) -> ServerResult<StatusCode> {
    let mut reader = ArrayReader::with_max_item_size(state.config.max_bulk_item_size);
    let mut outcome = BulkOutcome::default();
    let mut chunks = body.into_data_stream();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| ServerError::BadRequest(format!("failed to read body: {e}")))?;
        reader.feed(&chunk);
        while let Some(item) = reader.next_item()? {
            outcome.ingest(&state, item).await?;
        }
    }
    reader.finish()?;

    info!(written = outcome.written, rejected = outcome.failed.len(), "bulk ingest finished");
    outcome.into_result()
}

#[derive(Debug, Default)]
struct BulkOutcome {
    written: usize,
    failed: Vec<usize>,
}

impl BulkOutcome {
    async fn ingest(&mut self, state: &AppState, item: BulkItem) -> ServerResult<()> {
        let (doc, fields) = match prepare(&item) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(item = item.index, error = %e, "bulk item rejected");
                self.failed.push(item.index);
                return Ok(());
            }
        };
        state.persist(&doc, &fields).await?;
        self.written += 1;
        Ok(())
    }

    fn into_result(self) -> ServerResult<StatusCode> {
        if self.failed.is_empty() {
            Ok(StatusCode::NO_CONTENT)
        } else {
            Err(ServerError::BulkItems {
                failed: self.failed,
                written: self.written,
            })
        }
    }
}

fn prepare(item: &BulkItem) -> Result<(Doc, Vec<(String, String)>), docgate_types::TypeError> {
    let mut doc = item.decode()?;
    doc.rekey()?;
    let fields = doc.fields()?;
    doc.stamp(Utc::now());
    Ok((doc, fields))
}

fn raw_path(path: &Option<Path<String>>) -> &str {
    path.as_ref().map(|Path(p)| p.as_str()).unwrap_or("")
}

/// Split `datatype/id`. Anything but exactly two non-empty segments is
/// rejected.
fn document_path(raw: &str) -> ServerResult<(&str, &str)> {
    let trimmed = raw.strip_prefix('/').unwrap_or(raw);
    let mut segments = trimmed.split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(datatype), Some(id), None) if !datatype.is_empty() && !id.is_empty() => Ok((datatype, id)),
        _ => Err(ServerError::BadPath(format!("/{trimmed}"))),
    }
}
