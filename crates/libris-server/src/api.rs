use std::sync::{Arc, MutexGuard};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use libris_shared::query::search_location;
use libris_shared::{route, AttachmentId, BookId, RouteDecision, Subject};
use libris_store::{Attachment, Book, CatalogueCounts, Database, NewBook};

use crate::attachments::{
    AttachmentManager, BookDeletion, CleanupOutcome, DeleteOutcome, Download, SharedDb,
    UploadReport, UploadedFile,
};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::search::search_subject;

/// Header carrying a user-visible warning on search redirects.
pub const WARNING_HEADER: HeaderName = HeaderName::from_static("x-libris-warning");

/// Identity recorded as the uploader of files.
const UPLOADER_HEADER: &str = "x-uploader";

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub attachments: Arc<AttachmentManager>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    fn lock_db(&self) -> Result<MutexGuard<'_, Database>, ServerError> {
        self.db
            .lock()
            .map_err(|e| ServerError::Internal(format!("Lock poisoned: {e}")))
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_request_size;

    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(statistics))
        .route("/books/upload", post(upload_new_book))
        .route("/books/:id", put(update_book).delete(delete_book))
        .route("/books/:id/files", post(upload_book_files))
        .route("/books/:id/cover", get(book_cover))
        .route("/books/:id/reconcile", post(reconcile_book))
        .route("/files/:id", get(download_file).delete(delete_file))
        .route("/search", get(search))
        .route("/search/:subject", get(search_by_subject))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct CoverStatus {
    stored: bool,
    /// Cleanup of the previous cover blob.
    #[serde(skip_serializing_if = "Option::is_none")]
    replaced: Option<CleanupOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct BookUploadResponse {
    files: UploadReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    cover: Option<CoverStatus>,
}

#[derive(Serialize)]
struct ReconcileResponse {
    book_id: BookId,
    removed: Vec<Attachment>,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
    page: Option<String>,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn statistics(State(state): State<AppState>) -> Result<Json<CatalogueCounts>, ServerError> {
    let counts = state.lock_db()?.catalogue_counts()?;
    Ok(Json(counts))
}

// ─── Uploads ───

/// Files and optional cover read from a multipart upload.
struct UploadForm {
    files: Vec<UploadedFile>,
    cover: Option<Bytes>,
}

async fn read_upload_form(multipart: &mut Multipart) -> Result<UploadForm, ServerError> {
    let mut form = UploadForm {
        files: Vec::new(),
        cover: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;

        // Browsers send an empty part for an untouched file input
        if file_name.is_none() && data.is_empty() {
            continue;
        }

        match name.as_str() {
            "files" => form.files.push(UploadedFile {
                file_name,
                content_type,
                data,
            }),
            "cover" => form.cover = Some(data),
            _ => {}
        }
    }

    Ok(form)
}

fn uploader(headers: &HeaderMap) -> String {
    headers
        .get(UPLOADER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("anonymous")
        .to_string()
}

fn report_status(complete: bool) -> StatusCode {
    if complete {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    }
}

async fn upload_new_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadReport>), ServerError> {
    let form = read_upload_form(&mut multipart).await?;
    let report = state
        .attachments
        .create_book_from_upload(form.files, &uploader(&headers))
        .await?;

    Ok((report_status(report.is_complete()), Json(report)))
}

async fn upload_book_files(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<BookUploadResponse>), ServerError> {
    let book_id = BookId(book_id);
    let form = read_upload_form(&mut multipart).await?;
    if form.files.is_empty() && form.cover.is_none() {
        return Err(ServerError::BadRequest(
            "Missing 'files' or 'cover' field in multipart form".to_string(),
        ));
    }

    let cover = match form.cover {
        Some(data) => match state.attachments.upload_cover(book_id, &data).await {
            Ok(upload) => Some(CoverStatus {
                stored: true,
                replaced: upload.replaced,
                error: None,
            }),
            Err(e @ ServerError::NotFound(_)) => return Err(e),
            Err(e) => Some(CoverStatus {
                stored: false,
                replaced: None,
                error: Some(e.to_string()),
            }),
        },
        None => None,
    };

    let files = state
        .attachments
        .upload_files(book_id, form.files, &uploader(&headers))
        .await?;

    let complete = files.is_complete() && cover.as_ref().map_or(true, |c| c.stored);
    Ok((
        report_status(complete),
        Json(BookUploadResponse { files, cover }),
    ))
}

async fn reconcile_book(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> Result<Json<ReconcileResponse>, ServerError> {
    let book_id = BookId(book_id);
    let removed = state.attachments.prune_orphans(book_id).await?;
    Ok(Json(ReconcileResponse { book_id, removed }))
}

async fn update_book(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
    Json(changes): Json<NewBook>,
) -> Result<Json<Book>, ServerError> {
    let book = state.lock_db()?.update_book(BookId(book_id), &changes)?;
    info!(book_id = %book.id, title = %book.title, "Updated book");
    Ok(Json(book))
}

async fn delete_book(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> Result<Json<BookDeletion>, ServerError> {
    let deletion = state.attachments.delete_book(BookId(book_id)).await?;
    Ok(Json(deletion))
}

// ─── Downloads ───

fn file_response(download: Download, disposition: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, download.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.data,
    )
        .into_response()
}

async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ServerError> {
    let download = state.attachments.download(AttachmentId(id)).await?;
    let disposition = format!("attachment; filename={}", download.filename);
    Ok(file_response(download, disposition))
}

async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteOutcome>, ServerError> {
    let outcome = state.attachments.delete_attachment(AttachmentId(id)).await?;
    Ok(Json(outcome))
}

async fn book_cover(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> Result<Response, ServerError> {
    let download = state.attachments.cover(BookId(book_id)).await?;
    Ok(file_response(download, "attachment".to_string()))
}

// ─── Search ───

/// Send the user back where they came from with a warning.
fn warn_and_return(headers: &HeaderMap, warning: &'static str) -> Response {
    let target = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("/");

    ([(WARNING_HEADER, warning)], Redirect::to(target)).into_response()
}

async fn search(headers: HeaderMap, Query(params): Query<SearchParams>) -> Response {
    match route(&params.query) {
        RouteDecision::Dispatch { subject, term } => {
            Redirect::to(&search_location(subject, &term)).into_response()
        }
        RouteDecision::Reject(e) => {
            info!(query = %params.query, reason = e.reason(), "Search query rejected");
            warn_and_return(&headers, e.warning())
        }
    }
}

async fn search_by_subject(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Response, ServerError> {
    let subject = Subject::from_slug(&slug)
        .ok_or_else(|| ServerError::NotFound(format!("Unknown search subject: {slug}")))?;
    let page = params
        .page
        .as_deref()
        .and_then(|p| p.parse::<usize>().ok())
        .unwrap_or(1);

    let result = {
        let db = state.lock_db()?;
        search_subject(&db, subject, &params.query, page, state.config.items_per_page)
    };

    match result {
        Ok(page) => Ok(Json(page).into_response()),
        Err(ServerError::Query(e)) => Ok(warn_and_return(&headers, e.warning())),
        Err(e) => Err(e),
    }
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
