use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::Api;
use crate::error::AppError;
use crate::http::download::add_content_disposition;
use crate::http::server::AppState;
use crate::proxy::capture::parse_header_block;
use crate::store::{ApiResponse, HistoryEntry, Payload, RecordId, ResponseFilter, SubId};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub routes: usize,
    pub responses: usize,
}

/// JSON view of a capture record. Attachments are listed by name only.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ResponseView {
    pub id: Option<RecordId>,
    pub path: String,
    pub method: String,
    pub data_key: String,
    pub status_code: u16,
    pub header: String,
    pub description: String,
    /// Inline body as text; absent for attachments.
    pub body: Option<String>,
    pub file_name: Option<String>,
    pub size: usize,
}

impl From<&ApiResponse> for ResponseView {
    fn from(record: &ApiResponse) -> Self {
        let body = match &record.payload {
            Payload::Inline { body } => Some(String::from_utf8_lossy(body).into_owned()),
            Payload::Attachment { .. } => None,
        };
        Self {
            id: record.id,
            path: record.path.clone(),
            method: record.method.clone(),
            data_key: record.data_key.clone(),
            status_code: record.status_code,
            header: record.header.clone(),
            description: record.description.clone(),
            body,
            file_name: record.payload.file_name().map(str::to_string),
            size: record.payload.bytes().len(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryView {
    pub id: RecordId,
    pub sub_id: SubId,
    pub saved_at: u64,
    pub response: ResponseView,
}

impl From<&HistoryEntry> for HistoryView {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            id: entry.id,
            sub_id: entry.sub_id,
            saved_at: entry.saved_at,
            response: ResponseView::from(&entry.record),
        }
    }
}

/// Create and update payload.
#[derive(Debug, Deserialize)]
pub struct ResponseForm {
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub data_key: String,
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub description: String,
    /// Inline body text. On update, empty keeps an existing attachment.
    #[serde(default)]
    pub body: Option<String>,
    /// On update, drop an existing attachment when no body is given.
    #[serde(default)]
    pub delete_file: bool,
    /// On update, keep the previous version as a history entry.
    #[serde(default)]
    pub save_history: bool,
}

fn default_status_code() -> u16 {
    200
}

impl ResponseForm {
    fn validate(&self) -> Result<(), AppError> {
        if !self.path.starts_with('/') {
            return Err(AppError::BadRequest(format!(
                "path '{}' must start with '/'",
                self.path
            )));
        }
        if self.method.trim().is_empty() {
            return Err(AppError::BadRequest("method is required".to_string()));
        }
        if StatusCode::from_u16(self.status_code).is_err() {
            return Err(AppError::BadRequest(format!(
                "status code {} is invalid",
                self.status_code
            )));
        }
        parse_header_block(&self.header)
            .map_err(|e| AppError::BadRequest(format!("header block is invalid: {}", e)))?;
        Ok(())
    }

    fn into_record(self, payload: Payload) -> ApiResponse {
        ApiResponse {
            id: None,
            path: self.path,
            method: self.method.to_uppercase(),
            data_key: self.data_key,
            status_code: self.status_code,
            header: self.header,
            description: self.description,
            payload,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteResponses {
    pub ids: Vec<RecordId>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteHistories {
    pub sub_ids: Vec<SubId>,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub file_name: String,
    #[serde(default)]
    pub save_history: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Deleted {
    pub deleted: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<SystemStatus>, AppError> {
    let responses = state.store.find_all(&ResponseFilter::default()).await?.len();
    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        routes: state.routes.load().len(),
        responses,
    }))
}

pub async fn list_apis(State(state): State<AppState>) -> Json<Vec<Api>> {
    let routes = state.routes.load();
    let mut apis: Vec<Api> = routes.iter().cloned().collect();
    apis.sort_by(|a, b| (&a.path, &a.method).cmp(&(&b.path, &b.method)));
    Json(apis)
}

pub async fn list_responses(
    State(state): State<AppState>,
    Query(filter): Query<ResponseFilter>,
) -> Result<Json<Vec<ResponseView>>, AppError> {
    let records = state.store.find_all(&filter).await?;
    Ok(Json(records.iter().map(ResponseView::from).collect()))
}

pub async fn create_response(
    State(state): State<AppState>,
    Json(form): Json<ResponseForm>,
) -> Result<(StatusCode, Json<ResponseView>), AppError> {
    form.validate()?;
    let body = form.body.clone().unwrap_or_default().into_bytes();
    let saved = state
        .store
        .create(form.into_record(Payload::Inline { body }))
        .await?;

    tracing::info!(id = ?saved.id, path = %saved.path, method = %saved.method, "Response created");
    Ok((StatusCode::CREATED, Json(ResponseView::from(&saved))))
}

pub async fn get_response(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> Result<Json<ResponseView>, AppError> {
    let record = find_response(&state, id).await?;
    Ok(Json(ResponseView::from(&record)))
}

pub async fn update_response(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(form): Json<ResponseForm>,
) -> Result<Json<ResponseView>, AppError> {
    form.validate()?;

    let (payload, keep_attachment) = match form.body.as_deref() {
        Some(body) if !body.is_empty() => (
            Payload::Inline {
                body: body.as_bytes().to_vec(),
            },
            false,
        ),
        _ => (Payload::default(), !form.delete_file),
    };
    let save_history = form.save_history;

    let saved = state
        .store
        .update(id, form.into_record(payload), keep_attachment, save_history)
        .await?;

    tracing::info!(id, save_history, "Response updated");
    Ok(Json(ResponseView::from(&saved)))
}

/// Replace the payload of a record with an uploaded attachment.
pub async fn upload_file(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Query(params): Query<UploadParams>,
    content: Bytes,
) -> Result<Json<ResponseView>, AppError> {
    let file_name = base_name(&params.file_name);
    if file_name.is_empty() {
        return Err(AppError::BadRequest("file_name is required".to_string()));
    }

    let mut record = find_response(&state, id).await?;
    record.payload = Payload::Attachment {
        file_name: file_name.to_string(),
        content: content.to_vec(),
    };

    let saved = state
        .store
        .update(id, record, false, params.save_history)
        .await?;

    tracing::info!(id, file_name, bytes = content.len(), "Attachment uploaded");
    Ok(Json(ResponseView::from(&saved)))
}

pub async fn delete_response(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> Result<StatusCode, AppError> {
    match state.store.delete(&[id]).await? {
        0 => Err(AppError::NotFound(format!("response {}", id))),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

pub async fn delete_responses(
    State(state): State<AppState>,
    Json(request): Json<DeleteResponses>,
) -> Result<Json<Deleted>, AppError> {
    let deleted = state.store.delete(&request.ids).await?;
    tracing::info!(deleted, "Responses deleted");
    Ok(Json(Deleted { deleted }))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> Result<Response, AppError> {
    let record = find_response(&state, id).await?;
    download(&record, || format!("file of response {}", id))
}

pub async fn list_histories(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> Result<Json<Vec<HistoryView>>, AppError> {
    let entries = state.store.find_all_history(id).await?;
    Ok(Json(entries.iter().map(HistoryView::from).collect()))
}

pub async fn delete_histories(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(request): Json<DeleteHistories>,
) -> Result<Json<Deleted>, AppError> {
    let deleted = state.store.delete_history(id, &request.sub_ids).await?;
    Ok(Json(Deleted { deleted }))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path((id, sub_id)): Path<(RecordId, SubId)>,
) -> Result<Json<HistoryView>, AppError> {
    let entry = find_history(&state, id, sub_id).await?;
    Ok(Json(HistoryView::from(&entry)))
}

pub async fn delete_history(
    State(state): State<AppState>,
    Path((id, sub_id)): Path<(RecordId, SubId)>,
) -> Result<StatusCode, AppError> {
    match state.store.delete_history(id, &[sub_id]).await? {
        0 => Err(AppError::NotFound(format!(
            "history {} of response {}",
            sub_id, id
        ))),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

pub async fn restore_history(
    State(state): State<AppState>,
    Path((id, sub_id)): Path<(RecordId, SubId)>,
) -> Result<Json<ResponseView>, AppError> {
    let restored = state.store.restore_history(id, sub_id).await?;
    tracing::info!(id, sub_id, "Response restored from history");
    Ok(Json(ResponseView::from(&restored)))
}

pub async fn download_history_file(
    State(state): State<AppState>,
    Path((id, sub_id)): Path<(RecordId, SubId)>,
) -> Result<Response, AppError> {
    let entry = find_history(&state, id, sub_id).await?;
    download(&entry.record, || {
        format!("file of history {} of response {}", sub_id, id)
    })
}

async fn find_response(state: &AppState, id: RecordId) -> Result<ApiResponse, AppError> {
    state
        .store
        .find_one(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("response {}", id)))
}

async fn find_history(
    state: &AppState,
    id: RecordId,
    sub_id: SubId,
) -> Result<HistoryEntry, AppError> {
    state
        .store
        .find_history(id, sub_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("history {} of response {}", sub_id, id)))
}

fn download(record: &ApiResponse, what: impl FnOnce() -> String) -> Result<Response, AppError> {
    let Payload::Attachment { file_name, content } = &record.payload else {
        return Err(AppError::NotFound(what()));
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    add_content_disposition(&mut headers, file_name)?;

    Ok((StatusCode::OK, headers, content.clone()).into_response())
}

fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}
