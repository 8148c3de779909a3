use crate::auth::Principal;
use crate::error::{ServerError, ServerResult};
use crate::media::{face_key, MediaStore};
use crate::state::ServerState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use matcher::MatchOutcome;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use store::{
    validate_vector, EmbeddingRecord, EmbeddingStore, RecognitionLog, StoreError,
};

const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LOG_LIMIT: usize = 500;

/// Stored face without the vector.
#[derive(Debug, Serialize)]
pub struct FaceSummary {
    pub subject_id: String,
    pub tenant_id: String,
    pub image_ref: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

impl FaceSummary {
    fn new(state: &ServerState, record: EmbeddingRecord) -> Self {
        Self {
            image_url: state.media.url(&record.image_ref),
            subject_id: record.subject_id,
            tenant_id: record.tenant_id,
            image_ref: record.image_ref,
            created_at: record.created_at,
        }
    }
}

/// Recognition request
#[derive(Debug, Deserialize)]
pub struct RecognizeRequest {
    pub embedding: Vec<f32>,
}

/// Recognition response. `matched: false` carries only the threshold.
#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub threshold: f32,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

/// Parse an embedding sent as `0.1,0.2,...` or as a JSON array.
pub fn parse_embedding(raw: &str) -> ServerResult<Vec<f32>> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        return serde_json::from_str(raw)
            .map_err(|e| ServerError::Validation(format!("embedding must be a list of numbers: {e}")));
    }
    raw.split(',')
        .map(|part| {
            part.trim().parse::<f32>().map_err(|_| {
                ServerError::Validation("embedding must be a list of numbers".to_string())
            })
        })
        .collect()
}

/// Enroll a face (multipart: `userId`, `embedding`, `faceImage`).
///
/// Re-enrolling a subject replaces the stored embedding and photo reference.
pub async fn enroll_face(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> ServerResult<impl IntoResponse> {
    let mut subject_id = None;
    let mut embedding = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "userId" => subject_id = Some(field.text().await?.trim().to_string()),
            "embedding" => embedding = Some(parse_embedding(&field.text().await?)?),
            "faceImage" => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                if !content_type.starts_with("image/") {
                    return Err(ServerError::Validation(
                        "Only image files are allowed".to_string(),
                    ));
                }
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                if bytes.len() > state.config.max_image_size() {
                    return Err(ServerError::PayloadTooLarge(format!(
                        "faceImage exceeds {} MB",
                        state.config.max_image_mb
                    )));
                }
                image = Some((file_name, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (Some(subject_id), Some(embedding), Some((file_name, content_type, bytes))) =
        (subject_id.filter(|s| !s.is_empty()), embedding, image)
    else {
        return Err(ServerError::BadRequest(
            "userId, embedding and faceImage are required".to_string(),
        ));
    };

    // Check everything that can fail cheaply before writing the photo.
    validate_vector(&embedding)?;
    let tenant_id = principal.tenant_id.as_str();
    match state.engine.registry().get(tenant_id, &subject_id).await? {
        Some(subject) if subject.is_active() => {}
        _ => {
            return Err(ServerError::NotFound(format!(
                "user {subject_id} not found or access denied"
            )))
        }
    }

    let key = face_key(file_name.as_deref());
    let record = with_stored_photo(
        state.media.as_ref(),
        &key,
        bytes,
        &content_type,
        state
            .engine
            .store()
            .upsert(tenant_id, &subject_id, embedding, &key),
    )
    .await?;

    tracing::info!(tenant_id, subject_id = %subject_id, image_ref = %key, "face enrolled");
    Ok((StatusCode::CREATED, Json(FaceSummary::new(&state, record))))
}

/// Store the photo, then run `write`. The photo is removed again if `write`
/// fails so no object is left without a record.
async fn with_stored_photo<T, F>(
    media: &dyn MediaStore,
    key: &str,
    bytes: Vec<u8>,
    content_type: &str,
    write: F,
) -> ServerResult<T>
where
    F: Future<Output = Result<T, StoreError>>,
{
    media.put(key, bytes, content_type).await?;
    match write.await {
        Ok(value) => Ok(value),
        Err(err) => {
            if let Err(cleanup) = media.delete(key).await {
                tracing::warn!(key, error = %cleanup, "orphaned enrollment photo");
            }
            Err(err.into())
        }
    }
}

/// Recognize a face embedding within the caller's tenant.
pub async fn recognize_face(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<RecognizeRequest>, JsonRejection>,
) -> ServerResult<impl IntoResponse> {
    let Json(request) = payload?;
    let tenant_id = principal.tenant_id.as_str();
    let matcher = state.engine.matcher();
    let threshold = matcher.threshold();

    let hit = match matcher.recognize(tenant_id, &request.embedding).await? {
        MatchOutcome::Matched(hit) => hit,
        MatchOutcome::NoMatch => {
            return Ok(Json(RecognizeResponse {
                matched: false,
                subject_id: None,
                display_name: None,
                distance: None,
                confidence: None,
                image_url: None,
                threshold,
            }))
        }
    };

    let display_name = state
        .engine
        .registry()
        .get(tenant_id, &hit.subject_id)
        .await?
        .map(|subject| subject.display_name)
        .unwrap_or_else(|| hit.subject_id.clone());

    let log = RecognitionLog {
        tenant_id: tenant_id.to_string(),
        subject_id: hit.subject_id.clone(),
        distance: hit.distance,
        confidence: hit.confidence,
        threshold,
        logged_at: Utc::now(),
    };
    // The match stands even if the audit write fails.
    if let Err(err) = state.engine.store().append_log(log).await {
        tracing::warn!(tenant_id, error = %err, "failed to append recognition log");
    }

    Ok(Json(RecognizeResponse {
        matched: true,
        image_url: Some(state.media.url(&hit.image_ref)),
        subject_id: Some(hit.subject_id),
        display_name: Some(display_name),
        distance: Some(hit.distance),
        confidence: Some(hit.confidence),
        threshold,
    }))
}

/// Stored face of one subject.
pub async fn get_user_face(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let record = state
        .engine
        .store()
        .find_by_subject(&principal.tenant_id, &user_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("no face registered for user {user_id}")))?;
    Ok(Json(FaceSummary::new(&state, record)))
}

/// Most recent recognition logs of the caller's tenant.
pub async fn list_logs(
    State(state): State<Arc<ServerState>>,
    Extension(principal): Extension<Principal>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> ServerResult<impl IntoResponse> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);
    let logs = state
        .engine
        .store()
        .list_logs(&principal.tenant_id, limit)
        .await?;
    Ok(Json(logs))
}
