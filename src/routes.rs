use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    body::Bytes,
    extract::{
        multipart::{Field, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde::Serialize;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::error::AppError;
use crate::labels::{self, Advice};
use crate::model::{predicted_index, preprocess_image, Classifier};

/// Multipart field the upload is expected in.
pub const IMAGE_FIELD: &str = "imagefile";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shared handle to the loaded model. Inference runs under the lock.
#[derive(Clone)]
pub struct AppState {
    classifier: Arc<Mutex<Box<dyn Classifier>>>,
}

impl AppState {
    pub fn new(classifier: impl Classifier + 'static) -> Self {
        AppState {
            classifier: Arc::new(Mutex::new(Box::new(classifier))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    pub status: &'static str,
    pub status_code: u16,
    pub id: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub label: &'static str,
    pub description: &'static str,
    pub action: &'static str,
    pub message: &'static str,
}

impl ClassificationResponse {
    fn new(label: &'static str) -> Self {
        let Advice { description, action } = labels::advice_for(label);
        ClassificationResponse {
            status: "success",
            status_code: 200,
            id: Uuid::new_v4().to_string(),
            created_at: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            label,
            description,
            action,
            message: "The image was successfully processed and classified.",
        }
    }
}

struct ClassificationRequest {
    file_name: String,
    data: Bytes,
}

pub fn router(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route(
            "/",
            get(upload_prompt)
                .post(predict_handler)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn upload_prompt() -> Json<InfoResponse> {
    Json(InfoResponse {
        status: "success",
        message: "Please upload an image for prediction.",
    })
}

async fn predict_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ClassificationResponse>, AppError> {
    let result = classify_upload(state, multipart).await;
    match &result {
        Ok(response) => {
            tracing::info!(label = response.label, id = %response.id, "classified upload")
        }
        Err(err) => tracing::warn!(error = %err, "prediction failed"),
    }
    result.map(Json)
}

async fn classify_upload(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ClassificationResponse, AppError> {
    let multipart = multipart.map_err(|e| AppError::Multipart(e.body_text()))?;
    let upload = read_image_field(multipart).await?;

    if upload.file_name.is_empty() || upload.data.is_empty() {
        return Err(AppError::EmptyFile);
    }
    tracing::debug!(file = %upload.file_name, bytes = upload.data.len(), "received upload");

    let classifier = state.classifier.clone();
    let label = tokio::task::spawn_blocking(move || diagnose(&classifier, &upload.data))
        .await
        .map_err(|e| AppError::Inference(e.to_string()))??;

    Ok(ClassificationResponse::new(label))
}

/// Pulls the first file part named `imagefile` out of the form. Plain text
/// fields with that name are not uploads and are skipped.
async fn read_image_field(mut multipart: Multipart) -> Result<ClassificationRequest, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Multipart(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(file_name) = declared_file_name(&field) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Multipart(e.body_text()))?;
        return Ok(ClassificationRequest { file_name, data });
    }
    Err(AppError::MissingFile)
}

/// Name from the part's `filename` parameter. A part that declares
/// `filename=""` is still an upload and yields an empty name.
fn declared_file_name(field: &Field<'_>) -> Option<String> {
    if let Some(name) = field.file_name() {
        return Some(name.to_owned());
    }
    let disposition = field.headers().get(header::CONTENT_DISPOSITION)?.to_str().ok()?;
    disposition
        .split(';')
        .any(|param| param.trim_start().starts_with("filename"))
        .then(String::new)
}

fn diagnose(
    classifier: &Mutex<Box<dyn Classifier>>,
    image_data: &[u8],
) -> Result<&'static str, AppError> {
    let input = preprocess_image(image_data)?;

    let scores = {
        // `classify` takes `&self`; a poisoned lock guards no partial state.
        let model = classifier.lock().unwrap_or_else(PoisonError::into_inner);
        model.classify(&input)?
    };

    let index = predicted_index(&scores)
        .ok_or_else(|| AppError::Inference("model returned no scores".to_string()))?;
    labels::class_name(index).ok_or_else(|| {
        AppError::Inference(format!("predicted class index {index} is out of range"))
    })
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn not_found() -> AppError {
    AppError::NotFound
}

/// Renders a handler panic as the generic 500 payload.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = detail, "request handler panicked");
    AppError::Internal.into_response()
}
