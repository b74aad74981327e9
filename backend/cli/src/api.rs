use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    async_trait,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use ocr_agents_core::{
    AcademicModule, DocumentBackend, DocumentCategory, OcrAgentsError, SupportedMedia,
    UploadedFile,
};
use ocr_agents_providers::ProviderRegistry;
use ocr_agents_services::{
    parse_marking_scheme, AssignmentAssessor, CategoryVerifier, ChecklistVerifier,
    ContentGenerator, ContentSpec, DetailExtractor, OcrOutcome, OcrPipeline, QuestionSpec,
    SourceDocument, StudyPlanSpec,
};

use crate::openapi;

/// Shared application state for API handlers.
pub struct AppState {
    pub pipeline: OcrPipeline,
    pub category_verifier: CategoryVerifier,
    pub checklist_verifier: ChecklistVerifier,
    pub extractor: DetailExtractor,
    pub assessor: AssignmentAssessor,
    pub generator: ContentGenerator,
}

impl AppState {
    /// Wire services from a document backend and a registry holding `mistral` and `gemini`.
    pub fn new(
        documents: Arc<dyn DocumentBackend>,
        registry: &ProviderRegistry,
        gemini_model: &str,
    ) -> anyhow::Result<Self> {
        let mistral = registry
            .get("mistral")
            .ok_or_else(|| anyhow!("mistral provider is not registered"))?;
        let gemini = registry
            .get("gemini")
            .ok_or_else(|| anyhow!("gemini provider is not registered"))?;

        Ok(Self {
            pipeline: OcrPipeline::new(documents),
            category_verifier: CategoryVerifier::new(mistral),
            checklist_verifier: ChecklistVerifier::new(gemini.clone(), gemini_model),
            extractor: DetailExtractor::new(gemini.clone(), gemini_model),
            assessor: AssignmentAssessor::new(gemini.clone(), gemini_model),
            generator: ContentGenerator::new(gemini, gemini_model),
        })
    }
}

/// Error response rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, detail)
    }

    fn missing_field(name: &str) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Field required: {name}"),
        )
    }
}

impl From<OcrAgentsError> for ApiError {
    fn from(e: OcrAgentsError) -> Self {
        match e {
            e if e.is_client_error() => Self::bad_request(e.to_string()),
            OcrAgentsError::NotFound(what) => Self::not_found(what),
            OcrAgentsError::Upstream { message, .. } => Self::internal(message),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "Request failed");
        } else {
            tracing::debug!(status = %self.status, detail = %self.detail, "Request rejected");
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the Axum router with all API routes.
pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/verify-document", post(verify_document_checklist))
        .route("/api/v1/agents/ocr/verify-document", post(verify_document))
        .route("/api/v1/agents/ocr/document", post(ocr_document))
        .route("/ocr/image", post(ocr_image))
        .route("/api/v1/agents/ocr/documents/:file_id", get(get_document))
        .route("/api/v1/agents/ocr/documents/:file_id/info", get(get_document_info))
        .route("/api/v1/agents/documents/upload-file", post(upload_file))
        .route("/api/v1/agents/documents/file-view/:file_id", get(view_file))
        .route("/api/v1/agents/documents/extract-details", post(extract_details))
        .route("/api/v1/agents/student/assessment", post(assess_assignment))
        .route("/api/v2/agents/student/assessment", post(assess_assignment_with_scheme))
        .route("/api/v1/agents/ocr/general", post(general_ocr))
        .route("/api/v1/agents/teacher/assessment-generation", post(generate_questions))
        .route("/api/v2/agents/teacher/assessment-generation", post(generate_questions_with_context))
        .route("/api/v1/agents/teacher/content-generation", post(generate_content))
        .route("/api/v1/agents/teacher/plan-generation", post(generate_plan))
        .route("/api/v1/agents/health-check", get(health_check))
        .route("/openapi.json", get(openapi::openapi_json))
        .route("/docs", get(openapi::swagger_ui))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// JSON request body. Rejections render as `{"detail": ...}`.
struct JsonBody(Value);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for JsonBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Text fields and file parts of a multipart form.
#[derive(Default)]
struct UploadForm {
    fields: HashMap<String, String>,
    files: Vec<(String, UploadedFile)>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or(ocr_agents_core::FetchedContent::DEFAULT_CONTENT_TYPE)
                        .to_string();
                    let bytes = field.bytes().await.map_err(|e| {
                        ApiError::bad_request(format!("Invalid multipart body: {e}"))
                    })?;
                    form.files
                        .push((name, UploadedFile::new(filename, content_type, bytes.to_vec())));
                }
                None => {
                    let text = field.text().await.map_err(|e| {
                        ApiError::bad_request(format!("Invalid multipart body: {e}"))
                    })?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn required_text(&self, name: &str) -> ApiResult<&str> {
        self.text(name).ok_or_else(|| ApiError::missing_field(name))
    }

    fn take_file(&mut self, name: &str) -> ApiResult<UploadedFile> {
        let idx = self
            .files
            .iter()
            .position(|(field, _)| field == name)
            .ok_or_else(|| ApiError::missing_field(name))?;
        Ok(self.files.remove(idx).1)
    }

    fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        let (matching, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.files).into_iter().partition(|(field, _)| field == name);
        self.files = rest;
        matching.into_iter().map(|(_, file)| file).collect()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for UploadForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state).await?;
        Self::read(multipart).await
    }
}

/// Common fields of every single-file OCR response.
fn ocr_response(file: &UploadedFile, outcome: &OcrOutcome) -> serde_json::Map<String, Value> {
    let mut body = serde_json::Map::new();
    body.insert("filename".into(), json!(file.filename));
    body.insert("content_type".into(), json!(file.content_type));
    body.insert("ocr_type".into(), json!(outcome.media.ocr_type()));
    body.insert("markdown".into(), json!(outcome.markdown));
    body.insert("pages".into(), json!(outcome.pages()));
    body.insert("file_id".into(), json!(outcome.file_id));
    body.insert("file_url".into(), json!(outcome.file_url));
    body.insert("view_url".into(), json!(outcome.view_url()));
    body
}

/// Legacy verification against per-category field checklists.
async fn verify_document_checklist(
    State(state): State<Arc<AppState>>,
    mut form: UploadForm,
) -> ApiResult<Json<Value>> {
    let category: DocumentCategory = form.required_text("category")?.parse()?;
    let file = form.take_file("file")?;
    let media = file.media()?;

    let outcome = state.pipeline.process(&file).await?;
    let verification = state
        .checklist_verifier
        .verify(category, &outcome.markdown)
        .await;

    Ok(Json(json!({
        "category": category,
        "filename": file.filename,
        "content_type": file.content_type,
        "ocr_type": media.ocr_type(),
        "pages": outcome.pages(),
        "verification": verification,
    })))
}

/// OCR an upload and verify it against the declared category.
async fn verify_document(
    State(state): State<Arc<AppState>>,
    mut form: UploadForm,
) -> ApiResult<Json<Value>> {
    let file = form.take_file("file")?;
    verify_upload(&state, &form, file).await
}

async fn ocr_document(
    State(state): State<Arc<AppState>>,
    mut form: UploadForm,
) -> ApiResult<Json<Value>> {
    let file = form.take_file("file")?;
    if SupportedMedia::from_mime(&file.content_type) != Some(SupportedMedia::Pdf) {
        return Err(ApiError::bad_request("Only PDF documents are supported"));
    }
    verify_upload(&state, &form, file).await
}

async fn ocr_image(
    State(state): State<Arc<AppState>>,
    mut form: UploadForm,
) -> ApiResult<Json<Value>> {
    let file = form.take_file("file")?;
    if !SupportedMedia::from_mime(&file.content_type).is_some_and(|m| m.is_image()) {
        return Err(ApiError::bad_request("Only JPEG/PNG images are supported"));
    }
    verify_upload(&state, &form, file).await
}

async fn verify_upload(
    state: &AppState,
    form: &UploadForm,
    file: UploadedFile,
) -> ApiResult<Json<Value>> {
    let category: DocumentCategory = form.required_text("category")?.parse()?;
    file.media()?;

    let outcome = state.pipeline.process(&file).await?;
    let verification = state
        .category_verifier
        .verify(category, &outcome.markdown)
        .await;

    let mut body = ocr_response(&file, &outcome);
    body.insert("category".into(), json!(verification.correct_category));
    body.insert("verification".into(), json!(verification));
    Ok(Json(Value::Object(body)))
}

#[derive(Debug, Deserialize)]
struct DocumentQuery {
    #[serde(default)]
    download: Option<String>,
}

impl DocumentQuery {
    /// Accepts the usual boolean spellings: `true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`, `t`/`f`, `y`/`n`.
    fn download(&self) -> ApiResult<bool> {
        let Some(raw) = self.download.as_deref() else {
            return Ok(false);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Ok(true),
            "false" | "0" | "no" | "off" | "f" | "n" => Ok(false),
            _ => Err(ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("download: Input should be a valid boolean, unable to interpret input {raw:?}"),
            )),
        }
    }
}

/// Redirect to the signed URL, or return the content inline when `download` is set.
async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
    query: Result<Query<DocumentQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let download = query.download()?;
    let not_found = |e: OcrAgentsError| {
        ApiError::not_found(format!("Document not found or inaccessible: {e}"))
    };

    if download {
        let fetched = state.pipeline.download(&file_id).await.map_err(not_found)?;
        return Ok(Json(json!({
            "file_id": file_id,
            "content": String::from_utf8_lossy(&fetched.bytes),
            "content_type": fetched.content_type,
        }))
        .into_response());
    }

    let url = state.pipeline.signed_url(&file_id).await.map_err(not_found)?;
    Ok(Redirect::temporary(&url).into_response())
}

async fn get_document_info(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let info = state
        .pipeline
        .info(&file_id)
        .await
        .map_err(|e| ApiError::not_found(format!("Document not found: {e}")))?;
    Ok(Json(json!(info)))
}

/// Store a file without running OCR.
async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut form: UploadForm,
) -> ApiResult<Json<Value>> {
    let file = form.take_file("file")?;
    file.media()?;

    let stored = state
        .pipeline
        .store(&file)
        .await
        .map_err(|e| ApiError::internal(format!("File upload failed: {e}")))?;

    Ok(Json(json!({
        "file_id": stored.id,
        "file_url": stored.url,
        "view_url": stored.view_url(),
        "content_type": file.content_type,
        "filename": file.filename,
    })))
}

/// Serve stored bytes for inline browser viewing.
async fn view_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> ApiResult<Response> {
    let fetched = state
        .pipeline
        .download(&file_id)
        .await
        .map_err(|e| ApiError::not_found(format!("File access failed: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, fetched.content_type),
            (header::CONTENT_DISPOSITION, "inline".to_string()),
        ],
        fetched.bytes,
    )
        .into_response())
}

async fn extract_details(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<Value>> {
    let documents = SourceDocument::parse_list(body)?;
    let details = state.extractor.extract(&documents).await?;
    Ok(Json(Value::Object(details)))
}

async fn assess_assignment(
    State(state): State<Arc<AppState>>,
    mut form: UploadForm,
) -> ApiResult<Json<Value>> {
    let module: AcademicModule = form.required_text("module")?.parse()?;
    let file = form.take_file("file")?;
    file.media()?;

    let outcome = state.pipeline.process(&file).await?;
    let assessment = state.assessor.assess(module, &outcome.markdown).await;

    let mut body = ocr_response(&file, &outcome);
    body.insert("module".into(), json!(module.as_str()));
    body.insert("assessment".into(), Value::Object(assessment));
    Ok(Json(Value::Object(body)))
}

async fn assess_assignment_with_scheme(
    State(state): State<Arc<AppState>>,
    mut form: UploadForm,
) -> ApiResult<Json<Value>> {
    let module: AcademicModule = form.required_text("module")?.parse()?;
    let file = form.take_file("file")?;
    file.media()?;
    let scheme = parse_marking_scheme(form.text("marking_scheme"))?;

    let outcome = state.pipeline.process(&file).await?;
    let assessment = state
        .assessor
        .assess_with_scheme(module, &outcome.markdown, scheme.as_ref())
        .await;

    let mut body = ocr_response(&file, &outcome);
    body.insert("module".into(), json!(module.as_str()));
    body.insert("assessment".into(), Value::Object(assessment));
    if let Some(scheme) = scheme {
        body.insert("marking_scheme".into(), scheme);
    }
    Ok(Json(Value::Object(body)))
}

/// OCR several files without verification.
async fn general_ocr(
    State(state): State<Arc<AppState>>,
    mut form: UploadForm,
) -> ApiResult<Json<Value>> {
    let files = form.take_files("files");
    if files.is_empty() {
        return Err(ApiError::missing_field("files"));
    }

    let rejected: Vec<&str> = files
        .iter()
        .filter(|f| f.media().is_err())
        .map(|f| f.filename.as_str())
        .collect();
    if !rejected.is_empty() {
        return Err(ApiError::bad_request(format!(
            "Unsupported file types for: {}. Supported types: {}",
            rejected.join(", "),
            SupportedMedia::valid_list()
        )));
    }

    let mut results = Vec::with_capacity(files.len());
    for file in &files {
        let outcome = state.pipeline.process(file).await?;
        results.push(json!({
            "documentName": file.filename,
            "markdown": outcome.markdown,
            "file_id": outcome.file_id,
            "file_url": outcome.file_url,
            "view_url": outcome.view_url(),
        }));
    }
    Ok(Json(Value::Array(results)))
}

async fn generate_questions(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<Value>> {
    let spec = QuestionSpec::parse(body, false)?;
    Ok(Json(Value::Array(state.generator.questions(&spec).await?)))
}

async fn generate_questions_with_context(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<Value>> {
    let spec = QuestionSpec::parse(body, true)?;
    Ok(Json(Value::Array(state.generator.questions(&spec).await?)))
}

async fn generate_content(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<Value>> {
    let spec = ContentSpec::parse(body)?;
    Ok(Json(Value::Object(state.generator.content(&spec).await?)))
}

async fn generate_plan(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody,
) -> ApiResult<Json<Value>> {
    let spec = StudyPlanSpec::parse(body)?;
    Ok(Json(Value::Object(state.generator.study_plan(&spec).await?)))
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "active",
        "message": "automation-agents services are running",
    }))
}
