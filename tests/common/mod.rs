#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
};
use dumpy_pipeline::config::PipelineConfig;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Start of a JFIF file; enough for content sniffing
pub const JPEG_BYTES: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub container: String,
    pub name: String,
    pub blob_type: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

/// What the fake answers, plus everything it has seen
pub struct BackendState {
    pub base_url: String,

    pub token_status: StatusCode,
    pub proxy_status: StatusCode,
    pub head_status: StatusCode,
    pub put_status: StatusCode,
    pub put_error_body: String,

    pub identify_status: StatusCode,
    pub identify_body: Value,
    pub enroll_body: Value,

    /// Answers for successive status polls; "500" makes a poll fail.
    /// The last entry repeats once the queue is drained.
    pub job_states: VecDeque<&'static str>,

    pub blobs: Vec<StoredObject>,
    pub token_requests: Vec<String>,
    pub probes: usize,
    pub proxy_uploads: Vec<String>,
    pub identify_queries: Vec<HashMap<String, String>>,
    pub identify_files: Vec<String>,
    pub enrollments: Vec<(String, String, usize)>,
    pub slideshow_requests: Vec<Value>,
    pub polls: usize,
}

impl BackendState {
    fn new(base_url: String) -> Self {
        Self {
            base_url,
            token_status: StatusCode::OK,
            proxy_status: StatusCode::OK,
            head_status: StatusCode::NOT_FOUND,
            put_status: StatusCode::CREATED,
            put_error_body: "AuthenticationFailed".to_string(),
            identify_status: StatusCode::OK,
            identify_body: json!({"ok": false, "reason": "no_face_detected", "faces": []}),
            enroll_body: json!({"ok": true, "dim": 512, "storage": "local"}),
            job_states: VecDeque::from(vec!["completed"]),
            blobs: Vec::new(),
            token_requests: Vec::new(),
            probes: 0,
            proxy_uploads: Vec::new(),
            identify_queries: Vec::new(),
            identify_files: Vec::new(),
            enrollments: Vec::new(),
            slideshow_requests: Vec::new(),
            polls: 0,
        }
    }
}

pub type SharedState = Arc<Mutex<BackendState>>;

pub struct FakeBackend {
    pub base_url: String,
    pub state: SharedState,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(Mutex::new(BackendState::new(base_url.clone())));

        let app = Router::new()
            .route("/blob/:container/:name", put(put_blob).head(head_blob))
            .route("/getUploadUrl", post(get_upload_url))
            .route("/api/upload", post(proxy_upload))
            .route("/api/face/identify_multi_local_grouped", post(identify))
            .route("/api/face/enroll_local", post(enroll))
            .route("/api/face/enroll_local_batch", post(enroll))
            .route("/api/slideshow/generate", post(generate_slideshow))
            .route("/api/slideshow/status/:job_id", get(slideshow_status))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, state }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut BackendState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Config that reaches storage through the token endpoint
    pub fn config(&self, dir: &tempfile::TempDir) -> PipelineConfig {
        PipelineConfig {
            database_url: format!("sqlite://{}?mode=rwc", dir.path().join("dumpy.db").display()),
            api_base_url: Some(self.base_url.clone()),
            probe_before_upload: true,
            ..PipelineConfig::development()
        }
    }
}

pub fn write_photo(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, JPEG_BYTES).unwrap();
    path
}

async fn put_blob(
    State(state): State<SharedState>,
    Path((container, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let mut state = state.lock().unwrap();
    if !query.contains_key("sig") {
        return (StatusCode::FORBIDDEN, "missing signature".to_string());
    }
    if state.put_status != StatusCode::CREATED {
        return (state.put_status, state.put_error_body.clone());
    }

    let header = |key: &str| {
        headers
            .get(key)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let object = StoredObject {
        container,
        name,
        blob_type: header("x-ms-blob-type"),
        content_type: header("content-type"),
        size: body.len(),
    };
    state.blobs.push(object);
    (StatusCode::CREATED, String::new())
}

async fn head_blob(State(state): State<SharedState>) -> StatusCode {
    let mut state = state.lock().unwrap();
    state.probes += 1;
    state.head_status
}

async fn get_upload_url(
    State(state): State<SharedState>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().unwrap();
    let name = query.get("file_name").cloned().unwrap_or_default();
    state.token_requests.push(name.clone());

    if state.token_status != StatusCode::OK {
        return (state.token_status, Json(json!({"error": "token service down"})));
    }

    let blob_url = format!("{}/blob/event-media/{}", state.base_url, name);
    (
        StatusCode::OK,
        Json(json!({
            "uploadUrl": format!("{}?sv=2024&sig=issued", blob_url),
            "blobUrl": blob_url,
        })),
    )
}

async fn proxy_upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let mut file_name = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            file_name = field.file_name().map(str::to_string);
            let _ = field.bytes().await.unwrap();
        }
    }

    let mut state = state.lock().unwrap();
    if state.proxy_status != StatusCode::OK {
        return (state.proxy_status, Json(json!({"error": "proxy down"})));
    }

    let name = file_name.unwrap_or_default();
    state.proxy_uploads.push(name.clone());
    let url = format!("{}/blob/proxied/{}", state.base_url, name);
    (StatusCode::OK, Json(json!({ "url": url })))
}

async fn identify(
    State(state): State<SharedState>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            files.push(field.file_name().unwrap_or_default().to_string());
            let _ = field.bytes().await.unwrap();
        }
    }

    let mut state = state.lock().unwrap();
    state.identify_queries.push(query);
    state.identify_files.extend(files);
    (state.identify_status, Json(state.identify_body.clone()))
}

async fn enroll(
    State(state): State<SharedState>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Json<Value> {
    let mut field_name = String::new();
    let mut count = 0;
    while let Some(field) = multipart.next_field().await.unwrap() {
        field_name = field.name().unwrap_or_default().to_string();
        let _ = field.bytes().await.unwrap();
        count += 1;
    }

    let mut state = state.lock().unwrap();
    let user_id = query.get("user_id").cloned().unwrap_or_default();
    state.enrollments.push((user_id, field_name, count));
    Json(state.enroll_body.clone())
}

async fn generate_slideshow(
    State(state): State<SharedState>,
    Json(request): Json<Value>,
) -> Json<Value> {
    state.lock().unwrap().slideshow_requests.push(request);
    Json(json!({
        "status": "queued",
        "message": "Slideshow generation queued",
        "job_id": "job-1",
    }))
}

async fn slideshow_status(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().unwrap();
    state.polls += 1;

    let current = if state.job_states.len() > 1 {
        state.job_states.pop_front().unwrap_or("completed")
    } else {
        state.job_states.front().copied().unwrap_or("completed")
    };

    match current {
        "500" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "status store unavailable"})),
        ),
        "completed" => (
            StatusCode::OK,
            Json(json!({
                "status": "completed",
                "message": "Slideshow ready!",
                "slideshow_url": format!("https://media.test/{}.mp4", job_id),
                "error": null,
            })),
        ),
        "failed" => (
            StatusCode::OK,
            Json(json!({
                "status": "failed",
                "message": "Rendering failed",
                "slideshow_url": null,
                "error": "no images for event",
            })),
        ),
        other => (
            StatusCode::OK,
            Json(json!({ "status": other, "message": "Working on it" })),
        ),
    }
}
