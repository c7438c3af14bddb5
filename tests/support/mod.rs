#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct FakeState {
    base_url: String,
    objects: HashMap<String, StoredUpload>,
    next_id: u64,
    deleted: Vec<String>,
    saved: Vec<(String, Value)>,
    cookies: Vec<String>,
    fail_upload: bool,
    fail_delete: bool,
    reject_entity: bool,
}

/// In-process stand-in for the portfolio API (storage + entity endpoints)
#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeApi {
    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn base_url(&self) -> String {
        self.lock().base_url.clone()
    }

    pub fn object(&self, url: &str) -> Option<StoredUpload> {
        self.lock().objects.get(url).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    /// (path, JSON body) of every entity create/update
    pub fn saved(&self) -> Vec<(String, Value)> {
        self.lock().saved.clone()
    }

    pub fn cookies(&self) -> Vec<String> {
        self.lock().cookies.clone()
    }

    pub fn seed(&self, name: &str, data: Vec<u8>) -> String {
        let mut state = self.lock();
        let url = format!("{}/uploads/{}", state.base_url, name);
        state.objects.insert(
            url.clone(),
            StoredUpload {
                file_name: Some(name.to_string()),
                content_type: Some("image/png".to_string()),
                data,
            },
        );
        url
    }

    pub fn fail_upload(&self, fail: bool) {
        self.lock().fail_upload = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.lock().fail_delete = fail;
    }

    pub fn reject_entity(&self, reject: bool) {
        self.lock().reject_entity = reject;
    }
}

fn record_cookie(api: &FakeApi, headers: &HeaderMap) {
    if let Some(cookie) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        api.lock().cookies.push(cookie.to_string());
    }
}

async fn upload_image(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    record_cookie(&api, &headers);

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.unwrap().to_vec();
            upload = Some(StoredUpload {
                file_name,
                content_type,
                data,
            });
        }
    }

    let mut state = api.lock();
    if state.fail_upload {
        return (StatusCode::INTERNAL_SERVER_ERROR, "disk full").into_response();
    }
    let Some(upload) = upload else {
        return (StatusCode::BAD_REQUEST, "missing file field").into_response();
    };

    state.next_id += 1;
    let url = format!("{}/uploads/{}.jpg", state.base_url, state.next_id);
    state.objects.insert(url.clone(), upload);
    Json(json!({ "image_url": url })).into_response()
}

async fn delete_image(State(api): State<FakeApi>, Json(body): Json<Value>) -> Response {
    let url = body["image_url"].as_str().unwrap_or_default().to_string();
    let mut state = api.lock();
    state.deleted.push(url.clone());

    if state.fail_delete {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "storage offline" })),
        )
            .into_response();
    }

    // Deleting a missing object is not an error
    state.objects.remove(&url);
    StatusCode::NO_CONTENT.into_response()
}

async fn serve_upload(State(api): State<FakeApi>, Path(name): Path<String>) -> Response {
    let state = api.lock();
    let url = format!("{}/uploads/{}", state.base_url, name);
    match state.objects.get(&url) {
        Some(object) => (
            [(
                header::CONTENT_TYPE,
                object
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "image/jpeg".to_string()),
            )],
            object.data.clone(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn html_page() -> Response {
    (
        [(header::CONTENT_TYPE, "text/html")],
        "<html><body>login required</body></html>",
    )
        .into_response()
}

async fn save_entity(api: FakeApi, path: String, headers: HeaderMap, body: Value) -> Response {
    record_cookie(&api, &headers);
    let mut state = api.lock();
    if state.reject_entity {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "title is required" })),
        )
            .into_response();
    }
    state.saved.push((path, body));
    Json(json!({ "ok": true })).into_response()
}

async fn create_article(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    save_entity(api, "/articles".to_string(), headers, body).await
}

async fn update_article(
    State(api): State<FakeApi>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    save_entity(api, format!("/article/{}", slug), headers, body).await
}

async fn update_product(
    State(api): State<FakeApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    save_entity(api, format!("/product/{}", id), headers, body).await
}

async fn update_about(
    State(api): State<FakeApi>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    save_entity(api, format!("/about/{}", id), headers, body).await
}

/// Binds the fake API on an ephemeral port
pub async fn spawn_api() -> FakeApi {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let api = FakeApi::default();
    api.lock().base_url = format!("http://{}", listener.local_addr().unwrap());

    let app = Router::new()
        .route("/image", post(upload_image).delete(delete_image))
        .route("/uploads/:name", get(serve_upload))
        .route("/page.html", get(html_page))
        .route("/articles", post(create_article))
        .route("/article/:slug", patch(update_article))
        .route("/product/:id", patch(update_product))
        .route("/about/:id", patch(update_about))
        .with_state(api.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    api
}

/// Encodes a solid-colour PNG of the given size
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

/// Writes a PNG to a temp file, standing in for the file picker
pub fn picked_file(width: u32, height: u32, rgb: [u8; 3]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    file.write_all(&png_bytes(width, height, rgb)).unwrap();
    file
}
