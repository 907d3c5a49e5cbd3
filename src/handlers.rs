use crate::{
    db::{self, Document, ID_FIELD},
    error::AppError,
    models::{
        timestamp, CenterInfo, ContactMessage, Created, Event, GalleryImage, ListParams, Validate,
    },
    state::AppState,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

pub const EVENT_COLLECTION: &str = "event";
pub const GALLERY_COLLECTION: &str = "galleryimage";
pub const CONTACT_COLLECTION: &str = "contactmessage";

pub const DEFAULT_EVENT_LIMIT: u32 = 100;
pub const DEFAULT_GALLERY_LIMIT: u32 = 50;

const MAX_LISTED_COLLECTIONS: usize = 10;
const MAX_ERROR_CHARS: usize = 50;

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Ješenca-Požeg Community Center API" }))
}

#[derive(Debug, Serialize)]
pub struct Diagnostics {
    backend: &'static str,
    database: String,
    database_url: &'static str,
    database_name: &'static str,
    connection_status: &'static str,
    collections: Vec<String>,
}

fn truncated(err: &AppError) -> String {
    err.to_string().chars().take(MAX_ERROR_CHARS).collect()
}

fn presence(set: bool) -> &'static str {
    if set { "✅ Set" } else { "❌ Not Set" }
}

/// Reports storage and configuration status. Always answers 200.
pub async fn diagnostics(State(app_state): State<AppState>) -> Json<Diagnostics> {
    let mut report = Diagnostics {
        backend: "✅ Running",
        database: "⚠️  Available but not initialized".to_string(),
        database_url: presence(app_state.database_url_set),
        database_name: presence(app_state.database_name_set),
        connection_status: "Not Connected",
        collections: Vec::new(),
    };

    if let Some(db) = &app_state.db {
        report.connection_status = "Connected";
        match db.list_collection_names().await {
            Ok(mut names) => {
                names.truncate(MAX_LISTED_COLLECTIONS);
                report.collections = names;
                report.database = "✅ Connected & Working".to_string();
            }
            Err(e) => {
                tracing::warn!(error = %e, "collection listing failed");
                report.database = format!("⚠️  Connected but Error: {}", truncated(&e));
            }
        }
    }

    Json(report)
}

pub async fn get_center_info(State(app_state): State<AppState>) -> Json<CenterInfo> {
    Json(CenterInfo::clone(&app_state.info))
}

fn created(id: String, message: &str) -> (StatusCode, Json<Created>) {
    (
        StatusCode::CREATED,
        Json(Created {
            id,
            message: message.to_string(),
        }),
    )
}

/// Moves the store's `_id` to a text `id` field.
fn normalize_id(mut document: Document) -> Document {
    if let Some(raw) = document.remove(ID_FIELD) {
        let id = match raw {
            Value::String(s) => s,
            other => other.to_string(),
        };
        document.insert("id".to_string(), Value::String(id));
    }
    document
}

fn start_of(event: &Document) -> Option<DateTime<Utc>> {
    event.get("start").and_then(Value::as_str).and_then(timestamp::parse)
}

/// Orders events by ascending `start`. Leaves the list untouched if any
/// event has no parseable `start`.
fn sort_by_start(events: &mut Vec<Document>) {
    let Some(keys) = events.iter().map(start_of).collect::<Option<Vec<_>>>() else {
        tracing::debug!("event without a comparable start, returning storage order");
        return;
    };
    let mut keyed: Vec<(DateTime<Utc>, Document)> =
        keys.into_iter().zip(events.drain(..)).collect();
    keyed.sort_by_key(|(start, _)| *start);
    events.extend(keyed.into_iter().map(|(_, event)| event));
}

pub async fn create_event(
    State(app_state): State<AppState>,
    payload: Result<Json<Event>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    let Json(event) = payload?;
    event.validate()?;
    let id = db::create_document(app_state.db()?, EVENT_COLLECTION, &event).await?;
    tracing::info!(%id, title = %event.title, "event created");
    Ok(created(id, "Event created"))
}

pub async fn list_events(
    State(app_state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Document>>, AppError> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    let mut events: Vec<Document> =
        db::get_documents(app_state.db()?, EVENT_COLLECTION, &Document::new(), limit)
            .await?
            .into_iter()
            .map(normalize_id)
            .collect();
    sort_by_start(&mut events);
    Ok(Json(events))
}

pub async fn add_image(
    State(app_state): State<AppState>,
    payload: Result<Json<GalleryImage>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    let Json(image) = payload?;
    image.validate()?;
    let id = db::create_document(app_state.db()?, GALLERY_COLLECTION, &image).await?;
    tracing::info!(%id, url = %image.url, "gallery image added");
    Ok(created(id, "Image added"))
}

pub async fn get_gallery(
    State(app_state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Document>>, AppError> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_GALLERY_LIMIT);
    let images =
        db::get_documents(app_state.db()?, GALLERY_COLLECTION, &Document::new(), limit)
            .await?
            .into_iter()
            .map(normalize_id)
            .collect();
    Ok(Json(images))
}

pub async fn send_message(
    State(app_state): State<AppState>,
    payload: Result<Json<ContactMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    let Json(msg) = payload?;
    msg.validate()?;
    let id = db::create_document(app_state.db()?, CONTACT_COLLECTION, &msg).await?;
    tracing::info!(%id, "contact message received");
    Ok(created(id, "Message received"))
}
