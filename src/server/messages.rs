//! Contact messages: the public contact form and the admin inbox.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::Identity;
use crate::storage::{self, Document};

pub const MESSAGES_COLLECTION: &str = "messages";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Document for ContactMessage {
    fn id(&self) -> &str { &self.id }
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

impl ContactRequest {
    fn is_complete(&self) -> bool {
        [&self.name, &self.email, &self.message].iter().all(|f| !f.trim().is_empty())
    }
}

fn not_found() -> AppError { AppError::not_found("message_not_found", "Message not found") }

pub async fn create(State(state): State<AppState>, payload: Result<Json<ContactRequest>, JsonRejection>) -> AppResult<impl IntoResponse> {
    let req = payload.map(|Json(r)| r).unwrap_or_default();
    if !req.is_complete() {
        return Err(AppError::user("validation", "All fields are required"));
    }
    let doc = ContactMessage {
        id: uuid::Uuid::new_v4().to_string(),
        name: req.name,
        email: req.email,
        message: req.message,
        read: false,
        created_at: Utc::now(),
    };
    let messages = state.messages.clone();
    let msg = storage::blocking(move || messages.insert(doc)).await??;
    info!(target: "folio::server", message_id = %msg.id, "contact message received");
    Ok((StatusCode::CREATED, Json(json!({"success": true, "message": "Message sent successfully", "data": msg}))))
}

/// Newest first; equal timestamps keep most-recently-inserted first.
pub async fn list(State(state): State<AppState>, _admin: Identity) -> impl IntoResponse {
    let mut all = state.messages.all();
    all.reverse();
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(json!({"success": true, "count": all.len(), "data": all}))
}

pub async fn unread_count(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"success": true, "count": state.messages.count_where(|m| !m.read)}))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    let msg = state.messages.find_by_id(&id).ok_or_else(not_found)?;
    Ok(Json(json!({"success": true, "data": msg})))
}

pub async fn mark_read(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    let messages = state.messages.clone();
    let msg = storage::blocking(move || messages.update(&id, |m| m.read = true)).await??.ok_or_else(not_found)?;
    Ok(Json(json!({"success": true, "data": msg})))
}

pub async fn delete(State(state): State<AppState>, admin: Identity, Path(id): Path<String>) -> AppResult<impl IntoResponse> {
    let (messages, target) = (state.messages.clone(), id.clone());
    storage::blocking(move || messages.delete(&target)).await??.ok_or_else(not_found)?;
    info!(target: "folio::server", message_id = %id, user_id = %admin.user.id, "contact message deleted");
    Ok(Json(json!({"success": true, "message": "Message deleted successfully"})))
}
