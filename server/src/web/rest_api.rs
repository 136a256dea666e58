use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::db::models::ChannelRow;
use crate::db::queries::{channels, servers};
use crate::engine::server_listing::{ListDirectives, ListingError, Principal, compose};
use crate::media::attachments::{AttachmentKind, Upload, release_files, store_upload};
use crate::media::validation::UploadError;

use super::app_state::AppState;
use super::auth_middleware::AuthUser;

impl IntoResponse for ListingError {
    fn into_response(self) -> Response {
        let status = match self {
            ListingError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ListingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match self {
            UploadError::Storage(e) => {
                error!(error = %e, "Failed to write upload to media store");
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error").into_response()
            }
            other => (StatusCode::BAD_REQUEST, other.to_string()).into_response(),
        }
    }
}

// ── Server listing ────────────────────────────────────────

/// GET /api/server/select — list servers filtered by query directives.
///
/// Directives: `category`, `with_num_members`, `by_user`, `by_owner`, `qty`,
/// `by_serverid`. Anonymous callers are allowed unless a directive needs an
/// identity.
pub async fn list_servers(
    State(state): State<Arc<AppState>>,
    auth: Option<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let directives = ListDirectives::from_query(&params);
    let principal = auth.map(|a| Principal { user_id: a.user_id });

    let base = match servers::load_listing_base(&state.db).await {
        Ok(base) => base,
        Err(e) => {
            error!(error = %e, "Failed to load servers");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response();
        }
    };

    match compose(base, &directives, principal) {
        Ok(listing) => Json(listing).into_response(),
        Err(e) => e.into_response(),
    }
}

// ── Channel media ─────────────────────────────────────────

#[derive(Serialize)]
pub struct UploadResponse {
    pub path: String,
}

/// Load a channel and check that `user_id` owns it.
async fn owned_channel(
    state: &AppState,
    channel_id: i64,
    user_id: i64,
) -> Result<ChannelRow, Response> {
    let channel = channels::get_channel(&state.db, channel_id)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to load channel");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        })?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Channel not found").into_response())?;

    if channel.owner_id != user_id {
        return Err((StatusCode::FORBIDDEN, "Only the channel owner can do that").into_response());
    }
    Ok(channel)
}

fn too_large(max_bytes: usize) -> Response {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("File too large. Max size is {} MB", max_bytes / (1024 * 1024)),
    )
        .into_response()
}

/// A body cut off by the route's size limit is a 413; any other multipart
/// failure keeps the status the extractor assigns it.
fn multipart_rejection(e: MultipartError, max_bytes: usize) -> Response {
    let status = e.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large(max_bytes);
    }
    warn!(error = %e, "Failed to read multipart upload");
    (status, e.body_text()).into_response()
}

/// Read the `file` field of a multipart upload.
async fn read_upload(multipart: &mut Multipart, max_bytes: usize) -> Result<Upload, Response> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_rejection(e, max_bytes)),
        };
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_rejection(e, max_bytes))?;
        if bytes.is_empty() {
            return Err((StatusCode::BAD_REQUEST, "Uploaded file is empty").into_response());
        }
        if bytes.len() > max_bytes {
            return Err(too_large(max_bytes));
        }
        return Ok(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Err((StatusCode::BAD_REQUEST, "No file field in upload").into_response())
}

/// Replace one media slot of a channel and persist it. The previous file of
/// the slot, if any, is released by the save.
///
/// On failure the new file, which nothing references, is released too.
async fn set_channel_media(
    state: &AppState,
    mut channel: ChannelRow,
    kind: AttachmentKind,
    path: Option<String>,
) -> Result<(), Response> {
    let has_slot = match channel.slot_mut(kind) {
        Some(slot) => {
            *slot = path.clone();
            true
        }
        None => false,
    };

    let failure = if !has_slot {
        error!(?kind, channel_id = channel.id, "Channels have no slot for this media kind");
        (StatusCode::INTERNAL_SERVER_ERROR, "Unsupported media kind").into_response()
    } else {
        match channels::save_channel(&state.db, state.store.as_ref(), &channel).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                error!(error = %e, channel_id = channel.id, "Failed to save channel media");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
            }
        }
    };

    if let Some(orphan) = path {
        release_files(state.store.as_ref(), &[orphan]).await;
    }
    Err(failure)
}

async fn upload_channel_media(
    state: Arc<AppState>,
    auth: AuthUser,
    channel_id: i64,
    mut multipart: Multipart,
    kind: AttachmentKind,
) -> Response {
    let channel = match owned_channel(&state, channel_id, auth.user_id).await {
        Ok(channel) => channel,
        Err(resp) => return resp,
    };
    let upload = match read_upload(&mut multipart, state.max_upload_bytes).await {
        Ok(upload) => upload,
        Err(resp) => return resp,
    };

    let path = match store_upload(state.store.as_ref(), kind, &upload).await {
        Ok(path) => path,
        Err(e) => return e.into_response(),
    };

    if let Err(resp) = set_channel_media(&state, channel, kind, Some(path.clone())).await {
        return resp;
    }

    info!(channel_id, path = %path, "Channel media updated");
    Json(UploadResponse { path }).into_response()
}

/// POST /api/channels/{id}/icon — upload a channel icon (max 70x70).
pub async fn upload_channel_icon(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(channel_id): Path<i64>,
    multipart: Multipart,
) -> Response {
    upload_channel_media(state, auth, channel_id, multipart, AttachmentKind::ServerIcon).await
}

/// POST /api/channels/{id}/banner — upload a channel banner.
pub async fn upload_channel_banner(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(channel_id): Path<i64>,
    multipart: Multipart,
) -> Response {
    upload_channel_media(state, auth, channel_id, multipart, AttachmentKind::ServerBanner).await
}

/// DELETE /api/channels/{id}/icon — clear a channel icon.
pub async fn clear_channel_icon(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(channel_id): Path<i64>,
) -> Response {
    clear_channel_media(state, auth, channel_id, AttachmentKind::ServerIcon).await
}

/// DELETE /api/channels/{id}/banner — clear a channel banner.
pub async fn clear_channel_banner(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(channel_id): Path<i64>,
) -> Response {
    clear_channel_media(state, auth, channel_id, AttachmentKind::ServerBanner).await
}

async fn clear_channel_media(
    state: Arc<AppState>,
    auth: AuthUser,
    channel_id: i64,
    kind: AttachmentKind,
) -> Response {
    let channel = match owned_channel(&state, channel_id, auth.user_id).await {
        Ok(channel) => channel,
        Err(resp) => return resp,
    };
    match set_channel_media(&state, channel, kind, None).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(resp) => resp,
    }
}

/// DELETE /api/channels/{id} — delete a channel and its media.
pub async fn delete_channel(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(channel_id): Path<i64>,
) -> Response {
    if let Err(resp) = owned_channel(&state, channel_id, auth.user_id).await {
        return resp;
    }
    match channels::delete_channel(&state.db, state.store.as_ref(), channel_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Channel not found").into_response(),
        Err(e) => {
            error!(error = %e, "Failed to delete channel");
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error").into_response()
        }
    }
}
