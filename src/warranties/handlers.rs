use std::collections::BTreeMap;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use time::{Date, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::jwt::AuthUser;
use crate::error::ApiError;
use crate::query::filter::{paginate, ListFilter, StatsQuery};
use crate::state::AppState;
use crate::users::repo::User;
use crate::warranties::dto::{
    NewWarranty, ShareRequest, WarrantyPatch, WarrantyStats, WarrantyView,
};
use crate::warranties::model::{grant_access, revoke_access};
use crate::warranties::repo::{self, StatsRow};

/// Same cap the previous implementation put on invoice uploads.
const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_PAGE_SIZE: i64 = 10;
const EXPIRING_WINDOW_DAYS: i64 = 30;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/warranty/:id", get(get_warranty_by_id))
        .route("/warranty/user/:added_by", get(get_all_by_user))
        .route("/warranty/user/:added_by/expiring", get(get_expiring_by_user))
        .route("/warranty/user/:added_by/stats", get(get_stats_by_user))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/warranty", post(add_warranty))
        .route("/warranty/invoice", post(upload_invoice))
        .route("/warranty/:id", put(update_warranty).delete(delete_warranty))
        .route(
            "/warranty/:id/share",
            post(share_access).delete(revoke_shared_access),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

struct InvoiceUpload {
    body: Bytes,
    content_type: String,
}

/// Collects text fields and the optional `invoiceFile` part from a
/// multipart body.
async fn read_form(
    mp: &mut Multipart,
) -> Result<(BTreeMap<String, String>, Option<InvoiceUpload>), ApiError> {
    let mut fields = BTreeMap::new();
    let mut file = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        if name == "invoiceFile" || name == "file" {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let body = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("invoice upload failed: {e}")))?;
            file = Some(InvoiceUpload { body, content_type });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::validation(format!("malformed field {name}: {e}")))?;
            fields.insert(name, value);
        }
    }
    Ok((fields, file))
}

fn ext_from_mime(ct: &str) -> &'static str {
    match ct {
        "application/pdf" => "pdf",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}

async fn store_invoice(
    state: &AppState,
    owner: Uuid,
    upload: InvoiceUpload,
) -> Result<String, ApiError> {
    let key = format!(
        "invoices/{}/{}.{}",
        owner,
        Uuid::new_v4(),
        ext_from_mime(&upload.content_type)
    );
    let url = state
        .storage
        .upload(&key, upload.body, &upload.content_type)
        .await
        .map_err(ApiError::Internal)?;
    Ok(url)
}

/// POST /warranty (multipart: fields + optional `invoiceFile`).
#[instrument(skip(state, mp))]
pub async fn add_warranty(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (fields, file) = read_form(&mut mp).await?;
    // Field validation happens before any store call.
    let new = NewWarranty::from_form(&fields)?;

    User::find_by_id(&state.db, new.added_by)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let invoice_url = match file {
        Some(upload) => Some(store_invoice(&state, new.added_by, upload).await?),
        None => None,
    };

    let warranty = repo::create(&state.db, &new, invoice_url.as_deref()).await?;
    info!(warranty_id = %warranty.id, owner = %new.added_by, "warranty added");

    let view = WarrantyView::annotate(warranty, OffsetDateTime::now_utc());
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Warranty added successfully", "warranty": view })),
    ))
}

/// POST /warranty/invoice — standalone upload, returns the durable URL.
#[instrument(skip(state, mp))]
pub async fn upload_invoice(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    mut mp: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (_fields, file) = read_form(&mut mp).await?;
    let upload = file.ok_or_else(|| ApiError::validation("invoiceFile is required"))?;
    let url = store_invoice(&state, caller, upload).await?;
    Ok(Json(json!({ "url": url })))
}

#[instrument(skip(state))]
pub async fn get_warranty_by_id(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let warranty = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Warranty not found"))?;

    let caller_email = User::find_by_id(&state.db, caller)
        .await?
        .and_then(|u| u.email);
    if !warranty.is_visible_to(caller, caller_email.as_deref()) {
        warn!(warranty_id = %id, caller = %caller, "warranty not visible to caller");
        return Err(ApiError::not_found("Warranty not found"));
    }

    let view = WarrantyView::annotate(warranty, OffsetDateTime::now_utc());
    Ok(Json(json!({ "warranty": view })))
}

fn page_param(params: &BTreeMap<String, String>, key: &str) -> Option<i64> {
    params.get(key).and_then(|v| v.parse::<i64>().ok())
}

/// GET /warranty/user/:added_by?itemName=…&category=…&startDate=…&page=…
#[instrument(skip(state, params))]
pub async fn get_all_by_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(added_by): Path<Uuid>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    User::find_by_id(&state.db, added_by)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let filter = ListFilter::from_params(&params);
    let page = paginate(
        page_param(&params, "page"),
        page_param(&params, "limit").unwrap_or(DEFAULT_PAGE_SIZE),
    );

    let now = OffsetDateTime::now_utc();
    let warranties: Vec<WarrantyView> = repo::list_by_user(&state.db, added_by, &filter, page)
        .await?
        .into_iter()
        .map(|w| WarrantyView::annotate(w, now))
        .collect();

    Ok(Json(json!({ "warranties": warranties })))
}

/// PUT /warranty/:id (multipart partial update, optional invoice replacement).
#[instrument(skip(state, mp))]
pub async fn update_warranty(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (fields, file) = read_form(&mut mp).await?;
    let patch = WarrantyPatch::from_form(&fields)?;

    let existing = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Warranty not found"))?;

    let invoice_url = match file {
        Some(upload) => Some(store_invoice(&state, existing.added_by, upload).await?),
        None => None,
    };

    let warranty = repo::update(&state.db, id, &patch, invoice_url.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("Warranty not found"))?;
    info!(warranty_id = %id, caller = %caller, "warranty updated");

    let view = WarrantyView::annotate(warranty, OffsetDateTime::now_utc());
    Ok(Json(json!({ "message": "Warranty updated successfully", "warranty": view })))
}

#[instrument(skip(state))]
pub async fn delete_warranty(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    repo::delete(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Warranty not found"))?;
    info!(warranty_id = %id, caller = %caller, "warranty deleted");
    Ok(Json(json!({ "message": "Warranty deleted successfully" })))
}

/// GET /warranty/user/:added_by/expiring — within 30 days.
#[instrument(skip(state))]
pub async fn get_expiring_by_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(added_by): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    User::find_by_id(&state.db, added_by)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let now = OffsetDateTime::now_utc();
    let warranties: Vec<WarrantyView> =
        repo::list_expiring(&state.db, added_by, now.date(), EXPIRING_WINDOW_DAYS)
            .await?
            .into_iter()
            .map(|w| WarrantyView::annotate(w, now))
            .collect();

    Ok(Json(json!({ "warranties": warranties })))
}

/// Folds projection rows into the stats payload. Pure; `today` is the
/// caller's clock.
fn summarize(rows: &[StatsRow], today: Date) -> WarrantyStats {
    let mut stats = WarrantyStats {
        total: rows.len() as i64,
        ..WarrantyStats::default()
    };
    let soon_cutoff = today + time::Duration::days(EXPIRING_WINDOW_DAYS);
    for row in rows {
        if row.expires_on >= today {
            stats.active += 1;
            if row.expires_on <= soon_cutoff {
                stats.expiring_soon += 1;
            }
        } else {
            stats.expired += 1;
        }
        *stats.by_category.entry(row.category.clone()).or_insert(0) += 1;
    }
    stats
}

/// GET /warranty/user/:added_by/stats — exact-match filters only.
#[instrument(skip(state, params))]
pub async fn get_stats_by_user(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(added_by): Path<Uuid>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    User::find_by_id(&state.db, added_by)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let query = StatsQuery::from_params(&params);
    let rows = repo::stats_rows(&state.db, added_by, &query).await?;
    let stats = summarize(&rows, OffsetDateTime::now_utc().date());

    Ok(Json(json!({ "stats": stats })))
}

/// POST /warranty/:id/share { email } — idempotent.
#[instrument(skip(state, payload))]
pub async fn share_access(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShareRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut warranty = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Warranty not found"))?;

    User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if grant_access(&mut warranty.shared_with, &payload.email) {
        repo::set_shared_with(&state.db, id, &warranty.shared_with).await?;
        info!(warranty_id = %id, caller = %caller, "access shared");
    }

    Ok(Json(json!({ "message": "Access shared successfully" })))
}

/// DELETE /warranty/:id/share { email } — idempotent.
#[instrument(skip(state, payload))]
pub async fn revoke_shared_access(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShareRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut warranty = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Warranty not found"))?;

    if revoke_access(&mut warranty.shared_with, &payload.email) {
        repo::set_shared_with(&state.db, id, &warranty.shared_with).await?;
        info!(warranty_id = %id, caller = %caller, "access revoked");
    }

    Ok(Json(json!({ "message": "Access revoked successfully" })))
}
