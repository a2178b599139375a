use crate::{
    auth::AuthUser,
    entities::manifest,
    errors::ServiceError,
    handlers::common::{parse_enum_param, PaginationParams},
    handlers::deliveries::ShipmentSummary,
    services::manifests::{ManifestFilter, ManifestRowView, UploadManifestRequest},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ManifestListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Status filter (READY, BLOCKED, IMPORTED)
    pub status: Option<String>,
    /// Restrict to manifests destined for one warehouse
    pub warehouse_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "c7a90c2e-4f11-4b79-9a2f-b7a3f2a7d001",
    "file_name": "november-batch-3.xlsx",
    "agent_name": "Golden Cargo Manila",
    "shipping_mode": "SEA",
    "row_count": 140,
    "blocked_row_count": 0,
    "status": "READY"
}))]
pub struct ManifestSummary {
    pub id: Uuid,
    #[schema(example = "november-batch-3.xlsx")]
    pub file_name: String,
    pub agent_name: String,
    pub origin: Option<String>,
    pub shipping_mode: String,
    pub warehouse_id: Uuid,
    pub row_count: i32,
    /// Rows whose receiver address failed gazetteer validation
    pub blocked_row_count: i32,
    #[schema(example = "READY")]
    pub status: String,
    /// Incoming shipment created by the import, once it has run
    pub shipment_id: Option<Uuid>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<manifest::Model> for ManifestSummary {
    fn from(model: manifest::Model) -> Self {
        Self {
            id: model.id,
            file_name: model.file_name,
            agent_name: model.agent_name,
            origin: model.origin,
            shipping_mode: model.shipping_mode.to_string(),
            warehouse_id: model.warehouse_id,
            row_count: model.row_count,
            blocked_row_count: model.blocked_row_count,
            status: model.status.to_string(),
            shipment_id: model.shipment_id,
            uploaded_by: model.uploaded_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Manifest with its stored rows, decoded payloads and per-row address
/// errors for the detail screen.
#[derive(Debug, Serialize, ToSchema)]
pub struct ManifestDetail {
    pub manifest: ManifestSummary,
    pub rows: Vec<ManifestRowView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ManifestImportResult {
    pub manifest: ManifestSummary,
    pub shipment: ShipmentSummary,
}

/// Multipart form for manifest upload, documented for the OpenAPI
/// schema; the handler reads the fields off the stream.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadManifestForm {
    /// Spreadsheet file (.csv or .xlsx)
    #[schema(value_type = String, format = Binary)]
    pub file: String,
    #[schema(example = "Golden Cargo Manila")]
    pub agent_name: String,
    /// Free-text origin port or city
    pub origin: Option<String>,
    /// AIR or SEA
    #[schema(example = "SEA")]
    pub shipping_mode: String,
    /// Destination warehouse UUID
    pub warehouse_id: String,
}

/// Decoded multipart payload: the file plus whatever metadata fields
/// came with it. Replace-file only sends the file.
struct UploadedFile {
    file_name: String,
    bytes: Vec<u8>,
    agent_name: Option<String>,
    origin: Option<String>,
    shipping_mode: Option<String>,
    warehouse_id: Option<Uuid>,
}

impl UploadedFile {
    /// Metadata fields as an upload request; first upload requires them.
    fn into_meta(self) -> Result<(String, Vec<u8>, UploadManifestRequest), ServiceError> {
        let agent_name = self
            .agent_name
            .ok_or_else(|| ServiceError::InvalidInput("missing agent_name field".to_string()))?;
        let shipping_mode = self
            .shipping_mode
            .ok_or_else(|| ServiceError::InvalidInput("missing shipping_mode field".to_string()))?;
        let warehouse_id = self
            .warehouse_id
            .ok_or_else(|| ServiceError::InvalidInput("missing warehouse_id field".to_string()))?;

        let request = UploadManifestRequest {
            agent_name,
            origin: self.origin,
            shipping_mode: parse_enum_param(&shipping_mode, "shipping_mode")?,
            warehouse_id,
        };
        Ok((self.file_name, self.bytes, request))
    }
}

/// Pulls the file and metadata fields out of a multipart stream. The
/// precise size cap comes from configuration and is enforced here; the
/// route layer only carries a coarse static ceiling.
async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<UploadedFile, ServiceError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut agent_name: Option<String> = None;
    let mut origin: Option<String> = None;
    let mut shipping_mode: Option<String> = None;
    let mut warehouse_id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidInput(format!("malformed multipart body: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| {
                        ServiceError::InvalidInput("file field has no file name".to_string())
                    })?;
                let bytes = field.bytes().await.map_err(|e| {
                    ServiceError::InvalidInput(format!("failed to read file: {}", e))
                })?;
                if bytes.len() > max_bytes {
                    return Err(ServiceError::InvalidInput(format!(
                        "file is {} bytes, the limit is {}",
                        bytes.len(),
                        max_bytes
                    )));
                }
                file = Some((file_name, bytes.to_vec()));
            }
            "agent_name" => agent_name = Some(read_text(field).await?),
            "origin" => {
                let text = read_text(field).await?;
                if !text.trim().is_empty() {
                    origin = Some(text);
                }
            }
            "shipping_mode" => shipping_mode = Some(read_text(field).await?),
            "warehouse_id" => {
                let text = read_text(field).await?;
                let id = Uuid::parse_str(text.trim()).map_err(|_| {
                    ServiceError::InvalidInput(format!("invalid warehouse_id: '{}'", text))
                })?;
                warehouse_id = Some(id);
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ServiceError::InvalidInput("missing file field".to_string()))?;

    Ok(UploadedFile {
        file_name,
        bytes,
        agent_name,
        origin,
        shipping_mode,
        warehouse_id,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ServiceError> {
    field
        .text()
        .await
        .map_err(|e| ServiceError::InvalidInput(format!("failed to read form field: {}", e)))
}

#[utoipa::path(
    get,
    path = "/api/v1/manifests",
    params(ManifestListQuery),
    responses(
        (status = 200, description = "Manifests listed", body = ApiResponse<PaginatedResponse<ManifestSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "manifests"
)]
pub async fn list_manifests(
    State(state): State<AppState>,
    Query(query): Query<ManifestListQuery>,
) -> ApiResult<PaginatedResponse<ManifestSummary>> {
    let (page, per_page) = PaginationParams {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }
    .clamped();

    let status = query
        .status
        .as_deref()
        .map(|raw| parse_enum_param(raw, "status"))
        .transpose()?;

    let filter = ManifestFilter {
        status,
        warehouse_id: query.warehouse_id,
    };

    let (records, total) = state
        .manifest_service()
        .list(filter, page, per_page)
        .await?;
    let items: Vec<ManifestSummary> = records.into_iter().map(ManifestSummary::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, per_page,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/manifests/{id}",
    params(("id" = Uuid, Path, description = "Manifest ID")),
    responses(
        (status = 200, description = "Manifest with rows", body = ApiResponse<ManifestDetail>),
        (status = 404, description = "Manifest not found", body = crate::errors::ErrorResponse)
    ),
    tag = "manifests"
)]
pub async fn get_manifest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ManifestDetail> {
    let (model, rows) = state.manifest_service().get(id).await?;
    Ok(Json(ApiResponse::success(ManifestDetail {
        manifest: ManifestSummary::from(model),
        rows,
    })))
}

/// Uploads an agent manifest. The whole file is rejected on any schema
/// failure (422 with per-row errors); rows with unserved receiver
/// addresses are stored and mark the manifest BLOCKED.
#[utoipa::path(
    post,
    path = "/api/v1/manifests",
    request_body(content = UploadManifestForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Manifest stored", body = ApiResponse<ManifestSummary>),
        (status = 400, description = "Unreadable file or missing fields", body = crate::errors::ErrorResponse),
        (status = 422, description = "Schema validation failed", body = crate::errors::ErrorResponse)
    ),
    tag = "manifests"
)]
pub async fn upload_manifest(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    multipart: Multipart,
) -> ApiResult<ManifestSummary> {
    let upload = read_upload(multipart, state.config.manifest_max_bytes).await?;
    let (file_name, bytes, request) = upload.into_meta()?;
    let created = state
        .manifest_service()
        .upload(file_name, &bytes, request, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(ManifestSummary::from(created))))
}

/// Swaps in a corrected file for an unimported manifest. Stored rows
/// are replaced wholesale and the manifest re-scored.
#[utoipa::path(
    put,
    path = "/api/v1/manifests/{id}/file",
    params(("id" = Uuid, Path, description = "Manifest ID")),
    request_body(content = UploadManifestForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File replaced and re-scored", body = ApiResponse<ManifestSummary>),
        (status = 400, description = "Already imported or unreadable file", body = crate::errors::ErrorResponse),
        (status = 404, description = "Manifest not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Schema validation failed", body = crate::errors::ErrorResponse)
    ),
    tag = "manifests"
)]
pub async fn replace_manifest_file(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<ManifestSummary> {
    let upload = read_upload(multipart, state.config.manifest_max_bytes).await?;
    let updated = state
        .manifest_service()
        .replace_file(id, upload.file_name, &upload.bytes, actor.user_id)
        .await?;
    Ok(Json(ApiResponse::success(ManifestSummary::from(updated))))
}

/// Imports a READY manifest: one incoming shipment plus one INCOMING
/// package per row, created in a single transaction.
#[utoipa::path(
    post,
    path = "/api/v1/manifests/{id}/import",
    params(("id" = Uuid, Path, description = "Manifest ID")),
    responses(
        (status = 200, description = "Manifest imported", body = ApiResponse<ManifestImportResult>),
        (status = 400, description = "Manifest has blocked rows", body = crate::errors::ErrorResponse),
        (status = 404, description = "Manifest not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already imported or tracking number taken", body = crate::errors::ErrorResponse)
    ),
    tag = "manifests"
)]
pub async fn import_manifest(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<ManifestImportResult> {
    let (manifest, shipment) = state.manifest_service().import(id, actor.user_id).await?;
    Ok(Json(ApiResponse::success(ManifestImportResult {
        manifest: ManifestSummary::from(manifest),
        shipment: ShipmentSummary::from(shipment),
    })))
}
