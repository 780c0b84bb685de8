//! Equipment, category and component handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{Json, Response},
    Extension,
};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entity::equipment::EquipmentStatus;
use crate::entity::op_log::OpType;
use crate::entity::{equipment, equipment_category, equipment_component, location};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::log_success;
use crate::handlers::{csv_download, read_upload, Page, Pagination};
use crate::middleware::auth::{perm, CurrentUser};
use crate::middleware::DbConn;
use crate::routes::ApiResponse;
use crate::service::equipment::{self as equipments, ComponentInput, EquipmentDetail, EquipmentInput};
use crate::service::import::{self, ImportSummary};
use crate::service::location as locations;
use crate::state::AppState;

fn require_view(user: &CurrentUser) -> AppResult<()> {
    if user.can_view_equipment() {
        Ok(())
    } else {
        Err(AppError::forbidden(perm::EQUIPMENT_VIEW))
    }
}

#[derive(Debug, Deserialize)]
pub struct EquipmentQuery {
    pub status: Option<String>,
    pub category_id: Option<i64>,
    pub site_id: Option<i64>,
    pub location_id: Option<i64>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// A list row with its location path and site name resolved
#[derive(Debug, Serialize)]
pub struct EquipmentRow {
    #[serde(flatten)]
    pub equipment: equipment::Model,
    pub status_display: &'static str,
    pub category: Option<String>,
    pub location_path: Option<String>,
    pub site: Option<String>,
}

/// GET /api/equipment
pub async fn list_equipment(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<EquipmentQuery>,
) -> AppResult<Json<ApiResponse<Page<EquipmentRow>>>> {
    require_view(&current_user)?;

    let mut select = equipment::Entity::find();
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status = EquipmentStatus::parse(status)
            .ok_or_else(|| AppError::validation(format!("Invalid status: {}", status)))?;
        select = select.filter(equipment::Column::Status.eq(status.as_str()));
    }
    if let Some(category) = query.category_id {
        select = select.filter(equipment::Column::CategoryId.eq(category));
    }
    if let Some(site) = query.site_id {
        let ids = equipments::ids_under(&*db, site).await?;
        select = select.filter(equipment::Column::Id.is_in(ids));
    }
    if let Some(loc) = query.location_id {
        select = select.filter(equipment::Column::LocationId.eq(loc));
    }
    if let Some(active) = query.is_active {
        select = select.filter(equipment::Column::IsActive.eq(active));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(equipment::Column::Name.contains(search))
                .add(equipment::Column::ManufacturerSerial.contains(search))
                .add(equipment::Column::AssetTag.contains(search))
                .add(equipment::Column::Manufacturer.contains(search))
                .add(equipment::Column::ModelNumber.contains(search)),
        );
    }

    let page = Pagination::new(query.page, query.page_size);
    let total = select.clone().count(&*db).await?;
    let items = select
        .order_by_asc(equipment::Column::Name)
        .offset(page.offset())
        .limit(page.limit())
        .all(&*db)
        .await?;

    let all_locations = location::Entity::find().all(&*db).await?;
    let paths = locations::path_map(&all_locations);
    let sites = locations::site_map(&all_locations);
    let names: HashMap<i64, &str> = all_locations.iter().map(|l| (l.id, l.name.as_str())).collect();
    let categories: HashMap<i64, String> = equipment_category::Entity::find()
        .all(&*db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let rows = items
        .into_iter()
        .map(|eq| EquipmentRow {
            status_display: EquipmentStatus::parse(&eq.status)
                .map(|s| s.display_name())
                .unwrap_or("Unknown"),
            category: eq.category_id.and_then(|id| categories.get(&id).cloned()),
            location_path: eq.location_id.and_then(|id| paths.get(&id).cloned()),
            site: eq
                .location_id
                .and_then(|id| sites.get(&id))
                .and_then(|site| names.get(site))
                .map(|n| n.to_string()),
            equipment: eq,
        })
        .collect();

    Ok(Json(ApiResponse::success(Page::new(rows, total, page))))
}

async fn find(db: &DbConn, id: i64) -> AppResult<equipment::Model> {
    equipment::Entity::find_by_id(id)
        .one(&**db)
        .await?
        .ok_or_not_found("Equipment not found")
}

/// GET /api/equipment/:id
pub async fn get_equipment(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<EquipmentDetail>>> {
    require_view(&current_user)?;
    let eq = find(&db, id).await?;
    Ok(Json(ApiResponse::success(equipments::detail(&*db, eq).await?)))
}

/// POST /api/equipment
pub async fn create_equipment(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<EquipmentInput>,
) -> AppResult<Json<ApiResponse<equipment::Model>>> {
    current_user.require(perm::EQUIPMENT_CREATE)?;
    let created = equipments::create(&state.db, &input, Some(current_user.id)).await?;
    state.cache.invalidate_dashboards().await;
    tracing::info!("Equipment created: {} ({})", created.name, created.manufacturer_serial);
    log_success(&current_user.username, OpType::Create, format!("equipment {}", created.name));
    Ok(Json(ApiResponse::success(created)))
}

/// PUT /api/equipment/:id
pub async fn update_equipment(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<EquipmentInput>,
) -> AppResult<Json<ApiResponse<equipment::Model>>> {
    current_user.require(perm::EQUIPMENT_EDIT)?;
    let existing = find(&db, id).await?;
    let updated = equipments::update(&state.db, existing, &input).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Update, format!("equipment {}", updated.name));
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/equipment/:id
///
/// Activities, schedules, events and components go with it.
pub async fn delete_equipment(
    State(state): State<AppState>,
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require(perm::EQUIPMENT_DELETE)?;
    let existing = find(&db, id).await?;
    equipments::delete(&state.db, id).await?;
    state.cache.invalidate_dashboards().await;
    tracing::info!("Equipment deleted: {}", existing.name);
    log_success(&current_user.username, OpType::Delete, format!("equipment {}", existing.name));
    Ok(Json(ApiResponse::success_msg("Equipment deleted")))
}

/// GET /api/equipment/categories
pub async fn list_categories(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<equipment_category::Model>>>> {
    require_view(&current_user)?;
    let all = equipment_category::Entity::find()
        .order_by_asc(equipment_category::Column::Name)
        .all(&*db)
        .await?;
    Ok(Json(ApiResponse::success(all)))
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

/// POST /api/equipment/categories
///
/// Returns the existing category when the name is taken.
pub async fn create_category(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<CategoryRequest>,
) -> AppResult<Json<ApiResponse<equipment_category::Model>>> {
    current_user.require(perm::EQUIPMENT_CREATE)?;
    let name = req.name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(AppError::validation("Category name is required (at most 100 characters)"));
    }
    let (category, created) = equipments::get_or_create_category(&*db, name).await?;
    if created {
        log_success(&current_user.username, OpType::Create, format!("category {}", category.name));
    }
    Ok(Json(ApiResponse::success(category)))
}

/// POST /api/equipment/:id/components
pub async fn add_component(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<ComponentInput>,
) -> AppResult<Json<ApiResponse<equipment_component::Model>>> {
    current_user.require(perm::EQUIPMENT_EDIT)?;
    let eq = find(&db, id).await?;
    let created = equipments::save_component(&*db, eq.id, None, &input).await?;
    log_success(
        &current_user.username,
        OpType::Create,
        format!("component {} on {}", created.name, eq.name),
    );
    Ok(Json(ApiResponse::success(created)))
}

async fn find_component(db: &DbConn, equipment_id: i64, id: i64) -> AppResult<equipment_component::Model> {
    equipment_component::Entity::find_by_id(id)
        .filter(equipment_component::Column::EquipmentId.eq(equipment_id))
        .one(&**db)
        .await?
        .ok_or_not_found("Component not found")
}

/// PUT /api/equipment/:id/components/:component_id
pub async fn update_component(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, component_id)): Path<(i64, i64)>,
    Json(input): Json<ComponentInput>,
) -> AppResult<Json<ApiResponse<equipment_component::Model>>> {
    current_user.require(perm::EQUIPMENT_EDIT)?;
    let existing = find_component(&db, id, component_id).await?;
    let updated = equipments::save_component(&*db, id, Some(existing), &input).await?;
    log_success(&current_user.username, OpType::Update, format!("component {}", updated.name));
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/equipment/:id/components/:component_id
pub async fn delete_component(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path((id, component_id)): Path<(i64, i64)>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require(perm::EQUIPMENT_EDIT)?;
    let existing = find_component(&db, id, component_id).await?;
    equipment_component::Entity::delete_by_id(existing.id).exec(&*db).await?;
    log_success(&current_user.username, OpType::Delete, format!("component {}", existing.name));
    Ok(Json(ApiResponse::success_msg("Component deleted")))
}

/// GET /api/equipment/export
pub async fn export_equipment(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Response> {
    require_view(&current_user)?;
    let data = import::export_equipment(&*db).await?;
    log_success(&current_user.username, OpType::Export, "equipment");
    Ok(csv_download("equipment.csv", data))
}

/// POST /api/equipment/import
pub async fn import_equipment(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<ImportSummary>>> {
    current_user.require(perm::EQUIPMENT_CREATE)?;
    let data = read_upload(multipart, state.config.upload.max_csv_size).await?;
    let summary = import::import_equipment(&state.db, &data, Some(current_user.id)).await?;
    state.cache.invalidate_dashboards().await;
    tracing::info!(
        "Equipment import by {}: {} imported, {} rows with errors",
        current_user.username,
        summary.imported,
        summary.error_rows
    );
    log_success(
        &current_user.username,
        OpType::Import,
        format!("equipment: {} imported, {} errors", summary.imported, summary.error_rows),
    );
    Ok(Json(ApiResponse::success(summary)))
}
