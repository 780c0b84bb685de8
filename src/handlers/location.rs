//! Location, site and customer handlers

use axum::{
    extract::{Multipart, Path, Query, State},
    response::{Json, Response},
    Extension,
};
use sea_orm::{
    sea_query::Expr, ColumnTrait, Condition, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde::Deserialize;

use crate::entity::op_log::OpType;
use crate::entity::{customer, location};
use crate::error::{AppError, AppResult, OptionExt};
use crate::handlers::audit::service::log_success;
use crate::handlers::{csv_download, read_upload, Page, Pagination};
use crate::middleware::auth::{perm, CurrentUser};
use crate::middleware::DbConn;
use crate::routes::ApiResponse;
use crate::service::import::{self, ImportSummary};
use crate::service::location::{self as locations, CustomerInput, LocationDetail, LocationInput, PodSummary};
use crate::state::AppState;

fn require_manage(user: &CurrentUser) -> AppResult<()> {
    if user.can_manage_equipment() {
        Ok(())
    } else {
        Err(AppError::forbidden(perm::EQUIPMENT_EDIT))
    }
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    #[serde(default)]
    pub site_only: bool,
    pub parent_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// GET /api/locations
pub async fn list_locations(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<LocationQuery>,
) -> AppResult<Json<ApiResponse<Page<location::Model>>>> {
    current_user.require(perm::EQUIPMENT_VIEW)?;

    let mut select = location::Entity::find();
    if query.site_only {
        select = select.filter(location::Column::IsSite.eq(true));
    }
    if let Some(parent) = query.parent_id {
        select = select.filter(location::Column::ParentId.eq(parent));
    }
    if let Some(customer) = query.customer_id {
        select = select.filter(location::Column::CustomerId.eq(customer));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(location::Column::Name.contains(search))
                .add(location::Column::Address.contains(search)),
        );
    }

    let page = Pagination::new(query.page, query.page_size);
    let total = select.clone().count(&*db).await?;
    let items = select
        .order_by_asc(location::Column::Name)
        .offset(page.offset())
        .limit(page.limit())
        .all(&*db)
        .await?;
    Ok(Json(ApiResponse::success(Page::new(items, total, page))))
}

/// GET /api/locations/tree
pub async fn location_tree(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<location::LocationTree>>>> {
    current_user.require(perm::EQUIPMENT_VIEW)?;
    let all = location::Entity::find().all(&*db).await?;
    Ok(Json(ApiResponse::success(locations::build_tree(all))))
}

/// GET /api/sites
pub async fn list_sites(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<location::Model>>>> {
    current_user.require(perm::EQUIPMENT_VIEW)?;
    let sites = location::Entity::find()
        .filter(location::Column::IsSite.eq(true))
        .filter(location::Column::IsActive.eq(true))
        .order_by_asc(location::Column::Name)
        .all(&*db)
        .await?;
    Ok(Json(ApiResponse::success(sites)))
}

/// GET /api/locations/:id
pub async fn get_location(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<LocationDetail>>> {
    current_user.require(perm::EQUIPMENT_VIEW)?;
    let loc = location::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_not_found("Location not found")?;
    Ok(Json(ApiResponse::success(locations::detail(&*db, loc).await?)))
}

/// POST /api/locations
pub async fn create_location(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<LocationInput>,
) -> AppResult<Json<ApiResponse<location::Model>>> {
    require_manage(&current_user)?;
    let created = locations::create(&state.db, &input).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Create, format!("location {}", created.name));
    Ok(Json(ApiResponse::success(created)))
}

/// PUT /api/locations/:id
pub async fn update_location(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<LocationInput>,
) -> AppResult<Json<ApiResponse<location::Model>>> {
    require_manage(&current_user)?;
    let existing = location::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("Location not found")?;
    let updated = locations::update(&state.db, existing, &input).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Update, format!("location {}", updated.name));
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/locations/:id
pub async fn delete_location(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require(perm::EQUIPMENT_DELETE)?;
    let existing = location::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("Location not found")?;
    locations::ensure_deletable(&state.db, id).await?;
    location::Entity::delete_by_id(id).exec(&state.db).await?;
    state.cache.invalidate_dashboards().await;
    log_success(&current_user.username, OpType::Delete, format!("location {}", existing.name));
    Ok(Json(ApiResponse::success_msg("Location deleted")))
}

#[derive(Debug, Deserialize)]
pub struct GeneratePodsRequest {
    #[serde(default = "default_pod_count")]
    pub pod_count: u32,
    #[serde(default = "default_mdcs")]
    pub mdcs_per_pod: u32,
    #[serde(default)]
    pub force: bool,
}

fn default_pod_count() -> u32 {
    11
}

fn default_mdcs() -> u32 {
    2
}

/// POST /api/locations/generate-pods
pub async fn generate_pods(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<GeneratePodsRequest>,
) -> AppResult<Json<ApiResponse<PodSummary>>> {
    current_user.require(perm::ADMIN_FULL_ACCESS)?;
    let summary = locations::generate_pods(&state.db, req.pod_count, req.mdcs_per_pod, req.force).await?;
    state.cache.invalidate_dashboards().await;
    log_success(
        &current_user.username,
        OpType::Generate,
        format!(
            "pods: {} sites, {} pods, {} mdcs",
            summary.sites, summary.pods_created, summary.mdcs_created
        ),
    );
    Ok(Json(ApiResponse::success(summary)))
}

/// GET /api/locations/export
pub async fn export_locations(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Response> {
    current_user.require(perm::EQUIPMENT_VIEW)?;
    let data = import::export_locations(&*db).await?;
    log_success(&current_user.username, OpType::Export, "locations");
    Ok(csv_download("locations.csv", data))
}

/// POST /api/locations/import
pub async fn import_locations(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<ImportSummary>>> {
    require_manage(&current_user)?;
    let data = read_upload(multipart, state.config.upload.max_csv_size).await?;
    let summary = import::import_locations(&state.db, &data).await?;
    state.cache.invalidate_dashboards().await;
    log_success(
        &current_user.username,
        OpType::Import,
        format!("locations: {} imported", summary.imported),
    );
    Ok(Json(ApiResponse::success(summary)))
}

/// GET /api/customers
pub async fn list_customers(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<customer::Model>>>> {
    current_user.require(perm::EQUIPMENT_VIEW)?;
    let all = customer::Entity::find()
        .order_by_asc(customer::Column::Name)
        .all(&*db)
        .await?;
    Ok(Json(ApiResponse::success(all)))
}

/// GET /api/customers/:id
pub async fn get_customer(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<customer::Model>>> {
    current_user.require(perm::EQUIPMENT_VIEW)?;
    let found = customer::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_not_found("Customer not found")?;
    Ok(Json(ApiResponse::success(found)))
}

/// POST /api/customers
pub async fn create_customer(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<CustomerInput>,
) -> AppResult<Json<ApiResponse<customer::Model>>> {
    require_manage(&current_user)?;
    let created = locations::save_customer(&*db, None, &input).await?;
    log_success(&current_user.username, OpType::Create, format!("customer {}", created.name));
    Ok(Json(ApiResponse::success(created)))
}

/// PUT /api/customers/:id
pub async fn update_customer(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<CustomerInput>,
) -> AppResult<Json<ApiResponse<customer::Model>>> {
    require_manage(&current_user)?;
    let existing = customer::Entity::find_by_id(id)
        .one(&*db)
        .await?
        .ok_or_not_found("Customer not found")?;
    let updated = locations::save_customer(&*db, Some(existing), &input).await?;
    log_success(&current_user.username, OpType::Update, format!("customer {}", updated.name));
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/customers/:id
///
/// Locations that pointed at the customer are kept and lose the link.
pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.require(perm::EQUIPMENT_DELETE)?;
    let existing = customer::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_not_found("Customer not found")?;

    location::Entity::update_many()
        .col_expr(location::Column::CustomerId, Expr::value(Option::<i64>::None))
        .filter(location::Column::CustomerId.eq(id))
        .exec(&state.db)
        .await?;
    customer::Entity::delete_by_id(id).exec(&state.db).await?;
    state.cache.invalidate_dashboards().await;

    log_success(&current_user.username, OpType::Delete, format!("customer {}", existing.name));
    Ok(Json(ApiResponse::success_msg("Customer deleted")))
}
