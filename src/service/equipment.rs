//! Equipment inventory rules

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use crate::entity::equipment::EquipmentStatus;
use crate::entity::maintenance_activity::{self, ActivityStatus};
use crate::entity::{
    calendar_event, checklist_item, equipment, equipment_category, equipment_component,
    event_comment, location, maintenance_schedule, now_ts,
};
use crate::error::{AppError, AppResult};
use crate::service::{activity, location as locations, today};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_SERIAL_LEN: usize = 100;

/// Fields accepted when creating or updating equipment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EquipmentInput {
    pub name: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    pub manufacturer_serial: String,
    /// `AUTO_<serial>` when empty
    #[serde(default)]
    pub asset_tag: String,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model_number: String,
    #[serde(default)]
    pub power_ratings: String,
    #[serde(default)]
    pub trip_setpoints: String,
    #[serde(default)]
    pub installed_upgrades: String,
    #[serde(default)]
    pub warranty_details: String,
    #[serde(default)]
    pub dga_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub next_maintenance_date: Option<NaiveDate>,
    #[serde(default)]
    pub commissioning_date: Option<NaiveDate>,
    #[serde(default)]
    pub warranty_expiry_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Equipment with the values computed from related rows
#[derive(Debug, Clone, Serialize)]
pub struct EquipmentDetail {
    #[serde(flatten)]
    pub equipment: equipment::Model,
    pub status_display: &'static str,
    pub category: Option<String>,
    pub location_path: Option<String>,
    pub site: Option<location::Model>,
    pub maintenance_status: String,
    pub last_maintenance_date: Option<i64>,
    pub components: Vec<equipment_component::Model>,
    pub recent_activities: Vec<maintenance_activity::Model>,
    pub upcoming_events: Vec<calendar_event::Model>,
}

pub fn asset_tag_or_auto(asset_tag: &str, serial: &str) -> String {
    if asset_tag.trim().is_empty() {
        format!("AUTO_{}", serial.trim())
    } else {
        asset_tag.trim().to_string()
    }
}

pub fn maintenance_status_text(pending: u64) -> String {
    if pending == 0 {
        "No pending maintenance".to_string()
    } else {
        format!("{} pending maintenance activities", pending)
    }
}

/// Validate and normalize. Field problems are collected into one message.
pub async fn validate<C: ConnectionTrait>(
    db: &C,
    input: &EquipmentInput,
    self_id: Option<i64>,
) -> AppResult<EquipmentStatus> {
    let mut errors: Vec<String> = Vec::new();
    let name = input.name.trim();
    let serial = input.manufacturer_serial.trim();
    let asset_tag = asset_tag_or_auto(&input.asset_tag, serial);

    if name.is_empty() {
        errors.push("name: This field is required".to_string());
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.push(format!("name: Must be at most {} characters", MAX_NAME_LEN));
    }
    if serial.is_empty() {
        errors.push("manufacturer_serial: This field is required".to_string());
    } else if serial.chars().count() > MAX_SERIAL_LEN {
        errors.push(format!("manufacturer_serial: Must be at most {} characters", MAX_SERIAL_LEN));
    }
    if asset_tag.chars().count() > MAX_SERIAL_LEN {
        errors.push(format!("asset_tag: Must be at most {} characters", MAX_SERIAL_LEN));
    }

    let status = match input.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => match EquipmentStatus::parse(s) {
            Some(status) => status,
            None => {
                errors.push(format!("status: '{}' is not a valid choice", s));
                EquipmentStatus::Active
            }
        },
        None => EquipmentStatus::Active,
    };

    if let (Some(dga), Some(next)) = (input.dga_due_date, input.next_maintenance_date) {
        if dga > next {
            errors.push("dga_due_date: DGA due date cannot be after the next maintenance date".to_string());
        }
    }

    if let Some(category_id) = input.category_id {
        if equipment_category::Entity::find_by_id(category_id).one(db).await?.is_none() {
            errors.push("category_id: Category does not exist".to_string());
        }
    }
    if let Some(location_id) = input.location_id {
        if location::Entity::find_by_id(location_id).one(db).await?.is_none() {
            errors.push("location_id: Location does not exist".to_string());
        }
    }

    let unique_checks = [
        (equipment::Column::Name, name, "name", "Equipment with this name already exists"),
        (
            equipment::Column::ManufacturerSerial,
            serial,
            "manufacturer_serial",
            "Equipment with this serial number already exists",
        ),
        (
            equipment::Column::AssetTag,
            asset_tag.as_str(),
            "asset_tag",
            "Equipment with this asset tag already exists",
        ),
    ];
    for (column, value, field, message) in unique_checks {
        if value.is_empty() {
            continue;
        }
        if let Some(other) = equipment::Entity::find().filter(column.eq(value)).one(db).await? {
            if Some(other.id) != self_id {
                errors.push(format!("{}: {}", field, message));
            }
        }
    }

    if errors.is_empty() {
        Ok(status)
    } else {
        Err(AppError::Validation(errors.join("; ")))
    }
}

fn apply_input(active: &mut equipment::ActiveModel, input: &EquipmentInput, status: EquipmentStatus, now: i64) {
    let serial = input.manufacturer_serial.trim().to_string();
    active.name = Set(input.name.trim().to_string());
    active.category_id = Set(input.category_id);
    active.asset_tag = Set(asset_tag_or_auto(&input.asset_tag, &serial));
    active.manufacturer_serial = Set(serial);
    active.location_id = Set(input.location_id);
    active.status = Set(status.as_str().to_string());
    active.manufacturer = Set(input.manufacturer.clone());
    active.model_number = Set(input.model_number.clone());
    active.power_ratings = Set(input.power_ratings.clone());
    active.trip_setpoints = Set(input.trip_setpoints.clone());
    active.installed_upgrades = Set(input.installed_upgrades.clone());
    active.warranty_details = Set(input.warranty_details.clone());
    active.dga_due_date = Set(input.dga_due_date);
    active.next_maintenance_date = Set(input.next_maintenance_date);
    active.commissioning_date = Set(input.commissioning_date);
    active.warranty_expiry_date = Set(input.warranty_expiry_date);
    active.is_active = Set(input.is_active);
    active.updated_at = Set(now);
}

pub async fn create<C: ConnectionTrait>(
    db: &C,
    input: &EquipmentInput,
    created_by: Option<i64>,
) -> AppResult<equipment::Model> {
    let status = validate(db, input, None).await?;
    let now = now_ts();
    let mut active = equipment::ActiveModel {
        created_by: Set(created_by),
        created_at: Set(now),
        ..Default::default()
    };
    apply_input(&mut active, input, status, now);
    Ok(active.insert(db).await?)
}

pub async fn update<C: ConnectionTrait>(
    db: &C,
    existing: equipment::Model,
    input: &EquipmentInput,
) -> AppResult<equipment::Model> {
    let status = validate(db, input, Some(existing.id)).await?;
    let mut active: equipment::ActiveModel = existing.into();
    apply_input(&mut active, input, status, now_ts());
    Ok(active.update(db).await?)
}

/// Delete equipment and everything hanging off it
pub async fn delete<C: ConnectionTrait>(db: &C, equipment_id: i64) -> AppResult<()> {
    delete_dependents(db, &[equipment_id]).await?;
    equipment::Entity::delete_by_id(equipment_id).exec(db).await?;
    Ok(())
}

/// Remove activities, checklists, schedules, events, comments and
/// components of the given equipment
pub async fn delete_dependents<C: ConnectionTrait>(db: &C, equipment_ids: &[i64]) -> AppResult<()> {
    if equipment_ids.is_empty() {
        return Ok(());
    }
    let ids = equipment_ids.to_vec();

    let activity_ids: Vec<i64> = maintenance_activity::Entity::find()
        .select_only()
        .column(maintenance_activity::Column::Id)
        .filter(maintenance_activity::Column::EquipmentId.is_in(ids.clone()))
        .into_tuple()
        .all(db)
        .await?;
    if !activity_ids.is_empty() {
        checklist_item::Entity::delete_many()
            .filter(checklist_item::Column::ActivityId.is_in(activity_ids))
            .exec(db)
            .await?;
    }

    let event_ids: Vec<i64> = calendar_event::Entity::find()
        .select_only()
        .column(calendar_event::Column::Id)
        .filter(calendar_event::Column::EquipmentId.is_in(ids.clone()))
        .into_tuple()
        .all(db)
        .await?;
    if !event_ids.is_empty() {
        event_comment::Entity::delete_many()
            .filter(event_comment::Column::EventId.is_in(event_ids.clone()))
            .exec(db)
            .await?;
        calendar_event::Entity::delete_many()
            .filter(calendar_event::Column::Id.is_in(event_ids))
            .exec(db)
            .await?;
    }

    maintenance_activity::Entity::delete_many()
        .filter(maintenance_activity::Column::EquipmentId.is_in(ids.clone()))
        .exec(db)
        .await?;
    maintenance_schedule::Entity::delete_many()
        .filter(maintenance_schedule::Column::EquipmentId.is_in(ids.clone()))
        .exec(db)
        .await?;
    equipment_component::Entity::delete_many()
        .filter(equipment_component::Column::EquipmentId.is_in(ids))
        .exec(db)
        .await?;

    Ok(())
}

/// Ids of equipment located anywhere under a location
pub async fn ids_under<C: ConnectionTrait>(db: &C, location_id: i64) -> Result<Vec<i64>, sea_orm::DbErr> {
    let all = location::Entity::find().all(db).await?;
    let under: Vec<i64> = locations::descendant_ids(&all, location_id).into_iter().collect();
    Ok(equipment::Entity::find()
        .filter(equipment::Column::LocationId.is_in(under))
        .select_only()
        .column(equipment::Column::Id)
        .into_tuple()
        .all(db)
        .await?)
}

/// `actual_end` of the most recent completed activity
pub async fn last_maintenance<C: ConnectionTrait>(db: &C, equipment_id: i64) -> Result<Option<i64>, sea_orm::DbErr> {
    Ok(maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::EquipmentId.eq(equipment_id))
        .filter(maintenance_activity::Column::Status.eq(ActivityStatus::Completed.as_str()))
        .filter(maintenance_activity::Column::ActualEnd.is_not_null())
        .order_by_desc(maintenance_activity::Column::ActualEnd)
        .one(db)
        .await?
        .and_then(|a| a.actual_end))
}

pub async fn detail<C: ConnectionTrait>(db: &C, eq: equipment::Model) -> AppResult<EquipmentDetail> {
    let category = match eq.category_id {
        Some(id) => equipment_category::Entity::find_by_id(id).one(db).await?.map(|c| c.name),
        None => None,
    };

    let (location_path, site) = match eq.location_id {
        Some(id) => match location::Entity::find_by_id(id).one(db).await? {
            Some(loc) => {
                let chain = locations::ancestors(db, &loc).await?;
                let site = chain.first().filter(|root| root.is_site).cloned();
                (Some(locations::path_of(&chain)), site)
            }
            None => (None, None),
        },
        None => (None, None),
    };

    let pending = activity::pending_count(db, eq.id).await?;
    let last_maintenance_date = last_maintenance(db, eq.id).await?;

    let components = equipment_component::Entity::find()
        .filter(equipment_component::Column::EquipmentId.eq(eq.id))
        .order_by_asc(equipment_component::Column::Name)
        .all(db)
        .await?;
    let recent_activities = maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::EquipmentId.eq(eq.id))
        .order_by_desc(maintenance_activity::Column::ScheduledStart)
        .limit(10)
        .all(db)
        .await?;
    let upcoming_events = calendar_event::Entity::find()
        .filter(calendar_event::Column::EquipmentId.eq(eq.id))
        .filter(calendar_event::Column::EventDate.gte(today()))
        .filter(calendar_event::Column::IsCompleted.eq(false))
        .order_by_asc(calendar_event::Column::EventDate)
        .limit(10)
        .all(db)
        .await?;

    Ok(EquipmentDetail {
        status_display: eq.status().display_name(),
        equipment: eq,
        category,
        location_path,
        site,
        maintenance_status: maintenance_status_text(pending),
        last_maintenance_date,
        components,
        recent_activities,
        upcoming_events,
    })
}

/// Fields for a component
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentInput {
    pub name: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub replacement_date: Option<NaiveDate>,
}

fn default_quantity() -> i32 {
    1
}

pub async fn save_component<C: ConnectionTrait>(
    db: &C,
    equipment_id: i64,
    existing: Option<equipment_component::Model>,
    input: &ComponentInput,
) -> AppResult<equipment_component::Model> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Component name is required"));
    }
    if input.quantity < 1 {
        return Err(AppError::validation("Quantity must be at least 1"));
    }
    let self_id = existing.as_ref().map(|c| c.id);
    if let Some(other) = equipment_component::Entity::find()
        .filter(equipment_component::Column::EquipmentId.eq(equipment_id))
        .filter(equipment_component::Column::Name.eq(name))
        .one(db)
        .await?
    {
        if Some(other.id) != self_id {
            return Err(AppError::Conflict(format!(
                "Component '{}' already exists on this equipment",
                name
            )));
        }
    }

    let is_new = existing.is_none();
    let mut active: equipment_component::ActiveModel = match existing {
        Some(c) => c.into(),
        None => equipment_component::ActiveModel {
            equipment_id: Set(equipment_id),
            created_at: Set(now_ts()),
            ..Default::default()
        },
    };
    active.name = Set(name.to_string());
    active.part_number = Set(input.part_number.clone());
    active.serial_number = Set(input.serial_number.clone());
    active.description = Set(input.description.clone());
    active.quantity = Set(input.quantity);
    active.is_critical = Set(input.is_critical);
    active.replacement_date = Set(input.replacement_date);

    let saved = if is_new {
        active.insert(db).await?
    } else {
        active.update(db).await?
    };
    Ok(saved)
}

pub async fn get_or_create_category<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> AppResult<(equipment_category::Model, bool)> {
    let name = name.trim();
    if let Some(existing) = equipment_category::Entity::find()
        .filter(equipment_category::Column::Name.eq(name))
        .one(db)
        .await?
    {
        return Ok((existing, false));
    }
    let created = equipment_category::ActiveModel {
        name: Set(name.to_string()),
        description: Set(String::new()),
        is_active: Set(true),
        created_at: Set(now_ts()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok((created, true))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::entity::activity_type;
    use sea_orm::PaginatorTrait;

    pub(crate) async fn insert_equipment<C: ConnectionTrait>(
        db: &C,
        name: &str,
        location_id: Option<i64>,
    ) -> equipment::Model {
        create(
            db,
            &EquipmentInput {
                name: name.to_string(),
                manufacturer_serial: format!("SN-{}", name),
                location_id,
                is_active: true,
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap()
    }

    pub(crate) async fn insert_type<C: ConnectionTrait>(db: &C, name: &str, frequency_days: i32) -> activity_type::Model {
        activity_type::ActiveModel {
            name: Set(name.to_string()),
            category_id: Set(None),
            description: Set(String::new()),
            estimated_duration_hours: Set(2),
            frequency_days: Set(frequency_days),
            is_mandatory: Set(true),
            checklist_template: Set(String::new()),
            tools_required: Set(String::new()),
            parts_required: Set(String::new()),
            safety_notes: Set(String::new()),
            is_active: Set(true),
            created_at: Set(now_ts()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "TX-01", None).await;
        assert_eq!(eq.asset_tag, "AUTO_SN-TX-01");
        assert_eq!(eq.status, "active");
    }

    #[tokio::test]
    async fn test_uniqueness_reported_per_field() {
        let db = connect_in_memory().await.unwrap();
        insert_equipment(&db, "TX-01", None).await;

        let dup = EquipmentInput {
            name: "TX-01".to_string(),
            manufacturer_serial: "SN-TX-01".to_string(),
            ..Default::default()
        };
        match create(&db, &dup, None).await {
            Err(AppError::Validation(msg)) => {
                assert!(msg.contains("name:"));
                assert!(msg.contains("manufacturer_serial:"));
                assert!(msg.contains("asset_tag:"));
            }
            other => panic!("unexpected: {:?}", other.map(|e| e.id)),
        }
    }

    #[tokio::test]
    async fn test_dga_before_next_maintenance() {
        let db = connect_in_memory().await.unwrap();
        let input = EquipmentInput {
            name: "TX-02".to_string(),
            manufacturer_serial: "S2".to_string(),
            dga_due_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            next_maintenance_date: NaiveDate::from_ymd_opt(2025, 5, 1),
            ..Default::default()
        };
        assert!(matches!(create(&db, &input, None).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_detail_and_cascade_delete() {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "TX-01", None).await;
        let ty = insert_type(&db, "Oil Test", 30).await;
        let start = now_ts() + 3600;
        let act = activity::create(&db, &activity::tests::input(eq.id, ty.id, start), None)
            .await
            .unwrap();

        save_component(
            &db,
            eq.id,
            None,
            &ComponentInput {
                name: "Bushing".to_string(),
                part_number: String::new(),
                serial_number: String::new(),
                description: String::new(),
                quantity: 3,
                is_critical: true,
                replacement_date: None,
            },
        )
        .await
        .unwrap();

        let detail = detail(&db, eq.clone()).await.unwrap();
        assert_eq!(detail.maintenance_status, "1 pending maintenance activities");
        assert_eq!(detail.components.len(), 1);
        assert_eq!(detail.recent_activities[0].id, act.id);
        assert!(detail.last_maintenance_date.is_none());

        activity::complete(&db, act, "").await.unwrap();
        assert!(last_maintenance(&db, eq.id).await.unwrap().is_some());
        assert_eq!(activity::pending_count(&db, eq.id).await.unwrap(), 0);

        delete(&db, eq.id).await.unwrap();
        assert_eq!(maintenance_activity::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(calendar_event::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(equipment_component::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_component_rules() {
        let db = connect_in_memory().await.unwrap();
        let eq = insert_equipment(&db, "TX-01", None).await;
        let mut input = ComponentInput {
            name: "Fan".to_string(),
            part_number: String::new(),
            serial_number: String::new(),
            description: String::new(),
            quantity: 0,
            is_critical: false,
            replacement_date: None,
        };
        assert!(save_component(&db, eq.id, None, &input).await.is_err());
        input.quantity = 2;
        save_component(&db, eq.id, None, &input).await.unwrap();
        assert!(matches!(
            save_component(&db, eq.id, None, &input).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_maintenance_status_text() {
        assert_eq!(maintenance_status_text(0), "No pending maintenance");
        assert_eq!(maintenance_status_text(2), "2 pending maintenance activities");
    }
}
