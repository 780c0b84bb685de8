//! Demo dataset and bulk data reset

use chrono::{Duration, NaiveTime};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::entity::maintenance_activity::ActivityStatus;
use crate::entity::{
    activity_type, calendar_event, checklist_item, customer, equipment, equipment_category,
    equipment_component, event_comment, location, maintenance_activity, maintenance_schedule, now_ts,
    user,
};
use crate::error::{AppError, AppResult};
use crate::service::activity::{self, ActivityInput, ActivityTypeInput};
use crate::service::equipment::{self as equipments, EquipmentInput};
use crate::service::event::{self, EventInput};
use crate::service::location::{self as locations, CustomerInput};
use crate::service::schedule::{self, ScheduleInput};
use crate::service::{date_time_ts, default_start_time, today};

/// Rows created by [`populate`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct DemoSummary {
    pub categories: usize,
    pub sites: usize,
    pub locations: usize,
    pub equipment: usize,
    pub activity_types: usize,
    pub activities: usize,
    pub schedules: usize,
    pub events: usize,
}

const CATEGORIES: [&str; 4] = ["Transformers", "Switchgear", "UPS Systems", "Generators"];

const SITES: [(&str, &str); 2] = [("North Campus", "NORTH"), ("South Campus", "SOUTH")];

const TYPES: [(&str, i32, i32); 4] = [
    ("Oil Analysis", 2, 180),
    ("Thermal Imaging", 1, 90),
    ("Battery Test", 3, 30),
    ("Load Bank Test", 4, 365),
];

/// Create a small, realistic dataset. Existing rows with the same names
/// are reused, so running it twice adds nothing new.
pub async fn populate<C: ConnectionTrait + TransactionTrait>(db: &C) -> AppResult<DemoSummary> {
    let mut summary = DemoSummary::default();

    let mut category_ids = Vec::new();
    for name in CATEGORIES {
        let (category, created) = equipments::get_or_create_category(db, name).await?;
        summary.categories += usize::from(created);
        category_ids.push(category.id);
    }

    let mut type_ids = Vec::new();
    for (name, hours, frequency) in TYPES {
        match activity_type::Entity::find()
            .filter(activity_type::Column::Name.eq(name))
            .one(db)
            .await?
        {
            Some(existing) => type_ids.push(existing.id),
            None => {
                let created = activity::save_type(
                    db,
                    None,
                    &ActivityTypeInput {
                        name: name.to_string(),
                        category_id: None,
                        description: format!("{} per the maintenance plan", name),
                        estimated_duration_hours: hours,
                        frequency_days: frequency,
                        is_mandatory: true,
                        checklist_template: String::new(),
                        tools_required: String::new(),
                        parts_required: String::new(),
                        safety_notes: "Follow lockout/tagout procedure".to_string(),
                        is_active: true,
                    },
                )
                .await?;
                summary.activity_types += 1;
                type_ids.push(created.id);
            }
        }
    }

    let today = today();
    let mut serial = 0;
    for (site_name, code) in SITES {
        let customer = match customer::Entity::find()
            .filter(customer::Column::Code.eq(code))
            .one(db)
            .await?
        {
            Some(c) => c,
            None => {
                locations::save_customer(
                    db,
                    None,
                    &CustomerInput {
                        name: format!("{} Tenant", site_name),
                        code: code.to_string(),
                        contact_email: format!("ops@{}.example.com", code.to_lowercase()),
                        contact_phone: String::new(),
                        address: String::new(),
                        is_active: true,
                    },
                )
                .await?
            }
        };

        let path = format!("{} > POD 1 > MDC 1", site_name);
        let resolution = locations::resolve_path(db, &path)
            .await?
            .ok_or_else(|| AppError::Internal("demo path did not resolve".to_string()))?;
        summary.sites += resolution.sites_created;
        summary.locations += resolution.locations_created;

        if let Some(site) = locations::site_location(db, &resolution.location).await? {
            if site.customer_id.is_none() {
                let mut active: location::ActiveModel = site.into();
                active.customer_id = Set(Some(customer.id));
                active.update(db).await?;
            }
        }

        for (i, category_id) in category_ids.iter().enumerate() {
            serial += 1;
            let name = format!("{} {}-{:02}", code, CATEGORIES[i].trim_end_matches('s'), serial);
            let serial_no = format!("DEMO-{}-{:04}", code, serial);
            if equipment::Entity::find()
                .filter(equipment::Column::ManufacturerSerial.eq(serial_no.as_str()))
                .one(db)
                .await?
                .is_some()
            {
                continue;
            }

            let eq = equipments::create(
                db,
                &EquipmentInput {
                    name,
                    category_id: Some(*category_id),
                    manufacturer_serial: serial_no,
                    location_id: Some(resolution.location.id),
                    manufacturer: "Acme Power".to_string(),
                    model_number: format!("AP-{}", 100 + serial),
                    commissioning_date: Some(today - Duration::days(400)),
                    is_active: true,
                    ..Default::default()
                },
                None,
            )
            .await?;
            summary.equipment += 1;

            let type_id = type_ids[i % type_ids.len()];
            for offset in [-3_i64, 2, 12] {
                let day = today + Duration::days(offset + i as i64);
                let start = date_time_ts(day, default_start_time());
                activity::create(
                    db,
                    &ActivityInput {
                        equipment_id: eq.id,
                        activity_type_id: type_id,
                        title: String::new(),
                        description: String::new(),
                        status: Some(ActivityStatus::Scheduled.as_str().to_string()),
                        priority: Some(if offset < 0 { "high" } else { "medium" }.to_string()),
                        scheduled_start: start,
                        scheduled_end: start + 2 * 3600,
                        actual_start: None,
                        actual_end: None,
                        assigned_to: None,
                        required_status: String::new(),
                        tools_required: String::new(),
                        parts_required: String::new(),
                        safety_notes: String::new(),
                        completion_notes: String::new(),
                    },
                    None,
                )
                .await?;
                summary.activities += 1;
            }

            schedule::save(
                db,
                None,
                &ScheduleInput {
                    equipment_id: eq.id,
                    activity_type_id: type_id,
                    frequency: "quarterly".to_string(),
                    frequency_days: None,
                    start_date: today + Duration::days(30),
                    end_date: None,
                    auto_generate: true,
                    advance_notice_days: 7,
                    is_active: true,
                },
            )
            .await?;
            summary.schedules += 1;

            event::create(
                db,
                &EventInput {
                    title: format!("Visual inspection {}", eq.name),
                    description: String::new(),
                    event_type: "inspection".to_string(),
                    equipment_id: eq.id,
                    event_date: today + Duration::days(5),
                    start_time: NaiveTime::from_hms_opt(13, 0, 0),
                    end_time: NaiveTime::from_hms_opt(14, 0, 0),
                    all_day: false,
                    priority: None,
                    is_recurring: false,
                    recurrence_pattern: None,
                    assigned_to: None,
                    notify_assigned: false,
                    activity_type_id: None,
                },
                None,
            )
            .await?;
            summary.events += 1;
        }
    }

    tracing::info!("Demo data populated: {:?}", summary);
    Ok(summary)
}

/// What a data reset removes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetScope {
    Maintenance,
    Calendar,
    Equipment,
    Locations,
    All,
}

impl ResetScope {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "maintenance" => Some(ResetScope::Maintenance),
            "calendar" => Some(ResetScope::Calendar),
            "equipment" => Some(ResetScope::Equipment),
            "locations" => Some(ResetScope::Locations),
            "all" => Some(ResetScope::All),
            _ => None,
        }
    }
}

/// Deleted row counts per table
pub type ResetCounts = BTreeMap<&'static str, u64>;

async fn clear_maintenance<C: ConnectionTrait>(db: &C, counts: &mut ResetCounts) -> Result<(), sea_orm::DbErr> {
    let linked: Vec<i64> = calendar_event::Entity::find()
        .filter(calendar_event::Column::MaintenanceActivityId.is_not_null())
        .all(db)
        .await?
        .into_iter()
        .map(|e| e.id)
        .collect();
    let comments = event_comment::Entity::delete_many()
        .filter(event_comment::Column::EventId.is_in(linked.clone()))
        .exec(db)
        .await?;
    *counts.entry("event_comments").or_insert(0) += comments.rows_affected;
    let events = calendar_event::Entity::delete_many()
        .filter(calendar_event::Column::Id.is_in(linked))
        .exec(db)
        .await?;
    *counts.entry("calendar_events").or_insert(0) += events.rows_affected;

    counts.insert(
        "checklist_items",
        checklist_item::Entity::delete_many().exec(db).await?.rows_affected,
    );
    counts.insert(
        "maintenance_activities",
        maintenance_activity::Entity::delete_many().exec(db).await?.rows_affected,
    );
    counts.insert(
        "maintenance_schedules",
        maintenance_schedule::Entity::delete_many().exec(db).await?.rows_affected,
    );
    Ok(())
}

async fn clear_calendar<C: ConnectionTrait>(db: &C, counts: &mut ResetCounts) -> Result<(), sea_orm::DbErr> {
    *counts.entry("event_comments").or_insert(0) +=
        event_comment::Entity::delete_many().exec(db).await?.rows_affected;
    *counts.entry("calendar_events").or_insert(0) +=
        calendar_event::Entity::delete_many().exec(db).await?.rows_affected;
    Ok(())
}

async fn clear_equipment<C: ConnectionTrait>(db: &C, counts: &mut ResetCounts) -> Result<(), sea_orm::DbErr> {
    clear_calendar(db, counts).await?;
    clear_maintenance(db, counts).await?;
    counts.insert(
        "equipment_components",
        equipment_component::Entity::delete_many().exec(db).await?.rows_affected,
    );
    counts.insert(
        "equipment",
        equipment::Entity::delete_many().exec(db).await?.rows_affected,
    );
    Ok(())
}

async fn clear_locations<C: ConnectionTrait>(db: &C, counts: &mut ResetCounts) -> Result<(), sea_orm::DbErr> {
    clear_equipment(db, counts).await?;
    user::Entity::update_many()
        .col_expr(user::Column::DefaultSiteId, sea_orm::sea_query::Expr::value(Option::<i64>::None))
        .col_expr(user::Column::DefaultLocationId, sea_orm::sea_query::Expr::value(Option::<i64>::None))
        .exec(db)
        .await?;
    counts.insert(
        "locations",
        location::Entity::delete_many().exec(db).await?.rows_affected,
    );
    counts.insert(
        "customers",
        customer::Entity::delete_many().exec(db).await?.rows_affected,
    );
    Ok(())
}

async fn clear_scope<C: ConnectionTrait>(db: &C, scope: ResetScope) -> Result<ResetCounts, sea_orm::DbErr> {
    let mut counts = ResetCounts::new();
    match scope {
        ResetScope::Maintenance => clear_maintenance(db, &mut counts).await?,
        ResetScope::Calendar => clear_calendar(db, &mut counts).await?,
        ResetScope::Equipment => clear_equipment(db, &mut counts).await?,
        ResetScope::Locations => clear_locations(db, &mut counts).await?,
        ResetScope::All => {
            clear_locations(db, &mut counts).await?;
            counts.insert(
                "activity_types",
                activity_type::Entity::delete_many().exec(db).await?.rows_affected,
            );
            counts.insert(
                "equipment_categories",
                equipment_category::Entity::delete_many().exec(db).await?.rows_affected,
            );
        }
    }
    Ok(counts)
}

/// Delete the data of one scope in a single transaction. Users and
/// roles are never touched.
pub async fn reset(db: &DatabaseConnection, scope: ResetScope) -> AppResult<ResetCounts> {
    let txn = db.begin().await?;
    let counts = clear_scope(&txn, scope).await?;
    txn.commit().await?;
    tracing::warn!("Data reset ({:?}): {:?} at {}", scope, counts, now_ts());
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::permission::tests::insert_user;
    use sea_orm::PaginatorTrait;

    #[tokio::test]
    async fn test_populate_is_repeatable() {
        let db = connect_in_memory().await.unwrap();
        let first = populate(&db).await.unwrap();
        assert_eq!(first.sites, 2);
        assert_eq!(first.equipment, 8);
        assert_eq!(first.activities, 24);
        assert_eq!(first.events, 8);
        assert_eq!(
            calendar_event::Entity::find().count(&db).await.unwrap(),
            32,
            "every activity gets an event plus one inspection per equipment"
        );

        let second = populate(&db).await.unwrap();
        assert_eq!(second.equipment, 0);
        assert_eq!(second.sites, 0);
        assert_eq!(equipment::Entity::find().count(&db).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_reset_scopes() {
        let db = connect_in_memory().await.unwrap();
        insert_user(&db, "keeper", false).await;
        populate(&db).await.unwrap();

        let counts = reset(&db, ResetScope::Maintenance).await.unwrap();
        assert_eq!(counts["maintenance_activities"], 24);
        assert_eq!(counts["calendar_events"], 24);
        assert_eq!(calendar_event::Entity::find().count(&db).await.unwrap(), 8);
        assert_eq!(equipment::Entity::find().count(&db).await.unwrap(), 8);

        reset(&db, ResetScope::Calendar).await.unwrap();
        assert_eq!(calendar_event::Entity::find().count(&db).await.unwrap(), 0);

        reset(&db, ResetScope::All).await.unwrap();
        assert_eq!(equipment::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(location::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(activity_type::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(user::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(ResetScope::parse("ALL"), Some(ResetScope::All));
        assert_eq!(ResetScope::parse("users"), None);
    }
}
