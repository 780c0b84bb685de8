//! Calendar event - a dated occurrence for a piece of equipment
//!
//! Maintenance events are usually linked to a [`super::maintenance_activity`]
//! record which holds the detailed schedule and status.
//! Table: md_calendar_event

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Maintenance,
    Inspection,
    Calibration,
    Outage,
    Upgrade,
    Commissioning,
    Decommissioning,
    Testing,
    Other,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        EventType::Maintenance,
        EventType::Inspection,
        EventType::Calibration,
        EventType::Outage,
        EventType::Upgrade,
        EventType::Commissioning,
        EventType::Decommissioning,
        EventType::Testing,
        EventType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Maintenance => "maintenance",
            EventType::Inspection => "inspection",
            EventType::Calibration => "calibration",
            EventType::Outage => "outage",
            EventType::Upgrade => "upgrade",
            EventType::Commissioning => "commissioning",
            EventType::Decommissioning => "decommissioning",
            EventType::Testing => "testing",
            EventType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

pub const RECURRENCE_PATTERNS: [&str; 4] = ["daily", "weekly", "monthly", "yearly"];

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_calendar_event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(200))")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(column_type = "String(Some(20))")]
    pub event_type: String,

    pub equipment_id: i64,

    pub event_date: Date,

    pub start_time: Option<Time>,

    pub end_time: Option<Time>,

    pub all_day: bool,

    #[sea_orm(column_type = "String(Some(20))")]
    pub priority: String,

    pub is_recurring: bool,

    #[sea_orm(column_type = "String(Some(20))", nullable)]
    pub recurrence_pattern: Option<String>,

    pub assigned_to: Option<i64>,

    pub notify_assigned: bool,

    pub notification_sent: bool,

    pub is_completed: bool,

    #[sea_orm(column_type = "Text")]
    pub completion_notes: String,

    pub maintenance_activity_id: Option<i64>,

    pub created_by: Option<i64>,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_maintenance(&self) -> bool {
        self.event_type == EventType::Maintenance.as_str()
    }
}
