//! Entity module - SeaORM entity definitions

pub mod activity_type;
pub mod branding_settings;
pub mod calendar_event;
pub mod casbin_rule;
pub mod checklist_item;
pub mod customer;
pub mod dashboard_settings;
pub mod equipment;
pub mod equipment_category;
pub mod equipment_component;
pub mod event_comment;
pub mod location;
pub mod maintenance_activity;
pub mod maintenance_schedule;
pub mod op_log;
pub mod permission;
pub mod portainer_config;
pub mod role;
pub mod user;

/// Current unix time in seconds
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
