//! Dashboard settings - single row controlling the overview page

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE_TEMPLATE: &str = "{Activity_Type} - {Equipment}";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_dashboard_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub show_urgent_items: bool,
    pub show_upcoming_items: bool,
    pub show_active_items: bool,
    pub show_site_status: bool,
    pub show_kpi_cards: bool,
    pub show_overview_data: bool,

    pub group_urgent_by_site: bool,
    pub group_upcoming_by_site: bool,
    pub group_active_by_site: bool,

    pub max_urgent_items_per_site: i32,
    pub max_upcoming_items_per_site: i32,
    pub max_active_items_per_site: i32,
    pub max_urgent_items_total: i32,
    pub max_upcoming_items_total: i32,
    pub max_active_items_total: i32,

    pub urgent_days_ahead: i32,
    pub upcoming_days_ahead: i32,

    #[sea_orm(column_type = "String(Some(200))")]
    pub activity_title_template: String,

    /// Comma separated activity statuses
    #[sea_orm(column_type = "String(Some(200))")]
    pub urgent_statuses: String,
    #[sea_orm(column_type = "String(Some(200))")]
    pub upcoming_statuses: String,
    #[sea_orm(column_type = "String(Some(200))")]
    pub active_statuses: String,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn defaults() -> Self {
        Self {
            id: 1,
            show_urgent_items: true,
            show_upcoming_items: true,
            show_active_items: true,
            show_site_status: true,
            show_kpi_cards: true,
            show_overview_data: true,
            group_urgent_by_site: true,
            group_upcoming_by_site: true,
            group_active_by_site: true,
            max_urgent_items_per_site: 15,
            max_upcoming_items_per_site: 15,
            max_active_items_per_site: 15,
            max_urgent_items_total: 50,
            max_upcoming_items_total: 50,
            max_active_items_total: 50,
            urgent_days_ahead: 7,
            upcoming_days_ahead: 30,
            activity_title_template: DEFAULT_TITLE_TEMPLATE.to_string(),
            urgent_statuses: "scheduled,pending,overdue".to_string(),
            upcoming_statuses: "scheduled,pending".to_string(),
            active_statuses: "in_progress".to_string(),
            updated_at: 0,
        }
    }
}

/// Split a stored status list, falling back when it is empty
pub fn status_list(stored: &str, fallback: &str) -> Vec<String> {
    let source = if stored.trim().is_empty() { fallback } else { stored };
    source
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_list() {
        assert_eq!(status_list("scheduled, Pending", "x"), vec!["scheduled", "pending"]);
        assert_eq!(status_list("  ", "in_progress"), vec!["in_progress"]);
    }
}
