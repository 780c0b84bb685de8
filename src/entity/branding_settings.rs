//! Branding settings - single row controlling names, labels and colors

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_branding_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(100))")]
    pub site_name: String,
    #[sea_orm(column_type = "String(Some(200))")]
    pub site_tagline: String,
    #[sea_orm(column_type = "String(Some(50))")]
    pub window_title_prefix: String,
    #[sea_orm(column_type = "String(Some(50))")]
    pub window_title_suffix: String,
    #[sea_orm(column_type = "String(Some(100))")]
    pub header_brand_text: String,

    #[sea_orm(column_type = "String(Some(50))")]
    pub nav_overview_label: String,
    #[sea_orm(column_type = "String(Some(50))")]
    pub nav_equipment_label: String,
    #[sea_orm(column_type = "String(Some(50))")]
    pub nav_maintenance_label: String,
    #[sea_orm(column_type = "String(Some(50))")]
    pub nav_calendar_label: String,
    #[sea_orm(column_type = "String(Some(50))")]
    pub nav_map_label: String,
    #[sea_orm(column_type = "String(Some(50))")]
    pub nav_settings_label: String,
    #[sea_orm(column_type = "String(Some(50))")]
    pub nav_debug_label: String,

    #[sea_orm(column_type = "String(Some(200))")]
    pub footer_copyright_text: String,
    #[sea_orm(column_type = "String(Some(200))")]
    pub footer_powered_by_text: String,

    #[sea_orm(column_type = "String(Some(7))")]
    pub primary_color: String,
    #[sea_orm(column_type = "String(Some(7))")]
    pub secondary_color: String,
    #[sea_orm(column_type = "String(Some(7))")]
    pub accent_color: String,

    #[sea_orm(column_type = "String(Some(7))")]
    pub scheduled_color: String,
    #[sea_orm(column_type = "String(Some(7))")]
    pub pending_color: String,
    #[sea_orm(column_type = "String(Some(7))")]
    pub in_progress_color: String,
    #[sea_orm(column_type = "String(Some(7))")]
    pub cancelled_color: String,
    #[sea_orm(column_type = "String(Some(7))")]
    pub completed_color: String,
    #[sea_orm(column_type = "String(Some(7))")]
    pub overdue_color: String,

    pub is_active: bool,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Factory defaults for a fresh install
    pub fn defaults() -> Self {
        Self {
            id: 1,
            site_name: "Maintenance Dashboard".to_string(),
            site_tagline: "Equipment maintenance at a glance".to_string(),
            window_title_prefix: String::new(),
            window_title_suffix: " - Maintenance Dashboard".to_string(),
            header_brand_text: "Maintenance Dashboard".to_string(),
            nav_overview_label: "Overview".to_string(),
            nav_equipment_label: "Equipment".to_string(),
            nav_maintenance_label: "Maintenance".to_string(),
            nav_calendar_label: "Calendar".to_string(),
            nav_map_label: "Map".to_string(),
            nav_settings_label: "Settings".to_string(),
            nav_debug_label: "Debug".to_string(),
            footer_copyright_text: "© Maintenance Dashboard".to_string(),
            footer_powered_by_text: "Powered by Maintdash".to_string(),
            primary_color: "#4299e1".to_string(),
            secondary_color: "#2d3748".to_string(),
            accent_color: "#3182ce".to_string(),
            scheduled_color: "#808080".to_string(),
            pending_color: "#4299e1".to_string(),
            in_progress_color: "#ed8936".to_string(),
            cancelled_color: "#000000".to_string(),
            completed_color: "#48bb78".to_string(),
            overdue_color: "#f56565".to_string(),
            is_active: true,
            updated_at: 0,
        }
    }

    /// All color fields with their names, for validation
    pub fn colors(&self) -> [(&'static str, &str); 9] {
        [
            ("primary_color", self.primary_color.as_str()),
            ("secondary_color", self.secondary_color.as_str()),
            ("accent_color", self.accent_color.as_str()),
            ("scheduled_color", self.scheduled_color.as_str()),
            ("pending_color", self.pending_color.as_str()),
            ("in_progress_color", self.in_progress_color.as_str()),
            ("cancelled_color", self.cancelled_color.as_str()),
            ("completed_color", self.completed_color.as_str()),
            ("overdue_color", self.overdue_color.as_str()),
        ]
    }
}

/// `#RRGGBB`
pub fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color() {
        assert!(is_hex_color("#4299e1"));
        assert!(is_hex_color("#FFFFFF"));
        assert!(!is_hex_color("4299e1"));
        assert!(!is_hex_color("#fff"));
        assert!(!is_hex_color("#gg0000"));
    }

    #[test]
    fn test_defaults_are_valid_colors() {
        let branding = Model::defaults();
        assert!(branding.colors().iter().all(|(_, c)| is_hex_color(c)));
        assert_eq!(branding.site_name, "Maintenance Dashboard");
    }
}
