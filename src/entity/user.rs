//! User entity - accounts and their dashboard profile
//!
//! Table: md_user

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(column_type = "String(Some(150))", unique)]
    pub username: String,

    /// bcrypt hash
    #[sea_orm(column_type = "String(Some(128))")]
    #[serde(skip_serializing)]
    pub password: String,

    #[sea_orm(column_type = "String(Some(254))", nullable)]
    pub email: Option<String>,

    #[sea_orm(column_type = "String(Some(150))")]
    pub first_name: String,

    #[sea_orm(column_type = "String(Some(150))")]
    pub last_name: String,

    pub is_superuser: bool,

    pub is_active: bool,

    /// Assigned role (md_role.id)
    pub role_id: Option<i64>,

    #[sea_orm(column_type = "String(Some(20))")]
    pub phone: String,

    #[sea_orm(column_type = "String(Some(50))")]
    pub employee_id: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub department: String,

    pub default_location_id: Option<i64>,

    pub default_site_id: Option<i64>,

    pub email_notifications: bool,

    pub sms_notifications: bool,

    /// immediate, daily or weekly
    #[sea_orm(column_type = "String(Some(20))")]
    pub notification_frequency: String,

    /// light or dark
    #[sea_orm(column_type = "String(Some(10))")]
    pub theme_preference: String,

    /// Unix timestamp, 0 when never logged in
    pub last_login: i64,

    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

pub const NOTIFICATION_FREQUENCIES: [&str; 3] = ["immediate", "daily", "weekly"];
pub const THEMES: [&str; 2] = ["light", "dark"];

/// User response (password omitted)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub is_superuser: bool,
    pub is_active: bool,
    pub role_id: Option<i64>,
    /// Filled in by the handler from the role table
    pub role: Option<String>,
    pub phone: String,
    pub employee_id: String,
    pub department: String,
    pub default_location_id: Option<i64>,
    pub default_site_id: Option<i64>,
    pub email_notifications: bool,
    pub sms_notifications: bool,
    pub notification_frequency: String,
    pub theme_preference: String,
    pub last_login: i64,
}

impl From<Model> for UserResponse {
    fn from(model: Model) -> Self {
        let full_name = model.full_name();
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            full_name,
            is_superuser: model.is_superuser,
            is_active: model.is_active,
            role_id: model.role_id,
            role: None,
            phone: model.phone,
            employee_id: model.employee_id,
            department: model.department,
            default_location_id: model.default_location_id,
            default_site_id: model.default_site_id,
            email_notifications: model.email_notifications,
            sms_notifications: model.sms_notifications,
            notification_frequency: model.notification_frequency,
            theme_preference: model.theme_preference,
            last_login: model.last_login,
        }
    }
}
