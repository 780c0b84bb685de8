//! Branding and dashboard settings rows, plus per-user preferences

use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel, Set};
use serde::Deserialize;
use serde_json::Value;

use crate::entity::branding_settings::{self, is_hex_color};
use crate::entity::dashboard_settings::{self, status_list};
use crate::entity::maintenance_activity::ActivityStatus;
use crate::entity::user::{self, NOTIFICATION_FREQUENCIES, THEMES};
use crate::entity::{location, now_ts};
use crate::error::{AppError, AppResult};

pub const LIMIT_RANGE: std::ops::RangeInclusive<i32> = 1..=500;
pub const WINDOW_RANGE: std::ops::RangeInclusive<i32> = 1..=365;

const SINGLETON_ID: i64 = 1;

/// Read the branding row, creating it with defaults on first use
pub async fn branding<C: ConnectionTrait>(db: &C) -> AppResult<branding_settings::Model> {
    if let Some(existing) = branding_settings::Entity::find_by_id(SINGLETON_ID).one(db).await? {
        return Ok(existing);
    }
    let mut defaults = branding_settings::Model::defaults();
    defaults.updated_at = now_ts();
    Ok(defaults.into_active_model().insert(db).await?)
}

pub async fn dashboard<C: ConnectionTrait>(db: &C) -> AppResult<dashboard_settings::Model> {
    if let Some(existing) = dashboard_settings::Entity::find_by_id(SINGLETON_ID).one(db).await? {
        return Ok(existing);
    }
    let mut defaults = dashboard_settings::Model::defaults();
    defaults.updated_at = now_ts();
    Ok(defaults.into_active_model().insert(db).await?)
}

/// Overlay the fields of `patch` onto `current`. `id` and `updated_at`
/// are never taken from the caller.
fn merge(current: Value, patch: Value) -> AppResult<Value> {
    let Value::Object(mut base) = current else {
        return Err(AppError::Internal("settings row is not an object".to_string()));
    };
    let Value::Object(patch) = patch else {
        return Err(AppError::BadRequest("Settings must be a JSON object".to_string()));
    };
    for (key, value) in patch {
        if key == "id" || key == "updated_at" {
            continue;
        }
        if !base.contains_key(&key) {
            return Err(AppError::validation(format!("Unknown setting: {}", key)));
        }
        base.insert(key, value);
    }
    base.insert("updated_at".to_string(), Value::from(now_ts()));
    Ok(Value::Object(base))
}

pub fn validate_branding(candidate: &branding_settings::Model) -> AppResult<()> {
    let mut errors: Vec<String> = candidate
        .colors()
        .iter()
        .filter(|(_, value)| !is_hex_color(value))
        .map(|(field, value)| format!("{}: '{}' is not a #RRGGBB color", field, value))
        .collect();
    if candidate.site_name.trim().is_empty() {
        errors.push("site_name: This field is required".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors.join("; ")))
    }
}

pub fn validate_dashboard(candidate: &dashboard_settings::Model) -> AppResult<()> {
    let mut errors = Vec::new();
    let limits = [
        ("max_urgent_items_per_site", candidate.max_urgent_items_per_site),
        ("max_upcoming_items_per_site", candidate.max_upcoming_items_per_site),
        ("max_active_items_per_site", candidate.max_active_items_per_site),
        ("max_urgent_items_total", candidate.max_urgent_items_total),
        ("max_upcoming_items_total", candidate.max_upcoming_items_total),
        ("max_active_items_total", candidate.max_active_items_total),
    ];
    for (field, value) in limits {
        if !LIMIT_RANGE.contains(&value) {
            errors.push(format!("{}: must be between 1 and 500", field));
        }
    }
    for (field, value) in [
        ("urgent_days_ahead", candidate.urgent_days_ahead),
        ("upcoming_days_ahead", candidate.upcoming_days_ahead),
    ] {
        if !WINDOW_RANGE.contains(&value) {
            errors.push(format!("{}: must be between 1 and 365", field));
        }
    }
    for (field, value) in [
        ("urgent_statuses", &candidate.urgent_statuses),
        ("upcoming_statuses", &candidate.upcoming_statuses),
        ("active_statuses", &candidate.active_statuses),
    ] {
        let invalid: Vec<String> = status_list(value, "")
            .into_iter()
            .filter(|s| ActivityStatus::parse(s).is_none())
            .collect();
        if !invalid.is_empty() {
            errors.push(format!("{}: invalid statuses {}", field, invalid.join(", ")));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors.join("; ")))
    }
}

/// Apply a partial JSON update to the branding row
pub async fn update_branding<C: ConnectionTrait>(db: &C, patch: Value) -> AppResult<branding_settings::Model> {
    let current = branding(db).await?;
    let merged = merge(serde_json::to_value(&current)?, patch)?;
    let candidate: branding_settings::Model = serde_json::from_value(merged.clone())?;
    validate_branding(&candidate)?;

    let mut active: branding_settings::ActiveModel = current.into();
    active.set_from_json(merged)?;
    Ok(active.update(db).await?)
}

pub async fn update_dashboard<C: ConnectionTrait>(db: &C, patch: Value) -> AppResult<dashboard_settings::Model> {
    let current = dashboard(db).await?;
    let merged = merge(serde_json::to_value(&current)?, patch)?;
    let candidate: dashboard_settings::Model = serde_json::from_value(merged.clone())?;
    validate_dashboard(&candidate)?;

    let mut active: dashboard_settings::ActiveModel = current.into();
    active.set_from_json(merged)?;
    Ok(active.update(db).await?)
}

fn defaults_patch<T: serde::Serialize>(defaults: &T) -> AppResult<Value> {
    let mut value = serde_json::to_value(defaults)?;
    if let Value::Object(map) = &mut value {
        map.remove("id");
    }
    Ok(value)
}

pub async fn reset_branding<C: ConnectionTrait>(db: &C) -> AppResult<branding_settings::Model> {
    update_branding(db, defaults_patch(&branding_settings::Model::defaults())?).await
}

pub async fn reset_dashboard<C: ConnectionTrait>(db: &C) -> AppResult<dashboard_settings::Model> {
    update_dashboard(db, defaults_patch(&dashboard_settings::Model::defaults())?).await
}

/// Preferences a user may change on their own profile
#[derive(Debug, Clone, Deserialize)]
pub struct PreferencesInput {
    pub theme_preference: String,
    #[serde(default)]
    pub default_site_id: Option<i64>,
    #[serde(default)]
    pub default_location_id: Option<i64>,
    #[serde(default)]
    pub email_notifications: bool,
    #[serde(default)]
    pub sms_notifications: bool,
    pub notification_frequency: String,
}

pub async fn update_preferences<C: ConnectionTrait>(
    db: &C,
    user: user::Model,
    input: &PreferencesInput,
) -> AppResult<user::Model> {
    let theme = input.theme_preference.trim().to_lowercase();
    if !THEMES.contains(&theme.as_str()) {
        return Err(AppError::validation(format!("Invalid theme: {}", input.theme_preference)));
    }
    let frequency = input.notification_frequency.trim().to_lowercase();
    if !NOTIFICATION_FREQUENCIES.contains(&frequency.as_str()) {
        return Err(AppError::validation(format!(
            "Invalid notification frequency: {}",
            input.notification_frequency
        )));
    }
    if let Some(site_id) = input.default_site_id {
        match location::Entity::find_by_id(site_id).one(db).await? {
            Some(site) if site.is_site => {}
            _ => return Err(AppError::validation("Default site must be an existing site")),
        }
    }
    if let Some(location_id) = input.default_location_id {
        if location::Entity::find_by_id(location_id).one(db).await?.is_none() {
            return Err(AppError::validation("Default location does not exist"));
        }
    }

    let mut active: user::ActiveModel = user.into();
    active.theme_preference = Set(theme);
    active.default_site_id = Set(input.default_site_id);
    active.default_location_id = Set(input.default_location_id);
    active.email_notifications = Set(input.email_notifications);
    active.sms_notifications = Set(input.sms_notifications);
    active.notification_frequency = Set(frequency);
    Ok(active.update(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::permission::tests::insert_user;
    use serde_json::json;

    #[tokio::test]
    async fn test_singletons_created_with_defaults() {
        let db = connect_in_memory().await.unwrap();
        let b = branding(&db).await.unwrap();
        assert_eq!(b.id, 1);
        assert_eq!(b.primary_color, "#4299e1");
        let again = branding(&db).await.unwrap();
        assert_eq!(again.id, b.id);

        let d = dashboard(&db).await.unwrap();
        assert_eq!(d.max_active_items_total, 50);
        assert_eq!(d.urgent_days_ahead, 7);
    }

    #[tokio::test]
    async fn test_branding_update_and_reset() {
        let db = connect_in_memory().await.unwrap();
        let updated = update_branding(&db, json!({"site_name": "Plant Ops", "primary_color": "#112233"}))
            .await
            .unwrap();
        assert_eq!(updated.site_name, "Plant Ops");
        assert_eq!(updated.primary_color, "#112233");
        assert_eq!(updated.accent_color, "#3182ce");

        let bad = update_branding(&db, json!({"overdue_color": "red"})).await;
        assert!(matches!(bad, Err(AppError::Validation(_))));
        assert!(update_branding(&db, json!({"no_such_field": 1})).await.is_err());

        let reset = reset_branding(&db).await.unwrap();
        assert_eq!(reset.site_name, "Maintenance Dashboard");
        assert_eq!(reset.primary_color, "#4299e1");
    }

    #[tokio::test]
    async fn test_dashboard_limits_and_statuses() {
        let db = connect_in_memory().await.unwrap();
        assert!(update_dashboard(&db, json!({"max_urgent_items_total": 0})).await.is_err());
        assert!(update_dashboard(&db, json!({"upcoming_days_ahead": 400})).await.is_err());
        assert!(update_dashboard(&db, json!({"active_statuses": "in_progress,bogus"})).await.is_err());

        let ok = update_dashboard(
            &db,
            json!({"urgent_days_ahead": 3, "active_statuses": "in_progress,pending", "show_kpi_cards": false}),
        )
        .await
        .unwrap();
        assert_eq!(ok.urgent_days_ahead, 3);
        assert!(!ok.show_kpi_cards);

        let reset = reset_dashboard(&db).await.unwrap();
        assert_eq!(reset.urgent_days_ahead, 7);
        assert!(reset.show_kpi_cards);
    }

    #[tokio::test]
    async fn test_preferences() {
        let db = connect_in_memory().await.unwrap();
        let user = insert_user(&db, "pat", false).await;
        let mut input = PreferencesInput {
            theme_preference: "dark".to_string(),
            default_site_id: None,
            default_location_id: None,
            email_notifications: true,
            sms_notifications: false,
            notification_frequency: "daily".to_string(),
        };
        let saved = update_preferences(&db, user.clone(), &input).await.unwrap();
        assert_eq!(saved.theme_preference, "dark");
        assert_eq!(saved.notification_frequency, "daily");

        input.theme_preference = "neon".to_string();
        assert!(update_preferences(&db, saved.clone(), &input).await.is_err());

        input.theme_preference = "light".to_string();
        input.default_site_id = Some(999);
        assert!(update_preferences(&db, saved, &input).await.is_err());
    }
}
