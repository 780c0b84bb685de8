//! Activity title templates
//!
//! Supported placeholders: `{Activity_Type}`, `{Equipment}`, `{Date}`,
//! `{Priority}` and `{Status}`. Anything else in braces is kept as written.

use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, EntityTrait};

use crate::entity::dashboard_settings::{self, DEFAULT_TITLE_TEMPLATE};
use crate::entity::maintenance_activity::{ActivityStatus, Priority};

/// Values substituted into a title template
#[derive(Debug, Clone)]
pub struct TitleContext<'a> {
    pub activity_type: &'a str,
    pub equipment: &'a str,
    pub date: NaiveDate,
    pub priority: Priority,
    pub status: ActivityStatus,
}

pub fn render(template: &str, ctx: &TitleContext<'_>) -> String {
    let template = if template.trim().is_empty() {
        DEFAULT_TITLE_TEMPLATE
    } else {
        template
    };

    // Single pass, so substituted values are never expanded again
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let Some(close) = tail.find('}') else {
            rest = tail;
            break;
        };
        // A stray brace before the placeholder is literal text
        if let Some(inner) = tail[1..close].rfind('{') {
            out.push_str(&tail[..=inner]);
            rest = &tail[inner + 1..];
            continue;
        }
        let placeholder = &tail[..=close];
        match value_for(placeholder, ctx) {
            Some(value) => out.push_str(&value),
            None => out.push_str(placeholder),
        }
        rest = &tail[close + 1..];
    }
    out.push_str(rest);
    out
}

fn value_for(placeholder: &str, ctx: &TitleContext<'_>) -> Option<String> {
    let value = match placeholder {
        "{Activity_Type}" => ctx.activity_type.to_string(),
        "{Equipment}" => ctx.equipment.to_string(),
        "{Date}" => ctx.date.format("%Y-%m-%d").to_string(),
        "{Priority}" => ctx.priority.display_name().to_string(),
        "{Status}" => ctx.status.display_name().to_string(),
        _ => return None,
    };
    Some(value)
}

/// Template currently stored in the dashboard settings row
pub async fn current_template<C: ConnectionTrait>(db: &C) -> Result<String, sea_orm::DbErr> {
    Ok(dashboard_settings::Entity::find_by_id(1)
        .one(db)
        .await?
        .map(|s| s.activity_title_template)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE_TEMPLATE.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TitleContext<'static> {
        TitleContext {
            activity_type: "Oil Test",
            equipment: "TX-01",
            date: NaiveDate::from_ymd_opt(2025, 3, 9).unwrap(),
            priority: Priority::High,
            status: ActivityStatus::InProgress,
        }
    }

    #[test]
    fn test_default_template() {
        assert_eq!(render(DEFAULT_TITLE_TEMPLATE, &ctx()), "Oil Test - TX-01");
        assert_eq!(render("   ", &ctx()), "Oil Test - TX-01");
    }

    #[test]
    fn test_all_placeholders() {
        let out = render("{Equipment}: {Activity_Type} on {Date} [{Priority}/{Status}]", &ctx());
        assert_eq!(out, "TX-01: Oil Test on 2025-03-09 [High/In Progress]");
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        assert_eq!(render("{Site} {Equipment}", &ctx()), "{Site} TX-01");
        assert_eq!(render("{{Equipment}} {", &ctx()), "{TX-01} {");
    }

    #[test]
    fn test_values_are_not_expanded_again() {
        let tricky = TitleContext {
            equipment: "Panel {Status}",
            ..ctx()
        };
        assert_eq!(render("{Equipment} - {Priority}", &tricky), "Panel {Status} - High");
    }
}
