//! Maintenance activity - one scheduled piece of work on one equipment
//!
//! Table: md_maintenance_activity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Scheduled,
    Pending,
    InProgress,
    Completed,
    Cancelled,
    Overdue,
}

impl ActivityStatus {
    pub const ALL: [ActivityStatus; 6] = [
        ActivityStatus::Scheduled,
        ActivityStatus::Pending,
        ActivityStatus::InProgress,
        ActivityStatus::Completed,
        ActivityStatus::Cancelled,
        ActivityStatus::Overdue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Scheduled => "scheduled",
            ActivityStatus::Pending => "pending",
            ActivityStatus::InProgress => "in_progress",
            ActivityStatus::Completed => "completed",
            ActivityStatus::Cancelled => "cancelled",
            ActivityStatus::Overdue => "overdue",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ActivityStatus::Scheduled => "Scheduled",
            ActivityStatus::Pending => "Pending",
            ActivityStatus::InProgress => "In Progress",
            ActivityStatus::Completed => "Completed",
            ActivityStatus::Cancelled => "Cancelled",
            ActivityStatus::Overdue => "Overdue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|s| {
            s.as_str().eq_ignore_ascii_case(value) || s.display_name().eq_ignore_ascii_case(value)
        })
    }

    /// Completed and cancelled work is closed for good
    pub fn is_closed(&self) -> bool {
        matches!(self, ActivityStatus::Completed | ActivityStatus::Cancelled)
    }

    /// Statuses counted as outstanding work
    pub fn open_statuses() -> Vec<&'static str> {
        vec![
            ActivityStatus::Scheduled.as_str(),
            ActivityStatus::Pending.as_str(),
            ActivityStatus::InProgress.as_str(),
            ActivityStatus::Overdue.as_str(),
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "md_maintenance_activity")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub equipment_id: i64,

    pub activity_type_id: i64,

    #[sea_orm(column_type = "String(Some(200))")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// See [`ActivityStatus`]
    #[sea_orm(column_type = "String(Some(20))")]
    pub status: String,

    /// See [`Priority`]
    #[sea_orm(column_type = "String(Some(20))")]
    pub priority: String,

    /// Unix timestamps
    pub scheduled_start: i64,
    pub scheduled_end: i64,
    pub actual_start: Option<i64>,
    pub actual_end: Option<i64>,

    pub assigned_to: Option<i64>,

    /// Equipment status required while the work is carried out
    #[sea_orm(column_type = "String(Some(20))")]
    pub required_status: String,

    #[sea_orm(column_type = "Text")]
    pub tools_required: String,

    #[sea_orm(column_type = "Text")]
    pub parts_required: String,

    #[sea_orm(column_type = "Text")]
    pub safety_notes: String,

    #[sea_orm(column_type = "Text")]
    pub completion_notes: String,

    pub next_due_date: Option<Date>,

    pub created_by: Option<i64>,

    pub created_at: i64,

    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn status(&self) -> ActivityStatus {
        ActivityStatus::parse(&self.status).unwrap_or(ActivityStatus::Scheduled)
    }

    pub fn priority(&self) -> Priority {
        Priority::parse(&self.priority).unwrap_or(Priority::Medium)
    }

    pub fn is_overdue(&self, now: i64) -> bool {
        self.status() == ActivityStatus::Overdue
            || (self.scheduled_end < now && !self.status().is_closed())
    }

    /// Duration in hours, from the actual times when both are known
    pub fn duration_hours(&self) -> f64 {
        let (start, end) = match (self.actual_start, self.actual_end) {
            (Some(s), Some(e)) => (s, e),
            _ => (self.scheduled_start, self.scheduled_end),
        };
        (end - start) as f64 / 3600.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(status: &str, start: i64, end: i64) -> Model {
        Model {
            id: 1,
            equipment_id: 1,
            activity_type_id: 1,
            title: "t".to_string(),
            description: String::new(),
            status: status.to_string(),
            priority: "medium".to_string(),
            scheduled_start: start,
            scheduled_end: end,
            actual_start: None,
            actual_end: None,
            assigned_to: None,
            required_status: String::new(),
            tools_required: String::new(),
            parts_required: String::new(),
            safety_notes: String::new(),
            completion_notes: String::new(),
            next_due_date: None,
            created_by: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_status_round_trip_names() {
        assert_eq!(ActivityStatus::parse("In Progress"), Some(ActivityStatus::InProgress));
        assert_eq!(ActivityStatus::parse("in_progress"), Some(ActivityStatus::InProgress));
        assert!(ActivityStatus::Cancelled.is_closed());
        assert!(!ActivityStatus::Overdue.is_closed());
    }

    #[test]
    fn test_overdue_and_duration() {
        let a = activity("scheduled", 0, 7200);
        assert!(a.is_overdue(10_000));
        assert!(!a.is_overdue(100));
        assert_eq!(a.duration_hours(), 2.0);

        let mut done = activity("completed", 0, 7200);
        done.actual_start = Some(0);
        done.actual_end = Some(1800);
        assert!(!done.is_overdue(10_000));
        assert_eq!(done.duration_hours(), 0.5);
    }
}
