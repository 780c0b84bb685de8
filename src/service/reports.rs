//! Maintenance summary report

use chrono::{Duration, NaiveDate, NaiveTime};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::entity::maintenance_activity::{self, ActivityStatus};
use crate::entity::{equipment, location};
use crate::error::{AppError, AppResult};
use crate::service::dashboard::NO_SITE;
use crate::service::{date_time_ts, equipment as equipments, location as locations};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteTotals {
    pub site_name: String,
    pub total: usize,
    pub completed: usize,
    pub overdue: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub site_id: Option<i64>,
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub completed_in_range: usize,
    pub average_duration_hours: Option<f64>,
    pub overdue: usize,
    pub per_site: Vec<SiteTotals>,
}

/// Activities scheduled to start between `from` and `to`, both inclusive
pub async fn maintenance_report<C: ConnectionTrait>(
    db: &C,
    from: NaiveDate,
    to: NaiveDate,
    site_id: Option<i64>,
    now: i64,
) -> AppResult<MaintenanceReport> {
    if to < from {
        return Err(AppError::validation("Report end date is before the start date"));
    }
    let range_start = date_time_ts(from, NaiveTime::MIN);
    let range_end = date_time_ts(to + Duration::days(1), NaiveTime::MIN);

    let mut query = maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::ScheduledStart.gte(range_start))
        .filter(maintenance_activity::Column::ScheduledStart.lt(range_end));
    if let Some(site) = site_id {
        let ids = equipments::ids_under(db, site).await?;
        query = query.filter(maintenance_activity::Column::EquipmentId.is_in(ids));
    }
    let activities = query.all(db).await?;

    let all_locations = location::Entity::find().all(db).await?;
    let site_of_location = locations::site_map(&all_locations);
    let site_names: HashMap<i64, &str> = all_locations
        .iter()
        .filter(|l| l.is_site)
        .map(|l| (l.id, l.name.as_str()))
        .collect();
    let equipment_site: HashMap<i64, Option<i64>> = equipment::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|e| (e.id, e.location_id.and_then(|l| site_of_location.get(&l).copied())))
        .collect();

    let mut report = MaintenanceReport {
        from,
        to,
        site_id,
        total: activities.len(),
        by_status: BTreeMap::new(),
        by_priority: BTreeMap::new(),
        completed_in_range: 0,
        average_duration_hours: None,
        overdue: 0,
        per_site: Vec::new(),
    };
    let mut per_site: BTreeMap<String, SiteTotals> = BTreeMap::new();
    let mut durations = Vec::new();

    for a in &activities {
        *report.by_status.entry(a.status.clone()).or_insert(0) += 1;
        *report.by_priority.entry(a.priority.clone()).or_insert(0) += 1;

        let site_name = equipment_site
            .get(&a.equipment_id)
            .copied()
            .flatten()
            .and_then(|s| site_names.get(&s).copied())
            .unwrap_or(NO_SITE)
            .to_string();
        let totals = per_site.entry(site_name.clone()).or_insert_with(|| SiteTotals {
            site_name,
            ..Default::default()
        });
        totals.total += 1;

        if a.status() == ActivityStatus::Completed {
            totals.completed += 1;
            if a.actual_end.is_some_and(|end| end >= range_start && end < range_end) {
                report.completed_in_range += 1;
            }
            durations.push(a.duration_hours());
        }
        if a.is_overdue(now) {
            totals.overdue += 1;
            report.overdue += 1;
        }
    }

    if !durations.is_empty() {
        let avg = durations.iter().sum::<f64>() / durations.len() as f64;
        report.average_duration_hours = Some((avg * 100.0).round() / 100.0);
    }
    report.per_site = per_site.into_values().collect();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::entity::now_ts;
    use crate::service::activity::{self, tests::input};
    use crate::service::equipment::tests::{insert_equipment, insert_type};
    use crate::service::location::get_or_create_site;
    use crate::service::ts_date;

    #[tokio::test]
    async fn test_report_counts() {
        let db = connect_in_memory().await.unwrap();
        let (site, _) = get_or_create_site(&db, "North").await.unwrap();
        let at_site = insert_equipment(&db, "TX-N", Some(site.id)).await;
        let loose = insert_equipment(&db, "TX-L", None).await;
        let ty = insert_type(&db, "Oil Test", 30).await;
        let now = now_ts();

        let done = activity::create(&db, &input(at_site.id, ty.id, now - 3600 * 5), None).await.unwrap();
        activity::complete(&db, done, "ok").await.unwrap();
        activity::create(&db, &input(at_site.id, ty.id, now - 86_400 * 2), None).await.unwrap();
        activity::create(&db, &input(loose.id, ty.id, now + 3600), None).await.unwrap();

        let from = ts_date(now) - Duration::days(7);
        let to = ts_date(now) + Duration::days(1);
        let report = maintenance_report(&db, from, to, None, now).await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.by_status.get("completed"), Some(&1));
        assert_eq!(report.by_priority.get("high"), Some(&3));
        assert_eq!(report.completed_in_range, 1);
        assert_eq!(report.overdue, 1);
        assert!(report.average_duration_hours.is_some());
        assert_eq!(report.per_site.len(), 2);
        assert_eq!(report.per_site[0].site_name, NO_SITE);
        assert_eq!(report.per_site[1].total, 2);

        let filtered = maintenance_report(&db, from, to, Some(site.id), now).await.unwrap();
        assert_eq!(filtered.total, 2);

        assert!(maintenance_report(&db, to, from, None, now).await.is_err());
    }
}
