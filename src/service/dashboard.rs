//! Overview page aggregation
//!
//! Everything is computed from a handful of table scans and cached per
//! user and site filter. Writes elsewhere drop the `dashboard:` keys.

use chrono::Duration;
use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::cache::{dashboard_key, AppCache};
use crate::entity::dashboard_settings::{self, status_list};
use crate::entity::equipment::EquipmentStatus;
use crate::entity::maintenance_activity::{self, ActivityStatus};
use crate::entity::{calendar_event, equipment, location};
use crate::error::AppResult;
use crate::service::{date_time_ts, event, location as locations, settings, ts_date};

pub const NO_SITE: &str = "No Site";
const DAY: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Activity,
    Event,
}

/// One row in the urgent, upcoming or active lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardItem {
    pub kind: ItemKind,
    pub id: i64,
    pub title: String,
    pub equipment_id: i64,
    pub equipment: String,
    pub site_id: Option<i64>,
    pub site_name: String,
    pub location_path: Option<String>,
    pub status: String,
    pub priority: String,
    pub start: i64,
    pub due: i64,
    pub is_overdue: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemGroup {
    pub site_name: String,
    /// Items in this group before the per-site cap
    pub total: usize,
    pub items: Vec<DashboardItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Section {
    /// Items found before any cap
    pub total: usize,
    pub shown: usize,
    pub grouped: bool,
    pub groups: Vec<ItemGroup>,
    pub items: Vec<DashboardItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Warning,
    Critical,
}

impl Health {
    pub fn from_counts(overdue: usize, urgent: usize) -> Self {
        if overdue > 0 {
            Health::Critical
        } else if urgent > 0 {
            Health::Warning
        } else {
            Health::Healthy
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStatus {
    pub id: i64,
    pub name: String,
    pub equipment_count: usize,
    pub overdue: usize,
    pub urgent: usize,
    pub in_progress: usize,
    pub upcoming: usize,
    pub health: Health,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pods: Vec<SiteStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kpis {
    pub total_equipment: usize,
    pub active_equipment: usize,
    pub equipment_in_maintenance: usize,
    pub total_activities: u64,
    pub overdue: usize,
    pub due_soon: usize,
    pub completed_last_30_days: u64,
    pub upcoming_events: u64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Overview {
    pub equipment_by_status: BTreeMap<String, usize>,
    pub activities_by_status: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteOption {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardData {
    pub generated_at: i64,
    pub site_id: Option<i64>,
    pub sites: Vec<SiteOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgent: Option<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upcoming: Option<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_status: Option<Vec<SiteStatus>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpis: Option<Kpis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<Overview>,
}

/// Time windows derived from the settings row
#[derive(Debug, Clone)]
struct Windows {
    now: i64,
    urgent_end: i64,
    upcoming_end: i64,
    urgent_statuses: Vec<String>,
    upcoming_statuses: Vec<String>,
    active_statuses: Vec<String>,
}

impl Windows {
    fn new(settings: &dashboard_settings::Model, now: i64) -> Self {
        Self {
            now,
            urgent_end: now + i64::from(settings.urgent_days_ahead) * DAY,
            upcoming_end: now + i64::from(settings.upcoming_days_ahead) * DAY,
            urgent_statuses: status_list(&settings.urgent_statuses, "scheduled,pending,overdue"),
            upcoming_statuses: status_list(&settings.upcoming_statuses, "scheduled,pending"),
            active_statuses: status_list(&settings.active_statuses, "in_progress"),
        }
    }

    fn is_urgent(&self, a: &maintenance_activity::Model) -> bool {
        a.status() == ActivityStatus::Overdue
            || (self.urgent_statuses.contains(&a.status) && a.scheduled_start <= self.urgent_end)
    }

    fn is_upcoming(&self, a: &maintenance_activity::Model) -> bool {
        self.upcoming_statuses.contains(&a.status)
            && a.scheduled_start > self.urgent_end
            && a.scheduled_start <= self.upcoming_end
    }

    fn is_active(&self, a: &maintenance_activity::Model) -> bool {
        self.active_statuses.contains(&a.status)
    }
}

/// Lookup tables shared by the item builders
struct Context {
    equipment: HashMap<i64, equipment::Model>,
    paths: HashMap<i64, String>,
    site_of_location: HashMap<i64, i64>,
    site_names: HashMap<i64, String>,
}

impl Context {
    fn site_of_equipment(&self, equipment_id: i64) -> Option<i64> {
        self.equipment
            .get(&equipment_id)
            .and_then(|e| e.location_id)
            .and_then(|l| self.site_of_location.get(&l).copied())
    }

    fn item_base(&self, equipment_id: i64) -> (String, Option<i64>, String, Option<String>) {
        let eq = self.equipment.get(&equipment_id);
        let site_id = self.site_of_equipment(equipment_id);
        (
            eq.map(|e| e.name.clone()).unwrap_or_default(),
            site_id,
            site_id
                .and_then(|s| self.site_names.get(&s).cloned())
                .unwrap_or_else(|| NO_SITE.to_string()),
            eq.and_then(|e| e.location_id)
                .and_then(|l| self.paths.get(&l).cloned()),
        )
    }

    fn activity_item(&self, a: &maintenance_activity::Model, now: i64) -> DashboardItem {
        let (equipment, site_id, site_name, location_path) = self.item_base(a.equipment_id);
        DashboardItem {
            kind: ItemKind::Activity,
            id: a.id,
            title: a.title.clone(),
            equipment_id: a.equipment_id,
            equipment,
            site_id,
            site_name,
            location_path,
            status: a.status.clone(),
            priority: a.priority.clone(),
            start: a.scheduled_start,
            due: a.scheduled_end,
            is_overdue: a.is_overdue(now),
        }
    }

    fn event_item(&self, e: &calendar_event::Model, now: i64) -> DashboardItem {
        let (equipment, site_id, site_name, location_path) = self.item_base(e.equipment_id);
        let start = event_start(e);
        let due = e
            .end_time
            .map(|t| date_time_ts(e.event_date, t))
            .unwrap_or(start + DAY);
        DashboardItem {
            kind: ItemKind::Event,
            id: e.id,
            title: e.title.clone(),
            equipment_id: e.equipment_id,
            equipment,
            site_id,
            site_name,
            location_path,
            status: event::derived_status(e, None),
            priority: e.priority.clone(),
            start,
            due,
            is_overdue: event::is_overdue(e, None, now, ts_date(now)),
        }
    }
}

fn event_start(e: &calendar_event::Model) -> i64 {
    date_time_ts(e.event_date, e.start_time.unwrap_or(chrono::NaiveTime::MIN))
}

/// Sort, group and cap a list of items
pub fn build_section(mut items: Vec<DashboardItem>, grouped: bool, per_site: usize, total_cap: usize) -> Section {
    items.sort_by_key(|i| (i.start, i.id));
    let total = items.len();

    if !grouped {
        items.truncate(total_cap);
        return Section {
            total,
            shown: items.len(),
            grouped,
            groups: Vec::new(),
            items,
        };
    }

    let mut by_site: BTreeMap<String, Vec<DashboardItem>> = BTreeMap::new();
    for item in items {
        by_site.entry(item.site_name.clone()).or_default().push(item);
    }
    // Unassigned equipment goes last
    let no_site = by_site.remove(NO_SITE);

    let mut budget = total_cap;
    let mut groups = Vec::new();
    for (site_name, mut list) in by_site.into_iter().chain(no_site.map(|l| (NO_SITE.to_string(), l))) {
        let group_total = list.len();
        list.truncate(per_site.min(budget));
        budget -= list.len();
        groups.push(ItemGroup {
            site_name,
            total: group_total,
            items: list,
        });
    }

    let shown = groups.iter().map(|g| g.items.len()).sum();
    Section {
        total,
        shown,
        grouped,
        groups,
        items: Vec::new(),
    }
}

#[allow(clippy::too_many_arguments)]
fn section(
    ctx: &Context,
    activities: &[maintenance_activity::Model],
    events: &[calendar_event::Model],
    now: i64,
    keep: impl Fn(&maintenance_activity::Model) -> bool,
    keep_event: impl Fn(i64) -> bool,
    grouped: bool,
    per_site: i32,
    cap: i32,
) -> Section {
    let mut items: Vec<DashboardItem> = activities
        .iter()
        .filter(|a| keep(a))
        .map(|a| ctx.activity_item(a, now))
        .collect();
    items.extend(
        events
            .iter()
            .filter(|e| keep_event(event_start(e)))
            .map(|e| ctx.event_item(e, now)),
    );
    build_section(items, grouped, per_site.max(0) as usize, cap.max(0) as usize)
}

fn summarize(
    id: i64,
    name: &str,
    equipment_ids: &HashSet<i64>,
    open: &[maintenance_activity::Model],
    windows: &Windows,
) -> SiteStatus {
    let mut status = SiteStatus {
        id,
        name: name.to_string(),
        equipment_count: equipment_ids.len(),
        overdue: 0,
        urgent: 0,
        in_progress: 0,
        upcoming: 0,
        health: Health::Healthy,
        pods: Vec::new(),
    };
    for a in open.iter().filter(|a| equipment_ids.contains(&a.equipment_id)) {
        let s = a.status();
        if a.is_overdue(windows.now) {
            status.overdue += 1;
        } else if s == ActivityStatus::InProgress {
            status.in_progress += 1;
        } else if a.scheduled_start <= windows.urgent_end {
            status.urgent += 1;
        } else if a.scheduled_start <= windows.upcoming_end {
            status.upcoming += 1;
        }
    }
    status.health = Health::from_counts(status.overdue, status.urgent);
    status
}

fn equipment_under(all_locations: &[location::Model], root: i64, equipment: &HashMap<i64, equipment::Model>) -> HashSet<i64> {
    let under = locations::descendant_ids(all_locations, root);
    equipment
        .values()
        .filter(|e| e.location_id.is_some_and(|l| under.contains(&l)))
        .map(|e| e.id)
        .collect()
}

/// Compute the dashboard for an optional site without touching the cache
pub async fn build<C: ConnectionTrait>(db: &C, site_id: Option<i64>, now: i64) -> AppResult<DashboardData> {
    let settings = settings::dashboard(db).await?;
    let windows = Windows::new(&settings, now);

    let all_locations = location::Entity::find().all(db).await?;
    let paths = locations::path_map(&all_locations);
    let site_of_location = locations::site_map(&all_locations);
    let sites: Vec<&location::Model> = all_locations
        .iter()
        .filter(|l| l.is_site && l.is_active)
        .collect();
    let site_names: HashMap<i64, String> = all_locations
        .iter()
        .filter(|l| l.is_site)
        .map(|l| (l.id, l.name.clone()))
        .collect();

    let mut equipment: HashMap<i64, equipment::Model> = equipment::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|e| (e.id, e))
        .collect();
    if let Some(site) = site_id {
        equipment.retain(|_, e| {
            e.location_id
                .and_then(|l| site_of_location.get(&l))
                .is_some_and(|s| *s == site)
        });
    }
    let equipment_ids: Vec<i64> = equipment.keys().copied().collect();
    let ctx = Context {
        equipment,
        paths,
        site_of_location,
        site_names,
    };

    let mut wanted: HashSet<String> = ActivityStatus::open_statuses()
        .into_iter()
        .map(str::to_string)
        .collect();
    wanted.extend(windows.urgent_statuses.iter().cloned());
    wanted.extend(windows.upcoming_statuses.iter().cloned());
    wanted.extend(windows.active_statuses.iter().cloned());

    let activities: Vec<maintenance_activity::Model> = maintenance_activity::Entity::find()
        .filter(maintenance_activity::Column::Status.is_in(wanted))
        .filter(maintenance_activity::Column::EquipmentId.is_in(equipment_ids.clone()))
        .all(db)
        .await?;
    let open: Vec<maintenance_activity::Model> = activities
        .iter()
        .filter(|a| !a.status().is_closed())
        .cloned()
        .collect();

    let events: Vec<calendar_event::Model> = calendar_event::Entity::find()
        .filter(calendar_event::Column::IsCompleted.eq(false))
        .filter(calendar_event::Column::MaintenanceActivityId.is_null())
        .filter(calendar_event::Column::EquipmentId.is_in(equipment_ids.clone()))
        .filter(calendar_event::Column::EventDate.lte(ts_date(windows.upcoming_end)))
        .all(db)
        .await?;

    let urgent = settings.show_urgent_items.then(|| {
        section(
            &ctx,
            &activities,
            &events,
            now,
            |a| windows.is_urgent(a),
            |start| start <= windows.urgent_end,
            settings.group_urgent_by_site,
            settings.max_urgent_items_per_site,
            settings.max_urgent_items_total,
        )
    });
    let upcoming = settings.show_upcoming_items.then(|| {
        section(
            &ctx,
            &activities,
            &events,
            now,
            |a| windows.is_upcoming(a),
            |start| start > windows.urgent_end && start <= windows.upcoming_end,
            settings.group_upcoming_by_site,
            settings.max_upcoming_items_per_site,
            settings.max_upcoming_items_total,
        )
    });
    let active = settings.show_active_items.then(|| {
        section(
            &ctx,
            &activities,
            &events,
            now,
            |a| windows.is_active(a),
            |_| false,
            settings.group_active_by_site,
            settings.max_active_items_per_site,
            settings.max_active_items_total,
        )
    });

    let site_status = settings.show_site_status.then(|| {
        sites
            .iter()
            .filter(|s| site_id.map_or(true, |id| id == s.id))
            .map(|site| {
                let ids = equipment_under(&all_locations, site.id, &ctx.equipment);
                let mut status = summarize(site.id, &site.name, &ids, &open, &windows);
                let mut pods: Vec<&location::Model> = all_locations
                    .iter()
                    .filter(|l| l.parent_id == Some(site.id))
                    .collect();
                pods.sort_by(|a, b| a.name.cmp(&b.name));
                status.pods = pods
                    .into_iter()
                    .map(|pod| {
                        let ids = equipment_under(&all_locations, pod.id, &ctx.equipment);
                        summarize(pod.id, &pod.name, &ids, &open, &windows)
                    })
                    .collect();
                status
            })
            .collect()
    });

    let kpis = if settings.show_kpi_cards {
        Some(kpis(db, &ctx, &equipment_ids, &open, &windows, &settings).await?)
    } else {
        None
    };

    let overview = settings.show_overview_data.then(|| {
        let mut equipment_by_status = BTreeMap::new();
        for e in ctx.equipment.values() {
            *equipment_by_status.entry(e.status.clone()).or_insert(0) += 1;
        }
        let mut activities_by_status = BTreeMap::new();
        for a in &activities {
            *activities_by_status.entry(a.status.clone()).or_insert(0) += 1;
        }
        Overview {
            equipment_by_status,
            activities_by_status,
        }
    });

    let mut site_options: Vec<SiteOption> = sites
        .iter()
        .map(|s| SiteOption {
            id: s.id,
            name: s.name.clone(),
        })
        .collect();
    site_options.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(DashboardData {
        generated_at: now,
        site_id,
        sites: site_options,
        urgent,
        upcoming,
        active,
        site_status,
        kpis,
        overview,
    })
}

async fn kpis<C: ConnectionTrait>(
    db: &C,
    ctx: &Context,
    equipment_ids: &[i64],
    open: &[maintenance_activity::Model],
    windows: &Windows,
    settings: &dashboard_settings::Model,
) -> AppResult<Kpis> {
    let in_scope = Condition::all().add(maintenance_activity::Column::EquipmentId.is_in(equipment_ids.to_vec()));

    let total_activities = maintenance_activity::Entity::find()
        .filter(in_scope.clone())
        .count(db)
        .await?;
    let completed_last_30_days = maintenance_activity::Entity::find()
        .filter(in_scope)
        .filter(maintenance_activity::Column::Status.eq(ActivityStatus::Completed.as_str()))
        .filter(maintenance_activity::Column::ActualEnd.gte(windows.now - 30 * DAY))
        .count(db)
        .await?;

    let today = ts_date(windows.now);
    let upcoming_events = calendar_event::Entity::find()
        .filter(calendar_event::Column::EquipmentId.is_in(equipment_ids.to_vec()))
        .filter(calendar_event::Column::IsCompleted.eq(false))
        .filter(calendar_event::Column::EventDate.gte(today))
        .filter(calendar_event::Column::EventDate.lte(today + Duration::days(i64::from(settings.upcoming_days_ahead))))
        .count(db)
        .await?;

    let overdue = open.iter().filter(|a| a.is_overdue(windows.now)).count();
    let due_soon = open
        .iter()
        .filter(|a| !a.is_overdue(windows.now) && a.scheduled_start <= windows.urgent_end)
        .count();

    Ok(Kpis {
        total_equipment: ctx.equipment.len(),
        active_equipment: ctx
            .equipment
            .values()
            .filter(|e| e.is_active && e.status() == EquipmentStatus::Active)
            .count(),
        equipment_in_maintenance: ctx
            .equipment
            .values()
            .filter(|e| e.status() == EquipmentStatus::Maintenance)
            .count(),
        total_activities,
        overdue,
        due_soon,
        completed_last_30_days,
        upcoming_events,
        completion_rate: completion_rate(completed_last_30_days, overdue as u64),
    })
}

/// completed / (completed + overdue) as a percentage, 100 with no data
pub fn completion_rate(completed: u64, overdue: u64) -> f64 {
    let denominator = completed + overdue;
    if denominator == 0 {
        100.0
    } else {
        (completed as f64 / denominator as f64 * 1000.0).round() / 10.0
    }
}

/// Cached dashboard for a user. The site defaults to the user's default site.
pub async fn load<C: ConnectionTrait>(
    db: &C,
    cache: &AppCache,
    user_id: i64,
    site_id: Option<i64>,
    now: i64,
) -> AppResult<DashboardData> {
    let key = dashboard_key(user_id, site_id);
    match cache.get::<DashboardData>(&key).await {
        Ok(Some(hit)) => return Ok(hit),
        Ok(None) => {}
        Err(e) => tracing::warn!("Dashboard cache read failed: {}", e),
    }

    let data = build(db, site_id, now).await?;
    if let Err(e) = cache.set(&key, &data).await {
        tracing::warn!("Dashboard cache write failed: {}", e);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::db::connect_in_memory;
    use crate::entity::now_ts;
    use crate::service::activity::{self, tests::input};
    use crate::service::equipment::tests::{insert_equipment, insert_type};
    use crate::service::location::{get_or_create_child, get_or_create_site};
    use serde_json::json;

    fn item(id: i64, site: &str, start: i64) -> DashboardItem {
        DashboardItem {
            kind: ItemKind::Activity,
            id,
            title: format!("item {}", id),
            equipment_id: 1,
            equipment: "TX".to_string(),
            site_id: None,
            site_name: site.to_string(),
            location_path: None,
            status: "scheduled".to_string(),
            priority: "medium".to_string(),
            start,
            due: start + 3600,
            is_overdue: false,
        }
    }

    #[test]
    fn test_health_rule() {
        assert_eq!(Health::from_counts(1, 5), Health::Critical);
        assert_eq!(Health::from_counts(0, 1), Health::Warning);
        assert_eq!(Health::from_counts(0, 0), Health::Healthy);
    }

    #[test]
    fn test_completion_rate() {
        assert_eq!(completion_rate(0, 0), 100.0);
        assert_eq!(completion_rate(3, 1), 75.0);
        assert_eq!(completion_rate(1, 2), 33.3);
    }

    #[test]
    fn test_section_caps() {
        let items: Vec<DashboardItem> = (0..6)
            .map(|i| item(i, if i % 2 == 0 { "North" } else { NO_SITE }, 100 - i))
            .collect();

        let flat = build_section(items.clone(), false, 2, 4);
        assert_eq!(flat.total, 6);
        assert_eq!(flat.shown, 4);
        assert_eq!(flat.items[0].id, 5);

        let grouped = build_section(items, true, 2, 3);
        assert_eq!(grouped.total, 6);
        assert_eq!(grouped.shown, 3);
        assert_eq!(grouped.groups[0].site_name, "North");
        assert_eq!(grouped.groups[0].total, 3);
        assert_eq!(grouped.groups[0].items.len(), 2);
        assert_eq!(grouped.groups[1].site_name, NO_SITE);
        assert_eq!(grouped.groups[1].items.len(), 1);
    }

    #[tokio::test]
    async fn test_build_sections_and_site_status() {
        let db = connect_in_memory().await.unwrap();
        let (site, _) = get_or_create_site(&db, "North").await.unwrap();
        let (pod, _) = get_or_create_child(&db, &site, "POD 1").await.unwrap();
        let eq = insert_equipment(&db, "TX-01", Some(pod.id)).await;
        let ty = insert_type(&db, "Oil Test", 30).await;
        let now = now_ts();

        // Overdue, urgent, upcoming and in progress
        activity::create(&db, &input(eq.id, ty.id, now - 10 * DAY), None).await.unwrap();
        activity::create(&db, &input(eq.id, ty.id, now + 2 * DAY), None).await.unwrap();
        activity::create(&db, &input(eq.id, ty.id, now + 20 * DAY), None).await.unwrap();
        let running = activity::create(&db, &input(eq.id, ty.id, now + 3 * DAY), None).await.unwrap();
        activity::start(&db, running).await.unwrap();

        let data = build(&db, None, now).await.unwrap();
        let urgent = data.urgent.unwrap();
        assert_eq!(urgent.total, 2);
        assert_eq!(urgent.groups[0].site_name, "North");
        assert_eq!(data.upcoming.unwrap().total, 1);
        assert_eq!(data.active.unwrap().total, 1);

        let status = &data.site_status.unwrap()[0];
        assert_eq!(status.equipment_count, 1);
        assert_eq!(status.overdue, 1);
        assert_eq!(status.in_progress, 1);
        assert_eq!(status.upcoming, 1);
        assert_eq!(status.health, Health::Critical);
        assert_eq!(status.pods[0].name, "POD 1");
        assert_eq!(status.pods[0].overdue, 1);

        let kpis = data.kpis.unwrap();
        assert_eq!(kpis.total_equipment, 1);
        assert_eq!(kpis.total_activities, 4);
        assert_eq!(kpis.overdue, 1);
        assert_eq!(kpis.completion_rate, 0.0);
    }

    #[tokio::test]
    async fn test_toggles_and_site_filter() {
        let db = connect_in_memory().await.unwrap();
        let (north, _) = get_or_create_site(&db, "North").await.unwrap();
        let (south, _) = get_or_create_site(&db, "South").await.unwrap();
        insert_equipment(&db, "TX-N", Some(north.id)).await;
        insert_equipment(&db, "TX-S", Some(south.id)).await;
        settings::update_dashboard(&db, json!({"show_kpi_cards": false, "show_active_items": false}))
            .await
            .unwrap();

        let data = build(&db, Some(south.id), now_ts()).await.unwrap();
        assert!(data.kpis.is_none());
        assert!(data.active.is_none());
        let status = data.site_status.unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].name, "South");
        assert_eq!(data.overview.unwrap().equipment_by_status.get("active"), Some(&1));
        assert_eq!(data.sites.len(), 2);
    }

    #[tokio::test]
    async fn test_load_uses_cache() {
        let db = connect_in_memory().await.unwrap();
        let cache = AppCache::new(&CacheConfig {
            ttl_secs: 60,
            max_capacity: 100,
        });
        let first = load(&db, &cache, 1, None, 1000).await.unwrap();
        let second = load(&db, &cache, 1, None, 2000).await.unwrap();
        assert_eq!(first.generated_at, second.generated_at);

        cache.invalidate_dashboards().await;
        let third = load(&db, &cache, 1, None, 3000).await.unwrap();
        assert_eq!(third.generated_at, 3000);
    }
}
