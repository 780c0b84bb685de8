//! Site / location hierarchy
//!
//! Sites are roots. Every other node has a parent, the chain never loops
//! and never grows deeper than [`MAX_DEPTH`].

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::entity::{customer, equipment, location, now_ts};
use crate::error::{AppError, AppResult};

pub const MAX_DEPTH: usize = 10;
pub const PATH_SEPARATOR: &str = " > ";
pub const MAX_POD_COUNT: u32 = 100;
pub const MAX_MDCS_PER_POD: u32 = 50;

/// Fields accepted when creating or updating a location
#[derive(Debug, Clone, Deserialize)]
pub struct LocationInput {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub is_site: bool,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl LocationInput {
    pub fn site(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent_id: None,
            customer_id: None,
            is_site: true,
            latitude: None,
            longitude: None,
            address: String::new(),
            is_active: true,
        }
    }

    pub fn child(name: &str, parent_id: i64) -> Self {
        Self {
            parent_id: Some(parent_id),
            is_site: false,
            ..Self::site(name)
        }
    }
}

/// Location with its derived path, site and customer
#[derive(Debug, Clone, Serialize)]
pub struct LocationDetail {
    #[serde(flatten)]
    pub location: location::Model,
    pub full_path: String,
    pub site: Option<location::Model>,
    pub effective_customer: Option<customer::Model>,
    pub customer_display: String,
    pub children_count: u64,
    pub equipment_count: u64,
}

/// Result of [`generate_pods`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PodSummary {
    pub sites: usize,
    pub pods_created: usize,
    pub mdcs_created: usize,
}

/// Result of resolving an "A > B > C" path
#[derive(Debug, Clone)]
pub struct PathResolution {
    pub location: location::Model,
    pub sites_created: usize,
    pub locations_created: usize,
}

pub async fn validate<C: ConnectionTrait>(
    db: &C,
    input: &LocationInput,
    self_id: Option<i64>,
) -> AppResult<()> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Location name is required"));
    }
    if name.chars().count() > 200 {
        return Err(AppError::validation("Location name must be at most 200 characters"));
    }

    if input.is_site && input.parent_id.is_some() {
        return Err(AppError::validation("Site locations cannot have a parent location"));
    }
    if !input.is_site && input.parent_id.is_none() {
        return Err(AppError::validation("Non-site locations must have a parent location"));
    }

    if let Some(lat) = input.latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(AppError::validation("Latitude must be between -90 and 90"));
        }
    }
    if let Some(lon) = input.longitude {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(AppError::validation("Longitude must be between -180 and 180"));
        }
    }

    if let Some(parent_id) = input.parent_id {
        if Some(parent_id) == self_id {
            return Err(AppError::validation("A location cannot be its own parent"));
        }
        let parent = location::Entity::find_by_id(parent_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::validation("Parent location does not exist"))?;

        let chain = ancestors(db, &parent).await?;
        if let Some(id) = self_id {
            if chain.iter().any(|l| l.id == id) {
                return Err(AppError::validation(
                    "Circular reference: the parent is a descendant of this location",
                ));
            }
        }
        if chain.len() + 1 > MAX_DEPTH {
            return Err(AppError::validation(format!(
                "Location hierarchy cannot be deeper than {} levels",
                MAX_DEPTH
            )));
        }
    }

    if let Some(customer_id) = input.customer_id {
        if customer::Entity::find_by_id(customer_id).one(db).await?.is_none() {
            return Err(AppError::validation("Customer does not exist"));
        }
    }

    if let Some(existing) = find_sibling(db, input.parent_id, name).await? {
        if Some(existing.id) != self_id {
            return Err(AppError::Conflict(format!(
                "A location named '{}' already exists at this level",
                name
            )));
        }
    }

    Ok(())
}

async fn find_sibling<C: ConnectionTrait>(
    db: &C,
    parent_id: Option<i64>,
    name: &str,
) -> Result<Option<location::Model>, sea_orm::DbErr> {
    let query = location::Entity::find().filter(location::Column::Name.eq(name));
    let query = match parent_id {
        Some(pid) => query.filter(location::Column::ParentId.eq(pid)),
        None => query.filter(location::Column::ParentId.is_null()),
    };
    query.one(db).await
}

pub async fn create<C: ConnectionTrait>(db: &C, input: &LocationInput) -> AppResult<location::Model> {
    validate(db, input, None).await?;
    let now = now_ts();

    let model = location::ActiveModel {
        name: Set(input.name.trim().to_string()),
        parent_id: Set(input.parent_id),
        customer_id: Set(input.customer_id),
        is_site: Set(input.is_site),
        latitude: Set(input.latitude),
        longitude: Set(input.longitude),
        address: Set(input.address.clone()),
        is_active: Set(input.is_active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(model)
}

pub async fn update<C: ConnectionTrait>(
    db: &C,
    existing: location::Model,
    input: &LocationInput,
) -> AppResult<location::Model> {
    validate(db, input, Some(existing.id)).await?;

    let mut active: location::ActiveModel = existing.into();
    active.name = Set(input.name.trim().to_string());
    active.parent_id = Set(input.parent_id);
    active.customer_id = Set(input.customer_id);
    active.is_site = Set(input.is_site);
    active.latitude = Set(input.latitude);
    active.longitude = Set(input.longitude);
    active.address = Set(input.address.clone());
    active.is_active = Set(input.is_active);
    active.updated_at = Set(now_ts());

    Ok(active.update(db).await?)
}

/// Refuse deletion while children or equipment still point at the location
pub async fn ensure_deletable<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<()> {
    let children = location::Entity::find()
        .filter(location::Column::ParentId.eq(id))
        .count(db)
        .await?;
    if children > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete a location with {} child locations",
            children
        )));
    }

    let equipment = equipment::Entity::find()
        .filter(equipment::Column::LocationId.eq(id))
        .count(db)
        .await?;
    if equipment > 0 {
        return Err(AppError::Conflict(format!(
            "Cannot delete a location with {} equipment items",
            equipment
        )));
    }

    Ok(())
}

/// Chain from the root down to `loc`, inclusive
pub async fn ancestors<C: ConnectionTrait>(
    db: &C,
    loc: &location::Model,
) -> Result<Vec<location::Model>, sea_orm::DbErr> {
    let mut chain = vec![loc.clone()];
    let mut seen = HashSet::from([loc.id]);
    let mut current = loc.parent_id;

    while let Some(pid) = current {
        if !seen.insert(pid) || chain.len() > MAX_DEPTH {
            break;
        }
        match location::Entity::find_by_id(pid).one(db).await? {
            Some(parent) => {
                current = parent.parent_id;
                chain.push(parent);
            }
            None => break,
        }
    }

    chain.reverse();
    Ok(chain)
}

pub fn path_of(chain: &[location::Model]) -> String {
    chain
        .iter()
        .map(|l| l.name.as_str())
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

pub async fn full_path<C: ConnectionTrait>(db: &C, loc: &location::Model) -> Result<String, sea_orm::DbErr> {
    Ok(path_of(&ancestors(db, loc).await?))
}

/// The root of the chain, when that root is a site
pub async fn site_location<C: ConnectionTrait>(
    db: &C,
    loc: &location::Model,
) -> Result<Option<location::Model>, sea_orm::DbErr> {
    let chain = ancestors(db, loc).await?;
    Ok(chain.into_iter().next().filter(|root| root.is_site))
}

/// First customer found walking up from the location. The flag is true
/// when the customer is set on the location itself.
pub async fn effective_customer<C: ConnectionTrait>(
    db: &C,
    loc: &location::Model,
) -> Result<Option<(customer::Model, bool)>, sea_orm::DbErr> {
    let chain = ancestors(db, loc).await?;
    for node in chain.iter().rev() {
        if let Some(customer_id) = node.customer_id {
            if let Some(c) = customer::Entity::find_by_id(customer_id).one(db).await? {
                return Ok(Some((c, node.id == loc.id)));
            }
        }
    }
    Ok(None)
}

pub fn customer_display(customer: Option<&(customer::Model, bool)>) -> String {
    match customer {
        Some((c, true)) => format!("Direct: {}", c.name),
        Some((c, false)) => format!("Inherited: {}", c.name),
        None => "No customer assigned".to_string(),
    }
}

pub async fn detail<C: ConnectionTrait>(db: &C, loc: location::Model) -> AppResult<LocationDetail> {
    let chain = ancestors(db, &loc).await?;
    let full_path = path_of(&chain);
    let site = chain.first().filter(|root| root.is_site).cloned();
    let customer = effective_customer(db, &loc).await?;
    let customer_display = customer_display(customer.as_ref());

    let children_count = location::Entity::find()
        .filter(location::Column::ParentId.eq(loc.id))
        .count(db)
        .await?;
    let equipment_count = equipment::Entity::find()
        .filter(equipment::Column::LocationId.eq(loc.id))
        .count(db)
        .await?;

    Ok(LocationDetail {
        location: loc,
        full_path,
        site,
        effective_customer: customer.map(|(c, _)| c),
        customer_display,
        children_count,
        equipment_count,
    })
}

/// Path string for every location id, computed from one table scan
pub fn path_map(all: &[location::Model]) -> HashMap<i64, String> {
    let by_id: HashMap<i64, &location::Model> = all.iter().map(|l| (l.id, l)).collect();
    let mut paths = HashMap::with_capacity(all.len());

    for loc in all {
        let mut names = vec![loc.name.as_str()];
        let mut current = loc.parent_id;
        let mut depth = 0;
        while let Some(pid) = current {
            depth += 1;
            if depth > MAX_DEPTH {
                break;
            }
            match by_id.get(&pid) {
                Some(parent) => {
                    names.push(parent.name.as_str());
                    current = parent.parent_id;
                }
                None => break,
            }
        }
        names.reverse();
        paths.insert(loc.id, names.join(PATH_SEPARATOR));
    }

    paths
}

/// Site id for every location id, computed from one table scan
pub fn site_map(all: &[location::Model]) -> HashMap<i64, i64> {
    let by_id: HashMap<i64, &location::Model> = all.iter().map(|l| (l.id, l)).collect();
    let mut sites = HashMap::with_capacity(all.len());

    for loc in all {
        let mut root = loc;
        let mut depth = 0;
        while let Some(parent) = root.parent_id.and_then(|pid| by_id.get(&pid)) {
            depth += 1;
            if depth > MAX_DEPTH {
                break;
            }
            root = parent;
        }
        if root.is_site {
            sites.insert(loc.id, root.id);
        }
    }

    sites
}

/// Ids of `root` and everything below it
pub fn descendant_ids(all: &[location::Model], root: i64) -> HashSet<i64> {
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for loc in all {
        if let Some(pid) = loc.parent_id {
            children.entry(pid).or_default().push(loc.id);
        }
    }

    let mut ids = HashSet::from([root]);
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        for child in children.get(&id).into_iter().flatten() {
            if ids.insert(*child) {
                stack.push(*child);
            }
        }
    }
    ids
}

/// Build the location forest, sites first and names in order
pub fn build_tree(mut all: Vec<location::Model>) -> Vec<location::LocationTree> {
    all.sort_by(|a, b| a.name.cmp(&b.name));
    let ids: HashSet<i64> = all.iter().map(|l| l.id).collect();

    let mut by_parent: HashMap<Option<i64>, Vec<location::Model>> = HashMap::new();
    for loc in all {
        // Orphans surface at the top level instead of disappearing
        let key = loc.parent_id.filter(|pid| ids.contains(pid));
        by_parent.entry(key).or_default().push(loc);
    }

    fn attach(
        node: location::Model,
        by_parent: &mut HashMap<Option<i64>, Vec<location::Model>>,
        depth: usize,
    ) -> location::LocationTree {
        let id = node.id;
        let mut tree = location::LocationTree::from(node);
        if depth < MAX_DEPTH {
            if let Some(children) = by_parent.remove(&Some(id)) {
                tree.children = children
                    .into_iter()
                    .map(|c| attach(c, by_parent, depth + 1))
                    .collect();
            }
        }
        tree
    }

    let mut roots = by_parent.remove(&None).unwrap_or_default();
    roots.sort_by_key(|l| !l.is_site);
    roots
        .into_iter()
        .map(|r| attach(r, &mut by_parent, 1))
        .collect()
}

pub async fn get_or_create_site<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> AppResult<(location::Model, bool)> {
    let name = name.trim();
    if let Some(existing) = location::Entity::find()
        .filter(location::Column::Name.eq(name))
        .filter(location::Column::ParentId.is_null())
        .one(db)
        .await?
    {
        return Ok((existing, false));
    }
    Ok((create(db, &LocationInput::site(name)).await?, true))
}

pub async fn get_or_create_child<C: ConnectionTrait>(
    db: &C,
    parent: &location::Model,
    name: &str,
) -> AppResult<(location::Model, bool)> {
    let name = name.trim();
    if let Some(existing) = find_sibling(db, Some(parent.id), name).await? {
        return Ok((existing, false));
    }
    Ok((create(db, &LocationInput::child(name, parent.id)).await?, true))
}

/// Split "A > B > C" into trimmed, non-empty segments
pub fn split_path(path: &str) -> Vec<String> {
    path.split('>')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Get-or-create every segment of a path. The first segment is a site.
pub async fn resolve_path<C: ConnectionTrait>(db: &C, path: &str) -> AppResult<Option<PathResolution>> {
    let segments = split_path(path);
    let Some((first, rest)) = segments.split_first() else {
        return Ok(None);
    };
    if segments.len() > MAX_DEPTH {
        return Err(AppError::validation(format!(
            "Location path has more than {} levels",
            MAX_DEPTH
        )));
    }

    let (mut current, site_created) = get_or_create_site(db, first).await?;
    let mut resolution = PathResolution {
        location: current.clone(),
        sites_created: usize::from(site_created),
        locations_created: 0,
    };

    for segment in rest {
        let (child, created) = get_or_create_child(db, &current, segment).await?;
        if created {
            resolution.locations_created += 1;
        }
        current = child;
    }

    resolution.location = current;
    Ok(Some(resolution))
}

fn is_pod_name(name: &str) -> bool {
    name.strip_prefix("POD ")
        .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// Create `POD n` children under every active site and `MDC k` under each pod
pub async fn generate_pods<C: ConnectionTrait>(
    db: &C,
    pod_count: u32,
    mdcs_per_pod: u32,
    force: bool,
) -> AppResult<PodSummary> {
    if !(1..=MAX_POD_COUNT).contains(&pod_count) {
        return Err(AppError::validation(format!(
            "Pod count must be between 1 and {}",
            MAX_POD_COUNT
        )));
    }
    if !(1..=MAX_MDCS_PER_POD).contains(&mdcs_per_pod) {
        return Err(AppError::validation(format!(
            "MDCs per pod must be between 1 and {}",
            MAX_MDCS_PER_POD
        )));
    }

    let sites = location::Entity::find()
        .filter(location::Column::IsSite.eq(true))
        .filter(location::Column::IsActive.eq(true))
        .order_by_asc(location::Column::Name)
        .all(db)
        .await?;

    let mut summary = PodSummary {
        sites: sites.len(),
        ..Default::default()
    };

    for site in &sites {
        if force {
            remove_pods(db, site.id).await?;
        }

        for n in 1..=pod_count {
            let (pod, created) = get_or_create_child(db, site, &format!("POD {}", n)).await?;
            if created {
                summary.pods_created += 1;
            }
            for k in (n - 1) * mdcs_per_pod + 1..=n * mdcs_per_pod {
                let (_, created) = get_or_create_child(db, &pod, &format!("MDC {}", k)).await?;
                if created {
                    summary.mdcs_created += 1;
                }
            }
        }
    }

    tracing::info!(
        "Pod generation: {} sites, {} pods created, {} MDCs created",
        summary.sites,
        summary.pods_created,
        summary.mdcs_created
    );
    Ok(summary)
}

/// Delete the pods of a site and their MDCs. Equipment housed there is
/// detached from its location.
async fn remove_pods<C: ConnectionTrait>(db: &C, site_id: i64) -> AppResult<()> {
    let pods: Vec<location::Model> = location::Entity::find()
        .filter(location::Column::ParentId.eq(site_id))
        .all(db)
        .await?
        .into_iter()
        .filter(|p| is_pod_name(&p.name))
        .collect();
    if pods.is_empty() {
        return Ok(());
    }

    let pod_ids: Vec<i64> = pods.iter().map(|p| p.id).collect();
    let mdc_ids: Vec<i64> = location::Entity::find()
        .filter(location::Column::ParentId.is_in(pod_ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .map(|m| m.id)
        .collect();

    let mut all_ids = pod_ids.clone();
    all_ids.extend(mdc_ids.iter().copied());

    equipment::Entity::update_many()
        .col_expr(equipment::Column::LocationId, sea_orm::sea_query::Expr::value(Option::<i64>::None))
        .filter(equipment::Column::LocationId.is_in(all_ids))
        .exec(db)
        .await?;

    location::Entity::delete_many()
        .filter(location::Column::Id.is_in(mdc_ids))
        .exec(db)
        .await?;
    location::Entity::delete_many()
        .filter(location::Column::Id.is_in(pod_ids))
        .exec(db)
        .await?;

    Ok(())
}

/// Customer fields accepted by create/update
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

pub async fn save_customer<C: ConnectionTrait>(
    db: &C,
    existing: Option<customer::Model>,
    input: &CustomerInput,
) -> AppResult<customer::Model> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Customer name is required"));
    }
    let code = if input.code.trim().is_empty() {
        customer::code_from_name(name)
    } else {
        input.code.trim().to_string()
    };
    let self_id = existing.as_ref().map(|c| c.id);

    if let Some(other) = customer::Entity::find()
        .filter(customer::Column::Name.eq(name))
        .one(db)
        .await?
    {
        if Some(other.id) != self_id {
            return Err(AppError::Conflict(format!("Customer '{}' already exists", name)));
        }
    }
    if let Some(other) = customer::Entity::find()
        .filter(customer::Column::Code.eq(&code))
        .one(db)
        .await?
    {
        if Some(other.id) != self_id {
            return Err(AppError::Conflict(format!("Customer code '{}' is already in use", code)));
        }
    }

    let now = now_ts();
    let is_new = existing.is_none();
    let mut active: customer::ActiveModel = match existing {
        Some(c) => c.into(),
        None => customer::ActiveModel {
            created_at: Set(now),
            ..Default::default()
        },
    };
    active.name = Set(name.to_string());
    active.code = Set(code);
    active.contact_email = Set(input.contact_email.trim().to_string());
    active.contact_phone = Set(input.contact_phone.trim().to_string());
    active.address = Set(input.address.clone());
    active.is_active = Set(input.is_active);
    active.updated_at = Set(now);

    let saved = if is_new {
        active.insert(db).await?
    } else {
        active.update(db).await?
    };
    Ok(saved)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    #[tokio::test]
    async fn test_site_and_child_rules() {
        let db = connect_in_memory().await.unwrap();

        let mut bad_site = LocationInput::site("North");
        bad_site.parent_id = Some(1);
        assert!(matches!(create(&db, &bad_site).await, Err(AppError::Validation(_))));

        let mut orphan = LocationInput::site("Room");
        orphan.is_site = false;
        assert!(matches!(create(&db, &orphan).await, Err(AppError::Validation(_))));

        let site = create(&db, &LocationInput::site("  North  ")).await.unwrap();
        assert_eq!(site.name, "North");
        let room = create(&db, &LocationInput::child("Room 1", site.id)).await.unwrap();

        let dup = create(&db, &LocationInput::child("Room 1", site.id)).await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));

        assert_eq!(full_path(&db, &room).await.unwrap(), "North > Room 1");
        assert_eq!(site_location(&db, &room).await.unwrap().map(|s| s.id), Some(site.id));
    }

    #[tokio::test]
    async fn test_coordinates_and_cycles() {
        let db = connect_in_memory().await.unwrap();
        let site = create(&db, &LocationInput::site("S")).await.unwrap();
        let a = create(&db, &LocationInput::child("A", site.id)).await.unwrap();
        let b = create(&db, &LocationInput::child("B", a.id)).await.unwrap();

        let mut far = LocationInput::site("Far");
        far.latitude = Some(91.0);
        assert!(create(&db, &far).await.is_err());

        // Moving A under its own child B would loop
        let looped = LocationInput::child("A", b.id);
        assert!(matches!(update(&db, a, &looped).await, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let db = connect_in_memory().await.unwrap();
        let mut parent = create(&db, &LocationInput::site("L1")).await.unwrap();
        for level in 2..=MAX_DEPTH {
            parent = create(&db, &LocationInput::child(&format!("L{}", level), parent.id))
                .await
                .unwrap();
        }
        let too_deep = create(&db, &LocationInput::child("L11", parent.id)).await;
        assert!(matches!(too_deep, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_effective_customer() {
        let db = connect_in_memory().await.unwrap();
        let acme = save_customer(
            &db,
            None,
            &CustomerInput {
                name: "Acme Power".to_string(),
                code: String::new(),
                contact_email: String::new(),
                contact_phone: String::new(),
                address: String::new(),
                is_active: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(acme.code, "ACME_POWER");

        let mut site_input = LocationInput::site("Plant");
        site_input.customer_id = Some(acme.id);
        let site = create(&db, &site_input).await.unwrap();
        let hall = create(&db, &LocationInput::child("Hall", site.id)).await.unwrap();

        let direct = effective_customer(&db, &site).await.unwrap();
        assert_eq!(customer_display(direct.as_ref()), "Direct: Acme Power");
        let inherited = effective_customer(&db, &hall).await.unwrap();
        assert_eq!(customer_display(inherited.as_ref()), "Inherited: Acme Power");
        assert_eq!(customer_display(None), "No customer assigned");
    }

    #[tokio::test]
    async fn test_resolve_path_reuses_nodes() {
        let db = connect_in_memory().await.unwrap();
        let first = resolve_path(&db, "Plant A > Building 1 > Room 2").await.unwrap().unwrap();
        assert_eq!(first.sites_created, 1);
        assert_eq!(first.locations_created, 2);

        let again = resolve_path(&db, "Plant A>Building 1 > Room 3").await.unwrap().unwrap();
        assert_eq!(again.sites_created, 0);
        assert_eq!(again.locations_created, 1);
        assert_eq!(location::Entity::find().count(&db).await.unwrap(), 4);

        assert!(resolve_path(&db, "  ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generate_pods() {
        let db = connect_in_memory().await.unwrap();
        create(&db, &LocationInput::site("S1")).await.unwrap();
        create(&db, &LocationInput::site("S2")).await.unwrap();

        let summary = generate_pods(&db, 3, 2, false).await.unwrap();
        assert_eq!(summary, PodSummary { sites: 2, pods_created: 6, mdcs_created: 12 });

        let names: Vec<String> = location::Entity::find()
            .filter(location::Column::Name.starts_with("MDC"))
            .all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert!(names.contains(&"MDC 6".to_string()));

        let rerun = generate_pods(&db, 3, 2, false).await.unwrap();
        assert_eq!(rerun.pods_created, 0);
        assert_eq!(rerun.mdcs_created, 0);

        let forced = generate_pods(&db, 3, 2, true).await.unwrap();
        assert_eq!(forced.pods_created, 6);
        assert_eq!(forced.mdcs_created, 12);
        assert_eq!(location::Entity::find().count(&db).await.unwrap(), 2 + 6 + 12);

        assert!(generate_pods(&db, 0, 2, false).await.is_err());
        assert!(generate_pods(&db, 1, 51, false).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_guard_and_tree() {
        let db = connect_in_memory().await.unwrap();
        let site = create(&db, &LocationInput::site("S")).await.unwrap();
        let child = create(&db, &LocationInput::child("C", site.id)).await.unwrap();

        assert!(matches!(ensure_deletable(&db, site.id).await, Err(AppError::Conflict(_))));
        assert!(ensure_deletable(&db, child.id).await.is_ok());

        let all = location::Entity::find().all(&db).await.unwrap();
        let tree = build_tree(all.clone());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(path_map(&all)[&child.id], "S > C");
        assert_eq!(site_map(&all)[&child.id], site.id);
        assert_eq!(descendant_ids(&all, site.id).len(), 2);
    }
}
