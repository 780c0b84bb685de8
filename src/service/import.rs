//! CSV import and export for equipment and locations

use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::entity::{customer, equipment, equipment_category, location, now_ts};
use crate::error::{AppError, AppResult};
use crate::service::equipment::{self as equipments, EquipmentInput, MAX_NAME_LEN, MAX_SERIAL_LEN};
use crate::service::location::{self as locations, PATH_SEPARATOR};
use crate::service::parse_date;

pub const EQUIPMENT_COLUMNS: [&str; 6] = [
    "Name",
    "Category",
    "Manufacturer Serial",
    "Asset Tag",
    "Location",
    "Status",
];
pub const EQUIPMENT_DATE_COLUMNS: [&str; 2] = ["DGA Due Date", "Next Maintenance Date"];
pub const LOCATION_COLUMNS: [&str; 5] = ["Path", "Address", "Latitude", "Longitude", "Customer"];

/// A problem with one data row. Row 1 is the header.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub sites_created: usize,
    pub locations_created: usize,
    pub error_rows: usize,
    pub errors: Vec<RowError>,
    pub messages: Vec<String>,
}

impl ImportSummary {
    fn fail(&mut self, row: usize, message: impl Into<String>) {
        self.error_rows += 1;
        self.errors.push(RowError {
            row,
            message: message.into(),
        });
    }

    fn finish(mut self, noun: &str) -> Self {
        self.messages
            .push(format!("Successfully imported {} {}", self.imported, noun));
        if self.sites_created > 0 {
            self.messages
                .push(format!("Created {} new sites", self.sites_created));
        }
        if self.locations_created > 0 {
            self.messages
                .push(format!("Created {} new locations", self.locations_created));
        }
        if self.error_rows > 0 {
            self.messages
                .push(format!("{} rows had errors", self.error_rows));
            self.messages.push(format!(
                "Import finished with {} validation errors",
                self.errors.len()
            ));
        }
        self
    }
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::BadRequest(format!("Invalid CSV: {}", e))
}

/// Header names mapped to their column index
fn header_index(reader: &mut csv::Reader<&[u8]>) -> AppResult<HashMap<String, usize>> {
    let headers = reader.headers().map_err(csv_error)?;
    Ok(headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().trim_start_matches('\u{feff}').to_string(), i))
        .collect())
}

fn require_columns(index: &HashMap<String, usize>, required: &[&str]) -> AppResult<()> {
    let missing: Vec<&str> = required
        .iter()
        .filter(|c| !index.contains_key(**c))
        .copied()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )))
    }
}

fn reader(data: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data)
}

fn cell<'a>(record: &'a csv::StringRecord, index: &HashMap<String, usize>, column: &str) -> &'a str {
    index
        .get(column)
        .and_then(|&i| record.get(i))
        .unwrap_or("")
}

/// Reject `<` and `>` anywhere except as the " > " separator
pub fn check_location_chars(path: &str) -> Result<(), String> {
    if path
        .split(PATH_SEPARATOR)
        .any(|segment| segment.contains('<') || segment.contains('>'))
    {
        Err(format!("Location '{}' contains invalid characters", path))
    } else {
        Ok(())
    }
}

fn optional_date(value: &str, column: &str) -> Result<Option<chrono::NaiveDate>, String> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_date(value)
        .map(Some)
        .ok_or_else(|| format!("{}: invalid date '{}', expected YYYY-MM-DD", column, value))
}

/// Import equipment rows. Bad rows are reported and skipped.
pub async fn import_equipment<C: ConnectionTrait>(
    db: &C,
    data: &[u8],
    created_by: Option<i64>,
) -> AppResult<ImportSummary> {
    let mut reader = reader(data);
    let index = header_index(&mut reader)?;
    require_columns(&index, &EQUIPMENT_COLUMNS)?;
    let width = index.len();

    let mut summary = ImportSummary::default();
    let mut seen_serials: HashSet<String> = HashSet::new();

    for (i, record) in reader.records().enumerate() {
        let row = i + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                summary.fail(row, format!("Unreadable row: {}", e));
                continue;
            }
        };
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() < width {
            summary.fail(
                row,
                format!("Expected {} columns, found {}", width, record.len()),
            );
            continue;
        }

        let name = cell(&record, &index, "Name");
        let serial = cell(&record, &index, "Manufacturer Serial");
        let path = cell(&record, &index, "Location");

        let mut problems: Vec<String> = Vec::new();
        if let Err(msg) = check_location_chars(path) {
            summary.fail(row, msg);
            continue;
        }

        // Locations are resolved before the remaining field checks
        let location_id = match locations::resolve_path(db, path).await {
            Ok(Some(resolution)) => {
                summary.sites_created += resolution.sites_created;
                summary.locations_created += resolution.locations_created;
                Some(resolution.location.id)
            }
            Ok(None) => None,
            Err(AppError::Validation(msg)) => {
                summary.fail(row, msg);
                continue;
            }
            Err(e) => return Err(e),
        };

        if name.is_empty() {
            problems.push("Name is required".to_string());
        } else if name.chars().count() > MAX_NAME_LEN {
            problems.push(format!("Name must be at most {} characters", MAX_NAME_LEN));
        }
        if serial.is_empty() {
            problems.push("Manufacturer Serial is required".to_string());
        } else if serial.chars().count() > MAX_SERIAL_LEN {
            problems.push(format!(
                "Manufacturer Serial must be at most {} characters",
                MAX_SERIAL_LEN
            ));
        } else if seen_serials.contains(serial) {
            problems.push(format!("Serial '{}' appears more than once in the file", serial));
        } else if equipment::Entity::find()
            .filter(equipment::Column::ManufacturerSerial.eq(serial))
            .one(db)
            .await?
            .is_some()
        {
            problems.push(format!("Serial '{}' already exists", serial));
        }

        let status = cell(&record, &index, "Status");
        if !status.is_empty() && equipment::EquipmentStatus::parse(status).is_none() {
            problems.push(format!("Invalid status '{}'", status));
        }

        let dga = optional_date(cell(&record, &index, EQUIPMENT_DATE_COLUMNS[0]), EQUIPMENT_DATE_COLUMNS[0]);
        let next = optional_date(cell(&record, &index, EQUIPMENT_DATE_COLUMNS[1]), EQUIPMENT_DATE_COLUMNS[1]);
        let (dga, next) = match (dga, next) {
            (Ok(d), Ok(n)) => (d, n),
            (d, n) => {
                problems.extend(d.err());
                problems.extend(n.err());
                (None, None)
            }
        };

        if !problems.is_empty() {
            summary.fail(row, problems.join("; "));
            continue;
        }

        let category = cell(&record, &index, "Category");
        let category_id = if category.is_empty() {
            None
        } else {
            Some(equipments::get_or_create_category(db, category).await?.0.id)
        };

        let input = EquipmentInput {
            name: name.to_string(),
            category_id,
            manufacturer_serial: serial.to_string(),
            asset_tag: cell(&record, &index, "Asset Tag").to_string(),
            location_id,
            status: Some(status.to_string()).filter(|s| !s.is_empty()),
            dga_due_date: dga,
            next_maintenance_date: next,
            is_active: true,
            ..Default::default()
        };
        match equipments::create(db, &input, created_by).await {
            Ok(_) => {
                seen_serials.insert(serial.to_string());
                summary.imported += 1;
            }
            Err(AppError::Validation(msg)) => summary.fail(row, msg),
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        "Equipment import: {} imported, {} rows with errors",
        summary.imported,
        summary.error_rows
    );
    Ok(summary.finish("equipment items"))
}

fn finish_writer(writer: csv::Writer<Vec<u8>>) -> AppResult<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV write failed: {}", e)))
}

/// Equipment as CSV in the same layout the importer reads
pub async fn export_equipment<C: ConnectionTrait>(db: &C) -> AppResult<Vec<u8>> {
    let all_locations = location::Entity::find().all(db).await?;
    let paths = locations::path_map(&all_locations);
    let categories: HashMap<i64, String> = equipment_category::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let items = equipment::Entity::find()
        .order_by_asc(equipment::Column::Name)
        .all(db)
        .await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header: Vec<&str> = EQUIPMENT_COLUMNS.to_vec();
    header.extend(EQUIPMENT_DATE_COLUMNS);
    writer.write_record(&header).map_err(csv_error)?;

    for eq in &items {
        let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        writer
            .write_record([
                eq.name.clone(),
                eq.category_id.and_then(|id| categories.get(&id).cloned()).unwrap_or_default(),
                eq.manufacturer_serial.clone(),
                eq.asset_tag.clone(),
                eq.location_id.and_then(|id| paths.get(&id).cloned()).unwrap_or_default(),
                eq.status.clone(),
                date(eq.dga_due_date),
                date(eq.next_maintenance_date),
            ])
            .map_err(csv_error)?;
    }
    finish_writer(writer)
}

/// Locations as CSV, one row per node, parents first
pub async fn export_locations<C: ConnectionTrait>(db: &C) -> AppResult<Vec<u8>> {
    let all = location::Entity::find().all(db).await?;
    let paths = locations::path_map(&all);
    let customers: HashMap<i64, String> = customer::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let mut rows: Vec<(&String, &location::Model)> = all
        .iter()
        .filter_map(|l| paths.get(&l.id).map(|p| (p, l)))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(b.0));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(LOCATION_COLUMNS).map_err(csv_error)?;
    for (path, loc) in rows {
        writer
            .write_record([
                path.clone(),
                loc.address.clone(),
                loc.latitude.map(|v| v.to_string()).unwrap_or_default(),
                loc.longitude.map(|v| v.to_string()).unwrap_or_default(),
                loc.customer_id.and_then(|id| customers.get(&id).cloned()).unwrap_or_default(),
            ])
            .map_err(csv_error)?;
    }
    finish_writer(writer)
}

fn optional_coordinate(value: &str, column: &str, limit: f64) -> Result<Option<f64>, String> {
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<f64>() {
        Ok(v) if (-limit..=limit).contains(&v) => Ok(Some(v)),
        _ => Err(format!("{}: '{}' must be a number between -{} and {}", column, value, limit, limit)),
    }
}

/// Import locations by path. Address, coordinates and customer are
/// written onto the last segment.
pub async fn import_locations<C: ConnectionTrait>(db: &C, data: &[u8]) -> AppResult<ImportSummary> {
    let mut reader = reader(data);
    let index = header_index(&mut reader)?;
    require_columns(&index, &LOCATION_COLUMNS[..1])?;

    let mut summary = ImportSummary::default();
    for (i, record) in reader.records().enumerate() {
        let row = i + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                summary.fail(row, format!("Unreadable row: {}", e));
                continue;
            }
        };
        let path = cell(&record, &index, "Path");
        if path.is_empty() {
            if !record.iter().all(str::is_empty) {
                summary.fail(row, "Path is required");
            }
            continue;
        }
        if let Err(msg) = check_location_chars(path) {
            summary.fail(row, msg);
            continue;
        }

        let latitude = optional_coordinate(cell(&record, &index, "Latitude"), "Latitude", 90.0);
        let longitude = optional_coordinate(cell(&record, &index, "Longitude"), "Longitude", 180.0);
        let (latitude, longitude) = match (latitude, longitude) {
            (Ok(lat), Ok(lng)) => (lat, lng),
            (lat, lng) => {
                let msgs: Vec<String> = lat.err().into_iter().chain(lng.err()).collect();
                summary.fail(row, msgs.join("; "));
                continue;
            }
        };

        let customer_name = cell(&record, &index, "Customer");
        let customer_id = if customer_name.is_empty() {
            None
        } else {
            match customer::Entity::find()
                .filter(
                    customer::Column::Name
                        .eq(customer_name)
                        .or(customer::Column::Code.eq(customer_name)),
                )
                .one(db)
                .await?
            {
                Some(c) => Some(c.id),
                None => {
                    summary.fail(row, format!("Unknown customer '{}'", customer_name));
                    continue;
                }
            }
        };

        let resolution = match locations::resolve_path(db, path).await {
            Ok(Some(r)) => r,
            Ok(None) => continue,
            Err(AppError::Validation(msg)) => {
                summary.fail(row, msg);
                continue;
            }
            Err(e) => return Err(e),
        };
        summary.sites_created += resolution.sites_created;
        summary.locations_created += resolution.locations_created;

        let address = cell(&record, &index, "Address");
        let mut active: location::ActiveModel = resolution.location.into();
        if !address.is_empty() {
            active.address = Set(address.to_string());
        }
        if latitude.is_some() {
            active.latitude = Set(latitude);
        }
        if longitude.is_some() {
            active.longitude = Set(longitude);
        }
        if customer_id.is_some() {
            active.customer_id = Set(customer_id);
        }
        active.updated_at = Set(now_ts());
        active.update(db).await?;
        summary.imported += 1;
    }

    Ok(summary.finish("locations"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use sea_orm::PaginatorTrait;

    const HEADER: &str = "Name,Category,Manufacturer Serial,Asset Tag,Location,Status\n";

    async fn count_sites<C: ConnectionTrait>(db: &C, is_site: bool) -> u64 {
        location::Entity::find()
            .filter(location::Column::IsSite.eq(is_site))
            .count(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_basic_import() {
        let db = connect_in_memory().await.unwrap();
        let csv = format!(
            "{}Test Equipment 1,Test Category,SER001,TAG001,Site A > Building 1,active\n\
             Test Equipment 2,Test Category,SER002,,Site A > Building 2,\n",
            HEADER
        );
        let summary = import_equipment(&db, csv.as_bytes(), None).await.unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(count_sites(&db, true).await, 1);
        assert_eq!(count_sites(&db, false).await, 2);
        assert!(summary.messages.contains(&"Successfully imported 2 equipment items".to_string()));

        let second = equipment::Entity::find()
            .filter(equipment::Column::ManufacturerSerial.eq("SER002"))
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.asset_tag, "AUTO_SER002");
        assert_eq!(second.status, "active");
        let loc = location::Entity::find_by_id(second.location_id.unwrap()).one(&db).await.unwrap().unwrap();
        assert_eq!(locations::full_path(&db, &loc).await.unwrap(), "Site A > Building 2");
    }

    #[tokio::test]
    async fn test_missing_columns_rejects_file() {
        let db = connect_in_memory().await.unwrap();
        let csv = "Name,Category\nX,Y\n";
        let err = import_equipment(&db, csv.as_bytes(), None).await.unwrap_err();
        assert!(err.to_string().contains("Missing required columns"));
        assert_eq!(equipment::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_row_errors_are_reported() {
        let db = connect_in_memory().await.unwrap();
        let csv = format!(
            "{},Cat,SER004,TAG004,Site C,active\n\
             Test Equipment 5,Cat,,TAG005,Site C,active\n\
             Test Equipment 6,Cat,SER006,TAG006,Invalid<Chars>Location,active\n",
            HEADER
        );
        let summary = import_equipment(&db, csv.as_bytes(), None).await.unwrap();
        assert_eq!(summary.imported, 0);
        assert_eq!(summary.error_rows, 3);
        assert!(summary.messages.contains(&"3 rows had errors".to_string()));
        assert!(summary.messages.iter().any(|m| m.to_lowercase().contains("validation errors")));
        assert_eq!(summary.errors[0].row, 2);
    }

    #[tokio::test]
    async fn test_duplicate_serials_and_short_rows() {
        let db = connect_in_memory().await.unwrap();
        let csv = format!(
            "{}Valid Row,Cat,SER016,TAG016,Site J,active\n\
             Invalid Row,Cat,SER017\n\
             Duplicate,Cat,SER016,TAG099,Site J,active\n\
             Another Valid,Cat,SER018,TAG018,Site J,active\n",
            HEADER
        );
        let summary = import_equipment(&db, csv.as_bytes(), None).await.unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.error_rows, 2);
        assert_eq!(equipment::Entity::find().count(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_summary_counts_new_locations() {
        let db = connect_in_memory().await.unwrap();
        let csv = format!(
            "{}Valid 1,Cat,SER012,TAG012,Site I > Building 1,active\n\
             Valid 2,Cat,SER013,TAG013,Site I > Building 2,active\n\
             ,Cat,SER014,TAG014,Site I > Building 3,active\n\
             Valid 3,Cat,SER015,TAG015,Site I > Building 4,active\n",
            HEADER
        );
        let summary = import_equipment(&db, csv.as_bytes(), None).await.unwrap();
        assert_eq!(summary.imported, 3);
        assert!(summary.messages.contains(&"Created 1 new sites".to_string()));
        assert!(summary.messages.contains(&"Created 4 new locations".to_string()));
        assert!(summary.messages.contains(&"1 rows had errors".to_string()));
    }

    #[tokio::test]
    async fn test_dates_and_existing_locations() {
        let db = connect_in_memory().await.unwrap();
        let (site, _) = locations::get_or_create_site(&db, "Site G").await.unwrap();
        let (building, _) = locations::get_or_create_child(&db, &site, "Building X").await.unwrap();

        let csv = "Name,Category,Manufacturer Serial,Asset Tag,Location,Status,DGA Due Date,Next Maintenance Date\n\
                   Dated,Cat,SER020,,Site G > Building X,active,2025-06-15,2025-07-01\n\
                   Bad Date,Cat,SER021,,Site G,active,15/06/2025,\n";
        let summary = import_equipment(&db, csv.as_bytes(), None).await.unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.sites_created, 0);
        assert_eq!(summary.locations_created, 0);
        assert_eq!(location::Entity::find().count(&db).await.unwrap(), 2);

        let eq = equipment::Entity::find().one(&db).await.unwrap().unwrap();
        assert_eq!(eq.location_id, Some(building.id));
        assert_eq!(eq.dga_due_date, chrono::NaiveDate::from_ymd_opt(2025, 6, 15));
    }

    #[tokio::test]
    async fn test_location_round_trip() {
        let db = connect_in_memory().await.unwrap();
        let csv = "Path,Address,Latitude,Longitude,Customer\n\
                   North > Hall 1,1 Main St,51.5,-0.12,\n\
                   North > Hall 2,,95,0,\n";
        let summary = import_locations(&db, csv.as_bytes()).await.unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.error_rows, 1);

        let exported = String::from_utf8(export_locations(&db).await.unwrap()).unwrap();
        let mut lines = exported.lines();
        assert_eq!(lines.next(), Some("Path,Address,Latitude,Longitude,Customer"));
        assert_eq!(lines.next(), Some("North,,,,"));
        assert_eq!(lines.next(), Some("North > Hall 1,1 Main St,51.5,-0.12,"));
    }

    #[tokio::test]
    async fn test_equipment_export_matches_import_layout() {
        let db = connect_in_memory().await.unwrap();
        let csv = format!("{}Exported,Cat,SER030,TAG030,Site Z > Room,retired\n", HEADER);
        import_equipment(&db, csv.as_bytes(), None).await.unwrap();

        let exported = String::from_utf8(export_equipment(&db).await.unwrap()).unwrap();
        assert!(exported.starts_with(
            "Name,Category,Manufacturer Serial,Asset Tag,Location,Status,DGA Due Date,Next Maintenance Date"
        ));
        assert!(exported.contains("Exported,Cat,SER030,TAG030,Site Z > Room,retired,,"));
    }
}
