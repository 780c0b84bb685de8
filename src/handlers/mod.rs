//! Request handlers module

pub mod admin;
pub mod audit;
pub mod auth;
pub mod calendar;
pub mod dashboard;
pub mod equipment;
pub mod location;
pub mod maintenance;
pub mod role;
pub mod settings;
pub mod user;
pub mod webhook;

use axum::{
    body::Body,
    extract::Multipart,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Page parameters shared by list endpoints
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    25
}

impl Pagination {
    /// From optional query parameters; query structs cannot flatten numeric fields
    pub fn new(page: Option<u64>, page_size: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or_else(default_page),
            page_size: page_size.unwrap_or_else(default_page_size),
        }
    }

    pub fn limit(&self) -> u64 {
        self.page_size.clamp(1, 200)
    }

    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1) * self.limit()
    }
}

/// One page of a list
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, total: u64, p: Pagination) -> Self {
        Self {
            items,
            total,
            page: p.page.max(1),
            page_size: p.limit(),
        }
    }
}

/// Read the `file` field of a multipart upload, rejecting anything over `max` bytes
pub async fn read_upload(mut multipart: Multipart, max: usize) -> AppResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        if let Some(name) = field.file_name() {
            if !name.to_lowercase().ends_with(".csv") {
                return Err(AppError::validation("Please upload a CSV file"));
            }
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid upload: {}", e)))?;
        if data.len() > max {
            return Err(AppError::PayloadTooLarge(format!(
                "File is larger than {} bytes",
                max
            )));
        }
        return Ok(data.to_vec());
    }
    Err(AppError::validation("No file uploaded"))
}

/// A CSV attachment download
pub fn csv_download(filename: &str, data: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(data))
    {
        Ok(response) => response,
        Err(e) => AppError::Internal(e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination { page: 0, page_size: 1000 };
        assert_eq!(p.limit(), 200);
        assert_eq!(p.offset(), 0);
        let p = Pagination { page: 3, page_size: 10 };
        assert_eq!(p.offset(), 20);
        assert_eq!(Pagination::new(None, None).limit(), 25);
    }

    #[test]
    fn test_csv_download_headers() {
        let response = csv_download("equipment.csv", b"Name\n".to_vec());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"equipment.csv\""
        );
    }
}
