//! Google Sheets v4 implementation of `TabularStore`.
//!
//! Talks to the `spreadsheets.values` REST endpoints with a bearer token
//! supplied by the caller. The first sheet row holds the column headers;
//! data row `position` lives at sheet row `position + 2`.
//!
//! This client never retries. Failed responses are classified into
//! `StoreError` once, and `RetryingPersister` decides what to do with them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Row, StoreError, StoreResult, TabularStore};
use crate::config::SheetConfig;

// ============================================================================
// Constants
// ============================================================================

const API_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Writes go through the sheet's own input parsing.
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

/// Last column read when loading roster rows.
const LAST_ROW_COLUMN: &str = "Z";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
struct AppendUpdates {
    #[serde(rename = "updatedRange")]
    updated_range: Option<String>,
}

/// Sheets client for one worksheet.
/// Clone is cheap - reqwest::Client and the header cache are shared.
#[derive(Clone)]
pub struct SheetsClient {
    client: Client,
    token: String,
    spreadsheet_id: String,
    sheet_name: String,
    headers: Arc<Mutex<Option<Vec<String>>>>,
}

impl SheetsClient {
    pub fn new(token: String, sheet: &SheetConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            token,
            spreadsheet_id: sheet.spreadsheet_id.clone(),
            sheet_name: sheet.sheet_name.clone(),
            headers: Arc::new(Mutex::new(None)),
        })
    }

    /// Qualify an A1 range with the worksheet name: `'Roster'!L1:M100`.
    fn qualified(&self, range: &str) -> String {
        format!("'{}'!{}", self.sheet_name.replace('\'', "''"), range)
    }

    fn values_url(&self, range: &str, suffix: &str) -> StoreResult<Url> {
        let mut url = Url::parse(API_BASE_URL)
            .map_err(|e| StoreError::InvalidResponse(format!("Bad base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidResponse("Base URL cannot hold a path".to_string()))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", self.qualified(range), suffix));
        Ok(url)
    }

    /// Full-row update. Values are parsed as if typed into the sheet, so
    /// numeric cells stay numbers for the sheet's own formulas.
    fn save_url(&self, range: &str) -> StoreResult<Url> {
        let mut url = self.values_url(range, "")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION);
        Ok(url)
    }

    /// Append below the roster table, filling empty cells rather than
    /// inserting sheet rows that would shift the ladder region.
    fn append_url(&self) -> StoreResult<Url> {
        let mut url = self.values_url("A1", ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION)
            .append_pair("insertDataOption", "OVERWRITE");
        Ok(url)
    }

    /// Check if response is successful, returning a classified error if not.
    async fn check_response(response: reqwest::Response) -> StoreResult<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::from_status(status, &body))
        }
    }

    async fn get_values(&self, range: &str) -> StoreResult<Vec<Vec<String>>> {
        let url = self.values_url(range, "")?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let parsed: ValueRange = response.json().await.map_err(|e| {
            StoreError::InvalidResponse(format!("Failed to parse value range: {}", e))
        })?;

        Ok(parsed
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    fn cached_headers(&self) -> Option<Vec<String>> {
        self.headers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn cache_headers(&self, headers: Vec<String>) {
        *self.headers.lock().unwrap_or_else(|e| e.into_inner()) = Some(headers);
    }

    async fn headers(&self) -> StoreResult<Vec<String>> {
        if let Some(headers) = self.cached_headers() {
            return Ok(headers);
        }
        let grid = self.get_values(&format!("A1:{}1", LAST_ROW_COLUMN)).await?;
        let headers = normalize_headers(grid.into_iter().next().unwrap_or_default());
        if headers.is_empty() {
            return Err(StoreError::InvalidResponse(format!(
                "Sheet '{}' has no header row",
                self.sheet_name
            )));
        }
        self.cache_headers(headers.clone());
        Ok(headers)
    }

    /// Lay row cells out in header order; columns the sheet lacks are dropped.
    fn ordered_values(headers: &[String], cells: &BTreeMap<String, String>) -> Vec<String> {
        for column in cells.keys() {
            if !headers.contains(column) {
                warn!(column = %column, "Column not present in sheet header, value dropped");
            }
        }
        headers
            .iter()
            .map(|h| cells.get(h).cloned().unwrap_or_default())
            .collect()
    }
}

/// Render a JSON cell the way the sheet would show it.
fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        other => other.to_string(),
    }
}

/// Unnamed header cells get a positional key (`#L`) so the data under
/// them survives a full-row write.
fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim().to_string();
            if h.is_empty() {
                format!("#{}", column_letter(i))
            } else {
                h
            }
        })
        .collect()
}

/// Column letters for a 0-based column index: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Sheet row number from an append response range like `'Roster'!A12:M12`.
fn updated_row_number(range: &str) -> Option<usize> {
    let cells = range.rsplit('!').next()?;
    let first = cells.split(':').next()?;
    first
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok()
}

#[async_trait]
impl TabularStore for SheetsClient {
    async fn rows(&self) -> StoreResult<Vec<Row>> {
        let grid = self.get_values(&format!("A1:{}", LAST_ROW_COLUMN)).await?;
        let mut lines = grid.into_iter();
        let headers = normalize_headers(lines.next().unwrap_or_default());
        self.cache_headers(headers.clone());

        let rows: Vec<Row> = lines
            .enumerate()
            .map(|(position, values)| {
                let cells = headers
                    .iter()
                    .zip(values.into_iter().chain(std::iter::repeat(String::new())))
                    .map(|(h, v)| (h.clone(), v))
                    .collect();
                Row::new(position, cells)
            })
            .collect();
        debug!(count = rows.len(), sheet = %self.sheet_name, "Loaded roster rows");
        Ok(rows)
    }

    async fn save_row(&self, row: &Row) -> StoreResult<()> {
        let headers = self.headers().await?;
        let sheet_row = row.position + 2;
        let range = format!(
            "A{}:{}{}",
            sheet_row,
            column_letter(headers.len().saturating_sub(1)),
            sheet_row
        );
        let url = self.save_url(&range)?;

        let body = json!({
            "range": self.qualified(&range),
            "majorDimension": "ROWS",
            "values": [Self::ordered_values(&headers, row.cells())],
        });
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        Self::check_response(response).await?;
        debug!(sheet_row, "Saved row");
        Ok(())
    }

    async fn add_row(&self, cells: BTreeMap<String, String>) -> StoreResult<Row> {
        let headers = self.headers().await?;
        let url = self.append_url()?;

        let body = json!({
            "majorDimension": "ROWS",
            "values": [Self::ordered_values(&headers, &cells)],
        });
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let parsed: AppendResponse = response.json().await.map_err(|e| {
            StoreError::InvalidResponse(format!("Failed to parse append response: {}", e))
        })?;

        let updated = parsed.updates.and_then(|u| u.updated_range).ok_or_else(|| {
            StoreError::InvalidResponse("Append response has no updatedRange".to_string())
        })?;
        let sheet_row = updated_row_number(&updated)
            .filter(|n| *n >= 2)
            .ok_or_else(|| {
                StoreError::InvalidResponse(format!("Unexpected updatedRange: {}", updated))
            })?;

        debug!(sheet_row, "Appended row");
        Ok(Row::new(sheet_row - 2, cells))
    }

    async fn read_grid(&self, range: &str) -> StoreResult<Vec<Vec<String>>> {
        self.get_values(range).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(sheet_name: &str) -> SheetsClient {
        let sheet = SheetConfig {
            spreadsheet_id: "sheet-id".to_string(),
            sheet_name: sheet_name.to_string(),
            ladder_range: "L1:M100".to_string(),
        };
        SheetsClient::new("token".to_string(), &sheet).unwrap()
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(11), "L");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_updated_row_number() {
        assert_eq!(updated_row_number("'Roster'!A12:M12"), Some(12));
        assert_eq!(updated_row_number("Roster!A7"), Some(7));
        assert_eq!(updated_row_number("garbage"), None);
    }

    #[test]
    fn test_write_urls_use_user_entered_values() {
        let c = client("Roster");
        let save = c.save_url("A2:L2").unwrap();
        let pairs: Vec<(String, String)> = save.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![("valueInputOption".to_string(), "USER_ENTERED".to_string())]
        );

        let append = c.append_url().unwrap();
        let pairs: Vec<(String, String)> = append.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("valueInputOption".to_string(), "USER_ENTERED".to_string())));
        assert!(pairs.contains(&("insertDataOption".to_string(), "OVERWRITE".to_string())));
        assert!(append.path().ends_with(":append"));
    }

    #[test]
    fn test_values_url_encodes_sheet_name() {
        let url = client("Roster Sheet").values_url("L1:M100", "").unwrap();
        let s = url.as_str();
        assert!(s.starts_with("https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/"));
        assert!(s.contains("Roster%20Sheet"));
        assert!(s.ends_with("L1:M100"));
    }

    #[test]
    fn test_normalize_headers_keys_blank_columns() {
        let raw = vec!["RobloxUsername".to_string(), " ".to_string(), "Kills ".to_string()];
        assert_eq!(normalize_headers(raw), vec!["RobloxUsername", "#B", "Kills"]);
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&json!("Rekrut")), "Rekrut");
        assert_eq!(cell_to_string(&json!(20)), "20");
        assert_eq!(cell_to_string(&json!(true)), "TRUE");
        assert_eq!(cell_to_string(&Value::Null), "");
    }

    #[test]
    fn test_ordered_values_follow_header_order() {
        let headers = vec!["B".to_string(), "A".to_string(), "C".to_string()];
        let cells: BTreeMap<String, String> = [("A", "1"), ("B", "2")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(
            SheetsClient::ordered_values(&headers, &cells),
            vec!["2".to_string(), "1".to_string(), String::new()]
        );
    }
}
