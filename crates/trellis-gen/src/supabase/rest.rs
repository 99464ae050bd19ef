//! Catalog store over the Supabase PostgREST API

use super::{ServiceKey, STORE_TIMEOUT};
use crate::catalog::{CatalogEntry, CatalogStore, ImageSet};
use crate::config::TrellisConfig;
use crate::http::{build_lenient_agent, read_text};
use serde::Deserialize;
use serde_json::{json, Value};
use trellis_core::{Result, TrellisError};
use tracing::debug;

const EMBEDDING_TABLE: &str = "zuo_3d_embedding";
const CATALOG_TABLE: &str = "zuo_catalog";
const IMAGES_TABLE: &str = "zuo_images";
const ITEM_COLUMN: &str = "Zuo_Item_No";

/// Catalog tables behind PostgREST
pub struct SupabaseCatalog {
    rest_url: String,
    auth: ServiceKey,
    agent: ureq::Agent,
}

impl SupabaseCatalog {
    pub fn new(supabase_url: &str, service_key: &str) -> Self {
        Self {
            rest_url: format!("{}/rest/v1", supabase_url.trim_end_matches('/')),
            auth: ServiceKey::new(service_key),
            agent: build_lenient_agent(STORE_TIMEOUT),
        }
    }

    pub fn from_config(config: &TrellisConfig) -> Self {
        Self::new(&config.supabase.url, &config.supabase.service_key)
    }

    fn select(&self, table: &str, query: &str) -> Result<String> {
        let url = format!("{}/{}?{}", self.rest_url, table, query);
        debug!(table, query, "PostgREST select");

        let mut response = self
            .auth
            .authorize(self.agent.get(&url))
            .header("Accept", "application/json")
            .call()
            .map_err(|e| TrellisError::Http(format!("GET {} failed: {}", table, e)))?;

        let status = response.status();
        let text = read_text(&mut response);
        if !status.is_success() {
            return Err(TrellisError::Store(format!(
                "{} query returned {}: {}",
                table,
                status.as_u16(),
                text
            )));
        }
        Ok(text)
    }

    fn update_item(&self, item_no: &str, changes: &Value) -> Result<usize> {
        let url = format!(
            "{}/{}?{}",
            self.rest_url,
            EMBEDDING_TABLE,
            item_filter(item_no)
        );

        let mut response = self
            .auth
            .authorize(self.agent.patch(&url))
            .header("Prefer", "return=representation")
            .send_json(changes)
            .map_err(|e| TrellisError::Http(format!("PATCH {} failed: {}", EMBEDDING_TABLE, e)))?;

        let status = response.status();
        let text = read_text(&mut response);
        if !status.is_success() {
            return Err(TrellisError::Store(format!(
                "Update of {} returned {}: {}",
                item_no,
                status.as_u16(),
                text
            )));
        }
        parse_affected_rows(&text)
    }
}

impl CatalogStore for SupabaseCatalog {
    fn next_without_asset(&self) -> Result<Option<String>> {
        let text = self.select(
            EMBEDDING_TABLE,
            &format!("select={}&has_asset=eq.false&limit=1", ITEM_COLUMN),
        )?;
        parse_pending_rows(&text)
    }

    fn catalog_entry(&self, item_no: &str) -> Result<Option<CatalogEntry>> {
        let text = self.select(
            CATALOG_TABLE,
            &format!("select=Main_Category,Item_Status&{}&limit=1", item_filter(item_no)),
        )?;
        parse_catalog_rows(&text)
    }

    fn image_set(&self, item_no: &str) -> Result<Option<ImageSet>> {
        let text = self.select(
            IMAGES_TABLE,
            &format!(
                "select=Single_Image_1_URL,Single_Image_2_URL,Single_Image_3_URL&{}&limit=1",
                item_filter(item_no)
            ),
        )?;
        parse_image_rows(&text)
    }

    fn mark_has_asset(&self, item_no: &str) -> Result<usize> {
        self.update_item(item_no, &json!({ "has_asset": true }))
    }

    fn set_asset_url(&self, item_no: &str, url: &str) -> Result<usize> {
        self.update_item(
            item_no,
            &json!({
                "asset_url": url,
                "asset_url_full": url,
                "has_asset": true,
            }),
        )
    }
}

/// `Zuo_Item_No=eq.{item}` with the value percent-encoded
pub fn item_filter(item_no: &str) -> String {
    format!("{}=eq.{}", ITEM_COLUMN, urlencoding::encode(item_no))
}

#[derive(Deserialize)]
struct EmbeddingRow {
    #[serde(rename = "Zuo_Item_No")]
    item_no: Value,
}

#[derive(Deserialize)]
struct CatalogRow {
    #[serde(rename = "Main_Category")]
    category: Option<String>,
    #[serde(rename = "Item_Status")]
    status: Option<String>,
}

#[derive(Deserialize)]
struct ImagesRow {
    #[serde(rename = "Single_Image_1_URL")]
    image_1: Option<String>,
    #[serde(rename = "Single_Image_2_URL")]
    image_2: Option<String>,
    #[serde(rename = "Single_Image_3_URL")]
    image_3: Option<String>,
}

fn parse_rows<T: for<'de> Deserialize<'de>>(text: &str) -> Result<Vec<T>> {
    serde_json::from_str(text)
        .map_err(|e| TrellisError::Json(format!("Unexpected PostgREST response: {}", e)))
}

/// Item numbers come back as strings or numbers depending on the column type
pub fn item_no_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_pending_rows(text: &str) -> Result<Option<String>> {
    let rows: Vec<EmbeddingRow> = parse_rows(text)?;
    match rows.first() {
        None => Ok(None),
        Some(row) => item_no_from_value(&row.item_no).map(Some).ok_or_else(|| {
            TrellisError::Json(format!("Unusable item number: {}", row.item_no))
        }),
    }
}

pub fn parse_catalog_rows(text: &str) -> Result<Option<CatalogEntry>> {
    let rows: Vec<CatalogRow> = parse_rows(text)?;
    Ok(rows.into_iter().next().map(|row| CatalogEntry {
        category: row.category,
        status: row.status,
    }))
}

pub fn parse_image_rows(text: &str) -> Result<Option<ImageSet>> {
    let rows: Vec<ImagesRow> = parse_rows(text)?;
    Ok(rows.into_iter().next().map(|row| ImageSet {
        image_1: row.image_1,
        image_2: row.image_2,
        image_3: row.image_3,
    }))
}

/// Count rows returned by a `return=representation` update
pub fn parse_affected_rows(text: &str) -> Result<usize> {
    if text.trim().is_empty() {
        return Ok(0);
    }
    let rows: Vec<Value> = parse_rows(text)?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_row_string_or_number() {
        assert_eq!(
            parse_pending_rows(r#"[{"Zuo_Item_No":"A100"}]"#).unwrap(),
            Some("A100".to_string())
        );
        assert_eq!(
            parse_pending_rows(r#"[{"Zuo_Item_No":100234}]"#).unwrap(),
            Some("100234".to_string())
        );
        assert_eq!(parse_pending_rows("[]").unwrap(), None);
    }

    #[test]
    fn test_pending_row_null_item_is_error() {
        let err = parse_pending_rows(r#"[{"Zuo_Item_No":null}]"#).unwrap_err();
        assert!(matches!(err, TrellisError::Json(_)));
    }

    #[test]
    fn test_catalog_row_with_nulls() {
        let entry = parse_catalog_rows(r#"[{"Main_Category":"Indoor","Item_Status":null}]"#)
            .unwrap()
            .unwrap();
        assert_eq!(entry.category.as_deref(), Some("Indoor"));
        assert_eq!(entry.status, None);
        assert_eq!(parse_catalog_rows("[]").unwrap(), None);
    }

    #[test]
    fn test_image_row() {
        let body = concat!(
            r#"[{"Single_Image_1_URL":" http://x/img.jpg ","#,
            r#""Single_Image_2_URL":null,"Single_Image_3_URL":""}]"#,
        );
        let images = parse_image_rows(body)
        .unwrap()
        .unwrap();
        assert_eq!(images.primary(), Some("http://x/img.jpg"));
        assert_eq!(images.image_3.as_deref(), Some(""));
    }

    #[test]
    fn test_error_body_is_json_error() {
        let err = parse_catalog_rows(r#"{"message":"relation does not exist"}"#).unwrap_err();
        assert!(matches!(err, TrellisError::Json(_)));
    }

    #[test]
    fn test_affected_rows() {
        assert_eq!(parse_affected_rows(r#"[{"Zuo_Item_No":"A100"}]"#).unwrap(), 1);
        assert_eq!(parse_affected_rows("[]").unwrap(), 0);
        assert_eq!(parse_affected_rows("").unwrap(), 0);
    }

    #[test]
    fn test_item_filter_encodes() {
        assert_eq!(item_filter("A100"), "Zuo_Item_No=eq.A100");
        assert_eq!(item_filter("A 1&2"), "Zuo_Item_No=eq.A%201%262");
    }

    #[test]
    fn test_rest_url_trailing_slash() {
        let catalog = SupabaseCatalog::new("https://project.supabase.co/", "key");
        assert_eq!(catalog.rest_url, "https://project.supabase.co/rest/v1");
    }
}
