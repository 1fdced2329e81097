use crate::config::OuluConfig;
use crate::error::{AppError, ProxyError};
use crate::proxy::fetcher::HttpFetcher;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_ROWS: u32 = 20;
const MAX_ROWS: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetSearch {
    pub q: Option<String>,
    pub rows: Option<u32>,
    pub start: Option<u32>,
}

/// CKAN action envelope.
#[derive(Debug, Deserialize)]
struct CkanResponse {
    success: bool,
    result: Option<Value>,
    error: Option<Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Attraction {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub url: Option<String>,
}

/// City of Oulu open data (CKAN) and the ZoneAtlas attractions feed.
pub struct OuluDataService {
    fetcher: HttpFetcher,
    config: OuluConfig,
}

impl OuluDataService {
    pub fn new(fetcher: HttpFetcher, config: OuluConfig) -> Self {
        Self { fetcher, config }
    }

    pub async fn search_datasets(&self, search: &DatasetSearch) -> Result<Value, AppError> {
        let rows = search.rows.unwrap_or(DEFAULT_ROWS).clamp(1, MAX_ROWS).to_string();
        let start = search.start.unwrap_or(0).to_string();
        let q = search.q.as_deref().map(str::trim).unwrap_or("");

        let mut params = vec![("rows", rows.as_str()), ("start", start.as_str())];
        if !q.is_empty() {
            params.push(("q", q));
        }

        self.ckan_action("package_search", &params).await
    }

    pub async fn dataset(&self, id: &str) -> Result<Value, AppError> {
        if id.trim().is_empty() {
            return Err(AppError::validation("dataset id is required"));
        }
        self.ckan_action("package_show", &[("id", id.trim())]).await
    }

    async fn ckan_action(&self, action: &str, params: &[(&str, &str)]) -> Result<Value, AppError> {
        let url = format!("{}/{}", self.config.ckan_url.trim_end_matches('/'), action);
        let response: CkanResponse = self.fetcher.get_json(&url, params).await?;

        match (response.success, response.result) {
            (true, Some(result)) => Ok(result),
            (_, _) => {
                let message = response
                    .error
                    .as_ref()
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("CKAN request was not successful")
                    .to_string();
                Err(ProxyError::ResponseError {
                    status: 502,
                    message,
                }
                .into())
            }
        }
    }

    pub async fn attractions(&self) -> Result<Vec<Attraction>, AppError> {
        let feed: Value = self.fetcher.get_json(&self.config.zoneatlas_url, &[]).await?;
        normalize_attractions(&feed)
    }
}

/// Accepts a bare array, an object wrapping one (`attractions`, `items`,
/// `data`), or a GeoJSON feature collection. Items without a name are dropped.
pub fn normalize_attractions(feed: &Value) -> Result<Vec<Attraction>, AppError> {
    let items = match feed {
        Value::Array(items) => items,
        Value::Object(map) => ["attractions", "items", "data", "features"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| ProxyError::InvalidFormat("attractions feed has no item list".into()))?,
        _ => {
            return Err(ProxyError::InvalidFormat("attractions feed is not JSON object or array".into()).into())
        }
    };

    Ok(items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| normalize_attraction(i, item))
        .collect())
}

fn normalize_attraction(index: usize, item: &Value) -> Option<Attraction> {
    // GeoJSON keeps attributes under `properties` and [lng, lat] under geometry
    let props = item.get("properties").unwrap_or(item);
    let text = |keys: &[&str]| -> Option<String> {
        keys.iter().find_map(|k| match props.get(*k) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    };
    let number = |keys: &[&str]| -> Option<f64> {
        keys.iter().find_map(|k| match props.get(*k) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        })
    };

    let name = text(&["name", "title", "nimi"])?;
    let coords = item
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(Value::as_array)
        .filter(|c| c.len() >= 2)
        .and_then(|c| Some((c[1].as_f64()?, c[0].as_f64()?)));
    let (latitude, longitude) = match coords {
        Some((lat, lng)) => (Some(lat), Some(lng)),
        None => (
            number(&["latitude", "lat"]),
            number(&["longitude", "lng", "lon"]),
        ),
    };

    Some(Attraction {
        id: text(&["id", "_id", "slug"])
            .or_else(|| item.get("id").and_then(|v| v.as_str().map(String::from)))
            .unwrap_or_else(|| index.to_string()),
        name,
        category: text(&["category", "type", "kategoria"]),
        description: text(&["description", "summary", "kuvaus"]),
        latitude,
        longitude,
        url: text(&["url", "link", "website"]),
    })
}
