use crate::config::PlacesConfig;
use crate::error::{AppError, ProxyError};
use crate::proxy::fetcher::HttpFetcher;
use serde::{Deserialize, Serialize};
use tracing::warn;

const COUNTRY_RESTRICTION: &str = "country:fi";
const LANGUAGE: &str = "fi";
const DETAIL_FIELDS: &str = "place_id,name,formatted_address,geometry,address_components";

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    status: String,
    #[serde(default)]
    predictions: Vec<RawPrediction>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    place_id: String,
    description: String,
    structured_formatting: Option<StructuredFormatting>,
}

#[derive(Debug, Deserialize)]
struct StructuredFormatting {
    main_text: Option<String>,
    secondary_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<RawDetails>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDetails {
    place_id: String,
    name: Option<String>,
    formatted_address: Option<String>,
    geometry: Option<Geometry>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Prediction {
    pub place_id: String,
    pub description: String,
    pub main_text: Option<String>,
    pub secondary_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlaceDetails {
    pub place_id: String,
    pub name: Option<String>,
    pub formatted_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

/// Google Places proxy. The API key never leaves the server.
pub struct PlacesClient {
    fetcher: HttpFetcher,
    config: PlacesConfig,
}

fn check_status(status: &str, error_message: Option<String>) -> Result<(), AppError> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "OVER_QUERY_LIMIT" => Err(ProxyError::RateLimited.into()),
        "INVALID_REQUEST" | "NOT_FOUND" => Err(AppError::validation(
            error_message.unwrap_or_else(|| format!("Places rejected the request ({})", status)),
        )),
        other => {
            warn!("Places API returned {}: {:?}", other, error_message);
            Err(ProxyError::ResponseError {
                status: 502,
                message: format!("Places API status {}", other),
            }
            .into())
        }
    }
}

impl PlacesClient {
    pub fn new(fetcher: HttpFetcher, config: PlacesConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }

    fn api_key(&self) -> Result<&str, AppError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProxyError::NotConfigured("Google Places".into()).into())
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}/json", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    pub async fn autocomplete(&self, input: &str) -> Result<Vec<Prediction>, AppError> {
        let key = self.api_key()?;
        let input = input.trim();
        if input.is_empty() {
            return Err(AppError::validation("input is required"));
        }

        let response: AutocompleteResponse = self
            .fetcher
            .get_json(
                &self.url("autocomplete"),
                &[
                    ("input", input),
                    ("components", COUNTRY_RESTRICTION),
                    ("language", LANGUAGE),
                    ("key", key),
                ],
            )
            .await?;
        check_status(&response.status, response.error_message)?;

        Ok(response
            .predictions
            .into_iter()
            .map(|p| {
                let (main_text, secondary_text) = p
                    .structured_formatting
                    .map(|f| (f.main_text, f.secondary_text))
                    .unwrap_or((None, None));
                Prediction {
                    place_id: p.place_id,
                    description: p.description,
                    main_text,
                    secondary_text,
                }
            })
            .collect())
    }

    pub async fn details(&self, place_id: &str) -> Result<PlaceDetails, AppError> {
        let key = self.api_key()?;
        let place_id = place_id.trim();
        if place_id.is_empty() {
            return Err(AppError::validation("place_id is required"));
        }

        let response: DetailsResponse = self
            .fetcher
            .get_json(
                &self.url("details"),
                &[
                    ("place_id", place_id),
                    ("fields", DETAIL_FIELDS),
                    ("language", LANGUAGE),
                    ("key", key),
                ],
            )
            .await?;
        check_status(&response.status, response.error_message)?;

        let raw = response.result.ok_or_else(|| AppError::not_found("Place"))?;
        let component = |kind: &str| {
            raw.address_components
                .iter()
                .find(|c| c.types.iter().any(|t| t == kind))
                .map(|c| c.long_name.clone())
        };
        let postal_code = component("postal_code");
        let city = component("locality").or_else(|| component("postal_town"));

        Ok(PlaceDetails {
            place_id: raw.place_id,
            name: raw.name,
            formatted_address: raw.formatted_address,
            latitude: raw.geometry.as_ref().map(|g| g.location.lat),
            longitude: raw.geometry.as_ref().map(|g| g.location.lng),
            postal_code,
            city,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(check_status("OK", None).is_ok());
        assert!(check_status("ZERO_RESULTS", None).is_ok());
        assert!(matches!(
            check_status("OVER_QUERY_LIMIT", None),
            Err(AppError::ProxyError(ProxyError::RateLimited))
        ));
        assert!(matches!(
            check_status("INVALID_REQUEST", None),
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            check_status("REQUEST_DENIED", Some("bad key".into())),
            Err(AppError::ProxyError(ProxyError::ResponseError { status: 502, .. }))
        ));
    }
}
