use serde::{Deserialize, Serialize};

/// Natural key of a place listing.
pub type PlaceId = String;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// One extracted business listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaceRecord {
    pub place_id: PlaceId,
    pub name: String,
    pub address: String,
    pub coordinates: Coordinates,
    pub business_type: String,
    pub phone: String,
    pub website: String,
    pub rating: Option<f64>,
    pub review_count: u32,
    pub amenity_details: Vec<String>,
    pub about_text: String,
    pub image_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Page URL the record was read from.
    pub url: String,
}

impl PlaceRecord {
    pub fn has_key(&self) -> bool {
        !self.place_id.trim().is_empty()
    }
}
