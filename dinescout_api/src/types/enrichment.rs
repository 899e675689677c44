//! Column names of the map-provider enrichment schema.

/// Sentinel stored for any enrichment field that could not be extracted.
pub const NOT_AVAILABLE: &str = "Not available";

pub const STAR_RATING: &str = "Star Rating";
pub const NUMBER_OF_REVIEWS: &str = "Number of Reviews";
pub const RESTAURANT_CATEGORY: &str = "Restaurant Category";
pub const PRICE_RANGE: &str = "Price Range";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";

/// Aggregate of every attribute a venue is listed as not offering.
pub const DOESNT_OFFER: &str = "Doesnt Offer";

/// Enrichment columns that do not come from amenity sections.
pub const CORE_ENRICHMENT_COLUMNS: &[&str] = &[
    STAR_RATING,
    NUMBER_OF_REVIEWS,
    RESTAURANT_CATEGORY,
    PRICE_RANGE,
    LATITUDE,
    LONGITUDE,
];

/// Amenity section titles read from the map page's "About" region.
pub const DEFAULT_AMENITY_SECTIONS: &[&str] = &[
    "Accessibility",
    "Service options",
    "Highlights",
    "Popular for",
    "Offerings",
    "Dining options",
    "Amenities",
    "Atmosphere",
    "Planning",
    "Payments",
    "Parking",
];

/// Full enrichment column list for a run: core columns, the configured
/// amenity sections, then the negative aggregate.
pub fn enrichment_columns(amenity_sections: &[String]) -> Vec<String> {
    CORE_ENRICHMENT_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(amenity_sections.iter().cloned())
        .chain(std::iter::once(DOESNT_OFFER.to_string()))
        .collect()
}
