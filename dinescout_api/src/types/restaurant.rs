use serde::{Deserialize, Serialize};

pub const NAME_NOT_FOUND: &str = "Name Not Found";
pub const DESCRIPTION_NOT_FOUND: &str = "Description Not Found";
pub const ADDRESS_NOT_FOUND: &str = "Address Not Found";
pub const PHONE_NOT_FOUND: &str = "Phone Not Found";
pub const WEBSITE_NOT_FOUND: &str = "Website Not Found";
pub const MAPS_LINK_NOT_FOUND: &str = "Google Maps Link Not Found";

/// Header of the raw listing file, in serialization order of [`RestaurantStub`].
pub const RAW_HEADERS: &[&str] = &[
    "Restaurant Name",
    "Restaurant Description",
    "Address",
    "Phone",
    "Website",
    "Google Maps Link",
    "Embedded Links",
    "Venue ID",
];

/// Header of the cleaned file, in serialization order of [`CleanedRecord`].
pub const CLEANED_HEADERS: &[&str] = &[
    "Restaurant Name",
    "Restaurant Description",
    "Address",
    "Phone",
    "Website",
    "Google Maps Link",
    "Embedded Links",
    "Venue ID",
    "Cleaned Address",
    "City",
    "State",
    "Zip",
];

/// A restaurant entry as extracted from a listing card, before address cleaning.
///
/// Identity is (name, raw address). Stubs are written once to the raw
/// listing file and never modified.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RestaurantStub {
    #[serde(rename = "Restaurant Name")]
    pub name: String,

    #[serde(rename = "Restaurant Description", default)]
    pub description: String,

    #[serde(rename = "Address")]
    pub address: String,

    #[serde(rename = "Phone", default)]
    pub phone: String,

    #[serde(rename = "Website", default)]
    pub website: String,

    #[serde(rename = "Google Maps Link", default)]
    pub maps_link: String,

    #[serde(rename = "Embedded Links", default)]
    pub embedded_links: Option<String>,

    #[serde(rename = "Venue ID", default)]
    pub venue_id: Option<String>,
}

impl RestaurantStub {
    /// The (name, raw address) identity used for duplicate suppression.
    pub fn key(&self) -> (String, String) {
        (self.name.clone(), self.address.clone())
    }
}

/// Structured components parsed out of a free-text address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// A stub plus its parsed address components.
///
/// The city may be filled in later from sibling records sharing the same
/// state and zip; nothing else changes after creation.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedRecord {
    #[serde(rename = "Restaurant Name")]
    pub name: String,

    #[serde(rename = "Restaurant Description", default)]
    pub description: String,

    #[serde(rename = "Address", default)]
    pub address: String,

    #[serde(rename = "Phone", default)]
    pub phone: String,

    #[serde(rename = "Website", default)]
    pub website: String,

    #[serde(rename = "Google Maps Link", default)]
    pub maps_link: String,

    #[serde(rename = "Embedded Links", default)]
    pub embedded_links: Option<String>,

    #[serde(rename = "Venue ID", default)]
    pub venue_id: Option<String>,

    #[serde(rename = "Cleaned Address", default)]
    pub street: String,

    #[serde(rename = "City", default)]
    pub city: String,

    #[serde(rename = "State", default)]
    pub state: String,

    #[serde(rename = "Zip", default)]
    pub zip: String,
}

impl CleanedRecord {
    pub fn from_stub(stub: RestaurantStub, address: CleanedAddress) -> Self {
        Self {
            name: stub.name,
            description: stub.description,
            address: stub.address,
            phone: stub.phone,
            website: stub.website,
            maps_link: stub.maps_link,
            embedded_links: stub.embedded_links,
            venue_id: stub.venue_id,
            street: address.street,
            city: address.city,
            state: address.state,
            zip: address.zip,
        }
    }

    pub fn has_location(&self) -> bool {
        !self.city.is_empty() || !self.zip.is_empty()
    }
}
