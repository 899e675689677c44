mod restaurant;
pub use self::restaurant::{
    CleanedAddress, CleanedRecord, RestaurantStub, ADDRESS_NOT_FOUND, CLEANED_HEADERS,
    DESCRIPTION_NOT_FOUND, MAPS_LINK_NOT_FOUND, NAME_NOT_FOUND, PHONE_NOT_FOUND, RAW_HEADERS,
    WEBSITE_NOT_FOUND,
};

mod enrichment;
pub use self::enrichment::{
    enrichment_columns, CORE_ENRICHMENT_COLUMNS, DEFAULT_AMENITY_SECTIONS, DOESNT_OFFER,
    LATITUDE, LONGITUDE, NOT_AVAILABLE, NUMBER_OF_REVIEWS, PRICE_RANGE, RESTAURANT_CATEGORY,
    STAR_RATING,
};
