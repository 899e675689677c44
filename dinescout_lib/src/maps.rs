//! Field extraction from rendered map-provider place pages.
//!
//! Every field is read independently; a missing element leaves that field
//! at the "Not available" sentinel without affecting the others.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use dinescout_api::types::{
    DOESNT_OFFER, LATITUDE, LONGITUDE, NOT_AVAILABLE, NUMBER_OF_REVIEWS, PRICE_RANGE,
    RESTAURANT_CATEGORY, STAR_RATING,
};

use crate::config::{ConfigError, MapSelectors};
use crate::error::PipelineError;
use crate::listing::compile;

const UNAVAILABLE_PREFIXES: &[&str] = &["No ", "Doesn't ", "Doesn\u{2019}t ", "Does not "];
const AVAILABLE_PREFIXES: &[&str] = &["Has ", "Serves "];

fn coordinates_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").expect("static pattern is valid"))
}

/// Latitude and longitude embedded in a map URL as `@lat,lng`.
pub fn coordinates_from_url(url: &str) -> Option<(String, String)> {
    let caps = coordinates_pattern().captures(url)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Text-search URL for a venue without a map link.
pub fn search_url(
    base: &str,
    name: &str,
    address: &str,
    city: &str,
    state: &str,
) -> Result<String, PipelineError> {
    let query = [name, address, city, state]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let mut url = Url::parse(base)
        .map_err(|e| PipelineError::InvalidInput(format!("bad search URL {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| PipelineError::InvalidInput(format!("search URL {} cannot take a path", base)))?
        .pop_if_empty()
        .push(&query);
    Ok(url.into())
}

/// Values scraped from one place page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub star_rating: Option<String>,
    pub reviews: Option<String>,
    pub category: Option<String>,
    pub price_range: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    /// Configured section title to comma-joined available attributes.
    pub amenities: BTreeMap<String, String>,
    /// Attributes listed as not offered, verbatim.
    pub doesnt_offer: Vec<String>,
}

impl Enrichment {
    /// Value for an enrichment column, or the sentinel.
    pub fn value(&self, column: &str) -> String {
        let v = match column {
            STAR_RATING => self.star_rating.clone(),
            NUMBER_OF_REVIEWS => self.reviews.clone(),
            RESTAURANT_CATEGORY => self.category.clone(),
            PRICE_RANGE => self.price_range.clone(),
            LATITUDE => self.latitude.clone(),
            LONGITUDE => self.longitude.clone(),
            DOESNT_OFFER if !self.doesnt_offer.is_empty() => Some(self.doesnt_offer.join(", ")),
            other => self.amenities.get(other).cloned(),
        };
        v.unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }

    /// Number of fields that were actually extracted.
    pub fn found(&self) -> usize {
        [
            &self.star_rating,
            &self.reviews,
            &self.category,
            &self.price_range,
            &self.latitude,
            &self.longitude,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
            + self.amenities.len()
            + usize::from(!self.doesnt_offer.is_empty())
    }
}

/// [`MapSelectors`] parsed once per run.
#[derive(Debug, Clone)]
pub struct MapParser {
    star_rating: Selector,
    reviews: Selector,
    category: Selector,
    price_range: Selector,
    section: Selector,
    section_title: Selector,
    section_item: Selector,
    unavailable_badge: Selector,
    unavailable_class: String,
    sections: Vec<String>,
}

impl MapParser {
    pub fn new(selectors: &MapSelectors, sections: &[String]) -> Result<Self, ConfigError> {
        Ok(Self {
            star_rating: compile(&selectors.star_rating)?,
            reviews: compile(&selectors.reviews)?,
            category: compile(&selectors.category)?,
            price_range: compile(&selectors.price_range)?,
            section: compile(&selectors.section)?,
            section_title: compile(&selectors.section_title)?,
            section_item: compile(&selectors.section_item)?,
            unavailable_badge: compile(&selectors.unavailable_badge)?,
            unavailable_class: selectors.unavailable_class.clone(),
            sections: sections.to_vec(),
        })
    }

    /// Extracts every field from `html`; coordinates come from `current_url`.
    pub fn extract(&self, html: &str, current_url: &str) -> Enrichment {
        let doc = Html::parse_document(html);
        let mut out = Enrichment {
            star_rating: self.star_rating(&doc),
            reviews: self.reviews(&doc),
            category: first(&doc, &self.category).map(text_of).filter(|t| !t.is_empty()),
            price_range: self.price_range(&doc),
            ..Enrichment::default()
        };
        if let Some((lat, lng)) = coordinates_from_url(current_url) {
            out.latitude = Some(lat);
            out.longitude = Some(lng);
        }
        self.amenities(&doc, &mut out);
        out
    }

    fn star_rating(&self, doc: &Html) -> Option<String> {
        let el = first(doc, &self.star_rating)?;
        el.value()
            .attr("aria-label")
            .and_then(|label| label.split_whitespace().next())
            .map(str::to_string)
            .or_else(|| Some(text_of(el)).filter(|t| !t.is_empty()))
    }

    fn reviews(&self, doc: &Html) -> Option<String> {
        let el = first(doc, &self.reviews)?;
        let text = text_of(el);
        let text = text.trim_matches(|c| c == '(' || c == ')').trim();
        if !text.is_empty() {
            return Some(text.to_string());
        }
        el.value()
            .attr("aria-label")
            .and_then(|label| label.split_whitespace().next())
            .map(str::to_string)
    }

    fn price_range(&self, doc: &Html) -> Option<String> {
        let el = first(doc, &self.price_range)?;
        let text = text_of(el);
        if !text.is_empty() {
            return Some(text);
        }
        let label = el.value().attr("aria-label")?;
        let value = label
            .split_once(':')
            .map(|(_, v)| v)
            .unwrap_or(label)
            .trim();
        Some(value.to_string()).filter(|v| !v.is_empty())
    }

    fn amenities(&self, doc: &Html, out: &mut Enrichment) {
        for section in doc.select(&self.section) {
            let Some(title) = section.select(&self.section_title).next().map(text_of) else {
                continue;
            };
            let Some(column) = self
                .sections
                .iter()
                .find(|s| s.eq_ignore_ascii_case(&title))
            else {
                tracing::debug!("Ignoring unconfigured section {:?}", title);
                continue;
            };

            let mut available = Vec::new();
            for item in section.select(&self.section_item) {
                let text = clean_item(&text_of(item));
                if text.is_empty() {
                    continue;
                }
                if self.is_unavailable(item, &text) {
                    out.doesnt_offer.push(text);
                } else {
                    available.push(strip_available_prefix(&text));
                }
            }
            if !available.is_empty() {
                out.amenities.insert(column.clone(), available.join(", "));
            }
        }
    }

    fn is_unavailable(&self, item: ElementRef<'_>, text: &str) -> bool {
        let marked = !self.unavailable_class.is_empty()
            && item
                .value()
                .attr("class")
                .is_some_and(|c| c.contains(&self.unavailable_class));
        marked
            || item.select(&self.unavailable_badge).next().is_some()
            || UNAVAILABLE_PREFIXES.iter().any(|p| text.starts_with(p))
    }
}

fn first<'a>(doc: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    doc.select(selector).next()
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drops leading icon glyphs and punctuation.
fn clean_item(text: &str) -> String {
    text.trim_start_matches(|c: char| !c.is_alphanumeric() && !c.is_whitespace())
        .trim()
        .to_string()
}

fn strip_available_prefix(text: &str) -> String {
    let Some(rest) = AVAILABLE_PREFIXES
        .iter()
        .find_map(|p| text.strip_prefix(p))
    else {
        return text.to_string();
    };
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dinescout_api::types::{enrichment_columns, DEFAULT_AMENITY_SECTIONS};

    fn sections() -> Vec<String> {
        DEFAULT_AMENITY_SECTIONS.iter().map(|s| s.to_string()).collect()
    }

    fn parser() -> MapParser {
        MapParser::new(&MapSelectors::default(), &sections()).unwrap()
    }

    const PLACE: &str = r#"
        <html><body>
          <span class="ceNzKf" aria-label="4.6 stars"></span>
          <span aria-label="1,234 reviews">(1,234)</span>
          <button jsaction="pane.rating.category">Mexican restaurant</button>
          <span aria-label="Price: Moderate"></span>
          <div class="iP2t7d">
            <h2 class="iL3Qke">Service options</h2>
            <div class="iNvpkb">&#xe5ca; Outdoor seating</div>
            <div class="iNvpkb">Has takeout</div>
            <div class="iNvpkb">No delivery</div>
          </div>
          <div class="iP2t7d">
            <h2 class="iL3Qke">accessibility</h2>
            <div class="iNvpkb unavailable">Wheelchair accessible entrance</div>
            <div class="iNvpkb">Wheelchair accessible seating</div>
          </div>
          <div class="iP2t7d">
            <h2 class="iL3Qke">Offerings</h2>
            <div class="iNvpkb">Serves vegan dishes</div>
            <div class="iNvpkb"><span aria-label="No happy hour"></span>Happy hour food</div>
          </div>
          <div class="iP2t7d">
            <h2 class="iL3Qke">Crowd</h2>
            <div class="iNvpkb">Groups</div>
          </div>
        </body></html>
    "#;

    #[test]
    fn extracts_core_fields() {
        let e = parser().extract(
            PLACE,
            "https://www.google.com/maps/place/Joes/@30.2672,-97.7431,17z",
        );
        assert_eq!(e.star_rating.as_deref(), Some("4.6"));
        assert_eq!(e.reviews.as_deref(), Some("1,234"));
        assert_eq!(e.category.as_deref(), Some("Mexican restaurant"));
        assert_eq!(e.price_range.as_deref(), Some("Moderate"));
        assert_eq!(e.latitude.as_deref(), Some("30.2672"));
        assert_eq!(e.longitude.as_deref(), Some("-97.7431"));
    }

    #[test]
    fn sorts_amenities_into_available_and_not_offered() {
        let e = parser().extract(PLACE, "");
        assert_eq!(
            e.value("Service options"),
            "Outdoor seating, Takeout".to_string()
        );
        assert_eq!(e.value("Accessibility"), "Wheelchair accessible seating");
        assert_eq!(e.value("Offerings"), "Vegan dishes");
        assert_eq!(
            e.value(DOESNT_OFFER),
            "No delivery, Wheelchair accessible entrance, Happy hour food"
        );
        assert_eq!(e.value("Crowd"), NOT_AVAILABLE);
        assert_eq!(e.value("Parking"), NOT_AVAILABLE);
    }

    #[test]
    fn blank_page_is_all_sentinels() {
        let e = parser().extract("<html><body></body></html>", "about:blank");
        assert_eq!(e, Enrichment::default());
        assert_eq!(e.found(), 0);
        for col in enrichment_columns(&sections()) {
            assert_eq!(e.value(&col), NOT_AVAILABLE);
        }
    }

    #[test]
    fn one_missing_field_does_not_hide_others() {
        let html = r#"<html><body>
            <button jsaction="pane.rating.category">Cafe</button>
        </body></html>"#;
        let e = parser().extract(html, "https://maps.example/@1.5,2.5,10z");
        assert_eq!(e.star_rating, None);
        assert_eq!(e.category.as_deref(), Some("Cafe"));
        assert_eq!(e.latitude.as_deref(), Some("1.5"));
        assert_eq!(e.found(), 3);
    }

    #[test]
    fn coordinates_require_decimal_pair() {
        assert_eq!(
            coordinates_from_url("https://maps/@-33.86,151.20,15z"),
            Some(("-33.86".to_string(), "151.20".to_string()))
        );
        assert_eq!(coordinates_from_url("https://maps/@33,151"), None);
    }

    #[test]
    fn search_url_escapes_query() {
        let url = search_url(
            "https://www.google.com/maps/search/",
            "Joe's Tacos",
            "1 Main St",
            "Austin",
            "TX",
        )
        .unwrap();
        assert_eq!(
            url,
            "https://www.google.com/maps/search/Joe's%20Tacos%201%20Main%20St%20Austin%20TX"
        );
    }

    #[test]
    fn search_url_skips_empty_parts() {
        let url = search_url("https://maps.example/search", "Cafe", "", "", "TX").unwrap();
        assert_eq!(url, "https://maps.example/search/Cafe%20TX");
    }

    #[test]
    fn strips_available_prefix_and_capitalizes() {
        assert_eq!(strip_available_prefix("Has wifi"), "Wifi");
        assert_eq!(strip_available_prefix("Serves beer"), "Beer");
        assert_eq!(strip_available_prefix("Dine-in"), "Dine-in");
    }
}
