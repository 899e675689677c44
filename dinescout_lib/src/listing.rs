//! Extraction of article links and restaurant cards from listing pages.

use scraper::{ElementRef, Html, Selector};

use dinescout_api::types::{
    RestaurantStub, ADDRESS_NOT_FOUND, DESCRIPTION_NOT_FOUND, MAPS_LINK_NOT_FOUND,
    NAME_NOT_FOUND, PHONE_NOT_FOUND, WEBSITE_NOT_FOUND,
};

use crate::config::{ConfigError, ListingSelectors};

pub(crate) fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// [`ListingSelectors`] parsed once per run.
#[derive(Debug, Clone)]
pub struct ListingParser {
    article_link: Selector,
    card: Selector,
    name: Selector,
    description: Selector,
    info: Selector,
    address: Selector,
    anchor: Selector,
    info_row: Selector,
    info_icon: Selector,
    phone_link: Selector,
    embeds: Selector,
    phone_icon: String,
    website_icon: String,
    venue_id_attr: String,
    card_selector: String,
}

impl ListingParser {
    pub fn new(selectors: &ListingSelectors) -> Result<Self, ConfigError> {
        Ok(Self {
            article_link: compile(&selectors.article_link)?,
            card: compile(&selectors.card)?,
            name: compile(&selectors.name)?,
            description: compile(&selectors.description)?,
            info: compile(&selectors.info)?,
            address: compile(&selectors.address)?,
            anchor: compile("a[href]")?,
            info_row: compile(&selectors.info_row)?,
            info_icon: compile(&selectors.info_icon)?,
            phone_link: compile(&selectors.phone_link)?,
            embeds: compile(&selectors.embeds)?,
            phone_icon: selectors.phone_icon.clone(),
            website_icon: selectors.website_icon.clone(),
            venue_id_attr: selectors.venue_id_attr.clone(),
            card_selector: selectors.card.clone(),
        })
    }

    /// Selector the browser waits for before an article counts as rendered.
    pub fn card_selector(&self) -> &str {
        &self.card_selector
    }

    /// Article hrefs on an archive page, in document order, without repeats.
    pub fn article_links(&self, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        let mut links: Vec<String> = Vec::new();
        for a in doc.select(&self.article_link) {
            let Some(href) = a.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') {
                continue;
            }
            if !links.iter().any(|l| l == href) {
                links.push(href.to_string());
            }
        }
        links
    }

    /// Restaurant stubs on a rendered article. Cards without both a name
    /// and an address are skipped.
    pub fn entries(&self, html: &str) -> Vec<RestaurantStub> {
        let doc = Html::parse_document(html);
        doc.select(&self.card)
            .filter_map(|card| self.parse_card(card))
            .collect()
    }

    fn parse_card(&self, card: ElementRef<'_>) -> Option<RestaurantStub> {
        let mut stub = RestaurantStub {
            name: NAME_NOT_FOUND.to_string(),
            description: DESCRIPTION_NOT_FOUND.to_string(),
            address: ADDRESS_NOT_FOUND.to_string(),
            phone: PHONE_NOT_FOUND.to_string(),
            website: WEBSITE_NOT_FOUND.to_string(),
            maps_link: MAPS_LINK_NOT_FOUND.to_string(),
            embedded_links: None,
            venue_id: None,
        };

        if let Some(name) = card.select(&self.name).next().map(text_of) {
            if !name.is_empty() {
                stub.name = name;
            }
        }

        let paragraphs: Vec<String> = card.select(&self.description).map(text_of).collect();
        if !paragraphs.is_empty() {
            stub.description = paragraphs.concat();
        }

        if let Some(info) = card.select(&self.info).next() {
            if let Some(block) = info.select(&self.address).next() {
                let address = text_of(block);
                if !address.is_empty() {
                    stub.address = address;
                }
                if let Some(href) = block
                    .select(&self.anchor)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                {
                    stub.maps_link = href.trim().to_string();
                }
            }

            for row in info.select(&self.info_row) {
                let Some(icon) = row.select(&self.info_icon).next().and_then(icon_ref) else {
                    continue;
                };
                if icon.contains(&self.phone_icon) {
                    if let Some(phone) = row.select(&self.phone_link).next().map(text_of) {
                        if !phone.is_empty() {
                            stub.phone = phone;
                        }
                    }
                } else if icon.contains(&self.website_icon) {
                    if let Some(href) = row
                        .select(&self.anchor)
                        .next()
                        .and_then(|a| a.value().attr("href"))
                    {
                        stub.website = href.trim().to_string();
                    }
                }
            }
        }

        let embeds: Vec<&str> = card
            .select(&self.embeds)
            .filter_map(|e| {
                e.value()
                    .attr("src")
                    .or_else(|| e.value().attr("data-instgrm-permalink"))
            })
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !embeds.is_empty() {
            stub.embedded_links = Some(embeds.join(", "));
        }

        stub.venue_id = card
            .value()
            .attr(&self.venue_id_attr)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        if stub.name == NAME_NOT_FOUND || stub.address == ADDRESS_NOT_FOUND {
            tracing::debug!("Skipping listing card without name or address");
            return None;
        }
        Some(stub)
    }
}

/// `xlink:href` lands in the xlink namespace, so match on the local name.
fn icon_ref<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    el.value()
        .attrs()
        .find(|(name, _)| *name == "href")
        .map(|(_, value)| value)
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> ListingParser {
        ListingParser::new(&ListingSelectors::default()).unwrap()
    }

    const ARCHIVE: &str = r##"
        <html><body>
          <div class="c-compact-river">
            <div class="c-compact-river__entry"><a href="/maps/best-tacos-austin">Tacos</a></div>
            <div class="c-compact-river__entry"><a href="https://www.eater.com/maps/pho">Pho</a></div>
            <div class="c-compact-river__entry"><a href="/maps/best-tacos-austin">Again</a></div>
            <div class="c-compact-river__entry"><a href="#top">Top</a></div>
          </div>
          <a href="/not-an-entry">Other</a>
        </body></html>
    "##;

    const ARTICLE: &str = r##"
        <html><body>
          <section class="c-mapstack__card" data-venue-id="v-123">
            <h1> Joe's   Tacos </h1>
            <div class="c-entry-content venu-card"><p>Great tacos.</p><p> Open late.</p></div>
            <div class="c-mapstack__video">
              <iframe id="instagram-embed-0" src="https://www.instagram.com/p/abc/embed"></iframe>
            </div>
            <div class="c-mapstack__info">
              <div class="c-mapstack__address">
                <a href="https://maps.google.com/?q=joes">1 Main St, Austin, TX 78701</a>
              </div>
              <div class="info">
                <div class="info-icon"><svg><use xlink:href="#icon-phone"></use></svg></div>
                <div class="c-mapstack__phone-url"><a href="tel:5125550100">(512) 555-0100</a></div>
              </div>
              <div class="info">
                <div class="info-icon"><svg><use xlink:href="#icon-world"></use></svg></div>
                <a href="https://joestacos.example">Visit Website</a>
              </div>
            </div>
          </section>
          <section class="c-mapstack__card">
            <h1>Intro Card</h1>
            <div class="c-entry-content venu-card"><p>No address here.</p></div>
          </section>
          <section class="c-mapstack__card">
            <div class="c-mapstack__info">
              <div class="c-mapstack__address"><a href="https://maps.google.com/?q=x">9 Elm St</a></div>
            </div>
          </section>
          <section class="c-mapstack__card">
            <h1>Bare Bistro</h1>
            <div class="c-mapstack__info">
              <div class="c-mapstack__address"><a href="https://maps.google.com/?q=bare">5 Oak Ave, Dallas, TX 75201</a></div>
            </div>
          </section>
        </body></html>
    "##;

    #[test]
    fn article_links_in_order_without_repeats() {
        assert_eq!(
            parser().article_links(ARCHIVE),
            vec![
                "/maps/best-tacos-austin".to_string(),
                "https://www.eater.com/maps/pho".to_string()
            ]
        );
    }

    #[test]
    fn empty_archive_yields_no_links() {
        assert!(parser()
            .article_links("<html><body><p>nothing</p></body></html>")
            .is_empty());
    }

    #[test]
    fn full_card_fields() {
        let entries = parser().entries(ARTICLE);
        assert_eq!(entries.len(), 2);
        let joe = &entries[0];
        assert_eq!(joe.name, "Joe's Tacos");
        assert_eq!(joe.description, "Great tacos.Open late.");
        assert_eq!(joe.address, "1 Main St, Austin, TX 78701");
        assert_eq!(joe.maps_link, "https://maps.google.com/?q=joes");
        assert_eq!(joe.phone, "(512) 555-0100");
        assert_eq!(joe.website, "https://joestacos.example");
        assert_eq!(
            joe.embedded_links.as_deref(),
            Some("https://www.instagram.com/p/abc/embed")
        );
        assert_eq!(joe.venue_id.as_deref(), Some("v-123"));
    }

    #[test]
    fn missing_fields_get_sentinels() {
        let entries = parser().entries(ARTICLE);
        let bare = &entries[1];
        assert_eq!(bare.name, "Bare Bistro");
        assert_eq!(bare.description, DESCRIPTION_NOT_FOUND);
        assert_eq!(bare.phone, PHONE_NOT_FOUND);
        assert_eq!(bare.website, WEBSITE_NOT_FOUND);
        assert_eq!(bare.embedded_links, None);
        assert_eq!(bare.venue_id, None);
    }

    #[test]
    fn namespaced_icon_reference_is_read() {
        let html = Html::parse_fragment(
            r##"<div class="info-icon"><svg><use xlink:href="#icon-phone"></use></svg></div>"##,
        );
        let sel = Selector::parse("use").unwrap();
        let icon = html.select(&sel).next().and_then(icon_ref);
        assert_eq!(icon, Some("#icon-phone"));
    }

    #[test]
    fn bad_selector_is_config_error() {
        let selectors = ListingSelectors {
            card: "section[[".to_string(),
            ..ListingSelectors::default()
        };
        assert!(matches!(
            ListingParser::new(&selectors),
            Err(ConfigError::Selector { .. })
        ));
    }
}
