//! Turns one listing card into a structured record, or decides the card is
//! not a listing at all.

use crate::models::{FuelType, ListingRecord};
use crate::scrapers::normalize::{classify_tech_token, clean_price, dedup_sort_tags, TechUpdate};
use crate::scrapers::traits::ElementHandle;
use chrono::Utc;
use tracing::debug;

/// Mandatory title/link of a card; cards without it are promotional slots
pub const TITLE_LINK_SELECTOR: &str = "h3 a";
pub const PRICE_PRIMARY_SELECTOR: &str = ".pricefield-primary";
pub const PRICE_SECONDARY_SELECTOR: &str = ".pricefield-secondary-basic";
pub const TECH_INFO_SELECTOR: &str = ".talalatisor-info.adatok span.info";
/// Broad fallback for the selector variant that drops the wrapper classes
pub const TECH_INFO_FALLBACK_SELECTOR: &str = "span.info";
pub const TAG_SELECTOR: &str = ".cimke-lista span.label";
pub const DESCRIPTION_SELECTOR: &str = ".talalatisor-leiras";
pub const SELLER_SELECTOR: &str = ".kereskedes-nev";

/// URL path segments that mark a recognized vehicle category; brand and
/// model are the two segments right after the marker.
const CATEGORY_SEGMENTS: &[&str] = &["szemelyauto", "kishaszonjarmu"];
/// Brand/model fallback when the URL carries no recognized category
const UNKNOWN_CATEGORY: &str = "Egyéb";
/// Seller fallback when the card has no dealer element
const PRIVATE_SELLER: &str = "Magánszemély";
/// Case-insensitive marker of a rental offer in the price field
const RENTAL_MARKER: &str = "bérelhető";

/// Extracts one record from a listing card, or `None` when the card is
/// unusable (no title link, or an id-less URL). Skips are silent by design;
/// the caller counts them.
pub fn extract_listing(card: &dyn ElementHandle) -> Option<ListingRecord> {
    let link = card.find(TITLE_LINK_SELECTOR)?;
    let url = link.attribute("href")?;
    let title = link.inner_text().unwrap_or_default().trim().to_string();

    let external_id = match parse_external_id(&url) {
        Some(id) => id,
        None => {
            debug!(url, "card link has no trailing numeric id, skipping");
            return None;
        }
    };
    let (brand, model) = brand_model_from_url(&url);

    let raw_price = card.find(PRICE_PRIMARY_SELECTOR).and_then(|e| e.inner_text());
    let raw_sale = card
        .find(PRICE_SECONDARY_SELECTOR)
        .and_then(|e| e.inner_text());
    let is_rentable = [&raw_price, &raw_sale].iter().any(|t| {
        t.as_deref()
            .map(|t| t.to_lowercase().contains(RENTAL_MARKER))
            .unwrap_or(false)
    });
    let price = raw_price.as_deref().and_then(clean_price);
    let sale_price = raw_sale.as_deref().and_then(clean_price);

    let tech = classify_tech_tokens(card);

    let tags = dedup_sort_tags(
        card.find_all(TAG_SELECTOR)
            .iter()
            .filter_map(|e| e.inner_text()),
    );
    let description_snippet = card
        .find(DESCRIPTION_SELECTOR)
        .and_then(|e| e.inner_text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default();
    let seller = card
        .find(SELLER_SELECTOR)
        .and_then(|e| e.inner_text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| PRIVATE_SELLER.to_string());

    Some(ListingRecord {
        external_id,
        url,
        title,
        brand,
        model,
        has_no_price: price.is_none(),
        price,
        sale_price,
        is_rentable,
        fuel: tech.fuel.unwrap_or(FuelType::Unknown),
        year: tech.year,
        month: tech.month,
        engine_cc: tech.engine_cc,
        power_hp: tech.power_hp,
        power_kw: tech.power_kw,
        mileage_km: tech.mileage_km,
        tags,
        description_snippet,
        seller,
        scraped_at: Utc::now(),
    })
}

/// Folds every technical token of the card through the classifier. One
/// selector variant of the catalog drops the wrapper classes, so an empty
/// result falls back to the broad selector before concluding there are no
/// tokens.
fn classify_tech_tokens(card: &dyn ElementHandle) -> TechUpdate {
    let mut spans = card.find_all(TECH_INFO_SELECTOR);
    if spans.is_empty() {
        spans = card.find_all(TECH_INFO_FALLBACK_SELECTOR);
    }
    let mut acc = TechUpdate::default();
    for span in &spans {
        let Some(text) = span.inner_text() else { continue };
        let update = classify_tech_token(&text);
        acc.fuel = update.fuel.or(acc.fuel);
        acc.year = update.year.or(acc.year);
        acc.month = update.month.or(acc.month);
        acc.engine_cc = update.engine_cc.or(acc.engine_cc);
        acc.power_hp = update.power_hp.or(acc.power_hp);
        acc.power_kw = update.power_kw.or(acc.power_kw);
        acc.mileage_km = update.mileage_km.or(acc.mileage_km);
    }
    acc
}

/// The advertisement id is the trailing `-`-separated numeric segment of
/// the listing URL, e.g. `...-opel-astra-21647701`.
fn parse_external_id(url: &str) -> Option<u64> {
    url.trim_end_matches('/')
        .rsplit('-')
        .next()
        .and_then(|tail| tail.parse().ok())
}

/// Reads brand and model as the two path segments following a recognized
/// category segment, rendered human-readable. No category marker means the
/// unknown-category sentinel for both.
fn brand_model_from_url(url: &str) -> (String, String) {
    // Strip scheme and host up front; a path segment may legitimately
    // contain a dot.
    let path = match url.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or(""),
        None => url,
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some(pos) = segments
        .iter()
        .position(|s| CATEGORY_SEGMENTS.contains(&s.to_lowercase().as_str()))
    else {
        return (UNKNOWN_CATEGORY.to_string(), UNKNOWN_CATEGORY.to_string());
    };
    let brand = segments.get(pos + 1).map(|s| humanize_segment(s));
    let model = segments.get(pos + 2).map(|s| humanize_segment(s));
    (
        brand.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
        model.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
    )
}

/// `alfa_romeo` -> `Alfa romeo`
fn humanize_segment(segment: &str) -> String {
    let spaced = segment.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => UNKNOWN_CATEGORY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::browser::HtmlHandle;

    fn card(html: &str) -> HtmlHandle {
        HtmlHandle::from_fragment(html)
    }

    const FULL_CARD: &str = r#"
        <div class="talalati-sor">
          <h3><a href="https://www.hasznaltauto.hu/szemelyauto/opel/astra/opel-astra-j-21647701">OPEL ASTRA J</a></h3>
          <div class="pricefield-primary">4 790 000 Ft</div>
          <div class="pricefield-secondary-basic">5 100 000 Ft</div>
          <div class="talalatisor-info adatok">
            <span class="info">Benzin</span>
            <span class="info">2015/6</span>
            <span class="info">1 398 cm³</span>
            <span class="info">140 LE</span>
            <span class="info">103 kW</span>
            <span class="info">98 000 km</span>
          </div>
          <div class="cimke-lista"><span class="label">Klíma</span><span class="label">ABS</span><span class="label">Klíma</span></div>
          <div class="talalatisor-leiras">Első tulajdonostól, vezetett szervizkönyv.</div>
          <div class="kereskedes-nev">Autócentrum Kft.</div>
        </div>"#;

    #[test]
    fn full_card_extracts_every_field() {
        let record = extract_listing(&card(FULL_CARD)).unwrap();
        assert_eq!(record.external_id, 21647701);
        assert_eq!(record.title, "OPEL ASTRA J");
        assert_eq!(record.brand, "Opel");
        assert_eq!(record.model, "Astra");
        assert_eq!(record.price, Some(4_790_000));
        assert_eq!(record.sale_price, Some(5_100_000));
        assert!(!record.has_no_price);
        assert!(!record.is_rentable);
        assert_eq!(record.fuel, FuelType::Petrol);
        assert_eq!(record.year, Some(2015));
        assert_eq!(record.month, Some(6));
        assert_eq!(record.engine_cc, Some(1398));
        assert_eq!(record.power_hp, Some(140));
        assert_eq!(record.power_kw, Some(103));
        assert_eq!(record.mileage_km, Some(98_000));
        assert_eq!(record.tags, vec!["ABS".to_string(), "Klíma".to_string()]);
        assert_eq!(record.description_snippet, "Első tulajdonostól, vezetett szervizkönyv.");
        assert_eq!(record.seller, "Autócentrum Kft.");
    }

    #[test]
    fn card_without_title_link_is_skipped() {
        let html = r#"<div class="talalati-sor"><div class="banner">Hirdetés</div></div>"#;
        assert!(extract_listing(&card(html)).is_none());
    }

    #[test]
    fn card_with_non_numeric_url_tail_is_skipped() {
        let html = r#"<div><h3><a href="https://www.hasznaltauto.hu/akcio/nyari-gumi">Akció</a></h3></div>"#;
        assert!(extract_listing(&card(html)).is_none());
    }

    #[test]
    fn primary_price_only_leaves_sale_price_absent() {
        let html = r#"
            <div>
              <h3><a href="https://www.hasznaltauto.hu/szemelyauto/suzuki/swift/suzuki-swift-123456">SUZUKI SWIFT</a></h3>
              <div class="pricefield-primary">2 500 000 Ft</div>
            </div>"#;
        let record = extract_listing(&card(html)).unwrap();
        assert_eq!(record.price, Some(2_500_000));
        assert_eq!(record.sale_price, None);
        assert!(!record.has_no_price);
    }

    #[test]
    fn missing_price_element_sets_has_no_price() {
        let html = r#"<div><h3><a href="https://x.hu/szemelyauto/bmw/i3/bmw-i3-777">BMW I3</a></h3></div>"#;
        let record = extract_listing(&card(html)).unwrap();
        assert_eq!(record.price, None);
        assert!(record.has_no_price);
    }

    #[test]
    fn rental_marker_in_price_text_sets_is_rentable() {
        let html = r#"
            <div>
              <h3><a href="https://x.hu/szemelyauto/fiat/500/fiat-500-42">FIAT 500</a></h3>
              <div class="pricefield-primary">Bérelhető: 150 000 Ft/hó</div>
            </div>"#;
        let record = extract_listing(&card(html)).unwrap();
        assert!(record.is_rentable);
        assert_eq!(record.price, Some(150_000));
    }

    #[test]
    fn tech_tokens_found_through_the_fallback_selector() {
        let html = r#"
            <div>
              <h3><a href="https://x.hu/szemelyauto/vw/golf/vw-golf-99">VW GOLF</a></h3>
              <div class="egyeb-adatok"><span class="info">Dízel</span><span class="info">2020</span></div>
            </div>"#;
        let record = extract_listing(&card(html)).unwrap();
        assert_eq!(record.fuel, FuelType::Diesel);
        assert_eq!(record.year, Some(2020));
    }

    #[test]
    fn unrecognized_category_yields_sentinel_brand_and_model() {
        let html = r#"<div><h3><a href="https://x.hu/motor/honda/cbr-600-31">HONDA CBR</a></h3></div>"#;
        let record = extract_listing(&card(html)).unwrap();
        assert_eq!(record.brand, "Egyéb");
        assert_eq!(record.model, "Egyéb");
    }

    #[test]
    fn light_commercial_category_is_recognized() {
        let html = r#"<div><h3><a href="https://x.hu/kishaszonjarmu/ford/transit_custom/ford-transit-88"></a></h3></div>"#;
        let record = extract_listing(&card(html)).unwrap();
        assert_eq!(record.brand, "Ford");
        assert_eq!(record.model, "Transit custom");
    }

    #[test]
    fn dotted_model_segment_does_not_shift_brand_and_model() {
        let html = r#"<div><h3><a href="https://www.hasznaltauto.hu/szemelyauto/bmw/316d_2.0/bmw-316d-98765">BMW 316D</a></h3></div>"#;
        let record = extract_listing(&card(html)).unwrap();
        assert_eq!(record.brand, "Bmw");
        assert_eq!(record.model, "316d 2.0");
    }

    #[test]
    fn relative_listing_url_still_resolves_the_category() {
        let html = r#"<div><h3><a href="/szemelyauto/opel/corsa/opel-corsa-4242">OPEL CORSA</a></h3></div>"#;
        let record = extract_listing(&card(html)).unwrap();
        assert_eq!(record.brand, "Opel");
        assert_eq!(record.model, "Corsa");
    }

    #[test]
    fn missing_seller_defaults_to_private_seller() {
        let html = r#"<div><h3><a href="https://x.hu/szemelyauto/kia/ceed/kia-ceed-55">KIA</a></h3></div>"#;
        let record = extract_listing(&card(html)).unwrap();
        assert_eq!(record.seller, "Magánszemély");
        assert!(record.tags.is_empty());
        assert_eq!(record.description_snippet, "");
    }
}
