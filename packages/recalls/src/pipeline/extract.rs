//! The ordered field-extraction pipeline.
//!
//! Steps run in a fixed, non-reorderable sequence because later steps consume
//! the output of earlier ones: the contact split rewrites `text_content`
//! before the date scan reads it, the volume scan reads the summary, and the
//! geographic scan reads the text after the summary. Each step either fills
//! its field or leaves it null; only date parsing is strict.
//!
//! A step error aborts the remaining steps and nothing is persisted; the
//! caller must not advance the state machine. The one exception is a
//! transient storage error, which the [`parse`] boundary swallows (logged)
//! so the record is retried on the next batch.

use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ExtractError, IngestError, Result, StoreError};
use crate::traits::classify::{FoodCategoryClassifier, ReasonClassifier};
use crate::traits::store::RecallStore;
use crate::types::recall::{truncate_chars, Recall, TITLE_LENGTH, VOLUME_UNITS};
use crate::types::state::ParseState;

/// Run every extraction step, in order, against a retrieved record.
///
/// Idempotent and retry-safe: re-running overwrites previously extracted
/// fields from the same raw payload. Does not touch the lifecycle state.
pub async fn extract_fields<S, R, C>(
    recall: &mut Recall,
    store: &S,
    reasons: &R,
    categories: &C,
) -> std::result::Result<(), ExtractError>
where
    S: RecallStore + ?Sized,
    R: ReasonClassifier + ?Sized,
    C: FoodCategoryClassifier + ?Sized,
{
    let strategy = recall.agency.strategy();

    let Some(html) = recall.html_content.clone() else {
        debug!(url = %recall.url, "no raw content; skipping extraction");
        return Ok(());
    };

    // 1. Raw HTML → cleaned text. Authoritative for every later text step.
    recall.text_content = Some(strategy.extract_text(&html));

    // 2. Contact block, split out of text_content.
    strategy.extract_contacts(recall);

    // 3. Recall date. The only strict step: a matched-but-invalid date
    //    aborts the run.
    if let Some(date) = strategy.extract_recall_date(recall)? {
        recall.recall_date = Some(date);
    }

    // 4. Title, clipped to its bound here.
    if let Some(title) = strategy.extract_title(recall) {
        recall.title = Some(truncate_chars(&title, TITLE_LENGTH));
    }

    // 5. Summary, used verbatim; the global bound is applied once before
    //    persistence.
    if let Some(summary) = strategy.extract_summary(recall) {
        recall.summary = Some(summary);
    }

    // 6. Reason, via the external vocabulary.
    if let Some(text) = recall.text_content.clone() {
        if let Some(slug) = reasons.classify(&text) {
            recall.reason_id = Some(store.find_or_create_reason(&slug).await?.id);
        }
    }

    // 7. Volume, scanned from the summary only.
    extract_volume(recall);

    // 8. Source-native id.
    if let Some(source_id) = strategy.extract_source_id(recall) {
        recall.source_id = Some(source_id);
    }

    // 9. Geographic scope.
    extract_geographic_scope(recall, store).await?;

    // 10. Company, resolved/created by name.
    if let Some(name) = strategy.extract_company_name(recall) {
        let company = store.find_or_create_company(name.trim()).await?;
        recall.company_id = Some(company.id);
    }

    // 11. Food category, via the external classifier.
    if let Some(slug) = categories.categorize(recall) {
        recall.food_category_id = Some(store.find_or_create_food_category(&slug).await?.id);
    }

    // 12. Country of origin, exact-name match only.
    extract_origin_country(recall, store).await?;

    // 13. Retailers.
    extract_retailers(recall, store).await?;

    // 14. Agency-specific extension point.
    strategy.extract_agency_fields(recall);

    Ok(())
}

/// Extraction entry point, coupled to the state machine.
///
/// A `verified` record is never re-extracted (strict no-op). Otherwise the
/// full extraction runs, bounds are clamped, and the record advances through
/// whatever transitions are valid from its current state
/// (`retrieved → parsed → published`); a record already `published` keeps its
/// state but gets fresh fields. On error no transition happens and nothing is
/// persisted.
pub async fn parse<S, R, C>(
    recall: &mut Recall,
    store: &S,
    reasons: &R,
    categories: &C,
) -> Result<()>
where
    S: RecallStore + ?Sized,
    R: ReasonClassifier + ?Sized,
    C: FoodCategoryClassifier + ?Sized,
{
    if recall.parse_state == ParseState::Verified {
        debug!(url = %recall.url, "record is verified; skipping re-extraction");
        return Ok(());
    }

    match extract_fields(recall, store, reasons, categories).await {
        Ok(()) => {}
        Err(ExtractError::Store(StoreError::Unavailable(msg))) => {
            warn!(url = %recall.url, error = %msg, "storage unavailable during extraction; will retry");
            return Ok(());
        }
        Err(e) => return Err(IngestError::Extract(e)),
    }

    recall.clamp_bounds();

    if recall.parse_state == ParseState::Retrieved {
        recall.mark_parsed()?;
    }
    if recall.parse_state == ParseState::Parsed {
        recall.mark_published()?;
    }

    store.update_recall(recall).await?;
    Ok(())
}

/// Force a record back to `retrieved` and re-run the full parse. Operator
/// tool for reprocessing after extractor changes.
pub async fn reparse<S, R, C>(
    recall: &mut Recall,
    store: &S,
    reasons: &R,
    categories: &C,
) -> Result<()>
where
    S: RecallStore + ?Sized,
    R: ReasonClassifier + ?Sized,
    C: FoodCategoryClassifier + ?Sized,
{
    recall.parse_state = ParseState::Retrieved;
    parse(recall, store, reasons, categories).await
}

/// First `<number> [million] <unit>` match in the summary. "million"
/// multiplies; thousands separators are stripped; first match wins.
fn extract_volume(recall: &mut Recall) {
    let Some(summary) = recall.summary.as_deref() else {
        return;
    };

    let units = VOLUME_UNITS.join("|");
    let million = Regex::new(&format!(r"([\d,\.]+)\smillion\s({units})s?")).unwrap();
    let plain = Regex::new(&format!(r"([\d,]+)\s({units})s?")).unwrap();

    if let Some(caps) = million.captures(summary) {
        if let Ok(n) = caps[1].replace(',', "").parse::<f64>() {
            recall.volume = Some(n * 1_000_000.0);
            recall.volume_unit = Some(caps[2].to_string());
        }
    } else if let Some(caps) = plain.captures(summary) {
        if let Ok(n) = caps[1].replace(',', "").parse::<f64>() {
            recall.volume = Some(n);
            recall.volume_unit = Some(caps[2].to_string());
        }
    }
}

/// Nationwide phrase detection, falling back to a word-bounded scan for
/// state codes and names over the text after the summary.
async fn extract_geographic_scope<S>(
    recall: &mut Recall,
    store: &S,
) -> std::result::Result<(), ExtractError>
where
    S: RecallStore + ?Sized,
{
    recall.state_ids.clear();

    let Some(text) = recall.text_content.as_deref() else {
        recall.nationwide = false;
        return Ok(());
    };

    let nationwide =
        Regex::new(r"(?i)nationwide|nationally|throughout the (\w+\s)?United States").unwrap();
    recall.nationwide = nationwide.is_match(text);
    if recall.nationwide {
        return Ok(());
    }

    let body = recall.text_after_summary().unwrap_or("").to_string();
    let states = store.all_states().await?;

    let code_alt = states
        .iter()
        .map(|s| regex::escape(&s.code))
        .collect::<Vec<_>>()
        .join("|");
    let name_alt = states
        .iter()
        .map(|s| regex::escape(&s.name))
        .collect::<Vec<_>>()
        .join("|");
    let code_pattern = Regex::new(&format!(r"\b(?:{code_alt})\b")).unwrap();
    let name_pattern = Regex::new(&format!(r"\b(?:{name_alt})\b")).unwrap();

    let mut matched: Vec<Uuid> = Vec::new();
    for found in code_pattern.find_iter(&body) {
        if let Some(state) = states.iter().find(|s| s.code == found.as_str()) {
            if !matched.contains(&state.id) {
                matched.push(state.id);
            }
        }
    }
    for found in name_pattern.find_iter(&body) {
        if let Some(state) = states.iter().find(|s| s.name == found.as_str()) {
            if !matched.contains(&state.id) {
                matched.push(state.id);
            }
        }
    }

    recall.state_ids = matched;
    Ok(())
}

/// "product of <X>" / "imported from <X>" / "country of origin is <X>",
/// resolved by exact name; unmatched names are ignored.
async fn extract_origin_country<S>(
    recall: &mut Recall,
    store: &S,
) -> std::result::Result<(), ExtractError>
where
    S: RecallStore + ?Sized,
{
    let Some(text) = recall.text_content.as_deref() else {
        return Ok(());
    };

    let pattern = Regex::new(
        r"(?:[Pp]roduct of|imported from|[cC]ountry of origin is) ((?:[A-Z][a-z]+\s?)+)",
    )
    .unwrap();

    if let Some(caps) = pattern.captures(text) {
        let name = caps[1].trim();
        if let Some(country) = store.find_country_by_name(name).await? {
            recall.origin_country_id = Some(country.id);
        }
    }

    Ok(())
}

/// Retailers from the reference set: all of them for a nationwide recall,
/// otherwise those operating in the matched states; kept when their pattern
/// word-matches the text.
async fn extract_retailers<S>(
    recall: &mut Recall,
    store: &S,
) -> std::result::Result<(), ExtractError>
where
    S: RecallStore + ?Sized,
{
    recall.retailer_ids.clear();

    let Some(text) = recall.text_content.as_deref() else {
        return Ok(());
    };

    let retailers = store.all_retailers().await?;
    let state_codes: Vec<String> = if recall.nationwide {
        Vec::new()
    } else {
        store
            .all_states()
            .await?
            .into_iter()
            .filter(|s| recall.state_ids.contains(&s.id))
            .map(|s| s.code)
            .collect()
    };

    for retailer in &retailers {
        if !recall.nationwide && !retailer.operates_in(&state_codes) {
            continue;
        }
        // Tolerate a bad configured pattern rather than failing the record.
        let Ok(pattern) = Regex::new(&format!(r"\b(?:{})\b", retailer.pattern)) else {
            warn!(retailer = %retailer.slug, "invalid retailer pattern; skipping");
            continue;
        };
        if pattern.is_match(text) {
            recall.retailer_ids.push(retailer.id);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agencies::Agency;
    use crate::stores::MemoryStore;
    use crate::testing::{fda_fixture_html, StaticCategoryClassifier};
    use crate::traits::classify::KeywordReasonClassifier;
    use crate::types::reference::Retailer;
    use chrono::NaiveDate;

    fn classifiers() -> (KeywordReasonClassifier, StaticCategoryClassifier) {
        (
            KeywordReasonClassifier::new().with_reason("salmonella", ["salmonella"]),
            StaticCategoryClassifier::new("snack-foods"),
        )
    }

    fn summary_only_recall(summary: &str) -> Recall {
        let mut recall = Recall::new(Agency::Usda, "http://example.test/");
        recall.summary = Some(summary.to_string());
        recall
    }

    #[test]
    fn test_volume_millions() {
        let mut recall = summary_only_recall("recalling 2.5 million pounds of product");
        extract_volume(&mut recall);
        assert_eq!(recall.volume, Some(2_500_000.0));
        assert_eq!(recall.volume_unit.as_deref(), Some("pound"));
    }

    #[test]
    fn test_volume_with_thousands_separator() {
        let mut recall = summary_only_recall("recalling 1,200 cases of product");
        extract_volume(&mut recall);
        assert_eq!(recall.volume, Some(1_200.0));
        assert_eq!(recall.volume_unit.as_deref(), Some("case"));
    }

    #[test]
    fn test_volume_first_match_wins() {
        let mut recall = summary_only_recall("ships 500 cartons and 900 jars");
        extract_volume(&mut recall);
        assert_eq!(recall.volume, Some(500.0));
        assert_eq!(recall.volume_unit.as_deref(), Some("carton"));
    }

    #[test]
    fn test_volume_absent_leaves_null() {
        let mut recall = summary_only_recall("no quantity mentioned here");
        extract_volume(&mut recall);
        assert!(recall.volume.is_none());
        assert!(recall.volume_unit.is_none());
    }

    #[tokio::test]
    async fn test_nationwide_wins_over_state_tokens() {
        let store = MemoryStore::new();
        let mut recall = Recall::new(Agency::Fda, "http://example.test/");
        recall.text_content =
            Some("distributed nationwide, including stores in TX and Ohio".to_string());

        extract_geographic_scope(&mut recall, &store).await.unwrap();

        assert!(recall.nationwide);
        assert!(recall.state_ids.is_empty());
    }

    #[tokio::test]
    async fn test_state_scan_matches_codes_and_names_deduplicated() {
        let store = MemoryStore::new();
        let mut recall = Recall::new(Agency::Fda, "http://example.test/");
        recall.text_content =
            Some("sold in TX and Ohio; TX stores pulled the product".to_string());

        extract_geographic_scope(&mut recall, &store).await.unwrap();

        assert!(!recall.nationwide);
        assert_eq!(recall.state_ids.len(), 2);
        let states = store.all_states().await.unwrap();
        let codes: Vec<&str> = states
            .iter()
            .filter(|s| recall.state_ids.contains(&s.id))
            .map(|s| s.code.as_str())
            .collect();
        assert!(codes.contains(&"TX"));
        assert!(codes.contains(&"OH"));
    }

    #[tokio::test]
    async fn test_state_scan_only_reads_text_after_summary() {
        let store = MemoryStore::new();
        let mut recall = Recall::new(Agency::Fda, "http://example.test/");
        recall.summary = Some("recall announced for Ohio stores".to_string());
        recall.text_content =
            Some("recall announced for Ohio stores and later expanded to TX".to_string());

        extract_geographic_scope(&mut recall, &store).await.unwrap();

        let states = store.all_states().await.unwrap();
        let codes: Vec<&str> = states
            .iter()
            .filter(|s| recall.state_ids.contains(&s.id))
            .map(|s| s.code.as_str())
            .collect();
        assert_eq!(codes, vec!["TX"]);
    }

    #[tokio::test]
    async fn test_origin_country_exact_match_only() {
        let store = MemoryStore::new().with_country("Mexico");
        let mut recall = Recall::new(Agency::Fda, "http://example.test/");
        recall.text_content = Some("the peppers are a product of Mexico entirely".to_string());

        extract_origin_country(&mut recall, &store).await.unwrap();
        assert!(recall.origin_country_id.is_some());

        let mut other = Recall::new(Agency::Fda, "http://example.test/2");
        other.text_content = Some("imported from Atlantis by boat".to_string());
        extract_origin_country(&mut other, &store).await.unwrap();
        assert!(other.origin_country_id.is_none());
    }

    #[tokio::test]
    async fn test_retailers_filtered_by_state_and_pattern() {
        let store = MemoryStore::new()
            .with_retailer(Retailer::new("Kroger").with_state_codes(["TX", "OH"]))
            .with_retailer(Retailer::new("Safeway").with_state_codes(["CA"]))
            .with_retailer(Retailer::new("Costco"));
        let mut recall = Recall::new(Agency::Fda, "http://example.test/");
        recall.text_content =
            Some("sold at Kroger and Safeway locations in TX stores".to_string());

        extract_geographic_scope(&mut recall, &store).await.unwrap();
        extract_retailers(&mut recall, &store).await.unwrap();

        let retailers = store.all_retailers().await.unwrap();
        let slugs: Vec<&str> = retailers
            .iter()
            .filter(|r| recall.retailer_ids.contains(&r.id))
            .map(|r| r.slug.as_str())
            .collect();
        // Safeway only operates in CA; Costco is national but not mentioned.
        assert_eq!(slugs, vec!["kroger"]);
    }

    #[tokio::test]
    async fn test_invalid_date_aborts_and_record_stays_retrieved() {
        let store = MemoryStore::new();
        let (reasons, categories) = classifiers();

        let mut recall = Recall::new(Agency::Fda, "http://www.fda.gov/Safety/Recalls/ucm1.htm");
        recall.set_html_bytes(
            "<div class=\"middle-column\"><p>Announced February 30, 2009 by the firm.</p></div>"
                .as_bytes(),
        );
        recall.mark_retrieved().unwrap();
        store.insert_recall(&recall).await.unwrap();

        let err = parse(&mut recall, &store, &reasons, &categories)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Extract(ExtractError::InvalidDate { .. })
        ));
        assert_eq!(recall.parse_state, ParseState::Retrieved);
    }

    #[tokio::test]
    async fn test_parse_advances_to_published() {
        let store = MemoryStore::new();
        let (reasons, categories) = classifiers();

        let mut recall = Recall::new(
            Agency::Fda,
            "http://www.fda.gov/Safety/Recalls/ucm186203.htm",
        );
        recall.set_html_bytes(fda_fixture_html().as_bytes());
        recall.mark_retrieved().unwrap();
        store.insert_recall(&recall).await.unwrap();

        parse(&mut recall, &store, &reasons, &categories)
            .await
            .unwrap();

        assert_eq!(recall.parse_state, ParseState::Published);
        assert_eq!(
            recall.recall_date,
            NaiveDate::from_ymd_opt(2009, 9, 28)
        );
        // persisted
        let stored = store.get_recall(recall.id).await.unwrap().unwrap();
        assert_eq!(stored.parse_state, ParseState::Published);
    }

    #[tokio::test]
    async fn test_parse_is_noop_for_verified_records() {
        let store = MemoryStore::new();
        let (reasons, categories) = classifiers();

        let mut recall = Recall::new(
            Agency::Fda,
            "http://www.fda.gov/Safety/Recalls/ucm186203.htm",
        );
        recall.set_html_bytes(fda_fixture_html().as_bytes());
        recall.mark_retrieved().unwrap();
        store.insert_recall(&recall).await.unwrap();
        parse(&mut recall, &store, &reasons, &categories)
            .await
            .unwrap();
        recall.mark_verified().unwrap();

        recall.title = Some("Hand-corrected title".to_string());
        parse(&mut recall, &store, &reasons, &categories)
            .await
            .unwrap();

        assert_eq!(recall.parse_state, ParseState::Verified);
        assert_eq!(recall.title.as_deref(), Some("Hand-corrected title"));
    }

    #[tokio::test]
    async fn test_parse_rerun_overwrites_published_record() {
        let store = MemoryStore::new();
        let (reasons, categories) = classifiers();

        let mut recall = Recall::new(
            Agency::Fda,
            "http://www.fda.gov/Safety/Recalls/ucm186203.htm",
        );
        recall.set_html_bytes(fda_fixture_html().as_bytes());
        recall.mark_retrieved().unwrap();
        store.insert_recall(&recall).await.unwrap();
        parse(&mut recall, &store, &reasons, &categories)
            .await
            .unwrap();

        let extracted_title = recall.title.clone();
        recall.title = Some("Manually edited".to_string());
        parse(&mut recall, &store, &reasons, &categories)
            .await
            .unwrap();

        assert_eq!(recall.parse_state, ParseState::Published);
        assert_eq!(recall.title, extracted_title);
    }

    #[tokio::test]
    async fn test_transient_storage_error_is_swallowed_without_transition() {
        let store = MemoryStore::new();
        let (reasons, categories) = classifiers();

        let mut recall = Recall::new(
            Agency::Fda,
            "http://www.fda.gov/Safety/Recalls/ucm186203.htm",
        );
        recall.set_html_bytes(fda_fixture_html().as_bytes());
        recall.mark_retrieved().unwrap();
        store.insert_recall(&recall).await.unwrap();

        store.set_unavailable(true);
        parse(&mut recall, &store, &reasons, &categories)
            .await
            .unwrap();
        assert_eq!(recall.parse_state, ParseState::Retrieved);

        // retry succeeds once storage recovers
        store.set_unavailable(false);
        parse(&mut recall, &store, &reasons, &categories)
            .await
            .unwrap();
        assert_eq!(recall.parse_state, ParseState::Published);
    }
}
