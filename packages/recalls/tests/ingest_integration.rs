//! End-to-end ingestion tests over fixed raw HTML fixtures.
//!
//! Each agency fixture runs through the full pipeline:
//! 1. Discover the URL (canonicalize + dedup)
//! 2. Fetch raw content
//! 3. Extract every structured field
//! 4. Advance to `published` and push the index projection

use chrono::NaiveDate;
use recalls::testing::{
    fda_fixture_html, usda_fixture_html, MockFetcher, MockSearchIndex, StaticCategoryClassifier,
};
use recalls::{
    discover_url, parse, run, Agency, IngestConfig, KeywordReasonClassifier, MemoryStore,
    ParseState, RecallStore, Retailer,
};

const FDA_URL: &str = "http://www.fda.gov/Safety/Recalls/ucm186203.htm";
const USDA_URL: &str = "http://www.fsis.usda.gov/FSIS_Recalls/RNR_034-2012/index.asp";

fn reason_classifier() -> KeywordReasonClassifier {
    KeywordReasonClassifier::new()
        .with_reason("salmonella", ["salmonella"])
        .with_reason("e-coli", ["e. coli"])
}

fn seeded_store() -> MemoryStore {
    MemoryStore::new()
        .with_country("Mexico")
        .with_retailer(Retailer::new("Kroger").with_state_codes(["TX", "OH"]))
}

#[tokio::test]
async fn test_fda_fixture_end_to_end() {
    let store = seeded_store();
    let fetcher = MockFetcher::new().with_page(FDA_URL, fda_fixture_html());
    let reasons = reason_classifier();
    let categories = StaticCategoryClassifier::new("snack-foods");
    let index = MockSearchIndex::new();

    discover_url(&store, FDA_URL).await.unwrap().unwrap();
    let result = run(
        &store,
        &fetcher,
        &reasons,
        &categories,
        &index,
        &IngestConfig::new(),
        None,
    )
    .await
    .unwrap();
    assert!(result.is_success());

    let recall = store
        .recalls_in_state(ParseState::Published)
        .await
        .unwrap()
        .pop()
        .expect("one published recall");

    assert_eq!(recall.agency, Agency::Fda);
    assert_eq!(
        recall.title.as_deref(),
        Some("Acme Foods Recalls Peanut Butter Crackers")
    );
    assert_eq!(recall.recall_date, NaiveDate::from_ymd_opt(2009, 9, 28));
    assert_eq!(
        recall.summary.as_deref(),
        Some(
            "Acme Foods, Inc. is voluntarily recalling 2.5 million pounds of peanut butter \
             crackers because of possible Salmonella contamination."
        )
    );
    assert_eq!(
        recall.contacts.as_deref(),
        Some("Consumer: 1-800-555-0199\n\nMedia: Jane Doe 555-0100")
    );
    assert_eq!(recall.source_id.as_deref(), Some("186203"));
    assert_eq!(recall.volume, Some(2_500_000.0));
    assert_eq!(recall.volume_unit.as_deref(), Some("pound"));
    assert!(!recall.nationwide);

    // the contact block is gone from the body text
    let text = recall.text_content.as_deref().unwrap();
    assert!(!text.contains("Contact:"));
    assert!(!text.contains("FDA does not endorse"));
    assert!(text.starts_with("FOR IMMEDIATE RELEASE - September 28, 2009"));

    // reference entities resolved
    let company = store
        .company(recall.company_id.expect("company"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(company.name, "Acme Foods, Inc.");

    let states = store.all_states().await.unwrap();
    let mut codes: Vec<&str> = states
        .iter()
        .filter(|s| recall.state_ids.contains(&s.id))
        .map(|s| s.code.as_str())
        .collect();
    codes.sort_unstable();
    assert_eq!(codes, vec!["OH", "TX"]);

    let retailers = store.all_retailers().await.unwrap();
    let matched: Vec<&str> = retailers
        .iter()
        .filter(|r| recall.retailer_ids.contains(&r.id))
        .map(|r| r.slug.as_str())
        .collect();
    assert_eq!(matched, vec!["kroger"]);

    let origin = store
        .country(recall.origin_country_id.expect("origin country"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(origin.name, "Mexico");

    let reason = store
        .reason(recall.reason_id.expect("reason"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason.slug, "salmonella");

    // projection pushed with derived agency and year
    let projections = index.projections();
    assert_eq!(projections.len(), 1);
    assert_eq!(projections[0].agency, "fda");
    assert_eq!(projections[0].year, Some(2009));
    assert_eq!(projections[0].company.as_ref().unwrap().name, "Acme Foods, Inc.");
    assert_eq!(projections[0].states.len(), 2);
}

#[tokio::test]
async fn test_usda_fixture_end_to_end() {
    let store = seeded_store();
    let fetcher = MockFetcher::new().with_page(USDA_URL, usda_fixture_html());
    let reasons = reason_classifier();
    let categories = StaticCategoryClassifier::new("meat");
    let index = MockSearchIndex::new();

    discover_url(&store, USDA_URL).await.unwrap().unwrap();
    let result = run(
        &store,
        &fetcher,
        &reasons,
        &categories,
        &index,
        &IngestConfig::new(),
        None,
    )
    .await
    .unwrap();
    assert!(result.is_success());

    let recall = store
        .recalls_in_state(ParseState::Published)
        .await
        .unwrap()
        .pop()
        .expect("one published recall");

    assert_eq!(recall.agency, Agency::Usda);
    assert_eq!(
        recall.title.as_deref(),
        Some("Texas Firm Recalls Ground Beef Products Due To Possible E. Coli Contamination")
    );
    assert_eq!(recall.recall_date, NaiveDate::from_ymd_opt(2012, 3, 5));
    assert_eq!(
        recall.summary.as_deref(),
        Some(
            "Acme Meats Inc. is recalling approximately 1,200 pounds of frozen ground beef \
             products that may be contaminated with E. coli O157:H7."
        )
    );
    assert_eq!(recall.contacts, None);
    assert_eq!(recall.source_id.as_deref(), Some("FSIS-RC-034-2012"));
    assert_eq!(recall.volume, Some(1_200.0));
    assert_eq!(recall.volume_unit.as_deref(), Some("pound"));
    assert!(recall.nationwide);
    assert!(recall.state_ids.is_empty());

    let text = recall.text_content.as_deref().unwrap();
    assert!(!text.contains("Ask Karen"));
    assert!(!text.contains("Congressional and Public Affairs"));
    assert!(!text.contains("Banner and navigation chrome"));

    let company = store
        .company(recall.company_id.expect("company"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(company.name, "Acme Meats Inc.");

    let reason = store
        .reason(recall.reason_id.expect("reason"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason.slug, "e-coli");

    let projections = index.projections();
    assert_eq!(projections.len(), 1);
    assert_eq!(projections[0].agency, "usda");
    assert_eq!(projections[0].year, Some(2012));
}

#[tokio::test]
async fn test_rerun_overwrites_until_verified() {
    let store = seeded_store();
    let fetcher = MockFetcher::new().with_page(FDA_URL, fda_fixture_html());
    let reasons = reason_classifier();
    let categories = StaticCategoryClassifier::new("snack-foods");
    let index = MockSearchIndex::new();

    discover_url(&store, FDA_URL).await.unwrap().unwrap();
    run(
        &store,
        &fetcher,
        &reasons,
        &categories,
        &index,
        &IngestConfig::new(),
        None,
    )
    .await
    .unwrap();

    let mut recall = store
        .recalls_in_state(ParseState::Published)
        .await
        .unwrap()
        .pop()
        .unwrap();

    // a published record gets overwritten on re-parse
    recall.title = Some("Operator edit".to_string());
    parse(&mut recall, &store, &reasons, &categories).await.unwrap();
    assert_eq!(recall.parse_state, ParseState::Published);
    assert_eq!(
        recall.title.as_deref(),
        Some("Acme Foods Recalls Peanut Butter Crackers")
    );

    // a verified record is frozen
    recall.mark_verified().unwrap();
    store.update_recall(&recall).await.unwrap();
    recall.title = Some("Reviewer correction".to_string());
    parse(&mut recall, &store, &reasons, &categories).await.unwrap();
    assert_eq!(recall.parse_state, ParseState::Verified);
    assert_eq!(recall.title.as_deref(), Some("Reviewer correction"));
}

#[tokio::test]
async fn test_fetch_timeout_is_recoverable() {
    let store = seeded_store();
    let fetcher = MockFetcher::new().with_timeout(FDA_URL);
    let reasons = reason_classifier();
    let categories = StaticCategoryClassifier::none();
    let index = MockSearchIndex::new();

    discover_url(&store, FDA_URL).await.unwrap().unwrap();
    let result = run(
        &store,
        &fetcher,
        &reasons,
        &categories,
        &index,
        &IngestConfig::new(),
        None,
    )
    .await
    .unwrap();

    assert_eq!(result.fetched, 0);
    assert_eq!(result.failed_urls, vec![FDA_URL.to_string()]);
    // record stays initial for the next batch
    let initial = store.recalls_in_state(ParseState::Initial).await.unwrap();
    assert_eq!(initial.len(), 1);
}
