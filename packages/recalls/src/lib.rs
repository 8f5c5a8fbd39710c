//! Government food-recall ingestion and extraction.
//!
//! Ingests recall notices from two agencies publishing in incompatible
//! HTML/RSS formats, converts raw HTML into normalized structured records,
//! and tracks each record through a processing lifecycle:
//! `initial → retrieved → parsed → published`, with `verified` and
//! `rejected` side states.
//!
//! # Design
//!
//! - Per-agency differences (URL shapes, markup, field sources) live behind
//!   one strategy trait selected by a closed agency tag ([`agencies`]).
//! - Field extraction is an ordered, non-reorderable pipeline over the
//!   record; later steps consume earlier steps' output ([`pipeline::extract`]).
//! - Storage, fetching, search indexing, and classification vocabularies are
//!   external collaborators behind traits ([`traits`]), with an in-memory
//!   store and mocks shipped for tests ([`stores`], [`testing`]).
//!
//! # Usage
//!
//! ```rust,ignore
//! use recalls::{discover_urls, run, IngestConfig, MemoryStore};
//! use recalls::{HttpFetcher, KeywordReasonClassifier};
//!
//! let store = MemoryStore::new();
//! let fetcher = HttpFetcher::new();
//! let reasons = KeywordReasonClassifier::new()
//!     .with_reason("salmonella", ["salmonella"]);
//!
//! // URLs come from a feed-discovery collaborator (RSS, archive pages)
//! discover_urls(&store, feed_urls).await?;
//! run(&store, &fetcher, &reasons, &categories, &index, &IngestConfig::new(), None).await?;
//! ```

pub mod agencies;
pub mod error;
pub mod html;
pub mod pipeline;
pub mod stores;
pub mod supersession;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    ExtractError, FetchError, FetchResult, IngestError, Result, StateTransitionError, StoreError,
    StoreResult,
};
pub use types::{
    projection::{project, RecallProjection},
    recall::{Recall, SUMMARY_LENGTH, TITLE_LENGTH, VOLUME_UNITS},
    reference::{us_states, Company, Country, FoodCategory, Reason, Retailer, State},
    state::{transition, ParseEvent, ParseState},
};

// Re-export the agency strategies
pub use agencies::{Agency, AgencyStrategy, FdaStrategy, UsdaStrategy};

// Re-export pipeline entry points
pub use pipeline::{
    extract::{extract_fields, parse, reparse},
    ingest::{
        discover_from_index_page, discover_url, discover_urls, extract_index_links, fetch_pending,
        parse_pending, run, IngestConfig, IngestResult,
    },
};

// Re-export supersession queries
pub use supersession::{candidate_earlier_recalls, candidate_parents, link_supersedes, supersedes};

// Re-export collaborator traits and shipped implementations
pub use traits::{
    classify::{FoodCategoryClassifier, KeywordReasonClassifier, ReasonClassifier},
    fetcher::{Fetcher, HttpFetcher},
    index::SearchIndex,
    store::{RecallFilter, RecallStore, StatusFilter},
};

// Re-export stores
pub use stores::MemoryStore;
