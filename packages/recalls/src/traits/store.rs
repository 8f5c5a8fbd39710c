//! Storage collaborator for recalls and reference entities.
//!
//! The core never talks to a database directly; it depends on this trait.
//! Durable implementations must honor two contracts:
//!
//! - `url_exists` is keyed by (agency, canonical URL) and ignores the default
//!   non-rejected visibility filter; a rejected duplicate still counts.
//! - `find_or_create_*` is atomic under concurrent access: two workers
//!   resolving the same new name must end up with one row (unique constraint
//!   plus retry on [`StoreError::Conflict`]).

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::agencies::Agency;
use crate::error::StoreResult;
use crate::types::recall::Recall;
use crate::types::reference::{Company, Country, FoodCategory, Reason, Retailer, State};
use crate::types::state::ParseState;

/// Status part of a [`RecallFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// Publicly visible records: `published` or `verified`.
    Public,

    /// Records in exactly this state (this is the only way a default query
    /// reaches `rejected` records).
    State(ParseState),
}

/// Query filter for recall listings.
///
/// The default filter hides `rejected` records; an explicit status filter
/// overrides that.
#[derive(Debug, Clone, Default)]
pub struct RecallFilter {
    pub status: Option<StatusFilter>,
    pub agency: Option<Agency>,
    pub year: Option<i32>,
    pub reason_slug: Option<String>,
    pub food_category_slug: Option<String>,
    pub origin_country_slug: Option<String>,
    /// Only records not superseded by a later recall.
    pub final_only: bool,
}

impl RecallFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publicly visible records only.
    pub fn public() -> Self {
        Self::new().with_status(StatusFilter::Public)
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_agency(mut self, agency: Agency) -> Self {
        self.agency = Some(agency);
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_reason(mut self, slug: impl Into<String>) -> Self {
        self.reason_slug = Some(slug.into());
        self
    }

    pub fn with_food_category(mut self, slug: impl Into<String>) -> Self {
        self.food_category_slug = Some(slug.into());
        self
    }

    pub fn with_origin_country(mut self, slug: impl Into<String>) -> Self {
        self.origin_country_slug = Some(slug.into());
        self
    }

    pub fn final_only(mut self) -> Self {
        self.final_only = true;
        self
    }
}

/// CRUD and query surface for recalls and their reference entities.
#[async_trait]
pub trait RecallStore: Send + Sync {
    // Recalls

    /// Insert a new record. Fails with [`StoreError::Conflict`] if the
    /// (agency, canonical URL) pair already exists, in any state.
    ///
    /// [`StoreError::Conflict`]: crate::error::StoreError::Conflict
    async fn insert_recall(&self, recall: &Recall) -> StoreResult<()>;

    /// Persist the current state of an existing record.
    async fn update_recall(&self, recall: &Recall) -> StoreResult<()>;

    async fn get_recall(&self, id: Uuid) -> StoreResult<Option<Recall>>;

    /// Existence check keyed by (agency, canonical URL), bypassing the
    /// non-rejected visibility filter.
    async fn url_exists(&self, agency: Agency, canonical_url: &str) -> StoreResult<bool>;

    /// Filtered listing. Hides `rejected` records unless the filter names
    /// that state explicitly.
    async fn recalls(&self, filter: &RecallFilter) -> StoreResult<Vec<Recall>>;

    /// All records currently in a lifecycle state (used by the batch
    /// drivers for `initial` and `retrieved`).
    async fn recalls_in_state(&self, state: ParseState) -> StoreResult<Vec<Recall>>;

    /// Non-rejected records with a recall date in the open interval
    /// (`after`, `before`).
    async fn recalls_in_window(
        &self,
        after: NaiveDate,
        before: NaiveDate,
    ) -> StoreResult<Vec<Recall>>;

    /// Non-rejected records dated after `after` whose company name starts
    /// with `prefix`.
    async fn recalls_by_company_prefix(
        &self,
        prefix: &str,
        after: NaiveDate,
    ) -> StoreResult<Vec<Recall>>;

    /// The earlier record superseded by `later_id`, if any (reverse lookup
    /// on the single physical `superseded_by` field).
    async fn find_superseded(&self, later_id: Uuid) -> StoreResult<Option<Recall>>;

    /// Point `earlier_id`'s `superseded_by` at `later_id`. One write backs
    /// both logical directions of the edge.
    async fn set_superseded_by(&self, earlier_id: Uuid, later_id: Uuid) -> StoreResult<()>;

    /// Distinct recall years, descending.
    async fn years(&self) -> StoreResult<Vec<i32>>;

    // Reference entities

    async fn find_or_create_company(&self, name: &str) -> StoreResult<Company>;

    async fn company(&self, id: Uuid) -> StoreResult<Option<Company>>;

    /// Delete companies no recall references anymore. Deferred, best-effort
    /// garbage collection; a failure never affects extraction results.
    /// Returns the number of companies removed.
    async fn purge_orphan_companies(&self) -> StoreResult<usize>;

    async fn find_or_create_reason(&self, slug: &str) -> StoreResult<Reason>;

    async fn reason(&self, id: Uuid) -> StoreResult<Option<Reason>>;

    async fn find_or_create_food_category(&self, slug: &str) -> StoreResult<FoodCategory>;

    async fn food_category(&self, id: Uuid) -> StoreResult<Option<FoodCategory>>;

    /// Exact-name country lookup; extraction ignores unmatched names.
    async fn find_country_by_name(&self, name: &str) -> StoreResult<Option<Country>>;

    async fn country(&self, id: Uuid) -> StoreResult<Option<Country>>;

    /// The full US state/territory reference list.
    async fn all_states(&self) -> StoreResult<Vec<State>>;

    async fn all_retailers(&self) -> StoreResult<Vec<Retailer>>;
}
