//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

use crate::agencies::Agency;
use crate::error::{StoreError, StoreResult};
use crate::traits::store::{RecallFilter, RecallStore, StatusFilter};
use crate::types::recall::Recall;
use crate::types::reference::{
    us_states, Company, Country, FoodCategory, Reason, Retailer, State,
};
use crate::types::state::ParseState;

/// In-memory store for recalls and reference entities.
///
/// Useful for testing and development; data is lost on restart. Seeded with
/// the full US state/territory reference list. Find-or-create runs under a
/// single write lock, which makes it atomic under concurrent access.
pub struct MemoryStore {
    recalls: RwLock<HashMap<Uuid, Recall>>,
    companies: RwLock<HashMap<Uuid, Company>>,
    reasons: RwLock<HashMap<Uuid, Reason>>,
    food_categories: RwLock<HashMap<Uuid, FoodCategory>>,
    countries: RwLock<HashMap<Uuid, Country>>,
    states: RwLock<Vec<State>>,
    retailers: RwLock<Vec<Retailer>>,

    /// When set, every operation fails with `StoreError::Unavailable`,
    /// simulating a storage outage.
    unavailable: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new store seeded with the US state list.
    pub fn new() -> Self {
        Self {
            recalls: RwLock::new(HashMap::new()),
            companies: RwLock::new(HashMap::new()),
            reasons: RwLock::new(HashMap::new()),
            food_categories: RwLock::new(HashMap::new()),
            countries: RwLock::new(HashMap::new()),
            states: RwLock::new(us_states()),
            retailers: RwLock::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Seed a country.
    pub fn with_country(self, name: impl Into<String>) -> Self {
        let country = Country::new(name);
        self.countries.write().unwrap().insert(country.id, country);
        self
    }

    /// Seed a retailer.
    pub fn with_retailer(self, retailer: Retailer) -> Self {
        self.retailers.write().unwrap().push(retailer);
        self
    }

    /// Simulate (or clear) a storage outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of stored recalls, rejected included.
    pub fn recall_count(&self) -> usize {
        self.recalls.read().unwrap().len()
    }

    /// Number of stored companies.
    pub fn company_count(&self) -> usize {
        self.companies.read().unwrap().len()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn slug_id<T, F>(map: &HashMap<Uuid, T>, slug: &str, get_slug: F) -> Option<Uuid>
    where
        F: Fn(&T) -> &str,
    {
        map.iter()
            .find(|(_, v)| get_slug(v) == slug)
            .map(|(id, _)| *id)
    }

    fn matches(&self, recall: &Recall, filter: &RecallFilter) -> bool {
        match filter.status {
            Some(StatusFilter::Public) => {
                if !recall.parse_state.is_displayable() {
                    return false;
                }
            }
            Some(StatusFilter::State(state)) => {
                if recall.parse_state != state {
                    return false;
                }
            }
            None => {
                if recall.parse_state == ParseState::Rejected {
                    return false;
                }
            }
        }

        if let Some(agency) = filter.agency {
            if recall.agency != agency {
                return false;
            }
        }
        if let Some(year) = filter.year {
            if recall.year() != Some(year) {
                return false;
            }
        }
        if filter.final_only && recall.superseded_by.is_some() {
            return false;
        }

        if let Some(slug) = &filter.reason_slug {
            let id = Self::slug_id(&self.reasons.read().unwrap(), slug, |r| &r.slug);
            if recall.reason_id != id || id.is_none() {
                return false;
            }
        }
        if let Some(slug) = &filter.food_category_slug {
            let id = Self::slug_id(&self.food_categories.read().unwrap(), slug, |c| &c.slug);
            if recall.food_category_id != id || id.is_none() {
                return false;
            }
        }
        if let Some(slug) = &filter.origin_country_slug {
            let id = Self::slug_id(&self.countries.read().unwrap(), slug, |c| &c.slug);
            if recall.origin_country_id != id || id.is_none() {
                return false;
            }
        }

        true
    }
}

#[async_trait]
impl RecallStore for MemoryStore {
    async fn insert_recall(&self, recall: &Recall) -> StoreResult<()> {
        self.check_available()?;
        let mut recalls = self.recalls.write().unwrap();
        if recalls
            .values()
            .any(|r| r.agency == recall.agency && r.url == recall.url)
        {
            return Err(StoreError::Conflict(format!(
                "url already exists for {}: {}",
                recall.agency, recall.url
            )));
        }
        recalls.insert(recall.id, recall.clone());
        Ok(())
    }

    async fn update_recall(&self, recall: &Recall) -> StoreResult<()> {
        self.check_available()?;
        let mut recalls = self.recalls.write().unwrap();
        if !recalls.contains_key(&recall.id) {
            return Err(StoreError::NotFound(format!("recall {}", recall.id)));
        }
        recalls.insert(recall.id, recall.clone());
        Ok(())
    }

    async fn get_recall(&self, id: Uuid) -> StoreResult<Option<Recall>> {
        self.check_available()?;
        Ok(self.recalls.read().unwrap().get(&id).cloned())
    }

    async fn url_exists(&self, agency: Agency, canonical_url: &str) -> StoreResult<bool> {
        self.check_available()?;
        // rejected records count too
        Ok(self
            .recalls
            .read()
            .unwrap()
            .values()
            .any(|r| r.agency == agency && r.url == canonical_url))
    }

    async fn recalls(&self, filter: &RecallFilter) -> StoreResult<Vec<Recall>> {
        self.check_available()?;
        let mut out: Vec<Recall> = self
            .recalls
            .read()
            .unwrap()
            .values()
            .filter(|r| self.matches(r, filter))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.recall_date.cmp(&a.recall_date));
        Ok(out)
    }

    async fn recalls_in_state(&self, state: ParseState) -> StoreResult<Vec<Recall>> {
        self.check_available()?;
        Ok(self
            .recalls
            .read()
            .unwrap()
            .values()
            .filter(|r| r.parse_state == state)
            .cloned()
            .collect())
    }

    async fn recalls_in_window(
        &self,
        after: NaiveDate,
        before: NaiveDate,
    ) -> StoreResult<Vec<Recall>> {
        self.check_available()?;
        Ok(self
            .recalls
            .read()
            .unwrap()
            .values()
            .filter(|r| {
                r.parse_state != ParseState::Rejected
                    && r.recall_date.is_some_and(|d| d > after && d < before)
            })
            .cloned()
            .collect())
    }

    async fn recalls_by_company_prefix(
        &self,
        prefix: &str,
        after: NaiveDate,
    ) -> StoreResult<Vec<Recall>> {
        self.check_available()?;
        let companies = self.companies.read().unwrap();
        Ok(self
            .recalls
            .read()
            .unwrap()
            .values()
            .filter(|r| {
                r.parse_state != ParseState::Rejected
                    && r.recall_date.is_some_and(|d| d > after)
                    && r.company_id
                        .and_then(|id| companies.get(&id))
                        .is_some_and(|c| c.name.starts_with(prefix))
            })
            .cloned()
            .collect())
    }

    async fn find_superseded(&self, later_id: Uuid) -> StoreResult<Option<Recall>> {
        self.check_available()?;
        Ok(self
            .recalls
            .read()
            .unwrap()
            .values()
            .find(|r| r.superseded_by == Some(later_id))
            .cloned())
    }

    async fn set_superseded_by(&self, earlier_id: Uuid, later_id: Uuid) -> StoreResult<()> {
        self.check_available()?;
        let mut recalls = self.recalls.write().unwrap();
        let earlier = recalls
            .get_mut(&earlier_id)
            .ok_or_else(|| StoreError::NotFound(format!("recall {earlier_id}")))?;
        earlier.superseded_by = Some(later_id);
        Ok(())
    }

    async fn years(&self) -> StoreResult<Vec<i32>> {
        self.check_available()?;
        let mut years: Vec<i32> = self
            .recalls
            .read()
            .unwrap()
            .values()
            .filter_map(|r| r.year())
            .collect();
        years.sort_unstable();
        years.dedup();
        years.reverse();
        Ok(years)
    }

    async fn find_or_create_company(&self, name: &str) -> StoreResult<Company> {
        self.check_available()?;
        let mut companies = self.companies.write().unwrap();
        if let Some(existing) = companies.values().find(|c| c.name == name) {
            return Ok(existing.clone());
        }
        let company = Company::new(name);
        companies.insert(company.id, company.clone());
        Ok(company)
    }

    async fn company(&self, id: Uuid) -> StoreResult<Option<Company>> {
        self.check_available()?;
        Ok(self.companies.read().unwrap().get(&id).cloned())
    }

    async fn purge_orphan_companies(&self) -> StoreResult<usize> {
        self.check_available()?;
        let referenced: std::collections::HashSet<Uuid> = self
            .recalls
            .read()
            .unwrap()
            .values()
            .filter_map(|r| r.company_id)
            .collect();
        let mut companies = self.companies.write().unwrap();
        let before = companies.len();
        companies.retain(|id, _| referenced.contains(id));
        Ok(before - companies.len())
    }

    async fn find_or_create_reason(&self, slug: &str) -> StoreResult<Reason> {
        self.check_available()?;
        let mut reasons = self.reasons.write().unwrap();
        if let Some(existing) = reasons.values().find(|r| r.slug == slug) {
            return Ok(existing.clone());
        }
        let reason = Reason::new(slug, slug.replace('-', " "));
        reasons.insert(reason.id, reason.clone());
        Ok(reason)
    }

    async fn reason(&self, id: Uuid) -> StoreResult<Option<Reason>> {
        self.check_available()?;
        Ok(self.reasons.read().unwrap().get(&id).cloned())
    }

    async fn find_or_create_food_category(&self, slug: &str) -> StoreResult<FoodCategory> {
        self.check_available()?;
        let mut categories = self.food_categories.write().unwrap();
        if let Some(existing) = categories.values().find(|c| c.slug == slug) {
            return Ok(existing.clone());
        }
        let category = FoodCategory::new(slug, slug.replace('-', " "));
        categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn food_category(&self, id: Uuid) -> StoreResult<Option<FoodCategory>> {
        self.check_available()?;
        Ok(self.food_categories.read().unwrap().get(&id).cloned())
    }

    async fn find_country_by_name(&self, name: &str) -> StoreResult<Option<Country>> {
        self.check_available()?;
        Ok(self
            .countries
            .read()
            .unwrap()
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn country(&self, id: Uuid) -> StoreResult<Option<Country>> {
        self.check_available()?;
        Ok(self.countries.read().unwrap().get(&id).cloned())
    }

    async fn all_states(&self) -> StoreResult<Vec<State>> {
        self.check_available()?;
        Ok(self.states.read().unwrap().clone())
    }

    async fn all_retailers(&self) -> StoreResult<Vec<Retailer>> {
        self.check_available()?;
        Ok(self.retailers.read().unwrap().clone())
    }
}
