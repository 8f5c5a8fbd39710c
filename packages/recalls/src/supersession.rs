//! Supersession linking between related recalls.
//!
//! A recall can update an earlier one (same incident re-announced, or scope
//! expanded). The relationship is one directed edge: the earlier record's
//! `superseded_by` points at the later record. The forward direction
//! ("which recall does X supersede?") is always a reverse lookup, never a
//! second stored field.
//!
//! The candidate queries are read-only heuristics for a reviewer workflow;
//! they are not part of the ingestion write path.

use chrono::{Days, Months};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::traits::store::RecallStore;
use crate::types::recall::Recall;

/// Other recalls whose date falls in the open interval
/// (date − 3 months, date + 3 days), ascending by date.
///
/// Empty when the record has no recall date yet.
pub async fn candidate_parents<S>(store: &S, recall: &Recall) -> StoreResult<Vec<Recall>>
where
    S: RecallStore + ?Sized,
{
    let Some(date) = recall.recall_date else {
        return Ok(Vec::new());
    };

    let after = date - Months::new(3);
    let before = date + Days::new(3);

    let mut candidates = store.recalls_in_window(after, before).await?;
    candidates.retain(|r| r.id != recall.id);
    candidates.sort_by_key(|r| r.recall_date);
    Ok(candidates)
}

/// Recalls this record may supersede: the one it currently supersedes, plus
/// any other recall newer than (date − 1 month) whose company name is a
/// prefix of this record's company name. Descending by date.
///
/// Empty when the record has no company.
pub async fn candidate_earlier_recalls<S>(store: &S, recall: &Recall) -> StoreResult<Vec<Recall>>
where
    S: RecallStore + ?Sized,
{
    let Some(company_id) = recall.company_id else {
        return Ok(Vec::new());
    };
    let Some(company) = store.company(company_id).await? else {
        return Ok(Vec::new());
    };

    let mut candidates = Vec::new();
    if let Some(current) = store.find_superseded(recall.id).await? {
        candidates.push(current);
    }

    if let Some(date) = recall.recall_date {
        let after = date - Months::new(1);
        for other in store.recalls_by_company_prefix(&company.name, after).await? {
            if other.id != recall.id && candidates.iter().all(|c| c.id != other.id) {
                candidates.push(other);
            }
        }
    }

    candidates.sort_by(|a, b| b.recall_date.cmp(&a.recall_date));
    Ok(candidates)
}

/// Record that `later` supersedes `earlier_id`.
///
/// One write: the earlier record's `superseded_by` is set to `later`; the
/// forward direction is derived.
pub async fn link_supersedes<S>(store: &S, later: &Recall, earlier_id: Uuid) -> StoreResult<()>
where
    S: RecallStore + ?Sized,
{
    store.set_superseded_by(earlier_id, later.id).await
}

/// The recall `later` supersedes, if any (reverse lookup).
pub async fn supersedes<S>(store: &S, later: &Recall) -> StoreResult<Option<Recall>>
where
    S: RecallStore + ?Sized,
{
    store.find_superseded(later.id).await
}
