//! Denormalized projection pushed to the search index.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::traits::store::RecallStore;
use crate::types::recall::Recall;
use crate::types::state::ParseState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyDoc {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlugDoc {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDoc {
    pub code: String,
    pub name: String,
}

/// Everything the search index needs about one recall: the structured fields
/// plus the derived `agency` tag and `year`. Raw HTML is deliberately left
/// out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallProjection {
    pub id: Uuid,
    pub url: String,
    pub agency: String,
    pub year: Option<i32>,
    pub parse_state: ParseState,

    pub title: Option<String>,
    pub summary: Option<String>,
    pub text_content: Option<String>,
    pub contacts: Option<String>,
    pub recall_date: Option<NaiveDate>,
    pub source_id: Option<String>,

    pub volume: Option<f64>,
    pub volume_unit: Option<String>,

    pub nationwide: bool,
    pub states: Vec<StateDoc>,
    pub retailers: Vec<SlugDoc>,

    pub company: Option<CompanyDoc>,
    pub reason: Option<SlugDoc>,
    pub food_category: Option<SlugDoc>,
    pub origin_country: Option<SlugDoc>,
}

/// Resolve a recall's reference ids into a projection.
pub async fn project<S>(store: &S, recall: &Recall) -> StoreResult<RecallProjection>
where
    S: RecallStore + ?Sized,
{
    let company = match recall.company_id {
        Some(id) => store.company(id).await?.map(|c| CompanyDoc {
            id: c.id,
            name: c.name,
        }),
        None => None,
    };

    let reason = match recall.reason_id {
        Some(id) => store.reason(id).await?.map(|r| SlugDoc {
            slug: r.slug,
            name: r.title,
        }),
        None => None,
    };

    let food_category = match recall.food_category_id {
        Some(id) => store.food_category(id).await?.map(|c| SlugDoc {
            slug: c.slug,
            name: c.name,
        }),
        None => None,
    };

    let origin_country = match recall.origin_country_id {
        Some(id) => store.country(id).await?.map(|c| SlugDoc {
            slug: c.slug,
            name: c.name,
        }),
        None => None,
    };

    let states = store
        .all_states()
        .await?
        .into_iter()
        .filter(|s| recall.state_ids.contains(&s.id))
        .map(|s| StateDoc {
            code: s.code,
            name: s.name,
        })
        .collect();

    let retailers = store
        .all_retailers()
        .await?
        .into_iter()
        .filter(|r| recall.retailer_ids.contains(&r.id))
        .map(|r| SlugDoc {
            slug: r.slug,
            name: r.name,
        })
        .collect();

    Ok(RecallProjection {
        id: recall.id,
        url: recall.url.clone(),
        agency: recall.agency.tag().to_string(),
        year: recall.year(),
        parse_state: recall.parse_state,
        title: recall.title.clone(),
        summary: recall.summary.clone(),
        text_content: recall.text_content.clone(),
        contacts: recall.contacts.clone(),
        recall_date: recall.recall_date,
        source_id: recall.source_id.clone(),
        volume: recall.volume,
        volume_unit: recall.volume_unit.clone(),
        nationwide: recall.nationwide,
        states,
        retailers,
        company,
        reason,
        food_category,
        origin_country,
    })
}
