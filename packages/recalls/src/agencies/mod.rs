//! Per-agency extraction strategies.
//!
//! Each originating agency publishes recall notices in its own HTML/RSS
//! format and URL shape. The differences map to one polymorphic strategy
//! with a fixed capability set, selected by the closed [`Agency`] tag rather
//! than by open-ended subclassing.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::types::recall::Recall;

mod fda;
mod usda;

pub use fda::FdaStrategy;
pub use usda::UsdaStrategy;

/// The originating government body. Closed set; extending it means adding a
/// variant and a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agency {
    Fda,
    Usda,
}

impl Agency {
    /// Tag used in storage keys and index documents.
    pub fn tag(&self) -> &'static str {
        match self {
            Agency::Fda => "fda",
            Agency::Usda => "usda",
        }
    }

    /// All known agencies.
    pub fn all() -> [Agency; 2] {
        [Agency::Fda, Agency::Usda]
    }

    /// The extraction strategy for this agency.
    pub fn strategy(&self) -> &'static dyn AgencyStrategy {
        match self {
            Agency::Fda => &FdaStrategy,
            Agency::Usda => &UsdaStrategy,
        }
    }

    /// Which agency, if any, claims this URL.
    pub fn for_url(url: &str) -> Option<Agency> {
        Agency::all()
            .into_iter()
            .find(|agency| agency.strategy().is_recall_url(url))
    }
}

impl std::fmt::Display for Agency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for Agency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fda" => Ok(Agency::Fda),
            "usda" => Ok(Agency::Usda),
            other => Err(format!("unknown agency: {other}")),
        }
    }
}

/// The fixed per-agency capability set.
///
/// Extractors degrade to `None` on missing or malformed structure; only
/// recall-date extraction is strict (a matched-but-unparseable date is a hard
/// failure of the whole pipeline run).
pub trait AgencyStrategy: Send + Sync {
    fn agency(&self) -> Agency;

    /// Whether the URL matches one of this agency's known recall URL shapes,
    /// including archive shapes that alias a live URL.
    fn is_recall_url(&self, url: &str) -> bool;

    /// Map archive/aliased URL forms to the one canonical form used as the
    /// dedup key. Idempotent.
    fn canonicalize_url(&self, url: &str) -> String;

    /// Clean, readable text for the notice body. Falls back to best-effort
    /// whole-document text when the expected container is absent.
    fn extract_text(&self, html: &str) -> String;

    /// Split the contact block out of `text_content`, if the agency's format
    /// carries one.
    fn extract_contacts(&self, recall: &mut Recall);

    /// First long-form date in the agency's preferred source (body text or
    /// raw HTML).
    fn extract_recall_date(&self, recall: &Recall) -> Result<Option<NaiveDate>, ExtractError>;

    fn extract_title(&self, recall: &Recall) -> Option<String>;

    fn extract_summary(&self, recall: &Recall) -> Option<String>;

    fn extract_company_name(&self, recall: &Recall) -> Option<String>;

    fn extract_source_id(&self, recall: &Recall) -> Option<String>;

    /// Extension point for agency-specific fields; default no-op.
    fn extract_agency_fields(&self, recall: &mut Recall) {
        let _ = recall;
    }
}

/// First `<Month> <day>, <year>` match in the text.
///
/// Returns `Ok(None)` when nothing matches; a match that fails calendar
/// parsing is an [`ExtractError::InvalidDate`] carrying the matched
/// substring.
pub(crate) fn find_recall_date(text: &str) -> Result<Option<NaiveDate>, ExtractError> {
    let pattern = Regex::new(
        r"(January|Jan\.|February|Feb\.|March|Mar\.|April|Apr\.|May|June|Jun\.|July|Jul\.|August|Aug\.|September|Sept\.|October|Oct\.|November|Nov\.|December|Dec\.) (\d{1,2}), (\d{4})",
    )
    .unwrap();

    let Some(caps) = pattern.captures(text) else {
        return Ok(None);
    };
    let matched = caps[0].to_string();

    let month = month_number(&caps[1]);
    let day: u32 = caps[2].parse().unwrap_or(0);
    let year: i32 = caps[3].parse().unwrap_or(0);

    month
        .and_then(|m| NaiveDate::from_ymd_opt(year, m, day))
        .map(Some)
        .ok_or(ExtractError::InvalidDate { matched })
}

fn month_number(token: &str) -> Option<u32> {
    match token.trim_end_matches('.') {
        "January" | "Jan" => Some(1),
        "February" | "Feb" => Some(2),
        "March" | "Mar" => Some(3),
        "April" | "Apr" => Some(4),
        "May" => Some(5),
        "June" | "Jun" => Some(6),
        "July" | "Jul" => Some(7),
        "August" | "Aug" => Some(8),
        "September" | "Sept" => Some(9),
        "October" | "Oct" => Some(10),
        "November" | "Nov" => Some(11),
        "December" | "Dec" => Some(12),
        _ => None,
    }
}
