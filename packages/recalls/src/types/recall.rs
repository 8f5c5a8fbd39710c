//! The central recall record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::agencies::Agency;
use crate::error::StateTransitionError;
use crate::types::state::{transition, ParseEvent, ParseState};

/// Maximum stored title length, in characters.
pub const TITLE_LENGTH: usize = 255;

/// Maximum stored summary length, in characters. Longer summaries are
/// silently clipped before persistence, never rejected.
pub const SUMMARY_LENGTH: usize = 512;

/// The fixed volume unit vocabulary.
pub const VOLUME_UNITS: &[&str] = &[
    "pound", "case", "lot", "carton", "crate", "unit", "package", "packet", "can", "jar", "pint",
    "box",
];

/// A government recall notice tracked through the processing lifecycle.
///
/// Created when a candidate URL is discovered and deduplicated; mutated only
/// by the extraction pipeline and the state machine. All structured fields
/// are null until extraction runs. `text_content`, once set, is authoritative
/// for every downstream text-based extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recall {
    pub id: Uuid,

    /// Originating agency; selects the extraction strategy and URL shapes.
    pub agency: Agency,

    /// Canonical source URL, unique per agency.
    pub url: String,

    /// Raw HTML, normalized to UTF-8 with invalid sequences dropped.
    pub html_content: Option<String>,

    /// SHA-256 of the raw payload, for change detection on re-fetch.
    pub content_hash: Option<String>,

    /// Cleaned plain/markdown text derived from the raw HTML.
    pub text_content: Option<String>,

    pub title: Option<String>,
    pub summary: Option<String>,
    pub contacts: Option<String>,
    pub recall_date: Option<NaiveDate>,

    /// The agency's own identifier for the notice.
    pub source_id: Option<String>,

    pub volume: Option<f64>,
    pub volume_unit: Option<String>,

    pub nationwide: bool,
    pub state_ids: Vec<Uuid>,
    pub retailer_ids: Vec<Uuid>,

    pub reason_id: Option<Uuid>,
    pub food_category_id: Option<Uuid>,
    pub origin_country_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub parent_recall_id: Option<Uuid>,

    /// The later recall that supersedes this one. This is the single physical
    /// supersession field; the forward direction is derived by reverse lookup.
    pub superseded_by: Option<Uuid>,

    pub parse_state: ParseState,

    pub created_at: DateTime<Utc>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl Recall {
    /// Create a new record in `initial` state, with only the URL known.
    ///
    /// The URL must already be canonicalized and deduplicated.
    pub fn new(agency: Agency, canonical_url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agency,
            url: canonical_url.into(),
            html_content: None,
            content_hash: None,
            text_content: None,
            title: None,
            summary: None,
            contacts: None,
            recall_date: None,
            source_id: None,
            volume: None,
            volume_unit: None,
            nationwide: false,
            state_ids: Vec::new(),
            retailer_ids: Vec::new(),
            reason_id: None,
            food_category_id: None,
            origin_country_id: None,
            company_id: None,
            parent_recall_id: None,
            superseded_by: None,
            parse_state: ParseState::Initial,
            created_at: Utc::now(),
            fetched_at: None,
        }
    }

    /// Store a fetched raw payload.
    ///
    /// Bytes are normalized to UTF-8 with invalid sequences dropped (not
    /// replaced, not fatal), and the content hash is updated.
    pub fn set_html_bytes(&mut self, bytes: &[u8]) {
        let text: String = String::from_utf8_lossy(bytes)
            .chars()
            .filter(|c| *c != char::REPLACEMENT_CHARACTER)
            .collect();
        self.content_hash = Some(Self::hash_content(&text));
        self.html_content = Some(text);
        self.fetched_at = Some(Utc::now());
    }

    /// Calculate SHA-256 hash of a payload.
    pub fn hash_content(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Whether a freshly fetched payload differs from the stored one.
    pub fn content_changed(&self, new_content: &str) -> bool {
        self.content_hash.as_deref() != Some(&Self::hash_content(new_content))
    }

    /// Year of the recall date, for index filtering.
    pub fn year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.recall_date.map(|d| d.year())
    }

    /// Short date + truncated title line for reviewer pickers.
    pub fn selector_title(&self) -> String {
        let date = self
            .recall_date
            .map(|d| d.format("%m/%d/%y").to_string())
            .unwrap_or_default();
        let title = self.title.as_deref().unwrap_or("");
        if title.chars().count() > 60 {
            format!("{} {}…", date, truncate_chars(title, 60))
        } else {
            format!("{} {}", date, title)
        }
    }

    /// The portion of `text_content` after the summary, used by the
    /// geographic-scope scan. Falls back to the whole text when the summary
    /// is absent or not found verbatim.
    pub fn text_after_summary(&self) -> Option<&str> {
        let text = self.text_content.as_deref()?;
        match self.summary.as_deref() {
            Some(summary) if !summary.is_empty() => match text.split_once(summary) {
                Some((_, after)) => Some(after),
                None => Some(text),
            },
            _ => Some(text),
        }
    }

    /// Clip title and summary to their storage bounds. Runs once, before
    /// persistence; clipping is silent.
    pub fn clamp_bounds(&mut self) {
        if let Some(title) = &self.title {
            if title.chars().count() > TITLE_LENGTH {
                self.title = Some(truncate_chars(title, TITLE_LENGTH));
            }
        }
        if let Some(summary) = &self.summary {
            if summary.chars().count() > SUMMARY_LENGTH {
                self.summary = Some(truncate_chars(summary, SUMMARY_LENGTH));
            }
        }
    }

    // Lifecycle events. Each fails without mutating on an invalid transition.

    pub fn mark_retrieved(&mut self) -> Result<(), StateTransitionError> {
        self.apply(ParseEvent::MarkRetrieved)
    }

    pub fn mark_parsed(&mut self) -> Result<(), StateTransitionError> {
        self.apply(ParseEvent::MarkParsed)
    }

    pub fn mark_published(&mut self) -> Result<(), StateTransitionError> {
        self.apply(ParseEvent::MarkPublished)
    }

    pub fn mark_verified(&mut self) -> Result<(), StateTransitionError> {
        self.apply(ParseEvent::MarkVerified)
    }

    pub fn reject(&mut self) -> Result<(), StateTransitionError> {
        self.apply(ParseEvent::Reject)
    }

    fn apply(&mut self, event: ParseEvent) -> Result<(), StateTransitionError> {
        self.parse_state = transition(self.parse_state, event)?;
        Ok(())
    }
}

/// Truncate to at most `n` characters, on a character boundary.
pub fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}
