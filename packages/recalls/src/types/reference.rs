//! Reference entities shared across recalls.
//!
//! Companies, reasons, food categories, countries, states, and retailers are
//! independently-identified lookup rows owned by the storage layer. Recalls
//! point at them by id and never own them. Creation happens lazily by
//! name/slug during extraction via the store's atomic find-or-create.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A recalling company, created on first reference by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
}

impl Company {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// A recall reason from the controlled classification vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
}

impl Reason {
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            title: title.into(),
        }
    }
}

/// A food category assigned by the external classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodCategory {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

impl FoodCategory {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            name: name.into(),
        }
    }
}

/// A country of origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
}

impl Country {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            slug: slugify(&name),
            name,
        }
    }
}

/// A US state or territory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

impl State {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
        }
    }
}

/// A retailer with a configurable name/alias match pattern and the set of
/// state codes it operates in. An empty state set means the retailer is
/// national.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retailer {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    /// Regex alternation matched (word-bounded) against recall text.
    pub pattern: String,
    pub state_codes: Vec<String>,
}

impl Retailer {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            slug: slugify(&name),
            pattern: regex::escape(&name),
            name,
            state_codes: Vec::new(),
        }
    }

    /// Override the match pattern (e.g. to add aliases).
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Restrict the retailer to a set of state codes.
    pub fn with_state_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the retailer operates in any of the given state codes.
    pub fn operates_in(&self, codes: &[String]) -> bool {
        self.state_codes.is_empty() || self.state_codes.iter().any(|c| codes.contains(c))
    }
}

/// Lowercase, dash-separated slug for a display name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// (code, name) pairs for US states and territories, used to seed stores.
pub const US_STATES: &[(&str, &str)] = &[
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("PR", "Puerto Rico"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// Build the full reference list of US states/territories.
pub fn us_states() -> Vec<State> {
    US_STATES
        .iter()
        .map(|(code, name)| State::new(*code, *name))
        .collect()
}
