//! Testing utilities: mock collaborators and raw HTML fixtures.
//!
//! Useful for testing applications that use this library without real
//! network calls or a real index.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::error::{FetchError, FetchResult, StoreError, StoreResult};
use crate::traits::classify::FoodCategoryClassifier;
use crate::traits::fetcher::Fetcher;
use crate::traits::index::SearchIndex;
use crate::types::projection::RecallProjection;
use crate::types::recall::Recall;

/// A mock fetcher serving configured pages.
///
/// Unknown URLs fail with a 404 status; URLs registered as failures or
/// timeouts fail accordingly. Every request is recorded for assertions.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, Vec<u8>>,
    failures: HashSet<String>,
    timeouts: HashSet<String>,
    requests: RwLock<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into().into_bytes());
        self
    }

    /// Serve raw bytes for `url` (e.g. to exercise encoding normalization).
    pub fn with_page_bytes(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.pages.insert(url.into(), body);
        self
    }

    /// Fail `url` with an HTTP 500.
    pub fn with_failure(mut self, url: impl Into<String>) -> Self {
        self.failures.insert(url.into());
        self
    }

    /// Fail `url` with a timeout.
    pub fn with_timeout(mut self, url: impl Into<String>) -> Self {
        self.timeouts.insert(url.into());
        self
    }

    /// URLs requested so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<Vec<u8>> {
        self.requests.write().unwrap().push(url.to_string());

        if self.timeouts.contains(url) {
            return Err(FetchError::Timeout {
                url: url.to_string(),
            });
        }
        if self.failures.contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 500,
            });
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A mock search index recording every pushed projection.
#[derive(Default)]
pub struct MockSearchIndex {
    projections: RwLock<Vec<RecallProjection>>,
    fail: bool,
}

impl MockSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every push fail.
    pub fn failing() -> Self {
        Self {
            projections: RwLock::new(Vec::new()),
            fail: true,
        }
    }

    /// Projections pushed so far.
    pub fn projections(&self) -> Vec<RecallProjection> {
        self.projections.read().unwrap().clone()
    }
}

#[async_trait]
impl SearchIndex for MockSearchIndex {
    async fn index_recall(&self, projection: &RecallProjection) -> StoreResult<()> {
        if self.fail {
            return Err(StoreError::Backend("mock index failure".into()));
        }
        self.projections.write().unwrap().push(projection.clone());
        Ok(())
    }
}

/// A category classifier that always answers with one configured slug.
#[derive(Default)]
pub struct StaticCategoryClassifier {
    slug: Option<String>,
}

impl StaticCategoryClassifier {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
        }
    }

    /// A classifier that never assigns a category.
    pub fn none() -> Self {
        Self::default()
    }
}

impl FoodCategoryClassifier for StaticCategoryClassifier {
    fn categorize(&self, _recall: &Recall) -> Option<String> {
        self.slug.clone()
    }
}

/// A complete FDA recall page: metadata fields, a `middle-column` container,
/// the disclaimer header, a contact block with a Media subsection, and a
/// footer.
pub fn fda_fixture_html() -> String {
    r#"<html>
<head>
<title>Recalls, Market Withdrawals, &amp; Safety Alerts - Acme Foods Recalls Peanut Butter Crackers</title>
<meta name="dc.title" content="Recalls, Market Withdrawals, &amp; Safety Alerts - Acme Foods Recalls Peanut Butter Crackers" />
<meta name="description" content="Acme Foods, Inc. is voluntarily recalling 2.5 million pounds of peanut butter crackers because of possible Salmonella contamination." />
<meta name="company_name" content="Acme Foods, Inc." />
<meta name="ID" content="186203" />
</head>
<body>
<div class="left-rail">Site navigation links</div>
<div class="middle-column">
<h3>Acme Foods Recalls Peanut Butter Crackers</h3>
<p>FDA posts press releases and other notices of recalls as a service to consumers. FDA does not endorse either the product or the company.</p>
<p><strong>Contact:</strong></p>
<p>Consumer: 1-800-555-0199</p>
<p>Media: Jane Doe 555-0100</p>
<p>FOR IMMEDIATE RELEASE - September 28, 2009 - Acme Foods, Inc. is voluntarily recalling 2.5 million pounds of peanut butter crackers because of possible Salmonella contamination.</p>
<p>The crackers were sold at Kroger stores in TX and Ohio. The crackers are a product of Mexico.</p>
<h3></h3>
<p>Page footer and social links.</p>
</div>
</body>
</html>"#
        .to_string()
}

/// A complete FSIS recall page: comment-delimited body, release header with
/// the office contact, recall-title heading, nationwide distribution, and an
/// "Ask Karen" footer.
pub fn usda_fixture_html() -> String {
    r#"<html>
<head>
<title>FSIS Advertisement Rotator Recall Release</title>
<meta name="description" content="Acme Meats Inc. is recalling approximately 1,200 pounds of frozen ground beef products that may be contaminated with E. coli O157:H7." />
</head>
<body>
Banner and navigation chrome.
<!-- BEGIN PAGE CONTENTS UNDER BANNER IMAGE -->
<p>Recall Release FSIS-RC-034-2012</p>
<p>Congressional and Public Affairs
Jane Doe (202) 720-9113</p>
<h3 class="recall-title-header">Texas Firm Recalls Ground Beef Products Due To Possible E. Coli Contamination</h3>
<p>WASHINGTON, March 5, 2012 - Acme Meats Inc., a Plainview, Texas establishment, is recalling approximately 1,200 pounds of frozen ground beef products that may be contaminated with E. coli O157:H7, the U.S. Department of Agriculture's Food Safety and Inspection Service (FSIS) announced today.</p>
<p>The products were distributed nationwide through retail stores.</p>
<p>Consumers with food safety questions can "Ask Karen," the FSIS virtual representative available 24 hours a day.</p>
<!-- END OF CENTER COLUMN CONTENTS -->
Footer chrome.
</body>
</html>"#
        .to_string()
}
