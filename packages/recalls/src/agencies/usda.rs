//! USDA/FSIS recall strategy.
//!
//! FSIS releases delimit the body between two HTML comment markers and bury
//! the useful text under regulatory boilerplate: listeriosis advisories,
//! "Ask Karen" footers, and safe-preparation instruction blocks. The notice
//! id is an `FSIS-RC-<n>-<year>` token in the raw HTML.

use chrono::NaiveDate;
use regex::Regex;

use super::{find_recall_date, Agency, AgencyStrategy};
use crate::error::ExtractError;
use crate::html;
use crate::types::recall::Recall;

const AD_ROTATOR: &str = "FSIS Advertisement Rotator";

pub struct UsdaStrategy;

impl AgencyStrategy for UsdaStrategy {
    fn agency(&self) -> Agency {
        Agency::Usda
    }

    fn is_recall_url(&self, url: &str) -> bool {
        let url = self.canonicalize_url(url);
        let news = Regex::new(
            r"http://www\.fsis\.usda\.gov/News_&_Events/Recall_\d+_\d{4}_Release/index\.asp",
        )
        .unwrap();
        let rnr =
            Regex::new(r"http://www\.fsis\.usda\.gov/FSIS_Recalls/RNR_\d+-\d{4}/index\.asp")
                .unwrap();
        news.is_match(&url) || rnr.is_match(&url)
    }

    fn canonicalize_url(&self, url: &str) -> String {
        url.replace("&amp;", "&")
    }

    fn extract_text(&self, html_content: &str) -> String {
        let mut raw = html_content.to_string();

        // Body lives between two comment markers; fall back to the whole
        // document when either is absent.
        let begin =
            Regex::new(r"(?s)^.*<!--\s+BEGIN PAGE CONTENTS UNDER BANNER IMAGE\s+-->").unwrap();
        raw = begin.replace(&raw, "").to_string();
        let end = Regex::new(r"(?s)<!--\s*END OF CENTER COLUMN CONTENTS\s*-->.*$").unwrap();
        raw = end.replace(&raw, "").to_string();

        let mut text = html::html_to_markdown(&raw);
        text = text.replace("\r\n", "\n").replace('\u{00a0}', " ");

        text = remove_boilerplate(&text);

        // Join wrapped lines, then tidy the resulting whitespace.
        let single_newline = Regex::new(r"\n([^\n])").unwrap();
        text = single_newline.replace_all(&text, " $1").to_string();
        let space_before_punct = Regex::new(r"[ ]+([,.])").unwrap();
        text = space_before_punct.replace_all(&text, "$1").to_string();
        let ws_runs = Regex::new(r"[ \t][ \t]+").unwrap();
        text = ws_runs.replace_all(&text, " ").to_string();
        let leading_ws = Regex::new(r"(?m)^[ ]+").unwrap();
        text = leading_ws.replace_all(&text, "").to_string();
        let blank_runs = Regex::new(r"\n{3,}").unwrap();
        text = blank_runs.replace_all(&text, "\n\n").to_string();
        text = text.trim().to_string();

        // Release header, ending in the office contact's phone number.
        let header = Regex::new(
            r"(?s)^.*Congressional and Public Affairs ([A-Z][a-z]+\s)+\(\d{3}\) \d{3}-\d{4}\s+",
        )
        .unwrap();
        text = header.replace(&text, "").to_string();

        text.trim().to_string()
    }

    fn extract_contacts(&self, _recall: &mut Recall) {}

    fn extract_recall_date(&self, recall: &Recall) -> Result<Option<NaiveDate>, ExtractError> {
        match recall.html_content.as_deref() {
            Some(html_content) => find_recall_date(html_content),
            None => Ok(None),
        }
    }

    fn extract_title(&self, recall: &Recall) -> Option<String> {
        let html_content = recall.html_content.as_deref()?;

        let mut title = html::title_text(html_content)
            .map(|t| html::squish(&t).replace(AD_ROTATOR, ""));

        // The recall-title heading is more reliable than <title> when present.
        if let Some(heading) = html::element_text_by_class(html_content, "h3", "recall-title-header")
        {
            title = Some(html::squish(&heading).replace(AD_ROTATOR, ""));
        }

        title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn extract_summary(&self, recall: &Recall) -> Option<String> {
        let html_content = recall.html_content.as_deref()?;
        let description = html::meta_content(html_content, "description")?;

        let ws_runs = Regex::new(r"\s\s+").unwrap();
        let summary = ws_runs.replace_all(description.trim(), " ").to_string();
        if summary.is_empty() {
            None
        } else {
            Some(summary)
        }
    }

    fn extract_company_name(&self, recall: &Recall) -> Option<String> {
        let summary = recall.summary.as_deref()?;
        let leading_name = Regex::new(r"^((?:[A-Z0-9][0-9A-Za-z'.]+\s*)+)").unwrap();
        leading_name
            .captures(summary)
            .map(|caps| caps[1].trim_end().to_string())
            .filter(|name| !name.is_empty())
    }

    fn extract_source_id(&self, recall: &Recall) -> Option<String> {
        let html_content = recall.html_content.as_deref()?;
        let id_pattern = Regex::new(r"FSIS-RC-\d+-\d{4}").unwrap();
        id_pattern.find(html_content).map(|m| m.as_str().to_string())
    }
}

/// Remove the fixed FSIS boilerplate blocks, case-insensitively and across
/// newlines.
fn remove_boilerplate(text: &str) -> String {
    let patterns = [
        r"(?si)Recommendations For People At Risk For Listeriosis.+check the temperature of your refrigerator\.",
        r#"(?si)Consumers with food safety questions can "Ask Karen.*$"#,
        r"(?si)SAFE PREPARATION OF FRESH AND FROZEN GROUND BEEF.+Anyone with signs or symptoms of foodborne illness should consult a physician\.",
        r"(?si)PREPARING\s+GROUND\s+BEEF\s+FOR\s+SAFE\s+CONSUMPTION.+return\s+the\s+ground\s+beef\s+products\s+for\s+a\s+refund\.",
    ];

    let mut out = text.to_string();
    for pattern in patterns {
        out = Regex::new(pattern).unwrap().replace_all(&out, "").to_string();
    }
    out
}
