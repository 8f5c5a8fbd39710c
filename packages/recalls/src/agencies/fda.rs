//! FDA recall strategy.
//!
//! FDA notices carry their structured data in document metadata (`dc.title`,
//! `description`, `company_name`, `ID`) and the body in a `middle-column`
//! content container. Press releases open with a boilerplate disclaimer that
//! ends at "FDA does not endorse either the product or the company."

use chrono::NaiveDate;
use regex::Regex;

use super::{find_recall_date, Agency, AgencyStrategy};
use crate::error::ExtractError;
use crate::html;
use crate::types::recall::Recall;

const SITE_NAME_SUFFIX: &str = "Recalls, Market Withdrawals, & Safety Alerts - ";

pub struct FdaStrategy;

impl AgencyStrategy for FdaStrategy {
    fn agency(&self) -> Agency {
        Agency::Fda
    }

    fn is_recall_url(&self, url: &str) -> bool {
        let live = Regex::new(r"http://www\.fda\.gov/Safety/Recalls/ucm\d+\.htm").unwrap();
        let archive =
            Regex::new(r"http://www\.fda\.gov/Safety/Recalls/ArchiveRecalls/\d{4}/ucm\d+\.htm")
                .unwrap();
        live.is_match(url) || archive.is_match(url)
    }

    fn canonicalize_url(&self, url: &str) -> String {
        let archive =
            Regex::new(r"http://www\.fda\.gov/Safety/Recalls/ArchiveRecalls/\d{4}/ucm(\d+)\.htm")
                .unwrap();
        match archive.captures(url) {
            Some(caps) => format!("http://www.fda.gov/Safety/Recalls/ucm{}.htm", &caps[1]),
            None => url.to_string(),
        }
    }

    fn extract_text(&self, html_content: &str) -> String {
        let container = html::container_by_class(html_content, "middle-column")
            .unwrap_or(html_content);

        let mut text = html::html_to_markdown(container);
        text = text.replace('\u{00a0}', " ");

        // Bare heading lines must stay distinguishable from titled ones for
        // the footer strip below.
        let heading_trailing_ws = Regex::new(r"(?m)^(#+)[ \t]+$").unwrap();
        text = heading_trailing_ws.replace_all(&text, "$1").to_string();

        // Title heading block
        let title_block = Regex::new(r"(?m)^###[^\n]+\n\n").unwrap();
        text = title_block.replace_all(&text, "").to_string();

        // Disclaimer header
        let header =
            Regex::new(r"(?s)^.*FDA does not endorse either the product or the company\.")
                .unwrap();
        text = header.replace(&text, "").to_string();

        // Footer, from the bare heading separator to the end
        let footer = Regex::new(r"(?s)###\n\n.*$").unwrap();
        text = footer.replace(&text, "").to_string();

        text = text.replace("\r\n", "\n").replace('\r', "");
        let trailing_space = Regex::new(r"(?m)[ ]+\n").unwrap();
        text = trailing_space.replace_all(&text, "\n").to_string();
        let blank_runs = Regex::new(r"\n{3,}").unwrap();
        text = blank_runs.replace_all(&text, "\n\n").to_string();

        text.trim().to_string()
    }

    fn extract_contacts(&self, recall: &mut Recall) {
        let Some(text) = recall.text_content.clone() else {
            return;
        };

        // Greedy: everything through the last "Contact:**" marker line.
        let marker = Regex::new(r"(?s)^.*Contact:?\*\*\n+").unwrap();
        let Some(found) = marker.find(&text) else {
            return;
        };

        let rest = &text[found.end()..];
        let Some((block, remainder)) = rest.split_once("\n\n") else {
            return;
        };

        let mut contacts = block.to_string();
        let mut body = remainder;

        if body.starts_with("Media") {
            if let Some((media, after)) = body.split_once("\n\n") {
                contacts.push_str("\n\n");
                contacts.push_str(media);
                body = after;
            }
        }

        recall.contacts = Some(contacts);
        recall.text_content = Some(body.to_string());
    }

    fn extract_recall_date(&self, recall: &Recall) -> Result<Option<NaiveDate>, ExtractError> {
        match recall.text_content.as_deref() {
            Some(text) => find_recall_date(text),
            None => Ok(None),
        }
    }

    fn extract_title(&self, recall: &Recall) -> Option<String> {
        let html_content = recall.html_content.as_deref()?;
        let title = html::meta_content(html_content, "dc.title")?;
        Some(title.replace(SITE_NAME_SUFFIX, ""))
    }

    fn extract_summary(&self, recall: &Recall) -> Option<String> {
        let html_content = recall.html_content.as_deref()?;
        let description = html::meta_content(html_content, "description")?;
        Some(html::html_to_markdown(&description))
    }

    fn extract_company_name(&self, recall: &Recall) -> Option<String> {
        let html_content = recall.html_content.as_deref()?;
        html::meta_content(html_content, "company_name").filter(|name| !name.trim().is_empty())
    }

    fn extract_source_id(&self, recall: &Recall) -> Option<String> {
        let html_content = recall.html_content.as_deref()?;
        html::meta_content(html_content, "ID").filter(|id| !id.is_empty())
    }

    fn extract_agency_fields(&self, recall: &mut Recall) {
        self.extract_upc_codes(recall);
    }
}

impl FdaStrategy {
    fn extract_upc_codes(&self, _recall: &mut Recall) {}
}
