//! Regex-based HTML helpers shared by the per-agency extractors.
//!
//! Converts raw HTML to markdown-like text, decodes entities, and pulls
//! document metadata. Deliberately tolerant: malformed markup degrades to
//! best-effort text rather than failing.

use regex::Regex;

/// Convert HTML to markdown-like text.
///
/// Script/style/comment content is removed entirely; headings, emphasis,
/// links, list items, and paragraphs become their markdown forms; remaining
/// tags are stripped; entities are decoded; blank-line runs collapse to one.
pub fn html_to_markdown(html: &str) -> String {
    let mut text = html.to_string();

    // Remove scripts, styles, and comments with their contents
    let script_pattern = Regex::new(r"(?si)<script[^>]*>.*?</script>").unwrap();
    let style_pattern = Regex::new(r"(?si)<style[^>]*>.*?</style>").unwrap();
    let comment_pattern = Regex::new(r"(?s)<!--.*?-->").unwrap();
    text = script_pattern.replace_all(&text, "").to_string();
    text = style_pattern.replace_all(&text, "").to_string();
    text = comment_pattern.replace_all(&text, "").to_string();

    // Emphasis before tag stripping, so markers survive
    let strong_pattern = Regex::new(r"(?si)<(?:b|strong)[^>]*>(.*?)</(?:b|strong)>").unwrap();
    let em_pattern = Regex::new(r"(?si)<(?:i|em)[^>]*>(.*?)</(?:i|em)>").unwrap();
    text = strong_pattern.replace_all(&text, "**$1**").to_string();
    text = em_pattern.replace_all(&text, "*$1*").to_string();

    // Convert headers
    let h1_pattern = Regex::new(r"(?si)<h1[^>]*>(.*?)</h1>").unwrap();
    let h2_pattern = Regex::new(r"(?si)<h2[^>]*>(.*?)</h2>").unwrap();
    let h3_pattern = Regex::new(r"(?si)<h3[^>]*>(.*?)</h3>").unwrap();
    let h4_pattern = Regex::new(r"(?si)<h4[^>]*>(.*?)</h4>").unwrap();
    text = h1_pattern.replace_all(&text, "# $1\n\n").to_string();
    text = h2_pattern.replace_all(&text, "## $1\n\n").to_string();
    text = h3_pattern.replace_all(&text, "### $1\n\n").to_string();
    text = h4_pattern.replace_all(&text, "#### $1\n\n").to_string();

    // Convert links
    let link_pattern = Regex::new(r#"(?si)<a[^>]*href=["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap();
    text = link_pattern.replace_all(&text, "[$2]($1)").to_string();

    // Convert lists
    let li_pattern = Regex::new(r"(?si)<li[^>]*>(.*?)</li>").unwrap();
    text = li_pattern.replace_all(&text, "- $1\n").to_string();

    // Convert paragraphs and line breaks
    let p_pattern = Regex::new(r"(?si)<p[^>]*>(.*?)</p>").unwrap();
    let br_pattern = Regex::new(r"(?i)<br\s*/?>").unwrap();
    let div_close_pattern = Regex::new(r"(?i)</(?:div|tr|table)>").unwrap();
    text = p_pattern.replace_all(&text, "$1\n\n").to_string();
    text = br_pattern.replace_all(&text, "\n").to_string();
    text = div_close_pattern.replace_all(&text, "\n").to_string();

    // Remove remaining tags
    text = strip_tags(&text);

    // Decode HTML entities
    text = decode_entities(&text);

    // Clean up whitespace
    let multi_newline = Regex::new(r"\n{3,}").unwrap();
    text = multi_newline.replace_all(&text, "\n\n").to_string();

    text.trim().to_string()
}

/// Remove all remaining markup tags.
pub fn strip_tags(html: &str) -> String {
    let tag_pattern = Regex::new(r"<[^>]+>").unwrap();
    tag_pattern.replace_all(html, "").to_string()
}

/// Decode numeric and common named HTML entities.
///
/// `&nbsp;` decodes to U+00A0; collapsing non-breaking spaces to regular
/// spaces is left to the per-agency strategies.
pub fn decode_entities(text: &str) -> String {
    let numeric_dec = Regex::new(r"&#(\d+);").unwrap();
    let numeric_hex = Regex::new(r"&#x([0-9a-fA-F]+);").unwrap();

    let mut out = numeric_dec
        .replace_all(text, |caps: &regex::Captures<'_>| {
            caps[1]
                .parse::<u32>()
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        })
        .to_string();
    out = numeric_hex
        .replace_all(&out, |caps: &regex::Captures<'_>| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        })
        .to_string();

    // &amp; last, so "&amp;nbsp;" does not double-decode
    out = out
        .replace("&nbsp;", "\u{00a0}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&rsquo;", "\u{2019}")
        .replace("&lsquo;", "\u{2018}")
        .replace("&rdquo;", "\u{201d}")
        .replace("&ldquo;", "\u{201c}")
        .replace("&ndash;", "\u{2013}")
        .replace("&mdash;", "\u{2014}")
        .replace("&hellip;", "\u{2026}")
        .replace("&reg;", "\u{00ae}")
        .replace("&trade;", "\u{2122}")
        .replace("&copy;", "\u{00a9}")
        .replace("&amp;", "&");

    out
}

/// Content of a `<meta name="..." content="...">` tag, entity-decoded.
///
/// Handles either attribute order.
pub fn meta_content(html: &str, name: &str) -> Option<String> {
    let escaped = regex::escape(name);
    let name_first = Regex::new(&format!(
        r#"(?i)<meta[^>]*\bname\s*=\s*["']{escaped}["'][^>]*\bcontent\s*=\s*["']([^"']*)["']"#
    ))
    .unwrap();
    let content_first = Regex::new(&format!(
        r#"(?i)<meta[^>]*\bcontent\s*=\s*["']([^"']*)["'][^>]*\bname\s*=\s*["']{escaped}["']"#
    ))
    .unwrap();

    name_first
        .captures(html)
        .or_else(|| content_first.captures(html))
        .map(|caps| decode_entities(caps[1].trim()))
}

/// Inner text of the document `<title>` element, entity-decoded.
pub fn title_text(html: &str) -> Option<String> {
    let title_pattern = Regex::new(r"(?si)<title[^>]*>(.*?)</title>").unwrap();
    title_pattern
        .captures(html)
        .map(|caps| decode_entities(&strip_tags(&caps[1])))
}

/// Text of the first `tag` element carrying `class`, tags stripped and
/// entities decoded.
pub fn element_text_by_class(html: &str, tag: &str, class: &str) -> Option<String> {
    let pattern = Regex::new(&format!(
        r#"(?si)<{tag}[^>]*\bclass\s*=\s*["'][^"']*{}[^"']*["'][^>]*>(.*?)</{tag}>"#,
        regex::escape(class),
    ))
    .unwrap();
    pattern
        .captures(html)
        .map(|caps| decode_entities(&strip_tags(&caps[1])))
}

/// Inner HTML of the first `<div>` carrying `class`, found by depth-balanced
/// scanning so nested divs do not truncate the container.
pub fn container_by_class<'a>(html: &'a str, class: &str) -> Option<&'a str> {
    let open_pattern = Regex::new(&format!(
        r#"(?i)<div[^>]*\bclass\s*=\s*["'][^"']*{}[^"']*["'][^>]*>"#,
        regex::escape(class),
    ))
    .unwrap();
    let open = open_pattern.find(html)?;
    let body = &html[open.end()..];

    let div_pattern = Regex::new(r"(?i)</?div\b[^>]*>").unwrap();
    let mut depth = 1usize;
    for tag in div_pattern.find_iter(body) {
        if tag.as_str().starts_with("</") {
            depth -= 1;
            if depth == 0 {
                return Some(&body[..tag.start()]);
            }
        } else {
            depth += 1;
        }
    }

    // Unbalanced markup: best effort, rest of the document
    Some(body)
}

/// Collapse all whitespace runs to single spaces and trim.
pub fn squish(text: &str) -> String {
    let ws = Regex::new(r"\s+").unwrap();
    ws.replace_all(text.trim(), " ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_markdown_basic() {
        let html = "<h3>Heading</h3><p>First <strong>bold</strong> para.</p><p>Second.</p>";
        let text = html_to_markdown(html);
        assert_eq!(text, "### Heading\n\nFirst **bold** para.\n\nSecond.");
    }

    #[test]
    fn test_html_to_markdown_strips_script_content() {
        let html = "<p>Keep</p><script>var x = 'drop';</script><style>.a{}</style>";
        let text = html_to_markdown(html);
        assert_eq!(text, "Keep");
    }

    #[test]
    fn test_html_to_markdown_links_and_lists() {
        let html = r#"<ul><li>One</li><li><a href="http://x.test/">Two</a></li></ul>"#;
        let text = html_to_markdown(html);
        assert!(text.contains("- One"));
        assert!(text.contains("- [Two](http://x.test/)"));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&lt;tag&gt;"), "<tag>");
        assert_eq!(decode_entities("&#65;&#x42;"), "AB");
        assert_eq!(decode_entities("a&nbsp;b"), "a\u{00a0}b");
        // no double decode
        assert_eq!(decode_entities("&amp;nbsp;"), "&nbsp;");
    }

    #[test]
    fn test_meta_content_both_attribute_orders() {
        let html = r#"<meta name="dc.title" content="A Title" />
                      <meta content="A Description" name="description" />"#;
        assert_eq!(meta_content(html, "dc.title").as_deref(), Some("A Title"));
        assert_eq!(
            meta_content(html, "description").as_deref(),
            Some("A Description")
        );
        assert_eq!(meta_content(html, "missing"), None);
    }

    #[test]
    fn test_title_text() {
        let html = "<html><head><title>Page &amp; Title</title></head></html>";
        assert_eq!(title_text(html).as_deref(), Some("Page & Title"));
    }

    #[test]
    fn test_element_text_by_class() {
        let html = r#"<h3 class="recall-title-header">  A Recall Title </h3>"#;
        let text = element_text_by_class(html, "h3", "recall-title-header").unwrap();
        assert_eq!(text.trim(), "A Recall Title");
    }

    #[test]
    fn test_container_by_class_balances_nested_divs() {
        let html = r#"<div class="outer"><div class="middle-column"><div>inner</div>tail</div>after</div>"#;
        let inner = container_by_class(html, "middle-column").unwrap();
        assert_eq!(inner, "<div>inner</div>tail");
    }

    #[test]
    fn test_container_by_class_missing() {
        assert!(container_by_class("<div class='other'>x</div>", "middle-column").is_none());
    }

    #[test]
    fn test_squish() {
        assert_eq!(squish("  a \n\t b   c "), "a b c");
    }
}
