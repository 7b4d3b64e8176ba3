use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse runs of whitespace (including NBSP) into one space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    let out = s.replace('\u{00A0}', " ");
    RE_WHITESPACE.replace_all(&out, " ").trim().to_string()
}

/// All text beneath an element, whitespace-collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

// Remove Cc control characters except tab(0x09), LF(0x0A), CR(0x0D); they are illegal in XML 1.0.
pub fn sanitize_xml_text(input: &str) -> String {
    input
        .chars()
        .filter(|&c| {
            let code = c as u32;
            code == 0x09 || code == 0x0A || code == 0x0D || code >= 0x20
        })
        .collect()
}
