//! Parcel and project identifier heuristics.
//!
//! Label-anchored lookups run first; the free-text scan over the whole
//! visible text is the fallback.

use regex::Regex;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

use super::patterns::{
    ANY, MATCH_LIMIT, PARCEL_ID, PARCEL_LABEL, PARCEL_LABEL_SELECTOR, PROJECT_ID, PROJECT_LABEL,
    PROJECT_LABEL_SELECTOR,
};
use super::text::{text_content, trimmed_text};

/// Keyword-bearing elements longer than this are layout containers.
const KEYWORD_ELEMENT_MAX_CHARS: usize = 200;

/// Label candidates are only recorded when this short.
const CANDIDATE_MAX_CHARS: usize = 100;

const CANDIDATE_LIMIT: usize = 3;

/// Element that mentions the parcel caption, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCandidate {
    pub tag: String,
    pub text: String,
    pub has_sibling: bool,
}

/// One identifier family: its caption, attribute selector and value shape.
struct IdentifierRule {
    keyword: &'static str,
    selector: &'static Selector,
    pattern: &'static Regex,
}

fn parcel_rule() -> IdentifierRule {
    IdentifierRule {
        keyword: PARCEL_LABEL,
        selector: &PARCEL_LABEL_SELECTOR,
        pattern: &PARCEL_ID,
    }
}

fn project_rule() -> IdentifierRule {
    IdentifierRule {
        keyword: PROJECT_LABEL,
        selector: &PROJECT_LABEL_SELECTOR,
        pattern: &PROJECT_ID,
    }
}

pub fn read_parcel_id(root: ElementRef<'_>, visible: &str) -> String {
    read_identifier(root, visible, &parcel_rule())
}

pub fn read_project_id(root: ElementRef<'_>, visible: &str) -> String {
    read_identifier(root, visible, &project_rule())
}

fn read_identifier(root: ElementRef<'_>, visible: &str, rule: &IdentifierRule) -> String {
    label_anchored(root, rule)
        .or_else(|| first_match(rule.pattern, visible))
        .unwrap_or_default()
}

fn first_match(pattern: &Regex, text: &str) -> Option<String> {
    pattern.find(text).map(|m| m.as_str().to_string())
}

fn label_anchored(root: ElementRef<'_>, rule: &IdentifierRule) -> Option<String> {
    // Attribute-labelled element: its text, or the title when it has none
    if let Some(element) = root.select(rule.selector).next() {
        let text = text_content(element);
        let source = if text.is_empty() {
            element.value().attr("title").unwrap_or_default().to_string()
        } else {
            text
        };
        if let Some(found) = first_match(rule.pattern, &source) {
            return Some(found);
        }
    }

    for label in keyword_elements(root, rule.keyword) {
        if let Some(found) = first_match(rule.pattern, &text_content(label)) {
            return Some(found);
        }
        if let Some(sibling) = next_element_sibling(label) {
            if let Some(found) = first_match(rule.pattern, &text_content(sibling)) {
                return Some(found);
            }
        }
        if let Some(parent) = label.parent().and_then(ElementRef::wrap) {
            if let Some(found) = first_match(rule.pattern, &text_content(parent)) {
                return Some(found);
            }
        }
    }

    None
}

fn keyword_elements<'a>(root: ElementRef<'a>, keyword: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    root.select(&ANY).filter(move |element| {
        let text = trimmed_text(*element);
        !text.is_empty() && text.chars().count() < KEYWORD_ELEMENT_MAX_CHARS && text.contains(keyword)
    })
}

pub(crate) fn next_element_sibling(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

/// Short elements mentioning the parcel caption.
pub fn label_candidates(root: ElementRef<'_>) -> Vec<LabelCandidate> {
    root.select(&ANY)
        .filter(|element| {
            let text = text_content(*element);
            text.contains(PARCEL_LABEL) && text.chars().count() < CANDIDATE_MAX_CHARS
        })
        .take(CANDIDATE_LIMIT)
        .map(|element| LabelCandidate {
            tag: element.value().name().to_uppercase(),
            text: trimmed_text(element),
            has_sibling: next_element_sibling(element).is_some(),
        })
        .collect()
}

/// Parcel-shaped strings anywhere in the visible text.
pub fn id_matches(visible: &str) -> Vec<String> {
    PARCEL_ID
        .find_iter(visible)
        .take(MATCH_LIMIT)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn body(html: &Html) -> ElementRef<'_> {
        html.select(&super::super::patterns::BODY).next().unwrap()
    }

    #[test]
    fn test_sibling_value_after_label() {
        let html = Html::parse_document(
            r#"<body><div class="info"><span>地块编号：</span><span>F24ABC-1-2</span></div>
            <p>其他地块 Q11XYZ-9-9</p></body>"#,
        );
        let root = body(&html);
        assert_eq!(read_parcel_id(root, "其他地块 Q11XYZ-9-9"), "F24ABC-1-2");
    }

    #[test]
    fn test_title_attribute_used_when_text_empty() {
        let html = Html::parse_document(r#"<body><i title="地块编号 K07ZZ-3"></i></body>"#);
        assert_eq!(read_parcel_id(body(&html), ""), "K07ZZ-3");
    }

    #[test]
    fn test_free_text_fallback() {
        let html = Html::parse_document(r#"<body><p>evidence for F24ABC-1-2</p></body>"#);
        assert_eq!(read_parcel_id(body(&html), "evidence for F24ABC-1-2"), "F24ABC-1-2");
        assert_eq!(read_project_id(body(&html), "evidence for F24ABC-1-2"), "F24ABC");
    }

    #[test]
    fn test_project_from_label_parent() {
        let html = Html::parse_document(
            r#"<body><div><label>项目编号</label> <b>ignored</b> H12PROJ</div></body>"#,
        );
        assert_eq!(read_project_id(body(&html), ""), "H12PROJ");
    }

    #[test]
    fn test_missing_identifiers_are_empty() {
        let html = Html::parse_document("<body><p>nothing here</p></body>");
        assert_eq!(read_parcel_id(body(&html), "nothing here"), "");
        assert_eq!(read_project_id(body(&html), "nothing here"), "");
    }

    #[test]
    fn test_label_candidates_are_bounded() {
        let html = Html::parse_document(
            r#"<body><ul><li>地块编号 1</li><li>地块编号 2</li><li>地块编号 3</li><li>地块编号 4</li></ul></body>"#,
        );
        let candidates = label_candidates(body(&html));
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].tag, "UL");
        assert!(candidates[1].has_sibling);
    }
}
