//! Position counters: ratio text, ratio leaves, ratio attributes, spin controls.

use scraper::ElementRef;
use serde::{Deserialize, Serialize};

use super::carousel::CarouselState;
use super::patterns::{
    has_index_hint, parse_positive, parse_ratio, ANY, ATTRIBUTE_TEXT_SELECTOR, MATCH_LIMIT, RATIO,
    RATIO_NODE_MAX_CHARS, SPIN_SELECTOR,
};
use super::text::{head, text_content, trimmed_text};

/// Small element whose text reads like `3/10`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioNode {
    pub tag: String,
    pub class_name: String,
    pub text: String,
    pub aria_label: String,
}

/// Numeric-role control (spin button, numeric input).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinNode {
    pub tag: String,
    pub class_name: String,
    pub text: String,
    pub value: String,
    pub aria_value_now: String,
    pub aria_value_text: String,
    pub aria_label: String,
    pub title: String,
    /// Text of the closest enclosing `<label>`
    pub label_text: String,
}

impl SpinNode {
    /// Caption text around the control, checked for an index hint.
    pub fn hint_context(&self) -> String {
        [&self.aria_label, &self.title, &self.label_text, &self.text]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn has_index_hint(&self) -> bool {
        has_index_hint(&self.hint_context())
    }

    /// First positive number among the value-bearing fields, most explicit first.
    pub fn position(&self) -> Option<u32> {
        [
            &self.aria_value_now,
            &self.value,
            &self.aria_value_text,
            &self.text,
        ]
        .iter()
        .find_map(|raw| parse_positive(raw.trim()))
    }
}

fn attr(element: ElementRef<'_>, name: &str) -> String {
    element.value().attr(name).unwrap_or_default().to_string()
}

fn ratio_leaf(element: &ElementRef<'_>) -> bool {
    let text = trimmed_text(*element);
    !text.is_empty() && text.chars().count() <= RATIO_NODE_MAX_CHARS && RATIO.is_match(&text)
}

pub fn ratio_elements(root: ElementRef<'_>) -> Vec<RatioNode> {
    root.select(&ANY)
        .filter(ratio_leaf)
        .take(MATCH_LIMIT)
        .map(|element| RatioNode {
            tag: element.value().name().to_uppercase(),
            class_name: attr(element, "class"),
            text: trimmed_text(element),
            aria_label: attr(element, "aria-label"),
        })
        .collect()
}

/// `aria-label`/`title` strings carrying a ratio.
pub fn ratio_attributes(root: ElementRef<'_>) -> Vec<String> {
    root.select(&ATTRIBUTE_TEXT_SELECTOR)
        .map(|element| format!("{} {}", attr(element, "aria-label"), attr(element, "title")).trim().to_string())
        .filter(|combined| !combined.is_empty() && RATIO.is_match(combined))
        .take(MATCH_LIMIT)
        .collect()
}

pub fn spin_elements(root: ElementRef<'_>) -> Vec<SpinNode> {
    root.select(&SPIN_SELECTOR).map(spin_node).collect()
}

fn spin_node(element: ElementRef<'_>) -> SpinNode {
    let label_text = element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "label")
        .map(text_content)
        .unwrap_or_default();

    SpinNode {
        tag: element.value().name().to_uppercase(),
        class_name: attr(element, "class"),
        text: head(text_content(element).trim(), RATIO_NODE_MAX_CHARS),
        value: attr(element, "value"),
        aria_value_now: attr(element, "aria-valuenow"),
        aria_value_text: attr(element, "aria-valuetext"),
        aria_label: attr(element, "aria-label"),
        title: attr(element, "title"),
        label_text,
    }
}

/// Per-document current index: page-text ratio, ratio leaf, ratio attribute,
/// hinted spin, unhinted spin, then the carousel.
pub fn read_current(
    visible: &str,
    ratio_nodes: &[RatioNode],
    ratio_attrs: &[String],
    spins: &[SpinNode],
    carousel: &CarouselState,
) -> u32 {
    let ratio_current = |text: &str| parse_ratio(text).map(|(current, _)| current).filter(|c| *c > 0);

    if let Some(current) = ratio_current(visible) {
        return current;
    }
    if let Some(current) = ratio_nodes.first().and_then(|node| ratio_current(node.text.as_str())) {
        return current;
    }
    if let Some(current) = ratio_attrs.first().and_then(|combined| ratio_current(combined.as_str())) {
        return current;
    }

    let mut fallback = None;
    for spin in spins {
        let Some(value) = spin.position() else {
            continue;
        };
        if spin.has_index_hint() {
            return value;
        }
        if fallback.is_none() {
            fallback = Some(value);
        }
    }

    fallback.unwrap_or(carousel.current)
}

/// Per-document total: page-text ratio, else the carousel count.
pub fn read_total(visible: &str, carousel: &CarouselState) -> u32 {
    parse_ratio(visible)
        .map(|(_, total)| total)
        .filter(|total| *total > 0)
        .unwrap_or(carousel.total)
}

/// Raw ratio strings in the visible text.
pub fn ratio_matches(visible: &str) -> Vec<String> {
    RATIO
        .find_iter(visible)
        .take(MATCH_LIMIT)
        .map(|m| m.as_str().to_string())
        .collect()
}
