//! Carousel indicator and slide state.

use scraper::ElementRef;
use serde::{Deserialize, Serialize};

use super::patterns::{
    parse_leading_int, ACTIVE_INDICATOR, ACTIVE_ITEM, CAROUSEL_INDICATOR_SELECTOR,
    CAROUSEL_ITEM_SELECTOR, CLONED_ITEM, FIRST_NUMBER,
};
use super::text::text_content;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarouselState {
    /// Active position, 0 when nothing is marked active
    pub current: u32,
    /// max(indicator_count, item_count)
    pub total: u32,
    pub indicator_count: u32,
    pub item_count: u32,
    pub indicator_current: u32,
    pub item_current: u32,
}

fn class_name<'a>(element: &ElementRef<'a>) -> &'a str {
    element.value().attr("class").unwrap_or_default()
}

/// First non-empty attribute among `names`.
fn first_attr<'a>(element: &ElementRef<'a>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| element.value().attr(name))
        .find(|value| !value.is_empty())
}

/// Explicit data index, promoted from 0-based when more than one element exists.
fn data_position(raw: &str, count: usize) -> Option<i64> {
    parse_leading_int(raw).map(|parsed| if parsed <= 0 && count > 1 { parsed + 1 } else { parsed })
}

fn to_count(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn to_position(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

pub fn read_carousel_state(root: ElementRef<'_>) -> CarouselState {
    let indicators: Vec<_> = root.select(&CAROUSEL_INDICATOR_SELECTOR).collect();
    let indicator_count = indicators.len();
    let mut indicator_current: i64 = 0;

    for (idx, indicator) in indicators.iter().enumerate() {
        let active = ACTIVE_INDICATOR.is_match(class_name(indicator))
            || indicator.value().attr("aria-current") == Some("true");
        if !active {
            continue;
        }

        let label = match indicator.value().attr("aria-label").filter(|label| !label.is_empty()) {
            Some(label) => label.to_string(),
            None => text_content(*indicator),
        };
        match FIRST_NUMBER.find(&label) {
            Some(number) => {
                if let Some(parsed) = number.as_str().parse::<i64>().ok().filter(|n| *n != 0) {
                    indicator_current = parsed;
                }
            }
            None => indicator_current = idx as i64 + 1,
        }

        if let Some(position) = first_attr(indicator, &["data-index", "data-slide-index", "data-idx"])
            .and_then(|raw| data_position(raw, indicator_count))
        {
            indicator_current = position;
        }
    }

    let items: Vec<_> = root
        .select(&CAROUSEL_ITEM_SELECTOR)
        .filter(|item| !CLONED_ITEM.is_match(class_name(item)))
        .collect();
    let item_count = items.len();
    let mut item_current: i64 = 0;

    for (idx, item) in items.iter().enumerate() {
        let active = ACTIVE_ITEM.is_match(class_name(item))
            || item.value().attr("aria-hidden") == Some("false");
        if active {
            item_current = idx as i64 + 1;
        } else if item_current == 0 {
            if let Some(position) = first_attr(item, &["data-index", "data-idx"])
                .and_then(|raw| data_position(raw, item_count))
            {
                item_current = position;
            }
        }
    }

    let indicator_current = to_position(indicator_current);
    let item_current = to_position(item_current);
    let current = [indicator_current, item_current]
        .into_iter()
        .find(|value| *value > 0)
        .unwrap_or(0);

    CarouselState {
        current,
        total: to_count(indicator_count.max(item_count)),
        indicator_count: to_count(indicator_count),
        item_count: to_count(item_count),
        indicator_current,
        item_current,
    }
}
