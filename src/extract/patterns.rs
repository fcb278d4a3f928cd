//! Compiled patterns and number parsing shared by the heuristics.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::Selector;

/// Caption that anchors a parcel identifier ("parcel number").
pub const PARCEL_LABEL: &str = "地块编号";

/// Caption that anchors a project identifier ("project number").
pub const PROJECT_LABEL: &str = "项目编号";

/// Matches gathered per counter phrase and per ratio scan.
pub const MATCH_LIMIT: usize = 5;

/// Ratio leaves longer than this are containers, not counters.
pub const RATIO_NODE_MAX_CHARS: usize = 40;

lazy_static! {
    pub static ref RATIO: Regex = Regex::new(r"([0-9]+)\s*[/／]\s*([0-9]+)").expect("ratio pattern");
    pub static ref INDEX_HINT: Regex =
        Regex::new(r"(?i)序号|当前|index|sequence").expect("index hint pattern");
    pub static ref PARCEL_ID: Regex =
        Regex::new(r"[A-Z]{1,2}[0-9]{2}[A-Z0-9]+(?:-[0-9]+)+").expect("parcel pattern");
    pub static ref PROJECT_ID: Regex =
        Regex::new(r"(?-u:\b)[A-Z]{1,2}[0-9]{2}[A-Z0-9]+(?-u:\b)").expect("project pattern");
    pub static ref COUNTER_PHRASE: Regex = Regex::new(r"第\s*([0-9]+)\s*张").expect("counter pattern");
    pub static ref TOTAL_PHRASE: Regex = Regex::new(r"共\s*([0-9]+)\s*张").expect("total pattern");
    pub static ref LEADING_INT: Regex = Regex::new(r"^\s*([+-]?[0-9]+)").expect("integer pattern");
    pub static ref ACTIVE_INDICATOR: Regex =
        Regex::new(r"(?i)is-active|active|current").expect("indicator pattern");
    pub static ref ACTIVE_ITEM: Regex =
        Regex::new(r"(?i)is-active|active|current|selected").expect("item pattern");
    pub static ref CLONED_ITEM: Regex = Regex::new(r"(?i)is-cloned|clone").expect("clone pattern");
    pub static ref FIRST_NUMBER: Regex = Regex::new(r"[0-9]+").expect("number pattern");

    pub static ref BODY: Selector = selector("body");
    pub static ref ANY: Selector = selector("*");
    pub static ref PARCEL_LABEL_SELECTOR: Selector = selector(
        r#"[title*="地块编号"], [data-field*="地块"], [aria-label*="地块编号"]"#
    );
    pub static ref PROJECT_LABEL_SELECTOR: Selector = selector(
        r#"[title*="项目编号"], [aria-label*="项目编号"], [data-field*="项目编号"]"#
    );
    pub static ref SPIN_SELECTOR: Selector = selector(
        r#"[role="spinbutton"], [aria-valuenow], [aria-valuetext], [aria-valuemin], [data-role="spinbutton"], input[type="number"], input[type="text"]"#
    );
    pub static ref ATTRIBUTE_TEXT_SELECTOR: Selector = selector("[aria-label], [title]");
    pub static ref CAROUSEL_INDICATOR_SELECTOR: Selector = selector(
        r#".el-carousel__indicator, [class*="carousel__indicator"], [data-slide-index], [data-index], [data-idx]"#
    );
    pub static ref CAROUSEL_ITEM_SELECTOR: Selector = selector(
        r#".el-carousel__item, [class*="carousel__item"], [class*="swiper-slide"]"#
    );
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Parse the leading integer of a string the way a browser's `parseInt` does:
/// leading whitespace and sign allowed, trailing garbage ignored.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    LEADING_INT
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

/// Leading integer, only when strictly positive and representable.
pub fn parse_positive(raw: &str) -> Option<u32> {
    parse_leading_int(raw)
        .filter(|value| *value > 0)
        .and_then(|value| u32::try_from(value).ok())
}

/// First `current/total` pair in the text, zeros for unparsable halves.
pub fn parse_ratio(raw: &str) -> Option<(u32, u32)> {
    let caps = RATIO.captures(raw)?;
    let current = caps[1].parse::<u32>().unwrap_or(0);
    let total = caps[2].parse::<u32>().unwrap_or(0);
    Some((current, total))
}

/// True when the text mentions an index/sequence caption.
pub fn has_index_hint(raw: &str) -> bool {
    INDEX_HINT.is_match(raw)
}

/// Positive numbers captured by a phrase pattern, bounded to [`MATCH_LIMIT`].
pub fn phrase_numbers(pattern: &Regex, text: &str) -> Vec<u32> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .filter(|value| *value > 0)
        .take(MATCH_LIMIT)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leading_int_matches_browser_semantics() {
        assert_eq!(parse_leading_int("  12px"), Some(12));
        assert_eq!(parse_leading_int("-3"), Some(-3));
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_positive("0"), None);
        assert_eq!(parse_positive("7 / 9"), Some(7));
    }

    #[test]
    fn test_ratio_accepts_fullwidth_slash() {
        assert_eq!(parse_ratio("第 3／10 张"), Some((3, 10)));
        assert_eq!(parse_ratio("4 / 12"), Some((4, 12)));
        assert_eq!(parse_ratio("no counter"), None);
    }

    #[test]
    fn test_parcel_pattern_requires_numbered_suffix() {
        let found = PARCEL_ID.find("地块编号：F24ABC-1-2 其他").map(|m| m.as_str());
        assert_eq!(found, Some("F24ABC-1-2"));
        assert!(PARCEL_ID.find("F24ABC").is_none());
    }

    #[test]
    fn test_project_pattern_uses_ascii_boundaries() {
        let found = PROJECT_ID.find("项目编号F24ABC-1-2").map(|m| m.as_str());
        assert_eq!(found, Some("F24ABC"));
    }

    #[test]
    fn test_index_hint_is_case_insensitive() {
        assert!(has_index_hint("Image INDEX"));
        assert!(has_index_hint("当前序号"));
        assert!(!has_index_hint("zoom level"));
    }

    #[test]
    fn test_phrase_numbers_bounded() {
        let text = "第1张 第2张 第3张 第4张 第5张 第6张 第0张";
        assert_eq!(phrase_numbers(&COUNTER_PHRASE, text), vec![1, 2, 3, 4, 5]);
        assert_eq!(phrase_numbers(&TOTAL_PHRASE, "共 12 张"), vec![12]);
    }
}
