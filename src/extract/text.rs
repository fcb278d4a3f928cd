//! Text views over parsed elements.

use scraper::node::Node;
use scraper::ElementRef;

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th",
    "thead", "tr", "ul",
];

/// Equivalent of `textContent`: every descendant text node, concatenated.
pub fn text_content(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Trimmed `textContent`.
pub fn trimmed_text(element: ElementRef<'_>) -> String {
    text_content(element).trim().to_string()
}

/// Approximation of `innerText` used when the snapshot carries no rendered
/// text: hidden subtrees are dropped, block elements break lines, and runs of
/// whitespace collapse.
pub fn visible_text(root: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_visible(root, &mut raw);

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_visible(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) || element.value().attr("hidden").is_some() {
        return;
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_visible(child_element, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push('\n');
    }
}

/// First `limit` characters of a string.
pub fn head(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_visible_text_skips_scripts_and_breaks_blocks() {
        let html = Html::parse_document(
            r#"<html><body><div>图片 <span>3</span>/<span>10</span></div>
            <script>var hidden = "9/9";</script><p>地块编号：F24ABC-1-2</p>
            <div hidden>5/5</div></body></html>"#,
        );
        let body = html.root_element();
        let text = visible_text(body);
        assert!(text.contains("图片 3/10"));
        assert!(text.contains("地块编号：F24ABC-1-2"));
        assert!(!text.contains("9/9"));
        assert!(!text.contains("5/5"));
    }

    #[test]
    fn test_head_counts_characters() {
        assert_eq!(head("地块编号", 2), "地块");
    }
}
