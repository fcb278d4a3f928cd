//! Reachable-document walk and per-document extraction.

use std::collections::HashSet;

use log::debug;
use scraper::{ElementRef, Html};

use super::carousel::read_carousel_state;
use super::counters::{
    ratio_attributes, ratio_elements, ratio_matches, read_current, read_total, spin_elements,
};
use super::identifiers::{id_matches, label_candidates, read_parcel_id, read_project_id};
use super::patterns::{
    phrase_numbers, BODY, COUNTER_PHRASE, MATCH_LIMIT, PARCEL_LABEL_SELECTOR,
    PROJECT_LABEL_SELECTOR, SPIN_SELECTOR, TOTAL_PHRASE,
};
use super::text::{head, visible_text};
use super::{DocumentSnapshot, EvidenceBundle, RawFrameContext, SelectorsHit};

/// Frames nested deeper than this are not visited.
pub const MAX_FRAME_DEPTH: usize = 5;

const TEXT_HEAD_CHARS: usize = 120;

/// Extract every reachable document, main document first, then frames in
/// discovery order.
///
/// Inaccessible (cross-origin) frames and their subtrees are skipped, as is
/// any document whose key was already visited.
pub fn extract_frames(root: &DocumentSnapshot) -> Vec<RawFrameContext> {
    let mut visited = HashSet::new();
    let mut contexts = Vec::new();
    visit(root, 0, &mut visited, &mut contexts);
    contexts
}

fn visit<'a>(
    doc: &'a DocumentSnapshot,
    depth: usize,
    visited: &mut HashSet<&'a str>,
    contexts: &mut Vec<RawFrameContext>,
) {
    if depth > MAX_FRAME_DEPTH {
        return;
    }
    if !doc.accessible {
        debug!("Skipping inaccessible frame at depth {}", depth);
        return;
    }
    if !doc.key.is_empty() && !visited.insert(doc.key.as_str()) {
        return;
    }

    contexts.push(extract_document(doc, depth));

    for frame in &doc.frames {
        visit(frame, depth + 1, visited, contexts);
    }
}

/// Run every heuristic over one document.
pub fn extract_document(doc: &DocumentSnapshot, depth: usize) -> RawFrameContext {
    let source = format!("depth:{}", depth);
    let mut context = RawFrameContext {
        href: doc.href.clone(),
        has_body: doc.has_body,
        has_document_element: doc.has_document_element,
        evidence: EvidenceBundle {
            source,
            href: doc.href.clone(),
            ..EvidenceBundle::default()
        },
        ..RawFrameContext::default()
    };

    let Some(markup) = doc.html.as_deref() else {
        return context;
    };
    if !doc.has_body && !doc.has_document_element {
        return context;
    }

    let html = Html::parse_document(markup);
    let root = if doc.has_body {
        html.select(&BODY).next().unwrap_or_else(|| html.root_element())
    } else {
        html.root_element()
    };

    let visible = match doc.text.as_deref() {
        Some(text) => text.to_string(),
        None => visible_text(root),
    };

    fill(&mut context, root, &visible);
    context
}

fn fill(context: &mut RawFrameContext, root: ElementRef<'_>, visible: &str) {
    let carousel = read_carousel_state(root);
    let ratio_nodes = ratio_elements(root);
    let ratio_attrs = ratio_attributes(root);
    let spins = spin_elements(root);

    context.parcel_id = read_parcel_id(root, visible);
    context.project_id = read_project_id(root, visible);
    context.current = read_current(visible, &ratio_nodes, &ratio_attrs, &spins, &carousel);
    context.total = read_total(visible, &carousel);

    let evidence = &mut context.evidence;
    evidence.parcel_id = context.parcel_id.clone();
    evidence.project_id = context.project_id.clone();
    evidence.current = context.current;
    evidence.total = context.total;
    evidence.text_head = head(visible, TEXT_HEAD_CHARS);
    evidence.id_matches = id_matches(visible);
    evidence.ratio_matches = ratio_matches(visible);
    evidence.counter_matches = phrase_numbers(&COUNTER_PHRASE, visible);
    evidence.total_hints = phrase_numbers(&TOTAL_PHRASE, visible);
    evidence.selectors_hit = SelectorsHit {
        parcel_label: root.select(&PARCEL_LABEL_SELECTOR).next().is_some(),
        project_label: root.select(&PROJECT_LABEL_SELECTOR).next().is_some(),
        spin: !spins.is_empty() || root.select(&SPIN_SELECTOR).next().is_some(),
    };
    evidence.ratio_elements = ratio_nodes;
    evidence.ratio_attributes = ratio_attrs;
    evidence.spin_elements = spins.into_iter().take(MATCH_LIMIT).collect();
    evidence.carousel = Some(carousel);
    evidence.label_candidates = label_candidates(root);

    debug!(
        "{}: parcel={:?} project={:?} current={} total={}",
        evidence.source, context.parcel_id, context.project_id, context.current, context.total
    );
}
