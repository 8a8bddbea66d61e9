use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Image,
    Lightbox,
}

/// An image or lightbox-link reference found in rendered markup, not yet
/// confirmed downloadable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub src: String,
    pub kind: CandidateKind,
}

/// Extract candidate references from a message's rendered markup, in
/// document order.
///
/// Eligible nodes: `<img>` with a `src`, and `<a class="lightbox">` with an
/// `href`. Avatar and emoji images are skipped, as is anything nested inside
/// a lightbox anchor. Stateless; every call re-parses from scratch.
pub fn extract_candidates(markup: &str) -> Vec<Candidate> {
    let fragment = Html::parse_fragment(markup);
    let mut found = Vec::new();
    for child in fragment.root_element().children() {
        visit_node(child, &mut found);
    }
    found
}

fn visit_node(node: NodeRef<'_, Node>, found: &mut Vec<Candidate>) {
    if let Some(element) = ElementRef::wrap(node) {
        let tag = element.value().name().to_ascii_lowercase();
        match tag.as_str() {
            "a" if has_class(element, "lightbox") => {
                if let Some(href) = element.value().attr("href").map(str::trim) {
                    if !href.is_empty() {
                        found.push(Candidate {
                            src: href.to_string(),
                            kind: CandidateKind::Lightbox,
                        });
                    }
                }
                // The thumbnail inside is the same image; descending would
                // collect it twice.
                return;
            }
            "img" => {
                if has_class(element, "avatar") || has_class(element, "emoji") {
                    return;
                }
                if let Some(src) = element.value().attr("src").map(str::trim) {
                    if !src.is_empty() {
                        found.push(Candidate {
                            src: src.to_string(),
                            kind: CandidateKind::Image,
                        });
                    }
                }
                return;
            }
            _ => {}
        }
    }
    for child in node.children() {
        visit_node(child, found);
    }
}

fn has_class(element: ElementRef, class: &str) -> bool {
    element
        .value()
        .attr("class")
        .map(|classes| {
            classes
                .split_whitespace()
                .any(|c| c.eq_ignore_ascii_case(class))
        })
        .unwrap_or(false)
}
