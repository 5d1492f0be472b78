//! Turns a fetched structure drawing into a queryable diagram.
//!
//! Classification is a pure walk over the element tree that produces one
//! `ElementClass` per nucleotide label and pairing line; `annotate` then
//! applies the results (tooltips, boilerplate removal) to the document.

use crate::{
    iupac_code::IupacCode,
    palette::{parse_colour, tier_for},
    svg_doc::{NodeId, SvgDocument},
};
use ssview_protocol::{AnnotationSummary, Tier};
use std::collections::HashMap;
use tracing::debug;

const PAIRS_LAYER_ID: &str = "pairs";
const PAIR_CLASS: &str = "bp";
const SHAPE_ELEMENTS: [&str; 7] = [
    "line", "path", "rect", "circle", "ellipse", "polyline", "polygon",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    NucleotideLabel(IupacCode),
    PairingLine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementClass {
    pub node: NodeId,
    pub kind: PrimitiveKind,
    pub tier: Option<Tier>,
    pub tooltip: String,
}

impl ElementClass {
    pub fn is_significant_pair(&self) -> bool {
        self.kind == PrimitiveKind::PairingLine && self.tier == Some(Tier::SignificantPair)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationResult {
    pub classes: Vec<ElementClass>,
    pub summary: AnnotationSummary,
    pub removed_title: bool,
    by_node: HashMap<NodeId, usize>,
}

impl AnnotationResult {
    fn from_classes(classes: Vec<ElementClass>, removed_title: bool) -> Self {
        let summary = AnnotationSummary {
            basepairs: classes
                .iter()
                .filter(|c| c.kind == PrimitiveKind::PairingLine)
                .count(),
            significant_basepairs: classes.iter().filter(|c| c.is_significant_pair()).count(),
            tooltips: classes.len(),
        };
        let by_node = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.node, i))
            .collect();
        Self {
            classes,
            summary,
            removed_title,
            by_node,
        }
    }

    pub fn tooltip(&self, node: NodeId) -> Option<&str> {
        self.by_node
            .get(&node)
            .map(|&i| self.classes[i].tooltip.as_str())
    }
}

fn is_pairing_line(doc: &SvgDocument, node: NodeId) -> bool {
    let Some(name) = doc.local_name(node) else {
        return false;
    };
    if !SHAPE_ELEMENTS.contains(&name) {
        return false;
    }
    doc.class_list(node).any(|c| c == PAIR_CLASS)
        || doc
            .ancestors(node)
            .any(|a| doc.local_name(a) == Some("g") && doc.attr(a, "id") == Some(PAIRS_LAYER_ID))
}

fn colour_tier(doc: &SvgDocument, node: NodeId, property: &str) -> Option<Tier> {
    doc.presentation(node, property)
        .and_then(parse_colour)
        .and_then(tier_for)
}

fn label_tooltip(code: IupacCode, letter: char, tier: Option<Tier>) -> String {
    let name = if code.is_ambiguous() {
        format!("{letter} ({})", code.expansion())
    } else {
        code.expansion()
    };
    match tier {
        Some(tier) => format!("{name}: {}", tier.label()),
        None => name,
    }
}

fn pair_tooltip(tier: Option<Tier>) -> String {
    match tier {
        Some(Tier::SignificantPair) => {
            "Base pair with statistically significant covariation".to_string()
        }
        Some(tier) => format!("Base pair, {}", tier.label()),
        None => "Base pair".to_string(),
    }
}

/// Classifies every nucleotide label and pairing line without touching the document.
pub fn classify(doc: &SvgDocument) -> Vec<ElementClass> {
    let mut classes = Vec::new();
    for node in doc.descendants(doc.root()) {
        if doc.local_name(node) == Some("text") {
            let label = doc.text_content(node);
            let Some(code) = IupacCode::from_label(&label) else {
                continue;
            };
            let letter = label.trim().chars().next().unwrap_or('N').to_ascii_uppercase();
            let tier = colour_tier(doc, node, "fill");
            classes.push(ElementClass {
                node,
                kind: PrimitiveKind::NucleotideLabel(code),
                tier,
                tooltip: label_tooltip(code, letter, tier),
            });
        } else if is_pairing_line(doc, node) {
            let tier = colour_tier(doc, node, "stroke").or_else(|| colour_tier(doc, node, "fill"));
            classes.push(ElementClass {
                node,
                kind: PrimitiveKind::PairingLine,
                tier,
                tooltip: pair_tooltip(tier),
            });
        }
    }
    classes
}

/// Title the R2R layout tool writes on every diagram.
const BOILERPLATE_TITLE: &str = "R2R";

/// Removes the boilerplate `<title>` directly under the root. Any other
/// root title is authored content and stays.
fn strip_root_title(doc: &mut SvgDocument) -> bool {
    let titles: Vec<NodeId> = doc
        .element_children(doc.root())
        .into_iter()
        .filter(|&c| doc.local_name(c) == Some("title"))
        .filter(|&c| doc.text_content(c).trim() == BOILERPLATE_TITLE)
        .collect();
    for &title in &titles {
        doc.detach(title);
    }
    !titles.is_empty()
}

fn attach_tooltip(doc: &mut SvgDocument, node: NodeId, text: &str) {
    let existing = doc
        .element_children(node)
        .into_iter()
        .find(|&c| doc.local_name(c) == Some("title"));
    let title = existing.unwrap_or_else(|| doc.prepend_element(node, "title"));
    doc.set_text(title, text);
}

/// Applies classification to a mounted diagram. Counts are always derived
/// from the current tree, so re-running on the same document neither
/// duplicates tooltips nor accumulates statistics.
pub fn annotate(doc: &mut SvgDocument) -> AnnotationResult {
    let removed_title = strip_root_title(doc);
    let classes = classify(doc);
    for class in &classes {
        attach_tooltip(doc, class.node, &class.tooltip);
    }
    let result = AnnotationResult::from_classes(classes, removed_title);
    debug!(
        basepairs = result.summary.basepairs,
        significant = result.summary.significant_basepairs,
        tooltips = result.summary.tooltips,
        "annotated diagram"
    );
    result
}
