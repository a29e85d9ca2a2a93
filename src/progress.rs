//! Plot progress record and its persisted form.
//!
//! The record lives in the document as a single `WCB` element whose
//! attributes hold the counters and positions needed to resume.

use crate::defaults::ALL_LAYERS;
use crate::document::{Document, NodeId};
use glam::DVec2;

/// Element that stores progress in the document
pub const PROGRESS_TAG: &str = "WCB";

/// Counters and positions of a plot in progress. All zero means nothing to
/// resume.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlotProgress {
    /// Layer code of the run, `12345` for all layers
    pub layer: i64,
    /// Destinations emitted so far
    pub node_count: u64,
    /// Ordinal of the last fully plotted primitive
    pub last_path: u64,
    /// Node count when `last_path` finished
    pub last_path_node_count: u64,
    pub last_known_pos: DVec2,
    pub paused_pos: DVec2,
}

impl PlotProgress {
    /// Whether there is an interrupted plot to resume
    pub fn is_in_progress(&self) -> bool {
        self.node_count > 0
    }

    pub fn is_all_layers(&self) -> bool {
        self.layer == ALL_LAYERS
    }

    /// Read the progress block, falling back to an empty record when it is
    /// absent or any field fails to parse.
    pub fn read_from(doc: &Document) -> Self {
        let Some(node) = find_block(doc) else {
            return PlotProgress::default();
        };
        let node = doc.node(node);
        let int = |name| node.attr(name)?.trim().parse::<i64>().ok();
        let count = |name| node.attr(name)?.trim().parse::<u64>().ok();
        let float = |name| {
            node.attr(name)?
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
        };
        let read = || {
            Some(PlotProgress {
                layer: int("layer")?,
                node_count: count("node")?,
                last_path: count("lastpath")?,
                last_path_node_count: count("lastpathnc")?,
                last_known_pos: DVec2::new(float("lastknownposx")?, float("lastknownposy")?),
                paused_pos: DVec2::new(float("pausedposx")?, float("pausedposy")?),
            })
        };
        read().unwrap_or_default()
    }

    /// Store this record, creating the block under the root if needed
    pub fn write_to(&self, doc: &mut Document) {
        let node = ensure_block(doc);
        doc.set_attribute(node, "layer", self.layer.to_string());
        doc.set_attribute(node, "node", self.node_count.to_string());
        doc.set_attribute(node, "lastpath", self.last_path.to_string());
        doc.set_attribute(node, "lastpathnc", self.last_path_node_count.to_string());
        doc.set_attribute(node, "lastknownposx", format_pos(self.last_known_pos.x));
        doc.set_attribute(node, "lastknownposy", format_pos(self.last_known_pos.y));
        doc.set_attribute(node, "pausedposx", format_pos(self.paused_pos.x));
        doc.set_attribute(node, "pausedposy", format_pos(self.paused_pos.y));
    }
}

fn format_pos(v: f64) -> String {
    format!("{v:.6}")
}

fn find_block(doc: &Document) -> Option<NodeId> {
    doc.descendants()
        .find(|n| n.tag() == PROGRESS_TAG)
        .map(|n| n.id())
}

/// Locate the progress block, appending a zeroed one when absent
pub fn ensure_block(doc: &mut Document) -> NodeId {
    if let Some(id) = find_block(doc) {
        return id;
    }
    let root = doc.root().id();
    let id = doc.append_child(root, PROGRESS_TAG, Vec::<(String, String)>::new());
    for name in ["layer", "node", "lastpath", "lastpathnc"] {
        doc.set_attribute(id, name, "0");
    }
    for name in ["lastknownposx", "lastknownposy", "pausedposx", "pausedposy"] {
        doc.set_attribute(id, name, format_pos(0.0));
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new([("width", "1in"), ("height", "1in")])
    }

    #[test]
    fn missing_block_reads_as_empty() {
        let progress = PlotProgress::read_from(&doc());
        assert_eq!(progress, PlotProgress::default());
        assert!(!progress.is_in_progress());
    }

    #[test]
    fn write_then_read() {
        let mut doc = doc();
        let progress = PlotProgress {
            layer: ALL_LAYERS,
            node_count: 42,
            last_path: 3,
            last_path_node_count: 7,
            last_known_pos: DVec2::new(1.5, 2.25),
            paused_pos: DVec2::new(1.5, 2.25),
        };
        progress.write_to(&mut doc);
        let back = PlotProgress::read_from(&doc);
        assert_eq!(back, progress);
        assert!(back.is_in_progress());
        assert!(back.is_all_layers());

        // Writing again reuses the same element
        PlotProgress::default().write_to(&mut doc);
        assert_eq!(doc.descendants().filter(|n| n.tag() == PROGRESS_TAG).count(), 1);
    }

    #[test]
    fn ensure_block_creates_zeroed_fields() {
        let mut doc = doc();
        let id = ensure_block(&mut doc);
        assert_eq!(doc.node(id).attr("lastpathnc"), Some("0"));
        assert_eq!(PlotProgress::read_from(&doc), PlotProgress::default());
    }

    #[test]
    fn corrupt_field_reads_as_empty() {
        let mut doc = doc();
        let id = ensure_block(&mut doc);
        doc.set_attribute(id, "node", "12");
        doc.set_attribute(id, "lastpath", "many");
        assert_eq!(PlotProgress::read_from(&doc), PlotProgress::default());
    }
}
