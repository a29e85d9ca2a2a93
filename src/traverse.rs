//! Depth-first walk over the document yielding plot events.
//!
//! The walk is lazy: events are produced one at a time so the plotter can
//! stop between any two primitives. Layer scope is lexical; every event
//! carries the layer that encloses it.

use crate::document::{Document, NodeRef};
use crate::errors::ConfigError;
use crate::geometry::Primitive;
use crate::layer::{LayerDirective, classify};
use crate::log::warn;
use crate::progress::PROGRESS_TAG;
use crate::transform::{TransformMatrix, TransformStack};

/// Clone chains deeper than this are not followed
const MAX_CLONE_DEPTH: u32 = 32;

/// The layer group enclosing an event
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerContext<'d> {
    pub label: &'d str,
    pub directive: LayerDirective,
}

#[derive(Clone, Debug)]
pub enum TraversalEvent<'d> {
    /// A layer group starts
    LayerEntered(LayerContext<'d>),
    /// A drawable element with its fully composed transform
    Primitive {
        node: NodeRef<'d>,
        transform: TransformMatrix,
        layer: Option<LayerContext<'d>>,
    },
    /// An element the plotter cannot draw, such as text or images
    Unsupported {
        node: NodeRef<'d>,
        layer: Option<LayerContext<'d>>,
    },
}

/// How an element is treated by the walk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeKind {
    Group,
    Clone,
    Drawable,
    Ignored,
    Unsupported,
}

fn node_kind(node: NodeRef<'_>) -> NodeKind {
    if node.is_group() {
        return NodeKind::Group;
    }
    let tag = node.tag();
    if tag == "use" {
        return NodeKind::Clone;
    }
    if Primitive::is_drawable_tag(tag) {
        return NodeKind::Drawable;
    }
    if tag == PROGRESS_TAG || tag.starts_with("sodipodi:") || tag.starts_with("inkscape:") {
        return NodeKind::Ignored;
    }
    match tag {
        "defs" | "metadata" | "title" | "desc" | "style" | "script" | "cursor"
        | "color-profile" | "pattern" | "linearGradient" | "radialGradient" | "marker"
        | "clipPath" | "mask" | "filter" | "symbol" | "font" | "font-face" | "glyph"
        | "missing-glyph" => NodeKind::Ignored,
        _ => NodeKind::Unsupported,
    }
}

struct Frame<'d> {
    /// Remaining children, last one next
    pending: Vec<NodeRef<'d>>,
    /// Page-space matrix of the enclosing clone chain
    outer: TransformMatrix,
    layer: Option<LayerContext<'d>>,
    clone_depth: u32,
}

pub struct Traversal<'d> {
    transforms: TransformStack,
    stack: Vec<Frame<'d>>,
}

impl<'d> Traversal<'d> {
    /// Walk the root's children with `outer` as the caller-supplied matrix
    pub fn new(doc: &'d Document, transforms: TransformStack, outer: TransformMatrix) -> Self {
        Traversal {
            transforms,
            stack: vec![Frame {
                pending: doc.root().children().rev().collect(),
                outer,
                layer: None,
                clone_depth: 0,
            }],
        }
    }

    /// Page-space placement of a clone's target: the `use` element's own
    /// user-space chain and x/y offset, conjugated by the viewport so the
    /// viewport is applied once when the target is composed.
    fn clone_outer(&self, node: NodeRef<'d>, outer: TransformMatrix) -> Result<TransformMatrix, ConfigError> {
        let viewport = self.transforms.viewport();
        let inverse = viewport
            .inverse()
            .ok_or_else(|| ConfigError::DegenerateTransform {
                element: "svg".to_string(),
            })?;
        let offset = |name| {
            node.attr(name)
                .and_then(|v| v.trim().trim_end_matches("px").parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        let placement = TransformMatrix::translate(offset("x"), offset("y"));
        Ok(outer * viewport * self.transforms.user_space(node)? * placement * inverse)
    }
}

impl<'d> Iterator for Traversal<'d> {
    type Item = Result<TraversalEvent<'d>, ConfigError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(node) = frame.pending.pop() else {
                self.stack.pop();
                continue;
            };
            let (outer, layer, clone_depth) = (frame.outer, frame.layer, frame.clone_depth);
            if node.is_hidden() {
                continue;
            }

            match node_kind(node) {
                NodeKind::Group => {
                    let entered = node.is_layer().then(|| LayerContext {
                        label: node.attr("inkscape:label").unwrap_or_default(),
                        directive: classify(node.attr("inkscape:label").unwrap_or_default()),
                    });
                    self.stack.push(Frame {
                        pending: node.children().rev().collect(),
                        outer,
                        layer: entered.or(layer),
                        clone_depth,
                    });
                    if let Some(context) = entered {
                        return Some(Ok(TraversalEvent::LayerEntered(context)));
                    }
                }
                NodeKind::Clone => {
                    let Some(target) = node.href_target() else {
                        warn!(?node, "clone target not found");
                        continue;
                    };
                    if clone_depth >= MAX_CLONE_DEPTH {
                        warn!(?node, "clone chain too deep");
                        continue;
                    }
                    let clone_outer = match self.clone_outer(node, outer) {
                        Ok(m) => m,
                        Err(e) => return Some(Err(e)),
                    };
                    let pending = if target.tag() == "symbol" {
                        target.children().rev().collect()
                    } else {
                        vec![target]
                    };
                    self.stack.push(Frame {
                        pending,
                        outer: clone_outer,
                        layer,
                        clone_depth: clone_depth + 1,
                    });
                }
                NodeKind::Drawable => {
                    let event = self
                        .transforms
                        .compose(node, outer)
                        .map(|transform| TraversalEvent::Primitive {
                            node,
                            transform,
                            layer,
                        });
                    return Some(event);
                }
                NodeKind::Ignored => {}
                NodeKind::Unsupported => {
                    return Some(Ok(TraversalEvent::Unsupported { node, layer }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Viewport;
    use glam::DVec2;

    const DOC: &str = r##"<svg xmlns="http://www.w3.org/2000/svg"
        xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
        xmlns:xlink="http://www.w3.org/1999/xlink"
        width="10in" height="10in" viewBox="0 0 10 10">
      <defs><rect id="unit" width="1" height="1"/></defs>
      <metadata/>
      <path id="loose" d="M0 0 L1 1"/>
      <g inkscape:groupmode="layer" inkscape:label="1 first" transform="translate(2 0)">
        <line id="in1" x2="1"/>
        <g><circle id="nested" r="1"/></g>
        <text>hello</text>
      </g>
      <g inkscape:groupmode="layer" inkscape:label="%2 hidden">
        <rect id="in2" width="1" height="1"/>
      </g>
      <g style="display:none"><rect id="gone" width="1" height="1"/></g>
      <use xlink:href="#unit" x="5" y="5"/>
      <image/>
    </svg>"##;

    fn events(doc: &Document) -> Vec<TraversalEvent<'_>> {
        let viewport = Viewport::from_document(doc).unwrap();
        Traversal::new(doc, TransformStack::new(&viewport), TransformMatrix::IDENTITY)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn describe(event: &TraversalEvent<'_>) -> String {
        match event {
            TraversalEvent::LayerEntered(ctx) => format!("layer {}", ctx.label),
            TraversalEvent::Primitive { node, layer, .. } => format!(
                "{} in {}",
                node.attr("id").unwrap_or(node.tag()),
                layer.map_or("-", |l| l.label)
            ),
            TraversalEvent::Unsupported { node, .. } => format!("unsupported {}", node.tag()),
        }
    }

    #[test]
    fn walk_order_and_layer_scope() {
        let doc = Document::parse_svg(DOC).unwrap();
        let seen: Vec<_> = events(&doc).iter().map(describe).collect();
        assert_eq!(
            seen,
            [
                "loose in -",
                "layer 1 first",
                "in1 in 1 first",
                "nested in 1 first",
                "unsupported text",
                "layer %2 hidden",
                "in2 in %2 hidden",
                "unit in -",
                "unsupported image",
            ]
        );
    }

    #[test]
    fn layer_transform_is_composed() {
        let doc = Document::parse_svg(DOC).unwrap();
        let all = events(&doc);
        let TraversalEvent::Primitive { transform, .. } = &all[2] else {
            panic!("expected primitive");
        };
        assert_eq!(transform.apply(DVec2::new(1.0, 0.0)), DVec2::new(3.0, 0.0));
    }

    #[test]
    fn clone_is_placed_once_through_viewport() {
        let text = DOC.replace(r#"viewBox="0 0 10 10""#, r#"viewBox="0 0 20 20""#);
        let doc = Document::parse_svg(&text).unwrap();
        let all = events(&doc);
        let TraversalEvent::Primitive { transform, node, .. } = &all[7] else {
            panic!("expected primitive");
        };
        assert_eq!(node.attr("id"), Some("unit"));
        // (1,1) in user units, shifted by (5,5), then halved by the viewport
        let p = transform.apply(DVec2::new(1.0, 1.0));
        assert!((p - DVec2::new(3.0, 3.0)).length() < 1e-12, "{p:?}");
    }

    #[test]
    fn clone_cycles_terminate() {
        let text = r##"<svg xmlns="http://www.w3.org/2000/svg"
            xmlns:xlink="http://www.w3.org/1999/xlink" width="1in" height="1in">
          <g id="loop"><path d="M0 0 L1 0"/><use xlink:href="#loop" x="1"/></g>
        </svg>"##;
        let doc = Document::parse_svg(text).unwrap();
        let count = events(&doc).len();
        assert_eq!(count, MAX_CLONE_DEPTH as usize + 1);
    }
}
