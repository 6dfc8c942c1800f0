// crates/onair-mixer/src/item.rs
//
// The draw tree built up by a push/visit/pop sequence (§4.3). A `push`
// opens a `Layer` scope with the pushed transform; each `visit` inside
// it appends an `Item` carrying the frame it was given; nested
// `push`/`pop` pairs append a child `Layer` instead. `layer_depth`
// lives on the transform itself (see onair-core::transform) rather than
// being recomputed here — it is already resolved by the time a frame
// reaches `visit`.

use onair_core::{Frame, FrameTransform, Geometry, PixelFormatDesc};

/// One drawable surface: a frame's pixels plus the resolved transform
/// and geometry it should be drawn with.
#[derive(Clone, Debug)]
pub struct Item {
    pub pixel_desc: PixelFormatDesc,
    pub frame: Frame,
    pub transform: FrameTransform,
    pub geometry: Geometry,
}

impl Item {
    pub fn from_frame(frame: Frame, transform: FrameTransform) -> Self {
        let geometry = frame.geometry().clone();
        let pixel_desc = frame.pixel_desc().clone();
        Self {
            pixel_desc,
            frame,
            transform,
            geometry,
        }
    }
}

/// A compositing scope: items drawn directly, plus nested scopes pushed
/// underneath this one. `blend_mode` and `layer_depth` are read off the
/// scope-opening transform.
#[derive(Clone, Debug, Default)]
pub struct Layer {
    pub transform: Option<FrameTransform>,
    pub items: Vec<Item>,
    pub sublayers: Vec<Layer>,
}

impl Layer {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.sublayers.iter().all(Layer::is_empty)
    }
}

/// Builds a `Layer` tree from a push/visit/pop call sequence. This is
/// the producer-facing half of the mixer's contract (§4.3): Stage calls
/// `push(layer_transform)`, then `visit` on each child const frame,
/// optionally nesting `push`/`pop` for sub-transforms, then `pop`.
#[derive(Debug)]
pub struct TreeBuilder {
    root: Layer,
    stack: Vec<Layer>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            root: Layer::root(),
            stack: Vec::new(),
        }
    }

    /// Open a new compositing scope with `transform` as its scope-level
    /// transform (combined with whatever scope currently being built).
    pub fn push(&mut self, transform: FrameTransform) {
        let mut layer = Layer::root();
        layer.transform = Some(transform);
        self.stack.push(layer);
    }

    /// Append a drawable frame to the innermost open scope (or the root,
    /// if nothing is pushed).
    pub fn visit(&mut self, frame: Frame, transform: FrameTransform) {
        let item = Item::from_frame(frame, transform);
        match self.stack.last_mut() {
            Some(layer) => layer.items.push(item),
            None => self.root.items.push(item),
        }
    }

    /// Close the innermost open scope, nesting it under its parent.
    pub fn pop(&mut self) {
        if let Some(layer) = self.stack.pop() {
            match self.stack.last_mut() {
                Some(parent) => parent.sublayers.push(layer),
                None => self.root.sublayers.push(layer),
            }
        }
    }

    /// Number of scopes still open — a well-formed push/visit/pop
    /// sequence ends with this at zero.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Consume the builder, returning the finished tree. Any scopes left
    /// open are force-closed in LIFO order first.
    pub fn finish(mut self) -> Layer {
        while !self.stack.is_empty() {
            self.pop();
        }
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onair_core::{MutableFrame, PixelFormat};

    fn test_frame() -> Frame {
        MutableFrame::new("t", PixelFormatDesc::new(PixelFormat::Bgra, 2, 2)).commit()
    }

    #[test]
    fn visit_without_push_lands_on_root() {
        let mut b = TreeBuilder::new();
        b.visit(test_frame(), FrameTransform::default());
        let root = b.finish();
        assert_eq!(root.items.len(), 1);
        assert!(root.sublayers.is_empty());
    }

    #[test]
    fn push_visit_pop_nests_a_sublayer() {
        let mut b = TreeBuilder::new();
        b.push(FrameTransform::default());
        b.visit(test_frame(), FrameTransform::default());
        b.pop();
        let root = b.finish();
        assert!(root.items.is_empty());
        assert_eq!(root.sublayers.len(), 1);
        assert_eq!(root.sublayers[0].items.len(), 1);
    }

    #[test]
    fn unbalanced_push_is_force_closed_on_finish() {
        let mut b = TreeBuilder::new();
        b.push(FrameTransform::default());
        b.visit(test_frame(), FrameTransform::default());
        // no matching pop()
        let root = b.finish();
        assert_eq!(root.sublayers.len(), 1);
    }

    #[test]
    fn nested_pushes_nest_sublayers_in_order() {
        let mut b = TreeBuilder::new();
        b.push(FrameTransform::default());
        b.push(FrameTransform::default());
        b.visit(test_frame(), FrameTransform::default());
        b.pop();
        b.pop();
        let root = b.finish();
        assert_eq!(root.sublayers.len(), 1);
        assert_eq!(root.sublayers[0].sublayers.len(), 1);
        assert_eq!(root.sublayers[0].sublayers[0].items.len(), 1);
    }

    #[test]
    fn empty_tree_reports_empty() {
        let b = TreeBuilder::new();
        assert!(b.finish().is_empty());
    }
}
