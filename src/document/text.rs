//! Flattened text view of a document.
//!
//! Maps boundaries to byte offsets in the concatenated text of every text
//! node, and back again. Used to re-anchor a range after the tree has been
//! restructured, and to convert UTF-16 offsets from clients into bytes.

use std::ops::Range;

use super::node::NodeId;
use super::range::{Anchor, Boundary};
use super::tree::Document;

/// Which side of a leaf edge a byte offset should resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// Prefer the start of the following text node.
    Forward,
    /// Prefer the end of the preceding text node.
    Backward,
}

#[derive(Debug, Clone)]
struct Leaf {
    node: NodeId,
    start: usize,
    len: usize,
    /// Index path used to order element boundaries against leaves.
    key: Vec<usize>,
}

impl Leaf {
    fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Pre-computed text leaves for efficient offset lookups.
#[derive(Debug, Clone)]
pub struct TextIndex {
    text: String,
    leaves: Vec<Leaf>,
}

impl TextIndex {
    /// Index every text node reachable from the document root.
    pub fn build(document: &Document) -> Self {
        let mut text = String::new();
        let mut leaves = Vec::new();
        for (node, run) in document.text_nodes(document.root()) {
            leaves.push(Leaf {
                node,
                start: text.len(),
                len: run.len(),
                key: document.path_of(node),
            });
            text.push_str(run);
        }
        Self { text, leaves }
    }

    /// The concatenated text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte range a text node occupies, if it is indexed.
    pub fn node_range(&self, node: NodeId) -> Option<Range<usize>> {
        self.leaves
            .iter()
            .find(|leaf| leaf.node == node)
            .map(|leaf| leaf.start..leaf.end())
    }

    /// Convert a boundary to a byte offset in [`text`](Self::text).
    pub fn byte_offset(&self, document: &Document, boundary: Boundary) -> Option<usize> {
        if document.is_text(boundary.node) {
            let range = self.node_range(boundary.node)?;
            return Some(range.start + boundary.offset.min(range.len()));
        }
        let mut key = document.path_of(boundary.node);
        key.push(boundary.offset);
        let after = self.leaves.partition_point(|leaf| leaf.key < key);
        Some(
            self.leaves
                .get(after)
                .map_or(self.text.len(), |leaf| leaf.start),
        )
    }

    /// Byte range covered by an anchor.
    pub fn range_of(&self, document: &Document, anchor: &Anchor) -> Option<Range<usize>> {
        let start = self.byte_offset(document, anchor.start)?;
        let end = self.byte_offset(document, anchor.end)?;
        (start <= end).then_some(start..end)
    }

    /// Resolve a byte offset to a boundary inside a text node.
    ///
    /// Empty text nodes are never chosen. Returns `None` when the document
    /// has no text at all or `byte` is past the end.
    pub fn boundary_at(&self, byte: usize, affinity: Affinity) -> Option<Boundary> {
        if byte > self.text.len() {
            return None;
        }
        let mut leaves = self.leaves.iter().filter(|leaf| leaf.len > 0);
        let hit = match affinity {
            Affinity::Forward => leaves
                .clone()
                .find(|leaf| leaf.start <= byte && byte < leaf.end())
                .or_else(|| leaves.rfind(|leaf| leaf.end() == byte)),
            Affinity::Backward => leaves
                .clone()
                .rfind(|leaf| leaf.start < byte && byte <= leaf.end())
                .or_else(|| leaves.find(|leaf| leaf.start == byte)),
        }?;
        Some(Boundary::new(hit.node, byte - hit.start))
    }

    /// Build an anchor for a byte range, keeping both ends inside the text
    /// they cover.
    pub fn anchor_for(&self, range: Range<usize>) -> Option<Anchor> {
        if range.is_empty() {
            let at = self.boundary_at(range.start, Affinity::Forward)?;
            return Some(Anchor::collapsed(at));
        }
        Some(Anchor::new(
            self.boundary_at(range.start, Affinity::Forward)?,
            self.boundary_at(range.end, Affinity::Backward)?,
        ))
    }

    /// Convert a UTF-16 code unit offset to a byte offset.
    ///
    /// Offsets that land inside a surrogate pair snap forward to the next
    /// character. Returns `None` past the end of the text.
    pub fn utf16_to_byte(&self, utf16: usize) -> Option<usize> {
        let mut units = 0;
        for (i, c) in self.text.char_indices() {
            if units >= utf16 {
                return Some(i);
            }
            units += c.len_utf16();
        }
        (units >= utf16).then_some(self.text.len())
    }

    /// Convert a byte offset to UTF-16 code units.
    pub fn byte_to_utf16(&self, byte: usize) -> usize {
        self.text
            .char_indices()
            .take_while(|(i, _)| *i < byte)
            .map(|(_, c)| c.len_utf16())
            .sum()
    }
}
