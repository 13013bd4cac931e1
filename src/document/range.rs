//! Boundary points and ranges over a [`Document`].
//!
//! A [`Boundary`] is a `(node, offset)` pair with DOM semantics: for a text
//! node the offset counts bytes into its text, for any other node it counts
//! children. An [`Anchor`] is an ordered pair of boundaries.

use std::cmp::Ordering;

use super::node::NodeId;
use super::text::TextIndex;
use super::tree::{Document, TreeError};

/// A position inside the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub const fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A contiguous span between two boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Anchor {
    pub start: Boundary,
    pub end: Boundary,
}

impl Anchor {
    pub const fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    pub const fn collapsed(at: Boundary) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// The range covering exactly `node` within its parent.
    pub fn selecting(document: &Document, node: NodeId) -> Option<Self> {
        let parent = document.parent(node)?;
        let index = document.index_in_parent(node)?;
        Some(Self::new(
            Boundary::new(parent, index),
            Boundary::new(parent, index + 1),
        ))
    }
}

/// Errors from [`surround_contents`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WrapError {
    /// The range partially selects a non-text node, so it cannot be wrapped
    /// without splitting that node.
    #[error("range partially selects {0:?}")]
    Rejected(NodeId),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

fn order_key(document: &Document, boundary: Boundary) -> Vec<usize> {
    let mut key = document.path_of(boundary.node);
    key.push(boundary.offset);
    key
}

/// Order two boundaries in the same document.
pub fn compare(document: &Document, a: Boundary, b: Boundary) -> Ordering {
    if a.node == b.node {
        return a.offset.cmp(&b.offset);
    }
    order_key(document, a).cmp(&order_key(document, b))
}

fn validate_boundary(document: &Document, boundary: Boundary) -> Result<(), TreeError> {
    let node = boundary.node;
    if !document.is_alive(node) {
        return Err(TreeError::Stale(node));
    }
    if !document.is_attached(node) {
        return Err(TreeError::Detached(node));
    }
    let in_bounds = match document.text(node) {
        Some(text) => text.is_char_boundary(boundary.offset),
        None => boundary.offset <= document.len_of(node),
    };
    if !in_bounds {
        return Err(TreeError::Offset {
            node,
            offset: boundary.offset,
        });
    }
    Ok(())
}

/// Check that both ends are live, attached, in bounds and ordered.
pub fn validate_anchor(document: &Document, anchor: &Anchor) -> Result<(), TreeError> {
    validate_boundary(document, anchor.start)?;
    validate_boundary(document, anchor.end)?;
    if compare(document, anchor.start, anchor.end) == Ordering::Greater {
        return Err(TreeError::Inverted);
    }
    Ok(())
}

/// Deepest node containing both `a` and `b`.
pub fn common_ancestor(document: &Document, a: NodeId, b: NodeId) -> Option<NodeId> {
    let of_a: Vec<NodeId> = document.ancestors(a).collect();
    document.ancestors(b).find(|node| of_a.contains(node))
}

/// Concatenated text of every text node the anchor covers.
pub fn text_in(document: &Document, anchor: &Anchor) -> String {
    let index = TextIndex::build(document);
    index
        .range_of(document, anchor)
        .and_then(|range| index.text().get(range))
        .unwrap_or_default()
        .to_string()
}

/// Remove the anchored content from the tree and return it in a new fragment.
///
/// Partially covered text is split; partially covered elements are
/// shallow-cloned into the fragment so both halves keep their structure.
/// Returns the fragment and the boundary where the range collapsed.
pub fn extract_contents(
    document: &mut Document,
    anchor: &Anchor,
) -> Result<(NodeId, Boundary), TreeError> {
    validate_anchor(document, anchor)?;
    let fragment = document.create_fragment();
    let collapsed_at = extract_into(document, fragment, anchor.start, anchor.end)?;
    Ok((fragment, collapsed_at))
}

fn extract_into(
    document: &mut Document,
    container: NodeId,
    start: Boundary,
    end: Boundary,
) -> Result<Boundary, TreeError> {
    if start == end {
        return Ok(start);
    }

    if start.node == end.node {
        if let Some(text) = document.text(start.node) {
            let taken = text[start.offset..end.offset].to_string();
            let kept = format!("{}{}", &text[..start.offset], &text[end.offset..]);
            let clone = document.create_text(taken);
            document.append_child(container, clone)?;
            document.set_text(start.node, kept)?;
            return Ok(start);
        }
    }

    let ancestor =
        common_ancestor(document, start.node, end.node).ok_or(TreeError::Orphan(start.node))?;
    let child_of_ancestor = |document: &Document, node: NodeId| {
        document
            .ancestors(node)
            .find(|&n| document.parent(n) == Some(ancestor))
    };

    let first_partial = if document.contains(start.node, end.node) {
        None
    } else {
        child_of_ancestor(document, start.node)
    };
    let last_partial = if document.contains(end.node, start.node) {
        None
    } else {
        child_of_ancestor(document, end.node)
    };

    let lo = match first_partial {
        Some(node) => document.index_in_parent(node).ok_or(TreeError::Orphan(node))? + 1,
        None => start.offset,
    };
    let hi = match last_partial {
        Some(node) => document.index_in_parent(node).ok_or(TreeError::Orphan(node))?,
        None => end.offset,
    };
    let contained: Vec<NodeId> = document
        .children(ancestor)
        .get(lo..hi.max(lo))
        .map(<[NodeId]>::to_vec)
        .unwrap_or_default();

    let collapsed_at = match first_partial {
        None => start,
        Some(_) => Boundary::new(ancestor, lo),
    };

    if let Some(first) = first_partial {
        if let Some(text) = document.text(first) {
            let (kept, taken) = text.split_at(start.offset);
            let (kept, taken) = (kept.to_string(), taken.to_string());
            let clone = document.create_text(taken);
            document.append_child(container, clone)?;
            document.set_text(first, kept)?;
        } else {
            let clone = document.clone_shallow(first)?;
            document.append_child(container, clone)?;
            let first_end = Boundary::new(first, document.len_of(first));
            extract_into(document, clone, start, first_end)?;
        }
    }

    for child in contained {
        document.append_child(container, child)?;
    }

    if let Some(last) = last_partial {
        if let Some(text) = document.text(last) {
            let (taken, kept) = text.split_at(end.offset);
            let (taken, kept) = (taken.to_string(), kept.to_string());
            let clone = document.create_text(taken);
            document.append_child(container, clone)?;
            document.set_text(last, kept)?;
        } else {
            let clone = document.clone_shallow(last)?;
            document.append_child(container, clone)?;
            extract_into(document, clone, Boundary::new(last, 0), end)?;
        }
    }

    Ok(collapsed_at)
}

/// Insert `node` at a boundary, splitting a text node when the boundary
/// falls inside it.
pub fn insert_at(document: &mut Document, at: Boundary, node: NodeId) -> Result<(), TreeError> {
    let Some(text) = document.text(at.node) else {
        return document.insert_child(at.node, at.offset, node);
    };
    let len = text.len();
    let parent = document.parent(at.node).ok_or(TreeError::Orphan(at.node))?;
    let index = document
        .index_in_parent(at.node)
        .ok_or(TreeError::Orphan(at.node))?;
    match at.offset {
        0 => document.insert_child(parent, index, node),
        offset if offset == len => document.insert_child(parent, index + 1, node),
        offset => {
            document.split_text(at.node, offset)?;
            document.insert_child(parent, index + 1, node)
        }
    }
}

/// Move the anchored content into `wrapper` and put `wrapper` in its place.
///
/// Fails with [`WrapError::Rejected`] when an element is only partly inside
/// the range. `wrapper` must be a fresh, detached node.
pub fn surround_contents(
    document: &mut Document,
    anchor: &Anchor,
    wrapper: NodeId,
) -> Result<(), WrapError> {
    validate_anchor(document, anchor)?;
    let Anchor { start, end } = *anchor;
    let ancestor =
        common_ancestor(document, start.node, end.node).ok_or(TreeError::Orphan(start.node))?;

    for edge in [start.node, end.node] {
        if let Some(partial) = document
            .ancestors(edge)
            .take_while(|&node| node != ancestor)
            .find(|&node| !document.is_text(node))
        {
            return Err(WrapError::Rejected(partial));
        }
    }

    if start.node == end.node && document.is_text(start.node) {
        let middle = if start.offset > 0 {
            document.split_text(start.node, start.offset)?
        } else {
            start.node
        };
        if end.offset - start.offset < document.len_of(middle) {
            document.split_text(middle, end.offset - start.offset)?;
        }
        let parent = document.parent(middle).ok_or(TreeError::Orphan(middle))?;
        let index = document
            .index_in_parent(middle)
            .ok_or(TreeError::Orphan(middle))?;
        document.insert_child(parent, index, wrapper)?;
        document.append_child(wrapper, middle)?;
        return Ok(());
    }

    // Split the end first so the start split only shifts indices after it.
    let mut hi = match document.text(end.node).map(str::len) {
        None => end.offset,
        Some(len) => {
            let index = document
                .index_in_parent(end.node)
                .ok_or(TreeError::Orphan(end.node))?;
            if end.offset == 0 {
                index
            } else {
                if end.offset < len {
                    document.split_text(end.node, end.offset)?;
                }
                index + 1
            }
        }
    };
    let lo = match document.text(start.node).map(str::len) {
        None => start.offset,
        Some(len) => {
            let index = document
                .index_in_parent(start.node)
                .ok_or(TreeError::Orphan(start.node))?;
            if start.offset == 0 {
                index
            } else {
                if start.offset < len {
                    document.split_text(start.node, start.offset)?;
                    hi += 1;
                }
                index + 1
            }
        }
    };

    let covered: Vec<NodeId> = document
        .children(ancestor)
        .get(lo..hi.max(lo))
        .map(<[NodeId]>::to_vec)
        .unwrap_or_default();
    document.insert_child(ancestor, lo, wrapper)?;
    for child in covered {
        document.append_child(wrapper, child)?;
    }
    Ok(())
}
