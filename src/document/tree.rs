//! Arena-backed document tree.
//!
//! Nodes live in slots addressed by [`NodeId`] handles. Removing a node frees
//! its whole subtree and bumps each slot's generation, so any handle captured
//! before the removal (for example inside a saved selection) fails validation
//! with [`TreeError::Stale`] rather than pointing at unrelated content.

use super::node::{Element, Node, NodeId, NodeKind};

/// Errors from structural operations on a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("{0:?} no longer refers to a live node")]
    Stale(NodeId),
    #[error("{0:?} is not attached to the document")]
    Detached(NodeId),
    #[error("{0:?} cannot contain children")]
    NotContainer(NodeId),
    #[error("{0:?} has no parent")]
    Orphan(NodeId),
    #[error("offset {offset} is out of bounds for {node:?}")]
    Offset { node: NodeId, offset: usize },
    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("range start comes after its end")]
    Inverted,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// A mutable tree of elements and text runs.
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only its root.
    pub fn new() -> Self {
        let mut document = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                idx: 0,
                generation: 0,
            },
        };
        document.root = document.alloc(NodeKind::Root);
        document
    }

    /// Create a document whose root holds a single text run.
    pub fn from_text(text: &str) -> Self {
        let mut document = Self::new();
        if !text.is_empty() {
            let node = document.create_text(text);
            document.attach_fresh(document.root, node);
        }
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    // -- Allocation --

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let node = Node::new(kind);
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.node = Some(node);
            NodeId {
                idx,
                generation: slot.generation,
            }
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId { idx, generation: 0 }
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(slot) = self.slots.get_mut(id.idx as usize) else {
                continue;
            };
            if slot.generation != id.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                // Bump generation so old handles immediately fail validation.
                slot.generation += 1;
                self.free.push(id.idx);
            }
        }
    }

    /// Link a freshly allocated node as the last child of `parent`.
    ///
    /// Only for nodes created by this document that have no parent yet.
    pub(crate) fn attach_fresh(&mut self, parent: NodeId, child: NodeId) {
        if let Ok(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Ok(node) = self.node_mut(parent) {
            node.children.push(child);
        }
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Element(Element::new(tag)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeKind::Text(text.into()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.alloc(NodeKind::Fragment)
    }

    /// Allocate a copy of `id` without its children.
    pub fn clone_shallow(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        let kind = self.node(id)?.kind.clone();
        Ok(self.alloc(kind))
    }

    // -- Queries --

    /// Returns whether the handle refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.slots
            .get(id.idx as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.node.is_some())
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.slots
            .get(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(TreeError::Stale(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.slots
            .get_mut(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(TreeError::Stale(id))
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).ok().map(|node| &node.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id)? {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.node_mut(id).ok()?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok()?.parent
    }

    /// Children of `id`; empty for text nodes and stale handles.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Inclusive ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            document: self,
            next: self.is_alive(id).then_some(id),
        }
    }

    /// Inclusive descendants of `id` in document (pre-)order.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            document: self,
            stack: if self.is_alive(id) { vec![id] } else { vec![] },
        }
    }

    /// Whether `ancestor` is an inclusive ancestor of `node`.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|id| id == ancestor)
    }

    /// Whether `id` is live and reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.ancestors(id).last() == Some(self.root)
    }

    /// Text nodes under `id` in document order.
    pub fn text_nodes(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &str)> + '_ {
        self.descendants(id)
            .filter_map(move |node| self.text(node).map(|text| (node, text)))
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.text_nodes(id).map(|(_, text)| text).collect()
    }

    /// DOM node length: bytes for text, child count otherwise.
    pub fn len_of(&self, id: NodeId) -> usize {
        match self.node(id) {
            Ok(Node {
                kind: NodeKind::Text(text),
                ..
            }) => text.len(),
            Ok(node) => node.children.len(),
            Err(_) => 0,
        }
    }

    /// First element in document order whose `id` attribute equals `value`.
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(self.root).find(|&node| {
            self.element(node)
                .and_then(|el| el.attribute("id"))
                .is_some_and(|id| id == value)
        })
    }

    /// Index path from the root down to `id`.
    pub(crate) fn path_of(&self, id: NodeId) -> Vec<usize> {
        let mut path: Vec<usize> = self
            .ancestors(id)
            .filter_map(|node| self.index_in_parent(node))
            .collect();
        path.reverse();
        path
    }

    // -- Mutation --

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), TreeError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Text(current) => {
                *current = text.into();
                Ok(())
            }
            _ => Err(TreeError::NotContainer(id)),
        }
    }

    /// Insert `child` so that it ends up at `index` among `parent`'s children.
    ///
    /// A child that already has a parent is detached first.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), TreeError> {
        if !self.node(parent)?.kind.is_container() {
            return Err(TreeError::NotContainer(parent));
        }
        self.node(child)?;
        if self.contains(child, parent) {
            return Err(TreeError::Cycle { parent, child });
        }

        let mut index = index;
        if self.parent(child) == Some(parent) {
            if let Some(current) = self.index_in_parent(child) {
                if current < index {
                    index -= 1;
                }
            }
        }
        self.detach(child)?;

        let siblings = &mut self.node_mut(parent)?.children;
        if index > siblings.len() {
            return Err(TreeError::Offset {
                node: parent,
                offset: index,
            });
        }
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Unlink `id` from its parent, keeping the subtree alive.
    pub fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|&child| child != id);
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    /// Detach `id` and free its whole subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TreeError> {
        if id == self.root {
            return Err(TreeError::Orphan(id));
        }
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    /// Put `replacement` where `old` is, then free `old`.
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) -> Result<(), TreeError> {
        let parent = self.parent(old).ok_or(TreeError::Orphan(old))?;
        let index = self.index_in_parent(old).ok_or(TreeError::Orphan(old))?;
        self.insert_child(parent, index, replacement)?;
        self.remove(old)
    }

    /// Split a text node at a byte offset; the tail becomes the next sibling.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId, TreeError> {
        let parent = self.parent(id).ok_or(TreeError::Orphan(id))?;
        let index = self.index_in_parent(id).ok_or(TreeError::Orphan(id))?;
        let tail = match &mut self.node_mut(id)?.kind {
            NodeKind::Text(text) if text.is_char_boundary(offset) => text.split_off(offset),
            NodeKind::Text(_) => return Err(TreeError::Offset { node: id, offset }),
            _ => return Err(TreeError::NotContainer(id)),
        };
        let next = self.create_text(tail);
        self.insert_child(parent, index + 1, next)?;
        Ok(next)
    }

    /// Move every child of `from` to the end of `to`, preserving order.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) -> Result<(), TreeError> {
        for child in self.children(from).to_vec() {
            let index = self.children(to).len();
            self.insert_child(to, index, child)?;
        }
        Ok(())
    }

    /// Free every child of `id`.
    pub fn clear_children(&mut self, id: NodeId) -> Result<(), TreeError> {
        for child in self.children(id).to_vec() {
            self.remove(child)?;
        }
        Ok(())
    }
}

/// Iterator over inclusive ancestors, created by [`Document::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    document: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.document.parent(current);
        Some(current)
    }
}

/// Pre-order iterator over a subtree, created by [`Document::descendants`].
#[derive(Debug)]
pub struct Descendants<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.document.children(current).iter().rev().copied());
        Some(current)
    }
}
