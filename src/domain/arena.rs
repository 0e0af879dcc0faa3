use std::fmt;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::codes::CodedEntry;
use crate::domain::error::{ContentError, ContentResult};
use crate::domain::values::{CompositeReference, ImageReference, MeasurementValue};
use crate::util::uid::check_uid;

/// Identifier of a content item inside one [`ContentTree`].
///
/// Ids are generational: the id of a removed node never resolves to a node
/// inserted later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Index);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (index, generation) = self.0.into_raw_parts();
        write!(f, "#{}.{}", index, generation)
    }
}

/// How a content item relates to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
    /// Top-level item without parent
    Unknown,
    Contains,
    HasObsContext,
    HasAcqContext,
    HasConceptMod,
    HasProperties,
    InferredFrom,
    SelectedFrom,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Relationship::Unknown => "UNKNOWN",
            Relationship::Contains => "CONTAINS",
            Relationship::HasObsContext => "HAS OBS CONTEXT",
            Relationship::HasAcqContext => "HAS ACQ CONTEXT",
            Relationship::HasConceptMod => "HAS CONCEPT MOD",
            Relationship::HasProperties => "HAS PROPERTIES",
            Relationship::InferredFrom => "INFERRED FROM",
            Relationship::SelectedFrom => "SELECTED FROM",
        };
        f.write_str(name)
    }
}

/// Kind of payload a content item holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Container,
    Text,
    Code,
    Num,
    UidRef,
    Image,
    Composite,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Container => "CONTAINER",
            ValueKind::Text => "TEXT",
            ValueKind::Code => "CODE",
            ValueKind::Num => "NUM",
            ValueKind::UidRef => "UIDREF",
            ValueKind::Image => "IMAGE",
            ValueKind::Composite => "COMPOSITE",
        };
        f.write_str(name)
    }
}

/// Payload of a content item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContentValue {
    #[default]
    Empty,
    /// Text and UID values
    String(String),
    Code(CodedEntry),
    Numeric(MeasurementValue),
    Image(ImageReference),
    Composite(CompositeReference),
}

impl fmt::Display for ContentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentValue::Empty => Ok(()),
            ContentValue::String(s) => write!(f, "\"{}\"", s),
            ContentValue::Code(c) => write!(f, "{}", c),
            ContentValue::Numeric(n) => write!(f, "{}", n),
            ContentValue::Image(i) => write!(f, "{}", i),
            ContentValue::Composite(c) => write!(f, "{}", c),
        }
    }
}

/// Content item stored in the arena.
#[derive(Debug, Clone)]
pub struct ContentNode {
    relationship: Relationship,
    value_kind: ValueKind,
    concept_name: CodedEntry,
    value: ContentValue,
    annotation: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl ContentNode {
    fn new(relationship: Relationship, value_kind: ValueKind) -> Self {
        Self {
            relationship,
            value_kind,
            concept_name: CodedEntry::default(),
            value: ContentValue::Empty,
            annotation: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn relationship(&self) -> Relationship {
        self.relationship
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value_kind
    }

    pub fn concept_name(&self) -> &CodedEntry {
        &self.concept_name
    }

    pub fn value(&self) -> &ContentValue {
        &self.value
    }

    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn set_concept_name(&mut self, concept: &CodedEntry, check: bool) -> ContentResult<()> {
        if !concept.is_complete() {
            return Err(ContentError::IncompleteValue("concept name"));
        }
        if check {
            concept.check()?;
        }
        self.concept_name = concept.clone();
        Ok(())
    }

    pub fn set_annotation(&mut self, text: &str) {
        self.annotation = Some(text.to_string());
    }

    pub fn string_value(&self) -> Option<&str> {
        match &self.value {
            ContentValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Sets the value of a TEXT or UIDREF item.
    pub fn set_string_value(&mut self, value: &str, check: bool) -> ContentResult<()> {
        match self.value_kind {
            ValueKind::Text | ValueKind::UidRef => {}
            found => {
                return Err(ContentError::ValueKindMismatch {
                    expected: ValueKind::Text,
                    found,
                })
            }
        }
        if value.is_empty() {
            return Err(ContentError::IncompleteValue("string value"));
        }
        if check && self.value_kind == ValueKind::UidRef {
            check_uid(value)?;
        }
        self.value = ContentValue::String(value.to_string());
        Ok(())
    }

    pub fn code_value(&self) -> Option<&CodedEntry> {
        match &self.value {
            ContentValue::Code(c) => Some(c),
            _ => None,
        }
    }

    pub fn set_code_value(&mut self, code: &CodedEntry, check: bool) -> ContentResult<()> {
        self.expect_kind(ValueKind::Code)?;
        if !code.is_complete() {
            return Err(ContentError::IncompleteValue("coded entry"));
        }
        if check {
            code.check()?;
        }
        self.value = ContentValue::Code(code.clone());
        Ok(())
    }

    pub fn numeric_value(&self) -> Option<&MeasurementValue> {
        match &self.value {
            ContentValue::Numeric(n) => Some(n),
            _ => None,
        }
    }

    pub fn set_numeric_value(&mut self, value: &MeasurementValue, check: bool) -> ContentResult<()> {
        self.expect_kind(ValueKind::Num)?;
        if !value.is_complete() {
            return Err(ContentError::IncompleteValue("measurement value"));
        }
        if check {
            value.check()?;
        }
        self.value = ContentValue::Numeric(value.clone());
        Ok(())
    }

    pub fn image_reference(&self) -> Option<&ImageReference> {
        match &self.value {
            ContentValue::Image(i) => Some(i),
            _ => None,
        }
    }

    pub fn set_image_reference(&mut self, reference: &ImageReference, check: bool) -> ContentResult<()> {
        self.expect_kind(ValueKind::Image)?;
        if !reference.is_complete() {
            return Err(ContentError::IncompleteValue("image reference"));
        }
        if check {
            reference.check()?;
        }
        self.value = ContentValue::Image(reference.clone());
        Ok(())
    }

    pub fn composite_reference(&self) -> Option<&CompositeReference> {
        match &self.value {
            ContentValue::Composite(c) => Some(c),
            _ => None,
        }
    }

    pub fn set_composite_reference(
        &mut self,
        reference: &CompositeReference,
        check: bool,
    ) -> ContentResult<()> {
        self.expect_kind(ValueKind::Composite)?;
        if !reference.is_complete() {
            return Err(ContentError::IncompleteValue("composite reference"));
        }
        if check {
            reference.check()?;
        }
        self.value = ContentValue::Composite(reference.clone());
        Ok(())
    }

    /// Concept name is complete and the payload matches the value kind.
    pub fn is_valid(&self) -> bool {
        if !self.concept_name.is_complete() {
            return false;
        }
        match (self.value_kind, &self.value) {
            (ValueKind::Container, ContentValue::Empty) => true,
            (ValueKind::Text | ValueKind::UidRef, ContentValue::String(s)) => !s.is_empty(),
            (ValueKind::Code, ContentValue::Code(c)) => c.is_complete(),
            (ValueKind::Num, ContentValue::Numeric(n)) => n.is_complete(),
            (ValueKind::Image, ContentValue::Image(i)) => i.is_complete(),
            (ValueKind::Composite, ContentValue::Composite(c)) => c.is_complete(),
            _ => false,
        }
    }

    fn expect_kind(&self, expected: ValueKind) -> ContentResult<()> {
        if self.value_kind == expected {
            Ok(())
        } else {
            Err(ContentError::ValueKindMismatch {
                expected,
                found: self.value_kind,
            })
        }
    }
}

/// Where a new content item goes relative to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMode {
    /// Next sibling of the current item
    AfterCurrent,
    /// Last child of the current item
    BelowCurrent,
    /// First child of the current item
    BelowCurrentBeforeFirstChild,
}

/// Arena-based content tree with a cursor.
///
/// Items are added relative to the current item, and every successful
/// insertion moves the cursor to the new item. A *document* tree only
/// accepts top-level containers without relationship; a *detached* tree
/// (see [`ContentTree::detached`]) accepts any top-level item so it can be
/// built in isolation and spliced into a document tree later.
#[derive(Debug)]
pub struct ContentTree {
    arena: Arena<ContentNode>,
    roots: Vec<NodeId>,
    current: Option<NodeId>,
    detached: bool,
}

impl Default for ContentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            roots: Vec::new(),
            current: None,
            detached: false,
        }
    }

    pub fn detached() -> Self {
        Self {
            detached: true,
            ..Self::new()
        }
    }

    /// Detached tree with room for `capacity` items reserved up front.
    ///
    /// Only the reservation of the top-level list is fallible and reported
    /// as [`ContentError::AllocationFailed`]; the arena offers no fallible
    /// allocation and aborts on exhaustion like any other `Vec` growth.
    pub fn try_detached(capacity: usize) -> ContentResult<Self> {
        let mut roots = Vec::new();
        roots
            .try_reserve_exact(capacity)
            .map_err(|_| ContentError::AllocationFailed)?;
        Ok(Self {
            arena: Arena::with_capacity(capacity),
            roots,
            current: None,
            detached: true,
        })
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id.0)
    }

    pub fn get(&self, id: NodeId) -> Option<&ContentNode> {
        self.arena.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ContentNode> {
        self.arena.get_mut(id.0)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Id of the current item.
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn current_item(&self) -> ContentResult<&ContentNode> {
        let id = self.current.ok_or(ContentError::NoCurrentNode)?;
        self.get(id).ok_or(ContentError::NodeNotFound(id))
    }

    pub fn current_item_mut(&mut self) -> ContentResult<&mut ContentNode> {
        let id = self.current.ok_or(ContentError::NoCurrentNode)?;
        self.arena
            .get_mut(id.0)
            .ok_or(ContentError::NodeNotFound(id))
    }

    #[instrument(level = "trace", skip(self))]
    pub fn goto(&mut self, id: NodeId) -> ContentResult<NodeId> {
        if self.contains(id) {
            self.current = Some(id);
            Ok(id)
        } else {
            Err(ContentError::NodeNotFound(id))
        }
    }

    /// Moves the cursor to the parent of the current item, if any.
    #[instrument(level = "trace", skip(self))]
    pub fn goto_parent(&mut self) -> Option<NodeId> {
        let parent = self.current.and_then(|id| self.parent(id))?;
        self.current = Some(parent);
        Some(parent)
    }

    /// Adds an item without concept name at `mode` relative to the current one.
    ///
    /// On an empty tree the item becomes the first top-level item whatever
    /// `mode` says.
    #[instrument(level = "trace", skip(self))]
    pub fn add_content_item(
        &mut self,
        relationship: Relationship,
        value_kind: ValueKind,
        mode: AddMode,
    ) -> ContentResult<NodeId> {
        self.attach(ContentNode::new(relationship, value_kind), mode)
    }

    /// Adds an item with `concept` as concept name.
    ///
    /// The concept name is validated before the tree is touched.
    #[instrument(level = "trace", skip(self, concept), fields(concept = %concept))]
    pub fn add_named_item(
        &mut self,
        relationship: Relationship,
        value_kind: ValueKind,
        concept: &CodedEntry,
        mode: AddMode,
        check: bool,
    ) -> ContentResult<NodeId> {
        let mut node = ContentNode::new(relationship, value_kind);
        node.set_concept_name(concept, check)?;
        self.attach(node, mode)
    }

    fn attach(&mut self, mut node: ContentNode, mode: AddMode) -> ContentResult<NodeId> {
        let (parent, position) = self.target(mode)?;
        self.check_relationship(parent, node.relationship, node.value_kind)?;
        node.parent = parent;
        let id = NodeId(self.arena.insert(node));
        self.link(parent, position, &[id]);
        self.current = Some(id);
        Ok(id)
    }

    /// Parent and child position an insertion in `mode` targets.
    fn target(&self, mode: AddMode) -> ContentResult<(Option<NodeId>, usize)> {
        if self.is_empty() {
            return Ok((None, 0));
        }
        let current = self.current.ok_or(ContentError::NoCurrentNode)?;
        let node = self.get(current).ok_or(ContentError::NodeNotFound(current))?;
        match mode {
            AddMode::AfterCurrent => {
                let siblings = match node.parent {
                    Some(parent) => self.children(parent),
                    None => self.roots.as_slice(),
                };
                let position = siblings
                    .iter()
                    .position(|&s| s == current)
                    .ok_or(ContentError::NodeNotFound(current))?;
                Ok((node.parent, position + 1))
            }
            AddMode::BelowCurrent => Ok((Some(current), node.children.len())),
            AddMode::BelowCurrentBeforeFirstChild => Ok((Some(current), 0)),
        }
    }

    fn link(&mut self, parent: Option<NodeId>, position: usize, ids: &[NodeId]) {
        let siblings = match parent.and_then(|p| self.arena.get_mut(p.0)) {
            Some(parent) => &mut parent.children,
            None => &mut self.roots,
        };
        let position = position.min(siblings.len());
        siblings.splice(position..position, ids.iter().copied());
    }

    fn check_relationship(
        &self,
        parent: Option<NodeId>,
        relationship: Relationship,
        child: ValueKind,
    ) -> ContentResult<()> {
        let not_allowed = |parent: String| ContentError::RelationshipNotAllowed {
            parent,
            relationship,
            child,
        };
        let Some(parent) = parent else {
            if self.detached
                || (relationship == Relationship::Unknown && child == ValueKind::Container)
            {
                return Ok(());
            }
            return Err(not_allowed("document root".to_string()));
        };
        let parent_kind = self
            .get(parent)
            .ok_or(ContentError::NodeNotFound(parent))?
            .value_kind;
        let allowed = match relationship {
            Relationship::Unknown => false,
            Relationship::Contains => parent_kind == ValueKind::Container,
            Relationship::HasConceptMod => matches!(child, ValueKind::Code | ValueKind::Text),
            _ => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(not_allowed(format!("{} item", parent_kind)))
        }
    }

    /// Moves all items of `subtree` into this tree at `mode` relative to the
    /// current item and returns the new id of the subtree's first top-level
    /// item.
    ///
    /// Relationships of the subtree's top-level items are checked against
    /// the new parent before anything is moved, so on error this tree is
    /// unchanged and the subtree is dropped.
    #[instrument(level = "trace", skip(self, subtree), fields(items = subtree.len()))]
    pub fn insert_subtree(&mut self, mut subtree: ContentTree, mode: AddMode) -> ContentResult<NodeId> {
        if subtree.is_empty() {
            return Err(ContentError::IncompleteValue("subtree"));
        }
        let (parent, position) = self.target(mode)?;
        for &root in &subtree.roots {
            let node = subtree.get(root).ok_or(ContentError::NodeNotFound(root))?;
            self.check_relationship(parent, node.relationship, node.value_kind)?;
        }

        let old_roots = std::mem::take(&mut subtree.roots);
        let mut new_roots = Vec::with_capacity(old_roots.len());
        for root in old_roots {
            if let Some(id) = self.transplant(&mut subtree.arena, root, parent) {
                new_roots.push(id);
            }
        }
        let first = *new_roots
            .first()
            .ok_or(ContentError::IncompleteValue("subtree"))?;
        self.link(parent, position, &new_roots);
        self.current = Some(first);
        Ok(first)
    }

    fn transplant(
        &mut self,
        source: &mut Arena<ContentNode>,
        old: NodeId,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        let mut node = source.remove(old.0)?;
        let old_children = std::mem::take(&mut node.children);
        node.parent = parent;
        let id = NodeId(self.arena.insert(node));
        let new_children: Vec<NodeId> = old_children
            .into_iter()
            .filter_map(|child| self.transplant(source, child, Some(id)))
            .collect();
        if let Some(node) = self.arena.get_mut(id.0) {
            node.children = new_children;
        }
        Some(id)
    }

    /// Non-empty and every item valid.
    pub fn is_valid(&self) -> bool {
        !self.is_empty() && self.arena.iter().all(|(_, node)| node.is_valid())
    }

    /// Removes all items. Ids handed out before stay unresolvable.
    pub fn clear(&mut self) {
        let ids: Vec<Index> = self.arena.iter().map(|(index, _)| index).collect();
        for index in ids {
            self.arena.remove(index);
        }
        self.roots.clear();
        self.current = None;
    }

    #[instrument(level = "trace", skip(self))]
    pub fn iter(&self) -> ContentIterator<'_> {
        ContentIterator::new(self)
    }

    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.roots
            .iter()
            .map(|&root| self.calculate_depth(root))
            .max()
            .unwrap_or(0)
    }

    fn calculate_depth(&self, id: NodeId) -> usize {
        if let Some(node) = self.get(id) {
            1 + node
                .children
                .iter()
                .map(|&child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }
}

/// Pre-order traversal over all items, top-level items in order.
pub struct ContentIterator<'a> {
    tree: &'a ContentTree,
    stack: Vec<NodeId>,
}

impl<'a> ContentIterator<'a> {
    fn new(tree: &'a ContentTree) -> Self {
        let stack = tree.roots.iter().rev().copied().collect();
        Self { tree, stack }
    }
}

impl<'a> Iterator for ContentIterator<'a> {
    type Item = (NodeId, &'a ContentNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(node) = self.tree.get(current) {
                // Push children in reverse order for left-to-right traversal
                self.stack.extend(node.children.iter().rev());
                return Some((current, node));
            }
        }
        None
    }
}
