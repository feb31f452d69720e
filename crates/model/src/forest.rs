//! Arena-backed element forests.
//!
//! A forest owns its elements in a flat arena addressed by [`ElementId`].
//! Ownership runs strictly through the parent link; the cross-reference
//! graph lives in two adjacency maps (forward and inverse) keyed by element
//! id and never owns anything, so reference cycles are harmless.
//!
//! Children and roots are kept sorted by `(kind, signature)` at insertion
//! time, which makes traversal order deterministic and lets the paired walk
//! zip two forests without any further sorting.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::archive::{ArchiveId, ArchiveRecord, ArchiveRole};
use crate::element::{Element, ElementId, ElementSnapshot};
use crate::kind::ElementKind;
use crate::reference::{Reference, ReferenceKind};

/// An ordered set of root elements for one API, plus everything below them.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    analyzer: String,
    archives: Vec<ArchiveRecord>,
    elements: Vec<Element>,
    roots: Vec<ElementId>,
    references: BTreeMap<ElementId, BTreeSet<Reference>>,
    referencing: BTreeMap<ElementId, BTreeSet<Reference>>,
}

impl Forest {
    /// A new empty forest. `analyzer` names the archive analyzer that
    /// produced it.
    pub fn new(analyzer: impl Into<String>, archives: Vec<ArchiveRecord>) -> Self {
        Forest {
            analyzer: analyzer.into(),
            archives,
            elements: Vec::new(),
            roots: Vec::new(),
            references: BTreeMap::new(),
            referencing: BTreeMap::new(),
        }
    }

    /// Name of the archive analyzer that produced this forest.
    pub fn analyzer(&self) -> &str {
        &self.analyzer
    }

    pub fn archives(&self) -> &[ArchiveRecord] {
        &self.archives
    }

    pub fn archive_record(&self, id: ArchiveId) -> &ArchiveRecord {
        &self.archives[id.index()]
    }

    pub fn find_archive(&self, name: &str) -> Option<ArchiveId> {
        self.archives
            .iter()
            .position(|a| a.name == name)
            .map(|i| ArchiveId(i as u32))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn roots(&self) -> &[ElementId] {
        &self.roots
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.index()]
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        &self.elements[id.index()].children
    }

    /// Add a root element, keeping the root list sorted.
    pub fn add_root(&mut self, element: Element) -> ElementId {
        let insert_at = sorted_position(&self.elements, &self.roots, &element);
        let id = self.push_element(element, None);
        self.roots.insert(insert_at, id);
        id
    }

    /// Add a child under `parent`, keeping the sibling list sorted and
    /// recording the implied `contains` use site.
    pub fn add_child(&mut self, parent: ElementId, element: Element) -> ElementId {
        let insert_at = {
            let siblings = &self.elements[parent.index()].children;
            sorted_position(&self.elements, siblings, &element)
        };
        let id = self.push_element(element, Some(parent));
        self.elements[parent.index()].children.insert(insert_at, id);
        self.add_reference(parent, ReferenceKind::Contains, id);
        id
    }

    fn push_element(&mut self, mut element: Element, parent: Option<ElementId>) -> ElementId {
        element.parent = parent;
        element.children = Vec::new();
        let id = ElementId::from_index(self.elements.len());
        self.elements.push(element);
        id
    }

    /// Locate a direct child of `parent` (or a root when `parent` is
    /// `None`) by its kind and signature.
    pub fn find_child(
        &self,
        parent: Option<ElementId>,
        kind: &ElementKind,
        signature: &str,
    ) -> Option<ElementId> {
        let list = match parent {
            Some(p) => &self.elements[p.index()].children,
            None => &self.roots,
        };
        list.binary_search_by(|c| self.elements[c.index()].sort_key().cmp(&(kind, signature)))
            .ok()
            .map(|i| list[i])
    }

    /// Record a typed use site. The inverse entry on the target is
    /// maintained automatically.
    pub fn add_reference(&mut self, source: ElementId, kind: ReferenceKind, target: ElementId) {
        self.references.entry(source).or_default().insert(Reference {
            kind,
            element: target,
        });
        self.referencing.entry(target).or_default().insert(Reference {
            kind,
            element: source,
        });
    }

    /// Outgoing use sites of `source`.
    pub fn references(&self, source: ElementId) -> impl Iterator<Item = Reference> + '_ {
        self.references
            .get(&source)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Use sites targeting `target` (the inverse edges).
    pub fn referencing(&self, target: ElementId) -> impl Iterator<Item = Reference> + '_ {
        self.referencing
            .get(&target)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn set_in_api(&mut self, id: ElementId, in_api: bool) {
        self.elements[id.index()].in_api = in_api;
    }

    pub fn set_in_api_through_use(&mut self, id: ElementId, through_use: bool) {
        self.elements[id.index()].in_api_through_use = through_use;
    }

    /// Total order over elements of this forest: kind first, then
    /// signature, parents before their subtrees play no role here.
    pub fn compare(&self, a: ElementId, b: ElementId) -> Ordering {
        self.elements[a.index()]
            .sort_key()
            .cmp(&self.elements[b.index()].sort_key())
    }

    pub fn snapshot(&self, id: ElementId) -> ElementSnapshot {
        let element = &self.elements[id.index()];
        ElementSnapshot {
            kind: element.kind.clone(),
            signature: element.signature.clone(),
            display: element.display.clone(),
            archive: element
                .archive
                .map(|a| self.archives[a.index()].name.clone()),
        }
    }

    /// Lazy depth-first enumeration. Starts at `from` (its children; the
    /// element itself is not yielded) or at the roots when `from` is
    /// `None`. With `recursive` false only one level is enumerated; `kind`
    /// restricts the yielded elements without stopping the descent.
    pub fn stream<'a>(
        &'a self,
        from: Option<ElementId>,
        kind: Option<&'a ElementKind>,
        recursive: bool,
    ) -> impl Iterator<Item = ElementId> + 'a {
        let initial: Vec<ElementId> = match from {
            Some(id) => self.elements[id.index()].children.clone(),
            None => self.roots.clone(),
        };
        DepthFirst {
            forest: self,
            stack: initial.into_iter().rev().collect(),
            kind,
            recursive,
        }
    }

    /// Remove supplementary elements not reachable from any primary
    /// element through moving-to-api use sites; see
    /// [`ReferenceKind::moves_to_api`].
    ///
    /// Retained supplementary elements are flagged as in-api-through-use.
    /// An element retained through an `is-inherited` use site takes over
    /// the archive of the inheriting element. Pruning an already pruned
    /// forest changes nothing.
    pub fn prune_supplementary(&mut self) {
        let is_supplementary: Vec<bool> = self
            .elements
            .iter()
            .map(|e| match e.archive {
                Some(a) => self.archives[a.index()].role == ArchiveRole::Supplementary,
                None => false,
            })
            .collect();

        let mut retained: BTreeSet<ElementId> = BTreeSet::new();
        let mut queue: VecDeque<ElementId> = VecDeque::new();
        for index in 0..self.elements.len() {
            if !is_supplementary[index] {
                let id = ElementId::from_index(index);
                retained.insert(id);
                queue.push_back(id);
            }
        }

        while let Some(source) = queue.pop_front() {
            let outgoing: Vec<Reference> = self.references(source).collect();
            for reference in outgoing {
                if !reference.kind.moves_to_api() {
                    continue;
                }
                let target = reference.element;
                if is_supplementary[target.index()]
                    && reference.kind == ReferenceKind::IsInherited
                {
                    self.elements[target.index()].archive = self.elements[source.index()].archive;
                }
                self.retain_with_ancestors(target, &is_supplementary, &mut retained, &mut queue);
            }
        }

        if retained.len() == self.elements.len() {
            return;
        }
        self.rebuild(&retained);
    }

    fn retain_with_ancestors(
        &mut self,
        id: ElementId,
        is_supplementary: &[bool],
        retained: &mut BTreeSet<ElementId>,
        queue: &mut VecDeque<ElementId>,
    ) {
        let mut current = Some(id);
        while let Some(node) = current {
            if !retained.insert(node) {
                break;
            }
            if is_supplementary[node.index()] {
                self.elements[node.index()].in_api_through_use = true;
            }
            queue.push_back(node);
            current = self.elements[node.index()].parent;
        }
    }

    /// Rebuild the arena keeping only `retained`, preserving arena order
    /// so that sibling order and ids stay deterministic.
    fn rebuild(&mut self, retained: &BTreeSet<ElementId>) {
        let mut remap: Vec<Option<ElementId>> = vec![None; self.elements.len()];
        let mut next = 0u32;
        for index in 0..self.elements.len() {
            if retained.contains(&ElementId::from_index(index)) {
                remap[index] = Some(ElementId(next));
                next += 1;
            }
        }

        let mut elements = Vec::with_capacity(next as usize);
        for (index, element) in self.elements.iter().enumerate() {
            if remap[index].is_none() {
                continue;
            }
            let mut kept = element.clone();
            kept.parent = kept.parent.and_then(|p| remap[p.index()]);
            kept.children = kept
                .children
                .iter()
                .filter_map(|c| remap[c.index()])
                .collect();
            elements.push(kept);
        }

        let roots = self
            .roots
            .iter()
            .filter_map(|r| remap[r.index()])
            .collect();

        let mut references: BTreeMap<ElementId, BTreeSet<Reference>> = BTreeMap::new();
        let mut referencing: BTreeMap<ElementId, BTreeSet<Reference>> = BTreeMap::new();
        for (source, targets) in &self.references {
            let Some(new_source) = remap[source.index()] else {
                continue;
            };
            for reference in targets {
                let Some(new_target) = remap[reference.element.index()] else {
                    continue;
                };
                references.entry(new_source).or_default().insert(Reference {
                    kind: reference.kind,
                    element: new_target,
                });
                referencing.entry(new_target).or_default().insert(Reference {
                    kind: reference.kind,
                    element: new_source,
                });
            }
        }

        self.elements = elements;
        self.roots = roots;
        self.references = references;
        self.referencing = referencing;
    }
}

/// Upper-bound insertion position keeping `list` sorted by sort key.
fn sorted_position(arena: &[Element], list: &[ElementId], element: &Element) -> usize {
    let key = element.sort_key();
    let mut lo = 0;
    let mut hi = list.len();
    while lo < hi {
        let mid = (lo + hi) / 2;
        if arena[list[mid].index()].sort_key() <= key {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

struct DepthFirst<'a> {
    forest: &'a Forest,
    stack: Vec<ElementId>,
    kind: Option<&'a ElementKind>,
    recursive: bool,
}

impl Iterator for DepthFirst<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<ElementId> {
        loop {
            let id = self.stack.pop()?;
            if self.recursive {
                let children = self.forest.children(id);
                self.stack.extend(children.iter().rev().copied());
            }
            match self.kind {
                Some(kind) if self.forest.element(id).kind() != kind => continue,
                _ => return Some(id),
            }
        }
    }
}
