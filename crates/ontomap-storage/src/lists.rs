//! List codec: ordered sequences encoded as chains of triples.
//!
//! Two encodings are supported:
//!
//! - **Simple list**: the owner links to the first element and every
//!   element links to its successor through the same property, so one
//!   property serves as both head link and chain link.
//! - **Referenced list**: dedicated node resources form the chain (linked
//!   by `next_node`), each node pointing at its element through
//!   `has_element`. Node identity and chain identity are decoupled.
//!
//! Both handlers run against any [`StorageConnector`], so inside a
//! transaction they read through the session's local delta. Descriptors
//! whose properties are inferred get a read-only view; inferred list
//! content is never mutated here.

use crate::connector::StorageConnector;
use ontomap_model::{
    Assertion, Axiom, NamedResource, OntoError, ReferencedListDescriptor,
    ReferencedListValueDescriptor, Result, SimpleListDescriptor, SimpleListValueDescriptor, Value,
};

fn single_successor(mut found: Vec<Axiom>, node: &NamedResource) -> Result<Option<Axiom>> {
    match found.len() {
        0 => Ok(None),
        1 => Ok(Some(found.remove(0))),
        n => Err(OntoError::consistency(format!(
            "list node <{node}> has {n} successors, expected one"
        ))),
    }
}

fn reference_of(axiom: &Axiom) -> Result<NamedResource> {
    axiom
        .value()
        .as_reference()
        .cloned()
        .ok_or_else(|| OntoError::consistency(format!("list link {axiom} must target a resource")))
}

// ============================================================================
// Simple lists
// ============================================================================

/// Restartable iterator over a simple-list chain. When the descriptor's
/// property is inferred, lookups consult inferred statements as well.
pub struct SimpleListIterator<'a, C: StorageConnector> {
    connector: &'a C,
    descriptor: &'a SimpleListDescriptor,
    cursor: NamedResource,
}

impl<'a, C: StorageConnector> SimpleListIterator<'a, C> {
    pub fn new(connector: &'a C, descriptor: &'a SimpleListDescriptor) -> Self {
        SimpleListIterator {
            connector,
            descriptor,
            cursor: descriptor.owner().clone(),
        }
    }

    pub fn restart(&mut self) {
        self.cursor = self.descriptor.owner().clone();
    }

    pub fn has_next(&self) -> Result<bool> {
        Ok(!self
            .connector
            .find(
                Some(&self.cursor),
                Some(self.descriptor.list_property()),
                None,
                self.descriptor.context(),
            )?
            .is_empty())
    }

    /// Advances by one link, returning the traversed link axiom.
    pub fn next_axiom(&mut self) -> Result<Option<Axiom>> {
        let found = self.connector.find(
            Some(&self.cursor),
            Some(self.descriptor.list_property()),
            None,
            self.descriptor.context(),
        )?;
        let Some(link) = single_successor(found, &self.cursor)? else {
            return Ok(None);
        };
        self.cursor = reference_of(&link)?;
        Ok(Some(link))
    }

    pub fn next_node(&mut self) -> Result<Option<NamedResource>> {
        Ok(self.next_axiom()?.map(|_| self.cursor.clone()))
    }
}

/// Codec for [`SimpleListDescriptor`] chains.
pub struct SimpleListHandler<'a, C: StorageConnector> {
    connector: &'a C,
}

impl<'a, C: StorageConnector> SimpleListHandler<'a, C> {
    pub fn new(connector: &'a C) -> Self {
        SimpleListHandler { connector }
    }

    pub fn iterator(&self, descriptor: &'a SimpleListDescriptor) -> SimpleListIterator<'a, C> {
        SimpleListIterator::new(self.connector, descriptor)
    }

    /// Decodes the chain into its ordered elements. An empty chain decodes
    /// to an empty sequence without error.
    pub fn load(&self, descriptor: &SimpleListDescriptor) -> Result<Vec<NamedResource>> {
        let mut iter = self.iterator(descriptor);
        let mut out = Vec::new();
        while let Some(node) = iter.next_node()? {
            out.push(node);
        }
        Ok(out)
    }

    fn is_orig_empty(&self, descriptor: &SimpleListDescriptor) -> Result<bool> {
        Ok(!self.iterator(descriptor).has_next()?)
    }

    /// Encodes `descriptor.values()` over whatever chain currently exists:
    /// the shared prefix is kept, the first divergence truncates the rest
    /// of the old chain, and remaining new values are appended from the
    /// last retained node.
    pub fn persist(&self, descriptor: &SimpleListValueDescriptor) -> Result<()> {
        let base = descriptor.descriptor();
        if base.is_inferred() {
            return Err(OntoError::invalid_argument(
                "inferred list content cannot be modified",
            ));
        }
        if self.is_orig_empty(base)? {
            return self.append(base, base.owner().clone(), descriptor.values());
        }
        self.merge(descriptor)
    }

    fn merge(&self, descriptor: &SimpleListValueDescriptor) -> Result<()> {
        let base = descriptor.descriptor();
        let values = descriptor.values();
        let mut iter = self.iterator(base);
        let mut matched = 0usize;
        let mut last_node = base.owner().clone();

        while let Some(link) = iter.next_axiom()? {
            let node = reference_of(&link)?;
            if matched < values.len() && node == values[matched] {
                last_node = node;
                matched += 1;
                continue;
            }
            // Divergence (or a now-excess tail): drop this link and the
            // whole remaining old chain.
            self.remove_link(base, &link)?;
            while let Some(rest) = iter.next_axiom()? {
                self.remove_link(base, &rest)?;
            }
            break;
        }
        self.append(base, last_node, &values[matched..])
    }

    fn remove_link(&self, descriptor: &SimpleListDescriptor, link: &Axiom) -> Result<()> {
        self.connector
            .remove(std::slice::from_ref(link), descriptor.context())
    }

    fn append(
        &self,
        descriptor: &SimpleListDescriptor,
        mut previous: NamedResource,
        items: &[NamedResource],
    ) -> Result<()> {
        let mut axioms = Vec::with_capacity(items.len());
        for item in items {
            axioms.push(Axiom::new(
                previous,
                descriptor.list_property().clone(),
                Value::Reference(item.clone()),
            ));
            previous = item.clone();
        }
        self.connector.add(&axioms, descriptor.context())
    }
}

// ============================================================================
// Referenced lists
// ============================================================================

/// One traversed entry of a referenced list: the chain node, the link that
/// reached it, and the content axiom carrying its element.
pub struct ReferencedListEntry {
    pub node: NamedResource,
    pub link: Axiom,
    pub content: Axiom,
    pub element: NamedResource,
}

/// Restartable iterator over a referenced-list chain.
pub struct ReferencedListIterator<'a, C: StorageConnector> {
    connector: &'a C,
    descriptor: &'a ReferencedListDescriptor,
    cursor: NamedResource,
    at_head: bool,
}

impl<'a, C: StorageConnector> ReferencedListIterator<'a, C> {
    pub fn new(connector: &'a C, descriptor: &'a ReferencedListDescriptor) -> Self {
        ReferencedListIterator {
            connector,
            descriptor,
            cursor: descriptor.owner().clone(),
            at_head: true,
        }
    }

    pub fn restart(&mut self) {
        self.cursor = self.descriptor.owner().clone();
        self.at_head = true;
    }

    fn link_property(&self) -> &Assertion {
        if self.at_head {
            self.descriptor.list_property()
        } else {
            self.descriptor.next_node()
        }
    }

    pub fn has_next(&self) -> Result<bool> {
        Ok(!self
            .connector
            .find(
                Some(&self.cursor),
                Some(self.link_property()),
                None,
                self.descriptor.context(),
            )?
            .is_empty())
    }

    pub fn next_entry(&mut self) -> Result<Option<ReferencedListEntry>> {
        let found = self.connector.find(
            Some(&self.cursor),
            Some(self.link_property()),
            None,
            self.descriptor.context(),
        )?;
        let Some(link) = single_successor(found, &self.cursor)? else {
            return Ok(None);
        };
        let node = reference_of(&link)?;

        let contents = self.connector.find(
            Some(&node),
            Some(self.descriptor.has_element()),
            None,
            self.descriptor.context(),
        )?;
        let content = single_successor(contents, &node)?.ok_or_else(|| {
            OntoError::consistency(format!("list node <{node}> carries no element"))
        })?;
        let element = reference_of(&content)?;

        self.cursor = node.clone();
        self.at_head = false;
        Ok(Some(ReferencedListEntry {
            node,
            link,
            content,
            element,
        }))
    }
}

/// Codec for [`ReferencedListDescriptor`] chains. Node resources are
/// derived from the owner and the node position.
pub struct ReferencedListHandler<'a, C: StorageConnector> {
    connector: &'a C,
}

impl<'a, C: StorageConnector> ReferencedListHandler<'a, C> {
    pub fn new(connector: &'a C) -> Self {
        ReferencedListHandler { connector }
    }

    pub fn iterator(
        &self,
        descriptor: &'a ReferencedListDescriptor,
    ) -> ReferencedListIterator<'a, C> {
        ReferencedListIterator::new(self.connector, descriptor)
    }

    pub fn load(&self, descriptor: &ReferencedListDescriptor) -> Result<Vec<NamedResource>> {
        let mut iter = self.iterator(descriptor);
        let mut out = Vec::new();
        while let Some(entry) = iter.next_entry()? {
            out.push(entry.element);
        }
        Ok(out)
    }

    fn node_at(owner: &NamedResource, position: usize) -> NamedResource {
        NamedResource::new(format!("{}-SEQ_{}", owner.as_str(), position))
    }

    /// Encodes `descriptor.values()` over the existing chain. Matching
    /// positions reuse their node (only the content axiom is swapped when
    /// the element changed); excess trailing nodes are removed together
    /// with their links; missing tail nodes are appended from the last
    /// retained node.
    pub fn persist(&self, descriptor: &ReferencedListValueDescriptor) -> Result<()> {
        let base = descriptor.descriptor();
        if base.is_inferred() {
            return Err(OntoError::invalid_argument(
                "inferred list content cannot be modified",
            ));
        }
        let values = descriptor.values();
        let context = base.context();
        let mut iter = self.iterator(base);
        let mut position = 0usize;
        let mut last_node = base.owner().clone();

        while let Some(entry) = iter.next_entry()? {
            if position < values.len() {
                if entry.element != values[position] {
                    // Node reuse: rewrite the content, keep the chain.
                    self.connector
                        .remove(std::slice::from_ref(&entry.content), context)?;
                    let fresh = Axiom::new(
                        entry.node.clone(),
                        base.has_element().clone(),
                        Value::Reference(values[position].clone()),
                    );
                    self.connector.add(std::slice::from_ref(&fresh), context)?;
                }
                last_node = entry.node;
                position += 1;
            } else {
                // Truncate the excess tail, links and contents both.
                self.remove_entry(base, &entry)?;
                while let Some(rest) = iter.next_entry()? {
                    self.remove_entry(base, &rest)?;
                }
                break;
            }
        }

        self.append(base, last_node, position, values)
    }

    fn remove_entry(
        &self,
        descriptor: &ReferencedListDescriptor,
        entry: &ReferencedListEntry,
    ) -> Result<()> {
        self.connector.remove(
            &[entry.link.clone(), entry.content.clone()],
            descriptor.context(),
        )
    }

    fn append(
        &self,
        descriptor: &ReferencedListDescriptor,
        mut previous: NamedResource,
        start: usize,
        values: &[NamedResource],
    ) -> Result<()> {
        let mut axioms = Vec::new();
        for (position, element) in values.iter().enumerate().skip(start) {
            let node = Self::node_at(descriptor.owner(), position);
            let link_property = if position == 0 {
                descriptor.list_property()
            } else {
                descriptor.next_node()
            };
            axioms.push(Axiom::new(
                previous,
                link_property.clone(),
                Value::Reference(node.clone()),
            ));
            axioms.push(Axiom::new(
                node.clone(),
                descriptor.has_element().clone(),
                Value::Reference(element.clone()),
            ));
            previous = node;
        }
        self.connector.add(&axioms, descriptor.context())
    }
}
