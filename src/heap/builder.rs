//! Accumulate items and descriptors into an immutable [`SendHeap`].

use std::collections::HashSet;

use super::{BuildError, ItemValue, SendHeap, SendItem};
use crate::{descriptor::Descriptor, packet::ItemId};

/// Builder for outbound heaps.
///
/// # Examples
///
/// ```
/// use heapwire::{BuildError, Descriptor, FormatField, HeapBuilder, ItemId};
///
/// let mut builder = HeapBuilder::new();
/// builder
///     .add_item(ItemId::new(0x1000), vec![0xDE, 0xAD, 0xBE, 0xEF])
///     .expect("fresh id");
/// builder.add_descriptor(
///     Descriptor::new(ItemId::new(0x1000), "first integer")
///         .with_format(vec![FormatField::new('i', 32)]),
/// );
/// assert_eq!(
///     builder.add_item(ItemId::new(0x1000), vec![0]).unwrap_err(),
///     BuildError::DuplicateItemId(ItemId::new(0x1000))
/// );
///
/// let heap = builder.build();
/// assert_eq!(heap.items().len(), 1);
/// assert_eq!(heap.descriptors().len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct HeapBuilder {
    items: Vec<SendItem>,
    ids: HashSet<ItemId>,
    descriptors: Vec<Descriptor>,
    start: bool,
    end: bool,
}

impl HeapBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append an item.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateItemId`] when `id` is already present,
    /// [`BuildError::ReservedItemId`] for protocol-reserved identifiers and
    /// [`BuildError::HeapEnded`] after [`mark_end`](Self::mark_end).
    pub fn add_item(
        &mut self,
        id: ItemId,
        value: impl Into<ItemValue>,
    ) -> Result<&mut Self, BuildError> {
        if self.end {
            return Err(BuildError::HeapEnded);
        }
        if id.is_reserved() {
            return Err(BuildError::ReservedItemId(id));
        }
        if !self.ids.insert(id) {
            return Err(BuildError::DuplicateItemId(id));
        }
        self.items.push(SendItem::new(id, value.into()));
        Ok(self)
    }

    /// Attach a descriptor to be carried in this heap.
    ///
    /// A second descriptor for the same item replaces the first.
    pub fn add_descriptor(&mut self, descriptor: Descriptor) -> &mut Self {
        match self
            .descriptors
            .iter_mut()
            .find(|existing| existing.id() == descriptor.id())
        {
            Some(existing) => *existing = descriptor,
            None => self.descriptors.push(descriptor),
        }
        self
    }

    /// Flag the heap as the first of a stream.
    pub fn mark_start(&mut self) -> &mut Self {
        self.start = true;
        self
    }

    /// Flag the heap as the stream terminator.
    ///
    /// No further items may be added afterwards.
    pub fn mark_end(&mut self) -> &mut Self {
        self.end = true;
        self
    }

    /// Number of items added so far.
    #[must_use]
    pub fn len(&self) -> usize { self.items.len() }

    /// Whether no items were added.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Freeze the accumulated state into an immutable heap.
    #[must_use]
    pub fn build(self) -> SendHeap {
        SendHeap {
            items: self.items,
            descriptors: self.descriptors,
            start: self.start,
            end: self.end,
        }
    }
}
