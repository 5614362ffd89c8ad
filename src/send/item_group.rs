//! Producer-side item state and incremental heap generation.
//!
//! An [`ItemGroup`] holds the descriptor and current value of every item a
//! sender publishes. Each value assignment bumps a version. A
//! [`HeapGenerator`] remembers which descriptors and versions it already
//! emitted and packs only what changed into the next heap, re-sending
//! descriptors every `descriptor_frequency` heaps so late joiners learn
//! them.

use std::{
    collections::{BTreeMap, HashMap},
    num::NonZeroU64,
};

use tracing::debug;

use crate::{
    descriptor::Descriptor,
    heap::{BuildError, HeapBuilder, ItemValue, SendHeap},
    packet::ItemId,
};

#[derive(Clone, Debug)]
struct Entry {
    descriptor: Descriptor,
    descriptor_version: u64,
    value: Option<ItemValue>,
    version: u64,
}

/// Descriptors and latest values of the items a sender publishes.
///
/// Versions come from one counter shared by the whole group, so replacing an
/// item never reuses a version a generator has already seen.
///
/// # Examples
///
/// ```
/// use heapwire::{Descriptor, FormatField, ItemId, send::{HeapGenerator, ItemGroup}};
///
/// let id = ItemId::new(0x1000);
/// let mut group = ItemGroup::new();
/// group
///     .add_item(Descriptor::new(id, "cat").with_format(vec![FormatField::new('u', 32)]))
///     .expect("unreserved id");
/// group.set_value(id, 0xDEAD_BEEF_u32.to_be_bytes().to_vec()).expect("known id");
///
/// let mut generator = HeapGenerator::new();
/// let first = generator.get_heap(&group).expect("valid group");
/// assert_eq!(first.items().len(), 1);
/// assert_eq!(first.descriptors().len(), 1);
///
/// // Nothing changed since.
/// let second = generator.get_heap(&group).expect("valid group");
/// assert!(second.items().is_empty() && second.descriptors().is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct ItemGroup {
    entries: BTreeMap<ItemId, Entry>,
    next_version: u64,
}

impl ItemGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    /// Register an item by its descriptor.
    ///
    /// Registering an id again replaces its descriptor and clears its value.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ReservedItemId`] for protocol-reserved ids.
    pub fn add_item(&mut self, descriptor: Descriptor) -> Result<&mut Self, BuildError> {
        let id = descriptor.id();
        if id.is_reserved() {
            return Err(BuildError::ReservedItemId(id));
        }
        let descriptor_version = self.bump();
        self.entries.insert(
            id,
            Entry {
                descriptor,
                descriptor_version,
                value: None,
                version: descriptor_version,
            },
        );
        Ok(self)
    }

    /// Assign a new value to `id` and return its version.
    ///
    /// Assigning an identical value still counts as a change.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownItemId`] when `id` was never added, and
    /// [`BuildError::ValueSize`] when a byte value disagrees with the fixed
    /// size its descriptor implies.
    pub fn set_value(&mut self, id: ItemId, value: impl Into<ItemValue>) -> Result<u64, BuildError> {
        let value = value.into();
        let entry = self.entries.get(&id).ok_or(BuildError::UnknownItemId(id))?;
        if let (ItemValue::Bytes(bytes), Some(expected)) = (&value, entry.descriptor.item_size()) {
            let actual = bytes.len() as u64;
            if actual != expected {
                return Err(BuildError::ValueSize {
                    id,
                    expected,
                    actual,
                });
            }
        }
        let version = self.bump();
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.value = Some(value);
            entry.version = version;
        }
        Ok(version)
    }

    /// Current value of `id`, if one was assigned.
    #[must_use]
    pub fn value(&self, id: ItemId) -> Option<&ItemValue> {
        self.entries.get(&id).and_then(|entry| entry.value.as_ref())
    }

    /// Version of the latest assignment to `id`.
    #[must_use]
    pub fn version(&self, id: ItemId) -> Option<u64> {
        self.entries
            .get(&id)
            .filter(|entry| entry.value.is_some())
            .map(|entry| entry.version)
    }

    /// Descriptor registered for `id`.
    #[must_use]
    pub fn descriptor(&self, id: ItemId) -> Option<&Descriptor> {
        self.entries.get(&id).map(|entry| &entry.descriptor)
    }

    /// Registered ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ { self.entries.keys().copied() }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Which descriptors or values a generated heap carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    /// Only those the generator has not emitted in their current form.
    #[default]
    Stale,
    /// All of them.
    All,
    /// None of them.
    Skip,
}

#[derive(Clone, Copy, Debug, Default)]
struct Emitted {
    descriptor_version: Option<u64>,
    descriptor_heap: u64,
    value_version: Option<u64>,
}

/// Turns successive states of an [`ItemGroup`] into heaps.
///
/// The generator owns no items; one group may feed several generators, for
/// example one per destination stream.
#[derive(Clone, Debug, Default)]
pub struct HeapGenerator {
    descriptor_frequency: Option<NonZeroU64>,
    heaps: u64,
    emitted: HashMap<ItemId, Emitted>,
}

impl HeapGenerator {
    /// A generator that sends each descriptor once, until it changes.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Also re-send every descriptor once `frequency` heaps have been
    /// generated since it last went out.
    #[must_use]
    pub fn with_descriptor_frequency(mut self, frequency: NonZeroU64) -> Self {
        self.descriptor_frequency = Some(frequency);
        self
    }

    /// Heaps generated so far by [`get_heap`](Self::get_heap).
    #[must_use]
    pub const fn heaps_generated(&self) -> u64 { self.heaps }

    /// Next heap: stale descriptors plus values changed since the last heap.
    ///
    /// The result may be empty when nothing changed.
    ///
    /// # Errors
    ///
    /// Propagates [`BuildError`] from the underlying [`HeapBuilder`].
    pub fn get_heap(&mut self, group: &ItemGroup) -> Result<SendHeap, BuildError> {
        self.get_heap_with(group, Selection::Stale, Selection::Stale)
    }

    /// Next heap with explicit descriptor and value selection.
    ///
    /// # Errors
    ///
    /// Propagates [`BuildError`] from the underlying [`HeapBuilder`].
    pub fn get_heap_with(
        &mut self,
        group: &ItemGroup,
        descriptors: Selection,
        values: Selection,
    ) -> Result<SendHeap, BuildError> {
        let index = self.heaps;
        self.heaps += 1;
        self.emitted.retain(|id, _| group.entries.contains_key(id));

        let mut builder = HeapBuilder::new();
        for (&id, entry) in &group.entries {
            let emitted = self.emitted.entry(id).or_default();
            let send_descriptor = match descriptors {
                Selection::All => true,
                Selection::Skip => false,
                Selection::Stale => {
                    emitted.descriptor_version != Some(entry.descriptor_version)
                        || self
                            .descriptor_frequency
                            .is_some_and(|every| index - emitted.descriptor_heap >= every.get())
                }
            };
            if send_descriptor {
                builder.add_descriptor(entry.descriptor.clone());
                emitted.descriptor_version = Some(entry.descriptor_version);
                emitted.descriptor_heap = index;
            }

            let Some(value) = &entry.value else {
                continue;
            };
            let send_value = match values {
                Selection::All => true,
                Selection::Skip => false,
                Selection::Stale => emitted.value_version != Some(entry.version),
            };
            if send_value {
                builder.add_item(id, value.clone())?;
                emitted.value_version = Some(entry.version);
            }
        }
        let heap = builder.build();
        debug!(
            heap = index,
            items = heap.items().len(),
            descriptors = heap.descriptors().len(),
            "heap generated"
        );
        Ok(heap)
    }

    /// A heap announcing the start of the stream. Generator state is
    /// unchanged.
    #[must_use]
    pub fn get_start(&self) -> SendHeap {
        let mut builder = HeapBuilder::new();
        builder.mark_start();
        builder.build()
    }

    /// A heap carrying only the end-of-stream marker. Generator state is
    /// unchanged.
    #[must_use]
    pub fn get_end(&self) -> SendHeap { SendHeap::end_of_stream() }
}
