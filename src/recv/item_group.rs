//! Consumer-side view folding heaps into the latest value per item.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    byte_order::read_network_uint,
    descriptor::{Descriptor, FormatField},
    heap::{Heap, Item},
    packet::ItemId,
};

/// One decoded element of an item.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// Unsigned integer (`u`).
    Unsigned(u64),
    /// Signed integer (`i`).
    Signed(i64),
    /// IEEE float (`f`), widened to 64 bits.
    Float(f64),
    /// Boolean (`b`).
    Bool(bool),
    /// Character (`c`).
    Char(char),
}

/// Decode `data` as a sequence of elements described by `descriptor`.
///
/// Fields of multi-field formats are returned interleaved, element by
/// element. Returns `None` when the format uses unsupported codes or
/// widths, or when `data` is not a whole number of elements. Immediate
/// items are padded to the address width; their trailing bytes are used.
#[must_use]
pub fn decode_values(descriptor: &Descriptor, item: &Item) -> Option<Vec<Value>> {
    let format = descriptor.format();
    if format.is_empty() || format.iter().any(|field| field.bits % 8 != 0) {
        return None;
    }
    let element = usize::try_from(descriptor.element_bits() / 8).ok()?;
    let mut data: &[u8] = item.data();
    if item.immediate().is_some() && data.len() > element {
        data = &data[data.len() - element..];
    }
    if element == 0 || data.len() % element != 0 {
        return None;
    }
    let mut values = Vec::with_capacity(data.len() / element * format.len());
    for chunk in data.chunks_exact(element) {
        let mut at = 0;
        for field in format {
            let width = (field.bits / 8) as usize;
            values.push(decode_field(*field, &chunk[at..at + width])?);
            at += width;
        }
    }
    Some(values)
}

fn decode_field(field: FormatField, bytes: &[u8]) -> Option<Value> {
    let raw = read_network_uint(bytes)?;
    match (field.code, field.bits) {
        ('u', 8..=64) => Some(Value::Unsigned(raw)),
        ('i', 8..=64) => {
            let shift = 64 - field.bits;
            #[expect(
                clippy::cast_possible_wrap,
                reason = "reinterpreting the sign-extended bit pattern is the intent"
            )]
            let signed = ((raw << shift) as i64) >> shift;
            Some(Value::Signed(signed))
        }
        ('f', 32) => u32::try_from(raw)
            .ok()
            .map(|bits| Value::Float(f64::from(f32::from_bits(bits)))),
        ('f', 64) => Some(Value::Float(f64::from_bits(raw))),
        ('b', 8) => Some(Value::Bool(raw != 0)),
        ('c', 8) => u8::try_from(raw).ok().map(|byte| Value::Char(char::from(byte))),
        _ => None,
    }
}

/// Latest item values and descriptors seen across a stream.
///
/// # Examples
///
/// ```no_run
/// use heapwire::{ItemId, recv::{ItemGroup, Popped, Value}};
///
/// # async fn demo(receiver: heapwire::recv::HeapReceiver) {
/// let mut group = ItemGroup::new();
/// while let Popped::Item(heap) = receiver.pop_heap().await {
///     group.update(&heap);
///     if let Some(values) = group.values(ItemId::new(0x1000)) {
///         println!("{values:?}");
///     }
/// }
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct ItemGroup {
    items: BTreeMap<ItemId, Item>,
    descriptors: BTreeMap<ItemId, Arc<Descriptor>>,
}

impl ItemGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Fold `heap` into the group. Returns the ids of the items it updated.
    pub fn update(&mut self, heap: &Heap) -> Vec<ItemId> {
        for descriptor in heap.descriptors() {
            self.descriptors
                .insert(descriptor.id(), Arc::clone(descriptor));
        }
        heap.items()
            .iter()
            .map(|item| {
                if let Some(descriptor) = item.descriptor() {
                    self.descriptors
                        .insert(item.id(), Arc::clone(descriptor));
                }
                self.items.insert(item.id(), item.clone());
                item.id()
            })
            .collect()
    }

    /// Latest raw item for `id`.
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&Item> { self.items.get(&id) }

    /// Latest descriptor for `id`.
    #[must_use]
    pub fn descriptor(&self, id: ItemId) -> Option<&Arc<Descriptor>> { self.descriptors.get(&id) }

    /// Latest raw item whose descriptor is named `name`.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Item> {
        self.descriptors
            .values()
            .find(|descriptor| descriptor.name() == name)
            .and_then(|descriptor| self.items.get(&descriptor.id()))
    }

    /// Decode the latest value of `id` using its descriptor.
    #[must_use]
    pub fn values(&self, id: ItemId) -> Option<Vec<Value>> {
        decode_values(self.descriptors.get(&id)?, self.items.get(&id)?)
    }

    /// Ids of every item seen so far, ascending.
    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ { self.items.keys().copied() }

    /// Number of distinct items seen.
    #[must_use]
    pub fn len(&self) -> usize { self.items.len() }

    /// Whether no item has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}
