//! Concurrent map from item id to the latest known descriptor.
//!
//! The registry is shared between the receive path, which registers
//! descriptors as soon as their bytes arrive, and consumers, which resolve
//! item formats. Cloning a [`DescriptorRegistry`] yields another handle to
//! the same map. Lookups hand out `Arc`s, so a descriptor stays valid for
//! whoever holds it even after it is replaced.
use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};

use super::Descriptor;
use crate::packet::ItemId;

/// Outcome of [`DescriptorRegistry::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    /// No descriptor was known for the item.
    New,
    /// An identical descriptor was already registered.
    Unchanged,
    /// A different descriptor was replaced.
    Replaced,
}

/// Shared registry of descriptors keyed by [`ItemId`].
#[derive(Clone, Debug, Default)]
pub struct DescriptorRegistry(Arc<DashMap<ItemId, Arc<Descriptor>>>);

impl DescriptorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Record `descriptor`, replacing any earlier entry for the same item.
    ///
    /// Re-registering an identical descriptor leaves the stored `Arc`
    /// untouched.
    pub fn register(&self, descriptor: Descriptor) -> Registration {
        match self.0.entry(descriptor.id()) {
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(descriptor));
                Registration::New
            }
            Entry::Occupied(mut slot) => {
                if **slot.get() == descriptor {
                    Registration::Unchanged
                } else {
                    slot.insert(Arc::new(descriptor));
                    Registration::Replaced
                }
            }
        }
    }

    /// Retrieve the descriptor currently registered for `id`.
    #[must_use]
    pub fn lookup(&self, id: ItemId) -> Option<Arc<Descriptor>> {
        self.0.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered descriptors.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Forget every descriptor.
    pub fn clear(&self) { self.0.clear(); }

    /// Copy out every registered descriptor, ordered by item id.
    ///
    /// Used to replay descriptors to late joiners.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Descriptor>> {
        let mut all: Vec<_> = self.0.iter().map(|entry| Arc::clone(entry.value())).collect();
        all.sort_by_key(|descriptor| descriptor.id());
        all
    }
}
