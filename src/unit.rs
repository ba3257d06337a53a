//! Per-unit auxiliary storage.
//!
//! Several transforms can run over the same unit and stash bookkeeping next to
//! it. Each slot is addressed by a [`Tag`], a capability token issued once per
//! purpose; two tags never alias even when they carry the same label.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

pub struct Tag<T> {
    id: u64,
    label: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T: 'static> Tag<T> {
    pub fn issue(label: &'static str) -> Self {
        Self {
            id: NEXT_TAG.fetch_add(1, Ordering::Relaxed),
            label,
            _value: PhantomData,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl<T> fmt::Debug for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({}#{})", self.label, self.id)
    }
}

#[derive(Default)]
pub struct UnitData {
    slots: HashMap<u64, Box<dyn Any>>,
}

impl UnitData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: 'static>(&self, tag: &Tag<T>) -> Option<&T> {
        self.slots.get(&tag.id).and_then(|slot| slot.downcast_ref())
    }

    pub fn get_or_default<T: Default + 'static>(&mut self, tag: &Tag<T>) -> &mut T {
        let slot = self
            .slots
            .entry(tag.id)
            .or_insert_with(|| Box::new(T::default()));
        // A tag id is only ever written through a `Tag<T>` of one `T`.
        match slot.downcast_mut() {
            Some(value) => value,
            None => unreachable!("slot {:?} holds a foreign type", tag),
        }
    }

    pub fn insert<T: 'static>(&mut self, tag: &Tag<T>, value: T) {
        self.slots.insert(tag.id, Box::new(value));
    }

    /// Removes and returns the slot, leaving the tag unset for this unit.
    pub fn take<T: 'static>(&mut self, tag: &Tag<T>) -> Option<T> {
        self.slots
            .remove(&tag.id)
            .and_then(|slot| slot.downcast().ok())
            .map(|boxed| *boxed)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for UnitData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitData")
            .field("slots", &self.slots.len())
            .finish()
    }
}
