//! Slot storage for components, buffers, and pipelines.
//!
//! Descriptor IDs are sparse and chosen by the host, so they are mapped to
//! dense slots through an ordered index. Storage grows with the number of
//! live objects, never with the size of an ID. Slots released by `remove`
//! are reused by later inserts; an ID stays a stable handle for as long as
//! its object lives.

use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};

pub(crate) struct Arena<T> {
    index: BTreeMap<u32, usize>,
    slots: Vec<Option<T>>,
    vacant: Vec<usize>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            index: BTreeMap::new(),
            slots: Vec::new(),
            vacant: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        let slot = *self.index.get(&id)?;
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        let slot = *self.index.get(&id)?;
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    /// Stores `value` under `id`.
    ///
    /// Fails with `DuplicateId` if `id` is taken and with `OutOfMemory` if
    /// the slot table cannot grow.
    pub fn insert(&mut self, id: u32, value: T) -> Result<()> {
        if self.index.contains_key(&id) {
            return Err(PipelineError::DuplicateId(id));
        }
        let slot = if let Some(slot) = self.vacant.pop() {
            self.slots[slot] = Some(value);
            slot
        } else {
            self.slots
                .try_reserve(1)
                .map_err(|_| PipelineError::OutOfMemory)?;
            self.slots.push(Some(value));
            self.slots.len() - 1
        };
        self.index.insert(id, slot);
        Ok(())
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        let slot = self.index.remove(&id)?;
        let value = self.slots.get_mut(slot)?.take();
        self.vacant.push(slot);
        value
    }

    /// Mutable access to two distinct objects at once.
    pub fn pair_mut(&mut self, a: u32, b: u32) -> Option<(&mut T, &mut T)> {
        let (a, b) = (*self.index.get(&a)?, *self.index.get(&b)?);
        if a == b {
            return None;
        }
        if a < b {
            let (lo, hi) = self.slots.split_at_mut(b);
            Some((lo[a].as_mut()?, hi[0].as_mut()?))
        } else {
            let (lo, hi) = self.slots.split_at_mut(a);
            Some((hi[0].as_mut()?, lo[b].as_mut()?))
        }
    }

    /// Live objects in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.index
            .values()
            .filter_map(|&slot| self.slots.get(slot).and_then(Option::as_ref))
    }

    #[cfg(test)]
    fn capacity_slots(&self) -> usize {
        self.slots.len()
    }
}
