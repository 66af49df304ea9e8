//! Generational slot table.
//!
//! # The stale-handle problem (for beginners)
//!
//! A table that hands out plain indices has a classic bug: entry 3 is
//! removed, a new entry reuses slot 3, and a caller still holding the old
//! index now operates on the wrong entry.  Every slot here carries a
//! generation counter that is bumped when the slot is vacated.  A [`Key`]
//! records the generation it was issued with, so an old key no longer
//! matches and every lookup with it misses.
//!
//! ```text
//! insert(a) -> Key{index: 0, gen: 0}
//! remove(Key{0,0})                     slot 0 gen -> 1, free list [0]
//! insert(b) -> Key{index: 0, gen: 1}
//! get(Key{0,0}) -> None               stale
//! ```

use std::fmt;

/// Token for an entry of a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    index: u32,
    generation: u32,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot vector with a free list and per-slot generations.
///
/// Not synchronised; owners wrap it in whatever lock already guards the
/// state it belongs to.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> HandleTable<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `value` and returns its key.
    pub fn insert(&mut self, value: T) -> Key {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Key {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Key {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, key: Key) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    /// Removes the entry.  Returns `None` for a stale or unknown key.
    pub fn remove(&mut self, key: Key) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let value = slot.value.take()?;
        self.vacate(key.index);
        Some(value)
    }

    /// Removes every entry for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(Key, &T) -> bool) -> Vec<T> {
        let mut removed = Vec::new();
        for index in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            let key = Key {
                index: index as u32,
                generation: slot.generation,
            };
            let drop_it = matches!(&slot.value, Some(value) if !keep(key, value));
            if drop_it {
                if let Some(value) = slot.value.take() {
                    removed.push(value);
                    self.vacate(index as u32);
                }
            }
        }
        removed
    }

    /// Removes and returns every entry.
    pub fn drain(&mut self) -> Vec<T> {
        self.retain(|_, _| false)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn vacate(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
