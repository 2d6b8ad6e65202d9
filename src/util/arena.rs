//! Generational arena for task bookkeeping.
//!
//! Slots are reused after removal, but every reuse bumps the slot's
//! generation so a stale [`ArenaIndex`] never aliases a newer entry.

use core::fmt;

/// Index into an [`Arena`]: slot position plus the generation it was
/// allocated in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaIndex {
    index: u32,
    generation: u32,
}

impl ArenaIndex {
    /// Creates an index from raw parts.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot position.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ArenaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaIndex({}:{})", self.index, self.generation)
    }
}

#[derive(Debug)]
enum Entry<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32, next_free: Option<u32> },
}

/// A generational arena.
#[derive(Debug)]
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Creates an empty arena with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Number of occupied slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true when no slot is occupied.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the index the next [`insert`](Self::insert) will use.
    ///
    /// Lets a value carry its own identity: compute the index, build the
    /// value, then insert it while still holding `&mut self`.
    #[must_use]
    pub fn next_index(&self) -> ArenaIndex {
        match self.free_head {
            Some(slot) => {
                let generation = match self.entries.get(slot as usize) {
                    Some(Entry::Vacant { generation, .. }) => generation.wrapping_add(1),
                    _ => 0,
                };
                ArenaIndex::new(slot, generation)
            }
            None => ArenaIndex::new(u32::try_from(self.entries.len()).unwrap_or(u32::MAX), 0),
        }
    }

    /// Inserts a value and returns its index.
    pub fn insert(&mut self, value: T) -> ArenaIndex {
        let idx = self.next_index();
        match self.free_head {
            Some(slot) => {
                let next_free = match self.entries.get(slot as usize) {
                    Some(Entry::Vacant { next_free, .. }) => *next_free,
                    _ => None,
                };
                self.entries[slot as usize] = Entry::Occupied {
                    generation: idx.generation,
                    value,
                };
                self.free_head = next_free;
            }
            None => self.entries.push(Entry::Occupied {
                generation: 0,
                value,
            }),
        }
        self.len += 1;
        idx
    }

    /// Returns the value at `idx` if it is still live.
    #[must_use]
    pub fn get(&self, idx: ArenaIndex) -> Option<&T> {
        match self.entries.get(idx.index as usize)? {
            Entry::Occupied { generation, value } if *generation == idx.generation => Some(value),
            _ => None,
        }
    }

    /// Returns the value at `idx` mutably if it is still live.
    pub fn get_mut(&mut self, idx: ArenaIndex) -> Option<&mut T> {
        match self.entries.get_mut(idx.index as usize)? {
            Entry::Occupied { generation, value } if *generation == idx.generation => Some(value),
            _ => None,
        }
    }

    /// Returns true if `idx` refers to a live entry.
    #[must_use]
    pub fn contains(&self, idx: ArenaIndex) -> bool {
        self.get(idx).is_some()
    }

    /// Removes and returns the value at `idx`.
    pub fn remove(&mut self, idx: ArenaIndex) -> Option<T> {
        let entry = self.entries.get_mut(idx.index as usize)?;
        match entry {
            Entry::Occupied { generation, .. } if *generation == idx.generation => {}
            _ => return None,
        }
        let old = std::mem::replace(
            entry,
            Entry::Vacant {
                generation: idx.generation,
                next_free: self.free_head,
            },
        );
        self.free_head = Some(idx.index);
        self.len -= 1;
        match old {
            Entry::Occupied { value, .. } => Some(value),
            Entry::Vacant { .. } => None,
        }
    }

    /// Iterates over live entries.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaIndex, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| match entry {
                Entry::Occupied { generation, value } => {
                    let slot = u32::try_from(slot).ok()?;
                    Some((ArenaIndex::new(slot, *generation), value))
                }
                Entry::Vacant { .. } => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn stale_index_does_not_alias_reused_slot() {
        let mut arena = Arena::new();
        let first = arena.insert(1);
        arena.remove(first);
        let second = arena.insert(2);
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());
        assert_eq!(arena.get(first), None);
        assert_eq!(arena.get(second), Some(&2));
        assert_eq!(arena.remove(first), None);
    }

    #[test]
    fn next_index_predicts_insert() {
        let mut arena = Arena::new();
        let predicted = arena.next_index();
        assert_eq!(arena.insert(predicted), predicted);
        arena.remove(predicted);
        let reused = arena.next_index();
        assert_eq!(reused.index(), predicted.index());
        assert_eq!(arena.insert(reused), reused);
        assert_eq!(arena.get(reused), Some(&reused));
    }

    #[test]
    fn iter_skips_vacant() {
        let mut arena = Arena::with_capacity(4);
        let a = arena.insert(10);
        let _b = arena.insert(20);
        arena.remove(a);
        let values: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![20]);
        assert!(!arena.is_empty());
    }
}
