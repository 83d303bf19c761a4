/*
 * Copyright (C) 2024 The HPSC-TRCH authors
 *
 * This file is part of HPSC-TRCH (firmware core of the HPSC chiplet's trusted control processor).
 *
 * HPSC-TRCH is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License version 2 as
 * published by the Free Software Foundation.
 *
 * HPSC-TRCH is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
 * General Public License version 2 for more details.
 */

use core::fmt;

use crate::errors::{Code, Error};

/// Identifies an object in a [`Pool`]
///
/// The id carries the generation of its slot. Once the object has been freed, the slot's
/// generation changes so that stale ids no longer resolve, even if the slot has been reused.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct PoolId {
    idx: u16,
    gen: u16,
}

impl PoolId {
    /// Returns the slot index
    pub fn index(self) -> usize {
        self.idx as usize
    }

    /// Returns the generation
    pub fn generation(self) -> u16 {
        self.gen
    }

    /// Packs the id into a single word (e.g., to store it in an atomic)
    pub fn to_raw(self) -> u32 {
        ((self.idx as u32) << 16) | self.gen as u32
    }

    /// Unpacks an id previously packed with [`to_raw`](PoolId::to_raw)
    pub fn from_raw(raw: u32) -> Self {
        Self {
            idx: (raw >> 16) as u16,
            gen: raw as u16,
        }
    }
}

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.idx, self.gen)
    }
}

struct Slot<T> {
    gen: u16,
    obj: Option<T>,
}

impl<T> Slot<T> {
    const fn new() -> Self {
        Self { gen: 0, obj: None }
    }
}

/// An arena of `N` slots
pub struct Pool<T, const N: usize> {
    slots: [Slot<T>; N],
    used: usize,
}

impl<T, const N: usize> Pool<T, N> {
    /// Creates an empty pool
    pub const fn new() -> Self {
        Self {
            slots: [const { Slot::new() }; N],
            used: 0,
        }
    }

    /// Returns the number of allocated objects
    pub fn len(&self) -> usize {
        self.used
    }

    /// Returns true if no object is allocated
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Returns the number of slots
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Puts `obj` into the first free slot and returns its id
    ///
    /// Fails with [`Code::NoSpace`] if all slots are in use.
    pub fn alloc(&mut self, obj: T) -> Result<PoolId, Error> {
        let idx = self
            .slots
            .iter()
            .position(|s| s.obj.is_none())
            .ok_or_else(|| Error::new(Code::NoSpace))?;
        let slot = &mut self.slots[idx];
        slot.obj = Some(obj);
        self.used += 1;
        Ok(PoolId {
            idx: idx as u16,
            gen: slot.gen,
        })
    }

    /// Removes the object with given id from the pool and returns it
    ///
    /// Returns `None` if the id is stale.
    pub fn free(&mut self, id: PoolId) -> Option<T> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.gen != id.gen {
            return None;
        }

        let obj = slot.obj.take()?;
        slot.gen = slot.gen.wrapping_add(1);
        self.used -= 1;
        Some(obj)
    }

    /// Returns true if `id` refers to an allocated object
    pub fn contains(&self, id: PoolId) -> bool {
        self.get(id).is_some()
    }

    /// Returns a reference to the object with given id
    pub fn get(&self, id: PoolId) -> Option<&T> {
        let slot = self.slots.get(id.index())?;
        match slot.gen == id.gen {
            true => slot.obj.as_ref(),
            false => None,
        }
    }

    /// Returns a mutable reference to the object with given id
    pub fn get_mut(&mut self, id: PoolId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index())?;
        match slot.gen == id.gen {
            true => slot.obj.as_mut(),
            false => None,
        }
    }

    /// Returns an iterator over all allocated objects in slot order
    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &T)> {
        self.slots.iter().enumerate().filter_map(|(idx, s)| {
            s.obj.as_ref().map(|o| {
                (
                    PoolId {
                        idx: idx as u16,
                        gen: s.gen,
                    },
                    o,
                )
            })
        })
    }

    /// Returns the id of the object currently stored at slot `idx`
    pub fn id_at(&self, idx: usize) -> Option<PoolId> {
        let slot = self.slots.get(idx)?;
        slot.obj.as_ref().map(|_| PoolId {
            idx: idx as u16,
            gen: slot.gen,
        })
    }
}

impl<T, const N: usize> Default for Pool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
