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

/// A bounded first-in-first-out queue with room for `N` items
pub struct RingBuf<T, const N: usize> {
    items: [Option<T>; N],
    head: usize,
    len: usize,
}

impl<T, const N: usize> RingBuf<T, N> {
    /// Creates an empty ring buffer
    pub const fn new() -> Self {
        Self {
            items: [const { None }; N],
            head: 0,
            len: 0,
        }
    }

    /// Returns the number of items in the ring buffer
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the maximum number of items
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Returns true if there are no items
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if no further item fits
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Appends `item` at the tail
    ///
    /// If the ring buffer is full, the item is handed back as the error.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        if self.is_full() {
            return Err(item);
        }

        let tail = (self.head + self.len) % N;
        self.items[tail] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the item at the head
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let item = self.items[self.head].take();
        self.head = (self.head + 1) % N;
        self.len -= 1;
        item
    }

    /// Returns a reference to the item at the head without removing it
    pub fn front(&self) -> Option<&T> {
        match self.is_empty() {
            true => None,
            false => self.items[self.head].as_ref(),
        }
    }

    /// Removes all items
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }
}

impl<T, const N: usize> Default for RingBuf<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for RingBuf<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut l = f.debug_list();
        for i in 0..self.len {
            l.entry(&self.items[(self.head + i) % N]);
        }
        l.finish()
    }
}
