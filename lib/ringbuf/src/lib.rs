// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Trace rings for drivers that manage several instances of a device
//!
//! A driver for a block of identical hardware units (power domains, say)
//! wants one history per unit rather than one per module, so that a
//! postmortem of a single misbehaving unit is not drowned out by its
//! neighbors. This crate provides a fixed-size ring that a driver embeds in
//! each instance it owns, plus the [`ringbuf_entry!`] macro to record into it.
//!
//! ## Constraints
//!
//! The payload type must implement both `Copy` and `PartialEq`. Entries are
//! never allocated; the ring is a plain array and can live in a `static`,
//! on the stack, or inside another struct.
//!
//! ## Creating a ring buffer
//!
//! ```
//! use ringbuf::{ringbuf_entry, Ringbuf};
//!
//! #[derive(Copy, Clone, PartialEq)]
//! enum Trace {
//!     None,
//!     Status(u32),
//! }
//!
//! let mut trace = Ringbuf::<Trace, 16>::new(Trace::None);
//! ringbuf_entry!(trace, Trace::Status(0x8000_0000));
//! ```
//!
//! When an entry is recorded with an identical payload from the same source
//! line as the most recent entry, the `count` of that entry is bumped rather
//! than consuming a new slot. A tight polling loop that records the same
//! status a thousand times therefore costs one slot.
//!
//! ## Inspecting a ring buffer
//!
//! The ring is an ordinary value: a debugger can print the instance that
//! owns it, and code can walk it with [`Ringbuf::iter`], which yields entries
//! oldest first.

#![no_std]

#[cfg(test)]
extern crate std;

/// Inserts data into a ring buffer.
///
/// `ringbuf_entry!(ring, expr)` records `expr` into `ring`, which must be a
/// place expression of type [`Ringbuf`] that can be mutably borrowed. The
/// current source line is stored alongside the payload.
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate the payload first so that it may read from the same
        // structure that owns the ring without tripping over the mutable
        // borrow below.
        let p = $payload;
        $crate::Ringbuf::entry(&mut $buf, line!() as u16, p);
    }};
}

///
/// The structure of a single [`Ringbuf`] entry, carrying a payload of arbitrary
/// type.  When a ring buffer entry is generated with an identical payload to
/// the most recent entry (in terms of both `line` and `payload`), `count` will
/// be incremented rather than generating a new entry.
///
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

///
/// A ring buffer of parametrized type and size.
///
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, { N }> {
    /// Creates an empty ring with every slot initialized to `init`.
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, payload: T) {
        // On first use `last` is None, which we treat as an out-of-range
        // index: nothing is reused and the first entry lands in slot 0.
        let last = self.last.unwrap_or(usize::MAX);

        // get_mut rather than indexing, so a corrupted `last` starts us over
        // at 0 instead of panicking.
        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                // Only reuse this entry if we don't overflow the
                // count.
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        // wrapping_add turns the usize::MAX starting condition into 0, and
        // the comparison avoids a modulus.
        let ndx = {
            let last_plus_1 = last.wrapping_add(1);
            if last_plus_1 >= self.buffer.len() {
                0
            } else {
                last_plus_1
            }
        };

        let ent = &mut self.buffer[ndx];
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };

        self.last = Some(ndx);
    }

    /// Returns the most recently recorded entry, if any.
    pub fn last_entry(&self) -> Option<&RingbufEntry<T>> {
        self.last.and_then(|ndx| self.buffer.get(ndx))
    }

    /// Iterates over recorded entries, oldest first. Slots that have never
    /// been written are skipped.
    pub fn iter(&self) -> impl Iterator<Item = &RingbufEntry<T>> + '_ {
        let start = match self.last {
            Some(last) => last.wrapping_add(1),
            None => N,
        };
        let (newer, older) = self.buffer.split_at(start.min(N));
        older
            .iter()
            .chain(newer.iter())
            .filter(|ent| ent.count != 0)
    }

    /// Iterates over recorded payloads, oldest first.
    pub fn payloads(&self) -> impl Iterator<Item = T> + '_ {
        self.iter().map(|ent| ent.payload)
    }
}
