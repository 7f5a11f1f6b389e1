// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// A `RingBuffer` accumulates bytes across input packets and supports in-place scanning.
///
/// Appends are amortized O(1). Consuming compacts the retained tail to the front of the buffer so
/// offset 0 always addresses the oldest unconsumed byte.
#[derive(Default)]
pub struct RingBuffer {
    buf: Vec<u8>,
}

impl RingBuffer {
    pub fn new() -> Self {
        RingBuffer { buf: Vec::new() }
    }

    /// Append the bytes of an input packet verbatim.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// View the buffered bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// The number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop the first `count` bytes and compact the tail.
    pub fn consume(&mut self, count: usize) {
        debug_assert!(count <= self.buf.len());
        self.buf.drain(..count);
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
