// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module provides audio-specific value types.

use bitflags::bitflags;

bitflags! {
    /// A bitmask representing positional audio channels.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ChannelLayout: u64 {
        /// Front-left (left) channel.
        const FRONT_LEFT   = 1 << 0;
        /// Front-right (right) channel.
        const FRONT_RIGHT  = 1 << 1;
        /// Front-center (center) or the Mono channel.
        const FRONT_CENTER = 1 << 2;
        /// Low-frequency effects (LFE) channel.
        const LFE1         = 1 << 3;
        /// Rear-left (left surround) channel.
        const REAR_LEFT    = 1 << 4;
        /// Rear-right (right surround) channel.
        const REAR_RIGHT   = 1 << 5;
        /// Rear-center channel.
        const REAR_CENTER  = 1 << 6;
        /// Side-left channel.
        const SIDE_LEFT    = 1 << 7;
        /// Side-right channel.
        const SIDE_RIGHT   = 1 << 8;
    }
}

impl ChannelLayout {
    /// Gets the number of channels in the layout.
    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }
}
