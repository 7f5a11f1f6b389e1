// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A FLAC (Free Lossless Audio Codec) reframer filter.
//!
//! The reframer consumes a byte stream carrying a FLAC bitstream, either a raw FLAC file or
//! unframed packetized FLAC data, and emits one framed packet per FLAC audio frame, annotated
//! with a presentation timestamp, a duration, and a decoder configuration record. The bitstream
//! is never decoded.

mod frame;
mod index;
mod meta;
mod reframer;
mod ring;

#[cfg(test)]
mod testutil;

pub use frame::FrameHeader;
pub use index::{IndexEntry, SeekIndex};
pub use meta::StreamInfo;
pub use reframer::{FlacReframer, ReframerOptions};
