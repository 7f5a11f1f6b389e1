// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadenza_core::checksum::Crc8Ccitt;
use cadenza_core::io::{BitReader, Monitor};

/// The number of bytes required to attempt a frame header parse: the largest possible header
/// plus the first byte of the first subframe.
pub const FRAME_HEADER_WINDOW: usize = 17;

/// The fixed block sizes selected by the block size code. Codes 6 and 7 read an extension field
/// instead and are 0 here.
const BLOCK_SIZES: [u32; 16] =
    [0, 192, 576, 1152, 2304, 4608, 0, 0, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768];

/// The fixed sample rates selected by the sample rate code. Codes 12 to 14 read an extension
/// field instead.
const SAMPLE_RATES: [u32; 12] =
    [0, 88200, 176400, 192000, 8000, 16000, 22050, 24000, 32000, 44100, 48000, 96000];

/// The number of direct channel assignment codes. Codes below this value map a channel count
/// directly; the next three select a stereo decorrelation mode.
const DIRECT_ASSIGNMENTS: u32 = 8;
const STEREO_ASSIGNMENTS: u32 = 3;

/// A parsed and CRC-validated FLAC frame header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// The number of inter-channel samples in the frame.
    pub block_size: u32,
    /// The sample rate of the frame in Hz.
    pub sample_rate: u32,
    /// The channel assignment code. Values 0 to 7 select a direct layout of `code + 1` channels.
    /// The stereo decorrelation assignments (left/side, right/side, and mid/side) are normalized
    /// to the two channel code.
    pub channel_assignment: u32,
}

/// Attempt to parse a FLAC frame header from the start of `buf`.
///
/// The window must be at least [`FRAME_HEADER_WINDOW`] bytes. A frame with the blocking-dependent
/// sample rate code inherits `stream_rate`. Returns `None` if the window does not hold a valid
/// header: a sync code mismatch, a reserved field value, a malformed coded frame number, a CRC-8
/// mismatch, or an illegal first subframe all reject the candidate.
pub fn parse_frame_header(buf: &[u8], stream_rate: u32) -> Option<FrameHeader> {
    if buf.len() < FRAME_HEADER_WINDOW {
        return None;
    }

    let mut bs = BitReader::new(buf);

    if bs.read_bits(15) != 0x7ffc {
        return None;
    }

    let _blocking_strategy = bs.read_bits(1);

    let block_size_enc = bs.read_bits(4);
    if block_size_enc == 0 {
        return None;
    }

    let sample_rate_enc = bs.read_bits(4);
    if sample_rate_enc == 0xf {
        return None;
    }

    let mut channel_assignment = bs.read_bits(4);
    if channel_assignment >= DIRECT_ASSIGNMENTS {
        if channel_assignment < DIRECT_ASSIGNMENTS + STEREO_ASSIGNMENTS {
            channel_assignment = 1;
        }
        else {
            return None;
        }
    }

    let bits_per_sample_enc = bs.read_bits(3);
    if bits_per_sample_enc == 3 {
        return None;
    }

    if bs.read_bits(1) != 0 {
        return None;
    }

    // The frame or sample number is coded with an extended UTF-8 scheme of up-to 7 bytes. Only
    // its well-formedness matters here; the value itself is not used for reframing.
    let mut num = u64::from(bs.read_u8());
    let mut top = (num & 0x80) >> 1;

    if (num & 0xc0) == 0x80 || num >= 0xfe {
        return None;
    }

    while num & top != 0 {
        let cont = u64::from(bs.read_u8());
        if (cont & 0xc0) != 0x80 {
            return None;
        }
        num = (num << 6) | (cont & 0x3f);
        top <<= 5;
    }

    let block_size = match block_size_enc {
        6 => 1 + bs.read_bits(8),
        7 => 1 + bs.read_bits(16),
        _ => BLOCK_SIZES[block_size_enc as usize],
    };

    let sample_rate = match sample_rate_enc {
        0x0 => stream_rate,
        0xc => 1000 * bs.read_bits(8),
        0xd => bs.read_bits(16),
        0xe => 10 * bs.read_bits(16),
        _ => SAMPLE_RATES[sample_rate_enc as usize],
    };

    // Sample rates are bounded to 655350 Hz by the stream information block encoding.
    if sample_rate < 1 || sample_rate > 655_350 {
        return None;
    }

    let header_len = bs.pos();

    let crc_expected = bs.read_u8();

    let mut crc8 = Crc8Ccitt::new(0);
    crc8.process_buf_bytes(&buf[..header_len]);

    if crc_expected != crc8.crc() {
        return None;
    }

    // The first byte of the first subframe discriminates many false syncs: a reserved padding
    // bit followed by a 6-bit subframe type of which only constant (0), verbatim (1), fixed
    // (8 to 12), and LPC (32 and up) are assigned.
    if bs.read_bits(1) != 0 {
        return None;
    }

    let subframe_type = bs.read_bits(6);
    match subframe_type {
        0 | 1 | 8..=12 | 32.. => (),
        _ => return None,
    }

    if bs.is_overflow() {
        return None;
    }

    Some(FrameHeader { block_size, sample_rate, channel_assignment })
}
