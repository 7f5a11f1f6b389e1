// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadenza_core::errors::{bad_bitstream_error, Result};
use cadenza_core::io::{BitReader, BufReader};
use cadenza_core::units::Fraction64;

use log::debug;

/// The FLAC start of stream marker: "fLaC" in ASCII.
pub const FLAC_STREAM_MARKER: [u8; 4] = *b"fLaC";

/// The stream information metadata block type.
const BLOCK_TYPE_STREAM_INFO: u8 = 0;

/// The subset of a STREAMINFO metadata block a reframer needs.
#[derive(Clone, Debug, Default)]
pub struct StreamInfo {
    /// The minimum and maximum number of samples per block of audio.
    pub block_len_min: u16,
    pub block_len_max: u16,
    /// The sample rate in Hz.
    pub sample_rate: u32,
    /// The number of audio channels.
    pub channels: u32,
    /// The number of bits per sample.
    pub bits_per_sample: u32,
    /// The total number of samples in the stream, or 0 if unknown.
    pub n_samples: u64,
}

impl StreamInfo {
    /// The samples per frame when the stream uses a fixed block size, or 0 when variable.
    pub fn fixed_block_len(&self) -> u32 {
        if self.block_len_min == self.block_len_max {
            u32::from(self.block_len_min)
        }
        else {
            0
        }
    }

    /// The total stream duration as a sample count over the sample rate.
    pub fn duration(&self) -> Fraction64 {
        Fraction64::new(self.n_samples, self.sample_rate)
    }

    fn read(reader: &mut BufReader<'_>) -> Result<StreamInfo> {
        let mut info = StreamInfo::default();

        info.block_len_min = reader.read_be_u16()?;
        info.block_len_max = reader.read_be_u16()?;

        // The encoded frame byte length bounds are not needed for reframing.
        let _frame_byte_len_min = reader.read_be_u24()?;
        let _frame_byte_len_max = reader.read_be_u24()?;

        // Sample rate (20 bits), channel count minus one (3 bits), bits per sample minus one
        // (5 bits), and the total sample count (36 bits) are packed into the next 8 bytes.
        let mut bs = BitReader::new(reader.read_buf_bytes_ref(8)?);

        info.sample_rate = bs.read_bits(20);
        info.channels = 1 + bs.read_bits(3);
        info.bits_per_sample = 1 + bs.read_bits(5);
        info.n_samples = bs.read_bits_64(36);

        if info.sample_rate < 1 || info.sample_rate > 655_350 {
            return bad_bitstream_error("flac: stream sample rate out of bounds");
        }

        // The MD5 of the decoded audio is ignored.
        reader.ignore_bytes(16)?;

        Ok(info)
    }
}

/// The parsed start of a FLAC stream.
pub struct StreamHeader {
    /// Settings from the mandatory STREAMINFO block.
    pub info: StreamInfo,
    /// The byte length of the stream marker plus all metadata blocks. The decoder configuration
    /// record is the byte range from just after the marker through `header_len`.
    pub header_len: usize,
}

/// Parse the FLAC stream marker and all metadata blocks from the start of `buf`.
///
/// The buffer must hold the complete metadata region. All block types other than STREAMINFO are
/// skipped by length.
pub fn read_stream_header(buf: &[u8]) -> Result<StreamHeader> {
    let mut reader = BufReader::new(buf);

    let marker = reader.read_be_u32()?;
    if marker.to_be_bytes() != FLAC_STREAM_MARKER {
        return bad_bitstream_error("flac: missing stream marker");
    }

    let mut info = None;

    loop {
        let desc = reader.read_u8()?;

        let is_last = (desc & 0x80) != 0;
        let block_type = desc & 0x7f;
        let block_len = reader.read_be_u24()?;

        if block_type == BLOCK_TYPE_STREAM_INFO {
            let start = reader.pos();
            info = Some(StreamInfo::read(&mut reader)?);

            // Tolerate blocks longer than the fields parsed above.
            let read = reader.pos() - start;
            if (block_len as usize) > read {
                reader.ignore_bytes(u64::from(block_len) - read as u64)?;
            }
        }
        else {
            debug!("skipping metadata block type {} of {} bytes", block_type, block_len);
            reader.ignore_bytes(u64::from(block_len))?;
        }

        if is_last {
            break;
        }
    }

    match info {
        Some(info) => Ok(StreamHeader { info, header_len: reader.pos() }),
        None => bad_bitstream_error("flac: missing stream info block"),
    }
}
