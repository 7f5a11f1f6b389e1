// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synthetic FLAC stream construction and an in-memory host harness for tests.

use std::collections::VecDeque;

use cadenza_core::checksum::{Crc16Ansi, Crc8Ccitt};
use cadenza_core::errors::{out_of_memory_error, Result};
use cadenza_core::filter::{
    FilterHost, InputPacket, Packet, PidConfig, SourceEvent, StreamProperty, StreamType,
    CODEC_ID_FLAC,
};
use cadenza_core::io::Monitor;

/// Encode a 34-byte STREAMINFO payload.
pub fn stream_info_block(
    block_len_min: u16,
    block_len_max: u16,
    sample_rate: u32,
    channels: u32,
    bits_per_sample: u32,
    n_samples: u64,
) -> Vec<u8> {
    let mut block = Vec::new();
    block.extend_from_slice(&block_len_min.to_be_bytes());
    block.extend_from_slice(&block_len_max.to_be_bytes());
    // Frame byte length bounds, unknown.
    block.extend_from_slice(&[0; 6]);

    let packed = (u64::from(sample_rate) << 44)
        | (u64::from(channels - 1) << 41)
        | (u64::from(bits_per_sample - 1) << 36)
        | n_samples;
    block.extend_from_slice(&packed.to_be_bytes());

    // MD5 of the decoded audio.
    block.extend_from_slice(&[0; 16]);
    block
}

/// Wrap a metadata payload with a block header.
pub fn metadata_block(block_type: u8, is_last: bool, payload: &[u8]) -> Vec<u8> {
    let mut block = Vec::new();
    block.push(block_type | if is_last { 0x80 } else { 0 });
    block.extend_from_slice(&(payload.len() as u32).to_be_bytes()[1..]);
    block.extend_from_slice(payload);
    block
}

/// Build one complete FLAC frame: a header with a valid CRC-8, a verbatim first subframe byte,
/// an opaque payload, and a valid CRC-16 footer.
///
/// The frame uses block size code 12 (4096 samples), stereo, and 16 bits per sample.
pub fn frame(frame_num: u8, sample_rate_code: u8, payload: &[u8]) -> Vec<u8> {
    assert!(frame_num < 0x80);

    let mut buf = vec![0xff, 0xf8, 0xc0 | sample_rate_code, 0x18, frame_num];

    let mut crc8 = Crc8Ccitt::new(0);
    crc8.process_buf_bytes(&buf);
    buf.push(crc8.crc());

    // Verbatim subframe.
    buf.push(0x02);
    buf.extend_from_slice(payload);

    let mut crc16 = Crc16Ansi::new(0);
    crc16.process_buf_bytes(&buf);
    buf.extend_from_slice(&crc16.crc().to_be_bytes());

    buf
}

/// A deterministic frame payload without sync-alias bytes.
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (seed.wrapping_add(i as u8)) & 0x7f).collect()
}

/// A complete synthetic FLAC stream and the byte ranges that make it up.
pub struct Stream {
    /// The whole stream: marker, metadata, frames.
    pub bytes: Vec<u8>,
    /// The byte length of the marker plus metadata blocks.
    pub header_len: usize,
    /// Each frame's bytes, in order.
    pub frames: Vec<Vec<u8>>,
}

/// Build a fixed-block-size stream of stereo 4096-sample frames at 44.1kHz.
pub fn stream(n_frames: usize) -> Stream {
    stream_with(n_frames, |_| 9)
}

/// Build a stream, choosing each frame's sample rate code by frame index.
pub fn stream_with(n_frames: usize, sample_rate_code: impl Fn(usize) -> u8) -> Stream {
    let n_samples = 4096 * n_frames as u64;

    let mut bytes = b"fLaC".to_vec();
    bytes.extend_from_slice(&metadata_block(
        0,
        true,
        &stream_info_block(4096, 4096, 44100, 2, 16, n_samples),
    ));
    let header_len = bytes.len();

    let mut frames = Vec::new();
    for num in 0..n_frames {
        let frame = frame(num as u8, sample_rate_code(num), &payload(25, num as u8));
        bytes.extend_from_slice(&frame);
        frames.push(frame);
    }

    Stream { bytes, header_len, frames }
}

/// An in-memory `FilterHost` recording everything the filter does.
#[derive(Default)]
pub struct MockHost {
    pub queue: VecDeque<InputPacket>,
    pub eos: bool,
    pub sent: Vec<Packet>,
    pub props: Vec<StreamProperty>,
    pub events: Vec<SourceEvent>,
    pub out_eos: bool,
    /// Fail this many `send_packet` calls before accepting packets again.
    pub fail_sends: u32,
    /// The number of properties that had been set when the first packet was sent.
    pub props_before_first_packet: usize,
}

impl MockHost {
    pub fn new() -> Self {
        MockHost::default()
    }

    /// Queue `data` as input packets of at most `chunk` bytes, without timestamps or offsets.
    pub fn push_chunked(&mut self, data: &[u8], chunk: usize) {
        for piece in data.chunks(chunk) {
            self.queue.push_back(InputPacket {
                data: piece.into(),
                cts: None,
                byte_offset: None,
            });
        }
    }

    /// Queue `data` as one input packet.
    pub fn push(&mut self, data: &[u8]) {
        self.push_chunked(data, data.len().max(1));
    }

    /// Queue `data` as input packets carrying source byte offsets starting at `base`.
    pub fn push_chunked_from(&mut self, data: &[u8], chunk: usize, base: u64) {
        let mut offset = base;
        for piece in data.chunks(chunk) {
            self.queue.push_back(InputPacket {
                data: piece.into(),
                cts: None,
                byte_offset: Some(offset),
            });
            offset += piece.len() as u64;
        }
    }

    /// The decoder configuration property, if one was set.
    pub fn decoder_config(&self) -> Option<&[u8]> {
        self.props.iter().find_map(|prop| match prop {
            StreamProperty::DecoderConfig(dsi) => Some(dsi.as_ref()),
            _ => None,
        })
    }
}

impl FilterHost for MockHost {
    fn get_packet(&mut self) -> Option<&InputPacket> {
        self.queue.front()
    }

    fn drop_packet(&mut self) {
        self.queue.pop_front();
    }

    fn is_eos(&self) -> bool {
        self.eos && self.queue.is_empty()
    }

    fn send_packet(&mut self, packet: Packet) -> Result<()> {
        if self.fail_sends > 0 {
            self.fail_sends -= 1;
            return out_of_memory_error();
        }
        if self.sent.is_empty() {
            self.props_before_first_packet = self.props.len();
        }
        self.sent.push(packet);
        Ok(())
    }

    fn set_property(&mut self, prop: StreamProperty) {
        self.props.push(prop);
    }

    fn send_event(&mut self, event: SourceEvent) {
        self.events.push(event);
    }

    fn set_eos(&mut self) {
        self.out_eos = true;
    }
}

/// A file pid configuration without a backing file.
pub fn file_pid() -> PidConfig {
    PidConfig {
        stream_type: Some(StreamType::File),
        file_ext: Some("flac".to_string()),
        ..Default::default()
    }
}

/// An unframed audio pid configuration with a declared timescale.
pub fn unframed_pid(timescale: u32) -> PidConfig {
    PidConfig {
        stream_type: Some(StreamType::Audio),
        codec_id: Some(CODEC_ID_FLAC),
        unframed: true,
        timescale: Some(timescale),
        ..Default::default()
    }
}

/// Drive `process` until the reframer reports end of stream.
pub fn run_to_eos(reframer: &mut crate::FlacReframer, host: &mut MockHost) {
    use cadenza_core::errors::Error;

    for _ in 0..100_000 {
        match reframer.process(host) {
            Ok(()) => (),
            Err(Error::EndOfStream) => return,
            Err(err) => panic!("process failed: {}", err),
        }
    }

    panic!("process never reached end of stream");
}
