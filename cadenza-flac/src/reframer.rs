// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use cadenza_core::audio::ChannelLayout;
use cadenza_core::checksum::{Crc16Ansi, Crc32};
use cadenza_core::errors::{
    bad_bitstream_error, end_of_stream_error, not_supported_error, Result,
};
use cadenza_core::filter::{
    FilterEvent, FilterHost, Packet, PidConfig, PlaybackMode, ProbeScore, SourceEvent,
    StreamProperty, StreamType, CODEC_ID_FLAC,
};
use cadenza_core::io::Monitor;
use cadenza_core::units::{rescale, Fraction64};

use log::{debug, error, warn};

use crate::frame::{parse_frame_header, FrameHeader, FRAME_HEADER_WINDOW};
use crate::index::SeekIndex;
use crate::meta::{read_stream_header, FLAC_STREAM_MARKER};
use crate::ring::RingBuffer;

/// The minimum number of buffered bytes before scanning for a frame boundary.
const MIN_BUFFERED_BYTES: usize = 20;

/// The number of checksum-rejected sync candidates retained for corrupt frame recovery.
const MAX_REJECTED_CANDIDATES: usize = 4;

/// Options for a [`FlacReframer`].
#[derive(Copy, Clone, Debug)]
pub struct ReframerOptions {
    /// The indexing window length in seconds. A value greater than 0 enables building a seek
    /// index over local files; one index point is recorded per window.
    pub index: f64,
    /// Validate the CRC-16 footer of every frame. When disabled, the footer is only checked on
    /// boundaries where the sample rate or channel assignment changed.
    pub docrc: bool,
}

impl Default for ReframerOptions {
    fn default() -> Self {
        ReframerOptions { index: 1.0, docrc: false }
    }
}

/// The outcome of a frame boundary scan.
enum Locate {
    /// No confirmed boundary in the buffered bytes. More input is required.
    NeedMoreData,
    /// The current frame ends at `end`, where the header of the next frame was validated.
    Boundary { end: usize, header: FrameHeader },
    /// The bytes below `skip` fail their checksum but `[skip, end)` is a validated frame. The
    /// corrupt prefix must be discarded.
    Recovered { skip: usize, end: usize, header: FrameHeader },
}

/// A FLAC reframer.
///
/// One instance serves one input pid. The host runtime invokes [`process`](Self::process)
/// repeatedly; each invocation consumes at most one input packet and emits zero or more framed
/// packets. The reframer never blocks.
pub struct FlacReframer {
    opts: ReframerOptions,

    // Input pid configuration.
    timescale: Option<u32>,
    file_path: Option<PathBuf>,

    is_file: bool,
    file_loaded: bool,
    is_playing: bool,
    initial_play_done: bool,
    in_error: bool,
    initialized: bool,
    opid_setup: bool,
    copy_props: bool,

    // Negotiated stream settings.
    sample_rate: u32,
    nb_channels: u32,
    bits_per_sample: u32,
    block_size: u32,
    ch_layout: u32,
    duration: Fraction64,
    bitrate: u32,
    dsi_crc: Option<u32>,

    // Timestamping and seeking.
    cts: u64,
    start_range: f64,
    in_seek: bool,
    is_sync: bool,

    ring: RingBuffer,
    ring_offset: Option<u64>,

    index: SeekIndex,
}

impl FlacReframer {
    /// Instantiate a reframer with the provided options.
    pub fn new(opts: ReframerOptions) -> Self {
        FlacReframer {
            opts,
            timescale: None,
            file_path: None,
            is_file: false,
            file_loaded: false,
            is_playing: false,
            initial_play_done: false,
            in_error: false,
            initialized: false,
            opid_setup: false,
            copy_props: false,
            sample_rate: 0,
            nb_channels: 0,
            bits_per_sample: 0,
            block_size: 0,
            ch_layout: 0,
            duration: Fraction64::default(),
            bitrate: 0,
            dsi_crc: None,
            cts: 0,
            start_range: 0.0,
            in_seek: false,
            is_sync: false,
            ring: RingBuffer::new(),
            ring_offset: None,
            index: SeekIndex::new(),
        }
    }

    /// Probe the start of a byte stream for a FLAC signature.
    pub fn probe_data(data: &[u8]) -> Option<(&'static str, ProbeScore)> {
        if data.len() >= 4 && data[..4] == FLAC_STREAM_MARKER {
            Some(("audio/flac", ProbeScore::Supported))
        }
        else {
            None
        }
    }

    /// Configure the reframer for an input pid.
    ///
    /// Accepts a FLAC file pid, or an unframed FLAC audio pid fed by a demuxer. Returns
    /// `NotSupported` for anything else.
    pub fn configure<H: FilterHost>(&mut self, host: &mut H, config: &PidConfig) -> Result<()> {
        let is_flac_file = config.stream_type == Some(StreamType::File)
            && (config.mime.as_deref() == Some("audio/flac")
                || config.file_ext.as_deref() == Some("flac"));

        let is_unframed_audio = config.stream_type == Some(StreamType::Audio)
            && config.codec_id == Some(CODEC_ID_FLAC)
            && config.unframed;

        if !is_flac_file && !is_unframed_audio {
            return not_supported_error("flac: input pid is neither a flac file nor unframed flac audio");
        }

        self.timescale = config.timescale;
        self.file_path = config.file_path.clone();

        // A transmuxed input declares its own timescale. Claim the output pid now so packet
        // properties propagate, and re-emit the full property set on reconfiguration.
        if self.timescale.is_some() {
            if !self.opid_setup {
                self.opid_setup = true;
                host.set_property(StreamProperty::StreamType(StreamType::Audio));
                host.set_property(StreamProperty::Unframed(None));
            }
            self.copy_props = true;
        }

        Ok(())
    }

    /// Handle an event from the downstream consumer. Returns `true` if the event was absorbed
    /// and must not propagate further upstream.
    pub fn process_event<H: FilterHost>(&mut self, host: &mut H, event: &FilterEvent) -> bool {
        match *event {
            FilterEvent::Play { start_range } => {
                self.is_playing = true;

                if !self.is_file {
                    if start_range > 0.0 || self.initial_play_done {
                        self.ring.clear();
                        self.ring_offset = None;
                    }
                    self.initial_play_done = true;
                    return false;
                }

                self.check_dur();

                self.start_range = start_range;
                self.in_seek = true;

                let mut file_pos = 0;
                if start_range > 0.0 {
                    if let Some(entry) = self.index.search(start_range) {
                        self.cts = (entry.time * f64::from(self.sample_rate)) as u64;
                        file_pos = entry.byte_offset;
                    }
                }

                if !self.initial_play_done {
                    self.initial_play_done = true;
                    // The source is already positioned at the start of the stream.
                    if file_pos == 0 {
                        return true;
                    }
                }

                self.ring.clear();
                self.ring_offset = None;

                host.send_event(SourceEvent::Seek { start_offset: file_pos });

                true
            }
            FilterEvent::Stop => {
                // Stream settings are retained so playback can restart without reprobing.
                self.is_playing = false;
                self.cts = 0;
                false
            }
            FilterEvent::SetSpeed(_) => true,
        }
    }

    /// Run one iteration of the reframing state machine.
    ///
    /// Consumes at most one input packet. Returns `EndOfStream` once all buffered frames have
    /// been flushed after the input pid reached its end, `OutOfMemory` if an output packet could
    /// not be queued (retry later, no data is lost), and `BadBitstream` if the stream is
    /// malformed.
    pub fn process<H: FilterHost>(&mut self, host: &mut H) -> Result<()> {
        if self.in_error {
            return bad_bitstream_error("flac: stream is in error");
        }

        if self.duration.num == 0 {
            self.check_dur();
        }

        if (self.initialized || self.timescale.is_some()) && !self.is_playing {
            return Ok(());
        }

        let mut final_flush = false;
        let mut declared_cts = None;
        let prev_buffered = self.ring.len();
        let mut got_packet = false;

        if let Some(pck) = host.get_packet() {
            // Track the source offset of the oldest buffered byte. A packet that does not
            // extend the buffer contiguously invalidates the anchor until it can be re-derived.
            if self.ring.is_empty() {
                self.ring_offset = pck.byte_offset;
            }
            else if let Some(anchor) = self.ring_offset {
                if pck.byte_offset != Some(anchor + self.ring.len() as u64) {
                    self.ring_offset = match pck.byte_offset {
                        Some(offset) if offset > self.ring.len() as u64 => {
                            Some(offset - self.ring.len() as u64)
                        }
                        _ => None,
                    };
                }
            }

            self.ring.append(&pck.data);

            if self.timescale.is_some() {
                declared_cts = pck.cts;
                // Adopt the very first declared timestamp.
                if self.cts == 0 {
                    if let Some(cts) = pck.cts {
                        self.cts = cts;
                    }
                }
            }

            got_packet = true;
        }

        if got_packet {
            host.drop_packet();
        }
        else if host.is_eos() {
            if self.ring.is_empty() {
                host.set_eos();
                return end_of_stream_error();
            }
            final_flush = true;
        }
        else {
            return Ok(());
        }

        let mut start = 0;

        loop {
            let remain = self.ring.len() - start;

            if remain == 0 || (!final_flush && remain <= MIN_BUFFERED_BYTES) {
                break;
            }

            let located = match self.locate_frame(start) {
                Locate::NeedMoreData if final_flush => {
                    // The last frame of the stream has no trailing sync word. Flush whatever
                    // remains as the final frame.
                    (0, remain, None)
                }
                Locate::NeedMoreData => break,
                Locate::Boundary { end, header } => (0, end, Some(header)),
                Locate::Recovered { skip, end, header } => (skip, end, Some(header)),
            };

            let (skip, rel_end, next_header) = located;
            let frame_start = start + skip;
            let frame_end = start + rel_end;

            if !self.initialized {
                if let Err(err) = self.initialize(host, frame_end, next_header) {
                    error!("invalid FLAC stream header");
                    self.in_error = true;
                    self.ring.clear();
                    self.ring_offset = None;
                    return Err(err);
                }

                start = frame_end;

                if !self.is_playing {
                    break;
                }
                continue;
            }

            if skip > 0 {
                self.log_resync(skip);
                start = frame_start;
            }

            // The current frame must begin on a sync word. Anything else is a gap left by an
            // upstream discontinuity; drop it and resynchronize on the located boundary.
            {
                let buf = self.ring.as_slice();
                let window = &buf[frame_start..frame_end];
                if window.len() < 2 || window[0] != 0xff || (window[1] & 0xfc) != 0xf8 {
                    self.log_resync(frame_end - frame_start);
                    start = frame_end;
                    continue;
                }
            }
            self.is_sync = true;

            let current = {
                let buf = self.ring.as_slice();
                parse_frame_header(&buf[frame_start..frame_end], self.sample_rate)
            };

            // A truncated final frame may no longer parse; fall back on the stream settings.
            let (nb_samples, frame_rate, frame_layout) = match current {
                Some(header) => (header.block_size, header.sample_rate, header.channel_assignment),
                None => (self.block_size, self.sample_rate, self.ch_layout),
            };

            if frame_rate != self.sample_rate {
                self.sample_rate = frame_rate;
                host.set_property(StreamProperty::SampleRate(frame_rate));
            }

            if frame_layout != self.ch_layout {
                self.ch_layout = frame_layout;
                if frame_layout > 1 {
                    host.set_property(StreamProperty::ChannelLayout(channel_layout(frame_layout)));
                }
            }

            if self.in_seek {
                let samples_at_seek = (self.start_range * f64::from(self.sample_rate)) as u64;
                if self.cts + u64::from(nb_samples) >= samples_at_seek {
                    self.in_seek = false;
                }
            }

            // After all previously buffered bytes have been flushed, realign on the timestamp
            // declared by the packet that started this frame.
            if self.timescale.is_some() && prev_buffered == 0 {
                if let Some(cts) = declared_cts.take() {
                    self.cts = cts;
                }
            }

            if !self.in_seek {
                let data: Box<[u8]> = {
                    let buf = self.ring.as_slice();
                    Box::from(&buf[frame_start..frame_end])
                };

                let dur = match self.timescale {
                    Some(timescale) if timescale != self.sample_rate => {
                        rescale(u64::from(nb_samples), self.sample_rate, timescale)
                    }
                    _ => u64::from(nb_samples),
                };

                let packet = Packet {
                    data,
                    cts: self.cts,
                    dur,
                    sap: true,
                    framing: (true, true),
                    byte_offset: self.ring_offset.map(|offset| offset + frame_start as u64),
                };

                if let Err(err) = host.send_packet(packet) {
                    // Keep the located frame buffered so a retry re-emits it.
                    self.commit(start);
                    return Err(err);
                }
            }

            self.update_cts(nb_samples);

            start = frame_end;
        }

        if final_flush {
            self.ring.clear();
            self.ring_offset = None;
            host.set_eos();
            return end_of_stream_error();
        }

        self.commit(start);

        Ok(())
    }

    /// Scan the buffered bytes from `from` for the next confirmed frame boundary.
    fn locate_frame(&self, from: usize) -> Locate {
        let buf = &self.ring.as_slice()[from..];
        let remain = buf.len();

        // Skip the sync word of the current frame.
        let mut pos = 2;
        let mut rejected: Vec<usize> = Vec::new();

        while pos < remain {
            let sync = match buf[pos..].iter().position(|&byte| byte == 0xff) {
                Some(rel) => pos + rel,
                None => return Locate::NeedMoreData,
            };

            // A candidate header must be fully buffered before it can be validated.
            if sync + FRAME_HEADER_WINDOW >= remain {
                return Locate::NeedMoreData;
            }

            if (buf[sync + 1] & 0xfc) != 0xf8 {
                pos = sync + 1;
                continue;
            }

            let header = match parse_frame_header(&buf[sync..], self.sample_rate) {
                Some(header) => header,
                None => {
                    pos = sync + 1;
                    continue;
                }
            };

            if !self.initialized {
                return Locate::Boundary { end: sync, header };
            }

            // With an unchanged sample rate and channel assignment the boundary is accepted on
            // the strength of the header checks alone, unless full CRC validation is requested.
            if !self.opts.docrc
                && header.sample_rate == self.sample_rate
                && header.channel_assignment == self.ch_layout
            {
                return Locate::Boundary { end: sync, header };
            }

            if frame_crc_ok(&buf[..sync]) {
                return Locate::Boundary { end: sync, header };
            }

            // The candidate header is valid but the frame ending here fails its checksum.
            // Either the candidate is a false sync, or the current frame is corrupt. Check
            // whether a previously rejected candidate starts a frame that ends here; if so the
            // bytes before it are a corrupt frame that can be dropped.
            for &reject in &rejected {
                if frame_crc_ok(&buf[reject..sync]) {
                    return Locate::Recovered { skip: reject, end: sync, header };
                }
            }

            if rejected.len() < MAX_REJECTED_CANDIDATES {
                rejected.push(sync);
            }

            pos = sync + 1;
        }

        Locate::NeedMoreData
    }

    /// Parse the stream marker and metadata blocks held in `[0, end)` of the ring, then declare
    /// the output pid.
    fn initialize<H: FilterHost>(
        &mut self,
        host: &mut H,
        end: usize,
        first_frame: Option<FrameHeader>,
    ) -> Result<()> {
        let header = read_stream_header(&self.ring.as_slice()[..end])?;

        let info = &header.info;
        self.sample_rate = info.sample_rate;
        self.nb_channels = info.channels;
        self.bits_per_sample = info.bits_per_sample;
        self.block_size = info.fixed_block_len();
        self.duration = info.duration();

        self.ch_layout = match first_frame {
            Some(frame) => frame.channel_assignment,
            None => info.channels.saturating_sub(1),
        };

        let dsi: Box<[u8]> = Box::from(&self.ring.as_slice()[4..header.header_len]);

        self.initialized = true;
        self.declare_output(host, &dsi);

        Ok(())
    }

    /// Declare or update the output pid properties. The full property set is re-emitted whenever
    /// the decoder configuration record changes.
    fn declare_output<H: FilterHost>(&mut self, host: &mut H, dsi: &[u8]) {
        let mut crc = Crc32::new();
        crc.process_buf_bytes(dsi);
        let crc = crc.crc();

        if !self.opid_setup {
            self.opid_setup = true;
            self.check_dur();
        }

        if self.dsi_crc == Some(crc) && !self.copy_props {
            return;
        }
        self.dsi_crc = Some(crc);
        self.copy_props = false;

        host.set_property(StreamProperty::StreamType(StreamType::Audio));
        host.set_property(StreamProperty::Unframed(None));

        if self.is_file && self.opts.index > 0.0 {
            host.set_property(StreamProperty::PlaybackMode(PlaybackMode::FastForward));
        }

        if self.duration.num > 0 {
            host.set_property(StreamProperty::Duration(self.duration));
        }

        if self.timescale.is_none() {
            host.set_property(StreamProperty::CanDataRef(true));
            host.set_property(StreamProperty::StreamName("audio".to_string()));
        }

        host.set_property(StreamProperty::DecoderConfig(dsi.into()));
        host.set_property(StreamProperty::CodecId(CODEC_ID_FLAC));
        host.set_property(StreamProperty::Timescale(self.timescale.unwrap_or(self.sample_rate)));
        host.set_property(StreamProperty::SampleRate(self.sample_rate));
        host.set_property(StreamProperty::NumChannels(self.nb_channels));
        host.set_property(StreamProperty::SamplesPerFrame(self.block_size));
        host.set_property(StreamProperty::AudioBps(self.bits_per_sample));

        if self.bitrate > 0 {
            host.set_property(StreamProperty::Bitrate(self.bitrate));
        }

        if self.ch_layout > 1 {
            host.set_property(StreamProperty::ChannelLayout(channel_layout(self.ch_layout)));
        }
    }

    /// One-time probe of a local source file: build the seek index and derive the bitrate.
    fn check_dur(&mut self) {
        if self.timescale.is_some() || self.file_loaded {
            return;
        }

        if self.opts.index <= 0.0 {
            self.file_loaded = true;
            return;
        }

        let Some(path) = self.file_path.clone() else {
            self.file_loaded = true;
            return;
        };

        self.is_file = true;
        self.file_loaded = true;

        let Some(probe) = crate::index::probe_file(&path, self.opts.index) else {
            return;
        };

        self.index = probe.index;

        if self.duration.num == 0 && probe.total_samples > 0 {
            self.duration = Fraction64::new(probe.total_samples, probe.sample_rate);
        }

        if self.duration.num > 0 {
            let rate = probe.file_size * 8 * u64::from(self.duration.den) / self.duration.num;
            self.bitrate = rate as u32;
        }
    }

    /// Advance the output timestamp by a frame's sample count.
    fn update_cts(&mut self, nb_samples: u32) {
        match self.timescale {
            Some(timescale) => {
                self.cts += rescale(u64::from(nb_samples), self.sample_rate, timescale);
            }
            None => self.cts += u64::from(nb_samples),
        }
    }

    /// Drop `consumed` bytes from the front of the ring, keeping the offset anchor aligned.
    fn commit(&mut self, consumed: usize) {
        if consumed == 0 {
            return;
        }

        if let Some(offset) = self.ring_offset {
            self.ring_offset = Some(offset + consumed as u64);
        }

        self.ring.consume(consumed);
    }

    fn log_resync(&mut self, dropped: usize) {
        if self.is_sync {
            warn!("invalid frame, dropping {} bytes and resyncing", dropped);
        }
        else {
            debug!("invalid frame, dropping {} bytes and resyncing", dropped);
        }
        self.is_sync = false;
    }
}

/// Validate a frame's trailing CRC-16. The last two bytes of `frame` hold the expected checksum
/// of every preceding byte, big-endian.
fn frame_crc_ok(frame: &[u8]) -> bool {
    let len = frame.len();
    if len < 2 {
        return false;
    }

    let mut crc16 = Crc16Ansi::new(0);
    crc16.process_buf_bytes(&frame[..len - 2]);

    crc16.crc() == u16::from_be_bytes([frame[len - 2], frame[len - 1]])
}

/// Map a direct channel assignment code to a positional channel layout.
fn channel_layout(assignment: u32) -> ChannelLayout {
    use cadenza_core::audio::ChannelLayout as Layout;

    match assignment {
        0 => Layout::FRONT_CENTER,
        1 => Layout::FRONT_LEFT | Layout::FRONT_RIGHT,
        2 => Layout::FRONT_LEFT | Layout::FRONT_RIGHT | Layout::FRONT_CENTER,
        3 => {
            Layout::FRONT_LEFT | Layout::FRONT_RIGHT | Layout::REAR_LEFT | Layout::REAR_RIGHT
        }
        4 => {
            Layout::FRONT_LEFT
                | Layout::FRONT_RIGHT
                | Layout::FRONT_CENTER
                | Layout::REAR_LEFT
                | Layout::REAR_RIGHT
        }
        5 => {
            Layout::FRONT_LEFT
                | Layout::FRONT_RIGHT
                | Layout::FRONT_CENTER
                | Layout::LFE1
                | Layout::REAR_LEFT
                | Layout::REAR_RIGHT
        }
        6 => {
            Layout::FRONT_LEFT
                | Layout::FRONT_RIGHT
                | Layout::FRONT_CENTER
                | Layout::LFE1
                | Layout::SIDE_LEFT
                | Layout::SIDE_RIGHT
                | Layout::REAR_CENTER
        }
        7 => {
            Layout::FRONT_LEFT
                | Layout::FRONT_RIGHT
                | Layout::FRONT_CENTER
                | Layout::LFE1
                | Layout::SIDE_LEFT
                | Layout::SIDE_RIGHT
                | Layout::REAR_LEFT
                | Layout::REAR_RIGHT
        }
        _ => ChannelLayout::empty(),
    }
}
