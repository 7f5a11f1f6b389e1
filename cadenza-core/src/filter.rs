// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `filter` module defines the interface between a stream filter and the host runtime that
//! drives it.
//!
//! A filter is a cooperative state machine. The host repeatedly invokes the filter's `process`
//! function; each invocation consumes at most one input packet from the input pid and queues zero
//! or more framed packets on the output pid. All interactions with the host happen through the
//! capability set exposed by the [`FilterHost`] trait.

use std::path::PathBuf;

use crate::audio::ChannelLayout;
use crate::errors::Result;
use crate::units::Fraction64;

/// A `CodecId` identifies a coded bitstream format.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CodecId(pub u32);

/// Free Lossless Audio Codec (FLAC).
pub const CODEC_ID_FLAC: CodecId = CodecId(u32::from_be_bytes(*b"fLaC"));

/// The class of data carried by a pid.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamType {
    /// An undifferentiated stream of file bytes.
    File,
    /// An audio elementary stream.
    Audio,
}

/// Playback capabilities a filter may declare on its output pid.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Playback from the start only.
    None,
    /// Seeking is supported.
    Seek,
    /// Seeking and fast-forward are supported.
    FastForward,
    /// Seeking, fast-forward, and reverse playback are supported.
    Rewind,
}

/// The score returned by a data probe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProbeScore {
    /// The format may be handled, but the signature is not conclusive.
    MaybeSupported,
    /// The format is supported.
    Supported,
}

/// A property set or updated on an output pid.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamProperty {
    /// The class of the stream.
    StreamType(StreamType),
    /// The codec of the stream.
    CodecId(CodecId),
    /// Whether packets still need framing. `None` clears the property.
    Unframed(Option<bool>),
    /// The timescale of packet timestamps, in ticks per second.
    Timescale(u32),
    /// The audio sample rate in Hz.
    SampleRate(u32),
    /// The number of audio channels.
    NumChannels(u32),
    /// The number of samples per frame, or 0 if variable.
    SamplesPerFrame(u32),
    /// The number of bits per audio sample.
    AudioBps(u32),
    /// The average bitrate in bits per second.
    Bitrate(u32),
    /// The positional layout of the audio channels.
    ChannelLayout(ChannelLayout),
    /// The decoder configuration record.
    DecoderConfig(Box<[u8]>),
    /// The total stream duration as a fraction (ticks over timescale).
    Duration(Fraction64),
    /// The playback capabilities of the stream.
    PlaybackMode(PlaybackMode),
    /// Whether output packets may reference source bytes directly.
    CanDataRef(bool),
    /// A human-readable pid name.
    StreamName(String),
}

/// An event sent by the host to a filter, on behalf of a downstream consumer.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterEvent {
    /// Start or restart playback at the given position in seconds.
    Play {
        /// The requested start position in seconds.
        start_range: f64,
    },
    /// Stop playback.
    Stop,
    /// Change the playback speed.
    SetSpeed(f64),
}

/// An event sent by a filter to its upstream source.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceEvent {
    /// Reposition the source to the given byte offset.
    Seek {
        /// The byte offset to resume reading from.
        start_offset: u64,
    },
}

/// An unframed packet received from the input pid.
#[derive(Clone, Debug)]
pub struct InputPacket {
    /// The packet buffer. Byte boundaries are arbitrary.
    pub data: Box<[u8]>,
    /// The presentation timestamp declared by the upstream filter, in the input pid's timescale,
    /// if known.
    pub cts: Option<u64>,
    /// The source byte offset of the first byte of the packet, if known.
    pub byte_offset: Option<u64>,
}

/// A framed packet queued on the output pid.
#[derive(Clone, Debug)]
pub struct Packet {
    /// The packet buffer, holding exactly one access unit.
    pub data: Box<[u8]>,
    /// The presentation timestamp of the packet in the output pid's timescale.
    pub cts: u64,
    /// The duration of the packet in the output pid's timescale.
    pub dur: u64,
    /// Whether the packet is a stream access point.
    pub sap: bool,
    /// Whether the packet carries the start and the end of an access unit.
    pub framing: (bool, bool),
    /// The source byte offset of the first byte of the packet, if known.
    pub byte_offset: Option<u64>,
}

/// The negotiated properties of an input pid, as presented by the host at configuration time.
#[derive(Clone, Debug, Default)]
pub struct PidConfig {
    /// The class of the stream.
    pub stream_type: Option<StreamType>,
    /// The codec of the stream, if declared.
    pub codec_id: Option<CodecId>,
    /// The MIME type of the stream, if declared.
    pub mime: Option<String>,
    /// The file extension of the source, if declared.
    pub file_ext: Option<String>,
    /// Whether the packets of this pid still need framing.
    pub unframed: bool,
    /// The timescale of input packet timestamps. Set when the pid is fed by a demuxer rather
    /// than a file source.
    pub timescale: Option<u32>,
    /// The path of the backing file when the source is a local file.
    pub file_path: Option<PathBuf>,
}

/// The capability set a host runtime exposes to a filter.
///
/// `get_packet` and `drop_packet` follow peek-then-consume semantics: `get_packet` returns the
/// packet at the head of the input queue without consuming it, and `drop_packet` discards it.
pub trait FilterHost {
    /// Returns the packet at the head of the input queue, if any.
    fn get_packet(&mut self) -> Option<&InputPacket>;

    /// Discards the packet at the head of the input queue.
    fn drop_packet(&mut self);

    /// Returns `true` if the input pid reached its end of stream.
    fn is_eos(&self) -> bool;

    /// Queues a framed packet on the output pid.
    ///
    /// Returns `OutOfMemory` if the packet cannot be allocated. The filter will retry on a later
    /// `process` invocation without losing data.
    fn send_packet(&mut self, packet: Packet) -> Result<()>;

    /// Sets or updates a property on the output pid.
    fn set_property(&mut self, prop: StreamProperty);

    /// Sends an event upstream on the input pid.
    fn send_event(&mut self, event: SourceEvent);

    /// Signals end of stream on the output pid.
    fn set_eos(&mut self);
}
