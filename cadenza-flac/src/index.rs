// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use log::debug;

use crate::frame::{parse_frame_header, FRAME_HEADER_WINDOW};
use crate::meta::read_stream_header;

/// A point in the seek index.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IndexEntry {
    /// The source byte offset of a frame's sync word.
    pub byte_offset: u64,
    /// The presentation time of that frame in seconds.
    pub time: f64,
}

/// An index of frame positions ordered by presentation time.
#[derive(Default)]
pub struct SeekIndex {
    entries: Vec<IndexEntry>,
}

impl SeekIndex {
    pub fn new() -> Self {
        SeekIndex { entries: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append an entry. Entries must be pushed in ascending time order.
    pub fn push(&mut self, byte_offset: u64, time: f64) {
        debug_assert!(self.entries.last().map_or(true, |last| last.time <= time));
        self.entries.push(IndexEntry { byte_offset, time });
    }

    /// Find the last entry at or before the requested time in seconds.
    pub fn search(&self, time: f64) -> Option<&IndexEntry> {
        let after = self.entries.partition_point(|entry| entry.time <= time);

        if after > 0 {
            Some(&self.entries[after - 1])
        }
        else {
            None
        }
    }
}

/// The result of the one-time probe pass over a source file.
pub struct FileProbe {
    /// The seek index.
    pub index: SeekIndex,
    /// The size of the file in bytes.
    pub file_size: u64,
    /// The total number of samples walked.
    pub total_samples: u64,
    /// The sample rate from the stream information block.
    pub sample_rate: u32,
}

/// Walk a local FLAC file and build a seek index with one entry per `window` seconds.
///
/// Only frame headers are parsed; frame bodies are skipped by scanning for the next sync word.
/// Returns `None` if the file cannot be read or does not start with a FLAC stream header.
pub fn probe_file(path: &Path, window: f64) -> Option<FileProbe> {
    let data = std::fs::read(path).ok()?;

    let header = read_stream_header(&data).ok()?;

    let mut sample_rate = header.info.sample_rate;
    let mut index = SeekIndex::new();
    let mut samples = 0u64;
    let mut time = 0.0f64;
    let mut next_time = 0.0f64;

    let mut pos = header.header_len;

    while pos + FRAME_HEADER_WINDOW <= data.len() {
        let Some(frame) = parse_frame_header(&data[pos..], sample_rate) else {
            // Not a frame start. Resynchronize on the next candidate sync word.
            match next_sync(&data, pos + 1) {
                Some(next) => {
                    pos = next;
                    continue;
                }
                None => break,
            }
        };

        if window > 0.0 && time >= next_time {
            index.push(pos as u64, time);
            next_time += window;
        }

        samples += u64::from(frame.block_size);
        time += f64::from(frame.block_size) / f64::from(frame.sample_rate);
        sample_rate = frame.sample_rate;

        match next_sync(&data, pos + 2) {
            Some(next) => pos = next,
            None => break,
        }
    }

    debug!("indexed {} seek points over {:.2}s", index.len(), time);

    Some(FileProbe { index, file_size: data.len() as u64, total_samples: samples, sample_rate: header.info.sample_rate })
}

/// Find the next candidate sync word at or after `from`.
fn next_sync(data: &[u8], from: usize) -> Option<usize> {
    let mut pos = from;

    while pos + 1 < data.len() {
        match data[pos..].iter().position(|&b| b == 0xff) {
            Some(rel) => {
                let at = pos + rel;
                if at + 1 < data.len() && (data[at + 1] & 0xfc) == 0xf8 {
                    return Some(at);
                }
                pos = at + 1;
            }
            None => return None,
        }
    }

    None
}
