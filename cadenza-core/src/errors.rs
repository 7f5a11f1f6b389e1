// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Cadenza.
#[derive(Debug)]
pub enum Error {
    /// The stream contained malformed data and cannot be parsed any further. This error is fatal
    /// for the stream that raised it.
    BadBitstream(&'static str),
    /// A packet or buffer could not be allocated. This error is transient: the caller may retry
    /// the failed operation later without losing data.
    OutOfMemory,
    /// The stream presented for configuration does not match the filter's capabilities.
    NotSupported(&'static str),
    /// The end of the stream was reached.
    EndOfStream,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::BadBitstream(msg) => write!(f, "malformed bitstream: {}", msg),
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::NotSupported(feature) => write!(f, "unsupported: {}", feature),
            Error::EndOfStream => write!(f, "end of stream"),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a bad bitstream error.
pub fn bad_bitstream_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::BadBitstream(desc))
}

/// Convenience function to create an out-of-memory error.
pub fn out_of_memory_error<T>() -> Result<T> {
    Err(Error::OutOfMemory)
}

/// Convenience function to create an unsupported stream error.
pub fn not_supported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::NotSupported(feature))
}

/// Convenience function to create an end-of-stream error.
pub fn end_of_stream_error<T>() -> Result<T> {
    Err(Error::EndOfStream)
}
