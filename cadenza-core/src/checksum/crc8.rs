// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use lazy_static::lazy_static;

use crate::io::Monitor;

lazy_static! {
    static ref CRC8_TABLE: [u8; 256] = {
        const POLYNOMIAL: u8 = 0x07;

        let mut table = [0u8; 256];

        let mut i = 0;
        while i < 256 {
            let mut crc = i as u8;

            let mut j = 0;
            while j < 8 {
                crc = (crc << 1) ^ if (crc & 0x80) != 0 { POLYNOMIAL } else { 0 };
                j += 1;
            }

            table[i] = crc;
            i += 1;
        }

        table
    };
}

/// `Crc8Ccitt` computes the CRC-8 checksum with the CCITT generator polynomial (0x07). The
/// checksum is not reflected and no final inversion is applied.
pub struct Crc8Ccitt {
    crc: u8,
}

impl Crc8Ccitt {
    /// Instantiate a new CRC-8 generator with the provided initial state.
    pub fn new(initial: u8) -> Self {
        Crc8Ccitt { crc: initial }
    }

    /// Get the checksum over all bytes processed so far.
    pub fn crc(&self) -> u8 {
        self.crc
    }
}

impl Monitor for Crc8Ccitt {
    #[inline(always)]
    fn process_byte(&mut self, byte: u8) {
        self.crc = CRC8_TABLE[usize::from(self.crc ^ byte)];
    }

    fn process_buf_bytes(&mut self, buf: &[u8]) {
        for byte in buf {
            self.process_byte(*byte);
        }
    }
}
