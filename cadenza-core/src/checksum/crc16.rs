// Cadenza
// Copyright (c) 2025 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use lazy_static::lazy_static;

use crate::io::Monitor;

lazy_static! {
    static ref CRC16_TABLE: [u16; 256] = {
        const POLYNOMIAL: u16 = 0x8005;

        let mut table = [0u16; 256];

        let mut i = 0;
        while i < 256 {
            let mut crc = (i as u16) << 8;

            let mut j = 0;
            while j < 8 {
                crc = (crc << 1) ^ if (crc & 0x8000) != 0 { POLYNOMIAL } else { 0 };
                j += 1;
            }

            table[i] = crc;
            i += 1;
        }

        table
    };
}

/// `Crc16Ansi` computes the CRC-16 checksum with the ANSI generator polynomial (0x8005). The
/// checksum is not reflected and no final inversion is applied.
pub struct Crc16Ansi {
    crc: u16,
}

impl Crc16Ansi {
    /// Instantiate a new CRC-16 generator with the provided initial state.
    pub fn new(initial: u16) -> Self {
        Crc16Ansi { crc: initial }
    }

    /// Get the checksum over all bytes processed so far.
    pub fn crc(&self) -> u16 {
        self.crc
    }
}

impl Monitor for Crc16Ansi {
    #[inline(always)]
    fn process_byte(&mut self, byte: u8) {
        self.crc = (self.crc << 8) ^ CRC16_TABLE[usize::from((self.crc >> 8) as u8 ^ byte)];
    }

    fn process_buf_bytes(&mut self, buf: &[u8]) {
        for byte in buf {
            self.process_byte(*byte);
        }
    }
}
