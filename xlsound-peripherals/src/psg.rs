/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The **AY-3-8910** / **YM2149** programmable sound generator family.
//!
//! This module contains register definitions and amplitude tables.
//!
//! The sound emulation is in a separate module, please see [engine].
use core::convert::TryFrom;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

pub mod engine;

pub use engine::PsgEngine;

/// An enumeration of PSG sound generator registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PsgRegister {
      ToneFineA      =  0,
      ToneCoarseA    =  1,
      ToneFineB      =  2,
      ToneCoarseB    =  3,
      ToneFineC      =  4,
      ToneCoarseC    =  5,
      NoisePeriod    =  6,
      MixerControl   =  7,
      AmpLevelA      =  8,
      AmpLevelB      =  9,
      AmpLevelC      = 10,
      EnvPerFine     = 11,
      EnvPerCoarse   = 12,
      EnvShape       = 13,
}

/// The number of sound generator registers.
pub const NUM_PSG_REGISTERS: usize = 14;

/// Bits of each register implemented by the chip.
pub const REG_MASKS: [u8;NUM_PSG_REGISTERS] = [
    0xff, 0x0f, 0xff, 0x0f, 0xff, 0x0f, 0x1f, 0xff,
    0x1f, 0x1f, 0x1f, 0xff, 0xff, 0x0f
];

/// The register index reading as a chip signature on cards that identify themselves.
pub const SIGNATURE_REGISTER: u8 = 0x0E;

impl PsgRegister {
    /// Returns the value masked with bits implemented by this register.
    #[inline]
    pub fn mask(self, val: u8) -> u8 {
        val & REG_MASKS[self as usize]
    }
}

impl From<PsgRegister> for usize {
    #[inline]
    fn from(reg: PsgRegister) -> usize {
        reg as usize
    }
}

impl TryFrom<u16> for PsgRegister {
    type Error = u16;

    fn try_from(reg: u16) -> Result<Self, Self::Error> {
        use PsgRegister::*;
        Ok(match reg {
             0 => ToneFineA,
             1 => ToneCoarseA,
             2 => ToneFineB,
             3 => ToneCoarseB,
             4 => ToneFineC,
             5 => ToneCoarseC,
             6 => NoisePeriod,
             7 => MixerControl,
             8 => AmpLevelA,
             9 => AmpLevelB,
            10 => AmpLevelC,
            11 => EnvPerFine,
            12 => EnvPerCoarse,
            13 => EnvShape,
            _ => return Err(reg)
        })
    }
}

/// Amplitude levels of the AY-3-8910, approximately 1.5 dB per step as the datasheet claims.
pub const AMPS_I16: [i16;16] = [0x0000, 0x0100, 0x016a, 0x01ff,
                                0x02d4, 0x03ff, 0x05a8, 0x07ff,
                                0x0b50, 0x0fff, 0x16a0, 0x1fff,
                                0x2d40, 0x3fff, 0x5a81, 0x7fff];

/// Measured amplitude levels, more linear than [AMPS_I16]. These are used for the YM2149.
pub const FUSE_AMPS_I16: [i16;16] = [0x0000, 0x01c2, 0x029e, 0x03b8,
                                     0x056b, 0x07ea, 0x0ad8, 0x1186,
                                     0x15a6, 0x21e0, 0x2d25, 0x3997,
                                     0x4902, 0x57f8, 0x6c90, 0x7fff];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psg_registers_work() {
        for reg in 0..NUM_PSG_REGISTERS as u16 {
            let preg = PsgRegister::try_from(reg).unwrap();
            assert_eq!(usize::from(preg), reg as usize);
            assert_eq!(preg.mask(0xff), REG_MASKS[reg as usize]);
        }
        assert_eq!(PsgRegister::try_from(14), Err(14));
        assert_eq!(PsgRegister::EnvShape.mask(0xfe), 0x0e);
        assert_eq!(PsgRegister::AmpLevelA.mask(0xff), 0x1f);
    }
}
