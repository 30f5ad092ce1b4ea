/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The SIDari card: one or two SID chips with direct register access.
use core::str::FromStr;
use std::io::{self, Read, Write};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use xlsound_core::audio::{OutputFormat, PanMode};
use xlsound_core::bus::{Access, AddressRouter, AddressSpan, RegisterTarget};
use xlsound_core::chip::SidModel;
use xlsound_core::clock::HostTiming;
use xlsound_core::savestate::{LoadStateError, StateReader, StateWriter};

use super::{CardLayout, CardSlot, ChipSpec, ChipSpecs, ParseConfigError, SID_PRESENCE};

/// The clock of SID chips on the card in Hz.
pub const SIDARI_CLOCK_HZ: f64 = 17_734_472.0 / 18.0;
/// The highest implemented SID register.
pub const SID_LAST_REGISTER: u16 = 0x18;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum SidariVersion {
    Mono,
    Stereo,
}

impl SidariVersion {
    #[inline]
    pub fn chip_count(self) -> usize {
        match self {
            SidariVersion::Mono => 1,
            SidariVersion::Stereo => 2,
        }
    }
}

impl FromStr for SidariVersion {
    type Err = ParseConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.eq_ignore_ascii_case("mono") {
            Ok(SidariVersion::Mono)
        }
        else if name.eq_ignore_ascii_case("stereo") {
            Ok(SidariVersion::Stereo)
        }
        else {
            Err(ParseConfigError::new("version"))
        }
    }
}

/// The SIDari card layout.
///
/// Each chip occupies 32 addresses. The whole span reads as `0x33`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct Sidari {
    version: SidariVersion,
    slot: CardSlot,
}

impl Default for Sidari {
    fn default() -> Self {
        Sidari { version: SidariVersion::Mono, slot: CardSlot(4) }
    }
}

impl Sidari {
    pub fn new(version: SidariVersion, slot: CardSlot) -> Self {
        Sidari { version, slot }
    }
    #[inline]
    pub fn version(&self) -> SidariVersion {
        self.version
    }
    #[inline]
    pub fn slot(&self) -> CardSlot {
        self.slot
    }
    /// Returns the addresses claimed by the card.
    pub fn span(&self) -> AddressSpan {
        AddressSpan::with_len(self.slot.base(), 0x20 * self.version.chip_count() as u16)
    }
}

impl AddressRouter for Sidari {
    fn claims(&self, address: u16) -> bool {
        self.span().contains(address)
    }

    fn decode(&self, address: u16, access: Access) -> Option<RegisterTarget> {
        let offset = self.span().offset(address)?;
        Some(match access {
            Access::Read => RegisterTarget::Constant(SID_PRESENCE),
            Access::Write => match offset & 0x1F {
                index @ 0..=SID_LAST_REGISTER => RegisterTarget::Register {
                    chip: (offset >> 5) as usize, index
                },
                _ => RegisterTarget::Ignored
            }
        })
    }
}

impl CardLayout for Sidari {
    fn name(&self) -> &'static str {
        "SIDari"
    }

    fn variant_code(&self) -> i32 {
        self.version.chip_count() as i32
    }

    fn set_variant_code(&mut self, code: i32) -> Result<(), LoadStateError> {
        self.version = match code {
            1 => SidariVersion::Mono,
            2 => SidariVersion::Stereo,
            code => return Err(LoadStateError::UnknownDiscriminant(code))
        };
        Ok(())
    }

    fn chip_specs(&self, _timing: &HostTiming, _format: OutputFormat) -> ChipSpecs {
        (0..self.version.chip_count()).map(|_| ChipSpec {
            model: SidModel::Mos8580.into(),
            clock_hz: SIDARI_CLOCK_HZ,
            pan: PanMode::LrSplit
        }).collect()
    }

    fn reset(&mut self) {}

    fn save_scalars<W: Write>(&self, wr: &mut StateWriter<W>) -> io::Result<()> {
        self.slot.save(wr)
    }

    fn load_scalars<R: Read>(&mut self, rd: &mut StateReader<R>) -> Result<(), LoadStateError> {
        self.slot = CardSlot::load(rd)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RegisterTarget::*;
    use xlsound_core::chip::ChipModel;

    #[test]
    fn sidari_decodes() {
        let card = Sidari::new(SidariVersion::Stereo, CardSlot(4));
        for (address, access, target) in vec![
            (0xD57F, Access::Read, None),
            (0xD580, Access::Read, Some(Constant(0x33))),
            (0xD580, Access::Write, Some(Register { chip: 0, index: 0 })),
            (0xD598, Access::Write, Some(Register { chip: 0, index: 0x18 })),
            (0xD599, Access::Write, Some(Ignored)),
            (0xD599, Access::Read, Some(Constant(0x33))),
            (0xD5A0, Access::Write, Some(Register { chip: 1, index: 0 })),
            (0xD5B8, Access::Write, Some(Register { chip: 1, index: 0x18 })),
            (0xD5BF, Access::Write, Some(Ignored)),
            (0xD5BF, Access::Read, Some(Constant(0x33))),
            (0xD5C0, Access::Read, None),
        ] {
            assert_eq!(card.decode(address, access), target, "{:04x}", address);
        }
        let card = Sidari::default();
        assert_eq!(card.span(), AddressSpan::new(0xD580, 0xD59F));
        assert!(!card.claims(0xD5A0));
    }

    #[test]
    fn sidari_chip_specs() {
        let timing = HostTiming::default();
        let card = Sidari::new(SidariVersion::Stereo, CardSlot(0));
        let specs = card.chip_specs(&timing, OutputFormat { channels: 2, bit16: true });
        assert_eq!(specs.len(), 2);
        for spec in specs.iter() {
            assert_eq!(spec.model, ChipModel::Sid(SidModel::Mos8580));
            assert_eq!(spec.clock_hz, SIDARI_CLOCK_HZ);
            assert_eq!(spec.pan, PanMode::LrSplit);
        }
        assert_eq!(PanMode::LrSplit.placement(1), xlsound_core::audio::Placement::Right);
        let mut wr = StateWriter::new(Vec::new());
        card.save_scalars(&mut wr).unwrap();
        assert_eq!(wr.into_inner(), vec![0, 0, 0, 0]);
    }
}
