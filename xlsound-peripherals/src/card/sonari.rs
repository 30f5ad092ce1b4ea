/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The SONari card: one or two PSG chips with indirect register access.
use core::fmt;
use core::str::FromStr;
use std::io::{self, Read, Write};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use xlsound_core::audio::OutputFormat;
use xlsound_core::bus::{Access, AddressRouter, AddressSpan, RegisterTarget};
use xlsound_core::chip::PsgModel;
use xlsound_core::clock::HostTiming;
use xlsound_core::savestate::{LoadStateError, StateReader, StateWriter};

use crate::psg::SIGNATURE_REGISTER;
use super::{
    abc_pan, load_psg_socket, save_psg_socket,
    CardLayout, CardSlot, ChipSpec, ChipSpecs, ParseConfigError
};

/// The byte read from the signature register of an AY chip.
pub const SIGNATURE_AY: u8 = b'S' | 0x80;
/// The byte read from the signature register of a YM chip.
pub const SIGNATURE_YM: u8 = b'S';
/// The byte read from the register following the signature register.
pub const SIGNATURE_TAIL: u8 = b'N';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum SonariVersion {
    Mono,
    Stereo,
}

impl SonariVersion {
    #[inline]
    pub fn chip_count(self) -> usize {
        match self {
            SonariVersion::Mono => 1,
            SonariVersion::Stereo => 2,
        }
    }
}

impl FromStr for SonariVersion {
    type Err = ParseConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.eq_ignore_ascii_case("mono") {
            Ok(SonariVersion::Mono)
        }
        else if name.eq_ignore_ascii_case("stereo") {
            Ok(SonariVersion::Stereo)
        }
        else {
            Err(ParseConfigError::new("version"))
        }
    }
}

impl fmt::Display for SonariVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SonariVersion::Mono => "mono",
            SonariVersion::Stereo => "stereo",
        })
    }
}

/// The SONari card layout.
///
/// Each chip occupies two consecutive addresses. The even one writes the register-select latch
/// and reads the selected register, the odd one writes the selected register and reads the latch.
/// Selecting registers `0x0E` and `0x0F` reads the card signature instead.
///
/// An empty chip socket decodes to nothing and is never heard.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct Sonari {
    version: SonariVersion,
    slot: CardSlot,
    models: [Option<PsgModel>; 2],
    selected: [u8; 2],
}

impl Default for Sonari {
    fn default() -> Self {
        Sonari {
            version: SonariVersion::Mono,
            slot: CardSlot(3),
            models: [Some(PsgModel::Ay), Some(PsgModel::Ay)],
            selected: [0; 2],
        }
    }
}

impl Sonari {
    pub fn new(version: SonariVersion, slot: CardSlot, models: [Option<PsgModel>; 2]) -> Self {
        Sonari { version, slot, models, selected: [0; 2] }
    }
    #[inline]
    pub fn version(&self) -> SonariVersion {
        self.version
    }
    #[inline]
    pub fn slot(&self) -> CardSlot {
        self.slot
    }
    /// Returns the chip models with `None` for empty sockets.
    #[inline]
    pub fn models(&self) -> [Option<PsgModel>; 2] {
        self.models
    }
    /// Returns the addresses claimed by the card.
    pub fn span(&self) -> AddressSpan {
        AddressSpan::with_len(self.slot.base(), 2 * self.version.chip_count() as u16)
    }

    fn selected_index(&self, chip: usize) -> u8 {
        self.selected[chip] & 0x0F
    }
}

impl AddressRouter for Sonari {
    fn claims(&self, address: u16) -> bool {
        self.span().contains(address)
    }

    fn decode(&self, address: u16, access: Access) -> Option<RegisterTarget> {
        let offset = self.span().offset(address)?;
        let chip = (offset >> 1) as usize;
        let model = match self.models[chip] {
            Some(model) => model,
            None => return Some(RegisterTarget::Ignored)
        };
        Some(match (offset & 1, access) {
            (0, Access::Read) => match self.selected_index(chip) {
                SIGNATURE_REGISTER => RegisterTarget::Constant(match model {
                    PsgModel::Ay => SIGNATURE_AY,
                    PsgModel::Ym => SIGNATURE_YM,
                }),
                0x0F => RegisterTarget::Constant(SIGNATURE_TAIL),
                index => RegisterTarget::Register { chip, index: index.into() }
            },
            (0, Access::Write)|(_, Access::Read) => RegisterTarget::Select { chip, bank: 0 },
            (_, Access::Write) => RegisterTarget::Register {
                chip, index: self.selected_index(chip).into()
            }
        })
    }
}

impl CardLayout for Sonari {
    fn name(&self) -> &'static str {
        "SONari"
    }

    fn variant_code(&self) -> i32 {
        self.version.chip_count() as i32
    }

    fn set_variant_code(&mut self, code: i32) -> Result<(), LoadStateError> {
        self.version = match code {
            1 => SonariVersion::Mono,
            2 => SonariVersion::Stereo,
            code => return Err(LoadStateError::UnknownDiscriminant(code))
        };
        Ok(())
    }

    fn chip_specs(&self, timing: &HostTiming, format: OutputFormat) -> ChipSpecs {
        self.models[..self.version.chip_count()].iter().map(|model| ChipSpec {
            model: model.unwrap_or(PsgModel::Ay).into(),
            clock_hz: timing.tv.base_clock(),
            pan: abc_pan(format)
        }).collect()
    }

    fn is_audible(&self, chip: usize) -> bool {
        self.models.get(chip).map_or(false, Option::is_some)
    }

    fn selected(&self, chip: usize) -> u16 {
        self.selected.get(chip).copied().unwrap_or(0).into()
    }

    fn select(&mut self, chip: usize, index: u16) {
        if let Some(selected) = self.selected.get_mut(chip) {
            *selected = index as u8;
        }
    }

    fn reset(&mut self) {
        self.selected = [0; 2];
    }

    fn save_scalars<W: Write>(&self, wr: &mut StateWriter<W>) -> io::Result<()> {
        self.slot.save(wr)?;
        for chip in 0..self.version.chip_count() {
            save_psg_socket(wr, self.models[chip])?;
            wr.write_ubyte(self.selected[chip])?;
        }
        Ok(())
    }

    fn load_scalars<R: Read>(&mut self, rd: &mut StateReader<R>) -> Result<(), LoadStateError> {
        self.slot = CardSlot::load(rd)?;
        for chip in 0..self.version.chip_count() {
            self.models[chip] = load_psg_socket(rd, "model")?;
            self.selected[chip] = rd.read_ubyte()?;
        }
        Ok(())
    }
}
