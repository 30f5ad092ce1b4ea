/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The Evie card: a SID and a PSG chip in the `$D2xx` page.
use core::fmt;
use core::str::FromStr;
use std::io::{self, Read, Write};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use xlsound_core::audio::{OutputFormat, PanMode};
use xlsound_core::bus::{Access, AddressRouter, RegisterTarget};
use xlsound_core::chip::{PsgModel, SidModel};
use xlsound_core::clock::HostTiming;
use xlsound_core::savestate::{LoadStateError, StateReader, StateWriter};

use super::{CardLayout, ChipSpec, ChipSpecs, ParseConfigError, CARD_PAGE_BASE, SID_PRESENCE};

/// The signature read at offsets `0x3A..=0x3D`.
pub const EVIE_SIGNATURE: [u8;4] = *b"Evie";
/// The crystal clock of the first hardware revision in Hz.
pub const EVIE_V1_CRYSTAL_HZ: f64 = 24_576_000.0;

const PAGE_FIRST: u16 = 0xD280;
const PAGE_LAST: u16 = 0xD2FF;
const SID_D5_LAST: u16 = CARD_PAGE_BASE + 0x1F;

const SID: usize = 0;
const PSG: usize = 1;

bitflags! {
    /// The configuration register.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "snapshot", serde(from = "u8", into = "u8"))]
    #[derive(Default)]
    pub struct EvieConfig: u8 {
        /// The SID model index.
        const SID_MODEL       = 0b0000_0011;
        /// The PSG clock is halved.
        const PSG_DIV2        = 0b0000_0100;
        /// The PSG is clocked at about 2 MHz.
        const PSG_2MHZ        = 0b0000_1000;
        const LED_SCROLL_LOCK = 0b0001_0000;
        const LED_NUM_LOCK    = 0b0010_0000;
        const LED_CAPS_LOCK   = 0b0100_0000;
        /// The SID registers are also available at `$D500`.
        const SID_D5          = 0b1000_0000;
        const LEDS = Self::LED_SCROLL_LOCK.bits | Self::LED_NUM_LOCK.bits | Self::LED_CAPS_LOCK.bits;
    }
}

impl From<u8> for EvieConfig {
    fn from(data: u8) -> Self {
        EvieConfig::from_bits_truncate(data)
    }
}

impl From<EvieConfig> for u8 {
    fn from(config: EvieConfig) -> u8 {
        config.bits()
    }
}

impl EvieConfig {
    /// Returns the selected SID model.
    pub fn sid_model(self) -> SidModel {
        match (self & EvieConfig::SID_MODEL).bits() {
            0 => SidModel::FilterNone,
            1 => SidModel::FilterLinear,
            2 => SidModel::Mos6581,
            _ => SidModel::Mos8580
        }
    }
    #[inline]
    pub fn is_psg_div2(self) -> bool {
        self.intersects(EvieConfig::PSG_DIV2)
    }
    #[inline]
    pub fn is_psg_2mhz(self) -> bool {
        self.intersects(EvieConfig::PSG_2MHZ)
    }
    #[inline]
    pub fn is_sid_d5(self) -> bool {
        self.intersects(EvieConfig::SID_D5)
    }
    /// Returns the state of the keyboard LEDs.
    #[inline]
    pub fn leds(self) -> EvieConfig {
        self & EvieConfig::LEDS
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum EvieVersion {
    V1,
    V2,
}

impl Default for EvieVersion {
    fn default() -> Self {
        EvieVersion::V2
    }
}

impl EvieVersion {
    /// Returns the byte read from the version register.
    #[inline]
    pub fn version_byte(self) -> u8 {
        match self {
            EvieVersion::V1 => 0x10,
            EvieVersion::V2 => 0x20,
        }
    }
}

impl FromStr for EvieVersion {
    type Err = ParseConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim_start_matches(|c| c == 'v' || c == 'V') {
            "1"|"1.0" => Ok(EvieVersion::V1),
            "2"|"2.0" => Ok(EvieVersion::V2),
            _ => Err(ParseConfigError::new("version"))
        }
    }
}

impl fmt::Display for EvieVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EvieVersion::V1 => "v1.0",
            EvieVersion::V2 => "v2.0",
        })
    }
}

/// The Evie card layout.
///
/// The SID is at offsets `0x00..=0x1F`, the PSG registers are directly at `0x20..=0x2F` and
/// indirectly through ports `0x30` and `0x31`. The page is mirrored every 64 bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct Evie {
    version: EvieVersion,
    config: EvieConfig,
    selected: u8,
}

impl Evie {
    pub fn new(version: EvieVersion) -> Self {
        Evie { version, ..Default::default() }
    }
    #[inline]
    pub fn version(&self) -> EvieVersion {
        self.version
    }
    #[inline]
    pub fn config_flags(&self) -> EvieConfig {
        self.config
    }

    fn claims_d5(&self, address: u16) -> bool {
        self.config.is_sid_d5() && address >= CARD_PAGE_BASE && (address & 0xFFBF) <= SID_D5_LAST
    }

    fn sid_target(offset: u16, access: Access) -> RegisterTarget {
        match (offset, access) {
            (0x19..=0x1C, Access::Read)|(_, Access::Write) => {
                RegisterTarget::Register { chip: SID, index: offset }
            }
            (_, Access::Read) => RegisterTarget::Constant(SID_PRESENCE)
        }
    }

    fn page_target(&self, offset: u16, access: Access) -> RegisterTarget {
        let selected = (self.selected & 0x0F).into();
        match (offset, access) {
            (0x00..=0x1F, _) => Evie::sid_target(offset, access),
            (0x20..=0x2F, _) => RegisterTarget::Register { chip: PSG, index: offset - 0x20 },
            (0x30, Access::Read)|(0x31, Access::Write) => {
                RegisterTarget::Register { chip: PSG, index: selected }
            }
            (0x30, Access::Write)|(0x31, Access::Read) => RegisterTarget::Select { chip: PSG, bank: 0 },
            (0x3A..=0x3D, Access::Read) => {
                RegisterTarget::Constant(EVIE_SIGNATURE[(offset - 0x3A) as usize])
            }
            (0x3E, Access::Read) => RegisterTarget::Constant(self.version.version_byte()),
            (0x3F, _) => RegisterTarget::Config,
            _ => RegisterTarget::Ignored
        }
    }

    fn sid_clock(&self, base: f64) -> f64 {
        match self.version {
            EvieVersion::V1 => EVIE_V1_CRYSTAL_HZ * 5.0 / 128.0,
            EvieVersion::V2 => base * 10.0 / 18.0,
        }
    }

    fn psg_clock(&self, base: f64) -> f64 {
        let clock = if self.config.is_psg_2mhz() {
            match self.version {
                EvieVersion::V1 => EVIE_V1_CRYSTAL_HZ * 5.0 / 64.0,
                EvieVersion::V2 => base * 22.0 / (1.5 * 13.0),
            }
        }
        else {
            base
        };
        if self.config.is_psg_div2() { clock / 2.0 } else { clock }
    }
}

impl AddressRouter for Evie {
    fn claims(&self, address: u16) -> bool {
        (PAGE_FIRST..=PAGE_LAST).contains(&address) || self.claims_d5(address)
    }

    fn decode(&self, address: u16, access: Access) -> Option<RegisterTarget> {
        if (PAGE_FIRST..=PAGE_LAST).contains(&address) {
            Some(self.page_target(address & 0x3F, access))
        }
        else if self.claims_d5(address) {
            Some(Evie::sid_target(address & 0x1F, access))
        }
        else {
            None
        }
    }
}

impl CardLayout for Evie {
    fn name(&self) -> &'static str {
        "Evie"
    }

    fn variant_code(&self) -> i32 {
        match self.version {
            EvieVersion::V1 => 1,
            EvieVersion::V2 => 2,
        }
    }

    fn set_variant_code(&mut self, code: i32) -> Result<(), LoadStateError> {
        self.version = match code {
            1 => EvieVersion::V1,
            2 => EvieVersion::V2,
            code => return Err(LoadStateError::UnknownDiscriminant(code))
        };
        Ok(())
    }

    fn chip_specs(&self, timing: &HostTiming, format: OutputFormat) -> ChipSpecs {
        let base = timing.tv.base_clock();
        let psg_pan = if format.is_stereo() && self.version == EvieVersion::V2 {
            PanMode::AbcStereo
        }
        else {
            PanMode::Mono
        };
        let mut specs = ChipSpecs::new();
        specs.push(ChipSpec {
            model: self.config.sid_model().into(),
            clock_hz: self.sid_clock(base),
            pan: PanMode::Mono
        });
        specs.push(ChipSpec {
            model: PsgModel::Ym.into(),
            clock_hz: self.psg_clock(base),
            pan: psg_pan
        });
        specs
    }

    fn selected(&self, chip: usize) -> u16 {
        if chip == PSG { self.selected.into() } else { 0 }
    }

    fn select(&mut self, chip: usize, index: u16) {
        if chip == PSG {
            self.selected = index as u8;
        }
    }

    fn config(&self) -> Option<u8> {
        Some(self.config.bits())
    }

    fn write_config(&mut self, data: u8) -> bool {
        self.config = data.into();
        true
    }

    fn restore_config(&mut self, data: u8) {
        self.config = data.into();
    }

    fn reset(&mut self) {
        self.config = EvieConfig::empty();
        self.selected = 0;
    }

    fn save_scalars<W: Write>(&self, wr: &mut StateWriter<W>) -> io::Result<()> {
        wr.write_ubyte(self.selected)
    }

    fn load_scalars<R: Read>(&mut self, rd: &mut StateReader<R>) -> Result<(), LoadStateError> {
        self.selected = rd.read_ubyte()?;
        Ok(())
    }
}
