/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The SlightSID card: one or two SID chips at `$D500` with a configuration register.
use core::str::FromStr;
use std::io::{self, Read, Write};

use log::warn;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use xlsound_core::audio::{OutputFormat, PanMode};
use xlsound_core::bus::{Access, AddressRouter, RegisterTarget};
use xlsound_core::chip::SidModel;
use xlsound_core::clock::HostTiming;
use xlsound_core::savestate::{LoadStateError, StateReader, StateWriter};

use super::{CardLayout, ChipSpec, ChipSpecs, ParseConfigError, CARD_PAGE_BASE, SID_PRESENCE};
use super::sidari::SID_LAST_REGISTER;

/// The SID clock in Hz in the PAL mode.
pub const SLIGHTSID_PAL_CLOCK_HZ: f64 = 17_734_475.0 / 18.0;
/// The SID clock in Hz in the NTSC mode.
pub const SLIGHTSID_NTSC_CLOCK_HZ: f64 = 14_318_182.0 / 14.0;

const MONO_LAST: u16 = 0xD57F;
const STEREO_LAST: u16 = 0xD541;
const DATA_PORT: u16 = 0xD540;
const CONFIG_PORT: u16 = 0xD541;
const RIGHT_BASE: u16 = CARD_PAGE_BASE + 0x20;

bitflags! {
    /// The configuration register of a stereo card.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "snapshot", serde(from = "u8", into = "u8"))]
    pub struct SlightSidConfig: u8 {
        /// SID chips are clocked for the NTSC timing.
        const NTSC     = 0b0000_0001;
        /// Writes to either chip go to both.
        const PARALLEL = 0b0000_0010;
        /// Chips are held in reset when cleared.
        const RUN      = 0b0000_0100;
        const RESERVED = 0b1111_1000;
        const DEFAULT  = 0b1000_0100;
    }
}

impl Default for SlightSidConfig {
    fn default() -> Self {
        SlightSidConfig::DEFAULT
    }
}

impl From<u8> for SlightSidConfig {
    fn from(data: u8) -> Self {
        SlightSidConfig::from_bits_truncate(data)
    }
}

impl From<SlightSidConfig> for u8 {
    fn from(config: SlightSidConfig) -> u8 {
        config.bits()
    }
}

impl SlightSidConfig {
    #[inline]
    pub fn is_ntsc(self) -> bool {
        self.intersects(SlightSidConfig::NTSC)
    }
    #[inline]
    pub fn is_parallel(self) -> bool {
        self.intersects(SlightSidConfig::PARALLEL)
    }
    #[inline]
    pub fn is_reset(self) -> bool {
        !self.intersects(SlightSidConfig::RUN)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum SlightSidVersion {
    Mono,
    Stereo,
}

impl SlightSidVersion {
    #[inline]
    pub fn chip_count(self) -> usize {
        match self {
            SlightSidVersion::Mono => 1,
            SlightSidVersion::Stereo => 2,
        }
    }
}

impl FromStr for SlightSidVersion {
    type Err = ParseConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.eq_ignore_ascii_case("mono") {
            Ok(SlightSidVersion::Mono)
        }
        else if name.eq_ignore_ascii_case("stereo") {
            Ok(SlightSidVersion::Stereo)
        }
        else {
            Err(ParseConfigError::new("version"))
        }
    }
}

/// The SlightSID card layout.
///
/// The mono card mirrors its SID registers over `$D500-$D57F`. The stereo card has the left
/// chip at `$D500`, the right one at `$D520` and the configuration register at `$D541`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct SlightSid {
    version: SlightSidVersion,
    config: SlightSidConfig,
}

impl Default for SlightSidVersion {
    fn default() -> Self {
        SlightSidVersion::Mono
    }
}

impl SlightSid {
    pub fn new(version: SlightSidVersion) -> Self {
        SlightSid { version, config: SlightSidConfig::default() }
    }
    #[inline]
    pub fn version(&self) -> SlightSidVersion {
        self.version
    }
    #[inline]
    pub fn config_flags(&self) -> SlightSidConfig {
        self.config
    }

    fn is_stereo(&self) -> bool {
        self.version == SlightSidVersion::Stereo
    }

    fn last_address(&self) -> u16 {
        if self.is_stereo() { STEREO_LAST } else { MONO_LAST }
    }

    fn decode_stereo_write(&self, address: u16) -> RegisterTarget {
        let (chip, index) = match address {
            CONFIG_PORT => return RegisterTarget::Config,
            CARD_PAGE_BASE..=0xD518 => (0, address - CARD_PAGE_BASE),
            RIGHT_BASE..=0xD538 => (1, address - RIGHT_BASE),
            _ => return RegisterTarget::Ignored
        };
        if self.config.is_reset() {
            RegisterTarget::Ignored
        }
        else {
            RegisterTarget::Register { chip, index }
        }
    }
}

impl AddressRouter for SlightSid {
    fn claims(&self, address: u16) -> bool {
        (CARD_PAGE_BASE..=self.last_address()).contains(&address)
    }

    fn decode(&self, address: u16, access: Access) -> Option<RegisterTarget> {
        if !self.claims(address) {
            return None
        }
        Some(match (self.version, access) {
            (SlightSidVersion::Mono, Access::Read) => RegisterTarget::Constant(SID_PRESENCE),
            (SlightSidVersion::Mono, Access::Write) => match (address & 0xFF9F) - CARD_PAGE_BASE {
                index @ 0..=SID_LAST_REGISTER => RegisterTarget::Register { chip: 0, index },
                _ => RegisterTarget::Ignored
            },
            (SlightSidVersion::Stereo, Access::Read) => match address {
                DATA_PORT => RegisterTarget::Ignored,
                CONFIG_PORT => RegisterTarget::Config,
                _ => RegisterTarget::Constant(SID_PRESENCE)
            },
            (SlightSidVersion::Stereo, Access::Write) => self.decode_stereo_write(address)
        })
    }
}

impl CardLayout for SlightSid {
    fn name(&self) -> &'static str {
        "SlightSID"
    }

    fn variant_code(&self) -> i32 {
        self.version.chip_count() as i32
    }

    fn set_variant_code(&mut self, code: i32) -> Result<(), LoadStateError> {
        self.version = match code {
            1 => SlightSidVersion::Mono,
            2 => SlightSidVersion::Stereo,
            code => return Err(LoadStateError::UnknownDiscriminant(code))
        };
        Ok(())
    }

    fn chip_specs(&self, _timing: &HostTiming, _format: OutputFormat) -> ChipSpecs {
        let (clock_hz, pan) = if self.is_stereo() {
            let clock_hz = if self.config.is_ntsc() {
                SLIGHTSID_NTSC_CLOCK_HZ
            }
            else {
                SLIGHTSID_PAL_CLOCK_HZ
            };
            (clock_hz, PanMode::LrSplit)
        }
        else {
            (SLIGHTSID_PAL_CLOCK_HZ, PanMode::Mono)
        };
        (0..self.version.chip_count()).map(|_| ChipSpec {
            model: SidModel::Mos8580.into(),
            clock_hz,
            pan
        }).collect()
    }

    fn mirror_of(&self, chip: usize) -> Option<usize> {
        if self.is_stereo() && self.config.is_parallel() {
            Some(chip ^ 1)
        }
        else {
            None
        }
    }

    /// Stereo chips are stopped while held in reset.
    fn is_clocked(&self, _chip: usize) -> bool {
        !(self.is_stereo() && self.config.is_reset())
    }

    fn config(&self) -> Option<u8> {
        if self.is_stereo() {
            Some(self.config.bits())
        }
        else {
            None
        }
    }
    /// Only values with an even number of bits set are accepted.
    fn write_config(&mut self, data: u8) -> bool {
        if data.count_ones() & 1 == 0 {
            self.config = data.into();
            true
        }
        else {
            warn!("SlightSID configuration rejected, odd parity: {:02x}", data);
            false
        }
    }

    fn restore_config(&mut self, data: u8) {
        self.config = data.into();
    }

    fn reset(&mut self) {
        if self.is_stereo() {
            self.config = SlightSidConfig::default();
        }
    }

    fn save_scalars<W: Write>(&self, _wr: &mut StateWriter<W>) -> io::Result<()> {
        Ok(())
    }

    fn load_scalars<R: Read>(&mut self, _rd: &mut StateReader<R>) -> Result<(), LoadStateError> {
        Ok(())
    }
}
