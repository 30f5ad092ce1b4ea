/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The Melody card: two PSG chips with a relocatable register window.
use std::io::{self, Read, Write};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use xlsound_core::audio::OutputFormat;
use xlsound_core::bus::{Access, AddressRouter, AddressSpan, RegisterTarget};
use xlsound_core::chip::PsgModel;
use xlsound_core::clock::HostTiming;
use xlsound_core::savestate::{LoadStateError, StateReader, StateWriter};

use super::{
    abc_pan, load_psg_socket, save_psg_socket,
    CardLayout, ChipSpec, ChipSpecs, CARD_PAGE_BASE
};

/// The device index selecting the card.
pub const MELODY_DEVICE_INDEX: u8 = 0x50;
/// The signature read at `$D5D8-$D5DB`.
pub const MELODY_SIGNATURE: [u8;4] = [b'P', b'S', b'G', 0x02];
/// The byte read from the device index port.
pub const MELODY_ID: u8 = b'M';
/// The control register relocating the chip window.
pub const CONTROL_CHIP_BASE: u8 = 0;
/// The control register selecting a device.
pub const CONTROL_DEVICE_INDEX: u8 = 1;

const REGISTERS: AddressSpan = AddressSpan::new(0xD5D8, 0xD5DF);
const SIGNATURE_FIRST: u16 = 0xD5D8;
const SIGNATURE_LAST: u16 = 0xD5DB;
const CHIP_BASE_PORT: u16 = 0xD5DC;
const CONFIG_PORT: u16 = 0xD5DD;
const DEVICE_PORT: u16 = 0xD5DF;

bitflags! {
    /// The configuration register.
    #[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
    #[cfg_attr(feature = "snapshot", serde(from = "u8", into = "u8"))]
    #[derive(Default)]
    pub struct MelodyConfig: u8 {
        const SDA      = 0b0000_0001;
        const SCL      = 0b0000_0010;
        const GND      = 0b0000_0100;
        const RESERVED = 0b0001_1000;
        const DIV2     = 0b0010_0000;
        const MHZ2     = 0b0100_0000;
        /// Chips are held in reset.
        const RESET    = 0b1000_0000;
    }
}

impl From<u8> for MelodyConfig {
    fn from(data: u8) -> Self {
        MelodyConfig::from_bits_truncate(data)
    }
}

impl From<MelodyConfig> for u8 {
    fn from(config: MelodyConfig) -> u8 {
        config.bits()
    }
}

impl MelodyConfig {
    #[inline]
    pub fn is_reset(self) -> bool {
        self.intersects(MelodyConfig::RESET)
    }
    #[inline]
    pub fn is_mhz2(self) -> bool {
        self.intersects(MelodyConfig::MHZ2)
    }
    #[inline]
    pub fn is_div2(self) -> bool {
        self.intersects(MelodyConfig::DIV2)
    }
    #[inline]
    pub fn is_gnd(self) -> bool {
        self.intersects(MelodyConfig::GND)
    }
    #[inline]
    pub fn scl(self) -> bool {
        self.intersects(MelodyConfig::SCL)
    }
    #[inline]
    pub fn sda(self) -> bool {
        self.intersects(MelodyConfig::SDA)
    }
}

/// The Melody card layout.
///
/// The card registers live at `$D5D8-$D5DF`, the 4 byte chip window at `$D500` offset by
/// the chip base register. Everything except the device index port responds only while
/// [MELODY_DEVICE_INDEX] is selected.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct Melody {
    models: [Option<PsgModel>; 2],
    selected: [u8; 2],
    chip_base: u8,
    device_index: u8,
    config: MelodyConfig,
}

impl Default for Melody {
    fn default() -> Self {
        Melody::new([Some(PsgModel::Ay), Some(PsgModel::Ay)])
    }
}

impl Melody {
    pub fn new(models: [Option<PsgModel>; 2]) -> Self {
        Melody {
            models,
            selected: [0; 2],
            chip_base: 0,
            device_index: 0,
            config: MelodyConfig::empty(),
        }
    }
    /// Returns the chip models with `None` for empty sockets.
    #[inline]
    pub fn models(&self) -> [Option<PsgModel>; 2] {
        self.models
    }
    #[inline]
    pub fn chip_base(&self) -> u8 {
        self.chip_base
    }
    #[inline]
    pub fn device_index(&self) -> u8 {
        self.device_index
    }
    #[inline]
    pub fn config_flags(&self) -> MelodyConfig {
        self.config
    }
    /// Returns the addresses of the chip window.
    pub fn window(&self) -> AddressSpan {
        AddressSpan::with_len(CARD_PAGE_BASE + self.chip_base as u16, 4)
    }

    fn is_selected(&self) -> bool {
        self.device_index == MELODY_DEVICE_INDEX
    }

    fn window_target(&self, offset: u16, access: Access) -> RegisterTarget {
        let chip = (offset >> 1) as usize;
        if self.models[chip].is_none() {
            return RegisterTarget::Ignored
        }
        let index = (self.selected[chip] & 0x0F).into();
        match (offset & 1, access) {
            (0, Access::Read) => RegisterTarget::Register { chip, index },
            (_, Access::Read) => RegisterTarget::Select { chip, bank: 0 },
            _ if self.config.is_reset() => RegisterTarget::Ignored,
            (0, Access::Write) => RegisterTarget::Select { chip, bank: 0 },
            (_, Access::Write) => RegisterTarget::Register { chip, index },
        }
    }
}

impl AddressRouter for Melody {
    fn claims(&self, address: u16) -> bool {
        self.window().contains(address) || REGISTERS.contains(address)
    }

    fn decode(&self, address: u16, access: Access) -> Option<RegisterTarget> {
        if address == DEVICE_PORT {
            return Some(match access {
                Access::Read => RegisterTarget::Constant(MELODY_ID),
                Access::Write => RegisterTarget::Control(CONTROL_DEVICE_INDEX),
            })
        }
        if !self.claims(address) {
            return None
        }
        if !self.is_selected() {
            return Some(RegisterTarget::Ignored)
        }
        if let Some(offset) = self.window().offset(address) {
            return Some(self.window_target(offset, access))
        }
        Some(match (address, access) {
            (SIGNATURE_FIRST..=SIGNATURE_LAST, Access::Read) => {
                RegisterTarget::Constant(MELODY_SIGNATURE[(address - SIGNATURE_FIRST) as usize])
            }
            (CHIP_BASE_PORT, Access::Write) => RegisterTarget::Control(CONTROL_CHIP_BASE),
            (CONFIG_PORT, Access::Write) => RegisterTarget::Config,
            _ => RegisterTarget::Ignored
        })
    }
}

impl CardLayout for Melody {
    fn name(&self) -> &'static str {
        "Melody"
    }

    fn variant_code(&self) -> i32 {
        1
    }

    fn set_variant_code(&mut self, code: i32) -> Result<(), LoadStateError> {
        match code {
            1 => Ok(()),
            code => Err(LoadStateError::UnknownDiscriminant(code))
        }
    }

    fn chip_specs(&self, timing: &HostTiming, format: OutputFormat) -> ChipSpecs {
        self.models.iter().map(|model| ChipSpec {
            model: model.unwrap_or(PsgModel::Ay).into(),
            clock_hz: timing.tv.base_clock(),
            pan: abc_pan(format)
        }).collect()
    }
    /// Chips in empty sockets or held in reset are not heard.
    fn is_audible(&self, chip: usize) -> bool {
        !self.config.is_reset() && self.models.get(chip).map_or(false, Option::is_some)
    }

    /// Chips held in reset are stopped and resume where they were on release.
    fn is_clocked(&self, _chip: usize) -> bool {
        !self.config.is_reset()
    }

    fn selected(&self, chip: usize) -> u16 {
        self.selected.get(chip).copied().unwrap_or(0).into()
    }

    fn select(&mut self, chip: usize, index: u16) {
        if let Some(selected) = self.selected.get_mut(chip) {
            *selected = index as u8;
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

    fn write_control(&mut self, reg: u8, data: u8) {
        match reg {
            CONTROL_CHIP_BASE => self.chip_base = data & 0xE0,
            CONTROL_DEVICE_INDEX => self.device_index = data,
            _ => {}
        }
    }
    /// The device index survives the reset.
    fn reset(&mut self) {
        self.chip_base = 0;
        self.config = MelodyConfig::empty();
        self.selected = [0; 2];
    }

    fn save_scalars<W: Write>(&self, wr: &mut StateWriter<W>) -> io::Result<()> {
        for &model in self.models.iter() {
            save_psg_socket(wr, model)?;
        }
        wr.write_ubytes(&self.selected)?;
        wr.write_ubyte(self.chip_base)?;
        wr.write_ubyte(self.device_index)
    }

    fn load_scalars<R: Read>(&mut self, rd: &mut StateReader<R>) -> Result<(), LoadStateError> {
        for model in self.models.iter_mut() {
            *model = load_psg_socket(rd, "model")?;
        }
        rd.read_ubytes(&mut self.selected)?;
        self.chip_base = rd.read_ubyte()? & 0xE0;
        self.device_index = rd.read_ubyte()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RegisterTarget::*;
    use crate::card::PeripheralInstance;

    #[test]
    fn melody_decodes() {
        let mut card = Melody::new([Some(PsgModel::Ay), None]);
        assert!(card.claims(0xD500));
        assert!(card.claims(0xD5D8));
        assert!(!card.claims(0xD504));
        assert_eq!(card.decode(0xD5DF, Access::Read), Some(Constant(b'M')));
        assert_eq!(card.decode(0xD500, Access::Read), Some(Ignored));
        assert_eq!(card.decode(0xD5D8, Access::Read), Some(Ignored));
        assert_eq!(card.decode(0xD5DF, Access::Write), Some(Control(CONTROL_DEVICE_INDEX)));
        card.write_control(CONTROL_DEVICE_INDEX, MELODY_DEVICE_INDEX);
        card.select(0, 0x27);
        for (address, access, target) in vec![
            (0xD500, Access::Read, Some(Register { chip: 0, index: 7 })),
            (0xD500, Access::Write, Some(Select { chip: 0, bank: 0 })),
            (0xD501, Access::Read, Some(Select { chip: 0, bank: 0 })),
            (0xD501, Access::Write, Some(Register { chip: 0, index: 7 })),
            (0xD502, Access::Read, Some(Ignored)),
            (0xD503, Access::Write, Some(Ignored)),
            (0xD504, Access::Read, None),
            (0xD5D8, Access::Read, Some(Constant(b'P'))),
            (0xD5DB, Access::Read, Some(Constant(0x02))),
            (0xD5DB, Access::Write, Some(Ignored)),
            (0xD5DC, Access::Write, Some(Control(CONTROL_CHIP_BASE))),
            (0xD5DC, Access::Read, Some(Ignored)),
            (0xD5DD, Access::Write, Some(Config)),
            (0xD5DD, Access::Read, Some(Ignored)),
            (0xD5DE, Access::Read, Some(Ignored)),
            (0xD5E0, Access::Read, None),
        ] {
            assert_eq!(card.decode(address, access), target, "{:04x}", address);
        }
        // relocation
        card.write_control(CONTROL_CHIP_BASE, 0x3F);
        assert_eq!(card.chip_base(), 0x20);
        assert!(!card.claims(0xD500));
        assert_eq!(card.decode(0xD521, Access::Write), Some(Register { chip: 0, index: 7 }));
        // reset blocks window writes only
        assert!(card.write_config(0x80));
        assert_eq!(card.decode(0xD521, Access::Write), Some(Ignored));
        assert_eq!(card.decode(0xD520, Access::Write), Some(Ignored));
        assert_eq!(card.decode(0xD521, Access::Read), Some(Select { chip: 0, bank: 0 }));
        assert!(!card.is_audible(0));
        card.reset();
        assert_eq!(card.chip_base(), 0);
        assert_eq!(card.device_index(), MELODY_DEVICE_INDEX);
        assert!(card.is_audible(0));
        assert!(!card.is_audible(1));
    }

    #[test]
    fn melody_config_decodes() {
        let config = MelodyConfig::from(0xE7);
        assert!(config.is_reset() && config.is_mhz2() && config.is_div2());
        assert!(config.is_gnd() && config.scl() && config.sda());
        assert_eq!(u8::from(MelodyConfig::from(0x18)), 0x18);
    }

    #[test]
    fn melody_reset_stops_chips() {
        let layout = Melody::new([Some(PsgModel::Ay), Some(PsgModel::Ym)]);
        let mut card: PeripheralInstance<Melody> = PeripheralInstance::new(
            layout, HostTiming::default(), OutputFormat::default());
        card.write(0xD5DF, MELODY_DEVICE_INDEX);
        for (reg, data) in vec![(0, 0x20), (6, 0x03), (7, 0x36), (8, 0x10), (11, 0x08), (13, 0x0C)] {
            card.write(0xD500, reg);
            card.write(0xD501, data);
        }
        let mut out = vec![0i16; 882];
        assert_eq!(card.generate(35568, &mut out), 882);
        card.write(0xD5DD, 0x80);
        let frozen: Vec<_> = card.chips().iter().map(|chip| chip.snapshot()).collect();
        for _ in 0..3 {
            let mut out = vec![0i16; 882];
            assert_eq!(card.generate(35568, &mut out), 0);
            assert!(out.iter().all(|&s| s == 0));
            assert_eq!(card.fill(&mut out), 0);
        }
        for (chip, snapshot) in card.chips().iter().zip(frozen.iter()) {
            assert_eq!(&chip.snapshot(), snapshot);
        }
        // released from reset the chips carry on
        card.write(0xD5DD, 0x00);
        assert_eq!(card.chips()[0].snapshot(), frozen[0]);
        let mut out = vec![0i16; 882];
        assert_eq!(card.generate(35568, &mut out), 882);
        assert!(out.iter().any(|&s| s != 0));
        assert_ne!(card.chips()[0].snapshot(), frozen[0]);
        assert_eq!(card.chips()[0].registers()[8], 0x10);
    }

    #[test]
    fn melody_card_works() {
        let format = OutputFormat { channels: 2, bit16: true };
        let mut card: PeripheralInstance<Melody> = PeripheralInstance::new(
            Melody::default(), HostTiming::default(), format);
        assert_eq!(card.read(0xD5D8), 0xFF);
        card.write(0xD5DF, MELODY_DEVICE_INDEX);
        assert_eq!(card.read(0xD5D9), b'S');
        card.write(0xD5DC, 0x40);
        card.write(0xD542, 0x09);
        card.write(0xD543, 0x0F);
        card.write(0xD542, 0x07);
        card.write(0xD543, 0x3F);
        assert_eq!(card.read(0xD543), 0x07);
        assert_eq!(card.read(0xD542), 0x3F);
        let mut out = [0i16; 200];
        assert_eq!(card.fill(&mut out), 100);
        assert!(out.chunks(2).skip(1).all(|frame| frame[0] == frame[1] && frame[0] > 0));
        // held in reset the card is silent, state is kept
        card.write(0xD5DD, 0x80);
        let mut out = [0i16; 200];
        assert_eq!(card.fill(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0));
        card.write(0xD543, 0x00);
        assert_eq!(card.chips()[1].registers()[7], 0x3F);

        let mut wr = StateWriter::new(Vec::new());
        card.save_state(&mut wr).unwrap();
        let data = wr.into_inner();
        assert_eq!(&data[..4], &[1, 0, 0, 0]);
        assert_eq!(&data[data.len() - 13..], &[1, 0, 0, 0, 1, 0, 0, 0, 0, 0x07, 0x40, 0x50, 0x80]);
        let mut twin: PeripheralInstance<Melody> = PeripheralInstance::new(
            Melody::new([None, None]), HostTiming::default(), format);
        twin.load_state(&mut StateReader::new(&data[..])).unwrap();
        assert_eq!(twin.layout(), card.layout());
        assert_eq!(twin.chips()[1].registers()[9], 0x0F);
        assert_eq!(twin.read(0xD543), 0x07);
    }
}
