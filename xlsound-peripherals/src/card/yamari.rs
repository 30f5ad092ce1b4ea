/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The YAMari card: an OPL3 FM chip.
use std::io::{self, Read, Write};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use xlsound_core::audio::OutputFormat;
use xlsound_core::bus::{Access, AddressRouter, AddressSpan, RegisterTarget};
use xlsound_core::chip::FmModel;
use xlsound_core::clock::HostTiming;
use xlsound_core::savestate::{LoadStateError, StateReader, StateWriter};

use super::{abc_pan, CardLayout, CardSlot, ChipSpec, ChipSpecs};

/// The FM chip clock in Hz.
pub const YAMARI_CLOCK_HZ: f64 = 14_318_180.0;
/// The register index mask of the OPL3.
pub const FM_REGISTER_MASK: u16 = 0x1FF;

/// The YAMari card layout.
///
/// The even ports latch a register index of one of the two register banks, the odd ones write
/// the latched register. The first port reads the chip status.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct Yamari {
    slot: CardSlot,
    latched: u16,
}

impl Default for Yamari {
    fn default() -> Self {
        Yamari::new(CardSlot(0))
    }
}

impl Yamari {
    pub fn new(slot: CardSlot) -> Self {
        Yamari { slot, latched: 0 }
    }
    #[inline]
    pub fn slot(&self) -> CardSlot {
        self.slot
    }
    /// Returns the addresses claimed by the card.
    pub fn span(&self) -> AddressSpan {
        AddressSpan::with_len(self.slot.base(), 4)
    }
}

impl AddressRouter for Yamari {
    fn claims(&self, address: u16) -> bool {
        self.span().contains(address)
    }

    fn decode(&self, address: u16, access: Access) -> Option<RegisterTarget> {
        let offset = self.span().offset(address)?;
        Some(match (offset, access) {
            (0, Access::Read) => RegisterTarget::Status { chip: 0 },
            (0, Access::Write) => RegisterTarget::Select { chip: 0, bank: 0 },
            (2, Access::Write) => RegisterTarget::Select { chip: 0, bank: 0x100 },
            (_, Access::Write) => RegisterTarget::Register { chip: 0, index: self.latched },
            _ => RegisterTarget::Ignored
        })
    }
}

impl CardLayout for Yamari {
    fn name(&self) -> &'static str {
        "YAMari"
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

    fn chip_specs(&self, _timing: &HostTiming, format: OutputFormat) -> ChipSpecs {
        let mut specs = ChipSpecs::new();
        specs.push(ChipSpec {
            model: FmModel::Opl3.into(),
            clock_hz: YAMARI_CLOCK_HZ,
            pan: abc_pan(format)
        });
        specs
    }

    fn selected(&self, _chip: usize) -> u16 {
        self.latched
    }

    fn select(&mut self, _chip: usize, index: u16) {
        self.latched = index & FM_REGISTER_MASK;
    }

    fn reset(&mut self) {
        self.latched = 0;
    }

    fn save_scalars<W: Write>(&self, wr: &mut StateWriter<W>) -> io::Result<()> {
        self.slot.save(wr)?;
        wr.write_int(self.latched.into())
    }

    fn load_scalars<R: Read>(&mut self, rd: &mut StateReader<R>) -> Result<(), LoadStateError> {
        self.slot = CardSlot::load(rd)?;
        self.latched = rd.read_int_within("latched register", FM_REGISTER_MASK.into())? as u16;
        Ok(())
    }
}
