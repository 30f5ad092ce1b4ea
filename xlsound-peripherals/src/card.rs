/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Memory-mapped add-on sound cards.
//!
//! Every card is emulated by the same [PeripheralInstance] driven by a [CardLayout]: the
//! address map of the card, the chips it carries and its configuration registers. The
//! supported cards are:
//!
//! * [Sonari] - one or two PSG chips in a `$D5xx` slot.
//! * [Sidari] - one or two SID chips in a `$D5xx` slot.
//! * [SlightSid] - one or two SID chips at `$D500` with a configuration register.
//! * [Evie] - a SID and a PSG chip in the `$D2xx` page.
//! * [Melody] - two PSG chips with a relocatable register window in the `$D5xx` page.
//! * [Yamari] - an OPL3 FM chip in a `$D5xx` slot.
//!
//! [Card] selects any of them at run time.
use core::convert::TryFrom;
use core::fmt;
use core::mem;
use core::str::FromStr;
use std::io::{self, Read, Write};

use arrayvec::ArrayVec;
use log::{debug, warn};

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use xlsound_core::audio::{OutputFormat, OutputSample, PanMode, Placement, SampleRun};
use xlsound_core::bus::{read_or_float, Access, AddressRouter, RegisterTarget, FLOATING_BUS};
use xlsound_core::chip::{ChipHandle, ChipKind, ChipModel, EngineConfig, PsgModel, StateSnapshot};
use xlsound_core::clock::HostTiming;
use xlsound_core::savestate::{LoadStateError, StateReader, StateWriter};

use crate::engine::{DefaultEngines, EngineFactory};

pub mod evie;
pub mod melody;
pub mod sidari;
pub mod slightsid;
pub mod sonari;
pub mod yamari;

pub use evie::{Evie, EvieConfig, EvieVersion};
pub use melody::{Melody, MelodyConfig};
pub use sidari::{Sidari, SidariVersion};
pub use slightsid::{SlightSid, SlightSidConfig, SlightSidVersion};
pub use sonari::{Sonari, SonariVersion};
pub use yamari::Yamari;

/// The maximum number of chips on a single card.
pub const MAX_CHIPS: usize = 2;
/// The first address of the cartridge control page.
pub const CARD_PAGE_BASE: u16 = 0xD500;
/// The distance between consecutive card slots.
pub const SLOT_STRIDE: u16 = 0x20;
/// The value of unused SID registers on cards announcing the chip presence.
pub const SID_PRESENCE: u8 = 0x33;

/// The chips to be built for a card.
pub type ChipSpecs = ArrayVec<ChipSpec, MAX_CHIPS>;

/// An error returned when parsing a card configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfigError {
    what: &'static str,
}

impl ParseConfigError {
    pub fn new(what: &'static str) -> Self {
        ParseConfigError { what }
    }
    /// Returns the name of the configuration value which failed to parse.
    pub fn what(&self) -> &'static str {
        self.what
    }
}

impl fmt::Display for ParseConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized card {}", self.what)
    }
}

impl std::error::Error for ParseConfigError {}

/// A card slot selecting the base address in the `$D5xx` page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(try_from = "u8", into = "u8"))]
pub struct CardSlot(u8);

impl CardSlot {
    /// The highest slot number.
    pub const MAX: u8 = 7;

    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }
    /// Returns the base address of the slot.
    #[inline]
    pub fn base(self) -> u16 {
        CARD_PAGE_BASE + SLOT_STRIDE * self.0 as u16
    }

    pub(crate) fn save<W: Write>(self, wr: &mut StateWriter<W>) -> io::Result<()> {
        wr.write_int(self.0.into())
    }

    pub(crate) fn load<R: Read>(rd: &mut StateReader<R>) -> Result<Self, LoadStateError> {
        rd.read_int_within("slot", CardSlot::MAX.into()).map(|index| CardSlot(index as u8))
    }
}

impl TryFrom<u8> for CardSlot {
    type Error = ParseConfigError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        if index <= CardSlot::MAX {
            Ok(CardSlot(index))
        }
        else {
            Err(ParseConfigError::new("slot"))
        }
    }
}

impl From<CardSlot> for u8 {
    fn from(slot: CardSlot) -> u8 {
        slot.0
    }
}

impl FromStr for CardSlot {
    type Err = ParseConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        name.trim().parse::<u8>()
            .map_err(|_| ParseConfigError::new("slot"))
            .and_then(CardSlot::try_from)
    }
}

/// Parses a model of an optional PSG chip. `"none"` stands for an empty socket.
pub fn parse_psg_socket(name: &str) -> Result<Option<PsgModel>, ParseConfigError> {
    if name.eq_ignore_ascii_case("none") {
        Ok(None)
    }
    else {
        name.parse().map(Some).map_err(|_| ParseConfigError::new("chip model"))
    }
}

pub(crate) fn save_psg_socket<W: Write>(
        wr: &mut StateWriter<W>,
        socket: Option<PsgModel>
    ) -> io::Result<()>
{
    wr.write_int(match socket {
        None => 0,
        Some(PsgModel::Ay) => 1,
        Some(PsgModel::Ym) => 2
    })
}

pub(crate) fn load_psg_socket<R: Read>(
        rd: &mut StateReader<R>,
        name: &'static str
    ) -> Result<Option<PsgModel>, LoadStateError>
{
    Ok(match rd.read_int_within(name, 2)? {
        0 => None,
        1 => Some(PsgModel::Ay),
        _ => Some(PsgModel::Ym)
    })
}

/// Pan mode of chips rendering their own stereo split when the host has a stereo output.
#[inline]
pub(crate) fn abc_pan(format: OutputFormat) -> PanMode {
    if format.is_stereo() { PanMode::AbcStereo } else { PanMode::Mono }
}

/// A chip to be built for a card.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChipSpec {
    pub model: ChipModel,
    /// The chip clock in Hz.
    pub clock_hz: f64,
    pub pan: PanMode,
}

impl ChipSpec {
    #[inline]
    pub fn kind(&self) -> ChipKind {
        self.model.kind()
    }
    /// Returns the engine configuration for the given playback `sample_rate`.
    pub fn engine_config(&self, sample_rate: u32) -> EngineConfig {
        EngineConfig {
            clock_hz: self.clock_hz,
            model: self.model,
            pan: self.pan,
            sample_rate,
        }
    }
}

/// The variant specific part of a sound card: the address map, the chips and the registers
/// of the card itself.
///
/// [AddressRouter::decode] resolves data ports of indirectly addressed chips to the currently
/// selected register. Chip kinds returned by [CardLayout::chip_specs] depend on the variant
/// alone.
pub trait CardLayout: AddressRouter + Clone {
    /// Returns the name of the card.
    fn name(&self) -> &'static str;
    /// Returns the save-state discriminant of the configured variant. It's never 0.
    fn variant_code(&self) -> i32;
    /// Changes the variant according to the save-state discriminant.
    fn set_variant_code(&mut self, code: i32) -> Result<(), LoadStateError>;
    /// Returns the chips the card should be built with.
    fn chip_specs(&self, timing: &HostTiming, format: OutputFormat) -> ChipSpecs;
    /// Returns `false` if the chip at `index` should not be heard.
    fn is_audible(&self, _chip: usize) -> bool {
        true
    }
    /// Returns `false` if the chip at `index` is held still: it renders nothing and its clock
    /// doesn't advance. By default only audible chips are clocked.
    fn is_clocked(&self, chip: usize) -> bool {
        self.is_audible(chip)
    }
    /// Returns the value of the register-select latch of the given `chip`.
    fn selected(&self, _chip: usize) -> u16 {
        0
    }
    /// Sets the register-select latch of the given `chip`.
    fn select(&mut self, _chip: usize, _index: u16) {}
    /// Returns the index of a chip receiving copies of register writes to the given `chip`.
    fn mirror_of(&self, _chip: usize) -> Option<usize> {
        None
    }
    /// Returns the value of the configuration register if the card has one.
    fn config(&self) -> Option<u8> {
        None
    }
    /// Handles a bus write to the configuration register.
    ///
    /// Returns `true` if the value was accepted and the chips have to be rebuilt.
    fn write_config(&mut self, _data: u8) -> bool {
        false
    }
    /// Applies a configuration register value loaded from a save-state.
    fn restore_config(&mut self, _data: u8) {}
    /// Handles a bus write to a card specific control register.
    fn write_control(&mut self, _reg: u8, _data: u8) {}
    /// Restores the power-on state of card registers.
    fn reset(&mut self);
    /// Writes card scalars to a save-state.
    fn save_scalars<W: Write>(&self, wr: &mut StateWriter<W>) -> io::Result<()>;
    /// Reads card scalars from a save-state.
    fn load_scalars<R: Read>(&mut self, rd: &mut StateReader<R>) -> Result<(), LoadStateError>;
}

/// Any of the supported cards.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum Card {
    Sonari(Sonari),
    Sidari(Sidari),
    SlightSid(SlightSid),
    Evie(Evie),
    Melody(Melody),
    Yamari(Yamari),
}

macro_rules! dispatch_card {
    ($card:expr, $layout:ident => $body:expr) => {
        match $card {
            Card::Sonari($layout) => $body,
            Card::Sidari($layout) => $body,
            Card::SlightSid($layout) => $body,
            Card::Evie($layout) => $body,
            Card::Melody($layout) => $body,
            Card::Yamari($layout) => $body,
        }
    };
}

macro_rules! card_from {
    ($($variant:ident),*) => {$(
        impl From<$variant> for Card {
            fn from(layout: $variant) -> Self {
                Card::$variant(layout)
            }
        }
    )*};
}

card_from!(Sonari, Sidari, SlightSid, Evie, Melody, Yamari);

impl AddressRouter for Card {
    fn claims(&self, address: u16) -> bool {
        dispatch_card!(self, layout => layout.claims(address))
    }

    fn decode(&self, address: u16, access: Access) -> Option<RegisterTarget> {
        dispatch_card!(self, layout => layout.decode(address, access))
    }
}

impl CardLayout for Card {
    fn name(&self) -> &'static str {
        dispatch_card!(self, layout => layout.name())
    }
    fn variant_code(&self) -> i32 {
        dispatch_card!(self, layout => layout.variant_code())
    }
    fn set_variant_code(&mut self, code: i32) -> Result<(), LoadStateError> {
        dispatch_card!(self, layout => layout.set_variant_code(code))
    }
    fn chip_specs(&self, timing: &HostTiming, format: OutputFormat) -> ChipSpecs {
        dispatch_card!(self, layout => layout.chip_specs(timing, format))
    }
    fn is_audible(&self, chip: usize) -> bool {
        dispatch_card!(self, layout => layout.is_audible(chip))
    }
    fn is_clocked(&self, chip: usize) -> bool {
        dispatch_card!(self, layout => layout.is_clocked(chip))
    }
    fn selected(&self, chip: usize) -> u16 {
        dispatch_card!(self, layout => layout.selected(chip))
    }
    fn select(&mut self, chip: usize, index: u16) {
        dispatch_card!(self, layout => layout.select(chip, index))
    }
    fn mirror_of(&self, chip: usize) -> Option<usize> {
        dispatch_card!(self, layout => layout.mirror_of(chip))
    }
    fn config(&self) -> Option<u8> {
        dispatch_card!(self, layout => layout.config())
    }
    fn write_config(&mut self, data: u8) -> bool {
        dispatch_card!(self, layout => layout.write_config(data))
    }
    fn restore_config(&mut self, data: u8) {
        dispatch_card!(self, layout => layout.restore_config(data))
    }
    fn write_control(&mut self, reg: u8, data: u8) {
        dispatch_card!(self, layout => layout.write_control(reg, data))
    }
    fn reset(&mut self) {
        dispatch_card!(self, layout => layout.reset())
    }
    fn save_scalars<W: Write>(&self, wr: &mut StateWriter<W>) -> io::Result<()> {
        dispatch_card!(self, layout => layout.save_scalars(wr))
    }
    fn load_scalars<R: Read>(&mut self, rd: &mut StateReader<R>) -> Result<(), LoadStateError> {
        dispatch_card!(self, layout => layout.load_scalars(rd))
    }
}

/// A single sound card: its layout and the chips it owns.
///
/// Chips exist only while the card is enabled. A disabled card claims no addresses, reads as
/// [FLOATING_BUS], ignores writes and renders nothing.
#[derive(Debug)]
pub struct PeripheralInstance<L = Card, F = DefaultEngines> {
    enabled: bool,
    layout: L,
    chips: ArrayVec<ChipHandle, MAX_CHIPS>,
    timing: HostTiming,
    format: OutputFormat,
    factory: F,
}

impl<L: CardLayout, F: EngineFactory + Default> PeripheralInstance<L, F> {
    /// Creates an enabled card with engines from the default factory.
    pub fn new(layout: L, timing: HostTiming, format: OutputFormat) -> Self {
        PeripheralInstance::with_factory(layout, F::default(), timing, format)
    }
}

impl<L: CardLayout, F: EngineFactory> PeripheralInstance<L, F> {
    /// Creates an enabled card with engines created by the given `factory`.
    pub fn with_factory(layout: L, factory: F, timing: HostTiming, format: OutputFormat) -> Self {
        let mut card = PeripheralInstance {
            enabled: true,
            layout,
            chips: ArrayVec::new(),
            timing,
            format,
            factory,
        };
        card.rebuild(false);
        card
    }
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    /// Enables or disables the card. Enabling builds chips in their power-on state, disabling
    /// releases them.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return
        }
        self.enabled = enabled;
        if enabled {
            self.rebuild(false);
        }
        else {
            self.chips.clear();
        }
        debug!("{} enabled: {}", self.layout.name(), enabled);
    }
    #[inline]
    pub fn layout(&self) -> &L {
        &self.layout
    }
    #[inline]
    pub fn timing(&self) -> &HostTiming {
        &self.timing
    }
    #[inline]
    pub fn format(&self) -> OutputFormat {
        self.format
    }
    /// Returns the chips of an enabled card.
    #[inline]
    pub fn chips(&self) -> &[ChipHandle] {
        &self.chips
    }
    #[inline]
    pub fn chip_mut(&mut self, index: usize) -> Option<&mut ChipHandle> {
        self.chips.get_mut(index)
    }
    /// Replaces the card layout. The state of chips of the same kind is preserved.
    pub fn reconfigure(&mut self, layout: L) {
        self.layout = layout;
        if self.enabled {
            self.rebuild(true);
        }
    }
    /// Synchronizes the card with new host timing and output format preserving the state
    /// of chips.
    pub fn init(&mut self, timing: HostTiming, format: OutputFormat) {
        self.timing = timing;
        self.format = format;
        if self.enabled {
            self.retune();
        }
    }
    /// Restores the power-on state of the card and its chips.
    pub fn reset(&mut self) {
        self.layout.reset();
        if self.enabled {
            self.rebuild(false);
        }
    }
    /// Changes the playback sample rate preserving the state of chips.
    pub fn reinit(&mut self, sample_rate: u32) {
        self.timing.sample_rate = sample_rate;
        if self.enabled {
            self.retune();
        }
    }
    /// Reads a byte from the card at the given bus `address`.
    ///
    /// Unclaimed addresses read as [FLOATING_BUS].
    pub fn read(&mut self, address: u16) -> u8 {
        if !self.enabled {
            return FLOATING_BUS
        }
        let layout = &self.layout;
        let chips = &mut self.chips;
        read_or_float(layout, address, |target| match target {
            RegisterTarget::Register { chip, index } => {
                chips.get_mut(chip).map_or(FLOATING_BUS, |handle| handle.read(index))
            }
            RegisterTarget::Select { chip, .. } => layout.selected(chip) as u8,
            RegisterTarget::Status { chip } => {
                chips.get_mut(chip).map_or(FLOATING_BUS, |handle| handle.status())
            }
            RegisterTarget::Config => layout.config().unwrap_or(FLOATING_BUS),
            _ => FLOATING_BUS
        })
    }
    /// Writes a byte to the card at the given bus `address`.
    ///
    /// Writes to unclaimed addresses are ignored. A write takes effect immediately, so to place
    /// it at its host clock tick, render the frame up to that tick first with
    /// [PeripheralInstance::generate] and the rest of the frame after the write.
    pub fn write(&mut self, address: u16, data: u8) {
        if !self.enabled {
            return
        }
        match self.layout.decode(address, Access::Write) {
            Some(RegisterTarget::Register { chip, index }) => {
                if let Some(handle) = self.chips.get_mut(chip) {
                    handle.write(index, data);
                }
                if let Some(mirror) = self.layout.mirror_of(chip) {
                    if let Some(handle) = self.chips.get_mut(mirror) {
                        handle.write(index, data);
                    }
                }
            }
            Some(RegisterTarget::Select { chip, bank }) => {
                self.layout.select(chip, bank + data as u16);
            }
            Some(RegisterTarget::Config) => {
                if self.layout.write_config(data) {
                    debug!("{} configuration: {:02x}", self.layout.name(), data);
                    self.retune();
                }
            }
            Some(RegisterTarget::Control(reg)) => {
                self.layout.write_control(reg, data);
            }
            _ => {}
        }
    }
    /// Renders sample frames covering `host_ticks` of the host clock and adds them to `dst`.
    ///
    /// The number of frames requested from each chip is the number of frames that fit in `dst`
    /// according to the output format. Returns the number of frames mixed.
    pub fn generate<S: OutputSample>(&mut self, host_ticks: u32, dst: &mut [S]) -> usize {
        let channels = self.format.channels();
        let requested = dst.len() / channels;
        self.render(Some(host_ticks), requested, |run, placement| {
            run.mix_into(dst, channels, placement)
        })
    }
    /// Like [PeripheralInstance::generate] but into a raw byte buffer laid out according to
    /// the output format.
    pub fn generate_bytes(&mut self, host_ticks: u32, dst: &mut [u8]) -> usize {
        let format = self.format;
        let requested = dst.len() / format.frame_size();
        self.render(Some(host_ticks), requested, |run, placement| {
            run.mix_into_bytes(dst, format, placement)
        })
    }
    /// Renders as many sample frames as fit in `dst` regardless of the host clock and adds them
    /// to `dst`. Returns the number of frames mixed.
    pub fn fill<S: OutputSample>(&mut self, dst: &mut [S]) -> usize {
        let channels = self.format.channels();
        let requested = dst.len() / channels;
        self.render(None, requested, |run, placement| {
            run.mix_into(dst, channels, placement)
        })
    }
    /// Like [PeripheralInstance::fill] but into a raw byte buffer.
    pub fn fill_bytes(&mut self, dst: &mut [u8]) -> usize {
        let format = self.format;
        let requested = dst.len() / format.frame_size();
        self.render(None, requested, |run, placement| {
            run.mix_into_bytes(dst, format, placement)
        })
    }
    /// Writes the card state: the discriminant, the chip snapshots, the card scalars and
    /// the configuration register.
    ///
    /// A disabled card writes a zero discriminant alone.
    pub fn save_state<W: Write>(&self, wr: &mut StateWriter<W>) -> io::Result<()> {
        if !self.enabled {
            return wr.write_int(0)
        }
        wr.write_int(self.layout.variant_code())?;
        for chip in self.chips.iter() {
            wr.write_snapshot(&chip.snapshot())?;
        }
        self.layout.save_scalars(wr)?;
        if let Some(config) = self.layout.config() {
            wr.write_ubyte(config)?;
        }
        Ok(())
    }
    /// Reads the card state as written by [PeripheralInstance::save_state].
    ///
    /// On error the card is left unmodified.
    pub fn load_state<R: Read>(&mut self, rd: &mut StateReader<R>) -> Result<(), LoadStateError> {
        let code = rd.read_int()?;
        if code == 0 {
            self.set_enabled(false);
            debug!("{} state loaded: disabled", self.layout.name());
            return Ok(())
        }
        let mut layout = self.layout.clone();
        layout.set_variant_code(code)?;
        let mut snapshots: ArrayVec<StateSnapshot, MAX_CHIPS> = ArrayVec::new();
        for spec in layout.chip_specs(&self.timing, self.format) {
            snapshots.push(rd.read_snapshot(spec.kind())?);
        }
        layout.load_scalars(rd)?;
        if layout.config().is_some() {
            layout.restore_config(rd.read_ubyte()?);
        }
        let mut chips: ArrayVec<ChipHandle, MAX_CHIPS> = ArrayVec::new();
        let specs = layout.chip_specs(&self.timing, self.format);
        for (spec, snapshot) in specs.iter().zip(snapshots.iter()) {
            let engine = self.factory.create(spec.kind());
            let config = spec.engine_config(self.timing.sample_rate);
            let mut chip = ChipHandle::open(engine, config, &self.timing);
            chip.restore(snapshot)?;
            chips.push(chip);
        }
        self.layout = layout;
        self.chips = chips;
        self.enabled = true;
        debug!("{} state loaded: variant {}", self.layout.name(), code);
        Ok(())
    }

    fn render<M>(&mut self, host_ticks: Option<u32>, requested: usize, mut mix: M) -> usize
        where M: FnMut(&SampleRun<'_>, Placement) -> usize
    {
        if !self.enabled {
            return 0
        }
        let layout = &self.layout;
        let mut mixed = 0;
        for (index, chip) in self.chips.iter_mut().enumerate() {
            if !layout.is_clocked(index) {
                continue
            }
            let placement = chip.config().pan.placement(index);
            let run = match host_ticks {
                Some(ticks) => chip.advance(ticks, requested),
                None => chip.fill(requested)
            };
            if layout.is_audible(index) {
                mixed = mixed.max(mix(&run, placement));
            }
        }
        mixed
    }

    // Applies the current timing to chips in place, rebuilding them if the chip set changed.
    fn retune(&mut self) {
        let specs = self.layout.chip_specs(&self.timing, self.format);
        let same_chips = specs.len() == self.chips.len() &&
            specs.iter().zip(self.chips.iter()).all(|(spec, chip)| spec.kind() == chip.kind());
        if same_chips {
            let sample_rate = self.timing.sample_rate;
            let timing = self.timing;
            let mut configured = true;
            for (spec, chip) in specs.iter().zip(self.chips.iter_mut()) {
                configured &= chip.configure(spec.engine_config(sample_rate), &timing);
            }
            if configured {
                debug!("{} retuned: {} Hz", self.layout.name(), sample_rate);
                return
            }
        }
        self.rebuild(true);
    }

    fn rebuild(&mut self, preserve: bool) {
        let specs = self.layout.chip_specs(&self.timing, self.format);
        let sample_rate = self.timing.sample_rate;
        let mut old = mem::take(&mut self.chips).into_iter();
        for spec in specs {
            let config = spec.engine_config(sample_rate);
            let chip = match old.next() {
                Some(mut chip) if chip.kind() == spec.kind() => {
                    let snapshot = if preserve { Some(chip.snapshot()) } else { None };
                    if let Err(err) = chip.reinitialize(config, &self.timing, snapshot.as_ref()) {
                        warn!("{} chip state lost: {}", chip.kind(), err);
                        chip.reopen(config, &self.timing);
                    }
                    chip
                }
                _ => ChipHandle::open(self.factory.create(spec.kind()), config, &self.timing)
            };
            self.chips.push(chip);
        }
        debug!("{} rebuilt with {} chip(s), state preserved: {}",
               self.layout.name(), self.chips.len(), preserve);
    }
}

impl<L: CardLayout, F> AddressRouter for PeripheralInstance<L, F> {
    fn claims(&self, address: u16) -> bool {
        self.enabled && self.layout.claims(address)
    }

    fn decode(&self, address: u16, access: Access) -> Option<RegisterTarget> {
        if self.enabled {
            self.layout.decode(address, access)
        }
        else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::SmallRng};
    use xlsound_core::clock::TvSystem;

    fn sonari(version: SonariVersion) -> PeripheralInstance {
        let layout = Sonari::new(version, CardSlot::try_from(3).unwrap(), [Some(PsgModel::Ay), Some(PsgModel::Ym)]);
        PeripheralInstance::new(layout.into(), HostTiming::default(), OutputFormat::default())
    }

    #[test]
    fn card_slot_works() {
        for (name, base) in vec![("0", 0xD500), ("3", 0xD560), (" 7", 0xD5E0)] {
            assert_eq!(name.parse::<CardSlot>().unwrap().base(), base);
        }
        assert_eq!("8".parse::<CardSlot>(), Err(ParseConfigError::new("slot")));
        assert_eq!("x".parse::<CardSlot>().unwrap_err().to_string(), "unrecognized card slot");
        assert_eq!(parse_psg_socket("None"), Ok(None));
        assert_eq!(parse_psg_socket("ym"), Ok(Some(PsgModel::Ym)));
        assert!(parse_psg_socket("sid").is_err());
    }

    #[test]
    fn peripheral_instance_psg_scenario() {
        let mut card = sonari(SonariVersion::Mono);
        assert_eq!(card.chips().len(), 1);
        card.write(0xD560, 0x08);
        card.write(0xD561, 0x0F);
        assert_eq!(card.read(0xD561), 0x08);
        assert_eq!(card.read(0xD560), 0x0F);
        let mut out = [0i16; 100];
        assert_eq!(card.generate(1000, &mut out), 100);
        let energy: i64 = out.iter().map(|&s| (s as i64) * (s as i64)).sum();
        assert!(energy > 0);
    }

    #[test]
    fn peripheral_instance_disabled_is_inert() {
        let mut card = sonari(SonariVersion::Stereo);
        assert!(card.claims(0xD563));
        card.set_enabled(false);
        assert!(card.chips().is_empty());
        assert!(!card.claims(0xD563));
        assert_eq!(card.decode(0xD560, Access::Read), None);
        assert_eq!(card.read(0xD561), FLOATING_BUS);
        card.write(0xD560, 0x08);
        let mut out = [0i16; 10];
        assert_eq!(card.generate(1000, &mut out), 0);
        assert_eq!(card.fill(&mut out), 0);
        assert_eq!(out, [0; 10]);
        let mut wr = StateWriter::new(Vec::new());
        card.save_state(&mut wr).unwrap();
        assert_eq!(wr.into_inner(), vec![0, 0, 0, 0]);
        card.set_enabled(true);
        assert_eq!(card.chips().len(), 2);
        assert_eq!(card.read(0xD561), 0);
    }

    #[test]
    fn peripheral_instance_state_round_trip() {
        let mut card = sonari(SonariVersion::Stereo);
        card.write(0xD560, 0x07);
        card.write(0xD561, 0x3E);
        card.write(0xD560, 0x08);
        card.write(0xD561, 0x0C);
        card.write(0xD562, 0x09);
        card.write(0xD563, 0x0A);
        let mut out = [0i16; 200];
        assert_eq!(card.generate(10_000, &mut out), 200);
        assert_eq!(card.chips()[0].sync().owed_ticks(), 0);
        let mut wr = StateWriter::new(Vec::new());
        card.save_state(&mut wr).unwrap();
        let data = wr.into_inner();
        assert_eq!(&data[..4], &[2, 0, 0, 0]);

        let mut twin = sonari(SonariVersion::Mono);
        twin.load_state(&mut StateReader::new(&data[..])).unwrap();
        assert_eq!(twin.layout(), card.layout());
        assert_eq!(twin.chips().len(), 2);
        assert_eq!(twin.read(0xD563), 0x09);
        assert_eq!(twin.read(0xD562), 0x0A);
        for (a, b) in twin.chips().iter().zip(card.chips().iter()) {
            assert_eq!(a.snapshot(), b.snapshot());
        }
        let mut out1 = [0i16; 300];
        let mut out2 = [0i16; 300];
        card.generate(7000, &mut out1);
        twin.generate(7000, &mut out2);
        assert_eq!(out1[..], out2[..]);
        // a truncated stream leaves the card as it was
        let snapshot = twin.chips()[0].snapshot();
        let err = twin.load_state(&mut StateReader::new(&data[..data.len() - 1])).unwrap_err();
        assert!(matches!(err, LoadStateError::Io(_)));
        assert_eq!(twin.chips()[0].snapshot(), snapshot);
        let err = twin.load_state(&mut StateReader::new(&[9u8, 0, 0, 0][..])).unwrap_err();
        assert!(matches!(err, LoadStateError::UnknownDiscriminant(9)));
    }

    #[test]
    fn peripheral_instance_reinit_preserves_state() {
        let mut card = sonari(SonariVersion::Mono);
        card.write(0xD560, 0x00);
        card.write(0xD561, 0x55);
        let snapshot = card.chips()[0].snapshot();
        card.reinit(48000);
        assert_eq!(card.chips()[0].config().sample_rate, 48000);
        assert_eq!(card.chips()[0].snapshot(), snapshot);
        card.init(HostTiming::new(TvSystem::Ntsc, 22050), OutputFormat { channels: 2, bit16: false });
        assert_eq!(card.chips()[0].config().clock_hz, 1_789_790.0);
        assert_eq!(card.chips()[0].config().pan, PanMode::AbcStereo);
        assert_eq!(card.chips()[0].capacity(), card.timing().buffer_capacity(1_789_790.0));
        assert_eq!(card.read(0xD560), 0x55);
        card.reset();
        assert_eq!(card.read(0xD560), 0);
        assert_eq!(card.read(0xD561), 0);
    }

    #[test]
    fn peripheral_instance_reinit_keeps_chips_running() {
        let mut card = sonari(SonariVersion::Stereo);
        for (port, data) in vec![(0xD560, 0x07), (0xD561, 0x3E), (0xD560, 0x08), (0xD561, 0x0C),
                                 (0xD562, 0x09), (0xD563, 0x0A)] {
            card.write(port, data);
        }
        let mut out = vec![0i16; 300];
        assert_eq!(card.generate(12_000, &mut out), 300);
        let snapshots: Vec<_> = card.chips().iter().map(|chip| chip.snapshot()).collect();
        card.reinit(48000);
        assert_eq!(card.chips().len(), 2);
        for (chip, snapshot) in card.chips().iter().zip(snapshots.iter()) {
            assert_eq!(&chip.snapshot(), snapshot);
            assert_eq!(chip.config().sample_rate, 48000);
            assert_eq!(chip.capacity(), card.timing().buffer_capacity(chip.config().clock_hz));
            assert_eq!(chip.sync().phase(), 0.0);
        }
        assert_eq!(card.read(0xD560), 0x0C);
        assert_eq!(card.read(0xD562), 0x0A);
        let mut out = vec![0i16; 960];
        assert_eq!(card.generate(card.timing().ticks_per_frame(), &mut out), 960);
        assert!(out.iter().any(|&s| s != 0));
        card.reconfigure(Sonari::new(SonariVersion::Mono, CardSlot::try_from(3).unwrap(),
                                     [Some(PsgModel::Ay), None]).into());
        card.reinit(22050);
        assert_eq!(card.chips().len(), 1);
        assert_eq!(card.chips()[0].registers()[8], 0x0C);
        assert_eq!(card.chips()[0].capacity(), card.timing().buffer_capacity(1_773_447.0));
    }

    #[test]
    fn peripheral_instance_splits_frame_at_writes() {
        let mut card = sonari(SonariVersion::Mono);
        for (port, data) in vec![(0xD560, 0x00), (0xD561, 0x40), (0xD560, 0x07), (0xD561, 0x3E),
                                 (0xD560, 0x08)] {
            card.write(port, data);
        }
        let timing = *card.timing();
        let frame = timing.ticks_per_frame();
        // the volume is raised a quarter into the frame
        let at = frame / 4;
        let split = (at as f64 / timing.ticks_per_sample()) as usize;
        let mut out = vec![0i16; 882];
        let (head, tail) = out.split_at_mut(split);
        assert_eq!(card.generate(at, head), split);
        card.write(0xD561, 0x0F);
        assert_eq!(card.generate(frame - at, tail), 882 - split);
        assert!(out[..split].iter().all(|&s| s == out[0]));
        assert!(out[split..].iter().any(|&s| s != out[0]));
    }

    #[test]
    fn peripheral_instance_mixes_bytes() {
        let layout = Sonari::new(SonariVersion::Mono, CardSlot::try_from(0).unwrap(), [Some(PsgModel::Ay), None]);
        let format = OutputFormat { channels: 2, bit16: false };
        let mut card: PeripheralInstance<Sonari> = PeripheralInstance::new(layout, HostTiming::default(), format);
        card.write(0xD500, 0x07);
        card.write(0xD501, 0x3F);
        card.write(0xD500, 0x08);
        card.write(0xD501, 0x0F);
        let mut out = vec![128u8; 2 * 50];
        assert_eq!(card.fill_bytes(&mut out), 50);
        assert!(out.chunks(2).skip(1).all(|frame| frame[0] == frame[1] && frame[0] > 128));
    }

    #[test]
    fn peripheral_instance_random_access_state() {
        let mut rng = SmallRng::seed_from_u64(0x5EED);
        let mut card = sonari(SonariVersion::Stereo);
        let mut out = [0i16; 100];
        for _ in 0..2000 {
            let address = rng.gen_range(0xD55Eu16..=0xD565);
            if rng.gen() {
                card.write(address, rng.gen());
            }
            else if !card.claims(address) {
                assert_eq!(card.read(address), FLOATING_BUS);
            }
            if rng.gen_ratio(1, 50) {
                card.fill(&mut out);
            }
        }
        let mut wr = StateWriter::new(Vec::new());
        card.save_state(&mut wr).unwrap();
        let mut twin = sonari(SonariVersion::Mono);
        twin.load_state(&mut StateReader::new(&wr.into_inner()[..])).unwrap();
        for address in 0xD55E..=0xD565 {
            assert_eq!(twin.read(address), card.read(address), "{:04x}", address);
        }
        for (a, b) in twin.chips().iter().zip(card.chips().iter()) {
            assert_eq!(a.snapshot(), b.snapshot());
        }
    }

    #[cfg(feature = "snapshot")]
    #[test]
    fn card_serde_works() {
        for card in vec![Card::from(Sonari::default()),
                         Sidari::default().into(),
                         SlightSid::new(SlightSidVersion::Stereo).into(),
                         Evie::default().into(),
                         Melody::default().into(),
                         Yamari::default().into()] {
            let json = serde_json::to_string(&card).unwrap();
            assert_eq!(serde_json::from_str::<Card>(&json).unwrap(), card);
            let bin = bincode::serialize(&card).unwrap();
            assert_eq!(bincode::deserialize::<Card>(&bin).unwrap(), card);
        }
        assert_eq!(serde_json::from_str::<CardSlot>("7").unwrap().base(), 0xD5E0);
        assert!(serde_json::from_str::<CardSlot>("8").is_err());
    }
}
