/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Chip engine interface and the chip lifecycle.
//!
//! The synthesis of samples is delegated to implementations of [ChipEngine]. This module only
//! drives them: opens and closes, clocks them in sync with the host via [ChipHandle] and takes
//! their opaque state for save-states.
use core::fmt;
use core::str::FromStr;
use std::io;

use log::error;
#[cfg(feature = "snapshot")]
use serde::{Serialize, Serializer, Deserialize, Deserializer};

use crate::audio::PanMode;

#[cfg(feature = "snapshot")]
pub mod blob;
mod handle;

pub use handle::*;

/// The family of a sound chip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum ChipKind {
    /// MOS 6581/8580 Sound Interface Device.
    Sid,
    /// AY-3-8910/YM2149 Programmable Sound Generator.
    Psg,
    /// YMF262 FM operator synthesizer.
    Fm,
}

impl ChipKind {
    /// Returns the size of the register file of this kind of chips.
    #[inline]
    pub fn register_width(self) -> usize {
        match self {
            ChipKind::Sid => 32,
            ChipKind::Psg => 14,
            ChipKind::Fm => 512,
        }
    }
}

impl fmt::Display for ChipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChipKind::Sid => "SID",
            ChipKind::Psg => "PSG",
            ChipKind::Fm => "FM",
        }.fmt(f)
    }
}

/// SID chip revisions and filter emulation variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum SidModel {
    Mos8580,
    Mos6581,
    /// An idealized linear filter.
    FilterLinear,
    /// No filter at all.
    FilterNone,
}

/// PSG chip variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum PsgModel {
    /// General Instrument AY-3-8910 with 16 volume levels.
    Ay,
    /// Yamaha YM2149 with 32 envelope levels.
    Ym,
}

/// FM chip variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum FmModel {
    Opl3,
}

/// A chip model of any [ChipKind].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum ChipModel {
    Sid(SidModel),
    Psg(PsgModel),
    Fm(FmModel),
}

impl ChipModel {
    #[inline]
    pub fn kind(self) -> ChipKind {
        match self {
            ChipModel::Sid(..) => ChipKind::Sid,
            ChipModel::Psg(..) => ChipKind::Psg,
            ChipModel::Fm(..) => ChipKind::Fm,
        }
    }
}

impl From<SidModel> for ChipModel {
    fn from(model: SidModel) -> Self {
        ChipModel::Sid(model)
    }
}

impl From<PsgModel> for ChipModel {
    fn from(model: PsgModel) -> Self {
        ChipModel::Psg(model)
    }
}

impl From<FmModel> for ChipModel {
    fn from(model: FmModel) -> Self {
        ChipModel::Fm(model)
    }
}

/// An error returned when parsing a chip model name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseChipModelError;

impl fmt::Display for ParseChipModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "unrecognized chip model".fmt(f)
    }
}

impl std::error::Error for ParseChipModelError {}

impl FromStr for SidModel {
    type Err = ParseChipModelError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = match name.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("mos") => &name[3..],
            _ => name
        };
        if name == "8580" {
            Ok(SidModel::Mos8580)
        }
        else if name == "6581" {
            Ok(SidModel::Mos6581)
        }
        else if name.eq_ignore_ascii_case("linear") {
            Ok(SidModel::FilterLinear)
        }
        else if name.eq_ignore_ascii_case("none") {
            Ok(SidModel::FilterNone)
        }
        else {
            Err(ParseChipModelError)
        }
    }
}

impl FromStr for PsgModel {
    type Err = ParseChipModelError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.eq_ignore_ascii_case("ay") || name.eq_ignore_ascii_case("ay-3-8910") {
            Ok(PsgModel::Ay)
        }
        else if name.eq_ignore_ascii_case("ym") || name.eq_ignore_ascii_case("ym2149") {
            Ok(PsgModel::Ym)
        }
        else {
            Err(ParseChipModelError)
        }
    }
}

/// Parameters an engine is configured with.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct EngineConfig {
    /// The chip oscillator frequency in Hz.
    pub clock_hz: f64,
    pub model: ChipModel,
    /// Determines the number of channels the engine renders.
    pub pan: PanMode,
    /// The playback sample rate in Hz.
    pub sample_rate: u32,
}

impl EngineConfig {
    /// Returns the number of interleaved channels the engine should render.
    #[inline]
    pub fn channels(&self) -> usize {
        self.pan.engine_channels()
    }
}

/// An opaque copy of the complete internal state of a chip engine.
///
/// Engines encode their fields in a fixed declared order. Use [EngineState::from_words] and
/// [EngineState::words] for states consisting of 32-bit integer fields.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct EngineState(Box<[u8]>);

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineState({} bytes)", self.0.len())
    }
}

impl EngineState {
    /// Creates a state from 32-bit fields stored in the little-endian order.
    pub fn from_words(words: &[i32]) -> Self {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        EngineState(bytes.into_boxed_slice())
    }
    /// Iterates over 32-bit little-endian fields of the state.
    ///
    /// Trailing bytes not forming a complete field are ignored.
    pub fn words(&self) -> impl Iterator<Item=i32> + '_ {
        self.0.chunks_exact(4).map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
    #[inline]
    pub fn into_inner(self) -> Box<[u8]> {
        self.0
    }
}

impl From<Box<[u8]>> for EngineState {
    fn from(bytes: Box<[u8]>) -> Self {
        EngineState(bytes)
    }
}

impl From<Vec<u8>> for EngineState {
    fn from(bytes: Vec<u8>) -> Self {
        EngineState(bytes.into_boxed_slice())
    }
}

impl AsRef<[u8]> for EngineState {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(feature = "snapshot")]
impl Serialize for EngineState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        blob::serialize_blob(&self.0, serializer)
    }
}

#[cfg(feature = "snapshot")]
impl<'de> Deserialize<'de> for EngineState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        blob::deserialize_blob(deserializer).map(EngineState)
    }
}

/// A full copy of a chip: its register file and the engine state.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct StateSnapshot {
    pub kind: ChipKind,
    #[cfg_attr(feature = "snapshot", serde(
        serialize_with = "blob::serialize_blob",
        deserialize_with = "blob::deserialize_blob"))]
    pub registers: Box<[u8]>,
    pub engine: EngineState,
}

/// An error returned when a snapshot doesn't fit a chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The snapshot was taken from a different kind of chip.
    KindMismatch { expected: ChipKind, found: ChipKind },
    /// The size of the register file differs.
    RegisterSize { expected: usize, found: usize },
    /// The size of the engine state differs.
    StateSize { expected: usize, found: usize },
}

impl std::error::Error for SnapshotError {}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::KindMismatch { expected, found } => write!(f,
                "snapshot of a {} chip can't be restored into a {} chip", found, expected),
            SnapshotError::RegisterSize { expected, found } => write!(f,
                "snapshot register file size mismatch, {} bytes required, received: {}", expected, found),
            SnapshotError::StateSize { expected, found } => write!(f,
                "snapshot engine state size mismatch, {} bytes required, received: {}", expected, found),
        }
    }
}

impl From<SnapshotError> for io::Error {
    fn from(err: SnapshotError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

impl SnapshotError {
    /// Checks if the size of a received `state` matches the `expected` one.
    pub fn check_state_size(expected: usize, state: &EngineState) -> Result<(), SnapshotError> {
        if state.len() != expected {
            let err = SnapshotError::StateSize { expected, found: state.len() };
            error!("{}", err);
            return Err(err)
        }
        Ok(())
    }
}

/// An interface to an external sound synthesis engine.
///
/// Engines render interleaved signed 16-bit samples, clocked by a budget of chip ticks.
pub trait ChipEngine {
    /// Returns the kind of the emulated chip.
    fn kind(&self) -> ChipKind;
    /// Allocates resources and brings the engine to its power-on state with the given `config`.
    fn open(&mut self, config: &EngineConfig);
    /// Releases resources. Subsequent calls are no-ops.
    fn close(&mut self);
    /// Applies a new configuration without resetting the engine state.
    fn configure(&mut self, config: &EngineConfig);
    /// Returns the number of interleaved channels rendered by [ChipEngine::synthesize].
    fn channels(&self) -> usize;
    /// Reads a chip register.
    fn read(&mut self, reg: u16) -> u8;
    /// Writes a chip register.
    fn write(&mut self, reg: u16, data: u8);
    /// Reads the status port of chips having one.
    fn status(&mut self) -> u8 {
        0xFF
    }
    /// Emulates at most `chip_ticks` of the chip clock rendering at most `max_samples` frames
    /// into `out`.
    ///
    /// The length of `out` is at least `max_samples * channels()`. Returns the number of frames
    /// rendered.
    fn synthesize(&mut self, chip_ticks: u32, out: &mut [i16], max_samples: usize) -> usize;
    /// Returns the size in bytes of the [EngineState] of this engine.
    fn state_len(&self) -> usize;
    /// Returns a complete copy of the internal state.
    fn read_full_state(&self) -> EngineState;
    /// Replaces the internal state with a copy previously returned by [ChipEngine::read_full_state].
    fn write_full_state(&mut self, state: &EngineState) -> Result<(), SnapshotError>;
}
