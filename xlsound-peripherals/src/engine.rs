/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Engines the sound cards are built with.
//!
//! Hosts provide their own synthesis engines by implementing [EngineFactory]. The
//! [DefaultEngines] factory renders PSG chips with [PsgEngine] and every other chip kind with
//! a [SilentEngine].
use core::fmt;

use xlsound_core::chip::{ChipEngine, ChipKind, EngineConfig, EngineState, SnapshotError};
use xlsound_core::clock::SampleClock;

use crate::psg::PsgEngine;

/// Creates chip engines for sound cards.
pub trait EngineFactory {
    /// Returns a new closed engine emulating a chip of the given `kind`.
    fn create(&self, kind: ChipKind) -> Box<dyn ChipEngine>;
}

/// The default engine factory.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct DefaultEngines;

impl EngineFactory for DefaultEngines {
    fn create(&self, kind: ChipKind) -> Box<dyn ChipEngine> {
        match kind {
            ChipKind::Psg => Box::new(PsgEngine::default()),
            kind => Box::new(SilentEngine::new(kind))
        }
    }
}

/// An engine latching register writes and rendering silence.
///
/// Samples are paced by the chip tick budget exactly as a real engine would, so the cards
/// behave the same whether or not the host supplies a synthesizer.
#[derive(Clone)]
pub struct SilentEngine {
    kind: ChipKind,
    channels: usize,
    regs: Box<[u8]>,
    pacer: SampleClock,
}

impl fmt::Debug for SilentEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SilentEngine")
            .field("kind", &self.kind)
            .field("channels", &self.channels)
            .field("pacer", &self.pacer)
            .finish()
    }
}

impl SilentEngine {
    pub fn new(kind: ChipKind) -> Self {
        SilentEngine {
            kind,
            channels: 1,
            regs: vec![0; kind.register_width()].into_boxed_slice(),
            pacer: SampleClock::default(),
        }
    }
}

impl ChipEngine for SilentEngine {
    fn kind(&self) -> ChipKind {
        self.kind
    }

    fn open(&mut self, config: &EngineConfig) {
        self.regs.iter_mut().for_each(|r| *r = 0);
        self.pacer = SampleClock::new(config.clock_hz, config.sample_rate);
        self.channels = config.channels();
    }

    fn close(&mut self) {}

    fn configure(&mut self, config: &EngineConfig) {
        let (_, offset) = self.pacer.as_raw();
        let (cycles, _) = SampleClock::new(config.clock_hz, config.sample_rate).as_raw();
        self.pacer = SampleClock::from_raw(cycles, offset);
        self.channels = config.channels();
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn read(&mut self, reg: u16) -> u8 {
        self.regs.get(reg as usize).copied().unwrap_or(0xFF)
    }

    fn write(&mut self, reg: u16, data: u8) {
        if let Some(r) = self.regs.get_mut(reg as usize) {
            *r = data;
        }
    }

    fn status(&mut self) -> u8 {
        match self.kind {
            ChipKind::Fm => 0,
            _ => 0xFF
        }
    }

    fn synthesize(&mut self, chip_ticks: u32, out: &mut [i16], max_samples: usize) -> usize {
        let channels = self.channels;
        let max_samples = max_samples.min(out.len() / channels);
        self.pacer.run(chip_ticks, max_samples, |_, sample| {
            if let Some(index) = sample {
                out[index * channels..(index + 1) * channels].iter_mut().for_each(|s| *s = 0);
            }
        })
    }

    fn state_len(&self) -> usize {
        self.regs.len() + 8
    }

    fn read_full_state(&self) -> EngineState {
        let (_, offset) = self.pacer.as_raw();
        let mut state = self.regs.to_vec();
        state.extend_from_slice(&offset.to_le_bytes());
        EngineState::from(state)
    }

    fn write_full_state(&mut self, state: &EngineState) -> Result<(), SnapshotError> {
        SnapshotError::check_state_size(self.state_len(), state)?;
        let (regs, offset) = state.as_slice().split_at(self.regs.len());
        self.regs.copy_from_slice(regs);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(offset);
        let (cycles, _) = self.pacer.as_raw();
        self.pacer = SampleClock::from_raw(cycles, i64::from_le_bytes(raw));
        Ok(())
    }
}
