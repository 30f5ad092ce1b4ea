/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
use core::fmt;

use log::{debug, error};

use crate::audio::SampleRun;
use crate::clock::{HostTiming, TickSync};
use super::{ChipEngine, ChipKind, EngineConfig, SnapshotError, StateSnapshot};

/// An exclusively owned chip engine together with its register file, a scratch sample buffer
/// and a tick synchronizer.
///
/// The handle is either open or closed. Opening always starts from the zeroed register file
/// and the power-on engine state.
pub struct ChipHandle {
    engine: Box<dyn ChipEngine>,
    config: EngineConfig,
    timing: HostTiming,
    registers: Box<[u8]>,
    scratch: Vec<i16>,
    sync: TickSync,
    open: bool,
}

impl fmt::Debug for ChipHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChipHandle")
            .field("kind", &self.kind())
            .field("config", &self.config)
            .field("sync", &self.sync)
            .field("open", &self.open)
            .finish()
    }
}

impl ChipHandle {
    /// Opens `engine` with the given `config` synchronized to the host `timing`.
    pub fn open(engine: Box<dyn ChipEngine>, config: EngineConfig, timing: &HostTiming) -> Self {
        let kind = engine.kind();
        let mut handle = ChipHandle {
            engine,
            config,
            timing: *timing,
            registers: vec![0; kind.register_width()].into_boxed_slice(),
            scratch: Vec::new(),
            sync: TickSync::new(config.clock_hz, timing),
            open: false,
        };
        handle.open_engine();
        handle
    }
    /// Releases the engine resources and the scratch buffer.
    ///
    /// Closing a closed handle is a no-op.
    pub fn close(&mut self) {
        if self.open {
            debug!("{} chip closed", self.kind());
            self.engine.close();
            self.scratch = Vec::new();
            self.open = false;
        }
    }
    /// Closes and reopens the chip with a new `config` and host `timing`. If a `snapshot` is
    /// given, it is restored into the reopened chip.
    ///
    /// The synchronizer phase starts from zero.
    pub fn reinitialize(
            &mut self,
            config: EngineConfig,
            timing: &HostTiming,
            snapshot: Option<&StateSnapshot>
        ) -> Result<(), SnapshotError>
    {
        if let Some(snapshot) = snapshot {
            self.check_snapshot(snapshot)?;
        }
        self.reopen(config, timing);
        debug!("{} chip reinitialized: {} Hz, {} Hz, snapshot: {}",
               self.kind(), config.clock_hz, config.sample_rate, snapshot.is_some());
        match snapshot {
            Some(snapshot) => self.restore(snapshot),
            None => Ok(())
        }
    }
    /// Closes and reopens the chip with a new `config` and host `timing` in its power-on state.
    pub fn reopen(&mut self, config: EngineConfig, timing: &HostTiming) {
        self.close();
        self.config = config;
        self.timing = *timing;
        self.sync = TickSync::new(config.clock_hz, timing);
        self.registers.iter_mut().for_each(|r| *r = 0);
        self.open_engine();
    }
    /// Applies a new `config` and host `timing` to the open chip without resetting it.
    ///
    /// The register file and the engine state are kept, the synchronizer phase starts from zero.
    /// Returns `false` and changes nothing if the chip is closed.
    pub fn configure(&mut self, config: EngineConfig, timing: &HostTiming) -> bool {
        if !self.open {
            return false
        }
        self.engine.configure(&config);
        self.config = config;
        self.timing = *timing;
        self.sync = TickSync::new(config.clock_hz, timing);
        let len = self.sync.capacity() * self.channels();
        self.scratch.resize(len, 0);
        debug!("{} chip configured: {} Hz, {} Hz, capacity: {}",
               self.kind(), config.clock_hz, config.sample_rate, self.sync.capacity());
        true
    }
    /// Returns a full copy of the chip state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            kind: self.kind(),
            registers: self.registers.clone(),
            engine: self.engine.read_full_state(),
        }
    }
    /// Replaces the chip state with the `snapshot`.
    ///
    /// Fails if the snapshot was taken from a different kind of chip or its sizes don't match.
    /// In this instance the chip state is left unmodified.
    pub fn restore(&mut self, snapshot: &StateSnapshot) -> Result<(), SnapshotError> {
        self.check_snapshot(snapshot)?;
        self.engine.write_full_state(&snapshot.engine)?;
        self.registers.copy_from_slice(&snapshot.registers);
        Ok(())
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }
    #[inline]
    pub fn kind(&self) -> ChipKind {
        self.engine.kind()
    }
    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
    #[inline]
    pub fn timing(&self) -> &HostTiming {
        &self.timing
    }
    /// Returns the register file as last written.
    #[inline]
    pub fn registers(&self) -> &[u8] {
        &self.registers
    }
    #[inline]
    pub fn sync(&self) -> &TickSync {
        &self.sync
    }
    /// Returns the number of interleaved channels of the produced sample runs.
    #[inline]
    pub fn channels(&self) -> usize {
        self.engine.channels().max(1)
    }
    /// Returns the maximum number of sample frames a single call may produce.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.sync.capacity()
    }
    /// Returns a shared reference to the engine.
    pub fn engine(&self) -> &dyn ChipEngine {
        &*self.engine
    }
    /// Reads a chip register. A closed chip reads as `0xFF`.
    pub fn read(&mut self, reg: u16) -> u8 {
        if self.open {
            self.engine.read(reg)
        }
        else {
            0xFF
        }
    }
    /// Reads the chip status port. A closed chip reads as `0xFF`.
    pub fn status(&mut self) -> u8 {
        if self.open {
            self.engine.status()
        }
        else {
            0xFF
        }
    }
    /// Writes a chip register. Writes to a closed chip are ignored.
    pub fn write(&mut self, reg: u16, data: u8) {
        if self.open {
            if let Some(shadow) = self.registers.get_mut(reg as usize) {
                *shadow = data;
            }
            self.engine.write(reg, data);
        }
    }
    /// Renders exactly `requested` sample frames (clamped to [ChipHandle::capacity]) covering
    /// `host_ticks` of the host clock.
    ///
    /// A closed chip returns an empty run and nothing is changed.
    pub fn advance(&mut self, host_ticks: u32, requested: usize) -> SampleRun<'_> {
        if !self.open {
            return SampleRun::empty()
        }
        let channels = self.channels();
        let ChipHandle { engine, scratch, sync, .. } = self;
        let count = sync.advance(host_ticks, requested, |ticks, offset, max| {
            engine.synthesize(ticks, &mut scratch[offset * channels..(offset + max) * channels], max)
        });
        SampleRun::new(&self.scratch[..count * channels], channels)
    }
    /// Renders `requested` sample frames (clamped to [ChipHandle::capacity]) regardless of the
    /// host clock.
    ///
    /// A closed chip returns an empty run.
    pub fn fill(&mut self, requested: usize) -> SampleRun<'_> {
        if !self.open {
            return SampleRun::empty()
        }
        let channels = self.channels();
        let ChipHandle { engine, scratch, sync, .. } = self;
        let count = sync.fill(requested, |ticks, offset, max| {
            engine.synthesize(ticks, &mut scratch[offset * channels..(offset + max) * channels], max)
        });
        SampleRun::new(&self.scratch[..count * channels], channels)
    }

    fn open_engine(&mut self) {
        self.engine.open(&self.config);
        self.scratch = vec![0; self.sync.capacity() * self.channels()];
        self.open = true;
        debug!("{} chip opened: {} Hz, {} Hz, capacity: {}",
               self.kind(), self.config.clock_hz, self.config.sample_rate, self.sync.capacity());
    }

    fn check_snapshot(&self, snapshot: &StateSnapshot) -> Result<(), SnapshotError> {
        let err = if snapshot.kind != self.kind() {
            SnapshotError::KindMismatch { expected: self.kind(), found: snapshot.kind }
        }
        else if snapshot.registers.len() != self.registers.len() {
            SnapshotError::RegisterSize { expected: self.registers.len(), found: snapshot.registers.len() }
        }
        else if snapshot.engine.len() != self.engine.state_len() {
            SnapshotError::StateSize { expected: self.engine.state_len(), found: snapshot.engine.len() }
        }
        else {
            return Ok(())
        };
        error!("{}", err);
        Err(err)
    }
}

impl Drop for ChipHandle {
    fn drop(&mut self) {
        self.close();
    }
}
