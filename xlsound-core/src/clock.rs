/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Host timing and the clock-domain tick synchronizer.
//!
//! Three clocks are involved in rendering audio of a sound peripheral: the host reference clock
//! counting CPU ticks, the chip's own oscillator and the playback sample rate. Their ratios are
//! neither integer nor rational in any useful sense, so [TickSync] carries the fractional part
//! of chip ticks between calls and compensates for truncation by synthesizing extra single
//! samples whenever the requested count would otherwise not be met.
use core::fmt;
use core::str::FromStr;

use log::{trace, warn};
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// The number of host clock ticks per a single video scanline.
pub const CYCLES_PER_LINE: u32 = 114;
/// The host reference clock of PAL machines in Hz.
pub const PAL_CLOCK_HZ: f64 = 1_773_447.0;
/// The host reference clock of NTSC machines in Hz.
pub const NTSC_CLOCK_HZ: f64 = 1_789_790.0;
/// The number of video frames per second of PAL machines.
pub const PAL_FPS: f64 = 49.860_759_7;
/// The number of video frames per second of NTSC machines.
pub const NTSC_FPS: f64 = 59.922_743_4;

/// The video timing standard of the host machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum TvSystem {
    Pal,
    Ntsc,
}

impl Default for TvSystem {
    fn default() -> Self {
        TvSystem::Pal
    }
}

impl TvSystem {
    /// Returns the host reference clock frequency in Hz.
    #[inline]
    pub fn base_clock(self) -> f64 {
        match self {
            TvSystem::Pal => PAL_CLOCK_HZ,
            TvSystem::Ntsc => NTSC_CLOCK_HZ,
        }
    }
    /// Returns the number of scanlines per video frame.
    #[inline]
    pub fn scanlines(self) -> u32 {
        match self {
            TvSystem::Pal => 312,
            TvSystem::Ntsc => 262,
        }
    }
    /// Returns the number of video frames per second.
    #[inline]
    pub fn fps(self) -> f64 {
        match self {
            TvSystem::Pal => PAL_FPS,
            TvSystem::Ntsc => NTSC_FPS,
        }
    }
    /// Returns the number of host clock ticks per video frame.
    #[inline]
    pub fn ticks_per_frame(self) -> u32 {
        self.scanlines() * CYCLES_PER_LINE
    }
}

/// An error returned when parsing a [TvSystem] name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTvSystemError;

impl fmt::Display for ParseTvSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "unrecognized TV system".fmt(f)
    }
}

impl std::error::Error for ParseTvSystemError {}

impl FromStr for TvSystem {
    type Err = ParseTvSystemError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.eq_ignore_ascii_case("pal") {
            Ok(TvSystem::Pal)
        }
        else if name.eq_ignore_ascii_case("ntsc") {
            Ok(TvSystem::Ntsc)
        }
        else {
            Err(ParseTvSystemError)
        }
    }
}

/// Timing parameters of the host emulator that every peripheral is synchronized against.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct HostTiming {
    /// The video timing standard.
    pub tv: TvSystem,
    /// The host reference clock frequency in Hz used to count elapsed ticks.
    pub main_freq: f64,
    /// The playback sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for HostTiming {
    fn default() -> Self {
        HostTiming::new(TvSystem::Pal, 44100)
    }
}

impl HostTiming {
    /// Creates timing for the given standard with the reference clock equal to its base clock.
    pub fn new(tv: TvSystem, sample_rate: u32) -> Self {
        HostTiming { tv, main_freq: tv.base_clock(), sample_rate }
    }
    /// Returns the number of host ticks per video frame.
    #[inline]
    pub fn ticks_per_frame(&self) -> u32 {
        self.tv.ticks_per_frame()
    }
    /// Returns the fractional number of output samples per video frame.
    #[inline]
    pub fn samples_per_frame(&self) -> f64 {
        self.sample_rate as f64 / self.tv.fps()
    }
    /// Returns the fractional number of host ticks per output sample.
    #[inline]
    pub fn ticks_per_sample(&self) -> f64 {
        self.ticks_per_frame() as f64 / self.samples_per_frame()
    }
    /// Returns the ratio of chip clock ticks per a single host reference clock tick.
    #[inline]
    pub fn clock_ratio(&self, chip_clock: f64) -> f64 {
        chip_clock / self.main_freq
    }
    /// Returns the capacity in sample frames of a scratch buffer for a chip clocked at
    /// `chip_clock` Hz.
    ///
    /// Emulating a single frame may run a few ticks past the nominal frame length, so a surplus
    /// of one sample's worth of chip ticks is added on top of the video frame.
    pub fn buffer_capacity(&self, chip_clock: f64) -> usize {
        let surplus = (chip_clock / self.sample_rate as f64).ceil();
        let max_ticks_per_frame = self.ticks_per_frame() as f64 + surplus;
        (max_ticks_per_frame / self.ticks_per_sample()).ceil() as usize
    }
}

/// The clock-domain tick synchronizer of a single chip.
///
/// Converts elapsed host ticks to chip ticks carrying the fractional phase between calls.
/// The phase is kept within `[0, 1)`. Whole chip ticks consumed in advance by the overclock
/// compensation are carried as a debt repaid from the next elapsed ticks.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct TickSync {
    phase: f64,
    owed: u32,
    ratio: f64,
    chip_ticks_per_sample: f64,
    capacity: usize,
}

impl TickSync {
    /// Creates a new synchronizer for a chip clocked at `chip_clock` Hz.
    pub fn new(chip_clock: f64, timing: &HostTiming) -> Self {
        TickSync {
            phase: 0.0,
            owed: 0,
            ratio: timing.clock_ratio(chip_clock),
            chip_ticks_per_sample: chip_clock / timing.sample_rate as f64,
            capacity: timing.buffer_capacity(chip_clock),
        }
    }
    /// Returns the number of chip ticks per a single host tick.
    #[inline]
    pub fn ratio(&self) -> f64 {
        self.ratio
    }
    /// Returns the number of chip ticks per a single output sample.
    #[inline]
    pub fn chip_ticks_per_sample(&self) -> f64 {
        self.chip_ticks_per_sample
    }
    /// Returns the maximum number of sample frames a single call may produce.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// Returns the current fractional phase in the range `[0, 1)`.
    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase
    }
    /// Returns the number of whole chip ticks consumed ahead of the host clock.
    #[inline]
    pub fn owed_ticks(&self) -> u32 {
        self.owed
    }
    /// Resets the phase and the debt to zero.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.owed = 0;
    }
    /// Clamps the number of requested sample frames to the capacity.
    #[inline]
    pub fn clamp_request(&self, requested: usize) -> usize {
        if requested > self.capacity {
            trace!("request of {} samples clamped to {}", requested, self.capacity);
            self.capacity
        }
        else {
            requested
        }
    }
    /// Advances the chip clock by `host_ticks` and produces exactly `requested` samples
    /// (clamped to the [capacity][TickSync::capacity]).
    ///
    /// `synthesize` is called with `(chip_ticks, offset, max_samples)` and should render at most
    /// `max_samples` frames starting at frame `offset` of the target buffer, using `chip_ticks`
    /// as the clocking budget. It must return the number of frames rendered.
    ///
    /// Returns the number of frames produced.
    pub fn advance<F>(&mut self, host_ticks: u32, requested: usize, mut synthesize: F) -> usize
        where F: FnMut(u32, usize, usize) -> usize
    {
        let requested = self.clamp_request(requested);
        self.phase += host_ticks as f64 * self.ratio;
        let ticks = self.take_whole_ticks();
        let mut count = 0;
        if ticks > 0 {
            count = synthesize(ticks, 0, requested).min(requested);
        }
        if count >= requested || self.ratio <= 0.0 {
            return count
        }
        // make up for the samples lacking due to truncated ticks
        let limit = self.overclock_limit(requested - count);
        let mut overclock: u32 = 0;
        while count < requested {
            if overclock >= limit {
                warn!("chip engine stalled: {} of {} samples after {} extra steps",
                      count, requested, overclock);
                break
            }
            self.phase += self.ratio;
            // overclocked ticks go to the engine even while in debt
            let whole = self.phase.trunc();
            self.phase -= whole;
            let ticks = whole as u32;
            if ticks > 0 {
                count += synthesize(ticks, count, 1).min(1);
            }
            overclock += 1;
        }
        self.repay(overclock as f64 * self.ratio);
        self.limit_debt();
        count
    }
    /// Produces `requested` samples (clamped to the [capacity][TickSync::capacity]) without
    /// regard to host ticks, budgeting chip ticks by the nominal ticks per sample.
    ///
    /// This mode is used when the host doesn't report elapsed ticks. The phase is not affected.
    ///
    /// `synthesize` is called like in [TickSync::advance].
    pub fn fill<F>(&mut self, requested: usize, mut synthesize: F) -> usize
        where F: FnMut(u32, usize, usize) -> usize
    {
        let mut remaining = self.clamp_request(requested);
        let mut amount = 0;
        let mut stalls = 0;
        while remaining > 0 {
            let ticks = (remaining as f64 * self.chip_ticks_per_sample) as u32;
            let count = synthesize(ticks, amount, remaining).min(remaining);
            if count == 0 {
                stalls += 1;
                if ticks == 0 || stalls > 2 {
                    break
                }
            }
            else {
                stalls = 0;
            }
            amount += count;
            remaining -= count;
        }
        amount
    }

    // Takes the whole part of the phase and repays the debt from it.
    fn take_whole_ticks(&mut self) -> u32 {
        let whole = self.phase.trunc();
        self.phase -= whole;
        let whole = whole as u32;
        if whole >= self.owed {
            let ticks = whole - self.owed;
            self.owed = 0;
            ticks
        }
        else {
            self.owed -= whole;
            0
        }
    }

    // Subtracts `amount` of chip ticks from the phase moving the negative whole part to the debt.
    fn repay(&mut self, amount: f64) {
        let value = self.phase - amount;
        let whole = value.floor();
        let mut phase = value - whole;
        let mut owed = (-whole) as u32;
        if phase >= 1.0 {
            phase -= 1.0;
            owed = owed.saturating_sub(1);
        }
        self.phase = phase;
        self.owed = self.owed.saturating_add(owed);
    }

    // At most a full buffer of chip ticks is carried. The rest is forgiven.
    fn limit_debt(&mut self) {
        let max_owed = self.max_owed();
        if self.owed > max_owed {
            trace!("forgiven {} chip ticks of overclock debt", self.owed - max_owed);
            self.owed = max_owed;
        }
    }

    fn max_owed(&self) -> u32 {
        (self.capacity as f64 * self.chip_ticks_per_sample).ceil().min(u32::MAX as f64) as u32
    }

    fn overclock_limit(&self, lacking: usize) -> u32 {
        let steps_per_sample = (self.chip_ticks_per_sample / self.ratio).ceil() + 2.0;
        (steps_per_sample * (lacking as f64 + 1.0) * 2.0).min(u32::MAX as f64) as u32
    }
}

/// Paces sample output of a chip engine by its clock ticks.
///
/// Engine implementations may use this to decide how many chip ticks to emulate between
/// consecutive output samples. The offset of the next sample is kept as a 16.16 fixed-point
/// number of chip ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct SampleClock {
    cycles_per_sample: i64,
    sample_offset: i64,
}

const FIXP_SHIFT: u32 = 16;
const FIXP_MASK: i64 = (1 << FIXP_SHIFT) - 1;
const FIXP_HALF: i64 = 1 << (FIXP_SHIFT - 1);

impl SampleClock {
    /// Creates a pacer for a chip clocked at `chip_clock` Hz rendering at `sample_rate` Hz.
    pub fn new(chip_clock: f64, sample_rate: u32) -> Self {
        let cycles_per_sample = (chip_clock / sample_rate.max(1) as f64
                                 * (1u64 << FIXP_SHIFT) as f64 + 0.5) as i64;
        SampleClock { cycles_per_sample: cycles_per_sample.max(1 << FIXP_SHIFT), sample_offset: 0 }
    }
    /// Restores the pacer from raw fixed-point values as returned by [SampleClock::as_raw].
    pub fn from_raw(cycles_per_sample: i64, sample_offset: i64) -> Self {
        SampleClock { cycles_per_sample: cycles_per_sample.max(1), sample_offset }
    }
    /// Returns the raw fixed-point `(cycles_per_sample, sample_offset)` values.
    pub fn as_raw(&self) -> (i64, i64) {
        (self.cycles_per_sample, self.sample_offset)
    }
    /// Distributes `budget` chip ticks between at most `max_samples` output samples.
    ///
    /// `clock` is called with the number of ticks to emulate and `Some(index)` of the sample
    /// to be taken right after them. If the budget runs out before `max_samples` are produced,
    /// the remaining ticks are passed with `None` and the next sample is due earlier. Otherwise
    /// ticks left after the last sample are not emulated.
    ///
    /// Returns the number of samples produced.
    pub fn run<F>(&mut self, mut budget: u32, max_samples: usize, mut clock: F) -> usize
        where F: FnMut(u32, Option<usize>)
    {
        let mut produced = 0;
        while produced < max_samples {
            let next_sample_offset = self.sample_offset + self.cycles_per_sample + FIXP_HALF;
            let delta_sample = (next_sample_offset >> FIXP_SHIFT) as u32;
            if delta_sample > budget {
                break
            }
            budget -= delta_sample;
            self.sample_offset = (next_sample_offset & FIXP_MASK) - FIXP_HALF;
            clock(delta_sample, Some(produced));
            produced += 1;
        }
        if produced < max_samples && budget > 0 {
            clock(budget, None);
            self.sample_offset -= (budget as i64) << FIXP_SHIFT;
        }
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    #[test]
    fn host_timing_works() {
        let timing = HostTiming::default();
        assert_eq!(timing.ticks_per_frame(), 35568);
        assert_eq!(timing.main_freq, 1_773_447.0);
        assert_eq!(timing.clock_ratio(1_773_447.0), 1.0);
        for (tv, rate, clock, capacity) in vec![
            (TvSystem::Pal,  44100, 1_773_447.0, 886),
            (TvSystem::Pal,  44100, 14_318_180.0, 893),
            (TvSystem::Pal,  48000, 17_734_472.0/18.0, 964),
            (TvSystem::Pal,  22050, 24_576_000.0*5.0/128.0, 443),
            (TvSystem::Ntsc, 44100, 1_789_790.0, 737),
            (TvSystem::Ntsc, 48000, 1_789_790.0, 803),
            (TvSystem::Ntsc, 22050, 14_318_180.0, 376)]
        {
            let timing = HostTiming::new(tv, rate);
            assert_eq!(timing.buffer_capacity(clock), capacity);
            assert_eq!(TickSync::new(clock, &timing).capacity(), capacity);
        }
        assert_eq!(HostTiming::new(TvSystem::Ntsc, 44100).ticks_per_frame(), 29868);
        assert_eq!("PAL".parse::<TvSystem>(), Ok(TvSystem::Pal));
        assert_eq!("ntsc".parse::<TvSystem>(), Ok(TvSystem::Ntsc));
        assert_eq!("secam".parse::<TvSystem>(), Err(ParseTvSystemError));
    }

    #[test]
    fn sample_clock_paces_by_ticks() {
        let mut pacer = SampleClock::new(441000.0, 44100);
        let mut clocked = 0;
        let mut emitted = Vec::new();
        assert_eq!(pacer.run(35, 10, |t, n| { clocked += t; emitted.push(n) }), 3);
        assert_eq!(clocked, 35);
        assert_eq!(emitted, vec![Some(0), Some(1), Some(2), None]);
        // 5 ticks left over from the previous call
        assert_eq!(pacer.run(5, 10, |t, _| clocked += t), 1);
        assert_eq!(pacer.run(100, 2, |t, _| clocked += t), 2);
        assert_eq!(clocked, 60);
        assert_eq!(pacer.run(0, 2, |t, _| clocked += t), 0);
        assert_eq!(clocked, 60);
        let (cycles, offset) = pacer.as_raw();
        assert_eq!(cycles, 10 << 16);
        assert_eq!(SampleClock::from_raw(cycles, offset), pacer);
    }

    // A chip stand-in that renders a sample every `chip clock / rate` ticks.
    struct Pacer {
        clock: SampleClock,
        handed: u64,
        consumed: u64,
    }

    impl Pacer {
        fn new(chip_clock: f64, timing: &HostTiming) -> Self {
            Pacer { clock: SampleClock::new(chip_clock, timing.sample_rate), handed: 0, consumed: 0 }
        }

        fn synthesize(&mut self, ticks: u32, max: usize) -> usize {
            self.handed += ticks as u64;
            let consumed = &mut self.consumed;
            self.clock.run(ticks, max, |t, _| *consumed += t as u64)
        }
    }

    #[test]
    fn tick_sync_produces_exact_sample_counts() {
        for (tv, chip_clock) in vec![(TvSystem::Pal, 1_773_447.0f64),
                                     (TvSystem::Pal, 17_734_472.0/18.0),
                                     (TvSystem::Ntsc, 14_318_180.0)] {
            let timing = HostTiming::new(tv, 44100);
            let mut sync = TickSync::new(chip_clock, &timing);
            let mut chip = Pacer::new(chip_clock, &timing);
            let samples_per_frame = timing.samples_per_frame();
            let ticks_per_frame = timing.ticks_per_frame();
            let mut sample_acc = 0.0f64;
            let mut host_total = 0u64;
            for _ in 0..10_000 {
                sample_acc += samples_per_frame;
                let requested = sample_acc.trunc() as usize;
                sample_acc -= requested as f64;
                assert!(requested <= sync.capacity());
                let count = sync.advance(ticks_per_frame, requested, |ticks, offset, max| {
                    assert!(offset + max <= requested);
                    chip.synthesize(ticks, max)
                });
                assert_eq!(count, requested);
                host_total += ticks_per_frame as u64;
                let phase = sync.phase();
                assert!((0.0..1.0).contains(&phase), "phase out of range: {}", phase);
                // every chip tick handed to the engine is accounted for by the host clock
                let ideal = host_total as f64 * sync.ratio();
                let accounted = chip.handed as f64 - sync.owed_ticks() as f64 + phase;
                assert!((ideal - accounted).abs() < 1e-3, "{} != {}", ideal, accounted);
                // the debt never exceeds a few samples worth of ticks
                assert!((sync.owed_ticks() as f64) < 4.0 * sync.chip_ticks_per_sample() + 1.0);
            }
        }
    }

    #[test]
    fn tick_sync_phase_is_bounded() {
        let mut rng = SmallRng::seed_from_u64(0x5a5a);
        let timing = HostTiming::default();
        for chip_clock in [1_773_447.0, 985_248.4, 14_318_180.0, 3_546_894.0].iter().copied() {
            let mut sync = TickSync::new(chip_clock, &timing);
            let mut chip = Pacer::new(chip_clock, &timing);
            for _ in 0..2000 {
                let host_ticks = rng.gen_range(0..40_000);
                let requested = rng.gen_range(0..sync.capacity() + 100);
                let count = sync.advance(host_ticks, requested, |ticks, _, max| chip.synthesize(ticks, max));
                assert_eq!(count, requested.min(sync.capacity()));
                assert!(sync.phase() >= 0.0 && sync.phase() < 1.0);
            }
        }
    }

    #[test]
    fn tick_sync_clamps_to_capacity() {
        let timing = HostTiming::default();
        let mut sync = TickSync::new(1_773_447.0, &timing);
        let capacity = sync.capacity();
        let mut chip = Pacer::new(1_773_447.0, &timing);
        let count = sync.advance(timing.ticks_per_frame(), capacity * 3,
                                 |ticks, _, max| chip.synthesize(ticks, max));
        assert_eq!(count, capacity);
        let count = sync.fill(capacity + 1, |ticks, _, max| chip.synthesize(ticks, max));
        assert_eq!(count, capacity);
    }

    #[test]
    fn tick_sync_without_ticks_overclocks() {
        let timing = HostTiming::default();
        let mut sync = TickSync::new(1_773_447.0, &timing);
        let mut chip = Pacer::new(1_773_447.0, &timing);
        // no host time elapsed but samples are demanded
        assert_eq!(sync.advance(0, 10, |ticks, _, max| chip.synthesize(ticks, max)), 10);
        assert!(sync.owed_ticks() > 0);
        let owed = sync.owed_ticks() as u64;
        assert_eq!(owed, chip.handed);
        assert_eq!(owed, chip.consumed);
        // the debt is repaid from the next elapsed ticks
        let consumed = chip.consumed;
        assert_eq!(sync.advance(owed as u32, 0, |ticks, _, max| chip.synthesize(ticks, max)), 0);
        assert_eq!(chip.consumed, consumed);
        assert_eq!(sync.owed_ticks(), 0);
        sync.reset();
        assert_eq!(sync.phase(), 0.0);
        assert_eq!(sync.owed_ticks(), 0);
    }

    #[test]
    fn tick_sync_fills_while_host_ticks_lag() {
        let timing = HostTiming::default();
        for (host_ticks, requested) in vec![(0, 100), (timing.ticks_per_frame() / 2, 880)] {
            let mut sync = TickSync::new(1_773_447.0, &timing);
            let mut chip = Pacer::new(1_773_447.0, &timing);
            for frame in 0..50 {
                let count = sync.advance(host_ticks, requested,
                                         |ticks, _, max| chip.synthesize(ticks, max));
                assert_eq!(count, requested, "frame {}", frame);
                assert!(sync.owed_ticks() <= sync.max_owed());
                assert!(sync.phase() >= 0.0 && sync.phase() < 1.0);
            }
            assert_eq!(sync.owed_ticks(), sync.max_owed());
            // the host catching up repays the debt
            let owed = sync.owed_ticks();
            assert_eq!(sync.advance(owed, 0, |ticks, _, max| chip.synthesize(ticks, max)), 0);
            assert_eq!(sync.owed_ticks(), 0);
        }
    }

    #[test]
    fn tick_sync_stalled_engine_terminates() {
        let timing = HostTiming::default();
        let mut sync = TickSync::new(1_773_447.0, &timing);
        assert_eq!(sync.advance(1000, 10, |_, _, _| 0), 0);
        assert!(sync.phase() >= 0.0 && sync.phase() < 1.0);
        assert_eq!(sync.fill(10, |_, _, _| 0), 0);
    }
}
