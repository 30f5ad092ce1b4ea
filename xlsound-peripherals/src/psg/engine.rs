/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The emulation of the AY-3-8910 / YM2149 sound generator.
use core::convert::TryFrom;

use xlsound_core::chip::{
    ChipEngine, ChipKind, ChipModel, EngineConfig, EngineState, PsgModel, SnapshotError
};
use xlsound_core::clock::SampleClock;

use super::{PsgRegister, NUM_PSG_REGISTERS, REG_MASKS, AMPS_I16, FUSE_AMPS_I16};

/// Internal clock divisor: the generators advance once per this many chip clock ticks.
pub const INTERNAL_CLOCK_DIVISOR: u32 = 16;

/// The number of 32-bit fields in the engine state.
const STATE_WORDS: usize = NUM_PSG_REGISTERS + 26;
/// The size in bytes of the [EngineState] of [PsgEngine].
pub const PSG_STATE_LEN: usize = STATE_WORDS * 4;

/// Implements the AY-3-8910 / YM2149 programmable sound generator as a [ChipEngine].
///
/// The output of the three channels is point-sampled at the playback rate. In mono, the
/// channels are averaged. In stereo, they are panned: `A` left, `B` center, `C` right.
#[derive(Clone, Debug)]
pub struct PsgEngine {
    model: PsgModel,
    clock_hz: f64,
    sample_rate: u32,
    channels: usize,
    open: bool,
    regs: [u8; NUM_PSG_REGISTERS],
    pacer: SampleClock,
    gen: ToneGenerator,
}

impl Default for PsgEngine {
    fn default() -> Self {
        PsgEngine {
            model: PsgModel::Ay,
            clock_hz: 0.0,
            sample_rate: 0,
            channels: 1,
            open: false,
            regs: [0; NUM_PSG_REGISTERS],
            pacer: SampleClock::default(),
            gen: ToneGenerator::default(),
        }
    }
}

/// A type for PSG amplitude level register values.
#[derive(Default, Clone, Copy, Debug)]
struct AmpLevel(u8);

impl AmpLevel {
    #[inline]
    fn set(&mut self, level: u8) {
        self.0 = level & 0x1F;
    }
    #[inline]
    fn is_env_control(self) -> bool {
        self.0 & 0x10 != 0
    }
}

/// A type for PSG mixer controller register values.
#[derive(Default, Clone, Copy, Debug)]
struct Mixer(u8);

impl Mixer {
    #[inline]
    fn has_tone(self) -> bool {
        self.0 & 1 == 0
    }
    #[inline]
    fn has_noise(self) -> bool {
        self.0 & 8 == 0
    }
    #[inline]
    fn next_chan(&mut self) {
        self.0 >>= 1
    }
}

pub const ENV_SHAPE_CONT_MASK:   u8 = 0b0000_1000;
pub const ENV_SHAPE_ATTACK_MASK: u8 = 0b0000_0100;
pub const ENV_SHAPE_ALT_MASK:    u8 = 0b0000_0010;
pub const ENV_SHAPE_HOLD_MASK:   u8 = 0b0000_0001;
const ENV_LEVEL_REV_MASK:    u8 = 0b1000_0000;
const ENV_LEVEL_MOD_MASK:    u8 = 0b0100_0000;
const ENV_LEVEL_MASK:        u8 = 0x0F;
const ENV_CYCLE_MASK:        u8 = 0xF0;

/// Volume envelope progression.
#[derive(Clone, Copy, Debug)]
struct EnvelopeControl {
    period: u16,
    tick: u16,
    // c c c c CT AT AL HO
    cycle: u8,
    // RV MD 0 0 v v v v
    level: u8
}

impl Default for EnvelopeControl {
    fn default() -> Self {
        EnvelopeControl { period: 1, tick: 0, cycle: 0, level: 0 }
    }
}

impl EnvelopeControl {
    #[inline]
    fn set_shape(&mut self, shape: u8) {
        self.tick = 0;
        self.cycle = shape & !ENV_CYCLE_MASK;
        self.level = if shape & ENV_SHAPE_ATTACK_MASK != 0 {
            ENV_LEVEL_MOD_MASK
        }
        else {
            ENV_LEVEL_MOD_MASK|ENV_LEVEL_REV_MASK|ENV_LEVEL_MASK
        }
    }
    #[inline]
    fn set_period_fine(&mut self, perlo: u8) {
        self.set_period(self.period & 0xFF00 | perlo as u16)
    }
    #[inline]
    fn set_period_coarse(&mut self, perhi: u8) {
        self.set_period(u16::from_le_bytes([self.period as u8, perhi]))
    }
    #[inline]
    fn set_period(&mut self, mut period: u16) {
        if period == 0 { period = 1 }
        self.period = period;
        if self.tick >= period {
            self.tick %= period;
        }
    }
    #[inline]
    fn update_level(&mut self) -> u8 {
        let EnvelopeControl { period, mut tick, mut level, .. } = *self;
        if tick >= period {
            tick -= period;

            if level & ENV_LEVEL_MOD_MASK != 0 {
                level = (level & !ENV_LEVEL_MASK) | (
                    if level & ENV_LEVEL_REV_MASK == 0 {
                        level.wrapping_add(1)
                    }
                    else {
                        level.wrapping_sub(1)
                    }
                & ENV_LEVEL_MASK);

                let cycle = self.cycle.wrapping_add(0x10); // 16 steps per cycle
                if cycle & ENV_CYCLE_MASK == 0 {
                    if cycle & ENV_SHAPE_CONT_MASK == 0 {
                        level = 0;
                    }
                    else if cycle & ENV_SHAPE_HOLD_MASK != 0 {
                        if cycle & ENV_SHAPE_ALT_MASK == 0 {
                            level ^= ENV_LEVEL_MOD_MASK|ENV_LEVEL_MASK;
                        }
                        else {
                            level ^= ENV_LEVEL_MOD_MASK;
                        }
                    }
                    else if cycle & ENV_SHAPE_ALT_MASK != 0 {
                        level ^= ENV_LEVEL_REV_MASK|ENV_LEVEL_MASK;
                    }
                }
                self.level = level;
                self.cycle = cycle;
            }
        }
        self.tick = tick.wrapping_add(1);
        level & ENV_LEVEL_MASK
    }
}

const NOISE_PERIOD_MASK: u8 = 0x1F;

/// Noise progression.
#[derive(Clone, Copy, Debug)]
struct NoiseControl {
    rng: i32,
    period: u8,
    tick: u8,
    low: bool,
}

impl Default for NoiseControl {
    fn default() -> Self {
        NoiseControl { rng: 1, period: 1, tick: 0, low: false }
    }
}

impl NoiseControl {
    #[inline]
    fn set_period(&mut self, mut period: u8) {
        period &= NOISE_PERIOD_MASK;
        if period == 0 { period = 1 }
        self.period = period;
        if self.tick >= period {
            self.tick %= period;
        }
    }

    #[inline]
    fn update_is_low(&mut self) -> bool {
        let NoiseControl { mut rng, period, mut tick, mut low } = *self;
        if tick >= period {
            tick -= period;

            if (rng + 1) & 2 != 0 {
                low = !low;
                self.low = low;
            }
            rng = (-(rng & 1) & 0x12000) ^ (rng >> 1);
            self.rng = rng;
        }
        self.tick = tick.wrapping_add(1);
        low
    }
}

const TONE_GEN_MIN_THRESHOLD: u16 = 5;
const TONE_PERIOD_MASK: u16 = 0xFFF;

/// Tone progression.
#[derive(Clone, Copy, Debug)]
struct ToneControl {
    period: u16,
    tick: u16,
    low: bool
}

impl Default for ToneControl {
    fn default() -> Self {
        ToneControl { period: 1, tick: 0, low: false }
    }
}

impl ToneControl {
    #[inline]
    fn set_period_fine(&mut self, perlo: u8) {
        self.set_period(self.period & 0xFF00 | perlo as u16)
    }
    #[inline]
    fn set_period_coarse(&mut self, perhi: u8) {
        self.set_period(u16::from_le_bytes([self.period as u8, perhi]))
    }
    #[inline]
    fn set_period(&mut self, mut period: u16) {
        period &= TONE_PERIOD_MASK;
        if period == 0 { period = 1 }
        self.period = period;
        if self.tick >= period*2 {
            self.tick %= period*2;
        }
    }
    #[inline]
    fn update_is_low(&mut self) -> bool {
        let ToneControl { period, mut tick, mut low } = *self;
        if period < TONE_GEN_MIN_THRESHOLD {
            low = false;
        }
        else if tick >= period {
            tick -= period;
            low = !low;
            self.low = low;
        }
        self.tick = tick.wrapping_add(2);
        low
    }
}

/// The three channel generators of the chip.
#[derive(Default, Clone, Copy, Debug)]
struct ToneGenerator {
    divider: u32,
    levels: [u8; 3],
    amp_levels: [AmpLevel; 3],
    env_control: EnvelopeControl,
    noise_control: NoiseControl,
    tone_control: [ToneControl; 3],
    mixer: Mixer,
}

impl ToneGenerator {
    fn update_register(&mut self, reg: PsgRegister, val: u8) {
        use PsgRegister::*;
        match reg {
            ToneFineA|ToneFineB|ToneFineC => {
                self.tone_control[usize::from(reg) >> 1].set_period_fine(val)
            }
            ToneCoarseA|ToneCoarseB|ToneCoarseC => {
                self.tone_control[usize::from(reg) >> 1].set_period_coarse(val)
            }
            NoisePeriod => {
                self.noise_control.set_period(val)
            }
            MixerControl => {
                self.mixer = Mixer(val)
            }
            AmpLevelA|AmpLevelB|AmpLevelC => {
                self.amp_levels[usize::from(reg) - 8].set(val)
            }
            EnvPerFine => {
                self.env_control.set_period_fine(val)
            }
            EnvPerCoarse => {
                self.env_control.set_period_coarse(val)
            }
            EnvShape => {
                self.env_control.set_shape(val)
            }
        }
    }
    /// Emulates `ticks` of the chip clock.
    fn clock(&mut self, ticks: u32) {
        self.divider += ticks;
        while self.divider >= INTERNAL_CLOCK_DIVISOR {
            self.divider -= INTERNAL_CLOCK_DIVISOR;
            self.step();
        }
    }

    fn step(&mut self) {
        let env_level = self.env_control.update_level();
        let noise_low = self.noise_control.update_is_low();
        let mut mixer = self.mixer;
        for ((level, tone_control), tgt_lvl) in self.amp_levels.iter()
                                                .zip(self.tone_control.iter_mut())
                                                    .zip(self.levels.iter_mut()) {
            *tgt_lvl = if (mixer.has_tone() && tone_control.update_is_low()) ||
               (mixer.has_noise() && noise_low) {
                0
            }
            else if level.is_env_control() {
                env_level
            }
            else {
                level.0 & 0x0F
            };
            mixer.next_chan();
        }
    }
    /// Renders the current output levels into a single frame of `out`.
    fn render(&self, amps: &[i16;16], out: &mut [i16]) {
        let [a, b, c] = self.levels;
        let (a, b, c) = (amps[a as usize & 15] as i32,
                         amps[b as usize & 15] as i32,
                         amps[c as usize & 15] as i32);
        match out {
            [left, right] => {
                *left = ((2 * a + b) / 3) as i16;
                *right = ((2 * c + b) / 3) as i16;
            }
            [mono, ..] => {
                *mono = ((a + b + c) / 3) as i16;
            }
            [] => {}
        }
    }
}

impl PsgEngine {
    /// Returns the current model.
    #[inline]
    pub fn model(&self) -> PsgModel {
        self.model
    }
    /// Returns the chip clock frequency in Hz.
    #[inline]
    pub fn clock_hz(&self) -> f64 {
        self.clock_hz
    }
    /// Returns the playback sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
    /// Returns the current tone periods of each channel.
    ///
    /// The period is in the range: [1, 4095].
    pub fn tone_periods(&self) -> [u16;3] {
        let mut periods = [0;3];
        for (tone, tgt) in self.gen.tone_control.iter().zip(periods.iter_mut()) {
            *tgt = tone.period;
        }
        periods
    }
    /// Returns the current output level of each channel in the range: [0, 15].
    #[inline]
    pub fn levels(&self) -> [u8;3] {
        self.gen.levels
    }
    /// Returns the envelope period in the range: [1, 65535].
    #[inline]
    pub fn envelope_period(&self) -> u16 {
        self.gen.env_control.period
    }
    /// Converts a tone frequency given in Hz to a closest tone period register value.
    pub fn freq_to_tone_period(clock_hz: f64, hz: f64) -> u16 {
        let period = (clock_hz / (INTERNAL_CLOCK_DIVISOR as f64 * hz)).round();
        if period < 1.0 {
            1
        }
        else if period > TONE_PERIOD_MASK as f64 {
            TONE_PERIOD_MASK
        }
        else {
            period as u16
        }
    }

    fn amps(&self) -> &'static [i16;16] {
        match self.model {
            PsgModel::Ay => &AMPS_I16,
            PsgModel::Ym => &FUSE_AMPS_I16,
        }
    }

    fn apply_config(&mut self, config: &EngineConfig) {
        if let ChipModel::Psg(model) = config.model {
            self.model = model;
        }
        self.clock_hz = config.clock_hz;
        self.sample_rate = config.sample_rate;
        self.channels = config.channels();
        self.pacer = SampleClock::new(config.clock_hz, config.sample_rate);
    }
}

impl ChipEngine for PsgEngine {
    fn kind(&self) -> ChipKind {
        ChipKind::Psg
    }

    fn open(&mut self, config: &EngineConfig) {
        self.apply_config(config);
        self.regs = [0; NUM_PSG_REGISTERS];
        self.gen = ToneGenerator::default();
        self.open = true;
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn configure(&mut self, config: &EngineConfig) {
        let (_, offset) = self.pacer.as_raw();
        self.apply_config(config);
        let (cycles, _) = self.pacer.as_raw();
        self.pacer = SampleClock::from_raw(cycles, offset);
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn read(&mut self, reg: u16) -> u8 {
        match self.regs.get(reg as usize) {
            Some(&val) => val,
            None => 0xFF
        }
    }

    fn write(&mut self, reg: u16, data: u8) {
        if let Ok(preg) = PsgRegister::try_from(reg) {
            let val = preg.mask(data);
            self.regs[usize::from(preg)] = val;
            self.gen.update_register(preg, val);
        }
    }

    fn synthesize(&mut self, chip_ticks: u32, out: &mut [i16], max_samples: usize) -> usize {
        if !self.open {
            return 0
        }
        let channels = self.channels;
        let max_samples = max_samples.min(out.len() / channels);
        let amps = self.amps();
        let gen = &mut self.gen;
        self.pacer.run(chip_ticks, max_samples, |ticks, sample| {
            gen.clock(ticks);
            if let Some(index) = sample {
                gen.render(amps, &mut out[index * channels..(index + 1) * channels]);
            }
        })
    }

    fn state_len(&self) -> usize {
        PSG_STATE_LEN
    }

    fn read_full_state(&self) -> EngineState {
        let gen = &self.gen;
        let env = &gen.env_control;
        let noise = &gen.noise_control;
        let (_, offset) = self.pacer.as_raw();
        let mut words: Vec<i32> = Vec::with_capacity(STATE_WORDS);
        words.extend(self.regs.iter().map(|&r| r as i32));
        words.push(gen.divider as i32);
        words.extend(gen.levels.iter().map(|&l| l as i32));
        words.extend(gen.amp_levels.iter().map(|a| a.0 as i32));
        words.extend_from_slice(&[env.period as i32, env.tick as i32, env.cycle as i32, env.level as i32]);
        words.extend_from_slice(&[noise.rng, noise.period as i32, noise.tick as i32, noise.low as i32]);
        for tone in gen.tone_control.iter() {
            words.extend_from_slice(&[tone.period as i32, tone.tick as i32, tone.low as i32]);
        }
        words.push(gen.mixer.0 as i32);
        words.push(offset as i32);
        EngineState::from_words(&words)
    }

    fn write_full_state(&mut self, state: &EngineState) -> Result<(), SnapshotError> {
        SnapshotError::check_state_size(PSG_STATE_LEN, state)?;
        let mut words = state.words();
        let mut next = || words.next().unwrap_or(0);
        let mut regs = [0u8; NUM_PSG_REGISTERS];
        for (reg, mask) in regs.iter_mut().zip(REG_MASKS.iter()) {
            *reg = next() as u8 & mask;
        }
        let mut gen = ToneGenerator { divider: next() as u32 % INTERNAL_CLOCK_DIVISOR, ..ToneGenerator::default() };
        for level in gen.levels.iter_mut() {
            *level = next() as u8 & 0x0F;
        }
        for amp in gen.amp_levels.iter_mut() {
            amp.set(next() as u8);
        }
        gen.env_control = EnvelopeControl {
            period: (next() as u16).max(1), tick: next() as u16, cycle: next() as u8, level: next() as u8
        };
        gen.noise_control = NoiseControl {
            rng: next(), period: (next() as u8 & NOISE_PERIOD_MASK).max(1), tick: next() as u8, low: next() != 0
        };
        for tone in gen.tone_control.iter_mut() {
            *tone = ToneControl {
                period: (next() as u16 & TONE_PERIOD_MASK).max(1), tick: next() as u16, low: next() != 0
            };
        }
        gen.mixer = Mixer(next() as u8);
        let offset = next() as i64;
        let (cycles, _) = self.pacer.as_raw();
        self.pacer = SampleClock::from_raw(cycles, offset);
        self.regs = regs;
        self.gen = gen;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlsound_core::audio::PanMode;

    fn config(pan: PanMode) -> EngineConfig {
        EngineConfig {
            clock_hz: 1_773_447.0,
            model: ChipModel::Psg(PsgModel::Ay),
            pan,
            sample_rate: 44100
        }
    }

    fn open_psg(pan: PanMode) -> PsgEngine {
        let mut psg = PsgEngine::default();
        psg.open(&config(pan));
        psg
    }

    #[test]
    fn psg_registers_are_masked() {
        let mut psg = open_psg(PanMode::Mono);
        for reg in 0..14u16 {
            psg.write(reg, 0xff);
            assert_eq!(psg.read(reg), REG_MASKS[reg as usize]);
        }
        psg.write(14, 0x55);
        assert_eq!(psg.read(14), 0xff);
        assert_eq!(psg.read(0x1FF), 0xff);
        assert_eq!(psg.tone_periods(), [0xFFF; 3]);
        assert_eq!(psg.envelope_period(), 0xFFFF);
        psg.open(&config(PanMode::Mono));
        assert_eq!(psg.read(1), 0);
        assert_eq!(psg.tone_periods(), [1; 3]);
    }

    #[test]
    fn psg_tone_has_expected_pitch() {
        let mut psg = open_psg(PanMode::Mono);
        let period = PsgEngine::freq_to_tone_period(1_773_447.0, 440.0);
        assert_eq!(period, 252);
        psg.write(0, period as u8);
        psg.write(1, (period >> 8) as u8);
        psg.write(7, 0b0011_1110);
        psg.write(8, 15);
        let mut out = vec![0i16; 44000];
        assert_eq!(psg.synthesize(1_773_447, &mut out, 44000), 44000);
        assert!(out.iter().all(|&s| s == 0 || s == 0x7fff / 3));
        let transitions = out.windows(2).filter(|w| w[0] != w[1]).count();
        // 2 transitions per period of the tone
        let expected = 2.0 * 1_773_447.0 / (16.0 * 252.0) * 44000.0 / 44100.0;
        assert!((transitions as f64 - expected).abs() < 4.0, "{} {}", transitions, expected);
    }

    #[test]
    fn psg_stereo_pans_channels() {
        let mut psg = open_psg(PanMode::AbcStereo);
        assert_eq!(psg.channels(), 2);
        psg.write(7, 0x3f);
        psg.write(8, 15);
        let mut out = vec![0i16; 20];
        assert_eq!(psg.synthesize(1000, &mut out, 10), 10);
        assert_eq!(psg.levels(), [15, 0, 0]);
        const SIDE: i16 = 21844;
        for frame in out.chunks(2) {
            assert_eq!(frame, &[SIDE, 0][..]);
        }
        psg.write(10, 15);
        psg.write(8, 0);
        assert_eq!(psg.synthesize(100, &mut out, 2), 2);
        assert_eq!(&out[..4], &[0, SIDE, 0, SIDE][..]);
    }

    #[test]
    fn psg_envelope_write_restarts_envelope() {
        let mut psg = open_psg(PanMode::Mono);
        psg.write(7, 0x3f);
        psg.write(8, 0x10);
        psg.write(11, 1);
        psg.write(13, ENV_SHAPE_CONT_MASK|ENV_SHAPE_ATTACK_MASK);
        let mut out = vec![0i16; 100];
        psg.synthesize(16 * 8, &mut out, 100);
        assert_eq!(psg.levels(), [7, 0, 0]);
        // other writes leave the envelope alone
        psg.write(9, 3);
        psg.synthesize(16, &mut out, 100);
        assert_eq!(psg.levels(), [8, 3, 0]);
        psg.write(13, ENV_SHAPE_CONT_MASK|ENV_SHAPE_ATTACK_MASK);
        psg.synthesize(16, &mut out, 100);
        assert_eq!(psg.levels(), [0, 3, 0]);
    }

    #[test]
    fn psg_state_round_trip() {
        let mut psg = open_psg(PanMode::Mono);
        for (reg, val) in vec![(0u16, 0x40u8), (1, 1), (6, 7), (7, 0b0011_0110), (8, 12), (9, 0x10), (11, 0x20), (13, 0x0e)] {
            psg.write(reg, val);
        }
        let mut out = vec![0i16; 500];
        psg.synthesize(7777, &mut out, 500);
        let state = psg.read_full_state();
        assert_eq!(state.len(), PSG_STATE_LEN);
        assert_eq!(psg.state_len(), PSG_STATE_LEN);
        let mut twin = open_psg(PanMode::Mono);
        twin.write_full_state(&state).unwrap();
        assert_eq!(twin.read_full_state(), state);
        let mut out1 = vec![0i16; 1000];
        let mut out2 = vec![0i16; 1000];
        assert_eq!(psg.synthesize(35568, &mut out1, 1000), twin.synthesize(35568, &mut out2, 1000));
        assert_eq!(out1, out2);
        assert!(out1.iter().any(|&s| s != 0));
        assert_eq!(twin.write_full_state(&EngineState::from_words(&[0; 3])),
                   Err(SnapshotError::StateSize { expected: PSG_STATE_LEN, found: 12 }));
    }

    #[test]
    fn psg_closed_renders_nothing() {
        let mut psg = open_psg(PanMode::Mono);
        psg.close();
        let mut out = vec![0i16; 10];
        assert_eq!(psg.synthesize(1000, &mut out, 10), 0);
    }

    #[test]
    fn psg_env_works() {
        let mut env = EnvelopeControl::default();

        for shape in [0, ENV_SHAPE_ALT_MASK,
                         ENV_SHAPE_HOLD_MASK,
                         ENV_SHAPE_ALT_MASK|ENV_SHAPE_HOLD_MASK,
                         ENV_SHAPE_CONT_MASK|ENV_SHAPE_HOLD_MASK].iter().copied() {
            env.set_shape(shape);
            assert_eq!(env.tick, 0);
            assert_eq!(env.cycle, shape);
            assert_eq!(env.level, ENV_LEVEL_REV_MASK|ENV_LEVEL_MOD_MASK|ENV_LEVEL_MASK);
            env.set_period(0);
            assert_eq!(env.period, 1);
            for exp_level in (0..=15).rev() {
                assert_eq!(env.update_level(), exp_level);
                assert_eq!(env.tick, 1);
            }
            for _ in 0..100 {
                assert_eq!(env.update_level(), 0);
            }
        }

        env.set_shape(ENV_SHAPE_CONT_MASK|ENV_SHAPE_ALT_MASK);
        env.set_period(0);
        for _ in 0..10 {
            for exp_level in (0..=15).rev() {
                assert_eq!(env.update_level(), exp_level);
                assert_eq!(env.level, ENV_LEVEL_REV_MASK|ENV_LEVEL_MOD_MASK|exp_level);
            }
            for exp_level in 0..=15 {
                assert_eq!(env.update_level(), exp_level);
                assert_eq!(env.level, ENV_LEVEL_MOD_MASK|exp_level);
            }
        }

        env.set_shape(ENV_SHAPE_CONT_MASK|ENV_SHAPE_ATTACK_MASK|ENV_SHAPE_HOLD_MASK);
        env.set_period(0);
        for exp_level in 0..=15 {
            assert_eq!(env.update_level(), exp_level);
        }
        for _ in 0..100 {
            assert_eq!(env.update_level(), 15);
        }
    }
}
