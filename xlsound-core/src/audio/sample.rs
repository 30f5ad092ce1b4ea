/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Traits for primitive types used as output audio samples.
//!
//! Synthesis engines always produce signed 16-bit samples. The host output stream is either
//! unsigned 8-bit PCM centered at `128` or signed 16-bit PCM.

/// Provides various methods to primitive types being used as audio samples.
pub trait AudioSample: Copy + Send + Default + 'static {
    /// Creates a silent sample value (with zero amplitude). Useful for filling buffers.
    #[inline(always)]
    fn silence() -> Self {
        Self::default()
    }
    fn max_pos_amplitude() -> Self;
    fn max_neg_amplitude() -> Self;
}

/// For converting samples between types.
pub trait FromSample<S> {
    /// Converts to Self a sample from the `other`.
    fn from_sample(other: S) -> Self;
}

/// Additive composition of samples.
pub trait SampleAdd {
    /// Saturating addition. Computes self + other, saturating at the sample bounds instead of
    /// overflowing.
    ///
    /// For unsigned samples both operands are interpreted relative to their center point.
    fn saturating_add(self, other: Self) -> Self;
}

/// A sample type the [mixer][super::mixer] can composite engine output into.
pub trait OutputSample: AudioSample + SampleAdd + FromSample<i16> {}

impl<T: AudioSample + SampleAdd + FromSample<i16>> OutputSample for T {}

impl AudioSample for i16 {
    #[inline(always)] fn max_pos_amplitude() -> Self { i16::MAX }
    #[inline(always)] fn max_neg_amplitude() -> Self { i16::MIN }
}
impl AudioSample for u8 {
    #[inline(always)]
    fn silence() -> Self {
        0x80
    }
    #[inline(always)] fn max_pos_amplitude() -> Self { u8::MAX }
    #[inline(always)] fn max_neg_amplitude() -> Self { 0 }
}

impl<T: AudioSample> FromSample<T> for T {
    #[inline(always)]
    fn from_sample(other: T) -> T {
        other
    }
}

impl FromSample<i16> for u8 {
    #[inline]
    fn from_sample(other: i16) -> u8 {
        ((other >> 8) + 0x80) as u8
    }
}

impl SampleAdd for i16 {
    #[inline]
    fn saturating_add(self, other: i16) -> i16 {
        i16::saturating_add(self, other)
    }
}

impl SampleAdd for u8 {
    #[inline]
    fn saturating_add(self, other: u8) -> u8 {
        let sum = (self as i16 - 0x80) + (other as i16 - 0x80);
        (sum.max(i8::MIN as i16).min(i8::MAX as i16) + 0x80) as u8
    }
}
