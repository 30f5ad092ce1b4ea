/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Additive compositing of synthesized sample runs into the host output stream.
//!
//! The host stream already carries contributions from other sound sources, so every function
//! here adds to the existing content instead of replacing it. Unsigned 8-bit output is centered
//! at [CENTER_8BIT]; engine samples are scaled down to the high byte and added relative to it.
use core::fmt;
use core::str::FromStr;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use super::sample::{FromSample, SampleAdd, OutputSample};

/// The center (silence) level of the unsigned 8-bit host output stream.
pub const CENTER_8BIT: u8 = 128;

/// How a chip's output channels are placed in the host output stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub enum PanMode {
    /// A single summed channel, broadcast to all output channels.
    Mono,
    /// The chip renders its own stereo split (e.g. voices A/B/C spread across L/R), which is
    /// mapped straight through.
    AbcStereo,
    /// Each of two chips is hard-panned: the first one fully left, the second one fully right.
    LrSplit,
}

impl Default for PanMode {
    fn default() -> Self {
        PanMode::Mono
    }
}

impl PanMode {
    /// Returns the number of channels a chip engine should render with this pan mode.
    #[inline]
    pub fn engine_channels(self) -> usize {
        match self {
            PanMode::AbcStereo => 2,
            _ => 1
        }
    }
    /// Returns the placement of the chip at `chip_index` within a peripheral.
    pub fn placement(self, chip_index: usize) -> Placement {
        match self {
            PanMode::Mono => Placement::Broadcast,
            PanMode::AbcStereo => Placement::Through,
            PanMode::LrSplit if chip_index & 1 == 0 => Placement::Left,
            PanMode::LrSplit => Placement::Right,
        }
    }
}

/// An error returned when parsing a [PanMode] name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePanModeError;

impl fmt::Display for ParsePanModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "unrecognized pan mode".fmt(f)
    }
}

impl std::error::Error for ParsePanModeError {}

impl FromStr for PanMode {
    type Err = ParsePanModeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.eq_ignore_ascii_case("mono") {
            Ok(PanMode::Mono)
        }
        else if name.eq_ignore_ascii_case("abc") {
            Ok(PanMode::AbcStereo)
        }
        else if name.eq_ignore_ascii_case("lr") {
            Ok(PanMode::LrSplit)
        }
        else {
            Err(ParsePanModeError)
        }
    }
}

/// A resolved routing of a single [SampleRun] into the output channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// The first source channel goes to every output channel.
    Broadcast,
    /// Source channel `n` goes to output channel `n`. If there are more source than output
    /// channels, the excess ones are summed into the last output channel.
    Through,
    /// The first source channel goes to the first output channel.
    Left,
    /// The first source channel goes to the second output channel, or to the first one
    /// if the output is mono.
    Right,
}

/// The layout of the host output stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase"))]
pub struct OutputFormat {
    /// The number of interleaved output channels: 1 or 2.
    pub channels: u8,
    /// `true` for signed 16-bit output, `false` for unsigned 8-bit output.
    pub bit16: bool,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat { channels: 1, bit16: true }
    }
}

impl OutputFormat {
    /// Returns the number of output channels, either 1 or 2.
    #[inline]
    pub fn channels(self) -> usize {
        if self.channels == 2 { 2 } else { 1 }
    }
    /// Returns `true` if the output is a stereo pair.
    #[inline]
    pub fn is_stereo(self) -> bool {
        self.channels() == 2
    }
    /// Returns the size in bytes of a single interleaved output frame.
    #[inline]
    pub fn frame_size(self) -> usize {
        self.channels() * if self.bit16 { 2 } else { 1 }
    }
}

/// A run of freshly synthesized, interleaved signed 16-bit samples.
///
/// Borrowed from a chip's scratch buffer and consumed within a single call.
#[derive(Clone, Copy, Debug)]
pub struct SampleRun<'a> {
    samples: &'a [i16],
    channels: usize,
}

impl<'a> SampleRun<'a> {
    /// Creates a run from interleaved `samples` with the given number of `channels`.
    ///
    /// Trailing samples that don't form a complete frame are ignored.
    pub fn new(samples: &'a [i16], channels: usize) -> Self {
        let channels = channels.max(1);
        let len = samples.len() - samples.len() % channels;
        SampleRun { samples: &samples[..len], channels }
    }
    /// Creates an empty run.
    pub fn empty() -> Self {
        SampleRun { samples: &[], channels: 1 }
    }
    /// Returns the number of sample frames in this run.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }
    /// Returns the interleaved samples.
    #[inline]
    pub fn samples(&self) -> &'a [i16] {
        self.samples
    }
    /// Mixes this run into the output `dst` buffer of `S` samples with `dst_channels`
    /// interleaved channels according to `placement`.
    ///
    /// Returns the number of frames mixed.
    pub fn mix_into<S: OutputSample>(
            &self,
            dst: &mut [S],
            dst_channels: usize,
            placement: Placement
        ) -> usize
    {
        route(dst, dst_channels, self, placement)
    }
    /// Mixes this run into a raw byte output buffer laid out according to `format`.
    ///
    /// 16-bit samples are stored in the native byte order.
    ///
    /// Returns the number of frames mixed.
    pub fn mix_into_bytes(&self, dst: &mut [u8], format: OutputFormat, placement: Placement) -> usize {
        if format.bit16 {
            route(&mut Bit16Bytes(dst), format.channels(), self, placement)
        }
        else {
            route(dst, format.channels(), self, placement)
        }
    }
}

/// Mixes `count` frames of a single source channel into a single output channel.
///
/// * `dst_channels` and `dst_channel` - the number of interleaved output channels and the target one.
/// * `src_channels` and `src_channel` - the number of interleaved source channels and the source one.
///
/// The `count` is clamped to the number of complete frames available in both buffers.
/// Returns the number of frames mixed. Nothing is ever padded.
pub fn mix_channel<S: OutputSample>(
        dst: &mut [S],
        dst_channels: usize,
        dst_channel: usize,
        src: &[i16],
        src_channels: usize,
        src_channel: usize,
        count: usize
    ) -> usize
{
    mix_cells(dst, dst_channels, dst_channel, src, src_channels, src_channel, count)
}

/// Like [mix_channel] but into a raw byte output buffer with either 16-bit native endian
/// or 8-bit unsigned samples depending on `bit16`.
#[allow(clippy::too_many_arguments)]
pub fn mix_channel_bytes(
        dst: &mut [u8],
        bit16: bool,
        dst_channels: usize,
        dst_channel: usize,
        src: &[i16],
        src_channels: usize,
        src_channel: usize,
        count: usize
    ) -> usize
{
    if bit16 {
        mix_cells(&mut Bit16Bytes(dst), dst_channels, dst_channel, src, src_channels, src_channel, count)
    }
    else {
        mix_cells(dst, dst_channels, dst_channel, src, src_channels, src_channel, count)
    }
}

/// Output storage that samples can be added to by index.
trait SampleCells {
    fn cell_count(&self) -> usize;
    fn add_at(&mut self, index: usize, sample: i16);
}

impl<S: OutputSample> SampleCells for [S] {
    #[inline]
    fn cell_count(&self) -> usize {
        self.len()
    }
    #[inline]
    fn add_at(&mut self, index: usize, sample: i16) {
        let cell = &mut self[index];
        *cell = cell.saturating_add(S::from_sample(sample));
    }
}

/// A byte buffer viewed as native endian signed 16-bit samples.
struct Bit16Bytes<'a>(&'a mut [u8]);

impl SampleCells for Bit16Bytes<'_> {
    #[inline]
    fn cell_count(&self) -> usize {
        self.0.len() / 2
    }
    #[inline]
    fn add_at(&mut self, index: usize, sample: i16) {
        let bytes = &mut self.0[index * 2..index * 2 + 2];
        let current = i16::from_ne_bytes([bytes[0], bytes[1]]);
        let mixed = SampleAdd::saturating_add(current, i16::from_sample(sample));
        bytes.copy_from_slice(&mixed.to_ne_bytes());
    }
}

fn mix_cells<C: SampleCells + ?Sized>(
        dst: &mut C,
        dst_channels: usize,
        dst_channel: usize,
        src: &[i16],
        src_channels: usize,
        src_channel: usize,
        count: usize
    ) -> usize
{
    if dst_channel >= dst_channels || src_channel >= src_channels {
        return 0
    }
    let count = count.min(dst.cell_count() / dst_channels)
                     .min(src.len() / src_channels);
    for frame in 0..count {
        dst.add_at(frame * dst_channels + dst_channel, src[frame * src_channels + src_channel]);
    }
    count
}

fn route<C: SampleCells + ?Sized>(
        dst: &mut C,
        dst_channels: usize,
        run: &SampleRun<'_>,
        placement: Placement
    ) -> usize
{
    let dst_channels = dst_channels.max(1);
    let src = run.samples;
    let src_channels = run.channels;
    let count = run.len();
    match placement {
        Placement::Broadcast => {
            let mut mixed = 0;
            for chan in 0..dst_channels {
                mixed = mix_cells(dst, dst_channels, chan, src, src_channels, 0, count);
            }
            mixed
        }
        Placement::Through => {
            let mut mixed = 0;
            for chan in 0..src_channels {
                let target = chan.min(dst_channels - 1);
                mixed = mix_cells(dst, dst_channels, target, src, src_channels, chan, count);
            }
            mixed
        }
        Placement::Left => {
            mix_cells(dst, dst_channels, 0, src, src_channels, 0, count)
        }
        Placement::Right => {
            mix_cells(dst, dst_channels, dst_channels - 1, src, src_channels, 0, count)
        }
    }
}
