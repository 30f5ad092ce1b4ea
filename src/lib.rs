/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    XLSOUND is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    XLSOUND is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
//! XLSOUND is a library for building emulators of add-on sound cards of the 8-bit Atari
//! computers.
//!
//! The components are split into crates re-exported here:
//!
//! * [audio], [bus], [chip], [clock] and [savestate] from `xlsound-core` - the chip engine
//!   interface, clock-domain synchronization, address routing, sample mixing and save-states.
//! * [card], [engine] and [psg] from `xlsound-peripherals` - the sound cards, available with
//!   the `peripherals` feature.
//!
//! A host emulator creates a [card::PeripheralInstance] for every configured card, forwards
//! bus accesses claimed by it and once per audio frame asks it to add its samples to the
//! output buffer:
//!
//! ```
//! # #[cfg(feature = "peripherals")]
//! # {
//! use xlsound::prelude::*;
//!
//! let layout = Sonari::new(SonariVersion::Mono, "3".parse().unwrap(), [Some(PsgModel::Ay), None]);
//! let mut card: PeripheralInstance = PeripheralInstance::new(
//!     layout.into(), HostTiming::default(), OutputFormat::default());
//! assert!(card.claims(0xD560));
//! card.write(0xD560, 0x08);
//! card.write(0xD561, 0x0F);
//! let mut buffer = vec![0i16; 882];
//! assert_eq!(card.generate(35568, &mut buffer), 882);
//! # }
//! ```
pub use xlsound_core::{audio, bus, chip, clock, savestate};

#[cfg(feature = "peripherals")]
pub use xlsound_peripherals::{card, engine, psg};

/// Re-exports of the most commonly used types and traits.
pub mod prelude {
    pub use xlsound_core::audio::{OutputFormat, OutputSample, PanMode, Placement, SampleRun};
    pub use xlsound_core::bus::{Access, AddressRouter, RegisterTarget, FLOATING_BUS};
    pub use xlsound_core::chip::{
        ChipEngine, ChipHandle, ChipKind, ChipModel, EngineConfig, EngineState,
        FmModel, PsgModel, SidModel, SnapshotError, StateSnapshot
    };
    pub use xlsound_core::clock::{HostTiming, TickSync, TvSystem};
    pub use xlsound_core::savestate::{LoadStateError, StateReader, StateWriter};

    #[cfg(feature = "peripherals")]
    pub use xlsound_peripherals::card::{
        Card, CardLayout, CardSlot, PeripheralInstance,
        Evie, EvieVersion, Melody, Sidari, SidariVersion, SlightSid, SlightSidVersion,
        Sonari, SonariVersion, Yamari
    };
    #[cfg(feature = "peripherals")]
    pub use xlsound_peripherals::engine::{DefaultEngines, EngineFactory, SilentEngine};
}
