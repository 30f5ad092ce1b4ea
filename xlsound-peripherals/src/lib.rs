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
//! Emulators of add-on sound cards of the 8-bit Atari computers.
//!
//! * [card] - a generic [card::PeripheralInstance] driven by one of the card layouts.
//! * [engine] - a silent engine and the factory of engines the cards are built with.
//! * [psg] - the AY-3-8910 / YM2149 programmable sound generator.
#[macro_use]
extern crate bitflags;

pub mod card;
pub mod engine;
pub mod psg;
