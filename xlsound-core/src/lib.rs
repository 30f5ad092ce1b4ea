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
//! The core components of the XLSOUND library.
//!
//! * [chip] - the interface to external synthesis engines and the lifecycle of chip handles.
//! * [clock] - host timing and the clock-domain tick synchronizer.
//! * [bus] - address decoding primitives and the floating bus convention.
//! * [audio] - sample types and the additive output mixer.
//! * [savestate] - the sequential binary save-state stream.
pub mod audio;
pub mod bus;
pub mod chip;
pub mod clock;
pub mod savestate;
