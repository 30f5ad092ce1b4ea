/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Audio samples and the output mixer.
pub mod mixer;
pub mod sample;

pub use mixer::*;
pub use sample::*;
