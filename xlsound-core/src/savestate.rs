/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The sequential binary save-state stream.
//!
//! Peripherals store their state as a sequence of fields in a fixed order: `INT` fields as
//! 32-bit little-endian signed integers and `UBYTE` fields as raw bytes. The leading field is
//! always a discriminant telling whether and which fields follow, so a reader has to branch
//! exactly the same way the writer did.
use core::fmt;
use std::io::{self, Read, Write};

use crate::chip::{ChipKind, EngineState, SnapshotError, StateSnapshot};

/// The largest engine state accepted from a stream.
pub const MAX_ENGINE_STATE_LEN: usize = 1 << 20;

/// An error returned when loading a save-state.
#[derive(Debug)]
pub enum LoadStateError {
    /// The stream couldn't be read.
    Io(io::Error),
    /// A chip snapshot doesn't fit the chip.
    Snapshot(SnapshotError),
    /// The leading discriminant is not known to the peripheral.
    UnknownDiscriminant(i32),
    /// A field holds a value out of its range.
    InvalidField { name: &'static str, value: i32 },
}

impl std::error::Error for LoadStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadStateError::Io(err) => Some(err),
            LoadStateError::Snapshot(err) => Some(err),
            _ => None
        }
    }
}

impl fmt::Display for LoadStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStateError::Io(err) => err.fmt(f),
            LoadStateError::Snapshot(err) => err.fmt(f),
            LoadStateError::UnknownDiscriminant(disc) => write!(f,
                "unknown save-state discriminant: {}", disc),
            LoadStateError::InvalidField { name, value } => write!(f,
                "save-state field {} out of range: {}", name, value),
        }
    }
}

impl From<io::Error> for LoadStateError {
    fn from(err: io::Error) -> Self {
        LoadStateError::Io(err)
    }
}

impl From<SnapshotError> for LoadStateError {
    fn from(err: SnapshotError) -> Self {
        LoadStateError::Snapshot(err)
    }
}

impl From<LoadStateError> for io::Error {
    fn from(err: LoadStateError) -> Self {
        match err {
            LoadStateError::Io(err) => err,
            e => io::Error::new(io::ErrorKind::InvalidData, e)
        }
    }
}

/// Writes save-state fields to any [Write] implementation.
#[derive(Debug)]
pub struct StateWriter<W> {
    wr: W,
}

impl<W: Write> StateWriter<W> {
    pub fn new(wr: W) -> Self {
        StateWriter { wr }
    }

    pub fn into_inner(self) -> W {
        self.wr
    }
    /// Writes an `INT` field.
    pub fn write_int(&mut self, value: i32) -> io::Result<()> {
        self.wr.write_all(&value.to_le_bytes())
    }
    /// Writes a single `UBYTE` field.
    pub fn write_ubyte(&mut self, value: u8) -> io::Result<()> {
        self.wr.write_all(&[value])
    }
    /// Writes an array of `UBYTE` fields.
    pub fn write_ubytes(&mut self, values: &[u8]) -> io::Result<()> {
        self.wr.write_all(values)
    }
    /// Writes a chip snapshot: the register file, the length of the engine state as an `INT`
    /// and the engine state bytes.
    pub fn write_snapshot(&mut self, snapshot: &StateSnapshot) -> io::Result<()> {
        self.write_ubytes(&snapshot.registers)?;
        let len = snapshot.engine.len();
        if len > MAX_ENGINE_STATE_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "engine state is too large"))
        }
        self.write_int(len as i32)?;
        self.write_ubytes(snapshot.engine.as_slice())
    }
}

/// Reads save-state fields from any [Read] implementation.
#[derive(Debug)]
pub struct StateReader<R> {
    rd: R,
}

impl<R: Read> StateReader<R> {
    pub fn new(rd: R) -> Self {
        StateReader { rd }
    }

    pub fn into_inner(self) -> R {
        self.rd
    }
    /// Reads an `INT` field.
    pub fn read_int(&mut self) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        self.rd.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }
    /// Reads a single `UBYTE` field.
    pub fn read_ubyte(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.rd.read_exact(&mut buf)?;
        Ok(buf[0])
    }
    /// Fills `values` with `UBYTE` fields.
    pub fn read_ubytes(&mut self, values: &mut [u8]) -> io::Result<()> {
        self.rd.read_exact(values)
    }
    /// Reads an `INT` field that must be within `0..=max`.
    pub fn read_int_within(&mut self, name: &'static str, max: i32) -> Result<i32, LoadStateError> {
        let value = self.read_int()?;
        if (0..=max).contains(&value) {
            Ok(value)
        }
        else {
            Err(LoadStateError::InvalidField { name, value })
        }
    }
    /// Reads a chip snapshot of the given `kind` as written by [StateWriter::write_snapshot].
    pub fn read_snapshot(&mut self, kind: ChipKind) -> Result<StateSnapshot, LoadStateError> {
        let mut registers = vec![0u8; kind.register_width()].into_boxed_slice();
        self.read_ubytes(&mut registers)?;
        let len = self.read_int_within("engine state length", MAX_ENGINE_STATE_LEN as i32)?;
        let mut engine = vec![0u8; len as usize];
        self.read_ubytes(&mut engine)?;
        Ok(StateSnapshot { kind, registers, engine: EngineState::from(engine) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_stream_works() {
        let mut wr = StateWriter::new(Vec::new());
        wr.write_int(-2).unwrap();
        wr.write_ubyte(0x84).unwrap();
        wr.write_ubytes(b"PSG").unwrap();
        let snapshot = StateSnapshot {
            kind: ChipKind::Psg,
            registers: (0..14u8).collect::<Vec<_>>().into_boxed_slice(),
            engine: EngineState::from_words(&[0x0102_0304])
        };
        wr.write_snapshot(&snapshot).unwrap();
        let data = wr.into_inner();
        assert_eq!(&data[..8], &[0xFE, 0xFF, 0xFF, 0xFF, 0x84, b'P', b'S', b'G']);
        assert_eq!(data.len(), 8 + 14 + 4 + 4);
        assert_eq!(&data[22..], &[4, 0, 0, 0, 4, 3, 2, 1]);
        let mut rd = StateReader::new(&data[..]);
        assert_eq!(rd.read_int().unwrap(), -2);
        assert_eq!(rd.read_ubyte().unwrap(), 0x84);
        let mut sig = [0u8; 3];
        rd.read_ubytes(&mut sig).unwrap();
        assert_eq!(&sig, b"PSG");
        assert_eq!(rd.read_snapshot(ChipKind::Psg).unwrap(), snapshot);
        match rd.read_int() {
            Err(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            Ok(_) => panic!("expected end of stream")
        }
    }

    #[test]
    fn state_stream_rejects_bad_fields() {
        let mut rd = StateReader::new(&[8u8, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF][..]);
        assert_eq!(rd.read_int_within("slot", 7).unwrap_err().to_string(),
                   "save-state field slot out of range: 8");
        let err = rd.read_int_within("slot", 7).unwrap_err();
        assert!(matches!(err, LoadStateError::InvalidField { name: "slot", value: -1 }));
        let err: io::Error = err.into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let mut data = vec![0u8; 14];
        data.extend_from_slice(&0x7fff_ffffi32.to_le_bytes());
        let mut rd = StateReader::new(&data[..]);
        assert!(matches!(rd.read_snapshot(ChipKind::Psg),
                         Err(LoadStateError::InvalidField { value: 0x7fff_ffff, .. })));
        assert_eq!(LoadStateError::UnknownDiscriminant(9).to_string(), "unknown save-state discriminant: 9");
    }
}
