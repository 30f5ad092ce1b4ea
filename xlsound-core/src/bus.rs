/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of XLSOUND, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Address decoding of memory-mapped sound peripherals.
//!
//! A peripheral decides on its own which bus addresses it claims and what each of them means.
//! Addresses nobody claims read as [FLOATING_BUS] and ignore writes. Overlapping peripherals are
//! not arbitrated here, it's up to the bus dispatcher in which order they are asked.
use core::fmt;
use core::ops::RangeInclusive;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

/// The value read from an address no device drives.
pub const FLOATING_BUS: u8 = 0xFF;

/// The direction of a bus access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

/// A decoded bus access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisterTarget {
    /// A chip register addressed directly.
    Register { chip: usize, index: u16 },
    /// The register-select latch of an indirectly addressed chip.
    ///
    /// A value written here, offset by `bank`, becomes the selected register index.
    /// The data port of an indirectly addressed chip decodes to the [RegisterTarget::Register]
    /// currently selected.
    Select { chip: usize, bank: u16 },
    /// The status port of a chip.
    Status { chip: usize },
    /// A fixed byte, e.g. a signature or an idle data bus level of a chip.
    Constant(u8),
    /// The configuration register of the peripheral.
    Config,
    /// A peripheral specific control register.
    Control(u8),
    /// An address claimed by the peripheral with no effect, reading as [FLOATING_BUS].
    Ignored,
}

/// Resolves bus addresses to registers of a peripheral.
///
/// Implementations must be pure: neither method may change any state.
pub trait AddressRouter {
    /// Returns `true` if `address` belongs to the peripheral.
    fn claims(&self, address: u16) -> bool;
    /// Resolves the meaning of an access at `address`.
    ///
    /// Returns `None` if the address is not claimed, or if it is claimed but has no meaning for
    /// the given kind of `access`.
    fn decode(&self, address: u16, access: Access) -> Option<RegisterTarget>;
}

/// An inclusive range of bus addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct AddressSpan {
    start: u16,
    end: u16,
}

impl fmt::Debug for AddressSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddressSpan({:04X}..={:04X})", self.start, self.end)
    }
}

impl From<RangeInclusive<u16>> for AddressSpan {
    fn from(range: RangeInclusive<u16>) -> Self {
        AddressSpan::new(*range.start(), *range.end())
    }
}

impl AddressSpan {
    /// Creates a span from `start` to `end` inclusive.
    ///
    /// If `end` is below `start` the span consists of `start` alone.
    pub const fn new(start: u16, end: u16) -> Self {
        let end = if end < start { start } else { end };
        AddressSpan { start, end }
    }
    /// Creates a span of `len` addresses starting at `start`, clipped to the address space.
    ///
    /// `len` must not be 0.
    pub const fn with_len(start: u16, len: u16) -> Self {
        let last = start as u32 + len as u32 - 1;
        let end = if last > u16::MAX as u32 { u16::MAX } else { last as u16 };
        AddressSpan::new(start, end)
    }
    #[inline]
    pub fn start(self) -> u16 {
        self.start
    }
    #[inline]
    pub fn end(self) -> u16 {
        self.end
    }
    /// Returns the number of addresses in the span.
    #[inline]
    pub fn len(self) -> u32 {
        (self.end - self.start) as u32 + 1
    }
    #[inline]
    pub fn contains(self, address: u16) -> bool {
        address >= self.start && address <= self.end
    }
    /// Returns the offset of `address` from the start of the span if the span contains it.
    #[inline]
    pub fn offset(self, address: u16) -> Option<u16> {
        if self.contains(address) {
            Some(address - self.start)
        }
        else {
            None
        }
    }
}

/// Reads a register of a peripheral, returning [FLOATING_BUS] if it is not claimed.
///
/// `read` is invoked with the decoded target.
#[inline]
pub fn read_or_float<R, F>(router: &R, address: u16, read: F) -> u8
    where R: AddressRouter + ?Sized,
          F: FnOnce(RegisterTarget) -> u8
{
    match router.decode(address, Access::Read) {
        Some(RegisterTarget::Ignored)|None => FLOATING_BUS,
        Some(RegisterTarget::Constant(data)) => data,
        Some(target) => read(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Window(AddressSpan);

    impl AddressRouter for Window {
        fn claims(&self, address: u16) -> bool {
            self.0.contains(address)
        }

        fn decode(&self, address: u16, access: Access) -> Option<RegisterTarget> {
            match (self.0.offset(address)?, access) {
                (0, _) => Some(RegisterTarget::Select { chip: 0, bank: 0 }),
                (1, _) => Some(RegisterTarget::Register { chip: 0, index: 7 }),
                (2, Access::Read) => Some(RegisterTarget::Constant(b'S')),
                _ => Some(RegisterTarget::Ignored)
            }
        }
    }

    #[test]
    fn address_span_works() {
        let span = AddressSpan::with_len(0xD560, 4);
        assert_eq!(span, AddressSpan::from(0xD560..=0xD563));
        assert_eq!(span.len(), 4);
        for (addr, offset) in vec![(0xD55F, None), (0xD560, Some(0)), (0xD563, Some(3)), (0xD564, None)] {
            assert_eq!(span.offset(addr), offset);
            assert_eq!(span.contains(addr), offset.is_some());
        }
        assert_eq!(AddressSpan::with_len(0xFFFE, 4).end(), 0xFFFF);
        assert_eq!(AddressSpan::new(5, 1).len(), 1);
        assert_eq!(AddressSpan::new(0, 0xFFFF).len(), 0x10000);
        assert_eq!(format!("{:?}", span), "AddressSpan(D560..=D563)");
    }

    #[test]
    fn floating_bus_works() {
        let window = Window(AddressSpan::with_len(0xD500, 4));
        assert_eq!(read_or_float(&window, 0xD4FF, |_| 0), FLOATING_BUS);
        assert_eq!(read_or_float(&window, 0xD503, |_| 0), FLOATING_BUS);
        assert_eq!(read_or_float(&window, 0xD502, |_| 0), b'S');
        assert_eq!(read_or_float(&window, 0xD501, |t| {
            assert_eq!(t, RegisterTarget::Register { chip: 0, index: 7 });
            7
        }), 7);
        assert_eq!(window.decode(0xD502, Access::Write), Some(RegisterTarget::Ignored));
        assert_eq!(window.decode(0xD504, Access::Write), None);
    }
}
