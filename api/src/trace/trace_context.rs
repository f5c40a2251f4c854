use std::fmt;
use std::num::ParseIntError;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::OnceLock;

/// Flags set on a [`SpanContext`](crate::trace::SpanContext), currently just
/// the `sampled` bit (bit 0), per the W3C TraceContext `trace-flags` byte.
///
/// All 256 possible byte values are interned in a static table built once on
/// first use, so `TraceFlags::from_byte(b)` for the same `b` always returns
/// a reference to the *same* table slot -- the allocation-avoidance pattern
/// used throughout the SDK for small closed value domains.
#[derive(Clone, Debug, Default, PartialEq, Eq, Copy, Hash)]
pub struct TraceFlags(u8);

impl TraceFlags {
    pub const NOT_SAMPLED: TraceFlags = TraceFlags(0x00);
    pub const SAMPLED: TraceFlags = TraceFlags(0x01);

    pub const fn new(flags: u8) -> Self {
        TraceFlags(flags)
    }

    /// Returns the interned instance for `byte`. Two calls with the same
    /// byte return references that compare equal by pointer, not just by value.
    pub fn from_byte(byte: u8) -> &'static TraceFlags {
        &Self::table()[byte as usize]
    }

    fn table() -> &'static [TraceFlags; 256] {
        static TABLE: OnceLock<[TraceFlags; 256]> = OnceLock::new();
        TABLE.get_or_init(|| {
            let mut table = [TraceFlags(0); 256];
            let mut i = 0usize;
            while i < 256 {
                table[i] = TraceFlags(i as u8);
                i += 1;
            }
            table
        })
    }

    pub fn is_sampled(&self) -> bool {
        (*self & TraceFlags::SAMPLED) == TraceFlags::SAMPLED
    }

    pub fn with_sampled(&self, sampled: bool) -> Self {
        if sampled { *self | TraceFlags::SAMPLED } else { *self & !TraceFlags::SAMPLED }
    }

    pub fn to_u8(self) -> u8 {
        self.0
    }

    /// Two lowercase hex digits, e.g. `"01"`.
    pub fn as_hex(&self) -> String {
        format!("{:02x}", self.0)
    }
}

impl BitAnd for TraceFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}
impl BitOr for TraceFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}
impl Not for TraceFlags {
    type Output = Self;
    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}
impl fmt::LowerHex for TraceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// A 16-byte trace identity. Valid iff it contains at least one non-zero byte.
#[derive(Clone, PartialEq, Eq, Copy, Hash)]
pub struct TraceId(u128);

impl TraceId {
    pub const INVALID: TraceId = TraceId(0);

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        TraceId(u128::from_be_bytes(bytes))
    }
    pub const fn to_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
    pub fn from_hex(hex: &str) -> Result<Self, ParseIntError> {
        u128::from_str_radix(hex, 16).map(TraceId)
    }
}
impl From<u128> for TraceId {
    fn from(value: u128) -> Self {
        TraceId(value)
    }
}
impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}
impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// An 8-byte span identity. Valid iff it contains at least one non-zero byte.
#[derive(Clone, PartialEq, Eq, Copy, Hash)]
pub struct SpanId(u64);

impl SpanId {
    pub const INVALID: SpanId = SpanId(0);

    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        SpanId(u64::from_be_bytes(bytes))
    }
    pub const fn to_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
    pub fn from_hex(hex: &str) -> Result<Self, ParseIntError> {
        u64::from_str_radix(hex, 16).map(SpanId)
    }
}
impl From<u64> for SpanId {
    fn from(value: u64) -> Self {
        SpanId(value)
    }
}
impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
