//! Encoding and decoding flags

/// How strings and binaries are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StrBinMode {
    /// Strings as str, binaries as bin
    #[default]
    Detect,
    /// Everything as str; non UTF-8 binaries are rejected
    ForceStr,
    /// Everything as bin
    ForceBin,
}

/// How sequences and maps are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArrayMapMode {
    /// Sequences and maps are written as they are
    #[default]
    Preserve,
    /// Maps keyed exactly `0..n` are written as sequences
    Detect,
    /// Maps are written as the sequence of their values
    ForceArray,
    /// Sequences are written as maps keyed by index
    ForceMap,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FloatMode {
    F32,
    #[default]
    F64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    pub str_bin: StrBinMode,
    pub array_map: ArrayMapMode,
    pub float: FloatMode,
}

/// What to do with integers that do not fit a signed 64-bit value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BigIntMode {
    /// Decode to the decimal string
    AsString,
    /// Keep the full-width integer
    #[default]
    AsArbitrary,
    /// Fail with a decoding error
    AsError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub bigint: BigIntMode,
    /// Reject extension tags this codec does not know
    pub strict: bool,
}

impl DecodeOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }
}
