//! The opaque blob pointer: a 4-tuple locating a byte range inside a
//! content-addressed blob core, encoded as `"bo:bl:yo:yl"`.
//!
//! A hex `Display`/`FromStr` pair, extended from a single hash to a
//! 4-field positional string.

use newtube_core::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Locates a byte range inside a blob core: starting block, number of
/// blocks spanned, byte offset within the first block, and total byte
/// length of the referenced range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobPointer {
    pub block_offset: u64,
    pub block_length: u64,
    pub byte_offset: u64,
    pub byte_length: u64,
}

impl BlobPointer {
    #[must_use]
    pub const fn new(block_offset: u64, block_length: u64, byte_offset: u64, byte_length: u64) -> Self {
        Self {
            block_offset,
            block_length,
            byte_offset,
            byte_length,
        }
    }
}

impl fmt::Display for BlobPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.block_offset, self.block_length, self.byte_offset, self.byte_length
        )
    }
}

impl FromStr for BlobPointer {
    type Err = Error;

    /// Parses `"bo:bl:yo:yl"`. All four fields are non-negative base-10
    /// integers; a leading `-` on any field fails the `u64` parse and is
    /// rejected, which is how a negative `byteLength` is turned away. A
    /// `byteLength` of `0` parses fine and denotes an empty blob.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let mut next = |field: &'static str| -> Result<u64> {
            parts
                .next()
                .ok_or_else(|| Error::invalid_input(field, "missing field in blob pointer"))?
                .parse::<u64>()
                .map_err(|e| Error::invalid_input(field, format!("not a non-negative integer: {e}")))
        };

        let block_offset = next("blockOffset")?;
        let block_length = next("blockLength")?;
        let byte_offset = next("byteOffset")?;
        let byte_length = next("byteLength")?;

        if parts.next().is_some() {
            return Err(Error::invalid_input("blob_pointer", "too many fields"));
        }

        Ok(Self::new(block_offset, block_length, byte_offset, byte_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn roundtrips_through_display_and_parse() {
        let ptr = BlobPointer::new(3, 2, 10, 1_048_576);
        let parsed: BlobPointer = ptr.to_string().parse().unwrap();
        assert_eq!(ptr, parsed);
        assert_eq!(ptr.to_string(), "3:2:10:1048576");
    }

    #[test]
    fn zero_byte_length_is_accepted() {
        let parsed: BlobPointer = "0:0:0:0".parse().unwrap();
        assert_eq!(parsed.byte_length, 0);
    }

    #[test]
    fn negative_byte_length_is_rejected() {
        assert!("0:1:0:-1".parse::<BlobPointer>().is_err());
    }

    #[test]
    fn missing_field_is_rejected() {
        assert!("0:1:0".parse::<BlobPointer>().is_err());
    }

    #[test]
    fn extra_field_is_rejected() {
        assert!("0:1:0:5:9".parse::<BlobPointer>().is_err());
    }

    #[test]
    fn non_numeric_field_is_rejected() {
        assert!("x:1:0:5".parse::<BlobPointer>().is_err());
    }
}
