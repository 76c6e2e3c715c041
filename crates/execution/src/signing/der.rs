//! DER reading for ECDSA signatures.
//!
//! Only the `SEQUENCE { INTEGER r, INTEGER s }` shape produced by ECDSA
//! signers is supported. Every read is bounds checked and fails with a
//! [`SigningError`] instead of panicking.

use super::SigningError;

const TAG_INTEGER: u8 = 0x02;
const TAG_SEQUENCE: u8 = 0x30;

/// Length-prefix bytes accepted in long form. Four covers any buffer we handle.
const MAX_LENGTH_OCTETS: usize = 4;

/// Forward-only cursor over a DER buffer.
struct DerReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_byte(&mut self) -> Result<u8, SigningError> {
        let byte = self
            .buf
            .get(self.pos)
            .copied()
            .ok_or(SigningError::MalformedDer {
                reason: "unexpected end of input",
                offset: self.pos,
            })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read a short- or long-form definite length.
    fn read_length(&mut self) -> Result<usize, SigningError> {
        let first = self.read_byte()?;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let octets = (first & 0x7f) as usize;
        if octets == 0 || octets > MAX_LENGTH_OCTETS {
            return Err(SigningError::MalformedDer {
                reason: "unsupported length encoding",
                offset: self.pos - 1,
            });
        }
        let mut len = 0usize;
        for _ in 0..octets {
            len = (len << 8) | self.read_byte()? as usize;
        }
        Ok(len)
    }

    /// Read one element with the expected tag and return its contents.
    fn read_tlv(&mut self, expected_tag: u8) -> Result<&'a [u8], SigningError> {
        let offset = self.pos;
        let tag = self.read_byte()?;
        if tag != expected_tag {
            return Err(SigningError::UnexpectedTag {
                expected: expected_tag,
                found: tag,
                offset,
            });
        }
        let len = self.read_length()?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(SigningError::MalformedDer {
                reason: "length exceeds buffer",
                offset,
            })?;
        let contents = &self.buf[self.pos..end];
        self.pos = end;
        Ok(contents)
    }
}

/// Convert a DER `SEQUENCE { INTEGER r, INTEGER s }` ECDSA signature into
/// the fixed-width `r || s` form JWS requires.
///
/// `half_len` is the byte width of each integer: 32 for P-256 (ES256).
/// Sign-padding zeros are stripped and each integer is left-padded back to
/// `half_len`, so the output is always exactly `2 * half_len` bytes.
pub fn der_to_jose(der: &[u8], half_len: usize) -> Result<Vec<u8>, SigningError> {
    let mut outer = DerReader::new(der);
    let seq = outer.read_tlv(TAG_SEQUENCE)?;

    let mut inner = DerReader::new(seq);
    let r = inner.read_tlv(TAG_INTEGER)?;
    let s = inner.read_tlv(TAG_INTEGER)?;
    if !inner.is_empty() {
        return Err(SigningError::MalformedDer {
            reason: "trailing data in signature sequence",
            offset: 2 + r.len() + s.len(),
        });
    }

    let mut out = vec![0u8; half_len * 2];
    copy_left_padded(r, &mut out[..half_len])?;
    copy_left_padded(s, &mut out[half_len..])?;
    Ok(out)
}

fn copy_left_padded(integer: &[u8], dst: &mut [u8]) -> Result<(), SigningError> {
    if integer.is_empty() {
        return Err(SigningError::MalformedDer {
            reason: "empty integer",
            offset: 0,
        });
    }
    let leading_zeros = integer.iter().take_while(|b| **b == 0).count();
    let magnitude = &integer[leading_zeros..];
    if magnitude.len() > dst.len() {
        return Err(SigningError::IntegerTooLong {
            len: magnitude.len(),
            max: dst.len(),
        });
    }
    let start = dst.len() - magnitude.len();
    dst[start..].copy_from_slice(magnitude);
    Ok(())
}
