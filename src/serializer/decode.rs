//! bytes -> Value

use super::options::{BigIntMode, DecodeOptions};
use super::value::Value;
use super::BIGINT_EXT;
use crate::error::{NccError, Result, codec};

/// Nesting limit; malformed input must not be able to exhaust the stack
const MAX_DEPTH: usize = 512;

/// Decode exactly one value; trailing bytes are an error
pub fn decode_with(bytes: &[u8], options: &DecodeOptions) -> Result<Value> {
    let mut decoder = Decoder {
        buf: bytes,
        pos: 0,
        options,
    };
    let value = decoder.read_value(0)?;
    if decoder.pos != bytes.len() {
        return Err(codec::decoding(
            decoder.pos,
            format!("{} trailing byte(s)", bytes.len() - decoder.pos),
        ));
    }
    Ok(value)
}

struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    options: &'a DecodeOptions,
}

impl<'a> Decoder<'a> {
    fn read_value(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(codec::decoding(self.pos, "nesting too deep"));
        }
        let start = self.pos;
        let code = self.read_u8()?;
        let value = match code {
            0x00..=0x7f => Value::Integer(i128::from(code)),
            0x80..=0x8f => self.read_map(usize::from(code & 0x0f), depth)?,
            0x90..=0x9f => self.read_array(usize::from(code & 0x0f), depth)?,
            0xa0..=0xbf => self.read_str(usize::from(code & 0x1f))?,
            0xc0 => Value::Nil,
            0xc2 => Value::Bool(false),
            0xc3 => Value::Bool(true),
            0xc4 => {
                let len = usize::from(self.read_u8()?);
                Value::Binary(self.take(len)?.to_vec())
            }
            0xc5 => {
                let len = usize::from(self.read_u16()?);
                Value::Binary(self.take(len)?.to_vec())
            }
            0xc6 => {
                let len = self.read_len32()?;
                Value::Binary(self.take(len)?.to_vec())
            }
            0xc7 => {
                let len = usize::from(self.read_u8()?);
                self.read_ext(len, start)?
            }
            0xc8 => {
                let len = usize::from(self.read_u16()?);
                self.read_ext(len, start)?
            }
            0xc9 => {
                let len = self.read_len32()?;
                self.read_ext(len, start)?
            }
            0xca => {
                let bits = u32::from_be_bytes(self.array::<4>()?);
                Value::Float(f64::from(f32::from_bits(bits)))
            }
            0xcb => Value::Float(f64::from_be_bytes(self.array::<8>()?)),
            0xcc => Value::Integer(i128::from(self.read_u8()?)),
            0xcd => Value::Integer(i128::from(self.read_u16()?)),
            0xce => Value::Integer(i128::from(u32::from_be_bytes(self.array::<4>()?))),
            0xcf => {
                let n = u64::from_be_bytes(self.array::<8>()?);
                if i64::try_from(n).is_ok() {
                    Value::Integer(i128::from(n))
                } else {
                    self.big_integer(i128::from(n), start)?
                }
            }
            0xd0 => Value::Integer(i128::from(i8::from_be_bytes(self.array::<1>()?))),
            0xd1 => Value::Integer(i128::from(i16::from_be_bytes(self.array::<2>()?))),
            0xd2 => Value::Integer(i128::from(i32::from_be_bytes(self.array::<4>()?))),
            0xd3 => Value::Integer(i128::from(i64::from_be_bytes(self.array::<8>()?))),
            0xd4 => self.read_ext(1, start)?,
            0xd5 => self.read_ext(2, start)?,
            0xd6 => self.read_ext(4, start)?,
            0xd7 => self.read_ext(8, start)?,
            0xd8 => self.read_ext(16, start)?,
            0xd9 => {
                let len = usize::from(self.read_u8()?);
                self.read_str(len)?
            }
            0xda => {
                let len = usize::from(self.read_u16()?);
                self.read_str(len)?
            }
            0xdb => {
                let len = self.read_len32()?;
                self.read_str(len)?
            }
            0xdc => {
                let len = usize::from(self.read_u16()?);
                self.read_array(len, depth)?
            }
            0xdd => {
                let len = self.read_len32()?;
                self.read_array(len, depth)?
            }
            0xde => {
                let len = usize::from(self.read_u16()?);
                self.read_map(len, depth)?
            }
            0xdf => {
                let len = self.read_len32()?;
                self.read_map(len, depth)?
            }
            0xe0..=0xff => Value::Integer(i128::from(i8::from_be_bytes([code]))),
            0xc1 => return Err(codec::decoding(start, "reserved type code 0xc1")),
        };
        Ok(value)
    }

    fn read_array(&mut self, len: usize, depth: usize) -> Result<Value> {
        // Every element takes at least one byte, so a claimed length larger
        // than the remaining input is malformed rather than a reason to allocate.
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(self.read_value(depth + 1)?);
        }
        Ok(Value::Array(items))
    }

    fn read_map(&mut self, len: usize, depth: usize) -> Result<Value> {
        let mut entries = Vec::with_capacity(len.min(self.remaining() / 2));
        for _ in 0..len {
            let key = self.read_value(depth + 1)?;
            let value = self.read_value(depth + 1)?;
            entries.push((key, value));
        }
        Ok(Value::Map(entries))
    }

    fn read_str(&mut self, len: usize) -> Result<Value> {
        let bytes = self.take(len)?;
        Ok(match std::str::from_utf8(bytes) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => Value::Binary(bytes.to_vec()),
        })
    }

    fn read_ext(&mut self, len: usize, start: usize) -> Result<Value> {
        let tag = i8::from_be_bytes(self.array::<1>()?);
        let data = self.take(len)?;
        if tag == BIGINT_EXT {
            let raw: [u8; 16] = data
                .try_into()
                .map_err(|_| codec::decoding(start, "big integer extension must be 16 bytes"))?;
            return self.big_integer(i128::from_be_bytes(raw), start);
        }
        if self.options.strict {
            return Err(codec::decoding(
                start,
                format!("unknown extension tag {tag}"),
            ));
        }
        Ok(Value::Ext {
            tag,
            data: data.to_vec(),
        })
    }

    fn big_integer(&self, n: i128, start: usize) -> Result<Value> {
        match self.options.bigint {
            BigIntMode::AsString => Ok(Value::String(n.to_string())),
            BigIntMode::AsArbitrary => Ok(Value::Integer(n)),
            BigIntMode::AsError => Err(codec::decoding(
                start,
                format!("integer {n} does not fit a signed 64-bit value"),
            )),
        }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.truncated(len));
        }
        let buf = self.buf;
        let slice = &buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array::<2>()?))
    }

    fn read_len32(&mut self) -> Result<usize> {
        let pos = self.pos;
        let n = u32::from_be_bytes(self.array::<4>()?);
        usize::try_from(n).map_err(|_| codec::decoding(pos, "length does not fit in memory"))
    }

    fn truncated(&self, wanted: usize) -> NccError {
        codec::decoding(
            self.pos,
            format!(
                "unexpected end of input: needed {wanted} byte(s), {} left",
                self.remaining()
            ),
        )
    }
}
