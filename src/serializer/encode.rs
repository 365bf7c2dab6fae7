//! Value -> bytes

use super::options::{ArrayMapMode, EncodeOptions, FloatMode, StrBinMode};
use super::value::Value;
use super::BIGINT_EXT;
use crate::error::{Result, codec};

/// Encode a value with the given options
pub fn encode_with(value: &Value, options: &EncodeOptions) -> Result<Vec<u8>> {
    let mut encoder = Encoder {
        options,
        out: Vec::new(),
    };
    encoder.write_value(value)?;
    Ok(encoder.out)
}

struct Encoder<'a> {
    options: &'a EncodeOptions,
    out: Vec<u8>,
}

impl Encoder<'_> {
    fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Nil => self.out.push(0xc0),
            Value::Bool(b) => self.out.push(if *b { 0xc3 } else { 0xc2 }),
            Value::Integer(n) => self.write_int(*n),
            Value::Float(x) => self.write_float(*x),
            Value::String(s) => match self.options.str_bin {
                StrBinMode::ForceBin => self.write_bin(s.as_bytes(), "string")?,
                StrBinMode::Detect | StrBinMode::ForceStr => self.write_str(s.as_bytes(), "string")?,
            },
            Value::Binary(b) => match self.options.str_bin {
                StrBinMode::ForceStr => {
                    if std::str::from_utf8(b).is_err() {
                        return Err(codec::encoding(
                            "binary",
                            "cannot force non UTF-8 binary data into a string",
                        ));
                    }
                    self.write_str(b, "binary")?;
                }
                StrBinMode::Detect | StrBinMode::ForceBin => self.write_bin(b, "binary")?,
            },
            Value::Array(items) => match self.options.array_map {
                ArrayMapMode::ForceMap => {
                    self.write_map_header(items.len())?;
                    for (i, item) in items.iter().enumerate() {
                        self.write_int(i as i128);
                        self.write_value(item)?;
                    }
                }
                ArrayMapMode::Preserve | ArrayMapMode::Detect | ArrayMapMode::ForceArray => {
                    self.write_array(items)?;
                }
            },
            Value::Map(entries) => match self.options.array_map {
                ArrayMapMode::ForceArray => {
                    self.write_array_header(entries.len())?;
                    for (_, v) in entries {
                        self.write_value(v)?;
                    }
                }
                ArrayMapMode::Detect if is_sequential(entries) => {
                    self.write_array_header(entries.len())?;
                    for (_, v) in entries {
                        self.write_value(v)?;
                    }
                }
                ArrayMapMode::Preserve | ArrayMapMode::Detect | ArrayMapMode::ForceMap => {
                    self.write_map_header(entries.len())?;
                    for (k, v) in entries {
                        self.write_value(k)?;
                        self.write_value(v)?;
                    }
                }
            },
            Value::Ext { tag, .. } if *tag == BIGINT_EXT => {
                return Err(codec::encoding(
                    "extension",
                    format!("extension tag {BIGINT_EXT} is reserved for big integers"),
                ));
            }
            Value::Ext { tag, data } => self.write_ext(*tag, data)?,
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_int(&mut self, n: i128) {
        if n >= 0 {
            if n <= 0x7f {
                self.out.push(n as u8);
            } else if n <= 0xff {
                self.out.push(0xcc);
                self.out.push(n as u8);
            } else if n <= 0xffff {
                self.out.push(0xcd);
                self.out.extend_from_slice(&(n as u16).to_be_bytes());
            } else if n <= 0xffff_ffff {
                self.out.push(0xce);
                self.out.extend_from_slice(&(n as u32).to_be_bytes());
            } else if n <= i128::from(u64::MAX) {
                self.out.push(0xcf);
                self.out.extend_from_slice(&(n as u64).to_be_bytes());
            } else {
                self.write_bigint(n);
            }
        } else if n >= -0x20 {
            self.out.push(n as i8 as u8);
        } else if n >= i128::from(i8::MIN) {
            self.out.push(0xd0);
            self.out.push(n as i8 as u8);
        } else if n >= i128::from(i16::MIN) {
            self.out.push(0xd1);
            self.out.extend_from_slice(&(n as i16).to_be_bytes());
        } else if n >= i128::from(i32::MIN) {
            self.out.push(0xd2);
            self.out.extend_from_slice(&(n as i32).to_be_bytes());
        } else if n >= i128::from(i64::MIN) {
            self.out.push(0xd3);
            self.out.extend_from_slice(&(n as i64).to_be_bytes());
        } else {
            self.write_bigint(n);
        }
    }

    /// Integers outside the 64-bit range travel as a 16 byte extension
    #[allow(clippy::cast_sign_loss)]
    fn write_bigint(&mut self, n: i128) {
        self.out.push(0xd8);
        self.out.push(BIGINT_EXT as u8);
        self.out.extend_from_slice(&n.to_be_bytes());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_float(&mut self, x: f64) {
        match self.options.float {
            FloatMode::F32 => {
                self.out.push(0xca);
                self.out.extend_from_slice(&(x as f32).to_be_bytes());
            }
            FloatMode::F64 => {
                self.out.push(0xcb);
                self.out.extend_from_slice(&x.to_be_bytes());
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_str(&mut self, bytes: &[u8], kind: &str) -> Result<()> {
        let len = bytes.len();
        if len < 32 {
            self.out.push(0xa0 | len as u8);
        } else if len <= 0xff {
            self.out.push(0xd9);
            self.out.push(len as u8);
        } else if len <= 0xffff {
            self.out.push(0xda);
            self.out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.out.push(0xdb);
            self.out.extend_from_slice(&length_u32(len, kind)?.to_be_bytes());
        }
        self.out.extend_from_slice(bytes);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_bin(&mut self, bytes: &[u8], kind: &str) -> Result<()> {
        let len = bytes.len();
        if len <= 0xff {
            self.out.push(0xc4);
            self.out.push(len as u8);
        } else if len <= 0xffff {
            self.out.push(0xc5);
            self.out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.out.push(0xc6);
            self.out.extend_from_slice(&length_u32(len, kind)?.to_be_bytes());
        }
        self.out.extend_from_slice(bytes);
        Ok(())
    }

    fn write_array(&mut self, items: &[Value]) -> Result<()> {
        self.write_array_header(items.len())?;
        for item in items {
            self.write_value(item)?;
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_array_header(&mut self, len: usize) -> Result<()> {
        if len <= 0xf {
            self.out.push(0x90 | len as u8);
        } else if len <= 0xffff {
            self.out.push(0xdc);
            self.out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.out.push(0xdd);
            self.out
                .extend_from_slice(&length_u32(len, "sequence")?.to_be_bytes());
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_map_header(&mut self, len: usize) -> Result<()> {
        if len <= 0xf {
            self.out.push(0x80 | len as u8);
        } else if len <= 0xffff {
            self.out.push(0xde);
            self.out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            self.out.push(0xdf);
            self.out.extend_from_slice(&length_u32(len, "map")?.to_be_bytes());
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn write_ext(&mut self, tag: i8, data: &[u8]) -> Result<()> {
        match data.len() {
            1 => self.out.push(0xd4),
            2 => self.out.push(0xd5),
            4 => self.out.push(0xd6),
            8 => self.out.push(0xd7),
            16 => self.out.push(0xd8),
            len if len <= 0xff => {
                self.out.push(0xc7);
                self.out.push(len as u8);
            }
            len if len <= 0xffff => {
                self.out.push(0xc8);
                self.out.extend_from_slice(&(len as u16).to_be_bytes());
            }
            len => {
                self.out.push(0xc9);
                self.out
                    .extend_from_slice(&length_u32(len, "extension")?.to_be_bytes());
            }
        }
        self.out.push(tag as u8);
        self.out.extend_from_slice(data);
        Ok(())
    }
}

fn length_u32(len: usize, kind: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| codec::encoding(kind, format!("length {len} exceeds 2^32-1")))
}

/// A map whose keys are exactly `0..n` in order is really a sequence
fn is_sequential(entries: &[(Value, Value)]) -> bool {
    entries
        .iter()
        .enumerate()
        .all(|(i, (k, _))| matches!(k, Value::Integer(n) if *n == i as i128))
}
