use crate::position::BlockPosition;
use std::{convert::Infallible, num::TryFromIntError, str::Utf8Error};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("packet ended {0} bytes early")]
    EndOfStream(usize),
    #[error("byte {0} is not a boolean")]
    InvalidBool(u8),
    #[error("variable-length integer is longer than {0} bytes")]
    VarIntTooLong(usize),
    #[error("string of {0} bytes exceeds the protocol limit")]
    StringTooLong(usize),
    #[error(transparent)]
    Utf8(#[from] Utf8Error),
    #[error(transparent)]
    IntConversion(#[from] TryFromIntError),
    /// Lets derived code use `try_into()?` between identical integer types.
    #[error(transparent)]
    Infallible(#[from] Infallible),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;

const MAX_STRING_BYTES: usize = 32767 * 4;
const VAR_INT_BYTES: usize = 5;
const VAR_LONG_BYTES: usize = 10;

/// Reads Java protocol values from the front of a byte slice.
#[derive(Debug)]
pub struct Decoder<'a> {
    buffer: &'a [u8],
}

macro_rules! read_be {
    ($($name:ident -> $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self) -> Result<$ty> {
                self.take().map(<$ty>::from_be_bytes)
            }
        )*
    };
}

impl<'a> Decoder<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Bytes not read yet.
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn is_finished(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn consume_slice(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.buffer.len() {
            return Err(DecodeError::EndOfStream(len - self.buffer.len()));
        }
        let (head, rest) = self.buffer.split_at(len);
        self.buffer = rest;
        Ok(head)
    }

    pub fn consume_remaining(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buffer)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0; N];
        bytes.copy_from_slice(self.consume_slice(N)?);
        Ok(bytes)
    }

    read_be! {
        read_u8 -> u8,
        read_i8 -> i8,
        read_u16 -> u16,
        read_i16 -> i16,
        read_i32 -> i32,
        read_i64 -> i64,
        read_f32 -> f32,
        read_f64 -> f64,
        read_u128 -> u128,
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DecodeError::InvalidBool(other)),
        }
    }

    /// Reads up to `max_bytes` groups of seven bits, least significant first.
    fn read_var(&mut self, max_bytes: usize) -> Result<(u64, usize)> {
        let mut value = 0u64;
        for read in 0..max_bytes {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << (7 * read);
            if byte & 0x80 == 0 {
                return Ok((value, read + 1));
            }
        }
        Err(DecodeError::VarIntTooLong(max_bytes))
    }

    pub fn read_var_int(&mut self) -> Result<i32> {
        self.read_var_int_with_size().map(|(value, _)| value)
    }

    /// Also returns how many bytes the value took.
    pub fn read_var_int_with_size(&mut self) -> Result<(i32, usize)> {
        let (value, size) = self.read_var(VAR_INT_BYTES)?;
        // Only the low 32 bits count; the fifth byte may carry junk.
        Ok((value as u32 as i32, size))
    }

    pub fn read_var_long(&mut self) -> Result<i64> {
        self.read_var(VAR_LONG_BYTES).map(|(value, _)| value as i64)
    }

    /// x and z take 26 bits each, y the low 12.
    pub fn read_block_position(&mut self) -> Result<BlockPosition> {
        let packed = self.read_i64()?;
        Ok(BlockPosition {
            x: (packed >> 38) as i32,
            y: (packed << 52 >> 52) as i32,
            z: (packed << 26 >> 38) as i32,
        })
    }

    pub fn read_string(&mut self) -> Result<&'a str> {
        let len = usize::try_from(self.read_var_int()?)?;
        if len > MAX_STRING_BYTES {
            return Err(DecodeError::StringTooLong(len));
        }
        Ok(std::str::from_utf8(self.consume_slice(len)?)?)
    }

    /// Steps of 1/256 of a turn, in degrees.
    pub fn read_angle(&mut self) -> Result<f32> {
        self.read_u8().map(|steps| f32::from(steps) * 360.0 / 256.0)
    }
}

pub trait Decode: Sized {
    fn decode(decoder: &mut Decoder) -> Result<Self>;
}

macro_rules! decode_with {
    ($($ty:ty => $read:ident),* $(,)?) => {
        $(
            impl Decode for $ty {
                fn decode(decoder: &mut Decoder) -> Result<Self> {
                    decoder.$read()
                }
            }
        )*
    };
}

decode_with! {
    u8 => read_u8,
    i8 => read_i8,
    u16 => read_u16,
    i16 => read_i16,
    i32 => read_i32,
    i64 => read_i64,
    f32 => read_f32,
    f64 => read_f64,
    u128 => read_u128,
    bool => read_bool,
    BlockPosition => read_block_position,
}

impl Decode for String {
    fn decode(decoder: &mut Decoder) -> Result<Self> {
        decoder.read_string().map(str::to_owned)
    }
}

impl Decode for Uuid {
    fn decode(decoder: &mut Decoder) -> Result<Self> {
        decoder.read_u128().map(Uuid::from_u128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_buffer_reports_missing_bytes() {
        let mut decoder = Decoder::new(&[0, 1]);
        assert!(matches!(decoder.read_i32(), Err(DecodeError::EndOfStream(2))));
    }

    #[test]
    fn overlong_var_int_is_rejected() {
        let bytes = [0x80; 6];
        assert!(matches!(
            Decoder::new(&bytes).read_var_int(),
            Err(DecodeError::VarIntTooLong(5))
        ));
    }

    #[test]
    fn var_int_reports_its_size() {
        let mut decoder = Decoder::new(&[0xdd, 0xc7, 0x01, 0x2a]);
        assert_eq!(decoder.read_var_int_with_size().unwrap(), (25565, 3));
        assert_eq!(decoder.read_u8().unwrap(), 0x2a);
        assert!(decoder.is_finished());
    }

    #[test]
    fn strings_borrow_from_the_buffer() {
        let bytes = [5, b'S', b't', b'e', b'v', b'e', 0xff];
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.read_string().unwrap(), "Steve");
        assert_eq!(decoder.buffer(), &[0xff]);
        assert!(matches!(decoder.read_bool(), Err(DecodeError::InvalidBool(0xff))));
    }
}
