use crate::position::BlockPosition;
use uuid::Uuid;

/// Appends Java protocol values to a byte buffer.
#[derive(Debug)]
pub struct Encoder<'a> {
    buffer: &'a mut Vec<u8>,
}

macro_rules! write_be {
    ($($name:ident($ty:ty)),* $(,)?) => {
        $(
            pub fn $name(&mut self, value: $ty) {
                self.buffer.extend_from_slice(&value.to_be_bytes());
            }
        )*
    };
}

impl<'a> Encoder<'a> {
    /// Existing contents of `buffer` are kept.
    pub fn new(buffer: &'a mut Vec<u8>) -> Self {
        Self { buffer }
    }

    write_be! {
        write_u8(u8),
        write_i8(i8),
        write_u16(u16),
        write_i16(i16),
        write_i32(i32),
        write_i64(i64),
        write_f32(f32),
        write_f64(f64),
        write_u128(u128),
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Raw bytes, without a length prefix.
    pub fn write_slice(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Seven bits per byte, least significant group first. Returns the
    /// number of bytes written.
    fn write_var(&mut self, mut value: u64) -> usize {
        let start = self.buffer.len();
        while value >= 0x80 {
            self.buffer.push((value & 0x7f) as u8 | 0x80);
            value >>= 7;
        }
        self.buffer.push(value as u8);
        self.buffer.len() - start
    }

    pub fn write_var_int(&mut self, value: i32) -> usize {
        self.write_var(u64::from(bytemuck::cast::<i32, u32>(value)))
    }

    pub fn write_var_long(&mut self, value: i64) -> usize {
        self.write_var(bytemuck::cast(value))
    }

    pub fn write_block_position(&mut self, position: BlockPosition) {
        let packed = ((i64::from(position.x) & 0x3ff_ffff) << 38)
            | ((i64::from(position.z) & 0x3ff_ffff) << 12)
            | (i64::from(position.y) & 0xfff);
        self.write_i64(packed);
    }

    /// Varint byte length, then UTF-8.
    pub fn write_string(&mut self, value: &str) {
        self.write_var_int(value.len().try_into().unwrap_or(i32::MAX));
        self.write_slice(value.as_bytes());
    }

    /// Degrees as 1/256 steps of a turn; whole turns wrap.
    pub fn write_angle(&mut self, degrees: f32) {
        let steps = (degrees * 256.0 / 360.0).round() as i32;
        self.write_u8(steps.rem_euclid(256) as u8);
    }
}

pub trait Encode {
    fn encode(&self, encoder: &mut Encoder);
}

macro_rules! encode_with {
    ($($ty:ty => $write:ident),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, encoder: &mut Encoder) {
                    encoder.$write(*self);
                }
            }
        )*
    };
}

encode_with! {
    u8 => write_u8,
    i8 => write_i8,
    u16 => write_u16,
    i16 => write_i16,
    i32 => write_i32,
    i64 => write_i64,
    f32 => write_f32,
    f64 => write_f64,
    u128 => write_u128,
    bool => write_bool,
    BlockPosition => write_block_position,
}

impl Encode for String {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_string(self);
    }
}

impl Encode for Uuid {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_u128(self.as_u128());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Decoder;

    #[test]
    fn var_int_boundaries() {
        for (value, expected) in [
            (0, vec![0x00]),
            (127, vec![0x7f]),
            (128, vec![0x80, 0x01]),
            (25565, vec![0xdd, 0xc7, 0x01]),
            (-1, vec![0xff, 0xff, 0xff, 0xff, 0x0f]),
        ] {
            let mut buf = Vec::new();
            Encoder::new(&mut buf).write_var_int(value);
            assert_eq!(buf, expected, "encoding {value}");
            assert_eq!(Decoder::new(&buf).read_var_int().unwrap(), value);
        }
    }

    #[test]
    fn negative_var_long_takes_ten_bytes() {
        let mut buf = Vec::new();
        assert_eq!(Encoder::new(&mut buf).write_var_long(-1), 10);
        assert_eq!(Decoder::new(&buf).read_var_long().unwrap(), -1);
    }

    #[test]
    fn block_position_packing() {
        let position = BlockPosition {
            x: -33,
            y: -60,
            z: 1_000_000,
        };
        let mut buf = Vec::new();
        Encoder::new(&mut buf).write_block_position(position);
        assert_eq!(Decoder::new(&buf).read_block_position().unwrap(), position);
    }

    #[test]
    fn angles_wrap_to_one_byte() {
        let mut buf = Vec::new();
        let mut encoder = Encoder::new(&mut buf);
        encoder.write_angle(90.0);
        encoder.write_angle(-90.0);
        encoder.write_angle(360.0);
        assert_eq!(buf, [64, 192, 0]);
        assert_eq!(Decoder::new(&buf).read_angle().unwrap(), 90.0);
    }
}
