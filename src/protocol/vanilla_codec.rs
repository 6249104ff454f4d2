//! Framing for the vanilla TCP protocol.
//! Supports zlib compression and CFB8 encryption.

use super::BUFFER_LIMIT;
use crate::protocol::{Decode, DecodeError, Decoder, Encode, Encoder};
use aes::{cipher::generic_array::GenericArray, Aes128};
use anyhow::{bail, Context};
use cfb8::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use flate2::Compression;
use std::{
    io::{Read, Write},
    slice,
};

/// Serverbound packets are small, so spend as little time compressing as possible.
const COMPRESSION_LEVEL: Compression = Compression::fast();

/// Shared secret used for encryption.
#[derive(Copy, Clone, Debug)]
pub struct EncryptionKey([u8; 16]);

impl EncryptionKey {
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

/// Packets of at least this many bytes are compressed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CompressionThreshold(usize);

impl CompressionThreshold {
    pub fn new(threshold: usize) -> Self {
        Self(threshold)
    }

    /// Interprets the threshold announced by a SetCompression packet.
    /// Negative values disable compression.
    pub fn from_announced(threshold: i32) -> Option<Self> {
        usize::try_from(threshold).ok().map(Self)
    }
}

/// Codec state for one connection.
#[derive(Default)]
pub struct VanillaCodec {
    /// Buffered incoming bytes, already decrypted.
    read_buffer: Vec<u8>,
    encryption_state: Option<EncryptionState>,
    compression_state: Option<CompressionThreshold>,
}

impl VanillaCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encryption_state.is_some()
    }

    pub fn enable_encryption(&mut self, key: EncryptionKey) -> anyhow::Result<()> {
        if self.encryption_state.is_some() {
            bail!("encryption enabled twice");
        }
        self.encryption_state = Some(EncryptionState {
            encryptor: cfb8::Encryptor::new(&key.0.into(), &key.0.into()),
            decryptor: cfb8::Decryptor::new(&key.0.into(), &key.0.into()),
        });
        Ok(())
    }

    /// Enables compression or, for `None`, turns it off again.
    pub fn set_compression(&mut self, threshold: Option<CompressionThreshold>) {
        self.compression_state = threshold;
    }

    /// Encodes a packet to a stream of bytes in the protocol format.
    pub fn encode_packet(&mut self, packet: &impl Encode) -> anyhow::Result<Vec<u8>> {
        let mut plain_buf = Vec::new();
        packet.encode(&mut Encoder::new(&mut plain_buf));

        let uncompressed_length = i32::try_from(plain_buf.len())?;
        let mut frame = Vec::new();
        let mut encoder = Encoder::new(&mut frame);
        match self.compression_state {
            Some(CompressionThreshold(threshold)) => {
                let (data_length, body) = if plain_buf.len() >= threshold {
                    let mut zlib = flate2::write::ZlibEncoder::new(Vec::new(), COMPRESSION_LEVEL);
                    zlib.write_all(&plain_buf)?;
                    (uncompressed_length, zlib.finish()?)
                } else {
                    (0, plain_buf)
                };
                let frame_length = var_int_size(data_length) + body.len();
                encoder.write_var_int(i32::try_from(frame_length)?);
                encoder.write_var_int(data_length);
                encoder.write_slice(&body);
            }
            None => {
                encoder.write_var_int(uncompressed_length);
                encoder.write_slice(&plain_buf);
            }
        }

        if let Some(EncryptionState { encryptor, .. }) = &mut self.encryption_state {
            for byte in &mut frame {
                encryptor.encrypt_block_mut(GenericArray::from_mut_slice(slice::from_mut(byte)));
            }
        }

        Ok(frame)
    }

    /// Gives received bytes to the internal read buffer.
    ///
    /// `data` is decrypted in place.
    pub fn give_data(&mut self, mut data: impl AsMut<[u8]>) {
        let data = data.as_mut();
        if let Some(EncryptionState { decryptor, .. }) = &mut self.encryption_state {
            for byte in data.iter_mut() {
                decryptor.decrypt_block_mut(GenericArray::from_mut_slice(slice::from_mut(byte)));
            }
        }

        self.read_buffer.extend_from_slice(data);
    }

    /// Attempts to split one packet (id and body, decompressed) off the read buffer.
    /// Call in a loop after `give_data` until it returns `None`.
    pub fn decode_frame(&mut self) -> anyhow::Result<Option<Vec<u8>>> {
        let mut decoder = Decoder::new(&self.read_buffer);
        let (length, prefix_size) = match decoder.read_var_int_with_size() {
            Ok(x) => x,
            Err(DecodeError::EndOfStream(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let length = usize::try_from(length)?;
        if length > BUFFER_LIMIT {
            bail!("packet length of {length} exceeds maximum allowed");
        }
        let contents = match decoder.consume_slice(length) {
            Ok(x) => x,
            Err(DecodeError::EndOfStream(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let plain = match self.compression_state {
            Some(_) => {
                let mut decoder = Decoder::new(contents);
                let uncompressed_length = usize::try_from(decoder.read_var_int()?)?;
                if uncompressed_length == 0 {
                    decoder.buffer().to_vec()
                } else {
                    if uncompressed_length > BUFFER_LIMIT {
                        bail!("uncompressed length of {uncompressed_length} exceeds maximum allowed");
                    }
                    let mut buf = Vec::with_capacity(uncompressed_length);
                    flate2::read::ZlibDecoder::new(decoder.buffer())
                        .take(BUFFER_LIMIT as u64)
                        .read_to_end(&mut buf)
                        .context("corrupt compressed packet")?;
                    buf
                }
            }
            None => contents.to_vec(),
        };

        self.read_buffer.drain(..prefix_size + length);
        Ok(Some(plain))
    }

    /// Decodes the next packet as `P`.
    pub fn decode_packet<P: Decode>(&mut self) -> anyhow::Result<Option<P>> {
        match self.decode_frame()? {
            Some(frame) => Ok(Some(P::decode(&mut Decoder::new(&frame))?)),
            None => Ok(None),
        }
    }
}

struct EncryptionState {
    encryptor: cfb8::Encryptor<Aes128>,
    decryptor: cfb8::Decryptor<Aes128>,
}

pub fn var_int_size(x: i32) -> usize {
    Encoder::new(&mut Vec::new()).write_var_int(x)
}
