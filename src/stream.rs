use std::io::{self, Write};

use declio::ctx::Endian;
use declio::{Decode, Encode};

use crate::result::{Error, Result};

/// Character encoding of the message payload, as stored in the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8 = 0,
    Utf16 = 1,
    Utf32 = 2,
}

impl Encoding {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Encoding::Utf8),
            1 => Some(Encoding::Utf16),
            2 => Some(Encoding::Utf32),
            _ => None,
        }
    }

    /// The width of one code unit in the stream.
    pub fn width(self) -> usize {
        match self {
            Encoding::Utf8 => 1,
            Encoding::Utf16 => 2,
            Encoding::Utf32 => 4,
        }
    }

    /// The NUL terminator of a string in the stream.
    pub fn terminator(self) -> &'static [u8] {
        const NULS: &[u8; 4] = &[0; 4];
        &NULS[..self.width()]
    }

    pub fn name(self, big_endian: bool) -> &'static str {
        match (self, big_endian) {
            (Encoding::Utf8, _) => "UTF-8",
            (Encoding::Utf16, false) => "UTF-16-LE",
            (Encoding::Utf16, true) => "UTF-16-BE",
            (Encoding::Utf32, false) => "UTF-32-LE",
            (Encoding::Utf32, true) => "UTF-32-BE",
        }
    }

    pub fn decode(self, bytes: &[u8], big_endian: bool, offset: u64) -> Result<String> {
        let fail = || Error::DecodeError {
            encoding: self.name(big_endian),
            offset,
        };
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|_| fail()),
            Encoding::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return Err(fail());
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|unit| {
                        let pair = [unit[0], unit[1]];
                        if big_endian {
                            u16::from_be_bytes(pair)
                        } else {
                            u16::from_le_bytes(pair)
                        }
                    })
                    .collect();
                String::from_utf16(&units).map_err(|_| fail())
            }
            Encoding::Utf32 => {
                if bytes.len() % 4 != 0 {
                    return Err(fail());
                }
                bytes
                    .chunks_exact(4)
                    .map(|unit| {
                        let quad = [unit[0], unit[1], unit[2], unit[3]];
                        let value = if big_endian {
                            u32::from_be_bytes(quad)
                        } else {
                            u32::from_le_bytes(quad)
                        };
                        char::from_u32(value).ok_or_else(|| fail())
                    })
                    .collect()
            }
        }
    }

    pub fn encode(self, text: &str, big_endian: bool) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Utf16 => text
                .encode_utf16()
                .flat_map(|unit| {
                    if big_endian {
                        unit.to_be_bytes()
                    } else {
                        unit.to_le_bytes()
                    }
                })
                .collect(),
            Encoding::Utf32 => text
                .chars()
                .flat_map(|ch| {
                    if big_endian {
                        (ch as u32).to_be_bytes()
                    } else {
                        (ch as u32).to_le_bytes()
                    }
                })
                .collect(),
        }
    }

    /// Byte length of `text` once encoded, without a terminator.
    pub fn encoded_len(self, text: &str) -> usize {
        match self {
            Encoding::Utf8 => text.len(),
            Encoding::Utf16 => text.encode_utf16().count() * 2,
            Encoding::Utf32 => text.chars().count() * 4,
        }
    }
}

macro_rules! impl_read_primitive {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty> {
            let offset = self.position();
            <$ty>::decode(self.endian(), &mut self.data).map_err(|_| Error::TruncatedStream { offset })
        }
    };
}

macro_rules! impl_write_primitive {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, value: $ty) -> Result<()> {
            value.encode(self.endian(), &mut self.data)?;
            Ok(())
        }
    };
}

/// Cursor over an in-memory LMS stream.
///
/// Endianness and encoding start at their little-endian/UTF-8 defaults and are
/// replaced once the file header has been read.
#[derive(Debug)]
pub struct FileReader {
    data: io::Cursor<Vec<u8>>,
    pub big_endian: bool,
    pub encoding: Encoding,
}

impl FileReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: io::Cursor::new(data),
            big_endian: false,
            encoding: Encoding::Utf8,
        }
    }

    fn endian(&self) -> Endian {
        if self.big_endian {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    pub fn position(&self) -> u64 {
        self.data.position()
    }

    pub fn len(&self) -> u64 {
        self.data.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.get_ref().is_empty()
    }

    pub fn seek(&mut self, offset: u64) {
        self.data.set_position(offset);
    }

    pub fn skip(&mut self, length: u64) {
        self.data.set_position(self.data.position() + length);
    }

    /// Advances the cursor to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: u64) {
        let rem = self.position() % alignment;
        if rem != 0 {
            self.skip(alignment - rem);
        }
    }

    impl_read_primitive!(read_u8, u8);
    impl_read_primitive!(read_u16, u16);
    impl_read_primitive!(read_u32, u32);
    impl_read_primitive!(read_i8, i8);
    impl_read_primitive!(read_i16, i16);
    impl_read_primitive!(read_i32, i32);

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        let offset = self.position();
        let mut buffer = vec![0; length];
        io::Read::read_exact(&mut self.data, &mut buffer)
            .map_err(|_| Error::TruncatedStream { offset })?;
        Ok(buffer)
    }

    /// Reads `length` bytes of UTF-8 text (labels and magics).
    pub fn read_str_len(&mut self, length: usize) -> Result<String> {
        let offset = self.position();
        let bytes = self.read_bytes(length)?;
        String::from_utf8(bytes).map_err(|_| Error::DecodeError {
            encoding: "UTF-8",
            offset,
        })
    }

    /// Reads code units in the file encoding until the NUL terminator.
    pub fn read_encoded_string(&mut self) -> Result<String> {
        let width = self.encoding.width();
        let terminator = self.encoding.terminator();
        let start = self.position();
        let mut raw = Vec::new();
        loop {
            let unit = self.read_bytes(width)?;
            if unit == terminator {
                break;
            }
            raw.extend_from_slice(&unit);
        }
        self.encoding.decode(&raw, self.big_endian, start)
    }

    /// Reads a `u16` byte length followed by that many bytes of encoded text.
    ///
    /// The cursor is aligned to the encoding width first, which is what skips
    /// the 0xCD pad a writer may have placed in front of the length field.
    pub fn read_len_encoded_string(&mut self) -> Result<String> {
        self.align(self.encoding.width() as u64);
        let length = self.read_u16()?;
        let start = self.position();
        let raw = self.read_bytes(length as usize)?;
        self.encoding.decode(&raw, self.big_endian, start)
    }

    /// Reads `count` offsets relative to the `u32` preceding the array (the
    /// count field just read) and returns them as absolute positions.
    pub fn read_offset_array(&mut self, count: usize) -> Result<Vec<u64>> {
        let base = self.position() - 4;
        let mut offsets = Vec::with_capacity(count);
        for _ in 0..count {
            offsets.push(base + u64::from(self.read_u32()?));
        }
        Ok(offsets)
    }

    pub fn read_u16_array(&mut self, count: usize) -> Result<Vec<u16>> {
        (0..count).map(|_| self.read_u16()).collect()
    }
}

/// Write-side counterpart of [`FileReader`].
///
/// Backed by a cursor so section sizes and the header file size can be
/// back-patched; writing past the end zero-fills the gap.
#[derive(Debug)]
pub struct FileWriter {
    data: io::Cursor<Vec<u8>>,
    pub big_endian: bool,
    pub encoding: Encoding,
}

impl FileWriter {
    pub fn new(encoding: Encoding, big_endian: bool) -> Self {
        Self {
            data: io::Cursor::new(Vec::new()),
            big_endian,
            encoding,
        }
    }

    fn endian(&self) -> Endian {
        if self.big_endian {
            Endian::Big
        } else {
            Endian::Little
        }
    }

    pub fn position(&self) -> u64 {
        self.data.position()
    }

    pub fn stream_size(&self) -> u64 {
        self.data.get_ref().len() as u64
    }

    pub fn seek(&mut self, offset: u64) {
        self.data.set_position(offset);
    }

    impl_write_primitive!(write_u8, u8);
    impl_write_primitive!(write_u16, u16);
    impl_write_primitive!(write_u32, u32);
    impl_write_primitive!(write_i8, i8);
    impl_write_primitive!(write_i16, i16);
    impl_write_primitive!(write_i32, i32);

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(value.to_bits())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.data.write_all(bytes)?;
        Ok(())
    }

    /// Emits `byte` until the cursor sits on a multiple of `alignment`.
    pub fn write_alignment(&mut self, byte: u8, alignment: u64) -> Result<()> {
        let rem = self.position() % alignment;
        if rem != 0 {
            let padding = vec![byte; (alignment - rem) as usize];
            self.write_bytes(&padding)?;
        }
        Ok(())
    }

    pub fn write_encoded_string(&mut self, text: &str, terminate: bool) -> Result<()> {
        let bytes = self.encoding.encode(text, self.big_endian);
        self.write_bytes(&bytes)?;
        if terminate {
            let terminator = self.encoding.terminator();
            self.write_bytes(terminator)?;
        }
        Ok(())
    }

    pub fn write_len_encoded_string(&mut self, text: &str) -> Result<()> {
        let bytes = self.encoding.encode(text, self.big_endian);
        self.write_u16(bytes.len() as u16)?;
        self.write_bytes(&bytes)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_follow_the_endian_flag() {
        let mut writer = FileWriter::new(Encoding::Utf16, false);
        writer.write_u16(0x1234).unwrap();
        writer.big_endian = true;
        writer.write_u16(0x1234).unwrap();
        assert_eq!(writer.into_bytes(), vec![0x34, 0x12, 0x12, 0x34]);
    }

    #[test]
    fn offset_array_is_relative_to_the_count_field() {
        let mut writer = FileWriter::new(Encoding::Utf8, false);
        writer.write_u32(2).unwrap();
        writer.write_u32(12).unwrap();
        writer.write_u32(16).unwrap();

        let mut reader = FileReader::new(writer.into_bytes());
        let count = reader.read_u32().unwrap();
        let offsets = reader.read_offset_array(count as usize).unwrap();
        assert_eq!(offsets, vec![12, 16]);
    }

    #[test]
    fn len_encoded_string_skips_the_pad_byte() {
        let mut writer = FileWriter::new(Encoding::Utf16, false);
        writer.write_u8(7).unwrap();
        writer.write_u8(0xCD).unwrap();
        writer.write_len_encoded_string("Abe").unwrap();

        let mut reader = FileReader::new(writer.into_bytes());
        reader.encoding = Encoding::Utf16;
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_len_encoded_string().unwrap(), "Abe");
    }

    #[test]
    fn alignment_advances_to_the_next_boundary() {
        let mut reader = FileReader::new(vec![0; 32]);
        reader.seek(3);
        reader.align(16);
        assert_eq!(reader.position(), 16);
        reader.align(16);
        assert_eq!(reader.position(), 16);
    }
}
