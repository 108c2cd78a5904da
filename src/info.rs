use crate::constants;
use crate::result::{Error, Result};
use crate::stream::{Encoding, FileReader, FileWriter};

/// Decoded file header shared by MSBT and MSBP files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub big_endian: bool,
    pub encoding: Encoding,
    pub version: u8,
    pub section_count: u16,
}

/// Reads the 32-byte header, configures the reader's endianness and encoding
/// and leaves the cursor at the first section.
pub fn read_file_info(reader: &mut FileReader, expected_magic: &[u8; 8]) -> Result<FileInfo> {
    let magic = reader.read_bytes(8)?;
    if magic != expected_magic {
        return Err(Error::UnexpectedMagic {
            expected: String::from_utf8_lossy(expected_magic).into_owned(),
            found: String::from_utf8_lossy(&magic).into_owned(),
        });
    }

    let bom = reader.read_bytes(2)?;
    let big_endian = if bom == constants::BOM_BIG {
        true
    } else if bom == constants::BOM_LITTLE {
        false
    } else {
        return Err(Error::UnexpectedMagic {
            expected: "a byte order mark".to_string(),
            found: format!("{:02X} {:02X}", bom[0], bom[1]),
        });
    };
    reader.big_endian = big_endian;

    reader.skip(2);

    let encoding_offset = reader.position();
    let encoding = Encoding::from_u8(reader.read_u8()?).ok_or(Error::DecodeError {
        encoding: "encoding id",
        offset: encoding_offset,
    })?;
    reader.encoding = encoding;

    let version = reader.read_u8()?;
    let section_count = reader.read_u16()?;

    reader.skip(2);
    let file_size = reader.read_u32()?;
    if u64::from(file_size) != reader.len() {
        return Err(Error::MisalignedSize {
            expected: file_size,
            actual: reader.len(),
        });
    }

    reader.seek(constants::FIRST_SECTION_OFFSET);

    Ok(FileInfo {
        big_endian,
        encoding,
        version,
        section_count,
    })
}

/// Writes the header with a placeholder file size; the size is back-patched by
/// [`patch_file_size`] once every section has been emitted.
pub fn write_file_info(writer: &mut FileWriter, magic: &[u8; 8], info: &FileInfo) -> Result<()> {
    writer.big_endian = info.big_endian;
    writer.encoding = info.encoding;

    writer.write_bytes(magic)?;
    writer.write_bytes(if info.big_endian {
        &constants::BOM_BIG
    } else {
        &constants::BOM_LITTLE
    })?;
    writer.write_bytes(&[0, 0])?;

    writer.write_u8(info.encoding as u8)?;
    writer.write_u8(info.version)?;
    writer.write_u16(info.section_count)?;

    writer.write_bytes(&[0, 0])?;
    writer.write_u32(0)?;
    writer.write_bytes(&[0; 10])?;
    Ok(())
}

pub fn patch_file_size(writer: &mut FileWriter) -> Result<()> {
    let size = writer.stream_size();
    writer.seek(constants::FILE_SIZE_OFFSET);
    writer.write_u32(size as u32)?;
    writer.seek(size);
    Ok(())
}
