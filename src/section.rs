use crate::constants;
use crate::result::Result;
use crate::stream::{FileReader, FileWriter};

/// Header of one section frame: magic, payload size, 8 reserved bytes.
#[derive(Debug, Clone, Copy)]
pub struct SectionHeader {
    pub magic: [u8; 4],
    pub size: u32,
    pub data_start: u64,
}

impl SectionHeader {
    /// First byte past the payload, before the 0xAB alignment tail.
    pub fn end(&self) -> u64 {
        self.data_start + u64::from(self.size)
    }
}

/// Reads a section header and leaves the cursor at the payload start.
pub fn read_section_header(reader: &mut FileReader) -> Result<SectionHeader> {
    let raw = reader.read_bytes(4)?;
    let magic = [raw[0], raw[1], raw[2], raw[3]];
    let size = reader.read_u32()?;
    reader.skip(8);
    Ok(SectionHeader {
        magic,
        size,
        data_start: reader.position(),
    })
}

/// Seeks past the payload and its alignment padding to the next section.
pub fn seek_past_section(reader: &mut FileReader, header: &SectionHeader) {
    reader.seek(header.end());
    reader.align(constants::SECTION_ALIGNMENT);
}

/// Writes one section: magic, placeholder size, reserved bytes, then the body
/// produced by `body`. The size is back-patched afterwards and the next
/// section start is aligned with 0xAB bytes.
pub fn write_section<F>(writer: &mut FileWriter, magic: &[u8; 4], body: F) -> Result<()>
where
    F: FnOnce(&mut FileWriter) -> Result<()>,
{
    writer.write_bytes(magic)?;
    let size_offset = writer.position();
    writer.write_u32(0)?;
    writer.write_bytes(&[0; 8])?;
    let data_start = writer.position();

    body(writer)?;

    let end = writer.position();
    writer.seek(size_offset);
    writer.write_u32((end - data_start) as u32)?;
    writer.seek(end);
    writer.write_alignment(constants::SECTION_PADDING_BYTE, constants::SECTION_ALIGNMENT)
}
