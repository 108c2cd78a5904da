use crate::config::TagConfig;
use crate::message::{MessagePart, MessageText};
use crate::result::Result;
use crate::stream::{FileReader, FileWriter};
use crate::tag::{read_tag, tag_indicators, write_tag};

/// Reads a TXT2 section: a message count, offsets relative to the count
/// field, then each message's terminated code-unit stream.
pub fn read_txt2(reader: &mut FileReader, config: Option<&TagConfig>) -> Result<Vec<MessageText>> {
    let encoding = reader.encoding;
    let width = encoding.width();
    let terminator = encoding.terminator();
    let (open_indicator, close_indicator) = tag_indicators(encoding, reader.big_endian);

    let message_count = reader.read_u32()?;
    let offsets = reader.read_offset_array(message_count as usize)?;

    let mut messages = Vec::with_capacity(offsets.len());
    for offset in offsets {
        reader.seek(offset);

        let mut parts = Vec::new();
        let mut pending = Vec::new();
        let mut chunk_start = reader.position();
        loop {
            let unit_start = reader.position();
            let unit = reader.read_bytes(width)?;
            if unit == terminator {
                break;
            }

            if unit == open_indicator || unit == close_indicator {
                if !pending.is_empty() {
                    let text = encoding.decode(&pending, reader.big_endian, chunk_start)?;
                    parts.push(MessagePart::Text(text));
                    pending.clear();
                }
                let tag = read_tag(reader, config, unit == close_indicator)?;
                parts.push(MessagePart::Tag(tag));
                chunk_start = reader.position();
            } else {
                if pending.is_empty() {
                    chunk_start = unit_start;
                }
                pending.extend_from_slice(&unit);
            }
        }
        if !pending.is_empty() {
            let text = encoding.decode(&pending, reader.big_endian, chunk_start)?;
            parts.push(MessagePart::Text(text));
        }

        messages.push(MessageText::from_parts(parts));
    }

    Ok(messages)
}

/// Writes a TXT2 section, back-patching each offset as its message body is
/// emitted.
pub fn write_txt2(writer: &mut FileWriter, messages: &[&MessageText]) -> Result<()> {
    let start = writer.position();
    let mut offset = 4 + 4 * messages.len() as u64;
    writer.write_u32(messages.len() as u32)?;

    for message in messages {
        writer.write_u32(offset as u32)?;
        let next_entry = writer.position();

        writer.seek(start + offset);
        let body_start = writer.position();
        for part in message.parts() {
            match part {
                MessagePart::Text(text) => writer.write_encoded_string(text, false)?,
                MessagePart::Tag(tag) => write_tag(writer, tag)?,
            }
        }
        let terminator = writer.encoding.terminator();
        writer.write_bytes(terminator)?;

        offset += writer.position() - body_start;
        writer.seek(next_entry);
    }

    writer.seek(start + offset);
    Ok(())
}

/// Reads a TSY1 section: one `u32` style index per message. The count is
/// whatever the section size holds.
pub fn read_tsy1(reader: &mut FileReader, section_size: u32) -> Result<Vec<u32>> {
    (0..section_size / 4).map(|_| reader.read_u32()).collect()
}

pub fn write_tsy1(writer: &mut FileWriter, style_indexes: &[u32]) -> Result<()> {
    for index in style_indexes {
        writer.write_u32(*index)?;
    }
    Ok(())
}
