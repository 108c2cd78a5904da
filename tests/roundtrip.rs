use assert_matches::assert_matches;
use indexmap::IndexMap;
use lms_sdk::attributes::Attribute;
use lms_sdk::config::{TagConfig, TagDefinition, TitleConfig};
use lms_sdk::datatype::DataType;
use lms_sdk::field::{FieldMap, FieldValue, ValueDefinition};
use lms_sdk::info::{patch_file_size, write_file_info, FileInfo};
use lms_sdk::message::{MessagePart, MessageText};
use lms_sdk::msbt::{read_msbt, write_msbt, Msbt, MsbtEntry};
use lms_sdk::project::read_msbp;
use lms_sdk::result::{Error, Result};
use lms_sdk::section::write_section;
use lms_sdk::stream::{Encoding, FileReader, FileWriter};
use lms_sdk::tag::{ControlTag, EncodedTag};
use lms_sdk::text::{read_txt2, write_txt2};
use lms_sdk::{hash, Msbp};

fn utf16_le_info(section_count: u16) -> FileInfo {
    FileInfo {
        big_endian: false,
        encoding: Encoding::Utf16,
        version: 3,
        section_count,
    }
}

/// An empty little-endian UTF-16 MSBT: just a LBL1 with 101 empty slots.
fn empty_msbt_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"MsgStdBn");
    bytes.extend_from_slice(&[0xFF, 0xFE, 0, 0]);
    bytes.push(1); // UTF-16
    bytes.push(3); // version
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&[0, 0]);
    bytes.extend_from_slice(&864u32.to_le_bytes());
    bytes.extend_from_slice(&[0; 10]);

    bytes.extend_from_slice(b"LBL1");
    bytes.extend_from_slice(&812u32.to_le_bytes());
    bytes.extend_from_slice(&[0; 8]);
    bytes.extend_from_slice(&101u32.to_le_bytes());
    for _ in 0..101 {
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&812u32.to_le_bytes());
    }
    while bytes.len() % 16 != 0 {
        bytes.push(0xAB);
    }
    bytes
}

#[test]
fn empty_msbt_roundtrips() -> Result<()> {
    let bytes = empty_msbt_bytes();
    assert_eq!(bytes.len(), 0x360);

    let msbt = read_msbt(bytes.clone(), None, None)?;
    assert!(msbt.entries().is_empty());
    assert_eq!(msbt.slot_count(), 101);
    assert_eq!(msbt.section_list(), &[*b"LBL1"]);

    assert_eq!(write_msbt(&msbt)?, bytes);
    Ok(())
}

#[test]
fn single_message_roundtrips() -> Result<()> {
    let mut msbt = Msbt::new(utf16_le_info(0), None, None);
    msbt.add_entry(MsbtEntry::new(
        "Hello_00",
        MessageText::from_text("Hi\n", None)?,
    ))?;

    let bytes = write_msbt(&msbt)?;
    let read = read_msbt(bytes.clone(), None, None)?;

    assert_eq!(read.section_list(), &[*b"LBL1", *b"TXT2"]);
    assert_eq!(
        read.get_entry("Hello_00").expect("entry exists").message.text(),
        "Hi\n"
    );
    assert_eq!(write_msbt(&read)?, bytes);
    Ok(())
}

#[test]
fn color_tag_payload_is_exact() -> Result<()> {
    let config = TagConfig::system();
    let text = "[System:Color r=\"255\" g=\"0\" b=\"0\" a=\"255\"]Red[/System:Color]";
    let message = MessageText::from_text(text, Some(&config))?;

    let mut writer = FileWriter::new(Encoding::Utf16, false);
    write_txt2(&mut writer, &[&message])?;
    let bytes = writer.into_bytes();

    // count = 1, offset = 8, then the message body.
    assert_eq!(&bytes[..8], &[1, 0, 0, 0, 8, 0, 0, 0]);
    // Opening tag: indicator, group 0, tag 3, size 4, payload FF 00 00 FF.
    assert_eq!(
        &bytes[8..20],
        &[0x0E, 0, 0, 0, 3, 0, 4, 0, 0xFF, 0x00, 0x00, 0xFF]
    );
    assert_eq!(&bytes[20..26], &[b'R', 0, b'e', 0, b'd', 0]);
    // Closing tag carries no parameter size.
    assert_eq!(&bytes[26..32], &[0x0F, 0, 0, 0, 3, 0]);
    assert_eq!(&bytes[32..34], &[0, 0]);
    assert_eq!(bytes.len(), 34);

    let mut reader = FileReader::new(bytes);
    reader.encoding = Encoding::Utf16;
    let messages = read_txt2(&mut reader, Some(&config))?;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text(), text);
    Ok(())
}

fn mii_config() -> TagConfig {
    let mut group_map = IndexMap::new();
    group_map.insert(1u16, "Mii".to_string());
    let nickname = TagDefinition {
        group_name: "Mii".to_string(),
        group_id: 1,
        tag_name: "Nickname".to_string(),
        tag_index: 0,
        description: String::new(),
        parameters: vec![
            ValueDefinition::new("buffer", DataType::Uint8),
            ValueDefinition::with_list(
                "type",
                vec!["Text".to_string(), "Voice".to_string()],
            ),
            ValueDefinition::with_list(
                "conversion",
                vec!["None".to_string(), "Upper".to_string()],
            ),
        ],
    };
    let sign = TagDefinition {
        group_name: "Mii".to_string(),
        group_id: 1,
        tag_name: "Sign".to_string(),
        tag_index: 1,
        description: String::new(),
        parameters: vec![
            ValueDefinition::new("pre", DataType::Uint8),
            ValueDefinition::new("name", DataType::String),
            ValueDefinition::new("post", DataType::Uint8),
        ],
    };
    TagConfig::new(group_map, vec![nickname, sign])
}

#[test]
fn odd_payload_gets_a_trailing_pad() -> Result<()> {
    let config = mii_config();
    let text = "[Mii:Nickname buffer=\"1\" type=\"Voice\" conversion=\"None\"]";
    let message = MessageText::from_text(text, Some(&config))?;

    let mut writer = FileWriter::new(Encoding::Utf16, false);
    write_txt2(&mut writer, &[&message])?;
    let bytes = writer.into_bytes();

    // Three one-byte parameters: size 4 with exactly one trailing 0xCD.
    assert_eq!(
        &bytes[8..20],
        &[0x0E, 0, 1, 0, 0, 0, 4, 0, 0x01, 0x01, 0x00, 0xCD]
    );
    assert_eq!(bytes[8..].iter().filter(|&&byte| byte == 0xCD).count(), 1);

    let mut reader = FileReader::new(bytes);
    reader.encoding = Encoding::Utf16;
    let messages = read_txt2(&mut reader, Some(&config))?;
    assert_eq!(messages[0].text(), text);
    Ok(())
}

#[test]
fn odd_prefix_pads_before_the_first_string() -> Result<()> {
    let config = mii_config();
    let text = "[Mii:Sign pre=\"9\" name=\"Abe\" post=\"7\"]";
    let message = MessageText::from_text(text, Some(&config))?;

    let mut writer = FileWriter::new(Encoding::Utf16, false);
    write_txt2(&mut writer, &[&message])?;
    let bytes = writer.into_bytes();

    // u8, pad, u16 length 6, "Abe" in UTF-16 LE, u8.
    assert_eq!(&bytes[14..16], &[11, 0]);
    assert_eq!(
        &bytes[16..27],
        &[0x09, 0xCD, 6, 0, b'A', 0, b'b', 0, b'e', 0, 0x07]
    );
    assert_eq!(bytes[8..].iter().filter(|&&byte| byte == 0xCD).count(), 1);

    let mut reader = FileReader::new(bytes);
    reader.encoding = Encoding::Utf16;
    let messages = read_txt2(&mut reader, Some(&config))?;
    assert_eq!(messages[0].text(), text);
    Ok(())
}

#[test]
fn unknown_sections_and_order_are_preserved() -> Result<()> {
    let info = utf16_le_info(4);
    let mut writer = FileWriter::new(info.encoding, info.big_endian);
    write_file_info(&mut writer, b"MsgStdBn", &info)?;

    write_section(&mut writer, b"ATR1", |writer| {
        writer.write_u32(1)?;
        writer.write_u32(4)?;
        writer.write_bytes(&[1, 2, 3, 4])?;
        writer.write_bytes(b"STRTBL")
    })?;
    let message = MessageText::from_text("Hi", None)?;
    write_section(&mut writer, b"TXT2", |writer| write_txt2(writer, &[&message]))?;
    write_section(&mut writer, b"ATO1", |writer| writer.write_bytes(&[0xEE; 32]))?;
    write_section(&mut writer, b"LBL1", |writer| {
        hash::write_labels(writer, &["A"], 101)
    })?;
    patch_file_size(&mut writer)?;
    let bytes = writer.into_bytes();

    let msbt = read_msbt(bytes.clone(), None, None)?;
    assert_eq!(
        msbt.section_list(),
        &[*b"ATR1", *b"TXT2", *b"ATO1", *b"LBL1"]
    );
    assert_eq!(
        msbt.unsupported_sections().get(b"ATO1").map(Vec::as_slice),
        Some(&[0xEE; 32][..])
    );
    assert_eq!(msbt.attr_string_table(), Some(&b"STRTBL"[..]));
    assert_matches!(
        &msbt.entries()[0].attribute,
        Some(Attribute::Encoded(bytes)) if bytes.as_slice() == [1, 2, 3, 4]
    );

    assert_eq!(write_msbt(&msbt)?, bytes);
    Ok(())
}

#[test]
fn styles_and_decoded_attributes_roundtrip() -> Result<()> {
    let attribute_config = lms_sdk::AttributeConfig::new(
        "standard",
        vec![
            ValueDefinition::new("kind", DataType::Uint8),
            ValueDefinition::new("sound", DataType::String),
        ],
    );

    let mut msbt = Msbt::new(utf16_le_info(0), Some(attribute_config.clone()), None);
    let fields = FieldMap::from_values(
        &[
            ("kind", FieldValue::Uint8(2)),
            ("sound", FieldValue::String("SE_OK".to_string())),
        ],
        &attribute_config.definitions,
    )?;
    let mut entry = MsbtEntry::new("Msg_00", MessageText::from_text("Done", None)?);
    entry.attribute = Some(Attribute::Decoded(fields));
    entry.style_index = Some(7);
    msbt.add_entry(entry)?;

    assert_eq!(msbt.section_list(), &[*b"LBL1", *b"ATR1", *b"TXT2", *b"TSY1"]);
    assert!(msbt.has_attributes());
    assert!(msbt.has_style_indexes());

    let bytes = write_msbt(&msbt)?;
    let read = read_msbt(bytes.clone(), Some(&attribute_config), None)?;
    assert!(!read.uses_encoded_attributes());
    assert_eq!(read.entries()[0].style_index, Some(7));
    assert_eq!(write_msbt(&read)?, bytes);
    Ok(())
}

#[test]
fn layout_mismatch_falls_back_to_encoded_attributes() -> Result<()> {
    // One 4-byte record, but the config describes a 5-byte layout.
    let info = utf16_le_info(2);
    let mut writer = FileWriter::new(info.encoding, info.big_endian);
    write_file_info(&mut writer, b"MsgStdBn", &info)?;
    write_section(&mut writer, b"LBL1", |writer| {
        hash::write_labels(writer, &["A"], 101)
    })?;
    write_section(&mut writer, b"ATR1", |writer| {
        writer.write_u32(1)?;
        writer.write_u32(4)?;
        writer.write_bytes(&[9, 9, 9, 9])
    })?;
    patch_file_size(&mut writer)?;
    let bytes = writer.into_bytes();

    let config = lms_sdk::AttributeConfig::new(
        "standard",
        vec![
            ValueDefinition::new("kind", DataType::Uint8),
            ValueDefinition::new("volume", DataType::Uint32),
        ],
    );
    let msbt = read_msbt(bytes.clone(), Some(&config), None)?;
    assert!(msbt.uses_encoded_attributes());
    assert_matches!(
        &msbt.entries()[0].attribute,
        Some(Attribute::Encoded(row)) if row.as_slice() == [9, 9, 9, 9]
    );
    assert_eq!(write_msbt(&msbt)?, bytes);
    Ok(())
}

#[test]
fn failed_tag_decode_falls_back_when_suppressed() -> Result<()> {
    // Group 1 tag 2 whose only parameter is a one-item list; the stream holds
    // an index far past it.
    let definition = TagDefinition {
        group_name: "Mii".to_string(),
        group_id: 1,
        tag_name: "Choice".to_string(),
        tag_index: 2,
        description: String::new(),
        parameters: vec![ValueDefinition::with_list("type", vec!["Text".to_string()])],
    };
    let mut group_map = IndexMap::new();
    group_map.insert(1u16, "Mii".to_string());
    let mut config = TagConfig::new(group_map, vec![definition]);

    let mut writer = FileWriter::new(Encoding::Utf16, false);
    writer.write_u32(1)?;
    writer.write_u32(8)?;
    writer.write_bytes(&[0x0E, 0, 1, 0, 2, 0, 2, 0, 0xFF, 0xFF, 0, 0])?;
    let bytes = writer.into_bytes();

    let mut reader = FileReader::new(bytes.clone());
    reader.encoding = Encoding::Utf16;
    assert_matches!(
        read_txt2(&mut reader, Some(&config)),
        Err(Error::TagReadingError { .. })
    );

    config.suppress_tag_errors = true;
    let mut reader = FileReader::new(bytes);
    reader.encoding = Encoding::Utf16;
    let messages = read_txt2(&mut reader, Some(&config))?;
    let tags: Vec<&ControlTag> = messages[0].tags().collect();
    assert_matches!(
        tags[0],
        ControlTag::Encoded(EncodedTag {
            group_id: 1,
            tag_index: 2,
            is_fallback: true,
            ..
        })
    );
    assert_eq!(messages[0].text(), "[!1:2 FF-FF]");

    // The rendered fallback parses back to the same parts.
    let reparsed = MessageText::from_text(&messages[0].text(), Some(&config))?;
    assert_eq!(reparsed.text(), messages[0].text());
    Ok(())
}

#[test]
fn add_entry_enforces_section_consistency() -> Result<()> {
    let mut msbt = Msbt::new(utf16_le_info(0), None, None);
    let mut first = MsbtEntry::new("A", MessageText::new());
    first.attribute = Some(Attribute::Encoded(vec![1, 2]));
    msbt.add_entry(first)?;

    // The file now has ATR1, so a bare entry is rejected.
    assert_matches!(
        msbt.add_entry(MsbtEntry::new("B", MessageText::new())),
        Err(Error::SectionConsistency(_))
    );
    // And duplicate labels are refused.
    let mut duplicate = MsbtEntry::new("A", MessageText::new());
    duplicate.attribute = Some(Attribute::Encoded(vec![3, 4]));
    assert_matches!(
        msbt.add_entry(duplicate),
        Err(Error::DuplicateLabel(_))
    );

    let mut second = MsbtEntry::new("B", MessageText::new());
    second.attribute = Some(Attribute::Encoded(vec![3, 4]));
    msbt.add_entry(second)?;
    assert_eq!(msbt.entries().len(), 2);

    msbt.delete_entry("A")?;
    assert_matches!(msbt.delete_entry("A"), Err(Error::UnknownLabel(_)));
    Ok(())
}

fn project_bytes() -> Result<Vec<u8>> {
    let info = utf16_le_info(6);
    let mut writer = FileWriter::new(info.encoding, info.big_endian);
    write_file_info(&mut writer, b"MsgPrjBn", &info)?;

    write_section(&mut writer, b"CLR1", |writer| {
        writer.write_u32(1)?;
        for channel in [255u32, 0, 0, 255] {
            writer.write_u32(channel)?;
        }
        Ok(())
    })?;
    write_section(&mut writer, b"CLB1", |writer| {
        hash::write_labels(writer, &["Red"], 29)
    })?;
    write_section(&mut writer, b"TGG2", |writer| {
        writer.write_u32(1)?;
        writer.write_u32(8)?;
        writer.write_u16(1)?;
        writer.write_u16(0)?;
        writer.write_encoded_string("Mii", true)
    })?;
    write_section(&mut writer, b"TAG2", |writer| {
        writer.write_u32(1)?;
        writer.write_u32(8)?;
        writer.write_u16(1)?;
        writer.write_u16(0)?;
        writer.write_encoded_string("Nickname", true)
    })?;
    write_section(&mut writer, b"TGP2", |writer| {
        writer.write_u32(1)?;
        writer.write_u32(8)?;
        writer.write_u8(9)?; // LIST
        writer.write_u8(0)?;
        writer.write_u16(2)?;
        writer.write_u16(0)?;
        writer.write_u16(1)?;
        writer.write_encoded_string("type", true)
    })?;
    write_section(&mut writer, b"TGL2", |writer| {
        writer.write_u16(2)?;
        writer.write_bytes(&[0, 0])?;
        writer.write_u32(12)?;
        writer.write_u32(22)?;
        writer.write_encoded_string("Text", true)?;
        writer.write_encoded_string("Voice", true)
    })?;
    patch_file_size(&mut writer)?;
    Ok(writer.into_bytes())
}

#[test]
fn msbp_resolves_its_schema() -> Result<()> {
    let mut msbp: Msbp = read_msbp(project_bytes()?)?;
    msbp.set_name("demo");

    let colors = msbp.colors().as_ref().expect("colors read");
    assert_eq!(colors[0].name.as_deref(), Some("Red"));
    assert_eq!((colors[0].r, colors[0].a), (255, 255));

    let groups = msbp.tag_groups().as_ref().expect("groups read");
    assert_eq!(groups[0].name, "Mii");
    assert_eq!(groups[0].id, 0);
    let tag = &groups[0].tags[0];
    assert_eq!(tag.name, "Nickname");
    assert_eq!(tag.parameters[0].name, "type");
    assert_eq!(tag.parameters[0].datatype, DataType::List);
    assert_eq!(tag.parameters[0].list_items, vec!["Text", "Voice"]);

    let title = TitleConfig::from_msbp(&msbp);
    let tag_config = title.tag_config().expect("tag config generated");
    let definition = tag_config.definition_by_names("Mii", "Nickname")?;
    assert_eq!(definition.parameters[0].list_items, vec!["Text", "Voice"]);
    Ok(())
}

#[test]
fn text_and_parts_stay_in_sync() -> Result<()> {
    let config = TagConfig::system();
    let text = "Start[System:Size percent=\"120\"]big[/System:Size][0:4]\nend";
    let message = MessageText::from_text(text, Some(&config))?;
    assert_eq!(message.text(), text);

    let reparsed = MessageText::from_text(&message.text(), Some(&config))?;
    assert_eq!(reparsed.parts().len(), message.parts().len());
    assert!(matches!(reparsed.parts()[0], MessagePart::Text(ref t) if t == "Start"));
    assert_eq!(reparsed.text(), text);
    Ok(())
}

#[test]
fn big_endian_files_roundtrip() -> Result<()> {
    let info = FileInfo {
        big_endian: true,
        encoding: Encoding::Utf16,
        version: 3,
        section_count: 0,
    };
    let mut msbt = Msbt::new(info, None, None);
    msbt.add_entry(MsbtEntry::new(
        "Label_00",
        MessageText::from_text("Hey[0:4]", None)?,
    ))?;

    let bytes = write_msbt(&msbt)?;
    assert_eq!(&bytes[8..10], &[0xFE, 0xFF]);
    let read = read_msbt(bytes.clone(), None, None)?;
    assert!(read.info().big_endian);
    assert_eq!(read.entries()[0].message.text(), "Hey[0:4]");
    assert_eq!(write_msbt(&read)?, bytes);
    Ok(())
}

#[test]
fn foreign_bom_is_rejected() {
    let mut bytes = empty_msbt_bytes();
    bytes[8] = 0x00;
    bytes[9] = 0x42;
    assert_matches!(
        read_msbt(bytes, None, None),
        Err(Error::UnexpectedMagic { .. })
    );
}

#[test]
fn misaligned_file_size_is_rejected() {
    let mut bytes = empty_msbt_bytes();
    bytes.push(0);
    assert_matches!(
        read_msbt(bytes, None, None),
        Err(Error::MisalignedSize { .. })
    );
}
