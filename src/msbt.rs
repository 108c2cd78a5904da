use indexmap::IndexMap;

use crate::attributes::{
    read_decoded_atr1, read_encoded_atr1, write_decoded_atr1, write_encoded_atr1, Atr1Data,
    Attribute,
};
use crate::config::{AttributeConfig, TagConfig};
use crate::constants;
use crate::field::FieldMap;
use crate::hash::{read_labels, write_labels};
use crate::info::{patch_file_size, read_file_info, write_file_info, FileInfo};
use crate::message::MessageText;
use crate::result::{Error, Result};
use crate::section::{read_section_header, seek_past_section, write_section};
use crate::stream::{FileReader, FileWriter};
use crate::text::{read_tsy1, read_txt2, write_tsy1, write_txt2};

/// One named message with its positional companions.
#[derive(Debug, Clone, PartialEq)]
pub struct MsbtEntry {
    pub name: String,
    pub message: MessageText,
    pub attribute: Option<Attribute>,
    pub style_index: Option<u32>,
}

impl MsbtEntry {
    pub fn new(name: impl Into<String>, message: MessageText) -> Self {
        Self {
            name: name.into(),
            message,
            attribute: None,
            style_index: None,
        }
    }
}

/// A message file. Section order, unknown sections, the label table slot
/// count and the encoded attribute string table are all preserved so an
/// unmodified file writes back byte for byte.
#[derive(Debug)]
pub struct Msbt {
    info: FileInfo,
    entries: Vec<MsbtEntry>,
    slot_count: u32,
    size_per_attribute: u32,
    attr_string_table: Option<Vec<u8>>,
    uses_encoded_attributes: bool,
    section_list: Vec<[u8; 4]>,
    unsupported_sections: IndexMap<[u8; 4], Vec<u8>>,
    attribute_config: Option<AttributeConfig>,
    tag_config: Option<TagConfig>,
}

impl Msbt {
    /// A fresh file with the standard LBL1 + TXT2 layout.
    pub fn new(
        info: FileInfo,
        attribute_config: Option<AttributeConfig>,
        tag_config: Option<TagConfig>,
    ) -> Self {
        Self {
            info,
            entries: Vec::new(),
            slot_count: constants::MSBT_SLOT_COUNT,
            size_per_attribute: 0,
            attr_string_table: None,
            uses_encoded_attributes: attribute_config.is_none(),
            section_list: vec![*b"LBL1", *b"TXT2"],
            unsupported_sections: IndexMap::new(),
            attribute_config,
            tag_config,
        }
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    pub fn entries(&self) -> &[MsbtEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [MsbtEntry] {
        &mut self.entries
    }

    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    pub fn set_slot_count(&mut self, slot_count: u32) {
        self.slot_count = slot_count;
    }

    pub fn size_per_attribute(&self) -> u32 {
        self.size_per_attribute
    }

    pub fn attr_string_table(&self) -> Option<&[u8]> {
        self.attr_string_table.as_deref()
    }

    pub fn uses_encoded_attributes(&self) -> bool {
        self.uses_encoded_attributes
    }

    pub fn section_list(&self) -> &[[u8; 4]] {
        &self.section_list
    }

    pub fn unsupported_sections(&self) -> &IndexMap<[u8; 4], Vec<u8>> {
        &self.unsupported_sections
    }

    pub fn attribute_config(&self) -> Option<&AttributeConfig> {
        self.attribute_config.as_ref()
    }

    pub fn tag_config(&self) -> Option<&TagConfig> {
        self.tag_config.as_ref()
    }

    pub fn section_exists(&self, magic: &[u8; 4]) -> bool {
        self.section_list.contains(magic)
    }

    pub fn has_attributes(&self) -> bool {
        self.section_exists(b"ATR1")
    }

    pub fn has_style_indexes(&self) -> bool {
        self.section_exists(b"TSY1")
    }

    pub fn get_entry(&self, name: &str) -> Option<&MsbtEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn get_entry_mut(&mut self, name: &str) -> Option<&mut MsbtEntry> {
        self.entries.iter_mut().find(|entry| entry.name == name)
    }

    pub fn get_entry_by_index(&self, index: usize) -> Option<&MsbtEntry> {
        self.entries.get(index)
    }

    /// Adds an entry, keeping ATR1 and TSY1 fully populated: an entry must
    /// supply an attribute (or style index) exactly when the section exists.
    /// The section is implicitly created when the first entry of an empty
    /// file supplies one. Validation happens up front so a rejected entry
    /// leaves the file untouched.
    pub fn add_entry(&mut self, entry: MsbtEntry) -> Result<()> {
        if self.get_entry(&entry.name).is_some() {
            return Err(Error::DuplicateLabel(entry.name));
        }
        self.validate_companion(entry.attribute.is_some(), *b"ATR1", "an attribute")?;
        self.validate_companion(entry.style_index.is_some(), *b"TSY1", "a style index")?;
        if let Some(attribute) = &entry.attribute {
            self.validate_attribute(attribute)?;
        }

        if entry.attribute.is_some() && !self.section_exists(b"ATR1") {
            self.insert_section(*b"ATR1");
        }
        if entry.style_index.is_some() && !self.section_exists(b"TSY1") {
            self.insert_section(*b"TSY1");
        }
        if let Some(attribute) = &entry.attribute {
            self.commit_attribute(attribute);
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn delete_entry(&mut self, name: &str) -> Result<MsbtEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.name == name)
            .ok_or_else(|| Error::UnknownLabel(name.to_string()))?;
        Ok(self.entries.remove(index))
    }

    fn validate_companion(&self, supplied: bool, magic: [u8; 4], what: &str) -> Result<()> {
        let exists = self.section_exists(&magic);
        if exists && !supplied {
            return Err(Error::SectionConsistency(format!(
                "the file has {} but the entry supplies no {what}",
                String::from_utf8_lossy(&magic)
            )));
        }
        if !exists && supplied && !self.entries.is_empty() {
            return Err(Error::SectionConsistency(format!(
                "existing entries have no {what}, adding one would leave {} partial",
                String::from_utf8_lossy(&magic)
            )));
        }
        Ok(())
    }

    fn validate_attribute(&self, attribute: &Attribute) -> Result<()> {
        match attribute {
            Attribute::Encoded(bytes) => {
                let has_decoded = self
                    .entries
                    .iter()
                    .any(|entry| matches!(entry.attribute, Some(Attribute::Decoded(_))));
                if has_decoded || !self.uses_encoded_attributes {
                    return Err(Error::SectionConsistency(
                        "the file stores decoded attributes, got raw bytes".to_string(),
                    ));
                }
                let has_existing = self.entries.iter().any(|entry| entry.attribute.is_some());
                if (has_existing || self.size_per_attribute != 0)
                    && bytes.len() as u32 != self.size_per_attribute
                {
                    return Err(Error::SectionConsistency(format!(
                        "attribute is {} bytes, the file stores {} per record",
                        bytes.len(),
                        self.size_per_attribute
                    )));
                }
            }
            Attribute::Decoded(fields) => {
                if self.attribute_config.is_none() {
                    return Err(Error::MissingConfig("add decoded attributes"));
                }
                let has_encoded = self
                    .entries
                    .iter()
                    .any(|entry| matches!(entry.attribute, Some(Attribute::Encoded(_))));
                if has_encoded {
                    return Err(Error::SectionConsistency(
                        "the file stores encoded attributes, got decoded fields".to_string(),
                    ));
                }
                if self.size_per_attribute != 0
                    && decoded_record_size(fields) != self.size_per_attribute
                {
                    return Err(Error::SectionConsistency(format!(
                        "attribute computes {} bytes, the file stores {} per record",
                        decoded_record_size(fields),
                        self.size_per_attribute
                    )));
                }
            }
        }
        Ok(())
    }

    /// New sections keep the canonical layout: ATR1 follows LBL1, TSY1 goes
    /// last.
    fn insert_section(&mut self, magic: [u8; 4]) {
        if magic == *b"ATR1" {
            let position = self
                .section_list
                .iter()
                .position(|section| section == b"LBL1")
                .map(|index| index + 1)
                .unwrap_or(0);
            self.section_list.insert(position, magic);
        } else {
            self.section_list.push(magic);
        }
    }

    fn commit_attribute(&mut self, attribute: &Attribute) {
        match attribute {
            Attribute::Encoded(bytes) => {
                if self.size_per_attribute == 0 {
                    self.size_per_attribute = bytes.len() as u32;
                }
            }
            Attribute::Decoded(fields) => {
                self.uses_encoded_attributes = false;
                if self.size_per_attribute == 0 {
                    self.size_per_attribute = decoded_record_size(fields);
                }
            }
        }
    }
}

fn decoded_record_size(fields: &FieldMap) -> u32 {
    fields
        .iter()
        .map(|field| field.datatype().stream_size() as u32)
        .sum()
}

/// Reads a MSBT file. Sections drive their sub-codecs in file order, which is
/// recorded so the writer can reproduce it; unknown sections are preserved
/// verbatim. When the attribute layout disagrees with `attribute_config`, the
/// section falls back to the encoded path.
pub fn read_msbt(
    data: Vec<u8>,
    attribute_config: Option<&AttributeConfig>,
    tag_config: Option<&TagConfig>,
) -> Result<Msbt> {
    let mut reader = FileReader::new(data);
    let info = read_file_info(&mut reader, constants::MSBT_MAGIC)?;

    let mut labels: Vec<(u32, String)> = Vec::new();
    let mut slot_count = constants::MSBT_SLOT_COUNT;
    let mut messages: Option<Vec<MessageText>> = None;
    let mut atr1: Option<Atr1Data> = None;
    let mut uses_encoded_attributes = true;
    let mut style_indexes: Option<Vec<u32>> = None;
    let mut section_list = Vec::new();
    let mut unsupported_sections = IndexMap::new();

    for _ in 0..info.section_count {
        let header = read_section_header(&mut reader)?;
        match &header.magic {
            b"LBL1" => {
                let (read, slots) = read_labels(&mut reader)?;
                labels = read;
                slot_count = slots;
            }
            b"ATR1" => {
                let section_start = reader.position();
                let data = match attribute_config {
                    Some(config) => match read_decoded_atr1(&mut reader, config) {
                        Ok(data) => {
                            uses_encoded_attributes = false;
                            data
                        }
                        Err(Error::AttributeLayoutMismatch { .. }) => {
                            reader.seek(section_start);
                            read_encoded_atr1(&mut reader, header.size)?
                        }
                        Err(error) => return Err(error),
                    },
                    None => read_encoded_atr1(&mut reader, header.size)?,
                };
                atr1 = Some(data);
            }
            b"TXT2" => messages = Some(read_txt2(&mut reader, tag_config)?),
            b"TSY1" => style_indexes = Some(read_tsy1(&mut reader, header.size)?),
            other => {
                unsupported_sections.insert(*other, reader.read_bytes(header.size as usize)?);
            }
        }
        section_list.push(header.magic);
        seek_past_section(&mut reader, &header);
    }

    let mut entries = Vec::with_capacity(labels.len());
    for (index, name) in labels {
        let position = index as usize;
        let message = match &messages {
            Some(messages) => messages.get(position).cloned().ok_or_else(|| {
                Error::SectionConsistency(format!("label index {index} has no TXT2 message"))
            })?,
            None => MessageText::new(),
        };
        let attribute = match &atr1 {
            Some(data) => Some(data.attributes.get(position).cloned().ok_or_else(|| {
                Error::SectionConsistency(format!("label index {index} has no ATR1 record"))
            })?),
            None => None,
        };
        let style_index = match &style_indexes {
            Some(indexes) => Some(*indexes.get(position).ok_or_else(|| {
                Error::SectionConsistency(format!("label index {index} has no TSY1 record"))
            })?),
            None => None,
        };
        entries.push(MsbtEntry {
            name,
            message,
            attribute,
            style_index,
        });
    }

    let (size_per_attribute, attr_string_table) = match atr1 {
        Some(data) => (data.size_per_attribute, data.string_table),
        None => (0, None),
    };

    Ok(Msbt {
        info,
        entries,
        slot_count,
        size_per_attribute,
        attr_string_table,
        uses_encoded_attributes,
        section_list,
        unsupported_sections,
        attribute_config: attribute_config.cloned(),
        tag_config: tag_config.cloned(),
    })
}

/// Writes a MSBT file, walking the recorded section order and back-patching
/// the header file size last.
pub fn write_msbt(file: &Msbt) -> Result<Vec<u8>> {
    let mut writer = FileWriter::new(file.info.encoding, file.info.big_endian);

    let info = FileInfo {
        section_count: file.section_list.len() as u16,
        ..file.info
    };
    write_file_info(&mut writer, constants::MSBT_MAGIC, &info)?;

    for magic in &file.section_list {
        match magic {
            b"LBL1" => {
                let labels: Vec<&str> =
                    file.entries.iter().map(|entry| entry.name.as_str()).collect();
                write_section(&mut writer, b"LBL1", |writer| {
                    write_labels(writer, &labels, file.slot_count)
                })?;
            }
            b"ATR1" => {
                if file.uses_encoded_attributes {
                    let rows = collect_encoded_rows(&file.entries)?;
                    write_section(&mut writer, b"ATR1", |writer| {
                        write_encoded_atr1(
                            writer,
                            &rows,
                            file.size_per_attribute,
                            file.attr_string_table.as_deref(),
                        )
                    })?;
                } else {
                    let rows = collect_decoded_rows(&file.entries)?;
                    write_section(&mut writer, b"ATR1", |writer| {
                        write_decoded_atr1(writer, &rows, file.size_per_attribute)
                    })?;
                }
            }
            b"TXT2" => {
                let messages: Vec<&MessageText> =
                    file.entries.iter().map(|entry| &entry.message).collect();
                write_section(&mut writer, b"TXT2", |writer| {
                    write_txt2(writer, &messages)
                })?;
            }
            b"TSY1" => {
                let style_indexes = file
                    .entries
                    .iter()
                    .map(|entry| {
                        entry.style_index.ok_or_else(|| {
                            Error::SectionConsistency(format!(
                                "entry '{}' has no style index",
                                entry.name
                            ))
                        })
                    })
                    .collect::<Result<Vec<u32>>>()?;
                write_section(&mut writer, b"TSY1", |writer| {
                    write_tsy1(writer, &style_indexes)
                })?;
            }
            other => {
                let data = file.unsupported_sections.get(other).ok_or_else(|| {
                    Error::SectionConsistency(format!(
                        "section {} has no recorded payload",
                        String::from_utf8_lossy(other)
                    ))
                })?;
                write_section(&mut writer, other, |writer| writer.write_bytes(data))?;
            }
        }
    }

    patch_file_size(&mut writer)?;
    Ok(writer.into_bytes())
}

fn collect_encoded_rows(entries: &[MsbtEntry]) -> Result<Vec<&[u8]>> {
    entries
        .iter()
        .map(|entry| match &entry.attribute {
            Some(Attribute::Encoded(bytes)) => Ok(bytes.as_slice()),
            Some(Attribute::Decoded(_)) => Err(Error::SectionConsistency(format!(
                "entry '{}' holds a decoded attribute in an encoded ATR1",
                entry.name
            ))),
            None => Err(Error::SectionConsistency(format!(
                "entry '{}' has no attribute",
                entry.name
            ))),
        })
        .collect()
}

fn collect_decoded_rows(entries: &[MsbtEntry]) -> Result<Vec<&FieldMap>> {
    entries
        .iter()
        .map(|entry| match &entry.attribute {
            Some(Attribute::Decoded(fields)) => Ok(fields),
            Some(Attribute::Encoded(_)) => Err(Error::SectionConsistency(format!(
                "entry '{}' holds raw bytes in a decoded ATR1",
                entry.name
            ))),
            None => Err(Error::SectionConsistency(format!(
                "entry '{}' has no attribute",
                entry.name
            ))),
        })
        .collect()
}
