use derive_getters::Getters;

use crate::constants;
use crate::datatype::DataType;
use crate::hash::read_labels;
use crate::info::{read_file_info, FileInfo};
use crate::result::{Error, Result};
use crate::section::{read_section_header, seek_past_section};
use crate::stream::FileReader;

/// A CLR1 color, named by the sibling CLB1 table when present.
#[derive(Debug, Clone, PartialEq)]
pub struct Color {
    pub name: Option<String>,
    pub r: u32,
    pub g: u32,
    pub b: u32,
    pub a: u32,
}

/// A SYL3 style, named by the sibling SLB1 table when present.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub name: Option<String>,
    pub region_width: u32,
    pub line_number: u32,
    pub font_index: u32,
    pub color_index: u32,
}

/// One ATI2 record, named by ALB1 and resolved against ALI2.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDefinition {
    pub name: Option<String>,
    pub datatype: DataType,
    pub offset: u32,
    pub list_index: u16,
    pub list_items: Vec<String>,
}

/// A TGG2 group with its TAG2 tags fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct TagGroup {
    pub name: String,
    pub id: u16,
    pub tags: Vec<TagInfo>,
}

/// A TAG2 record with its TGP2 parameters resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct TagInfo {
    pub name: String,
    pub parameters: Vec<ParamInfo>,
}

/// A TGP2 record; list parameters carry their TGL2 items.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub datatype: DataType,
    pub list_items: Vec<String>,
}

/// A message project file: the schema MSBTs of a title reference.
#[derive(Debug, Getters)]
pub struct Msbp {
    info: FileInfo,
    name: String,
    colors: Option<Vec<Color>>,
    attribute_definitions: Option<Vec<AttributeDefinition>>,
    tag_groups: Option<Vec<TagGroup>>,
    styles: Option<Vec<Style>>,
    source_files: Option<Vec<String>>,
}

impl Msbp {
    /// Projects carry no name of their own; callers usually derive one from
    /// the file name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

// Raw section records before cross references are resolved.
struct RawGroup {
    name: String,
    id: u16,
    tag_indexes: Vec<u16>,
}

struct RawTag {
    name: String,
    parameter_indexes: Vec<u16>,
}

struct RawParam {
    name: String,
    datatype: DataType,
    list_indexes: Vec<u16>,
}

/// Reads a MSBP file. All sections are optional; cross references between
/// them are resolved into owned definition trees once every section has been
/// consumed.
pub fn read_msbp(data: Vec<u8>) -> Result<Msbp> {
    let mut reader = FileReader::new(data);
    let info = read_file_info(&mut reader, constants::MSBP_MAGIC)?;

    let mut colors: Option<Vec<Color>> = None;
    let mut attribute_definitions: Option<Vec<AttributeDefinition>> = None;
    let mut attribute_lists: Option<Vec<Vec<String>>> = None;
    let mut raw_groups: Option<Vec<RawGroup>> = None;
    let mut raw_tags: Option<Vec<RawTag>> = None;
    let mut raw_params: Option<Vec<RawParam>> = None;
    let mut tag_lists: Option<Vec<String>> = None;
    let mut styles: Option<Vec<Style>> = None;
    let mut source_files: Option<Vec<String>> = None;

    for _ in 0..info.section_count {
        let header = read_section_header(&mut reader)?;
        match &header.magic {
            b"CLR1" => colors = Some(read_clr1(&mut reader)?),
            b"CLB1" => apply_labels(&mut reader, colors.as_mut(), "CLB1", |color, name| {
                color.name = Some(name)
            })?,
            b"ATI2" => attribute_definitions = Some(read_ati2(&mut reader)?),
            b"ALB1" => apply_labels(
                &mut reader,
                attribute_definitions.as_mut(),
                "ALB1",
                |attribute, name| attribute.name = Some(name),
            )?,
            b"ALI2" => attribute_lists = Some(read_ali2(&mut reader)?),
            b"TGG2" => raw_groups = Some(read_tgg2(&mut reader, info.version)?),
            b"TAG2" => raw_tags = Some(read_tag2(&mut reader)?),
            b"TGP2" => raw_params = Some(read_tgp2(&mut reader)?),
            b"TGL2" => tag_lists = Some(read_strings(&mut reader, false)?),
            b"SYL3" => styles = Some(read_syl3(&mut reader)?),
            b"SLB1" => apply_labels(&mut reader, styles.as_mut(), "SLB1", |style, name| {
                style.name = Some(name)
            })?,
            b"CTI1" => source_files = Some(read_strings(&mut reader, true)?),
            other => {
                return Err(Error::UnexpectedMagic {
                    expected: "a MSBP section".to_string(),
                    found: String::from_utf8_lossy(other).into_owned(),
                })
            }
        }
        seek_past_section(&mut reader, &header);
    }

    if let (Some(definitions), Some(lists)) = (attribute_definitions.as_mut(), &attribute_lists) {
        for definition in definitions.iter_mut() {
            if definition.datatype == DataType::List {
                definition.list_items = lists
                    .get(definition.list_index as usize)
                    .cloned()
                    .ok_or_else(|| {
                        Error::SectionConsistency(format!(
                            "ATI2 references ALI2 list {} of {}",
                            definition.list_index,
                            lists.len()
                        ))
                    })?;
            }
        }
    }

    let tag_groups = match raw_groups {
        Some(groups) => Some(resolve_tag_groups(
            groups,
            raw_tags.unwrap_or_default(),
            raw_params.unwrap_or_default(),
            tag_lists.unwrap_or_default(),
        )?),
        None => None,
    };

    Ok(Msbp {
        info,
        name: String::new(),
        colors,
        attribute_definitions,
        tag_groups,
        styles,
        source_files,
    })
}

/// Label sections name the records of the section they accompany.
fn apply_labels<A>(
    reader: &mut FileReader,
    items: Option<&mut Vec<A>>,
    magic: &str,
    assign: impl Fn(&mut A, String),
) -> Result<()> {
    let items = items.ok_or_else(|| {
        Error::SectionConsistency(format!("{magic} appears before the section it names"))
    })?;
    let (labels, _) = read_labels(reader)?;
    for (index, label) in labels {
        let len = items.len();
        let item = items.get_mut(index as usize).ok_or_else(|| {
            Error::SectionConsistency(format!("{magic} names item {index} of {len}"))
        })?;
        assign(item, label);
    }
    Ok(())
}

fn read_clr1(reader: &mut FileReader) -> Result<Vec<Color>> {
    let count = reader.read_u32()?;
    (0..count)
        .map(|_| {
            Ok(Color {
                name: None,
                r: reader.read_u32()?,
                g: reader.read_u32()?,
                b: reader.read_u32()?,
                a: reader.read_u32()?,
            })
        })
        .collect()
}

fn read_ati2(reader: &mut FileReader) -> Result<Vec<AttributeDefinition>> {
    let count = reader.read_u32()?;
    (0..count)
        .map(|_| {
            let type_offset = reader.position();
            let datatype = DataType::from_u8(reader.read_u8()?, type_offset)?;
            reader.skip(1);
            let list_index = reader.read_u16()?;
            let offset = reader.read_u32()?;
            Ok(AttributeDefinition {
                name: None,
                datatype,
                offset,
                list_index,
                list_items: Vec::new(),
            })
        })
        .collect()
}

fn read_ali2(reader: &mut FileReader) -> Result<Vec<Vec<String>>> {
    let list_count = reader.read_u32()?;
    let mut lists = Vec::with_capacity(list_count as usize);
    for offset in reader.read_offset_array(list_count as usize)? {
        reader.seek(offset);
        let item_count = reader.read_u32()?;
        let mut items = Vec::with_capacity(item_count as usize);
        for item_offset in reader.read_offset_array(item_count as usize)? {
            reader.seek(item_offset);
            items.push(reader.read_encoded_string()?);
        }
        lists.push(items);
    }
    Ok(lists)
}

fn read_tgg2(reader: &mut FileReader, version: u8) -> Result<Vec<RawGroup>> {
    let count = reader.read_u32()?;
    let offsets = reader.read_offset_array(count as usize)?;
    let mut groups = Vec::with_capacity(offsets.len());
    for (index, offset) in offsets.into_iter().enumerate() {
        reader.seek(offset);
        // Version 3 files derive the group id from the array position;
        // version 4 files store it and may leave gaps.
        let id = if version == 4 {
            reader.read_u16()?
        } else {
            index as u16
        };
        let tag_count = reader.read_u16()?;
        let tag_indexes = reader.read_u16_array(tag_count as usize)?;
        let name = reader.read_encoded_string()?;
        groups.push(RawGroup {
            name,
            id,
            tag_indexes,
        });
    }
    Ok(groups)
}

fn read_tag2(reader: &mut FileReader) -> Result<Vec<RawTag>> {
    let count = reader.read_u32()?;
    let offsets = reader.read_offset_array(count as usize)?;
    let mut tags = Vec::with_capacity(offsets.len());
    for offset in offsets {
        reader.seek(offset);
        let parameter_count = reader.read_u16()?;
        let parameter_indexes = reader.read_u16_array(parameter_count as usize)?;
        let name = reader.read_encoded_string()?;
        tags.push(RawTag {
            name,
            parameter_indexes,
        });
    }
    Ok(tags)
}

fn read_tgp2(reader: &mut FileReader) -> Result<Vec<RawParam>> {
    let count = reader.read_u32()?;
    let offsets = reader.read_offset_array(count as usize)?;
    let mut parameters = Vec::with_capacity(offsets.len());
    for offset in offsets {
        reader.seek(offset);
        let type_offset = reader.position();
        let datatype = DataType::from_u8(reader.read_u8()?, type_offset)?;

        if datatype != DataType::List {
            let name = reader.read_encoded_string()?;
            parameters.push(RawParam {
                name,
                datatype,
                list_indexes: Vec::new(),
            });
            continue;
        }

        reader.skip(1);
        let list_count = reader.read_u16()?;
        let list_indexes = reader.read_u16_array(list_count as usize)?;
        let name = reader.read_encoded_string()?;
        parameters.push(RawParam {
            name,
            datatype,
            list_indexes,
        });
    }
    Ok(parameters)
}

/// TGL2 carries a `u16` count with two pad bytes; CTI1 a plain `u32` count.
fn read_strings(reader: &mut FileReader, four_byte_count: bool) -> Result<Vec<String>> {
    let count = if four_byte_count {
        reader.read_u32()?
    } else {
        let count = reader.read_u16()?;
        reader.skip(2);
        u32::from(count)
    };

    let mut strings = Vec::with_capacity(count as usize);
    for offset in reader.read_offset_array(count as usize)? {
        reader.seek(offset);
        strings.push(reader.read_encoded_string()?);
    }
    Ok(strings)
}

fn read_syl3(reader: &mut FileReader) -> Result<Vec<Style>> {
    let count = reader.read_u32()?;
    (0..count)
        .map(|_| {
            Ok(Style {
                name: None,
                region_width: reader.read_u32()?,
                line_number: reader.read_u32()?,
                font_index: reader.read_u32()?,
                color_index: reader.read_u32()?,
            })
        })
        .collect()
}

fn resolve_tag_groups(
    groups: Vec<RawGroup>,
    tags: Vec<RawTag>,
    parameters: Vec<RawParam>,
    list_items: Vec<String>,
) -> Result<Vec<TagGroup>> {
    groups
        .into_iter()
        .map(|group| {
            let resolved_tags = group
                .tag_indexes
                .iter()
                .map(|&tag_index| {
                    let tag = tags.get(tag_index as usize).ok_or_else(|| {
                        Error::SectionConsistency(format!(
                            "TGG2 references TAG2 record {tag_index} of {}",
                            tags.len()
                        ))
                    })?;
                    let resolved_parameters = tag
                        .parameter_indexes
                        .iter()
                        .map(|&parameter_index| {
                            let parameter =
                                parameters.get(parameter_index as usize).ok_or_else(|| {
                                    Error::SectionConsistency(format!(
                                        "TAG2 references TGP2 record {parameter_index} of {}",
                                        parameters.len()
                                    ))
                                })?;
                            let items = parameter
                                .list_indexes
                                .iter()
                                .map(|&item_index| {
                                    list_items.get(item_index as usize).cloned().ok_or_else(
                                        || {
                                            Error::SectionConsistency(format!(
                                                "TGP2 references TGL2 item {item_index} of {}",
                                                list_items.len()
                                            ))
                                        },
                                    )
                                })
                                .collect::<Result<Vec<String>>>()?;
                            Ok(ParamInfo {
                                name: parameter.name.clone(),
                                datatype: parameter.datatype,
                                list_items: items,
                            })
                        })
                        .collect::<Result<Vec<ParamInfo>>>()?;
                    Ok(TagInfo {
                        name: tag.name.clone(),
                        parameters: resolved_parameters,
                    })
                })
                .collect::<Result<Vec<TagInfo>>>()?;
            Ok(TagGroup {
                name: group.name,
                id: group.id,
                tags: resolved_tags,
            })
        })
        .collect()
}
