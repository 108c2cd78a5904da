use crate::config::{TagConfig, TagDefinition};
use crate::constants::{TAG_CLOSE_INDICATOR, TAG_OPEN_INDICATOR, TAG_PADDING_BYTE, TAG_PADDING_HEX};
use crate::datatype::DataType;
use crate::field::{read_field, write_field, Field, FieldMap, FieldValue};
use crate::result::{Error, Result};
use crate::stream::{Encoding, FileReader, FileWriter};

/// A tag whose parameters are opaque bytes, rendered as hex pairs.
///
/// Example textual forms: `[0:3 00-00-00-FF]`, `[0:4]`, `[/1:0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTag {
    pub group_id: u16,
    pub tag_index: u16,
    /// Uppercase hex pairs, one per payload byte.
    pub parameters: Option<Vec<String>>,
    /// Set when a configured tag failed to decode and was re-read raw.
    pub is_fallback: bool,
    pub is_closing: bool,
}

impl EncodedTag {
    pub fn new(group_id: u16, tag_index: u16) -> Self {
        Self {
            group_id,
            tag_index,
            parameters: None,
            is_fallback: false,
            is_closing: false,
        }
    }

    pub fn with_parameters(group_id: u16, tag_index: u16, parameters: Vec<String>) -> Self {
        Self {
            group_id,
            tag_index,
            parameters: Some(parameters),
            is_fallback: false,
            is_closing: false,
        }
    }

    pub fn closing(group_id: u16, tag_index: u16) -> Self {
        Self {
            group_id,
            tag_index,
            parameters: None,
            is_fallback: false,
            is_closing: true,
        }
    }

    pub fn to_text(&self) -> String {
        if self.is_closing {
            return format!("[/{}:{}]", self.group_id, self.tag_index);
        }
        match &self.parameters {
            None => format!("[{}:{}]", self.group_id, self.tag_index),
            Some(parameters) => {
                let prefix = if self.is_fallback { "!" } else { "" };
                format!(
                    "[{}{}:{} {}]",
                    prefix,
                    self.group_id,
                    self.tag_index,
                    parameters.join("-")
                )
            }
        }
    }

    /// Parses the bracketed form. A user-typed hex list of odd length is
    /// padded with a trailing `CD` so the payload stays even.
    pub fn from_text(text: &str) -> Result<Self> {
        let tag = TagText::parse(text)?;

        let group_id = tag.group.parse().map_err(|_| invalid(text))?;
        let tag_index = tag.tag.parse().map_err(|_| invalid(text))?;

        if tag.is_closing {
            if !tag.rest.is_empty() {
                return Err(invalid(text));
            }
            return Ok(Self::closing(group_id, tag_index));
        }
        if tag.rest.is_empty() {
            let mut parsed = Self::new(group_id, tag_index);
            parsed.is_fallback = tag.is_fallback;
            return Ok(parsed);
        }

        let mut parameters = Vec::new();
        for piece in tag.rest.split('-') {
            let piece = piece.trim();
            if piece.len() != 2 || !piece.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid(text));
            }
            parameters.push(piece.to_ascii_uppercase());
        }
        if parameters.len() % 2 == 1 {
            parameters.push(TAG_PADDING_HEX.to_string());
        }

        let mut parsed = Self::with_parameters(group_id, tag_index, parameters);
        parsed.is_fallback = tag.is_fallback;
        Ok(parsed)
    }
}

/// A tag decoded against a config definition, rendered by name.
///
/// Example textual forms: `[System:Color r="0" g="255" b="255" a="255"]`,
/// `[System:PageBreak]`, `[/System:Color]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTag {
    definition: TagDefinition,
    pub parameters: Option<FieldMap>,
    pub is_closing: bool,
}

impl DecodedTag {
    pub fn new(definition: &TagDefinition, parameters: Option<FieldMap>) -> Self {
        Self {
            definition: definition.clone(),
            parameters,
            is_closing: false,
        }
    }

    pub fn closing(definition: &TagDefinition) -> Self {
        Self {
            definition: definition.clone(),
            parameters: None,
            is_closing: true,
        }
    }

    pub fn group_id(&self) -> u16 {
        self.definition.group_id
    }

    pub fn tag_index(&self) -> u16 {
        self.definition.tag_index
    }

    pub fn group_name(&self) -> &str {
        &self.definition.group_name
    }

    pub fn tag_name(&self) -> &str {
        &self.definition.tag_name
    }

    pub fn definition(&self) -> &TagDefinition {
        &self.definition
    }

    pub fn to_text(&self) -> String {
        let group = &self.definition.group_name;
        let tag = &self.definition.tag_name;
        if self.is_closing {
            return format!("[/{group}:{tag}]");
        }
        match &self.parameters {
            None => format!("[{group}:{tag}]"),
            Some(parameters) if parameters.is_empty() => format!("[{group}:{tag}]"),
            Some(parameters) => {
                let rendered: Vec<String> = parameters
                    .iter()
                    .map(|field| {
                        format!("{}=\"{}\"", field.name(), field.value().to_display_string())
                    })
                    .collect();
                format!("[{group}:{tag} {}]", rendered.join(" "))
            }
        }
    }

    pub fn from_text(text: &str, config: &TagConfig) -> Result<Self> {
        let tag = TagText::parse(text)?;
        if !is_identifier(&tag.group) || !is_identifier(&tag.tag) {
            return Err(invalid(text));
        }

        let definition = config.definition_by_names(&tag.group, &tag.tag)?;

        if tag.is_closing {
            if !tag.rest.is_empty() {
                return Err(invalid(text));
            }
            return Ok(Self::closing(definition));
        }

        let pairs = parse_parameter_pairs(&tag.rest).ok_or_else(|| invalid(text))?;
        if pairs.is_empty() && definition.parameters.is_empty() {
            return Ok(Self::new(definition, None));
        }

        let parameters = FieldMap::from_text_values(&pairs, &definition.parameters)?;
        Ok(Self::new(definition, Some(parameters)))
    }
}

/// A control tag embedded in message text.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlTag {
    Encoded(EncodedTag),
    Decoded(DecodedTag),
}

impl ControlTag {
    pub fn is_closing(&self) -> bool {
        match self {
            ControlTag::Encoded(tag) => tag.is_closing,
            ControlTag::Decoded(tag) => tag.is_closing,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            ControlTag::Encoded(tag) => tag.to_text(),
            ControlTag::Decoded(tag) => tag.to_text(),
        }
    }

    /// Parses either bracketed form. A group token of digits selects the
    /// encoded grammar; anything else requires a config to resolve names.
    pub fn from_text(text: &str, config: Option<&TagConfig>) -> Result<Self> {
        let tag = TagText::parse(text)?;
        if tag.group.chars().all(|c| c.is_ascii_digit()) {
            Ok(ControlTag::Encoded(EncodedTag::from_text(text)?))
        } else {
            let config = config.ok_or(Error::MissingConfig("parse decoded tags"))?;
            Ok(ControlTag::Decoded(DecodedTag::from_text(text, config)?))
        }
    }
}

/// Shared surface of both bracketed grammars: `[`, optional `/` or `!`,
/// `group:tag`, then the unparsed remainder up to `]`.
struct TagText<'a> {
    is_closing: bool,
    is_fallback: bool,
    group: &'a str,
    tag: &'a str,
    rest: &'a str,
}

impl<'a> TagText<'a> {
    fn parse(text: &'a str) -> Result<Self> {
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| invalid(text))?
            .trim();

        let (is_closing, inner) = match inner.strip_prefix('/') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, inner),
        };
        let (is_fallback, inner) = match inner.strip_prefix('!') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, inner),
        };

        let (group, after_group) = inner.split_once(':').ok_or_else(|| invalid(text))?;
        let after_group = after_group.trim_start();
        let (tag, rest) = match after_group.find(char::is_whitespace) {
            Some(split) => (&after_group[..split], after_group[split..].trim()),
            None => (after_group, ""),
        };

        Ok(Self {
            is_closing,
            is_fallback,
            group: group.trim(),
            tag,
            rest,
        })
    }
}

fn invalid(text: &str) -> Error {
    Error::InvalidTagFormat {
        text: text.to_string(),
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(first) if first.is_alphabetic())
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Parses `key="value"` pairs separated by whitespace. Returns `None` on
/// malformed input.
fn parse_parameter_pairs(text: &str) -> Option<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let eq = rest.find('=')?;
        let name = rest[..eq].trim();
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        let after = rest[eq + 1..].strip_prefix('"')?;
        let close = after.find('"')?;
        pairs.push((name.to_string(), after[..close].to_string()));
        rest = after[close + 1..].trim_start();
    }
    Some(pairs)
}

/// The opening and closing indicator code units in the file encoding and
/// endianness.
pub fn tag_indicators(encoding: Encoding, big_endian: bool) -> (Vec<u8>, Vec<u8>) {
    let unit = |value: u8| {
        let mut bytes = vec![0u8; encoding.width()];
        if big_endian {
            bytes[encoding.width() - 1] = value;
        } else {
            bytes[0] = value;
        }
        bytes
    };
    (unit(TAG_OPEN_INDICATOR), unit(TAG_CLOSE_INDICATOR))
}

/// Reads the tag body following an indicator. The indicator itself has been
/// consumed by the caller; `is_closing` records which one it was.
pub fn read_tag(
    reader: &mut FileReader,
    config: Option<&TagConfig>,
    is_closing: bool,
) -> Result<ControlTag> {
    let group_id = reader.read_u16()?;
    let tag_index = reader.read_u16()?;

    let definition = config.and_then(|c| c.definition_by_indexes(group_id, tag_index));
    let Some(definition) = definition else {
        return Ok(ControlTag::Encoded(read_encoded_body(
            reader, group_id, tag_index, is_closing, false,
        )?));
    };

    // Closing tags carry no parameter size.
    if is_closing {
        return Ok(ControlTag::Decoded(DecodedTag::closing(definition)));
    }

    let body_start = reader.position();
    let parameter_size = reader.read_u16()?;
    let end = reader.position() + u64::from(parameter_size);

    if parameter_size == 0 {
        return Ok(ControlTag::Decoded(DecodedTag::new(definition, None)));
    }

    if definition.parameters.is_empty() {
        // The config names this tag but gives no parameter layout; keep the
        // payload as hex so it survives a rewrite.
        let parameters = read_hex_parameters(reader, parameter_size)?;
        return Ok(ControlTag::Encoded(EncodedTag::with_parameters(
            group_id, tag_index, parameters,
        )));
    }

    match read_decoded_parameters(reader, definition) {
        Ok(parameters) => {
            reader.seek(end);
            Ok(ControlTag::Decoded(DecodedTag::new(
                definition,
                Some(parameters),
            )))
        }
        Err(error) => {
            let suppress = config.is_some_and(|c| c.suppress_tag_errors);
            if !suppress {
                return Err(error);
            }
            reader.seek(body_start);
            Ok(ControlTag::Encoded(read_encoded_body(
                reader, group_id, tag_index, false, true,
            )?))
        }
    }
}

fn read_encoded_body(
    reader: &mut FileReader,
    group_id: u16,
    tag_index: u16,
    is_closing: bool,
    is_fallback: bool,
) -> Result<EncodedTag> {
    if is_closing {
        return Ok(EncodedTag::closing(group_id, tag_index));
    }
    let parameter_size = reader.read_u16()?;
    if parameter_size == 0 {
        let mut tag = EncodedTag::new(group_id, tag_index);
        tag.is_fallback = is_fallback;
        return Ok(tag);
    }
    let parameters = read_hex_parameters(reader, parameter_size)?;
    let mut tag = EncodedTag::with_parameters(group_id, tag_index, parameters);
    tag.is_fallback = is_fallback;
    Ok(tag)
}

fn read_hex_parameters(reader: &mut FileReader, parameter_size: u16) -> Result<Vec<String>> {
    let bytes = reader.read_bytes(parameter_size as usize)?;
    Ok(bytes.iter().map(|byte| format!("{byte:02X}")).collect())
}

fn read_decoded_parameters(
    reader: &mut FileReader,
    definition: &TagDefinition,
) -> Result<FieldMap> {
    let mut parameters = FieldMap::new();
    for parameter in &definition.parameters {
        let offset = reader.position();
        let field = if parameter.datatype == DataType::String {
            reader
                .read_len_encoded_string()
                .and_then(|value| Field::new(FieldValue::String(value), parameter))
        } else {
            read_field(reader, parameter)
        };
        let field = field.map_err(|source| Error::TagReadingError {
            group: definition.group_name.clone(),
            tag: definition.tag_name.clone(),
            parameter: parameter.name.clone(),
            offset,
            source: Box::new(source),
        })?;
        parameters.insert(field);
    }
    Ok(parameters)
}

/// Writes a tag: indicator, `u16` group and tag ids, then the parameter
/// payload for opening tags.
pub fn write_tag(writer: &mut FileWriter, tag: &ControlTag) -> Result<()> {
    let (open, close) = tag_indicators(writer.encoding, writer.big_endian);
    writer.write_bytes(if tag.is_closing() { &close } else { &open })?;

    match tag {
        ControlTag::Encoded(tag) => {
            writer.write_u16(tag.group_id)?;
            writer.write_u16(tag.tag_index)?;
            if tag.is_closing {
                return Ok(());
            }
            match &tag.parameters {
                None => writer.write_u16(0),
                Some(parameters) => write_hex_parameters(writer, parameters),
            }
        }
        ControlTag::Decoded(tag) => {
            writer.write_u16(tag.group_id())?;
            writer.write_u16(tag.tag_index())?;
            if tag.is_closing {
                return Ok(());
            }
            match &tag.parameters {
                None => writer.write_u16(0),
                Some(parameters) => write_decoded_parameters(writer, tag, parameters),
            }
        }
    }
}

fn write_hex_parameters(writer: &mut FileWriter, parameters: &[String]) -> Result<()> {
    writer.write_u16(parameters.len() as u16)?;
    for parameter in parameters {
        let byte = hex::decode(parameter).map_err(|_| Error::InvalidTagFormat {
            text: parameter.clone(),
        })?;
        writer.write_bytes(&byte)?;
    }
    Ok(())
}

/// Writes decoded parameters with the 0xCD padding rule: when a STRING
/// parameter exists and the bytes preceding the first one are odd, a single
/// pad byte goes right before its length field (the reader's width alignment
/// skips it); with no STRING parameters an odd payload gets the pad at the
/// end. Single-byte encodings never pad.
fn write_decoded_parameters(
    writer: &mut FileWriter,
    tag: &DecodedTag,
    parameters: &FieldMap,
) -> Result<()> {
    let encoding = writer.encoding;
    let pad_allowed = encoding.width() > 1;

    let mut total = 0usize;
    let mut prefix = 0usize;
    let mut has_string = false;
    for field in parameters.iter() {
        if field.datatype() == DataType::String {
            if !has_string {
                has_string = true;
                prefix = total;
            }
            let value = field.value().as_str().unwrap_or_default();
            total += 2 + encoding.encoded_len(value);
        } else {
            total += field.datatype().stream_size();
        }
    }

    let pad_before_string = pad_allowed && has_string && prefix % 2 == 1;
    let pad_at_end = pad_allowed && !has_string && total % 2 == 1;
    let parameter_size = total + usize::from(pad_before_string || pad_at_end);

    writer.write_u16(parameter_size as u16)?;

    let mut pad_pending = pad_before_string;
    for field in parameters.iter() {
        let offset = writer.position();
        let written = if field.datatype() == DataType::String {
            if pad_pending {
                writer.write_u8(TAG_PADDING_BYTE)?;
                pad_pending = false;
            }
            let value = field.value().as_str().unwrap_or_default();
            writer.write_len_encoded_string(value)
        } else {
            write_field(writer, field)
        };
        written.map_err(|source| Error::TagWritingError {
            group: tag.group_name().to_string(),
            tag: tag.tag_name().to_string(),
            parameter: field.name().to_string(),
            offset,
            source: Box::new(source),
        })?;
    }

    if pad_at_end {
        writer.write_u8(TAG_PADDING_BYTE)?;
    }
    Ok(())
}
