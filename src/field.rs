use indexmap::IndexMap;

use crate::datatype::DataType;
use crate::result::{Error, Result};
use crate::stream::{FileReader, FileWriter};

/// Definition of one typed value, as supplied by a TitleConfig or resolved
/// from an MSBP.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDefinition {
    pub name: String,
    pub description: String,
    pub datatype: DataType,
    pub list_items: Vec<String>,
}

impl ValueDefinition {
    pub fn new(name: impl Into<String>, datatype: DataType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            datatype,
            list_items: Vec::new(),
        }
    }

    pub fn with_list(name: impl Into<String>, list_items: Vec<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            datatype: DataType::List,
            list_items,
        }
    }
}

/// A typed value as it travels through attribute records and tag parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Float32(f32),
    String(String),
    /// The selected item of a LIST definition; stored as a `u8` index into the
    /// definition's `list_items`.
    List(String),
    Bool(bool),
    Byte(u8),
}

impl FieldValue {
    pub fn datatype(&self) -> DataType {
        match self {
            FieldValue::Uint8(_) => DataType::Uint8,
            FieldValue::Uint16(_) => DataType::Uint16,
            FieldValue::Uint32(_) => DataType::Uint32,
            FieldValue::Int8(_) => DataType::Int8,
            FieldValue::Int16(_) => DataType::Int16,
            FieldValue::Int32(_) => DataType::Int32,
            FieldValue::Float32(_) => DataType::Float32,
            FieldValue::String(_) => DataType::String,
            FieldValue::List(_) => DataType::List,
            FieldValue::Bool(_) => DataType::Bool,
            FieldValue::Byte(_) => DataType::Bytes,
        }
    }

    /// Canonical textual form: decimal for numbers, `true`/`false` for bools,
    /// hex for bytes, the item itself for lists and strings.
    pub fn to_display_string(&self) -> String {
        match self {
            FieldValue::Uint8(v) => v.to_string(),
            FieldValue::Uint16(v) => v.to_string(),
            FieldValue::Uint32(v) => v.to_string(),
            FieldValue::Int8(v) => v.to_string(),
            FieldValue::Int16(v) => v.to_string(),
            FieldValue::Int32(v) => v.to_string(),
            FieldValue::Float32(v) => v.to_string(),
            FieldValue::String(v) | FieldValue::List(v) => v.clone(),
            FieldValue::Bool(v) => v.to_string(),
            FieldValue::Byte(v) => format!("{v:02x}"),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(v) | FieldValue::List(v) => Some(v),
            _ => None,
        }
    }
}

/// A [`FieldValue`] bound to the [`ValueDefinition`] that produced it. The
/// definition is a small owned copy, so a field stays valid independent of
/// the config it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    value: FieldValue,
    definition: ValueDefinition,
}

impl Field {
    pub fn new(value: FieldValue, definition: &ValueDefinition) -> Result<Self> {
        verify_value(&value, definition)?;
        Ok(Self {
            value,
            definition: definition.clone(),
        })
    }

    /// Builds a field from the canonical textual form of its datatype.
    pub fn from_text(text: &str, definition: &ValueDefinition) -> Result<Self> {
        let value = parse_value(text, definition)?;
        Self::new(value, definition)
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn datatype(&self) -> DataType {
        self.definition.datatype
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub fn definition(&self) -> &ValueDefinition {
        &self.definition
    }

    pub fn list_items(&self) -> &[String] {
        &self.definition.list_items
    }

    /// Replaces the value, revalidating it against the bound definition.
    pub fn set_value(&mut self, value: FieldValue) -> Result<()> {
        verify_value(&value, &self.definition)?;
        self.value = value;
        Ok(())
    }
}

fn verify_value(value: &FieldValue, definition: &ValueDefinition) -> Result<()> {
    if value.datatype() != definition.datatype {
        return Err(Error::WrongValueType {
            field: definition.name.clone(),
            expected: definition.datatype.as_str(),
        });
    }
    match value {
        FieldValue::Float32(v) if !v.is_finite() => Err(Error::ValueOutOfRange {
            field: definition.name.clone(),
            value: v.to_string(),
            min: f32::MIN.to_string(),
            max: f32::MAX.to_string(),
        }),
        FieldValue::List(v) if !definition.list_items.contains(v) => Err(Error::ValueNotInList {
            field: definition.name.clone(),
            value: v.clone(),
        }),
        _ => Ok(()),
    }
}

fn parse_value(text: &str, definition: &ValueDefinition) -> Result<FieldValue> {
    let datatype = definition.datatype;
    match datatype {
        DataType::String => Ok(FieldValue::String(text.to_string())),
        DataType::List => Ok(FieldValue::List(text.to_string())),
        DataType::Bool => match text.trim() {
            "true" => Ok(FieldValue::Bool(true)),
            "false" => Ok(FieldValue::Bool(false)),
            _ => Err(Error::WrongValueType {
                field: definition.name.clone(),
                expected: "true or false",
            }),
        },
        DataType::Bytes => {
            let bytes = hex::decode(text.trim()).map_err(|_| Error::WrongValueType {
                field: definition.name.clone(),
                expected: "a hex byte",
            })?;
            if bytes.len() != 1 {
                return Err(Error::InvalidByteLength {
                    length: bytes.len(),
                });
            }
            Ok(FieldValue::Byte(bytes[0]))
        }
        DataType::Float32 => {
            let value: f32 = text.trim().parse().map_err(|_| Error::WrongValueType {
                field: definition.name.clone(),
                expected: "a float",
            })?;
            Ok(FieldValue::Float32(value))
        }
        _ => parse_int(text, definition),
    }
}

fn parse_int(text: &str, definition: &ValueDefinition) -> Result<FieldValue> {
    let parsed: i128 = text.trim().parse().map_err(|_| Error::WrongValueType {
        field: definition.name.clone(),
        expected: "an integer",
    })?;

    let datatype = definition.datatype;
    let bits = datatype.stream_size() as u32 * 8;
    let (min, max) = if datatype.signed() {
        (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
    } else {
        (0, (1i128 << bits) - 1)
    };
    if parsed < min || parsed > max {
        return Err(Error::ValueOutOfRange {
            field: definition.name.clone(),
            value: parsed.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        });
    }

    Ok(match datatype {
        DataType::Uint8 => FieldValue::Uint8(parsed as u8),
        DataType::Uint16 => FieldValue::Uint16(parsed as u16),
        DataType::Uint32 => FieldValue::Uint32(parsed as u32),
        DataType::Int8 => FieldValue::Int8(parsed as i8),
        DataType::Int16 => FieldValue::Int16(parsed as i16),
        _ => FieldValue::Int32(parsed as i32),
    })
}

/// Reads one inline field. STRING is excluded since its layout differs
/// between attribute records (pool offsets) and tag parameters (length
/// prefixed); the section codecs handle it themselves.
pub fn read_field(reader: &mut FileReader, definition: &ValueDefinition) -> Result<Field> {
    let value = match definition.datatype {
        DataType::Uint8 => FieldValue::Uint8(reader.read_u8()?),
        DataType::Uint16 => FieldValue::Uint16(reader.read_u16()?),
        DataType::Uint32 => FieldValue::Uint32(reader.read_u32()?),
        DataType::Int8 => FieldValue::Int8(reader.read_i8()?),
        DataType::Int16 => FieldValue::Int16(reader.read_i16()?),
        DataType::Int32 => FieldValue::Int32(reader.read_i32()?),
        DataType::Float32 => FieldValue::Float32(reader.read_f32()?),
        DataType::List => {
            let index = reader.read_u8()?;
            let item = definition
                .list_items
                .get(index as usize)
                .ok_or_else(|| Error::ValueNotInList {
                    field: definition.name.clone(),
                    value: index.to_string(),
                })?;
            FieldValue::List(item.clone())
        }
        DataType::Bool => FieldValue::Bool(reader.read_u8()? != 0),
        DataType::Bytes => FieldValue::Byte(reader.read_u8()?),
        DataType::String => {
            return Err(Error::WrongValueType {
                field: definition.name.clone(),
                expected: "an inline value",
            })
        }
    };
    Ok(Field {
        value,
        definition: definition.clone(),
    })
}

/// Writes one inline field; the STRING exclusion of [`read_field`] applies.
pub fn write_field(writer: &mut FileWriter, field: &Field) -> Result<()> {
    match &field.value {
        FieldValue::Uint8(v) => writer.write_u8(*v),
        FieldValue::Uint16(v) => writer.write_u16(*v),
        FieldValue::Uint32(v) => writer.write_u32(*v),
        FieldValue::Int8(v) => writer.write_i8(*v),
        FieldValue::Int16(v) => writer.write_i16(*v),
        FieldValue::Int32(v) => writer.write_i32(*v),
        FieldValue::Float32(v) => writer.write_f32(*v),
        FieldValue::List(v) => {
            let index = field
                .definition
                .list_items
                .iter()
                .position(|item| item == v)
                .ok_or_else(|| Error::ValueNotInList {
                    field: field.definition.name.clone(),
                    value: v.clone(),
                })?;
            writer.write_u8(index as u8)
        }
        FieldValue::Bool(v) => writer.write_u8(u8::from(*v)),
        FieldValue::Byte(v) => writer.write_u8(*v),
        FieldValue::String(_) => Err(Error::WrongValueType {
            field: field.definition.name.clone(),
            expected: "an inline value",
        }),
    }
}

/// Insertion-ordered mapping from field name to [`Field`]; iteration order is
/// the definition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    fields: IndexMap<String, Field>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: Field) {
        self.fields.insert(field.name().to_string(), field);
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Replaces the value of an existing field, revalidated against its
    /// definition.
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let field = self
            .fields
            .get_mut(name)
            .ok_or_else(|| Error::UnknownLabel(name.to_string()))?;
        field.set_value(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds a map from `(name, value)` pairs, one per definition, in
    /// definition order.
    pub fn from_values(
        values: &[(&str, FieldValue)],
        definitions: &[ValueDefinition],
    ) -> Result<Self> {
        let mut map = Self::new();
        for definition in definitions {
            let (_, value) = values
                .iter()
                .find(|(name, _)| *name == definition.name)
                .ok_or_else(|| Error::UnknownLabel(definition.name.clone()))?;
            map.insert(Field::new(value.clone(), definition)?);
        }
        Ok(map)
    }

    /// Builds a map from textual `(name, value)` pairs, in definition order.
    pub fn from_text_values(
        values: &[(String, String)],
        definitions: &[ValueDefinition],
    ) -> Result<Self> {
        let mut map = Self::new();
        for definition in definitions {
            let (_, value) = values
                .iter()
                .find(|(name, _)| *name == definition.name)
                .ok_or_else(|| Error::UnknownLabel(definition.name.clone()))?;
            map.insert(Field::from_text(value, definition)?);
        }
        Ok(map)
    }
}

impl<'a> IntoIterator for &'a FieldMap {
    type Item = &'a Field;
    type IntoIter = indexmap::map::Values<'a, String, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.values()
    }
}
