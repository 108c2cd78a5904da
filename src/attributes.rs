use crate::config::AttributeConfig;
use crate::datatype::DataType;
use crate::field::{read_field, write_field, Field, FieldMap, FieldValue};
use crate::result::{Error, Result};
use crate::stream::{FileReader, FileWriter};

/// One message's attribute record.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// Opaque record bytes; offsets inside them point into the section's
    /// preserved string table.
    Encoded(Vec<u8>),
    /// Schema-driven fields decoded against an [`AttributeConfig`].
    Decoded(FieldMap),
}

/// Payload of an ATR1 section.
#[derive(Debug, Clone)]
pub struct Atr1Data {
    pub attributes: Vec<Attribute>,
    pub size_per_attribute: u32,
    /// Trailing section bytes past the fixed records, preserved verbatim so
    /// encoded string offsets keep resolving after a rewrite.
    pub string_table: Option<Vec<u8>>,
}

/// Reads the section without a config: opaque rows plus the verbatim string
/// table.
pub fn read_encoded_atr1(reader: &mut FileReader, section_size: u32) -> Result<Atr1Data> {
    let section_end = reader.position() + u64::from(section_size);

    let attribute_count = reader.read_u32()?;
    let size_per_attribute = reader.read_u32()?;

    let mut attributes = Vec::with_capacity(attribute_count as usize);
    for _ in 0..attribute_count {
        attributes.push(Attribute::Encoded(
            reader.read_bytes(size_per_attribute as usize)?,
        ));
    }

    let fixed_end = 8 + u64::from(size_per_attribute) * u64::from(attribute_count);
    let string_table = if u64::from(section_size) > fixed_end {
        Some(reader.read_bytes((section_end - reader.position()) as usize)?)
    } else {
        None
    };

    Ok(Atr1Data {
        attributes,
        size_per_attribute,
        string_table,
    })
}

/// Reads the section against a config. STRING fields hold a `u32` offset
/// relative to the section payload start; the string itself is NUL terminated
/// in the out-of-band pool.
pub fn read_decoded_atr1(reader: &mut FileReader, config: &AttributeConfig) -> Result<Atr1Data> {
    let section_start = reader.position();

    let attribute_count = reader.read_u32()?;
    let size_per_attribute = reader.read_u32()?;

    let computed = config.record_size();
    if computed != size_per_attribute {
        return Err(Error::AttributeLayoutMismatch {
            computed,
            declared: size_per_attribute,
        });
    }

    let records_start = reader.position();
    let mut attributes = Vec::with_capacity(attribute_count as usize);
    for index in 0..attribute_count {
        reader.seek(records_start + u64::from(index) * u64::from(size_per_attribute));

        let mut fields = FieldMap::new();
        for definition in &config.definitions {
            let field = if definition.datatype == DataType::String {
                let next = reader.position() + 4;
                let offset = reader.read_u32()?;
                reader.seek(section_start + u64::from(offset));
                let value = reader.read_encoded_string()?;
                reader.seek(next);
                Field::new(FieldValue::String(value), definition)?
            } else {
                read_field(reader, definition)?
            };
            fields.insert(field);
        }
        attributes.push(Attribute::Decoded(fields));
    }

    Ok(Atr1Data {
        attributes,
        size_per_attribute,
        string_table: None,
    })
}

pub fn write_encoded_atr1(
    writer: &mut FileWriter,
    rows: &[&[u8]],
    size_per_attribute: u32,
    string_table: Option<&[u8]>,
) -> Result<()> {
    writer.write_u32(rows.len() as u32)?;
    writer.write_u32(if rows.is_empty() { 0 } else { size_per_attribute })?;

    for row in rows {
        writer.write_bytes(row)?;
    }

    if let Some(table) = string_table {
        writer.write_bytes(table)?;
    }
    Ok(())
}

/// Writes fixed rows first, with each STRING cell holding the offset its
/// value will land at, then appends the string pool in field order.
pub fn write_decoded_atr1(
    writer: &mut FileWriter,
    rows: &[&FieldMap],
    size_per_attribute: u32,
) -> Result<()> {
    writer.write_u32(rows.len() as u32)?;
    writer.write_u32(size_per_attribute)?;

    let width = writer.encoding.width() as u32;
    let mut string_offset = 8 + size_per_attribute * rows.len() as u32;
    let mut pool: Vec<&str> = Vec::new();

    for row in rows {
        for field in row.iter() {
            match field.value() {
                FieldValue::String(value) => {
                    writer.write_u32(string_offset)?;
                    string_offset += writer.encoding.encoded_len(value) as u32 + width;
                    pool.push(value.as_str());
                }
                _ => write_field(writer, field)?,
            }
        }
    }

    for value in pool {
        writer.write_encoded_string(value, true)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::DataType;
    use crate::field::ValueDefinition;
    use crate::stream::Encoding;

    fn config() -> AttributeConfig {
        AttributeConfig::new(
            "test",
            vec![
                ValueDefinition::new("kind", DataType::Uint8),
                ValueDefinition::new("sound", DataType::String),
            ],
        )
    }

    #[test]
    fn layout_mismatch_is_reported() {
        let mut writer = FileWriter::new(Encoding::Utf16, false);
        writer.write_u32(1).unwrap();
        writer.write_u32(12).unwrap();
        writer.write_bytes(&[0; 12]).unwrap();

        let mut reader = FileReader::new(writer.into_bytes());
        reader.encoding = Encoding::Utf16;
        assert!(matches!(
            read_decoded_atr1(&mut reader, &config()),
            Err(Error::AttributeLayoutMismatch {
                computed: 5,
                declared: 12
            })
        ));
    }

    #[test]
    fn decoded_records_roundtrip() {
        let config = config();
        let fields = FieldMap::from_values(
            &[
                ("kind", FieldValue::Uint8(2)),
                ("sound", FieldValue::String("SE_OK".to_string())),
            ],
            &config.definitions,
        )
        .unwrap();

        let mut writer = FileWriter::new(Encoding::Utf16, false);
        write_decoded_atr1(&mut writer, &[&fields], config.record_size()).unwrap();

        let mut reader = FileReader::new(writer.into_bytes());
        reader.encoding = Encoding::Utf16;
        let data = read_decoded_atr1(&mut reader, &config).unwrap();
        assert_eq!(data.attributes, vec![Attribute::Decoded(fields)]);
    }
}
