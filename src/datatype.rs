use std::str::FromStr;

use crate::result::{Error, Result};

/// Datatype of an attribute field or tag parameter.
///
/// Values 0 through 9 appear in streams; `Bool` and `Bytes` are interface
/// types a config may use to reinterpret single-byte encoded values. Value 7
/// is reserved and has never been observed in a shipped title, so decoding
/// refuses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Uint8,
    Uint16,
    Uint32,
    Int8,
    Int16,
    Int32,
    Float32,
    String,
    List,
    Bool,
    Bytes,
}

impl DataType {
    pub fn from_u8(value: u8, offset: u64) -> Result<Self> {
        match value {
            0 => Ok(DataType::Uint8),
            1 => Ok(DataType::Uint16),
            2 => Ok(DataType::Uint32),
            3 => Ok(DataType::Int8),
            4 => Ok(DataType::Int16),
            5 => Ok(DataType::Int32),
            6 => Ok(DataType::Float32),
            8 => Ok(DataType::String),
            9 => Ok(DataType::List),
            other => Err(Error::UnknownDataType {
                datatype: other.to_string(),
                offset,
            }),
        }
    }

    /// Bytes the value occupies inline in a stream. `String` is the size of
    /// the `u32` pool offset an attribute record stores; tag parameters store
    /// strings length-prefixed instead and never consult this.
    pub fn stream_size(self) -> usize {
        match self {
            DataType::Uint8 | DataType::Int8 => 1,
            DataType::Uint16 | DataType::Int16 => 2,
            DataType::Uint32 | DataType::Int32 | DataType::Float32 | DataType::String => 4,
            DataType::List | DataType::Bool | DataType::Bytes => 1,
        }
    }

    pub fn signed(self) -> bool {
        matches!(self, DataType::Int8 | DataType::Int16 | DataType::Int32)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Uint8 => "uint8",
            DataType::Uint16 => "uint16",
            DataType::Uint32 => "uint32",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Float32 => "float32",
            DataType::String => "string",
            DataType::List => "list",
            DataType::Bool => "bool",
            DataType::Bytes => "byte",
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "uint8" | "u8" => Ok(DataType::Uint8),
            "uint16" | "u16" => Ok(DataType::Uint16),
            "uint32" | "u32" => Ok(DataType::Uint32),
            "int8" | "i8" => Ok(DataType::Int8),
            "int16" | "i16" => Ok(DataType::Int16),
            "int32" | "i32" => Ok(DataType::Int32),
            "float32" | "f32" => Ok(DataType::Float32),
            "string" | "str" => Ok(DataType::String),
            "list" => Ok(DataType::List),
            "bool" => Ok(DataType::Bool),
            "byte" | "bytes" => Ok(DataType::Bytes),
            other => Err(Error::UnknownDataType {
                datatype: other.to_string(),
                offset: 0,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn reserved_type_seven_is_refused() {
        assert_matches!(
            DataType::from_u8(7, 0x40),
            Err(Error::UnknownDataType { offset: 0x40, .. })
        );
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!("u8".parse::<DataType>().unwrap(), DataType::Uint8);
        assert_eq!("str".parse::<DataType>().unwrap(), DataType::String);
        assert_eq!("float32".parse::<DataType>().unwrap(), DataType::Float32);
    }
}
