//! SDK for Nintendo's LibMessageStudio binary files: MSBT message archives
//! and the MSBP project files that describe their schemas.
//!
//! Reading is driven by an optional, caller-supplied title config; without
//! one, attributes stay opaque byte records and tags render as hex. Files an
//! application merely edits round-trip byte for byte, including unknown
//! sections, label table slot counts and alignment padding.

pub mod attributes;
pub mod config;
pub mod constants;
pub mod datatype;
pub mod field;
pub mod hash;
pub mod info;
pub mod message;
pub mod msbt;
pub mod project;
pub mod result;
pub mod section;
pub mod stream;
pub mod tag;
pub mod text;

pub use attributes::Attribute;
pub use config::{AttributeConfig, TagConfig, TagDefinition, TitleConfig};
pub use datatype::DataType;
pub use field::{Field, FieldMap, FieldValue, ValueDefinition};
pub use info::FileInfo;
pub use message::{MessagePart, MessageText};
pub use msbt::{read_msbt, write_msbt, Msbt, MsbtEntry};
pub use project::{read_msbp, Msbp};
pub use result::{Error, Result};
pub use stream::Encoding;
pub use tag::{ControlTag, DecodedTag, EncodedTag};
