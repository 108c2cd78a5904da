use thiserror::Error;

pub type Result<A, E = Error> = std::result::Result<A, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    IoFailed(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    EncodingFailed(#[from] declio::Error),
    #[error("unexpected magic: expected {expected}, got {found}")]
    UnexpectedMagic { expected: String, found: String },
    #[error("file size field says {expected} bytes, stream holds {actual}")]
    MisalignedSize { expected: u32, actual: u64 },
    #[error("stream ended early at offset {offset:#x}")]
    TruncatedStream { offset: u64 },
    #[error("invalid {encoding} data at offset {offset:#x}")]
    DecodeError { encoding: &'static str, offset: u64 },
    #[error("unknown datatype '{datatype}' at offset {offset:#x}")]
    UnknownDataType { datatype: String, offset: u64 },
    #[error("value {value} for field '{field}' is out of range ({min}..={max})")]
    ValueOutOfRange {
        field: String,
        value: String,
        min: String,
        max: String,
    },
    #[error("value '{value}' for field '{field}' is not one of its list items")]
    ValueNotInList { field: String, value: String },
    #[error("byte fields hold exactly one byte, got {length}")]
    InvalidByteLength { length: usize },
    #[error("field '{field}' expects {expected}")]
    WrongValueType { field: String, expected: &'static str },
    #[error("tag [{group}:{tag}] is not defined by the config")]
    UnknownTag { group: String, tag: String },
    #[error("invalid control tag syntax: '{text}'")]
    InvalidTagFormat { text: String },
    #[error("failed reading tag [{group}:{tag}] parameter '{parameter}' at offset {offset:#x}: {source}")]
    TagReadingError {
        group: String,
        tag: String,
        parameter: String,
        offset: u64,
        source: Box<Error>,
    },
    #[error("failed writing tag [{group}:{tag}] parameter '{parameter}' at offset {offset:#x}: {source}")]
    TagWritingError {
        group: String,
        tag: String,
        parameter: String,
        offset: u64,
        source: Box<Error>,
    },
    #[error("attribute config computes {computed} bytes per record, section header says {declared}")]
    AttributeLayoutMismatch { computed: u32, declared: u32 },
    #[error("a config is required to {0}")]
    MissingConfig(&'static str),
    #[error("label '{0}' already exists")]
    DuplicateLabel(String),
    #[error("'{0}' does not exist")]
    UnknownLabel(String),
    #[error("section consistency violated: {0}")]
    SectionConsistency(String),
}
