pub const MSBT_MAGIC: &[u8; 8] = b"MsgStdBn";
pub const MSBP_MAGIC: &[u8; 8] = b"MsgPrjBn";

pub const BOM_BIG: [u8; 2] = [0xFE, 0xFF];
pub const BOM_LITTLE: [u8; 2] = [0xFF, 0xFE];

pub const FILE_SIZE_OFFSET: u64 = 0x12;
pub const FIRST_SECTION_OFFSET: u64 = 0x20;

pub const SECTION_ALIGNMENT: u64 = 16;
pub const SECTION_PADDING_BYTE: u8 = 0xAB;

pub const TAG_OPEN_INDICATOR: u8 = 0x0E;
pub const TAG_CLOSE_INDICATOR: u8 = 0x0F;
pub const TAG_PADDING_BYTE: u8 = 0xCD;
pub const TAG_PADDING_HEX: &str = "CD";

pub const MSBT_SLOT_COUNT: u32 = 101;
pub const MSBP_SLOT_COUNT: u32 = 29;
pub const STYLE_SLOT_COUNT: u32 = 59;

pub const HASH_MULTIPLIER: u32 = 0x492;
