use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("command truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unknown opcode {opcode:#04x} at offset {offset:#x}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("COM_HEAD link {address:#010x} does not point into the buffer")]
    BadLink { address: u32 },

    #[error("field {field} value {value} does not fit the command encoding")]
    FieldRange { field: &'static str, value: i64 },
}
