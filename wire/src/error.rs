use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("Buffer underflow: needed {needed} byte(s) at offset {offset}, {available} available")]
    Underflow {
        needed:    usize,
        offset:    usize,
        available: usize,
    },

    #[error("Invalid bool constructor 0x{0:08x}")]
    InvalidBool(u32),

    #[error("Byte string of {0} bytes exceeds the TL length limit")]
    LengthOverflow(usize),

    #[error("Can't parse magic 0x{tag:08x} in {type_name}")]
    UnrecognizedConstructor {
        tag:       u32,
        type_name: String,
    },

    #[error("Wrong vector magic 0x{found:08x} (expected 0x{expected:08x}) in {type_name}")]
    VectorTagMismatch {
        found:     u32,
        expected:  u32,
        type_name: String,
    },
}
