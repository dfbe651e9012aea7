use std::fmt;

use crate::{bb::ByteBufferMut, error::WireError};

/// Implemented by every type the Rust renderer emits. `serialize_to_stream`
/// writes the constructor id followed by the fields.
pub trait TlObject: fmt::Debug {
    fn constructor_id(&self) -> u32;
    fn serialize_to_stream(&self, stream: &mut ByteBufferMut) -> Result<(), WireError>;

    /// The serialized form on its own. Generated code compares these to tell
    /// a nested object apart from its default.
    fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        let mut stream = ByteBufferMut::new();
        self.serialize_to_stream(&mut stream)?;
        Ok(stream.data())
    }
}

impl<T: TlObject + ?Sized> TlObject for Box<T> {
    fn constructor_id(&self) -> u32 {
        (**self).constructor_id()
    }

    fn serialize_to_stream(&self, stream: &mut ByteBufferMut) -> Result<(), WireError> {
        (**self).serialize_to_stream(stream)
    }
}
