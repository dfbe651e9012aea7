//! Runtime helpers for the TL binary wire format: little-endian 32/64-bit
//! integers, bools encoded as constructor ids, length-prefixed byte strings
//! padded to four bytes, and framed vectors.
//!
//! ```
//! use gram_tl_wire::*;
//!
//! let mut out = ByteBufferMut::new();
//! out.write_int32(-2);
//! out.write_string("abc").unwrap();
//! out.write_bool(true);
//! let bytes = out.data();
//!
//! let mut bb = ByteBuffer::new(&bytes);
//! assert_eq!(bb.read_int32(), Ok(-2));
//! assert_eq!(bb.read_string().unwrap(), "abc");
//! assert_eq!(bb.read_bool(), Ok(true));
//! ```

pub mod bb;
pub mod error;
pub mod traits;
pub mod value;

pub use bb::*;
pub use error::WireError;
pub use traits::TlObject;
pub use value::*;

/// Constructor id of `boolTrue`.
pub const BOOL_TRUE: u32 = 0x997275b5;
/// Constructor id of `boolFalse`.
pub const BOOL_FALSE: u32 = 0xbc799737;
/// Tag written in front of every vector unless a schema overrides it.
pub const VECTOR_TAG: u32 = 0x1cb5c415;
