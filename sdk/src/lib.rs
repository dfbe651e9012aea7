//! gram-tl
//!
//! Runtime support for TL schemas compiled by `gram-tl-compiler`.
//!
//! - `Registry`: encodes and decodes dynamic `Value`s by executing generation
//!   plans directly, including polymorphic dispatch across sibling types
//! - `value_to_json` for printing decoded values
//! - Re-exports of the compiler entry points and the wire primitives

pub mod codec;
pub mod error;
pub mod json;

pub use codec::{Registry, MAX_DELEGATION_DEPTH, MAX_NESTING_DEPTH};
pub use error::CodecError;
pub use json::value_to_json;

pub use gram_tl_compiler::{compile_file, compile_schema, render_rust, CompiledUnit, GramError, Settings};
pub use gram_tl_wire::{ByteBuffer, ByteBufferMut, TlObject, Value, WireError};

pub mod plan {
    pub use gram_tl_compiler::plan::*;
}
