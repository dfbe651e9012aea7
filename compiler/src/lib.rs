//! gram-tl-compiler
//!
//! This crate implements:
//!  1) A character cursor over in-memory text or a byte stream (`reader`),
//!  2) A state-machine lexer for `.tl` schema sources (`tokenizer`),
//!  3) Schema assembly into definitions plus the abstract → constructor child map (`parser`),
//!  4) A schema verifier (duplicate fields, flag fields without a flags word),
//!  5) Generation planning: per-type encode/decode plans and polymorphic dispatch (`planner`),
//!  6) A Rust renderer for those plans (`render_rust` → `String`),
//!  7) Error types (`GramError`) and run settings (`Settings`).

pub mod error;
pub mod utils;
pub mod reader;
pub mod value_type;
pub mod tokenizer;
pub mod types;
pub mod parser;
pub mod verifier;
pub mod naming;
pub mod settings;
pub mod plan;
pub mod planner;
pub mod compiler;
pub mod gen_rust;

pub use compiler::{compile_file, compile_reader, compile_schema, CompiledUnit};
pub use error::GramError;
pub use gen_rust::render_rust;
pub use settings::Settings;
