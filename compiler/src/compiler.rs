use std::{fs::File, path::Path};

use serde::Serialize;
use tracing::debug;

use crate::{
    error::GramError,
    parser::parse_schema,
    plan::GenerationPlan,
    planner::plan_schema,
    reader::{Reader, StreamReader},
    settings::Settings,
    tokenizer::{tokenize, tokenize_schema, Token},
    types::{ChildMap, Schema, TypeDefinition},
    verifier::verify_schema,
};

/// Everything a renderer needs for one schema source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledUnit {
    pub schema: Schema,
    pub plans:  Vec<GenerationPlan>,
}

impl CompiledUnit {
    /// Definitions with their plans, in source order.
    pub fn pairs(&self) -> impl Iterator<Item = (&TypeDefinition, &GenerationPlan)> {
        self.schema.definitions.iter().zip(self.plans.iter())
    }

    pub fn child_map(&self) -> &ChildMap {
        &self.schema.child_map
    }

    /// The first plan producing `type_name`.
    pub fn plan(&self, type_name: &str) -> Option<&GenerationPlan> {
        self.plans.iter().find(|plan| plan.type_name == type_name)
    }

    pub fn to_json(&self) -> Result<String, GramError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Compile schema text into definitions and generation plans.
/// Returns `Err(GramError)` if lexing, assembly, verification or planning fails.
pub fn compile_schema(text: &str, settings: &Settings) -> Result<CompiledUnit, GramError> {
    compile_tokens(&tokenize_schema(text)?, settings)
}

pub fn compile_reader<R: Reader + ?Sized>(reader: &mut R, settings: &Settings) -> Result<CompiledUnit, GramError> {
    compile_tokens(&tokenize(reader)?, settings)
}

/// Streams the file through the lexer instead of loading it whole.
pub fn compile_file(path: &Path, settings: &Settings) -> Result<CompiledUnit, GramError> {
    debug!(path = %path.display(), "compiling schema file");
    let mut reader = StreamReader::new(File::open(path)?);
    compile_reader(&mut reader, settings)
}

pub fn compile_tokens(tokens: &[Token], settings: &Settings) -> Result<CompiledUnit, GramError> {
    let schema = parse_schema(tokens)?;
    verify_schema(&schema)?;
    let plans = plan_schema(&schema, settings)?;
    debug!(
        definitions = schema.definitions.len(),
        plans = plans.len(),
        "compiled unit"
    );
    Ok(CompiledUnit { schema, plans })
}
