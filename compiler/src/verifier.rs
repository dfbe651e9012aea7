use std::collections::HashSet;

use crate::{
    error::GramError,
    naming::resolve_name,
    types::{Schema, FLAGS_FIELD},
    utils::quote,
};

/// Returns `Ok(())` if verification passed. Field-level problems surface as
/// `GramError::VerifierError`, dangling type references as
/// `GramError::UnresolvedReference`.
pub fn verify_schema(schema: &Schema) -> Result<(), GramError> {
    for def in &schema.definitions {
        let mut names = HashSet::new();
        let mut has_flags = false;

        for field in &def.fields {
            if !names.insert(field.name.as_str()) {
                return Err(GramError::VerifierError(format!(
                    "The field {} is declared twice in {}",
                    quote(&field.name),
                    quote(&def.key)
                )));
            }

            if let Some(bit) = field.flag_bit {
                if !has_flags {
                    return Err(GramError::VerifierError(format!(
                        "The field {} in {} is guarded by flags.{} but no flags field precedes it",
                        quote(&field.name),
                        quote(&def.key),
                        bit
                    )));
                }
            } else if field.name == FLAGS_FIELD {
                has_flags = true;
            }
        }
    }

    check_references(schema)
}

/// Every named field type, at any vector depth, must be defined somewhere in
/// the schema. Names are compared after `resolve_name`, so the first letter
/// of every segment after the first is case-folded: `help.Peer` resolves to a
/// definition keyed `help.peer`. The first segment and all other letters must
/// match exactly, so `Help.peer` or `help.PEER` do not.
pub fn check_references(schema: &Schema) -> Result<(), GramError> {
    let defined: HashSet<String> = schema
        .definitions
        .iter()
        .map(|def| resolve_name("", &def.key))
        .collect();

    for def in &schema.definitions {
        for field in &def.fields {
            if let Some(name) = field.ty.named_leaf() {
                if !defined.contains(&resolve_name("", name)) {
                    return Err(GramError::UnresolvedReference {
                        name:       name.to_string(),
                        field:      field.name.clone(),
                        definition: def.key.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}
