use tracing::{debug, trace};

use crate::{
    error::GramError,
    tokenizer::{Token, TokenKind},
    types::{ChildMap, Field, Schema, TypeDefinition, FLAGS_FIELD},
    utils::{error, quote},
    value_type::ValueType,
};

/// The definition currently being assembled.
#[derive(Debug)]
struct Pending {
    key:            String,
    constructor_id: Option<u32>,
    fields:         Vec<Field>,
    line:           usize,
    column:         usize,
}

#[derive(Debug, Default)]
struct Assembly {
    pending:     Option<Pending>,
    definitions: Vec<TypeDefinition>,
    child_map:   ChildMap,
}

impl Assembly {
    fn step(mut self, token: &Token) -> Result<Assembly, GramError> {
        match &token.kind {
            TokenKind::ClassDecl(key) => {
                if let Some(pending) = &self.pending {
                    return Err(error(
                        &format!("Definition {} has no return type", quote(&pending.key)),
                        pending.line,
                        pending.column,
                    ));
                }
                self.pending = Some(Pending {
                    key:            key.clone(),
                    constructor_id: None,
                    fields:         Vec::new(),
                    line:           token.line,
                    column:         token.column,
                });
            }

            TokenKind::ConstructorId(digits) => {
                let pending = Self::open(&mut self.pending, token)?;
                if pending.constructor_id.is_some() {
                    return Err(unexpected(token));
                }
                let id = u32::from_str_radix(digits, 16).map_err(|_| {
                    error(
                        &format!("Invalid constructor id {}", quote(digits)),
                        token.line,
                        token.column,
                    )
                })?;
                pending.constructor_id = Some(id);
            }

            TokenKind::FlagsMarker => {
                Self::identified(&mut self.pending, token)?.fields.push(Field {
                    name:     FLAGS_FIELD.to_string(),
                    ty:       ValueType::Int32,
                    flag_bit: None,
                });
            }

            TokenKind::Field(name, ty) => {
                Self::identified(&mut self.pending, token)?.fields.push(Field {
                    name:     name.clone(),
                    ty:       ty.clone(),
                    flag_bit: None,
                });
            }

            TokenKind::FlagField(name, ty, bit) => {
                Self::identified(&mut self.pending, token)?.fields.push(Field {
                    name:     name.clone(),
                    ty:       ty.clone(),
                    flag_bit: Some(*bit),
                });
            }

            TokenKind::ReturnType(return_type) => {
                let pending = Self::identified(&mut self.pending, token)?;
                let constructor_id = pending.constructor_id.unwrap_or_default();
                let pending = self.pending.take().ok_or_else(|| unexpected(token))?;

                if let ValueType::Named(name) = return_type {
                    self.child_map.insert(name, &pending.key);
                }
                trace!(key = %pending.key, constructor_id, "assembled definition");
                self.definitions.push(TypeDefinition {
                    key: pending.key,
                    constructor_id,
                    fields: pending.fields,
                    return_type: return_type.clone(),
                    line: pending.line,
                    column: pending.column,
                });
            }
        }
        Ok(self)
    }

    fn open<'a>(pending: &'a mut Option<Pending>, token: &Token) -> Result<&'a mut Pending, GramError> {
        pending.as_mut().ok_or_else(|| unexpected(token))
    }

    /// Like `open`, but the constructor id must already be known.
    fn identified<'a>(pending: &'a mut Option<Pending>, token: &Token) -> Result<&'a mut Pending, GramError> {
        match pending.as_mut() {
            Some(pending) if pending.constructor_id.is_some() => Ok(pending),
            _ => Err(unexpected(token)),
        }
    }

    fn finish(self) -> Result<Schema, GramError> {
        if let Some(pending) = self.pending {
            return Err(error(
                &format!("Definition {} has no return type", quote(&pending.key)),
                pending.line,
                pending.column,
            ));
        }
        Ok(Schema {
            definitions: self.definitions,
            child_map:   self.child_map,
        })
    }
}

fn unexpected(token: &Token) -> GramError {
    error(
        &format!("Unexpected token {:?}", token.kind),
        token.line,
        token.column,
    )
}

/// Folds the token stream into definitions and the abstract-type child map.
pub fn parse_schema(tokens: &[Token]) -> Result<Schema, GramError> {
    let schema = tokens
        .iter()
        .try_fold(Assembly::default(), Assembly::step)?
        .finish()?;
    debug!(
        definitions = schema.definitions.len(),
        families = schema.child_map.len(),
        "assembled schema"
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize_schema;

    fn parse(text: &str) -> Result<Schema, GramError> {
        parse_schema(&tokenize_schema(text)?)
    }

    fn token(kind: TokenKind) -> Token {
        Token { kind, line: 1, column: 1 }
    }

    #[test]
    fn test_parse_single_definition() {
        let schema = parse("help.getSensitiveWords#519536bc hash:int = help.SensitiveWordList;").unwrap();
        assert_eq!(schema.definitions.len(), 1);

        let def = &schema.definitions[0];
        assert_eq!(def.key, "help.getSensitiveWords");
        assert_eq!(def.constructor_id, 0x519536bc);
        assert_eq!(def.fields, vec![Field { name: "hash".into(), ty: ValueType::Int32, flag_bit: None }]);
        assert_eq!(def.return_type, ValueType::Named("help.SensitiveWordList".into()));

        let members: Vec<_> = schema.child_map.get("help.SensitiveWordList").unwrap().iter().collect();
        assert_eq!(members, ["help.getSensitiveWords"]);
    }

    #[test]
    fn test_parse_family() {
        let schema = parse(
            "help.sensitiveWordListNotModified#4c5d13a2 = help.SensitiveWordList;\n\
             help.sensitiveWordList#79d54d0d hash:int words:Vector<string> = help.SensitiveWordList;",
        )
        .unwrap();

        assert_eq!(schema.child_map.len(), 1);
        let members: Vec<_> = schema.child_map.get("help.SensitiveWordList").unwrap().iter().collect();
        assert_eq!(members, ["help.sensitiveWordListNotModified", "help.sensitiveWordList"]);
        assert!(schema.definitions[0].fields.is_empty());
        assert_eq!(schema.definitions[1].fields[1].ty, ValueType::Vector(Box::new(ValueType::String)));
    }

    #[test]
    fn test_parse_flags_marker_adds_int_field() {
        let schema = parse("a.b#1e4a1320 flags:# revoke:flags.0?true = a.B;").unwrap();
        let def = &schema.definitions[0];
        assert_eq!(def.fields[0], Field { name: FLAGS_FIELD.into(), ty: ValueType::Int32, flag_bit: None });
        assert_eq!(def.fields[1].flag_bit, Some(0));
        assert!(def.fields[1].is_conditional());
    }

    #[test]
    fn test_parse_primitive_return_skips_child_map() {
        let schema = parse("a.ping#1 = Bool;\na.count#2 = int;\na.get#3 = a.Result;").unwrap();
        assert_eq!(schema.definitions.len(), 3);
        assert_eq!(schema.definitions[0].return_type, ValueType::Boolean(false));
        assert_eq!(schema.definitions[1].return_type, ValueType::Int32);
        assert_eq!(schema.child_map.len(), 1);
        assert!(schema.child_map.get("a.Result").is_some());
    }

    #[test]
    fn test_parse_field_before_declaration() {
        let tokens = vec![token(TokenKind::Field("a".into(), ValueType::Int32))];
        assert!(matches!(parse_schema(&tokens), Err(GramError::ParseError { .. })));
    }

    #[test]
    fn test_parse_return_without_constructor() {
        let tokens = vec![
            token(TokenKind::ClassDecl("a.b".into())),
            token(TokenKind::ReturnType(ValueType::Named("a.B".into()))),
        ];
        assert!(matches!(parse_schema(&tokens), Err(GramError::ParseError { .. })));
    }

    #[test]
    fn test_parse_unfinished_definition() {
        let tokens = vec![
            token(TokenKind::ClassDecl("a.b".into())),
            token(TokenKind::ConstructorId("1".into())),
        ];
        let err = parse_schema(&tokens).unwrap_err();
        assert_eq!(err.to_string(), "Parse error at line 1, column 1: Definition \"a.b\" has no return type");
    }

    #[test]
    fn test_parse_invalid_constructor_id() {
        let tokens = vec![
            token(TokenKind::ClassDecl("a.b".into())),
            token(TokenKind::ConstructorId("123456789".into())),
        ];
        assert!(matches!(parse_schema(&tokens), Err(GramError::ParseError { .. })));
    }
}
