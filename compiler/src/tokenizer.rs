use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    error::GramError,
    reader::{Reader, StrReader},
    types::FLAGS_FIELD,
    utils::{error, quote},
    value_type::ValueType,
};

/// Highest bit index a 32-bit flags word can gate.
pub const MAX_FLAG_BIT: u8 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LexState {
    Start,
    MaybeComment,
    CommentLine,
    ClassName,
    Constructor,
    FieldName,
    FieldType,
    FlagFieldIndex,
    ReturnClause,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    ClassDecl(String),
    ConstructorId(String),
    FlagsMarker,
    Field(String, ValueType),
    FlagField(String, ValueType, u8),
    ReturnType(ValueType),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind:   TokenKind,
    pub line:   usize,
    pub column: usize,
}

struct Lexer {
    state:      LexState,
    buffer:     String,
    field_name: String,
    flag_bit:   Option<u8>,
    line:       usize,
    column:     usize,
    mark:       (usize, usize),
    field_mark: (usize, usize),
    tokens:     Vec<Token>,
}

impl Lexer {
    fn new() -> Lexer {
        Lexer {
            state:      LexState::Start,
            buffer:     String::new(),
            field_name: String::new(),
            flag_bit:   None,
            line:       1,
            column:     1,
            mark:       (1, 1),
            field_mark: (1, 1),
            tokens:     Vec::new(),
        }
    }

    fn unexpected(&self, ch: char) -> GramError {
        GramError::Lex {
            state:  self.state,
            ch,
            line:   self.line,
            column: self.column,
        }
    }

    /// Appends to the pending token, remembering where it started.
    fn push(&mut self, ch: char) {
        if self.buffer.is_empty() {
            self.mark = (self.line, self.column);
        }
        self.buffer.push(ch);
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    fn emit(&mut self, kind: TokenKind, (line, column): (usize, usize)) {
        trace!(?kind, line, column, "token");
        self.tokens.push(Token { kind, line, column });
    }

    fn parse_type(&mut self) -> Result<ValueType, GramError> {
        let text = self.take();
        ValueType::parse(&text)
    }

    fn reset(&mut self) {
        self.state = LexState::Start;
        self.buffer.clear();
        self.field_name.clear();
        self.flag_bit = None;
    }

    fn step(&mut self, ch: char) -> Result<(), GramError> {
        match self.state {
            LexState::Start => {
                if ch.is_alphanumeric() {
                    self.push(ch);
                    self.state = LexState::ClassName;
                } else if ch.is_whitespace() {
                    // skip
                } else if ch == '/' {
                    self.push(ch);
                    self.state = LexState::MaybeComment;
                } else {
                    return Err(self.unexpected(ch));
                }
            }

            LexState::MaybeComment => {
                if ch == '/' {
                    self.buffer.clear();
                    self.state = LexState::CommentLine;
                } else {
                    // The buffered `/` starts a class name and `ch` is read as part of it.
                    self.state = LexState::ClassName;
                    return self.step(ch);
                }
            }

            LexState::CommentLine => {
                if ch == '\n' {
                    self.state = LexState::Start;
                }
            }

            LexState::ClassName => {
                if ch == '#' {
                    let name = self.take();
                    self.emit(TokenKind::ClassDecl(name), self.mark);
                    self.state = LexState::Constructor;
                } else if ch.is_alphanumeric() || ch == '.' {
                    self.push(ch);
                } else {
                    return Err(self.unexpected(ch));
                }
            }

            LexState::Constructor => {
                if ch == ' ' {
                    let id = self.take();
                    self.emit(TokenKind::ConstructorId(id), self.mark);
                    self.state = LexState::FieldName;
                } else if ch.is_ascii_hexdigit() {
                    self.push(ch);
                } else {
                    return Err(self.unexpected(ch));
                }
            }

            LexState::FieldName => {
                if ch.is_alphanumeric() || ch == '_' {
                    self.push(ch);
                } else if ch == ':' {
                    self.field_name = self.take();
                    self.field_mark = self.mark;
                    self.state = LexState::FieldType;
                } else if ch == '=' {
                    // A name without `:type` before `=` would otherwise vanish.
                    if !self.buffer.is_empty() {
                        return Err(self.unexpected(ch));
                    }
                    self.state = LexState::ReturnClause;
                } else if ch == ' ' {
                    // skip
                } else {
                    return Err(self.unexpected(ch));
                }
            }

            LexState::FieldType => {
                if ch.is_alphanumeric() || ch == '<' || ch == '>' || ch == '_' {
                    self.push(ch);
                } else if ch == ' ' {
                    let ty = self.parse_type()?;
                    let name = std::mem::take(&mut self.field_name);
                    let kind = match self.flag_bit.take() {
                        Some(bit) => TokenKind::FlagField(name, ty, bit),
                        None => TokenKind::Field(name, ty),
                    };
                    self.emit(kind, self.field_mark);
                    self.state = LexState::FieldName;
                } else if ch == '#' {
                    if self.field_name != FLAGS_FIELD || !self.buffer.is_empty() {
                        return Err(self.unexpected(ch));
                    }
                    self.field_name.clear();
                    self.emit(TokenKind::FlagsMarker, self.field_mark);
                    self.state = LexState::FieldName;
                } else if ch == '.' {
                    if self.flag_bit.is_none() && self.buffer == FLAGS_FIELD {
                        self.buffer.clear();
                        self.state = LexState::FlagFieldIndex;
                    } else {
                        self.push(ch);
                    }
                } else {
                    return Err(self.unexpected(ch));
                }
            }

            LexState::FlagFieldIndex => {
                if ch.is_ascii_digit() {
                    self.push(ch);
                } else if ch == '?' {
                    let (line, column) = self.mark;
                    let digits = self.take();
                    let bit = digits
                        .parse::<u8>()
                        .ok()
                        .filter(|bit| *bit <= MAX_FLAG_BIT)
                        .ok_or_else(|| {
                            error(
                                &format!(
                                    "Flag index {} of field {} is outside 0..={}",
                                    quote(&digits),
                                    quote(&self.field_name),
                                    MAX_FLAG_BIT
                                ),
                                line,
                                column,
                            )
                        })?;
                    self.flag_bit = Some(bit);
                    self.state = LexState::FieldType;
                } else {
                    return Err(self.unexpected(ch));
                }
            }

            LexState::ReturnClause => {
                if ch.is_alphanumeric() || ch == '.' {
                    self.push(ch);
                } else if ch == ';' {
                    let mark = self.mark;
                    let ty = self.parse_type()?;
                    self.emit(TokenKind::ReturnType(ty), mark);
                    self.reset();
                } else if ch == ' ' {
                    // skip
                } else {
                    return Err(self.unexpected(ch));
                }
            }
        }
        Ok(())
    }

    fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    fn finish(self) -> Result<Vec<Token>, GramError> {
        match self.state {
            LexState::Start | LexState::CommentLine => Ok(self.tokens),
            state => Err(GramError::UnexpectedEof {
                state,
                line:   self.line,
                column: self.column,
            }),
        }
    }
}

/// Runs the lexer over any character source.
pub fn tokenize<R: Reader + ?Sized>(reader: &mut R) -> Result<Vec<Token>, GramError> {
    let mut lexer = Lexer::new();
    while reader.has_next()? {
        let ch = reader.next()?;
        lexer.step(ch)?;
        lexer.advance(ch);
    }
    let tokens = lexer.finish()?;
    debug!(count = tokens.len(), "tokenized schema source");
    Ok(tokens)
}

pub fn tokenize_schema(text: &str) -> Result<Vec<Token>, GramError> {
    tokenize(&mut StrReader::new(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::StreamReader;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize_schema(input)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn named(name: &str) -> ValueType {
        ValueType::Named(name.into())
    }

    #[test]
    fn test_tokenize_simple() {
        let input = "help.getSensitiveWords#519536bc hash:int = help.SensitiveWordList;";
        let expected = vec![
            Token { kind: TokenKind::ClassDecl("help.getSensitiveWords".into()),         line: 1, column: 1 },
            Token { kind: TokenKind::ConstructorId("519536bc".into()),                   line: 1, column: 24 },
            Token { kind: TokenKind::Field("hash".into(), ValueType::Int32),             line: 1, column: 33 },
            Token { kind: TokenKind::ReturnType(named("help.SensitiveWordList")),        line: 1, column: 44 },
        ];
        assert_eq!(tokenize_schema(input).unwrap(), expected);
    }

    #[test]
    fn test_tokenize_nested_vectors() {
        let input = "help.getSensitiveWords#519536bc hash:Vector<Vector<int>> = help.SensitiveWordList;";
        assert_eq!(
            kinds(input)[2],
            TokenKind::Field(
                "hash".into(),
                ValueType::Vector(Box::new(ValueType::Vector(Box::new(ValueType::Int32))))
            )
        );
    }

    #[test]
    fn test_tokenize_flags() {
        let input = "enterprise.deleteMessages#1e4a1320 flags:# revoke:flags.0?true id:Vector<int> user_id:long = enterprise.AffectedMessages;";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::ClassDecl("enterprise.deleteMessages".into()),
                TokenKind::ConstructorId("1e4a1320".into()),
                TokenKind::FlagsMarker,
                TokenKind::FlagField("revoke".into(), ValueType::Boolean(true), 0),
                TokenKind::Field("id".into(), ValueType::Vector(Box::new(ValueType::Int32))),
                TokenKind::Field("user_id".into(), ValueType::Int64),
                TokenKind::ReturnType(named("enterprise.AffectedMessages")),
            ]
        );
    }

    #[test]
    fn test_tokenize_flag_guarded_named_type() {
        let input = "a.b#1 flags:# peer:flags.12?help.Peer = a.B;";
        assert_eq!(
            kinds(input)[3],
            TokenKind::FlagField("peer".into(), named("help.Peer"), 12)
        );
    }

    #[test]
    fn test_tokenize_constructor_without_fields() {
        let input = "help.sensitiveWordListNotModified#4c5d13a2 = help.SensitiveWordList;";
        assert_eq!(
            kinds(input),
            vec![
                TokenKind::ClassDecl("help.sensitiveWordListNotModified".into()),
                TokenKind::ConstructorId("4c5d13a2".into()),
                TokenKind::ReturnType(named("help.SensitiveWordList")),
            ]
        );
    }

    #[test]
    fn test_tokenize_skips_comments() {
        let line = "help.getSensitiveWords#519536bc hash:int = help.SensitiveWordList;";
        let input = format!("// {line}\n{line}// {line}\n{line}");
        let tokens = kinds(&input);
        assert_eq!(tokens.len(), 8);
        assert_eq!(tokens[..4], tokens[4..]);
    }

    #[test]
    fn test_tokenize_single_slash_resumes_class_name() {
        let tokens = tokenize_schema("/a.b#1 = a.B;").unwrap();
        assert_eq!(
            tokens[0],
            Token { kind: TokenKind::ClassDecl("/a.b".into()), line: 1, column: 1 }
        );
        assert_eq!(
            tokens[1..].iter().map(|token| token.kind.clone()).collect::<Vec<_>>(),
            vec![TokenKind::ConstructorId("1".into()), TokenKind::ReturnType(named("a.B"))]
        );

        let err = tokenize_schema("/ ").unwrap_err();
        assert!(
            matches!(err, GramError::Lex { state: LexState::ClassName, ch: ' ', line: 1, column: 2 }),
            "expected a lexical error but got {:?}",
            err
        );
    }

    #[test]
    fn test_tokenize_multi_line_positions() {
        let input = "a.b#1 = a.B;\n  c.d#2 x:int = c.D;";
        let tokens = tokenize_schema(input).unwrap();
        assert_eq!((tokens[3].line, tokens[3].column), (2, 3));
        assert_eq!((tokens[5].line, tokens[5].column), (2, 9));
    }

    #[test]
    fn test_tokenize_stream_matches_text() {
        let input = "help.getSensitiveWords#519536bc hash:int = help.SensitiveWordList;";
        let streamed = tokenize(&mut StreamReader::new(input.as_bytes())).unwrap();
        assert_eq!(streamed, tokenize_schema(input).unwrap());
    }

    #[test]
    fn test_tokenize_unexpected_char() {
        let err = tokenize_schema("help.x#1 a:int = help@X;").unwrap_err();
        assert!(
            matches!(err, GramError::Lex { state: LexState::ReturnClause, ch: '@', line: 1, column: 22 }),
            "expected a lexical error but got {:?}",
            err
        );
    }

    #[test]
    fn test_tokenize_rejects_non_flags_hash() {
        let err = tokenize_schema("help.x#1 mask:# = help.X;").unwrap_err();
        assert!(matches!(err, GramError::Lex { state: LexState::FieldType, ch: '#', .. }));
    }

    #[test]
    fn test_tokenize_rejects_bad_start() {
        let err = tokenize_schema("  #1").unwrap_err();
        assert!(matches!(err, GramError::Lex { state: LexState::Start, ch: '#', .. }));
    }

    #[test]
    fn test_tokenize_rejects_out_of_range_flag() {
        let err = tokenize_schema("help.x#1 flags:# a:flags.32?true = help.X;").unwrap_err();
        assert!(matches!(err, GramError::ParseError { .. }));
    }

    #[test]
    fn test_tokenize_rejects_empty_type() {
        let err = tokenize_schema("help.x#1 a: = help.X;").unwrap_err();
        assert!(matches!(err, GramError::MalformedType(ref text) if text.is_empty()));
    }

    #[test]
    fn test_tokenize_rejects_truncated_input() {
        let err = tokenize_schema("help.x#1 a:int = help.X").unwrap_err();
        assert!(matches!(err, GramError::UnexpectedEof { state: LexState::ReturnClause, .. }));
    }
}
