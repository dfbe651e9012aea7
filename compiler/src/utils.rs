use crate::error::GramError;

pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

pub fn error(msg: &str, line: usize, column: usize) -> GramError {
    GramError::ParseError {
        msg: msg.to_string(),
        line,
        column,
    }
}

/// Uppercases the first character and leaves the rest untouched.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("asd"), "Asd");
        assert_eq!(capitalize("sensitiveWordList"), "SensitiveWordList");
        assert_eq!(capitalize("Already"), "Already");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("help.x"), "\"help.x\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }
}
