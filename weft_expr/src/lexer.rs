//! Tokenizer for the expression grammar shared by every dialect.

use crate::error::Fault;

/// Lexical token.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Dollar,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    In,
    True,
    False,
    Null,
}

/// Splits an expression body into tokens.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, Fault> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            let is_float = pos + 1 < chars.len() && chars[pos] == '.' && chars[pos + 1].is_ascii_digit();
            if is_float {
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let token = if is_float {
                text.parse::<f64>()
                    .map(Token::Float)
                    .map_err(|e| Fault::Syntax(format!("invalid number '{}': {}", text, e)))?
            } else {
                text.parse::<i64>()
                    .map(Token::Int)
                    .map_err(|e| Fault::Syntax(format!("invalid number '{}': {}", text, e)))?
            };
            tokens.push(token);
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            let mut value = String::new();
            pos += 1;
            let mut closed = false;
            while pos < chars.len() {
                let ch = chars[pos];
                if ch == '\\' && pos + 1 < chars.len() {
                    value.push(match chars[pos + 1] {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    pos += 2;
                    continue;
                }
                if ch == quote {
                    closed = true;
                    pos += 1;
                    break;
                }
                value.push(ch);
                pos += 1;
            }
            if !closed {
                return Err(Fault::Syntax("unterminated string literal".to_string()));
            }
            tokens.push(Token::Str(value));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            tokens.push(match word.as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "in" => Token::In,
                "true" => Token::True,
                "false" => Token::False,
                "null" => Token::Null,
                _ => Token::Ident(word),
            });
            continue;
        }

        let next = chars.get(pos + 1).copied();
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Ne, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('=', _) => (Token::Eq, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('.', _) => (Token::Dot, 1),
            (',', _) => (Token::Comma, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('$', _) => (Token::Dollar, 1),
            _ => {
                return Err(Fault::Syntax(format!(
                    "unexpected character '{}' at position {}",
                    c, pos
                )))
            }
        };
        tokens.push(token);
        pos += width;
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_call() {
        let tokens = tokenize("ctx('foo') = 1").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("ctx".to_string()),
                Token::LParen,
                Token::Str("foo".to_string()),
                Token::RParen,
                Token::Eq,
                Token::Int(1),
            ]
        );
    }

    #[test]
    fn test_tokenize_keywords_and_floats() {
        let tokens = tokenize("not x >= 2.5 and true").unwrap();
        assert_eq!(tokens[0], Token::Not);
        assert_eq!(tokens[2], Token::Ge);
        assert_eq!(tokens[3], Token::Float(2.5));
        assert_eq!(tokens[4], Token::And);
        assert_eq!(tokens[5], Token::True);
    }

    #[test]
    fn test_tokenize_unterminated_string() {
        assert!(matches!(tokenize("'abc"), Err(Fault::Syntax(_))));
    }

    #[test]
    fn test_tokenize_unexpected_character() {
        assert!(matches!(tokenize("a # b"), Err(Fault::Syntax(_))));
    }
}
