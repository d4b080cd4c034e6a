//! Hand-written lexer for the expression language.

use super::error::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords; keywords are recognized by the parser
    Word(String),
    /// Quoted string literal (content without quotes, escapes resolved)
    Str(String),
    Int(i64),
    Float(f64),
    LParen,
    RParen,
    Comma,
    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    // Comparison
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Eof,
}

/// A token with the byte offset it starts at.
#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub fn lex(src: &str) -> Result<Vec<Spanned>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut pos = 0usize;

    let offset_at = |pos: usize| chars.get(pos).map(|(o, _)| *o).unwrap_or(src.len());

    while pos < chars.len() {
        let (offset, c) = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // String literal, single or double quoted
        if c == '"' || c == '\'' {
            let quote = c;
            pos += 1;
            let mut s = String::new();
            loop {
                let Some(&(_, sc)) = chars.get(pos) else {
                    return Err(ExprError::parse(offset, "unterminated string literal"));
                };
                pos += 1;
                if sc == quote {
                    break;
                }
                if sc == '\\' {
                    let Some(&(_, esc)) = chars.get(pos) else {
                        return Err(ExprError::parse(offset, "unterminated escape in string"));
                    };
                    pos += 1;
                    match esc {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        '\\' | '"' | '\'' => s.push(esc),
                        other => {
                            return Err(ExprError::parse(
                                offset_at(pos - 1),
                                format!("unknown escape '\\{other}'"),
                            ))
                        }
                    }
                    continue;
                }
                s.push(sc);
            }
            tokens.push(Spanned {
                token: Token::Str(s),
                offset,
            });
            continue;
        }

        // Number literal
        if c.is_ascii_digit()
            || (c == '.' && chars.get(pos + 1).is_some_and(|(_, n)| n.is_ascii_digit()))
        {
            let mut is_float = false;
            while pos < chars.len() && chars[pos].1.is_ascii_digit() {
                pos += 1;
            }
            if pos < chars.len()
                && chars[pos].1 == '.'
                && chars.get(pos + 1).is_some_and(|(_, n)| n.is_ascii_digit())
            {
                is_float = true;
                pos += 1;
                while pos < chars.len() && chars[pos].1.is_ascii_digit() {
                    pos += 1;
                }
            }
            if pos < chars.len() && matches!(chars[pos].1, 'e' | 'E') {
                let mut look = pos + 1;
                if chars.get(look).is_some_and(|(_, s)| *s == '+' || *s == '-') {
                    look += 1;
                }
                if chars.get(look).is_some_and(|(_, d)| d.is_ascii_digit()) {
                    is_float = true;
                    pos = look;
                    while pos < chars.len() && chars[pos].1.is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            let text = &src[offset..offset_at(pos)];
            let token = if is_float {
                text.parse::<f64>()
                    .map(Token::Float)
                    .map_err(|_| ExprError::parse(offset, format!("invalid number '{text}'")))?
            } else {
                text.parse::<i64>().map(Token::Int).map_err(|_| {
                    ExprError::parse(offset, format!("integer literal '{text}' out of range"))
                })?
            };
            tokens.push(Spanned { token, offset });
            continue;
        }

        // Identifier or keyword
        if c.is_alphabetic() || c == '_' {
            let mut word = String::new();
            while pos < chars.len() && (chars[pos].1.is_alphanumeric() || chars[pos].1 == '_') {
                word.push(chars[pos].1);
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Word(word),
                offset,
            });
            continue;
        }

        let next = chars.get(pos + 1).map(|(_, n)| *n);
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Neq, 2),
            ('<', Some('=')) => (Token::Lte, 2),
            ('>', Some('=')) => (Token::Gte, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('=', _) => {
                return Err(ExprError::parse(
                    offset,
                    "assignment is not supported; use '==' to compare",
                ))
            }
            _ => {
                return Err(ExprError::parse(
                    offset,
                    format!("unexpected character '{c}'"),
                ))
            }
        };
        pos += width;
        tokens.push(Spanned { token, offset });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: src.len(),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        lex(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn arithmetic_tokens() {
        assert_eq!(
            kinds("price * quantity + 1.5"),
            vec![
                Token::Word("price".into()),
                Token::Star,
                Token::Word("quantity".into()),
                Token::Plus,
                Token::Float(1.5),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn two_char_operators() {
        assert_eq!(
            kinds("a <= b != c"),
            vec![
                Token::Word("a".into()),
                Token::Lte,
                Token::Word("b".into()),
                Token::Neq,
                Token::Word("c".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn both_quote_styles() {
        assert_eq!(
            kinds(r#"'it\'s' "a\"b""#),
            vec![Token::Str("it's".into()), Token::Str("a\"b".into()), Token::Eof]
        );
    }

    #[test]
    fn exponent_makes_float() {
        assert_eq!(kinds("2e3"), vec![Token::Float(2000.0), Token::Eof]);
        assert_eq!(kinds(".5"), vec![Token::Float(0.5), Token::Eof]);
    }

    #[test]
    fn integer_out_of_range_is_error() {
        let err = lex("99999999999999999999").unwrap_err();
        assert!(matches!(err, ExprError::Parse { offset: 0, .. }));
    }

    #[test]
    fn single_equals_is_rejected() {
        let err = lex("a = 1").unwrap_err();
        assert!(matches!(err, ExprError::Parse { offset: 2, .. }));
    }

    #[test]
    fn unterminated_string() {
        assert!(lex("'abc").is_err());
    }
}
