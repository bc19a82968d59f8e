//! Tokenizer for Python-style expressions.

use super::ast::Span;
use super::error::DslError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Keyword(&'static str),
    Int(i64),
    Float(f64),
    Str(String),
    Op(&'static str),
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

// Longest first so that prefixes don't shadow multi-character operators
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "**", "//", "==", "!=", "<=", ">=", "<<", ">>", ":=",
    "->", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", "+", "-", "*", "/", "%", "@",
    "<", ">", "(", ")", "[", "]", "{", "}", ",", ".", ":", ";", "=", "~", "&", "|", "^",
];

pub fn tokenize(source: &str) -> Result<Vec<Token>, DslError> {
    Lexer { source, pos: 0 }.run()
}

struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Token>, DslError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::End,
                    span: Span::new(start, start),
                });
                return Ok(tokens);
            };

            let kind = if c == '#' {
                return Err(self.error("comments are not supported", start, self.source.len()));
            } else if c.is_ascii_digit()
                || (c == '.' && self.peek_nth(1).is_some_and(|n| n.is_ascii_digit()))
            {
                self.number(start)?
            } else if c == '"' || c == '\'' {
                self.string(start, false)?
            } else if is_identifier_start(c) {
                let word = self.identifier();
                match (word, self.peek()) {
                    (prefix, Some('"' | '\'')) if is_string_prefix(prefix) => {
                        self.string_with_prefix(start, prefix)?
                    }
                    (word, _) => match KEYWORDS.iter().copied().find(|k| *k == word) {
                        Some(keyword) => TokenKind::Keyword(keyword),
                        None => TokenKind::Name(word.to_string()),
                    },
                }
            } else if let Some(op) = OPERATORS
                .iter()
                .copied()
                .find(|op| self.rest().starts_with(op))
            {
                self.pos += op.len();
                TokenKind::Op(op)
            } else {
                let end = start + c.len_utf8();
                return Err(self.error(format!("unexpected character {c:?}"), start, end));
            };

            tokens.push(Token {
                kind,
                span: Span::new(start, self.pos),
            });
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>, start: usize, end: usize) -> DslError {
        DslError::syntax(message, Span::new(start, end).slice(self.source))
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '\\' && matches!(self.peek_nth(1), Some('\n' | '\r')) {
                // explicit line continuation
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_continue) {
            self.bump();
        }
        &self.source[start..self.pos]
    }

    fn number(&mut self, start: usize) -> Result<TokenKind, DslError> {
        let radix = match (self.peek(), self.peek_nth(1)) {
            (Some('0'), Some('x' | 'X')) => Some(16),
            (Some('0'), Some('o' | 'O')) => Some(8),
            (Some('0'), Some('b' | 'B')) => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                self.bump();
            }
            let digits = self.source[digits_start..self.pos].replace('_', "");
            return i64::from_str_radix(&digits, radix)
                .map(TokenKind::Int)
                .map_err(|_| self.error("invalid integer literal", start, self.pos));
        }

        let mut is_float = false;
        self.digits();
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let checkpoint = self.pos;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.digits();
            } else {
                self.pos = checkpoint;
            }
        }
        if self.peek().is_some_and(|c| matches!(c, 'j' | 'J') || is_identifier_start(c)) {
            self.bump();
            return Err(self.error("invalid numeric literal", start, self.pos));
        }

        let text = self.source[start..self.pos].replace('_', "");
        if is_float {
            text.parse()
                .map(TokenKind::Float)
                .map_err(|_| self.error("invalid float literal", start, self.pos))
        } else {
            text.parse()
                .map(TokenKind::Int)
                .map_err(|_| self.error("integer literal is out of range", start, self.pos))
        }
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn string_with_prefix(&mut self, start: usize, prefix: &str) -> Result<TokenKind, DslError> {
        let lower = prefix.to_ascii_lowercase();
        if lower.contains('b') || lower.contains('f') {
            // consume the literal so the error quotes all of it
            let _ = self.string(start, true);
            return Err(self.error(
                "bytes and f-string literals are not supported",
                start,
                self.pos,
            ));
        }
        self.string(start, lower.contains('r'))
    }

    fn string(&mut self, start: usize, raw: bool) -> Result<TokenKind, DslError> {
        let Some(quote) = self.bump() else {
            return Err(self.error("unterminated string literal", start, self.pos));
        };
        let triple = self.peek() == Some(quote) && self.peek_nth(1) == Some(quote);
        if triple {
            self.pos += 2;
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated string literal", start, self.pos));
            };
            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_nth(1) == Some(quote) {
                    self.pos += 2;
                    break;
                }
                value.push(c);
            } else if c == '\n' && !triple {
                return Err(self.error("unterminated string literal", start, self.pos));
            } else if c == '\\' {
                let Some(escaped) = self.bump() else {
                    return Err(self.error("unterminated string literal", start, self.pos));
                };
                if raw {
                    value.push('\\');
                    value.push(escaped);
                } else {
                    self.escape(escaped, start, &mut value)?;
                }
            } else {
                value.push(c);
            }
        }
        Ok(TokenKind::Str(value))
    }

    fn escape(&mut self, escaped: char, start: usize, value: &mut String) -> Result<(), DslError> {
        match escaped {
            '\n' => {}
            '\\' | '\'' | '"' => value.push(escaped),
            'n' => value.push('\n'),
            'r' => value.push('\r'),
            't' => value.push('\t'),
            '0' => value.push('\0'),
            'a' => value.push('\u{07}'),
            'b' => value.push('\u{08}'),
            'f' => value.push('\u{0C}'),
            'v' => value.push('\u{0B}'),
            'x' => value.push(self.hex_escape(2, start)?),
            'u' => value.push(self.hex_escape(4, start)?),
            'U' => value.push(self.hex_escape(8, start)?),
            other => {
                value.push('\\');
                value.push(other);
            }
        }
        Ok(())
    }

    fn hex_escape(&mut self, len: usize, start: usize) -> Result<char, DslError> {
        let digits = self.rest().get(..len).unwrap_or_default();
        let code = u32::from_str_radix(digits, 16)
            .ok()
            .filter(|_| digits.len() == len)
            .and_then(char::from_u32);
        match code {
            Some(c) => {
                self.pos += len;
                Ok(c)
            }
            None => Err(self.error("invalid escape sequence", start, self.pos)),
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_identifier_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn is_string_prefix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            kinds("latency_ms >= 1_000"),
            vec![
                TokenKind::Name("latency_ms".to_string()),
                TokenKind::Op(">="),
                TokenKind::Int(1000),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(
            kinds("0.5 .5 1e3 0x1f 7"),
            vec![
                TokenKind::Float(0.5),
                TokenKind::Float(0.5),
                TokenKind::Float(1000.0),
                TokenKind::Int(31),
                TokenKind::Int(7),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_tokenize_strings() {
        assert_eq!(
            kinds(r#"'a\'b' "c\n" r'\d' """x"y""""#),
            vec![
                TokenKind::Str("a'b".to_string()),
                TokenKind::Str("c\n".to_string()),
                TokenKind::Str("\\d".to_string()),
                TokenKind::Str("x\"y".to_string()),
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_tokenize_keywords_and_spans() {
        let tokens = tokenize("not x in y").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Keyword("not"));
        assert_eq!(tokens[1].span, Span::new(4, 5));
        assert_eq!(tokens[2].kind, TokenKind::Keyword("in"));
    }

    #[test]
    fn test_tokenize_errors() {
        assert!(tokenize("'open").is_err());
        assert!(tokenize("f'{x}'").is_err());
        assert!(tokenize("a $ b").is_err());
        assert!(tokenize("1j").is_err());
        assert!(tokenize("x # comment").is_err());
    }
}
