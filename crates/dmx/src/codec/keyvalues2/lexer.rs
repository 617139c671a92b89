//! Tokenizer for keyvalues2 text.

use crate::error::DecodeError;
use crate::limits::MAX_STRING_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Comma,
    /// A quoted string with escapes applied, or a bare word.
    Text(String),
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::OpenBrace => "'{'".into(),
            Token::CloseBrace => "'}'".into(),
            Token::OpenBracket => "'['".into(),
            Token::CloseBracket => "']'".into(),
            Token::Comma => "','".into(),
            Token::Text(text) => format!("{text:?}"),
        }
    }
}

/// Splits text into tokens, skipping whitespace and `//` comments.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    peeked: Option<(Token, usize)>,
    /// Line of the most recently returned token.
    token_line: usize,
}

impl<'a> Lexer<'a> {
    /// `first_line` is the line number of the start of `src`.
    pub fn new(src: &'a str, first_line: usize) -> Self {
        Self {
            src,
            pos: 0,
            line: first_line,
            peeked: None,
            token_line: first_line,
        }
    }

    /// Line of the last token returned by [`Lexer::next_token`].
    pub fn line(&self) -> usize {
        self.token_line
    }

    pub fn syntax(&self, message: impl Into<String>) -> DecodeError {
        DecodeError::Syntax {
            line: self.token_line,
            message: message.into(),
        }
    }

    pub fn peek(&mut self) -> Result<Option<&Token>, DecodeError> {
        if self.peeked.is_none() {
            self.peeked = self.scan()?;
        }
        Ok(self.peeked.as_ref().map(|(token, _)| token))
    }

    pub fn next_token(&mut self) -> Result<Option<Token>, DecodeError> {
        let next = match self.peeked.take() {
            Some(peeked) => Some(peeked),
            None => self.scan()?,
        };
        Ok(next.map(|(token, line)| {
            self.token_line = line;
            token
        }))
    }

    /// Consumes the next token, failing unless it equals `expected`.
    pub fn expect(&mut self, expected: Token) -> Result<(), DecodeError> {
        match self.next_token()? {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(self.syntax(format!(
                "expected {}, found {}",
                expected.describe(),
                token.describe()
            ))),
            None => Err(self.syntax(format!("expected {}, found end of input", expected.describe()))),
        }
    }

    /// Consumes a text token. `what` names it in the error message.
    pub fn expect_text(&mut self, what: &str) -> Result<String, DecodeError> {
        match self.next_token()? {
            Some(Token::Text(text)) => Ok(text),
            Some(token) => Err(self.syntax(format!("expected {what}, found {}", token.describe()))),
            None => Err(self.syntax(format!("expected {what}, found end of input"))),
        }
    }

    /// Consumes the next token if it equals `token`.
    pub fn eat(&mut self, token: &Token) -> Result<bool, DecodeError> {
        if self.peek()? == Some(token) {
            self.peeked = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn scan(&mut self) -> Result<Option<(Token, usize)>, DecodeError> {
        self.skip_trivia();
        let Some(c) = self.src[self.pos..].chars().next() else {
            return Ok(None);
        };
        let line = self.line;
        let token = match c {
            '{' => Token::OpenBrace,
            '}' => Token::CloseBrace,
            '[' => Token::OpenBracket,
            ']' => Token::CloseBracket,
            ',' => Token::Comma,
            '"' => {
                self.pos += 1;
                return self.scan_quoted(line).map(|text| Some((Token::Text(text), line)));
            }
            _ => {
                let start = self.pos;
                let len = self.src[start..]
                    .find(|c: char| c.is_whitespace() || "{}[],\"".contains(c))
                    .unwrap_or(self.src.len() - start);
                self.pos += len;
                return Ok(Some((Token::Text(self.src[start..start + len].to_string()), line)));
            }
        };
        self.pos += 1;
        Ok(Some((token, line)))
    }

    fn scan_quoted(&mut self, start_line: usize) -> Result<String, DecodeError> {
        let mut out = String::new();
        let mut chars = self.src[self.pos..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += i + 1;
                    return Ok(out);
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, '"')) => out.push('"'),
                    Some((_, '\\')) => out.push('\\'),
                    Some((_, other)) => {
                        if other == '\n' {
                            self.line += 1;
                        }
                        out.push('\\');
                        out.push(other);
                    }
                    None => break,
                },
                '\n' => {
                    self.line += 1;
                    out.push(c);
                }
                _ => out.push(c),
            }
            if out.len() > MAX_STRING_LEN {
                return Err(DecodeError::LengthExceedsLimit {
                    field: "string",
                    len: out.len(),
                    max: MAX_STRING_LEN,
                });
            }
        }
        Err(DecodeError::Syntax {
            line: start_line,
            message: "unterminated string".into(),
        })
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = &self.src[self.pos..];
            let trimmed = rest.trim_start();
            self.line += rest[..rest.len() - trimmed.len()].matches('\n').count();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with("//") {
                let end = trimmed.find('\n').unwrap_or(trimmed.len());
                self.pos += end;
            } else {
                return;
            }
        }
    }
}

/// Escapes text for a quoted token.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src, 1);
        let mut out = Vec::new();
        while let Some(token) = lexer.next_token().unwrap() {
            out.push(token);
        }
        out
    }

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    #[test]
    fn test_punctuation_and_strings() {
        assert_eq!(
            tokens(r#""DmElement" { "a" "int_array" [ "1", "2" ] }"#),
            vec![
                text("DmElement"),
                Token::OpenBrace,
                text("a"),
                text("int_array"),
                Token::OpenBracket,
                text("1"),
                Token::Comma,
                text("2"),
                Token::CloseBracket,
                Token::CloseBrace,
            ]
        );
    }

    #[test]
    fn test_comments_and_bare_words() {
        assert_eq!(
            tokens("// header\nDmElement{ // trailing\n}"),
            vec![text("DmElement"), Token::OpenBrace, Token::CloseBrace]
        );
    }

    #[test]
    fn test_escapes_round_trip() {
        let original = "say \"hi\"\\\n\tnow";
        let quoted = format!("\"{}\"", escape(original));
        assert_eq!(tokens(&quoted), vec![text(original)]);
    }

    #[test]
    fn test_line_tracking() {
        let mut lexer = Lexer::new("\"a\"\n\n\"b\"\n}", 3);
        lexer.next_token().unwrap();
        assert_eq!(lexer.line(), 3);
        lexer.next_token().unwrap();
        assert_eq!(lexer.line(), 5);
        lexer.next_token().unwrap();
        assert_eq!(lexer.line(), 6);
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\n\"open", 1);
        assert_eq!(
            lexer.next_token().unwrap_err(),
            DecodeError::Syntax {
                line: 2,
                message: "unterminated string".into()
            }
        );
    }

    #[test]
    fn test_expect_reports_found_token() {
        let mut lexer = Lexer::new("]", 1);
        let err = lexer.expect(Token::OpenBrace).unwrap_err();
        assert!(matches!(err, DecodeError::Syntax { line: 1, ref message } if message.contains("']'")));
    }
}
