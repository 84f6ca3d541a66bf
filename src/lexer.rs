//! Explicit-state lexer for the parts of Lua source the pipeline has to read
//! exactly: quoted literals, their escapes, and table bodies.
//!
//! The lexer never fails. Malformed input (an unterminated literal, a table
//! without a closing brace) ends the scan at end of input.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexState {
    Outside,
    InsideTable,
    InsideString(char),
    EscapePending(char),
}

/// A quoted literal as it appears in the source, escapes not yet decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLiteral<'a> {
    pub quote: char,
    pub body: &'a str,
    pub terminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableToken {
    Literal(String),
    Close,
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    state: LexState,
}

impl<'a> Lexer<'a> {
    pub const fn new(input: &'a str) -> Self {
        Self::at(input, 0)
    }

    /// Starts lexing at byte offset `pos`, which must be a char boundary.
    pub const fn at(input: &'a str, pos: usize) -> Self {
        Self {
            input,
            pos,
            state: LexState::Outside,
        }
    }

    pub const fn pos(&self) -> usize {
        self.pos
    }

    pub const fn state(&self) -> LexState {
        self.state
    }

    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn current_char(&self) -> Option<char> {
        self.input.get(self.pos..)?.chars().next()
    }

    pub fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    pub fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while self
            .current_char()
            .is_some_and(|c| c.is_whitespace() || c == ',' || c == ';')
        {
            self.advance();
        }
    }

    /// Reads a quoted literal starting at the current position.
    ///
    /// Returns `None` without moving if the current character is not a quote.
    /// An unterminated literal extends to end of input.
    pub fn read_literal(&mut self) -> Option<RawLiteral<'a>> {
        let quote = self.current_char().filter(|&c| c == '"' || c == '\'')?;
        let resume = self.state;

        self.advance();
        let start = self.pos;
        self.state = LexState::InsideString(quote);

        while let Some(ch) = self.current_char() {
            match self.state {
                LexState::InsideString(q) if ch == q => {
                    let body = &self.input[start..self.pos];
                    self.advance();
                    self.state = resume;
                    return Some(RawLiteral {
                        quote,
                        body,
                        terminated: true,
                    });
                }
                LexState::InsideString(q) if ch == '\\' => {
                    self.state = LexState::EscapePending(q);
                }
                LexState::EscapePending(q) => {
                    self.state = LexState::InsideString(q);
                }
                _ => {}
            }
            self.advance();
        }

        self.state = resume;
        Some(RawLiteral {
            quote,
            body: &self.input[start..],
            terminated: false,
        })
    }

    /// Reads an ASCII identifier (`[A-Za-z_][A-Za-z0-9_]*`).
    pub fn read_identifier(&mut self) -> Option<&'a str> {
        let start = self.pos;
        if !self
            .current_char()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            return None;
        }
        while self
            .current_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        Some(&self.input[start..self.pos])
    }

    pub fn enter_table(&mut self) -> bool {
        if self.current_char() != Some('{') {
            return false;
        }
        self.advance();
        self.state = LexState::InsideTable;
        true
    }

    /// Next entry of a flat string table.
    ///
    /// Non-literal entries are skipped. The first `}` outside a literal closes the
    /// table regardless of nesting, so a nested table ends the scan early.
    pub fn next_table_token(&mut self) -> Option<TableToken> {
        if self.state != LexState::InsideTable {
            return None;
        }

        loop {
            self.skip_separators();
            let Some(ch) = self.current_char() else {
                self.state = LexState::Outside;
                return None;
            };

            match ch {
                '}' => {
                    self.advance();
                    self.state = LexState::Outside;
                    return Some(TableToken::Close);
                }
                '"' | '\'' => {
                    let literal = self.read_literal()?;
                    if !literal.terminated {
                        self.state = LexState::Outside;
                    }
                    return Some(TableToken::Literal(decode_escapes(literal.body)));
                }
                _ => self.advance(),
            }
        }
    }

    /// Skips a brace-balanced table starting at the current `{` and returns its
    /// body without the outer braces. Braces inside literals do not count.
    ///
    /// A table that never closes yields everything up to end of input.
    pub fn skip_balanced(&mut self) -> Option<&'a str> {
        if self.current_char() != Some('{') {
            return None;
        }

        let body_start = self.pos + 1;
        let mut depth = 0usize;

        while let Some(ch) = self.current_char() {
            match ch {
                '"' | '\'' => {
                    self.read_literal();
                    continue;
                }
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let body = &self.input[body_start..self.pos];
                        self.advance();
                        return Some(body);
                    }
                }
                _ => {}
            }
            self.advance();
        }

        Some(&self.input[body_start..])
    }
}

/// Decodes Lua escapes in a literal body in one left-to-right pass.
///
/// `\ddd` (one to three decimal digits) becomes the code point of that value;
/// `\n \r \t \\ \" \'` become their characters. Other escapes are kept as written.
pub fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        match chars.peek().copied() {
            Some(d) if d.is_ascii_digit() => {
                let mut value = 0u32;
                let mut digits = 0;
                while digits < 3 {
                    let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) else {
                        break;
                    };
                    value = value * 10 + digit;
                    digits += 1;
                    chars.next();
                }
                out.push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            Some(named) => {
                let decoded = match named {
                    'n' => Some('\n'),
                    'r' => Some('\r'),
                    't' => Some('\t'),
                    '\\' => Some('\\'),
                    '"' => Some('"'),
                    '\'' => Some('\''),
                    _ => None,
                };
                out.push(decoded.unwrap_or('\\'));
                if decoded.is_some() {
                    chars.next();
                }
            }
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(src: &str) -> Vec<String> {
        let mut lexer = Lexer::new(src);
        assert!(lexer.enter_table());
        let mut out = Vec::new();
        while let Some(TableToken::Literal(s)) = lexer.next_table_token() {
            out.push(s);
        }
        out
    }

    #[test]
    fn test_numeric_escapes() {
        assert_eq!(decode_escapes(r"\72\101\108\108\111"), "Hello");
        assert_eq!(decode_escapes(r"\0"), "\0");
        assert_eq!(decode_escapes(r"\0651"), "A1");
        assert_eq!(decode_escapes(r"\255"), "\u{ff}");
    }

    #[test]
    fn test_named_escapes() {
        assert_eq!(decode_escapes(r"a\nb"), "a\nb");
        assert_eq!(decode_escapes(r#"\"q\" \'s\' \t\r"#), "\"q\" 's' \t\r");
        assert_eq!(decode_escapes(r"\\n"), "\\n");
        assert_eq!(decode_escapes(r"\\65"), "\\65");
    }

    #[test]
    fn test_unknown_escape_kept() {
        assert_eq!(decode_escapes(r"\x41\q"), r"\x41\q");
        assert_eq!(decode_escapes("trailing\\"), "trailing\\");
    }

    #[test]
    fn test_quote_parity() {
        let mut lexer = Lexer::new(r#""a\"b" rest"#);
        let lit = lexer.read_literal().unwrap();
        assert_eq!(lit.body, r#"a\"b"#);
        assert!(lit.terminated);

        let mut lexer = Lexer::new(r#""a\\" rest"#);
        assert_eq!(lexer.read_literal().unwrap().body, r"a\\");

        let mut lexer = Lexer::new(r#""a\\\"b" rest"#);
        assert_eq!(lexer.read_literal().unwrap().body, r#"a\\\"b"#);
    }

    #[test]
    fn test_literal_state_transitions() {
        let mut lexer = Lexer::new(r#""x\"#);
        let lit = lexer.read_literal().unwrap();
        assert!(!lit.terminated);
        assert_eq!(lit.body, "x\\");
        assert_eq!(lexer.state(), LexState::Outside);
        assert!(lexer.is_eof());
    }

    #[test]
    fn test_single_quoted_literal_with_double_quote() {
        let mut lexer = Lexer::new(r#"'say "hi"'"#);
        let lit = lexer.read_literal().unwrap();
        assert_eq!(lit.quote, '\'');
        assert_eq!(lit.body, r#"say "hi""#);
    }

    #[test]
    fn test_table_scan() {
        assert_eq!(table(r#"{"a", 'b'; "c"}"#), vec!["a", "b", "c"]);
        assert_eq!(table(r#"{ "x}y", "z" }"#), vec!["x}y", "z"]);
        assert_eq!(table(r#"{"\65\66", 1, "C"} "after""#), vec!["AB", "C"]);
        assert!(table("{}").is_empty());
    }

    #[test]
    fn test_table_scan_stops_at_first_close() {
        assert_eq!(table(r#"{"a", {"x"}, "b"}"#), vec!["a", "x"]);
    }

    #[test]
    fn test_unterminated_table_literal_ends_scan() {
        assert_eq!(table(r#"{"a", "b"#), vec!["a", "b"]);
    }

    #[test]
    fn test_skip_balanced() {
        let src = r#"{a = {1}, ["}"] = 2} tail"#;
        let mut lexer = Lexer::new(src);
        assert_eq!(lexer.skip_balanced(), Some(r#"a = {1}, ["}"] = 2"#));
        assert_eq!(&src[lexer.pos()..], " tail");

        let mut open = Lexer::new("{a = {1}");
        assert_eq!(open.skip_balanced(), Some("a = {1}"));

        assert_eq!(Lexer::new("x").skip_balanced(), None);
    }

    #[test]
    fn test_identifier() {
        let mut lexer = Lexer::new("_ab1 = 2");
        assert_eq!(lexer.read_identifier(), Some("_ab1"));
        lexer.skip_whitespace();
        assert_eq!(lexer.read_identifier(), None);
    }
}
