use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Punct(char),
    Spread,
    Eof,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Name(n) => format!("name '{}'", n),
            Token::Int(i) => format!("int {}", i),
            Token::Float(f) => format!("float {}", f),
            Token::Str(_) => "string".to_string(),
            Token::Punct(c) => format!("'{}'", c),
            Token::Spread => "'...'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Spanned {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

pub(crate) fn tokenize(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut lexer = Lexer {
        chars: src.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
    };
    let mut out = Vec::new();
    loop {
        let spanned = lexer.next_token()?;
        let done = spanned.token == Token::Eof;
        out.push(spanned);
        if done {
            return Ok(out);
        }
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.line, self.column)
    }

    fn skip_ignored(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                // Commas are insignificant in SDL.
                ' ' | '\t' | '\n' | '\r' | ',' | '\u{feff}' => {
                    self.bump();
                }
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Spanned, ParseError> {
        self.skip_ignored();
        let line = self.line;
        let column = self.column;
        let token = match self.peek() {
            None => Token::Eof,
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.name(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number()?,
            Some('"') => self.string()?,
            Some('.') => {
                if self.peek_at(1) == Some('.') && self.peek_at(2) == Some('.') {
                    self.bump();
                    self.bump();
                    self.bump();
                    Token::Spread
                } else {
                    return Err(self.error("unexpected '.'"));
                }
            }
            Some(c) if "!$()[]{}:=@|&".contains(c) => {
                self.bump();
                Token::Punct(c)
            }
            Some(c) => return Err(self.error(format!("unexpected character '{}'", c))),
        };
        Ok(Spanned {
            token,
            line,
            column,
        })
    }

    fn name(&mut self) -> Token {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        Token::Name(s)
    }

    fn number(&mut self) -> Result<Token, ParseError> {
        let mut s = String::new();
        if self.peek() == Some('-') {
            s.push('-');
            self.bump();
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => s.push(c),
                '.' | 'e' | 'E' => {
                    is_float = true;
                    s.push(c);
                }
                '+' | '-' if s.ends_with(['e', 'E']) => s.push(c),
                _ => break,
            }
            self.bump();
        }
        if is_float {
            s.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error(format!("invalid float '{}'", s)))
        } else {
            s.parse::<i64>()
                .map(Token::Int)
                .map_err(|_| self.error(format!("invalid int '{}'", s)))
        }
    }

    fn string(&mut self) -> Result<Token, ParseError> {
        if self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') {
            return self.block_string();
        }
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated string")),
                Some('"') => return Ok(Token::Str(s)),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('b') => s.push('\u{8}'),
                    Some('f') => s.push('\u{c}'),
                    Some('u') => {
                        let mut hex = String::new();
                        for _ in 0..4 {
                            match self.bump() {
                                Some(h) if h.is_ascii_hexdigit() => hex.push(h),
                                _ => return Err(self.error("invalid unicode escape")),
                            }
                        }
                        let code = u32::from_str_radix(&hex, 16)
                            .map_err(|_| self.error("invalid unicode escape"))?;
                        s.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                    }
                    Some(c @ ('"' | '\\' | '/')) => s.push(c),
                    _ => return Err(self.error("invalid escape sequence")),
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn block_string(&mut self) -> Result<Token, ParseError> {
        for _ in 0..3 {
            self.bump();
        }
        let mut s = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated block string")),
                Some('"') if self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') => {
                    for _ in 0..3 {
                        self.bump();
                    }
                    return Ok(Token::Str(s.trim().to_string()));
                }
                Some('\\')
                    if self.peek_at(1) == Some('"')
                        && self.peek_at(2) == Some('"')
                        && self.peek_at(3) == Some('"') =>
                {
                    for _ in 0..4 {
                        self.bump();
                    }
                    s.push_str("\"\"\"");
                }
                Some(c) => {
                    s.push(c);
                    self.bump();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn skips_comments_and_commas() {
        assert_eq!(
            tokens("# header\ntype A, { id: ID! }"),
            vec![
                Token::Name("type".into()),
                Token::Name("A".into()),
                Token::Punct('{'),
                Token::Name("id".into()),
                Token::Punct(':'),
                Token::Name("ID".into()),
                Token::Punct('!'),
                Token::Punct('}'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_strings() {
        assert_eq!(
            tokens(r#"-12 1.5e3 "a\"b" """ block """"#),
            vec![
                Token::Int(-12),
                Token::Float(1500.0),
                Token::Str("a\"b".into()),
                Token::Str("block".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn reports_position_of_bad_character() {
        let err = tokenize("type A {\n  id: ID ~\n}").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 10);
    }
}
