use crate::token::{Token, TokenKind};

/// Keywords recognised when they open a line.
const LEADING_KEYWORDS: [&str; 16] = [
    "if", "do", "end", "for", "dim", "else", "skip", "goto", "while", "break", "gosub", "start",
    "return", "endsub", "foreach", "continue",
];

/// Lexes a single newline-stripped line of MSCI source.
///
/// Lexing is total: every character ends up in some token, unrecognised runs become
/// [`TokenKind::Text`]. With whitespace emitted, the token texts concatenate back to the input.
pub struct Lexer {
    chars: Vec<char>,
    current: usize,
    skip_whitespace: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(line: &str, skip_whitespace: bool) -> Self {
        Self {
            chars: line.chars().collect(),
            current: 0,
            skip_whitespace,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        while !self.is_eof() {
            let start = self.current;

            if self.match_whitespace() {
                let token = self.read_whitespace(start);
                if !self.skip_whitespace {
                    self.tokens.push(token);
                }
                continue;
            }

            let token = if self.is_comment_position() {
                self.read_comment(start)
            } else if self.match_number() {
                self.read_number(start)
            } else {
                match self.at() {
                    '$' => self.read_variable(start),
                    '{' => self.read_game_object(start),
                    '\'' => self.read_string(start),
                    _ => self.read_ambiguous(start),
                }
            };
            self.tokens.push(token);
        }

        self.tokens
    }

    fn at(&self) -> char {
        if self.current >= self.chars.len() {
            '\0'
        } else {
            self.chars[self.current]
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.current + offset).copied()
    }

    fn is_eof(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            self.current += 1;
        }
    }

    fn create_token(&self, start: usize, kind: TokenKind) -> Token {
        let text: String = self.chars[start..self.current].iter().collect();
        Token::new(kind, start, self.current, text)
    }

    fn significant(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|t| t.kind != TokenKind::Whitespace)
    }

    fn match_char(&self, ch: char) -> bool {
        !self.is_eof() && self.at() == ch
    }

    /// Case sensitive match of `text` starting at `position`.
    fn match_chars(&self, position: usize, text: &str) -> bool {
        let mut index = position;
        for ch in text.chars() {
            if self.chars.get(index) != Some(&ch) {
                return false;
            }
            index += 1;
        }
        true
    }

    fn match_whitespace(&self) -> bool {
        !self.is_eof() && self.at().is_whitespace()
    }

    fn match_digit(&self) -> bool {
        !self.is_eof() && self.at().is_ascii_digit()
    }

    fn match_number(&self) -> bool {
        self.match_digit()
            || (self.match_char('-') && self.peek(1).is_some_and(|c| c.is_ascii_digit()))
    }

    fn match_variable_char(&self) -> bool {
        !self.is_eof() && (self.at().is_alphanumeric() || self.at() == '.' || self.at() == '_')
    }

    fn match_constant(&self) -> bool {
        self.match_char('[') && self.peek(1).is_some_and(|c| c.is_alphabetic())
    }

    fn match_operator(&self) -> bool {
        if self.is_eof() {
            return false;
        }

        match self.at() {
            '=' | '<' | '>' | '!' | '~' | '-' | '+' | '*' | '/' | '&' | '^' | '|' => true,
            '(' | ')' | ',' | ':' | '[' | ']' | '%' | '}' => true,
            'A' => self.match_chars(self.current, "AND"),
            'O' => self.match_chars(self.current, "OR"),
            'M' => self.match_chars(self.current, "MOD"),
            _ => false,
        }
    }

    fn match_text(&self) -> bool {
        if self.is_eof() {
            return false;
        }

        match self.at() {
            '=' | '<' | '>' | '!' | '~' | '-' | '+' | '*' | '/' | '&' | '^' | '|' => false,
            '(' | ')' | ',' | ':' | '[' | ']' | '$' | '{' | '}' | '\'' | '%' => false,
            ch => !ch.is_whitespace(),
        }
    }

    /// A lone '*' as the first token turns the rest of the line into a comment.
    fn is_comment_position(&self) -> bool {
        let mut significant = self.significant();
        matches!(significant.next(), Some(first) if first.is_operator("*"))
            && significant.next().is_none()
    }

    fn read_whitespace(&mut self, start: usize) -> Token {
        while self.match_whitespace() {
            self.advance();
        }
        self.create_token(start, TokenKind::Whitespace)
    }

    fn read_comment(&mut self, start: usize) -> Token {
        self.current = self.chars.len();
        self.create_token(start, TokenKind::Comment)
    }

    fn read_number(&mut self, start: usize) -> Token {
        // leading digit or minus sign
        self.advance();
        while self.match_digit() {
            self.advance();
        }
        self.create_token(start, TokenKind::Number)
    }

    fn read_variable(&mut self, start: usize) -> Token {
        self.advance();
        while self.match_variable_char() {
            self.advance();
        }

        // A bare sigil has no name to reference
        if self.current - start > 1 {
            self.create_token(start, TokenKind::Variable)
        } else {
            self.create_token(start, TokenKind::UnaryOperator)
        }
    }

    fn read_game_object(&mut self, start: usize) -> Token {
        self.advance();
        while !self.is_eof() && self.at() != '}' {
            self.advance();
        }
        if self.match_char('}') {
            self.advance();
        }
        self.create_token(start, TokenKind::GameObject)
    }

    fn read_string(&mut self, start: usize) -> Token {
        let mut escaped = false;
        self.advance();

        while !self.is_eof() {
            let ch = self.at();
            if ch == '\\' {
                escaped = !escaped;
                self.advance();
                continue;
            }
            if ch == '\'' && !escaped {
                self.advance();
                break;
            }
            escaped = false;
            self.advance();
        }

        self.create_token(start, TokenKind::String)
    }

    fn read_ambiguous(&mut self, start: usize) -> Token {
        // '[' followed by a letter is a constant, not an operator
        if self.match_constant() {
            return self.read_constant(start);
        }
        if self.match_operator() {
            return self.read_operator(start);
        }
        self.read_text(start)
    }

    fn read_constant(&mut self, start: usize) -> Token {
        self.advance();
        while !self.is_eof() && self.at() != ']' {
            self.advance();
        }
        if self.match_char(']') {
            self.advance();
        }
        self.create_token(start, TokenKind::ScriptObject)
    }

    fn read_operator(&mut self, start: usize) -> Token {
        let ch = self.at();
        match ch {
            '+' | '*' | '/' | '^' | '%' => {
                self.advance();
            }
            '(' | ')' | '~' | ',' | ':' | '[' | ']' | '}' => {
                self.advance();
                return self.create_token(start, TokenKind::UnaryOperator);
            }
            '&' | '|' => {
                self.advance();
                if self.match_char(ch) {
                    self.advance();
                }
            }
            '-' => {
                // '-' is always binary here, unary minus is identified by the parser
                self.advance();
                if self.match_char('>') {
                    self.advance();
                }
            }
            '<' | '>' | '!' | '=' => {
                self.advance();
                if self.match_char('=') {
                    self.advance();
                } else if ch == '!' {
                    return self.create_token(start, TokenKind::UnaryOperator);
                }
            }
            'O' => self.current += 2,
            'A' | 'M' => self.current += 3,
            _ => unreachable!("unable to read previously matched operator {:?}", ch),
        }

        self.create_token(start, TokenKind::BinaryOperator)
    }

    fn read_text(&mut self, start: usize) -> Token {
        self.advance();
        while self.match_text() {
            self.advance();
        }

        let text: String = self.chars[start..self.current].iter().collect();
        if text == "null" {
            return self.create_token(start, TokenKind::Null);
        }

        let keyword = match self.significant().count() {
            0 => {
                if self.match_char(':') {
                    return self.create_token(start, TokenKind::Label);
                }
                LEADING_KEYWORDS.contains(&text.as_str())
            }
            1 => {
                if self.significant().any(|t| t.text == "goto" || t.text == "gosub") {
                    return self.create_token(start, TokenKind::Label);
                }
                text == "if" || text == "not"
            }
            2 => text == "not",
            _ => false,
        };

        if keyword {
            self.create_token(start, TokenKind::Keyword)
        } else {
            self.create_token(start, TokenKind::Text)
        }
    }
}

/// Lexes one line.
pub fn tokenize(line: &str, skip_whitespace: bool) -> Vec<Token> {
    Lexer::new(line, skip_whitespace).tokenize()
}
