use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum TokenKind {
    Text,
    Number,
    String,          // 'text'
    GameObject,      // {Argon Prime}
    ScriptObject,    // [THIS]
    Keyword,         // if, while, end ...
    Variable,        // $name
    Null,            // null
    Label,           // label: / goto label
    UnaryOperator,   // ( ) ~ , : [ ] !
    BinaryOperator,  // + - * / == != -> AND ...
    Comment,
    Whitespace,
}

/// A single lexed token. `start` and `end` are a half-open character range within the line.
#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, start: usize, end: usize, text: String) -> Self {
        Self {
            kind,
            start,
            end,
            text,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Matches kind and exact (case sensitive) text.
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    pub fn is_keyword(&self, text: &str) -> bool {
        self.is(TokenKind::Keyword, text)
    }

    pub fn is_operator(&self, text: &str) -> bool {
        self.is_operator_kind() && self.text == text
    }

    /// Tokens that occupy a parameter slot in a command.
    pub fn is_value(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Variable
                | TokenKind::Number
                | TokenKind::String
                | TokenKind::GameObject
                | TokenKind::ScriptObject
                | TokenKind::Null
                | TokenKind::Label
        )
    }

    pub fn is_operator_kind(&self) -> bool {
        matches!(self.kind, TokenKind::UnaryOperator | TokenKind::BinaryOperator)
    }
}

/// Character range covered by a run of tokens, `(0, 0)` when empty.
pub fn extent(tokens: &[Token]) -> (usize, usize) {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => (first.start, last.end),
        _ => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_tokens() {
        let var = Token::new(TokenKind::Variable, 0, 4, "$foo".to_string());
        let text = Token::new(TokenKind::Text, 5, 8, "get".to_string());
        assert!(var.is_value());
        assert!(!text.is_value());
        assert_eq!(var.len(), 4);
    }

    #[test]
    fn extent_of_tokens() {
        let tokens = vec![
            Token::new(TokenKind::Keyword, 2, 4, "if".to_string()),
            Token::new(TokenKind::Whitespace, 4, 5, " ".to_string()),
            Token::new(TokenKind::Variable, 5, 7, "$a".to_string()),
        ];
        assert_eq!(extent(&tokens), (2, 7));
        assert_eq!(extent(&[]), (0, 0));
    }
}
