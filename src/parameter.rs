use crate::expression::Operator;
use crate::node::Conditional;
use crate::syntax::ParameterSyntax;
use crate::token::{Token, TokenKind};
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    Int(i32),
    String(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParameterValue::Int(value) => write!(f, "{}", value),
            ParameterValue::String(value) => write!(f, "{}", value),
        }
    }
}

/// A parameter bound to a command, with the character range it came from.
#[derive(Debug, PartialEq, Clone)]
pub struct Parameter {
    pub syntax: ParameterSyntax,
    pub data_type: DataType,
    pub value: ParameterValue,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Parameter {
    pub fn new(syntax: ParameterSyntax, data_type: DataType, value: ParameterValue) -> Self {
        Self {
            syntax,
            data_type,
            value,
            text: String::new(),
            start: 0,
            end: 0,
        }
    }

    /// Converts a value token; fails only for numbers that do not fit 32 bits.
    pub fn from_token(syntax: ParameterSyntax, token: &Token) -> Result<Self, String> {
        let (data_type, value) = match token.kind {
            TokenKind::Variable => (
                DataType::Variable,
                ParameterValue::String(token.text[1..].to_string()),
            ),
            TokenKind::Number => {
                let number = token
                    .text
                    .parse::<i32>()
                    .map_err(|_| format!("Number '{}' is out of range", token.text))?;
                (DataType::Integer, ParameterValue::Int(number))
            }
            TokenKind::String => (
                DataType::String,
                ParameterValue::String(unquote(&token.text)),
            ),
            TokenKind::GameObject => (
                DataType::Object,
                ParameterValue::String(strip_brackets(&token.text, '{', '}')),
            ),
            TokenKind::ScriptObject => (
                DataType::Constant,
                ParameterValue::String(strip_brackets(&token.text, '[', ']')),
            ),
            TokenKind::Null => (DataType::Null, ParameterValue::Int(0)),
            TokenKind::Label => (DataType::String, ParameterValue::String(token.text.clone())),
            _ => return Err(format!("'{}' is not a value", token.text)),
        };

        Ok(Self {
            syntax,
            data_type,
            value,
            text: token.text.clone(),
            start: token.start,
            end: token.end,
        })
    }

    pub fn operator(syntax: ParameterSyntax, operator: Operator, token: &Token) -> Self {
        Self {
            syntax,
            data_type: DataType::Operator,
            value: ParameterValue::Int(operator.code()),
            text: token.text.clone(),
            start: token.start,
            end: token.end,
        }
    }

    /// Return slot holding a conditional instead of a variable.
    pub fn conditional(
        syntax: ParameterSyntax,
        condition: Conditional,
        start: usize,
        end: usize,
    ) -> Self {
        Self {
            syntax,
            data_type: DataType::Integer,
            value: ParameterValue::Int(condition.code()),
            text: String::new(),
            start,
            end,
        }
    }

    pub fn null(syntax: ParameterSyntax) -> Self {
        Self::new(syntax, DataType::Null, ParameterValue::Int(0))
    }

    pub fn with_text(mut self, text: &str, start: usize, end: usize) -> Self {
        self.text = text.to_string();
        self.start = start;
        self.end = end;
        self
    }

    pub fn variable_name(&self) -> Option<&str> {
        match (&self.data_type, &self.value) {
            (DataType::Variable, ParameterValue::String(name)) => Some(name),
            _ => None,
        }
    }
}

fn strip_brackets(text: &str, open: char, close: char) -> String {
    let inner = text.strip_prefix(open).unwrap_or(text);
    inner.strip_suffix(close).unwrap_or(inner).to_string()
}

/// Removes the enclosing apostrophes and resolves `\'` and `\\`.
fn unquote(text: &str) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    if chars.first() == Some(&'\'') {
        chars.remove(0);
    }

    // Drop the closing quote unless it was escaped
    if chars.last() == Some(&'\'') {
        let backslashes = chars[..chars.len() - 1]
            .iter()
            .rev()
            .take_while(|&&c| c == '\\')
            .count();
        if backslashes % 2 == 0 {
            chars.pop();
        }
    }

    let mut value = String::with_capacity(chars.len());
    let mut escaped = false;
    for ch in chars {
        if ch == '\\' && !escaped {
            escaped = true;
            continue;
        }
        value.push(ch);
        escaped = false;
    }
    value
}
