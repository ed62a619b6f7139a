use crate::parameter::Parameter;
use crate::syntax::ParameterSyntax;
use crate::token::{Token, TokenKind};
use std::fmt;

/// Expression operators. The discriminant is the operator code written to compiled scripts.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(i32)]
pub enum Operator {
    LogicalOr = 0,
    LogicalAnd = 1,
    BitwiseOr = 2,
    BitwiseXor = 3,
    BitwiseAnd = 4,
    Equal = 5,
    NotEqual = 6,
    Less = 7,
    Greater = 8,
    LessEqual = 9,
    GreaterEqual = 10,
    Add = 11,
    Subtract = 12,
    Multiply = 13,
    Divide = 14,
    Modulus = 15,
    Minus = 16,
    LogicalNot = 17,
    BitwiseNot = 18,
    OpenBracket = 19,
    CloseBracket = 20,
}

impl Operator {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn binary(text: &str) -> Option<Self> {
        let operator = match text {
            "OR" | "||" => Operator::LogicalOr,
            "AND" | "&&" => Operator::LogicalAnd,
            "|" => Operator::BitwiseOr,
            "^" => Operator::BitwiseXor,
            "&" => Operator::BitwiseAnd,
            "==" => Operator::Equal,
            "!=" => Operator::NotEqual,
            "<" => Operator::Less,
            ">" => Operator::Greater,
            "<=" => Operator::LessEqual,
            ">=" => Operator::GreaterEqual,
            "+" => Operator::Add,
            "-" => Operator::Subtract,
            "*" => Operator::Multiply,
            "/" => Operator::Divide,
            "MOD" | "%" => Operator::Modulus,
            _ => return None,
        };
        Some(operator)
    }

    pub fn unary(text: &str) -> Option<Self> {
        match text {
            "-" => Some(Operator::Minus),
            "!" => Some(Operator::LogicalNot),
            "~" => Some(Operator::BitwiseNot),
            _ => None,
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Operator::Minus | Operator::LogicalNot | Operator::BitwiseNot)
    }

    /// Binding strength, higher binds tighter. All binary operators are left associative.
    pub fn precedence(self) -> u8 {
        match self {
            Operator::LogicalOr => 1,
            Operator::LogicalAnd => 2,
            Operator::BitwiseOr => 3,
            Operator::BitwiseXor => 4,
            Operator::BitwiseAnd => 5,
            Operator::Equal | Operator::NotEqual => 6,
            Operator::Less | Operator::Greater | Operator::LessEqual | Operator::GreaterEqual => 7,
            Operator::Add | Operator::Subtract => 8,
            Operator::Multiply | Operator::Divide | Operator::Modulus => 9,
            Operator::Minus | Operator::LogicalNot | Operator::BitwiseNot => 10,
            Operator::OpenBracket | Operator::CloseBracket => 0,
        }
    }
}

/// An expression in both orders: `infix` as written (brackets included) and `postfix` for
/// evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub infix: Vec<Parameter>,
    pub postfix: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionError {
    pub message: String,
    pub start: usize,
    pub end: usize,
}

impl ExpressionError {
    fn at(message: String, token: &Token) -> Self {
        Self {
            message,
            start: token.start,
            end: token.end,
        }
    }
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

struct ShuntingYard {
    infix: Vec<Parameter>,
    postfix: Vec<Parameter>,
    stack: Vec<(Operator, Token)>,
    expect_operand: bool,
    first_index: usize,
}

/// Converts the tokens of an infix expression. `first_index` numbers the infix parameters,
/// so they can follow a return value slot.
pub fn parse(tokens: &[Token], first_index: usize) -> Result<Expression, ExpressionError> {
    let Some(last) = tokens.last() else {
        return Err(ExpressionError {
            message: "Expression is empty".to_string(),
            start: 0,
            end: 0,
        });
    };

    let mut yard = ShuntingYard {
        infix: Vec::new(),
        postfix: Vec::new(),
        stack: Vec::new(),
        expect_operand: true,
        first_index,
    };

    for token in tokens.iter().filter(|t| t.kind != TokenKind::Whitespace) {
        yard.push(token)?;
    }
    yard.finish(last)
}

impl ShuntingYard {
    fn push(&mut self, token: &Token) -> Result<(), ExpressionError> {
        if token.is_value() && token.kind != TokenKind::Label {
            if self.expect_operand {
                return self.push_operand(token);
            }

            // '5 -3' lexes as two numbers
            if token.kind == TokenKind::Number && token.text.starts_with('-') {
                let minus = Token::new(
                    TokenKind::BinaryOperator,
                    token.start,
                    token.start + 1,
                    "-".to_string(),
                );
                let number = Token::new(
                    TokenKind::Number,
                    token.start + 1,
                    token.end,
                    token.text[1..].to_string(),
                );
                self.push_binary(Operator::Subtract, &minus);
                return self.push_operand(&number);
            }

            return Err(ExpressionError::at(
                format!("Missing operator before '{}'", token.text),
                token,
            ));
        }

        if token.is_operator("(") {
            if !self.expect_operand {
                return Err(ExpressionError::at("Missing operator before '('".to_string(), token));
            }
            self.push_infix_operator(Operator::OpenBracket, token);
            self.stack.push((Operator::OpenBracket, token.clone()));
            return Ok(());
        }

        if token.is_operator(")") {
            if self.expect_operand {
                return Err(ExpressionError::at("Missing operand before ')'".to_string(), token));
            }
            self.push_infix_operator(Operator::CloseBracket, token);
            loop {
                match self.stack.pop() {
                    Some((Operator::OpenBracket, _)) => break,
                    Some((operator, source)) => self.push_postfix_operator(operator, &source),
                    None => {
                        return Err(ExpressionError::at("Unmatched ')'".to_string(), token));
                    }
                }
            }
            return Ok(());
        }

        if token.is_operator_kind() {
            if self.expect_operand {
                if let Some(operator) = Operator::unary(&token.text) {
                    self.push_infix_operator(operator, token);
                    self.stack.push((operator, token.clone()));
                    return Ok(());
                }
            } else if let Some(operator) = Operator::binary(&token.text) {
                self.push_binary(operator, token);
                return Ok(());
            }
        }

        Err(ExpressionError::at(
            format!("Unexpected '{}' in expression", token.text),
            token,
        ))
    }

    fn push_operand(&mut self, token: &Token) -> Result<(), ExpressionError> {
        let syntax = ParameterSyntax::expression(self.first_index + self.infix.len());
        let parameter = Parameter::from_token(syntax, token)
            .map_err(|message| ExpressionError::at(message, token))?;

        self.infix.push(parameter.clone());
        self.postfix.push(Parameter {
            syntax: ParameterSyntax::expression(self.postfix.len()),
            ..parameter
        });
        self.expect_operand = false;
        Ok(())
    }

    fn push_binary(&mut self, operator: Operator, token: &Token) {
        while let Some((top, _)) = self.stack.last() {
            if *top == Operator::OpenBracket || top.precedence() < operator.precedence() {
                break;
            }
            if let Some((top, source)) = self.stack.pop() {
                self.push_postfix_operator(top, &source);
            }
        }

        self.push_infix_operator(operator, token);
        self.stack.push((operator, token.clone()));
        self.expect_operand = true;
    }

    fn push_infix_operator(&mut self, operator: Operator, token: &Token) {
        let syntax = ParameterSyntax::expression(self.first_index + self.infix.len());
        self.infix.push(Parameter::operator(syntax, operator, token));
    }

    fn push_postfix_operator(&mut self, operator: Operator, token: &Token) {
        let syntax = ParameterSyntax::expression(self.postfix.len());
        self.postfix.push(Parameter::operator(syntax, operator, token));
    }

    fn finish(mut self, last: &Token) -> Result<Expression, ExpressionError> {
        if self.expect_operand {
            return Err(ExpressionError::at(
                "Missing operand at end of expression".to_string(),
                last,
            ));
        }

        while let Some((operator, token)) = self.stack.pop() {
            if operator == Operator::OpenBracket {
                return Err(ExpressionError::at("Unmatched '('".to_string(), &token));
            }
            self.push_postfix_operator(operator, &token);
        }

        Ok(Expression {
            infix: self.infix,
            postfix: self.postfix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn postfix(source: &str) -> Vec<String> {
        parse(&tokenize(source, true), 1)
            .unwrap()
            .postfix
            .into_iter()
            .map(|p| p.text)
            .collect()
    }

    fn error(source: &str) -> String {
        parse(&tokenize(source, true), 1).unwrap_err().message
    }

    #[test]
    fn precedence_orders_postfix() {
        assert_eq!(postfix("1 + 2 * 3"), vec!["1", "2", "3", "*", "+"]);
        assert_eq!(postfix("1 * 2 + 3"), vec!["1", "2", "*", "3", "+"]);
        assert_eq!(postfix("$a == 1 AND $b < 2"), vec!["$a", "1", "==", "$b", "2", "<", "AND"]);
    }

    #[test]
    fn brackets_group() {
        assert_eq!(postfix("(1 + 2) * 3"), vec!["1", "2", "+", "3", "*"]);
        assert_eq!(postfix("((($a)))"), vec!["$a"]);
    }

    #[test]
    fn left_associative() {
        assert_eq!(postfix("1 - 2 - 3"), vec!["1", "2", "-", "3", "-"]);
        assert_eq!(postfix("8 / 4 / 2"), vec!["8", "4", "/", "2", "/"]);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(postfix("- $a + 1"), vec!["$a", "-", "1", "+"]);
        assert_eq!(postfix("! $a && ~ $b"), vec!["$a", "!", "$b", "~", "&&"]);
        assert_eq!(postfix("- - 5"), vec!["5", "-", "-"]);
        assert_eq!(postfix("2 * -3"), vec!["2", "-3", "*"]);
    }

    #[test]
    fn negative_number_after_operand_is_subtraction() {
        let expression = parse(&tokenize("5 -3", true), 1).unwrap();
        let texts: Vec<_> = expression.postfix.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["5", "3", "-"]);
        assert_eq!(expression.infix.len(), 3);
    }

    #[test]
    fn infix_keeps_source_order_with_brackets() {
        let expression = parse(&tokenize("($a + 1) * 2", true), 1).unwrap();
        let texts: Vec<_> = expression.infix.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["(", "$a", "+", "1", ")", "*", "2"]);
        assert_eq!(expression.infix[0].syntax.physical_index, 1);
        assert_eq!(expression.postfix[0].syntax.physical_index, 0);
    }

    #[test]
    fn operator_codes_in_postfix() {
        let expression = parse(&tokenize("$a MOD 2", true), 1).unwrap();
        assert_eq!(
            expression.postfix[2].value,
            crate::parameter::ParameterValue::Int(Operator::Modulus.code())
        );
    }

    #[test]
    fn malformed_expressions() {
        assert_eq!(error("1 +"), "Missing operand at end of expression");
        assert_eq!(error("(1 + 2"), "Unmatched '('");
        assert_eq!(error("1 + 2)"), "Unmatched ')'");
        assert_eq!(error("1 2"), "Missing operator before '2'");
        assert_eq!(error("1 + get"), "Unexpected 'get' in expression");
        assert_eq!(parse(&[], 1).unwrap_err().message, "Expression is empty");
    }
}
