use crate::error::Diagnostic;
use crate::expression;
use crate::lexer::tokenize;
use crate::node::{BranchLogic, CommandNode, Conditional, NodeId, ScriptTree, Symbol, SymbolKind};
use crate::parameter::{Parameter, ParameterValue};
use crate::syntax::{
    hash_tokens, ParameterSyntax, SyntaxDefinition, SyntaxLookup, SyntaxMatch, CMD_CALL_SCRIPT,
    CMD_COMMENT, CMD_EXPRESSION, CMD_NOP,
};
use crate::token::{extent, Token, TokenKind};
use crate::types::{DataType, GameVersion, ParameterType};
use std::sync::Arc;

/// Result of parsing a whole script.
#[derive(Debug)]
pub struct ParseOutput {
    pub tree: ScriptTree,
    pub diagnostics: Vec<Diagnostic>,
    /// A block was still open at the end of input. This fails the whole compile.
    pub unterminated: bool,
}

/// Line driven parser. Each line becomes one node; block commands nest the lines that follow
/// them until their `end`.
pub struct ScriptParser<'a> {
    lookup: &'a dyn SyntaxLookup,
    version: GameVersion,
    tree: ScriptTree,
    diagnostics: Vec<Diagnostic>,
    blocks: Vec<NodeId>,
    pending_skip: Option<NodeId>,
}

impl<'a> ScriptParser<'a> {
    pub fn new(lookup: &'a dyn SyntaxLookup, version: GameVersion) -> Self {
        Self {
            lookup,
            version,
            tree: ScriptTree::new(),
            diagnostics: Vec::new(),
            blocks: Vec::new(),
            pending_skip: None,
        }
    }

    pub fn parse<S: AsRef<str>>(mut self, lines: &[S]) -> ParseOutput {
        for (number, text) in lines.iter().enumerate() {
            let node = self.parse_line(number + 1, text.as_ref());
            self.insert(node);
        }

        let mut unterminated = false;
        for &open in &self.blocks {
            let node = self.tree.node(branch_opener(&self.tree, open));
            self.diagnostics.push(Diagnostic::new(
                format!("Missing 'end' for '{}'", node.text.trim()),
                node.line,
                node.start,
                node.end,
            ));
            unterminated = true;
        }

        ParseOutput {
            tree: self.tree,
            diagnostics: self.diagnostics,
            unterminated,
        }
    }

    /// Syntax a single line resolves to, if any.
    pub fn identify(
        line: &str,
        version: GameVersion,
        lookup: &dyn SyntaxLookup,
    ) -> Option<Arc<SyntaxDefinition>> {
        let mut parser = ScriptParser::new(lookup, version);
        let node = parser.parse_line(1, line);
        if parser.diagnostics.is_empty() {
            node.syntax
        } else {
            None
        }
    }

    fn current(&self) -> NodeId {
        self.blocks.last().copied().unwrap_or(self.tree.root())
    }

    fn insert(&mut self, node: CommandNode) -> NodeId {
        let logic = node.logic;

        if let Some(skip) = self.pending_skip {
            if !node.is_auxiliary() {
                self.pending_skip = None;
                let plain = !logic.opens_block()
                    && !matches!(logic, BranchLogic::End | BranchLogic::Skip);
                if plain {
                    let id = self.tree.add_child(skip, node);
                    self.record_symbols(id);
                    return id;
                }
            }
        }

        let parent = self.current();
        let id = match logic {
            BranchLogic::If | BranchLogic::While | BranchLogic::For | BranchLogic::Foreach => {
                let id = self.tree.add_child(parent, node);
                self.blocks.push(id);
                id
            }
            BranchLogic::ElseIf | BranchLogic::Else => {
                let continues = self.blocks.last().is_some_and(|&top| {
                    matches!(self.tree.node(top).logic, BranchLogic::If | BranchLogic::ElseIf)
                });
                if continues {
                    self.blocks.pop();
                    let parent = self.current();
                    let id = self.tree.add_child(parent, node);
                    self.blocks.push(id);
                    id
                } else {
                    self.tree.add_child(parent, node)
                }
            }
            BranchLogic::End => {
                self.blocks.pop();
                let parent = self.current();
                self.tree.add_child(parent, node)
            }
            BranchLogic::Skip => {
                let id = self.tree.add_child(parent, node);
                self.pending_skip = Some(id);
                id
            }
            _ => self.tree.add_child(parent, node),
        };

        self.record_symbols(id);
        id
    }

    fn record_symbols(&mut self, id: NodeId) {
        let node = self.tree.node(id);
        if node.commented {
            return;
        }

        let is_label = node.is_label();
        let is_reference = matches!(node.logic, BranchLogic::Goto | BranchLogic::Gosub);
        let Some(parameter) = node.parameters.first() else {
            return;
        };
        let symbol = Symbol {
            name: parameter.text.clone(),
            kind: SymbolKind::Label,
            node: id,
            line: node.line,
            start: parameter.start,
            end: parameter.end,
            declaration: is_label,
        };

        if is_label {
            self.tree.symbols.declare(symbol);
        } else if is_reference {
            self.tree.symbols.reference(symbol);
        }
    }

    fn syntax(&self, id: u32) -> Result<Arc<SyntaxDefinition>, String> {
        self.lookup
            .find(id, self.version)
            .ok_or_else(|| format!("Command {} is not available for {}", id, self.version))
    }

    fn parse_line(&mut self, line: usize, text: &str) -> CommandNode {
        let tokens = tokenize(text, true);

        if tokens.is_empty() {
            return match self.syntax(CMD_NOP) {
                Ok(nop) => CommandNode::new(Some(nop), Conditional::None, Vec::new(), line, text),
                Err(message) => self.placeholder(message, line, text, Conditional::None, &tokens),
            };
        }

        if tokens[0].is_operator("*") {
            return self.parse_comment(line, text, &tokens);
        }

        let (condition, command) = read_conditional(&tokens);
        match self.read_command(condition, command, line, text) {
            Ok(node) => node,
            Err(diagnostic) => {
                let node = CommandNode::new(None, condition, Vec::new(), line, text);
                self.diagnostics.push(diagnostic);
                node
            }
        }
    }

    fn placeholder(
        &mut self,
        message: String,
        line: usize,
        text: &str,
        condition: Conditional,
        tokens: &[Token],
    ) -> CommandNode {
        let (start, end) = extent(tokens);
        self.diagnostics.push(Diagnostic::new(message, line, start, end));
        CommandNode::new(None, condition, Vec::new(), line, text)
    }

    /// `* text`. When the text is itself a valid command the line is a commented command,
    /// otherwise a plain comment.
    fn parse_comment(&mut self, line: usize, text: &str, tokens: &[Token]) -> CommandNode {
        let body = tokens.get(1).filter(|t| t.kind == TokenKind::Comment);

        if let Some(body) = body {
            let inner: Vec<Token> = tokenize(&body.text, true)
                .into_iter()
                .map(|t| Token::new(t.kind, t.start + body.start, t.end + body.start, t.text))
                .collect();

            if !inner.is_empty() && !inner[0].is_operator("*") {
                let (condition, command) = read_conditional(&inner);
                if let Ok(mut node) = self.read_command(condition, command, line, text) {
                    node.commented = true;
                    node.logic = BranchLogic::None;
                    return node;
                }
            }
        }

        let syntax = match self.syntax(CMD_COMMENT) {
            Ok(syntax) => syntax,
            Err(message) => return self.placeholder(message, line, text, Conditional::None, tokens),
        };

        let (comment, start, end) = match body {
            Some(body) => (body.text.clone(), body.start, body.end),
            None => (String::new(), tokens[0].end, tokens[0].end),
        };
        let slot = syntax
            .parameter(0)
            .unwrap_or_else(|| ParameterSyntax::new(ParameterType::Comment, 0, 0));
        let parameter = Parameter::new(
            slot,
            DataType::String,
            ParameterValue::String(comment.clone()),
        )
        .with_text(&comment, start, end);

        CommandNode::new(Some(syntax), Conditional::None, vec![parameter], line, text)
    }

    fn read_command(
        &self,
        condition: Conditional,
        tokens: &[Token],
        line: usize,
        text: &str,
    ) -> Result<CommandNode, Diagnostic> {
        let Some(first) = tokens.first() else {
            let end = text.trim_end().chars().count();
            return Err(Diagnostic::new(
                format!("Missing command after '{}'", condition.text()),
                line,
                0,
                end,
            ));
        };

        let error = |message: String| {
            let (start, end) = extent(tokens);
            Diagnostic::new(message, line, start, end)
        };

        if is_array_access(condition, tokens) {
            return self.read_array_access(condition, tokens, line, text);
        }

        if is_expression(condition, tokens) {
            return self.read_expression(condition, tokens, line, text);
        }

        if let Some(position) = find_script_call(tokens) {
            return self.read_script_call(condition, tokens, position, line, text);
        }

        if let Some((found, vargs)) = self.match_standard(condition, tokens) {
            let command_tokens = &tokens[..tokens.len() - vargs.len()];
            let parameters = bind_parameters(&found, condition, command_tokens, vargs)
                .map_err(|(message, token)| Diagnostic::from_token(message, line, &token))?;
            return Ok(CommandNode::new(Some(found.syntax), condition, parameters, line, text));
        }

        // Recognisable command used with the wrong conditional
        if condition != Conditional::None {
            let full = format!("$ = {}", hash_tokens(tokens));
            if let Some(found) = self.lookup.identify(&full, self.version).first() {
                return Err(error(format!(
                    "'{}' cannot be used with '{}'",
                    found.syntax.text,
                    condition.text()
                )));
            }
        }

        let (start, end) = extent(tokens);
        let source: String = text.chars().skip(start).take(end - start).collect();
        Err(Diagnostic::new(
            format!("Unknown command '{}'", if source.is_empty() { &first.text } else { &source }),
            line,
            start,
            end,
        ))
    }

    /// `$array[index] = value` and `$value = $array[index]`, bound to the catalog's array element
    /// commands.
    fn read_array_access(
        &self,
        condition: Conditional,
        tokens: &[Token],
        line: usize,
        text: &str,
    ) -> Result<CommandNode, Diagnostic> {
        let Some(found) = self.candidates(tokens, condition).into_iter().next() else {
            let (start, end) = extent(tokens);
            return Err(Diagnostic::new(
                format!("Array access is not available for {}", self.version),
                line,
                start,
                end,
            ));
        };

        let parameters = bind_parameters(&found, condition, tokens, &[])
            .map_err(|(message, token)| Diagnostic::from_token(message, line, &token))?;
        Ok(CommandNode::new(Some(found.syntax), condition, parameters, line, text))
    }

    /// `$var = expression`, or a bare expression after a conditional.
    fn read_expression(
        &self,
        condition: Conditional,
        tokens: &[Token],
        line: usize,
        text: &str,
    ) -> Result<CommandNode, Diagnostic> {
        let syntax = self
            .syntax(CMD_EXPRESSION)
            .map_err(|message| Diagnostic::new(message, line, 0, 0))?;
        let return_syntax = syntax
            .parameter(0)
            .unwrap_or_else(|| ParameterSyntax::new(ParameterType::ReturnValueIf, 0, 0));

        let (retvar, operands) = if condition.is_test() {
            let (start, end) = extent(tokens);
            (Parameter::conditional(return_syntax, condition, start, end), tokens)
        } else {
            let retvar = Parameter::from_token(return_syntax, &tokens[0])
                .map_err(|message| Diagnostic::from_token(message, line, &tokens[0]))?;
            (retvar, &tokens[2..])
        };

        let parsed = expression::parse(operands, 1)
            .map_err(|e| Diagnostic::new(e.message, line, e.start, e.end))?;

        let mut parameters = vec![retvar];
        parameters.extend(parsed.infix);

        let mut node = CommandNode::new(Some(syntax), condition, parameters, line, text);
        node.postfix = parsed.postfix;
        Ok(node)
    }

    /// `[$ret =] [refobj ->] call script name [: [arg=]value ...]`
    fn read_script_call(
        &self,
        condition: Conditional,
        tokens: &[Token],
        position: usize,
        line: usize,
        text: &str,
    ) -> Result<CommandNode, Diagnostic> {
        let syntax = self
            .syntax(CMD_CALL_SCRIPT)
            .map_err(|message| Diagnostic::new(message, line, 0, 0))?;
        let slot = |physical: usize| {
            syntax
                .parameter(physical)
                .unwrap_or_else(|| ParameterSyntax::varg(physical))
        };
        let to_parameter = |syntax: ParameterSyntax, token: &Token| {
            Parameter::from_token(syntax, token)
                .map_err(|message| Diagnostic::from_token(message, line, token))
        };

        let mut prefix = &tokens[..position];
        let mut retvar = None;
        if prefix.len() >= 2
            && prefix[0].kind == TokenKind::Variable
            && prefix[1].is_operator("=")
        {
            retvar = Some(to_parameter(slot(1), &prefix[0])?);
            prefix = &prefix[2..];
        }

        let mut refobj = None;
        if prefix.len() == 2 && prefix[0].is_value() && prefix[1].is_operator("->") {
            refobj = Some(to_parameter(slot(2), &prefix[0])?);
            prefix = &prefix[2..];
        }

        if let Some(unexpected) = prefix.first() {
            return Err(Diagnostic::from_token(
                format!("Unexpected '{}' before 'call script'", unexpected.text),
                line,
                unexpected,
            ));
        }

        let suffix = &tokens[position + 2..];
        let name = match suffix.first() {
            Some(token) if token.kind == TokenKind::String => to_parameter(slot(0), token)?,
            Some(token) if token.kind == TokenKind::Text => Parameter::new(
                slot(0),
                DataType::String,
                ParameterValue::String(token.text.clone()),
            )
            .with_text(&token.text, token.start, token.end),
            _ => {
                let at = &tokens[position + 1];
                return Err(Diagnostic::from_token("Missing script name", line, at));
            }
        };

        let retvar = match retvar {
            Some(retvar) => retvar,
            None if condition != Conditional::None => {
                let (start, end) = extent(tokens);
                Parameter::conditional(slot(1), condition, start, end)
            }
            None => Parameter::null(slot(1)),
        };
        let refobj = refobj.unwrap_or_else(|| Parameter::null(slot(2)));
        let mut parameters = vec![name, retvar, refobj];

        let mut rest = &suffix[1..];
        if let Some(colon) = rest.first() {
            if !colon.is_operator(":") {
                return Err(Diagnostic::from_token(
                    format!("Expected ':' but found '{}'", colon.text),
                    line,
                    colon,
                ));
            }
            rest = &rest[1..];
        }

        let mut index = 0;
        while index < rest.len() {
            let token = &rest[index];
            // Argument names are for readers only
            let named = rest.get(index + 1).is_some_and(|t| t.is_operator("="));
            if token.kind == TokenKind::Text && named {
                index += 2;
                continue;
            }
            if !token.is_value() {
                return Err(Diagnostic::from_token(
                    format!("Unexpected '{}' in argument list", token.text),
                    line,
                    token,
                ));
            }
            parameters.push(to_parameter(ParameterSyntax::varg(parameters.len()), token)?);
            index += 1;
        }

        Ok(CommandNode::new(Some(syntax), condition, parameters, line, text))
    }

    fn candidates(&self, tokens: &[Token], condition: Conditional) -> Vec<SyntaxMatch> {
        let omits_return = condition != Conditional::None;
        self.lookup
            .identify(&hash_tokens(tokens), self.version)
            .into_iter()
            .filter(|m| m.omits_return == omits_return)
            .collect()
    }

    /// Finds the catalog command for the line, first as written, then with trailing values
    /// taken as variable arguments.
    fn match_standard<'t>(
        &self,
        condition: Conditional,
        tokens: &'t [Token],
    ) -> Option<(SyntaxMatch, &'t [Token])> {
        if let Some(found) = self.candidates(tokens, condition).into_iter().next() {
            return Some((found, &[]));
        }

        let trailing = tokens.iter().rev().take_while(|t| t.is_value()).count();
        for stripped in 1..=trailing {
            let (head, tail) = tokens.split_at(tokens.len() - stripped);
            let found = self
                .candidates(head, condition)
                .into_iter()
                .find(|m| m.syntax.vargs >= stripped);
            if let Some(found) = found {
                return Some((found, tail));
            }
        }
        None
    }
}

/// Splits a leading conditional off a line.
fn read_conditional(tokens: &[Token]) -> (Conditional, &[Token]) {
    let keyword = |index: usize, text: &str| tokens.get(index).is_some_and(|t| t.is_keyword(text));

    let (condition, length) = if keyword(0, "if") && keyword(1, "not") {
        (Conditional::IfNot, 2)
    } else if keyword(0, "if") {
        (Conditional::If, 1)
    } else if keyword(0, "else") && keyword(1, "if") && keyword(2, "not") {
        (Conditional::ElseIfNot, 3)
    } else if keyword(0, "else") && keyword(1, "if") {
        (Conditional::ElseIf, 2)
    } else if keyword(0, "while") && keyword(1, "not") {
        (Conditional::WhileNot, 2)
    } else if keyword(0, "while") {
        (Conditional::While, 1)
    } else if keyword(0, "skip") && keyword(1, "if") && keyword(2, "not") {
        (Conditional::SkipIfNot, 3)
    } else if keyword(0, "skip") && keyword(1, "if") {
        (Conditional::SkipIf, 2)
    } else if keyword(0, "do") && keyword(1, "if") {
        (Conditional::SkipIfNot, 2)
    } else if keyword(0, "start") && tokens.len() > 1 {
        (Conditional::Start, 1)
    } else {
        (Conditional::None, 0)
    };

    (condition, &tokens[length..])
}

/// The `if` an `else if`/`else` branch continues.
fn branch_opener(tree: &ScriptTree, mut id: NodeId) -> NodeId {
    while matches!(tree.node(id).logic, BranchLogic::ElseIf | BranchLogic::Else) {
        match tree.previous_sibling(id) {
            Some(previous) => id = previous,
            None => break,
        }
    }
    id
}

fn is_operand(token: &Token) -> bool {
    token.is_value() && token.kind != TokenKind::Label
}

fn is_operand_or_operator(token: &Token) -> bool {
    is_operand(token) || token.is_operator_kind()
}

/// `$array[index] = value`, `$value = $array[index]`, or `$array[index]` after a test.
fn is_array_access(condition: Conditional, tokens: &[Token]) -> bool {
    let element = |at: usize| {
        tokens.get(at).is_some_and(|t| t.kind == TokenKind::Variable)
            && tokens.get(at + 1).is_some_and(|t| t.is_operator("["))
            && tokens.get(at + 2).is_some_and(is_operand)
            && tokens.get(at + 3).is_some_and(|t| t.is_operator("]"))
    };

    if condition.is_test() {
        return tokens.len() == 4 && element(0);
    }

    let assigns = |at: usize| tokens.get(at).is_some_and(|t| t.is_operator("="));
    condition == Conditional::None
        && tokens.len() == 6
        && ((element(0) && assigns(4) && is_operand(&tokens[5]))
            || (tokens[0].kind == TokenKind::Variable && assigns(1) && element(2)))
}

fn is_expression(condition: Conditional, tokens: &[Token]) -> bool {
    if condition.is_test() {
        return tokens.iter().all(is_operand_or_operator);
    }

    condition == Conditional::None
        && tokens.len() > 2
        && tokens[0].kind == TokenKind::Variable
        && tokens[1].is_operator("=")
        && tokens[2..].iter().all(is_operand_or_operator)
}

fn find_script_call(tokens: &[Token]) -> Option<usize> {
    tokens
        .windows(2)
        .position(|pair| {
            pair[0].is(TokenKind::Text, "call") && pair[1].is(TokenKind::Text, "script")
        })
}

/// Binds value tokens to the matched syntax's parameters, in physical order, followed by
/// variable arguments padded with null.
fn bind_parameters(
    found: &SyntaxMatch,
    condition: Conditional,
    tokens: &[Token],
    vargs: &[Token],
) -> Result<Vec<Parameter>, (String, Token)> {
    let syntax = &found.syntax;
    let mut slots: Vec<Option<Parameter>> = vec![None; syntax.parameters.len()];
    let offset = usize::from(found.omits_return);

    if found.omits_return {
        if let Some(return_syntax) = syntax.parameter_at_display(0) {
            let (start, end) = extent(tokens);
            slots[return_syntax.physical_index] =
                Some(Parameter::conditional(return_syntax, condition, start, end));
        }
    }

    for (display, token) in tokens.iter().filter(|t| t.is_value()).enumerate() {
        let Some(slot) = syntax.parameter_at_display(display + offset) else {
            return Err((format!("Unexpected '{}'", token.text), token.clone()));
        };
        let parameter =
            Parameter::from_token(slot, token).map_err(|message| (message, token.clone()))?;
        slots[slot.physical_index] = Some(parameter);
    }

    let mut parameters: Vec<Parameter> = slots.into_iter().flatten().collect();
    for token in vargs {
        let parameter = Parameter::from_token(ParameterSyntax::varg(parameters.len()), token)
            .map_err(|message| (message, token.clone()))?;
        parameters.push(parameter);
    }
    while parameters.len() < syntax.parameters.len() + syntax.vargs {
        parameters.push(Parameter::null(ParameterSyntax::varg(parameters.len())));
    }
    Ok(parameters)
}
