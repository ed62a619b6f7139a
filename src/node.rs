use crate::parameter::Parameter;
use crate::syntax::{
    CommandKind, SyntaxDefinition, CMD_BREAK, CMD_CONTINUE, CMD_DEFINE_LABEL, CMD_ELSE, CMD_END,
    CMD_FOREACH, CMD_FOR_LOOP, CMD_GOSUB, CMD_GOTO_LABEL, CMD_RETURN,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handle of a node inside a [`ScriptTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Conditional prefix of a command. The code is what a conditional return slot stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conditional {
    #[default]
    None,
    Start,
    If,
    IfNot,
    ElseIf,
    ElseIfNot,
    While,
    WhileNot,
    SkipIf,
    SkipIfNot,
}

impl Conditional {
    pub fn code(self) -> i32 {
        match self {
            Conditional::None => 0,
            Conditional::Start => 1,
            Conditional::If => 2,
            Conditional::IfNot => 3,
            Conditional::ElseIf => 4,
            Conditional::ElseIfNot => 5,
            Conditional::While => 6,
            Conditional::WhileNot => 7,
            Conditional::SkipIf => 8,
            Conditional::SkipIfNot => 9,
        }
    }

    /// Conditionals that test the command's result.
    pub fn is_test(self) -> bool {
        !matches!(self, Conditional::None | Conditional::Start)
    }

    pub fn text(self) -> &'static str {
        match self {
            Conditional::None => "",
            Conditional::Start => "start",
            Conditional::If => "if",
            Conditional::IfNot => "if not",
            Conditional::ElseIf => "else if",
            Conditional::ElseIfNot => "else if not",
            Conditional::While => "while",
            Conditional::WhileNot => "while not",
            Conditional::SkipIf => "skip if",
            Conditional::SkipIfNot => "skip if not",
        }
    }
}

/// What a node does to control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BranchLogic {
    #[default]
    None,
    If,
    ElseIf,
    Else,
    End,
    While,
    For,
    Foreach,
    Skip,
    Break,
    Continue,
    Goto,
    Gosub,
    Return,
}

impl BranchLogic {
    pub fn from_syntax(id: Option<u32>, condition: Conditional) -> Self {
        match condition {
            Conditional::If | Conditional::IfNot => return BranchLogic::If,
            Conditional::ElseIf | Conditional::ElseIfNot => return BranchLogic::ElseIf,
            Conditional::While | Conditional::WhileNot => return BranchLogic::While,
            Conditional::SkipIf | Conditional::SkipIfNot => return BranchLogic::Skip,
            Conditional::None | Conditional::Start => {}
        }

        match id {
            Some(CMD_ELSE) => BranchLogic::Else,
            Some(CMD_END) => BranchLogic::End,
            Some(CMD_FOR_LOOP) => BranchLogic::For,
            Some(CMD_FOREACH) => BranchLogic::Foreach,
            Some(CMD_BREAK) => BranchLogic::Break,
            Some(CMD_CONTINUE) => BranchLogic::Continue,
            Some(CMD_GOTO_LABEL) => BranchLogic::Goto,
            Some(CMD_GOSUB) => BranchLogic::Gosub,
            Some(CMD_RETURN) => BranchLogic::Return,
            _ => BranchLogic::None,
        }
    }

    pub fn is_loop(self) -> bool {
        matches!(self, BranchLogic::While | BranchLogic::For | BranchLogic::Foreach)
    }

    /// Nodes that own the commands up to their terminator.
    pub fn opens_block(self) -> bool {
        matches!(
            self,
            BranchLogic::If
                | BranchLogic::ElseIf
                | BranchLogic::Else
                | BranchLogic::While
                | BranchLogic::For
                | BranchLogic::Foreach
        )
    }
}

/// One parsed line, or a synthesized jump/return.
#[derive(Debug, Clone)]
pub struct CommandNode {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub logic: BranchLogic,
    pub condition: Conditional,
    pub syntax: Option<Arc<SyntaxDefinition>>,
    /// Parameters in physical order; expressions hold the return slot followed by the infix list.
    pub parameters: Vec<Parameter>,
    /// Expression operands and operators in evaluation order.
    pub postfix: Vec<Parameter>,
    pub jump_target: Option<NodeId>,
    pub index: Option<usize>,
    pub line: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub commented: bool,
    pub synthetic: bool,
}

impl CommandNode {
    pub fn new(
        syntax: Option<Arc<SyntaxDefinition>>,
        condition: Conditional,
        parameters: Vec<Parameter>,
        line: usize,
        text: &str,
    ) -> Self {
        let logic = BranchLogic::from_syntax(syntax.as_ref().map(|s| s.id), condition);
        let start = text.chars().take_while(|c| c.is_whitespace()).count();
        let end = text.trim_end().chars().count().max(start);

        Self {
            parent: None,
            children: Vec::new(),
            logic,
            condition,
            syntax,
            parameters,
            postfix: Vec::new(),
            jump_target: None,
            index: None,
            line,
            start,
            end,
            text: text.to_string(),
            commented: false,
            synthetic: false,
        }
    }

    /// A node with no source line of its own.
    pub fn synthetic(
        syntax: Arc<SyntaxDefinition>,
        parameters: Vec<Parameter>,
        line: usize,
    ) -> Self {
        let text = syntax.text.clone();
        let mut node = Self::new(Some(syntax), Conditional::None, parameters, line, &text);
        node.start = 0;
        node.end = 0;
        node.synthetic = true;
        node
    }

    pub fn syntax_id(&self) -> Option<u32> {
        self.syntax.as_ref().map(|s| s.id)
    }

    pub fn kind(&self) -> Option<CommandKind> {
        self.syntax.as_ref().map(|s| s.kind)
    }

    /// Structural nodes that mark a block boundary but are never emitted.
    pub fn is_virtual(&self) -> bool {
        !self.commented && matches!(self.logic, BranchLogic::Else | BranchLogic::End)
    }

    /// Commands that take an index in the standard command list.
    pub fn is_executable(&self) -> bool {
        !self.commented
            && !self.is_virtual()
            && matches!(
                self.kind(),
                Some(CommandKind::Standard | CommandKind::Expression | CommandKind::ScriptCall)
            )
    }

    /// Blank lines, comments and commented commands.
    pub fn is_auxiliary(&self) -> bool {
        self.commented || matches!(self.kind(), Some(CommandKind::Comment | CommandKind::Auxiliary))
    }

    pub fn is_label(&self) -> bool {
        !self.commented && self.syntax_id() == Some(CMD_DEFINE_LABEL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Label,
    Variable,
}

/// A named occurrence within the script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub node: NodeId,
    pub line: usize,
    pub start: usize,
    pub end: usize,
    pub declaration: bool,
}

/// Label declarations and goto/gosub references. References are bound to their
/// declaration after the whole script has been parsed.
#[derive(Debug, Default)]
pub struct SymbolTable {
    pub labels: Vec<Symbol>,
    pub references: Vec<Symbol>,
    resolved: HashMap<NodeId, NodeId>,
}

impl SymbolTable {
    pub fn declare(&mut self, symbol: Symbol) {
        self.labels.push(symbol);
    }

    pub fn reference(&mut self, symbol: Symbol) {
        self.references.push(symbol);
    }

    /// First declaration of `name`.
    pub fn declaration(&self, name: &str) -> Option<&Symbol> {
        self.labels.iter().find(|l| l.name == name)
    }

    pub fn resolve(&mut self, from: NodeId, to: NodeId) {
        self.resolved.insert(from, to);
    }

    pub fn target(&self, from: NodeId) -> Option<NodeId> {
        self.resolved.get(&from).copied()
    }
}

/// Arena holding the parse tree. Node 0 is the root, which has no syntax.
#[derive(Debug)]
pub struct ScriptTree {
    nodes: Vec<CommandNode>,
    pub symbols: SymbolTable,
}

impl Default for ScriptTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptTree {
    pub fn new() -> Self {
        let root = CommandNode::new(None, Conditional::None, Vec::new(), 0, "");
        Self {
            nodes: vec![root],
            symbols: SymbolTable::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn node(&self, id: NodeId) -> &CommandNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut CommandNode {
        &mut self.nodes[id.0]
    }

    pub fn add_child(&mut self, parent: NodeId, mut node: CommandNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Every node below the root, depth first in source order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> =
            self.node(self.root()).children.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        order
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = &self.node(self.node(id).parent?).children;
        let position = siblings.iter().position(|&c| c == id)?;
        position.checked_sub(1).map(|p| siblings[p])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let siblings = &self.node(self.node(id).parent?).children;
        let position = siblings.iter().position(|&c| c == id)?;
        siblings.get(position + 1).copied()
    }

    /// First node after `id` and its descendants in source order.
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if let Some(next) = self.next_sibling(current) {
                return Some(next);
            }
            current = self.node(current).parent?;
        }
    }

    pub fn find_ancestor(
        &self,
        id: NodeId,
        predicate: impl Fn(&CommandNode) -> bool,
    ) -> Option<NodeId> {
        let mut current = self.node(id).parent;
        while let Some(ancestor) = current {
            if ancestor != self.root() && predicate(self.node(ancestor)) {
                return Some(ancestor);
            }
            current = self.node(ancestor).parent;
        }
        None
    }

    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            if parent == self.root() {
                break;
            }
            depth += 1;
            current = self.node(parent).parent;
        }
        depth
    }

    /// Occurrences of a label or variable. Variable names may be given with or without `$`.
    pub fn find_all(&self, name: &str, kind: SymbolKind) -> Vec<Symbol> {
        match kind {
            SymbolKind::Label => {
                let mut found: Vec<Symbol> = self
                    .symbols
                    .labels
                    .iter()
                    .chain(self.symbols.references.iter())
                    .filter(|s| s.name == name)
                    .cloned()
                    .collect();
                found.sort_by_key(|s| (s.line, s.start));
                found
            }
            SymbolKind::Variable => {
                let name = name.strip_prefix('$').unwrap_or(name);
                let mut found = Vec::new();
                for id in self.preorder() {
                    let node = self.node(id);
                    for (position, parameter) in node.parameters.iter().enumerate() {
                        if parameter.variable_name() == Some(name) {
                            found.push(Symbol {
                                name: name.to_string(),
                                kind: SymbolKind::Variable,
                                node: id,
                                line: node.line,
                                start: parameter.start,
                                end: parameter.end,
                                declaration: position == 0
                                    && parameter.syntax.param_type.is_return_value(),
                            });
                        }
                    }
                }
                found
            }
        }
    }
}

impl fmt::Display for ScriptTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for id in self.preorder() {
            let node = self.node(id);
            let index = match node.index {
                Some(index) => format!("{:>3}", index),
                None => "  -".to_string(),
            };
            let text = if node.synthetic {
                format!("<{}>", node.text)
            } else {
                node.text.trim().to_string()
            };
            write!(f, "{:>4} {} {}{}", node.line, index, "  ".repeat(self.depth(id)), text)?;
            if node.logic != BranchLogic::None {
                write!(f, " [{:?}]", node.logic)?;
            }
            if let Some(target) = node.jump_target {
                match self.node(target).index {
                    Some(index) => write!(f, " -> {}", index)?,
                    None => write!(f, " -> line {}", self.node(target).line)?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SyntaxLibrary;
    use crate::syntax::SyntaxLookup;
    use crate::types::GameVersion;

    fn node(library: &SyntaxLibrary, id: u32, condition: Conditional, text: &str) -> CommandNode {
        let syntax = library.find(id, GameVersion::TerranConflict);
        CommandNode::new(syntax, condition, Vec::new(), 1, text)
    }

    #[test]
    fn logic_from_syntax_and_condition() {
        assert_eq!(BranchLogic::from_syntax(Some(104), Conditional::IfNot), BranchLogic::If);
        assert_eq!(BranchLogic::from_syntax(Some(104), Conditional::SkipIf), BranchLogic::Skip);
        assert_eq!(BranchLogic::from_syntax(Some(CMD_END), Conditional::None), BranchLogic::End);
        assert_eq!(BranchLogic::from_syntax(Some(400), Conditional::Start), BranchLogic::None);
        assert_eq!(BranchLogic::from_syntax(None, Conditional::None), BranchLogic::None);
    }

    #[test]
    fn preorder_and_successor() {
        let library = SyntaxLibrary::builtin().unwrap();
        let mut tree = ScriptTree::new();
        let root = tree.root();

        let opener = tree.add_child(root, node(&library, 104, Conditional::If, "if $a"));
        let body = tree.add_child(opener, node(&library, 104, Conditional::None, "$b = 1"));
        let end = tree.add_child(root, node(&library, CMD_END, Conditional::None, "end"));

        assert_eq!(tree.preorder(), vec![opener, body, end]);
        assert_eq!(tree.successor(body), Some(end));
        assert_eq!(tree.successor(opener), Some(end));
        assert_eq!(tree.successor(end), None);
        assert_eq!(tree.previous_sibling(end), Some(opener));
        assert_eq!(tree.find_ancestor(body, |n| n.logic == BranchLogic::If), Some(opener));
        assert_eq!(tree.depth(body), 1);
        assert!(tree.node(end).is_virtual());
        assert!(!tree.node(end).is_executable());
        assert!(tree.node(body).is_executable());
    }

    #[test]
    fn node_extent_skips_indentation() {
        let node = CommandNode::new(None, Conditional::None, Vec::new(), 3, "   goto end_loop  ");
        assert_eq!((node.start, node.end), (3, 16));
    }
}
