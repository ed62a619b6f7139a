use crate::bytecode::{AuxiliaryCommand, CodeArray, CompiledCommand, CompiledParameter};
use crate::error::CompilerError;
use crate::node::{BranchLogic, CommandNode, NodeId, ScriptTree};
use crate::parameter::{Parameter, ParameterValue};
use crate::syntax::{
    CommandKind, SyntaxDefinition, SyntaxLookup, CMD_COMMENT, CMD_HIDDEN_JUMP, CMD_RETURN,
};
use crate::types::{DataType, GameVersion, ParameterType};
use std::collections::HashMap;
use std::sync::Arc;

/// Flattens a verified tree into a [`CodeArray`], inserting the jumps that block commands
/// need and resolving every jump to a command index.
pub struct Linearizer<'a> {
    lookup: &'a dyn SyntaxLookup,
    version: GameVersion,
}

impl<'a> Linearizer<'a> {
    pub fn new(lookup: &'a dyn SyntaxLookup, version: GameVersion) -> Self {
        Self { lookup, version }
    }

    pub fn linearize(&self, tree: &mut ScriptTree) -> Result<CodeArray, CompilerError> {
        self.append_return(tree)?;
        self.insert_jumps(tree)?;
        set_jump_targets(tree)?;
        let resolved = assign_indices(tree)?;
        Ok(emit(tree, &resolved))
    }

    fn syntax(&self, id: u32) -> Result<Arc<SyntaxDefinition>, CompilerError> {
        self.lookup
            .find(id, self.version)
            .ok_or(CompilerError::MissingSyntax {
                id,
                version: self.version,
            })
    }

    /// Every script must end on a top level return, so forward jumps always land on a command.
    fn append_return(&self, tree: &mut ScriptTree) -> Result<(), CompilerError> {
        let order = tree.preorder();
        let last = order.iter().rev().find(|&&id| tree.node(id).is_executable());
        let returns = last.is_some_and(|&id| {
            let node = tree.node(id);
            node.logic == BranchLogic::Return && node.parent == Some(tree.root())
        });
        if returns {
            return Ok(());
        }

        let syntax = self.syntax(CMD_RETURN)?;
        let slot = syntax.parameter(0).ok_or(CompilerError::InvalidSyntax {
            id: CMD_RETURN,
            message: "return has no value parameter".to_string(),
        })?;
        let line = order.iter().map(|&id| tree.node(id).line).max().unwrap_or(0) + 1;

        let node = CommandNode::synthetic(syntax, vec![Parameter::null(slot)], line);
        let root = tree.root();
        tree.add_child(root, node);
        Ok(())
    }

    /// Adds a jump at the end of each branch that is followed by another branch of the same
    /// `if`, and at the end of every loop body.
    fn insert_jumps(&self, tree: &mut ScriptTree) -> Result<(), CompilerError> {
        let mut jumps: Vec<(NodeId, NodeId, usize)> = Vec::new();

        for id in tree.preorder() {
            let node = tree.node(id);
            if node.commented {
                continue;
            }

            match node.logic {
                BranchLogic::If | BranchLogic::ElseIf => {
                    let Some(next) = tree.next_sibling(id) else {
                        continue;
                    };
                    if !matches!(tree.node(next).logic, BranchLogic::ElseIf | BranchLogic::Else) {
                        continue;
                    }
                    if let Some(end) = find_end(tree, id) {
                        jumps.push((id, end, tree.node(next).line));
                    }
                }
                logic if logic.is_loop() => {
                    let line = find_end(tree, id).map_or(node.line, |end| tree.node(end).line);
                    jumps.push((id, id, line));
                }
                _ => {}
            }
        }

        if jumps.is_empty() {
            return Ok(());
        }

        let syntax = self.syntax(CMD_HIDDEN_JUMP)?;
        let slot = syntax.parameter(0).ok_or(CompilerError::InvalidSyntax {
            id: CMD_HIDDEN_JUMP,
            message: "jump has no label parameter".to_string(),
        })?;

        for (block, target, line) in jumps {
            let target_parameter = Parameter::new(slot, DataType::Integer, ParameterValue::Int(0));
            let mut jump =
                CommandNode::synthetic(Arc::clone(&syntax), vec![target_parameter], line);
            jump.jump_target = Some(target);
            tree.add_child(block, jump);
        }
        Ok(())
    }
}

/// The `end` closing the construct that `id` opens or continues.
fn find_end(tree: &ScriptTree, id: NodeId) -> Option<NodeId> {
    let mut current = tree.next_sibling(id);
    while let Some(sibling) = current {
        match tree.node(sibling).logic {
            BranchLogic::End => return Some(sibling),
            BranchLogic::ElseIf | BranchLogic::Else => current = tree.next_sibling(sibling),
            _ => return None,
        }
    }
    None
}

fn set_jump_targets(tree: &mut ScriptTree) -> Result<(), CompilerError> {
    for id in tree.preorder() {
        let node = tree.node(id);
        if node.commented || node.jump_target.is_some() {
            continue;
        }
        let line = node.line;

        let target = match node.logic {
            BranchLogic::If | BranchLogic::ElseIf => tree.next_sibling(id),
            BranchLogic::While | BranchLogic::For | BranchLogic::Foreach | BranchLogic::Skip => {
                tree.successor(id)
            }
            BranchLogic::Break => tree
                .find_ancestor(id, |n| n.logic.is_loop())
                .and_then(|l| tree.successor(l)),
            BranchLogic::Continue => tree.find_ancestor(id, |n| n.logic.is_loop()),
            BranchLogic::Goto | BranchLogic::Gosub => tree.symbols.target(id),
            _ => continue,
        };

        match target {
            Some(target) => tree.node_mut(id).jump_target = Some(target),
            None => return Err(CompilerError::UnresolvedJump { line }),
        }
    }
    Ok(())
}

/// Numbers executable commands in source order. Other nodes stand for the next executable
/// command. Jumps to earlier commands resolve on the spot, later ones when their target is reached.
fn assign_indices(tree: &mut ScriptTree) -> Result<HashMap<NodeId, usize>, CompilerError> {
    let mut next_index = 0;
    let mut location: HashMap<NodeId, usize> = HashMap::new();
    let mut resolved: HashMap<NodeId, usize> = HashMap::new();
    let mut pending: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut waiting: Vec<NodeId> = Vec::new();

    for id in tree.preorder() {
        if !tree.node(id).is_executable() {
            waiting.push(id);
            continue;
        }

        let index = next_index;
        next_index += 1;
        tree.node_mut(id).index = Some(index);

        waiting.push(id);
        for placed in waiting.drain(..) {
            location.insert(placed, index);
            for jump in pending.remove(&placed).unwrap_or_default() {
                resolved.insert(jump, index);
            }
        }

        if let Some(target) = tree.node(id).jump_target {
            match location.get(&target) {
                Some(&destination) => {
                    resolved.insert(id, destination);
                }
                None => pending.entry(target).or_default().push(id),
            }
        }
    }

    if let Some(line) = pending.values().flatten().map(|&id| tree.node(id).line).min() {
        return Err(CompilerError::UnresolvedJump { line });
    }

    // Trailing comments attach after the last command
    for id in waiting {
        location.insert(id, next_index);
    }

    resolved.extend(location.into_iter().filter(|(id, _)| tree.node(*id).is_auxiliary()));
    Ok(resolved)
}

fn emit(tree: &ScriptTree, resolved: &HashMap<NodeId, usize>) -> CodeArray {
    let mut code = CodeArray::new();

    for id in tree.preorder() {
        let node = tree.node(id);
        let Some(syntax) = &node.syntax else {
            continue;
        };

        if node.is_executable() {
            let jump = resolved.get(&id).copied();
            let (parameters, infix) = match syntax.kind {
                CommandKind::Expression => encode_expression(node, &mut code),
                _ => (
                    node.parameters
                        .iter()
                        .map(|p| encode_parameter(p, jump, &mut code))
                        .collect(),
                    Vec::new(),
                ),
            };

            code.push(CompiledCommand {
                index: node.index.unwrap_or(code.len()),
                line: node.line,
                syntax_id: syntax.id,
                kind: syntax.kind,
                parameters,
                infix,
                jump,
            });
        } else if node.is_auxiliary() {
            let reference_index = resolved.get(&id).copied().unwrap_or(code.len());
            let (syntax_id, kind, inner_syntax_id) = if node.commented {
                (CMD_COMMENT, CommandKind::CommentedCommand, Some(syntax.id))
            } else {
                (syntax.id, syntax.kind, None)
            };
            let parameters = node
                .parameters
                .iter()
                .map(|p| CompiledParameter::new(p.data_type, p.value.clone()))
                .collect();

            code.push_auxiliary(AuxiliaryCommand {
                reference_index,
                line: node.line,
                syntax_id,
                kind,
                inner_syntax_id,
                parameters,
            });
        }
    }

    code
}

fn encode_parameter(
    parameter: &Parameter,
    jump: Option<usize>,
    code: &mut CodeArray,
) -> CompiledParameter {
    if parameter.syntax.param_type == ParameterType::LabelNumber {
        if let Some(destination) = jump {
            return CompiledParameter::int(DataType::Integer, destination as i32);
        }
    }

    match parameter.variable_name() {
        Some(name) => CompiledParameter::int(DataType::Variable, code.add_variable(name) as i32),
        None => CompiledParameter::new(parameter.data_type, parameter.value.clone()),
    }
}

/// Return variable plus postfix list, and the interlace list mapping source order onto it.
fn encode_expression(
    node: &CommandNode,
    code: &mut CodeArray,
) -> (Vec<CompiledParameter>, Vec<i32>) {
    let mut parameters: Vec<CompiledParameter> = node
        .parameters
        .iter()
        .take(1)
        .map(|p| encode_parameter(p, None, code))
        .collect();
    parameters.extend(node.postfix.iter().map(|p| encode_parameter(p, None, code)));

    let operand_positions: Vec<i32> = node
        .postfix
        .iter()
        .enumerate()
        .filter(|(_, p)| p.data_type != DataType::Operator)
        .map(|(position, _)| position as i32)
        .collect();

    let mut operands = operand_positions.into_iter();
    let infix = node
        .parameters
        .iter()
        .skip(1)
        .map(|p| match (&p.data_type, &p.value) {
            (DataType::Operator, ParameterValue::Int(code)) => *code,
            _ => -(operands.next().unwrap_or(0) + 1),
        })
        .collect();

    (parameters, infix)
}
