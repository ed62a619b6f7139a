use crate::error::Diagnostic;
use crate::node::{BranchLogic, CommandNode, Conditional, NodeId, ScriptTree};
use crate::syntax::CommandKind;
use crate::types::ParameterType;

/// Checks a parsed tree: labels, block nesting and parameter types. Every problem is
/// reported; nothing stops the walk. Resolved goto/gosub targets are stored in the
/// tree's symbol table.
pub fn verify(tree: &mut ScriptTree) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    verify_labels(tree, &mut diagnostics);

    for id in tree.preorder() {
        let node = tree.node(id);
        // Lines without syntax were reported by the parser
        if node.commented || node.syntax.is_none() {
            continue;
        }
        verify_nesting(tree, id, &mut diagnostics);
        verify_conditional(node, &mut diagnostics);
        verify_parameters(node, &mut diagnostics);
    }

    diagnostics
}

fn verify_labels(tree: &mut ScriptTree, diagnostics: &mut Vec<Diagnostic>) {
    let symbols = &tree.symbols;

    for (position, label) in symbols.labels.iter().enumerate() {
        if let Some(first) = symbols.labels[..position].iter().find(|l| l.name == label.name) {
            diagnostics.push(Diagnostic::new(
                format!("Label '{}' is already defined on line {}", label.name, first.line),
                label.line,
                label.start,
                label.end,
            ));
        }
    }

    let mut resolved: Vec<(NodeId, NodeId)> = Vec::new();
    for reference in &symbols.references {
        match symbols.declaration(&reference.name) {
            Some(declaration) => resolved.push((reference.node, declaration.node)),
            None => diagnostics.push(Diagnostic::new(
                format!("Label '{}' is not defined", reference.name),
                reference.line,
                reference.start,
                reference.end,
            )),
        }
    }

    for (from, to) in resolved {
        tree.symbols.resolve(from, to);
    }
}

fn verify_nesting(tree: &ScriptTree, id: NodeId, diagnostics: &mut Vec<Diagnostic>) {
    let node = tree.node(id);
    let previous = tree.previous_sibling(id).map(|p| tree.node(p).logic);

    let message = match node.logic {
        BranchLogic::Break | BranchLogic::Continue => {
            if tree.find_ancestor(id, |n| n.logic.is_loop()).is_some() {
                return;
            }
            format!("'{}' must be inside a loop", node.text.trim())
        }
        BranchLogic::ElseIf | BranchLogic::Else => {
            if matches!(previous, Some(BranchLogic::If | BranchLogic::ElseIf)) {
                return;
            }
            "'else' without matching 'if'".to_string()
        }
        BranchLogic::End => {
            if previous.is_some_and(|p| p.opens_block()) {
                return;
            }
            "'end' without matching block".to_string()
        }
        BranchLogic::Skip => {
            if node.children.len() == 1 {
                return;
            }
            "'skip if' must be followed by a command".to_string()
        }
        _ => return,
    };

    diagnostics.push(Diagnostic::new(message, node.line, node.start, node.end));
}

fn verify_conditional(node: &CommandNode, diagnostics: &mut Vec<Diagnostic>) {
    if node.condition == Conditional::None {
        return;
    }
    let Some(syntax) = &node.syntax else {
        return;
    };

    let return_type = syntax.parameters.iter().find(|p| p.is_return_value());
    let allowed = match node.condition {
        Conditional::Start => return_type == Some(&ParameterType::ReturnValueIfStart),
        _ => return_type.is_some_and(|p| p.is_conditional_return()),
    };

    if !allowed {
        diagnostics.push(Diagnostic::new(
            format!("'{}' cannot be used with '{}'", syntax.text, node.condition.text()),
            node.line,
            node.start,
            node.end,
        ));
    }
}

fn verify_parameters(node: &CommandNode, diagnostics: &mut Vec<Diagnostic>) {
    let Some(syntax) = &node.syntax else {
        return;
    };

    let checked = match syntax.kind {
        CommandKind::Comment => return,
        // Expression operands are typed by the expression itself
        CommandKind::Expression => &node.parameters[..node.parameters.len().min(1)],
        CommandKind::ScriptCall => {
            &node.parameters[..node.parameters.len().min(syntax.parameters.len())]
        }
        _ => {
            let expected = syntax.parameters.len() + syntax.vargs;
            if node.parameters.len() != expected {
                diagnostics.push(Diagnostic::new(
                    format!(
                        "'{}' takes {} parameters but {} were given",
                        syntax.text,
                        expected,
                        node.parameters.len()
                    ),
                    node.line,
                    node.start,
                    node.end,
                ));
            }
            &node.parameters[..]
        }
    };

    for parameter in checked {
        let expected = parameter.syntax.param_type;
        if !expected.accepts(parameter.data_type) {
            diagnostics.push(Diagnostic::new(
                format!("'{}' is not a valid {}", parameter.text, expected),
                node.line,
                parameter.start,
                parameter.end,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ScriptParser;
    use crate::syntax::sample_library;
    use crate::types::GameVersion;

    fn check(lines: &[&str]) -> (ScriptTree, Vec<Diagnostic>) {
        let library = sample_library();
        let mut output = ScriptParser::new(&library, GameVersion::TerranConflict).parse(lines);
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        let diagnostics = verify(&mut output.tree);
        (output.tree, diagnostics)
    }

    #[test]
    fn clean_script() {
        let (_, diagnostics) = check(&[
            "$i = 0",
            "while $i < 10",
            "  skip if $i == 5",
            "    continue",
            "  $i = $i + 1",
            "end",
            "return $i",
        ]);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn missing_label_reported_once_on_reference() {
        let (_, diagnostics) = check(&["$a = 1", "goto missing_label", "return null"]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 2);
        assert_eq!(diagnostics[0].message, "Label 'missing_label' is not defined");
        assert_eq!((diagnostics[0].start, diagnostics[0].end), (5, 18));
    }

    #[test]
    fn forward_references_resolve() {
        let (tree, diagnostics) = check(&["gosub later:", "return null", "later:", "endsub"]);
        assert!(diagnostics.is_empty());
        let ids = tree.preorder();
        assert_eq!(tree.symbols.target(ids[0]), Some(ids[2]));
    }

    #[test]
    fn duplicate_label_flagged_on_second() {
        let (_, diagnostics) = check(&["again:", "again:", "goto again"]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 2);
    }

    #[test]
    fn break_outside_loop() {
        let (_, diagnostics) = check(&["if $a", "break", "end"]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "'break' must be inside a loop");
    }

    #[test]
    fn stray_else_and_end() {
        let (_, diagnostics) = check(&["else", "$a = 1", "end"]);
        let messages: Vec<_> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["'else' without matching 'if'", "'end' without matching block"]
        );
    }

    #[test]
    fn empty_skip() {
        let (_, diagnostics) = check(&["skip if $a", "end"]);
        assert!(diagnostics
            .iter()
            .any(|d| d.message == "'skip if' must be followed by a command"));
    }

    #[test]
    fn parameter_type_mismatch_points_at_parameter() {
        let (_, diagnostics) = check(&["$a = wait 'soon' ms"]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "''soon'' is not a valid number");
        assert_eq!((diagnostics[0].start, diagnostics[0].end), (10, 16));
    }

    #[test]
    fn start_requires_background_command() {
        let (_, diagnostics) = check(&["start [THIS] -> is docked"]);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("cannot be used with 'start'"));

        let (_, diagnostics) = check(&["start $ship -> fly to station $home"]);
        assert!(diagnostics.is_empty());
    }
}
