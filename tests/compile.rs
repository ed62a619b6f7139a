use msci_compiler::bytecode::CodeArray;
use msci_compiler::syntax::{CMD_EXPRESSION, CMD_HIDDEN_JUMP, CMD_RETURN};
use msci_compiler::{compile, BranchLogic, GameVersion, SymbolKind, SyntaxLibrary, SyntaxLookup};
use std::path::Path;
use std::sync::Arc;
use std::thread;

fn library() -> SyntaxLibrary {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join("syntax.json");
    SyntaxLibrary::load(&path).unwrap()
}

#[test]
fn if_block_compiles() {
    let library = library();
    let lines = ["if $a == 1", "  $b = 2", "end"];
    let output = compile(&lines, GameVersion::TerranConflict, &library).unwrap();

    assert!(output.is_successful());
    let tree = &output.tree;
    let root = tree.node(tree.root());
    let opener = tree.node(root.children[0]);
    assert_eq!(opener.logic, BranchLogic::If);
    assert_eq!(opener.children.len(), 1);
    assert_eq!(tree.node(opener.children[0]).line, 2);
}

#[test]
fn missing_label_is_one_diagnostic() {
    let library = library();
    let output = compile(
        &["$count = 0", "goto missing_label", "return $count"],
        GameVersion::TerranConflict,
        &library,
    )
    .unwrap();

    assert!(!output.is_successful());
    assert!(output.code.is_none());
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].line, 2);
}

#[test]
fn unterminated_block_fails_without_code() {
    let library = library();
    let lines = ["", "while $i < 3", "$i = $i + 1"];
    let output = compile(&lines, GameVersion::TerranConflict, &library).unwrap();

    assert!(output.code.is_none());
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].line, 2);
}

#[test]
fn diagnostics_are_ordered_by_line() {
    let library = library();
    let output = compile(
        &["goto nowhere", "$a = (1", "break", "return null"],
        GameVersion::TerranConflict,
        &library,
    )
    .unwrap();

    let lines: Vec<_> = output.diagnostics.iter().map(|d| d.line).collect();
    assert_eq!(lines, vec![1, 2, 3]);
}

#[test]
fn if_else_indices_and_jumps() {
    let library = library();
    let lines = [
        "* choose a value",
        "if [THIS] -> is docked",
        "  $value = 1",
        "else",
        "  $value = 2",
        "end",
        "return $value",
    ];
    let output = compile(&lines, GameVersion::TerranConflict, &library).unwrap();
    let code = output.code.unwrap();

    let indices: Vec<_> = code.standard.iter().map(|c| c.index).collect();
    assert_eq!(indices, (0..code.standard.len()).collect::<Vec<_>>());

    let ids: Vec<_> = code.standard.iter().map(|c| c.syntax_id).collect();
    assert_eq!(ids, vec![401, CMD_EXPRESSION, CMD_HIDDEN_JUMP, CMD_EXPRESSION, CMD_RETURN]);

    // A false condition lands on the else branch, the end of the if branch jumps past it
    assert_eq!(code.standard[0].jump, Some(3));
    assert_eq!(code.standard[2].jump, Some(4));
    assert_eq!(code.auxiliary[0].reference_index, 0);
}

#[test]
fn code_array_round_trips_through_json() {
    let library = library();
    let lines = [
        "$sector = [THIS] -> get sector",
        "$distance = ($x - $y) * ($x - $y) + 5 MOD 3",
        "$msg = sprintf: fmt='%s in %s' $distance $sector",
        "write to player logbook $msg",
        "return $distance",
    ];
    let output = compile(&lines, GameVersion::TerranConflict, &library).unwrap();
    let code = output.code.unwrap();

    let json = code.to_json().unwrap();
    let restored = CodeArray::from_json(&json).unwrap();
    assert_eq!(restored, code);

    let expression = &restored.standard[1];
    assert_eq!(expression.syntax_id, CMD_EXPRESSION);
    // return variable, then ($x $y -) ($x $y -) * 5 3 MOD +
    assert_eq!(expression.parameters.len(), 12);
    assert_eq!(expression.infix.len(), 15);
}

#[test]
fn find_symbols() {
    let library = library();
    let lines = [
        "start:",
        "$ship = [THIS] -> get sector",
        "skip if $ship",
        "goto start",
        "return $ship",
    ];
    let output = compile(&lines, GameVersion::TerranConflict, &library).unwrap();
    assert!(output.is_successful(), "{:?}", output.diagnostics);

    let labels = output.tree.find_all("start", SymbolKind::Label);
    assert_eq!(labels.iter().map(|s| s.line).collect::<Vec<_>>(), vec![1, 4]);
    assert!(labels[0].declaration);

    let variables = output.tree.find_all("$ship", SymbolKind::Variable);
    assert_eq!(variables.iter().map(|s| s.line).collect::<Vec<_>>(), vec![2, 3, 5]);
    assert!(variables[0].declaration);
}

#[test]
fn game_version_selects_commands() {
    let library = library();
    let lines = ["$aim = get player tracking aim", "return $aim"];

    let prelude = compile(&lines, GameVersion::AlbionPrelude, &library).unwrap();
    assert!(prelude.is_successful());

    let reunion = compile(&lines, GameVersion::Reunion, &library).unwrap();
    assert_eq!(reunion.diagnostics.len(), 1);
}

#[test]
fn scripts_compile_concurrently() {
    let library: Arc<dyn SyntaxLookup> = Arc::new(library());
    let scripts: Vec<Vec<String>> = (0..8)
        .map(|n| {
            vec![
                format!("$i = {}", n),
                "while $i > 0".to_string(),
                "  $i = $i - 1".to_string(),
                "end".to_string(),
                "return $i".to_string(),
            ]
        })
        .collect();

    let lengths: Vec<usize> = thread::scope(|scope| {
        let handles: Vec<_> = scripts
            .iter()
            .map(|lines| {
                let library = Arc::clone(&library);
                scope.spawn(move || {
                    let output =
                        compile(lines, GameVersion::TerranConflict, library.as_ref()).unwrap();
                    output.code.map(|c| c.len()).unwrap_or(0)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(lengths, vec![5; 8]);
}

#[test]
fn array_elements_compile() {
    let library = library();
    let lines = ["$arr = array alloc: size=2", "$arr[0] = 5", "$x = $arr[1]", "return $x"];
    let output = compile(&lines, GameVersion::TerranConflict, &library).unwrap();
    assert!(output.is_successful(), "{:?}", output.diagnostics);

    let code = output.code.unwrap();
    let ids: Vec<_> = code.standard.iter().map(|c| c.syntax_id).collect();
    assert_eq!(ids, vec![407, 411, 410, CMD_RETURN]);
    assert_eq!(code.variables, vec!["arr", "x"]);
}
