use msci_compiler::lexer::tokenize;
use msci_compiler::{compile, GameVersion, SyntaxLibrary, TokenKind};
use proptest::prelude::*;

/// Random printable text, including the characters that start tokens.
fn script_like_line() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        "[a-z]{1,8}".prop_map(String::from),
        "-?[0-9]{1,6}".prop_map(String::from),
        r"\$[a-z.]{0,6}".prop_map(String::from),
        "'[^']{0,6}'?".prop_map(String::from),
        r"\{[A-Za-z ]{0,8}\}?".prop_map(String::from),
        r"\[[A-Z]{0,6}\]?".prop_map(String::from),
        prop::sample::select(vec![
            "=", "==", "!=", "!", "->", "-", "+", "*", "/", "%", "(", ")", "&&", "||", "AND", "OR",
            "MOD",
            ":", ",", "~", "<=", ">", "\\", "if", "not", "else", "end", "goto", "null",
        ])
        .prop_map(String::from),
        "[ \t]{1,3}".prop_map(String::from),
    ];
    prop::collection::vec(piece, 0..12).prop_map(|pieces| pieces.concat())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn tokens_reconstruct_arbitrary_input(line in any::<String>()) {
        let rebuilt: String = tokenize(&line, false).into_iter().map(|t| t.text).collect();
        prop_assert_eq!(rebuilt, line);
    }

    #[test]
    fn tokens_reconstruct_script_like_input(line in script_like_line()) {
        let rebuilt: String = tokenize(&line, false).into_iter().map(|t| t.text).collect();
        prop_assert_eq!(rebuilt, line);
    }

    #[test]
    fn ranges_are_contiguous(line in script_like_line()) {
        let tokens = tokenize(&line, false);
        let mut position = 0;
        for token in &tokens {
            prop_assert_eq!(token.start, position);
            prop_assert!(token.end > token.start);
            prop_assert_eq!(token.len(), token.text.chars().count());
            position = token.end;
        }
        prop_assert_eq!(position, line.chars().count());
    }

    #[test]
    fn skipping_whitespace_drops_only_whitespace(line in script_like_line()) {
        let all: Vec<_> = tokenize(&line, false)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .collect();
        prop_assert_eq!(all, tokenize(&line, true));
    }

    #[test]
    fn compile_never_panics(lines in prop::collection::vec(script_like_line(), 0..8)) {
        let library = SyntaxLibrary::builtin().unwrap();
        let output = compile(&lines, GameVersion::TerranConflict, &library).unwrap();
        prop_assert_eq!(output.is_successful(), output.code.is_some());
    }
}

#[test]
fn number_forms() {
    let number = tokenize("123", false);
    assert_eq!(number.len(), 1);
    assert_eq!((number[0].kind, number[0].start, number[0].end), (TokenKind::Number, 0, 3));

    let negative = tokenize("-5", false);
    assert_eq!(negative.len(), 1);
    assert_eq!(negative[0].kind, TokenKind::Number);

    let kinds: Vec<_> = tokenize("- 5", false).into_iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TokenKind::BinaryOperator, TokenKind::Whitespace, TokenKind::Number]
    );
}

#[test]
fn variable_and_bare_sigil() {
    let variable = tokenize("$foo", false);
    assert_eq!(variable.len(), 1);
    assert_eq!(variable[0].kind, TokenKind::Variable);

    let sigil = tokenize("$", false);
    assert_eq!(sigil.len(), 1);
    assert_eq!((sigil[0].kind, sigil[0].start, sigil[0].end), (TokenKind::UnaryOperator, 0, 1));
}

#[test]
fn escaped_apostrophe() {
    let tokens = tokenize("'it\\'s'", false);
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[0].end, 7);
}
