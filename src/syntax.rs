use crate::error::CompilerError;
use crate::lexer::tokenize;
use crate::token::{Token, TokenKind};
use crate::types::{GameVersion, ParameterType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

// Compiler command ids
pub const CMD_NOP: u32 = 0;
pub const CMD_COMMENT: u32 = 1;
pub const CMD_CALL_SCRIPT: u32 = 102;
pub const CMD_RETURN: u32 = 103;
pub const CMD_EXPRESSION: u32 = 104;
pub const CMD_DEFINE_LABEL: u32 = 105;
pub const CMD_GOTO_LABEL: u32 = 106;
pub const CMD_GOSUB: u32 = 107;
pub const CMD_ENDSUB: u32 = 108;
pub const CMD_ELSE: u32 = 109;
pub const CMD_END: u32 = 110;
pub const CMD_BREAK: u32 = 111;
pub const CMD_CONTINUE: u32 = 112;
pub const CMD_HIDDEN_JUMP: u32 = 113;
pub const CMD_FOR_LOOP: u32 = 114;
pub const CMD_FOREACH: u32 = 115;

/// How a command's parameters are laid out.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    #[default]
    Standard,
    Expression,
    ScriptCall,
    Comment,
    CommentedCommand,
    Auxiliary,
}

/// A parameter slot: its declared type, position in the command (physical) and in the text
/// (display).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ParameterSyntax {
    pub param_type: ParameterType,
    pub physical_index: usize,
    pub display_index: usize,
}

impl ParameterSyntax {
    pub fn new(param_type: ParameterType, physical_index: usize, display_index: usize) -> Self {
        Self {
            param_type,
            physical_index,
            display_index,
        }
    }

    pub fn expression(index: usize) -> Self {
        Self::new(ParameterType::ExpressionParameter, index, index)
    }

    pub fn varg(index: usize) -> Self {
        Self::new(ParameterType::VArgParameter, index, index)
    }
}

/// One command of the catalog, e.g. `$0 = $1 -> get sector`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntaxDefinition {
    pub id: u32,
    pub text: String,
    #[serde(default)]
    pub kind: CommandKind,
    #[serde(default)]
    pub parameters: Vec<ParameterType>,
    #[serde(default)]
    pub vargs: usize,
    #[serde(default)]
    pub versions: Vec<GameVersion>,
    #[serde(skip)]
    display: Vec<usize>,
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$(\d+)").expect("placeholder pattern is valid"))
}

fn is_placeholder(token: &Token) -> bool {
    token.kind == TokenKind::Variable && token.text[1..].chars().all(|c| c.is_ascii_digit())
}

impl SyntaxDefinition {
    pub fn new(id: u32, text: &str, kind: CommandKind, parameters: Vec<ParameterType>) -> Self {
        Self {
            id,
            text: text.to_string(),
            kind,
            parameters,
            vargs: 0,
            versions: Vec::new(),
            display: Vec::new(),
        }
    }

    /// Reads the `$n` placeholders out of the template. Every parameter must appear exactly once.
    pub fn compile(mut self) -> Result<Self, CompilerError> {
        let mut display = Vec::new();
        for capture in placeholder_pattern().captures_iter(&self.text) {
            let index: usize = capture[1].parse().map_err(|_| CompilerError::InvalidSyntax {
                id: self.id,
                message: format!("placeholder '{}' is out of range", &capture[0]),
            })?;

            if index >= self.parameters.len() {
                return Err(CompilerError::InvalidSyntax {
                    id: self.id,
                    message: format!("placeholder ${} has no parameter", index),
                });
            }
            if display.contains(&index) {
                return Err(CompilerError::InvalidSyntax {
                    id: self.id,
                    message: format!("placeholder ${} appears twice", index),
                });
            }
            display.push(index);
        }

        if display.len() != self.parameters.len() {
            return Err(CompilerError::InvalidSyntax {
                id: self.id,
                message: format!(
                    "template references {} of {} parameters",
                    display.len(),
                    self.parameters.len()
                ),
            });
        }

        self.display = display;
        Ok(self)
    }

    pub fn supports(&self, version: GameVersion) -> bool {
        self.versions.is_empty() || self.versions.contains(&version)
    }

    pub fn parameter(&self, physical_index: usize) -> Option<ParameterSyntax> {
        let param_type = *self.parameters.get(physical_index)?;
        let display_index = self
            .display
            .iter()
            .position(|&p| p == physical_index)
            .unwrap_or(physical_index);
        Some(ParameterSyntax::new(param_type, physical_index, display_index))
    }

    /// Parameter syntax for the n-th placeholder in the text.
    pub fn parameter_at_display(&self, display_index: usize) -> Option<ParameterSyntax> {
        let physical = *self.display.get(display_index)?;
        self.parameter(physical)
    }

    /// Only standard commands are matched against source text; the rest are looked up by id.
    pub fn is_identifiable(&self) -> bool {
        self.kind == CommandKind::Standard && self.id != CMD_HIDDEN_JUMP
    }

    pub fn hash(&self) -> String {
        hash_tokens(&tokenize(&self.text, true))
    }

    /// Hash of the template without its leading `$n =`, when the return slot can take a
    /// conditional.
    pub fn conditional_hash(&self) -> Option<String> {
        let tokens = tokenize(&self.text, true);
        let placeholder = tokens.first().filter(|t| is_placeholder(t))?;
        if !tokens.get(1).is_some_and(|t| t.is_operator("=")) {
            return None;
        }

        let index: usize = placeholder.text[1..].parse().ok()?;
        let param_type = self.parameters.get(index)?;
        if !param_type.is_conditional_return() {
            return None;
        }
        Some(hash_tokens(&tokens[2..]))
    }
}

/// Shape of a line: value tokens become `$`, everything else keeps its text.
pub fn hash_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter(|t| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Comment))
        .map(|t| if t.is_value() { "$" } else { t.text.as_str() })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A candidate syntax for a line. `omits_return` is set when the line matched the
/// conditional form, without the leading `$n =`.
#[derive(Debug, Clone)]
pub struct SyntaxMatch {
    pub syntax: Arc<SyntaxDefinition>,
    pub omits_return: bool,
}

/// Read-only access to the command catalog.
pub trait SyntaxLookup: Send + Sync {
    fn find(&self, id: u32, version: GameVersion) -> Option<Arc<SyntaxDefinition>>;

    fn identify(&self, hash: &str, version: GameVersion) -> Vec<SyntaxMatch>;
}

#[derive(Deserialize)]
struct Catalog {
    commands: Vec<SyntaxDefinition>,
}

/// In-memory command catalog.
#[derive(Debug, Default)]
pub struct SyntaxLibrary {
    by_id: HashMap<u32, Vec<Arc<SyntaxDefinition>>>,
    by_hash: HashMap<String, Vec<SyntaxMatch>>,
}

impl SyntaxLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A library holding only the commands the compiler itself relies on.
    pub fn builtin() -> Result<Self, CompilerError> {
        use ParameterType as P;

        let mut library = Self::new();
        let builtins = [
            SyntaxDefinition::new(CMD_NOP, "", CommandKind::Auxiliary, vec![]),
            SyntaxDefinition::new(CMD_COMMENT, "* $0", CommandKind::Comment, vec![P::Comment]),
            SyntaxDefinition::new(
                CMD_CALL_SCRIPT,
                "$1 = $2 -> call script $0 :",
                CommandKind::ScriptCall,
                vec![P::ScriptName, P::ReturnValueIfStart, P::RefObj],
            ),
            SyntaxDefinition::new(CMD_RETURN, "return $0", CommandKind::Standard, vec![P::Value]),
            SyntaxDefinition::new(
                CMD_EXPRESSION,
                "$0 = <expression>",
                CommandKind::Expression,
                vec![P::ReturnValueIf],
            ),
            SyntaxDefinition::new(
                CMD_DEFINE_LABEL,
                "$0:",
                CommandKind::Standard,
                vec![P::LabelName],
            ),
            SyntaxDefinition::new(
                CMD_GOTO_LABEL,
                "goto $0",
                CommandKind::Standard,
                vec![P::LabelNumber],
            ),
            SyntaxDefinition::new(
                CMD_GOSUB,
                "gosub $0:",
                CommandKind::Standard,
                vec![P::LabelNumber],
            ),
            SyntaxDefinition::new(CMD_ENDSUB, "endsub", CommandKind::Standard, vec![]),
            SyntaxDefinition::new(CMD_ELSE, "else", CommandKind::Standard, vec![]),
            SyntaxDefinition::new(CMD_END, "end", CommandKind::Standard, vec![]),
            SyntaxDefinition::new(CMD_BREAK, "break", CommandKind::Standard, vec![]),
            SyntaxDefinition::new(CMD_CONTINUE, "continue", CommandKind::Standard, vec![]),
            SyntaxDefinition::new(
                CMD_HIDDEN_JUMP,
                "jump $0",
                CommandKind::Standard,
                vec![P::LabelNumber],
            ),
            SyntaxDefinition::new(
                CMD_FOR_LOOP,
                "for $0 = $1 to $2 step $3",
                CommandKind::Standard,
                vec![P::Variable, P::Number, P::Number, P::Number],
            ),
            SyntaxDefinition::new(
                CMD_FOREACH,
                "foreach $0 in array $1",
                CommandKind::Standard,
                vec![P::Variable, P::Variable],
            ),
        ];

        for definition in builtins {
            library.insert(definition)?;
        }
        Ok(library)
    }

    /// Built-in commands plus the catalog in `json` (`{"commands": [...]}`).
    pub fn from_json(json: &str) -> Result<Self, CompilerError> {
        let mut library = Self::builtin()?;
        library.extend_from_json(json)?;
        Ok(library)
    }

    pub fn load(path: &Path) -> Result<Self, CompilerError> {
        if !path.exists() {
            return Err(CompilerError::FileNotFound(format!(
                "Syntax catalog not found: {}",
                path.display()
            )));
        }
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn extend_from_json(&mut self, json: &str) -> Result<(), CompilerError> {
        let catalog: Catalog = serde_json::from_str(json)?;
        for definition in catalog.commands {
            self.insert(definition)?;
        }
        Ok(())
    }

    pub fn insert(&mut self, definition: SyntaxDefinition) -> Result<(), CompilerError> {
        let definition = definition.compile()?;

        let existing = self.by_id.entry(definition.id).or_default();
        let overlaps = existing.iter().any(|d| {
            d.versions.is_empty()
                || definition.versions.is_empty()
                || d.versions.iter().any(|v| definition.versions.contains(v))
        });
        if overlaps {
            return Err(CompilerError::InvalidSyntax {
                id: definition.id,
                message: "id is already defined for the same version".to_string(),
            });
        }

        let definition = Arc::new(definition);
        existing.push(Arc::clone(&definition));

        if definition.is_identifiable() {
            if let Some(conditional) = definition.conditional_hash() {
                self.by_hash.entry(conditional).or_default().push(SyntaxMatch {
                    syntax: Arc::clone(&definition),
                    omits_return: true,
                });
            }
            self.by_hash.entry(definition.hash()).or_default().push(SyntaxMatch {
                syntax: definition,
                omits_return: false,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_id.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl SyntaxLookup for SyntaxLibrary {
    fn find(&self, id: u32, version: GameVersion) -> Option<Arc<SyntaxDefinition>> {
        self.by_id
            .get(&id)?
            .iter()
            .find(|d| d.supports(version))
            .cloned()
    }

    fn identify(&self, hash: &str, version: GameVersion) -> Vec<SyntaxMatch> {
        self.by_hash
            .get(hash)
            .map(|matches| {
                matches
                    .iter()
                    .filter(|m| m.syntax.supports(version))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) fn sample_library() -> SyntaxLibrary {
    SyntaxLibrary::from_json(include_str!("../data/syntax.json")).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_found_by_id() {
        let library = SyntaxLibrary::builtin().unwrap();
        let expression = library.find(CMD_EXPRESSION, GameVersion::Threat).unwrap();
        assert_eq!(expression.kind, CommandKind::Expression);
        assert!(library.find(9999, GameVersion::Threat).is_none());
    }

    #[test]
    fn hash_replaces_values() {
        let tokens = tokenize("$ship = [THIS] -> get sector", true);
        assert_eq!(hash_tokens(&tokens), "$ = $ -> get sector");

        let definition = SyntaxDefinition::new(
            400,
            "$0 = $1 -> get sector",
            CommandKind::Standard,
            vec![ParameterType::ReturnValue, ParameterType::RefObj],
        );
        assert_eq!(definition.hash(), "$ = $ -> get sector");
        assert_eq!(definition.conditional_hash(), None);
    }

    #[test]
    fn conditional_form_is_indexed() {
        let library = sample_library();
        let matches = library.identify("$ -> is docked", GameVersion::TerranConflict);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].omits_return);

        let full = library.identify("$ = $ -> is docked", GameVersion::TerranConflict);
        assert_eq!(full.len(), 1);
        assert!(!full[0].omits_return);
    }

    #[test]
    fn display_order_differs_from_physical() {
        let definition = SyntaxDefinition::new(
            500,
            "$1 -> send $0 to $2",
            CommandKind::Standard,
            vec![ParameterType::Value, ParameterType::RefObj, ParameterType::Sector],
        )
        .compile()
        .unwrap();
        let order: Vec<_> = (0..3)
            .filter_map(|d| definition.parameter_at_display(d))
            .map(|p| p.physical_index)
            .collect();
        assert_eq!(order, vec![1, 0, 2]);
        assert_eq!(definition.parameter(0).unwrap().display_index, 1);
        assert_eq!(
            definition.parameter_at_display(0).unwrap().param_type,
            ParameterType::RefObj
        );
    }

    #[test]
    fn rejects_bad_templates() {
        let missing = SyntaxDefinition::new(
            501,
            "$0 -> do something",
            CommandKind::Standard,
            vec![ParameterType::RefObj, ParameterType::Value],
        );
        assert!(matches!(missing.compile(), Err(CompilerError::InvalidSyntax { id: 501, .. })));

        let twice =
            SyntaxDefinition::new(502, "$0 $0", CommandKind::Standard, vec![ParameterType::Value]);
        assert!(twice.compile().is_err());
    }

    #[test]
    fn version_filtering() {
        let library = sample_library();
        assert!(library
            .identify("$ = get player tracking aim", GameVersion::AlbionPrelude)
            .first()
            .is_some());
        assert!(library
            .identify("$ = get player tracking aim", GameVersion::Reunion)
            .is_empty());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut library = SyntaxLibrary::builtin().unwrap();
        let duplicate = SyntaxDefinition::new(CMD_END, "end", CommandKind::Standard, vec![]);
        assert!(library.insert(duplicate).is_err());
    }
}
