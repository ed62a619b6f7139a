//! Compiler for MSCI scripts: lexes and parses script lines into a command tree, verifies
//! it and flattens it into an indexed command array with resolved jumps.
//!
//! ```ignore
//! let library = SyntaxLibrary::load(Path::new("data/syntax.json"))?;
//! let output = compile(&lines, GameVersion::TerranConflict, &library)?;
//! for diagnostic in &output.diagnostics {
//!     eprintln!("{}", diagnostic);
//! }
//! ```

pub mod bytecode;
pub mod compiler;
pub mod error;
pub mod expression;
pub mod lexer;
pub mod node;
pub mod parameter;
pub mod parser;
pub mod syntax;
pub mod token;
pub mod types;
pub mod verifier;

pub use bytecode::{CodeArray, CompiledCommand, CompiledParameter};
pub use compiler::Linearizer;
pub use error::{CompilerError, Diagnostic};
pub use node::{BranchLogic, CommandNode, Conditional, NodeId, ScriptTree, SymbolKind};
pub use parser::{ParseOutput, ScriptParser};
pub use syntax::{SyntaxDefinition, SyntaxLibrary, SyntaxLookup};
pub use token::{Token, TokenKind};
pub use types::GameVersion;

/// Everything one compile produces.
#[derive(Debug)]
pub struct CompileOutput {
    pub tree: ScriptTree,
    /// Ordered by line, then column.
    pub diagnostics: Vec<Diagnostic>,
    /// Present only when there are no diagnostics.
    pub code: Option<CodeArray>,
}

impl CompileOutput {
    pub fn is_successful(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Compiles one script. Problems in the script come back as diagnostics; `Err` is reserved
/// for a catalog missing the compiler's own commands or a jump that could not be resolved.
pub fn compile<S: AsRef<str>>(
    lines: &[S],
    version: GameVersion,
    lookup: &dyn SyntaxLookup,
) -> Result<CompileOutput, CompilerError> {
    let ParseOutput {
        mut tree,
        mut diagnostics,
        unterminated,
    } = ScriptParser::new(lookup, version).parse(lines);

    if unterminated {
        return Ok(CompileOutput {
            tree,
            diagnostics,
            code: None,
        });
    }

    diagnostics.extend(verifier::verify(&mut tree));
    diagnostics.sort_by_key(|d| (d.line, d.start));

    let code = if diagnostics.is_empty() {
        Some(Linearizer::new(lookup, version).linearize(&mut tree)?)
    } else {
        None
    };

    Ok(CompileOutput {
        tree,
        diagnostics,
        code,
    })
}
