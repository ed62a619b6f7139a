use crate::config::Config;
use clap::{Parser as ClapParser, Subcommand};
use msci_compiler::lexer::tokenize;
use msci_compiler::{compile, CompileOutput, CompilerError, GameVersion, SymbolKind, SyntaxLibrary};
use std::fs;
use std::path::{Path, PathBuf};

mod config;

#[derive(ClapParser)]
#[command(author, version, about = "MSCI Script Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a script and write its command array as JSON
    Compile {
        /// Script source file
        file: PathBuf,
        /// Game version to compile for (defaults to the configured version)
        #[arg(long, value_enum)]
        game_version: Option<GameVersion>,
        /// JSON command catalog to use instead of the configured one
        #[arg(long)]
        syntax: Option<PathBuf>,
        /// Where to write the command array (defaults to <file>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the tokens of every line
    Tokens {
        file: PathBuf,
        /// Include whitespace tokens
        #[arg(long)]
        whitespace: bool,
    },
    /// Print the parse tree of a script
    Tree {
        file: PathBuf,
        #[arg(long, value_enum)]
        game_version: Option<GameVersion>,
        #[arg(long)]
        syntax: Option<PathBuf>,
    },
    /// List where a label or variable ($name) is used
    Find {
        file: PathBuf,
        name: String,
    },
    /// Manage compiler configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Write a config file with defaults for the current environment
    Init,
}

fn read_script(path: &Path) -> Result<Vec<String>, CompilerError> {
    if !path.is_file() {
        return Err(CompilerError::FileNotFound(format!(
            "Script not found: {}",
            path.display()
        )));
    }

    let source = fs::read_to_string(path)?;
    Ok(source.lines().map(String::from).collect())
}

fn load_library(config: &Config, syntax: Option<&Path>) -> Result<SyntaxLibrary, CompilerError> {
    match syntax.or(config.syntax_file.as_deref()) {
        Some(path) => {
            if config.debug {
                println!("Loading command catalog from {}", path.display());
            }
            SyntaxLibrary::load(path)
        }
        None => SyntaxLibrary::builtin(),
    }
}

fn compile_file(
    path: &Path,
    version: GameVersion,
    syntax: Option<&Path>,
    config: &Config,
) -> Result<CompileOutput, CompilerError> {
    let library = load_library(config, syntax)?;
    let lines = read_script(path)?;

    if config.debug {
        println!(
            "Compiling {} ({} lines, {} commands known) for {}",
            path.display(),
            lines.len(),
            library.len(),
            version
        );
    }

    let output = compile(&lines, version, &library)?;
    for diagnostic in &output.diagnostics {
        eprintln!("{}", diagnostic.render(path));
    }
    Ok(output)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Compile {
            file,
            game_version,
            syntax,
            output,
        } => {
            let version = game_version.unwrap_or(config.game_version);
            let result = compile_file(&file, version, syntax.as_deref(), &config)?;

            let Some(code) = result.code else {
                println!("Compilation failed with {} error(s)", result.diagnostics.len());
                std::process::exit(1);
            };

            let output = output.unwrap_or_else(|| file.with_extension("json"));
            fs::write(&output, code.to_json()?)?;
            println!(
                "Compiled {} commands ({} auxiliary) to {}",
                code.standard.len(),
                code.auxiliary.len(),
                output.display()
            );
        }
        Commands::Tokens { file, whitespace } => {
            for (number, line) in read_script(&file)?.iter().enumerate() {
                let tokens = tokenize(line, !whitespace);
                if tokens.is_empty() {
                    continue;
                }
                println!("{:>4}:", number + 1);
                for token in tokens {
                    println!(
                        "      {:<14} [{}..{}] {:?}",
                        format!("{:?}", token.kind),
                        token.start,
                        token.end,
                        token.text
                    );
                }
            }
        }
        Commands::Tree {
            file,
            game_version,
            syntax,
        } => {
            let version = game_version.unwrap_or(config.game_version);
            let result = compile_file(&file, version, syntax.as_deref(), &config)?;
            print!("{}", result.tree);
        }
        Commands::Find { file, name } => {
            let result = compile_file(&file, config.game_version, None, &config)?;
            let kind = if name.starts_with('$') {
                SymbolKind::Variable
            } else {
                SymbolKind::Label
            };

            let symbols = result.tree.find_all(&name, kind);
            if symbols.is_empty() {
                println!("No occurrences of '{}'", name);
            }
            for symbol in symbols {
                let role = if symbol.declaration { " (definition)" } else { "" };
                println!("{}:{}:{}{}", file.display(), symbol.line, symbol.start + 1, role);
            }
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                println!("Environment: {}", config.env_name);
                println!("Config file: {}", Config::get_config_path().display());
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigCommands::Init => {
                let config_path = Config::get_config_path();
                if config_path.exists() {
                    println!("Config file already exists at: {}", config_path.display());
                    println!("Remove the file to reinitialize.");
                } else {
                    config.save()?;
                    println!("Initialized new config file at: {}", config_path.display());
                }
            }
        },
    }

    Ok(())
}
