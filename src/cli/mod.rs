//! The jotun cli.

use clap::{Parser, Subcommand};
use termion::terminal_size;

use crate::compiler::{CompilerOptions, DEFAULT_MAX_NODES};

/// Turn math expressions into node graph compounds
#[derive(Debug, Parser)]
#[command(name = "jotun", version)]
pub struct Opts {
    /// Be verbose
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Opts {
    /// Default log filter, used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

/// Jotun cli subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a compound from an expression
    #[clap(alias = "build")]
    Cook(CookOpts),

    /// Show how an expression is parsed and canonicalised
    Parse(ParseOpts),

    /// List the operators and the node types they become
    Operators,
}

/// Options for the cli `cook` subcommand.
#[derive(Debug, clap::Args)]
pub struct CookOpts {
    /// Expression to compile, like `sin(x) * 2 + y`.
    #[arg(required = true)]
    pub expression: String,

    /// Container to create the compound in. Defaults to the current container.
    #[arg(short, long)]
    pub container: Option<String>,

    /// Name of the compound.
    #[arg(short, long, default_value = "expr")]
    pub name: String,

    /// Most distinct expression nodes to build.
    #[arg(long, default_value_t = DEFAULT_MAX_NODES)]
    pub max_nodes: usize,

    /// Output the build script as json instead of building.
    #[arg(short, long)]
    pub script: bool,

    /// Output only a graph version of the compound in 'dot' format.
    #[arg(short, long)]
    pub dot: bool,

    /// Output an svg to visualize the compound.
    #[arg(short, long)]
    pub graph: Option<String>,
}

impl CookOpts {
    pub fn compiler_options(&self, parent_container: String) -> CompilerOptions {
        CompilerOptions {
            compound_name: self.name.clone(),
            parent_container,
            max_nodes: self.max_nodes,
        }
    }
}

/// Options for the cli `parse` subcommand.
#[derive(Debug, clap::Args)]
pub struct ParseOpts {
    /// Expression to parse.
    #[arg(required = true)]
    pub expression: String,
}

/// Get the size of the current terminal that jotun is running in.
fn get_term_width() -> Option<usize> {
    if let Ok((w, _)) = terminal_size() {
        Some(w as usize)
    } else {
        None
    }
}

/// Print a centered string in the terminal padded by '='.
pub fn print_label(label: &str) {
    match get_term_width() {
        Some(width) if width > label.len() + 4 => {
            let mut padding = width / 2 - 1 - label.len() / 2;
            let mut odd = (width % 2) == 1;
            if (label.len() % 2) == 1 {
                padding -= 1;
                odd = !odd;
            }
            println!(
                "\n{} {} {}",
                "=".repeat(padding),
                label,
                "=".repeat(padding + odd as usize),
            )
        }
        _ => {
            println!("\n{}:", label)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn cli_is_consistent() {
        Opts::command().debug_assert();
    }

    #[test]
    fn cook_options() {
        let opts = Opts::parse_from(["jotun", "-v", "cook", "x + y", "-n", "sum", "--max-nodes", "8"]);
        assert_eq!(opts.log_filter(), "debug");
        let Command::Cook(cook) = opts.command else {
            panic!("expected the cook command");
        };
        assert_eq!(cook.expression, "x + y");
        assert_eq!(
            cook.compiler_options("/graph".to_string()),
            CompilerOptions {
                compound_name: "sum".to_string(),
                parent_container: "/graph".to_string(),
                max_nodes: 8,
            }
        );
    }
}
