//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this config file instead of the standard locations
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// binreg - Build and query compiled-program binary registries
#[derive(Parser, Debug)]
#[command(name = "binreg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this config file instead of the standard locations
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a registry from a directory tree of compiled programs
    #[command(
        name = "pack",
        long_about = "Build a registry from a directory tree of compiled programs.\n\n\
            Every file under SRC becomes one program. Its directory path relative to \
            SRC, joined with '.', is the test case path and its file stem is the \
            program name. Files ending in .spv are stored as SPIR-V, everything else \
            as raw bytes. Identical binaries are stored once.",
        after_help = "\
WORKFLOW EXAMPLES:
    # src/dEQP-VK/api/smoke/triangle/vert.spv becomes
    # (\"dEQP-VK.api.smoke.triangle\", \"vert\")
    binreg pack src/ out/

    # Print the publish summary as JSON
    binreg pack src/ out/ --json"
    )]
    Pack {
        /// Directory tree of compiled programs
        src: PathBuf,

        /// Registry directory to publish into
        dst: PathBuf,

        /// Print the publish summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch one program from a registry
    #[command(
        name = "get",
        after_help = "\
WORKFLOW EXAMPLES:
    # Write the binary to a file
    binreg get out/ dEQP-VK.api.smoke.triangle vert -o vert.spv

    # Write the binary to stdout
    binreg get out/ dEQP-VK.api.smoke.triangle vert > vert.spv"
    )]
    Get {
        /// Registry directory
        registry: PathBuf,

        /// Test case path
        path: String,

        /// Program name
        name: String,

        /// Write the binary here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List every program in a registry
    #[command(name = "list")]
    List {
        /// Registry directory
        registry: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show registry sizes
    #[command(name = "stats")]
    Stats {
        /// Registry directory
        registry: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that every program in a registry resolves and loads
    #[command(
        name = "verify",
        long_about = "Check that every program in a registry resolves and loads.\n\n\
            Walks the whole index, resolves each identifier again by lookup, and \
            reads every stored binary. Exits non-zero if the registry is corrupt.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Check a registry before shipping it
    binreg verify out/

    # Machine-readable report
    binreg verify out/ --json"
    )]
    Verify {
        /// Registry directory
        registry: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or create the configuration file
    #[command(
        name = "config",
        long_about = "Show or create the binreg configuration file.\n\n\
            Configuration is read from --config, $BINREG_CONFIG, \
            $XDG_CONFIG_HOME/binreg/config.toml or ~/.binreg/config.toml, \
            whichever exists first.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Show effective settings
    binreg config show

    # Write a config file with the defaults spelled out
    binreg config init"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for binreg commands.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    binreg completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    binreg completion zsh >> ~/.zshrc

    # Fish
    binreg completion fish > ~/.config/fish/completions/binreg.fish

    # PowerShell
    binreg completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show effective settings and where they came from
    Show,
    /// Write a config file with default settings
    Init {
        /// Write here instead of the default location
        #[arg(long, value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["binreg", "list", "out", "--quiet", "--debug"]).unwrap();
        assert!(cli.quiet);
        assert!(cli.debug);
        assert!(matches!(cli.command, Command::List { json: false, .. }));
    }

    #[test]
    fn get_takes_path_name_and_output() {
        let cli = Cli::try_parse_from([
            "binreg", "get", "out", "dEQP-VK.a", "vert", "-o", "vert.spv",
        ])
        .unwrap();
        match cli.command {
            Command::Get {
                path, name, output, ..
            } => {
                assert_eq!(path, "dEQP-VK.a");
                assert_eq!(name, "vert");
                assert_eq!(output, Some(PathBuf::from("vert.spv")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
