//! Command-line interface for islplay
//!
//! Provides argument parsing using clap derive macros.

use crate::tokenize::Language;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Sign English sentences on an avatar in Indian Sign Language
#[derive(Parser, Debug)]
#[command(
    name = "islplay",
    version,
    about = "Sign English sentences on an avatar in Indian Sign Language"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Sentence language for tokenizing (english, hindi)
    #[arg(long, global = true, value_name = "LANG")]
    pub language: Option<Language>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the clips a pre-processed sentence resolves to (no services needed)
    Resolve {
        /// Sentence words
        #[arg(required = true, num_args = 1..)]
        sentence: Vec<String>,

        /// Print the resolution as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse and sign one sentence, then exit
    Play {
        /// Sentence words
        #[arg(required = true, num_args = 1..)]
        sentence: Vec<String>,

        /// Skip the parser and resolve the sentence as typed
        #[arg(long)]
        no_parse: bool,
    },

    /// Sign sentences as they arrive (typed lines, or recorded chunks)
    Listen {
        /// Directory of WAV chunks to transcribe; stdin lines are the fallback
        #[arg(long, value_name = "DIR")]
        chunks: Option<PathBuf>,
    },

    /// Transcribe a WAV file through the transcription service
    Transcribe {
        /// WAV file
        file: PathBuf,
    },

    /// Start the signing daemon (foreground process for systemd)
    Daemon {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/islplay.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Queue a sentence on the daemon
    Submit {
        /// Sentence words
        #[arg(required = true, num_args = 1..)]
        sentence: Vec<String>,

        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/islplay.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// List the daemon's recent sentences
    Queue {
        /// Print items as JSON
        #[arg(long)]
        json: bool,

        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/islplay.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Get daemon status via IPC
    Status {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/islplay.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Stop the daemon via IPC
    Shutdown {
        /// Path to Unix socket (default: $XDG_RUNTIME_DIR/islplay.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// Inspect or extend the clip catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// View and create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Catalog actions
#[derive(Subcommand, Debug)]
pub enum CatalogAction {
    /// List catalog entries
    List {
        /// Only entries whose name starts with this prefix
        #[arg(long, value_name = "PREFIX")]
        prefix: Option<String>,
    },
    /// Look up the clip for a word or letter
    Lookup {
        /// Word to look up
        word: String,
    },
    /// Add a word to the catalog file
    Add {
        /// Word the clip signs
        name: String,
        /// Clip file name (default: <name>.sigml)
        #[arg(long, value_name = "FILE")]
        file: Option<String>,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve_joins_words() {
        let cli = Cli::try_parse_from(["islplay", "resolve", "hello", "world."]).unwrap();
        match cli.command {
            Commands::Resolve { sentence, json } => {
                assert_eq!(sentence.join(" "), "hello world.");
                assert!(!json);
            }
            other => panic!("Expected Resolve command, got {:?}", other),
        }
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
        assert!(cli.language.is_none());
    }

    #[test]
    fn test_resolve_requires_sentence() {
        let err = Cli::try_parse_from(["islplay", "resolve"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["islplay", "-vv", "status"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_language() {
        let cli = Cli::try_parse_from(["islplay", "--language", "hi", "listen"]).unwrap();
        assert_eq!(cli.language, Some(Language::Hindi));

        let err = Cli::try_parse_from(["islplay", "--language", "klingon", "listen"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_parse_play_no_parse() {
        let cli = Cli::try_parse_from(["islplay", "play", "--no-parse", "good", "morning"]).unwrap();
        match cli.command {
            Commands::Play { sentence, no_parse } => {
                assert!(no_parse);
                assert_eq!(sentence, vec!["good", "morning"]);
            }
            other => panic!("Expected Play command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_submit_with_socket() {
        let cli = Cli::try_parse_from([
            "islplay",
            "submit",
            "--socket",
            "/tmp/test.sock",
            "hello",
        ])
        .unwrap();
        match cli.command {
            Commands::Submit { sentence, socket } => {
                assert_eq!(sentence, vec!["hello"]);
                assert_eq!(socket, Some(PathBuf::from("/tmp/test.sock")));
            }
            other => panic!("Expected Submit command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_catalog_add() {
        let cli =
            Cli::try_parse_from(["islplay", "catalog", "add", "namaste", "--file", "nm.sigml"])
                .unwrap();
        match cli.command {
            Commands::Catalog {
                action: CatalogAction::Add { name, file },
            } => {
                assert_eq!(name, "namaste");
                assert_eq!(file.as_deref(), Some("nm.sigml"));
            }
            other => panic!("Expected Catalog Add command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_init_force() {
        let cli = Cli::try_parse_from(["islplay", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Init { force: true }
            }
        ));
    }

    #[test]
    fn test_global_options_after_command() {
        let cli = Cli::try_parse_from([
            "islplay",
            "daemon",
            "--config",
            "/tmp/config.toml",
            "-q",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
        assert!(cli.quiet);
    }

    #[test]
    fn test_invalid_command_returns_error() {
        let err = Cli::try_parse_from(["islplay", "toggle"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["islplay", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["islplay", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }
}
