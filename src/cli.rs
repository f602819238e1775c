use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use gistshelf::{query::Status, sync::DEFAULT_CONCURRENCY};

#[derive(Debug, Parser)]
#[command(
    name = "gistshelf",
    version,
    about = "A local, searchable mirror of your GitHub gists"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Mirror owned and starred gists into the local library
    Sync(SyncArgs),
    /// Search or list the library
    #[command(visible_alias = "search")]
    Ls(LsArgs),
    /// Print a gist by its index number
    Get(GetArgs),
    /// Count gists per tag
    Tags(FacetArgs),
    /// Count gists per language
    Languages(FacetArgs),
    /// Count gists per owner
    Owners(FacetArgs),
    /// Show library statistics
    Status(StatusArgs),
    /// Create a gist from files and add it to the library
    New(NewArgs),
    /// Delete gists remotely and from the library
    Rm(RmArgs),
    /// Forget the stored token and the local library
    Logout,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Sync --

#[derive(Debug, Parser)]
pub struct SyncArgs {
    /// GitHub personal access token (stored for later runs)
    #[arg(long, env = "GISTSHELF_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Discard the local library and renumber every gist
    #[arg(long)]
    pub rebuild: bool,

    /// Maximum number of concurrent content downloads
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

// -- Ls --

#[derive(Debug, Parser)]
pub struct LsArgs {
    /// Free-text search terms
    pub term: Vec<String>,

    /// Only gists carrying this #tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Only gists with a file in this language
    #[arg(short, long)]
    pub language: Option<String>,

    /// Only gists owned by this user
    #[arg(short, long)]
    pub owner: Option<String>,

    /// Only starred gists
    #[arg(long)]
    pub starred: bool,

    /// Visibility: all, public or private
    #[arg(long, default_value = "all")]
    pub status: Status,

    /// Sort key (idx, created, updated, starred, public, private, owner,
    /// description, files, comments); prefix with '-' to reverse
    #[arg(long, allow_hyphen_values = true)]
    pub sort: Option<String>,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "100")]
    pub limit: usize,

    /// Log the generated query
    #[arg(long)]
    pub debug: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Get --

#[derive(Debug, Parser)]
pub struct GetArgs {
    /// Index number of the gist
    pub idx: u64,

    /// Output the full record as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Facets --

#[derive(Debug, Parser)]
pub struct FacetArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- New --

#[derive(Debug, Parser)]
pub struct NewArgs {
    /// Files to upload; reads stdin as a single file when none are given
    pub files: Vec<PathBuf>,

    /// Gist description, may contain #tags
    #[arg(short, long, default_value = "")]
    pub description: String,

    /// Create a secret gist
    #[arg(long)]
    pub private: bool,

    /// Filename to use for stdin content
    #[arg(long, default_value = "snippet.txt")]
    pub name: String,
}

// -- Rm --

#[derive(Debug, Parser)]
pub struct RmArgs {
    /// Index numbers of the gists to delete
    #[arg(required = true)]
    pub idx: Vec<u64>,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "gistshelf",
            &mut std::io::stdout(),
        );
    }
}
