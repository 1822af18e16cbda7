use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "newsportal",
    version,
    about = "Regional news portal with a keyword search chatbot"
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
    /// Start the HTTP API
    Serve(ServeArgs),
    /// Ask the news chatbot a question
    Search(SearchArgs),
    /// Manage articles of a partition
    Article {
        #[command(subcommand)]
        action: ArticleAction,
    },
    /// Manage categories of a partition
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Manage admin accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Load a legacy db.json document and/or users.csv table
    Import(ImportArgs),
    /// Manage persisted server settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show store location and statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Serve --

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// Address to listen on, e.g. 0.0.0.0:8080
    #[arg(long)]
    pub bind: Option<String>,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The chat message, optionally prefixed with @source:
    pub message: String,

    /// Only search this region (omit to search everything)
    #[arg(long)]
    pub continent: Option<String>,

    /// Output the reply as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Article subcommands --

#[derive(Debug, Subcommand)]
pub enum ArticleAction {
    /// Publish an article
    Add {
        /// Partition: homepage or a region key
        #[arg(short, long, default_value = "homepage")]
        partition: String,
        /// Headline
        #[arg(long)]
        heading: String,
        /// Category name
        #[arg(long, default_value = "")]
        category: String,
        /// Body text
        #[arg(long, default_value = "")]
        content: String,
        /// Publisher name
        #[arg(long)]
        source: Option<String>,
        /// Link to the original story
        #[arg(long)]
        link: Option<String>,
        /// File under older news
        #[arg(long)]
        older: bool,
    },
    /// List articles, most recent first
    List {
        /// Partition: homepage or a region key
        #[arg(short, long, default_value = "homepage")]
        partition: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an article
    Remove {
        /// Partition: homepage or a region key
        #[arg(short, long, default_value = "homepage")]
        partition: String,
        /// Article id
        id: String,
    },
}

// -- Category subcommands --

#[derive(Debug, Subcommand)]
pub enum CategoryAction {
    /// Add a category
    Add {
        /// Partition: homepage or a region key
        #[arg(short, long, default_value = "homepage")]
        partition: String,
        name: String,
    },
    /// List categories in insertion order
    List {
        /// Partition: homepage or a region key
        #[arg(short, long, default_value = "homepage")]
        partition: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a category no article uses
    Remove {
        /// Partition: homepage or a region key
        #[arg(short, long, default_value = "homepage")]
        partition: String,
        name: String,
    },
}

// -- User subcommands --

#[derive(Debug, Subcommand)]
pub enum UserAction {
    /// Create an admin account
    Add {
        /// Login name
        id: String,
        /// Role: editor or a region key
        #[arg(long)]
        role: String,
        /// Password (read from NEWSPORTAL_PASSWORD when omitted)
        #[arg(long, env = "NEWSPORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List admin accounts
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an admin account
    Remove {
        /// Login name
        id: String,
    },
}

// -- Import --

#[derive(Debug, Parser)]
pub struct ImportArgs {
    /// Path to the db.json document
    #[arg(required_unless_present = "users")]
    pub path: Option<PathBuf>,

    /// Path to a users.csv table (id,passwordHash,role)
    #[arg(long)]
    pub users: Option<PathBuf>,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show the resolved bind address and where it came from
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a default bind address
    SetBind {
        /// Address such as 0.0.0.0:8080
        addr: String,
    },
    /// Clear the persisted bind address
    ClearBind,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
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
            "newsportal",
            &mut std::io::stdout(),
        );
    }
}
