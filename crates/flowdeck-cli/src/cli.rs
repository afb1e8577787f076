use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use flowdeck_core::models::{MessageRole, Priority, TaskStatus};
use flowdeck_core::Resolution;

#[derive(Parser)]
#[command(name = "flowdeck")]
#[command(about = "Offline-first task board, reminders and chat history with cloud sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name for cloud configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show or change the database mode (local, cloud, sync)
    Mode {
        #[command(subcommand)]
        command: Option<ModeCommands>,
    },
    /// Manage board tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage board columns
    Column {
        #[command(subcommand)]
        command: ColumnCommands,
    },
    /// Manage reminders
    Reminder {
        #[command(subcommand)]
        command: ReminderCommands,
    },
    /// Manage chat messages
    Message {
        #[command(subcommand)]
        command: MessageCommands,
    },
    /// Manage stored provider API keys
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },
    /// Run a sync pass, or inspect and resolve conflicts
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ModeCommands {
    /// Print the current mode
    Show,
    /// Switch to another mode
    Set {
        /// local, cloud or sync
        mode: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum TaskStatusArg {
    Todo,
    InProgress,
    Done,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum RoleArg {
    User,
    Assistant,
    System,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResolutionArg {
    Local,
    Cloud,
    Merge,
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a task
    #[command(alias = "new")]
    Add {
        /// Task title
        title: Vec<String>,
        /// Column ID or unique ID prefix
        #[arg(long)]
        column: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List tasks
    List {
        /// Only tasks with this status
        #[arg(long, value_enum)]
        status: Option<TaskStatusArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a task
    Edit {
        /// Task ID or unique ID prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        status: Option<TaskStatusArg>,
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
    },
    /// Move a task to another column
    Move {
        /// Task ID or unique ID prefix
        id: String,
        /// Column ID or unique ID prefix
        column: String,
        /// Position within the column
        #[arg(long)]
        position: Option<i64>,
    },
    /// Delete a task
    Delete {
        /// Task ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ColumnCommands {
    /// Create a column
    Add {
        title: Vec<String>,
        /// Position on the board (defaults to last)
        #[arg(long)]
        position: Option<i64>,
    },
    /// List columns
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete a column
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum ReminderCommands {
    /// Create a reminder
    Add {
        title: Vec<String>,
        /// RFC 3339 time, e.g. 2026-01-31T09:00:00Z
        #[arg(long, value_name = "TIME")]
        at: String,
        /// Task ID or unique ID prefix
        #[arg(long)]
        task: Option<String>,
    },
    /// List reminders
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete a reminder
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum MessageCommands {
    /// Append a message to a conversation
    Add {
        /// Conversation identifier
        #[arg(long)]
        conversation: String,
        #[arg(long, value_enum, default_value_t = RoleArg::User)]
        role: RoleArg,
        content: Vec<String>,
    },
    /// List messages
    List {
        /// Only messages of this conversation
        #[arg(long)]
        conversation: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Delete a message
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum KeyCommands {
    /// Store a provider API key
    Add {
        /// Provider name, e.g. openai
        provider: String,
        key: String,
        #[arg(long, default_value = "default")]
        label: String,
    },
    /// List stored keys (masked)
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete a stored key
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List open sync conflicts
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve one open conflict
    Resolve {
        /// Conflict ID or unique ID prefix
        id: String,
        #[arg(value_enum)]
        resolution: ResolutionArg,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update the selected profile
    Init {
        /// Record store base URL
        #[arg(long, value_name = "URL")]
        cloud_url: Option<String>,
        /// Record store bearer token
        #[arg(long, value_name = "TOKEN")]
        cloud_token: Option<String>,
        /// User the records belong to
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved configuration (token masked)
    Show,
}

impl From<TaskStatusArg> for TaskStatus {
    fn from(value: TaskStatusArg) -> Self {
        match value {
            TaskStatusArg::Todo => Self::Todo,
            TaskStatusArg::InProgress => Self::InProgress,
            TaskStatusArg::Done => Self::Done,
        }
    }
}

impl From<PriorityArg> for Priority {
    fn from(value: PriorityArg) -> Self {
        match value {
            PriorityArg::Low => Self::Low,
            PriorityArg::Medium => Self::Medium,
            PriorityArg::High => Self::High,
        }
    }
}

impl From<RoleArg> for MessageRole {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::User => Self::User,
            RoleArg::Assistant => Self::Assistant,
            RoleArg::System => Self::System,
        }
    }
}

impl From<ResolutionArg> for Resolution {
    fn from(value: ResolutionArg) -> Self {
        match value {
            ResolutionArg::Local => Self::Local,
            ResolutionArg::Cloud => Self::Cloud,
            ResolutionArg::Merge => Self::Merge,
        }
    }
}
