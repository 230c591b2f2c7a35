//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vitalsdesk_core::models::{ConfigValueType, Role};

#[derive(Parser, Debug)]
#[command(name = "vitalsdesk")]
#[command(about = "Admin console for the health-tracking backend", version)]
pub struct Cli {
    /// Backend base URL, e.g. https://health.example.com/api
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Create a console account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        role: Option<Role>,
    },
    /// Show an account profile (defaults to the logged-in account)
    Profile {
        #[arg(long)]
        email: Option<String>,
    },
    /// Change the password of the logged-in account
    ChangePassword,
    /// LINE users
    #[command(subcommand)]
    Users(UserCommand),
    /// Health records
    #[command(subcommand)]
    Records(RecordCommand),
    /// System configuration entries
    #[command(subcommand)]
    Configs(ConfigCommand),
    /// LINE rich menus
    #[command(subcommand)]
    RichMenu(RichMenuCommand),
    /// Forward a LINE webhook payload read from a JSON file
    Webhook {
        file: PathBuf,
    },
    /// Keep a list on screen and reprint it whenever it changes
    Watch(WatchArgs),
    /// Load the main lists and show what the query cache holds
    Cache,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    List,
    Get {
        line_id: String,
    },
    Create {
        #[arg(long)]
        line_id: String,
        #[command(flatten)]
        fields: UserFields,
    },
    Update {
        line_id: String,
        #[command(flatten)]
        fields: UserFields,
    },
    Delete {
        line_id: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct UserFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub birthday: Option<String>,
    #[arg(long)]
    pub gender: Option<String>,
    #[arg(long)]
    pub height: Option<String>,
    /// Chronic illness; repeat for several
    #[arg(long = "illness")]
    pub illnesses: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum RecordCommand {
    /// All records, or one user's records (optionally within a date range)
    List {
        #[arg(long)]
        user: Option<String>,
        #[arg(long, requires_all = ["user", "to"])]
        from: Option<String>,
        #[arg(long, requires_all = ["user", "from"])]
        to: Option<String>,
    },
    Get {
        id: String,
    },
    Latest {
        user: String,
    },
    Create {
        #[arg(long)]
        user: String,
        #[command(flatten)]
        metrics: RecordMetrics,
    },
    Update {
        id: String,
        #[command(flatten)]
        metrics: RecordMetrics,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct RecordMetrics {
    #[arg(long)]
    pub weight: Option<f64>,
    #[arg(long)]
    pub hba1c: Option<f64>,
    #[arg(long)]
    pub blood_sugar: Option<f64>,
    #[arg(long)]
    pub systolic: Option<f64>,
    #[arg(long)]
    pub diastolic: Option<f64>,
    #[arg(long)]
    pub ldl: Option<f64>,
    #[arg(long)]
    pub hdl: Option<f64>,
    #[arg(long)]
    pub tg: Option<f64>,
    /// Record date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    List,
    Get {
        key: String,
    },
    Create {
        key: String,
        value: String,
        #[arg(long = "type")]
        value_type: Option<ConfigValueType>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        inactive: bool,
    },
    Update {
        key: String,
        #[arg(long)]
        value: Option<String>,
        #[arg(long = "type")]
        value_type: Option<ConfigValueType>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    Delete {
        key: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum RichMenuCommand {
    List,
    /// Create a rich menu from a JSON definition file
    Create {
        file: PathBuf,
    },
    /// Upload the menu image (PNG or JPEG)
    Upload {
        id: String,
        file: PathBuf,
    },
    SetDefault {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// What to watch
    #[arg(value_enum)]
    pub target: WatchTarget,

    /// Only this user's records
    #[arg(long)]
    pub user: Option<String>,

    /// Refetch interval in seconds
    #[arg(long, default_value = "30")]
    pub interval: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchTarget {
    Users,
    Records,
    Configs,
    RichMenus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_record_range() {
        let cli = Cli::parse_from([
            "vitalsdesk", "records", "list", "--user", "u1", "--from", "2024-01-01", "--to",
            "2024-01-31",
        ]);
        match cli.command {
            Command::Records(RecordCommand::List { user, from, to }) => {
                assert_eq!(user.as_deref(), Some("u1"));
                assert_eq!(from.as_deref(), Some("2024-01-01"));
                assert_eq!(to.as_deref(), Some("2024-01-31"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_range_requires_user() {
        let parsed = Cli::try_parse_from([
            "vitalsdesk", "records", "list", "--from", "2024-01-01", "--to", "2024-01-31",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_rich_menu_upload() {
        let cli = Cli::parse_from(["vitalsdesk", "rich-menu", "upload", "rm-1", "menu.png"]);
        match cli.command {
            Command::RichMenu(RichMenuCommand::Upload { id, file }) => {
                assert_eq!(id, "rm-1");
                assert_eq!(file, PathBuf::from("menu.png"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_config_type() {
        let cli = Cli::parse_from([
            "vitalsdesk", "configs", "create", "feature.x", "true", "--type", "boolean",
        ]);
        match cli.command {
            Command::Configs(ConfigCommand::Create { value_type, .. }) => {
                assert_eq!(value_type, Some(ConfigValueType::Boolean));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
