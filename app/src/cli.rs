//! # CLI Interface
//!
//! Command-line structure for `flexsave` using `clap` derive. Each command
//! maps to a front-end route (see [`Commands::route`]) and goes through the
//! route guard before it runs.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use flexsave_core::auth::Locale;
use flexsave_core::config::DEFAULT_API_URL;
use flexsave_core::user::Role;
use flexsave_core::vault::HistoryFilter;
use flexsave_core::Money;

use crate::logging::LogFormat;

/// FlexSave savings vaults from the terminal.
///
/// Lock money away until a goal date, with a small early-withdrawal
/// allowance for emergencies.
#[derive(Parser, Debug)]
#[command(
    name = "flexsave",
    about = "FlexSave savings vaults from the terminal",
    version,
    propagate_version = true
)]
pub struct FlexSaveCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Base URL of the ledger API.
    #[arg(long, global = true, env = "FLEXSAVE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Request timeout for the ledger API, in seconds.
    #[arg(long, global = true, env = "FLEXSAVE_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Firebase web API key.
    #[arg(long, global = true, env = "FLEXSAVE_FIREBASE_API_KEY", hide_env_values = true)]
    pub firebase_api_key: Option<String>,

    /// Identity Toolkit base URL (for the Auth emulator).
    #[arg(long, global = true, env = "FLEXSAVE_FIREBASE_IDENTITY_URL")]
    pub firebase_identity_url: Option<String>,

    /// Secure Token base URL (for the Auth emulator).
    #[arg(long, global = true, env = "FLEXSAVE_FIREBASE_TOKEN_URL")]
    pub firebase_token_url: Option<String>,

    /// Where the signed-in session is kept.
    ///
    /// Defaults to `~/.flexsave/session.json`.
    #[arg(long, global = true, env = "FLEXSAVE_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    /// Language of messages: fr or en.
    #[arg(long, global = true, env = "FLEXSAVE_LOCALE", default_value = "fr")]
    pub locale: Locale,

    /// Log output format.
    #[arg(
        long,
        global = true,
        env = "FLEXSAVE_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,

    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in.
    Login(LoginArgs),
    /// Create an account and sign in.
    Register(RegisterArgs),
    /// Send a password-reset email.
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    /// Sign out and forget the stored session.
    Logout,
    /// Overview of your savings.
    Dashboard,
    /// Manage vaults.
    #[command(subcommand)]
    Vaults(VaultCommand),
    /// Withdrawal history.
    History(HistoryArgs),
    /// Update your profile.
    Profile(ProfileArgs),
    /// Administration (admin role required).
    #[command(subcommand)]
    Admin(AdminCommand),
    /// Show how the route guard treats a path.
    Route {
        /// Path such as `/dashboard/vaults` or `/admin`.
        path: String,
    },
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    /// Read from stdin when omitted.
    #[arg(long, env = "FLEXSAVE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path to continue to after signing in, as carried in `?redirect=`.
    #[arg(long)]
    pub redirect: Option<String>,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(long)]
    pub email: String,

    /// Display name.
    #[arg(long)]
    pub name: String,

    /// Read from stdin when omitted.
    #[arg(long, env = "FLEXSAVE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// List your vaults.
    List {
        /// Include closed vaults.
        #[arg(long)]
        all: bool,
    },
    /// Show one vault with its withdrawals.
    Show { id: String },
    /// Create a vault.
    Create {
        #[arg(long)]
        name: String,
        /// Savings goal, e.g. `1500` or `1500.50`.
        #[arg(long)]
        target: Money,
        /// First day the vault is unlocked (YYYY-MM-DD).
        #[arg(long)]
        unlock: NaiveDate,
        /// Share of the balance withdrawable early, in percent.
        #[arg(long, default_value_t = flexsave_core::config::DEFAULT_FLEXIBILITY_PERCENTAGE)]
        flexibility: u8,
    },
    /// Deposit into a vault.
    Deposit { id: String, amount: Money },
    /// Withdraw from a vault.
    Withdraw {
        id: String,
        amount: Money,
        /// Show the fee without withdrawing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Close an unlocked, empty vault.
    Close { id: String },
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Only this vault.
    #[arg(long)]
    pub vault: Option<String>,

    /// all, early or standard.
    #[arg(long, default_value = "all")]
    pub filter: HistoryFilter,
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    /// New display name.
    #[arg(long)]
    pub name: Option<String>,

    /// Turn email notifications on or off.
    #[arg(long)]
    pub notifications: Option<bool>,
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// Platform statistics.
    Stats,
    /// List users.
    Users {
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(long, default_value_t = flexsave_core::config::ADMIN_USERS_DEFAULT_LIMIT)]
        limit: u32,
        #[arg(long)]
        role: Option<Role>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Show one user with statistics.
    User { id: String },
    /// Change a user's status, plan or role.
    Update {
        id: String,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        premium: Option<bool>,
        #[arg(long)]
        role: Option<Role>,
    },
    /// Deactivate a user.
    Disable { id: String },
    /// Reactivate a user.
    Enable { id: String },
}

impl Commands {
    /// The front-end route this command corresponds to, if it is a page.
    pub fn route(&self) -> Option<String> {
        let route = match self {
            Commands::Login(_) => "/login".to_string(),
            Commands::Register(_) => "/register".to_string(),
            Commands::ForgotPassword { .. } => "/forgot-password".to_string(),
            Commands::Dashboard => "/dashboard".to_string(),
            Commands::Vaults(VaultCommand::Create { .. }) => "/dashboard/vaults/new".to_string(),
            Commands::Vaults(VaultCommand::List { .. }) => "/dashboard/vaults".to_string(),
            Commands::Vaults(
                VaultCommand::Show { id }
                | VaultCommand::Deposit { id, .. }
                | VaultCommand::Withdraw { id, .. }
                | VaultCommand::Close { id },
            ) => format!("/dashboard/vaults/{id}"),
            Commands::History(_) => "/dashboard/history".to_string(),
            Commands::Profile(_) => "/dashboard/settings".to_string(),
            Commands::Admin(AdminCommand::Stats) => "/admin/statistics".to_string(),
            Commands::Admin(_) => "/admin/users".to_string(),
            Commands::Logout | Commands::Route { .. } | Commands::Version => return None,
        };
        Some(route)
    }
}
