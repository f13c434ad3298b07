//! Clap derive structures for the `wgnet` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Also compiled by `build.rs` for man pages, so only clap types and std
//! may appear here.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// wgnet -- administer a WireGuard overlay network
#[derive(Debug, Parser)]
#[command(
    name = "wgnet",
    version,
    about = "Administer a WireGuard overlay network from the command line",
    long_about = "Manage users, devices, tunnel addresses, the internal DNS zone\n\
        and trusted sources of a wgnet deployment.\n\n\
        Runs directly against the local database in administrative mode.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "WGNET_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database file (overrides storage.db_path)
    #[arg(long, env = "WGNET_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "WGNET_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage users and manager rights
    #[command(alias = "u")]
    Users(UsersArgs),

    /// Manage devices and their tunnel addresses
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Manage the internal DNS zone
    Dns(DnsArgs),

    /// Manage trusted source addresses
    Trust(TrustArgs),

    /// Inspect full-tunnel route expansion
    Routes(RoutesArgs),

    /// Show server tunnel parameters
    Server,

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  USERS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommand,
}

#[derive(Debug, Subcommand)]
pub enum UsersCommand {
    /// List users
    #[command(alias = "ls")]
    List,

    /// Get user details
    Get {
        /// User ID (UUID) or name
        user: String,
    },

    /// Create a user
    Create {
        /// Display name
        name: String,

        /// Grant manager rights (issues a second-factor secret)
        #[arg(long)]
        manager: bool,
    },

    /// Rename a user or change manager rights
    Update {
        /// User ID (UUID) or name
        user: String,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// Grant (true) or revoke (false) manager rights
        #[arg(long, action = clap::ArgAction::Set)]
        manager: Option<bool>,
    },

    /// Remove a user and every device they own
    #[command(alias = "rm")]
    Remove {
        /// User ID (UUID) or name
        user: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices
    #[command(alias = "ls")]
    List,

    /// Get device details
    Get {
        /// Tunnel address of the device
        address: Ipv4Addr,
    },

    /// Register a device and allocate its tunnel address
    Create {
        /// Owner: user ID (UUID) or name
        #[arg(long)]
        owner: String,

        /// Human-readable label
        #[arg(long)]
        label: String,

        /// Route all traffic through the tunnel
        #[arg(long)]
        wan_forward: bool,

        /// Device public key (base64). Generated when omitted.
        #[arg(long)]
        public_key: Option<String>,
    },

    /// Change a device's label, routing, key or owner
    Update {
        /// Tunnel address of the device
        address: Ipv4Addr,

        #[arg(long)]
        label: Option<String>,

        /// Route all traffic through the tunnel (true/false)
        #[arg(long, action = clap::ArgAction::Set)]
        wan_forward: Option<bool>,

        /// New public key (base64)
        #[arg(long)]
        public_key: Option<String>,

        /// New owner: user ID (UUID) or name
        #[arg(long)]
        owner: Option<String>,
    },

    /// Remove a device and free its address
    #[command(alias = "rm")]
    Remove {
        /// Tunnel address of the device
        address: Ipv4Addr,
    },

    /// Print the tunnel configuration for a device
    Config {
        /// Tunnel address of the device
        address: Ipv4Addr,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DNS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DnsArgs {
    #[command(subcommand)]
    pub command: DnsCommand,
}

#[derive(Debug, Subcommand)]
pub enum DnsCommand {
    /// List domains
    #[command(alias = "ls")]
    List,

    /// Get a domain and its records
    Get { name: String },

    /// Create an empty domain
    Create { name: String },

    /// Remove a domain with all its records
    #[command(alias = "rm")]
    Remove { name: String },

    /// Add or replace an A record
    SetA {
        name: String,

        address: Ipv4Addr,

        /// Record TTL in seconds
        #[arg(long, default_value = "300")]
        ttl: u32,
    },

    /// Set the CNAME record
    SetCname {
        name: String,

        target: String,

        /// Record TTL in seconds
        #[arg(long, default_value = "300")]
        ttl: u32,
    },

    /// Remove the A record for an address
    RemoveA { name: String, address: Ipv4Addr },

    /// Remove the CNAME record if it points at the target
    RemoveCname { name: String, target: String },

    /// Resolve a name to addresses, following CNAMEs
    Resolve { name: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TRUST
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct TrustArgs {
    #[command(subcommand)]
    pub command: TrustCommand,
}

#[derive(Debug, Subcommand)]
pub enum TrustCommand {
    /// List trusted addresses
    #[command(alias = "ls")]
    List,

    /// Trust an address
    Add { address: Ipv4Addr },

    /// Stop trusting an address
    #[command(alias = "rm")]
    Remove { address: Ipv4Addr },

    /// Replace the whole set
    Bootstrap {
        /// Addresses to trust
        addresses: Vec<Ipv4Addr>,

        /// Read addresses from a file, one per line
        #[arg(long, conflicts_with = "addresses")]
        from_file: Option<PathBuf>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  ROUTES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RoutesArgs {
    #[command(subcommand)]
    pub command: RoutesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RoutesCommand {
    /// Prefixes a full-tunnel device routes through the tunnel
    Full,

    /// Ranges kept outside the tunnel
    Exclusions,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Store the session signing secret in the system keyring
    SetSecret,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
