use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "milk")]
#[command(about = "Rate and discover plant-based milk from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for backend and auth configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Serve data from a local JSON fixture instead of the backend
    #[arg(long, global = true, value_name = "PATH")]
    pub fixture: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search products by name, brand, property or flavor
    Search {
        /// Search term (at least two characters)
        term: Vec<String>,
        /// Always run the name and common-term fallback queries
        #[arg(long)]
        all_layers: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the latest milk tests
    Feed {
        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,
        /// Tests per page
        #[arg(long, default_value = "20")]
        page_size: usize,
        /// Group tests by product with average rating
        #[arg(long)]
        by_product: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show community statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one product and its tests
    Product {
        /// Product ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rate a product, creating brand, name, shop and product as needed
    Rate(RateArgs),
    /// List reference data
    Lookup {
        #[arg(value_enum)]
        kind: LookupKind,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or mark notifications for the signed-in user
    Notifications {
        #[command(subcommand)]
        command: Option<NotificationCommands>,
    },
    /// Show or edit the signed-in user's profile
    Profile {
        #[command(subcommand)]
        command: Option<ProfileCommands>,
    },
    /// Check for a newer release of the app
    Update {
        #[command(subcommand)]
        command: Option<UpdateCommands>,
    },
    /// Show client version, active profile and backend
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Authenticate CLI profile with Supabase
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct RateArgs {
    /// Brand name, e.g. "Oatly"
    #[arg(long)]
    pub brand: String,
    /// Product name, e.g. "Oat Drink"
    #[arg(long)]
    pub name: String,
    /// Product is a barista edition
    #[arg(long)]
    pub barista: bool,
    /// Rating from 0 to 10
    #[arg(long)]
    pub rating: f64,
    /// Optional tasting notes
    #[arg(long)]
    pub notes: Option<String>,
    /// Price versus quality verdict
    #[arg(long, value_enum)]
    pub price: Option<PriceArg>,
    /// Shop where the product was bought
    #[arg(long)]
    pub shop: Option<String>,
    /// Property key such as `no_added_sugar` (repeatable)
    #[arg(long = "property", value_name = "KEY")]
    pub properties: Vec<String>,
    /// Flavor key such as `vanilla` (repeatable)
    #[arg(long = "flavor", value_name = "KEY")]
    pub flavors: Vec<String>,
    /// Picture of the product to upload
    #[arg(long, value_name = "PATH")]
    pub picture: Option<PathBuf>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PriceArg {
    TooExpensive,
    FairPrice,
    GreatDeal,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum LookupKind {
    Brands,
    Shops,
    Flavors,
    Properties,
    Countries,
    Currencies,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List recent notifications
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a notification as read
    Read {
        /// Notification ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show the profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the public display name
    SetName {
        /// New display name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum UpdateCommands {
    /// Check the latest published release
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Hide the current update notice for its cooldown
    Dismiss,
    /// Forget any dismissed notice
    Reset,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Storage bucket for product pictures
        #[arg(long, value_name = "NAME")]
        storage_bucket: Option<String>,
        /// Optional bootstrap manifest URL
        #[arg(long, value_name = "URL")]
        bootstrap_url: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Show the resolved configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Login with Supabase email/password and store session in keychain
    Login {
        /// Supabase account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Supabase account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create an account
    Signup {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show auth status for profile
    Status,
    /// Logout profile and clear stored session
    Logout,
    /// Email a password reset link
    Recover {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Where the reset link should redirect
        #[arg(long, value_name = "URL")]
        redirect_to: Option<String>,
    },
    /// Set a new password from a reset link
    ResetPassword {
        /// The full redirect URL (or its `#...` fragment) from the reset email
        #[arg(long, value_name = "URL")]
        link: String,
        /// New password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
}
