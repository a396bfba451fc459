//! Nova-Cart CLI - inspect and edit a shopper's cart and wishlist.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! nova-cli cart show
//!
//! # Add a variant to the cart, then bump its quantity
//! nova-cli cart add p-123 --variant v-large
//! nova-cli cart inc p-123 --variant v-large
//!
//! # Save to the wishlist and move it into the cart later
//! nova-cli wishlist add p-456
//! nova-cli wishlist move p-456
//! ```
//!
//! # Environment Variables
//!
//! - `NOVA_API_BASE_URL` - Base URL of the Nova-Cart API
//! - `NOVA_API_TOKEN` - Bearer token for the shopper session
//! - `NOVA_LOG_FORMAT` - Set to `json` for JSON log lines
//! - `RUST_LOG` - Log filter (default `nova_cart_storefront=info,nova_cli=info`)
//!
//! Each command prints the resulting collection as JSON on stdout. Rejected
//! operations print a short message on stderr and exit with status 1.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "nova-cli")]
#[command(author, version, about = "Nova-Cart cart and wishlist tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
}

/// A product, optionally narrowed to one of its variants.
#[derive(Args)]
struct ItemArgs {
    /// Product ID
    product: String,

    /// Variant ID
    #[arg(short, long)]
    variant: Option<String>,
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add one unit of an item
    Add(ItemArgs),
    /// Increase an item's quantity by one
    Inc(ItemArgs),
    /// Decrease an item's quantity by one (never below one)
    Dec(ItemArgs),
    /// Remove an item
    Remove(ItemArgs),
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Print the wishlist
    Show,
    /// Save an item
    Add(ItemArgs),
    /// Remove an item
    Remove(ItemArgs),
    /// Move an item into the cart
    Move(ItemArgs),
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nova_cart_storefront=info,nova_cli=info".into());

    let json = std::env::var("NOVA_LOG_FORMAT").is_ok_and(|format| format == "json");

    // Logs go to stderr so stdout stays valid JSON.
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Command failed");
        #[allow(clippy::print_stderr)]
        {
            eprintln!("{}", e.user_message());
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let session = commands::Session::connect().await?;

    let output = match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&session)?,
            CartAction::Add(item) => {
                commands::cart::add(&session, &item.product, item.variant.as_deref()).await?
            }
            CartAction::Inc(item) => {
                commands::cart::increase(&session, &item.product, item.variant.as_deref()).await?
            }
            CartAction::Dec(item) => {
                commands::cart::decrease(&session, &item.product, item.variant.as_deref()).await?
            }
            CartAction::Remove(item) => {
                commands::cart::remove(&session, &item.product, item.variant.as_deref()).await?
            }
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::Show => commands::wishlist::show(&session)?,
            WishlistAction::Add(item) => {
                commands::wishlist::add(&session, &item.product, item.variant.as_deref()).await?
            }
            WishlistAction::Remove(item) => {
                commands::wishlist::remove(&session, &item.product, item.variant.as_deref())
                    .await?
            }
            WishlistAction::Move(item) => {
                commands::wishlist::move_to_cart(&session, &item.product, item.variant.as_deref())
                    .await?
            }
        },
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}
