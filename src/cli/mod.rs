use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::LedgerService;
use crate::config::{ServerConfig, StoreConfig};
use crate::domain::Amount;
use crate::http;
use crate::telemetry::{self, LogFormat};

/// Orderdesk - debit balances and record orders, atomically
#[derive(Parser)]
#[command(name = "orderdesk")]
#[command(about = "A small order-placement service over a transactional ledger store")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreConfig,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Run the HTTP service
    Serve(ServerConfig),

    /// User management commands
    #[command(subcommand)]
    User(UserCommands),

    /// Order commands
    #[command(subcommand)]
    Order(OrderCommands),

    /// Verify ledger integrity
    Check,
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a new user
    Create {
        /// Display name
        name: String,

        /// Initial balance
        #[arg(short, long, allow_negative_numbers = true)]
        balance: Amount,
    },

    /// List all users
    List,
}

#[derive(Subcommand)]
pub enum OrderCommands {
    /// Place an order, debiting the user's balance
    Place {
        /// Amount to debit
        #[arg(allow_negative_numbers = true)]
        amount: Amount,

        /// User ID
        #[arg(long)]
        user: String,
    },

    /// List all orders
    List,
}

impl Cli {
    /// Level comes from `--verbose`, format from the command.
    fn log_settings(&self) -> (&'static str, LogFormat) {
        let level = if self.verbose { "debug" } else { "info" };
        let format = match self.command {
            Commands::Serve(_) => LogFormat::Json,
            _ => LogFormat::Text,
        };
        (level, format)
    }

    pub async fn run(self) -> Result<()> {
        let (level, format) = self.log_settings();
        telemetry::init(level, format);

        let StoreConfig {
            database_url,
            max_connections,
        } = self.store;

        match self.command {
            Commands::Init => {
                LedgerService::init(&database_url, max_connections).await?;
                println!("Database initialized: {}", database_url);
            }

            Commands::Serve(server) => {
                let service = LedgerService::init(&database_url, max_connections).await?;
                http::serve(server, service)
                    .await
                    .context("HTTP server failed")?;
            }

            Commands::User(user_cmd) => {
                let service = LedgerService::connect(&database_url, max_connections).await?;
                run_user_command(&service, user_cmd).await?;
            }

            Commands::Order(order_cmd) => {
                let service = LedgerService::connect(&database_url, max_connections).await?;
                run_order_command(&service, order_cmd).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&database_url, max_connections).await?;
                run_check_command(&service).await?;
            }
        }

        Ok(())
    }
}

async fn run_user_command(service: &LedgerService, cmd: UserCommands) -> Result<()> {
    match cmd {
        UserCommands::Create { name, balance } => {
            let user = service.create_user(name, balance).await?;
            println!("Created user: {} ({})", user.name, user.id);
        }

        UserCommands::List => {
            let users = service.list_users().await?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<36}  {:<20} {:>12}", "ID", "NAME", "BALANCE");
                println!("{}", "-".repeat(70));
                for user in users {
                    println!("{:<36}  {:<20} {:>12}", user.id, user.name, user.balance);
                }
            }
        }
    }
    Ok(())
}

async fn run_order_command(service: &LedgerService, cmd: OrderCommands) -> Result<()> {
    match cmd {
        OrderCommands::Place { amount, user } => {
            let user_id =
                Uuid::parse_str(&user).context("Invalid user ID format (expected UUID)")?;
            let order = service.place_order(user_id, amount).await?;
            println!("Placed order: {} for {} ({})", order.amount, order.user_id, order.id);
        }

        OrderCommands::List => {
            let orders = service.list_orders().await?;
            if orders.is_empty() {
                println!("No orders found.");
            } else {
                println!(
                    "{:<36}  {:<36}  {:>12}  {:<19}",
                    "ID", "USER", "AMOUNT", "DATETIME"
                );
                println!("{}", "-".repeat(110));
                for order in orders {
                    println!(
                        "{:<36}  {:<36}  {:>12}  {:<19}",
                        order.id,
                        order.user_id,
                        order.amount,
                        order.datetime.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    let stats = service.check_integrity().await?;

    println!("Ledger integrity check");
    println!("  Users:           {}", stats.user_count);
    println!("  Orders:          {}", stats.order_count);
    println!("  Orphaned orders: {}", stats.orphaned_orders);

    if stats.orphaned_orders > 0 {
        println!();
        println!("Some orders reference users that do not exist.");
    } else {
        println!();
        println!("All orders reference existing users.");
    }
    Ok(())
}
