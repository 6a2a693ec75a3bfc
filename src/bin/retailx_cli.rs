use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;

use retailx_api::{
    auth::{AuthConfig, AuthService},
    codes::{self, BarcodeFormat},
    config::{self, AppConfig},
    db,
    entities::account::Role,
    services::{factory::ServiceFactory, festival_sales::FestivalSalesService},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Festival(args) => handle_festival(args, cli.json).await?,
        Commands::Barcode(args) => handle_barcode(args)?,
        Commands::Qr(args) => handle_qr(args)?,
        Commands::Accounts(command) => handle_accounts(command, cli.json).await?,
        Commands::Migrate => handle_migrate().await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "retailx", about = "RetailX back-office tooling", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank products for a festival name or DD-MM-YYYY date
    Festival(FestivalArgs),
    /// Write a barcode as SVG
    Barcode(BarcodeArgs),
    /// Write a QR code as SVG
    Qr(QrArgs),
    #[command(subcommand)]
    Accounts(AccountCommands),
    /// Apply pending database migrations
    Migrate,
}

#[derive(Args)]
struct FestivalArgs {
    #[arg(help = "Festival name, alias or date (DD-MM-YYYY)")]
    query: String,
    #[arg(long, help = "Model folder; defaults to the configured one")]
    model_dir: Option<PathBuf>,
}

#[derive(Args)]
struct BarcodeArgs {
    #[arg(help = "Text to encode")]
    data: String,
    #[arg(long, default_value = "ean13", help = "ean13, ean8, upca, code128 or code39")]
    format: String,
    #[arg(long, short, help = "Output file; defaults to <data>.svg")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct QrArgs {
    #[arg(help = "Text or URL to encode")]
    data: String,
    #[arg(long, short, help = "Output file; defaults to <data>.svg")]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Create an admin account without e-mail verification
    CreateAdmin(CreateAdminArgs),
}

#[derive(Args)]
struct CreateAdminArgs {
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
}

async fn handle_festival(args: FestivalArgs, json: bool) -> Result<()> {
    let mut forecast = load_app_config()?.forecast;
    if let Some(dir) = args.model_dir {
        forecast.model_dir = dir.to_string_lossy().into_owned();
    }

    let response = FestivalSalesService::new(&forecast)
        .rank_for(&args.query)
        .await
        .context("failed to rank festival sales")?;

    if json {
        return print_json(&response);
    }

    if let Some(error) = &response.error {
        println!("{}", error);
        return Ok(());
    }

    if let Some(festival) = &response.festival {
        println!("Festival: {}", festival);
    }
    println!("Top products:");
    for (idx, p) in response.top_products.iter().enumerate() {
        println!("  {:>2}. {} ({})", idx + 1, p.product, p.predicted_sales);
    }
    println!("Least products:");
    for (idx, p) in response.least_products.iter().enumerate() {
        println!("  {:>2}. {} ({})", idx + 1, p.product, p.predicted_sales);
    }
    Ok(())
}

fn handle_barcode(args: BarcodeArgs) -> Result<()> {
    let format: BarcodeFormat = codes::parse_format(&args.format)?;
    let barcode = codes::encode(&args.data, format)?;
    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(codes::default_file_name(&args.data)));

    fs::write(&path, barcode.to_svg())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("{} barcode saved to {}", format, path.display());
    Ok(())
}

fn handle_qr(args: QrArgs) -> Result<()> {
    let svg = codes::qr_svg(&args.data)?;
    let path = args
        .output
        .unwrap_or_else(|| PathBuf::from(codes::default_file_name(&args.data)));

    fs::write(&path, svg).with_context(|| format!("failed to write {}", path.display()))?;
    println!("QR code saved to {}", path.display());
    Ok(())
}

async fn handle_accounts(command: AccountCommands, json: bool) -> Result<()> {
    match command {
        AccountCommands::CreateAdmin(args) => {
            let cfg = load_app_config()?;
            let db = Arc::new(
                db::establish_connection_from_app_config(&cfg)
                    .await
                    .context("failed to connect to database")?,
            );
            let auth = Arc::new(AuthService::new(AuthConfig::from_app_config(&cfg)));
            let accounts = ServiceFactory::new(db, auth, cfg).accounts_service()?;

            let account = accounts
                .create_account(
                    Role::Admin,
                    &args.full_name,
                    &args.email,
                    &args.username,
                    &args.password,
                )
                .await
                .context("failed to create admin account")?;

            if json {
                print_json(&retailx_api::services::accounts::AccountResponse::from(account))?;
            } else {
                println!("Admin {} created (id {})", account.username, account.id);
            }
        }
    }
    Ok(())
}

async fn handle_migrate() -> Result<()> {
    let cfg = load_app_config()?;
    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    db::run_migrations(&pool).await.context("migrations failed")?;
    println!("Migrations applied");
    Ok(())
}

fn load_app_config() -> Result<AppConfig> {
    let cfg = config::load_config().context("failed to load application config")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);
    Ok(cfg)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
