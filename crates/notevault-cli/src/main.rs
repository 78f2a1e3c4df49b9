// NoteVault CLI - operator tool for the NoteVault server

mod client;
mod signing;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

/// NoteVault - payment signing and admin tool
#[derive(Parser)]
#[command(name = "notevault")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute gateway signatures
    Sign {
        #[command(subcommand)]
        action: SignAction,
    },
    /// Check gateway signatures
    Verify {
        #[command(subcommand)]
        action: VerifyAction,
    },
    /// Admin back-office operations
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Check that a server is up
    Health {
        /// Server base URL
        #[arg(long, default_value = "http://localhost:5000")]
        server: String,
    },
}

#[derive(Subcommand)]
enum SignAction {
    /// Sign a webhook payload file
    Webhook {
        /// Path to the raw JSON body
        file: PathBuf,

        /// Webhook secret
        #[arg(long, env = "RAZORPAY_WEBHOOK_SECRET")]
        secret: String,
    },
    /// Sign a checkout (order id + payment id)
    Checkout {
        /// Gateway order id
        #[arg(long)]
        order: String,

        /// Gateway payment id
        #[arg(long)]
        payment: String,

        /// Gateway key secret
        #[arg(long, env = "RAZORPAY_KEY_SECRET")]
        secret: String,
    },
}

#[derive(Subcommand)]
enum VerifyAction {
    /// Verify a webhook payload file against a signature
    Webhook {
        /// Path to the raw JSON body
        file: PathBuf,

        /// Hex signature from X-Razorpay-Signature
        #[arg(long)]
        signature: String,

        /// Webhook secret
        #[arg(long, env = "RAZORPAY_WEBHOOK_SECRET")]
        secret: String,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Log in and print a session token
    Login {
        /// Server base URL
        #[arg(long, default_value = "http://localhost:5000")]
        server: String,

        /// Admin username or email
        #[arg(long)]
        username: String,
    },
    /// Download all orders as CSV
    ExportOrders {
        /// Server base URL
        #[arg(long, default_value = "http://localhost:5000")]
        server: String,

        /// Session token from `admin login`
        #[arg(long, env = "NOTEVAULT_TOKEN")]
        token: String,

        /// Output file path
        #[arg(short, long, default_value = "orders.csv")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sign { action } => handle_sign(action),
        Commands::Verify { action } => handle_verify(action),
        Commands::Admin { action } => handle_admin(action),
        Commands::Health { server } => handle_health(&server),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn handle_sign(action: SignAction) -> anyhow::Result<()> {
    let signature = match action {
        SignAction::Webhook { file, secret } => signing::sign_webhook_file(&file, &secret)?,
        SignAction::Checkout {
            order,
            payment,
            secret,
        } => notevault_crypto::checkout_signature(&secret, &order, &payment),
    };
    println!("{}", signature);
    Ok(())
}

fn handle_verify(action: VerifyAction) -> anyhow::Result<()> {
    match action {
        VerifyAction::Webhook {
            file,
            signature,
            secret,
        } => match signing::verify_webhook_file(&file, &signature, &secret) {
            Ok(()) => {
                println!("{} {}", "✓".green().bold(), "Signature verified".green());
                Ok(())
            }
            Err(e) => {
                eprintln!("{} {}", "✗".red().bold(), "Signature verification failed".red());
                Err(e)
            }
        },
    }
}

fn handle_admin(action: AdminAction) -> anyhow::Result<()> {
    match action {
        AdminAction::Login { server, username } => {
            let password = rpassword::prompt_password("Password: ")?;
            let token = client::login(&server, &username, &password)?;
            eprintln!("{} Logged in as {}", "✓".green().bold(), username);
            println!("{}", token);
            Ok(())
        }
        AdminAction::ExportOrders {
            server,
            token,
            output,
        } => {
            let rows = client::export_orders(&server, &token, &output)?;
            println!(
                "{} Exported {} orders to {}",
                "✓".green().bold(),
                rows,
                output.display()
            );
            Ok(())
        }
    }
}

fn handle_health(server: &str) -> anyhow::Result<()> {
    let body = client::health(server)?;
    let status = body.get("status").and_then(|s| s.as_str()).unwrap_or("unknown");
    if status == "ok" {
        println!("{} {} is healthy", "✓".green().bold(), server);
    } else {
        println!("{} {} reported status {}", "!".yellow().bold(), server, status.yellow());
    }
    if let Some(ts) = body.get("timestamp").and_then(|t| t.as_str()) {
        println!("  Timestamp: {}", ts);
    }
    Ok(())
}
