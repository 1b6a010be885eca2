//! stockas - command-line session client for the stockas inventory API.
//!
//! Signs in, keeps the token pair fresh between invocations and sends
//! authenticated requests through the same gateway a UI would use.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stockas_core::auth::token;
use stockas_core::{Config, GuardDecision, Navigator, SessionContext};

/// Log file name prefix; the appender adds the date
const LOG_FILE_NAME: &str = "stockas.log";

#[derive(Parser)]
#[command(name = "stockas")]
#[command(about = "Session client for the stockas inventory API")]
#[command(version)]
struct Cli {
    /// Also write logs to a daily file in the log directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        email: String,
    },
    /// Create an account and store the session
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
    },
    /// Sign out on the server and drop the local session
    Logout {
        /// Drop the local session even if the server refuses
        #[arg(long)]
        force: bool,
    },
    /// Show the stored session state
    Status,
    /// Exchange the refresh token for a new pair now
    Refresh,
    /// Show the signed-in user's profile
    Profile,
    /// Send an authenticated GET and print the response body
    Get { path: String },
    /// Run the route check for a path
    Guard { route: String },
}

/// Prints redirects issued by the session layer as a hint for the user.
struct ConsoleNavigator {
    sign_in: String,
}

impl ConsoleNavigator {
    fn new(config: &Config) -> Self {
        Self {
            sign_in: config.routes.sign_in.clone(),
        }
    }

    fn hint(&self, route: &str) -> String {
        if route == self.sign_in {
            "Session ended. Run `stockas login` to sign in again.".to_string()
        } else {
            format!("-> {}", route)
        }
    }
}

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: &str) {
        debug!(route, "Redirect requested");
        eprintln!("{}", self.hint(route));
    }
}

/// Initialize the tracing subscriber for logging.
///
/// Returns the file writer guard when file logging is on; it must live until
/// exit so buffered lines are flushed.
fn init_tracing(config: &Config, log_file: bool) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = if log_file {
        let log_dir: PathBuf = config.log_dir()?;
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
        let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load_with_env()?;
    let _log_guard = init_tracing(&config, cli.log_file)?;
    info!(base_url = %config.api_base_url, "stockas starting");

    let navigator = Arc::new(ConsoleNavigator::new(&config));
    let ctx = SessionContext::from_config(config, navigator)?;
    run(cli.command, &ctx).await
}

async fn run(command: Commands, ctx: &SessionContext) -> Result<()> {
    match command {
        Commands::Login { email } => {
            let password = rpassword::prompt_password("Password: ")?;
            ctx.api.login(&email, &password).await?;
            println!("Signed in as {}", email);
        }
        Commands::Register { name, email } => {
            let password = rpassword::prompt_password("Password: ")?;
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != confirm {
                bail!("Passwords do not match");
            }
            ctx.api.register(&name, &email, &password).await?;
            println!("Account created for {}", email);
        }
        Commands::Logout { force } => {
            if ctx.api.logout().await {
                println!("Signed out");
            } else if force {
                ctx.store.clear();
                println!("Local session cleared");
            } else {
                bail!("Sign-out failed; use --force to drop the local session anyway");
            }
        }
        Commands::Status => print_status(ctx),
        Commands::Refresh => {
            ctx.api.refresher().refresh().await?;
            println!("Session refreshed");
            print_status(ctx);
        }
        Commands::Profile => {
            let profile = ctx.api.fetch_user_profile().await?;
            println!("{} <{}>", profile.name, profile.email);
        }
        Commands::Get { path } => {
            let response = ctx.api.get(&path).await?;
            let status = response.status();
            let body = response.text().await?;
            eprintln!("{}", status);
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
                Err(_) => println!("{}", body),
            }
        }
        Commands::Guard { route } => match ctx.guard.check(&route).await {
            GuardDecision::Allow => println!("allow {}", route),
            GuardDecision::Redirect(target) => println!("redirect {} -> {}", route, target),
        },
    }
    Ok(())
}

fn print_status(ctx: &SessionContext) {
    let Some(access_token) = ctx.store.access_token() else {
        let refresh = if ctx.store.refresh_token().is_some() {
            " (refresh token held)"
        } else {
            ""
        };
        println!("Not signed in{}", refresh);
        return;
    };

    let valid = token::is_valid(&access_token);
    println!("Access token: {}", if valid { "valid" } else { "expired" });
    if let Some(remaining) = token::time_until_expiry(&access_token) {
        println!("Expires in: {} min", remaining.num_minutes());
    }
    if token::is_near_expiry(&access_token, ctx.api.refresh_threshold()) {
        println!("Near expiry: yes");
    }
    if let Some(sub) = token::subject(&access_token) {
        println!("User id: {}", sub);
    }
    println!(
        "Refresh token: {}",
        if ctx.store.refresh_token().is_some() { "present" } else { "missing" }
    );
}
