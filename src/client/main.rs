/**
 * Panel Command-Line Client
 *
 * Drives the session runtime from a terminal: sign in and out, register,
 * recover a password, set an unlock pattern, and inspect or guard-check
 * the stored session.
 * Remembered sessions persist in the data directory; others last for the
 * lifetime of the process.
 */
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use panel_session::client::guard::{login_redirect, LOGIN_ROUTE};
use panel_session::client::types::RegisterOutcome;
use panel_session::client::{
    AuthController, Config, FileStorage, ForgotPasswordForm, GuardDecision, HttpAuthApi,
    LoginForm, MemoryStorage, PatternForm, RegisterForm, ResetPasswordForm, RouteGuard,
    SessionStore, SystemClock,
};
use panel_session::shared::AuthError;

/// Admin panel session client.
#[derive(Debug, Parser)]
#[command(name = "panel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config dir).
    #[arg(short, long, env = "PANEL_CONFIG")]
    config: Option<PathBuf>,

    /// API base URL (overrides config).
    #[arg(short, long)]
    server: Option<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in with a username or email.
    Login {
        identifier: String,
        #[arg(long, env = "PANEL_PASSWORD", hide_env_values = true)]
        password: String,
        /// Keep the session across restarts.
        #[arg(long)]
        remember: bool,
        /// Page that sent you to the login screen.
        #[arg(long)]
        redirect: Option<String>,
    },
    /// Create an account.
    Register {
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "PANEL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Send a password recovery email.
    Forgot { email: String },
    /// Set a new password from a recovery link.
    Reset {
        /// Recovery link as received by email.
        #[arg(long)]
        url: String,
        #[arg(long, env = "PANEL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the signed-in user.
    Whoami,
    /// Show the stored session.
    Status,
    /// Sign out and forget the session.
    Logout,
    /// Set the unlock pattern: grid cells 0-8, row by row, e.g. `0-4-8`.
    Pattern {
        #[arg(value_delimiter = '-', num_args = 1.., required = true)]
        cells: Vec<u8>,
    },
    /// Ask the route guard about a navigation target.
    Check { path: String },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config::load(cli.config.as_deref())?;
    Ok(match &cli.server {
        Some(server) => config.with_api_base_url(server.clone())?,
        None => config,
    })
}

fn report(error: &AuthError) {
    eprintln!("error: {}", error.user_message());
    if let Some(secs) = error.cooldown_secs() {
        eprintln!("retry in {}s", secs);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    tracing::debug!(api = config.api_base_url(), "Configuration loaded");

    let store = SessionStore::new(
        Arc::new(FileStorage::new(config.session_file())),
        Arc::new(MemoryStorage::new()),
    );
    let api = Arc::new(HttpAuthApi::new(config.clone(), store.clone())?);

    let location = match &cli.command {
        Command::Login { .. }
        | Command::Register { .. }
        | Command::Forgot { .. }
        | Command::Reset { .. } => LOGIN_ROUTE.to_string(),
        Command::Check { path } => path.clone(),
        _ => "/dashboard".to_string(),
    };
    let controller = AuthController::start(store.clone(), api.clone(), &location).await;
    api.set_unauthorized_listener(controller.unauthorized_listener());

    let outcome = run(cli.command, &controller, &config).await;
    if let Err(e) = outcome {
        report(&e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(
    command: Command,
    controller: &AuthController,
    config: &Config,
) -> Result<(), AuthError> {
    let clock = Arc::new(SystemClock);
    match command {
        Command::Login {
            identifier,
            password,
            remember,
            redirect,
        } => {
            let mut form = LoginForm::with_clock(clock);
            form.identifier = identifier;
            form.password = password;
            form.remember = remember;
            let login_location = match redirect {
                Some(target) => login_redirect(LOGIN_ROUTE, &target),
                None => LOGIN_ROUTE.to_string(),
            };
            let success = form.submit(controller, &login_location).await?;
            controller.settled().await;
            println!("Welcome, {}!", success.welcome);
            println!("next: {}", success.redirect_to);
        }
        Command::Register {
            full_name,
            email,
            username,
            password,
        } => {
            let mut form = RegisterForm::new(clock);
            form.full_name = full_name;
            form.email = email;
            form.username = username;
            form.password = password;
            match form.submit(controller.api().as_ref()).await? {
                RegisterOutcome::SignedIn(payload) => {
                    println!("Account created for {}.", payload.welcome_name());
                }
                RegisterOutcome::ConfirmationRequired => {
                    println!("Account created. Check your email to confirm it.");
                }
            }
        }
        Command::Forgot { email } => {
            let mut form = ForgotPasswordForm::new(clock);
            form.email = email;
            form.submit(controller.api().as_ref(), config.password_reset_redirect())
                .await?;
            println!("If the address is registered, a recovery email is on its way.");
        }
        Command::Reset { url, password } => {
            let mut form = ResetPasswordForm::from_url(&url);
            form.password = password.clone();
            form.confirm = password;
            let confirmation = form.submit(controller.api().as_ref()).await?;
            println!(
                "{}",
                confirmation
                    .message
                    .unwrap_or_else(|| "Password updated. You can sign in now.".to_string())
            );
        }
        Command::Whoami => {
            let snapshot = controller.settled().await;
            match snapshot.user {
                Some(user) => println!(
                    "{} ({})",
                    user.name.as_deref().unwrap_or(&user.id),
                    user.email.as_deref().unwrap_or("-")
                ),
                None => {
                    println!("Not signed in.");
                    std::process::exit(1);
                }
            }
        }
        Command::Status => match controller.store().get_session() {
            Some(session) => {
                println!("signed in: {}", controller.store().is_logged_in());
                println!("token type: {}", session.token_type);
                match session.expires_in {
                    Some(secs) => println!("expires in: {}s", secs),
                    None => println!("expires in: never"),
                }
                if let Some(email) = session.email {
                    println!("email: {}", email);
                }
            }
            None => println!("No stored session."),
        },
        Command::Logout => {
            controller.sign_out().await;
            println!("Signed out.");
        }
        Command::Pattern { cells } => {
            controller.settled().await;
            let mut form = PatternForm::new();
            for cell in cells {
                if !form.push(cell) {
                    tracing::warn!(cell, "Skipping repeated or off-grid cell");
                }
            }
            let pattern = form.serialize();
            form.submit(controller).await?;
            println!("Unlock pattern {} saved.", pattern);
        }
        Command::Check { path } => {
            match RouteGuard::new(controller.store().clone()).navigate(&path) {
                GuardDecision::Allow => println!("allow {}", path),
                GuardDecision::Redirect { to } => println!("redirect {}", to),
            }
        }
    }
    Ok(())
}
