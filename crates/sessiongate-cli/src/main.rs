//! sessiongate - command-line front end for the sessiongate engine.
//!
//! Runs the configured authentication strategy against JSON record tables
//! in the user's data directory, so accounts and persisted sessions can be
//! created and inspected without a server.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use sessiongate_core::auth::credentials::credentials_from_header;
use sessiongate_core::store::JsonFileRecordStore;
use sessiongate_core::users::RecordUserRepo;
use sessiongate_core::{
    build_strategy, AccountService, Argon2Hasher, AuthConfig, AuthStrategy, Hasher,
    RequestParts, StrategyDeps, StrategyKind, UserRepo,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ============================================================================
// Constants
// ============================================================================

/// Overrides the data directory (default: `<data_dir>/sessiongate`)
const DATA_DIR_ENV: &str = "SESSIONGATE_DATA_DIR";

const USERS_TABLE: &str = "users";
const SESSIONS_TABLE: &str = "user_sessions";

const USAGE: &str = "\
Usage: sessiongate <command> [args]

Commands:
  config                      Show the effective configuration
  check-path <path>           Whether <path> requires authentication
  decode-header <header>      Decode a Basic Authorization header
  register <email>            Create an account (prompts for password)
  login <email>               Verify password and start a session
  whoami <token>              Resolve a session token to a user
  logout <token>              Destroy a session
  sweep                       Delete expired sessions
  reset-token <email>         Issue a password reset token
  reset-password <token>      Set a new password using a reset token";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Everything a command may need, wired from configuration.
struct App {
    config: AuthConfig,
    accounts: AccountService,
    strategy: Box<dyn AuthStrategy>,
}

fn data_dir() -> Result<PathBuf> {
    match std::env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir)),
        _ => AuthConfig::data_dir(),
    }
}

fn load_config() -> Result<AuthConfig> {
    let path = AuthConfig::config_path()?;
    let config = AuthConfig::load_file(&path)?
        .overlay_env()
        .context("Invalid environment configuration")?;
    debug!(path = %path.display(), strategy = %config.strategy, "Loaded configuration");
    Ok(config)
}

fn build_app() -> Result<App> {
    let config = load_config()?;
    let dir = data_dir()?;

    let users: Arc<dyn UserRepo> = Arc::new(RecordUserRepo::new(
        JsonFileRecordStore::open(&dir, USERS_TABLE)
            .with_context(|| format!("Failed to open user table in {}", dir.display()))?,
    ));
    let session_records = Arc::new(
        JsonFileRecordStore::open(&dir, SESSIONS_TABLE)
            .with_context(|| format!("Failed to open session table in {}", dir.display()))?,
    );
    let hasher: Arc<dyn Hasher> = Arc::new(Argon2Hasher::new());

    let strategy = build_strategy(
        &config,
        StrategyDeps {
            users: users.clone(),
            hasher: hasher.clone(),
            session_records,
        },
    );

    Ok(App {
        accounts: AccountService::new(users, hasher),
        config,
        strategy,
    })
}

fn prompt_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt)?;
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

fn require_arg<'a>(args: &'a [String], name: &str) -> Result<&'a str> {
    args.get(2)
        .map(String::as_str)
        .with_context(|| format!("Missing <{}> argument\n\n{}", name, USAGE))
}

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1).map(String::as_str) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    match command {
        "config" => cmd_config(),
        "check-path" => cmd_check_path(require_arg(&args, "path")?),
        "decode-header" => cmd_decode_header(require_arg(&args, "header")?),
        "register" => cmd_register(require_arg(&args, "email")?),
        "login" => cmd_login(require_arg(&args, "email")?),
        "whoami" => cmd_whoami(require_arg(&args, "token")?),
        "logout" => cmd_logout(require_arg(&args, "token")?),
        "sweep" => cmd_sweep(),
        "reset-token" => cmd_reset_token(require_arg(&args, "email")?),
        "reset-password" => cmd_reset_password(require_arg(&args, "token")?),
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_config() -> Result<()> {
    let config = load_config()?;
    println!("strategy:         {}", config.strategy);
    println!("cookie name:      {}", config.session_cookie_name);
    if config.session_duration.never_expires() {
        println!("session duration: never expires");
    } else {
        println!("session duration: {}s", config.session_duration.as_secs());
    }
    println!("exempt paths:     {}", config.exempt_paths.join(", "));
    println!("data directory:   {}", data_dir()?.display());
    Ok(())
}

fn cmd_check_path(path: &str) -> Result<()> {
    let app = build_app()?;
    if app.strategy.require_auth(path, &app.config.exempt_paths) {
        println!("{}: authentication required", path);
    } else {
        println!("{}: exempt", path);
    }
    Ok(())
}

fn cmd_decode_header(header: &str) -> Result<()> {
    match credentials_from_header(Some(header)) {
        // The secret is deliberately not echoed
        Some(credentials) => println!("identifier: {}", credentials.identifier),
        None => println!("no credentials"),
    }
    Ok(())
}

fn cmd_register(email: &str) -> Result<()> {
    let app = build_app()?;
    let password = prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    let user = app.accounts.register_user(email, &password)?;
    println!("Registered {} ({})", user.email, user.id);
    Ok(())
}

fn cmd_login(email: &str) -> Result<()> {
    let app = build_app()?;
    if !app.config.strategy.uses_sessions() {
        bail!("AUTH_TYPE={} does not issue sessions", app.config.strategy);
    }

    let password = prompt_password("Password: ")?;
    if !app.accounts.valid_login(email, &password)? {
        bail!("Invalid email or password");
    }
    let user = app
        .accounts
        .user_by_email(email)?
        .context("User disappeared during login")?;

    let token = app
        .strategy
        .create_session(&user.id)?
        .context("Strategy refused to create a session")?;
    info!(user_id = %user.id, "Logged in");

    if app.config.strategy != StrategyKind::SessionDb {
        warn!("In-memory sessions end when this process exits");
    }

    println!("{}={}", app.config.session_cookie_name, token);
    if let Some(expiry) = app.config.session_duration.expires_at(Utc::now()) {
        println!("expires: {}", expiry.to_rfc3339());
    }
    Ok(())
}

fn session_request(app: &App, token: &str) -> RequestParts {
    RequestParts::new("/").with_cookie(app.config.session_cookie_name.clone(), token.trim())
}

fn cmd_whoami(token: &str) -> Result<()> {
    let app = build_app()?;
    match app.strategy.current_user(&session_request(&app, token))? {
        Some(user) => println!("{} ({})", user.email, user.id),
        None => println!("no active session"),
    }
    Ok(())
}

fn cmd_logout(token: &str) -> Result<()> {
    let app = build_app()?;
    if app.strategy.destroy_session(&session_request(&app, token))? {
        println!("Logged out");
    } else {
        println!("No such session");
    }
    Ok(())
}

fn cmd_sweep() -> Result<()> {
    let app = build_app()?;
    let removed = app.strategy.sweep_expired_sessions()?;
    info!(removed, "Swept expired sessions");
    println!("Removed {} expired session(s)", removed);
    Ok(())
}

fn cmd_reset_token(email: &str) -> Result<()> {
    let app = build_app()?;
    let token = app.accounts.reset_password_token(email)?;
    println!("reset token: {}", token);
    Ok(())
}

fn cmd_reset_password(token: &str) -> Result<()> {
    let app = build_app()?;
    let password = prompt_password("New password: ")?;
    app.accounts.update_password(token.trim(), &password)?;
    println!("Password updated");
    Ok(())
}
