//! Ward server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `WARD_*` environment variables, opens the SQLite store, and serves the
//! token and administration routes over HTTP.
//!
//! # Bootstrapping
//!
//! ```
//! cargo run -p ward-server --bin server -- add-subject admin@example.com --staff --role system_admin
//! cargo run -p ward-server --bin server -- --hash-password
//! ```
//!
//! Passwords are always read from stdin.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use ward_auth::{AuthState, password::hash_password};
use ward_core::{
  role::Role,
  store::{CredentialStore as _, RoleStore as _},
  subject::{NewSubject, SubjectId},
};
use ward_server::{ServerConfig, spawn_blacklist_purge};
use ward_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Ward authentication server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Register a subject with a verified email.
  AddSubject {
    email:    String,
    #[arg(long)]
    client:   bool,
    #[arg(long)]
    staff:    bool,
    #[arg(long)]
    provider: bool,
    #[arg(long)]
    internal: bool,
    /// Role to assign; may be repeated.
    #[arg(long = "role")]
    roles:    Vec<String>,
  },
  /// Replace a subject's password.
  SetPassword { subject_id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("WARD"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  anyhow::ensure!(!server_cfg.secret_key.is_empty(), "secret_key must not be empty");

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Some(Command::AddSubject { email, client, staff, provider, internal, roles }) => {
      let roles = roles
        .iter()
        .map(|name| Role::parse(name))
        .collect::<Result<Vec<_>, _>>()?;
      let password = read_password()?;
      let subject = store
        .add_subject(NewSubject {
          email,
          password_hash: hash_password(&password)
            .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?,
          is_client: client,
          is_staff: staff,
          is_provider: provider,
          is_internal: internal,
          email_verified: true,
        })
        .await
        .context("failed to add subject")?;
      for role in roles {
        anyhow::ensure!(
          subject.holds(role.persona()),
          "role {role} requires the {} persona",
          role.persona()
        );
        store.assign_role(subject.id, role).await?;
      }
      println!("{}", subject.id);
      return Ok(());
    }
    Some(Command::SetPassword { subject_id }) => {
      let password = read_password()?;
      let hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
      store
        .set_password_hash(SubjectId(subject_id), hash)
        .await
        .with_context(|| format!("failed to update subject {subject_id}"))?;
      return Ok(());
    }
    None => {}
  }

  let store = Arc::new(store);
  spawn_blacklist_purge(store.clone(), server_cfg.purge_interval());

  let app = ward_server::app(AuthState::new(store, server_cfg.codec()))
    .context("failed to build router")?;
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\n', '\r']).to_owned();
  anyhow::ensure!(!password.is_empty(), "empty password");
  Ok(password)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
