// ABOUTME: Entry point for the moovymed binary.
// ABOUTME: Parses CLI arguments, initializes tracing, opens the session file and runs one API command.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use moovymed_client::{
    ApiClient, ClientConfig, ClientError, ContentUpload, Method, Registration, RequestBody,
    RequestOptions, SessionExpiredHook, UploadFile,
};
use moovymed_session::{FileSessionStore, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "moovymed", version, about = "Talk to the MoovyMed content API")]
struct Cli {
    /// Where the session credentials are persisted.
    #[arg(long, env = "MOOVYMED_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the issued tokens.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "MOOVYMED_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and remove the stored session.
    Logout,
    /// Create an account.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "MOOVYMED_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Request a password-reset OTP by email.
    ForgotPassword { email: String },
    /// Confirm the OTP from the reset email.
    VerifyOtp { otp: String },
    /// Set a new password once the OTP is verified.
    ResetPassword {
        #[arg(long, env = "MOOVYMED_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the signed-in user's profile.
    Whoami,
    /// Change the signed-in user's email and name.
    UpdateProfile {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
    /// Select the language sent with every request (en, de).
    Locale { code: String },
    /// GET an API path and print the body.
    Get { path: String },
    /// POST to an API path and print the body.
    Post {
        path: String,
        /// JSON request body.
        #[arg(long)]
        json: Option<String>,
    },
    /// Upload a document or image to a category.
    Upload {
        #[arg(long)]
        title: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        notes: String,
        /// Repeat for several tags.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// File sent as the content's media.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

/// The CLI's stand-in for the web app's redirect to the login page.
struct LoginPrompt;

#[async_trait]
impl SessionExpiredHook for LoginPrompt {
    async fn session_expired(&self, reason: &str) {
        tracing::warn!(reason = %reason, "session expired");
        eprintln!("Your session has expired. Run `moovymed login` to sign in again.");
    }
}

fn default_session_file() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(".moovymed")
        .join("session.json")
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moovymed=info,moovymed_client=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // The hook has already told the user what to do.
            if !matches!(e.downcast_ref::<ClientError>(), Some(ClientError::SessionExpired { .. })) {
                eprintln!("error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("invalid client configuration")?;

    let session_file = cli.session_file.unwrap_or_else(default_session_file);
    let store: Arc<dyn SessionStore> = Arc::new(
        FileSessionStore::open(&session_file)
            .with_context(|| format!("failed to open session file {}", session_file.display()))?,
    );

    let client = ApiClient::builder(config, store)
        .hook(Arc::new(LoginPrompt))
        .build()?;

    tracing::debug!(base_url = %client.config().base_url(), "moovymed starting");

    match cli.command {
        Command::Login { username, password } => {
            client.login(&username, &password).await?;
            println!("Signed in as {}.", username);
        }
        Command::Logout => {
            client.logout().await?;
            println!("Signed out.");
        }
        Command::Register {
            username,
            name,
            email,
            password,
        } => {
            let registration = Registration {
                username,
                name,
                email,
                password_confirmation: password.clone(),
                password,
            };
            client.register(&registration).await?;
            println!("Registered {}. Run `moovymed login` to sign in.", registration.username);
        }
        Command::ForgotPassword { email } => {
            client.forget_password(&email).await?;
            println!("A one-time code was sent to {}.", email);
        }
        Command::VerifyOtp { otp } => {
            client.verify_otp(&otp).await?;
            println!("Code accepted. Run `moovymed reset-password` to choose a new password.");
        }
        Command::ResetPassword { password } => {
            client.reset_password(&password, &password).await?;
            println!("Password changed.");
        }
        Command::UpdateProfile { email, name } => {
            let profile = client.update_profile(&email, &name).await?;
            print_json(&profile)?;
        }
        Command::Whoami => {
            let profile = client.profile().await?;
            print_json(&profile)?;
        }
        Command::Locale { code } => {
            let locale = client.set_locale(&code)?;
            println!("Locale set to {}.", locale);
        }
        Command::Get { path } => {
            let response = client.get(&path).await?;
            print_body(response).await?;
        }
        Command::Post { path, json } => {
            let body = match json {
                Some(raw) => RequestBody::Json(
                    serde_json::from_str(&raw).context("--json is not valid JSON")?,
                ),
                None => RequestBody::Empty,
            };
            let response = client
                .request(Method::POST, &path, body, RequestOptions::default())
                .await?;
            print_body(response).await?;
        }
        Command::Upload {
            title,
            category,
            notes,
            tags,
            file,
        } => {
            let file = match file {
                Some(path) => Some(read_upload(&path).await?),
                None => None,
            };
            let upload = ContentUpload {
                title,
                notes,
                category_id: category,
                tags,
                file,
            };
            let created = client.create_content(&upload).await?;
            print_json(&created)?;
        }
    }

    Ok(())
}

async fn read_upload(path: &Path) -> anyhow::Result<UploadFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    Ok(UploadFile::new(file_name, data))
}

/// Pretty-print JSON bodies; pass anything else through verbatim.
async fn print_body(response: reqwest::Response) -> anyhow::Result<()> {
    let bytes = response.bytes().await?;
    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(value) => print_json(&value),
        Err(_) => {
            std::io::stdout().write_all(&bytes)?;
            Ok(())
        }
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
