use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::Input;
use rukun_adapters::{configuration, telemetry};
use rukun_adapters::{LoggingNavigator, ReqwestTransport, SessionStorage};
use rukun_core::entities::{ApiRequest, LoginCredentials, Method};
use rukun_core::use_cases::{ApiClient, FileService};
use rukun_core::Error;
use serde_json::Value;
use tracing::error;

type Client = ApiClient<ReqwestTransport, SessionStorage, LoggingNavigator>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // --- Session commands ---
    /// Log in and store the session
    Login {
        /// Username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },
    /// End the session on the server and locally
    Logout,
    /// Show the stored user
    Whoami,
    /// Force a token refresh
    Refresh,

    // --- API commands ---
    /// Send an authenticated request and print the response body
    Request {
        #[arg(value_enum)]
        method: HttpMethod,

        /// Path relative to api.base_url, e.g. /resident
        path: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Upload a file
    Upload { file: PathBuf },
    /// Remove a previously uploaded file by URL
    RemoveFile { url: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::Get,
            HttpMethod::Post => Method::Post,
            HttpMethod::Put => Method::Put,
            HttpMethod::Patch => Method::Patch,
            HttpMethod::Delete => Method::Delete,
        }
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Explain a failed command; a forced logout gets a hint instead of a raw error
fn report(err: Error, navigator: &LoggingNavigator) -> anyhow::Error {
    if let Some(route) = navigator.take_redirect() {
        println!("Session ended. Log in again with `rukun_cli login` ({}).", route);
    }
    match err {
        Error::Unauthorized(payload) => {
            anyhow::anyhow!("not authorized: {}", payload)
        }
        other => anyhow::Error::new(other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = configuration::get_configuration().context("configuration loading failed")?;

    let _guard = telemetry::init_subscriber("rukun_cli", &settings.log_level);

    let cli = Cli::parse();

    let transport = Arc::new(ReqwestTransport::new(&settings.api)?);
    let storage = Arc::new(SessionStorage::from_settings(&settings.storage));
    let navigator = Arc::new(LoggingNavigator::default());
    let client: Arc<Client> = Arc::new(ApiClient::new(
        settings.api.clone(),
        transport,
        storage,
        navigator.clone(),
    ));
    client.restore().await;

    match cli.command {
        // --- Session commands ---
        Commands::Login { username } => {
            let username = match username {
                Some(u) => u,
                None => Input::new().with_prompt("Username").interact_text()?,
            };
            let password = rpassword::prompt_password("Password: ")?;

            println!("Authenticating...");
            match client
                .login(&LoginCredentials::new(username, password))
                .await
            {
                Ok(credentials) => {
                    println!("Login successful!");
                    if let Some(user) = credentials.user {
                        print_json(user.as_value())?;
                    }
                }
                Err(e) => {
                    error!(error = %e, "login failed");
                    return Err(report(e, &navigator));
                }
            }
        }
        Commands::Logout => {
            client.logout().await;
            navigator.take_redirect();
            println!("Logged out.");
        }
        Commands::Whoami => match client.credentials().user {
            Some(user) => print_json(user.as_value())?,
            None if client.is_authenticated() => println!("Logged in (no user details stored)."),
            None => println!("Not logged in."),
        },
        Commands::Refresh => {
            client
                .refresh()
                .await
                .map_err(|e| report(e, &navigator))?;
            println!("Session refreshed.");
        }

        // --- API commands ---
        Commands::Request { method, path, data } => {
            let mut request = ApiRequest::new(method.into(), path);
            if let Some(data) = data {
                let body: Value =
                    serde_json::from_str(&data).context("--data must be valid JSON")?;
                request = request.with_json(body);
            }

            let response = client
                .dispatch(request)
                .await
                .map_err(|e| report(e, &navigator))?;
            println!("HTTP {}", response.status);
            print_json(&response.payload)?;
        }
        Commands::Upload { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow::anyhow!("{} is not a file", file.display()))?;

            let files = FileService::new(client.clone());
            match files
                .upload(&file_name, bytes)
                .await
                .map_err(|e| report(e, &navigator))?
            {
                Some(data) => {
                    println!("Uploaded.");
                    print_json(&data)?;
                }
                None => println!("Upload was not accepted by the server."),
            }
        }
        Commands::RemoveFile { url } => {
            let files = FileService::new(client.clone());
            let envelope = files
                .remove(&url)
                .await
                .map_err(|e| report(e, &navigator))?;
            if envelope.is_ok() {
                println!("Removed.");
            } else {
                println!(
                    "Server refused: {}",
                    envelope.message.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}
