//! CLI entry point for tokenflow.

mod cli;

use clap::Parser;
use reqwest::Method;
use tokenflow::account::Credentials;
use tokenflow::api::ApiRequest;
use tokenflow::app::App;
use tokenflow::config::{initialize_default_global_config, load_config, ConfigInitResult};
use tokenflow::error::SessionError;
use tracing_subscriber::EnvFilter;

use cli::{Args, Command};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing();

    if matches!(args.command, Command::Init) {
        match initialize_default_global_config() {
            Ok(ConfigInitResult::Created { path }) => println!("wrote {}", path.display()),
            Ok(ConfigInitResult::AlreadyInitialized { path }) => {
                println!("{} already exists; left unchanged", path.display())
            }
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(url) = &args.base_url {
        if let Err(e) = config.override_base_url(url) {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }

    let app = match App::from_config(&config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&app, args.command).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr, filtered by `TOKENFLOW_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env("TOKENFLOW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(app: &App, command: Command) -> Result<(), SessionError> {
    match command {
        Command::Init => Ok(()),
        Command::Login { email, password } => {
            let password = password_or_prompt(password)?;
            app.account.login(&Credentials::new(email, password)).await?;
            println!("logged in");
            Ok(())
        }
        Command::Register { email, password } => {
            let password = password_or_prompt(password)?;
            let reply = app
                .account
                .register(&Credentials::new(email, password))
                .await?;
            print_json(&reply);
            println!("registration submitted; check your email for the confirmation code");
            Ok(())
        }
        Command::Verify { token, code } => {
            let reply = app.account.confirm_registration(&token, &code).await?;
            print_json(&reply);
            println!("registration confirmed");
            Ok(())
        }
        Command::Logout => {
            app.account.logout().await?;
            println!("logged out");
            Ok(())
        }
        Command::Refresh => {
            app.manager.refresh().await?;
            println!("access token refreshed");
            Ok(())
        }
        Command::Status => {
            let state = app.mount_session().ready().await;
            let logged_in = state.data.is_some();
            println!("logged in: {}", if logged_in { "yes" } else { "no" });
            if logged_in {
                match app.store.expires_at()? {
                    Some(at) => println!("expires at: {at} (unix ms)"),
                    None => println!("expires at: unknown"),
                }
                println!("expired: {}", if app.store.is_expired() { "yes" } else { "no" });
            }
            Ok(())
        }
        Command::Request { method, path, data } => {
            let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| SessionError::Invalid(format!("invalid HTTP method `{method}`")))?;
            let mut request = ApiRequest::new(method, path);
            if let Some(data) = data {
                let body: serde_json::Value = serde_json::from_str(&data)
                    .map_err(|e| SessionError::Invalid(format!("--data is not valid JSON: {e}")))?;
                request = request.json(&body)?;
            }
            let response = app.fetcher.request(&request).await?;
            let body = response.text().await?;
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(value) => print_json(&value),
                Err(_) => println!("{body}"),
            }
            Ok(())
        }
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String, SessionError> {
    match password {
        Some(p) => Ok(p),
        None => rpassword::prompt_password("password: ")
            .map_err(|e| SessionError::Invalid(format!("failed to read password: {e}"))),
    }
}

fn print_json(value: &serde_json::Value) {
    if value.is_null() {
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}
