//! CLI argument parsing via clap.

use clap::{Parser, Subcommand};

/// Session client for bearer-token APIs with transparent token refresh.
#[derive(Debug, Parser)]
#[command(
    name = "tokenflow",
    version,
    long_version = tokenflow::build_info::LONG_VERSION
)]
pub struct Args {
    /// Path to config file (default: ./tokenflow.toml or ~/.config/tokenflow/tokenflow.toml).
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<String>,

    /// Override API base URL.
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write the default config to ~/.config/tokenflow/tokenflow.toml.
    Init,
    /// Log in and store the issued tokens.
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account; the server emails a confirmation code.
    Register {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Confirm a registration with the emailed token and code.
    Verify { token: String, code: String },
    /// End the session on the server and locally.
    Logout,
    /// Force a token refresh.
    Refresh,
    /// Show the local session state.
    Status,
    /// Send an authenticated request and print the response body.
    Request {
        /// HTTP method, e.g. GET or POST.
        method: String,
        /// Path relative to the base URL, or an absolute URL.
        path: String,
        /// JSON request body.
        #[arg(short = 'd', long = "data")]
        data: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::{Args, Command};
    use clap::Parser;

    #[test]
    fn login_parses_without_password() {
        let args = Args::parse_from(["tokenflow", "login", "--email", "ada@example.com"]);
        match args.command {
            Command::Login { email, password } => {
                assert_eq!(email, "ada@example.com");
                assert!(password.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let args = Args::parse_from([
            "tokenflow",
            "status",
            "--config",
            "alt.toml",
            "--base-url",
            "http://localhost:9000",
        ]);
        assert!(matches!(args.command, Command::Status));
        assert_eq!(args.config.as_deref(), Some("alt.toml"));
        assert_eq!(args.base_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn request_takes_method_path_and_data() {
        let args = Args::parse_from(["tokenflow", "request", "POST", "/notes", "-d", r#"{"a":1}"#]);
        match args.command {
            Command::Request { method, path, data } => {
                assert_eq!(method, "POST");
                assert_eq!(path, "/notes");
                assert_eq!(data.as_deref(), Some(r#"{"a":1}"#));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verify_takes_positional_token_and_code() {
        let args = Args::parse_from(["tokenflow", "verify", "tok123", "4821"]);
        assert!(matches!(
            args.command,
            Command::Verify { ref token, ref code } if token == "tok123" && code == "4821"
        ));
    }

    #[test]
    fn long_version_includes_build_metadata() {
        let err = Args::try_parse_from(["tokenflow", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        let rendered = err.to_string();
        assert!(rendered.contains("commit: "), "{rendered}");
        assert!(rendered.contains("built: "), "{rendered}");
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Args::try_parse_from(["tokenflow"]).is_err());
    }
}
