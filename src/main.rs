use clap::{value_parser, Arg, ArgAction, Command};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod node;
mod error;

use config::Config;
use node::Node;
use error::FilehubError;

#[tokio::main]
async fn main() -> Result<(), FilehubError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("filehub=info,api=info,storage=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let matches = Command::new("FileHub")
        .version("0.1.0")
        .about("Tagged file hosting service")
        .arg(
            Arg::new("ip")
                .long("ip")
                .env("FILEHUB_IP")
                .help("IP address to listen on")
                .value_parser(value_parser!(IpAddr))
                .default_value("127.0.0.1")
        )
        .arg(
            Arg::new("port")
                .long("port")
                .env("FILEHUB_PORT")
                .help("Port to listen on")
                .value_parser(value_parser!(u16))
                .default_value("8080")
        )
        .arg(
            Arg::new("database")
                .long("database")
                .env("FILEHUB_DATABASE")
                .help("Path of the SQLite metadata database")
                .value_parser(value_parser!(PathBuf))
                .default_value("./filehub.sqlite3")
        )
        .arg(
            Arg::new("file-directory")
                .long("file-directory")
                .env("FILEHUB_FILE_DIRECTORY")
                .help("Directory uploaded files are written to")
                .value_parser(value_parser!(PathBuf))
                .default_value("./files")
        )
        .arg(
            Arg::new("path-base")
                .long("path-base")
                .env("FILEHUB_PATH_BASE")
                .help("Prefix all routes are served under")
                .required(false)
        )
        .arg(
            Arg::new("scheme")
                .long("scheme")
                .env("FILEHUB_SCHEME")
                .help("Scheme used in file URLs when no X-Forwarded-Proto header is present")
                .default_value("http")
        )
        .arg(
            Arg::new("web-url")
                .long("web-url")
                .env("FILEHUB_WEB_URL")
                .help("Origin allowed by CORS; any origin is allowed when unset")
                .required(false)
        )
        .arg(
            Arg::new("require-account-confirmation")
                .long("require-account-confirmation")
                .env("FILEHUB_REQUIRE_ACCOUNT_CONFIRMATION")
                .help("Reject logins of accounts that have not been confirmed")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("session-hours")
                .long("session-hours")
                .env("FILEHUB_SESSION_HOURS")
                .help("Lifetime of issued bearer tokens in hours")
                .value_parser(value_parser!(i64).range(1..=24 * 365))
                .default_value("720")
        )
        .arg(
            Arg::new("max-upload-bytes")
                .long("max-upload-bytes")
                .env("FILEHUB_MAX_UPLOAD_BYTES")
                .help("Largest accepted request body in bytes")
                .value_parser(value_parser!(usize))
                .default_value("536870912")
        )
        .arg(
            Arg::new("confirm-user")
                .long("confirm-user")
                .value_name("USERNAME")
                .help("Confirm the given account and exit")
                .required(false)
        )
        .get_matches();

    let ip = *matches
        .get_one::<IpAddr>("ip")
        .ok_or_else(|| FilehubError::InvalidConfig("Missing ip".to_string()))?;
    let port = *matches
        .get_one::<u16>("port")
        .ok_or_else(|| FilehubError::InvalidConfig("Missing port".to_string()))?;

    let mut config = Config::new(ip, port);
    if let Some(path) = matches.get_one::<PathBuf>("database") {
        config.database_path = path.clone();
    }
    if let Some(path) = matches.get_one::<PathBuf>("file-directory") {
        config.file_directory = path.clone();
    }
    if let Some(path_base) = matches.get_one::<String>("path-base") {
        config.path_base = config::normalize_path_base(path_base);
    }
    if let Some(scheme) = matches.get_one::<String>("scheme") {
        config.scheme = scheme.clone();
    }
    config.web_url = matches.get_one::<String>("web-url").cloned();
    config.require_account_confirmation = matches.get_flag("require-account-confirmation");
    if let Some(hours) = matches.get_one::<i64>("session-hours") {
        config.session_hours = *hours;
    }
    if let Some(bytes) = matches.get_one::<usize>("max-upload-bytes") {
        config.max_upload_bytes = *bytes;
    }

    if let Some(username) = matches.get_one::<String>("confirm-user") {
        if node::confirm_account(&config, username).await? {
            info!("Account {} confirmed", username);
        } else {
            warn!("No account named {}", username);
        }
        return Ok(());
    }

    info!("Starting FileHub");
    info!("Configuration: {:?}", config);

    let node = Node::new(config).await?;
    node.start().await?;

    Ok(())
}
