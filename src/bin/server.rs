//! sprintgate MCP server binary.

use std::net::IpAddr;

use clap::Parser;
use miette::Diagnostic;
use sprintgate::app::{self, AppError};
use sprintgate::config::{ConfigError, Overrides, Settings, Transport};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
enum BinaryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    App(#[from] AppError),
}

#[derive(Parser)]
#[command(name = "sprintgate")]
#[command(author, version, about = "MCP server for Azure DevOps work items and sprints", long_about = None)]
struct Cli {
    /// Organization URL, e.g. https://dev.azure.com/acme [env: AZURE_DEVOPS_ORG_URL]
    #[arg(long)]
    org_url: Option<String>,

    /// Default project for tools called without one [env: AZURE_DEVOPS_PROJECT]
    #[arg(long)]
    project: Option<String>,

    /// Personal access token [env: AZURE_DEVOPS_PAT]
    #[arg(long)]
    pat: Option<String>,

    /// stdio or http [env: MCP_TRANSPORT]
    #[arg(short, long)]
    transport: Option<Transport>,

    /// Host address to bind to in http mode [env: HOST]
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on in http mode [env: PORT]
    #[arg(short, long)]
    port: Option<u16>,

    /// Cache entry lifetime in seconds [env: SPRINTGATE_CACHE_TTL_SECS]
    #[arg(long)]
    cache_ttl: Option<u64>,

    /// Attempts per remote call, including the first [env: SPRINTGATE_MAX_ATTEMPTS]
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Timeout per remote attempt in seconds [env: SPRINTGATE_REQUEST_TIMEOUT_SECS]
    #[arg(long)]
    request_timeout: Option<u64>,
}

impl From<Cli> for Overrides {
    fn from(cli: Cli) -> Self {
        Overrides {
            org_url: cli.org_url,
            project: cli.project,
            pat: cli.pat,
            transport: cli.transport,
            host: cli.host,
            port: cli.port,
            cache_ttl_secs: cli.cache_ttl,
            max_attempts: cli.max_attempts,
            request_timeout_secs: cli.request_timeout,
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    app::init_tracing();

    run(cli).await.map_err(Into::into)
}

async fn run(cli: Cli) -> Result<(), BinaryError> {
    let settings = Settings::resolve(cli.into())?;
    app::run(settings).await?;
    Ok(())
}
