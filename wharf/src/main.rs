//! Standalone registry server binary.

use std::net::SocketAddr;

use camino::Utf8PathBuf;
use clap::Parser;
use storage::StorageConfig;
use wharf::RegistryBuilder;

/// Command line arguments for `wharf-server`.
#[derive(Debug, Parser)]
#[command(name = "wharf-server", about = "OCI distribution registry server")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "wharf.toml")]
    config: Utf8PathBuf,

    /// Listen address, overriding the configuration file.
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

/// Server configuration, resolved once at startup.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Config {
    /// Address to bind.
    #[serde(default = "default_listen")]
    listen: SocketAddr,

    /// Bucket holding the registry content.
    #[serde(default = "default_bucket")]
    bucket: String,

    /// Storage backend; a local `data` directory when unset.
    #[serde(default = "default_storage")]
    storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            bucket: default_bucket(),
            storage: default_storage(),
        }
    }
}

fn default_listen() -> SocketAddr {
    ([0, 0, 0, 0], 8080).into()
}

fn default_bucket() -> String {
    "registry".to_string()
}

fn default_storage() -> StorageConfig {
    StorageConfig::Local {
        path: Utf8PathBuf::from("data"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match tokio::fs::read_to_string(&args.config).await {
        Ok(contents) => toml_edit::de::from_str::<Config>(&contents)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(config = %args.config, "no configuration file, using defaults");
            Config::default()
        }
        Err(err) => return Err(err.into()),
    };
    let listen = args.listen.unwrap_or(config.listen);

    let storage = config.storage.build().await?;
    tracing::info!(driver = storage.name(), "storage configured");

    let app = RegistryBuilder::new()
        .storage(storage)
        .bucket(config.bucket)
        .build();

    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!("registry listening on http://{listen}");
    axum::serve(listener, app).await?;

    Ok(())
}
