use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{error, info, warn};
use refreshable_creds::{Provider, RefreshableCredentialsProvider};
use serde::Deserialize;
use shadow_rs::shadow;
use simple_logger::SimpleLogger;
use tokio::{
    fs::File,
    io::AsyncReadExt,
    task::JoinSet,
    time::{self},
};

shadow!(build);

const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 60;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Keep re-checking each file on its interval instead of checking once.
    #[arg(long, default_value_t = false)]
    watch: bool,

    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Check these credential files instead of the ones listed in the config.
    #[arg(short, long, env = "REFRESHABLE_CREDENTIALS_FILE")]
    file: Vec<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_CHECK_INTERVAL_SECONDS)]
    interval_seconds: u64,

    #[arg(long, short, action)]
    version: bool,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
struct CredentialsFileConfig {
    pub path: PathBuf,
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u64,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
struct ConfigFile {
    files: Vec<CredentialsFileConfig>,
}

fn default_check_interval_seconds() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECONDS
}

#[allow(clippy::const_is_empty)]
fn print_version() {
    if !build::TAG.is_empty() {
        if !build::GIT_CLEAN {
            println!("{}-dirty", build::TAG);
        } else {
            println!("{}", build::TAG);
        }
    } else if !build::LAST_TAG.is_empty() {
        println!("{}", build::LAST_TAG);
    } else if !build::GIT_CLEAN {
        println!("{}-{}-dirty", build::PKG_VERSION, build::SHORT_COMMIT);
    } else {
        println!("{}-{}", build::PKG_VERSION, build::SHORT_COMMIT);
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    SimpleLogger::new().with_level(log::LevelFilter::Info).init()?;

    let args = Args::parse();

    if args.version {
        print_version();
        return Ok(());
    }

    let files = if args.file.is_empty() {
        load_config(&args.config).await?.files
    } else {
        args.file
            .iter()
            .map(|path| CredentialsFileConfig {
                path: path.clone(),
                check_interval_seconds: args.interval_seconds,
            })
            .collect()
    };
    if files.is_empty() {
        return Err(anyhow!("No credential files to check."));
    }

    let mut task_set = JoinSet::new();
    for file in files {
        task_set.spawn(watch_credentials_file(file, args.watch));
    }
    let results = task_set.join_all().await;

    results.into_iter().collect()
}

async fn load_config(path: &Path) -> Result<ConfigFile, Error> {
    let mut config_file_string = String::new();
    info!("Loading config file from {}", path.to_string_lossy());
    File::open(path)
        .await?
        .read_to_string(&mut config_file_string)
        .await?;
    Ok(toml::from_str(&config_file_string)?)
}

async fn watch_credentials_file(file: CredentialsFileConfig, watch: bool) -> Result<(), Error> {
    let provider = RefreshableCredentialsProvider::new(file.path.clone());
    if !watch {
        return check_credentials_file(&provider);
    }
    let mut interval = time::interval(Duration::from_secs(file.check_interval_seconds.max(1)));
    loop {
        interval.tick().await;
        if check_credentials_file(&provider).is_err() {
            error!("Trying again at {:?}", interval.period())
        } else {
            info!("Checking again at {:?}", interval.period())
        };
    }
}

fn check_credentials_file(provider: &RefreshableCredentialsProvider) -> Result<(), Error> {
    info!("Checking credentials file {}", provider.filename().display());
    let value = match provider.retrieve() {
        Ok(value) => value,
        Err(e) => {
            let failed = e.value();
            let kind = e.kind();
            error!("{} failed with {}: {:#}", failed.provider_name, kind, Error::from(e));
            return Err(anyhow!(
                "Could not load credentials from {}",
                provider.filename().display()
            ));
        }
    };

    let expiration = provider
        .expiry()
        .expires_at()
        .map(|at| DateTime::<Utc>::from(at).to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());
    let remaining = provider
        .expiry()
        .expires_at()
        .and_then(|at| at.duration_since(SystemTime::now()).ok());

    if !value.has_keys() {
        warn!(
            "{} read {} but it holds no access key",
            value.provider_name,
            provider.filename().display()
        );
    }
    if provider.is_expired() {
        warn!(
            "{} credentials {} expired at {}",
            value.provider_name,
            mask(&value.access_key_id),
            expiration
        );
    } else {
        info!(
            "{} credentials {} valid until {} ({:?} remaining)",
            value.provider_name,
            mask(&value.access_key_id),
            expiration,
            remaining.unwrap_or_default()
        );
    }
    Ok(())
}

fn mask(access_key_id: &str) -> String {
    let shown: String = access_key_id.chars().take(4).collect();
    format!("{}********", shown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_file() {
        let config: ConfigFile = toml::from_str(
            r#"
            [[files]]
            path = "/var/run/aws/credentials.json"
            check_interval_seconds = 30

            [[files]]
            path = "creds.json"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.files,
            vec![
                CredentialsFileConfig {
                    path: PathBuf::from("/var/run/aws/credentials.json"),
                    check_interval_seconds: 30,
                },
                CredentialsFileConfig {
                    path: PathBuf::from("creds.json"),
                    check_interval_seconds: DEFAULT_CHECK_INTERVAL_SECONDS,
                },
            ]
        );
    }

    #[test]
    fn masks_access_key_id() {
        assert_eq!(mask("AKIDEXAMPLE"), "AKID********");
        assert_eq!(mask("AK"), "AK********");
    }

    #[test]
    fn check_fails_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RefreshableCredentialsProvider::new(dir.path().join("missing.json"));
        assert!(check_credentials_file(&provider).is_err());
    }

    #[test]
    fn check_succeeds_for_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"Expiration": "2099-01-01T00:00:00Z", "AccessKeyId": "AKIDEXAMPLE",
                "SecretAccessKey": "secret", "Token": "tok"}"#,
        )
        .unwrap();

        let provider = RefreshableCredentialsProvider::new(path);
        assert!(check_credentials_file(&provider).is_ok());
        assert!(!provider.is_expired());
    }
}
