use clap::Parser;
use database::Database;
use std::path::PathBuf;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:finances.db")]
    pub database_url: String,

    #[arg(long, env = "PORT", default_value = "3333")]
    pub port: u16,

    /// Directory where uploaded CSV files are stored until imported.
    #[arg(long, env = "UPLOAD_DIR", default_value = "tmp")]
    pub upload_dir: PathBuf,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "10485760")]
    pub max_upload_bytes: usize,
}

impl Config {
    /// Imports that fail keep their source file here for a later retry.
    pub fn failed_import_dir(&self) -> PathBuf {
        self.upload_dir.join("failed")
    }
}
