use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

/// Upload localized app preview videos and their poster frames to the
/// store management service
#[derive(Debug, Parser)]
#[command(name = "upload_previews", version)]
pub struct Args {
    /// Root path where app previews are stored
    #[arg(env = "UPLOAD_APP_PREVIEWS_PREVIEWS_PATH")]
    pub previews_path: PathBuf,

    /// Comma separated locale codes to exclude from scanning
    #[arg(long, env = "UPLOAD_APP_PREVIEWS_SKIP_LANGS", default_value = "")]
    pub skip_langs: String,

    /// Force regenerate poster images even if already present
    #[arg(long, env = "UPLOAD_APP_PREVIEWS_REGENERATE_POSTERS")]
    pub regenerate_posters: bool,

    /// Store account used to log in
    #[arg(long, env = "PREVIEWS_STORE_USERNAME")]
    pub username: Option<String>,

    /// Application identifier the previews are attached to
    #[arg(long, env = "PREVIEWS_STORE_APP_IDENTIFIER")]
    pub app_identifier: Option<String>,

    /// Target platform for the edit version
    #[arg(long, default_value = "ios")]
    pub platform: String,
}

impl Args {
    /// Validate the previews directory before any work starts
    pub fn validate(&self) -> Result<()> {
        if !self.previews_path.exists() {
            bail!(
                "Previews directory does not exist: {}",
                self.previews_path.display()
            );
        }
        if !self.previews_path.is_dir() {
            bail!(
                "Previews path is not a directory: {}",
                self.previews_path.display()
            );
        }
        Ok(())
    }

    pub fn skip_locales(&self) -> Vec<String> {
        self.skip_langs
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}
