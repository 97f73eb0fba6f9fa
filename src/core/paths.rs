use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Base shipper config directory (~/.config/shipper/ on Unix, %APPDATA%\shipper on Windows)
pub fn shipper() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("shipper"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("shipper"))
    }
}

/// Global shipper.json config file path
pub fn shipper_json() -> Result<PathBuf> {
    Ok(shipper()?.join("shipper.json"))
}

/// Pipeline file names probed in the current directory, in priority order.
pub const PIPELINE_FILE_NAMES: &[&str] = &["shipper.pipeline.json", "shipper.pipeline.toml"];
