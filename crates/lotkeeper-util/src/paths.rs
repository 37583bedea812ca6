//! Default paths for lotkeeper components
//!
//! Everything is user-writable by default:
//! - Socket: `$XDG_RUNTIME_DIR/lotkeeper/lotkeeperd.sock` or `/tmp/lotkeeper-$USER/lotkeeperd.sock`
//! - Data: `$XDG_DATA_HOME/lotkeeper` or `~/.local/share/lotkeeper`
//! - Config: `$XDG_CONFIG_HOME/lotkeeper/config.toml` or `~/.config/lotkeeper/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const LOTKEEPER_SOCKET_ENV: &str = "LOTKEEPER_SOCKET";

/// Environment variable for overriding the data directory
pub const LOTKEEPER_DATA_DIR_ENV: &str = "LOTKEEPER_DATA_DIR";

const SOCKET_FILENAME: &str = "lotkeeperd.sock";
const DATABASE_FILENAME: &str = "lotkeeper.db";
const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "lotkeeper";

fn home_subdir(parts: &[&str]) -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let mut path = PathBuf::from(home);
    for part in parts {
        path.push(part);
    }
    Some(path.join(APP_DIR))
}

/// Get the default socket path, honoring `$LOTKEEPER_SOCKET`.
pub fn default_socket_path() -> PathBuf {
    std::env::var(LOTKEEPER_SOCKET_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| socket_path_without_env())
}

/// Socket path derived from the XDG runtime directory only.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default data directory, honoring `$LOTKEEPER_DATA_DIR`.
pub fn default_data_dir() -> PathBuf {
    std::env::var(LOTKEEPER_DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir_without_env())
}

/// Data directory derived from the XDG data directory only.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    home_subdir(&[".local", "share"]).unwrap_or_else(|| PathBuf::from("/tmp").join(APP_DIR).join("data"))
}

/// Default configuration file location
pub fn default_config_path() -> PathBuf {
    let dir = match std::env::var("XDG_CONFIG_HOME") {
        Ok(config_home) => PathBuf::from(config_home).join(APP_DIR),
        Err(_) => home_subdir(&[".config"]).unwrap_or_else(|| PathBuf::from("/etc").join(APP_DIR)),
    };
    dir.join(CONFIG_FILENAME)
}

/// Database file inside a data directory
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(DATABASE_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_contains_app_name() {
        let path = socket_path_without_env();
        assert!(path.to_string_lossy().contains("lotkeeper"));
        assert!(path.to_string_lossy().ends_with(".sock"));
    }

    #[test]
    fn data_dir_contains_app_name() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("lotkeeper"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("lotkeeper"));
        assert_eq!(path.extension().unwrap(), "toml");
    }

    #[test]
    fn database_lives_in_data_dir() {
        let dir = PathBuf::from("/var/lib/lotkeeper");
        assert_eq!(database_path(&dir), dir.join("lotkeeper.db"));
    }
}
