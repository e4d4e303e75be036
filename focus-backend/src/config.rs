use std::env;
use std::path::PathBuf;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PASSWORD: &str = "FOCUS_PASSWORD";
    /// Secret for signing the auth cookie. Set this to keep sessions
    /// valid across server restarts.
    pub const SESSION_SECRET: &str = "FOCUS_SESSION_SECRET";
    pub const PORT: &str = "PORT";
    pub const NOTES_FILE: &str = "FOCUS_NOTES_FILE";
    pub const PUBLIC_DIR: &str = "FOCUS_PUBLIC_DIR";
    /// "native" (OS file notifications) or "poll" (interval re-read).
    pub const WATCH_MODE: &str = "FOCUS_WATCH_MODE";
    pub const POLL_INTERVAL_MS: &str = "FOCUS_POLL_INTERVAL_MS";
}

/// Default values
pub mod defaults {
    pub const PASSWORD: &str = "focus123";
    pub const PORT: u16 = 3000;
    pub const NOTES_FILE: &str = "notes.md";
    pub const PUBLIC_DIR: &str = "public";
    pub const POLL_INTERVAL_MS: u64 = 1000;
}

/// Returns the absolute path to the focus-backend directory.
/// Uses CARGO_MANIFEST_DIR at compile time, so it always resolves
/// to focus-backend/ regardless of the working directory at runtime.
pub fn backend_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// How the change watcher observes the notes file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Native OS change notification (inotify/FSEvents/etc.)
    Native,
    /// Timed re-read of the file, diffing content
    Poll,
}

fn parse_watch_mode(value: &str) -> WatchMode {
    match value.trim().to_lowercase().as_str() {
        "poll" => WatchMode::Poll,
        "native" => WatchMode::Native,
        other => {
            log::warn!(
                "Unknown {} value '{}', falling back to native",
                env_vars::WATCH_MODE,
                other
            );
            WatchMode::Native
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub password: String,
    pub session_secret: String,
    pub port: u16,
    pub notes_file: PathBuf,
    pub public_dir: PathBuf,
    pub watch_mode: WatchMode,
    pub poll_interval_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        let password = env::var(env_vars::PASSWORD).unwrap_or_else(|_| {
            log::warn!(
                "{} not set - using the default password, change it before exposing this server",
                env_vars::PASSWORD
            );
            defaults::PASSWORD.to_string()
        });

        let session_secret = env::var(env_vars::SESSION_SECRET).unwrap_or_else(|_| {
            log::info!(
                "{} not set - generated a per-process secret, sessions will not survive restarts",
                env_vars::SESSION_SECRET
            );
            generate_secret()
        });

        Self {
            password,
            session_secret,
            port: env::var(env_vars::PORT)
                .unwrap_or_else(|_| defaults::PORT.to_string())
                .parse()
                .expect("PORT must be a valid number"),
            notes_file: env::var(env_vars::NOTES_FILE)
                .map(PathBuf::from)
                .unwrap_or_else(|_| backend_dir().join(defaults::NOTES_FILE)),
            public_dir: env::var(env_vars::PUBLIC_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| backend_dir().join(defaults::PUBLIC_DIR)),
            watch_mode: env::var(env_vars::WATCH_MODE)
                .map(|v| parse_watch_mode(&v))
                .unwrap_or(WatchMode::Native),
            poll_interval_ms: env::var(env_vars::POLL_INTERVAL_MS)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults::POLL_INTERVAL_MS),
        }
    }
}

/// Make sure the notes file's directory exists so the native watcher
/// can attach before the first write creates the file.
pub fn initialize_storage(config: &Config) -> std::io::Result<()> {
    if let Some(parent) = config.notes_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn generate_secret() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
impl Config {
    /// Fixed-value config for unit tests.
    pub fn for_tests(notes_file: PathBuf) -> Self {
        Self {
            password: "test-password".to_string(),
            session_secret: "a-test-secret-that-never-changes".to_string(),
            port: 0,
            notes_file,
            public_dir: PathBuf::from(defaults::PUBLIC_DIR),
            watch_mode: WatchMode::Poll,
            poll_interval_ms: 25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_watch_mode() {
        assert_eq!(parse_watch_mode("poll"), WatchMode::Poll);
        assert_eq!(parse_watch_mode("Poll"), WatchMode::Poll);
        assert_eq!(parse_watch_mode("native"), WatchMode::Native);
        assert_eq!(parse_watch_mode("anything-else"), WatchMode::Native);
    }

    #[test]
    fn test_generate_secret_is_hex_and_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
