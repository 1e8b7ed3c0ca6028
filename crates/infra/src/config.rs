//! Process configuration read from the environment.

use std::path::PathBuf;

/// Runtime configuration of the terminal backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    /// Use Postgres-backed repositories instead of in-memory ones.
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    /// Base URL of the marketplace API, with trailing slash.
    pub signedup_api_site: String,
    /// Shared key for terminal ↔ marketplace calls (both directions).
    pub terminal_api_key: String,
    pub export_dir: PathBuf,
    /// Public URL of `export_dir`, with trailing slash.
    pub export_base_url: String,
    /// Optional JSON file with catalog and staff records loaded at startup.
    pub seed_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            jwt_secret: "dev-secret".to_string(),
            use_persistent_stores: false,
            database_url: None,
            signedup_api_site: "http://localhost:8000/".to_string(),
            terminal_api_key: "dev-terminal-key".to_string(),
            export_dir: PathBuf::from("orders_xls"),
            export_base_url: "/media/orders_xls/".to_string(),
            seed_file: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = non_empty("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            defaults.jwt_secret.clone()
        });

        let use_persistent_stores = non_empty("USE_PERSISTENT_STORES")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let mut signedup_api_site =
            non_empty("SIGNEDUP_API_SITE").unwrap_or(defaults.signedup_api_site);
        if !signedup_api_site.ends_with('/') {
            signedup_api_site.push('/');
        }

        let mut export_base_url =
            non_empty("EXPORT_BASE_URL").unwrap_or(defaults.export_base_url);
        if !export_base_url.ends_with('/') {
            export_base_url.push('/');
        }

        Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            jwt_secret,
            use_persistent_stores,
            database_url: non_empty("DATABASE_URL"),
            signedup_api_site,
            terminal_api_key: non_empty("TERMINAL_API_KEY").unwrap_or(defaults.terminal_api_key),
            export_dir: non_empty("EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
            export_base_url,
            seed_file: non_empty("SEED_FILE").map(PathBuf::from),
        }
    }
}

/// Lenient boolean parsing used for env vars and query flags.
pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
