//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` bind address (default: `"0.0.0.0"`)
/// - `PORT` listen port (default: `3000`)
/// - `RUST_LOG` tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` Postgres connection string; orders are kept in memory
///   when unset
/// - `SIMULATE_COLLABORATORS` run the payment and inventory simulators
///   in-process (default: `true`)
/// - `SIMULATOR_INITIAL_BALANCE` starting balance per user (default: `1000.00`)
/// - `SIMULATOR_INITIAL_STOCK` starting stock per product (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub simulate_collaborators: bool,
    pub simulator_initial_balance: f64,
    pub simulator_initial_stock: u32,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            simulate_collaborators: lookup("SIMULATE_COLLABORATORS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.simulate_collaborators),
            simulator_initial_balance: lookup("SIMULATOR_INITIAL_BALANCE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.simulator_initial_balance),
            simulator_initial_stock: lookup("SIMULATOR_INITIAL_STOCK")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.simulator_initial_stock),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            simulate_collaborators: true,
            simulator_initial_balance: 1000.0,
            simulator_initial_stock: 10,
        }
    }
}
