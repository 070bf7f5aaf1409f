use beacon_database::DatabaseConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database: DatabaseConfig,
    /// Secret for the cookie codec. When unset, an ephemeral secret is
    /// generated at startup and sessions do not survive a restart.
    pub cookie_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            database: DatabaseConfig::from_env(),
            cookie_secret: std::env::var("COOKIE_SECRET_KEY").ok(),
        }
    }
}
