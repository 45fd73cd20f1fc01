use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub host: String,
    pub port: u16,
    /// Store number WhatsApp checkout links point at, digits only.
    pub whatsapp_number: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.is_empty());
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let whatsapp_number =
            env::var("WHATSAPP_NUMBER").unwrap_or_else(|_| "5500000000000".to_string());
        Ok(Self {
            database_url,
            redis_url,
            host,
            port,
            whatsapp_number,
        })
    }
}
