pub mod analysis;
pub mod domain;
pub mod ingest;
pub mod store;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub platform_base_url: Option<String>,
        pub platform_username: Option<String>,
        pub platform_password: Option<String>,
        pub market_data_base_url: Option<String>,
        pub data_dir: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                platform_base_url: std::env::var("PLATFORM_BASE_URL").ok(),
                platform_username: std::env::var("PLATFORM_USERNAME").ok(),
                platform_password: std::env::var("PLATFORM_PASSWORD").ok(),
                market_data_base_url: std::env::var("MARKET_DATA_BASE_URL").ok(),
                data_dir: std::env::var("DATA_DIR").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_platform_base_url(&self) -> anyhow::Result<&str> {
            self.platform_base_url
                .as_deref()
                .context("PLATFORM_BASE_URL is required")
        }

        pub fn require_platform_credentials(&self) -> anyhow::Result<(&str, &str)> {
            let username = self
                .platform_username
                .as_deref()
                .context("PLATFORM_USERNAME is required")?;
            let password = self
                .platform_password
                .as_deref()
                .context("PLATFORM_PASSWORD is required")?;
            Ok((username, password))
        }

        pub fn data_dir(&self) -> &str {
            self.data_dir.as_deref().unwrap_or("data")
        }
    }
}
