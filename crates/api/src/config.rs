use chartops_pipeline::PipelineConfig;

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// All fields except `DATABASE_URL` have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    pub database_url: String,
    /// Connection pool size (default: `20`).
    pub db_max_connections: u32,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub log_format: LogFormat,
    /// Fallback chart type and throughput window for the control plane.
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default   |
    /// |---------------------------|-----------|
    /// | `HOST`                    | `0.0.0.0` |
    /// | `PORT`                    | `3000`    |
    /// | `DATABASE_URL`            | required  |
    /// | `DB_MAX_CONNECTIONS`      | `20`      |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`      |
    /// | `DEFAULT_CHART_TYPE`      | `bar`     |
    /// | `THROUGHPUT_WINDOW_HOURS` | `24`      |
    /// | `LOG_FORMAT`              | `text`    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let db_max_connections: u32 = std::env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "20".into())
            .parse()
            .expect("DB_MAX_CONNECTIONS must be a valid u32");

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let defaults = PipelineConfig::default();
        let default_chart_type = std::env::var("DEFAULT_CHART_TYPE")
            .map(|s| s.trim().to_ascii_lowercase())
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.default_chart_type);

        let throughput_window_hours: i64 = std::env::var("THROUGHPUT_WINDOW_HOURS")
            .ok()
            .map(|s| {
                s.parse()
                    .expect("THROUGHPUT_WINDOW_HOURS must be a valid i64")
            })
            .unwrap_or(defaults.throughput_window_hours);
        assert!(
            throughput_window_hours > 0,
            "THROUGHPUT_WINDOW_HOURS must be positive"
        );

        let log_format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            host,
            port,
            database_url,
            db_max_connections,
            request_timeout_secs,
            log_format,
            pipeline: PipelineConfig {
                default_chart_type,
                throughput_window_hours,
            },
        }
    }
}
