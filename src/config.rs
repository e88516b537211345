use anyhow::Context;
use jsonwebtoken::Algorithm;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub confirm_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub username: String,
    pub password: String,
    pub from: String,
    pub from_name: String,
    pub server: String,
    pub port: u16,
    pub starttls: bool,
    pub ssl_tls: bool,
    pub use_credentials: bool,
    pub validate_certs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Public base URL used to build email confirmation links.
    pub public_host: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub cloudinary: CloudinaryConfig,
    pub rate_limit: RateLimitConfig,
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("missing env var {name}"))
}

fn flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = required("DATABASE_URL")?;
        let public_host =
            std::env::var("PUBLIC_HOST").unwrap_or_else(|_| "http://localhost:8080".into());

        let jwt = JwtConfig {
            secret: required("SECRET_KEY")?,
            algorithm: std::env::var("ALGORITHM")
                .unwrap_or_else(|_| "HS256".into())
                .parse::<Algorithm>()
                .map_err(|e| anyhow::anyhow!("unsupported ALGORITHM: {e:?}"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "contactbook".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "contactbook-users".into()),
            access_ttl_minutes: std::env::var("ACCESS_TOKEN_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
            confirm_ttl_hours: std::env::var("CONFIRM_TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24),
        };

        let mail = MailConfig {
            username: required("MAIL_USERNAME")?,
            password: required("MAIL_PASSWORD")?,
            from: required("MAIL_FROM")?,
            from_name: std::env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "Contactbook".into()),
            server: required("MAIL_SERVER")?,
            port: std::env::var("MAIL_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            starttls: flag("MAIL_STARTTLS", true),
            ssl_tls: flag("MAIL_SSL_TLS", false),
            use_credentials: flag("USE_CREDENTIALS", true),
            validate_certs: flag("VALIDATE_CERTS", true),
        };

        let cloudinary = CloudinaryConfig {
            cloud_name: required("CLOUDINARY_NAME")?,
            api_key: required("CLOUDINARY_API_KEY")?,
            api_secret: required("CLOUDINARY_API_SECRET")?,
        };

        let rate_limit = RateLimitConfig {
            max_requests: std::env::var("RATE_LIMIT_REQUESTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(10),
            window_secs: std::env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };

        Ok(Self {
            database_url,
            public_host,
            jwt,
            mail,
            cloudinary,
            rate_limit,
        })
    }
}
