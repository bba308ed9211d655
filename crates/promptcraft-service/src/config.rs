//! Service configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use promptcraft_core::{CoreError, PricingCatalog, DEFAULT_GENERATION_COST};

/// Directories searched for `<name>.json` secrets files, in order.
const SECRET_DIRS: [&str; 2] = [".secrets", "../.secrets"];

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable holds an unparseable value.
    #[error("invalid value for {name}: {value}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// The raw value.
        value: String,
    },

    /// The pricing file could not be read.
    #[error("failed to read pricing file {path}: {source}")]
    PricingFile {
        /// Path from `PRICING_FILE`.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The pricing catalog is invalid.
    #[error("invalid pricing configuration: {0}")]
    Pricing(#[from] CoreError),
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection string. Unset means the in-memory store.
    pub database_url: Option<String>,

    /// Public URL of the web app, used for checkout redirects.
    pub base_url: String,

    /// Supabase project URL (auth and storage).
    pub supabase_url: Option<String>,

    /// Supabase anon key, sent as `apikey` to the auth API.
    pub supabase_anon_key: Option<String>,

    /// Supabase service role key, used for storage.
    pub supabase_service_role_key: Option<String>,

    /// HS256 secret for local access token validation.
    pub supabase_jwt_secret: Option<String>,

    /// Storage bucket for generated images.
    pub storage_bucket: String,

    /// Lifetime of signed image URLs.
    pub signed_url_ttl_seconds: u64,

    /// Name of the session cookie.
    pub session_cookie_name: String,

    /// Whether the session cookie carries `Secure`.
    pub session_cookie_secure: bool,

    /// Stripe secret API key.
    pub stripe_api_key: Option<String>,

    /// Stripe webhook signing secret.
    pub stripe_webhook_secret: Option<String>,

    /// Stripe API base URL.
    pub stripe_api_base: String,

    /// Maximum age of a webhook signature timestamp.
    pub stripe_webhook_tolerance_seconds: i64,

    /// OpenAI API key.
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL.
    pub openai_base_url: String,

    /// Image model name.
    pub image_model: String,

    /// Generated image size.
    pub image_size: String,

    /// Timeout for one image generation call, in seconds. Below
    /// `request_timeout_seconds`.
    pub image_generation_timeout_seconds: u64,

    /// Credits debited per generation.
    pub generation_cost: i64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Price catalog.
    pub pricing: PricingCatalog,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    api_key: String,
    #[serde(default)]
    webhook_secret: Option<String>,
}

/// Supabase secrets file structure.
#[derive(Debug, Deserialize)]
struct SupabaseSecrets {
    url: String,
    anon_key: String,
    #[serde(default)]
    service_role_key: Option<String>,
    #[serde(default)]
    jwt_secret: Option<String>,
}

/// `OpenAI` secrets file structure.
#[derive(Debug, Deserialize)]
struct OpenAiSecrets {
    api_key: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable is malformed or the
    /// pricing configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dirs: Vec<PathBuf> = SECRET_DIRS.iter().map(PathBuf::from).collect();
        Self::from_vars(|name| std::env::var(name).ok(), &dirs)
    }

    /// Load configuration from a variable lookup and secrets directories.
    ///
    /// Secrets files take precedence over the matching variables.
    ///
    /// # Errors
    ///
    /// See [`ServiceConfig::from_env`].
    pub fn from_vars<F>(var: F, secret_dirs: &[PathBuf]) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let (stripe_api_key, stripe_webhook_secret) =
            match find_secrets::<StripeSecrets>(secret_dirs, "stripe") {
                Some(s) => (Some(s.api_key), s.webhook_secret),
                None => (var("STRIPE_API_KEY"), var("STRIPE_WEBHOOK_SECRET")),
            };

        let (supabase_url, supabase_anon_key, supabase_service_role_key, supabase_jwt_secret) =
            match find_secrets::<SupabaseSecrets>(secret_dirs, "supabase") {
                Some(s) => (
                    Some(s.url),
                    Some(s.anon_key),
                    s.service_role_key,
                    s.jwt_secret,
                ),
                None => (
                    var("SUPABASE_URL"),
                    var("SUPABASE_ANON_KEY"),
                    var("SUPABASE_SERVICE_ROLE_KEY"),
                    var("SUPABASE_JWT_SECRET"),
                ),
            };

        let openai_api_key = find_secrets::<OpenAiSecrets>(secret_dirs, "openai")
            .map(|s| s.api_key)
            .or_else(|| var("OPENAI_API_KEY"));

        let pricing = load_pricing(&var)?.unwrap_or(defaults.pricing);

        let generation_cost: i64 = parse_var(&var, "GENERATION_COST", defaults.generation_cost)?;
        if generation_cost < 1 {
            return Err(ConfigError::InvalidValue {
                name: "GENERATION_COST",
                value: generation_cost.to_string(),
            });
        }

        let request_timeout_seconds: u64 = parse_var(
            &var,
            "REQUEST_TIMEOUT_SECONDS",
            defaults.request_timeout_seconds,
        )?;
        let default_generation_timeout = defaults
            .image_generation_timeout_seconds
            .min(request_timeout_seconds.saturating_sub(1));
        let image_generation_timeout_seconds: u64 = parse_var(
            &var,
            "IMAGE_GENERATION_TIMEOUT_SECONDS",
            default_generation_timeout,
        )?;
        if image_generation_timeout_seconds == 0
            || image_generation_timeout_seconds >= request_timeout_seconds
        {
            return Err(ConfigError::InvalidValue {
                name: "IMAGE_GENERATION_TIMEOUT_SECONDS",
                value: image_generation_timeout_seconds.to_string(),
            });
        }

        Ok(Self {
            listen_addr: var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            database_url: var("DATABASE_URL").filter(|s| !s.is_empty()),
            base_url: var("BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            supabase_url: supabase_url.map(|s| s.trim_end_matches('/').to_string()),
            supabase_anon_key,
            supabase_service_role_key,
            supabase_jwt_secret,
            storage_bucket: var("STORAGE_BUCKET").unwrap_or(defaults.storage_bucket),
            signed_url_ttl_seconds: parse_var(
                &var,
                "SIGNED_URL_TTL_SECONDS",
                defaults.signed_url_ttl_seconds,
            )?,
            session_cookie_name: var("SESSION_COOKIE_NAME").unwrap_or(defaults.session_cookie_name),
            session_cookie_secure: parse_var(
                &var,
                "SESSION_COOKIE_SECURE",
                defaults.session_cookie_secure,
            )?,
            stripe_api_key,
            stripe_webhook_secret,
            stripe_api_base: var("STRIPE_API_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.stripe_api_base),
            stripe_webhook_tolerance_seconds: parse_var(
                &var,
                "STRIPE_WEBHOOK_TOLERANCE_SECONDS",
                defaults.stripe_webhook_tolerance_seconds,
            )?,
            openai_api_key,
            openai_base_url: var("OPENAI_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
            image_model: var("IMAGE_MODEL").unwrap_or(defaults.image_model),
            image_size: var("IMAGE_SIZE").unwrap_or(defaults.image_size),
            image_generation_timeout_seconds,
            generation_cost,
            cors_origins: var("CORS_ORIGINS").map_or(defaults.cors_origins, |s| {
                s.split(',').map(|s| s.trim().to_string()).collect()
            }),
            max_body_bytes: parse_var(&var, "MAX_BODY_BYTES", defaults.max_body_bytes)?,
            request_timeout_seconds,
            pricing,
        })
    }
}

fn parse_var<F, T>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match var(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}

/// Pricing from `PRICING_FILE`, else from the price map variables.
fn load_pricing<F>(var: &F) -> Result<Option<PricingCatalog>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = var("PRICING_FILE") {
        let contents = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::PricingFile { path, source })?;
        return Ok(Some(PricingCatalog::from_json(&contents)?));
    }

    let one_time = var("ONE_TIME_PRICES");
    let subscription = var("SUBSCRIPTION_PRICES");
    if one_time.is_none() && subscription.is_none() {
        return Ok(None);
    }
    Ok(Some(PricingCatalog::from_price_maps(
        one_time.as_deref().unwrap_or_default(),
        subscription.as_deref().unwrap_or_default(),
    )?))
}

/// Load `<name>.json` from the first directory that has a readable one.
fn find_secrets<T: serde::de::DeserializeOwned>(dirs: &[PathBuf], name: &str) -> Option<T> {
    for dir in dirs {
        let path = dir.join(format!("{name}.json"));
        match load_secrets_file::<T>(&path) {
            Ok(secrets) => {
                tracing::info!(path = %path.display(), "Loaded {name} secrets from file");
                return Some(secrets);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable secrets file");
            }
        }
    }
    tracing::debug!("{name} secrets file not found, using environment variables");
    None
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, std::io::Error> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: None,
            base_url: "http://localhost:3000".into(),
            supabase_url: None,
            supabase_anon_key: None,
            supabase_service_role_key: None,
            supabase_jwt_secret: None,
            storage_bucket: "generated_images".into(),
            signed_url_ttl_seconds: 300,
            session_cookie_name: "pc-access-token".into(),
            session_cookie_secure: true,
            stripe_api_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: "https://api.stripe.com/v1".into(),
            stripe_webhook_tolerance_seconds: 300,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com".into(),
            image_model: "dall-e-3".into(),
            image_size: "1024x1024".into(),
            image_generation_timeout_seconds: 50,
            generation_cost: DEFAULT_GENERATION_COST,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 60,
            pricing: PricingCatalog::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = ServiceConfig::from_vars(lookup(&[]), &[]).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.storage_bucket, "generated_images");
        assert_eq!(config.signed_url_ttl_seconds, 300);
        assert_eq!(config.generation_cost, 1);
        assert!(config.database_url.is_none());
        assert!(config.session_cookie_secure);
        assert_eq!(config.pricing, PricingCatalog::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = ServiceConfig::from_vars(
            lookup(&[
                ("BASE_URL", "https://promptcraft.app/"),
                ("GENERATION_COST", "3"),
                ("SESSION_COOKIE_SECURE", "false"),
                ("CORS_ORIGINS", "https://a.app, https://b.app"),
                ("STRIPE_API_KEY", "sk_test_env"),
                ("ONE_TIME_PRICES", "price_a=10"),
            ]),
            &[],
        )
        .unwrap();
        assert_eq!(config.base_url, "https://promptcraft.app");
        assert_eq!(config.generation_cost, 3);
        assert!(!config.session_cookie_secure);
        assert_eq!(config.cors_origins, vec!["https://a.app", "https://b.app"]);
        assert_eq!(config.stripe_api_key.as_deref(), Some("sk_test_env"));
        assert_eq!(config.pricing.one_time_credits("price_a"), Some(10));
        assert_eq!(config.pricing.one_time_credits("price_basic_pack"), None);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = ServiceConfig::from_vars(lookup(&[("GENERATION_COST", "one")]), &[]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "GENERATION_COST",
                ..
            }
        ));
    }

    #[test]
    fn non_positive_generation_cost_is_rejected() {
        for value in ["0", "-5"] {
            let err =
                ServiceConfig::from_vars(lookup(&[("GENERATION_COST", value)]), &[]).unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidValue { name: "GENERATION_COST", value: v } if v == value),
                "{value}"
            );
        }
    }

    #[test]
    fn generation_timeout_stays_below_request_timeout() {
        let config = ServiceConfig::from_vars(lookup(&[]), &[]).unwrap();
        assert_eq!(config.image_generation_timeout_seconds, 50);

        let config =
            ServiceConfig::from_vars(lookup(&[("REQUEST_TIMEOUT_SECONDS", "20")]), &[]).unwrap();
        assert_eq!(config.image_generation_timeout_seconds, 19);

        let err = ServiceConfig::from_vars(
            lookup(&[
                ("REQUEST_TIMEOUT_SECONDS", "30"),
                ("IMAGE_GENERATION_TIMEOUT_SECONDS", "30"),
            ]),
            &[],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "IMAGE_GENERATION_TIMEOUT_SECONDS",
                ..
            }
        ));
    }

    #[test]
    fn secrets_files_take_precedence() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("stripe.json"),
            r#"{"api_key":"sk_test_file","webhook_secret":"whsec_file"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("supabase.json"),
            r#"{"url":"https://proj.supabase.co/","anon_key":"anon","jwt_secret":"jwt"}"#,
        )
        .unwrap();

        let config = ServiceConfig::from_vars(
            lookup(&[("STRIPE_API_KEY", "sk_test_env"), ("OPENAI_API_KEY", "sk-env")]),
            &[dir.path().to_path_buf()],
        )
        .unwrap();

        assert_eq!(config.stripe_api_key.as_deref(), Some("sk_test_file"));
        assert_eq!(config.stripe_webhook_secret.as_deref(), Some("whsec_file"));
        assert_eq!(config.supabase_url.as_deref(), Some("https://proj.supabase.co"));
        assert_eq!(config.supabase_jwt_secret.as_deref(), Some("jwt"));
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
    }

    #[test]
    fn pricing_file_is_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pricing.json");
        std::fs::write(
            &path,
            r#"{"tiers":[{"price_id":"price_z","name":"Z","kind":"subscription","credits":40}]}"#,
        )
        .unwrap();

        let config = ServiceConfig::from_vars(
            lookup(&[("PRICING_FILE", path.to_str().unwrap())]),
            &[],
        )
        .unwrap();
        assert_eq!(config.pricing.subscription_credits("price_z"), Some(40));
    }
}
