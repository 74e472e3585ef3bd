use std::env;
use std::path::PathBuf;
use anyhow::{Context, Result, bail};

/// Connection settings for the Spanner-backed record store
#[derive(Debug, Clone, PartialEq)]
pub struct SpannerConfig {
    pub emulator_host: Option<String>,
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl SpannerConfig {
    pub fn database_path(&self) -> String {
        format!(
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

/// Which record store backs the service
#[derive(Debug, Clone, PartialEq)]
pub enum StoreBackend {
    Memory,
    Spanner(SpannerConfig),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// URL prefix owned by the record service, e.g. `/zst`
    pub mount_path: String,
    /// Directory served for every path outside `mount_path`
    pub static_root: PathBuf,
    pub store: StoreBackend,
    pub service_port: u16,
    pub service_host: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mount_path = normalize_mount_path(
            &env::var("RECORD_MOUNT_PATH").unwrap_or_else(|_| "/zst".to_string()),
        )?;

        let static_root = PathBuf::from(
            env::var("STATIC_ROOT").unwrap_or_else(|_| "./static".to_string()),
        );

        let store = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "spanner".to_string())
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "spanner" => StoreBackend::Spanner(spanner_from_env()?),
            other => bail!("STORE_BACKEND must be one of: spanner, memory, got '{}'", other),
        };

        let service_port = env::var("SERVICE_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("SERVICE_PORT must be a valid port number (0-65535)")?;

        let service_host = env::var("SERVICE_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(Config {
            mount_path,
            static_root,
            store,
            service_port,
            service_host,
        })
    }

    pub fn log_startup(&self) {
        tracing::info!("Configuration loaded:");
        tracing::info!("  Record service mounted at: {}", self.mount_path);
        tracing::info!("  Static files served from: {}", self.static_root.display());
        match &self.store {
            StoreBackend::Memory => {
                tracing::info!("  Record store: in-memory (records are lost on restart)");
            }
            StoreBackend::Spanner(spanner) => {
                tracing::info!("  Record store: spanner");
                tracing::info!("  Spanner emulator: {}",
                    spanner.emulator_host.as_deref().unwrap_or("disabled (using production)"));
                tracing::info!("  Spanner database: {}", spanner.database_path());
            }
        }
        tracing::info!("  Service listening on: {}:{}", self.service_host, self.service_port);
    }
}

fn spanner_from_env() -> Result<SpannerConfig> {
    let emulator_host = env::var("SPANNER_EMULATOR_HOST").ok();

    let project = env::var("SPANNER_PROJECT")
        .context("SPANNER_PROJECT environment variable is required")?;

    let instance = env::var("SPANNER_INSTANCE")
        .context("SPANNER_INSTANCE environment variable is required")?;

    let database = env::var("SPANNER_DATABASE")
        .context("SPANNER_DATABASE environment variable is required")?;

    Ok(SpannerConfig {
        emulator_host,
        project,
        instance,
        database,
    })
}

const RESERVED_PATHS: [&str; 3] = ["/health", "/swagger-ui", "/api-docs"];

/// Trims trailing slashes and rejects prefixes that would shadow the whole site.
fn normalize_mount_path(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !raw.trim().starts_with('/') {
        bail!("RECORD_MOUNT_PATH must start with '/', got '{}'", raw);
    }
    if trimmed.is_empty() {
        bail!("RECORD_MOUNT_PATH must not be the site root");
    }
    if trimmed.contains(['?', '#', '{', '}', '*']) {
        bail!("RECORD_MOUNT_PATH contains reserved characters: '{}'", raw);
    }
    // The router treats `:name` segments as the old capture syntax and refuses them
    if trimmed.split('/').any(|segment| segment.starts_with(':')) {
        bail!("RECORD_MOUNT_PATH segments must not start with ':', got '{}'", raw);
    }
    if RESERVED_PATHS
        .iter()
        .any(|reserved| trimmed == *reserved || trimmed.starts_with(&format!("{}/", reserved)))
    {
        bail!("RECORD_MOUNT_PATH '{}' collides with a built-in route", raw);
    }
    Ok(trimmed.to_string())
}

/// Serializes tests that mutate process-wide environment variables
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("RECORD_MOUNT_PATH");
            env::remove_var("STATIC_ROOT");
            env::remove_var("STORE_BACKEND");
            env::remove_var("SPANNER_EMULATOR_HOST");
            env::remove_var("SPANNER_PROJECT");
            env::remove_var("SPANNER_INSTANCE");
            env::remove_var("SPANNER_DATABASE");
            env::remove_var("SERVICE_PORT");
            env::remove_var("SERVICE_HOST");
        }
    }

    fn set_spanner_vars() {
        unsafe {
            env::set_var("SPANNER_PROJECT", "test-project");
            env::set_var("SPANNER_INSTANCE", "test-instance");
            env::set_var("SPANNER_DATABASE", "test-database");
        }
    }

    #[test]
    fn test_config_with_all_vars() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        set_spanner_vars();
        unsafe {
            env::set_var("RECORD_MOUNT_PATH", "/stories/");
            env::set_var("STATIC_ROOT", "/srv/www");
            env::set_var("STORE_BACKEND", "spanner");
            env::set_var("SPANNER_EMULATOR_HOST", "localhost:9010");
            env::set_var("SERVICE_PORT", "8080");
            env::set_var("SERVICE_HOST", "127.0.0.1");
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.mount_path, "/stories");
        assert_eq!(config.static_root, PathBuf::from("/srv/www"));
        assert_eq!(
            config.store,
            StoreBackend::Spanner(SpannerConfig {
                emulator_host: Some("localhost:9010".to_string()),
                project: "test-project".to_string(),
                instance: "test-instance".to_string(),
                database: "test-database".to_string(),
            })
        );
        assert_eq!(config.service_port, 8080);
        assert_eq!(config.service_host, "127.0.0.1");
        clear_env_vars();
    }

    #[test]
    fn test_config_with_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        set_spanner_vars();

        let config = Config::from_env().unwrap();

        assert_eq!(config.mount_path, "/zst");
        assert_eq!(config.static_root, PathBuf::from("./static"));
        assert!(matches!(config.store, StoreBackend::Spanner(ref s) if s.emulator_host.is_none()));
        assert_eq!(config.service_port, 3000);
        assert_eq!(config.service_host, "0.0.0.0");
        clear_env_vars();
    }

    #[test]
    fn test_memory_backend_needs_no_spanner_vars() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        unsafe {
            env::set_var("STORE_BACKEND", "memory");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        clear_env_vars();
    }

    #[test]
    fn test_unknown_backend() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        unsafe {
            env::set_var("STORE_BACKEND", "redis");
        }

        let error = Config::from_env().unwrap_err();
        assert!(error.to_string().contains("STORE_BACKEND"));
        clear_env_vars();
    }

    #[test]
    fn test_missing_required_var() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        unsafe {
            env::set_var("SPANNER_PROJECT", "test-project");
            env::set_var("SPANNER_INSTANCE", "test-instance");
        }
        // Missing SPANNER_DATABASE

        let result = Config::from_env();
        assert!(result.is_err());
        let error = result.unwrap_err();
        assert!(error.to_string().contains("SPANNER_DATABASE"));
        clear_env_vars();
    }

    #[test]
    fn test_invalid_port() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        unsafe {
            env::set_var("STORE_BACKEND", "memory");
            env::set_var("SERVICE_PORT", "not-a-number");
        }

        let result = Config::from_env();
        assert!(result.is_err());
        let error = result.unwrap_err();
        assert!(error.to_string().contains("SERVICE_PORT"));
        clear_env_vars();
    }

    #[test]
    fn test_port_out_of_range() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        unsafe {
            env::set_var("STORE_BACKEND", "memory");
            env::set_var("SERVICE_PORT", "99999");
        }

        let result = Config::from_env();
        assert!(result.is_err());
        clear_env_vars();
    }

    #[test]
    fn test_mount_path_normalization() {
        assert_eq!(normalize_mount_path("/zst").unwrap(), "/zst");
        assert_eq!(normalize_mount_path("/zst//").unwrap(), "/zst");
        assert_eq!(normalize_mount_path("/api/records").unwrap(), "/api/records");
        assert!(normalize_mount_path("zst").is_err());
        assert!(normalize_mount_path("/").is_err());
        assert!(normalize_mount_path("/zst/{id}").is_err());
        assert!(normalize_mount_path("/health").is_err());
        assert!(normalize_mount_path("/swagger-ui/records").is_err());
        assert!(normalize_mount_path("/healthy").is_ok());
        assert!(normalize_mount_path("/zst:v2").is_ok());
    }

    #[test]
    fn test_mount_path_rejects_colon_segments() {
        for raw in ["/:zst", "/api/:records", "/api/:records/"] {
            let error = normalize_mount_path(raw).unwrap_err();
            assert!(error.to_string().contains("RECORD_MOUNT_PATH"), "{}", raw);
        }
    }

    #[test]
    fn test_colon_mount_path_fails_startup_config() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env_vars();
        unsafe {
            env::set_var("STORE_BACKEND", "memory");
            env::set_var("RECORD_MOUNT_PATH", "/:zst");
        }

        let error = Config::from_env().unwrap_err();
        assert!(error.to_string().contains("RECORD_MOUNT_PATH"));
        clear_env_vars();
    }

    #[test]
    fn test_database_path() {
        let spanner = SpannerConfig {
            emulator_host: None,
            project: "p".to_string(),
            instance: "i".to_string(),
            database: "d".to_string(),
        };
        assert_eq!(spanner.database_path(), "projects/p/instances/i/databases/d");
    }
}
