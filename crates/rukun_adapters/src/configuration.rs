use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use rukun_core::config::Settings;

pub const ENV_PREFIX: &str = "RUKUN";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("id", "rukun", "rukun")
}

pub fn get_configuration_with_paths(
    current_dir_path: Option<PathBuf>,
    system_config_dir_path: Option<PathBuf>,
) -> Result<Settings, config::ConfigError> {
    let config_directory = current_dir_path.unwrap_or_else(|| {
        std::env::current_dir()
            .map(|p| p.join("config"))
            .unwrap_or_else(|_| PathBuf::from("config"))
    });

    let system_config_dir = if let Some(path) = system_config_dir_path {
        path
    } else {
        project_dirs()
            .map(|d| d.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config"))
    };

    let settings = Config::builder()
        .set_default("api.base_url", "http://localhost:8000")?
        .set_default("api.login_path", "/login")?
        .set_default("api.refresh_path", "/refresh-token")?
        .set_default("api.logout_path", "/logout")?
        .set_default("api.login_route", "/login")?
        .set_default("api.refresh_timeout_secs", 15)?
        .set_default("api.request_timeout_secs", 30)?
        // Storage backend (enum serializes to lowercase string)
        .set_default("storage.backend", "file")?
        .set_default("log_level", "info")?
        .add_source(File::from(system_config_dir.join("config.toml")).required(false))
        .add_source(File::from(config_directory.join("config.toml")).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    settings.try_deserialize::<Settings>()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    get_configuration_with_paths(None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rukun_core::config::StorageBackend;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::tempdir;

    fn clear_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with("RUKUN__") {
                std::env::remove_var(&key);
            }
        }
    }

    fn nowhere() -> Option<PathBuf> {
        Some(PathBuf::from("/nonexistent"))
    }

    #[serial]
    #[test]
    fn test_get_configuration_defaults() {
        clear_env();

        let settings = get_configuration_with_paths(nowhere(), nowhere()).unwrap();

        assert_eq!(settings.api.base_url, "http://localhost:8000");
        assert_eq!(settings.api.refresh_path, "/refresh-token");
        assert_eq!(settings.api.refresh_timeout_secs, 15);
        assert_eq!(settings.storage.backend, StorageBackend::File);
        assert!(settings.storage.path.is_none());
        assert_eq!(settings.log_level, "info");
    }

    #[serial]
    #[test]
    fn test_get_configuration_file_override() {
        clear_env();

        let dir = tempdir().unwrap();
        let config_content = r#"
        log_level = "debug"

        [api]
        base_url = "https://rukun.example"
        refresh_timeout_secs = 5

        [storage]
        backend = "memory"
        "#;
        let mut file = std::fs::File::create(dir.path().join("config.toml")).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let settings =
            get_configuration_with_paths(Some(dir.path().to_path_buf()), nowhere()).unwrap();

        assert_eq!(settings.api.base_url, "https://rukun.example");
        assert_eq!(settings.api.refresh_timeout_secs, 5);
        assert_eq!(settings.api.login_path, "/login");
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.log_level, "debug");
    }

    #[serial]
    #[test]
    fn test_get_configuration_env_override() {
        clear_env();

        std::env::set_var("RUKUN__API__BASE_URL", "https://staging.rukun.example");
        std::env::set_var("RUKUN__STORAGE__BACKEND", "keyring");
        std::env::set_var("RUKUN__LOG_LEVEL", "trace");

        let settings = get_configuration_with_paths(nowhere(), nowhere()).unwrap();

        assert_eq!(settings.api.base_url, "https://staging.rukun.example");
        assert_eq!(settings.storage.backend, StorageBackend::Keyring);
        assert_eq!(settings.log_level, "trace");

        clear_env();
    }

    #[serial]
    #[test]
    fn test_get_configuration_precedence_env_over_file() {
        clear_env();

        let dir = tempdir().unwrap();
        let config_content = r#"
        log_level = "debug"

        [api]
        base_url = "https://rukun.example"
        "#;
        let mut file = std::fs::File::create(dir.path().join("config.toml")).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        std::env::set_var("RUKUN__API__BASE_URL", "http://127.0.0.1:9000");

        let settings =
            get_configuration_with_paths(Some(dir.path().to_path_buf()), nowhere()).unwrap();

        assert_eq!(settings.api.base_url, "http://127.0.0.1:9000");
        assert_eq!(settings.log_level, "debug");

        clear_env();
    }

    #[serial]
    #[test]
    fn test_invalid_backend_is_rejected() {
        clear_env();
        std::env::set_var("RUKUN__STORAGE__BACKEND", "floppy");

        let result = get_configuration_with_paths(nowhere(), nowhere());
        assert!(result.is_err());

        clear_env();
    }
}
