//! config/settings.rs
//! Configuración del servicio, leída del entorno una sola vez al arrancar.

use crate::models::permissions::Permission;

/// Tope para los intervalos en segundos (10 años). Evita que un valor
/// absurdo de entorno desborde al convertirse a duración con signo.
pub const MAX_INTERVAL_SECS: u64 = 315_360_000;

const MAX_RETENTION_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct Settings {
    pub service_port: u16,
    pub database_path: String,

    // APIs externas
    pub telegram_api_base: String,
    pub auth_service_url: String,

    // Validación y reconciliación
    pub validation_timeout_secs: u64,
    pub periodic_validation_interval_secs: u64,
    pub staleness_window_secs: u64,
    pub cleanup_interval_secs: u64,
    pub history_retention_days: i64,

    /// Permisos mínimos que el canal debe otorgar al bot para
    /// considerarse validado. Es dato de configuración, no lógica.
    pub required_permissions: Vec<Permission>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            service_port: 8002,
            database_path: "data/channel_service.db".to_string(),
            telegram_api_base: "https://api.telegram.org".to_string(),
            auth_service_url: "http://localhost:8001".to_string(),
            validation_timeout_secs: 10,
            periodic_validation_interval_secs: 3600,
            staleness_window_secs: 3600,
            cleanup_interval_secs: 86_400,
            history_retention_days: 30,
            required_permissions: vec![
                Permission::CanPostMessages,
                Permission::CanEditMessages,
            ],
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        Settings {
            service_port: env_parsed("SERVICE_PORT", defaults.service_port),
            database_path: env_or("DATABASE_PATH", &defaults.database_path),
            telegram_api_base: env_or("TELEGRAM_API_BASE", &defaults.telegram_api_base),
            auth_service_url: env_or("AUTH_SERVICE_URL", &defaults.auth_service_url),
            validation_timeout_secs: env_parsed(
                "VALIDATION_TIMEOUT",
                defaults.validation_timeout_secs,
            ),
            periodic_validation_interval_secs: clamp_secs(
                "PERIODIC_VALIDATION_INTERVAL",
                env_parsed(
                    "PERIODIC_VALIDATION_INTERVAL",
                    defaults.periodic_validation_interval_secs,
                ),
            ),
            staleness_window_secs: clamp_secs(
                "STALENESS_WINDOW",
                env_parsed("STALENESS_WINDOW", defaults.staleness_window_secs),
            ),
            cleanup_interval_secs: clamp_secs(
                "CLEANUP_INTERVAL",
                env_parsed("CLEANUP_INTERVAL", defaults.cleanup_interval_secs),
            ),
            history_retention_days: clamp_days(
                "HISTORY_RETENTION_DAYS",
                env_parsed("HISTORY_RETENTION_DAYS", defaults.history_retention_days),
            ),
            required_permissions: required_permissions_from_env(defaults.required_permissions),
        }
    }
}

fn clamp_secs(key: &str, value: u64) -> u64 {
    if value > MAX_INTERVAL_SECS {
        log::warn!(
            "(clamp_secs) {} fuera de rango ({}), usando {}",
            key,
            value,
            MAX_INTERVAL_SECS
        );
        MAX_INTERVAL_SECS
    } else {
        value
    }
}

fn clamp_days(key: &str, value: i64) -> i64 {
    if !(1..=MAX_RETENTION_DAYS).contains(&value) {
        let clamped = value.clamp(1, MAX_RETENTION_DAYS);
        log::warn!(
            "(clamp_days) {} fuera de rango ({}), usando {}",
            key,
            value,
            clamped
        );
        clamped
    } else {
        value
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("(env_parsed) Valor inválido para {}: '{}', usando default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// REQUIRED_PERMISSIONS es un CSV de nombres de permisos tal como los
/// expone Telegram ("can_post_messages,can_edit_messages").
fn required_permissions_from_env(default: Vec<Permission>) -> Vec<Permission> {
    match std::env::var("REQUIRED_PERMISSIONS") {
        Ok(raw) => {
            let mut parsed = Vec::new();
            for name in raw.split(',') {
                match Permission::parse(name) {
                    Some(perm) => parsed.push(perm),
                    None => log::warn!(
                        "(required_permissions_from_env) Permiso desconocido ignorado: '{}'",
                        name.trim()
                    ),
                }
            }
            if parsed.is_empty() { default } else { parsed }
        }
        Err(_) => default,
    }
}
