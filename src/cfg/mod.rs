use std::path::PathBuf;

use config::Environment;
use serde::Deserialize;

pub mod permissions;
pub mod store;

pub use permissions::{Permission, Permissions};
pub use store::{ConfigKey, ConfigStore, ScheduleConfig, Templates};

fn default_config_path() -> String {
    "config.toml".to_string()
}

fn default_overrides_path() -> String {
    "config-overrides.toml".to_string()
}

#[derive(Deserialize, Debug, Clone, Default)]
/// Process level configuration, read from the environment.
/// Everything the bot can change at runtime lives in the [`ConfigStore`] instead.
pub struct Config {
    /// Token used to connect to the discord gateway.
    pub discord_token: String,
    /// When set, logs are also appended to `announce-bot.log` in this directory.
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Replaces the `permissions.admin_roles` list with this single role name.
    #[serde(default)]
    pub admin_role: Option<String>,
    /// Replaces the `permissions.moderator_roles` list with this single role name.
    #[serde(default)]
    pub moderator_role: Option<String>,
    /// Replaces the `permissions.lt_admin_roles` list with this single role name.
    #[serde(default)]
    pub lt_admin_role: Option<String>,
    /// Read-only default configuration file.
    #[serde(default = "default_config_path")]
    pub config_path: String,
    /// Mutable override file, only holding the keys that differ from the defaults.
    #[serde(default = "default_overrides_path")]
    pub config_overrides_path: String,
}

impl Config {
    /// Loads the configuration from the environment using the `config` crate.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let settings = config::Config::builder()
            .add_source(Environment::default())
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn role_overrides(&self) -> RoleOverrides {
        RoleOverrides {
            admin: self.admin_role.clone(),
            moderator: self.moderator_role.clone(),
            lt_admin: self.lt_admin_role.clone(),
        }
    }
}

/// Role names provided by the environment, they win over both configuration layers.
#[derive(Debug, Clone, Default)]
pub struct RoleOverrides {
    pub admin: Option<String>,
    pub moderator: Option<String>,
    pub lt_admin: Option<String>,
}

/// Expands `~` and environment variables in a configured path.
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full_with_context_no_errors(
        path,
        || dirs::home_dir().and_then(|p| p.to_str().map(|s| s.to_string())),
        |f| std::env::var(f).ok(),
    );

    PathBuf::from(expanded.into_owned())
}

#[cfg(test)]
mod test {
    use super::expand_path;

    #[test]
    fn expand_keeps_plain_paths() {
        assert_eq!(
            expand_path("config/defaults.toml").to_str(),
            Some("config/defaults.toml")
        );
    }

    #[test]
    fn expand_environment_variables() {
        std::env::set_var("ANNOUNCER_TEST_DIR", "/srv/announcer");
        assert_eq!(
            expand_path("$ANNOUNCER_TEST_DIR/config.toml").to_str(),
            Some("/srv/announcer/config.toml")
        );
    }
}
