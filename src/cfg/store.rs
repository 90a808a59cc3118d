use std::{
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    sync::LazyLock,
    time::Duration,
};

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use config::{File, FileFormat};
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::{Permission, Permissions, RoleOverrides};

/// 24 hour `HH:MM`, both fields zero padded.
static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])$").expect("time pattern is a valid regex")
});

/// Accepted weekday names, in chrono order (Monday first).
pub const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const CHRONO_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn is_valid_time(value: &str) -> bool {
    TIME_PATTERN.is_match(value)
}

pub fn parse_weekday(value: &str) -> Option<Weekday> {
    WEEKDAYS
        .iter()
        .position(|name| *name == value)
        .map(|index| CHRONO_WEEKDAYS[index])
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    WEEKDAYS[weekday.num_days_from_monday() as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Settings,
    Channels,
}

impl Section {
    pub fn name(self) -> &'static str {
        match self {
            Section::Settings => "settings",
            Section::Channels => "channels",
        }
    }
}

/// Keys that administrators are allowed to change at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKey {
    ConfirmTime,
    AnnounceTime,
    ConfirmWeekday,
    AnnounceWeekday,
    ActionRole,
    DefaultUrl,
    ActionChannel,
    AnnounceChannel,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::ConfirmTime,
        ConfigKey::AnnounceTime,
        ConfigKey::ConfirmWeekday,
        ConfigKey::AnnounceWeekday,
        ConfigKey::ActionRole,
        ConfigKey::DefaultUrl,
        ConfigKey::ActionChannel,
        ConfigKey::AnnounceChannel,
    ];

    pub fn section(self) -> Section {
        match self {
            ConfigKey::ActionChannel | ConfigKey::AnnounceChannel => Section::Channels,
            _ => Section::Settings,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::ConfirmTime => "confirm_time",
            ConfigKey::AnnounceTime => "announce_time",
            ConfigKey::ConfirmWeekday => "confirm_weekday",
            ConfigKey::AnnounceWeekday => "announce_weekday",
            ConfigKey::ActionRole => "action_role",
            ConfigKey::DefaultUrl => "default_url",
            ConfigKey::ActionChannel => "action_channel_id",
            ConfigKey::AnnounceChannel => "announce_channel_id",
        }
    }

    /// Checks a value against the shape expected for this key and returns it normalized.
    pub fn validate(self, value: &str) -> Result<String, Error> {
        let value = value.trim();

        match self {
            ConfigKey::ConfirmTime | ConfigKey::AnnounceTime => {
                if !is_valid_time(value) {
                    return Err(Error::invalid(self, value, "expected a 24 hour HH:MM time"));
                }
            }
            ConfigKey::ConfirmWeekday | ConfigKey::AnnounceWeekday => {
                if parse_weekday(value).is_none() {
                    return Err(Error::invalid(
                        self,
                        value,
                        format!("expected one of {}", WEEKDAYS.join(", ")),
                    ));
                }
            }
            ConfigKey::ActionRole
            | ConfigKey::DefaultUrl
            | ConfigKey::ActionChannel
            | ConfigKey::AnnounceChannel => {
                if value.is_empty() {
                    return Err(Error::invalid(self, value, "the value cannot be empty"));
                }
            }
        }

        Ok(value.to_string())
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section().name(), self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.name() == s || key.to_string() == s)
            .ok_or_else(|| Error::invalid("key", s, "unknown configuration key"))
    }
}

/// One configuration layer, as stored in a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, String>,
}

impl Layer {
    fn section(&self, section: Section) -> &BTreeMap<String, String> {
        match section {
            Section::Settings => &self.settings,
            Section::Channels => &self.channels,
        }
    }

    fn section_mut(&mut self, section: Section) -> &mut BTreeMap<String, String> {
        match section {
            Section::Settings => &mut self.settings,
            Section::Channels => &mut self.channels,
        }
    }

    pub fn lookup(&self, key: ConfigKey) -> Option<&String> {
        self.section(key.section()).get(key.name())
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
            && self.channels.is_empty()
            && self.permissions.is_empty()
            && self.templates.is_empty()
    }

    /// Per-key merge, values of `over` win.
    fn merged(&self, over: &Layer) -> Layer {
        let mut merged = self.clone();
        merged.settings.extend(over.settings.clone());
        merged.channels.extend(over.channels.clone());
        merged.permissions.extend(over.permissions.clone());
        merged.templates.extend(over.templates.clone());
        merged
    }
}

/// The effective schedule, every value already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub confirm_time: NaiveTime,
    pub announce_time: NaiveTime,
    pub confirm_weekday: Weekday,
    pub announce_weekday: Weekday,
    /// Role mentioned by the confirmation message, by name.
    pub action_role: String,
    pub action_channel_id: String,
    pub announce_channel_id: String,
    pub default_url: String,
    pub timezone: Tz,
    /// Upper bound for the reaction window, when shorter than the confirm to announce gap.
    pub vote_window: Option<Duration>,
}

/// Message bodies, with `$name` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Templates {
    pub regular: Option<String>,
    pub lightning_talk: Option<String>,
    pub rest: Option<String>,
    pub confirmation: Option<String>,
}

#[derive(Debug, Clone)]
struct Effective {
    schedule: ScheduleConfig,
    templates: Templates,
    permissions: Permissions,
}

fn required<'a>(
    map: &'a BTreeMap<String, String>,
    section: &str,
    key: &str,
) -> Result<&'a str, Error> {
    map.get(key)
        .map(|value| value.as_str())
        .ok_or_else(|| Error::Load(format!("missing `{}.{}`", section, key)))
}

fn parse_time(key: ConfigKey, value: &str) -> Result<NaiveTime, Error> {
    key.validate(value)?;
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| Error::invalid(key, value, e.to_string()))
}

/// Checks a `settings` key that has no command and is only edited by hand.
fn validate_readonly_setting(name: &str, value: &str) -> Result<(), Error> {
    match name {
        "timezone" => value
            .parse::<Tz>()
            .map(|_| ())
            .map_err(|_| Error::invalid("settings.timezone", value, "unknown timezone")),
        "vote_window" if !value.trim().is_empty() => humantime::parse_duration(value.trim())
            .map(|_| ())
            .map_err(|e| Error::invalid("settings.vote_window", value, e.to_string())),
        _ => Ok(()),
    }
}

fn parse_day(key: ConfigKey, value: &str) -> Result<Weekday, Error> {
    parse_weekday(&key.validate(value)?)
        .ok_or_else(|| Error::invalid(key, value, "unknown weekday"))
}

impl Effective {
    fn merge(defaults: &Layer, overrides: &Layer, roles: &RoleOverrides) -> Result<Self, Error> {
        let merged = defaults.merged(overrides);
        let settings = &merged.settings;
        let channels = &merged.channels;

        let timezone = required(settings, "settings", "timezone")?;
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| Error::invalid("settings.timezone", timezone, "unknown timezone"))?;

        let vote_window = match settings.get("vote_window").map(|v| v.trim()) {
            Some(window) if !window.is_empty() => Some(
                humantime::parse_duration(window)
                    .map_err(|e| Error::invalid("settings.vote_window", window, e.to_string()))?,
            ),
            _ => None,
        };

        let schedule = ScheduleConfig {
            confirm_time: parse_time(
                ConfigKey::ConfirmTime,
                required(settings, "settings", ConfigKey::ConfirmTime.name())?,
            )?,
            announce_time: parse_time(
                ConfigKey::AnnounceTime,
                required(settings, "settings", ConfigKey::AnnounceTime.name())?,
            )?,
            confirm_weekday: parse_day(
                ConfigKey::ConfirmWeekday,
                required(settings, "settings", ConfigKey::ConfirmWeekday.name())?,
            )?,
            announce_weekday: parse_day(
                ConfigKey::AnnounceWeekday,
                required(settings, "settings", ConfigKey::AnnounceWeekday.name())?,
            )?,
            action_role: required(settings, "settings", ConfigKey::ActionRole.name())?.to_string(),
            default_url: required(settings, "settings", ConfigKey::DefaultUrl.name())?.to_string(),
            action_channel_id: required(channels, "channels", ConfigKey::ActionChannel.name())?
                .to_string(),
            announce_channel_id: required(channels, "channels", ConfigKey::AnnounceChannel.name())?
                .to_string(),
            timezone,
            vote_window,
        };

        let templates = Templates {
            regular: merged.templates.get("regular").cloned(),
            lightning_talk: merged.templates.get("lightning_talk").cloned(),
            rest: merged.templates.get("rest").cloned(),
            confirmation: merged.templates.get("confirmation").cloned(),
        };

        let role_list = |permission: Permission, replacement: &Option<String>| -> Vec<String> {
            match replacement {
                Some(role) => vec![role.clone()],
                None => merged
                    .permissions
                    .get(permission.config_key())
                    .cloned()
                    .unwrap_or_default(),
            }
        };

        let permissions = Permissions {
            admin: role_list(Permission::Admin, &roles.admin),
            moderator: role_list(Permission::Moderator, &roles.moderator),
            lt_admin: role_list(Permission::LtAdmin, &roles.lt_admin),
        };

        Ok(Self {
            schedule,
            templates,
            permissions,
        })
    }
}

/// Built in values, used for every key the default file leaves out.
fn builtin_defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, Error> {
    Ok(config::Config::builder()
        .set_default("settings.confirm_time", "21:30")?
        .set_default("settings.announce_time", "21:30")?
        .set_default("settings.confirm_weekday", "Thu")?
        .set_default("settings.announce_weekday", "Sun")?
        .set_default("settings.action_role", "@everyone")?
        .set_default("settings.default_url", "")?
        .set_default("settings.timezone", "UTC")?
        .set_default("channels.action_channel_id", "")?
        .set_default("channels.announce_channel_id", "")?
        .set_default("permissions.admin_roles", vec!["Administrator"])?
        .set_default("permissions.moderator_roles", vec!["Moderator"])?
        .set_default("permissions.lt_admin_roles", vec!["LT Admin"])?
        .set_default(
            "templates.regular",
            "This week's meetup on $mm/$dd starts at 21:30 as usual. Come hang out!\n$url",
        )?
        .set_default(
            "templates.lightning_talk",
            concat!(
                "This week's meetup on $mm/$dd is a lightning talk night, starting at 21:30!\n",
                "$speaker_name will present \"$title\", everyone is welcome!\n$url"
            ),
        )?
        .set_default("templates.rest", "No meetup this week, see you next time!")?
        .set_default(
            "templates.confirmation",
            "$role What is happening at the next meetup ($month/$day)?",
        )?)
}

fn read_layer(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<Layer, Error> {
    Ok(builder.build()?.try_deserialize()?)
}

/// Writes the override layer next to its final location, then swaps it in.
fn persist(path: &Path, layer: &Layer) -> Result<(), Error> {
    let body = toml::to_string(layer).map_err(|e| Error::Persistence(io::Error::other(e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(Error::Persistence)?;
    }

    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, body).map_err(Error::Persistence)?;

    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::Persistence(err));
    }

    debug!("overrides written to {}", path.display());
    Ok(())
}

/// Default configuration layered with the administrator overrides.
///
/// The default layer is read once and never mutated. The override layer only
/// holds the keys whose value differs from the default, it is written to disk
/// after every successful mutation. Callers serialize mutations by holding the
/// store behind a write lock.
#[derive(Debug)]
pub struct ConfigStore {
    defaults: Layer,
    overrides: Layer,
    overrides_path: PathBuf,
    roles: RoleOverrides,
    effective: Effective,
}

impl ConfigStore {
    /// Reads both layers. A missing default file leaves the built in values,
    /// a missing override file means no override.
    pub fn open(
        defaults_path: &Path,
        overrides_path: &Path,
        roles: RoleOverrides,
    ) -> Result<Self, Error> {
        if !defaults_path.exists() {
            warn!(
                "default configuration {} not found, using built in values",
                defaults_path.display()
            );
        }

        let defaults = read_layer(
            builtin_defaults()?.add_source(
                File::from(defaults_path)
                    .format(FileFormat::Toml)
                    .required(false),
            ),
        )?;
        info!("default configuration loaded from {}", defaults_path.display());

        let overrides = read_layer(
            config::Config::builder().add_source(
                File::from(overrides_path)
                    .format(FileFormat::Toml)
                    .required(false),
            ),
        )?;

        Self::from_layers(defaults, overrides, overrides_path.to_path_buf(), roles)
    }

    /// Builds a store from already parsed layers.
    /// Override entries that fail validation or repeat the default are dropped,
    /// and the file is rewritten when that happens.
    pub fn from_layers(
        defaults: Layer,
        raw_overrides: Layer,
        overrides_path: PathBuf,
        roles: RoleOverrides,
    ) -> Result<Self, Error> {
        let mut overrides = Layer::default();

        for key in ConfigKey::ALL {
            let Some(value) = raw_overrides.lookup(key) else {
                continue;
            };
            match key.validate(value) {
                Ok(value) if defaults.lookup(key) == Some(&value) => {
                    debug!("dropping override {} equal to its default", key);
                }
                Ok(value) => {
                    overrides
                        .section_mut(key.section())
                        .insert(key.name().to_string(), value);
                }
                Err(err) => warn!("ignoring override: {}", err),
            }
        }

        // Read-only keys may still be overridden by hand in the file.
        for (name, value) in &raw_overrides.settings {
            let settable = ConfigKey::ALL
                .iter()
                .any(|key| key.name() == name && key.section() == Section::Settings);
            if settable {
                continue;
            }
            if let Err(err) = validate_readonly_setting(name, value) {
                warn!("ignoring override: {}", err);
                continue;
            }
            if defaults.settings.get(name) != Some(value) {
                overrides.settings.insert(name.clone(), value.clone());
            }
        }
        for (name, names) in &raw_overrides.permissions {
            if defaults.permissions.get(name) != Some(names) {
                overrides.permissions.insert(name.clone(), names.clone());
            }
        }
        for (name, body) in &raw_overrides.templates {
            if defaults.templates.get(name) != Some(body) {
                overrides.templates.insert(name.clone(), body.clone());
            }
        }

        let effective = Effective::merge(&defaults, &overrides, &roles)?;
        if !overrides.is_empty() {
            info!("overrides loaded from {}", overrides_path.display());
        }

        if overrides != raw_overrides && overrides_path.exists() {
            info!("normalizing overrides in {}", overrides_path.display());
            if let Err(err) = persist(&overrides_path, &overrides) {
                warn!("could not rewrite the overrides: {}", err);
            }
        }

        Ok(Self {
            defaults,
            overrides,
            overrides_path,
            roles,
            effective,
        })
    }

    /// Current merged schedule.
    pub fn load(&self) -> ScheduleConfig {
        self.effective.schedule.clone()
    }

    pub fn templates(&self) -> &Templates {
        &self.effective.templates
    }

    pub fn permissions(&self) -> &Permissions {
        &self.effective.permissions
    }

    pub fn default_value(&self, key: ConfigKey) -> String {
        self.defaults.lookup(key).cloned().unwrap_or_default()
    }

    pub fn is_overridden(&self, key: ConfigKey) -> bool {
        self.overrides.lookup(key).is_some()
    }

    /// Effective value of a key, the override wins over the default.
    pub fn get(&self, key: ConfigKey) -> String {
        self.overrides
            .lookup(key)
            .cloned()
            .unwrap_or_else(|| self.default_value(key))
    }

    /// Changes a key and returns the `(old, new)` effective values.
    /// Setting a key back to its default removes it from the override layer.
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<(String, String), Error> {
        let value = key.validate(value)?;
        let old = self.get(key);

        let mut candidate = self.overrides.clone();
        let section = candidate.section_mut(key.section());
        if self.defaults.lookup(key) == Some(&value) {
            section.remove(key.name());
        } else {
            section.insert(key.name().to_string(), value.clone());
        }

        let effective = Effective::merge(&self.defaults, &candidate, &self.roles)?;
        persist(&self.overrides_path, &candidate)?;

        self.overrides = candidate;
        self.effective = effective;

        info!("configuration updated: {} = {} (was {})", key, value, old);
        Ok((old, value))
    }

    /// Drops every override and writes an empty override file.
    pub fn reset(&mut self) -> Result<(), Error> {
        let candidate = Layer::default();
        let effective = Effective::merge(&self.defaults, &candidate, &self.roles)?;
        persist(&self.overrides_path, &candidate)?;

        self.overrides = candidate;
        self.effective = effective;

        info!("configuration reset to defaults");
        Ok(())
    }

    /// Every settable key with its effective value.
    pub fn show(&self) -> BTreeMap<ConfigKey, String> {
        ConfigKey::ALL.into_iter().map(|key| (key, self.get(key))).collect()
    }
}

#[cfg(test)]
mod test {
    use std::{fs, path::Path};

    use chrono::{NaiveTime, Weekday};

    use crate::{cfg::RoleOverrides, error::Error};

    use super::{ConfigKey, ConfigStore};

    const DEFAULTS: &str = r#"
[settings]
confirm_time = "21:30"
announce_time = "21:30"
confirm_weekday = "Thu"
announce_weekday = "Sun"
action_role = "@Hangout"
default_url = "https://example.com/meetup"
timezone = "Asia/Tokyo"

[channels]
action_channel_id = 1111
announce_channel_id = "2222"

[permissions]
admin_roles = ["Administrator"]
moderator_roles = ["Moderator"]
lt_admin_roles = ["LT Admin"]
"#;

    fn open(dir: &Path) -> ConfigStore {
        let defaults = dir.join("config.toml");
        if !defaults.exists() {
            fs::write(&defaults, DEFAULTS).unwrap();
        }
        let overrides = dir.join("config-overrides.toml");
        ConfigStore::open(&defaults, &overrides, RoleOverrides::default()).unwrap()
    }

    #[test]
    fn load_merges_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        let schedule = store.load();

        assert_eq!(schedule.confirm_time, NaiveTime::from_hms_opt(21, 30, 0).unwrap());
        assert_eq!(schedule.confirm_weekday, Weekday::Thu);
        assert_eq!(schedule.announce_weekday, Weekday::Sun);
        assert_eq!(schedule.timezone, chrono_tz::Asia::Tokyo);
        // integers are accepted as opaque identifiers
        assert_eq!(schedule.action_channel_id, "1111");
        assert_eq!(schedule.announce_channel_id, "2222");
        // templates fall back to the built in ones
        assert!(store.templates().regular.is_some());
        assert!(store.templates().confirmation.is_some());
    }

    #[test]
    fn valid_times_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());

        for time in ["00:00", "09:05", "12:30", "21:30", "23:59"] {
            let (_, new) = store.set(ConfigKey::ConfirmTime, time).unwrap();
            assert_eq!(new, time);
            assert_eq!(store.get(ConfigKey::ConfirmTime), time);
        }

        let reopened = open(dir.path());
        assert_eq!(reopened.get(ConfigKey::ConfirmTime), "23:59");
        assert_eq!(
            reopened.load().confirm_time,
            NaiveTime::from_hms_opt(23, 59, 0).unwrap()
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        let before = store.show();

        for time in ["25:00", "9:5", "9:05", "24:00", "12:60", "noon", ""] {
            let result = store.set(ConfigKey::AnnounceTime, time);
            assert!(matches!(result, Err(Error::InvalidValue { .. })), "{}", time);
        }
        for day in ["Monday", "mon", "Sunday", "", "Xyz"] {
            let result = store.set(ConfigKey::ConfirmWeekday, day);
            assert!(matches!(result, Err(Error::InvalidValue { .. })), "{}", day);
        }
        assert!(matches!(
            store.set(ConfigKey::ActionChannel, "  "),
            Err(Error::InvalidValue { .. })
        ));

        assert_eq!(store.show(), before);
        assert!(!dir.path().join("config-overrides.toml").exists());
    }

    #[test]
    fn set_returns_old_and_new() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());

        let (old, new) = store.set(ConfigKey::AnnounceWeekday, "Sat").unwrap();
        assert_eq!(old, "Sun");
        assert_eq!(new, "Sat");
        assert_eq!(store.load().announce_weekday, Weekday::Sat);
        assert!(store.is_overridden(ConfigKey::AnnounceWeekday));
    }

    #[test]
    fn setting_the_default_removes_the_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        let path = dir.path().join("config-overrides.toml");

        store.set(ConfigKey::ConfirmTime, "20:00").unwrap();
        store.set(ConfigKey::ActionChannel, "3333").unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("confirm_time"));
        assert!(written.contains("3333"));

        let before = store.show();
        store.set(ConfigKey::ConfirmTime, "21:30").unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("confirm_time"));
        assert!(!store.is_overridden(ConfigKey::ConfirmTime));

        let after = store.show();
        for key in ConfigKey::ALL {
            if key != ConfigKey::ConfirmTime {
                assert_eq!(before[&key], after[&key]);
            }
        }
        assert_eq!(after[&ConfigKey::ConfirmTime], "21:30");
    }

    #[test]
    fn reset_restores_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        let defaults = store.show();

        store.set(ConfigKey::ConfirmTime, "08:15").unwrap();
        store.set(ConfigKey::ActionRole, "@Everyone Else").unwrap();
        store.set(ConfigKey::DefaultUrl, "https://example.com/other").unwrap();
        assert_ne!(store.show(), defaults);

        store.reset().unwrap();
        assert_eq!(store.show(), defaults);
        assert!(store.overrides.is_empty());
        let written = fs::read_to_string(dir.path().join("config-overrides.toml")).unwrap();
        assert!(written.trim().is_empty());
    }

    #[test]
    fn persistence_failure_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = dir.path().join("config.toml");
        fs::write(&defaults, DEFAULTS).unwrap();
        // a directory cannot be replaced by the override file
        let blocked = dir.path().join("blocked");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), "").unwrap();

        let mut store = ConfigStore::open(&defaults, &blocked, RoleOverrides::default()).unwrap();
        let before = store.show();

        let result = store.set(ConfigKey::ConfirmTime, "10:00");
        assert!(matches!(result, Err(Error::Persistence(_))));
        assert_eq!(store.show(), before);
        assert!(store.overrides.is_empty());
    }

    #[test]
    fn overrides_are_normalized_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config-overrides.toml");
        fs::write(
            &path,
            r#"
[settings]
confirm_time = "21:30"
announce_time = "7:00"
confirm_weekday = "Fri"
"#,
        )
        .unwrap();

        let store = open(dir.path());
        assert_eq!(store.get(ConfigKey::ConfirmWeekday), "Fri");
        // equal to the default
        assert!(!store.is_overridden(ConfigKey::ConfirmTime));
        // invalid
        assert_eq!(store.get(ConfigKey::AnnounceTime), "21:30");

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("confirm_weekday"));
        assert!(!written.contains("confirm_time"));
        assert!(!written.contains("announce_time"));
    }

    #[test]
    fn invalid_readonly_overrides_are_dropped_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config-overrides.toml");
        fs::write(
            &path,
            r#"
[settings]
confirm_weekday = "Fri"
timezone = "Mars/Olympus"
vote_window = "soon"
"#,
        )
        .unwrap();

        let store = open(dir.path());
        let schedule = store.load();
        assert_eq!(schedule.confirm_weekday, Weekday::Fri);
        assert_eq!(schedule.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(schedule.vote_window, None);

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("confirm_weekday"));
        assert!(!written.contains("timezone"));
        assert!(!written.contains("vote_window"));
    }

    #[test]
    fn valid_readonly_overrides_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config-overrides.toml"),
            "[settings]\ntimezone = \"Europe/Paris\"\nvote_window = \"2h\"\n",
        )
        .unwrap();

        let schedule = open(dir.path()).load();
        assert_eq!(schedule.timezone, chrono_tz::Europe::Paris);
        assert_eq!(schedule.vote_window, Some(std::time::Duration::from_secs(7200)));
    }

    #[test]
    fn role_overrides_replace_permission_lists() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = dir.path().join("config.toml");
        fs::write(&defaults, DEFAULTS).unwrap();
        let roles = RoleOverrides {
            admin: Some("Owner".to_string()),
            moderator: None,
            lt_admin: None,
        };

        let store = ConfigStore::open(&defaults, &dir.path().join("o.toml"), roles).unwrap();
        assert_eq!(store.permissions().admin, vec!["Owner".to_string()]);
        assert_eq!(store.permissions().moderator, vec!["Moderator".to_string()]);
    }

    #[test]
    fn keys_parse_from_names() {
        assert_eq!("confirm_time".parse::<ConfigKey>().unwrap(), ConfigKey::ConfirmTime);
        assert_eq!(
            "channels.announce_channel_id".parse::<ConfigKey>().unwrap(),
            ConfigKey::AnnounceChannel
        );
        assert!("timezone".parse::<ConfigKey>().is_err());
    }
}
