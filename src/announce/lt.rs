use std::fmt;

use log::info;

use crate::error::Error;

/// Lightning talk details, only meaningful for a lightning talk announcement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LtInfo {
    pub speaker: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
}

impl LtInfo {
    pub fn is_empty(&self) -> bool {
        self.speaker.is_none() && self.title.is_none() && self.url.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.speaker.is_some() && self.title.is_some() && self.url.is_some()
    }
}

impl fmt::Display for LtInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "No lightning talk information set.");
        }

        let unset = "(not set)";
        writeln!(f, "Speaker: {}", self.speaker.as_deref().unwrap_or(unset))?;
        writeln!(f, "Title: {}", self.title.as_deref().unwrap_or(unset))?;
        write!(f, "URL: {}", self.url.as_deref().unwrap_or(unset))
    }
}

fn non_empty(field: &str, value: &str) -> Result<String, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::invalid(field, value, "the value cannot be empty"));
    }
    Ok(value.to_string())
}

/// In memory holder for the next lightning talk.
/// It is emptied once the lightning talk has been announced.
#[derive(Debug, Default)]
pub struct LtInfoStore {
    info: LtInfo,
}

impl LtInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_speaker(&mut self, speaker: &str) -> Result<(), Error> {
        let speaker = non_empty("speaker", speaker)?;
        info!("lightning talk speaker set to {}", speaker);
        self.info.speaker = Some(speaker);
        Ok(())
    }

    pub fn set_title(&mut self, title: &str) -> Result<(), Error> {
        let title = non_empty("title", title)?;
        info!("lightning talk title set to {}", title);
        self.info.title = Some(title);
        Ok(())
    }

    pub fn set_url(&mut self, url: &str) -> Result<(), Error> {
        let url = non_empty("url", url)?;
        info!("lightning talk url set to {}", url);
        self.info.url = Some(url);
        Ok(())
    }

    pub fn get_all(&self) -> LtInfo {
        self.info.clone()
    }

    pub fn clear(&mut self) {
        self.info = LtInfo::default();
        info!("lightning talk information cleared");
    }
}

#[cfg(test)]
mod test {
    use crate::error::Error;

    use super::LtInfoStore;

    #[test]
    fn fields_are_set_individually() {
        let mut store = LtInfoStore::new();
        store.set_speaker("Alice").unwrap();
        store.set_title(" Rust state machines ").unwrap();

        let info = store.get_all();
        assert_eq!(info.speaker.as_deref(), Some("Alice"));
        assert_eq!(info.title.as_deref(), Some("Rust state machines"));
        assert_eq!(info.url, None);
        assert!(!info.is_complete());

        store.set_url("https://example.com/lt").unwrap();
        assert!(store.get_all().is_complete());
    }

    #[test]
    fn empty_values_are_rejected() {
        let mut store = LtInfoStore::new();
        store.set_speaker("Alice").unwrap();

        assert!(matches!(store.set_speaker("   "), Err(Error::InvalidValue { .. })));
        assert_eq!(store.get_all().speaker.as_deref(), Some("Alice"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut store = LtInfoStore::new();
        store.set_title("Something").unwrap();
        store.clear();

        assert!(store.get_all().is_empty());
        assert_eq!(store.get_all().to_string(), "No lightning talk information set.");
    }
}
