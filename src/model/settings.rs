//! User settings.
//!
//! One logical instance per installation. Every field is optional: an
//! absent server URL or credential means the feature is unavailable, not
//! that something is broken.

use crate::error::{Error, Result};
use crate::validate::is_valid_server_url;
use serde::{Deserialize, Serialize};

const REDACTED: &str = "********";

/// Names of the stored settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    UseDarkTheme,
    AnisetteServerUrl,
    FmdServerUrl,
    FmdEmail,
    FmdPassword,
    Language,
    EnableDebugData,
}

impl SettingKey {
    pub const ALL: [Self; 7] = [
        Self::UseDarkTheme,
        Self::AnisetteServerUrl,
        Self::FmdServerUrl,
        Self::FmdEmail,
        Self::FmdPassword,
        Self::Language,
        Self::EnableDebugData,
    ];

    /// Key used in the settings table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UseDarkTheme => "use_dark_theme",
            Self::AnisetteServerUrl => "anisette_server_url",
            Self::FmdServerUrl => "fmd_server_url",
            Self::FmdEmail => "fmd_email",
            Self::FmdPassword => "fmd_password",
            Self::Language => "language",
            Self::EnableDebugData => "enable_debug_data",
        }
    }

    /// Whether the value is a boolean flag rather than free text.
    #[must_use]
    pub const fn is_flag(&self) -> bool {
        matches!(self, Self::UseDarkTheme | Self::EnableDebugData)
    }
}

/// Credentials for the Find My Device server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmdAccount<'a> {
    pub server_url: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub use_dark_theme: Option<bool>,
    pub anisette_server_url: Option<String>,
    pub fmd_server_url: Option<String>,
    pub fmd_email: Option<String>,
    pub fmd_password: Option<String>,
    pub language: Option<String>,
    pub enable_debug_data: Option<bool>,
}

impl UserSettings {
    /// Dark theme is on only when explicitly enabled; unset means off.
    #[must_use]
    pub fn has_dark_theme_enabled(&self) -> bool {
        self.use_dark_theme == Some(true)
    }

    /// Diagnostic collection is on only when explicitly enabled.
    #[must_use]
    pub fn is_debug_data_enabled(&self) -> bool {
        self.enable_debug_data == Some(true)
    }

    /// The anisette server, if configured.
    #[must_use]
    pub fn anisette_server(&self) -> Option<&str> {
        self.anisette_server_url.as_deref()
    }

    /// FMD account details, available only when all three are configured.
    #[must_use]
    pub fn fmd_account(&self) -> Option<FmdAccount<'_>> {
        Some(FmdAccount {
            server_url: self.fmd_server_url.as_deref()?,
            email: self.fmd_email.as_deref()?,
            password: self.fmd_password.as_deref()?,
        })
    }

    /// Read one setting as its stored text form.
    #[must_use]
    pub fn get(&self, key: SettingKey) -> Option<String> {
        match key {
            SettingKey::UseDarkTheme => self.use_dark_theme.map(|b| b.to_string()),
            SettingKey::EnableDebugData => self.enable_debug_data.map(|b| b.to_string()),
            SettingKey::AnisetteServerUrl => self.anisette_server_url.clone(),
            SettingKey::FmdServerUrl => self.fmd_server_url.clone(),
            SettingKey::FmdEmail => self.fmd_email.clone(),
            SettingKey::FmdPassword => self.fmd_password.clone(),
            SettingKey::Language => self.language.clone(),
        }
    }

    /// Set or clear one setting from its text form.
    ///
    /// Text values are stored trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a flag value is not a boolean.
    pub fn set(&mut self, key: SettingKey, value: Option<&str>) -> Result<()> {
        let flag = |v: &str| {
            crate::validate::parse_flag(v).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "setting {} expects true/false, got '{v}'",
                    key.as_str()
                ))
            })
        };
        let text = value.map(|v| v.trim().to_string());

        match key {
            SettingKey::UseDarkTheme => self.use_dark_theme = value.map(flag).transpose()?,
            SettingKey::EnableDebugData => self.enable_debug_data = value.map(flag).transpose()?,
            SettingKey::AnisetteServerUrl => self.anisette_server_url = text,
            SettingKey::FmdServerUrl => self.fmd_server_url = text,
            SettingKey::FmdEmail => self.fmd_email = text,
            SettingKey::FmdPassword => self.fmd_password = text,
            SettingKey::Language => self.language = text,
        }
        Ok(())
    }

    /// A copy safe to print, with the password masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            fmd_password: self.fmd_password.as_ref().map(|_| REDACTED.to_string()),
            ..self.clone()
        }
    }

    /// Check the stored values before they are written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for blank text values or server
    /// URLs that are not http(s) base URLs.
    pub fn validate(&self) -> Result<()> {
        for key in SettingKey::ALL {
            if key.is_flag() {
                continue;
            }
            if let Some(value) = self.get(key) {
                if value.trim().is_empty() {
                    return Err(Error::InvalidArgument(format!(
                        "setting {} must not be blank; unset it instead",
                        key.as_str()
                    )));
                }
                if value.trim() != value {
                    return Err(Error::InvalidArgument(format!(
                        "setting {} has leading or trailing whitespace",
                        key.as_str()
                    )));
                }
            }
        }

        for (key, url) in [
            (SettingKey::AnisetteServerUrl, &self.anisette_server_url),
            (SettingKey::FmdServerUrl, &self.fmd_server_url),
        ] {
            if let Some(url) = url {
                if !is_valid_server_url(url) {
                    return Err(Error::InvalidArgument(format!(
                        "{} is not a valid server URL: {url}",
                        key.as_str()
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dark_theme_defaults_to_disabled() {
        let settings = UserSettings::default();
        assert_eq!(settings.use_dark_theme, None);
        assert!(!settings.has_dark_theme_enabled());

        let explicit_off = UserSettings {
            use_dark_theme: Some(false),
            ..UserSettings::default()
        };
        assert!(!explicit_off.has_dark_theme_enabled());

        let on = UserSettings {
            use_dark_theme: Some(true),
            ..UserSettings::default()
        };
        assert!(on.has_dark_theme_enabled());
    }

    #[test]
    fn test_fmd_account_requires_all_fields() {
        let mut settings = UserSettings {
            fmd_server_url: Some("https://fmd.example.org".to_string()),
            fmd_email: Some("me@example.org".to_string()),
            ..UserSettings::default()
        };
        assert!(settings.fmd_account().is_none());

        settings.fmd_password = Some("hunter2".to_string());
        let account = settings.fmd_account().unwrap();
        assert_eq!(account.email, "me@example.org");
        assert_eq!(account.password, "hunter2");
    }

    #[test]
    fn test_set_and_get_by_key() {
        let mut settings = UserSettings::default();
        settings.set(SettingKey::UseDarkTheme, Some("yes")).unwrap();
        settings.set(SettingKey::Language, Some("pt-BR")).unwrap();

        assert_eq!(settings.get(SettingKey::UseDarkTheme).as_deref(), Some("true"));
        assert_eq!(settings.language.as_deref(), Some("pt-BR"));
        assert!(settings.set(SettingKey::EnableDebugData, Some("sometimes")).is_err());

        settings.set(SettingKey::Language, None).unwrap();
        assert_eq!(settings.language, None);

        settings
            .set(SettingKey::FmdServerUrl, Some("  https://fmd.example.org \n"))
            .unwrap();
        assert_eq!(settings.fmd_server_url.as_deref(), Some("https://fmd.example.org"));
    }

    #[test]
    fn test_redacted_masks_password_only() {
        let settings = UserSettings {
            fmd_email: Some("me@example.org".to_string()),
            fmd_password: Some("hunter2".to_string()),
            ..UserSettings::default()
        };
        let shown = settings.redacted();
        assert_eq!(shown.fmd_password.as_deref(), Some(REDACTED));
        assert_eq!(shown.fmd_email, settings.fmd_email);
    }

    #[test]
    fn test_validate_rejects_bad_urls_and_blanks() {
        let bad_url = UserSettings {
            fmd_server_url: Some("https://fmd.example.org/login".to_string()),
            ..UserSettings::default()
        };
        assert!(matches!(bad_url.validate(), Err(Error::InvalidArgument(_))));

        let blank = UserSettings {
            language: Some("  ".to_string()),
            ..UserSettings::default()
        };
        assert!(blank.validate().is_err());

        assert!(UserSettings::default().validate().is_ok());
    }
}
