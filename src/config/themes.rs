use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ThemeName {
    #[default]
    Dark,
    Light,
}

impl ThemeName {
    pub fn toggled(self) -> Self {
        match self {
            ThemeName::Dark => ThemeName::Light,
            ThemeName::Light => ThemeName::Dark,
        }
    }
}

/// Reads a theme name from config, falling back to dark for names we don't ship.
pub(crate) fn deserialize_or_dark<'de, D>(deserializer: D) -> Result<ThemeName, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_else(|_| {
        tracing::warn!(theme = %raw, "unknown theme in config, falling back to dark");
        ThemeName::Dark
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Light".parse::<ThemeName>().ok(), Some(ThemeName::Light));
        assert_eq!(ThemeName::Dark.to_string(), "dark");
        assert!("solarized".parse::<ThemeName>().is_err());
    }

    #[test]
    fn toggle_flips_between_dark_and_light() {
        assert_eq!(ThemeName::Dark.toggled(), ThemeName::Light);
        assert_eq!(ThemeName::Dark.toggled().toggled(), ThemeName::Dark);
    }
}
