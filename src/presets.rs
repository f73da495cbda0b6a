//! Preset registry
//!
//! Static table of named transformations. Names are part of the output
//! filename contract, so lookups never fall back to a default preset.

use crate::models::{FitMode, ImageFormat, Preset};
use crate::{Error, Result};

pub const DEFAULT_PRESET: &str = "default";
pub const LQIP_PRESET: &str = "lqip";

/// Presets generated for a cover image, in output order.
const ESSENTIAL_PRESETS: &[&str] = &[DEFAULT_PRESET, "og", "thumb", "avif"];

/// Immutable name → preset table, injected into the components that need it.
#[derive(Debug, Clone)]
pub struct PresetRegistry {
    presets: Vec<Preset>,
    essential: Vec<String>,
}

impl PresetRegistry {
    /// Build a registry from an explicit table.
    ///
    /// Every essential name must be present in `presets`.
    pub fn new(presets: Vec<Preset>, essential: &[&str]) -> Result<Self> {
        let registry = Self {
            presets,
            essential: essential.iter().map(|name| name.to_string()).collect(),
        };

        for name in &registry.essential {
            registry.lookup(name)?;
        }

        Ok(registry)
    }

    pub fn lookup(&self, name: &str) -> Result<&Preset> {
        self.presets
            .iter()
            .find(|preset| preset.name == name)
            .ok_or_else(|| Error::Config(format!("Unknown preset '{}'", name)))
    }

    pub fn list_essential_presets(&self) -> &[String] {
        &self.essential
    }

    /// Resolve a list of names, failing on the first unknown one.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Preset>> {
        names
            .iter()
            .map(|name| self.lookup(name.as_ref()).cloned())
            .collect()
    }
}

impl Default for PresetRegistry {
    #[rustfmt::skip]
    fn default() -> Self {
        use FitMode::{Cover, Inside};
        use ImageFormat::{Avif, Jpeg, WebP};

        Self {
            presets: vec![
                Preset::new(DEFAULT_PRESET, Some(1200), None,      WebP, 80, Inside),
                Preset::new("og",           Some(1200), Some(630), Jpeg, 85, Cover),
                Preset::new("thumb",        Some(600),  Some(315), WebP, 75, Cover),
                Preset::new("avif",         Some(1200), None,      Avif, 60, Inside),
                Preset::new(LQIP_PRESET,    Some(20),   None,      WebP, 20, Inside),
            ],
            essential: ESSENTIAL_PRESETS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lookup_known_presets() {
        let registry = PresetRegistry::default();

        let og = registry.lookup("og").unwrap();
        assert_eq!(og.width, Some(1200));
        assert_eq!(og.height, Some(630));
        assert_eq!(og.fit, FitMode::Cover);

        let thumb = registry.lookup("thumb").unwrap();
        assert_eq!((thumb.width, thumb.height), (Some(600), Some(315)));
        assert_eq!(thumb.format, ImageFormat::WebP);

        assert_eq!(registry.lookup("avif").unwrap().format, ImageFormat::Avif);
    }

    #[test]
    fn test_unknown_preset_is_config_error() {
        let registry = PresetRegistry::default();
        let err = registry.lookup("hero").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("hero"));
    }

    #[test]
    fn test_essential_presets_order() {
        let registry = PresetRegistry::default();
        assert_eq!(
            registry.list_essential_presets(),
            &["default", "og", "thumb", "avif"]
        );
    }

    #[test]
    fn test_resolve_fails_on_first_unknown_name() {
        let registry = PresetRegistry::default();

        let presets = registry.resolve(&["default", "thumb"]).unwrap();
        assert_eq!(presets.len(), 2);
        assert_eq!(presets[1].name, "thumb");

        assert!(registry.resolve(&["default", "banner"]).is_err());
    }

    #[test]
    fn test_custom_registry_validates_essentials() {
        let only_default = vec![Preset::new(
            "default",
            Some(100),
            None,
            ImageFormat::Png,
            100,
            FitMode::Inside,
        )];

        assert!(PresetRegistry::new(only_default.clone(), &["default"]).is_ok());
        assert!(PresetRegistry::new(only_default, &["default", "og"]).is_err());
    }
}
