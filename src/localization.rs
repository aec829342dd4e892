use anyhow::Result;
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::warn;
use unic_langid::LanguageIdentifier;

/// Locales bundled with the binary
const LOCALES: [(&str, &str); 1] = [("en", include_str!("../locales/en/main.ftl"))];
const DEFAULT_LOCALE: &str = "en";

/// Localization manager for the PDF bot
pub struct LocalizationManager {
    bundles: HashMap<String, Arc<FluentBundle<FluentResource>>>,
}

impl LocalizationManager {
    /// Create a new localization manager
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (locale, source) in LOCALES {
            let langid: LanguageIdentifier = locale.parse()?;
            let bundle = Self::create_bundle(&langid, source)?;
            bundles.insert(locale.to_string(), Arc::new(bundle));
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(locale: &LanguageIdentifier, source: &str) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow::anyhow!("Invalid {locale} resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow::anyhow!("Duplicate {locale} messages: {errors:?}"))?;

        Ok(bundle)
    }

    /// Pick the bundle for a Telegram language code, falling back to English
    fn bundle_for(&self, language: Option<&str>) -> Option<&Arc<FluentBundle<FluentResource>>> {
        let primary = language
            .and_then(|code| code.split(['-', '_']).next())
            .map(str::to_lowercase);
        primary
            .and_then(|code| self.bundles.get(&code))
            .or_else(|| self.bundles.get(DEFAULT_LOCALE))
    }

    /// Get a localized message in a specific language
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let Some(bundle) = self.bundle_for(Some(language)) else {
            return format!("Missing translation: {key}");
        };

        let Some(pattern) = bundle.get_message(key).and_then(|msg| msg.value()) else {
            return format!("Missing translation: {key}");
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            warn!(key = %key, errors = ?errors, "Fluent formatting errors");
        }
        value.into_owned()
    }

    /// Get a localized message in the default language
    pub fn get_message(&self, key: &str, args: Option<&HashMap<&str, &str>>) -> String {
        self.get_message_in_language(key, DEFAULT_LOCALE, args)
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(&self, key: &str, language: Option<&str>, args: &[(&str, &str)]) -> String {
        let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
        self.get_message_in_language(key, language.unwrap_or(DEFAULT_LOCALE), Some(&args_map))
    }

    pub fn has_message(&self, key: &str) -> bool {
        self.bundles
            .get(DEFAULT_LOCALE)
            .is_some_and(|bundle| bundle.has_message(key))
    }
}

/// Global localization instance
static LOCALIZATION_MANAGER: LazyLock<Option<LocalizationManager>> = LazyLock::new(|| {
    LocalizationManager::new()
        .map_err(|e| warn!(error = %e, "Failed to load localization"))
        .ok()
});

/// Force loading of the bundled resources
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.is_none() {
        anyhow::bail!("Localization resources failed to load");
    }
    Ok(())
}

/// Localized message for the user's Telegram language code
pub fn t_lang(key: &str, language: Option<&str>) -> String {
    match LOCALIZATION_MANAGER.as_ref() {
        Some(manager) => manager.get_message_in_language(key, language.unwrap_or(DEFAULT_LOCALE), None),
        None => format!("Missing translation: {key}"),
    }
}

/// Localized message with arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: Option<&str>) -> String {
    match LOCALIZATION_MANAGER.as_ref() {
        Some(manager) => manager.get_message_with_args(key, language, args),
        None => format!("Missing translation: {key}"),
    }
}
