use std::fmt;

use crate::typ::ExternalTypeResolver;

pub const DEFAULT_LOCALE: &str = "en-US";

/// Per-call configuration handed to every pipeline stage.
#[derive(Clone)]
pub struct Settings {
    pub locale: String,
    pub external_type_resolver: Option<ExternalTypeResolver>,
}

impl Settings {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            external_type_resolver: None,
        }
    }

    pub fn with_type_resolver(mut self, resolver: ExternalTypeResolver) -> Self {
        self.external_type_resolver = Some(resolver);
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("locale", &self.locale)
            .field("external_type_resolver", &self.external_type_resolver.is_some())
            .finish()
    }
}
