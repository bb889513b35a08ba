use std::fmt::{Display, Formatter};

/// Carries [`Locale::header_value`] on every request.
pub const LANGUAGE_HEADER: &str = "language";

/// The language requested from the backend.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Locale {
    En,
    #[default]
    Zh,
}

impl Locale {
    /// Interpret the stored locale preference.
    ///
    /// Only an exact `"en"` selects English; anything else, including no preference at all,
    /// falls back to the default.
    pub fn from_preference(value: Option<&str>) -> Self {
        match value {
            Some("en") => Self::En,
            _ => Self::Zh,
        }
    }

    pub const fn header_value(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "Zh",
        }
    }
}

impl Display for Locale {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.header_value())
    }
}
