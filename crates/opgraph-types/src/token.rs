use std::fmt::{self, Write as _};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Default `chrono` format used to mint import tokens.
pub const DEFAULT_TOKEN_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Marker minted once per import and appended to names that collide.
///
/// Tokens end up inside entity names and blob keys, so they must be
/// non-empty and free of path separators.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImportToken(String);

impl ImportToken {
    /// Create a token from an explicit value.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TypeError::InvalidToken("token is empty".into()));
        }
        if trimmed.contains(['/', '\\']) {
            return Err(TypeError::InvalidToken(format!(
                "token `{trimmed}` contains a path separator"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Mint a token from the current UTC time.
    pub fn now(format: &str) -> Result<Self, TypeError> {
        Self::at(Utc::now(), format)
    }

    /// Mint a token from the given instant.
    pub fn at(instant: DateTime<Utc>, format: &str) -> Result<Self, TypeError> {
        let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(TypeError::InvalidToken(format!(
                "invalid token format `{format}`"
            )));
        }
        let mut rendered = String::new();
        write!(rendered, "{}", instant.format_with_items(items.into_iter())).map_err(|_| {
            TypeError::InvalidToken(format!("token format `{format}` failed to render"))
        })?;
        Self::new(rendered)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ImportToken {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ImportToken> for String {
    fn from(token: ImportToken) -> Self {
        token.0
    }
}

impl fmt::Debug for ImportToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImportToken({})", self.0)
    }
}

impl fmt::Display for ImportToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
