//! Connect string parsing.
//!
//! Two forms are accepted, with surrounding whitespace ignored:
//!
//! ```text
//! /@<target>                     external (pass-through) authentication
//! <username>/<password>@<target> database authentication
//! ```
//!
//! The first `/` and the first `@` in the string are the separators. A
//! password containing `/` is therefore kept whole, but a password
//! containing `@` is cut at that `@` and the rest lands in the target.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::native::CredentialKind;

/// Credentials a session authenticates with.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Externally authenticated session.
    External,
    /// Database username and password.
    Database {
        /// Username.
        username: Cow<'static, str>,
        /// Password.
        password: Cow<'static, str>,
    },
}

impl Credentials {
    /// Create database credentials.
    pub fn database(
        username: impl Into<Cow<'static, str>>,
        password: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::Database {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Get the username, empty for external credentials.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::External => "",
            Self::Database { username, .. } => username,
        }
    }

    /// Get the password, empty for external credentials.
    #[must_use]
    pub fn password(&self) -> &str {
        match self {
            Self::External => "",
            Self::Database { password, .. } => password,
        }
    }

    /// Get the native credential kind.
    #[must_use]
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::External => CredentialKind::External,
            Self::Database { .. } => CredentialKind::Database,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never expose sensitive data in debug output
        match self {
            Self::External => f.write_str("External"),
            Self::Database { username, .. } => f
                .debug_struct("Database")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

/// A parsed connect string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectString {
    credentials: Credentials,
    target: String,
}

impl ConnectString {
    /// Parse a connect string.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if let Some(target) = input.strip_prefix("/@") {
            return Ok(Self {
                credentials: Credentials::External,
                target: token(target, "target")?.to_owned(),
            });
        }

        let slash = input
            .find('/')
            .ok_or_else(|| invalid("missing '/' between username and password"))?;
        let at = input
            .find('@')
            .ok_or_else(|| invalid("missing '@' before target"))?;
        if at < slash {
            return Err(invalid("'@' appears before '/'"));
        }

        let username = token(&input[..slash], "username")?;
        let password = token(&input[slash + 1..at], "password")?;
        let target = token(&input[at + 1..], "target")?;

        Ok(Self {
            credentials: Credentials::database(username.to_owned(), password.to_owned()),
            target: target.to_owned(),
        })
    }

    /// Get the credentials.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Get the username, empty for external credentials.
    #[must_use]
    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    /// Get the password, empty for external credentials.
    #[must_use]
    pub fn password(&self) -> &str {
        self.credentials.password()
    }

    /// Get the target (net service name or connect descriptor).
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Split into credentials and target.
    #[must_use]
    pub fn into_parts(self) -> (Credentials, String) {
        (self.credentials, self.target)
    }
}

impl FromStr for ConnectString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// One whitespace-free, non-empty token; whitespace next to a separator is
/// tolerated.
fn token<'a>(raw: &'a str, what: &'static str) -> Result<&'a str> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(Error::InvalidConnectString(format!("empty {what}")));
    }
    if value.contains(char::is_whitespace) {
        return Err(Error::InvalidConnectString(format!(
            "{what} contains whitespace"
        )));
    }
    Ok(value)
}

fn invalid(reason: &str) -> Error {
    Error::InvalidConnectString(reason.to_owned())
}
