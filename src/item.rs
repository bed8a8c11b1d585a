use serde::{Deserialize, Serialize};

/// Field name to value, exactly as `user info` reports it.
pub type UserInfo = serde_json::Map<String, serde_json::Value>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub note: Option<String>,
    pub login: Option<Login>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Login {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
    pub totp_uri: Option<String>,
}

impl Item {
    /// Email when there is one, then username, then `N/A`.
    pub fn identity(&self) -> &str {
        self.login
            .as_ref()
            .and_then(|l| non_empty(&l.email).or_else(|| non_empty(&l.username)))
            .unwrap_or("N/A")
    }

    pub fn password(&self) -> Option<&str> {
        self.login.as_ref().and_then(|l| non_empty(&l.password))
    }

    pub fn has_totp(&self) -> bool {
        self.login
            .as_ref()
            .and_then(|l| non_empty(&l.totp_uri))
            .is_some()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Input collected by the create-login screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewLogin {
    pub vault_name: String,
    pub title: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub url: Option<String>,
}

pub const DEFAULT_LENGTH: u32 = 24;
pub const DEFAULT_WORDS: u32 = 5;
pub const DEFAULT_SEPARATOR: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordPolicy {
    Random {
        length: u32,
        numbers: bool,
        symbols: bool,
        uppercase: bool,
    },
    Passphrase {
        word_count: u32,
        separator: String,
        capitalize: bool,
        numbers: bool,
    },
}

impl PasswordPolicy {
    pub fn random() -> PasswordPolicy {
        PasswordPolicy::Random {
            length: DEFAULT_LENGTH,
            numbers: true,
            symbols: true,
            uppercase: true,
        }
    }

    pub fn passphrase() -> PasswordPolicy {
        PasswordPolicy::Passphrase {
            word_count: DEFAULT_WORDS,
            separator: DEFAULT_SEPARATOR.to_string(),
            capitalize: false,
            numbers: false,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PasswordScore {
    #[serde(rename = "password_score")]
    pub label: String,
}

impl PasswordScore {
    pub fn is_strong(&self) -> bool {
        self.label == "Strong"
    }
}
