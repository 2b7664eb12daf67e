// SPDX-License-Identifier: Apache-2.0
// Copyright OpenVirteX Authors

//! HTTP basic auth with role-scoped path prefixes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

/// What part of the API a credential may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Ui,
}

impl Role {
    /// The path prefix this role is allowed under.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Role::User => "/tenant",
            Role::Admin => "/admin",
            Role::Ui => "/ui",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// The credential set loaded from the config file at startup.
#[derive(Debug, Default)]
pub struct AuthStore {
    credentials: Vec<Credential>,
}

impl AuthStore {
    #[must_use]
    pub fn new(credentials: Vec<Credential>) -> Self {
        AuthStore { credentials }
    }

    /// Whether an `Authorization` header grants access to `path`.
    #[must_use]
    pub fn authorize(&self, header: Option<&str>, path: &str) -> bool {
        let Some(encoded) = header.and_then(|h| h.strip_prefix("Basic ")) else {
            return false;
        };
        let Ok(raw) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(pair) = String::from_utf8(raw) else {
            return false;
        };
        let Some((user, pass)) = pair.split_once(':') else {
            return false;
        };
        self.credentials.iter().any(|c| {
            c.username == user && c.password == pass && path.starts_with(c.role.prefix())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> AuthStore {
        AuthStore::new(vec![
            Credential {
                username: "tenant1".into(),
                password: "secret".into(),
                role: Role::User,
            },
            Credential {
                username: "root".into(),
                password: "toor".into(),
                role: Role::Admin,
            },
        ])
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    #[test]
    fn role_limits_the_path_prefix() {
        let store = store();
        let hdr = basic("tenant1", "secret");
        assert!(store.authorize(Some(&hdr), "/tenant"));
        assert!(!store.authorize(Some(&hdr), "/admin"));
        let hdr = basic("root", "toor");
        assert!(store.authorize(Some(&hdr), "/admin"));
    }

    #[test]
    fn bad_credentials_are_refused() {
        let store = store();
        assert!(!store.authorize(None, "/tenant"));
        assert!(!store.authorize(Some("Basic not-base64!"), "/tenant"));
        let hdr = basic("tenant1", "wrong");
        assert!(!store.authorize(Some(&hdr), "/tenant"));
    }
}
