use core_library::LocalUser;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;

/// Google scopes requested for sign-in.
pub const GOOGLE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
];

/// Supported identity providers.
///
/// Each kind carries its own authorization parameters and default endpoints.
/// Adding a provider means adding a variant and a matching
/// [`ProfileClient`](crate::ProfileClient).
///
/// # Examples
///
/// ```
/// use core_auth::ProviderKind;
///
/// let provider: ProviderKind = "google".parse().unwrap();
/// assert_eq!(provider.display_name(), "Google");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Facebook,
    Google,
}

/// Endpoint URLs seeded for a provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorization_url: &'static str,
    pub access_token_url: &'static str,
    pub profile_url: &'static str,
}

impl ProviderKind {
    /// Get the human-readable display name for this provider
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Facebook => "Facebook",
            ProviderKind::Google => "Google",
        }
    }

    /// Provider name as stored in the `providers` table
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Facebook => "facebook",
            ProviderKind::Google => "google",
        }
    }

    /// Parse a stored provider name. Names are matched exactly.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "facebook" => Some(ProviderKind::Facebook),
            "google" => Some(ProviderKind::Google),
            _ => None,
        }
    }

    /// Extra query parameters for the authorization request.
    pub fn authorization_params(&self) -> Vec<(&'static str, String)> {
        match self {
            ProviderKind::Facebook => vec![("scope", "email".to_string())],
            ProviderKind::Google => vec![("scope", GOOGLE_SCOPES.join(" "))],
        }
    }

    /// Field of the code-exchange response that holds the raw login token.
    ///
    /// Google logins are verified through the identity token, Facebook
    /// logins through the access token.
    pub fn raw_token_field(&self) -> &'static str {
        match self {
            ProviderKind::Facebook => "access_token",
            ProviderKind::Google => "id_token",
        }
    }

    pub fn default_endpoints(&self) -> ProviderEndpoints {
        match self {
            ProviderKind::Facebook => ProviderEndpoints {
                authorization_url: "https://www.facebook.com/dialog/oauth",
                access_token_url: "https://graph.facebook.com/oauth/access_token",
                profile_url: "https://graph.facebook.com/me",
            },
            ProviderKind::Google => ProviderEndpoints {
                authorization_url: "https://accounts.google.com/o/oauth2/v2/auth",
                access_token_url: "https://oauth2.googleapis.com/token",
                profile_url: "https://www.googleapis.com/oauth2/v3/tokeninfo",
            },
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderKind::parse(s).ok_or_else(|| AuthError::UnsupportedProvider(s.to_string()))
    }
}

/// Verified profile attributes returned by a provider.
///
/// A thin wrapper over the provider's JSON object. Provider clients normalize
/// the external identifier to the `id` key before handing it out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileInfo(Map<String, Value>);

impl ProfileInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; anything other than an object yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Move the value under `from` to `to`. Returns whether `from` existed.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        match self.0.remove(from) {
            Some(value) => {
                self.0.insert(to.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// External identifier. Numeric ids are rendered as decimal strings.
    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.get_str("email")
    }

    /// `first_name` (Facebook shape) or `given_name` (Google shape).
    pub fn first_name(&self) -> Option<&str> {
        self.name_pair().0
    }

    /// `last_name` (Facebook shape) or `family_name` (Google shape).
    pub fn last_name(&self) -> Option<&str> {
        self.name_pair().1
    }

    // Whichever pair is present wins as a whole; the shapes are not mixed.
    fn name_pair(&self) -> (Option<&str>, Option<&str>) {
        let facebook = (self.get_str("first_name"), self.get_str("last_name"));
        if facebook.0.is_some() || facebook.1.is_some() {
            facebook
        } else {
            (self.get_str("given_name"), self.get_str("family_name"))
        }
    }
}

/// Explicit authentication context for a request.
///
/// Built from a presented session token; operations that need a caller take
/// `Option<&AuthenticatedUser>` instead of reading ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
}

impl From<&LocalUser> for AuthenticatedUser {
    fn from(user: &LocalUser) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(ProviderKind::parse("google"), Some(ProviderKind::Google));
        assert_eq!(ProviderKind::parse("facebook"), Some(ProviderKind::Facebook));
        assert_eq!(ProviderKind::parse("Google"), None);
        assert!(matches!(
            "twitter".parse::<ProviderKind>(),
            Err(AuthError::UnsupportedProvider(_))
        ));
    }

    #[test]
    fn test_authorization_params() {
        assert_eq!(
            ProviderKind::Facebook.authorization_params(),
            vec![("scope", "email".to_string())]
        );
        assert_eq!(
            ProviderKind::Google.authorization_params(),
            vec![(
                "scope",
                "https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/userinfo.profile"
                    .to_string()
            )]
        );
    }

    #[test]
    fn test_raw_token_field() {
        assert_eq!(ProviderKind::Google.raw_token_field(), "id_token");
        assert_eq!(ProviderKind::Facebook.raw_token_field(), "access_token");
    }

    #[test]
    fn test_profile_id_normalization() {
        let profile = ProfileInfo::from_value(json!({"id": "123"})).unwrap();
        assert_eq!(profile.id().as_deref(), Some("123"));

        let profile = ProfileInfo::from_value(json!({"id": 10157})).unwrap();
        assert_eq!(profile.id().as_deref(), Some("10157"));

        let profile = ProfileInfo::from_value(json!({"id": ""})).unwrap();
        assert_eq!(profile.id(), None);

        assert!(ProfileInfo::from_value(json!(["not", "an", "object"])).is_none());
    }

    #[test]
    fn test_profile_rename() {
        let mut profile = ProfileInfo::new().with("sub", "555");
        assert!(profile.rename("sub", "id"));
        assert!(!profile.rename("sub", "id"));
        assert_eq!(profile.id().as_deref(), Some("555"));
        assert!(profile.get("sub").is_none());
    }

    #[test]
    fn test_profile_name_shapes() {
        let facebook = ProfileInfo::new()
            .with("first_name", "A")
            .with("last_name", "B");
        assert_eq!(facebook.first_name(), Some("A"));
        assert_eq!(facebook.last_name(), Some("B"));

        let google = ProfileInfo::new()
            .with("given_name", "Ala")
            .with("family_name", "Kot");
        assert_eq!(google.first_name(), Some("Ala"));
        assert_eq!(google.last_name(), Some("Kot"));

        let partial = ProfileInfo::new()
            .with("first_name", "A")
            .with("family_name", "Kot");
        assert_eq!(partial.first_name(), Some("A"));
        assert_eq!(partial.last_name(), None);
    }

    #[test]
    fn test_authenticated_user_from_local_user() {
        let user = LocalUser {
            id: 4,
            username: "a@x.com-abcdefg".to_string(),
            email: "a@x.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            created_at: 0,
        };
        let auth = AuthenticatedUser::from(&user);
        assert_eq!(auth.user_id, 4);
        assert_eq!(auth.username, user.username);
    }
}
