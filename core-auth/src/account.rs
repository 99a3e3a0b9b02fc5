//! Deterministic account provisioning.
//!
//! A username is `<email>-<suffix>`, where the suffix is the last seven
//! characters of the unpadded URL-safe base64 SHA-1 digest of the raw token
//! that created the account. The email part is empty when the provider does
//! not share one. The username is derived once, at creation, and stored; it
//! is never recomputed from a later token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use core_library::NewLocalUser;
use sha1::{Digest, Sha1};

use crate::types::ProfileInfo;

/// Length of the token-derived username suffix.
pub const USERNAME_SUFFIX_LEN: usize = 7;

/// Token-derived part of a username.
pub fn token_suffix(raw_token: &str) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(Sha1::digest(raw_token.as_bytes()));
    // 20 digest bytes always encode to 27 ASCII characters.
    encoded[encoded.len() - USERNAME_SUFFIX_LEN..].to_string()
}

/// Derive the local username for a first login.
///
/// ```
/// use core_auth::account::derive_username;
/// use core_auth::ProfileInfo;
///
/// let profile = ProfileInfo::new().with("email", "a@x.com");
/// let username = derive_username(&profile, "tok1");
/// assert_eq!(username, "a@x.com-brW0bFM");
/// ```
pub fn derive_username(profile: &ProfileInfo, raw_token: &str) -> String {
    format!(
        "{}-{}",
        profile.email().unwrap_or_default(),
        token_suffix(raw_token)
    )
}

/// Fields for the account created on a first login. No password is set.
pub fn new_local_user(profile: &ProfileInfo, raw_token: &str) -> NewLocalUser {
    NewLocalUser {
        username: derive_username(profile, raw_token),
        email: profile.email().unwrap_or_default().to_string(),
        first_name: profile.first_name().unwrap_or_default().to_string(),
        last_name: profile.last_name().unwrap_or_default().to_string(),
    }
}
