//! Event issuers
//!
//! Every event carries the identity of the user that issued it. Identities
//! are opaque to the kernel: they only need a stable string form so they can
//! be persisted next to the event and rebuilt when records are decoded.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Fixed identity of the internal system user.
pub const SYSTEM_USER_ID: Uuid = Uuid::from_u128(0x99999999_9999_9999_9999_999999999999);

/// An opaque user identity with a stable string form.
///
/// The `Display` implementation is the persisted representation; a
/// [`UserFactory`] must be able to rebuild the identity from that exact
/// string.
pub trait User: fmt::Debug + fmt::Display + Send + Sync {
    fn id(&self) -> Uuid;
}

/// Rebuilds a user identity from its persisted string form.
pub type UserFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn User>, InvalidUser> + Send + Sync>;

/// A persisted identity string could not be parsed back into a user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid user identity: {0:?}")]
pub struct InvalidUser(pub String);

/// The distinguished identity used for internally generated events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemUser;

impl fmt::Display for SystemUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("system")
    }
}

impl User for SystemUser {
    fn id(&self) -> Uuid {
        SYSTEM_USER_ID
    }
}

/// A regular, authenticated user identified by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

impl fmt::Display for AuthenticatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl User for AuthenticatedUser {
    fn id(&self) -> Uuid {
        self.0
    }
}

/// Shared handle to the system user.
pub fn system_user() -> Arc<dyn User> {
    Arc::new(SystemUser)
}

/// Factory covering the identities the kernel ships with: `"system"` and
/// plain uuid strings for authenticated users.
pub fn default_user_factory() -> UserFactory {
    Arc::new(|raw| {
        if raw == "system" {
            return Ok(Arc::new(SystemUser) as Arc<dyn User>);
        }

        Uuid::parse_str(raw)
            .map(|id| Arc::new(AuthenticatedUser(id)) as Arc<dyn User>)
            .map_err(|_| InvalidUser(raw.to_string()))
    })
}
