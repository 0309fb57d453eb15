//! Per-request authentication context

use axum::http::Extensions;

/// What the middleware chain learned about the caller
///
/// Stored in the request extensions. Both fields start out empty and are
/// filled in by `parse_access_token` and the auth middleware; the value
/// never outlives its request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Bearer token sent with the request
    pub access_token: Option<String>,
    /// User the home server resolved the token to
    pub user_id: Option<String>,
}

impl RequestContext {
    /// Take the context out of the extensions, or start an empty one
    pub fn take(extensions: &mut Extensions) -> Self {
        extensions.remove::<Self>().unwrap_or_default()
    }

    /// Put the context (back) into the extensions
    pub fn store(self, extensions: &mut Extensions) {
        extensions.insert(self);
    }

    /// Read the context without removing it
    pub fn get(extensions: &Extensions) -> Option<&Self> {
        extensions.get::<Self>()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}
