//! Admin authentication
//!
//! Sign-in is a one-time code sent by email, exchanged for a bearer token
//! that is persisted between runs.

pub mod login;
pub mod session;

pub use login::{login, logout, status};
pub use session::{FileStorage, KeyValueStorage, SessionStore};

use crate::api::ApiError;

/// Shared 401 handling: drop the stored token and tell the operator.
///
/// Returns true if `err` was an authorization failure.
pub fn handle_auth_failure<S: KeyValueStorage>(
    err: &anyhow::Error,
    store: &mut SessionStore<S>,
) -> bool {
    let unauthorized = err
        .chain()
        .filter_map(|e| e.downcast_ref::<ApiError>())
        .any(ApiError::is_unauthorized);
    if !unauthorized {
        return false;
    }
    if store.is_authenticated() {
        tracing::info!("Stored token rejected, clearing session");
        store.clear();
    }
    eprintln!("Session expired or invalid. Run 'support-console login' to sign in again.");
    true
}
