//! Ambient authentication context port.
//!
//! The security-token exchange that produces subjects is an external
//! collaborator; this port only exposes "who is the current caller, if any".

use crate::domain::subject::Subject;

/// Ambient source of the caller's authenticated identity.
///
/// Returning `None` is not an error - unauthenticated operations are
/// rejected (or not) by downstream authorization stages.
pub trait AuthContext: Send + Sync {
    fn current_subject(&self) -> Option<Subject>;
}
