//! Fixed-subject AuthContext for wiring and tests.
//!
//! The real identity comes from a token exchange service outside this core;
//! this adapter just holds whatever subject the process was handed.

use std::sync::RwLock;

use crate::domain::subject::Subject;
use crate::port::auth_context::AuthContext;

/// `AuthContext` backed by a process-local subject slot.
pub struct StaticAuthContext {
    subject: RwLock<Option<Subject>>,
}

impl StaticAuthContext {
    pub fn with_subject(subject: Subject) -> Self {
        Self {
            subject: RwLock::new(Some(subject)),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            subject: RwLock::new(None),
        }
    }

    /// Replace the ambient subject (e.g. after a token refresh).
    pub fn set_subject(&self, subject: Option<Subject>) {
        if let Ok(mut slot) = self.subject.write() {
            *slot = subject;
        }
    }
}

impl AuthContext for StaticAuthContext {
    fn current_subject(&self) -> Option<Subject> {
        self.subject.read().ok().and_then(|slot| slot.clone())
    }
}
