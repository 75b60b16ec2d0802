//! Camera authorization.

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Platform authorization state for camera access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// Access granted
    Authorized,
    /// The user refused access
    Denied,
    /// Access blocked by policy; the user cannot grant it
    Restricted,
    /// The user has not been asked yet
    NotDetermined,
}

/// Source of camera authorization
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Current status without prompting
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Prompt the user and return whether access was granted.
    ///
    /// Only meaningful while the status is `NotDetermined`.
    async fn request_access(&self) -> bool;
}

/// Resolve whether the camera may be used, prompting once if undecided.
pub async fn check_permission(provider: &dyn PermissionProvider) -> bool {
    match provider.authorization_status() {
        AuthorizationStatus::Authorized => {
            debug!("camera authorized");
            true
        }
        AuthorizationStatus::NotDetermined => {
            info!("camera access undetermined, requesting access");
            let granted = provider.request_access().await;
            info!(granted, "camera access answered");
            granted
        }
        AuthorizationStatus::Denied => {
            warn!("camera access denied");
            false
        }
        AuthorizationStatus::Restricted => {
            warn!("camera access restricted");
            false
        }
    }
}

/// Permission provider with a preset status and a canned prompt answer.
///
/// Answering the prompt updates the status, so a second check does not prompt
/// again.
#[derive(Debug)]
pub struct StaticPermission {
    status: Mutex<AuthorizationStatus>,
    prompt_answer: bool,
}

impl StaticPermission {
    /// Provider reporting `status`; a prompt is answered with `prompt_answer`
    pub fn new(status: AuthorizationStatus, prompt_answer: bool) -> Self {
        Self {
            status: Mutex::new(status),
            prompt_answer,
        }
    }

    /// Already authorized
    pub fn granted() -> Self {
        Self::new(AuthorizationStatus::Authorized, true)
    }

    /// Already denied
    pub fn denied() -> Self {
        Self::new(AuthorizationStatus::Denied, false)
    }
}

#[async_trait]
impl PermissionProvider for StaticPermission {
    fn authorization_status(&self) -> AuthorizationStatus {
        match self.status.lock() {
            Ok(status) => *status,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    async fn request_access(&self) -> bool {
        let mut status = match self.status.lock() {
            Ok(status) => status,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *status == AuthorizationStatus::NotDetermined {
            *status = if self.prompt_answer {
                AuthorizationStatus::Authorized
            } else {
                AuthorizationStatus::Denied
            };
        }
        *status == AuthorizationStatus::Authorized
    }
}
