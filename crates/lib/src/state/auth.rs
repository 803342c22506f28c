//! Login / registration lifecycle and the current credential.

use super::RequestStatus;
use std::time::{Duration, Instant};

/// Default lifetime of a failure notice.
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    LoginFailed,
}

/// Transient user-visible message; hidden once `expires_at` passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub expires_at: Instant,
}

impl Notice {
    pub fn is_visible(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone)]
pub enum AuthAction {
    LoginStarted,
    LoginSucceeded { token: String },
    LoginFailed { reason: String },
    RegisterStarted,
    RegisterSucceeded,
    RegisterFailed { reason: String },
    LoggedOut,
}

#[derive(Debug, Clone)]
pub struct AuthState {
    credential: Option<String>,
    pub login: RequestStatus,
    pub register: RequestStatus,
    notice: Option<Notice>,
    notice_ttl: Duration,
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new(None, NOTICE_TTL)
    }
}

impl AuthState {
    /// Start from a credential restored from durable storage, if any.
    pub fn new(credential: Option<String>, notice_ttl: Duration) -> Self {
        Self {
            credential,
            login: RequestStatus::Idle,
            register: RequestStatus::Idle,
            notice: None,
            notice_ttl,
        }
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn phase(&self) -> AuthPhase {
        match (&self.login, &self.credential) {
            (RequestStatus::Pending, _) => AuthPhase::Authenticating,
            (RequestStatus::Failed(_), _) => AuthPhase::LoginFailed,
            (_, Some(_)) => AuthPhase::Authenticated,
            (_, None) => AuthPhase::Anonymous,
        }
    }

    /// The current notice, if it has not expired at `now`.
    pub fn notice_at(&self, now: Instant) -> Option<&Notice> {
        self.notice.as_ref().filter(|n| n.is_visible(now))
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice_at(Instant::now())
    }

    pub fn apply(&mut self, action: AuthAction) {
        self.apply_at(action, Instant::now())
    }

    /// Apply one transition; `now` stamps any notice raised by it.
    pub fn apply_at(&mut self, action: AuthAction, now: Instant) {
        match action {
            AuthAction::LoginStarted => {
                self.login = RequestStatus::Pending;
                self.notice = None;
            }
            AuthAction::LoginSucceeded { token } => {
                self.credential = Some(token);
                self.login = RequestStatus::Succeeded;
                self.notice = None;
            }
            AuthAction::LoginFailed { reason } => {
                self.notice = Some(Notice {
                    text: reason.clone(),
                    expires_at: now + self.notice_ttl,
                });
                self.login = RequestStatus::Failed(reason);
            }
            AuthAction::RegisterStarted => {
                self.register = RequestStatus::Pending;
                self.notice = None;
            }
            AuthAction::RegisterSucceeded => {
                self.register = RequestStatus::Succeeded;
            }
            AuthAction::RegisterFailed { reason } => {
                self.notice = Some(Notice {
                    text: reason.clone(),
                    expires_at: now + self.notice_ttl,
                });
                self.register = RequestStatus::Failed(reason);
            }
            AuthAction::LoggedOut => {
                self.credential = None;
                self.login = RequestStatus::Idle;
                self.register = RequestStatus::Idle;
                self.notice = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_success_stores_credential() {
        let mut s = AuthState::default();
        assert_eq!(s.phase(), AuthPhase::Anonymous);
        s.apply(AuthAction::LoginStarted);
        assert_eq!(s.phase(), AuthPhase::Authenticating);
        s.apply(AuthAction::LoginSucceeded { token: "t".into() });
        assert_eq!(s.phase(), AuthPhase::Authenticated);
        assert_eq!(s.credential(), Some("t"));
    }

    #[test]
    fn login_failure_keeps_prior_credential() {
        let mut s = AuthState::new(Some("old".into()), NOTICE_TTL);
        s.apply(AuthAction::LoginStarted);
        s.apply(AuthAction::LoginFailed {
            reason: "Invalid credentials".into(),
        });
        assert_eq!(s.phase(), AuthPhase::LoginFailed);
        assert_eq!(s.credential(), Some("old"));
        assert_eq!(s.login.failure(), Some("Invalid credentials"));
    }

    #[test]
    fn failure_notice_expires() {
        let mut s = AuthState::new(None, Duration::from_secs(3));
        let t0 = Instant::now();
        s.apply_at(
            AuthAction::RegisterFailed {
                reason: "Username taken".into(),
            },
            t0,
        );
        assert_eq!(
            s.notice_at(t0 + Duration::from_secs(2)).map(|n| n.text.as_str()),
            Some("Username taken")
        );
        assert!(s.notice_at(t0 + Duration::from_secs(3)).is_none());
    }

    #[test]
    fn retry_clears_notice() {
        let mut s = AuthState::default();
        let t0 = Instant::now();
        s.apply_at(AuthAction::LoginFailed { reason: "x".into() }, t0);
        s.apply_at(AuthAction::LoginStarted, t0);
        assert!(s.notice_at(t0).is_none());
        assert!(s.login.is_pending());
    }

    #[test]
    fn register_success_does_not_authenticate() {
        let mut s = AuthState::default();
        s.apply(AuthAction::RegisterStarted);
        s.apply(AuthAction::RegisterSucceeded);
        assert_eq!(s.register, RequestStatus::Succeeded);
        assert!(!s.is_authenticated());
    }

    #[test]
    fn logout_resets_everything() {
        let mut s = AuthState::new(Some("t".into()), NOTICE_TTL);
        s.apply(AuthAction::RegisterFailed { reason: "x".into() });
        s.apply(AuthAction::LoggedOut);
        assert_eq!(s.credential(), None);
        assert_eq!(s.phase(), AuthPhase::Anonymous);
        assert_eq!(s.register, RequestStatus::Idle);
        assert!(s.notice().is_none());
    }
}
