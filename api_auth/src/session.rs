//! Sign-in session lifecycle.
//!
//! `Anonymous -> Authenticating -> Authenticated -> Expired | LoggedOut`.
//! Every transition takes the current time as an argument, so the clock is
//! owned by the caller.

use chrono::{DateTime, Duration, Utc};
use common::{env_config::CookieConfig, error::Res, misc::Role};
use db::models::application_user::ApplicationUser;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::principal::Principal;

/// Session key the ticket is stored under.
pub const TICKET_KEY: &str = "auth_ticket";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    pub expire_after: Duration,
    pub sliding: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        SessionPolicy {
            expire_after: Duration::minutes(20),
            sliding: true,
        }
    }
}

impl SessionPolicy {
    pub fn from_config(config: &CookieConfig) -> Self {
        SessionPolicy {
            expire_after: Duration::minutes(config.expire_minutes),
            sliding: config.sliding_expiration,
        }
    }

    pub fn issue(&self, user: &ApplicationUser, roles: Vec<Role>, now: DateTime<Utc>) -> AuthTicket {
        AuthTicket {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            company_id: user.company_id,
            roles,
            issued_at: now,
            expires_at: now + self.expire_after,
        }
    }
}

/// What the session cookie carries for a signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTicket {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub company_id: Option<i32>,
    pub roles: Vec<Role>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthTicket {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Anonymous,
    Authenticating { email: String },
    Authenticated(AuthTicket),
    Expired,
    LoggedOut,
}

impl SessionState {
    /// State of an incoming request carrying `ticket`.
    ///
    /// A live ticket is renewed when the policy slides; a stale one yields
    /// `Expired`, which callers treat as anonymous.
    pub fn resume(ticket: Option<AuthTicket>, policy: &SessionPolicy, now: DateTime<Utc>) -> Self {
        match ticket {
            None => SessionState::Anonymous,
            Some(ticket) if ticket.is_expired(now) => SessionState::Expired,
            Some(mut ticket) => {
                if policy.sliding {
                    ticket.expires_at = now + policy.expire_after;
                }
                SessionState::Authenticated(ticket)
            }
        }
    }

    pub fn begin_sign_in(self, email: &str) -> Self {
        SessionState::Authenticating {
            email: email.to_string(),
        }
    }

    /// Ends an `Authenticating` state with the credential check result.
    /// Any failure, and any call from another state, lands in `Anonymous`.
    pub fn complete_sign_in(
        self,
        checked: &Res<(ApplicationUser, Vec<Role>)>,
        policy: &SessionPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        match (self, checked) {
            (SessionState::Authenticating { email }, Ok((user, roles)))
                if user.email.eq_ignore_ascii_case(&email) =>
            {
                SessionState::Authenticated(policy.issue(user, roles.clone(), now))
            }
            _ => SessionState::Anonymous,
        }
    }

    pub fn sign_out(self) -> Self {
        match self {
            SessionState::Authenticated(_) => SessionState::LoggedOut,
            _ => SessionState::Anonymous,
        }
    }

    pub fn ticket(&self) -> Option<&AuthTicket> {
        match self {
            SessionState::Authenticated(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn principal(&self) -> Option<Principal> {
        self.ticket().map(Principal::from)
    }

    pub fn is_anonymous(&self) -> bool {
        self.ticket().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::error::AppError;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn confirmed_user() -> ApplicationUser {
        let mut user = ApplicationUser::new("ann@example.com", "Ann");
        user.email_confirmed = true;
        user
    }

    fn signed_in(policy: &SessionPolicy) -> AuthTicket {
        let state = SessionState::Anonymous
            .begin_sign_in("ann@example.com")
            .complete_sign_in(&Ok((confirmed_user(), vec![Role::Customer])), policy, t0());
        state.ticket().cloned().unwrap()
    }

    #[test]
    fn successful_sign_in_issues_a_twenty_minute_ticket() {
        let policy = SessionPolicy::default();
        let ticket = signed_in(&policy);
        assert_eq!(ticket.expires_at - ticket.issued_at, Duration::minutes(20));
        assert_eq!(ticket.roles, vec![Role::Customer]);
    }

    #[test]
    fn failed_check_ends_anonymous() {
        let state = SessionState::Anonymous
            .begin_sign_in("ann@example.com")
            .complete_sign_in(
                &Err(AppError::authentication_failed()),
                &SessionPolicy::default(),
                t0(),
            );
        assert_eq!(state, SessionState::Anonymous);
    }

    #[test]
    fn activity_slides_the_window() {
        let policy = SessionPolicy::default();
        let ticket = signed_in(&policy);

        let later = t0() + Duration::minutes(15);
        let state = SessionState::resume(Some(ticket), &policy, later);
        let renewed = state.ticket().unwrap();
        assert_eq!(renewed.expires_at, later + Duration::minutes(20));

        let again = SessionState::resume(Some(renewed.clone()), &policy, later + Duration::minutes(19));
        assert!(!again.is_anonymous());
    }

    #[test]
    fn idle_for_twenty_one_minutes_is_anonymous() {
        let policy = SessionPolicy::default();
        let ticket = signed_in(&policy);

        let state = SessionState::resume(Some(ticket), &policy, t0() + Duration::minutes(21));
        assert_eq!(state, SessionState::Expired);
        assert!(state.is_anonymous());
        assert!(state.principal().is_none());
    }

    #[test]
    fn fixed_window_does_not_renew() {
        let policy = SessionPolicy {
            sliding: false,
            ..SessionPolicy::default()
        };
        let ticket = signed_in(&policy);
        let state = SessionState::resume(Some(ticket.clone()), &policy, t0() + Duration::minutes(10));
        assert_eq!(state.ticket().unwrap().expires_at, ticket.expires_at);
    }

    #[test]
    fn sign_out_from_authenticated_is_logged_out() {
        let policy = SessionPolicy::default();
        let state = SessionState::Authenticated(signed_in(&policy));
        assert_eq!(state.sign_out(), SessionState::LoggedOut);
        assert_eq!(SessionState::Expired.sign_out(), SessionState::Anonymous);
    }
}
