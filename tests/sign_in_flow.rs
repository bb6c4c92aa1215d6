//! ---
//! chapel_section: "15-testing-qa-runbook"
//! chapel_subsection: "integration-tests"
//! chapel_type: "source"
//! chapel_scope: "code"
//! chapel_description: "Integration and validation tests for the chapel stack."
//! chapel_version: "v0.1.0"
//! chapel_owner: "platform"
//! ---
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chapel_access::{
    InMemoryProfileStore, Permission, PermissionResolver, ProfileRecord, Role, SessionIdentity,
};
use chapel_common::{Clock, ManualClock};
use chapel_persistence::MemoryStore;
use chapel_ratelimit::{RateLimiter, SensitiveOperation};
use chrono::{DateTime, Utc};

/// Minimal credential check standing in for the hosted auth service.
struct Accounts {
    passwords: HashMap<&'static str, (&'static str, &'static str)>,
}

impl Accounts {
    fn uid_for(&self, email: &str, password: &str) -> Option<&'static str> {
        self.passwords
            .get(email.trim().to_lowercase().as_str())
            .filter(|(_, expected)| *expected == password)
            .map(|(uid, _)| *uid)
    }
}

struct App {
    accounts: Accounts,
    session: SessionIdentity,
    resolver: PermissionResolver,
    limiter: RateLimiter,
}

#[derive(Debug, PartialEq)]
enum SignIn {
    Ok(Role),
    WrongPassword { remaining: u32 },
    Throttled(String),
}

impl App {
    fn new(clock: Arc<ManualClock>) -> Self {
        let profiles = InMemoryProfileStore::new();
        profiles.upsert("uid-pastor", ProfileRecord::with_role(Role::Pastor));
        profiles.upsert("uid-kids", ProfileRecord::with_role(Role::SundaySchoolHead));
        let session = SessionIdentity::new();
        let resolver = PermissionResolver::new(Arc::new(session.clone()), Arc::new(profiles));
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new())).with_clock(clock);
        let accounts = Accounts {
            passwords: HashMap::from([
                ("pastor@church.org", ("uid-pastor", "shepherd")),
                ("kids@church.org", ("uid-kids", "crayons")),
            ]),
        };
        Self {
            accounts,
            session,
            resolver,
            limiter,
        }
    }

    async fn sign_in(&self, email: &str, password: &str, now: DateTime<Utc>) -> SignIn {
        let decision = self
            .limiter
            .check_operation(SensitiveOperation::Login, email)
            .await;
        if !decision.allowed {
            return SignIn::Throttled(decision.retry_message(now).unwrap_or_default());
        }
        self.limiter
            .record_operation(SensitiveOperation::Login, email)
            .await;

        match self.accounts.uid_for(email, password) {
            Some(uid) => {
                self.limiter
                    .reset_operation(SensitiveOperation::Login, email)
                    .await;
                self.resolver.clear_cache();
                self.session.sign_in(uid);
                SignIn::Ok(self.resolver.get_role().await)
            }
            None => SignIn::WrongPassword {
                remaining: decision.remaining_attempts.unwrap_or_default(),
            },
        }
    }

    fn sign_out(&self) {
        self.session.sign_out();
        self.resolver.clear_cache();
    }
}

#[tokio::test]
async fn lockout_then_recovery() {
    let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
    let app = App::new(clock.clone());

    for expected in [4, 3, 2, 1, 0] {
        assert_eq!(
            app.sign_in("kids@church.org", "wrong", clock.now()).await,
            SignIn::WrongPassword {
                remaining: expected
            }
        );
    }
    assert_eq!(
        app.sign_in("kids@church.org", "crayons", clock.now()).await,
        SignIn::Throttled("Too many attempts. Please try again in 15 minutes.".into())
    );

    // The block ends while the first attempt is still inside the window.
    clock.advance(Duration::from_secs(15 * 60));
    assert_eq!(
        app.sign_in("kids@church.org", "crayons", clock.now()).await,
        SignIn::Throttled("Too many attempts. Please try again in 15 minutes.".into())
    );

    clock.advance(Duration::from_secs(15 * 60));
    assert_eq!(
        app.sign_in("KIDS@church.org", "crayons", clock.now()).await,
        SignIn::Ok(Role::SundaySchoolHead)
    );
    assert!(app.resolver.has_permission(Permission::TakeKidsAttendance).await);
    assert!(app.limiter.tracked_keys().await.is_empty());
}

#[tokio::test]
async fn switching_accounts_never_leaks_privileges() {
    let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
    let app = App::new(clock.clone());

    assert_eq!(
        app.sign_in("pastor@church.org", "shepherd", clock.now()).await,
        SignIn::Ok(Role::Pastor)
    );
    assert!(app.resolver.has_permission(Permission::ViewDonations).await);

    app.sign_out();
    assert!(!app.resolver.has_permission(Permission::ViewDonations).await);

    assert_eq!(
        app.sign_in("kids@church.org", "crayons", clock.now()).await,
        SignIn::Ok(Role::SundaySchoolHead)
    );
    assert!(!app.resolver.has_permission(Permission::ViewDonations).await);
    assert!(app.resolver.has_permission(Permission::RegisterChildren).await);
}
