//! Reconciles a Google profile with a local account.
//!
//! Resolution order: Google id, then email (linking the id to that account,
//! only when Google has verified the email), then a new password-less account.
//! New usernames are derived from the display name plus a random suffix and
//! are claimed by inserting; a username clash at insert time re-rolls the
//! suffix. A clash on email or Google id
//! means a concurrent sign-in created the account first, so resolution starts
//! over and finds it.

use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::models::User;
use crate::db::store::UserStore;
use crate::error::{AppError, DatabaseError, UniqueKey};

const BASE_USERNAME_LENGTH: usize = 10;
const FIRST_SUFFIX_RANGE: u32 = 1_000;
const RETRY_SUFFIX_RANGE: u32 = 10_000;
const MAX_USERNAME_ATTEMPTS: usize = 16;
const MAX_RESOLVE_ROUNDS: usize = 3;

/// Identity asserted by the OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    pub external_id: String,
    pub email: String,
    /// Whether the provider vouches for `email`. Only a verified email may link an existing account.
    pub email_verified: bool,
    pub display_name: Option<String>,
}

/// Display name without whitespace, cut to ten characters.
///
/// Falls back to the email's local part, then to `"user"`, when that is empty.
pub fn username_base(profile: &ExternalProfile) -> String {
    let squash = |s: &str| -> String {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .take(BASE_USERNAME_LENGTH)
            .collect()
    };

    let from_name = squash(profile.display_name.as_deref().unwrap_or_default());
    if !from_name.is_empty() {
        return from_name;
    }
    let from_email = squash(profile.email.split('@').next().unwrap_or_default());
    if !from_email.is_empty() {
        return from_email;
    }
    "user".to_string()
}

/// `base` plus a random number; later attempts draw from a wider range.
pub fn candidate_username<R: Rng + ?Sized>(base: &str, attempt: usize, rng: &mut R) -> String {
    let range = if attempt == 0 { FIRST_SUFFIX_RANGE } else { RETRY_SUFFIX_RANGE };
    format!("{}{}", base, rng.gen_range(0..range))
}

enum Outcome {
    Resolved(User),
    Raced,
}

pub struct IdentityLinker {
    users: Arc<dyn UserStore>,
}

impl IdentityLinker {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Returns the one account this profile signs in as, creating or linking it if needed.
    pub async fn resolve(&self, profile: &ExternalProfile) -> Result<User, AppError> {
        for _ in 0..MAX_RESOLVE_ROUNDS {
            if let Outcome::Resolved(user) = self.resolve_once(profile).await? {
                return Ok(user);
            }
        }
        Err(AppError::internal(format!(
            "could not settle an account for external id {} after {} rounds",
            profile.external_id, MAX_RESOLVE_ROUNDS
        )))
    }

    async fn resolve_once(&self, profile: &ExternalProfile) -> Result<Outcome, AppError> {
        if let Some(user) = self.users.find_user_by_google_id(&profile.external_id).await? {
            return Ok(Outcome::Resolved(user));
        }

        if let Some(existing) = self.users.find_user_by_email(&profile.email).await? {
            if !profile.email_verified {
                warn!(
                    "Refusing to link Google identity to {}: email not verified",
                    existing.username
                );
                return Err(AppError::validation(
                    "Google email is not verified; cannot link it to an existing account.",
                ));
            }
            return match self.users.link_google_id(existing.id, &profile.external_id).await {
                Ok(user) => {
                    info!("Linked Google identity to existing account {}", user.username);
                    Ok(Outcome::Resolved(user))
                }
                Err(DatabaseError::Duplicate(UniqueKey::GoogleId)) => Ok(Outcome::Raced),
                Err(e) => Err(e.into()),
            };
        }

        self.create_account(profile).await
    }

    async fn create_account(&self, profile: &ExternalProfile) -> Result<Outcome, AppError> {
        let base = username_base(profile);

        for attempt in 0..MAX_USERNAME_ATTEMPTS {
            let username = candidate_username(&base, attempt, &mut rand::thread_rng());
            let user = User::with_google_id(
                username,
                profile.email.clone(),
                profile.external_id.clone(),
            );

            match self.users.create_user(&user).await {
                Ok(created) => {
                    info!("Created account {} from Google sign-in", created.username);
                    return Ok(Outcome::Resolved(created));
                }
                Err(DatabaseError::Duplicate(UniqueKey::Username)) => {
                    warn!("Generated username {} is taken, re-rolling", user.username);
                }
                Err(DatabaseError::Duplicate(UniqueKey::Email | UniqueKey::GoogleId)) => {
                    return Ok(Outcome::Raced);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::internal(format!(
            "no free username for base {} after {} attempts",
            base, MAX_USERNAME_ATTEMPTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::store::MockUserStore;
    use mockall::Sequence;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn profile(id: &str, email: &str, name: &str) -> ExternalProfile {
        ExternalProfile {
            external_id: id.to_string(),
            email: email.to_string(),
            email_verified: true,
            display_name: Some(name.to_string()),
        }
    }

    #[test]
    fn test_username_base() {
        assert_eq!(username_base(&profile("g", "a@x.com", "Ada Lovelace")), "AdaLovelac");
        assert_eq!(username_base(&profile("g", "a@x.com", " Bo  ")), "Bo");
        assert_eq!(username_base(&profile("g", "carol@x.com", "   ")), "carol");
        assert_eq!(username_base(&profile("g", "@x.com", "")), "user");
        // Counts characters, not bytes.
        assert_eq!(username_base(&profile("g", "a@x.com", "Zoë Ångström Ü")), "ZoëÅngströ");
    }

    #[test]
    fn test_candidate_username_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let first = candidate_username("Ada", 0, &mut rng);
            let suffix: u32 = first.trim_start_matches("Ada").parse().unwrap();
            assert!(suffix < FIRST_SUFFIX_RANGE);

            let retry = candidate_username("Ada", 3, &mut rng);
            let suffix: u32 = retry.trim_start_matches("Ada").parse().unwrap();
            assert!(suffix < RETRY_SUFFIX_RANGE);
        }
    }

    #[tokio::test]
    async fn test_same_external_id_resolves_to_same_account() {
        let store = Arc::new(MemoryStore::new());
        let linker = IdentityLinker::new(store.clone());
        let ada = profile("google-1", "ada@x.com", "Ada Lovelace");

        let first = linker.resolve(&ada).await.unwrap();
        let second = linker.resolve(&ada).await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(first.username.starts_with("AdaLovelac"));
        assert!(first.password_hash.is_none());
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_existing_email_account_is_linked_not_duplicated() {
        let store = Arc::new(MemoryStore::new());
        let existing = store
            .create_user(&User::with_password(
                "alice".to_string(),
                "alice@x.com".to_string(),
                "hash".to_string(),
            ))
            .await
            .unwrap();
        let linker = IdentityLinker::new(store.clone());

        let user = linker.resolve(&profile("google-2", "alice@x.com", "Alice A")).await.unwrap();

        assert_eq!(user.id, existing.id);
        assert_eq!(user.username, "alice");
        assert_eq!(user.google_id.as_deref(), Some("google-2"));
        assert!(user.password_hash.is_some());
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_unverified_email_does_not_link_existing_account() {
        let store = Arc::new(MemoryStore::new());
        let existing = store
            .create_user(&User::with_password(
                "alice".to_string(),
                "alice@x.com".to_string(),
                "hash".to_string(),
            ))
            .await
            .unwrap();
        let linker = IdentityLinker::new(store.clone());

        let mut unverified = profile("google-9", "alice@x.com", "Mallory");
        unverified.email_verified = false;
        let result = linker.resolve(&unverified).await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        let alice = store.find_user_by_id(existing.id).await.unwrap().unwrap();
        assert!(alice.google_id.is_none());
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_unverified_email_can_still_create_an_account() {
        let store = Arc::new(MemoryStore::new());
        let linker = IdentityLinker::new(store.clone());

        let mut fresh = profile("google-10", "new@x.com", "Newcomer");
        fresh.email_verified = false;
        let user = linker.resolve(&fresh).await.unwrap();

        assert_eq!(user.google_id.as_deref(), Some("google-10"));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_username_clash_at_insert_is_retried() {
        let mut users = MockUserStore::new();
        let mut seq = Sequence::new();
        users.expect_find_user_by_google_id().returning(|_| Ok(None));
        users.expect_find_user_by_email().returning(|_| Ok(None));
        users
            .expect_create_user()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DatabaseError::Duplicate(UniqueKey::Username)));
        users
            .expect_create_user()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|user| Ok(user.clone()));

        let linker = IdentityLinker::new(Arc::new(users));
        let user = linker.resolve(&profile("google-3", "bo@x.com", "Bo")).await.unwrap();

        assert!(user.username.starts_with("Bo"));
        assert_eq!(user.google_id.as_deref(), Some("google-3"));
    }

    #[tokio::test]
    async fn test_lost_race_on_email_resolves_to_winner() {
        let winner = User::with_google_id(
            "Cy42".to_string(),
            "cy@x.com".to_string(),
            "google-4".to_string(),
        );
        let winner_id = winner.id;

        let mut users = MockUserStore::new();
        let mut seq = Sequence::new();
        users
            .expect_find_user_by_google_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        users
            .expect_find_user_by_email()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(None));
        users
            .expect_create_user()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DatabaseError::Duplicate(UniqueKey::GoogleId)));
        users
            .expect_find_user_by_google_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(winner.clone())));

        let linker = IdentityLinker::new(Arc::new(users));
        let user = linker.resolve(&profile("google-4", "cy@x.com", "Cy")).await.unwrap();

        assert_eq!(user.id, winner_id);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut users = MockUserStore::new();
        users
            .expect_find_user_by_google_id()
            .returning(|_| Err(DatabaseError::ConnectionError("down".to_string())));

        let linker = IdentityLinker::new(Arc::new(users));
        let result = linker.resolve(&profile("google-5", "d@x.com", "D")).await;

        assert!(matches!(result, Err(AppError::DatabaseError(DatabaseError::ConnectionError(_)))));
    }
}
