// std
use std::sync::Arc;
// crates.io
use time::{Duration, macros};
// self
use session_broker::{
	auth::{AccessTokenId, NewRefreshToken, RefreshToken, RefreshTokenState, UserId},
	store::{ClaimOutcome, MemoryStore, RefreshTokenStore, RejectionReason},
};

fn user(id: &str) -> UserId {
	UserId::new(id).expect("User fixture should be valid.")
}

fn row(user_id: &str, value: &str) -> NewRefreshToken {
	RefreshToken::builder(user(user_id))
		.token(value)
		.access_token_id(AccessTokenId::new(format!("jti-{value}")).expect("Jti fixture is valid."))
		.created_at(macros::datetime!(2025-01-01 00:00:00 UTC))
		.expires_in(Duration::days(7))
		.build()
		.expect("Refresh token fixture should build successfully.")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_admit_a_single_winner() {
	let store = Arc::new(MemoryStore::default());

	store.insert(row("u1", "shared")).await.expect("Insert should succeed.");

	let now = macros::datetime!(2025-01-02 00:00:00 UTC);
	let handles = (0..16)
		.map(|_| {
			let store = store.clone();

			tokio::spawn(async move { store.try_claim("shared", now).await })
		})
		.collect::<Vec<_>>();
	let mut winners = 0;
	let mut replays = 0;

	for handle in handles {
		match handle.await.expect("Claim task should not panic.").expect("Claim should not error.") {
			ClaimOutcome::Claimed(record) => {
				winners += 1;

				assert!(!record.used, "Winner must observe the pre-mutation record.");
			},
			ClaimOutcome::Rejected(rejection) => {
				replays += 1;

				assert_eq!(rejection.reason, RejectionReason::Redeemed);
				assert_eq!(rejection.owner, Some(user("u1")));
			},
		}
	}

	assert_eq!(winners, 1);
	assert_eq!(replays, 15);
	assert_eq!(store.rows_for(&user("u1"))[0].state_at(now), RefreshTokenState::Redeemed);
}

#[tokio::test]
async fn expired_tokens_are_never_claimable() {
	let store = MemoryStore::default();

	store.insert(row("u1", "stale")).await.expect("Insert should succeed.");

	let expiry = macros::datetime!(2025-01-08 00:00:00 UTC);

	for now in [expiry, expiry + Duration::seconds(1), expiry + Duration::days(30)] {
		let ClaimOutcome::Rejected(rejection) =
			store.try_claim("stale", now).await.expect("Claim should not error.")
		else {
			panic!("Expired token must not be claimable at {now}.");
		};

		assert_eq!(rejection.reason, RejectionReason::Expired);
	}

	let ClaimOutcome::Claimed(_) = store
		.try_claim("stale", expiry - Duration::seconds(1))
		.await
		.expect("Claim should not error.")
	else {
		panic!("Token must be claimable right before expiry.");
	};
}

#[tokio::test]
async fn invalidate_is_idempotent_and_blocks_claims() {
	let store = MemoryStore::default();
	let now = macros::datetime!(2025-01-02 00:00:00 UTC);

	store.insert(row("u1", "logout-me")).await.expect("Insert should succeed.");

	assert!(store.invalidate("logout-me").await.expect("Invalidate should not error."));
	assert!(store.invalidate("logout-me").await.expect("Second invalidate should not error."));
	assert!(!store.invalidate("never-issued").await.expect("Unknown invalidate should not error."));

	let ClaimOutcome::Rejected(rejection) =
		store.try_claim("logout-me", now).await.expect("Claim should not error.")
	else {
		panic!("Invalidated token must not be claimable.");
	};

	assert_eq!(rejection.reason, RejectionReason::Invalidated);

	let ClaimOutcome::Rejected(rejection) =
		store.try_claim("never-issued", now).await.expect("Claim should not error.")
	else {
		panic!("Unknown token must not be claimable.");
	};

	assert_eq!(rejection.reason, RejectionReason::Unknown);
	assert_eq!(rejection.owner, None);
}

#[tokio::test]
async fn invalidate_user_touches_only_the_owner() {
	let store = MemoryStore::default();

	store.insert(row("u1", "a")).await.expect("Insert should succeed.");
	store.insert(row("u1", "b")).await.expect("Insert should succeed.");
	store.insert(row("u2", "c")).await.expect("Insert should succeed.");
	store.invalidate("a").await.expect("Invalidate should not error.");

	assert_eq!(store.invalidate_user(&user("u1")).await.expect("Revocation should succeed."), 1);
	assert_eq!(store.invalidate_user(&user("u1")).await.expect("Revocation should succeed."), 0);
	assert!(store.rows_for(&user("u1")).iter().all(|row| row.invalidated));
	assert!(store.rows_for(&user("u2")).iter().all(|row| !row.invalidated));
}

#[tokio::test]
async fn duplicate_values_conflict_and_ids_increase() {
	let store = MemoryStore::default();
	let first = store.insert(row("u1", "v1")).await.expect("Insert should succeed.");
	let second = store.insert(row("u1", "v2")).await.expect("Insert should succeed.");

	assert!(second.id > first.id);
	assert!(store.insert(row("u2", "v1")).await.is_err());
	assert_eq!(store.len(), 2);
}
