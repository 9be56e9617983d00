//! Retry of transient store failures and multi-document transactions
//!
//! Retries live here and nowhere else: base CRUD propagates every store
//! error as-is, and callers opt into [`with_retry`] around the operations
//! they know to be safe to repeat.

use std::future::Future;
use std::time::Duration;

use monglo_core::error::AdminResult;
use tracing::warn;

/// Delay before the first retry; doubled on every further attempt
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Attempts made by [`with_retry`] when no other budget is chosen
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Longest wait between two attempts
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Backoff before the retry following `attempt` (0-based), capped at
/// [`MAX_RETRY_DELAY`]
pub fn retry_delay(attempt: u32) -> Duration {
	2_u32
		.checked_pow(attempt)
		.and_then(|factor| INITIAL_RETRY_DELAY.checked_mul(factor))
		.map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

/// Runs `operation` until it succeeds, fails permanently, or `max_retries`
/// attempts have been made.
///
/// Only transient store failures are retried, after waiting
/// `100ms * 2^attempt` (at most [`MAX_RETRY_DELAY`]). Every other error is
/// returned immediately.
///
/// # Examples
///
/// ```rust
/// use monglo_ops::transactions::with_retry;
/// use monglo_core::AdminError;
/// use monglo_db::DbError;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// # async fn example() -> monglo_core::AdminResult<()> {
/// let calls = AtomicU32::new(0);
/// let value = with_retry(
///     || async {
///         if calls.fetch_add(1, Ordering::SeqCst) == 0 {
///             Err(AdminError::Database(DbError::Transient("write conflict".into())))
///         } else {
///             Ok(42)
///         }
///     },
///     3,
/// )
/// .await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn with_retry<T, F, Fut>(mut operation: F, max_retries: u32) -> AdminResult<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = AdminResult<T>>,
{
	let attempts = max_retries.max(1);
	let mut attempt = 0;
	loop {
		match operation().await {
			Ok(value) => return Ok(value),
			Err(err) if err.is_transient() && attempt + 1 < attempts => {
				let delay = retry_delay(attempt);
				warn!(
					attempt = attempt + 1,
					max_attempts = attempts,
					delay_ms = delay.as_millis() as u64,
					error = %err,
					"Transient store failure, retrying"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
			Err(err) => return Err(err),
		}
	}
}

#[cfg(feature = "mongodb")]
pub use self::session::TransactionManager;

#[cfg(feature = "mongodb")]
mod session {
	use futures::future::BoxFuture;
	use monglo_core::error::AdminResult;
	use monglo_db::backends::MongoDBBackend;
	use mongodb::ClientSession;
	use tracing::{debug, warn};

	/// Runs closures inside MongoDB multi-document transactions
	///
	/// # Examples
	///
	/// ```rust,no_run
	/// use monglo_ops::transactions::TransactionManager;
	/// use monglo_db::backends::MongoDBBackend;
	/// use bson::doc;
	///
	/// # async fn example() -> monglo_core::AdminResult<()> {
	/// let backend = MongoDBBackend::connect("mongodb://localhost:27017").await?.with_database("shop");
	/// let database = backend.database();
	/// let manager = TransactionManager::new(backend);
	///
	/// manager
	///     .with_transaction(|session| {
	///         let orders = database.collection::<bson::Document>("orders");
	///         Box::pin(async move {
	///             orders
	///                 .insert_one(doc! { "total": 10 })
	///                 .session(&mut *session)
	///                 .await
	///                 .map_err(monglo_db::DbError::from)?;
	///             Ok(())
	///         })
	///     })
	///     .await?;
	/// # Ok(())
	/// # }
	/// ```
	#[derive(Clone)]
	pub struct TransactionManager {
		backend: MongoDBBackend,
	}

	impl TransactionManager {
		pub fn new(backend: MongoDBBackend) -> Self {
			Self { backend }
		}

		pub fn backend(&self) -> &MongoDBBackend {
			&self.backend
		}

		/// Begins a transaction, runs `f` with its session, then commits.
		///
		/// When `f` fails the transaction is aborted and the error of `f` is
		/// returned.
		pub async fn with_transaction<T, F>(&self, f: F) -> AdminResult<T>
		where
			F: for<'s> FnOnce(&'s mut ClientSession) -> BoxFuture<'s, AdminResult<T>>,
		{
			let mut transaction = self.backend.begin_transaction().await?;
			let outcome = match transaction.session() {
				Ok(session) => f(session).await,
				Err(err) => Err(err.into()),
			};

			match outcome {
				Ok(value) => {
					transaction.commit().await?;
					debug!(database = self.backend.database_name(), "Committed transaction");
					Ok(value)
				}
				Err(err) => {
					if let Err(abort_err) = transaction.rollback().await {
						warn!(error = %abort_err, "Failed to abort transaction");
					}
					Err(err)
				}
			}
		}

		/// [`with_transaction`](Self::with_transaction) retried on
		/// transient failures
		pub async fn with_transaction_retry<T, F>(&self, mut f: F, max_retries: u32) -> AdminResult<T>
		where
			F: for<'s> FnMut(&'s mut ClientSession) -> BoxFuture<'s, AdminResult<T>>,
		{
			let attempts = max_retries.max(1);
			let mut attempt = 0;
			loop {
				match self.with_transaction(&mut f).await {
					Ok(value) => return Ok(value),
					Err(err) if err.is_transient() && attempt + 1 < attempts => {
						let delay = super::retry_delay(attempt);
						warn!(
							attempt = attempt + 1,
							delay_ms = delay.as_millis() as u64,
							error = %err,
							"Transient transaction failure, retrying"
						);
						tokio::time::sleep(delay).await;
						attempt += 1;
					}
					Err(err) => return Err(err),
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use monglo_core::AdminError;
	use monglo_db::DbError;
	use rstest::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[rstest]
	#[case(0, 100)]
	#[case(1, 200)]
	#[case(2, 400)]
	#[case(8, 25_600)]
	#[case(9, 30_000)]
	#[case(68, 30_000)]
	#[case(u32::MAX, 30_000)]
	fn test_retry_delay_doubles(#[case] attempt: u32, #[case] expected_ms: u64) {
		assert_eq!(retry_delay(attempt), Duration::from_millis(expected_ms));
	}

	#[rstest]
	#[tokio::test(start_paused = true)]
	async fn test_transient_failures_are_retried_with_backoff() {
		// Arrange
		let calls = AtomicU32::new(0);
		let started = tokio::time::Instant::now();

		// Act
		let result = with_retry(
			|| async {
				if calls.fetch_add(1, Ordering::SeqCst) < 2 {
					Err(AdminError::Database(DbError::Command {
						code: 112,
						message: "WriteConflict".to_string(),
					}))
				} else {
					Ok("done")
				}
			},
			3,
		)
		.await;

		// Assert
		assert_eq!(result.ok(), Some("done"));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
		assert!(
			started.elapsed() >= Duration::from_millis(300),
			"two waits of 100ms and 200ms should have elapsed"
		);
	}

	#[rstest]
	#[tokio::test(start_paused = true)]
	async fn test_retry_budget_is_total_attempts() {
		let calls = AtomicU32::new(0);

		let result: AdminResult<()> = with_retry(
			|| async {
				calls.fetch_add(1, Ordering::SeqCst);
				Err(AdminError::Database(DbError::Transient("network blip".to_string())))
			},
			3,
		)
		.await;

		assert!(result.is_err_and(|e| e.is_transient()));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[rstest]
	#[case(AdminError::Validation("empty".to_string()))]
	#[case(AdminError::Database(DbError::DuplicateKey("dup".to_string())))]
	#[tokio::test(start_paused = true)]
	async fn test_permanent_failures_return_immediately(#[case] error: AdminError) {
		let calls = AtomicU32::new(0);
		let mut error = Some(error);

		let result: AdminResult<()> = with_retry(
			|| {
				calls.fetch_add(1, Ordering::SeqCst);
				let err = error.take().unwrap_or(AdminError::Validation("again".to_string()));
				async move { Err(err) }
			},
			5,
		)
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1, "no retry for permanent errors");
	}
}
