/// Database test utilities with singleton pattern
///
/// Provides serialized access to the test database. Tests that use it are `#[ignore]`d
/// and need `TEST_DATABASE_URL` pointing at a disposable PostgreSQL database.
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, Pool};
use diesel_migrations::MigrationHarness;
use std::sync::{Arc, Mutex, OnceLock};
use translation_queue_lib::shared::infrastructure::database::MIGRATIONS;

type PgPool = Pool<ConnectionManager<PgConnection>>;

static DB_POOL: OnceLock<Arc<PgPool>> = OnceLock::new();

/// Get or create singleton database pool for tests, with migrations applied
pub fn get_test_db_pool() -> Arc<PgPool> {
    DB_POOL
        .get_or_init(|| {
            dotenvy::dotenv().ok();
            let test_db_url = std::env::var("TEST_DATABASE_URL")
                .expect("TEST_DATABASE_URL must be set in .env for tests");

            let manager = ConnectionManager::<PgConnection>::new(test_db_url);
            let pool = r2d2::Pool::builder()
                .max_size(10)
                .build(manager)
                .expect("Failed to create test database pool");

            let mut conn = pool.get().expect("Failed to get DB connection");
            conn.run_pending_migrations(MIGRATIONS)
                .expect("Failed to run migrations");

            Arc::new(pool)
        })
        .clone()
}

/// Clean the queue table - use at the start of each test
pub fn clean_test_db() {
    let pool = get_test_db_pool();
    let mut conn = pool.get().expect("Failed to get DB connection");

    diesel::sql_query("TRUNCATE TABLE translation_queue RESTART IDENTITY CASCADE")
        .execute(&mut conn)
        .expect("Failed to clean translation_queue");
}

/// Global test mutex for serialization
static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Acquire test lock to ensure tests run serially
/// Returns a guard that releases the lock when dropped
pub fn acquire_test_lock() -> std::sync::MutexGuard<'static, ()> {
    // Handle poisoned mutex by recovering from panic
    match TEST_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
