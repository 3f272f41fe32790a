use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tempfile::TempDir;

use campus_portal::config::Config;
use campus_portal::error::AppError;
use campus_portal::service::{Mailer, Services};
use campus_portal::storage::memory::MemoryBlobStore;

/// One test database, its services and the fakes behind them.
pub struct TestApp {
    pub db: Pool<Sqlite>,
    pub config: Arc<Config>,
    pub services: Services,
    pub blobs: Arc<MemoryBlobStore>,
    pub mailer: Arc<CapturingMailer>,
    pub department_id: i64,
    // Keeps a file-backed database alive for the lifetime of the app.
    _dir: Option<TempDir>,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub struct CapturingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl CapturingMailer {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// Token from the `token=` query parameter of the last mail sent to `to`.
    pub fn last_token_for(&self, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.to == to)
            .and_then(|m| {
                let start = m.body.find("token=")? + "token=".len();
                let token: String = m.body[start..]
                    .chars()
                    .take_while(|c| !c.is_whitespace())
                    .collect();
                Some(token)
            })
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// A single connection that never expires keeps the in-memory database alive.
pub async fn setup_test_database() -> Pool<Sqlite> {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");

    migrate(&db).await;
    db
}

async fn migrate(db: &Pool<Sqlite>) {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .expect("migrations");
}

/// A WAL database file behind a multi-connection pool, so concurrent requests really
/// race each other instead of queueing on one connection.
pub async fn setup_shared() -> TestApp {
    let dir = tempfile::tempdir().expect("temp dir");
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("portal.db"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));

    let db = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .expect("file database");
    migrate(&db).await;

    build(db, Config::for_tests(), Some(dir)).await
}

pub async fn seed_department(db: &Pool<Sqlite>) -> i64 {
    let faculty_id: i64 = sqlx::query_scalar(
        "INSERT INTO faculties (name, code) VALUES ('Engineering', 'ENG') RETURNING id",
    )
    .fetch_one(db)
    .await
    .unwrap();

    sqlx::query_scalar(
        "INSERT INTO departments (name, code, faculty_id) VALUES ('Computer Engineering', 'CENG', ?) RETURNING id",
    )
    .bind(faculty_id)
    .fetch_one(db)
    .await
    .unwrap()
}

pub async fn setup() -> TestApp {
    setup_with(Config::for_tests()).await
}

pub async fn setup_with(config: Config) -> TestApp {
    let db = setup_test_database().await;
    build(db, config, None).await
}

async fn build(db: Pool<Sqlite>, config: Config, dir: Option<TempDir>) -> TestApp {
    let department_id = seed_department(&db).await;
    let blobs = Arc::new(MemoryBlobStore::new());
    let mailer = Arc::new(CapturingMailer::default());
    let services = Services::new(db.clone(), &config, blobs.clone(), mailer.clone());

    TestApp {
        db,
        config: Arc::new(config),
        services,
        blobs,
        mailer,
        department_id,
        _dir: dir,
    }
}
