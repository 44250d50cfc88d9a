use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::{anyhow, bail, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use cvlink::ai::{CvAnalyzer, InteractiveAnalysis, QualityAnalysis};
use cvlink::auth::jwt::JwtService;
use cvlink::config::AppConfig;
use cvlink::db::{self, PgPool};
use cvlink::extract::{derive_hints, DocumentExtractor, ExtractedCv};
use cvlink::models::NewUser;
use cvlink::routes;
use cvlink::state::AppState;
use cvlink::storage::ObjectStorage;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tower::util::ServiceExt;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        _content_disposition: Option<String>,
    ) -> Result<()> {
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> Result<String> {
        let guard = self.objects.lock().await;
        ensure!(guard.contains_key(key), "object {key} missing");
        Ok(format!(
            "https://fake-storage/{key}?expires_in={}",
            expires_in.as_secs()
        ))
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let guard = self.objects.lock().await;
        guard
            .get(key)
            .map(|obj| obj.bytes.clone())
            .ok_or_else(|| anyhow!("object {key} missing"))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut guard = self.objects.lock().await;
        guard.remove(key);
        Ok(())
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }
}

/// Scripted analyzer. Tests set the next quality/interactive results and can
/// flip individual calls into failures.
pub struct FakeAnalyzer {
    quality: StdMutex<QualityAnalysis>,
    interactive: StdMutex<InteractiveAnalysis>,
    skills: StdMutex<Vec<String>>,
    fail_quality: AtomicBool,
    fail_interactive: AtomicBool,
    fail_skills: AtomicBool,
}

impl Default for FakeAnalyzer {
    fn default() -> Self {
        Self {
            quality: StdMutex::new(QualityAnalysis {
                quality_score: 0.7,
                overall_feedback: "Looks reasonable".to_string(),
                recommendations: "Quantify achievements".to_string(),
                is_approved: true,
                ..Default::default()
            }),
            interactive: StdMutex::new(InteractiveAnalysis {
                overall_score: 0.7,
                is_approved: true,
                next_steps: "Keep iterating".to_string(),
                ..Default::default()
            }),
            skills: StdMutex::new(vec!["Rust".to_string(), "PostgreSQL".to_string()]),
            fail_quality: AtomicBool::new(false),
            fail_interactive: AtomicBool::new(false),
            fail_skills: AtomicBool::new(false),
        }
    }
}

#[allow(dead_code)]
impl FakeAnalyzer {
    pub fn set_quality(&self, quality: QualityAnalysis) {
        *self.quality.lock().expect("quality lock") = quality;
    }

    pub fn set_interactive(&self, interactive: InteractiveAnalysis) {
        *self.interactive.lock().expect("interactive lock") = interactive;
    }

    pub fn set_skills(&self, skills: Vec<String>) {
        *self.skills.lock().expect("skills lock") = skills;
    }

    pub fn fail_quality(&self, fail: bool) {
        self.fail_quality.store(fail, Ordering::SeqCst);
    }

    pub fn fail_interactive(&self, fail: bool) {
        self.fail_interactive.store(fail, Ordering::SeqCst);
    }

    pub fn fail_skills(&self, fail: bool) {
        self.fail_skills.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CvAnalyzer for FakeAnalyzer {
    async fn analyze_quality(&self, _cv_text: &str) -> Result<QualityAnalysis> {
        if self.fail_quality.load(Ordering::SeqCst) {
            bail!("scripted quality failure");
        }
        Ok(self.quality.lock().expect("quality lock").clone())
    }

    async fn analyze_interactive(
        &self,
        _cv_text: &str,
        _previous_text: Option<&str>,
    ) -> Result<InteractiveAnalysis> {
        if self.fail_interactive.load(Ordering::SeqCst) {
            bail!("scripted interactive failure");
        }
        Ok(self.interactive.lock().expect("interactive lock").clone())
    }

    async fn extract_skills(&self, _cv_text: &str) -> Result<Vec<String>> {
        if self.fail_skills.load(Ordering::SeqCst) {
            bail!("scripted skill extraction failure");
        }
        Ok(self.skills.lock().expect("skills lock").clone())
    }
}

/// Treats the uploaded bytes as UTF-8 text so tests can exercise the pipeline
/// without real PDFs.
#[derive(Default)]
pub struct FakeExtractor {
    fail: AtomicBool,
}

#[allow(dead_code)]
impl FakeExtractor {
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentExtractor for FakeExtractor {
    async fn extract(&self, bytes: Vec<u8>, _content_type: Option<&str>) -> Result<ExtractedCv> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("scripted extraction failure");
        }
        let text = String::from_utf8(bytes).context("test upload was not UTF-8")?;
        if text.trim().is_empty() {
            bail!("no text could be extracted from document");
        }
        Ok(derive_hints(text))
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
    analyzer: Arc<FakeAnalyzer>,
    extractor: Arc<FakeExtractor>,
}

impl TestApp {
    /// Returns `None` when TEST_DATABASE_URL is unset so suites can skip
    /// instead of failing on machines without Postgres.
    pub async fn try_new() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return Ok(None);
        };

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "test-bucket".to_string(),
            openai_endpoint: None,
            openai_api_key: None,
            openai_model: "test-model".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let analyzer = Arc::new(FakeAnalyzer::default());
        let extractor = Arc::new(FakeExtractor::default());

        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let analyzer_for_state: Arc<dyn CvAnalyzer> = analyzer.clone();
        let extractor_for_state: Arc<dyn DocumentExtractor> = extractor.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(
            pool.clone(),
            config,
            storage_for_state,
            extractor_for_state,
            analyzer_for_state,
            jwt,
        );
        let router = routes::create_router(state.clone());

        Ok(Some(Self {
            state,
            router,
            storage,
            analyzer,
            extractor,
        }))
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    #[allow(dead_code)]
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    #[allow(dead_code)]
    pub fn analyzer(&self) -> Arc<FakeAnalyzer> {
        self.analyzer.clone()
    }

    #[allow(dead_code)]
    pub fn extractor(&self) -> Arc<FakeExtractor> {
        self.extractor.clone()
    }

    pub async fn insert_user(
        &self,
        username: &str,
        password: &str,
        role: &str,
        full_name: &str,
    ) -> Result<Uuid> {
        let username = username.to_string();
        let password = password.to_string();
        let role = role.to_string();
        let full_name = full_name.to_string();
        self.with_conn(move |conn| {
            let password_hash = cvlink::auth::password::hash_password(&password)?;
            let user = NewUser {
                id: Uuid::new_v4(),
                username,
                password_hash,
                role,
                full_name,
            };
            diesel::insert_into(cvlink::schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    pub async fn login_token(&self, username: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json(
                "/api/auth/login",
                &LoginPayload { username, password },
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        #[derive(serde::Deserialize)]
        struct TokenBody {
            access_token: String,
        }
        let parsed: TokenBody = serde_json::from_slice(&body)?;
        Ok(parsed.access_token)
    }

    pub async fn upload_cv(
        &self,
        filename: &str,
        content_type: &str,
        data: &[u8],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend(data);
        body.extend(b"\r\n");
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/cvs")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    /// Polls until the CV reaches a terminal extraction state. The upload
    /// handler runs the pipeline on a background task, so tests wait here
    /// before asserting on feedback rows.
    pub async fn wait_for_processing(&self, cv_id: Uuid) -> Result<String> {
        for _ in 0..200 {
            let status = self
                .with_conn(move |conn| {
                    use cvlink::schema::cv_extractions::dsl;
                    let status = dsl::cv_extractions
                        .filter(dsl::cv_id.eq(cv_id))
                        .filter(dsl::status.eq_any(["completed", "failed"]))
                        .order(dsl::created_at.desc())
                        .select(dsl::status)
                        .first::<String>(conn)
                        .optional()
                        .context("failed to poll extraction status")?;
                    Ok(status)
                })
                .await?;
            if let Some(status) = status {
                return Ok(status);
            }
            sleep(Duration::from_millis(25)).await;
        }
        bail!("CV {cv_id} never reached a terminal extraction state")
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(Method::PUT)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_empty(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::POST).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::DELETE).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE jobs, job_applications, job_posts, cv_progress, cv_interactive_feedback, \
         cv_feedback, cv_extractions, cvs, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
