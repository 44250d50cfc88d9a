mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
struct JobPostInfo {
    id: Uuid,
    title: String,
    is_active: bool,
}

#[derive(Deserialize)]
struct ApplicationInfo {
    id: Uuid,
    job_post_id: Uuid,
    cv_id: Option<Uuid>,
    status: String,
}

#[derive(Deserialize)]
struct CvInfo {
    id: Uuid,
}

async fn setup_users(app: &TestApp) -> Result<(String, String)> {
    app.insert_user("recruiter", "password123", "recruiter", "Rex Cruter")
        .await?;
    app.insert_user("student", "password123", "student", "Jane Doe")
        .await?;
    let recruiter = app.login_token("recruiter", "password123").await?;
    let student = app.login_token("student", "password123").await?;
    Ok((recruiter, student))
}

async fn create_post(app: &TestApp, token: &str) -> Result<JobPostInfo> {
    let response = app
        .post_json(
            "/api/jobs",
            &json!({
                "title": "Junior Backend Engineer",
                "description": "Build APIs with us.",
                "required_skills": "Rust, SQL",
                "location": "Amsterdam",
                "job_type": "full-time"
            }),
            Some(token),
        )
        .await?;
    anyhow::ensure!(
        response.status() == StatusCode::CREATED,
        "job post creation failed with status {}",
        response.status()
    );
    Ok(serde_json::from_slice(
        &body_to_vec(response.into_body()).await?,
    )?)
}

#[tokio::test]
async fn only_recruiters_create_posts() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };
    let (recruiter, student) = setup_users(&app).await?;

    let response = app
        .post_json(
            "/api/jobs",
            &json!({ "title": "Nope", "description": "Students cannot post." }),
            Some(&student),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let post = create_post(&app, &recruiter).await?;
    assert_eq!(post.title, "Junior Backend Engineer");
    assert!(post.is_active);

    let response = app.get("/api/jobs", Some(&student)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let posts: Vec<JobPostInfo> =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id, post.id);

    app.cleanup().await
}

#[tokio::test]
async fn applications_snapshot_the_active_cv() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };
    let (recruiter, student) = setup_users(&app).await?;
    let post = create_post(&app, &recruiter).await?;

    let response = app
        .upload_cv(
            "cv.pdf",
            "application/pdf",
            b"Jane Doe\njane@example.com\n\nSkills\nRust\n",
            &student,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cv: CvInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    app.wait_for_processing(cv.id).await?;

    let response = app
        .post_empty(&format!("/api/jobs/{}/apply", post.id), Some(&student))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let application: ApplicationInfo =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(application.job_post_id, post.id);
    assert_eq!(application.cv_id, Some(cv.id));
    assert_eq!(application.status, "submitted");

    // One application per student per posting.
    let response = app
        .post_empty(&format!("/api/jobs/{}/apply", post.id), Some(&student))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    app.cleanup().await
}

#[tokio::test]
async fn only_the_owning_recruiter_lists_applications() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };
    let (recruiter, student) = setup_users(&app).await?;
    let post = create_post(&app, &recruiter).await?;

    let response = app
        .post_empty(&format!("/api/jobs/{}/apply", post.id), Some(&student))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .get(&format!("/api/jobs/{}/applications", post.id), Some(&student))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.insert_user("rival", "password123", "recruiter", "Riva L")
        .await?;
    let rival = app.login_token("rival", "password123").await?;
    let response = app
        .get(&format!("/api/jobs/{}/applications", post.id), Some(&rival))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .get(
            &format!("/api/jobs/{}/applications", post.id),
            Some(&recruiter),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let applications: Vec<ApplicationInfo> =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(applications.len(), 1);
    assert!(applications[0].id != Uuid::nil());

    app.cleanup().await
}

#[tokio::test]
async fn owning_recruiter_updates_and_deactivates_posts() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };
    let (recruiter, student) = setup_users(&app).await?;
    let post = create_post(&app, &recruiter).await?;

    let response = app
        .put_json(
            &format!("/api/jobs/{}", post.id),
            &json!({ "title": "Hacked" }),
            Some(&student),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .put_json(
            &format!("/api/jobs/{}", post.id),
            &json!({ "title": "Medior Backend Engineer", "location": "Rotterdam" }),
            Some(&recruiter),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: JobPostInfo =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(updated.title, "Medior Backend Engineer");
    assert!(updated.is_active);

    let response = app
        .put_json(
            &format!("/api/jobs/{}", post.id),
            &json!({ "title": "   " }),
            Some(&recruiter),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .delete(&format!("/api/jobs/{}", post.id), Some(&recruiter))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Deactivated postings drop out of the listing and stop taking
    // applications.
    let response = app.get("/api/jobs", Some(&student)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let posts: Vec<JobPostInfo> =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert!(posts.is_empty());

    let response = app
        .post_empty(&format!("/api/jobs/{}/apply", post.id), Some(&student))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await
}

#[tokio::test]
async fn application_status_moves_through_the_review_workflow() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };
    let (recruiter, student) = setup_users(&app).await?;
    let post = create_post(&app, &recruiter).await?;

    let response = app
        .post_empty(&format!("/api/jobs/{}/apply", post.id), Some(&student))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let application: ApplicationInfo =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    let status_path = format!(
        "/api/jobs/{}/applications/{}/status",
        post.id, application.id
    );

    let response = app
        .put_json(&status_path, &json!({ "status": "reviewed" }), Some(&student))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .put_json(&status_path, &json!({ "status": "ghosted" }), Some(&recruiter))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .put_json(&status_path, &json!({ "status": "reviewed" }), Some(&recruiter))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: ApplicationInfo =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(updated.status, "reviewed");

    let response = app
        .put_json(&status_path, &json!({ "status": "Accepted" }), Some(&recruiter))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: ApplicationInfo =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(updated.status, "accepted");

    // The student sees the new status in their own applications view.
    let response = app.get("/api/jobs/applications/me", Some(&student)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let mine: Vec<ApplicationInfo> =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, application.id);
    assert_eq!(mine[0].status, "accepted");

    app.cleanup().await
}

#[tokio::test]
async fn applying_without_a_cv_still_succeeds() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let Some(app) = TestApp::try_new().await? else {
        return Ok(());
    };
    let (recruiter, student) = setup_users(&app).await?;
    let post = create_post(&app, &recruiter).await?;

    let response = app
        .post_empty(&format!("/api/jobs/{}/apply", post.id), Some(&student))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let application: ApplicationInfo =
        serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(application.cv_id, None);

    app.cleanup().await
}
