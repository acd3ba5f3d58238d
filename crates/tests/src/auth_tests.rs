use crate::fixtures::seed::{PASSWORD, expect_status};
use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn owner_onboarding_creates_tenant_and_password() {
    let app = TestApp::spawn().await;

    let owner = app.seed_owner("dueno@finca.test", "la-esperanza").await;
    assert_eq!(owner.tenant_slug, "la-esperanza");

    // The OTP mail carried the onboarding marker
    let mail = app
        .identity
        .last_mail("dueno@finca.test", cosecha_services::identity::MailKind::Otp)
        .unwrap();
    assert_eq!(mail.data["signup_type"], "tenant_registration");

    // Password set during registration works for login
    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({
            "email": "dueno@finca.test",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let cookie = resp
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("access_token="));
    assert!(cookie.contains("HttpOnly"));

    let json: Value = resp.json().await.unwrap();
    assert!(json["access_token"].is_string());
    assert_eq!(json["user"]["email"], "dueno@finca.test");
    assert_eq!(json["user"]["tenant_id"], owner.tenant_id.as_str());
    assert_eq!(json["user"]["role"], "owner");
    assert_eq!(json["user"]["profile"]["full_name"], "Owner");
}

#[tokio::test]
async fn verify_otp_rejects_wrong_code() {
    let app = TestApp::spawn().await;

    app.client
        .post(app.url("/api/auth/send-otp"))
        .json(&serde_json::json!({ "email": "nuevo@finca.test" }))
        .send()
        .await
        .unwrap();

    let resp = app
        .client
        .post(app.url("/api/auth/verify-otp"))
        .json(&serde_json::json!({ "email": "nuevo@finca.test", "code": "abcdef" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    // The real code is still usable once
    let code = app.otp_code("nuevo@finca.test");
    let verify = |code: String| {
        app.client
            .post(app.url("/api/auth/verify-otp"))
            .json(&serde_json::json!({ "email": "nuevo@finca.test", "code": code }))
            .send()
    };
    assert_eq!(verify(code.clone()).await.unwrap().status().as_u16(), 200);
    assert_eq!(verify(code).await.unwrap().status().as_u16(), 422);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = TestApp::spawn().await;
    app.seed_owner("owner@finca.test", "finca-uno").await;

    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({
            "email": "owner@finca.test",
            "password": "not-the-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn me_requires_a_valid_token() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url("/api/auth/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app.auth_get("/api/auth/me", "garbage").send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn me_lists_memberships_across_tenants() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-norte").await;

    let resp = app
        .auth_post("/api/tenant/create", &owner.access_token)
        .json(&TestApp::tenant_body("Finca Sur", "finca-sur"))
        .send()
        .await
        .unwrap();
    let created = expect_status(resp, 201, "create tenant").await;

    let me: Value = app
        .auth_get("/api/auth/me", &owner.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["tenants"].as_array().unwrap().len(), 2);
    // The most recently provisioned tenant becomes the default
    assert_eq!(me["tenant_id"], created["tenant"]["id"]);
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;

    let resp = app
        .auth_post("/api/auth/logout", &owner.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let cookie = resp
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.contains("Max-Age=0"));

    let resp = app
        .auth_get("/api/auth/me", &owner.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn validate_token_reports_instead_of_failing() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;

    let resp = app
        .client
        .post(app.url("/api/auth/validate-token"))
        .json(&serde_json::json!({ "token": "not-a-jwt" }))
        .send()
        .await
        .unwrap();
    let json = expect_status(resp, 200, "validate-token").await;
    assert_eq!(json["valid"], false);
    assert!(json["user"].is_null());

    let resp = app
        .client
        .post(app.url("/api/auth/validate-token"))
        .json(&serde_json::json!({ "token": owner.access_token }))
        .send()
        .await
        .unwrap();
    let json = expect_status(resp, 200, "validate-token").await;
    assert_eq!(json["valid"], true);
    assert_eq!(json["user"]["id"], owner.user_id.as_str());
}

#[tokio::test]
async fn set_password_enforces_length_and_updates_login() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;

    let resp = app
        .auth_post("/api/auth/set-password", &owner.access_token)
        .json(&serde_json::json!({ "password": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    let resp = app
        .auth_post("/api/auth/set-password", &owner.access_token)
        .json(&serde_json::json!({ "password": "Another-Secret-9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let login = |password: &'static str| {
        app.client
            .post(app.url("/api/auth/login"))
            .json(&serde_json::json!({ "email": "owner@finca.test", "password": password }))
            .send()
    };
    assert_eq!(login(PASSWORD).await.unwrap().status().as_u16(), 401);
    assert_eq!(
        login("Another-Secret-9").await.unwrap().status().as_u16(),
        200
    );
}

#[tokio::test]
async fn health_check_responds() {
    let app = TestApp::spawn().await;

    let json: Value = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["status"], "ok");
}
