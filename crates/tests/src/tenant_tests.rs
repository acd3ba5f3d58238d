use crate::fixtures::seed::{PASSWORD, expect_status};
use crate::fixtures::test_app::TestApp;
use serde_json::Value;

fn module_codes(json: &Value) -> Vec<String> {
    let mut codes: Vec<String> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["module_code"].as_str().unwrap().to_string())
        .collect();
    codes.sort();
    codes
}

#[tokio::test]
async fn check_slug_normalizes_and_tracks_availability() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url("/api/tenant/check-slug"))
        .query(&[("slug", "  Acme Farms! ")])
        .send()
        .await
        .unwrap();
    let json = expect_status(resp, 200, "check-slug").await;
    assert_eq!(json["slug"], "acme-farms");
    assert_eq!(json["available"], true);

    app.seed_owner("owner@acme.test", "Acme Farms").await;

    let resp = app
        .client
        .get(app.url("/api/tenant/check-slug"))
        .query(&[("slug", "acme-farms")])
        .send()
        .await
        .unwrap();
    let json = expect_status(resp, 200, "check-slug").await;
    assert_eq!(json["available"], false);
}

#[tokio::test]
async fn registration_stores_the_normalized_slug_once() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@acme.test", "Acme Farms").await;
    assert_eq!(owner.tenant_slug, "acme-farms");

    // Same slug after normalization is rejected for a second owner
    let token = app.otp_session("other@acme.test").await;
    let resp = app
        .client
        .post(app.url("/api/auth/register-tenant"))
        .json(&serde_json::json!({
            "access_token": token,
            "tenant": TestApp::tenant_body("Otra", "ACME farms"),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    let resp = app
        .client
        .get(app.url("/api/tenant/by-slug/acme-farms"))
        .send()
        .await
        .unwrap();
    let json = expect_status(resp, 200, "by-slug").await;
    assert_eq!(json["id"], owner.tenant_id.as_str());
    // Public view exposes no quota data
    assert!(json.get("max_users").is_none());
}

#[tokio::test]
async fn new_tenant_gets_plan_limits_and_owner_takes_no_seat() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;

    let tenant: Value = app
        .auth_get(
            &format!("/api/tenant/{}", owner.tenant_id),
            &owner.access_token,
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tenant["plan"], "basico");
    assert_eq!(tenant["max_users"], 10);
    assert_eq!(tenant["max_fields"], 5);
    assert_eq!(tenant["current_users"], 0);
    assert_eq!(tenant["current_fields"], 0);

    let membership: Value = app
        .auth_get(
            &format!("/api/tenant/{}/membership", owner.tenant_id),
            &owner.access_token,
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(membership["role"], "owner");
    assert_eq!(membership["status"], "active");
}

#[tokio::test]
async fn create_with_admin_provisions_account_and_tenant() {
    let app = TestApp::spawn().await;

    let mut body = serde_json::json!({
        "tenant": TestApp::tenant_body("Empacadora", "empacadora"),
        "admin_email": "Admin@Empacadora.test",
        "admin_password": PASSWORD,
        "admin_full_name": "Admin",
    });
    let resp = app
        .client
        .post(app.url("/api/tenant/create-with-admin"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let json = expect_status(resp, 201, "create-with-admin").await;
    assert_eq!(json["membership"]["role"], "owner");
    assert_eq!(json["membership"]["user_id"], json["user_id"]);

    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({
            "email": "admin@empacadora.test",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    let login = expect_status(resp, 200, "admin login").await;
    assert_eq!(login["user"]["role"], "owner");

    // Same admin email for another tenant: no tenant is left behind
    body["tenant"] = TestApp::tenant_body("Segunda", "segunda");
    let resp = app
        .client
        .post(app.url("/api/tenant/create-with-admin"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    let resp = app
        .client
        .get(app.url("/api/tenant/by-slug/segunda"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn tenant_reads_are_limited_to_members() {
    let app = TestApp::spawn().await;
    let acme = app.seed_owner("owner@acme.test", "acme").await;
    let beta = app.seed_owner("owner@beta.test", "beta").await;

    let resp = app
        .auth_get(&format!("/api/tenant/{}", acme.tenant_id), &beta.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_get(
            &format!("/api/tenant/{}/modules", acme.tenant_id),
            &beta.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let membership: Value = app
        .auth_get(
            &format!("/api/tenant/{}/membership", acme.tenant_id),
            &beta.access_token,
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(membership.is_null());

    let resp = app
        .auth_get("/api/tenant/not-an-id", &beta.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let tenants: Vec<Value> = app
        .auth_get("/api/tenant/user-tenants", &beta.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tenants.len(), 1);
    assert_eq!(tenants[0]["tenant"]["slug"], "beta");
}

#[tokio::test]
async fn update_tenant_changes_plan_and_requires_manager() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;
    let worker = app.seed_member(&owner, "campo@finca.test", "campo").await;
    let path = format!("/api/tenant/{}", owner.tenant_id);

    let resp = app
        .auth_put(&path, &owner.access_token)
        .json(&serde_json::json!({ "plan": "profesional", "name": "Finca Grande" }))
        .send()
        .await
        .unwrap();
    let json = expect_status(resp, 200, "update tenant").await;
    assert_eq!(json["plan"], "profesional");
    assert_eq!(json["name"], "Finca Grande");
    assert_eq!(json["max_users"], 30);
    assert_eq!(json["max_fields"], 20);
    assert_eq!(json["current_users"], 1);

    let resp = app
        .auth_put(&path, &owner.access_token)
        .json(&serde_json::json!({ "plan": "platino" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    let resp = app
        .auth_put(&path, &worker.access_token)
        .json(&serde_json::json!({ "name": "Mia" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn modules_default_and_toggle() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;
    let path = format!("/api/tenant/{}/modules", owner.tenant_id);

    let modules: Value = app
        .auth_get(&path, &owner.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(module_codes(&modules), vec!["dashboard", "usuarios"]);

    let resp = app
        .auth_post(&path, &owner.access_token)
        .json(&serde_json::json!({ "module_code": "dashboard", "enabled": false }))
        .send()
        .await
        .unwrap();
    let modules = expect_status(resp, 200, "set module").await;
    assert_eq!(module_codes(&modules), vec!["usuarios"]);

    let resp = app
        .auth_post(&format!("{path}/bulk"), &owner.access_token)
        .json(&serde_json::json!({ "module_codes": ["campo", "empaque", "dashboard"] }))
        .send()
        .await
        .unwrap();
    let modules = expect_status(resp, 200, "bulk modules").await;
    assert_eq!(
        module_codes(&modules),
        vec!["campo", "dashboard", "empaque", "usuarios"]
    );

    let resp = app
        .auth_post(&path, &owner.access_token)
        .json(&serde_json::json!({ "module_code": "cosecha", "enabled": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn default_tenant_requires_membership() {
    let app = TestApp::spawn().await;
    let acme = app.seed_owner("owner@acme.test", "acme").await;
    let beta = app.seed_owner("owner@beta.test", "beta").await;

    let resp = app
        .auth_post("/api/tenant/set-default", &beta.access_token)
        .json(&serde_json::json!({ "tenant_id": acme.tenant_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_post("/api/tenant/clear-default", &beta.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let me: Value = app
        .auth_get("/api/auth/me", &beta.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(me["profile"]["default_tenant_id"].is_null());
    // Falls back to the first membership
    assert_eq!(me["tenant_id"], beta.tenant_id.as_str());

    let resp = app
        .auth_post("/api/tenant/set-default", &beta.access_token)
        .json(&serde_json::json!({ "tenant_id": beta.tenant_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn removing_a_member_releases_the_seat() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;
    let worker = app.seed_member(&owner, "campo@finca.test", "campo").await;

    let limits = app.limits(&owner.tenant_id).await;
    assert_eq!(limits["users"]["current"], 1);

    // A plain member cannot remove anyone
    let resp = app
        .auth_delete(
            &format!("/api/tenant/{}/member/{}", owner.tenant_id, owner.user_id),
            &worker.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // The owner cannot be removed
    let resp = app
        .auth_delete(
            &format!("/api/tenant/{}/member/{}", owner.tenant_id, owner.user_id),
            &owner.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_delete(
            &format!("/api/tenant/{}/member/{}", owner.tenant_id, worker.user_id),
            &owner.access_token,
        )
        .send()
        .await
        .unwrap();
    let json = expect_status(resp, 200, "remove member").await;
    assert_eq!(json["status"], "inactive");

    let limits = app.limits(&owner.tenant_id).await;
    assert_eq!(limits["users"]["current"], 0);
    assert_eq!(limits["users"]["available"], 10);

    // The removed worker lost access
    let resp = app
        .auth_get(
            &format!("/api/tenant/{}", owner.tenant_id),
            &worker.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_delete(
            &format!("/api/tenant/{}/member/{}", owner.tenant_id, worker.user_id),
            &owner.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn quota_checks_are_visible_to_members() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;

    for path in ["can-add-user", "can-add-field"] {
        let json: Value = app
            .auth_get(
                &format!("/api/tenant/{}/{path}", owner.tenant_id),
                &owner.access_token,
            )
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(json["allowed"], true, "{path}");
    }

    let limits: Value = app
        .auth_get(
            &format!("/api/tenant/{}/limits", owner.tenant_id),
            &owner.access_token,
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(limits["plan"], "basico");
    assert_eq!(limits["fields"]["max"], 5);
    assert_eq!(limits, app.limits(&owner.tenant_id).await);
}
