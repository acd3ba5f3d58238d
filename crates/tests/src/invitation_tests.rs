use bson::oid::ObjectId;
use cosecha_db::models::{ActorType, audit_log::actions};
use cosecha_services::{identity::MailKind, store::AuditStore};
use serde_json::Value;

use crate::fixtures::seed::{expect_status, token_from_url};
use crate::fixtures::test_app::TestApp;

#[tokio::test]
async fn invite_sends_link_and_exposes_public_details() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;

    let resp = app
        .invite(&owner.access_token, &owner.tenant_id, "Campo@Finca.test", "campo")
        .await;
    let json = expect_status(resp, 201, "invite").await;
    assert_eq!(json["invitation"]["email"], "campo@finca.test");
    assert_eq!(json["invitation"]["state"], "pending");
    let invite_url = json["invite_url"].as_str().unwrap();
    assert!(invite_url.starts_with("http://localhost:3000/invitacion/usuario?token="));
    let token = token_from_url(invite_url);
    assert_eq!(token.len(), 64);

    let mail = app
        .identity
        .last_mail("campo@finca.test", MailKind::Invite)
        .expect("invite mail");
    assert_eq!(mail.redirect_url.as_deref(), Some(invite_url));
    assert_eq!(mail.data["role_code"], "campo");
    assert_eq!(mail.data["tenant_name"], "Finca finca-uno");
    assert_eq!(mail.data["invitation_token"], token.as_str());

    let resp = app
        .client
        .get(app.url(&format!("/api/auth/invitation/{token}")))
        .send()
        .await
        .unwrap();
    let info = expect_status(resp, 200, "invitation info").await;
    assert_eq!(info["email"], "campo@finca.test");
    assert_eq!(info["role"], "campo");
    assert_eq!(info["tenant_id"], owner.tenant_id.as_str());

    let resp = app
        .client
        .get(app.url(&format!("/api/auth/invitation/{}", "0".repeat(64))))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn invite_rejects_duplicates_owner_role_and_non_managers() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;

    app.seed_invitation(&owner, "campo@finca.test", "campo").await;
    let resp = app
        .invite(&owner.access_token, &owner.tenant_id, "CAMPO@finca.test", "empaque")
        .await;
    assert_eq!(resp.status().as_u16(), 409);

    let resp = app
        .invite(&owner.access_token, &owner.tenant_id, "jefe@finca.test", "owner")
        .await;
    assert_eq!(resp.status().as_u16(), 422);

    let resp = app
        .invite(&owner.access_token, &owner.tenant_id, "jefe@finca.test", "jefe")
        .await;
    assert_eq!(resp.status().as_u16(), 422);

    let worker = app.seed_member(&owner, "empaque@finca.test", "empaque").await;
    let resp = app
        .invite(&worker.access_token, &owner.tenant_id, "otro@finca.test", "campo")
        .await;
    assert_eq!(resp.status().as_u16(), 403);

    // An admin may invite
    let admin = app.seed_member(&owner, "admin@finca.test", "admin").await;
    let resp = app
        .invite(&admin.access_token, &owner.tenant_id, "otro@finca.test", "campo")
        .await;
    assert_eq!(resp.status().as_u16(), 201);
}

#[tokio::test]
async fn accept_creates_membership_and_is_idempotent() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;
    let invitation = app.seed_invitation(&owner, "campo@finca.test", "campo").await;
    let session = app.otp_session("campo@finca.test").await;

    let resp = app.accept(&invitation.token, &session).await;
    let first = expect_status(resp, 200, "accept").await;
    assert_eq!(first["tenant_id"], owner.tenant_id.as_str());
    assert_eq!(first["membership"]["role"], "campo");
    assert_eq!(first["membership"]["status"], "active");

    let resp = app.accept(&invitation.token, &session).await;
    let second = expect_status(resp, 200, "second accept").await;
    assert_eq!(second["membership"]["id"], first["membership"]["id"]);

    let limits = app.limits(&owner.tenant_id).await;
    assert_eq!(limits["users"]["current"], 1);

    // The link no longer resolves
    let resp = app
        .client
        .get(app.url(&format!("/api/auth/invitation/{}", invitation.token)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invitation_already_accepted");

    // The invitee now works in the tenant by default
    let me: Value = app
        .auth_get("/api/auth/me", &session)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["tenant_id"], owner.tenant_id.as_str());
    assert_eq!(me["role"], "campo");
    assert_eq!(me["profile"]["full_name"], "campo");
}

#[tokio::test]
async fn concurrent_accepts_charge_one_seat() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;
    let invitation = app.seed_invitation(&owner, "campo@finca.test", "campo").await;
    let session = app.otp_session("campo@finca.test").await;

    let (a, b) = tokio::join!(
        app.accept(&invitation.token, &session),
        app.accept(&invitation.token, &session),
    );
    let a = expect_status(a, 200, "accept a").await;
    let b = expect_status(b, 200, "accept b").await;
    assert_eq!(a["membership"]["id"], b["membership"]["id"]);

    let limits = app.limits(&owner.tenant_id).await;
    assert_eq!(limits["users"]["current"], 1);
}

#[tokio::test]
async fn accept_with_another_email_leaves_invitation_pending() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;
    let invitation = app.seed_invitation(&owner, "campo@finca.test", "campo").await;
    let intruder = app.otp_session("intruso@finca.test").await;

    let resp = app.accept(&invitation.token, &intruder).await;
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "email_mismatch");

    let resp = app
        .client
        .get(app.url(&format!("/api/auth/invitation/{}", invitation.token)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let limits = app.limits(&owner.tenant_id).await;
    assert_eq!(limits["users"]["current"], 0);
}

#[tokio::test]
async fn accept_requires_a_valid_session() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;
    let invitation = app.seed_invitation(&owner, "campo@finca.test", "campo").await;

    let resp = app.accept(&invitation.token, "forged").await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn revoked_invitations_cannot_be_accepted_or_revoked_again() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;
    let invitation = app.seed_invitation(&owner, "campo@finca.test", "campo").await;
    let path = format!("/api/auth/invitation/{}", invitation.id);

    let resp = app
        .auth_delete(&path, &owner.access_token)
        .send()
        .await
        .unwrap();
    let json = expect_status(resp, 200, "revoke").await;
    assert_eq!(json["state"], "revoked");
    assert!(json["revoked_at"].is_string());

    let session = app.otp_session("campo@finca.test").await;
    let resp = app.accept(&invitation.token, &session).await;
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invitation_revoked");

    let resp = app
        .auth_delete(&path, &owner.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    // Revoking frees the email for a fresh invitation
    let resp = app
        .invite(&owner.access_token, &owner.tenant_id, "campo@finca.test", "campo")
        .await;
    assert_eq!(resp.status().as_u16(), 201);
}

#[tokio::test]
async fn accepted_invitations_cannot_be_revoked() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;
    let invitation = app.seed_invitation(&owner, "campo@finca.test", "campo").await;
    let session = app.otp_session("campo@finca.test").await;
    let resp = app.accept(&invitation.token, &session).await;
    expect_status(resp, 200, "accept").await;

    let resp = app
        .auth_delete(
            &format!("/api/auth/invitation/{}", invitation.id),
            &owner.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    // Membership and seat are untouched
    let limits = app.limits(&owner.tenant_id).await;
    assert_eq!(limits["users"]["current"], 1);
}

#[tokio::test]
async fn revoke_requires_a_manager_of_the_tenant() {
    let app = TestApp::spawn().await;
    let acme = app.seed_owner("owner@acme.test", "acme").await;
    let beta = app.seed_owner("owner@beta.test", "beta").await;
    let invitation = app.seed_invitation(&acme, "campo@acme.test", "campo").await;

    let resp = app
        .auth_delete(
            &format!("/api/auth/invitation/{}", invitation.id),
            &beta.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_delete("/api/auth/invitation/not-an-id", &acme.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn invitations_expire_after_twenty_four_hours() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;
    let invitation = app.seed_invitation(&owner, "campo@finca.test", "campo").await;
    let lookup = || {
        app.client
            .get(app.url(&format!("/api/auth/invitation/{}", invitation.token)))
            .send()
    };

    app.clock
        .advance(chrono::Duration::hours(23) + chrono::Duration::minutes(59));
    assert_eq!(lookup().await.unwrap().status().as_u16(), 200);

    app.clock.advance(chrono::Duration::minutes(1) + chrono::Duration::seconds(1));
    let resp = lookup().await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invitation_expired");

    let session = app.otp_session("campo@finca.test").await;
    let resp = app.accept(&invitation.token, &session).await;
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invitation_expired");

    // An expired invitation does not block a new one
    let resp = app
        .invite(&owner.access_token, &owner.tenant_id, "campo@finca.test", "campo")
        .await;
    assert_eq!(resp.status().as_u16(), 201);

    // The replaced one keeps reporting expiry rather than revocation
    let json: Value = lookup().await.unwrap().json().await.unwrap();
    assert_eq!(json["error"], "invitation_expired");

    let path = format!("/api/auth/tenant/{}/invitations", owner.tenant_id);
    let resp = app.auth_get(&path, &owner.access_token).send().await.unwrap();
    let list = expect_status(resp, 200, "list invitations").await;
    let old = list
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["id"] == invitation.id.as_str())
        .expect("old invitation listed");
    assert_eq!(old["state"], "expired");
    assert!(old["revoked_at"].is_null());
    assert!(!old["superseded_at"].is_null());

    let tenant_id = ObjectId::parse_str(&owner.tenant_id).unwrap();
    let entries = app.store.list_by_tenant(tenant_id, 20).await.unwrap();
    let superseded = entries
        .iter()
        .find(|e| e.action == actions::INVITATION_SUPERSEDED)
        .expect("supersede audited");
    assert_eq!(superseded.actor_type, ActorType::System);
    assert_eq!(superseded.entity_id.map(|id| id.to_hex()), Some(invitation.id.clone()));
}

#[tokio::test]
async fn undelivered_invitation_is_discarded() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;

    app.identity.set_mail_failure(true);
    let resp = app
        .invite(&owner.access_token, &owner.tenant_id, "campo@finca.test", "campo")
        .await;
    assert_eq!(resp.status().as_u16(), 503);
    app.identity.set_mail_failure(false);

    let list: Vec<Value> = app
        .auth_get(
            &format!("/api/auth/tenant/{}/invitations", owner.tenant_id),
            &owner.access_token,
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.is_empty());

    let resp = app
        .invite(&owner.access_token, &owner.tenant_id, "campo@finca.test", "campo")
        .await;
    assert_eq!(resp.status().as_u16(), 201);
}

#[tokio::test]
async fn invitation_list_is_newest_first_with_states() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner("owner@finca.test", "finca-uno").await;

    let first = app.seed_invitation(&owner, "uno@finca.test", "campo").await;
    app.clock.advance(chrono::Duration::minutes(1));
    app.seed_invitation(&owner, "dos@finca.test", "finanzas").await;

    app.auth_delete(
        &format!("/api/auth/invitation/{}", first.id),
        &owner.access_token,
    )
    .send()
    .await
    .unwrap();

    let path = format!("/api/auth/tenant/{}/invitations", owner.tenant_id);
    let resp = app.auth_get(&path, &owner.access_token).send().await.unwrap();
    let list = expect_status(resp, 200, "list invitations").await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["email"], "dos@finca.test");
    assert_eq!(list[0]["state"], "pending");
    assert_eq!(list[1]["email"], "uno@finca.test");
    assert_eq!(list[1]["state"], "revoked");

    let worker = app.seed_member(&owner, "tres@finca.test", "campo").await;
    let resp = app.auth_get(&path, &worker.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}
