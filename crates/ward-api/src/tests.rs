//! Router tests against an in-memory store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Method, Request, StatusCode, header},
  response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt as _;
use ward_auth::{AuthState, TokenCodec};
use ward_core::{
  persona::Persona,
  role::Role,
  store::{CredentialStore as _, RoleStore as _},
  subject::{NewSubject, SubjectId},
  token::TokenKind,
};
use ward_store_sqlite::SqliteStore;

use crate::api_router;

struct Harness {
  store: SqliteStore,
  codec: Arc<TokenCodec>,
  app:   Router,
}

impl Harness {
  async fn new() -> Self {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let auth = AuthState::new(Arc::new(store.clone()), TokenCodec::with_secret(b"api-tests"));
    let codec = auth.codec.clone();
    let app = api_router(auth).unwrap();
    Self { store, codec, app }
  }

  async fn subject(&self, email: &str, f: impl FnOnce(&mut NewSubject)) -> SubjectId {
    let mut input = NewSubject {
      email: email.into(),
      password_hash: "unused".into(),
      email_verified: true,
      ..Default::default()
    };
    f(&mut input);
    self.store.add_subject(input).await.unwrap().id
  }

  fn token(&self, id: SubjectId, persona: Persona) -> String {
    self.codec.issue(id, persona, TokenKind::Access).unwrap()
  }

  async fn call(&self, method: Method, uri: &str, token: &str, body: Option<Value>) -> Response {
    let mut builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::AUTHORIZATION, format!("Bearer {token}"));
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
  }
}

async fn json_body(res: Response) -> Value {
  let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

// ─── Guarding ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_token_is_401() {
  let h = Harness::new().await;
  let res = h
    .app
    .clone()
    .oneshot(Request::get("/roles/1").body(Body::empty()).unwrap())
    .await
    .unwrap();
  assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_numeric_user_id_is_400() {
  let h = Harness::new().await;
  let id = h.subject("c@example.com", |s| s.is_client = true).await;
  let res = h
    .call(Method::GET, "/care-team/abc", &h.token(id, Persona::Client), None)
    .await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

// ─── Care team ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn care_team_flow() {
  let h = Harness::new().await;
  let granter = h.subject("granter@example.com", |s| s.is_client = true).await;
  let delegate = h.subject("delegate@example.com", |s| s.is_client = true).await;
  let granter_token = h.token(granter, Persona::Client);
  let delegate_token = h.token(delegate, Persona::Client);

  // Invite by email.
  let res = h
    .call(
      Method::POST,
      &format!("/care-team/{granter}"),
      &granter_token,
      Some(json!({
        "delegate_email": "Delegate@Example.com",
        "resources": ["medications", "blood_pressure"],
      })),
    )
    .await;
  assert_eq!(res.status(), StatusCode::CREATED);
  let grants = json_body(res).await;
  assert_eq!(grants.as_array().unwrap().len(), 2);
  assert!(grants.as_array().unwrap().iter().all(|g| g["status"] == "pending"));

  // Pending grants give nothing.
  let uri = format!("/care-team/{granter}/resources");
  assert_eq!(
    h.call(Method::GET, &uri, &delegate_token, None).await.status(),
    StatusCode::UNAUTHORIZED
  );

  // The granter cannot accept on the delegate's behalf.
  let meds = grants
    .as_array()
    .unwrap()
    .iter()
    .find(|g| g["resource"] == "medications")
    .unwrap()["grant_id"]
    .as_str()
    .unwrap()
    .to_owned();
  let accept = format!("/care-team/grants/{meds}/accept");
  assert_eq!(
    h.call(Method::POST, &accept, &granter_token, None).await.status(),
    StatusCode::UNAUTHORIZED
  );

  let res = h.call(Method::POST, &accept, &delegate_token, None).await;
  assert_eq!(res.status(), StatusCode::OK);
  assert_eq!(json_body(res).await["status"], "accepted");

  let res = h.call(Method::GET, &uri, &delegate_token, None).await;
  assert_eq!(res.status(), StatusCode::OK);
  assert_eq!(json_body(res).await["resources"], json!(["medications"]));

  // Member-of listing shows both grants to the delegate.
  let res = h
    .call(Method::GET, &format!("/care-team/member-of/{delegate}"), &delegate_token, None)
    .await;
  assert_eq!(json_body(res).await.as_array().unwrap().len(), 2);

  // Either party may revoke.
  let res = h
    .call(Method::DELETE, &format!("/care-team/grants/{meds}"), &granter_token, None)
    .await;
  assert_eq!(res.status(), StatusCode::NO_CONTENT);
  assert_eq!(
    h.call(Method::GET, &uri, &delegate_token, None).await.status(),
    StatusCode::UNAUTHORIZED
  );
}

#[tokio::test]
async fn clients_cannot_invite_for_others() {
  let h = Harness::new().await;
  let a = h.subject("a@example.com", |s| s.is_client = true).await;
  let b = h.subject("b@example.com", |s| s.is_client = true).await;

  let res = h
    .call(
      Method::POST,
      &format!("/care-team/{b}"),
      &h.token(a, Persona::Client),
      Some(json!({ "delegate_id": a, "resources": ["medications"] })),
    )
    .await;
  assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

// ─── Roles ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn role_assignment_respects_persona_kind() {
  let h = Harness::new().await;
  let admin = h.subject("admin@example.com", |s| s.is_staff = true).await;
  h.store.assign_role(admin, Role::StaffAdmin).await.unwrap();
  let provider = h.subject("doc@example.com", |s| s.is_provider = true).await;
  let token = h.token(admin, Persona::Staff);
  let uri = format!("/roles/{provider}");

  let res = h.call(Method::POST, &uri, &token, Some(json!({ "role": "medical_doctor" }))).await;
  assert_eq!(res.status(), StatusCode::CREATED);
  assert_eq!(json_body(res).await, json!(["medical_doctor"]));

  // A staff role cannot go to a provider.
  let res = h.call(Method::POST, &uri, &token, Some(json!({ "role": "data_scientist" }))).await;
  assert_eq!(res.status(), StatusCode::BAD_REQUEST);

  // Staff admins cannot mint other admins.
  let res = h
    .call(Method::POST, &format!("/roles/{admin}"), &token, Some(json!({ "role": "system_admin" })))
    .await;
  assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

  let res = h
    .call(Method::DELETE, &format!("/roles/{provider}/medical_doctor"), &token, None)
    .await;
  assert_eq!(res.status(), StatusCode::NO_CONTENT);
  assert!(h.store.roles_for(provider).await.unwrap().is_empty());
}

#[tokio::test]
async fn staff_can_read_own_roles_without_admin_role() {
  let h = Harness::new().await;
  let me = h.subject("me@example.com", |s| s.is_staff = true).await;
  let other = h.subject("other@example.com", |s| s.is_staff = true).await;
  let token = h.token(me, Persona::Staff);

  assert_eq!(
    h.call(Method::GET, &format!("/roles/{me}"), &token, None).await.status(),
    StatusCode::OK
  );
  assert_eq!(
    h.call(Method::GET, &format!("/roles/{other}"), &token, None).await.status(),
    StatusCode::UNAUTHORIZED
  );
}

// ─── Blocks & deletion ───────────────────────────────────────────────────────

#[tokio::test]
async fn blocked_client_is_refused_with_reason() {
  let h = Harness::new().await;
  let support = h.subject("support@example.com", |s| s.is_staff = true).await;
  h.store.assign_role(support, Role::ClientServices).await.unwrap();
  let client = h.subject("c@example.com", |s| s.is_client = true).await;
  let client_token = h.token(client, Persona::Client);

  let res = h
    .call(
      Method::POST,
      &format!("/blocks/{client}"),
      &h.token(support, Persona::Staff),
      Some(json!({ "scope": "client", "reason": "payment overdue" })),
    )
    .await;
  assert_eq!(res.status(), StatusCode::NO_CONTENT);

  let res = h
    .call(Method::GET, &format!("/subjects/{client}"), &client_token, None)
    .await;
  assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(json_body(res).await["reason"], "payment overdue");

  let res = h
    .call(Method::DELETE, &format!("/blocks/{client}/client"), &h.token(support, Persona::Staff), None)
    .await;
  assert_eq!(res.status(), StatusCode::NO_CONTENT);
  let res = h
    .call(Method::GET, &format!("/subjects/{client}"), &client_token, None)
    .await;
  assert_eq!(res.status(), StatusCode::OK);
  let body = json_body(res).await;
  assert_eq!(body["subject"]["email"], "c@example.com");
  assert!(body["credential"].get("password_hash").is_none());
}

#[tokio::test]
async fn self_delete_locks_the_subject_out() {
  let h = Harness::new().await;
  let id = h.subject("gone@example.com", |s| s.is_client = true).await;
  let token = h.token(id, Persona::Client);
  let uri = format!("/subjects/{id}");

  assert_eq!(h.call(Method::DELETE, &uri, &token, None).await.status(), StatusCode::NO_CONTENT);
  assert!(h.store.get_account(id).await.unwrap().unwrap().subject.deleted);
  assert_eq!(h.call(Method::GET, &uri, &token, None).await.status(), StatusCode::UNAUTHORIZED);
}
