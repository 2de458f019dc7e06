//! Router tests against an in-memory `SqliteStore`.
//!
//! Authentication lives outside this crate, so requests carry their
//! [`Actor`] directly in the request extensions.

use std::sync::Arc;

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use socorro_core::{
  access::{Actor, CATALOGUE, perm},
  store::AccessStore,
};
use socorro_store_sqlite::SqliteStore;
use tower::ServiceExt as _;
use uuid::Uuid;

use super::*;

async fn make_state() -> AppState<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  store.seed_access("super-admin").await.unwrap();
  AppState::new(Arc::new(store))
}

fn actor(permissions: &[&str]) -> Actor {
  Actor {
    user_id:     Uuid::new_v4(),
    username:    "clerk".into(),
    permissions: permissions.iter().map(|p| p.to_string()).collect(),
  }
}

fn admin() -> Actor {
  Actor {
    user_id:     Uuid::new_v4(),
    username:    "admin".into(),
    permissions: CATALOGUE.iter().map(|(_, p)| p.to_string()).collect(),
  }
}

async fn call(
  state:  &AppState<SqliteStore>,
  actor:  Option<&Actor>,
  method: &str,
  uri:    &str,
  body:   Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if body.is_some() {
    builder = builder.header(header::CONTENT_TYPE, "application/json");
  }
  let mut req = builder
    .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
    .unwrap();
  if let Some(actor) = actor {
    req.extensions_mut().insert(actor.clone());
  }

  let resp = api_router(state.clone()).oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, value)
}

fn citizen_body(value: &str) -> Value {
  json!({
    "identification": { "nationality": "V", "value": value },
    "first_name": "Ana",
    "last_name": "Pérez",
    "birth_date": "1980-05-17",
    "phone": "0414-5550000",
    "address": {
      "state": "Lara",
      "municipality": "Iribarren",
      "street": "Calle 12"
    }
  })
}

/// A registered citizen with a complete profile, a category and a supply
/// holding `stock` units. Returns `(citizen_id, category_id, supply_id)`.
async fn seed_catalog(state: &AppState<SqliteStore>, stock: i64) -> (String, String, String) {
  let a = admin();
  let (status, citizen) = call(state, Some(&a), "POST", "/citizens", Some(citizen_body("12345678"))).await;
  assert_eq!(status, StatusCode::CREATED, "{citizen}");
  let citizen_id = citizen["citizen_id"].as_str().unwrap().to_owned();
  let (status, _) = call(
    state,
    Some(&a),
    "PUT",
    &format!("/citizens/{citizen_id}/health"),
    Some(json!({ "notes": "No known allergies." })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (_, category) =
    call(state, Some(&a), "POST", "/categories", Some(json!({ "name": "Medicines" }))).await;
  let category_id = category["category_id"].as_str().unwrap().to_owned();
  let (_, supply) = call(
    state,
    Some(&a),
    "POST",
    "/supplies",
    Some(json!({ "category_id": category_id, "name": "Amoxicillin", "unit": "box", "min_stock": 5 })),
  )
  .await;
  let supply_id = supply["supply_id"].as_str().unwrap().to_owned();

  if stock > 0 {
    let (status, _) = call(
      state,
      Some(&a),
      "POST",
      &format!("/supplies/{supply_id}/movements"),
      Some(json!({ "movement_type": "entry", "quantity": stock, "reason": "donation" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }
  (citizen_id, category_id, supply_id)
}

fn case_body(citizen_id: &str, category_id: &str, supply_id: &str, quantity: i64) -> Value {
  json!({
    "citizen_id": citizen_id,
    "category_id": category_id,
    "channel": "in_person",
    "description": "Antibiotic treatment",
    "items": [{ "itemable": { "kind": "supply", "id": supply_id }, "quantity": quantity }]
  })
}

// ── Authentication and authorisation ────────────────────────────────────────

#[tokio::test]
async fn requests_without_an_actor_are_challenged() {
  let state = make_state().await;
  let req = Request::builder().uri("/citizens").body(Body::empty()).unwrap();
  let resp = api_router(state).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
  let state = make_state().await;
  let viewer = actor(&[perm::VIEW_CITIZENS]);

  let (status, _) = call(&state, Some(&viewer), "GET", "/citizens", None).await;
  assert_eq!(status, StatusCode::OK);

  let (status, body) =
    call(&state, Some(&viewer), "POST", "/citizens", Some(citizen_body("12345678"))).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(body["error"].as_str().unwrap().contains("create citizens"));
}

#[tokio::test]
async fn me_echoes_the_actor() {
  let state = make_state().await;
  let viewer = actor(&[perm::VIEW_CASES]);
  let (status, body) = call(&state, Some(&viewer), "GET", "/me", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["username"], "clerk");
  assert_eq!(body["permissions"], json!(["view cases"]));
}

// ── Citizens ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn validation_errors_list_fields() {
  let state = make_state().await;
  let mut body = citizen_body("12345678");
  body["first_name"] = json!("  ");

  let (status, resp) = call(&state, Some(&admin()), "POST", "/citizens", Some(body)).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  let fields: Vec<&str> =
    resp["fields"].as_array().unwrap().iter().map(|f| f["field"].as_str().unwrap()).collect();
  assert!(fields.contains(&"first_name"), "{resp}");
}

#[tokio::test]
async fn malformed_bodies_are_rejected_by_the_extractor() {
  let state = make_state().await;
  let mut req = Request::builder()
    .method("POST")
    .uri("/citizens")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{\"identification\":"))
    .unwrap();
  req.extensions_mut().insert(admin());

  let resp = api_router(state).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_status_reports_missing_health_profile() {
  let state = make_state().await;
  let a = admin();
  let (_, citizen) = call(&state, Some(&a), "POST", "/citizens", Some(citizen_body("87654321"))).await;
  let id = citizen["citizen_id"].as_str().unwrap();

  let (status, report) =
    call(&state, Some(&a), "GET", &format!("/citizens/{id}/profile-status"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(report["complete"], false);
  assert_eq!(report["missing_sections"], json!(["health_profile"]));

  let (status, _) = call(&state, Some(&a), "GET", &format!("/citizens/{id}/health"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lookup_without_a_directory_is_not_found() {
  let state = make_state().await;
  let (status, _) = call(&state, Some(&admin()), "GET", "/lookup/V-12345678", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = call(&state, Some(&admin()), "GET", "/lookup/X-1", None).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ── Cases ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn incomplete_beneficiary_blocks_intake() {
  let state = make_state().await;
  let (_, category_id, supply_id) = seed_catalog(&state, 10).await;
  let a = admin();
  let (_, other) = call(&state, Some(&a), "POST", "/citizens", Some(citizen_body("11111111"))).await;
  let other_id = other["citizen_id"].as_str().unwrap();

  let (status, body) =
    call(&state, Some(&a), "POST", "/cases", Some(case_body(other_id, &category_id, &supply_id, 2)))
      .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["fields"][0]["field"], "beneficiary_id");
}

#[tokio::test]
async fn review_and_fulfil_over_http() {
  let state = make_state().await;
  let (citizen_id, category_id, supply_id) = seed_catalog(&state, 50).await;
  let a = admin();

  let (status, case) = call(
    &state,
    Some(&a),
    "POST",
    "/cases",
    Some(case_body(&citizen_id, &category_id, &supply_id, 10)),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{case}");
  assert_eq!(case["status"], "open");
  assert!(case["case_number"].as_str().unwrap().starts_with("CS-"));
  let case_id = case["case_id"].as_str().unwrap();
  let item_id = case["items"][0]["item_id"].as_str().unwrap();
  let item_uri = format!("/cases/{case_id}/items/{item_id}");

  let (status, item) = call(
    &state,
    Some(&a),
    "POST",
    &format!("{item_uri}/review"),
    Some(json!({ "status": "approved", "approved_quantity": 8 })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{item}");
  assert_eq!(item["approved_quantity"], 8);

  let (status, done) = call(&state, Some(&a), "POST", &format!("{item_uri}/fulfill"), None).await;
  assert_eq!(status, StatusCode::OK, "{done}");
  assert_eq!(done["item"]["status"], "fulfilled");
  assert_eq!(done["stock_level"]["current_stock"], 42);

  let (status, _) = call(&state, Some(&a), "POST", &format!("{item_uri}/fulfill"), None).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (_, level) = call(&state, Some(&a), "GET", &format!("/supplies/{supply_id}/stock"), None).await;
  assert_eq!(level["current_stock"], 42);
  let (_, movements) =
    call(&state, Some(&a), "GET", &format!("/supplies/{supply_id}/movements"), None).await;
  assert_eq!(movements.as_array().unwrap().len(), 2);

  let (status, closed) = call(&state, Some(&a), "POST", &format!("/cases/{case_id}/close"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(closed["status"], "closed");
}

#[tokio::test]
async fn oversized_exit_is_a_conflict() {
  let state = make_state().await;
  let (_, _, supply_id) = seed_catalog(&state, 3).await;
  let (status, body) = call(
    &state,
    Some(&admin()),
    "POST",
    &format!("/supplies/{supply_id}/movements"),
    Some(json!({ "movement_type": "exit", "quantity": 4, "reason": "loss" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT, "{body}");

  let (_, low) = call(&state, Some(&admin()), "GET", "/supplies/low-stock", None).await;
  assert_eq!(low.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn non_managers_only_see_their_cases() {
  let state = make_state().await;
  let (citizen_id, category_id, supply_id) = seed_catalog(&state, 0).await;
  let a = admin();
  let (_, case) = call(
    &state,
    Some(&a),
    "POST",
    "/cases",
    Some(case_body(&citizen_id, &category_id, &supply_id, 1)),
  )
  .await;
  let case_id = case["case_id"].as_str().unwrap();

  let clerk = actor(&[perm::VIEW_CASES, perm::CREATE_CASES]);
  let (status, _) = call(&state, Some(&clerk), "GET", &format!("/cases/{case_id}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (_, listed) = call(&state, Some(&clerk), "GET", "/cases", None).await;
  assert_eq!(listed, json!([]));

  let (_, listed) = call(&state, Some(&a), "GET", "/cases", None).await;
  assert_eq!(listed.as_array().unwrap().len(), 1);
  let (_, stats) = call(&state, Some(&clerk), "GET", "/cases/stats", None).await;
  assert_eq!(stats["cases"], json!({}));

  let (status, _) = call(&state, Some(&a), "DELETE", &format!("/cases/{case_id}"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = call(&state, Some(&a), "GET", &format!("/cases/{case_id}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Access control ──────────────────────────────────────────────────────────

#[tokio::test]
async fn protected_role_cannot_be_edited() {
  let state = make_state().await;
  let a = admin();
  let (_, roles) = call(&state, Some(&a), "GET", "/roles", None).await;
  let super_id = roles[0]["role_id"].as_str().unwrap();

  let (status, _) = call(
    &state,
    Some(&a),
    "PUT",
    &format!("/roles/{super_id}"),
    Some(json!({ "name": "renamed" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (_, groups) = call(&state, Some(&a), "GET", "/permissions", None).await;
  let citizens = groups
    .as_array()
    .unwrap()
    .iter()
    .find(|g| g["module"] == "citizens")
    .expect("citizens group");
  assert_eq!(citizens["permissions"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn role_changes_invalidate_the_permission_cache() {
  let state = make_state().await;
  let a = admin();

  let (status, role) = call(
    &state,
    Some(&a),
    "POST",
    "/roles",
    Some(json!({ "name": "clerk", "permissions": ["view cases"] })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{role}");
  let role_id = role["role_id"].as_str().unwrap();

  let (status, user) = call(
    &state,
    Some(&a),
    "POST",
    "/users",
    Some(json!({
      "username": "maria",
      "display_name": "María",
      "password": "s3cret",
      "role_ids": [role_id]
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{user}");
  assert!(user.get("password_hash").is_none());
  let user_id: Uuid = user["user_id"].as_str().unwrap().parse().unwrap();

  let cached = state.permissions.resolve(state.store.as_ref(), user_id).await.unwrap();
  assert!(cached.contains(perm::VIEW_CASES));

  let (status, _) = call(
    &state,
    Some(&a),
    "PUT",
    &format!("/users/{user_id}/roles"),
    Some(json!({ "role_ids": [] })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert!(state.permissions.get(user_id).is_none());
  assert!(state.permissions.resolve(state.store.as_ref(), user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn users_can_be_deactivated_but_not_by_themselves() {
  let state = make_state().await;
  let a = admin();
  let (_, user) = call(
    &state,
    Some(&a),
    "POST",
    "/users",
    Some(json!({ "username": "maria", "display_name": "María", "password": "s3cret" })),
  )
  .await;
  let user_id = user["user_id"].as_str().unwrap();

  let (status, body) =
    call(&state, Some(&a), "PUT", &format!("/users/{user_id}/active"), Some(json!({ "active": false })))
      .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["active"], false);

  let (status, _) = call(
    &state,
    Some(&a),
    "PUT",
    &format!("/users/{}/active", a.user_id),
    Some(json!({ "active": false })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

  let (status, _) = call(
    &state,
    Some(&a),
    "PUT",
    &format!("/users/{}/active", Uuid::new_v4()),
    Some(json!({ "active": true })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
