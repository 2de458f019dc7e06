//! HTTP client for the external person directory.
//!
//! The directory is queried at `GET {url}/{nationality}/{value}`; a `404` or a
//! `null` body means the person is unknown. Every other failure is logged and
//! reported to callers as "not found".

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use socorro_core::{
  citizen::Identification,
  lookup::{self, PersonRecord, RawPerson},
};
use thiserror::Error;

fn default_timeout() -> u64 { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
  pub url:          String,
  #[serde(default)]
  pub token:        Option<String>,
  #[serde(default = "default_timeout")]
  pub timeout_secs: u64,
}

/// A failed call to the directory.
#[derive(Debug, Error)]
pub enum ExternalLookupFailure {
  #[error("directory request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("directory answered {0}")]
  Status(StatusCode),
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct LookupClient {
  client:   Client,
  base_url: String,
  token:    Option<String>,
}

impl LookupClient {
  pub fn new(config: &LookupConfig) -> Result<Self, ExternalLookupFailure> {
    let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
    Ok(Self {
      client,
      base_url: config.url.trim_end_matches('/').to_owned(),
      token: config.token.clone(),
    })
  }

  fn url(&self, id: &Identification) -> String {
    format!("{}/{}/{}", self.base_url, id.nationality.as_ref(), id.value)
  }

  /// One attempt against the directory, with failures surfaced.
  pub async fn fetch(
    &self,
    id: &Identification,
  ) -> Result<Option<PersonRecord>, ExternalLookupFailure> {
    let mut req = self.client.get(self.url(id));
    if let Some(token) = &self.token {
      req = req.bearer_auth(token);
    }
    let resp = req.send().await?;

    if resp.status() == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if !resp.status().is_success() {
      return Err(ExternalLookupFailure::Status(resp.status()));
    }

    let raw: Option<RawPerson> = resp.json().await?;
    Ok(raw.and_then(|r| lookup::normalize(id.clone(), r)))
  }

  /// Like [`fetch`](Self::fetch), but failures are logged and become `None`.
  pub async fn lookup(&self, id: &Identification) -> Option<PersonRecord> {
    match self.fetch(id).await {
      Ok(record) => record,
      Err(e) => {
        tracing::warn!(identification = %id, error = %e, "person lookup failed");
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
  use serde_json::{Value, json};
  use socorro_core::citizen::{Gender, Nationality};

  use super::*;

  async fn person(Path((nat, value)): Path<(String, String)>) -> Result<Json<Value>, StatusCode> {
    match (nat.as_str(), value.as_str()) {
      ("V", "12345678") => Ok(Json(json!({
        "primer_nombre": "Ana",
        "primer_apellido": "Pérez",
        "fecha_nacimiento": "05/11/1990",
        "sexo": "FEMENINO",
        "carga_familiar": 3
      }))),
      ("V", "500") => Err(StatusCode::INTERNAL_SERVER_ERROR),
      ("V", "null") => Ok(Json(Value::Null)),
      _ => Err(StatusCode::NOT_FOUND),
    }
  }

  /// Serve a fake directory on an ephemeral port.
  async fn directory() -> LookupClient {
    let app = Router::new().route("/people/{nat}/{value}", get(person));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    LookupClient::new(&LookupConfig {
      url:          format!("http://{addr}/people/"),
      token:        Some("secret".into()),
      timeout_secs: 5,
    })
    .unwrap()
  }

  #[tokio::test]
  async fn known_person_is_normalised() {
    let client = directory().await;
    let record = client
      .lookup(&Identification::new(Nationality::V, "12345678"))
      .await
      .expect("record");
    assert_eq!(record.first_name, "Ana");
    assert_eq!(record.gender, Some(Gender::F));
    assert_eq!(record.birth_date.unwrap().to_string(), "1990-11-05");
    assert_eq!(record.household_size, Some(3));
  }

  #[tokio::test]
  async fn unknown_person_is_none() {
    let client = directory().await;
    let id = Identification::new(Nationality::E, "1");
    assert!(client.fetch(&id).await.unwrap().is_none());
    let id = Identification::new(Nationality::V, "null");
    assert!(client.fetch(&id).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn server_errors_are_absorbed() {
    let client = directory().await;
    let id = Identification::new(Nationality::V, "500");
    assert!(matches!(client.fetch(&id).await, Err(ExternalLookupFailure::Status(_))));
    assert!(client.lookup(&id).await.is_none());
  }

  #[tokio::test]
  async fn unreachable_directory_is_absorbed() {
    let client = LookupClient::new(&LookupConfig {
      url:          "http://127.0.0.1:9".into(),
      token:        None,
      timeout_secs: 1,
    })
    .unwrap();
    assert!(client.lookup(&Identification::new(Nationality::V, "12345678")).await.is_none());
  }
}
