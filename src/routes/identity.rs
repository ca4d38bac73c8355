use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::error::AppError;

/// Header the hosting platform injects for authenticated users.
pub const CLIENT_PRINCIPAL_HEADER: &str = "x-ms-client-principal";

/// Identity metadata supplied by the hosting platform (base64 JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPrincipal {
    #[serde(default)]
    pub identity_provider: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_details: String,
    #[serde(default)]
    pub user_roles: Vec<String>,
}

impl ClientPrincipal {
    pub fn decode(header: &str) -> Option<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(header.trim())
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }
}

/// The caller of a request.
///
/// Rejects with 401 when the platform identity header is missing, except in
/// development mode.
#[derive(Debug, Clone)]
pub struct Caller {
    /// Decoded principal; `None` for anonymous development requests or when
    /// the header is present but not decodable.
    pub principal: Option<ClientPrincipal>,
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(CLIENT_PRINCIPAL_HEADER)
            .and_then(|value| value.to_str().ok());

        match header {
            Some(raw) => {
                let principal = ClientPrincipal::decode(raw);
                if principal.is_none() {
                    tracing::debug!("Client principal header present but not decodable");
                }
                Ok(Caller { principal })
            }
            None if state.allow_anonymous => Ok(Caller { principal: None }),
            None => Err(AppError::Auth("Authentication required".to_string())),
        }
    }
}

/// GET /api/get-user: identity metadata for the current caller.
pub async fn get_user(caller: Caller) -> Json<serde_json::Value> {
    match caller.principal {
        Some(principal) => Json(json!({ "user_info": principal })),
        None => Json(json!({ "user_info": "Anonymous development user" })),
    }
}
