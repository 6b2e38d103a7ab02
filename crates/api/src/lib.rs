//! Async HTTP client for the game server's REST API (spec §6).
//!
//! The server itself is out of scope for this client; every method here does nothing but
//! serialize a request, await the response, and deserialize (or pass through) the body.

pub mod model;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use model::{
    DeconstructRequest, InventoryAction, InventoryActionRequest, LocationInventory,
    LocationTreeNode, OrgSummary, PorkchopGrid, Ship, StateResponse, TransferQuote,
    TransferRequest,
};

/// Errors surfaced by the API client, matching the Transport/Protocol split in spec §7.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request could not be built: {0}")]
    UrlBuild(#[from] url::ParseError),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {detail}")]
    Status { status: StatusCode, detail: String },
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A thin async client over the server's JSON API, parameterized only by its base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(ApiClient {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&impl Serialize>,
    ) -> Result<T, ApiError> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|err| {
            tracing::warn!(error = %err, "api request failed (transport)");
            ApiError::Transport(err)
        })?;
        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<model::ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.detail)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());
            tracing::warn!(%status, %detail, "api request failed (status)");
            return Err(ApiError::Status { status, detail });
        }
        let bytes = response.bytes().await.map_err(ApiError::Transport)?;
        serde_json::from_slice(&bytes).map_err(|err| {
            tracing::warn!(error = %err, "api response decode failed");
            ApiError::Decode(err)
        })
    }

    /// `GET /api/locations?dynamic=1[&t=<gameSec>]`.
    pub async fn get_locations(&self, at_game_time: Option<f64>) -> Result<Vec<model::Location>, ApiError> {
        let mut query = vec![("dynamic", "1".to_string())];
        if let Some(t) = at_game_time {
            query.push(("t", t.to_string()));
        }
        self.call(Method::GET, "/api/locations", &query, None::<&()>).await
    }

    /// `GET /api/locations/tree`.
    pub async fn get_locations_tree(&self) -> Result<Vec<LocationTreeNode>, ApiError> {
        self.call(Method::GET, "/api/locations/tree", &[], None::<&()>).await
    }

    /// `GET /api/state`.
    pub async fn get_state(&self) -> Result<StateResponse, ApiError> {
        self.call(Method::GET, "/api/state", &[], None::<&()>).await
    }

    /// `GET /api/org`.
    pub async fn get_org(&self) -> Result<OrgSummary, ApiError> {
        self.call(Method::GET, "/api/org", &[], None::<&()>).await
    }

    /// `GET /api/inventory/location/:id`.
    pub async fn get_location_inventory(&self, location_id: &str) -> Result<LocationInventory, ApiError> {
        self.call(
            Method::GET,
            &format!("/api/inventory/location/{location_id}"),
            &[],
            None::<&()>,
        )
        .await
    }

    /// `POST /api/ships/:id/transfer` `{to_location_id}`.
    pub async fn post_transfer(&self, ship_id: &str, to_location_id: &str) -> Result<(), ApiError> {
        let body = TransferRequest {
            to_location_id: to_location_id.to_string(),
        };
        self.call::<Value>(Method::POST, &format!("/api/ships/{ship_id}/transfer"), &[], Some(&body))
            .await?;
        Ok(())
    }

    /// `POST /api/ships/:id/inventory/{jettison|deploy}` `{container_index}`.
    pub async fn post_inventory_action(
        &self,
        ship_id: &str,
        action: InventoryAction,
        container_index: u32,
    ) -> Result<(), ApiError> {
        let verb = match action {
            InventoryAction::Jettison => "jettison",
            InventoryAction::Deploy => "deploy",
        };
        let body = InventoryActionRequest { container_index };
        self.call::<Value>(
            Method::POST,
            &format!("/api/ships/{ship_id}/inventory/{verb}"),
            &[],
            Some(&body),
        )
        .await?;
        Ok(())
    }

    /// `POST /api/ships/:id/deconstruct` `{keep_ship_record}`.
    pub async fn post_deconstruct(&self, ship_id: &str, keep_ship_record: bool) -> Result<(), ApiError> {
        let body = DeconstructRequest { keep_ship_record };
        self.call::<Value>(Method::POST, &format!("/api/ships/{ship_id}/deconstruct"), &[], Some(&body))
            .await?;
        Ok(())
    }

    /// `GET /api/transfer_quote_advanced?from_id&to_id&departure_time&extra_dv_fraction`.
    pub async fn get_transfer_quote(
        &self,
        from_id: &str,
        to_id: &str,
        departure_time: f64,
        extra_dv_fraction: f64,
    ) -> Result<TransferQuote, ApiError> {
        let query = [
            ("from_id", from_id.to_string()),
            ("to_id", to_id.to_string()),
            ("departure_time", departure_time.to_string()),
            ("extra_dv_fraction", extra_dv_fraction.to_string()),
        ];
        self.call(Method::GET, "/api/transfer_quote_advanced", &query, None::<&()>).await
    }

    /// `GET /api/transfer/porkchop?from_id&to_id&departure_start&grid_size`.
    pub async fn get_porkchop(
        &self,
        from_id: &str,
        to_id: &str,
        departure_start: f64,
        grid_size: u32,
    ) -> Result<PorkchopGrid, ApiError> {
        let query = [
            ("from_id", from_id.to_string()),
            ("to_id", to_id.to_string()),
            ("departure_start", departure_start.to_string()),
            ("grid_size", grid_size.to_string()),
        ];
        self.call(Method::GET, "/api/transfer/porkchop", &query, None::<&()>).await
    }

    /// `GET /api/shipyard/catalog`. Returned as raw JSON: the shipyard build flow is an
    /// ancillary DOM panel out of scope for this client (spec §1); only the plumbing to reach
    /// it is provided.
    pub async fn get_shipyard_catalog(&self) -> Result<Value, ApiError> {
        self.call(Method::GET, "/api/shipyard/catalog", &[], None::<&()>).await
    }

    pub async fn post_shipyard_preview(&self, body: &Value) -> Result<Value, ApiError> {
        self.call(Method::POST, "/api/shipyard/preview", &[], Some(body)).await
    }

    pub async fn post_shipyard_build(&self, body: &Value) -> Result<Value, ApiError> {
        self.call(Method::POST, "/api/shipyard/build", &[], Some(body)).await
    }

    /// `GET /api/auth/me`. A `401` status maps to `ApiError::Status`; the application layer is
    /// responsible for treating that as a session expiry per spec §6's authoritative failure
    /// mode (`AppEvent::SessionExpired`, see SPEC_FULL.md §6).
    pub async fn get_auth_me(&self) -> Result<Value, ApiError> {
        self.call(Method::GET, "/api/auth/me", &[], None::<&()>).await
    }

    pub async fn get_auth_corps(&self) -> Result<Value, ApiError> {
        self.call(Method::GET, "/api/auth/corps", &[], None::<&()>).await
    }

    pub async fn post_auth(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.call(Method::POST, &format!("/api/auth/{path}"), &[], Some(body)).await
    }

    /// `POST /api/admin/ships/:id/teleport`.
    pub async fn post_admin_teleport(&self, ship_id: &str, body: &Value) -> Result<Value, ApiError> {
        self.call(
            Method::POST,
            &format!("/api/admin/ships/{ship_id}/teleport"),
            &[],
            Some(body),
        )
        .await
    }

    /// Returns `true` if `ship.status` is `Docked` and its `location_id` equals `location_id`.
    pub fn ship_docked_at(ship: &Ship, location_id: &str) -> bool {
        ship.status == model::DockStatus::Docked
            && ship.location_id.as_deref() == Some(location_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_malformed_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }

    #[test]
    fn new_accepts_well_formed_base_url() {
        assert!(ApiClient::new("http://localhost:8080").is_ok());
    }
}
