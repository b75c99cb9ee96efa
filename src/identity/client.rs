//! HTTP client for the hosted Identity Store.
//!
//! The store exposes a token endpoint for password/refresh grants, a user
//! endpoint that validates access tokens, and a REST surface for the role and
//! admin-permission records. Responses outside those shapes map to
//! [`IdentityError::Malformed`] rather than being guessed at.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{Instrument, debug, info_span};
use url::Url;
use uuid::Uuid;

use super::{Credential, IdentityError, IdentityStore, Role, models};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: Uuid,
}

#[derive(Deserialize)]
struct UserResponse {
    id: Uuid,
}

#[derive(Deserialize)]
struct RoleRow {
    role: String,
}

#[derive(Deserialize)]
struct RouteRow {
    route_path: String,
}

/// Production Identity Store client.
pub struct HttpIdentityStore {
    client: Client,
    base_url: Url,
    service_key: SecretString,
}

impl HttpIdentityStore {
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be constructed.
    pub fn new(base_url: &str, service_key: SecretString) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            service_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        self.base_url
            .join(path)
            .map_err(|err| IdentityError::Malformed(format!("bad endpoint {path}: {err}")))
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
        failure: IdentityError,
    ) -> Result<Credential, IdentityError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let span = info_span!("identity.token", http.method = "POST", grant = grant_type);
        let response = self
            .client
            .post(url)
            .header("apikey", self.service_key.expose_secret())
            .json(&body)
            .send()
            .instrument(span)
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("token grant {grant_type} rejected: {}", response.status());
                return Err(failure);
            }
            status => {
                return Err(IdentityError::Malformed(format!(
                    "token endpoint returned {status}"
                )));
            }
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| IdentityError::Malformed(format!("token response: {err}")))?;

        let expires_at = token
            .expires_at
            .or_else(|| token.expires_in.map(|ttl| models::unix_now() + ttl))
            .or_else(|| models::token_expiry(&token.access_token))
            .ok_or_else(|| IdentityError::Malformed("token response missing expiry".into()))?;

        Ok(Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user_id: token.user.id,
        })
    }
}

#[async_trait]
impl IdentityStore for HttpIdentityStore {
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Credential, IdentityError> {
        self.token_grant(
            "password",
            serde_json::json!({ "email": email, "password": password }),
            IdentityError::InvalidCredentials,
        )
        .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Credential, IdentityError> {
        self.token_grant(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
            IdentityError::RefreshFailed,
        )
        .await
    }

    async fn establish(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Credential, IdentityError> {
        let url = self.endpoint("auth/v1/user")?;
        let span = info_span!("identity.user", http.method = "GET");
        let response = self
            .client
            .get(url)
            .header("apikey", self.service_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .instrument(span)
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(IdentityError::SessionExpired);
            }
            status => {
                return Err(IdentityError::Malformed(format!(
                    "user endpoint returned {status}"
                )));
            }
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|err| IdentityError::Malformed(format!("user response: {err}")))?;

        // The store already vouched for the token above; the unverified exp
        // claim is only used to schedule refresh.
        let expires_at = models::token_expiry(access_token)
            .ok_or_else(|| IdentityError::Malformed("access token missing exp claim".into()))?;

        Ok(Credential {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at,
            user_id: user.id,
        })
    }

    async fn user_role(&self, user_id: Uuid) -> Result<Role, IdentityError> {
        let mut url = self.endpoint("rest/v1/profiles")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{user_id}"))
            .append_pair("select", "role");

        let span = info_span!("identity.role", http.method = "GET", user.id = %user_id);
        let response = self
            .client
            .get(url)
            .header("apikey", self.service_key.expose_secret())
            .send()
            .instrument(span)
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::RoleLookupFailed(user_id));
        }

        let rows: Vec<RoleRow> = response
            .json()
            .await
            .map_err(|err| IdentityError::Malformed(format!("role response: {err}")))?;

        // Exactly one role per user; anything else fails closed.
        match rows.as_slice() {
            [row] => {
                Role::parse(&row.role).ok_or_else(|| IdentityError::RoleLookupFailed(user_id))
            }
            _ => Err(IdentityError::RoleLookupFailed(user_id)),
        }
    }

    async fn admin_permitted_routes(
        &self,
        admin_id: Uuid,
    ) -> Result<BTreeSet<String>, IdentityError> {
        let mut url = self.endpoint("rest/v1/admin_permissions")?;
        url.query_pairs_mut()
            .append_pair("admin_id", &format!("eq.{admin_id}"))
            .append_pair("select", "route_path");

        let span = info_span!("identity.permissions", http.method = "GET", user.id = %admin_id);
        let response = self
            .client
            .get(url)
            .header("apikey", self.service_key.expose_secret())
            .send()
            .instrument(span)
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::Malformed(format!(
                "permissions endpoint returned {}",
                response.status()
            )));
        }

        let rows: Vec<RouteRow> = response
            .json()
            .await
            .map_err(|err| IdentityError::Malformed(format!("permissions response: {err}")))?;

        Ok(rows
            .into_iter()
            .map(|row| crate::gate::routes::normalize_path(&row.route_path))
            .collect())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let url = self.endpoint("auth/v1/logout")?;
        let span = info_span!("identity.signout", http.method = "POST");
        let response = self
            .client
            .post(url)
            .header("apikey", self.service_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .instrument(span)
            .await?;

        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            // An already-dead session upstream is still a successful sign-out.
            Ok(())
        } else {
            Err(IdentityError::Malformed(format!(
                "logout endpoint returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn store() -> HttpIdentityStore {
        HttpIdentityStore::new(
            "https://identity.example.com/",
            SecretString::from("service-key".to_string()),
        )
        .expect("client")
    }

    #[test]
    fn endpoint_joins_relative_paths() {
        let store = store();
        let url = store.endpoint("auth/v1/token").expect("endpoint");
        assert_eq!(url.as_str(), "https://identity.example.com/auth/v1/token");
    }

    #[test]
    fn new_rejects_invalid_base_url() {
        assert!(
            HttpIdentityStore::new("not a url", SecretString::from("k".to_string())).is_err()
        );
    }
}
