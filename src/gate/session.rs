//! Session resolution at the request boundary.
//!
//! Flow Overview: read the credential cookies once per request, establish the
//! session against the Identity Store, refresh proactively when close to
//! expiry, and resolve the role into an immutable [`Principal`] that is passed
//! explicitly downstream. Nothing here mutates cookies; the middleware applies
//! renewed credentials to the response.
//!
//! Every failure path degrades to anonymous. No call is retried: a transient
//! store error costs one request its session rather than adding latency to
//! every request.

use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::cookies;
use super::principal::Principal;
use crate::identity::{Credential, IdentityError, IdentityStore, Role};

/// A resolved session plus the renewed credential, if a refresh happened.
pub struct Resolution {
    pub principal: Principal,
    pub credential: Credential,
    /// Set when the resolver refreshed the credential; the caller must apply
    /// the new cookies to the response.
    pub renewed: bool,
}

pub struct SessionResolver {
    store: Arc<dyn IdentityStore>,
    refresh_threshold_seconds: i64,
}

impl SessionResolver {
    #[must_use]
    pub fn new(store: Arc<dyn IdentityStore>, refresh_threshold_seconds: i64) -> Self {
        Self {
            store,
            refresh_threshold_seconds,
        }
    }

    /// Resolve request cookies to a principal, or `None` for anonymous.
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<Resolution> {
        let access_token = cookies::get(headers, cookies::ACCESS_TOKEN_COOKIE)?;
        let refresh_token = cookies::get(headers, cookies::REFRESH_TOKEN_COOKIE)?;

        let credential = match self.store.establish(&access_token, &refresh_token).await {
            Ok(credential) => credential,
            Err(IdentityError::SessionExpired) => {
                debug!("session tokens rejected, treating as anonymous");
                return None;
            }
            Err(err) => {
                warn!("failed to establish session: {err}");
                return None;
            }
        };

        let (credential, renewed) = match self.refresh_if_needed(credential).await {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!("session refresh failed, treating as anonymous: {err}");
                return None;
            }
        };

        let role = match self.store.user_role(credential.user_id).await {
            Ok(role) => role,
            Err(err) => {
                // A user who cannot be role-resolved must not gain any access.
                error!("role lookup failed for {}: {err}", credential.user_id);
                return None;
            }
        };

        let mut principal = Principal::new(credential.user_id, role);
        if role == Role::Admin {
            match self.store.admin_permitted_routes(credential.user_id).await {
                Ok(routes) => principal.permitted_routes = routes,
                Err(err) => {
                    // Least privilege without locking the admin out entirely:
                    // an empty allow-list still reaches the dashboard.
                    warn!(
                        "permitted-route lookup failed for {}, using empty allow-list: {err}",
                        credential.user_id
                    );
                }
            }
        }

        Some(Resolution {
            principal,
            credential,
            renewed,
        })
    }

    /// Refresh a credential that is within the expiry threshold.
    ///
    /// A credential with plenty of lifetime left is returned untouched, so
    /// refreshing an already-fresh credential is a no-op.
    ///
    /// # Errors
    /// Returns an error when the credential needed a refresh and the store
    /// rejected it.
    pub async fn refresh_if_needed(
        &self,
        credential: Credential,
    ) -> Result<(Credential, bool), IdentityError> {
        if credential.seconds_until_expiry() > self.refresh_threshold_seconds {
            return Ok((credential, false));
        }

        let renewed = self
            .store
            .refresh_session(&credential.refresh_token)
            .await?;
        Ok((renewed, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::models::unix_now;
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use axum::http::header::COOKIE;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    const FRESH: i64 = 3600;
    const STALE: i64 = 30;

    struct StubStore {
        user_id: Uuid,
        expires_in: i64,
        role: Option<Role>,
        fail_refresh: bool,
        fail_role: bool,
        fail_routes: bool,
        refresh_calls: AtomicUsize,
    }

    impl StubStore {
        fn new(expires_in: i64, role: Role) -> Self {
            Self {
                user_id: Uuid::new_v4(),
                expires_in,
                role: Some(role),
                fail_refresh: false,
                fail_role: false,
                fail_routes: false,
                refresh_calls: AtomicUsize::new(0),
            }
        }

        fn credential(&self) -> Credential {
            Credential {
                access_token: "access".to_string(),
                refresh_token: "refresh".to_string(),
                expires_at: unix_now() + self.expires_in,
                user_id: self.user_id,
            }
        }
    }

    #[async_trait]
    impl IdentityStore for StubStore {
        async fn authenticate(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<Credential, IdentityError> {
            Ok(self.credential())
        }

        async fn refresh_session(&self, _refresh_token: &str) -> Result<Credential, IdentityError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_refresh {
                return Err(IdentityError::RefreshFailed);
            }
            Ok(Credential {
                access_token: "renewed-access".to_string(),
                refresh_token: "renewed-refresh".to_string(),
                expires_at: unix_now() + 3600,
                user_id: self.user_id,
            })
        }

        async fn establish(
            &self,
            access_token: &str,
            refresh_token: &str,
        ) -> Result<Credential, IdentityError> {
            if access_token == "invalid" {
                return Err(IdentityError::SessionExpired);
            }
            Ok(Credential {
                access_token: access_token.to_string(),
                refresh_token: refresh_token.to_string(),
                expires_at: unix_now() + self.expires_in,
                user_id: self.user_id,
            })
        }

        async fn user_role(&self, user_id: Uuid) -> Result<Role, IdentityError> {
            if self.fail_role {
                return Err(IdentityError::RoleLookupFailed(user_id));
            }
            self.role.ok_or(IdentityError::RoleLookupFailed(user_id))
        }

        async fn admin_permitted_routes(
            &self,
            _admin_id: Uuid,
        ) -> Result<BTreeSet<String>, IdentityError> {
            if self.fail_routes {
                return Err(IdentityError::Malformed("boom".to_string()));
            }
            Ok(["/admin/orders".to_string()].into_iter().collect())
        }

        async fn sign_out(&self, _access_token: &str) -> Result<(), IdentityError> {
            Ok(())
        }
    }

    fn session_headers(access: &str, refresh: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format!(
            "{}={access}; {}={refresh}",
            cookies::ACCESS_TOKEN_COOKIE,
            cookies::REFRESH_TOKEN_COOKIE
        );
        headers.insert(COOKIE, HeaderValue::from_str(&value).expect("header"));
        headers
    }

    fn resolver(store: StubStore) -> SessionResolver {
        SessionResolver::new(Arc::new(store), 300)
    }

    #[tokio::test]
    async fn missing_cookies_resolve_to_anonymous() {
        let resolver = resolver(StubStore::new(FRESH, Role::Employee));
        assert!(resolver.resolve(&HeaderMap::new()).await.is_none());

        let mut only_access = HeaderMap::new();
        only_access.insert(
            COOKIE,
            HeaderValue::from_static("sb-access-token=tok"),
        );
        assert!(resolver.resolve(&only_access).await.is_none());
    }

    #[tokio::test]
    async fn invalid_tokens_resolve_to_anonymous() {
        let resolver = resolver(StubStore::new(FRESH, Role::Employee));
        let headers = session_headers("invalid", "refresh");
        assert!(resolver.resolve(&headers).await.is_none());
    }

    #[tokio::test]
    async fn fresh_credential_is_not_refreshed() {
        let store = StubStore::new(FRESH, Role::Employee);
        let resolver = SessionResolver::new(Arc::new(store), 300);
        let resolution = resolver
            .resolve(&session_headers("access", "refresh"))
            .await
            .expect("resolution");
        assert!(!resolution.renewed);
        assert_eq!(resolution.credential.access_token, "access");
        assert_eq!(resolution.principal.role, Role::Employee);
    }

    #[tokio::test]
    async fn refresh_if_needed_is_idempotent_on_fresh_credentials() {
        let store = StubStore::new(FRESH, Role::Employee);
        let credential = store.credential();
        let expected = credential.access_token.clone();
        let resolver = SessionResolver::new(Arc::new(store), 300);

        let (first, renewed) = resolver.refresh_if_needed(credential).await.expect("refresh");
        assert!(!renewed);
        assert_eq!(first.access_token, expected);

        let (second, renewed) = resolver.refresh_if_needed(first).await.expect("refresh");
        assert!(!renewed);
        assert_eq!(second.access_token, expected);
    }

    #[tokio::test]
    async fn near_expiry_credential_is_refreshed() {
        let store = StubStore::new(STALE, Role::Employee);
        let resolver = SessionResolver::new(Arc::new(store), 300);
        let resolution = resolver
            .resolve(&session_headers("access", "refresh"))
            .await
            .expect("resolution");
        assert!(resolution.renewed);
        assert_eq!(resolution.credential.access_token, "renewed-access");
    }

    #[tokio::test]
    async fn failed_refresh_degrades_to_anonymous() {
        let mut store = StubStore::new(STALE, Role::Employee);
        store.fail_refresh = true;
        let resolver = SessionResolver::new(Arc::new(store), 300);
        assert!(
            resolver
                .resolve(&session_headers("access", "refresh"))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn role_lookup_failure_fails_closed() {
        let mut store = StubStore::new(FRESH, Role::Admin);
        store.fail_role = true;
        let resolver = SessionResolver::new(Arc::new(store), 300);
        assert!(
            resolver
                .resolve(&session_headers("access", "refresh"))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn admin_resolution_attaches_permitted_routes() {
        let store = StubStore::new(FRESH, Role::Admin);
        let resolver = SessionResolver::new(Arc::new(store), 300);
        let resolution = resolver
            .resolve(&session_headers("access", "refresh"))
            .await
            .expect("resolution");
        assert!(resolution.principal.permitted_routes.contains("/admin/orders"));
    }

    #[tokio::test]
    async fn permitted_route_failure_degrades_to_empty_allow_list() {
        let mut store = StubStore::new(FRESH, Role::Admin);
        store.fail_routes = true;
        let resolver = SessionResolver::new(Arc::new(store), 300);
        let resolution = resolver
            .resolve(&session_headers("access", "refresh"))
            .await
            .expect("resolution");
        assert!(resolution.principal.permitted_routes.is_empty());
    }

    #[tokio::test]
    async fn superadmin_skips_permitted_route_lookup() {
        let store = StubStore::new(FRESH, Role::Superadmin);
        let resolver = SessionResolver::new(Arc::new(store), 300);
        let resolution = resolver
            .resolve(&session_headers("access", "refresh"))
            .await
            .expect("resolution");
        assert!(resolution.principal.permitted_routes.is_empty());
    }
}
