//! services/portal/src/adapters/backend.rs
//!
//! This module contains the hosted backend adapter, the concrete implementation
//! of the `AuthService` and `DatabaseService` ports from the `core` crate. Auth
//! calls go to `/auth/v1`, table calls to `/rest/v1` through `Postgrest`.
//!
//! A client is bound to one request's `SessionStore`: it reads the session from
//! the auth cookie and writes rotated tokens back through the same store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use stadion_core::domain::{
    Facility, FacilityStatus, Instructor, NewFacility, NewInstructor, Profile, Session, User,
};
use stadion_core::ports::{
    AuthService, BackendClient, ClientFactory, CookieOptions, DatabaseService, PortError,
    PortResult, SessionStore,
};
use stadion_core::Role;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::auth_cookie;
use super::postgrest::Postgrest;
use crate::config::Config;

/// Refresh the access token when it expires within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 10;
/// Lifetime of the auth cookie itself; the tokens inside expire sooner.
const COOKIE_MAX_AGE_SECS: i64 = 400 * 24 * 60 * 60;

const FACILITY_COLUMNS: &str = "id, name, address, type, capacity, description, contact_phone,
    contact_email, operating_hours_info, status, manager_id, profiles(display_name)";
const INSTRUCTOR_COLUMNS: &str = "id, user_id, specialty, bio, profile_pic_url, is_available,
    contact_email, contact_phone, created_at";
const PROFILE_COLUMNS: &str = "id, user_role, display_name, avatar_url";

//=========================================================================================
// The Factory
//=========================================================================================

/// Holds everything that is shared between requests. Cheap to bind.
#[derive(Clone)]
pub struct HostedBackendFactory {
    http: reqwest::Client,
    backend_url: String,
    anon_key: String,
    cookie_name: String,
    cookie_options: CookieOptions,
    rest: Postgrest,
}

impl HostedBackendFactory {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.backend_timeout)
            .build()?;
        let cookie_options = CookieOptions {
            max_age: Some(COOKIE_MAX_AGE_SECS),
            secure: config.cookie_secure,
            ..CookieOptions::default()
        };
        Ok(Self {
            rest: Postgrest::new(http.clone(), &config.backend_url, &config.backend_anon_key),
            http,
            backend_url: config.backend_url.clone(),
            anon_key: config.backend_anon_key.clone(),
            cookie_name: config.auth_cookie_name.clone(),
            cookie_options,
        })
    }
}

impl ClientFactory for HostedBackendFactory {
    fn bind(&self, store: Arc<dyn SessionStore>) -> Arc<dyn BackendClient> {
        Arc::new(HostedBackendClient {
            factory: self.clone(),
            store,
            current: Mutex::new(None),
        })
    }
}

//=========================================================================================
// The Bound Client
//=========================================================================================

pub struct HostedBackendClient {
    factory: HostedBackendFactory,
    store: Arc<dyn SessionStore>,
    /// Session resolved earlier in this request, so a refresh happens once.
    current: Mutex<Option<Session>>,
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

/// Token grant response from the auth service.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    user: User,
}
impl TokenResponse {
    fn to_domain(self, now: DateTime<Utc>) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now.timestamp() + secs))
            .unwrap_or_else(|| now.timestamp());
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            user: self.user,
        }
    }
}

#[derive(Deserialize)]
struct ManagerRecord {
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct FacilityRecord {
    id: Uuid,
    name: String,
    address: String,
    #[serde(rename = "type")]
    facility_type: String,
    capacity: Option<i32>,
    description: Option<String>,
    contact_phone: Option<String>,
    contact_email: Option<String>,
    operating_hours_info: Option<String>,
    status: Option<String>,
    manager_id: Uuid,
    #[serde(default)]
    profiles: Option<ManagerRecord>,
}
impl FacilityRecord {
    fn to_domain(self) -> Facility {
        Facility {
            id: self.id,
            name: self.name,
            address: self.address,
            facility_type: self.facility_type,
            capacity: self.capacity,
            description: self.description,
            contact_phone: self.contact_phone,
            contact_email: self.contact_email,
            operating_hours_info: self.operating_hours_info,
            status: self.status.as_deref().and_then(FacilityStatus::from_stored),
            manager_id: self.manager_id,
            manager_name: self.profiles.and_then(|p| p.display_name),
        }
    }
}

#[derive(Deserialize)]
struct InstructorRecord {
    id: Uuid,
    user_id: Uuid,
    specialty: Option<String>,
    bio: Option<String>,
    profile_pic_url: Option<String>,
    is_available: Option<bool>,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    created_at: Option<DateTime<Utc>>,
}
impl InstructorRecord {
    fn to_domain(self) -> Instructor {
        Instructor {
            id: self.id,
            user_id: self.user_id,
            specialty: self.specialty,
            bio: self.bio,
            profile_pic_url: self.profile_pic_url,
            is_available: self.is_available.unwrap_or(false),
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            created_at: self.created_at,
        }
    }
}

#[derive(Deserialize)]
struct IdRecord {
    id: Uuid,
}

/// Pulls a readable message out of the auth service's several error shapes.
///
/// Only 4xx answers become `PortError::Backend`, which callers read as a
/// rejection. Outages and rate limits stay `Unexpected` so that nothing is
/// torn down because of them.
fn auth_error(status: StatusCode, body: &Value) -> PortError {
    let text = |key: &str| body.get(key).and_then(Value::as_str).map(str::to_string);
    let code = text("error_code").or_else(|| text("error"));
    let message = text("error_description")
        .or_else(|| text("msg"))
        .or_else(|| text("message"))
        .unwrap_or_else(|| format!("auth request failed with status {}", status));
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return PortError::Unexpected(format!("auth service unavailable ({}): {}", status, message));
    }
    PortError::Backend { code, message }
}

//=========================================================================================
// Helpers
//=========================================================================================

impl HostedBackendClient {
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.factory.backend_url, path)
    }

    async fn auth_request<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> PortResult<T> {
        let response = request
            .header("apikey", &self.factory.anon_key)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("auth service unreachable: {}", e)))?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(auth_error(status, &body));
        }
        serde_json::from_value(body).map_err(|e| PortError::Unexpected(e.to_string()))
    }

    fn persist(&self, session: &Session) {
        auth_cookie::write_session(
            self.store.as_ref(),
            &self.factory.cookie_name,
            session,
            &self.factory.cookie_options,
        );
        *self.current.lock() = Some(session.clone());
    }

    fn forget(&self) {
        auth_cookie::clear(
            self.store.as_ref(),
            &self.factory.cookie_name,
            &self.factory.cookie_options,
        );
        *self.current.lock() = None;
    }

    async fn refresh(&self, stale: &Session) -> PortResult<Option<Session>> {
        let request = self
            .factory
            .http
            .post(self.auth_url("token?grant_type=refresh_token"))
            .bearer_auth(&self.factory.anon_key)
            .json(&json!({ "refresh_token": stale.refresh_token }));
        match self.auth_request::<TokenResponse>(request).await {
            Ok(grant) => {
                let session = grant.to_domain(Utc::now());
                debug!(user_id = %session.user.id, "session refreshed");
                self.persist(&session);
                Ok(Some(session))
            }
            Err(e @ PortError::Backend { .. }) => {
                warn!(user_id = %stale.user.id, error = %e, "refresh token rejected, clearing session");
                self.forget();
                Ok(None)
            }
            Err(e) => {
                warn!(user_id = %stale.user.id, error = %e, "session refresh failed, keeping the stored session");
                Err(e)
            }
        }
    }

    /// Access token of the current session, or the anon key for visitors.
    async fn bearer(&self) -> PortResult<String> {
        Ok(self
            .get_session()
            .await?
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.factory.anon_key.clone()))
    }
}

//=========================================================================================
// AuthService Implementation
//=========================================================================================

#[async_trait]
impl AuthService for HostedBackendClient {
    async fn get_session(&self) -> PortResult<Option<Session>> {
        let cached = self.current.lock().clone();
        if cached.is_some() {
            return Ok(cached);
        }
        let Some(stored) = auth_cookie::read_session(self.store.as_ref(), &self.factory.cookie_name)
        else {
            return Ok(None);
        };
        if stored.expires_within(Utc::now(), REFRESH_MARGIN_SECS) {
            return self.refresh(&stored).await;
        }
        *self.current.lock() = Some(stored.clone());
        Ok(Some(stored))
    }

    async fn get_user(&self) -> PortResult<Option<User>> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };
        let request = self
            .factory
            .http
            .get(self.auth_url("user"))
            .bearer_auth(&session.access_token);
        match self.auth_request::<User>(request).await {
            Ok(user) => Ok(Some(user)),
            Err(PortError::Backend { message, .. }) => {
                debug!(%message, "access token not accepted");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<Session> {
        let request = self
            .factory
            .http
            .post(self.auth_url("token?grant_type=password"))
            .bearer_auth(&self.factory.anon_key)
            .json(&json!({ "email": email, "password": password }));
        let session = self.auth_request::<TokenResponse>(request).await?.to_domain(Utc::now());
        info!(user_id = %session.user.id, "user signed in");
        self.persist(&session);
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, role: Role) -> PortResult<Option<Session>> {
        let request = self
            .factory
            .http
            .post(self.auth_url("signup"))
            .bearer_auth(&self.factory.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "role": role.as_str() },
            }));
        let body: Value = self.auth_request(request).await?;

        // Without auto-confirm the service answers with the bare user.
        if body.get("access_token").is_none() {
            info!(role = %role, "user signed up, confirmation pending");
            return Ok(None);
        }
        let session = serde_json::from_value::<TokenResponse>(body)
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .to_domain(Utc::now());
        info!(user_id = %session.user.id, role = %role, "user signed up");
        self.persist(&session);
        Ok(Some(session))
    }

    async fn sign_out(&self) -> PortResult<()> {
        let session = self.current.lock().clone().or_else(|| {
            auth_cookie::read_session(self.store.as_ref(), &self.factory.cookie_name)
        });
        self.forget();

        let Some(session) = session else {
            return Ok(());
        };
        let request = self
            .factory
            .http
            .post(self.auth_url("logout"))
            .bearer_auth(&session.access_token);
        let response = request
            .header("apikey", &self.factory.anon_key)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("auth service unreachable: {}", e)))?;
        let status = response.status();
        // An expired token cannot be revoked remotely; the local session is gone anyway.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            info!(user_id = %session.user.id, "user signed out");
            return Ok(());
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Err(auth_error(status, &body))
    }
}

//=========================================================================================
// DatabaseService Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for HostedBackendClient {
    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        let bearer = self.bearer().await?;
        self.factory
            .rest
            .from("profiles", &bearer)
            .select(PROFILE_COLUMNS)
            .eq("id", user_id)
            .maybe_single()
            .await
    }

    async fn update_profile_role(&self, user_id: Uuid, role: Role) -> PortResult<()> {
        let bearer = self.bearer().await?;
        let rows: Vec<Value> = self
            .factory
            .rest
            .from("profiles", &bearer)
            .eq("id", user_id)
            .update(&json!({ "user_role": role.as_str() }))?
            .execute()
            .await?;
        debug!(%user_id, table = "profiles", updated = rows.len(), "role rewrite sent");
        Ok(())
    }

    async fn list_profiles(&self, ids: &[Uuid]) -> PortResult<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let bearer = self.bearer().await?;
        self.factory
            .rest
            .from("profiles", &bearer)
            .select(PROFILE_COLUMNS)
            .in_("id", ids)
            .execute()
            .await
    }

    async fn list_facilities(&self) -> PortResult<Vec<Facility>> {
        let bearer = self.bearer().await?;
        let records: Vec<FacilityRecord> = self
            .factory
            .rest
            .from("facilities", &bearer)
            .select(FACILITY_COLUMNS)
            .order("name", true)
            .execute()
            .await?;
        Ok(records.into_iter().map(FacilityRecord::to_domain).collect())
    }

    async fn insert_facility(&self, facility: &NewFacility) -> PortResult<Facility> {
        let bearer = self.bearer().await?;
        let record: FacilityRecord = self
            .factory
            .rest
            .from("facilities", &bearer)
            .select(FACILITY_COLUMNS)
            .insert(facility)?
            .single()
            .await?;
        info!(facility_id = %record.id, manager_id = %facility.manager_id, table = "facilities", "facility created");
        Ok(record.to_domain())
    }

    async fn find_instructor_id_by_user(&self, user_id: Uuid) -> PortResult<Option<Uuid>> {
        let bearer = self.bearer().await?;
        let record: Option<IdRecord> = self
            .factory
            .rest
            .from("instructors", &bearer)
            .select("id")
            .eq("user_id", user_id)
            .maybe_single()
            .await?;
        Ok(record.map(|r| r.id))
    }

    async fn insert_instructor(&self, instructor: &NewInstructor) -> PortResult<Uuid> {
        let bearer = self.bearer().await?;
        let id: Uuid = self
            .factory
            .rest
            .rpc("create_instructor_profile", &bearer, &json!({ "payload": instructor }))?
            .call()
            .await?;
        info!(
            instructor_id = %id,
            user_id = %instructor.user_id,
            services = instructor.services.len(),
            availability_rules = instructor.availability_rules.len(),
            "instructor created"
        );
        Ok(id)
    }

    async fn list_instructors(&self) -> PortResult<Vec<Instructor>> {
        let bearer = self.bearer().await?;
        let records: Vec<InstructorRecord> = self
            .factory
            .rest
            .from("instructors", &bearer)
            .select(INSTRUCTOR_COLUMNS)
            .order("created_at", false)
            .execute()
            .await?;
        Ok(records.into_iter().map(InstructorRecord::to_domain).collect())
    }
}
