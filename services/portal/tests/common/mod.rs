//! In-memory stand-in for the hosted backend, plus request helpers.
//!
//! The fake resolves the caller from the auth cookie value: each cookie value
//! is an opaque token mapped to a user. Tokens listed in `stale` are rotated
//! by `get_session`, the way the real client rotates an expiring session.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use portal_lib::{build_router, config::Config, web::state::AppState};
use stadion_core::domain::{Facility, Instructor, NewFacility, NewInstructor, Profile, Session, User};
use stadion_core::ports::{
    AuthService, BackendClient, ClientFactory, CookieOptions, DatabaseService, PortError, PortResult,
    SessionStore,
};
use stadion_core::{Role, UserMetadata};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;
use uuid::Uuid;

pub const COOKIE: &str = "sb-test-auth-token";
pub const PASSWORD: &str = "secret1";

//=========================================================================================
// Backend State
//=========================================================================================

#[derive(Default)]
pub struct World {
    /// token -> user
    pub sessions: HashMap<String, User>,
    /// stale token -> fresh token
    pub stale: HashMap<String, String>,
    pub profiles: HashMap<Uuid, Profile>,
    pub facilities: Vec<Facility>,
    pub facility_inserts: Vec<NewFacility>,
    /// user id -> instructor id
    pub instructors: HashMap<Uuid, Uuid>,
    pub instructor_inserts: Vec<NewInstructor>,
    pub instructor_attempts: usize,
    /// Number of upcoming instructor inserts to reject with a policy error.
    pub rls_rejections: usize,
    pub role_updates: Vec<(Uuid, Role)>,
    pub sign_outs: usize,
    /// Makes `get_session` fail as if the auth service were down.
    pub session_outage: bool,
    /// Holds the next facility listing after it has read its rows.
    pub list_pause: Option<ListPause>,
}

/// A pause point inside a listing fetch.
#[derive(Clone, Default)]
pub struct ListPause {
    pub reached: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub world: Arc<Mutex<World>>,
}

impl FakeBackend {
    /// Registers a signed-in user with the given stored role. Returns the
    /// user and the cookie token that identifies them.
    pub fn user(&self, email: &str, role: Option<&str>) -> (User, String) {
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: UserMetadata::default(),
        };
        let token = format!("token-{}", user.id);
        let mut world = self.world.lock();
        world.sessions.insert(token.clone(), user.clone());
        world.profiles.insert(
            user.id,
            Profile {
                id: user.id,
                user_role: role.map(str::to_string),
                display_name: Some(email.split('@').next().unwrap_or(email).to_string()),
                avatar_url: None,
            },
        );
        (user, token)
    }

    pub fn drop_profile(&self, user_id: Uuid) {
        self.world.lock().profiles.remove(&user_id);
    }

    pub fn stored_role(&self, user_id: Uuid) -> Option<String> {
        self.world
            .lock()
            .profiles
            .get(&user_id)
            .and_then(|p| p.user_role.clone())
    }
}

impl ClientFactory for FakeBackend {
    fn bind(&self, store: Arc<dyn SessionStore>) -> Arc<dyn BackendClient> {
        Arc::new(FakeClient {
            world: self.world.clone(),
            store,
        })
    }
}

struct FakeClient {
    world: Arc<Mutex<World>>,
    store: Arc<dyn SessionStore>,
}

impl FakeClient {
    fn session_for(token: &str, user: &User) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: format!("refresh-{}", token),
            expires_at: Utc::now().timestamp() + 3600,
            token_type: "bearer".to_string(),
            user: user.clone(),
        }
    }

    fn caller(&self) -> Option<User> {
        let token = self.store.get(COOKIE)?;
        self.world.lock().sessions.get(&token).cloned()
    }
}

#[async_trait]
impl AuthService for FakeClient {
    async fn get_session(&self) -> PortResult<Option<Session>> {
        if self.world.lock().session_outage {
            return Err(PortError::Unexpected("auth service unavailable (503)".to_string()));
        }
        let Some(token) = self.store.get(COOKIE) else {
            return Ok(None);
        };
        let (fresh, user) = {
            let world = self.world.lock();
            match world.stale.get(&token) {
                Some(fresh) => (Some(fresh.clone()), world.sessions.get(fresh).cloned()),
                None => (None, world.sessions.get(&token).cloned()),
            }
        };
        match (fresh, user) {
            (Some(fresh), Some(user)) => {
                self.store.try_set(COOKIE, &fresh, &CookieOptions::default());
                Ok(Some(Self::session_for(&fresh, &user)))
            }
            (None, Some(user)) => Ok(Some(Self::session_for(&token, &user))),
            (_, None) => Ok(None),
        }
    }

    async fn get_user(&self) -> PortResult<Option<User>> {
        Ok(self.caller())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<Session> {
        let found = {
            let world = self.world.lock();
            world
                .sessions
                .iter()
                .find(|(_, u)| u.email.as_deref() == Some(email))
                .map(|(token, user)| (token.clone(), user.clone()))
        };
        match found {
            Some((token, user)) if password == PASSWORD => {
                self.store.try_set(COOKIE, &token, &CookieOptions::default());
                Ok(Self::session_for(&token, &user))
            }
            _ => Err(PortError::backend(Some("invalid_credentials"), "Invalid login credentials")),
        }
    }

    async fn sign_up(&self, email: &str, _password: &str, _role: Role) -> PortResult<Option<Session>> {
        let taken = self
            .world
            .lock()
            .sessions
            .values()
            .any(|u| u.email.as_deref() == Some(email));
        if taken {
            return Err(PortError::backend(Some("user_already_exists"), "User already registered"));
        }
        Ok(None)
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.world.lock().sign_outs += 1;
        self.store.try_remove(COOKIE, &CookieOptions::default());
        Ok(())
    }
}

#[async_trait]
impl DatabaseService for FakeClient {
    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        Ok(self.world.lock().profiles.get(&user_id).cloned())
    }

    async fn update_profile_role(&self, user_id: Uuid, role: Role) -> PortResult<()> {
        let mut world = self.world.lock();
        world.role_updates.push((user_id, role));
        if let Some(profile) = world.profiles.get_mut(&user_id) {
            profile.user_role = Some(role.as_str().to_string());
        }
        Ok(())
    }

    async fn list_profiles(&self, ids: &[Uuid]) -> PortResult<Vec<Profile>> {
        let world = self.world.lock();
        Ok(ids.iter().filter_map(|id| world.profiles.get(id).cloned()).collect())
    }

    async fn list_facilities(&self) -> PortResult<Vec<Facility>> {
        let (mut facilities, pause) = {
            let mut world = self.world.lock();
            (world.facilities.clone(), world.list_pause.take())
        };
        if let Some(pause) = pause {
            pause.reached.notify_one();
            pause.release.notified().await;
        }
        facilities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(facilities)
    }

    async fn insert_facility(&self, facility: &NewFacility) -> PortResult<Facility> {
        let mut world = self.world.lock();
        let manager_name = world
            .profiles
            .get(&facility.manager_id)
            .and_then(|p| p.display_name.clone());
        let created = Facility {
            id: Uuid::new_v4(),
            name: facility.name.clone(),
            address: facility.address.clone(),
            facility_type: facility.facility_type.clone(),
            capacity: Some(facility.capacity),
            description: facility.description.clone(),
            contact_phone: facility.contact_phone.clone(),
            contact_email: facility.contact_email.clone(),
            operating_hours_info: facility.operating_hours_info.clone(),
            status: Some(stadion_core::FacilityStatus::Available),
            manager_id: facility.manager_id,
            manager_name,
        };
        world.facility_inserts.push(facility.clone());
        world.facilities.push(created.clone());
        Ok(created)
    }

    async fn find_instructor_id_by_user(&self, user_id: Uuid) -> PortResult<Option<Uuid>> {
        Ok(self.world.lock().instructors.get(&user_id).copied())
    }

    async fn insert_instructor(&self, instructor: &NewInstructor) -> PortResult<Uuid> {
        let mut world = self.world.lock();
        world.instructor_attempts += 1;
        if world.rls_rejections > 0 {
            world.rls_rejections -= 1;
            return Err(PortError::backend(
                Some("42501"),
                "new row violates row-level security policy for table \"instructors\"",
            ));
        }
        if world.instructors.contains_key(&instructor.user_id) {
            return Err(PortError::backend(
                Some("23505"),
                "duplicate key value violates unique constraint \"instructors_user_id_key\"",
            ));
        }
        let id = Uuid::new_v4();
        world.instructors.insert(instructor.user_id, id);
        world.instructor_inserts.push(instructor.clone());
        Ok(id)
    }

    async fn list_instructors(&self) -> PortResult<Vec<Instructor>> {
        let world = self.world.lock();
        Ok(world
            .instructor_inserts
            .iter()
            .rev()
            .filter_map(|new| {
                Some(Instructor {
                    id: *world.instructors.get(&new.user_id)?,
                    user_id: new.user_id,
                    specialty: Some(new.specialty.clone()),
                    bio: new.bio.clone(),
                    profile_pic_url: new.profile_pic_url.clone(),
                    is_available: new.is_available,
                    contact_email: None,
                    contact_phone: None,
                    created_at: Some(Utc::now()),
                })
            })
            .collect())
    }
}

//=========================================================================================
// App and Request Helpers
//=========================================================================================

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        backend_url: "http://localhost:54321".to_string(),
        backend_anon_key: "anon".to_string(),
        backend_timeout: Duration::from_secs(5),
        auth_cookie_name: COOKIE.to_string(),
        cookie_secure: false,
        log_level: tracing::Level::DEBUG,
        legacy_role_rewrite: true,
        listing_cache_ttl: Duration::ZERO,
        cors_origin: None,
    }
}

pub fn app_with(backend: &FakeBackend, config: Config) -> Router {
    let state = AppState::new(Arc::new(backend.clone()), Arc::new(config));
    build_router(Arc::new(state))
}

pub fn app(backend: &FakeBackend) -> Router {
    app_with(backend, test_config())
}

pub fn get(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("{}={}", COOKIE, token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_form(path: &str, token: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let encoded = reqwest::Url::parse_with_params("http://portal.test/", fields)
        .unwrap()
        .query()
        .unwrap_or_default()
        .to_string();
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("{}={}", COOKIE, token));
    }
    builder.body(Body::from(encoded)).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default()
}

pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

pub fn assert_redirect(response: &Response, prefix: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(response);
    assert!(target.starts_with(prefix), "redirected to {target}, expected {prefix}");
}
