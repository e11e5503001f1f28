//! crates/stadion_core/src/authz.rs
//!
//! Per-request authorization: re-derives the caller's role from their
//! profile row and fails closed on anything it cannot confirm.

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ports::{DatabaseService, PortError};
use crate::roles::{Role, RoleMatch, RoleTable};

/// Why the gate refused a caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Denial {
    #[error("profile could not be fetched: {0}")]
    ProfileUnavailable(PortError),
    #[error("no profile row for user")]
    ProfileMissing,
    #[error("role {found:?} does not grant {wanted}")]
    RoleMismatch { wanted: Role, found: Option<String> },
    #[error("stored role could not be rewritten to {0}")]
    NormalizationFailed(Role),
}

impl Denial {
    /// Query parameter used when redirecting a denied page visit.
    ///
    /// Profile failures are reported as `error`, a plain role mismatch as
    /// `message`.
    pub fn redirect_param(&self) -> &'static str {
        match self {
            Self::RoleMismatch { .. } => "message",
            _ => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthorizationGate {
    table: RoleTable,
    /// Rewrite legacy role spellings to the canonical value when seen.
    normalize_legacy_roles: bool,
}

impl AuthorizationGate {
    pub fn new(normalize_legacy_roles: bool) -> Self {
        Self {
            table: RoleTable,
            normalize_legacy_roles,
        }
    }

    pub fn table(&self) -> RoleTable {
        self.table
    }

    /// Confirms that `user_id` holds `wanted`.
    pub async fn require_role<D: DatabaseService + ?Sized>(
        &self,
        db: &D,
        user_id: Uuid,
        wanted: Role,
    ) -> Result<(), Denial> {
        let profile = match db.fetch_profile(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                warn!(%user_id, "profile not found");
                return Err(Denial::ProfileMissing);
            }
            Err(e) => {
                error!(%user_id, error = %e, "failed to fetch profile");
                return Err(Denial::ProfileUnavailable(e));
            }
        };

        let stored = profile.user_role.as_deref();
        match self.table.classify(stored, wanted) {
            RoleMatch::Canonical => Ok(()),
            RoleMatch::Synonym if self.normalize_legacy_roles => {
                self.normalize(db, user_id, wanted, stored).await
            }
            RoleMatch::Synonym => Ok(()),
            RoleMatch::NoMatch => {
                warn!(%user_id, role = ?stored, wanted = %wanted, "access denied");
                Err(Denial::RoleMismatch {
                    wanted,
                    found: stored.map(str::to_string),
                })
            }
        }
    }

    /// Re-reads the profile and rewrites a legacy spelling if one is still
    /// stored. Used before retrying an insert the backend policy rejected.
    pub async fn renormalize<D: DatabaseService + ?Sized>(
        &self,
        db: &D,
        user_id: Uuid,
        wanted: Role,
    ) -> Result<(), Denial> {
        match db.fetch_profile(user_id).await {
            Ok(Some(profile)) => {
                let stored = profile.user_role.as_deref();
                match self.table.classify(stored, wanted) {
                    RoleMatch::NoMatch => Err(Denial::RoleMismatch {
                        wanted,
                        found: stored.map(str::to_string),
                    }),
                    _ => self.normalize(db, user_id, wanted, stored).await,
                }
            }
            Ok(None) => Err(Denial::ProfileMissing),
            Err(e) => Err(Denial::ProfileUnavailable(e)),
        }
    }

    async fn normalize<D: DatabaseService + ?Sized>(
        &self,
        db: &D,
        user_id: Uuid,
        wanted: Role,
        stored: Option<&str>,
    ) -> Result<(), Denial> {
        if stored == Some(wanted.as_str()) {
            return Ok(());
        }
        info!(%user_id, from = ?stored, to = %wanted, "normalizing stored role");

        if let Err(e) = db.update_profile_role(user_id, wanted).await {
            error!(%user_id, error = %e, "failed to rewrite role");
            return Err(Denial::NormalizationFailed(wanted));
        }

        match db.fetch_profile(user_id).await {
            Ok(Some(profile)) if profile.user_role.as_deref() == Some(wanted.as_str()) => Ok(()),
            Ok(other) => {
                error!(
                    %user_id,
                    role = ?other.and_then(|p| p.user_role),
                    "role rewrite did not stick"
                );
                Err(Denial::NormalizationFailed(wanted))
            }
            Err(e) => {
                error!(%user_id, error = %e, "failed to verify role rewrite");
                Err(Denial::NormalizationFailed(wanted))
            }
        }
    }
}
