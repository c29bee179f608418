//! Session Store
//!
//! Owns the current [`SessionIdentity`]: the opaque access token plus the
//! cached user profile. One store exists per client instance and is passed
//! explicitly (`Arc<SessionStore>`) to everything that needs the credential.
//!
//! Lifecycle: [`SessionStore::restore`] on start, [`SessionStore::begin`]
//! after a successful login, [`SessionStore::end`] on logout or when the
//! backend rejects the credential. What survives a restart is decided by
//! [`SessionPolicy`].

use crate::error::{ClientError, ClientResult};
use chrono::{DateTime, Utc};
use finhealth_common::api::{validate_credential, LoginResponse, UserProfile};
use finhealth_common::config::SessionPolicy;
use finhealth_common::events::{DashboardEvent, EventBus};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Credential and cached profile of the logged-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub credential: String,
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
}

/// Process-wide session scope
pub struct SessionStore {
    policy: SessionPolicy,
    path: PathBuf,
    identity: RwLock<Option<SessionIdentity>>,
    events: EventBus,
}

impl SessionStore {
    /// Create an empty store; nothing is read from disk until [`restore`](Self::restore)
    pub fn new(policy: SessionPolicy, path: impl Into<PathBuf>, events: EventBus) -> Self {
        Self {
            policy,
            path: path.into(),
            identity: RwLock::new(None),
            events,
        }
    }

    /// Policy this store was created with
    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Location of the persisted session file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a persisted session, if the policy allows it
    ///
    /// Returns `true` when a session was restored. A corrupt or unusable
    /// file is removed and treated as "no session".
    pub async fn restore(&self) -> ClientResult<bool> {
        if self.policy == SessionPolicy::AlwaysLogin {
            // A file left by an earlier persistent run must not outlive this policy
            self.remove_file().await?;
        }
        if self.policy != SessionPolicy::Persistent {
            debug!(policy = ?self.policy, "Session restore skipped by policy");
            return Ok(false);
        }

        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let identity: SessionIdentity = match serde_json::from_str(&content) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(path = %self.path.display(), "Discarding unreadable session file: {}", e);
                self.remove_file().await?;
                return Ok(false);
            }
        };

        if validate_credential(&identity.credential).is_err() {
            warn!(path = %self.path.display(), "Discarding session file with unusable credential");
            self.remove_file().await?;
            return Ok(false);
        }

        info!(user = %identity.profile.email, "Session restored");
        let display_name = identity.profile.display_name.clone();
        *self.identity.write().await = Some(identity);
        self.events.emit_lossy(DashboardEvent::SessionStarted {
            display_name,
            restored: true,
            timestamp: Utc::now(),
        });
        Ok(true)
    }

    /// Store the result of a successful login
    ///
    /// Only [`SessionPolicy::Persistent`] writes the identity to disk.
    pub async fn begin(&self, login: LoginResponse) -> ClientResult<SessionIdentity> {
        validate_credential(&login.access_token)
            .map_err(|e| ClientError::Decode(format!("login returned unusable token: {}", e)))?;

        let identity = SessionIdentity {
            credential: login.access_token,
            profile: login.user,
            created_at: Utc::now(),
        };

        if self.policy == SessionPolicy::Persistent {
            self.write_file(&identity).await?;
        }

        info!(user = %identity.profile.email, "Session started");
        *self.identity.write().await = Some(identity.clone());
        self.events.emit_lossy(DashboardEvent::SessionStarted {
            display_name: identity.profile.display_name.clone(),
            restored: false,
            timestamp: Utc::now(),
        });
        Ok(identity)
    }

    /// Discard the session (logout or expiry) and its persisted copy
    pub async fn end(&self) -> ClientResult<()> {
        let previous = self.identity.write().await.take();
        self.remove_file().await?;

        if previous.is_some() {
            info!("Session ended");
            self.events.emit_lossy(DashboardEvent::SessionEnded {
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }

    /// Current credential, if logged in
    pub async fn credential(&self) -> Option<String> {
        self.identity
            .read()
            .await
            .as_ref()
            .map(|i| i.credential.clone())
    }

    /// Cached profile, if logged in
    pub async fn profile(&self) -> Option<UserProfile> {
        self.identity.read().await.as_ref().map(|i| i.profile.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.identity.read().await.is_some()
    }

    async fn write_file(&self, identity: &SessionIdentity) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(identity)
            .map_err(|e| ClientError::Common(e.into()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Session persisted");
        Ok(())
    }

    async fn remove_file(&self) -> ClientResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
