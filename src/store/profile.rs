//! The signed-in user's profile row and the session state that caches it.

use super::StoreError;
use crate::database::db::timestamp;
use crate::database::{
    AuthEvent, Backend, BackendError, Collection, Filter, Identity, from_record, to_record,
};
use crate::models::{ProfileUpdate, UserProfile};
use chrono::Utc;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide profile state.
///
/// Populated by [`ProfileStore::load_profile`], cleared on sign-out, and
/// shared through an `Arc` by everything that needs the current profile.
#[derive(Debug, Default)]
pub struct ProfileSession {
    cache: Mutex<HashMap<String, UserProfile>>,
    current: Mutex<Option<UserProfile>>,
    loading: AtomicBool,
}

impl ProfileSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<UserProfile> {
        lock(&self.current).clone()
    }

    pub fn cached(&self, user_id: &str) -> Option<UserProfile> {
        lock(&self.cache).get(user_id).cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        *lock(&self.current) = None;
        lock(&self.cache).clear();
    }

    fn set_current(&self, profile: Option<UserProfile>) {
        *lock(&self.current) = profile;
    }

    fn remember(&self, profile: UserProfile) {
        lock(&self.cache).insert(profile.id.clone(), profile.clone());
        self.set_current(Some(profile));
    }

    fn begin_load(&self) -> LoadingGuard<'_> {
        self.loading.store(true, Ordering::SeqCst);
        LoadingGuard { session: self }
    }
}

/// Clears the loading flag however the load ends.
struct LoadingGuard<'a> {
    session: &'a ProfileSession,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.session.loading.store(false, Ordering::SeqCst);
    }
}

/// Where avatar ids resolve to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    pub base_url: String,
    pub default_id: String,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            base_url: "/images/kawaii".to_string(),
            default_id: "kawaii-bear".to_string(),
        }
    }
}

impl AvatarConfig {
    /// External photo URLs pass through unchanged.
    pub fn url_for(&self, avatar_id: &str) -> String {
        if avatar_id.starts_with("http") {
            avatar_id.to_string()
        } else {
            format!("{}/{avatar_id}.png", self.base_url.trim_end_matches('/'))
        }
    }

    pub fn default_url(&self) -> String {
        self.url_for(&self.default_id)
    }
}

pub struct ProfileStore {
    backend: Arc<dyn Backend>,
    session: Arc<ProfileSession>,
    avatars: AvatarConfig,
}

impl ProfileStore {
    pub fn new(backend: Arc<dyn Backend>, session: Arc<ProfileSession>, avatars: AvatarConfig) -> Self {
        Self {
            backend,
            session,
            avatars,
        }
    }

    pub fn session(&self) -> &Arc<ProfileSession> {
        &self.session
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.backend.current_identity()
    }

    /// Loads the signed-in user's profile, creating the row on first
    /// sign-in. Failures are logged and leave no current profile.
    pub fn load_profile(&self, force_refresh: bool) -> Option<UserProfile> {
        if self.session.is_loading() && !force_refresh {
            return self.session.current();
        }

        let Some(identity) = self.backend.current_identity() else {
            self.session.clear();
            return None;
        };

        if !force_refresh {
            if let Some(cached) = self.session.cached(&identity.id) {
                self.session.set_current(Some(cached.clone()));
                return Some(cached);
            }
        }

        let _loading = self.session.begin_load();
        match self.fetch_or_create(&identity) {
            Ok(profile) => {
                self.session.remember(profile.clone());
                Some(profile)
            }
            Err(e) => {
                error!("Error loading user profile: {e}");
                self.session.set_current(None);
                None
            }
        }
    }

    fn fetch_or_create(&self, identity: &Identity) -> Result<UserProfile, BackendError> {
        match self
            .backend
            .fetch_one(Collection::Users, &Filter::by_id(&identity.id))
        {
            Ok(row) => from_record(row),
            Err(BackendError::NotFound) => self.create_profile(identity),
            Err(e) => Err(e),
        }
    }

    /// Inserts the profile row for a new user. The display name falls back
    /// to the local part of the e-mail address.
    pub fn create_profile(&self, identity: &Identity) -> Result<UserProfile, BackendError> {
        let profile = self.new_profile(identity);
        let stored = self
            .backend
            .insert(Collection::Users, to_record(&profile)?)?;
        info!("Created user profile for {}", identity.id);
        from_record(stored)
    }

    fn new_profile(&self, identity: &Identity) -> UserProfile {
        let full_name = identity.full_name.clone().unwrap_or_default();
        let display_name = if full_name.is_empty() {
            identity
                .email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .unwrap_or_default()
                .to_string()
        } else {
            full_name.clone()
        };

        let (avatar_id, avatar_url) = match &identity.avatar_url {
            Some(external) => (external.clone(), external.clone()),
            None => (self.avatars.default_id.clone(), self.avatars.default_url()),
        };

        UserProfile {
            id: identity.id.clone(),
            email: identity.email.clone(),
            full_name,
            display_name,
            avatar_id: Some(avatar_id),
            avatar_url: Some(avatar_url),
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }

    /// Makes sure a users row exists for `user_id` before something that
    /// references it is written. A concurrent insert of the same row counts
    /// as success.
    pub fn ensure_profile(&self, user_id: &str) -> Result<(), StoreError> {
        if self
            .backend
            .fetch_one(Collection::Users, &Filter::by_id(user_id))
            .is_ok()
        {
            return Ok(());
        }

        let Some(identity) = self.backend.current_identity() else {
            debug!("No identity to provision a profile for {user_id}");
            return Ok(());
        };

        let record = to_record(&self.new_profile(&identity))?;
        match self.backend.insert(Collection::Users, record) {
            Ok(_) | Err(BackendError::DuplicateKey(_)) => Ok(()),
            Err(e) => Err(StoreError::ProfileProvisioning(e)),
        }
    }

    /// Writes `update` to the loaded profile. Changing the avatar id also
    /// recomputes the avatar URL.
    pub fn update_profile(&self, update: ProfileUpdate) -> Result<UserProfile, StoreError> {
        let current = self.session.current().ok_or(StoreError::NoProfileLoaded)?;

        let mut patch = to_record(&update)?;
        patch.insert("updated_at".to_string(), Value::String(timestamp(Utc::now())));
        if let Some(avatar_id) = &update.avatar_id {
            patch.insert(
                "avatar_url".to_string(),
                Value::String(self.avatars.url_for(avatar_id)),
            );
        }

        let filter = Filter::by_id(&current.id);
        self.backend.update(Collection::Users, &filter, patch)?;
        let profile: UserProfile = from_record(self.backend.fetch_one(Collection::Users, &filter)?)?;

        self.session.remember(profile.clone());
        info!("Profile updated for {}", profile.id);
        Ok(profile)
    }

    pub fn avatar_url_for(&self, profile: Option<&UserProfile>) -> String {
        let Some(profile) = profile else {
            return self.avatars.default_url();
        };
        profile
            .avatar_id
            .as_deref()
            .map(|id| self.avatars.url_for(id))
            .or_else(|| profile.avatar_url.clone())
            .unwrap_or_else(|| self.avatars.default_url())
    }

    /// Reacts to a (debounced) auth state change.
    pub fn handle_auth_event(&self, event: &AuthEvent) {
        match event {
            AuthEvent::SignedIn(identity) => match self.session.cached(&identity.id) {
                Some(cached) => self.session.set_current(Some(cached)),
                None => {
                    self.load_profile(false);
                }
            },
            AuthEvent::SignedOut => self.session.clear(),
        }
    }
}
