//! Persisted security settings store.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, Secret};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use super::ServiceError;
use crate::config::EndpointConfig;
use crate::models::{NewSecuritySettings, SecuritySettings, SettingsPatch};

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// `Ok(None)` when the account has no row yet.
    async fn read_settings(&self, user_id: Uuid) -> Result<Option<SecuritySettings>, ServiceError>;

    /// Fails with [`ServiceError::Conflict`] if a row already exists.
    async fn create_settings(
        &self,
        settings: &NewSecuritySettings,
    ) -> Result<SecuritySettings, ServiceError>;

    /// Partial update; only `two_factor_verified_at` is ever sent.
    async fn patch_settings(&self, user_id: Uuid, patch: &SettingsPatch) -> Result<(), ServiceError>;
}

/// REST client for the settings service.
#[derive(Clone)]
pub struct HttpSettingsStore {
    client: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
}

impl HttpSettingsStore {
    pub fn new(config: &EndpointConfig) -> Self {
        tracing::info!(url = %config.url, "Settings store client configured");
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn row_url(&self, user_id: Uuid) -> String {
        format!("{}/security-settings/{}", self.base_url, user_id)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait]
impl SettingsStore for HttpSettingsStore {
    #[instrument(skip(self))]
    async fn read_settings(&self, user_id: Uuid) -> Result<Option<SecuritySettings>, ServiceError> {
        let response = self
            .authorized(self.client.get(self.row_url(user_id)))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(ServiceError::from_status(status, "read_settings")),
        }
    }

    #[instrument(skip(self, settings), fields(user_id = %settings.user_id))]
    async fn create_settings(
        &self,
        settings: &NewSecuritySettings,
    ) -> Result<SecuritySettings, ServiceError> {
        let url = format!("{}/security-settings", self.base_url);
        let response = self
            .authorized(self.client.post(url))
            .json(settings)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(ServiceError::from_status(status, "create_settings"))
        }
    }

    #[instrument(skip(self, patch))]
    async fn patch_settings(&self, user_id: Uuid, patch: &SettingsPatch) -> Result<(), ServiceError> {
        let response = self
            .authorized(self.client.patch(self.row_url(user_id)))
            .json(patch)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ServiceError::from_status(status, "patch_settings"))
        }
    }
}

/// In-process store with call counters and failure injection.
#[derive(Default)]
pub struct InMemorySettingsStore {
    rows: Mutex<HashMap<Uuid, SecuritySettings>>,
    pending_conflict: Mutex<Option<SecuritySettings>>,
    fail_reads: AtomicBool,
    fail_creates: AtomicBool,
    failing_patches: AtomicU32,
    reads: AtomicUsize,
    creates: AtomicUsize,
    patches: AtomicUsize,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row(settings: SecuritySettings) -> Self {
        let store = Self::new();
        store.insert(settings);
        store
    }

    pub fn insert(&self, settings: SecuritySettings) {
        self.rows_lock().insert(settings.user_id, settings);
    }

    pub fn get(&self, user_id: Uuid) -> Option<SecuritySettings> {
        self.rows_lock().get(&user_id).cloned()
    }

    /// Make every read fail with a transient error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` patches with a transient error.
    pub fn fail_next_patches(&self, count: u32) {
        self.failing_patches.store(count, Ordering::SeqCst);
    }

    /// Simulate another device creating `row` between our read and create.
    pub fn conflict_on_next_create(&self, row: SecuritySettings) {
        *self
            .pending_conflict
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(row);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }

    fn rows_lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, SecuritySettings>> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn read_settings(&self, user_id: Uuid) -> Result<Option<SecuritySettings>, ServiceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ServiceError::Transient(anyhow::anyhow!(
                "settings store unavailable"
            )));
        }
        Ok(self.get(user_id))
    }

    async fn create_settings(
        &self,
        settings: &NewSecuritySettings,
    ) -> Result<SecuritySettings, ServiceError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ServiceError::Transient(anyhow::anyhow!(
                "settings store unavailable"
            )));
        }

        let raced = self
            .pending_conflict
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(row) = raced {
            self.insert(row);
        }

        let mut rows = self.rows_lock();
        if rows.contains_key(&settings.user_id) {
            return Err(ServiceError::Conflict);
        }
        let row = SecuritySettings::from(settings.clone());
        rows.insert(row.user_id, row.clone());
        Ok(row)
    }

    async fn patch_settings(&self, user_id: Uuid, patch: &SettingsPatch) -> Result<(), ServiceError> {
        self.patches.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_patches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(ServiceError::Transient(anyhow::anyhow!(
                "settings store unavailable"
            )));
        }

        let mut rows = self.rows_lock();
        let row = rows.get_mut(&user_id).ok_or_else(|| {
            ServiceError::Unexpected(anyhow::anyhow!("No security settings for {}", user_id))
        })?;
        patch.apply(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TwoFactorMethod;
    use chrono::Utc;

    fn row(user_id: Uuid, enabled: bool) -> SecuritySettings {
        SecuritySettings {
            user_id,
            two_factor_enabled: enabled,
            two_factor_method: TwoFactorMethod::Email,
            two_factor_verified_at: None,
        }
    }

    #[test]
    fn test_row_url_trims_trailing_slash() {
        let store = HttpSettingsStore::new(&EndpointConfig {
            url: "http://settings.local/".to_string(),
            api_key: None,
        });
        let user_id = Uuid::new_v4();
        assert_eq!(
            store.row_url(user_id),
            format!("http://settings.local/security-settings/{}", user_id)
        );
    }

    #[tokio::test]
    async fn test_create_rejects_existing_row() {
        let user_id = Uuid::new_v4();
        let store = InMemorySettingsStore::with_row(row(user_id, true));
        let result = store
            .create_settings(&NewSecuritySettings::privileged_default(user_id, None))
            .await;
        assert!(matches!(result, Err(ServiceError::Conflict)));
    }

    #[tokio::test]
    async fn test_patch_keeps_enabled_flag() {
        let user_id = Uuid::new_v4();
        let store = InMemorySettingsStore::with_row(row(user_id, false));
        let at = Utc::now();
        store
            .patch_settings(user_id, &SettingsPatch::verified_at(at))
            .await
            .unwrap();

        let stored = store.get(user_id).unwrap();
        assert!(!stored.two_factor_enabled);
        assert_eq!(stored.two_factor_verified_at, Some(at));
    }

    #[tokio::test]
    async fn test_failing_patches_count_down() {
        let user_id = Uuid::new_v4();
        let store = InMemorySettingsStore::with_row(row(user_id, true));
        store.fail_next_patches(1);
        let patch = SettingsPatch::verified_at(Utc::now());

        assert!(store.patch_settings(user_id, &patch).await.is_err());
        assert!(store.patch_settings(user_id, &patch).await.is_ok());
        assert_eq!(store.patch_count(), 2);
    }
}
