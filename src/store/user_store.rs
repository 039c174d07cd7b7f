//! `UserStore`: the in-memory user map, its per-user locks and persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};

use crate::error::StoreError;
use crate::onboarding::model::UserRecord;

use super::traits::{StoreBackend, UserEntries};

/// Durable mapping from user id to [`UserRecord`].
///
/// All mutation of one user's record goes through that user's lock, held for
/// the whole read-modify-persist. Readers get clones; nothing hands out a
/// reference into the map. The in-memory map is authoritative: a failed save
/// is logged, marks the store dirty and is retried by [`UserStore::flush`].
pub struct UserStore {
    backend: Arc<dyn StoreBackend>,
    records: RwLock<BTreeMap<String, UserRecord>>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    save_lock: AsyncMutex<()>,
    dirty: AtomicBool,
}

impl UserStore {
    /// Load the store from `backend`.
    ///
    /// An unreadable document is kept aside and the store starts empty.
    /// Other I/O failures are returned.
    pub async fn open(backend: Arc<dyn StoreBackend>) -> Result<Self, StoreError> {
        let entries = match backend.load().await {
            Ok(entries) => entries,
            Err(StoreError::Malformed { path, reason }) => {
                tracing::warn!(%path, %reason, "User store is malformed, starting empty");
                if let Err(e) = backend.quarantine().await {
                    tracing::warn!(error = %e, "Failed to keep a copy of the malformed store");
                }
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            location = %backend.describe(),
            users = entries.len(),
            "User store opened"
        );

        Ok(Self {
            backend,
            records: RwLock::new(entries.into_iter().collect()),
            locks: Mutex::new(HashMap::new()),
            save_lock: AsyncMutex::new(()),
            dirty: AtomicBool::new(false),
        })
    }

    async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    pub async fn get(&self, user_id: &str) -> Option<UserRecord> {
        self.records.read().await.get(user_id).cloned()
    }

    /// Fetch a record, creating a fresh one at the start of onboarding if the
    /// user is unknown. The flag is `true` when the record was just created.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> (UserRecord, bool) {
        let _guard = self.lock_user(user_id).await;
        if let Some(existing) = self.get(user_id).await {
            return (existing, false);
        }

        let record = UserRecord::new(name, now);
        self.records
            .write()
            .await
            .insert(user_id.to_string(), record.clone());
        tracing::info!(user_id = %user_id, "New user registered");
        self.persist().await;
        (record, true)
    }

    /// Apply `f` to a user's record and persist the result.
    ///
    /// `f` works on a copy: if it returns `Err`, nothing is written. Returns
    /// `Ok(None)` when the user does not exist; the record is never created
    /// here.
    pub async fn update<T, E, F>(&self, user_id: &str, f: F) -> Result<Option<T>, E>
    where
        F: FnOnce(&mut UserRecord) -> Result<T, E>,
    {
        let _guard = self.lock_user(user_id).await;
        let Some(mut scratch) = self.get(user_id).await else {
            return Ok(None);
        };

        let out = f(&mut scratch)?;
        self.records
            .write()
            .await
            .insert(user_id.to_string(), scratch);
        self.persist().await;
        Ok(Some(out))
    }

    /// Delete a user entirely. Returns whether a record existed.
    pub async fn remove(&self, user_id: &str) -> bool {
        let guard = self.lock_user(user_id).await;
        let existed = self.records.write().await.remove(user_id).is_some();
        if existed {
            tracing::info!(user_id = %user_id, "User removed");
            self.persist().await;
        }
        drop(guard);
        self.release_lock(user_id);
        existed
    }

    /// Forget a user's lock once nobody holds or waits on it. Clones are
    /// only taken under the map lock, so a count of one is final.
    fn release_lock(&self, user_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(user_id);
        }
    }

    /// Point-in-time copy of every record, ordered by user id.
    pub async fn snapshot(&self) -> UserEntries {
        self.records
            .read()
            .await
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    pub async fn all_users(&self) -> UserEntries {
        self.snapshot().await
    }

    /// Users with reminders enabled and an interval set.
    pub async fn active_users(&self) -> UserEntries {
        self.records
            .read()
            .await
            .iter()
            .filter(|(_, record)| record.is_active())
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Write the current map if an earlier save failed.
    pub async fn flush(&self) -> Result<(), StoreError> {
        if !self.is_dirty() {
            return Ok(());
        }
        self.save_now().await
    }

    async fn persist(&self) {
        if let Err(e) = self.save_now().await {
            tracing::warn!(
                location = %self.backend.describe(),
                error = %e,
                "Failed to persist user store"
            );
        }
    }

    async fn save_now(&self) -> Result<(), StoreError> {
        let _save = self.save_lock.lock().await;
        let entries = self.snapshot().await;
        match self.backend.save(&entries).await {
            Ok(()) => {
                self.dirty.store(false, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;
    use crate::onboarding::state::Step;
    use crate::store::json_file::JsonFileBackend;
    use crate::store::memory::MemoryBackend;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 9, 30, 0).unwrap()
    }

    async fn memory_store() -> (Arc<UserStore>, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = UserStore::open(backend.clone()).await.unwrap();
        (Arc::new(store), backend)
    }

    #[tokio::test]
    async fn get_or_create_creates_once() {
        let (store, backend) = memory_store().await;

        let (record, created) = store.get_or_create("u1", "Ana", now()).await;
        assert!(created);
        assert_eq!(record.step, Step::AwaitingAge);
        assert_eq!(backend.save_count(), 1);

        let later = now() + chrono::Duration::hours(1);
        let (again, created) = store.get_or_create("u1", "Other", later).await;
        assert!(!created);
        assert_eq!(again.name, "Ana");
        assert_eq!(again.created_at, now());
        assert_eq!(backend.save_count(), 1);
    }

    #[tokio::test]
    async fn update_missing_user_returns_none() {
        let (store, backend) = memory_store().await;
        let out: Result<Option<()>, ()> = store.update("ghost", |_| Ok(())).await;
        assert_eq!(out, Ok(None));
        assert_eq!(store.count().await, 0);
        assert_eq!(backend.save_count(), 0);
    }

    #[tokio::test]
    async fn failed_update_writes_nothing() {
        let (store, backend) = memory_store().await;
        store.get_or_create("u1", "Ana", now()).await;
        let saves = backend.save_count();

        let out: Result<Option<()>, &str> = store
            .update("u1", |record| {
                record.age = Some(99);
                Err("rejected")
            })
            .await;
        assert_eq!(out, Err("rejected"));
        assert_eq!(store.get("u1").await.unwrap().age, None);
        assert_eq!(backend.save_count(), saves);
    }

    #[tokio::test]
    async fn update_is_persisted_before_returning() {
        let (store, backend) = memory_store().await;
        store.get_or_create("u1", "Ana", now()).await;

        store
            .update("u1", |record| {
                record.age = Some(31);
                Ok::<_, ()>(())
            })
            .await
            .unwrap();

        let saved = backend.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].1.age, Some(31));
    }

    #[tokio::test]
    async fn concurrent_updates_serialize_per_user() {
        let (store, _backend) = memory_store().await;
        store.get_or_create("u1", "Ana", now()).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update("u1", |record| {
                        record.streak += 1;
                        Ok::<_, ()>(())
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get("u1").await.unwrap().streak, 50);
    }

    #[tokio::test]
    async fn remove_deletes_record() {
        let (store, backend) = memory_store().await;
        store.get_or_create("u1", "Ana", now()).await;
        assert!(store.remove("u1").await);
        assert!(!store.remove("u1").await);
        assert!(store.get("u1").await.is_none());
        assert!(backend.saved().is_empty());
    }

    #[tokio::test]
    async fn remove_releases_user_lock() {
        let (store, _backend) = memory_store().await;
        for i in 0..100 {
            let id = format!("u{i}");
            store.get_or_create(&id, "Ana", now()).await;
            store.remove(&id).await;
        }
        assert!(store.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_keeps_lock_someone_else_holds() {
        let (store, _backend) = memory_store().await;
        store.get_or_create("u1", "Ana", now()).await;
        let held = store.locks.lock().unwrap().get("u1").cloned().unwrap();

        store.remove("u1").await;
        let locks = store.locks.lock().unwrap();
        assert!(Arc::ptr_eq(locks.get("u1").unwrap(), &held));
    }

    #[tokio::test]
    async fn active_users_filters_paused_and_unconfigured() {
        let (store, _backend) = memory_store().await;
        for id in ["a", "b", "c"] {
            store.get_or_create(id, id, now()).await;
        }
        store
            .update("a", |r| {
                r.reminder_interval_ms = Some(30 * 60_000);
                r.reminders_enabled = true;
                Ok::<_, ()>(())
            })
            .await
            .unwrap();
        store
            .update("b", |r| {
                r.reminder_interval_ms = Some(30 * 60_000);
                r.reminders_enabled = false;
                Ok::<_, ()>(())
            })
            .await
            .unwrap();

        let active = store.active_users().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0, "a");
        assert_eq!(store.count().await, 3);
        assert_eq!(store.all_users().await.len(), 3);
    }

    #[tokio::test]
    async fn failed_save_marks_dirty_until_flushed() {
        let (store, backend) = memory_store().await;
        backend.set_fail_saves(true);

        store.get_or_create("u1", "Ana", now()).await;
        assert!(store.is_dirty());
        assert!(store.get("u1").await.is_some());
        assert!(store.flush().await.is_err());

        backend.set_fail_saves(false);
        store.flush().await.unwrap();
        assert!(!store.is_dirty());
        assert_eq!(backend.saved().len(), 1);
    }

    #[tokio::test]
    async fn reopens_from_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");

        {
            let store = UserStore::open(Arc::new(JsonFileBackend::new(&path)))
                .await
                .unwrap();
            store.get_or_create("u1", "Ana", now()).await;
            store
                .update("u1", |r| {
                    r.age = Some(25);
                    r.step = Step::AwaitingWeight;
                    Ok::<_, ()>(())
                })
                .await
                .unwrap();
        }

        let store = UserStore::open(Arc::new(JsonFileBackend::new(&path)))
            .await
            .unwrap();
        let record = store.get("u1").await.unwrap();
        assert_eq!(record.age, Some(25));
        assert_eq!(record.step, Step::AwaitingWeight);
    }

    #[tokio::test]
    async fn malformed_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "[[\"u1\", {\"broken\": ").unwrap();

        let store = UserStore::open(Arc::new(JsonFileBackend::new(&path)))
            .await
            .unwrap();
        assert_eq!(store.count().await, 0);
        assert!(dir.path().join("users.json.corrupt").exists());
    }

    #[tokio::test]
    async fn binary_garbage_opens_empty_and_is_overwritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, [0xff, 0xfe, b'[', 0x80]).unwrap();

        let store = UserStore::open(Arc::new(JsonFileBackend::new(&path)))
            .await
            .unwrap();
        assert_eq!(store.count().await, 0);
        assert_eq!(
            std::fs::read(dir.path().join("users.json.corrupt")).unwrap(),
            vec![0xff, 0xfe, b'[', 0x80]
        );

        store.get_or_create("u1", "Ana", Utc::now()).await;
        let reopened = UserStore::open(Arc::new(JsonFileBackend::new(&path)))
            .await
            .unwrap();
        assert!(reopened.get("u1").await.is_some());
    }
}
