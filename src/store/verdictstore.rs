// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::ikvstore::IKeyValueStore;
use super::snapshot::{self, VerdictSnapshot};
use crate::token::Verdicts;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

/// Key of the snapshot record in the backing store
pub const SNAPSHOT_KEY: &str = "verdict_snapshot";

/// Stored in place of an empty failure description
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Current wall-clock time in milliseconds since the epoch
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Holder of the single current [`VerdictSnapshot`].
///
/// The snapshot is kept as one record under [`SNAPSHOT_KEY`] and replaced as
/// a whole on every write.  Published snapshots are immutable: a write builds
/// a new one and swaps it into the watch channel once the backing store has
/// accepted it, so observers never block the writer and never see a partial
/// update.  Writers are serialised, and each write starts from the record
/// currently in the backing store, which other processes may have updated.
pub struct VerdictStore {
    kv: Arc<dyn IKeyValueStore>,
    published: watch::Sender<Arc<VerdictSnapshot>>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for VerdictStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerdictStore")
            .field("latest", &*self.published.borrow())
            .finish()
    }
}

async fn fetch(kv: &dyn IKeyValueStore) -> Result<VerdictSnapshot, Error> {
    match kv.get(SNAPSHOT_KEY).await? {
        Some(buf) => snapshot::decode(&buf),
        None => Ok(VerdictSnapshot::default()),
    }
}

impl VerdictStore {
    /// Load the current snapshot from `kv`.  A store that has never been
    /// written yields the never-checked default.
    pub async fn open(kv: Arc<dyn IKeyValueStore>) -> Result<Self, Error> {
        let initial = fetch(kv.as_ref()).await?;
        let (published, _) = watch::channel(Arc::new(initial));

        Ok(Self {
            kv,
            published,
            writer: Mutex::new(()),
        })
    }

    /// Read the snapshot from the backing store
    pub async fn read(&self) -> Result<Arc<VerdictSnapshot>, Error> {
        fetch(self.kv.as_ref()).await.map(Arc::new)
    }

    /// The most recently written snapshot, without touching the backing store
    pub fn latest(&self) -> Arc<VerdictSnapshot> {
        self.published.borrow().clone()
    }

    /// A receiver woken after every write
    pub fn subscribe(&self) -> watch::Receiver<Arc<VerdictSnapshot>> {
        self.published.subscribe()
    }

    /// Record a successful check: replace all verdicts and clear the error
    pub async fn record_success(&self, verdicts: &Verdicts) -> Result<Arc<VerdictSnapshot>, Error> {
        let _guard = self.writer.lock().await;
        let prev = self.current().await?;

        self.commit(VerdictSnapshot {
            verdicts: verdicts.clone(),
            last_check_timestamp: next_timestamp(prev.last_check_timestamp),
            is_success: true,
            error_message: None,
        })
        .await
    }

    /// Record a failed check.  The verdicts of the last success are kept.
    pub async fn record_failure(&self, message: &str) -> Result<Arc<VerdictSnapshot>, Error> {
        let _guard = self.writer.lock().await;
        let prev = self.current().await?;

        let message = match message.trim() {
            "" => UNKNOWN_ERROR,
            m => m,
        };

        self.commit(VerdictSnapshot {
            verdicts: prev.verdicts.clone(),
            last_check_timestamp: next_timestamp(prev.last_check_timestamp),
            is_success: false,
            error_message: Some(message.to_string()),
        })
        .await
    }

    // the stored record, or the published one if the stored record is unreadable
    async fn current(&self) -> Result<VerdictSnapshot, Error> {
        match fetch(self.kv.as_ref()).await {
            Ok(s) => Ok(s),
            Err(Error::Syntax(e)) => {
                warn!(error = %e, "stored snapshot is corrupt, overwriting");
                Ok((*self.latest()).clone())
            }
            Err(e) => Err(e),
        }
    }

    async fn commit(&self, next: VerdictSnapshot) -> Result<Arc<VerdictSnapshot>, Error> {
        let buf = snapshot::encode(&next)?;
        self.kv.set(SNAPSHOT_KEY, buf).await?;

        debug!(
            ts = next.last_check_timestamp,
            success = next.is_success,
            "snapshot written"
        );

        let next = Arc::new(next);
        self.published.send_replace(next.clone());

        Ok(next)
    }
}

// wall clock, but strictly after the previous attempt
fn next_timestamp(prev: i64) -> i64 {
    now_millis().max(prev + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil::FlakyKeyValueStore;
    use crate::store::{FileKeyValueStore, MemoKeyValueStore};
    use crate::token::{AppVerdict, DeviceVerdict, LicensingVerdict};
    use std::collections::HashMap;

    fn verdicts(device: &[DeviceVerdict]) -> Verdicts {
        Verdicts {
            device: device.iter().copied().collect(),
            app: Some(AppVerdict::PlayRecognized),
            licensing: Some(LicensingVerdict::Licensed),
        }
    }

    async fn open_memo() -> (Arc<MemoKeyValueStore>, VerdictStore) {
        let kv = Arc::new(MemoKeyValueStore::new());
        let store = VerdictStore::open(kv.clone()).await.unwrap();
        (kv, store)
    }

    #[tokio::test]
    async fn fresh_store_is_never_checked() {
        let (_, store) = open_memo().await;

        assert_eq!(*store.latest(), VerdictSnapshot::default());
        assert_eq!(*store.read().await.unwrap(), VerdictSnapshot::default());
        assert!(!store.latest().has_baseline());
    }

    #[tokio::test]
    async fn success_then_failure() {
        let (kv, store) = open_memo().await;
        let strong = verdicts(&[DeviceVerdict::MeetsStrongIntegrity]);

        let s1 = store.record_success(&strong).await.unwrap();
        assert_eq!(s1.verdicts, strong);
        assert!(s1.is_success);
        assert_eq!(s1.error_message, None);
        assert!(s1.has_baseline());
        assert_eq!(store.read().await.unwrap(), s1);

        let s2 = store.record_failure("decryption failed").await.unwrap();
        assert_eq!(s2.verdicts, strong);
        assert!(!s2.is_success);
        assert_eq!(s2.error_message.as_deref(), Some("decryption failed"));
        assert!(s2.last_check_timestamp > s1.last_check_timestamp);
        assert_eq!(store.latest(), s2);

        // a later success clears the error
        let s3 = store.record_success(&Verdicts::default()).await.unwrap();
        assert_eq!(s3.error_message, None);
        assert!(s3.is_success);
        assert!(s3.last_check_timestamp > s2.last_check_timestamp);

        // and the record survives reopening
        let reopened = VerdictStore::open(kv).await.unwrap();
        assert_eq!(reopened.latest(), s3);
    }

    #[tokio::test]
    async fn empty_failure_message_is_replaced() {
        let (_, store) = open_memo().await;

        let s = store.record_failure("").await.unwrap();
        assert_eq!(s.error_message.as_deref(), Some(UNKNOWN_ERROR));

        let s = store.record_failure("  \n").await.unwrap();
        assert_eq!(s.error_message.as_deref(), Some(UNKNOWN_ERROR));
    }

    #[tokio::test]
    async fn subscribers_see_every_write() {
        let (_, store) = open_memo().await;
        let mut rx = store.subscribe();

        store
            .record_success(&verdicts(&[DeviceVerdict::MeetsBasicIntegrity]))
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().verdicts.device_tier(),
            crate::token::DeviceTier::Basic
        );

        store.record_failure("offline").await.unwrap();

        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().error_message.as_deref(),
            Some("offline")
        );
    }

    #[tokio::test]
    async fn unavailable_backing_store() {
        let kv = Arc::new(FlakyKeyValueStore::default());
        let store = VerdictStore::open(kv.clone()).await.unwrap();
        let s1 = store.record_success(&Verdicts::default()).await.unwrap();

        kv.set_available(false);

        assert!(matches!(store.read().await, Err(Error::Unavailable(_))));
        assert!(matches!(
            store.record_failure("x").await,
            Err(Error::Unavailable(_))
        ));

        // nothing was published for the failed write
        assert_eq!(store.latest(), s1);

        kv.set_available(true);
        assert_eq!(store.read().await.unwrap(), s1);

        kv.set_available(false);
        assert!(matches!(
            VerdictStore::open(kv).await,
            Err(Error::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_record_is_a_syntax_error() {
        let kv = Arc::new(MemoKeyValueStore::new());
        kv.set(SNAPSHOT_KEY, b"{not json".to_vec()).await.unwrap();

        assert!(matches!(
            VerdictStore::open(kv).await,
            Err(Error::Syntax(_))
        ));
    }

    #[tokio::test]
    async fn failure_keeps_verdicts_written_by_another_store() {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(FileKeyValueStore::new(dir.path()));
        let strong = verdicts(&[DeviceVerdict::MeetsStrongIntegrity]);

        // a long-running watcher and a one-shot check share the state directory
        let watcher = VerdictStore::open(kv.clone()).await.unwrap();
        let oneshot = VerdictStore::open(kv.clone()).await.unwrap();

        let s1 = oneshot.record_success(&strong).await.unwrap();
        assert!(!watcher.latest().has_baseline());

        let s2 = watcher.record_failure("offline").await.unwrap();
        assert_eq!(s2.verdicts, strong);
        assert!(s2.last_check_timestamp > s1.last_check_timestamp);
        assert_eq!(watcher.latest(), s2);
        assert_eq!(oneshot.read().await.unwrap(), s2);
    }

    #[tokio::test]
    async fn success_timestamp_follows_the_stored_record() {
        let kv = Arc::new(MemoKeyValueStore::new());
        let a = VerdictStore::open(kv.clone()).await.unwrap();
        let b = VerdictStore::open(kv.clone()).await.unwrap();

        // a record stamped far in the future by another writer
        let future = VerdictSnapshot {
            last_check_timestamp: now_millis() + 3_600_000,
            is_success: true,
            ..Default::default()
        };
        kv.set(SNAPSHOT_KEY, snapshot::encode(&future).unwrap())
            .await
            .unwrap();

        let s = a.record_success(&Verdicts::default()).await.unwrap();
        assert_eq!(s.last_check_timestamp, future.last_check_timestamp + 1);

        let s = b.record_failure("x").await.unwrap();
        assert_eq!(s.last_check_timestamp, future.last_check_timestamp + 2);
    }

    #[tokio::test]
    async fn corrupt_record_is_overwritten_by_the_next_write() {
        let (kv, store) = open_memo().await;
        let s1 = store
            .record_success(&verdicts(&[DeviceVerdict::MeetsBasicIntegrity]))
            .await
            .unwrap();

        kv.set(SNAPSHOT_KEY, b"{not json".to_vec()).await.unwrap();

        let s2 = store.record_failure("offline").await.unwrap();
        assert_eq!(s2.verdicts, s1.verdicts);
        assert_eq!(store.read().await.unwrap(), s2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_torn_records() {
        let (_, store) = open_memo().await;
        let store = Arc::new(store);

        let sets = [
            verdicts(&[DeviceVerdict::MeetsStrongIntegrity]),
            Verdicts::default(),
            verdicts(&[
                DeviceVerdict::MeetsBasicIntegrity,
                DeviceVerdict::MeetsDeviceIntegrity,
            ]),
        ];

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut history = HashMap::new();
                for i in 0..300 {
                    let res = if i % 4 == 3 {
                        store.record_failure(&format!("failure {i}")).await
                    } else {
                        store.record_success(&sets[i % 3]).await
                    };
                    let s = res.unwrap();
                    history.insert(s.last_check_timestamp, s);
                    tokio::task::yield_now().await;
                }
                history
            })
        };

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    for _ in 0..300 {
                        seen.push(store.latest());
                        seen.push(store.read().await.unwrap());
                        tokio::task::yield_now().await;
                    }
                    seen
                })
            })
            .collect();

        let history = writer.await.unwrap();

        for r in readers {
            for s in r.await.unwrap() {
                if !s.has_baseline() {
                    assert_eq!(*s, VerdictSnapshot::default());
                    continue;
                }
                assert_eq!(history.get(&s.last_check_timestamp), Some(&s));
            }
        }
    }
}
