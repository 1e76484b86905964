use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::{Change, ChangeSet, EntityFilter, EntityStore, Record, StoreSnapshot, UniqueKey};
use crate::errors::ServiceError;
use crate::models::EntityKind;

#[derive(Debug, Default, Clone)]
struct State {
    collections: HashMap<EntityKind, HashMap<Uuid, Record>>,
    index: HashMap<UniqueKey, Uuid>,
}

impl State {
    fn get(&self, kind: EntityKind, id: Uuid) -> Option<&Record> {
        self.collections.get(&kind).and_then(|c| c.get(&id))
    }

    fn contains_id(&self, id: Uuid) -> bool {
        self.collections.values().any(|c| c.contains_key(&id))
    }

    fn put(&mut self, record: Record) {
        self.collections
            .entry(record.kind())
            .or_default()
            .insert(record.id(), record);
    }

    fn snapshot(&self) -> StoreSnapshot {
        let mut snapshot = StoreSnapshot::default();
        for kind in EntityKind::STORED {
            let mut records: Vec<&Record> = self
                .collections
                .get(&kind)
                .map(|c| c.values().collect())
                .unwrap_or_default();
            records.sort_by_key(|r| (r.created_at(), r.id()));
            for record in records {
                snapshot.push(record.clone());
            }
        }
        snapshot
    }

    /// Rebuilds collections and indexes from a snapshot, refusing duplicates.
    fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, ServiceError> {
        let mut state = State::default();
        for record in snapshot.into_records() {
            if state.contains_id(record.id()) {
                return Err(ServiceError::StorageError(format!(
                    "snapshot contains record {} twice",
                    record.id()
                )));
            }
            for key in record.unique_keys() {
                if state.index.insert(key.clone(), record.id()).is_some() {
                    return Err(ServiceError::StorageError(format!(
                        "snapshot violates unique index: {}",
                        key
                    )));
                }
            }
            state.put(record);
        }
        Ok(state)
    }
}

/// A change that passed validation, ready to apply.
struct Staged {
    record: Record,
    previous: Option<Record>,
}

/// In-memory [`EntityStore`] with optional JSON snapshot persistence.
///
/// Readers share the lock; a commit holds it exclusively from validation to
/// apply, so no reader sees half a change set. With a snapshot path, the
/// post-commit state is written (temp file + rename) before memory is touched.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    snapshot_path: Option<PathBuf>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a store persisted at `path`, loading the existing snapshot if any.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: StoreSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    error!(error = %e, "snapshot file is not valid");
                    ServiceError::StorageError(format!("invalid snapshot {}: {}", path.display(), e))
                })?;
                let state = State::from_snapshot(snapshot)?;
                info!(
                    records = state.collections.values().map(HashMap::len).sum::<usize>(),
                    "loaded entity snapshot"
                );
                state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no snapshot yet; starting empty");
                State::default()
            }
            Err(e) => {
                error!(error = %e, "failed to read snapshot");
                return Err(ServiceError::StorageError(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Ok(Self {
            state: RwLock::new(state),
            snapshot_path: Some(path),
        })
    }

    fn stage(state: &State, changes: Vec<Change>) -> Result<Vec<Staged>, ServiceError> {
        let mut staged: Vec<Staged> = Vec::with_capacity(changes.len());
        let mut touched: HashSet<Uuid> = HashSet::new();

        for change in changes {
            match change {
                Change::Insert(record) => {
                    let id = record.id();
                    if state.contains_id(id) || !touched.insert(id) {
                        return Err(ServiceError::Conflict(format!(
                            "{} {} already exists",
                            record.kind(),
                            id
                        )));
                    }
                    staged.push(Staged {
                        record,
                        previous: None,
                    });
                }
                Change::Update {
                    mut record,
                    expected_version,
                } => {
                    let id = record.id();
                    if !touched.insert(id) {
                        return Err(ServiceError::InternalError(format!(
                            "change set touches {} twice",
                            id
                        )));
                    }
                    let current = state
                        .get(record.kind(), id)
                        .ok_or_else(|| ServiceError::not_found(record.kind(), id))?;
                    if current.version() != expected_version {
                        return Err(ServiceError::ConcurrentModification(id));
                    }
                    record.set_version(expected_version + 1);
                    staged.push(Staged {
                        record,
                        previous: Some(current.clone()),
                    });
                }
            }
        }

        // Keys released by updated records may be claimed by others in the same set.
        let released: HashSet<UniqueKey> = staged
            .iter()
            .filter_map(|s| s.previous.as_ref())
            .flat_map(Record::unique_keys)
            .collect();
        let mut claimed: HashMap<UniqueKey, Uuid> = HashMap::new();
        for s in &staged {
            let id = s.record.id();
            for key in s.record.unique_keys() {
                if let Some(other) = claimed.insert(key.clone(), id) {
                    if other != id {
                        return Err(ServiceError::Conflict(key.to_string()));
                    }
                }
                match state.index.get(&key) {
                    Some(owner) if *owner != id && !released.contains(&key) => {
                        return Err(ServiceError::Conflict(key.to_string()));
                    }
                    _ => {}
                }
            }
        }

        Ok(staged)
    }

    fn apply(state: &mut State, staged: Vec<Staged>) -> Vec<Record> {
        for s in &staged {
            if let Some(previous) = &s.previous {
                for key in previous.unique_keys() {
                    if state.index.get(&key) == Some(&previous.id()) {
                        state.index.remove(&key);
                    }
                }
            }
        }
        staged
            .into_iter()
            .map(|s| {
                for key in s.record.unique_keys() {
                    state.index.insert(key, s.record.id());
                }
                state.put(s.record.clone());
                s.record
            })
            .collect()
    }

    async fn persist(path: &Path, snapshot: &StoreSnapshot) -> Result<(), ServiceError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let temp_path = path.with_extension("json.tmp");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ServiceError::StorageError(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        tokio::fs::write(&temp_path, &bytes).await.map_err(|e| {
            ServiceError::StorageError(format!("cannot write {}: {}", temp_path.display(), e))
        })?;
        tokio::fs::rename(&temp_path, path).await.map_err(|e| {
            ServiceError::StorageError(format!("cannot replace {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn get(&self, kind: EntityKind, id: Uuid) -> Result<Record, ServiceError> {
        let state = self.state.read().await;
        state
            .get(kind, id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(kind, id))
    }

    async fn query(&self, filter: &EntityFilter) -> Result<Vec<Record>, ServiceError> {
        let state = self.state.read().await;
        let mut records: Vec<Record> = state
            .collections
            .get(&filter.kind)
            .map(|c| c.values().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|r| (r.created_at(), r.id()));
        Ok(records)
    }

    #[instrument(skip_all, fields(changes = changes.len()))]
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<Record>, ServiceError> {
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.state.write().await;
        let staged = Self::stage(&state, changes.into_changes())?;

        if let Some(path) = &self.snapshot_path {
            let mut next = state.clone();
            let applied = Self::apply(&mut next, staged);
            if let Err(e) = Self::persist(path, &next.snapshot()).await {
                error!(error = %e, "snapshot write failed; commit abandoned");
                return Err(e);
            }
            *state = next;
            debug!(records = applied.len(), "commit persisted");
            return Ok(applied);
        }

        let applied = Self::apply(&mut state, staged);
        debug!(records = applied.len(), "commit applied");
        Ok(applied)
    }

    async fn lookup(&self, key: &UniqueKey) -> Result<Option<Uuid>, ServiceError> {
        Ok(self.state.read().await.index.get(key).copied())
    }

    async fn snapshot(&self) -> Result<StoreSnapshot, ServiceError> {
        Ok(self.state.read().await.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ContactInfo, DocumentRef, Quotation, Supplier, SupplierDocuments, SupplierStatus,
    };
    use crate::store::EntityStoreExt;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn supplier(tax_id: &str) -> Supplier {
        let doc = DocumentRef::new("docs/x.pdf");
        Supplier::new(
            tax_id,
            "Acme".into(),
            "Street 1".into(),
            ContactInfo {
                name: "Ana".into(),
                email: "ana@acme.mx".into(),
                phone: "5550001111".into(),
            },
            SupplierDocuments {
                fiscal_situation: doc.clone(),
                constitutive_act: doc.clone(),
                tax_opinion: doc.clone(),
                legal_representative_id: doc,
            },
            Uuid::new_v4(),
            Utc::now(),
        )
    }

    fn quotation(rfq_id: Uuid, supplier_id: Uuid) -> Quotation {
        Quotation::new(
            rfq_id,
            supplier_id,
            Uuid::new_v4(),
            dec!(100),
            "MXN".into(),
            3,
            String::new(),
            vec![],
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn update_bumps_version_and_rejects_stale_writes() {
        let store = InMemoryStore::new();
        let s = supplier("AAA010101AAA");
        store.commit(ChangeSet::new().insert(s.clone())).await.unwrap();

        let mut loaded: Supplier = store.fetch(s.id).await.unwrap();
        let stale = loaded.clone();
        loaded.approve(Uuid::new_v4(), Utc::now()).unwrap();
        store.commit(ChangeSet::new().update(loaded)).await.unwrap();

        let current: Supplier = store.fetch(s.id).await.unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.status, SupplierStatus::Approved);

        let result = store.commit(ChangeSet::new().update(stale)).await;
        assert_matches!(result, Err(ServiceError::ConcurrentModification(id)) if id == s.id);
    }

    #[tokio::test]
    async fn failed_change_set_leaves_store_untouched() {
        let store = InMemoryStore::new();
        let a = supplier("AAA010101AAA");
        store.commit(ChangeSet::new().insert(a.clone())).await.unwrap();

        // Second insert collides on the tax id, so the first must not land either.
        let b = supplier("BBB010101BBB");
        let dup = supplier("aaa010101aaa");
        let result = store
            .commit(ChangeSet::new().insert(b.clone()).insert(dup))
            .await;
        assert_matches!(result, Err(ServiceError::Conflict(_)));
        assert_matches!(
            store.get(EntityKind::Supplier, b.id).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn rejected_records_release_their_unique_keys() {
        let store = InMemoryStore::new();
        let rfq_id = Uuid::new_v4();
        let supplier_id = Uuid::new_v4();
        let first = quotation(rfq_id, supplier_id);
        store.commit(ChangeSet::new().insert(first.clone())).await.unwrap();

        let second = quotation(rfq_id, supplier_id);
        assert_matches!(
            store.commit(ChangeSet::new().insert(second.clone())).await,
            Err(ServiceError::Conflict(_))
        );

        let mut rejected = first.clone();
        rejected.reject(Uuid::new_v4(), None, Utc::now()).unwrap();
        store
            .commit(ChangeSet::new().update(rejected).insert(second.clone()))
            .await
            .unwrap();

        let slot = UniqueKey::QuotationSlot {
            rfq_id,
            supplier_id,
        };
        assert_eq!(store.lookup(&slot).await.unwrap(), Some(second.id));
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let store = InMemoryStore::new();
        let result = store
            .commit(ChangeSet::new().update(supplier("CCC010101CCC")))
            .await;
        assert_matches!(result, Err(ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn query_filters_and_orders_by_creation() {
        let store = InMemoryStore::new();
        let rfq_id = Uuid::new_v4();
        let mut q1 = quotation(rfq_id, Uuid::new_v4());
        q1.created_at = Utc::now() - chrono::Duration::hours(1);
        let q2 = quotation(rfq_id, Uuid::new_v4());
        let other = quotation(Uuid::new_v4(), Uuid::new_v4());
        store
            .commit(ChangeSet::new().insert(q2.clone()).insert(other).insert(q1.clone()))
            .await
            .unwrap();

        let found: Vec<Quotation> = store
            .find(&EntityFilter::new(EntityKind::Quotation).rfq(rfq_id))
            .await
            .unwrap();
        let ids: Vec<Uuid> = found.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![q1.id, q2.id]);

        let submitted = store
            .query(&EntityFilter::new(EntityKind::Quotation).status("submitted"))
            .await
            .unwrap();
        assert_eq!(submitted.len(), 3);
    }

    #[tokio::test]
    async fn reopened_store_restores_records_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store").join("snapshot.json");

        let s = supplier("DDD010101DDD");
        {
            let store = InMemoryStore::open(&path).await.unwrap();
            store.commit(ChangeSet::new().insert(s.clone())).await.unwrap();
        }

        let reopened = InMemoryStore::open(&path).await.unwrap();
        let loaded: Supplier = reopened.fetch(s.id).await.unwrap();
        assert_eq!(loaded, s);
        assert_matches!(
            reopened
                .commit(ChangeSet::new().insert(supplier("DDD010101DDD")))
                .await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert_matches!(
            InMemoryStore::open(&path).await,
            Err(ServiceError::StorageError(_))
        );
    }
}
