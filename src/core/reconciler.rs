//! Create-or-update of IoT Agent provisioning records.
//!
//! Each record kind is reconciled by a two-state machine. The remote
//! record is either absent or present; absent always means create, present
//! means whatever the kind's [`Reconcilable::ON_PRESENT`] policy says:
//!
//! | kind         | present         | why the policy differs                  |
//! |--------------|-----------------|-----------------------------------------|
//! | config group | overwrite       | no server-assigned fields               |
//! | device       | read-merge-put  | entity name is fixed by the platform    |
//!
//! Reconciliations through one [`Reconciler`] never interleave.

use std::{fmt, sync::Arc};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use ulcrawler_iota::{ConfigGroup, Device, GroupKey, RemoteStore, Resource, Scope};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    Absent,
    Present,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Create,
    Overwrite,
    ReadMergeUpdate,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transition::Create => "created",
            Transition::Overwrite => "overwritten",
            Transition::ReadMergeUpdate => "merged and updated",
        };
        f.write_str(s)
    }
}

/// Reconciliation policy of a record kind.
pub trait Reconcilable: Resource {
    const ON_PRESENT: Transition;

    /// Builds the update body from the desired record and the current
    /// remote one. Only called for [`Transition::ReadMergeUpdate`].
    fn merge(&self, _current: &Self) -> Result<Self, Error> {
        Ok(self.clone())
    }
}

impl Reconcilable for ConfigGroup {
    const ON_PRESENT: Transition = Transition::Overwrite;
}

impl Reconcilable for Device {
    const ON_PRESENT: Transition = Transition::ReadMergeUpdate;

    /// Keeps the entity name the platform assigned and drops the transport,
    /// which the agent only accepts on creation.
    fn merge(&self, current: &Self) -> Result<Self, Error> {
        let entity_name = current
            .entity_name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::Reconciliation {
                kind: Self::KIND,
                key: self.key(),
                reason: "remote record has no entity name".into(),
            })?;

        Ok(Device {
            entity_name: Some(entity_name),
            transport: None,
            ..self.clone()
        })
    }
}

pub fn plan<R: Reconcilable>(state: RemoteState) -> Transition {
    match state {
        RemoteState::Absent => Transition::Create,
        RemoteState::Present => R::ON_PRESENT,
    }
}

pub struct Reconciler<S> {
    store: Arc<S>,
    lock: Mutex<()>,
}

impl<S> Reconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Makes the remote record identified by `desired.key()` match
    /// `desired`. Idempotent.
    ///
    /// # Errors
    ///
    /// - [`Error::RemoteService`] if any remote call fails
    /// - [`Error::Reconciliation`] if the current record cannot be merged;
    ///   nothing is written in that case
    #[instrument(skip_all, fields(kind = R::KIND, key = %desired.key(), scope = %scope))]
    pub async fn ensure<R>(&self, scope: &Scope, desired: &R) -> Result<Transition, Error>
    where
        R: Reconcilable,
        S: RemoteStore<R>,
    {
        let _guard = self.lock.lock().await;
        let key = desired.key();

        let state = match self.store.exists(scope, &key).await {
            Ok(true) => RemoteState::Present,
            Ok(false) => RemoteState::Absent,
            Err(e) => return Err(Error::remote(R::KIND, "lookup", e)),
        };
        let transition = plan::<R>(state);
        debug!("{} {} is {:?}, applying {:?}", R::KIND, key, state, transition);

        match transition {
            Transition::Create => self
                .store
                .create(scope, desired)
                .await
                .map_err(|e| Error::remote(R::KIND, "create", e))?,
            Transition::Overwrite => self
                .store
                .update(scope, &key, desired)
                .await
                .map_err(|e| Error::remote(R::KIND, "update", e))?,
            Transition::ReadMergeUpdate => {
                let current = self
                    .store
                    .read(scope, &key)
                    .await
                    .map_err(|e| Error::remote(R::KIND, "read", e))?;
                let merged = desired.merge(&current)?;
                self.store
                    .update(scope, &key, &merged)
                    .await
                    .map_err(|e| Error::remote(R::KIND, "update", e))?;
            }
        }

        info!("{} {} {} in {}", R::KIND, key, transition, scope);
        Ok(transition)
    }

    pub async fn ensure_config_group(
        &self,
        scope: &Scope,
        desired: &ConfigGroup,
    ) -> Result<Transition, Error>
    where
        S: RemoteStore<ConfigGroup>,
    {
        self.ensure(scope, desired).await
    }

    pub async fn ensure_device(&self, scope: &Scope, desired: &Device) -> Result<Transition, Error>
    where
        S: RemoteStore<Device>,
    {
        self.ensure(scope, desired).await
    }

    /// Deletes the record identified by `key`.
    ///
    /// Returns `false` when there was nothing to delete.
    pub async fn remove<R>(&self, scope: &Scope, key: &R::Key) -> Result<bool, Error>
    where
        R: Reconcilable,
        S: RemoteStore<R>,
    {
        let _guard = self.lock.lock().await;
        match self.store.delete(scope, key).await {
            Ok(()) => {
                info!("{} {} removed from {}", R::KIND, key, scope);
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                debug!("{} {} already absent from {}", R::KIND, key, scope);
                Ok(false)
            }
            Err(e) => Err(Error::remote(R::KIND, "delete", e)),
        }
    }

    pub async fn remove_config_group(
        &self,
        scope: &Scope,
        resource: &str,
        apikey: &str,
    ) -> Result<bool, Error>
    where
        S: RemoteStore<ConfigGroup>,
    {
        let key = GroupKey {
            resource: resource.to_string(),
            apikey: apikey.to_string(),
        };
        self.remove::<ConfigGroup>(scope, &key).await
    }

    pub async fn remove_device(&self, scope: &Scope, id: &str) -> Result<bool, Error>
    where
        S: RemoteStore<Device>,
    {
        self.remove::<Device>(scope, &id.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Mutex as StdMutex};

    use async_trait::async_trait;
    use serde_json::json;
    use ulcrawler_iota::{IotaError, StatusCode};

    use super::*;

    fn bad_request(body: &str) -> IotaError {
        IotaError::Status(StatusCode::BAD_REQUEST, body.to_string())
    }

    /// In-memory IoT Agent that behaves like the real one where it matters:
    /// it names devices on creation and refuses to rename them or to change
    /// their transport afterwards.
    #[derive(Default)]
    struct MemoryStore {
        groups: StdMutex<BTreeMap<GroupKey, ConfigGroup>>,
        devices: StdMutex<BTreeMap<String, Device>>,
        device_updates: StdMutex<Vec<Device>>,
        fail_lookups: bool,
    }

    impl MemoryStore {
        fn with_device(device: Device) -> Self {
            let store = Self::default();
            store.devices.lock().unwrap().insert(device.id.clone(), device);
            store
        }

        fn device(&self, id: &str) -> Option<Device> {
            self.devices.lock().unwrap().get(id).cloned()
        }

        fn device_updates(&self) -> Vec<Device> {
            self.device_updates.lock().unwrap().clone()
        }

        fn not_found(kind: &'static str, key: impl fmt::Display) -> IotaError {
            IotaError::NotFound {
                kind,
                key: key.to_string(),
            }
        }
    }

    #[async_trait]
    impl RemoteStore<ConfigGroup> for MemoryStore {
        async fn exists(&self, _scope: &Scope, key: &GroupKey) -> Result<bool, IotaError> {
            tokio::task::yield_now().await;
            Ok(self.groups.lock().unwrap().contains_key(key))
        }

        async fn create(&self, _scope: &Scope, record: &ConfigGroup) -> Result<(), IotaError> {
            let mut groups = self.groups.lock().unwrap();
            if groups.contains_key(&record.group_key()) {
                return Err(bad_request("duplicate group"));
            }
            groups.insert(record.group_key(), record.clone());
            Ok(())
        }

        async fn update(
            &self,
            _scope: &Scope,
            key: &GroupKey,
            record: &ConfigGroup,
        ) -> Result<(), IotaError> {
            match self.groups.lock().unwrap().get_mut(key) {
                Some(existing) => {
                    *existing = record.clone();
                    Ok(())
                }
                None => Err(Self::not_found(ConfigGroup::KIND, key)),
            }
        }

        async fn read(&self, _scope: &Scope, key: &GroupKey) -> Result<ConfigGroup, IotaError> {
            self.groups
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| Self::not_found(ConfigGroup::KIND, key))
        }

        async fn delete(&self, _scope: &Scope, key: &GroupKey) -> Result<(), IotaError> {
            self.groups
                .lock()
                .unwrap()
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| Self::not_found(ConfigGroup::KIND, key))
        }
    }

    #[async_trait]
    impl RemoteStore<Device> for MemoryStore {
        async fn exists(&self, _scope: &Scope, key: &String) -> Result<bool, IotaError> {
            if self.fail_lookups {
                return Err(bad_request("lookup refused"));
            }
            tokio::task::yield_now().await;
            Ok(self.devices.lock().unwrap().contains_key(key))
        }

        async fn create(&self, _scope: &Scope, record: &Device) -> Result<(), IotaError> {
            let mut devices = self.devices.lock().unwrap();
            if devices.contains_key(&record.id) {
                return Err(bad_request("duplicate device"));
            }
            let mut created = record.clone();
            if created.entity_name.is_none() {
                let entity_type = created.entity_type.clone().unwrap_or_default();
                created.entity_name = Some(format!("{}:{}", entity_type, created.id));
            }
            devices.insert(created.id.clone(), created);
            Ok(())
        }

        async fn update(&self, _scope: &Scope, key: &String, record: &Device) -> Result<(), IotaError> {
            self.device_updates.lock().unwrap().push(record.clone());
            let mut devices = self.devices.lock().unwrap();
            let existing = devices
                .get_mut(key)
                .ok_or_else(|| Self::not_found(Device::KIND, key))?;
            if record.transport.is_some() {
                return Err(bad_request("transport cannot be updated"));
            }
            if record.entity_name.is_some() && record.entity_name != existing.entity_name {
                return Err(bad_request("entity name cannot be changed"));
            }
            let transport = existing.transport.clone();
            *existing = Device {
                id: key.clone(),
                transport,
                ..record.clone()
            };
            Ok(())
        }

        async fn read(&self, _scope: &Scope, key: &String) -> Result<Device, IotaError> {
            self.device(key)
                .ok_or_else(|| Self::not_found(Device::KIND, key))
        }

        async fn delete(&self, _scope: &Scope, key: &String) -> Result<(), IotaError> {
            self.devices
                .lock()
                .unwrap()
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| Self::not_found(Device::KIND, key))
        }
    }

    fn scope() -> Scope {
        Scope::new("openiot", "/")
    }

    fn group() -> ConfigGroup {
        ConfigGroup::new("/iot/d", "123456", "Thing")
    }

    fn device() -> Device {
        Device::new("testDevice")
            .with_entity_type("Thing")
            .with_transport("MQTT")
    }

    #[test]
    fn test_plan_per_kind() {
        assert_eq!(plan::<ConfigGroup>(RemoteState::Absent), Transition::Create);
        assert_eq!(plan::<Device>(RemoteState::Absent), Transition::Create);
        assert_eq!(plan::<ConfigGroup>(RemoteState::Present), Transition::Overwrite);
        assert_eq!(plan::<Device>(RemoteState::Present), Transition::ReadMergeUpdate);
    }

    #[test]
    fn test_device_merge_keeps_entity_name_and_drops_transport() {
        let current = Device {
            entity_name: Some("Thing:testDevice".into()),
            ..device()
        };
        let desired = Device {
            entity_name: Some("renamed".into()),
            ..device()
        };

        let merged = desired.merge(&current).unwrap();
        assert_eq!(merged.entity_name.as_deref(), Some("Thing:testDevice"));
        assert_eq!(merged.transport, None);
        assert_eq!(merged.entity_type.as_deref(), Some("Thing"));
    }

    #[test]
    fn test_device_merge_rejects_empty_entity_name() {
        let current = Device {
            entity_name: Some(String::new()),
            ..device()
        };
        match device().merge(&current) {
            Err(Error::Reconciliation { kind, key, .. }) => {
                assert_eq!(kind, "device");
                assert_eq!(key, "testDevice");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_config_group_is_idempotent() {
        let store = Arc::new(MemoryStore::default());
        let reconciler = Reconciler::new(store.clone());

        let first = reconciler.ensure_config_group(&scope(), &group()).await.unwrap();
        let snapshot = store.groups.lock().unwrap().clone();
        let second = reconciler.ensure_config_group(&scope(), &group()).await.unwrap();

        assert_eq!(first, Transition::Create);
        assert_eq!(second, Transition::Overwrite);
        assert_eq!(*store.groups.lock().unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_config_group_overwrite_replaces_all_fields() {
        let store = Arc::new(MemoryStore::default());
        let reconciler = Reconciler::new(store.clone());
        reconciler.ensure_config_group(&scope(), &group()).await.unwrap();

        let changed = ConfigGroup {
            trust: Some("token".into()),
            entity_type: "Sensor".into(),
            ..group()
        };
        reconciler.ensure_config_group(&scope(), &changed).await.unwrap();

        let stored = store.groups.lock().unwrap().get(&group().group_key()).cloned();
        assert_eq!(stored, Some(changed));
    }

    #[tokio::test]
    async fn test_device_update_writes_changes_and_keeps_entity_name() {
        let store = Arc::new(MemoryStore::default());
        let reconciler = Reconciler::new(store.clone());

        assert_eq!(
            reconciler.ensure_device(&scope(), &device()).await.unwrap(),
            Transition::Create
        );
        let assigned = store.device("testDevice").unwrap().entity_name;
        assert_eq!(assigned.as_deref(), Some("Thing:testDevice"));

        let changed = Device {
            explicit_attrs: Some(json!(["temp"])),
            ..device()
        };
        assert_eq!(
            reconciler.ensure_device(&scope(), &changed).await.unwrap(),
            Transition::ReadMergeUpdate
        );

        let updates = store.device_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].entity_name, assigned);
        assert_eq!(updates[0].transport, None);

        let stored = store.device("testDevice").unwrap();
        assert_eq!(stored.explicit_attrs, Some(json!(["temp"])));
        assert_eq!(stored.entity_name.as_deref(), Some("Thing:testDevice"));
        assert_eq!(stored.transport.as_deref(), Some("MQTT"));
    }

    #[tokio::test]
    async fn test_device_without_entity_name_is_not_updated() {
        let store = Arc::new(MemoryStore::with_device(Device::new("testDevice")));
        let reconciler = Reconciler::new(store.clone());

        let result = reconciler.ensure_device(&scope(), &device()).await;

        assert!(matches!(result, Err(Error::Reconciliation { .. })));
        assert!(store.device_updates().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_remote_error() {
        let store = Arc::new(MemoryStore {
            fail_lookups: true,
            ..Default::default()
        });
        let reconciler = Reconciler::new(store);

        match reconciler.ensure_device(&scope(), &device()).await {
            Err(Error::RemoteService { kind, operation, .. }) => {
                assert_eq!(kind, "device");
                assert_eq!(operation, "lookup");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_ensures_do_not_interleave() {
        let store = Arc::new(MemoryStore::default());
        let reconciler = Arc::new(Reconciler::new(store.clone()));

        let a = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.ensure_device(&scope(), &device()).await })
        };
        let b = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.ensure_device(&scope(), &device()).await })
        };

        let mut transitions = vec![a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];
        transitions.sort_by_key(|t| *t as u8);
        assert_eq!(
            transitions,
            vec![Transition::Create, Transition::ReadMergeUpdate]
        );
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = Arc::new(MemoryStore::default());
        let reconciler = Reconciler::new(store.clone());
        reconciler.ensure_config_group(&scope(), &group()).await.unwrap();
        reconciler.ensure_device(&scope(), &device()).await.unwrap();

        assert!(reconciler.remove_device(&scope(), "testDevice").await.unwrap());
        assert!(!reconciler.remove_device(&scope(), "testDevice").await.unwrap());
        assert!(reconciler
            .remove_config_group(&scope(), "/iot/d", "123456")
            .await
            .unwrap());
        assert!(store.groups.lock().unwrap().is_empty());
    }
}
