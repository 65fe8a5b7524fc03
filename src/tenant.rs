use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ulid::Ulid;

use crate::compactor;
use crate::engine::{Engine, EngineError};
use crate::limits::*;
use crate::notify::NotifyHub;

/// Finds the semester a request without an explicit semester operates on.
#[async_trait]
pub trait SemesterResolver: Send + Sync {
    async fn resolve_semester(&self, tenant: &str) -> Result<Ulid, EngineError>;
}

/// Manages per-dormitory engines. Each tenant gets its own Engine, WAL and compactor.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
        }
    }

    /// Get or lazily create an engine for the given tenant.
    pub fn get_or_create(&self, tenant: &str) -> std::io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(tenant) {
            return Ok(engine.value().clone());
        }
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many tenants"));
        }

        let safe_name = sanitize(tenant);
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty tenant name",
            ));
        }
        // The WAL file is named after the tenant, so the name must already be file-safe.
        if safe_name != tenant {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "invalid tenant name: use letters, digits, '_' or '-'",
            ));
        }

        // Two callers may race to create the same tenant; the entry API keeps one engine.
        let entry = self.engines.entry(tenant.to_string());
        let engine = match entry {
            Entry::Occupied(e) => return Ok(e.get().clone()),
            Entry::Vacant(v) => {
                let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
                let engine = Arc::new(Engine::new(wal_path, Arc::new(NotifyHub::new()))?);
                v.insert(engine.clone());
                engine
            }
        };

        let compactor_engine = engine.clone();
        let threshold = self.compact_threshold;
        tokio::spawn(async move {
            compactor::run_compactor(compactor_engine, threshold).await;
        });

        tracing::info!("loaded tenant {safe_name}");
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }
}

#[async_trait]
impl SemesterResolver for TenantManager {
    async fn resolve_semester(&self, tenant: &str) -> Result<Ulid, EngineError> {
        let engine = self
            .get_or_create(tenant)
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        Ok(engine.active_semester().await?.id)
    }
}

/// Keep only characters safe for a file name.
fn sanitize(tenant: &str) -> String {
    tenant
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Actor, Role};
    use chrono::NaiveDate;
    use std::fs;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("dormrota_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let dir = test_data_dir("isolation");
        let tm = TenantManager::new(dir, 1000);
        let admin = Actor::new(Role::Admin);

        let north = tm.get_or_create("north_hall").unwrap();
        let south = tm.get_or_create("south_hall").unwrap();

        let id = Ulid::new();
        north.create_room(&admin, id, "101".into(), 2, 1, 0).await.unwrap();
        south.create_room(&admin, id, "A-1".into(), 4, 2, 0).await.unwrap();
        north.create_area(&admin, Ulid::new(), "Garden".into(), 0).await.unwrap();

        assert_eq!(north.list_rooms().await[0].label, "101");
        assert_eq!(south.list_rooms().await[0].label, "A-1");
        assert_eq!(north.list_areas(true).await.len(), 1);
        assert!(south.list_areas(true).await.is_empty());
    }

    #[tokio::test]
    async fn tenant_lazy_creation() {
        let dir = test_data_dir("lazy");
        let tm = TenantManager::new(dir.clone(), 1000);

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());

        let _eng = tm.get_or_create("my_dorm").unwrap();
        assert!(dir.join("my_dorm.wal").exists());
    }

    #[tokio::test]
    async fn tenant_same_engine_returned() {
        let dir = test_data_dir("same_eng");
        let tm = TenantManager::new(dir, 1000);

        let eng1 = tm.get_or_create("foo").unwrap();
        let eng2 = tm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&eng1, &eng2));
    }

    #[tokio::test]
    async fn tenant_name_must_be_file_safe() {
        let dir = test_data_dir("sanitize");
        let tm = TenantManager::new(dir.clone(), 1000);

        let err = tm.get_or_create("../evil").err().unwrap();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        assert!(!dir.join("evil.wal").exists());

        assert!(tm.get_or_create("../..").is_err());
        assert!(tm.get_or_create("").is_err());

        let _eng = tm.get_or_create("west-wing_2").unwrap();
        assert!(dir.join("west-wing_2.wal").exists());
    }

    #[tokio::test]
    async fn similar_names_do_not_share_a_wal() {
        let dir = test_data_dir("similar_names");
        let admin = Actor::new(Role::Admin);
        {
            let tm = TenantManager::new(dir.clone(), 1000);
            assert!(tm.get_or_create("north.hall").is_err());
            let eng = tm.get_or_create("northhall").unwrap();
            eng.create_room(&admin, Ulid::new(), "B-only".into(), 2, 1, 0)
                .await
                .unwrap();
        }

        let tm = TenantManager::new(dir, 1000);
        let labels: Vec<String> = tm
            .get_or_create("northhall")
            .unwrap()
            .list_rooms()
            .await
            .into_iter()
            .map(|r| r.label)
            .collect();
        assert_eq!(labels, vec!["B-only".to_string()]);
    }

    #[tokio::test]
    async fn tenant_name_too_long() {
        let dir = test_data_dir("name_too_long");
        let tm = TenantManager::new(dir, 1000);

        let long_name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        let err = tm.get_or_create(&long_name).err().unwrap();
        assert!(err.to_string().contains("tenant name too long"));
    }

    #[tokio::test]
    async fn resolve_semester_needs_an_active_one() {
        let dir = test_data_dir("resolve");
        let tm = TenantManager::new(dir, 1000);
        let admin = Actor::new(Role::Admin);

        assert!(matches!(
            tm.resolve_semester("dorm").await,
            Err(EngineError::NoActiveSemester)
        ));

        let engine = tm.get_or_create("dorm").unwrap();
        let id = Ulid::new();
        engine
            .create_semester(&admin, id, "Fall".into(), d(2024, 8, 26), d(2024, 12, 20))
            .await
            .unwrap();
        engine.activate_semester(&admin, id).await.unwrap();

        assert_eq!(tm.resolve_semester("dorm").await.unwrap(), id);
    }
}
