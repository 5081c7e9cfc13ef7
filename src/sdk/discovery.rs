use std::env;
use std::sync::Arc;
use crate::Result;
use crate::engine::{LocalStore, Persistence, Registry};
use crate::sdk::{Client, FailoverStore};

/// Environment variable naming the document daemon address.
pub const STORE_ADDR_ENV: &str = "LAUNCHPAD_STORE_ADDR";

/// Initializes a [`FailoverStore`] based on the environment.
///
/// The local store always persists under `data_dir` with the built-in registry.
///
/// 1. If `LAUNCHPAD_STORE_ADDR` is set and non-empty, the store starts in
///    **Remote Mode** against that address and falls back to the local store
///    on the first failure.
/// 2. Otherwise the store runs in **Local Mode** from the start.
///
/// # Examples
///
/// ```no_run
/// use launchpad_store::{collection, sdk, Query};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let store = sdk::new("./data")?;
///     let products = store.get_docs(&Query::new(&collection("products"))).await?;
///     println!("{} products", products.len());
///     Ok(())
/// }
/// ```
pub fn new(data_dir: &str) -> Result<Arc<FailoverStore>> {
    let addr = env::var(STORE_ADDR_ENV).ok();
    with_remote_addr(data_dir, addr.as_deref())
}

/// Like [`new`], with the remote address given explicitly.
pub fn with_remote_addr(data_dir: &str, addr: Option<&str>) -> Result<Arc<FailoverStore>> {
    let persistence = Arc::new(Persistence::new(data_dir)?);
    let local = Arc::new(LocalStore::new(Registry::builtin(), Some(persistence)));

    match addr.filter(|a| !a.is_empty()) {
        Some(addr) => {
            log::info!("Using remote document store at {}", addr);
            Ok(Arc::new(FailoverStore::new(Arc::new(Client::new(addr)), local)))
        }
        None => {
            log::info!("No remote document store configured; using local store in {}", data_dir);
            Ok(Arc::new(FailoverStore::local_only(local)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_local_mode_without_addr() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();

        assert!(with_remote_addr(data_dir, None).unwrap().is_local_mode());
        assert!(with_remote_addr(data_dir, Some("")).unwrap().is_local_mode());
    }

    #[test]
    fn test_remote_mode_with_addr() {
        let dir = tempdir().unwrap();
        let store = with_remote_addr(dir.path().to_str().unwrap(), Some("127.0.0.1:1")).unwrap();
        assert!(!store.is_local_mode());
        assert_eq!(store.local().collections().len(), 7);
    }
}
