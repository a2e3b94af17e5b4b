//! Object store adapter for the machine controller
//!
//! Provides the [`ObjectStore`] trait the reconciler is written against, a
//! Kubernetes-backed implementation, and an explicit kind lookup table for
//! addressing provider resources whose types are not known at compile time.
//!
//! # Example
//!
//! ```no_run
//! use object_store::{KubeObjectStore, ObjectKey, ObjectStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeObjectStore::new(client);
//!
//! if let Some(machine) = store.get_machine(&ObjectKey::new("default", "worker-0")).await? {
//!     println!("deleting: {}", machine.is_deleting());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod kube_store;
pub mod registry;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use error::StoreError;
pub use kube_store::KubeObjectStore;
pub use registry::{InvalidKindEntry, KindRegistry};
pub use store_trait::{ObjectKey, ObjectStore};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{DeleteRequest, MockFailure, MockObjectStore, MockOp};
