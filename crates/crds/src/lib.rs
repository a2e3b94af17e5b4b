//! Machine lifecycle CRD definitions
//!
//! Kubernetes Custom Resource Definitions shared by the machine controller
//! and its object-store adapter.

pub mod machine;
pub mod references;

pub use machine::*;
pub use references::*;
