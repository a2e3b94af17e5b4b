//! Prints the CRD manifests for every custom resource in this crate.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/machines.yaml`

use crds::Machine;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Machine::crd())?);
    Ok(())
}
