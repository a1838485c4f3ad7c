//! # CRD Generator
//!
//! Prints the `SqlCredential` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/sqlcredential.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::CustomResourceExt;
use sql_credential_controller::crd::SqlCredential;

fn main() {
    match serde_yaml::to_string(&SqlCredential::crd()) {
        Ok(yaml) => print!("{yaml}"),
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}
