pub mod capsules;
pub mod container;
pub mod data;
pub mod error;
pub mod host;
pub mod schema;

use std::path::Path;

use capsula_core::{Callable, Capsule, CaptureConfig, CapsuleRecord, SandboxOptions, register_capsule};

pub use capsules::{list, load, save};
pub use container::{AttrValue, Container, Group, OpenMode, Slot};
pub use data::{DataGroupSummary, DataItem, add_data, get_all_data, get_data, list_all_saved_data};
pub use error::{Result, StoreError};
pub use host::{HOST_MODULE, host_module};

/// Sandbox options used for capsules loaded from a container: default
/// positional policy plus the `container` host module.
pub fn container_sandbox() -> SandboxOptions {
    SandboxOptions::default().module(HOST_MODULE, host_module())
}

fn container_id(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Capture `callable`, save it into the container at `path` and return the
/// sandboxed capsule.
pub fn attach_function(path: &Path, callable: &Callable, config: &CaptureConfig) -> Result<Capsule> {
    let record = register_capsule(callable, config)?;
    save(path, &config.group, record.slot_name(), &record)?;
    Ok(Capsule::build_with(&record, container_id(path), &container_sandbox())?)
}

/// Load `group/slot` and rebuild it with `path` as its container.
pub fn get_saved_function(path: &Path, slot: &str, group: &str) -> Result<Capsule> {
    let record = load(path, group, slot)?;
    Ok(Capsule::build_with(&record, container_id(path), &container_sandbox())?)
}

/// Every capsule saved in `group`.
pub fn list_all_saved_functions(path: &Path, group: &str) -> Result<Vec<CapsuleRecord>> {
    list(path, group)
}
