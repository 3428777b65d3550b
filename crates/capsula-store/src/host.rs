//! Script-side access to container data.
//!
//! Capsules rebuilt by [`crate::get_saved_function`] can `import "container"`
//! and read plain data groups of the container they were loaded from:
//!
//! ```text
//! fn mean_of(container, group, slot) {
//!     import "container" as store;
//!     let values = store::get_data(container, group, slot);
//!     ...
//! }
//! ```
//!
//! Each call opens the container read-only and closes it before returning.

use std::path::Path;

use capsula_core::rhai::{Array, Dynamic, EvalAltResult, ImmutableString, Map, Module, Position};

use crate::container::{Container, OpenMode};
use crate::data::DataItem;
use crate::error::StoreError;

/// Import path of the host module.
pub const HOST_MODULE: &str = "container";

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

fn script_error(err: StoreError) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(err.to_string().into(), Position::NONE).into()
}

fn open(container: &str) -> ScriptResult<Container> {
    Container::open(Path::new(container), OpenMode::ReadOnly).map_err(script_error)
}

fn to_array(item: DataItem) -> Array {
    item.values.into_iter().map(Dynamic::from_float).collect()
}

fn get_all_data(container: ImmutableString, group: ImmutableString) -> ScriptResult<Map> {
    let items = open(&container)?
        .get_all_data(&group)
        .map_err(script_error)?;
    Ok(items
        .into_iter()
        .map(|item| (item.name.as_str().into(), Dynamic::from_array(to_array(item))))
        .collect())
}

fn get_data(
    container: ImmutableString,
    group: ImmutableString,
    slot: ImmutableString,
) -> ScriptResult<Array> {
    let item = open(&container)?
        .get_data(&group, &slot)
        .map_err(script_error)?;
    Ok(to_array(item))
}

fn slot_names(container: ImmutableString, group: ImmutableString) -> ScriptResult<Array> {
    let store = open(&container)?;
    let names = match store.group(&group).map_err(script_error)? {
        Some(found) => found.slot_names().map_err(script_error)?,
        None => Vec::new(),
    };
    Ok(names.into_iter().map(Dynamic::from).collect())
}

/// Build the `container` module.
pub fn host_module() -> Module {
    let mut module = Module::new();
    module.set_native_fn("get_all_data", get_all_data);
    module.set_native_fn("get_data", get_data);
    module.set_native_fn("slot_names", slot_names);
    module.build_index();
    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data;

    fn fixture() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.db");
        data::add_data(
            &path,
            "series",
            "",
            &[
                DataItem::new("x", vec![1.0, 2.0]),
                DataItem::new("y", vec![3.0]),
            ],
        )
        .unwrap();
        let path = path.to_string_lossy().into_owned();
        (dir, path)
    }

    #[test]
    fn test_get_all_data() {
        let (_dir, path) = fixture();
        let map = get_all_data(path.into(), "series".into()).unwrap();
        assert_eq!(map.len(), 2);
        let x = map["x"].clone().into_array().unwrap();
        assert_eq!(x[1].as_float().unwrap(), 2.0);
    }

    #[test]
    fn test_get_data_and_slot_names() {
        let (_dir, path) = fixture();
        let y = get_data(path.as_str().into(), "series".into(), "y".into()).unwrap();
        assert_eq!(y.len(), 1);

        let names = slot_names(path.as_str().into(), "series".into()).unwrap();
        let names: Vec<String> = names.into_iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert!(slot_names(path.into(), "absent".into()).unwrap().is_empty());
    }

    #[test]
    fn test_errors_become_script_errors() {
        let (_dir, path) = fixture();
        let err = get_data(path.into(), "series".into(), "z".into()).unwrap_err();
        assert!(matches!(*err, EvalAltResult::ErrorRuntime(..)));

        assert!(get_all_data("/nonexistent/c.db".into(), "series".into()).is_err());
    }
}
