use std::path::Path;

use capsula_core::{CapsuleRecord, Literal, decode_args, decode_kwargs, encode};

use crate::container::{Container, OpenMode, Slot};
use crate::error::{Result, StoreError};

/// Boolean attribute marking a slot as a capsule.
pub const CAPSULE_FLAG: &str = "capsule";

pub const ATTR_FUNCTION_NAME: &str = "function_name";
pub const ATTR_DOCSTRING: &str = "docstring";
pub const ATTR_SIGNATURE: &str = "signature";
pub const ATTR_DEFAULT_ARGS: &str = "default_args";
pub const ATTR_DEFAULT_KWARGS: &str = "default_kwargs";

impl Container {
    /// Write `record` under `group/slot`, replacing whatever the slot held.
    pub fn save_capsule(&self, group: &str, slot: &str, record: &CapsuleRecord) -> Result<()> {
        let args = encode(&Literal::Array(record.default_args().to_vec()))?;
        let kwargs = encode(&Literal::Map(record.default_kwargs().clone()))?;

        let tx = self.conn().unchecked_transaction()?;
        let target = self.require_group(group)?;
        let written = target.set_slot(slot, record.source().as_bytes())?;
        written.set_attribute(ATTR_FUNCTION_NAME, record.function_name())?;
        written.set_attribute(ATTR_DOCSTRING, record.docstring())?;
        written.set_attribute(ATTR_SIGNATURE, record.signature())?;
        written.set_attribute(ATTR_DEFAULT_ARGS, args)?;
        written.set_attribute(ATTR_DEFAULT_KWARGS, kwargs)?;
        written.set_attribute(CAPSULE_FLAG, true)?;
        tx.commit()?;

        tracing::info!(group, slot, function = record.function_name(), "saved capsule");
        Ok(())
    }

    pub fn load_capsule(&self, group: &str, slot: &str) -> Result<CapsuleRecord> {
        let found = self
            .group(group)?
            .ok_or_else(|| StoreError::GroupNotFound(group.to_string()))?;
        let stored = found.slot(slot)?.ok_or_else(|| StoreError::SlotNotFound {
            group: group.to_string(),
            slot: slot.to_string(),
        })?;
        if !stored.flag(CAPSULE_FLAG)? {
            return Err(StoreError::NotACapsule {
                group: group.to_string(),
                slot: slot.to_string(),
            });
        }
        let record = read_record(&stored)?;
        tracing::debug!(group, slot, function = record.function_name(), "loaded capsule");
        Ok(record)
    }

    /// Every capsule in `group`, in insertion order. Plain data slots are skipped.
    pub fn list_capsules(&self, group: &str) -> Result<Vec<CapsuleRecord>> {
        let Some(found) = self.group(group)? else {
            return Ok(Vec::new());
        };
        let mut records = Vec::new();
        for name in found.slot_names()? {
            let Some(stored) = found.slot(&name)? else {
                continue;
            };
            if stored.flag(CAPSULE_FLAG)? {
                records.push(read_record(&stored)?);
            }
        }
        Ok(records)
    }
}

fn read_record(slot: &Slot<'_>) -> Result<CapsuleRecord> {
    let source = String::from_utf8(slot.payload()?).map_err(|e| {
        StoreError::InvalidData(format!("source of `{}` is not UTF-8: {e}", slot.name()))
    })?;
    Ok(CapsuleRecord::new(
        slot.name(),
        slot.text_attribute(ATTR_FUNCTION_NAME)?,
        source,
        slot.text_attribute(ATTR_DOCSTRING)?,
        slot.text_attribute(ATTR_SIGNATURE)?,
        decode_args(&slot.text_attribute(ATTR_DEFAULT_ARGS)?)?,
        decode_kwargs(&slot.text_attribute(ATTR_DEFAULT_KWARGS)?)?,
    ))
}

/// Save `record` into the container at `path`, creating the file if needed.
pub fn save(path: &Path, group: &str, slot: &str, record: &CapsuleRecord) -> Result<()> {
    Container::open(path, OpenMode::ReadWrite)?.save_capsule(group, slot, record)
}

/// Load the record stored at `group/slot`.
pub fn load(path: &Path, group: &str, slot: &str) -> Result<CapsuleRecord> {
    Container::open(path, OpenMode::ReadOnly)?.load_capsule(group, slot)
}

pub fn list(path: &Path, group: &str) -> Result<Vec<CapsuleRecord>> {
    Container::open(path, OpenMode::ReadOnly)?.list_capsules(group)
}
