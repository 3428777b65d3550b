//! Plain numeric data stored next to capsules.
//!
//! A data slot holds a little-endian `f64` array and carries `data=true`
//! plus its own docstring. Capsule scripts read these through the host
//! module in [`crate::host`].

use std::path::Path;

use crate::container::{Container, Group, OpenMode, Slot};
use crate::error::{Result, StoreError};

/// Boolean attribute marking a slot as plain data.
pub const DATA_FLAG: &str = "data";

const ATTR_DOCSTRING: &str = "docstring";

#[derive(Clone, Debug, PartialEq)]
pub struct DataItem {
    pub name: String,
    pub docstring: String,
    pub values: Vec<f64>,
}

impl DataItem {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            docstring: String::new(),
            values,
        }
    }

    #[must_use]
    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = docstring.into();
        self
    }
}

/// A data group as shown by listings.
#[derive(Clone, Debug, PartialEq)]
pub struct DataGroupSummary {
    pub name: String,
    pub docstring: String,
    pub slots: Vec<String>,
}

fn encode_values(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_values(slot: &str, payload: &[u8]) -> Result<Vec<f64>> {
    if payload.len() % 8 != 0 {
        return Err(StoreError::InvalidData(format!(
            "payload of `{slot}` is {} bytes, not a whole number of f64 values",
            payload.len()
        )));
    }
    Ok(payload
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        })
        .collect())
}

fn read_item(slot: &Slot<'_>) -> Result<DataItem> {
    let docstring = slot
        .attribute(ATTR_DOCSTRING)?
        .and_then(|v| v.as_text().map(str::to_string))
        .unwrap_or_default();
    Ok(DataItem {
        name: slot.name().to_string(),
        docstring,
        values: decode_values(slot.name(), &slot.payload()?)?,
    })
}

fn data_slots<'c>(group: &Group<'c>) -> Result<Vec<Slot<'c>>> {
    let mut slots = Vec::new();
    for name in group.slot_names()? {
        if let Some(slot) = group.slot(&name)? {
            if slot.flag(DATA_FLAG)? {
                slots.push(slot);
            }
        }
    }
    Ok(slots)
}

impl Container {
    /// Replace `group` with exactly `items`.
    pub fn add_data(&self, group: &str, docstring: &str, items: &[DataItem]) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        if self.delete_group(group)? {
            tracing::debug!(group, "replacing data group");
        }
        let target = self.require_group(group)?;
        target.set_docstring(docstring)?;
        for item in items {
            let slot = target.set_slot(&item.name, &encode_values(&item.values))?;
            slot.set_attribute(DATA_FLAG, true)?;
            slot.set_attribute(ATTR_DOCSTRING, item.docstring.as_str())?;
        }
        tx.commit()?;

        tracing::info!(group, items = items.len(), "saved data group");
        Ok(())
    }

    /// All data items in `group`, in insertion order.
    pub fn get_all_data(&self, group: &str) -> Result<Vec<DataItem>> {
        let found = self
            .group(group)?
            .ok_or_else(|| StoreError::GroupNotFound(group.to_string()))?;
        data_slots(&found)?.iter().map(read_item).collect()
    }

    pub fn get_data(&self, group: &str, slot: &str) -> Result<DataItem> {
        let found = self
            .group(group)?
            .ok_or_else(|| StoreError::GroupNotFound(group.to_string()))?;
        let stored = found.slot(slot)?.ok_or_else(|| StoreError::SlotNotFound {
            group: group.to_string(),
            slot: slot.to_string(),
        })?;
        if !stored.flag(DATA_FLAG)? {
            return Err(StoreError::InvalidData(format!(
                "slot `{slot}` in group `{group}` is not plain data"
            )));
        }
        read_item(&stored)
    }

    /// Every group holding at least one data slot.
    pub fn list_data_groups(&self) -> Result<Vec<DataGroupSummary>> {
        let mut summaries = Vec::new();
        for name in self.group_names()? {
            let Some(group) = self.group(&name)? else {
                continue;
            };
            let slots: Vec<String> = data_slots(&group)?
                .iter()
                .map(|s| s.name().to_string())
                .collect();
            if slots.is_empty() {
                continue;
            }
            summaries.push(DataGroupSummary {
                docstring: group.docstring()?,
                name,
                slots,
            });
        }
        Ok(summaries)
    }
}

/// Write `items` as the whole content of `group`, creating the container if needed.
pub fn add_data(path: &Path, group: &str, docstring: &str, items: &[DataItem]) -> Result<()> {
    Container::open(path, OpenMode::ReadWrite)?.add_data(group, docstring, items)
}

pub fn get_all_data(path: &Path, group: &str) -> Result<Vec<DataItem>> {
    Container::open(path, OpenMode::ReadOnly)?.get_all_data(group)
}

pub fn get_data(path: &Path, group: &str, slot: &str) -> Result<DataItem> {
    Container::open(path, OpenMode::ReadOnly)?.get_data(group, slot)
}

pub fn list_all_saved_data(path: &Path) -> Result<Vec<DataGroupSummary>> {
    Container::open(path, OpenMode::ReadOnly)?.list_data_groups()
}
