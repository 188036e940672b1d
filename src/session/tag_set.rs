//! Tag list editing and the armed tag set
//!
//! [`TagSetEditor`] models the editable rows a user types tag names into.
//! It starts with one blank row, can grow and shrink one row at a time, and
//! is locked while a stream is being armed or is running.
//!
//! [`TagSet`] is the immutable snapshot taken at arming time. Its descriptors
//! are indexed by position and only their values change afterwards.

use crate::error::{PlcWatchError, Result};
use crate::types::{TagDescriptor, TagValue};
use std::collections::HashSet;

/// Editable, ordered list of tag name rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSetEditor {
    rows: Vec<String>,
    locked: bool,
}

impl Default for TagSetEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl TagSetEditor {
    /// Create an editor with a single blank row
    pub fn new() -> Self {
        Self {
            rows: vec![String::new()],
            locked: false,
        }
    }

    /// Create an editor pre-filled with names, one row each
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut editor = Self::new();
        editor.replace_rows(names.into_iter().map(Into::into).collect());
        editor
    }

    /// Raw rows, blanks included
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether edits are currently refused
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Append a blank row
    pub fn add_row(&mut self) -> Result<usize> {
        self.ensure_unlocked("add a tag row")?;
        self.rows.push(String::new());
        Ok(self.rows.len() - 1)
    }

    /// Whether the last row may be removed
    pub fn can_remove(&self) -> bool {
        !self.locked && self.rows.len() > 1
    }

    /// Remove the last row; the first row can never be removed
    pub fn remove_last_row(&mut self) -> Result<String> {
        self.ensure_unlocked("remove a tag row")?;
        if self.rows.len() <= 1 {
            return Err(PlcWatchError::Validation(
                "Cannot remove the only tag row".to_string(),
            ));
        }
        Ok(self.rows.pop().unwrap_or_default())
    }

    /// Set the name typed into a row
    pub fn set_name(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.ensure_unlocked("edit a tag name")?;
        let row_count = self.rows.len();
        let row = self.rows.get_mut(index).ok_or_else(|| {
            PlcWatchError::Validation(format!(
                "Tag row {} does not exist ({} rows)",
                index, row_count
            ))
        })?;
        *row = name.into();
        Ok(())
    }

    /// Replace every row at once
    pub fn set_rows(&mut self, names: Vec<String>) -> Result<()> {
        self.ensure_unlocked("edit the tag list")?;
        self.replace_rows(names);
        Ok(())
    }

    /// Ordered, trimmed, non-empty tag names
    pub fn tag_names(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Drop blank rows, keeping at least one
    pub fn compact(&mut self) {
        let names = self.tag_names();
        self.replace_rows(names);
    }

    /// Collapse to a single blank row
    pub fn clear_rows(&mut self) {
        self.rows.clear();
        self.rows.push(String::new());
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    fn replace_rows(&mut self, names: Vec<String>) {
        self.rows = names;
        if self.rows.is_empty() {
            self.rows.push(String::new());
        }
    }

    fn ensure_unlocked(&self, action: &str) -> Result<()> {
        if self.locked {
            return Err(PlcWatchError::InvalidState {
                action: action.to_string(),
                state: "the tag list is locked".to_string(),
            });
        }
        Ok(())
    }
}

/// Reject tag lists whose names repeat
pub fn check_unique(names: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(PlcWatchError::Validation(format!(
                "Duplicate tag name: {}",
                name
            )));
        }
    }
    Ok(())
}

/// Tag descriptors fixed at arming time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSet {
    descriptors: Vec<TagDescriptor>,
}

impl TagSet {
    /// Snapshot names into descriptors; index is the list position
    pub fn from_names(names: &[String]) -> Self {
        Self {
            descriptors: names
                .iter()
                .enumerate()
                .map(|(index, name)| TagDescriptor::new(index, name.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &[TagDescriptor] {
        &self.descriptors
    }

    /// Names in submission order
    pub fn names(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.name.clone()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&TagDescriptor> {
        self.descriptors.get(index)
    }

    /// Look a descriptor up by name
    pub fn by_name(&self, name: &str) -> Option<&TagDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Apply first-read values and data types positionally
    ///
    /// Returns the number of descriptors the arrays covered. Slots past the
    /// end of a short array keep a null value / unknown type.
    pub fn apply_first_read(&mut self, values: &[TagValue], data_types: &[Option<String>]) -> usize {
        for (descriptor, value) in self.descriptors.iter_mut().zip(values) {
            descriptor.value = value.clone();
        }
        for (descriptor, data_type) in self.descriptors.iter_mut().zip(data_types) {
            descriptor.data_type = data_type.clone();
        }
        values.len().min(data_types.len()).min(self.descriptors.len())
    }

    /// Apply one sample's values positionally; extra values are ignored
    pub fn apply_values(&mut self, values: &[TagValue]) -> usize {
        let mut applied = 0;
        for (descriptor, value) in self.descriptors.iter_mut().zip(values) {
            descriptor.value = value.clone();
            applied += 1;
        }
        applied
    }

    /// Drop every descriptor
    pub fn clear(&mut self) {
        self.descriptors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editor_starts_with_one_blank_row() {
        let editor = TagSetEditor::new();
        assert_eq!(editor.row_count(), 1);
        assert!(editor.tag_names().is_empty());
        assert!(!editor.can_remove());
    }

    #[test]
    fn test_cannot_remove_last_remaining_row() {
        let mut editor = TagSetEditor::new();
        editor.add_row().unwrap();
        assert!(editor.can_remove());
        editor.remove_last_row().unwrap();
        assert!(editor.remove_last_row().is_err());
        assert_eq!(editor.row_count(), 1);
    }

    #[test]
    fn test_tag_names_trimmed_and_blanks_dropped() {
        let mut editor = TagSetEditor::new();
        editor.set_name(0, "  Motor_Speed ").unwrap();
        editor.add_row().unwrap();
        editor.add_row().unwrap();
        editor.set_name(2, "Tank_Level").unwrap();
        assert_eq!(editor.tag_names(), vec!["Motor_Speed", "Tank_Level"]);

        editor.compact();
        assert_eq!(editor.row_count(), 2);
    }

    #[test]
    fn test_locked_editor_refuses_edits() {
        let mut editor = TagSetEditor::with_names(["A", "B"]);
        editor.lock();
        assert!(editor.add_row().is_err());
        assert!(editor.remove_last_row().is_err());
        assert!(editor.set_name(0, "C").is_err());
        assert!(!editor.can_remove());

        editor.unlock();
        editor.set_name(0, "C").unwrap();
        assert_eq!(editor.tag_names(), vec!["C", "B"]);
    }

    #[test]
    fn test_set_name_out_of_range() {
        let mut editor = TagSetEditor::new();
        assert!(matches!(
            editor.set_name(3, "X"),
            Err(PlcWatchError::Validation(_))
        ));
    }

    #[test]
    fn test_check_unique() {
        assert!(check_unique(&["A".into(), "B".into()]).is_ok());
        let err = check_unique(&["A".into(), "B".into(), "A".into()]).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate tag name: A");
    }

    #[test]
    fn test_first_read_applied_positionally() {
        let mut set = TagSet::from_names(&["B".into(), "A".into()]);
        let covered = set.apply_first_read(
            &[TagValue::Integer(2), TagValue::Integer(1)],
            &[Some("INT".into()), Some("DINT".into())],
        );
        assert_eq!(covered, 2);
        assert_eq!(set.by_name("B").unwrap().value, TagValue::Integer(2));
        assert_eq!(set.by_name("A").unwrap().data_type.as_deref(), Some("DINT"));
        assert_eq!(set.get(1).unwrap().index, 1);
    }

    #[test]
    fn test_short_arrays_leave_nulls() {
        let mut set = TagSet::from_names(&["A".into(), "B".into()]);
        let covered = set.apply_first_read(&[TagValue::Integer(1)], &[]);
        assert_eq!(covered, 0);
        assert_eq!(set.get(1).unwrap().value, TagValue::Null);
        assert_eq!(set.get(0).unwrap().data_type, None);
    }

    #[test]
    fn test_apply_values_ignores_extras() {
        let mut set = TagSet::from_names(&["A".into()]);
        let applied = set.apply_values(&[TagValue::Integer(3), TagValue::Integer(4)]);
        assert_eq!(applied, 1);
        assert_eq!(set.get(0).unwrap().value, TagValue::Integer(3));
    }
}
