//! Id compaction after a delete.
//!
//! Deleting preset `k` shifts the contiguous run of presets above it down by
//! one: `k+1` becomes `k`, `k+2` becomes `k+1`, and so on until the first gap.
//! Presets past the gap keep their ids.
//!
//! The shift silently changes what any stored reference to a shifted id
//! points at. The returned [`Compaction`] lists every move so owners of such
//! references can migrate them.

use serde_json::{Map, Value};

use lumen_core::PresetId;

/// Record of what a delete did to the id space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compaction {
    /// The deleted id.
    pub removed: PresetId,
    /// `(old, new)` pairs, in the order they were applied.
    pub moves: Vec<(PresetId, PresetId)>,
}

impl Compaction {
    /// Where a reference to `id` points after the delete.
    ///
    /// Returns `None` for the deleted id itself.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lumen_core::PresetId;
    /// use lumen_store::Compaction;
    ///
    /// let compaction = Compaction {
    ///     removed: PresetId::new(3),
    ///     moves: vec![
    ///         (PresetId::new(4), PresetId::new(3)),
    ///         (PresetId::new(5), PresetId::new(4)),
    ///     ],
    /// };
    /// assert_eq!(compaction.resolve(PresetId::new(2)), Some(PresetId::new(2)));
    /// assert_eq!(compaction.resolve(PresetId::new(3)), None);
    /// assert_eq!(compaction.resolve(PresetId::new(5)), Some(PresetId::new(4)));
    /// ```
    pub fn resolve(&self, id: PresetId) -> Option<PresetId> {
        if id == self.removed {
            return None;
        }
        Some(
            self.moves
                .iter()
                .find(|(old, _)| *old == id)
                .map_or(id, |(_, new)| *new),
        )
    }

    /// Returns true if no record changed id.
    pub fn is_trivial(&self) -> bool {
        self.moves.is_empty()
    }
}

/// Remove `removed` from `doc` and shift the run above it down by one.
///
/// Returns `None` if `removed` is not present; `doc` is then untouched.
/// Ids at or above the quick slot are never shifted.
pub fn delete_and_compact(doc: &mut Map<String, Value>, removed: PresetId) -> Option<Compaction> {
    doc.remove(&removed.key())?;

    let mut moves = Vec::new();
    let mut target = removed;
    while let Some(source) = target.next().filter(|id| !id.is_quick()) {
        let Some(record) = doc.remove(&source.key()) else {
            break;
        };
        doc.insert(target.key(), record);
        moves.push((source, target));
        target = source;
    }

    Some(Compaction { removed, moves })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(raw: u8) -> PresetId {
        PresetId::new(raw)
    }

    fn doc_with(ids: &[u8]) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert("0".into(), json!({}));
        for raw in ids {
            doc.insert(raw.to_string(), json!({ "n": format!("was {raw}") }));
        }
        doc
    }

    fn name_at(doc: &Map<String, Value>, raw: u8) -> Option<&str> {
        doc.get(&raw.to_string())?.get("n")?.as_str()
    }

    #[test]
    fn test_delete_middle_shifts_run() {
        let mut doc = doc_with(&[1, 2, 3, 4, 5]);
        let compaction = delete_and_compact(&mut doc, id(3)).unwrap();
        assert_eq!(compaction.moves, vec![(id(4), id(3)), (id(5), id(4))]);
        assert_eq!(name_at(&doc, 1), Some("was 1"));
        assert_eq!(name_at(&doc, 2), Some("was 2"));
        assert_eq!(name_at(&doc, 3), Some("was 4"));
        assert_eq!(name_at(&doc, 4), Some("was 5"));
        assert!(!doc.contains_key("5"));
    }

    #[test]
    fn test_shift_stops_at_gap() {
        let mut doc = doc_with(&[1, 2, 3, 5, 6]);
        let compaction = delete_and_compact(&mut doc, id(2)).unwrap();
        assert_eq!(compaction.moves, vec![(id(3), id(2))]);
        assert_eq!(name_at(&doc, 2), Some("was 3"));
        assert!(!doc.contains_key("3"));
        assert_eq!(name_at(&doc, 5), Some("was 5"));
        assert_eq!(name_at(&doc, 6), Some("was 6"));
    }

    #[test]
    fn test_delete_last_has_no_moves() {
        let mut doc = doc_with(&[1, 2]);
        let compaction = delete_and_compact(&mut doc, id(2)).unwrap();
        assert!(compaction.is_trivial());
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_delete_missing_leaves_doc() {
        let mut doc = doc_with(&[1, 2]);
        let before = doc.clone();
        assert!(delete_and_compact(&mut doc, id(9)).is_none());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_quick_slot_never_shifted() {
        let mut doc = doc_with(&[253, 254]);
        doc.insert("255".into(), json!({ "n": "quick" }));
        let compaction = delete_and_compact(&mut doc, id(253)).unwrap();
        assert_eq!(compaction.moves, vec![(id(254), id(253))]);
        assert_eq!(name_at(&doc, 255), Some("quick"));
    }
}
