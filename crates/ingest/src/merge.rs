use crate::record::EntityRecord;
use crate::table::EntityTable;
use acmi::EntityId;
use mesh_catalog::{MeshResolver, ShapeRewrite};
use std::collections::HashMap;

/// Counts from folding one chunk's frames into the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub updated: usize,
}

/// Resolves model paths for entities seen for the first time.
pub struct ShapeResolver<'a> {
    pub meshes: Option<&'a dyn MeshResolver>,
    pub rewrite: &'a ShapeRewrite,
}

impl ShapeResolver<'_> {
    fn model_path(&self, record: &EntityRecord) -> String {
        let Some(meshes) = self.meshes else {
            return String::new();
        };
        let entry = meshes.resolve(&record.statics.kind, &record.statics.name);
        self.rewrite.model_path(entry.as_deref())
    }
}

/// Fold decoded frames, in arrival order, into records ready for the table.
///
/// The first frame of an unknown id becomes the entity's static snapshot.
/// Every other frame only replaces dynamic fields. Nothing is written here;
/// the caller commits the result with [`commit`].
pub fn fold_frames<I>(
    table: &EntityTable,
    frames: I,
    shapes: &ShapeResolver<'_>,
) -> (HashMap<EntityId, EntityRecord>, MergeOutcome)
where
    I: IntoIterator<Item = EntityRecord>,
{
    let mut merged: HashMap<EntityId, EntityRecord> = HashMap::new();
    let mut outcome = MergeOutcome::default();

    for frame in frames {
        if let Some(pending) = merged.get_mut(&frame.id) {
            *pending = pending.advance(&frame);
            continue;
        }

        let record = match table.get(frame.id.as_str()) {
            Some(existing) => {
                outcome.updated += 1;
                existing.advance(&frame)
            }
            None => {
                outcome.inserted += 1;
                let mut fresh = frame;
                fresh.statics.shape = shapes.model_path(&fresh);
                tracing::debug!(
                    id = %fresh.id,
                    kind = %fresh.statics.kind,
                    shape = %fresh.statics.shape,
                    "New entity"
                );
                fresh
            }
        };
        merged.insert(record.id.clone(), record);
    }

    (merged, outcome)
}

/// Write folded records with one notification, then close the turn.
///
/// Returns the table version carrying the records, if anything was written.
pub fn commit(table: &EntityTable, merged: HashMap<EntityId, EntityRecord>) -> Option<u64> {
    if table.upsert_batch(merged.into_values()) == 0 {
        return None;
    }
    // The scheduled flush may already have published on another worker thread.
    table.flush().or_else(|| Some(table.version()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use acmi::{parse_record, CoordinateState, ParseMode, ReferenceFrame};
    use mesh_catalog::{CachedMeshFinder, MeshLibrary};
    use std::sync::Arc;

    fn frames(lines: &[&str], time: i64) -> Vec<EntityRecord> {
        let mut coords = CoordinateState::new();
        lines
            .iter()
            .map(|line| {
                let update =
                    parse_record(line, &ReferenceFrame::default(), &mut coords, ParseMode::Strict)
                        .unwrap();
                EntityRecord::from_update(update, time)
            })
            .collect()
    }

    fn finder() -> CachedMeshFinder {
        let library = MeshLibrary::from_json(
            r#"{ "Air": [ { "Name": ["F16", "Viper"], "Type": ["Air", "FixedWing"], "Shape": ["Meshes/f16.obj"] } ] }"#,
        )
        .unwrap();
        CachedMeshFinder::new(Arc::new(library))
    }

    #[test]
    fn new_entities_get_a_model_path() {
        let table = EntityTable::new();
        let finder = finder();
        let rewrite = ShapeRewrite::default();
        let shapes = ShapeResolver { meshes: Some(&finder), rewrite: &rewrite };

        let (merged, outcome) = fold_frames(
            &table,
            frames(&["a1,Name=Viper,Type=Air+FixedWing", "b2,Name=Boat,Type=Sea+Watercraft"], 0),
            &shapes,
        );
        assert_eq!(outcome, MergeOutcome { inserted: 2, updated: 0 });
        assert_eq!(merged[&EntityId::sanitize("a1")].statics.shape, "/Meshes/f16.glb");
        assert_eq!(merged[&EntityId::sanitize("b2")].statics.shape, "");

        assert_eq!(commit(&table, merged), Some(1));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn known_entities_keep_statics() {
        let table = EntityTable::new();
        let rewrite = ShapeRewrite::default();
        let shapes = ShapeResolver { meshes: None, rewrite: &rewrite };

        let (merged, _) = fold_frames(&table, frames(&["a1,Name=Viper,T=1|1|100"], 0), &shapes);
        commit(&table, merged);

        let (merged, outcome) =
            fold_frames(&table, frames(&["a1,Name=Flanker,T=2|2|200", "a1,T=3|3|300"], 10), &shapes);
        assert_eq!(outcome, MergeOutcome { inserted: 0, updated: 1 });
        commit(&table, merged);

        let record = table.get("a1").unwrap();
        assert_eq!(record.statics.name, "Viper");
        assert_eq!(record.dynamics.pose.altitude, 300.0);
        assert_eq!(record.dynamics.time, 10);
    }

    #[test]
    fn replaying_a_chunk_is_idempotent() {
        let table = EntityTable::new();
        let rewrite = ShapeRewrite::default();
        let shapes = ShapeResolver { meshes: None, rewrite: &rewrite };
        let chunk = frames(&["a1,Name=Viper,T=1|1|100", "b2,Visible=0,T=5|5|5"], 20);

        commit(&table, fold_frames(&table, chunk.clone(), &shapes).0);
        let mut first = table.snapshot();
        commit(&table, fold_frames(&table, chunk, &shapes).0);
        let mut second = table.snapshot();

        first.sort_by(|a, b| a.id.cmp(&b.id));
        second.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(first, second);
    }

    #[test]
    fn empty_chunk_publishes_nothing() {
        let table = EntityTable::new();
        let rewrite = ShapeRewrite::default();
        let shapes = ShapeResolver { meshes: None, rewrite: &rewrite };
        let (merged, outcome) = fold_frames(&table, Vec::new(), &shapes);
        assert_eq!(outcome, MergeOutcome::default());
        assert_eq!(commit(&table, merged), None);
    }
}
