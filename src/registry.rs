//! Well registry: the storage collaborator the engine writes through.
//!
//! The registry is an explicit dependency handed to the resolver and the
//! merge engine, never ambient state. It is deliberately dumb storage:
//! patches are applied as given; the monotonic-fill policy lives in the
//! merge engine that builds them.

use rusqlite::{params, Connection};
use std::path::Path;

use crate::error::ReconcileError;
use crate::resolve::normalize_name;
use crate::types::{EquipmentSpecs, RecordDraft, RecordEntity, RecordKind, WellEntity, WellPatch};

pub trait WellRegistry {
    /// Snapshot of every well in registration order.
    fn list_all(&self) -> Result<Vec<WellEntity>, ReconcileError>;

    /// Exact lookup on the normalized name form.
    fn find_by_name(&self, name: &str) -> Result<Option<WellEntity>, ReconcileError>;

    fn get(&self, id: &str) -> Result<Option<WellEntity>, ReconcileError>;

    /// Insert a new well; the caller supplies the id.
    fn create(&mut self, well: WellEntity) -> Result<WellEntity, ReconcileError>;

    /// Apply a partial update. Only `Some` members are written.
    fn update_fields(&mut self, id: &str, patch: &WellPatch) -> Result<WellEntity, ReconcileError>;

    /// Append a history record; the registry assigns the record id and
    /// inserts newest-first.
    fn append_record(
        &mut self,
        id: &str,
        draft: RecordDraft,
    ) -> Result<RecordEntity, ReconcileError>;
}

fn apply_equipment_patch(existing: &mut EquipmentSpecs, patch: &EquipmentSpecs) {
    macro_rules! set_if_some {
        ($field:ident) => {
            if let Some(v) = &patch.$field {
                existing.$field = Some(v.clone());
            }
        };
    }
    set_if_some!(engine_size);
    set_if_some!(unit_make_model);
    set_if_some!(bridal_cable);
    set_if_some!(polish_rods);
    set_if_some!(liner_size);
    set_if_some!(packing);
    set_if_some!(rods);
    set_if_some!(tubing);
}

fn apply_patch(well: &mut WellEntity, patch: &WellPatch) {
    if let Some(location) = &patch.location {
        well.location = location.clone();
    }
    if let Some(pump_type) = &patch.pump_type {
        well.pump_type = pump_type.clone();
    }
    apply_equipment_patch(&mut well.equipment, &patch.equipment);
}

/// In-memory registry. Registration order is insertion order, which keeps
/// the resolver's tie-breaking stable.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    wells: Vec<WellEntity>,
    next_record_id: u64,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn well_mut(&mut self, id: &str) -> Result<&mut WellEntity, ReconcileError> {
        self.wells
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| ReconcileError::Registry(format!("no such well: {}", id)))
    }
}

impl WellRegistry for MemoryRegistry {
    fn list_all(&self) -> Result<Vec<WellEntity>, ReconcileError> {
        Ok(self.wells.clone())
    }

    fn find_by_name(&self, name: &str) -> Result<Option<WellEntity>, ReconcileError> {
        let norm = normalize_name(name);
        Ok(self
            .wells
            .iter()
            .find(|w| normalize_name(&w.name) == norm)
            .cloned())
    }

    fn get(&self, id: &str) -> Result<Option<WellEntity>, ReconcileError> {
        Ok(self.wells.iter().find(|w| w.id == id).cloned())
    }

    fn create(&mut self, well: WellEntity) -> Result<WellEntity, ReconcileError> {
        if self.wells.iter().any(|w| w.id == well.id) {
            return Err(ReconcileError::Registry(format!(
                "well id already exists: {}",
                well.id
            )));
        }
        self.wells.push(well.clone());
        Ok(well)
    }

    fn update_fields(&mut self, id: &str, patch: &WellPatch) -> Result<WellEntity, ReconcileError> {
        let well = self.well_mut(id)?;
        apply_patch(well, patch);
        Ok(well.clone())
    }

    fn append_record(
        &mut self,
        id: &str,
        draft: RecordDraft,
    ) -> Result<RecordEntity, ReconcileError> {
        self.next_record_id += 1;
        let record = RecordEntity {
            id: format!("rec-{}", self.next_record_id),
            kind: draft.kind,
            date: draft.date,
            notes: draft.notes,
            by: draft.by,
        };
        let well = self.well_mut(id)?;
        well.records.insert(0, record.clone());
        Ok(record)
    }
}

/// SQLite-backed registry. Equipment specs are stored as a JSON text
/// column; records live in their own table and read back newest-first.
pub struct SqliteRegistry {
    conn: Connection,
}

impl SqliteRegistry {
    pub fn open(db_path: &Path) -> Result<Self, ReconcileError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ReconcileError::Registry(e.to_string()))?;
        }
        let conn =
            Connection::open(db_path).map_err(|e| ReconcileError::Registry(e.to_string()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, ReconcileError> {
        let conn =
            Connection::open_in_memory().map_err(|e| ReconcileError::Registry(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, ReconcileError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO schema_version (version) SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM schema_version LIMIT 1);
            CREATE TABLE IF NOT EXISTS wells (
                rowid_order INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                pump_type TEXT NOT NULL DEFAULT '',
                equipment TEXT NOT NULL DEFAULT '{}'
            );
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                well_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                date TEXT NOT NULL,
                notes TEXT NOT NULL DEFAULT '',
                created_by TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (well_id) REFERENCES wells(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_records_well ON records(well_id);
            ",
        )
        .map_err(|e| ReconcileError::Registry(e.to_string()))?;
        Ok(Self { conn })
    }

    fn records_for(&self, well_id: &str) -> Result<Vec<RecordEntity>, ReconcileError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, kind, date, notes, created_by FROM records WHERE well_id = ?1 ORDER BY id DESC",
            )
            .map_err(|e| ReconcileError::Registry(e.to_string()))?;
        let rows = stmt
            .query_map(params![well_id], |r| {
                Ok(RecordEntity {
                    id: format!("rec-{}", r.get::<_, i64>(0)?),
                    kind: RecordKind::from_str_lossy(&r.get::<_, String>(1)?),
                    date: r.get(2)?,
                    notes: r.get(3)?,
                    by: r.get(4)?,
                })
            })
            .map_err(|e| ReconcileError::Registry(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| ReconcileError::Registry(e.to_string()))
    }

    fn row_to_well(
        &self,
        id: String,
        name: String,
        location: String,
        pump_type: String,
        equipment_json: String,
    ) -> Result<WellEntity, ReconcileError> {
        let equipment: EquipmentSpecs =
            serde_json::from_str(&equipment_json).unwrap_or_default();
        let records = self.records_for(&id)?;
        Ok(WellEntity {
            id,
            name,
            location,
            pump_type,
            equipment,
            records,
        })
    }

    fn well_rows(&self, where_sql: &str, arg: Option<&str>) -> Result<Vec<WellEntity>, ReconcileError> {
        let sql = format!(
            "SELECT id, name, location, pump_type, equipment FROM wells {} ORDER BY rowid_order",
            where_sql
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| ReconcileError::Registry(e.to_string()))?;
        let mapper = |r: &rusqlite::Row<'_>| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
            ))
        };
        let rows: Vec<(String, String, String, String, String)> = match arg {
            Some(a) => stmt
                .query_map(params![a], mapper)
                .map_err(|e| ReconcileError::Registry(e.to_string()))?
                .collect::<Result<_, _>>()
                .map_err(|e| ReconcileError::Registry(e.to_string()))?,
            None => stmt
                .query_map([], mapper)
                .map_err(|e| ReconcileError::Registry(e.to_string()))?
                .collect::<Result<_, _>>()
                .map_err(|e| ReconcileError::Registry(e.to_string()))?,
        };
        rows.into_iter()
            .map(|(id, name, location, pump_type, eq)| {
                self.row_to_well(id, name, location, pump_type, eq)
            })
            .collect()
    }

}

impl WellRegistry for SqliteRegistry {
    fn list_all(&self) -> Result<Vec<WellEntity>, ReconcileError> {
        self.well_rows("", None)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<WellEntity>, ReconcileError> {
        let norm = normalize_name(name);
        Ok(self
            .list_all()?
            .into_iter()
            .find(|w| normalize_name(&w.name) == norm))
    }

    fn get(&self, id: &str) -> Result<Option<WellEntity>, ReconcileError> {
        Ok(self.well_rows("WHERE id = ?1", Some(id))?.into_iter().next())
    }

    fn create(&mut self, well: WellEntity) -> Result<WellEntity, ReconcileError> {
        let equipment = serde_json::to_string(&well.equipment)
            .map_err(|e| ReconcileError::Registry(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO wells (id, name, location, pump_type, equipment) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![well.id, well.name, well.location, well.pump_type, equipment],
            )
            .map_err(|e| ReconcileError::Registry(e.to_string()))?;
        Ok(well)
    }

    fn update_fields(&mut self, id: &str, patch: &WellPatch) -> Result<WellEntity, ReconcileError> {
        let mut well = self
            .get(id)?
            .ok_or_else(|| ReconcileError::Registry(format!("no such well: {}", id)))?;
        apply_patch(&mut well, patch);
        let equipment = serde_json::to_string(&well.equipment)
            .map_err(|e| ReconcileError::Registry(e.to_string()))?;
        // One statement, so a patch lands fully or not at all.
        self.conn
            .execute(
                "UPDATE wells SET location = ?1, pump_type = ?2, equipment = ?3 WHERE id = ?4",
                params![well.location, well.pump_type, equipment, id],
            )
            .map_err(|e| ReconcileError::Registry(e.to_string()))?;
        Ok(well)
    }

    fn append_record(
        &mut self,
        id: &str,
        draft: RecordDraft,
    ) -> Result<RecordEntity, ReconcileError> {
        if self.get(id)?.is_none() {
            return Err(ReconcileError::Registry(format!("no such well: {}", id)));
        }
        self.conn
            .execute(
                "INSERT INTO records (well_id, kind, date, notes, created_by) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, draft.kind.as_str(), draft.date, draft.notes, draft.by],
            )
            .map_err(|e| ReconcileError::Registry(e.to_string()))?;
        let rowid = self.conn.last_insert_rowid();
        Ok(RecordEntity {
            id: format!("rec-{}", rowid),
            kind: draft.kind,
            date: draft.date,
            notes: draft.notes,
            by: draft.by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(notes: &str) -> RecordDraft {
        RecordDraft {
            kind: RecordKind::Service,
            date: "2024-02-19".to_string(),
            notes: notes.to_string(),
            by: "Invoice OCR".to_string(),
        }
    }

    fn new_well(id: &str, name: &str) -> WellEntity {
        WellEntity {
            id: id.to_string(),
            name: name.to_string(),
            location: String::new(),
            pump_type: String::new(),
            equipment: Default::default(),
            records: Vec::new(),
        }
    }

    #[test]
    fn memory_patch_only_touches_some_fields() {
        let mut reg = MemoryRegistry::new();
        let mut well = new_well("well-1", "North 12A");
        well.location = "Section 4".to_string();
        reg.create(well).unwrap();

        let patch = WellPatch {
            pump_type: Some("Pumpjack".to_string()),
            ..Default::default()
        };
        let updated = reg.update_fields("well-1", &patch).unwrap();
        assert_eq!(updated.location, "Section 4");
        assert_eq!(updated.pump_type, "Pumpjack");
    }

    #[test]
    fn memory_records_are_newest_first() {
        let mut reg = MemoryRegistry::new();
        reg.create(new_well("well-1", "North 12A")).unwrap();
        reg.append_record("well-1", draft("first")).unwrap();
        reg.append_record("well-1", draft("second")).unwrap();
        let well = reg.get("well-1").unwrap().unwrap();
        assert_eq!(well.records[0].notes, "second");
        assert_eq!(well.records[1].notes, "first");
    }

    #[test]
    fn memory_rejects_duplicate_ids_and_unknown_wells() {
        let mut reg = MemoryRegistry::new();
        reg.create(new_well("well-1", "North 12A")).unwrap();
        assert!(reg.create(new_well("well-1", "Other")).is_err());
        assert!(reg.append_record("nope", draft("x")).is_err());
    }

    #[test]
    fn sqlite_roundtrip_preserves_equipment_and_order() {
        let mut reg = SqliteRegistry::open_in_memory().unwrap();
        let mut well = new_well("well-north-12a", "North 12A");
        well.equipment.rods = Some("54 x 3/4\"".to_string());
        reg.create(well).unwrap();
        reg.create(new_well("well-east-8b", "East 8B")).unwrap();

        reg.append_record("well-north-12a", draft("older")).unwrap();
        reg.append_record("well-north-12a", draft("newer")).unwrap();

        let all = reg.list_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "well-north-12a");
        assert_eq!(all[0].equipment.rods.as_deref(), Some("54 x 3/4\""));
        assert_eq!(all[0].records[0].notes, "newer");

        let patch = WellPatch {
            location: Some("Section 4".to_string()),
            equipment: EquipmentSpecs {
                tubing: Some("120 joints 2-3/8\"".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let updated = reg.update_fields("well-north-12a", &patch).unwrap();
        assert_eq!(updated.location, "Section 4");
        assert_eq!(updated.equipment.rods.as_deref(), Some("54 x 3/4\""));
        assert_eq!(updated.equipment.tubing.as_deref(), Some("120 joints 2-3/8\""));

        let found = reg.find_by_name("north 12a").unwrap();
        assert_eq!(found.map(|w| w.id).as_deref(), Some("well-north-12a"));
    }
}
