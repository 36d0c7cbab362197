use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

use stocktrail_core::{
    CatalogEntry, CategoryDetail, ContainerTag, Disposition, Holder, Location, NewRecord, PartId,
    PartRecord, RecordId, Serial, Stamp, Succession, UserId,
};

use crate::error::StoreError;
use crate::traits::{CheckoutLogQuery, LedgerStore, RecordQuery, SerialFilter, UnitKey};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StoreError> {
    v.try_into()
        .map_err(|_| StoreError::Serialization(format!("invalid {label} length")))
}

const RECORD_COLUMNS: &str = "record_id, part_id, serial, location, building, owner, \
     container_tag, order_ref, prev, next_id, disposition, next_owner, created_at, \
     replaced_at, actor";

const ACTIVE: &str = "next_id IS NULL AND disposition IS NULL";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn select_records(&self, where_sql: &str, values: Vec<Value>) -> Result<Vec<PartRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM part_records WHERE {where_sql} ORDER BY created_at, record_id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), read_record_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }
        Ok(records)
    }
}

/// Build the WHERE fragment for a record query, excluding the active check.
fn query_clauses(query: &RecordQuery) -> (Vec<String>, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(part_id) = &query.part_id {
        clauses.push("part_id = ?".to_string());
        values.push(Value::Text(part_id.as_str().to_string()));
    }
    match &query.serial {
        SerialFilter::Any => {}
        SerialFilter::Bulk => clauses.push("serial IS NULL".to_string()),
        SerialFilter::Is(serial) => {
            clauses.push("serial = ?".to_string());
            values.push(Value::Text(serial.as_str().to_string()));
        }
    }
    if let Some(location) = &query.location {
        clauses.push("location = ?".to_string());
        values.push(Value::Text(location.as_str().to_string()));
    }
    if let Some(locations) = &query.location_in {
        let marks = vec!["?"; locations.len()].join(", ");
        clauses.push(format!("location IN ({marks})"));
        for location in locations {
            values.push(Value::Text(location.as_str().to_string()));
        }
    }
    if let Some(building) = query.building {
        clauses.push("building = ?".to_string());
        values.push(Value::Integer(building as i64));
    }
    if let Some(owner) = &query.owner {
        clauses.push("owner = ?".to_string());
        values.push(Value::Text(owner.encode()));
    }
    if let Some(container) = &query.container {
        clauses.push("container_tag = ?".to_string());
        values.push(Value::Text(container.as_str().to_string()));
    }
    if let Some(stamp) = query.created_at {
        clauses.push("created_at = ?".to_string());
        values.push(Value::Blob(stamp.to_bytes().to_vec()));
    }
    if let Some(actor) = query.actor {
        clauses.push("actor = ?".to_string());
        values.push(Value::Blob(actor.as_bytes().to_vec()));
    }

    (clauses, values)
}

fn unit_clause(unit: &UnitKey) -> (&'static str, Value) {
    match unit {
        UnitKey::Part(part_id) => ("part_id = ?", Value::Text(part_id.as_str().to_string())),
        UnitKey::Container(tag) => ("container_tag = ?", Value::Text(tag.as_str().to_string())),
    }
}

type RowResult = Result<PartRecord, StoreError>;

fn read_record_row(row: &rusqlite::Row) -> rusqlite::Result<RowResult> {
    let record_id: Vec<u8> = row.get(0)?;
    let part_id: String = row.get(1)?;
    let serial: Option<String> = row.get(2)?;
    let location: String = row.get(3)?;
    let building: i64 = row.get(4)?;
    let owner: Option<String> = row.get(5)?;
    let container_tag: Option<String> = row.get(6)?;
    let order_ref: Option<String> = row.get(7)?;
    let prev: Option<Vec<u8>> = row.get(8)?;
    let next_id: Option<Vec<u8>> = row.get(9)?;
    let disposition: Option<String> = row.get(10)?;
    let next_owner: Option<String> = row.get(11)?;
    let created_at: Vec<u8> = row.get(12)?;
    let replaced_at: Option<Vec<u8>> = row.get(13)?;
    let actor: Vec<u8> = row.get(14)?;

    Ok(build_record(
        record_id,
        part_id,
        serial,
        location,
        building,
        owner,
        container_tag,
        order_ref,
        prev,
        next_id,
        disposition,
        next_owner,
        created_at,
        replaced_at,
        actor,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_record(
    record_id: Vec<u8>,
    part_id: String,
    serial: Option<String>,
    location: String,
    building: i64,
    owner: Option<String>,
    container_tag: Option<String>,
    order_ref: Option<String>,
    prev: Option<Vec<u8>>,
    next_id: Option<Vec<u8>>,
    disposition: Option<String>,
    next_owner: Option<String>,
    created_at: Vec<u8>,
    replaced_at: Option<Vec<u8>>,
    actor: Vec<u8>,
) -> Result<PartRecord, StoreError> {
    let next = match (next_id, disposition) {
        (Some(id), _) => Succession::Replaced(RecordId::from_bytes(to_array::<16>(id, "next_id")?)),
        (None, Some(d)) => Succession::Retired(Disposition::parse(&d)?),
        (None, None) => Succession::Open,
    };

    Ok(PartRecord {
        record_id: RecordId::from_bytes(to_array::<16>(record_id, "record_id")?),
        part_id: PartId::parse(&part_id)?,
        serial: serial.as_deref().map(Serial::parse).transpose()?,
        location: Location::new(location),
        building: building as u32,
        owner: owner.as_deref().map(Holder::decode).transpose()?,
        container: container_tag.as_deref().map(ContainerTag::parse).transpose()?,
        order_ref,
        prev: prev
            .map(|v| to_array::<16>(v, "prev").map(RecordId::from_bytes))
            .transpose()?,
        next,
        next_owner: next_owner.as_deref().map(Holder::decode).transpose()?,
        created_at: Stamp::from_bytes(&to_array::<12>(created_at, "created_at")?),
        replaced_at: replaced_at
            .map(|v| to_array::<12>(v, "replaced_at").map(|b| Stamp::from_bytes(&b)))
            .transpose()?,
        actor: UserId::from_bytes(to_array::<16>(actor, "actor")?),
    })
}

impl LedgerStore for SqliteStore {
    fn insert(&mut self, record: &NewRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO part_records (record_id, part_id, serial, location, building, owner, \
             container_tag, order_ref, prev, next_id, disposition, next_owner, created_at, \
             replaced_at, actor) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10, NULL, ?11, NULL, ?12)",
            params![
                record.record_id.as_bytes().as_slice(),
                record.part_id.as_str(),
                record.serial.as_ref().map(|s| s.as_str()),
                record.location.as_str(),
                record.building as i64,
                record.owner.as_ref().map(|h| h.encode()),
                record.container.as_ref().map(|c| c.as_str()),
                record.order_ref.as_deref(),
                record.prev.map(|p| p.as_bytes().to_vec()),
                record.born_retired.map(|d| d.as_str()),
                &record.created_at.to_bytes()[..],
                record.actor.as_bytes().as_slice(),
            ],
        )?;
        Ok(())
    }

    fn close(
        &mut self,
        id: RecordId,
        successor: Succession,
        next_owner: Option<&Holder>,
        stamp: Stamp,
    ) -> Result<bool, StoreError> {
        let (next_id, disposition) = match successor {
            Succession::Open => {
                return Err(StoreError::ConstraintViolation(
                    "cannot close a record as open".into(),
                ));
            }
            Succession::Replaced(next) => (Some(next.as_bytes().to_vec()), None),
            Succession::Retired(d) => (None, Some(d.as_str())),
        };
        let updated = self.conn.execute(
            &format!(
                "UPDATE part_records SET next_id = ?1, disposition = ?2, next_owner = ?3, \
                 replaced_at = ?4 WHERE record_id = ?5 AND {ACTIVE}"
            ),
            params![
                next_id,
                disposition,
                next_owner.map(|h| h.encode()),
                &stamp.to_bytes()[..],
                id.as_bytes().as_slice(),
            ],
        )?;
        Ok(updated == 1)
    }

    fn get(&self, id: RecordId) -> Result<Option<PartRecord>, StoreError> {
        let mut records = self.select_records(
            "record_id = ?",
            vec![Value::Blob(id.as_bytes().to_vec())],
        )?;
        Ok(records.pop())
    }

    fn find_active(&self, query: &RecordQuery) -> Result<Vec<PartRecord>, StoreError> {
        let (mut clauses, values) = query_clauses(query);
        clauses.insert(0, ACTIVE.to_string());
        self.select_records(&clauses.join(" AND "), values)
    }

    fn find_one_active(&self, query: &RecordQuery) -> Result<Option<PartRecord>, StoreError> {
        Ok(self.find_active(query)?.into_iter().next())
    }

    fn count_active(&self, query: &RecordQuery) -> Result<u64, StoreError> {
        let (mut clauses, values) = query_clauses(query);
        clauses.insert(0, ACTIVE.to_string());
        let sql = format!(
            "SELECT COUNT(*) FROM part_records WHERE {}",
            clauses.join(" AND ")
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn distinct_stamps(&self, unit: &UnitKey) -> Result<Vec<Stamp>, StoreError> {
        let (clause, value) = unit_clause(unit);
        let sql = format!(
            "SELECT s FROM ( \
                 SELECT created_at AS s FROM part_records WHERE {clause} \
                 UNION \
                 SELECT replaced_at AS s FROM part_records \
                     WHERE {clause} AND replaced_at IS NOT NULL \
             ) ORDER BY s DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![value.clone(), value], |row| row.get::<_, Vec<u8>>(0))?;
        let mut stamps = Vec::new();
        for row in rows {
            stamps.push(Stamp::from_bytes(&to_array::<12>(row?, "stamp")?));
        }
        Ok(stamps)
    }

    fn created_at(&self, unit: &UnitKey, stamp: Stamp) -> Result<Vec<PartRecord>, StoreError> {
        let (clause, value) = unit_clause(unit);
        self.select_records(
            &format!("{clause} AND created_at = ?"),
            vec![value, Value::Blob(stamp.to_bytes().to_vec())],
        )
    }

    fn replaced_at(&self, unit: &UnitKey, stamp: Stamp) -> Result<Vec<PartRecord>, StoreError> {
        let (clause, value) = unit_clause(unit);
        self.select_records(
            &format!("{clause} AND replaced_at = ?"),
            vec![value, Value::Blob(stamp.to_bytes().to_vec())],
        )
    }

    fn existing_at(&self, unit: &UnitKey, stamp: Stamp) -> Result<Vec<PartRecord>, StoreError> {
        let (clause, value) = unit_clause(unit);
        let stamp_blob = Value::Blob(stamp.to_bytes().to_vec());
        self.select_records(
            &format!("{clause} AND created_at < ? AND (replaced_at IS NULL OR replaced_at > ?)"),
            vec![value, stamp_blob.clone(), stamp_blob],
        )
    }

    fn closed_in_range(&self, query: &CheckoutLogQuery) -> Result<Vec<PartRecord>, StoreError> {
        let mut clauses = vec![
            "next_id IS NOT NULL".to_string(),
            "next_owner IS NOT NULL".to_string(),
            "replaced_at >= ?".to_string(),
            "replaced_at < ?".to_string(),
        ];
        let mut values = vec![
            Value::Blob(query.from.to_bytes().to_vec()),
            Value::Blob(query.until.to_bytes().to_vec()),
        ];
        if let Some(locations) = &query.source_locations {
            let marks = vec!["?"; locations.len()].join(", ");
            clauses.push(format!("location IN ({marks})"));
            for location in locations {
                values.push(Value::Text(location.as_str().to_string()));
            }
        }
        if let Some(holder) = &query.next_owner {
            clauses.push("next_owner = ?".to_string());
            values.push(Value::Text(holder.encode()));
        }
        self.select_records(&clauses.join(" AND "), values)
    }

    fn put_part(&mut self, entry: &CatalogEntry) -> Result<(), StoreError> {
        let detail = entry.detail.to_msgpack()?;
        self.conn.execute(
            "INSERT INTO catalog (part_id, manufacturer, name, serialized, consumable, \
             shelf_location, category, detail, notes, created_by, created_at, audited_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
             ON CONFLICT(part_id) DO UPDATE SET manufacturer = excluded.manufacturer, \
             name = excluded.name, serialized = excluded.serialized, \
             consumable = excluded.consumable, shelf_location = excluded.shelf_location, \
             category = excluded.category, detail = excluded.detail, notes = excluded.notes, \
             audited_at = excluded.audited_at",
            params![
                entry.part_id.as_str(),
                entry.manufacturer,
                entry.name,
                entry.serialized,
                entry.consumable,
                entry.shelf_location,
                entry.detail.category_name(),
                detail,
                entry.notes,
                entry.created_by.as_bytes().as_slice(),
                &entry.created_at.to_bytes()[..],
                entry.audited_at.map(|s| s.to_bytes().to_vec()),
            ],
        )?;
        Ok(())
    }

    fn get_part(&self, part_id: &PartId) -> Result<Option<CatalogEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT part_id, manufacturer, name, serialized, consumable, shelf_location, \
             detail, notes, created_by, created_at, audited_at FROM catalog WHERE part_id = ?1",
        )?;
        let mut rows = stmt.query(params![part_id.as_str()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let part_id: String = row.get(0)?;
        let detail_bytes: Vec<u8> = row.get(6)?;
        let created_by: Vec<u8> = row.get(8)?;
        let created_at: Vec<u8> = row.get(9)?;
        let audited_at: Option<Vec<u8>> = row.get(10)?;
        Ok(Some(CatalogEntry {
            part_id: PartId::parse(&part_id)?,
            manufacturer: row.get(1)?,
            name: row.get(2)?,
            serialized: row.get(3)?,
            consumable: row.get(4)?,
            shelf_location: row.get(5)?,
            detail: CategoryDetail::from_msgpack(&detail_bytes)?,
            notes: row.get(7)?,
            created_by: UserId::from_bytes(to_array::<16>(created_by, "created_by")?),
            created_at: Stamp::from_bytes(&to_array::<12>(created_at, "created_at")?),
            audited_at: audited_at
                .map(|v| to_array::<12>(v, "audited_at").map(|b| Stamp::from_bytes(&b)))
                .transpose()?,
        }))
    }

    fn delete_part(&mut self, part_id: &PartId) -> Result<bool, StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM catalog WHERE part_id = ?1", params![part_id.as_str()])?;
        Ok(deleted == 1)
    }

    fn rename_part(&mut self, from: &PartId, to: &PartId) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE catalog SET part_id = ?1 WHERE part_id = ?2",
            params![to.as_str(), from.as_str()],
        )?;
        tx.execute(
            "UPDATE part_records SET part_id = ?1 WHERE part_id = ?2",
            params![to.as_str(), from.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn list_part_ids(&self) -> Result<Vec<PartId>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT part_id FROM catalog ORDER BY part_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(PartId::parse(&row?)?);
        }
        Ok(ids)
    }

    fn set_audit_date(&mut self, part_id: &PartId, stamp: Stamp) -> Result<bool, StoreError> {
        let updated = self.conn.execute(
            "UPDATE catalog SET audited_at = ?1 WHERE part_id = ?2",
            params![&stamp.to_bytes()[..], part_id.as_str()],
        )?;
        Ok(updated == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocktrail_core::NewRecord;

    fn seed_record(part: &str) -> NewRecord {
        NewRecord::introduced(
            PartId::parse(part).unwrap(),
            Location::new("Kiosk One"),
            1,
            Stamp::new(1_000, 0),
            UserId::new(),
        )
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let record = seed_record("PN0000001");
        store.insert(&record).unwrap();

        let loaded = store.get(record.record_id).unwrap().unwrap();
        assert_eq!(loaded.record_id, record.record_id);
        assert_eq!(loaded.part_id, record.part_id);
        assert!(loaded.is_active());
        assert_eq!(loaded.created_at, record.created_at);
        assert!(loaded.replaced_at.is_none());
    }

    #[test]
    fn close_is_conditional() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let record = seed_record("PN0000001");
        store.insert(&record).unwrap();

        let successor = RecordId::new();
        let stamp = Stamp::new(2_000, 0);
        assert!(store
            .close(record.record_id, Succession::Replaced(successor), None, stamp)
            .unwrap());
        // A second close loses: the record is no longer open.
        assert!(!store
            .close(record.record_id, Succession::Replaced(RecordId::new()), None, stamp)
            .unwrap());

        let loaded = store.get(record.record_id).unwrap().unwrap();
        assert_eq!(loaded.next.successor(), Some(successor));
        assert_eq!(loaded.replaced_at, Some(stamp));
    }

    #[test]
    fn close_as_open_is_rejected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let record = seed_record("PN0000001");
        store.insert(&record).unwrap();
        let result = store.close(record.record_id, Succession::Open, None, Stamp::new(2_000, 0));
        assert!(matches!(result, Err(StoreError::ConstraintViolation(_))));
    }

    #[test]
    fn retired_records_are_not_active() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let record = seed_record("PN0000001");
        store.insert(&record).unwrap();
        store
            .close(
                record.record_id,
                Succession::Retired(Disposition::Lost),
                None,
                Stamp::new(2_000, 0),
            )
            .unwrap();

        let query = RecordQuery::new().part(PartId::parse("PN0000001").unwrap());
        assert_eq!(store.count_active(&query).unwrap(), 0);
        let loaded = store.get(record.record_id).unwrap().unwrap();
        assert_eq!(loaded.next, Succession::Retired(Disposition::Lost));
    }

    #[test]
    fn distinct_stamps_merge_created_and_replaced() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let record = seed_record("PN0000001");
        store.insert(&record).unwrap();
        let t2 = Stamp::new(2_000, 0);
        let mut successor = seed_record("PN0000001");
        successor.prev = Some(record.record_id);
        successor.created_at = t2;
        store.insert(&successor).unwrap();
        store
            .close(record.record_id, Succession::Replaced(successor.record_id), None, t2)
            .unwrap();

        let unit = UnitKey::Part(PartId::parse("PN0000001").unwrap());
        let stamps = store.distinct_stamps(&unit).unwrap();
        // t2 appears once even though it is both a created_at and a replaced_at.
        assert_eq!(stamps, vec![t2, Stamp::new(1_000, 0)]);
    }
}
