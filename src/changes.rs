use crate::dns::{Record, RecordParams};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZoneRef {
    pub id: String,
    pub name: String,
}

/// A record as it should be written. Kept apart from [`Record`] so that a
/// pending change never passes for a fetched one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub zone: ZoneRef,
    pub name: String,
    pub record_type: String,
    pub value: String,
    pub ttl: Option<i64>,
}

impl PendingRecord {
    fn from_existing(zone: &ZoneRef, record: &Record) -> Self {
        Self {
            zone: zone.clone(),
            name: record.name.clone(),
            record_type: record.record_type.clone(),
            value: record.value.clone(),
            ttl: record.ttl,
        }
    }

    /// Request body for this record; an unset TTL becomes `default_ttl`.
    pub fn params(&self, default_ttl: i64) -> RecordParams {
        RecordParams {
            zone_id: self.zone.id.clone(),
            name: self.name.clone(),
            record_type: self.record_type.clone(),
            value: self.value.clone(),
            ttl: Some(self.ttl.unwrap_or(default_ttl)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordUpdate {
    pub id: String,
    pub record: PendingRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDelete {
    pub id: String,
    pub record: PendingRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    dry_run: bool,
    default_ttl: i64,

    creates: Vec<PendingRecord>,
    updates: Vec<RecordUpdate>,
    deletes: Vec<RecordDelete>,
}

impl ChangeSet {
    pub fn new(dry_run: bool, default_ttl: i64) -> Self {
        Self {
            dry_run,
            default_ttl,
            creates: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
        }
    }

    pub fn add_create(
        &mut self,
        zone: &ZoneRef,
        name: String,
        record_type: &str,
        value: String,
        ttl: Option<i64>,
    ) {
        self.creates.push(PendingRecord {
            zone: zone.clone(),
            name,
            record_type: record_type.to_owned(),
            value,
            ttl,
        });
    }

    pub fn add_update(
        &mut self,
        zone: &ZoneRef,
        existing: &Record,
        name: String,
        value: String,
        ttl: Option<i64>,
    ) {
        self.updates.push(RecordUpdate {
            id: existing.id.clone(),
            record: PendingRecord {
                zone: zone.clone(),
                name,
                record_type: existing.record_type.clone(),
                value,
                ttl,
            },
        });
    }

    pub fn add_delete(&mut self, zone: &ZoneRef, existing: &Record) {
        self.deletes.push(RecordDelete {
            id: existing.id.clone(),
            record: PendingRecord::from_existing(zone, existing),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    pub fn creates(&self) -> &[PendingRecord] {
        &self.creates
    }

    pub fn updates(&self) -> &[RecordUpdate] {
        &self.updates
    }

    pub fn deletes(&self) -> &[RecordDelete] {
        &self.deletes
    }
}
