use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::models::{Record, RecordInput, RecordListParams};

#[derive(Default)]
struct RecordTable {
    rows: BTreeMap<i64, Record>,
    next_id: i64,
}

/// In-process record store shared by the HTTP, WebSocket and RPC surfaces
///
/// Ids start at 1, only grow, and are never handed out twice even after a
/// delete. Listing walks rows in id order.
#[derive(Clone, Default)]
pub struct RecordRepository {
    table: Arc<RwLock<RecordTable>>,
}

impl RecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a record by ID
    pub fn get(&self, id: i64) -> Option<Record> {
        self.table.read().rows.get(&id).cloned()
    }

    /// List records matching the search term, paginated
    ///
    /// Returns the requested page and the total number of matches.
    pub fn list(&self, params: &RecordListParams) -> Result<(Vec<Record>, usize)> {
        params.validate()?;

        let needle = params.search_term().map(str::to_lowercase);
        let table = self.table.read();
        let matches: Vec<&Record> = table
            .rows
            .values()
            .filter(|r| name_matches(r, needle.as_deref()))
            .collect();

        let total = matches.len();
        let page_size = params.page_size();
        let start = (params.page() - 1).saturating_mul(page_size);
        let page = matches
            .into_iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();

        Ok((page, total))
    }

    /// Every record whose name contains `term`, case-insensitively, in id order
    ///
    /// A blank term matches everything.
    pub fn search(&self, term: Option<&str>) -> Vec<Record> {
        let needle = term.filter(|t| !t.is_empty()).map(str::to_lowercase);
        self.table
            .read()
            .rows
            .values()
            .filter(|r| name_matches(r, needle.as_deref()))
            .cloned()
            .collect()
    }

    /// Create a new record
    pub fn create(&self, input: RecordInput) -> Result<Record> {
        input.validate()?;

        let mut table = self.table.write();
        table.next_id += 1;
        let record = Record {
            id: table.next_id,
            name: input.name,
            value: input.value,
            metadata: input.metadata,
            created_at: Utc::now(),
            updated_at: None,
        };
        table.rows.insert(record.id, record.clone());

        debug!(id = record.id, "Stored record");
        Ok(record)
    }

    /// Create several records in one write; all inputs are validated first
    pub fn create_many(&self, inputs: Vec<RecordInput>) -> Result<Vec<Record>> {
        for input in &inputs {
            input.validate()?;
        }

        let mut table = self.table.write();
        let now = Utc::now();
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            table.next_id += 1;
            let record = Record {
                id: table.next_id,
                name: input.name,
                value: input.value,
                metadata: input.metadata,
                created_at: now,
                updated_at: None,
            };
            table.rows.insert(record.id, record.clone());
            created.push(record);
        }

        Ok(created)
    }

    /// Replace the mutable fields of a record
    ///
    /// Keeps `id` and `created_at`. Returns `None` when the record does not exist.
    pub fn update(&self, id: i64, input: RecordInput) -> Result<Option<Record>> {
        input.validate()?;

        let mut table = self.table.write();
        let Some(existing) = table.rows.get_mut(&id) else {
            return Ok(None);
        };

        existing.name = input.name;
        existing.value = input.value;
        existing.metadata = input.metadata;
        existing.updated_at = Some(Utc::now());

        Ok(Some(existing.clone()))
    }

    /// Delete a record, returning it when it existed
    pub fn delete(&self, id: i64) -> Option<Record> {
        self.table.write().rows.remove(&id)
    }

    /// Number of stored records
    pub fn count(&self) -> usize {
        self.table.read().rows.len()
    }
}

fn name_matches(record: &Record, needle: Option<&str>) -> bool {
    match needle {
        Some(n) => record.name.to_lowercase().contains(n),
        None => true,
    }
}
