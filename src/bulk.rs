//! Bulk write batches: several mutations submitted as one `bulkwrite`
//! command.

use serde::Serialize;
use serde_json::Value;

/// One mutation inside a bulk write. Serialized as a tagged JSON object,
/// the tag matching the single-operation command keyword.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum BulkOperation {
    Insert {
        location_id: String,
        lat: f64,
        lon: f64,
        data: Value,
    },
    Update {
        location_id: String,
        lat: f64,
        lon: f64,
        data: Value,
    },
    #[serde(rename = "updateloc")]
    UpdateLocation {
        location_id: String,
        lat: f64,
        lon: f64,
    },
    #[serde(rename = "updatedata")]
    UpdateData { location_id: String, data: Value },
    #[serde(rename = "del")]
    Delete { location_id: String },
}

/// Accumulator for a batch of mutations, executed atomically by the
/// server via [`QuadrilleClient::execute_bulk`](crate::QuadrilleClient::execute_bulk).
///
/// An empty batch is refused before touching the wire.
#[derive(Debug, Clone, Default)]
pub struct BulkWrite {
    operations: Vec<BulkOperation>,
}

impl BulkWrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        mut self,
        location_id: impl Into<String>,
        lat: f64,
        lon: f64,
        data: Value,
    ) -> Self {
        self.operations.push(BulkOperation::Insert {
            location_id: location_id.into(),
            lat,
            lon,
            data,
        });
        self
    }

    pub fn update(
        mut self,
        location_id: impl Into<String>,
        lat: f64,
        lon: f64,
        data: Value,
    ) -> Self {
        self.operations.push(BulkOperation::Update {
            location_id: location_id.into(),
            lat,
            lon,
            data,
        });
        self
    }

    pub fn update_location(mut self, location_id: impl Into<String>, lat: f64, lon: f64) -> Self {
        self.operations.push(BulkOperation::UpdateLocation {
            location_id: location_id.into(),
            lat,
            lon,
        });
        self
    }

    pub fn update_data(mut self, location_id: impl Into<String>, data: Value) -> Self {
        self.operations.push(BulkOperation::UpdateData {
            location_id: location_id.into(),
            data,
        });
        self
    }

    pub fn delete(mut self, location_id: impl Into<String>) -> Self {
        self.operations.push(BulkOperation::Delete {
            location_id: location_id.into(),
        });
        self
    }

    /// Append an already-built operation.
    pub fn add(&mut self, operation: BulkOperation) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub(crate) fn operations(&self) -> &[BulkOperation] {
        &self.operations
    }
}
