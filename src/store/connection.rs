//! Store connection interface
//!
//! The access layer only builds filter, update, and option documents.
//! Execution, pooling, transport, and retries belong to the connection.

use serde_json::{Map, Value};

use super::errors::StoreResult;
use super::options::{FindOptions, UpdateOptions};

/// A raw document as stored
pub type Document = Map<String, Value>;

/// Acknowledgement for inserts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertResult {
    /// Primary key values of inserted documents, in input order
    pub inserted_ids: Vec<Value>,
}

/// Acknowledgement for updates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    /// Primary key of an upserted document
    pub upserted_id: Option<Value>,
}

/// Acknowledgement for deletes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// A handle to a document store.
///
/// Passed explicitly to every terminal query and relation operation.
pub trait Connection {
    fn find(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>>;

    fn count_documents(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> StoreResult<u64>;

    fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Value],
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>>;

    fn insert_one(&self, collection: &str, document: Document) -> StoreResult<InsertResult>;

    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> StoreResult<InsertResult>;

    fn update_one(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> StoreResult<UpdateResult>;

    fn update_many(
        &self,
        collection: &str,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> StoreResult<UpdateResult>;

    fn delete_one(&self, collection: &str, filter: &Document) -> StoreResult<DeleteResult>;

    fn delete_many(&self, collection: &str, filter: &Document) -> StoreResult<DeleteResult>;
}
