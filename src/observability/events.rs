//! Observable events
//!
//! Events are explicit and typed. Store round trips log at TRACE, eager
//! loading and relation writes at INFO.

use std::fmt;

use super::logger::Severity;

/// Observable events in the access layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded and validated
    ConfigLoaded,

    // Store round trips
    /// Find issued
    QueryFind,
    /// Count issued
    QueryCount,
    /// Aggregate pipeline issued
    QueryAggregate,
    /// Insert issued
    QueryInsert,
    /// Update issued
    QueryUpdate,
    /// Delete issued
    QueryDelete,
    /// Compile rejected
    QueryRejected,

    // Relations
    /// One eager lookup for a relation over a parent batch
    EagerLoad,
    /// Eager lookup skipped because no parent carried a key
    EagerShortCircuit,
    /// Relation key or embedded document written
    RelationMutation,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::QueryFind => "QUERY_FIND",
            Event::QueryCount => "QUERY_COUNT",
            Event::QueryAggregate => "QUERY_AGGREGATE",
            Event::QueryInsert => "QUERY_INSERT",
            Event::QueryUpdate => "QUERY_UPDATE",
            Event::QueryDelete => "QUERY_DELETE",
            Event::QueryRejected => "QUERY_REJECTED",

            Event::EagerLoad => "EAGER_LOAD",
            Event::EagerShortCircuit => "EAGER_SHORT_CIRCUIT",
            Event::RelationMutation => "RELATION_MUTATION",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryFind
            | Event::QueryCount
            | Event::QueryAggregate
            | Event::QueryInsert
            | Event::QueryUpdate
            | Event::QueryDelete => Severity::Trace,
            Event::QueryRejected => Severity::Warn,
            Event::ConfigLoaded
            | Event::EagerLoad
            | Event::EagerShortCircuit
            | Event::RelationMutation => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
