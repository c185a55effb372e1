//! CLI command implementations
//!
//! Each command loads the configuration, reads one request from stdin and
//! writes one response to stdout. Compile failures are reported as error
//! responses; configuration and I/O failures abort the command.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::clause::{Clause, ProjectionSpec, SortSpec, UpdateSpec};
use crate::config::AccessConfig;
use crate::model::{ModelSchema, Record};
use crate::query::QueryBuilder;
use crate::store::MemoryStore;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_error, write_response};

/// A query as it arrives on stdin
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub collection: String,
    #[serde(default)]
    pub clauses: Vec<Clause>,
    #[serde(default)]
    pub sort: Vec<SortSpec>,
    #[serde(default)]
    pub projection: ProjectionSpec,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub skip: Option<u64>,
    /// Field assignments and update operators, for writes
    #[serde(default)]
    pub update: Option<Map<String, Value>>,
}

impl QueryRequest {
    fn from_value(value: Value) -> CliResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| CliError::request_error(format!("Invalid request: {}", e)))
    }

    /// Builds the query this request describes
    fn query(&self, config: &AccessConfig) -> QueryBuilder {
        let schema = ModelSchema::new(self.collection.clone())
            .with_primary_key(config.primary_key.clone())
            .build();

        let mut query = QueryBuilder::new(schema)
            .apply_config(config)
            .where_clauses(self.clauses.iter().cloned());
        for spec in &self.sort {
            query = query.order_by_direction(spec.field.clone(), spec.direction);
        }
        for (field, included) in self.projection.iter() {
            query = if included {
                query.select([field])
            } else {
                query.exclude([field])
            };
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if let Some(skip) = self.skip {
            query = query.skip(skip);
        }
        query
    }
}

/// Run CLI with parsed arguments
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run a specific command
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::CompileRead { config } => compile_read(&config),
        Command::CompileWrite { config } => compile_write(&config),
        Command::Find { config, data } => find(&config, &data),
    }
}

fn load_config(config_path: &Path) -> CliResult<AccessConfig> {
    let config = AccessConfig::load(config_path)?;
    config.install_log_level()?;
    Ok(config)
}

fn respond(result: crate::Result<Value>) -> CliResult<()> {
    match result {
        Ok(data) => write_response(data),
        Err(e) => write_error(e.code(), &e.to_string()),
    }
}

/// Compile a read request and print the native filter and options
pub fn compile_read(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let request = QueryRequest::from_value(read_request()?)?;
    respond(plan_read(&config, &request))
}

/// Compile a write request and print the native filter and update
pub fn compile_write(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let request = QueryRequest::from_value(read_request()?)?;
    respond(plan_write(&config, &request))
}

/// Run a read request against fixture documents
pub fn find(config_path: &Path, data_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let store = load_fixture(data_path)?;
    let request = QueryRequest::from_value(read_request()?)?;
    respond(execute_find(&config, &request, &store))
}

/// Native filter and read options for `request`
pub fn plan_read(config: &AccessConfig, request: &QueryRequest) -> crate::Result<Value> {
    let (filter, options) = request.query(config).compile_read()?;
    Ok(json!({
        "collection": request.collection,
        "filter": filter,
        "options": options,
    }))
}

/// Native filter and update document for `request`
pub fn plan_write(config: &AccessConfig, request: &QueryRequest) -> crate::Result<Value> {
    let update = UpdateSpec::from(request.update.clone().unwrap_or_default());
    let (filter, update, _) = request.query(config).compile_write(&update)?;
    Ok(json!({
        "collection": request.collection,
        "filter": filter,
        "update": update,
    }))
}

/// Matching documents for `request`, read from `store`
pub fn execute_find(
    config: &AccessConfig,
    request: &QueryRequest,
    store: &MemoryStore,
) -> crate::Result<Value> {
    let records = request.query(config).get(store)?;
    Ok(Value::Array(records.iter().map(Record::to_json).collect()))
}

fn load_fixture(path: &Path) -> CliResult<MemoryStore> {
    let content = fs::read_to_string(path)?;
    let collections: Map<String, Value> = serde_json::from_str(&content)?;

    let store = MemoryStore::new();
    for (collection, documents) in collections {
        let Value::Array(documents) = documents else {
            return Err(CliError::request_error(format!(
                "Fixture collection '{}' must be an array",
                collection
            )));
        };
        store
            .seed(&collection, documents)
            .map_err(|e| CliError::request_error(e.to_string()))?;
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use tempfile::TempDir;

    fn request(value: Value) -> QueryRequest {
        QueryRequest::from_value(value).unwrap()
    }

    #[test]
    fn test_plan_read_compiles_request() {
        let config = AccessConfig {
            max_time_ms: Some(500),
            ..AccessConfig::default()
        };
        let plan = plan_read(
            &config,
            &request(json!({
                "collection": "users",
                "clauses": [
                    {"type": "comparison", "field": "age", "operator": ">=", "value": 18}
                ],
                "sort": [{"field": "name", "direction": "desc"}],
                "projection": {"name": 1},
                "limit": 10
            })),
        )
        .unwrap();

        assert_eq!(plan["filter"], json!({"age": {"$gte": 18}}));
        assert_eq!(plan["options"]["sort"], json!({"name": -1}));
        assert_eq!(plan["options"]["projection"], json!({"name": 1}));
        assert_eq!(plan["options"]["limit"], json!(10));
        assert_eq!(plan["options"]["maxTimeMS"], json!(500));
    }

    #[test]
    fn test_plan_read_rejects_unknown_operator() {
        let err = plan_read(
            &AccessConfig::default(),
            &request(json!({
                "collection": "users",
                "clauses": [
                    {"type": "comparison", "field": "age", "operator": "~=", "value": 1}
                ]
            })),
        )
        .unwrap_err();
        assert_eq!(err.code(), "AERO_QUERY_UNSUPPORTED_OPERATOR");
    }

    #[test]
    fn test_plan_write_merges_assignments() {
        let plan = plan_write(
            &AccessConfig::default(),
            &request(json!({
                "collection": "users",
                "clauses": [
                    {"type": "comparison", "field": "name", "operator": "=", "value": "ann"}
                ],
                "update": {"status": "active", "$inc": {"logins": 1}}
            })),
        )
        .unwrap();
        assert_eq!(plan["filter"], json!({"name": "ann"}));
        assert_eq!(plan["update"]["$set"], json!({"status": "active"}));
        assert_eq!(plan["update"]["$inc"], json!({"logins": 1}));
    }

    #[test]
    fn test_plan_write_rejects_empty_update() {
        let err = plan_write(&AccessConfig::default(), &request(json!({"collection": "users"})))
            .unwrap_err();
        assert_eq!(err.code(), "AERO_QUERY_INVALID");
    }

    #[test]
    fn test_request_requires_collection() {
        let err = QueryRequest::from_value(json!({"clauses": []})).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::RequestError);
    }

    #[test]
    fn test_find_against_fixture() {
        let temp_dir = TempDir::new().unwrap();
        let data_path = temp_dir.path().join("fixture.json");
        fs::write(
            &data_path,
            json!({"users": [{"_id": 1, "age": 30}, {"_id": 2, "age": 12}]}).to_string(),
        )
        .unwrap();

        let store = load_fixture(&data_path).unwrap();
        let found = execute_find(
            &AccessConfig::default(),
            &request(json!({
                "collection": "users",
                "clauses": [
                    {"type": "comparison", "field": "age", "operator": ">", "value": 18}
                ]
            })),
            &store,
        )
        .unwrap();
        assert_eq!(found, json!([{"_id": 1, "age": 30}]));
    }

    #[test]
    fn test_fixture_must_hold_arrays() {
        let temp_dir = TempDir::new().unwrap();
        let data_path = temp_dir.path().join("fixture.json");
        fs::write(&data_path, json!({"users": {"_id": 1}}).to_string()).unwrap();

        let err = load_fixture(&data_path).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::RequestError);
    }
}
