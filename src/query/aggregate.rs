//! Aggregation pipeline builder
//!
//! Builds `$match`, `$group`, `$sort`, `$skip` and `$limit` stages for the
//! basic aggregate functions. Stage semantics beyond that belong to the
//! store.

use serde_json::{json, Map, Value as Json};

use crate::grammar::{GrammarError, GrammarResult, NativeFilter};

/// Name of the accumulated value in each result row
pub const AGGREGATE_FIELD: &str = "aggregate";

/// Supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Some(AggregateFunction::Count),
            "sum" => Some(AggregateFunction::Sum),
            "avg" | "average" => Some(AggregateFunction::Avg),
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            _ => None,
        }
    }

    /// Everything except `count` needs a field to aggregate over
    pub fn requires_field(&self) -> bool {
        !matches!(self, AggregateFunction::Count)
    }

    fn accumulator(&self, field: Option<&str>) -> GrammarResult<Json> {
        let operand = match (self, field) {
            (AggregateFunction::Count, _) => return Ok(json!({ "$sum": 1 })),
            (_, Some(field)) if !field.is_empty() => Json::String(format!("${}", field)),
            _ => {
                return Err(GrammarError::query_invalid(format!(
                    "aggregate function '{}' requires a field",
                    self.as_str()
                )))
            }
        };
        let operator = format!("${}", self.as_str());
        let mut acc = Map::new();
        acc.insert(operator, operand);
        Ok(Json::Object(acc))
    }
}

/// Inputs to a grouped aggregation
#[derive(Debug, Clone, Default)]
pub struct AggregateStages<'a> {
    pub filter: NativeFilter,
    pub group_by: &'a [String],
    pub sort: NativeFilter,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// Builds the pipeline for `function` over `field`.
///
/// Without grouping the single result row has `_id: null`. With one group
/// field `_id` is that field's value; with several it is a document keyed
/// by field name.
pub fn build_pipeline(
    function: AggregateFunction,
    field: Option<&str>,
    stages: &AggregateStages<'_>,
) -> GrammarResult<Vec<Json>> {
    let accumulator = function.accumulator(field)?;
    let mut pipeline = Vec::new();

    if !stages.filter.is_empty() {
        pipeline.push(json!({ "$match": stages.filter }));
    }

    let group_key = match stages.group_by {
        [] => Json::Null,
        [single] => Json::String(format!("${}", single)),
        many => Json::Object(
            many.iter()
                .map(|f| (f.clone(), Json::String(format!("${}", f))))
                .collect(),
        ),
    };
    let mut group = Map::new();
    group.insert("_id".into(), group_key);
    group.insert(AGGREGATE_FIELD.into(), accumulator);
    pipeline.push(json!({ "$group": group }));

    if !stages.sort.is_empty() {
        pipeline.push(json!({ "$sort": stages.sort }));
    }
    if let Some(skip) = stages.skip {
        pipeline.push(json!({ "$skip": skip }));
    }
    if let Some(limit) = stages.limit {
        pipeline.push(json!({ "$limit": limit }));
    }
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarErrorCode;

    fn filter(value: Json) -> NativeFilter {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_count_without_filter() {
        let pipeline = build_pipeline(AggregateFunction::Count, None, &AggregateStages::default())
            .unwrap();
        assert_eq!(
            pipeline,
            vec![json!({"$group": {"_id": null, "aggregate": {"$sum": 1}}})]
        );
    }

    #[test]
    fn test_sum_with_filter_and_group() {
        let group_by = vec!["team".to_string()];
        let stages = AggregateStages {
            filter: filter(json!({"active": true})),
            group_by: &group_by,
            sort: filter(json!({"_id": 1})),
            skip: None,
            limit: Some(10),
        };
        let pipeline = build_pipeline(AggregateFunction::Sum, Some("score"), &stages).unwrap();
        assert_eq!(
            pipeline,
            vec![
                json!({"$match": {"active": true}}),
                json!({"$group": {"_id": "$team", "aggregate": {"$sum": "$score"}}}),
                json!({"$sort": {"_id": 1}}),
                json!({"$limit": 10}),
            ]
        );
    }

    #[test]
    fn test_compound_group_key() {
        let group_by = vec!["team".to_string(), "role".to_string()];
        let stages = AggregateStages {
            group_by: &group_by,
            ..AggregateStages::default()
        };
        let pipeline = build_pipeline(AggregateFunction::Max, Some("age"), &stages).unwrap();
        assert_eq!(
            pipeline[0],
            json!({"$group": {"_id": {"team": "$team", "role": "$role"}, "aggregate": {"$max": "$age"}}})
        );
    }

    #[test]
    fn test_field_required() {
        let err = build_pipeline(AggregateFunction::Avg, None, &AggregateStages::default())
            .unwrap_err();
        assert_eq!(err.code(), GrammarErrorCode::AeroQueryInvalid);
        assert!(AggregateFunction::Sum.requires_field());
        assert!(!AggregateFunction::Count.requires_field());
    }

    #[test]
    fn test_parse() {
        assert_eq!(AggregateFunction::parse("AVG"), Some(AggregateFunction::Avg));
        assert_eq!(AggregateFunction::parse("median"), None);
    }
}
