//! Record commands: insert, get and find.

use docudb_core::{Engine, Operator, Record};
use serde_json::Value;

/// A `find` request.
pub struct Query<'a> {
    /// Column to match.
    pub column: &'a str,
    /// Comparison operator.
    pub operator: Operator,
    /// Reference value.
    pub value: Value,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Print keys instead of records.
    pub keys_only: bool,
}

/// Parses a record argument, which must be a JSON object.
pub fn parse_record(raw: &str) -> Result<Record, Box<dyn std::error::Error>> {
    match serde_json::from_str(raw)? {
        Value::Object(record) => Ok(record),
        other => Err(format!("record must be a JSON object, got {other}").into()),
    }
}

/// Inserts a record and prints it as stored.
pub fn insert(engine: &Engine, datastore: &str, collection: &str, raw: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stored = engine
        .records()
        .insert(datastore, collection, &parse_record(raw)?)?;
    println!("{}", serde_json::to_string_pretty(&stored)?);
    Ok(())
}

/// Prints one record, optionally projected onto comma-separated columns.
pub fn get(
    engine: &Engine,
    datastore: &str,
    collection: &str,
    key: &str,
    columns: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let columns: Option<Vec<&str>> = columns.map(|list| list.split(',').map(str::trim).collect());
    let record = engine
        .records()
        .select(datastore, collection, key, columns.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Runs a pattern query and returns the matching records, or bare keys.
pub fn matches(
    engine: &Engine,
    datastore: &str,
    collection: &str,
    query: &Query<'_>,
) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let limit = query.limit.unwrap_or(usize::MAX);
    if query.keys_only {
        let keys = engine.records().select_keys_with_pattern(
            datastore,
            collection,
            query.column,
            &query.value,
            query.operator,
        )?;
        return Ok(keys.into_iter().take(limit).map(Value::String).collect());
    }

    let mut found = Vec::new();
    for record in engine
        .records()
        .select_with_pattern(datastore, collection, query.column, &query.value, query.operator)?
        .take(limit)
    {
        found.push(Value::Object(record?));
    }
    Ok(found)
}

/// Prints the results of a pattern query, one JSON document per line.
pub fn find(
    engine: &Engine,
    datastore: &str,
    collection: &str,
    query: &Query<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let found = matches(engine, datastore, collection, query)?;
    for item in &found {
        match item {
            Value::String(key) => println!("{key}"),
            other => println!("{}", serde_json::to_string(other)?),
        }
    }
    tracing::debug!(datastore, collection, column = query.column, matched = found.len(), "find finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docudb_testkit::scenarios::populated_orders;
    use serde_json::json;

    fn query(operator: Operator, value: Value) -> Query<'static> {
        Query {
            column: "status",
            operator,
            value,
            limit: None,
            keys_only: false,
        }
    }

    #[test]
    fn records_must_be_objects() {
        assert_eq!(parse_record(r#"{"a": 1}"#).unwrap()["a"], json!(1));
        assert!(parse_record("[1]").is_err());
        assert!(parse_record("{").is_err());
    }

    #[test]
    fn find_returns_records_or_keys() {
        let (engine, stored) = populated_orders(5);

        let records = matches(&engine, "shop", "orders", &query(Operator::Eq, json!("paid"))).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r["status"] == json!("paid")));

        let mut keys_query = query(Operator::Eq, json!("new"));
        keys_query.keys_only = true;
        keys_query.limit = Some(2);
        let keys = matches(&engine, "shop", "orders", &keys_query).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| stored.iter().any(|r| r["_id"] == *k)));
    }
}
