use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{cell, DETAIL_ARRAYS};

/// Format output as tables: scalar fields first, then one table per
/// row-shaped array (projection years, computation steps, ledger movements).
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result(result, map);
            } else {
                print_object(map);
            }
        }
        Value::Array(arr) => print_rows(arr),
        _ => println!("{}", value),
    }
}

fn print_result(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => print_object(res_map),
        other => print_table(other),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        if is_detail(key, val) {
            continue;
        }
        builder.push_record([key.as_str(), &summarize(val)]);
    }
    println!("{}", Table::from(builder));

    for key in DETAIL_ARRAYS {
        if let Some(Value::Array(rows)) = map.get(key) {
            if !rows.is_empty() {
                println!("\n{}:", key);
                print_rows(rows);
            }
        }
    }
    // Ledger steps nest their movements one level down.
    for (key, val) in map {
        if let Value::Object(inner) = val {
            if let Some(Value::Array(rows)) = inner.get("movements") {
                if !rows.is_empty() {
                    println!("\n{}.movements:", key);
                    print_rows(rows);
                }
            }
        }
    }
}

fn is_detail(key: &str, value: &Value) -> bool {
    DETAIL_ARRAYS.contains(&key) && matches!(value, Value::Array(rows) if rows.iter().all(Value::is_object))
}

fn print_rows(rows: &[Value]) {
    if rows.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = rows.first() {
        let headers: Vec<String> = first
            .iter()
            .filter(|(_, v)| !v.is_array())
            .map(|(k, _)| k.clone())
            .collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);
        for row in rows.iter().filter_map(Value::as_object) {
            let record: Vec<String> = headers
                .iter()
                .map(|h| row.get(h.as_str()).map(summarize).unwrap_or_default())
                .collect();
            builder.push_record(record);
        }
        println!("{}", Table::from(builder));
    } else {
        for item in rows {
            println!("{}", cell(item));
        }
    }
}

fn summarize(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Array(arr) if arr.iter().all(|v| !v.is_object()) => {
            arr.iter().map(cell).collect::<Vec<_>>().join(", ")
        }
        Value::Array(arr) => format!("[{} rows]", arr.len()),
        Value::Object(map) => match map.get("status") {
            Some(Value::String(status)) => status.clone(),
            _ => format!("{{{} fields}}", map.len()),
        },
        other => cell(other),
    }
}
