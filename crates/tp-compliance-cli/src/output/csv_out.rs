use serde_json::{Map, Value};
use std::io;

use super::{cell, DETAIL_ARRAYS};

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout. Projections emit one row per year and
/// period computations one row per computation step; anything else falls
/// back to field/value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => {
            let body = match map.get("result") {
                Some(Value::Object(result)) => result,
                _ => map,
            };
            match first_detail_array(body) {
                Some(rows) => write_rows(&mut wtr, rows),
                None => write_pairs(&mut wtr, body),
            }
        }
        Value::Array(arr) => write_rows(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&cell(value)]);
        }
    }

    let _ = wtr.flush();
}

fn first_detail_array(map: &Map<String, Value>) -> Option<&[Value]> {
    DETAIL_ARRAYS
        .iter()
        .find_map(|key| match map.get(*key) {
            Some(Value::Array(rows)) if !rows.is_empty() => Some(rows.as_slice()),
            _ => None,
        })
        .or_else(|| {
            map.values().find_map(|v| match v.get("movements") {
                Some(Value::Array(rows)) if !rows.is_empty() => Some(rows.as_slice()),
                _ => None,
            })
        })
}

fn write_pairs(wtr: &mut StdoutWriter<'_>, map: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map {
        let _ = wtr.write_record([key.as_str(), &cell(val)]);
    }
}

fn write_rows(wtr: &mut StdoutWriter<'_>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            let _ = wtr.write_record([&cell(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first
        .iter()
        .filter(|(_, v)| !v.is_array())
        .map(|(k, _)| k.as_str())
        .collect();
    let _ = wtr.write_record(&headers);

    for row in rows.iter().filter_map(Value::as_object) {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(cell).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&record);
    }
}
