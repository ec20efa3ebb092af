use serde_json::Value;

use super::cell;

/// Headline figures, most specific first. Nested objects are searched one
/// level down so ledger steps and outcomes still yield a number.
const PRIORITY_KEYS: [&str; 5] = [
    "disallowed_interest",
    "net_disallowance",
    "net_tax_impact",
    "closing_balance",
    "allowable_interest",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(found) = find_priority(result_obj) {
        println!("{}", cell(found));
        return;
    }

    if let Value::Object(map) = result_obj {
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, cell(val));
            return;
        }
    }

    println!("{}", cell(result_obj));
}

fn find_priority(value: &Value) -> Option<&Value> {
    let map = value.as_object()?;
    for key in PRIORITY_KEYS {
        if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
            return Some(val);
        }
    }
    map.values()
        .filter(|v| v.is_object())
        .find_map(|nested| {
            let inner = nested.as_object()?;
            PRIORITY_KEYS
                .iter()
                .find_map(|key| inner.get(*key).filter(|v| !v.is_null()))
        })
}
