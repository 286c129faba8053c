use serde_json::Value;

/// Station identifiers from a `GetPowerStationIdByOwner` payload.
///
/// Accounts with a single station get a bare string; a list of strings or of
/// station objects is accepted as well.
pub fn station_ids(data: &Value) -> Vec<String> {
    match data {
        Value::String(id) if !id.trim().is_empty() => vec![id.trim().to_string()],
        Value::Array(items) => items.iter().filter_map(station_id).collect(),
        Value::Object(_) => station_id(data).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn station_id(item: &Value) -> Option<String> {
    let id = match item {
        Value::String(id) => Some(id.as_str()),
        Value::Object(_) => ["powerstation_id", "powerStationId", "id"]
            .iter()
            .find_map(|key| item.get(*key).and_then(Value::as_str)),
        _ => None,
    }?;
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}
