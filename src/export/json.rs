use crate::core::{Result, TabularResult};
use serde_json::{Map, Value as JsonValue};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Builds `{"columns": [...], "rows": [{column: value, ...}, ...]}` with row
/// keys in column order.
pub fn to_document(result: &TabularResult) -> JsonValue {
    let columns: Vec<JsonValue> = result
        .columns()
        .iter()
        .cloned()
        .map(JsonValue::String)
        .collect();

    let rows: Vec<JsonValue> = result
        .records()
        .map(|record| {
            let object: Map<String, JsonValue> = record
                .into_iter()
                .map(|(column, value)| (column.to_string(), value.to_json()))
                .collect();
            JsonValue::Object(object)
        })
        .collect();

    let mut document = Map::new();
    document.insert("columns".to_string(), JsonValue::Array(columns));
    document.insert("rows".to_string(), JsonValue::Array(rows));
    JsonValue::Object(document)
}

pub fn write(result: &TabularResult, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, &to_document(result)).map_err(std::io::Error::from)?;
    writer.flush()?;
    Ok(())
}
