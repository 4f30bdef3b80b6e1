use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use realmlink_codec::{Dictionary, Value};
use serde::Serialize;
use serde_json::{Map, Value as Json};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// JSON rendering that keeps what plain JSON would drop.
///
/// `undefined`, functions, symbols and non-finite numbers become marker
/// strings; maps, sets and errors become single-key objects.
pub fn describe(value: &Value) -> Json {
    match value {
        Value::Undefined | Value::Function(_) | Value::Symbol(_) => Json::String(value.to_string()),
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Number(n) if n.is_nan() => Json::String("NaN".into()),
        Value::Number(n) if n.is_infinite() => {
            Json::String(if *n > 0.0 { "Infinity" } else { "-Infinity" }.into())
        }
        Value::Number(_) | Value::String(_) => value.to_json(),
        Value::Array(items) => Json::Array(items.iter().map(describe).collect()),
        Value::Record(record) => Json::Object(
            record
                .iter()
                .map(|(key, value)| (key.to_string(), describe(value)))
                .collect(),
        ),
        Value::Map(map) => tagged(
            "Map",
            Json::Array(
                map.iter()
                    .map(|(key, value)| Json::Array(vec![describe(key), describe(value)]))
                    .collect(),
            ),
        ),
        Value::Set(set) => tagged("Set", Json::Array(set.iter().map(describe).collect())),
        Value::Error(error) => {
            let mut fields = Map::new();
            fields.insert("name".into(), Json::String(error.name().to_string()));
            fields.insert("message".into(), Json::String(error.message().to_string()));
            for (key, value) in error.properties().iter() {
                fields.insert(key.to_string(), describe(value));
            }
            tagged("Error", Json::Object(fields))
        }
    }
}

fn tagged(tag: &str, body: Json) -> Json {
    let mut object = Map::new();
    object.insert(tag.to_string(), body);
    Json::Object(object)
}

pub fn print_json<T: Serialize>(out: &T, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(out)
    } else {
        serde_json::to_string(out)
    };
    println!("{}", rendered.unwrap_or_else(|_| "{}".to_string()));
}

/// One row per dictionary entry: code, type name and a trailing column.
pub fn print_entries(
    dictionary: &Dictionary,
    last_header: &str,
    mut last_column: impl FnMut(u32) -> String,
) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["CODE", "TYPE", last_header]);
    for (code, entry) in dictionary.iter() {
        table.add_row(vec![
            code.to_string(),
            entry.type_name().to_string(),
            last_column(code),
        ]);
    }
    println!("{table}");
}
