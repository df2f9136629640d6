//! Arrow schema for the single-row columnar artifact: `{identifier: string,
//! representations: map<string, list<uint32>>}`.

use std::sync::Arc;

use datafusion::arrow::datatypes::{DataType, Field, Fields, Schema, SchemaRef};

/// Field name used for the map's key/value entry struct, matching arrow's
/// conventional `entries` naming (mirrors pyarrow's default map layout).
pub const MAP_ENTRIES_FIELD: &str = "entries";
pub const MAP_KEY_FIELD: &str = "key";
pub const MAP_VALUE_FIELD: &str = "value";

fn token_list_type() -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::UInt32, false)))
}

fn representations_map_type() -> DataType {
    let entries = Fields::from(vec![
        Field::new(MAP_KEY_FIELD, DataType::Utf8, false),
        Field::new(MAP_VALUE_FIELD, token_list_type(), false),
    ]);
    DataType::Map(
        Arc::new(Field::new(MAP_ENTRIES_FIELD, DataType::Struct(entries), false)),
        false,
    )
}

pub fn columnar_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("identifier", DataType::Utf8, false),
        Field::new("representations", representations_map_type(), false),
    ]))
}
