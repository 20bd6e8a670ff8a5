use schemars::schema_for;
use testdatagen_core::SchemaNode;

fn main() {
    let schema = schema_for!(SchemaNode);
    let json = serde_json::to_string_pretty(&schema).expect("serialize json schema");
    println!("{json}");
}
