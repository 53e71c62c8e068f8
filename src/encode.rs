//! Tag-based JSON encoding of finalized trees.
//!
//! This is the downstream consumer the stable constructor tags exist for:
//! a compound node encodes as `{"node": ..., "tag": ..., "fields": {...}}`,
//! a product the same but without `"tag"`, and a simple-sum singleton as its
//! bare ordinal. Field order follows declaration order.

use serde_json::{Map, Value as Json, json};

use crate::value::{Instance, Value};

pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Unset => Json::Null,
        Value::Str(s) => json!(s),
        Value::Int(i) => json!(i),
        Value::Bool(b) => json!(b),
        Value::Array(xs) => Json::Array(xs.iter().map(to_json).collect()),
        Value::Simple(v) => json!(v.tag),
        Value::Node(inst) => node_to_json(inst),
        // Host values have no portable encoding; name the type instead.
        Value::Opaque(v) => json!(format!("<{}>", v.type_name())),
    }
}

fn node_to_json(inst: &Instance) -> Json {
    let mut out = Map::new();
    out.insert("node".to_string(), json!(inst.type_name()));
    if let Some(tag) = inst.tag() {
        out.insert("tag".to_string(), json!(tag));
    }
    let mut fields = Map::new();
    for (name, v) in inst.fields() {
        fields.insert(name.to_string(), to_json(v));
    }
    out.insert("fields".to_string(), Json::Object(fields));
    Json::Object(out)
}

// ------------------------------- Tests ------------------------------------ //
