//! Metadata derivation from the specification tree.
//!
//! The metadata JSON (`0/main.json`) is derived from the same in-memory tree
//! the loader text is rendered from, as a pure-data walk; generated source is
//! never re-evaluated. Module config objects materialize by merging the
//! parsed configuration documents in order.

use super::{AssetAnnotation, BundleSpec, ModuleSpec};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;

/// Derives the bundle metadata: `{"_": {"<module>": {...}}}`.
///
/// Each module object is its materialized configuration with the derived
/// fields applied: defaulted `description`, `archive` coordinate, `depends`
/// unioned with per-class dependency declarations, `provides` reduced to
/// sorted service keys, `ordinal`, the `optional` marker for test-capable
/// modules, flattened `datatypes`, and the `publishes` table.
pub fn derive_metadata(spec: &BundleSpec) -> Value {
    let mut modules = Map::new();
    for (name, module) in &spec.modules {
        modules.insert(name.clone(), module_meta(module));
    }
    json!({ "_": modules })
}

fn module_meta(module: &ModuleSpec) -> Value {
    let mut meta = materialize_config(&module.config_values);

    if !meta.get("description").is_some_and(Value::is_string) {
        meta.insert("description".into(), json!("Undocumented"));
    }

    meta.insert(
        "archive".into(),
        json!({ "name": module.archive_name, "version": module.archive_version }),
    );

    // Declared dependencies unioned with every class script's declared list.
    let mut depends: BTreeSet<String> = meta
        .get("depends")
        .and_then(Value::as_array)
        .map(|deps| {
            deps.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    for source in module.classes.values() {
        depends.extend(class_dependencies(source));
    }
    meta.insert("depends".into(), json!(depends));

    let provides: BTreeSet<String> = meta
        .get("provides")
        .and_then(Value::as_object)
        .map(|services| services.keys().cloned().collect())
        .unwrap_or_default();
    meta.insert("provides".into(), json!(provides));

    meta.insert("ordinal".into(), json!(module.ordinal));

    if meta.contains_key("test") {
        meta.insert("optional".into(), json!(true));
    }

    if let Some(Value::Object(datatypes)) = meta.get("datatypes").cloned() {
        meta.insert("datatypes".into(), Value::Object(flatten_datatypes(&datatypes)));
    }

    if !module.publishes.is_empty() {
        meta.insert("publishes".into(), publishes_meta(module));
    }

    Value::Object(meta)
}

/// Materializes a module configuration by shallow-merging the parsed
/// documents in order: primary first, then secondaries ascending.
fn materialize_config(values: &[Value]) -> Map<String, Value> {
    let mut merged = Map::new();
    for value in values {
        if let Value::Object(fields) = value {
            for (key, field) in fields {
                merged.insert(key.clone(), field.clone());
            }
        }
    }
    merged
}

fn publishes_meta(module: &ModuleSpec) -> Value {
    let mut table = Map::new();
    let mut entries: Vec<(String, Value)> = Vec::new();
    for (path, publish) in &module.publishes {
        let value = match &publish.annotation {
            AssetAnnotation::None => json!(publish.size),
            AssetAnnotation::Inlined(data) => json!({ "size": publish.size, "data64": data }),
            AssetAnnotation::Dimensions { width, height } => {
                json!({ "size": publish.size, "pixel": { "height": height, "width": width } })
            }
        };
        entries.push((path.clone(), value));
        if let Some(minified) = publish.minified_size {
            let sibling = format!("{}.min.js", path.trim_end_matches(".js"));
            entries.push((sibling, json!(minified)));
        }
    }
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (path, value) in entries {
        table.insert(path, value);
    }
    Value::Object(table)
}

/// Name of the class-definition helper whose leading string arguments declare
/// the class's dependencies.
pub const CLASS_HELPER: &str = "subclass";

/// Extracts the dependency list a class script declares: the leading string
/// literal arguments of its `subclass(...)` helper call.
///
/// This is a plain scanner over the source text; nothing is evaluated and no
/// global helper is patched in.
pub fn class_dependencies(source: &str) -> Vec<String> {
    let Some(call) = find_subclass_call(source) else {
        return Vec::new();
    };
    let mut deps = Vec::new();
    let mut chars = source[call..].chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&quote) = chars.peek() else { break };
        if quote != '\'' && quote != '"' {
            break;
        }
        chars.next();
        let mut literal = String::new();
        loop {
            match chars.next() {
                Some('\\') => {
                    if let Some(escaped) = chars.next() {
                        literal.push(escaped);
                    }
                }
                Some(c) if c == quote => break,
                Some(c) => literal.push(c),
                None => return deps,
            }
        }
        deps.push(literal);
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek() == Some(&',') {
            chars.next();
        } else {
            break;
        }
    }
    deps
}

/// Byte offset just past the opening parenthesis of the first helper call,
/// respecting identifier boundaries.
fn find_subclass_call(source: &str) -> Option<usize> {
    let needle = CLASS_HELPER;
    let mut search_from = 0;
    while let Some(found) = source[search_from..].find(needle) {
        let start = search_from + found;
        let end = start + needle.len();
        let bounded_left = start == 0
            || !source[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$');
        let after = source[end..].trim_start();
        if bounded_left && after.starts_with('(') {
            let paren = end + (source[end..].len() - after.len());
            return Some(paren + 1);
        }
        search_from = end;
    }
    None
}

/// Flattens a tree of named type groups into a flat name → type-string table.
///
/// A node is a record when it carries any `$`-prefixed key or any
/// string-valued field (or is empty); otherwise it is a group and flattening
/// recurses into it, keyed by leaf type name. Record field order is
/// declaration order, not sorted.
pub fn flatten_datatypes(datatypes: &Map<String, Value>) -> Map<String, Value> {
    let mut table = Map::new();
    flatten_into(&mut table, datatypes);
    table
}

fn flatten_into(table: &mut Map<String, Value>, group: &Map<String, Value>) {
    for (name, node) in group {
        match node {
            Value::Object(fields) if is_record(fields) => {
                table.insert(name.clone(), json!(render_record(fields)));
            }
            Value::Object(nested) => flatten_into(table, nested),
            Value::String(rendered) => {
                table.insert(name.clone(), json!(rendered));
            }
            _ => {}
        }
    }
}

fn is_record(fields: &Map<String, Value>) -> bool {
    fields.is_empty()
        || fields
            .iter()
            .any(|(key, value)| key.starts_with('$') || value.is_string())
}

/// Renders one record type: `(macro-args)SuperType+{field:type,...}`.
fn render_record(fields: &Map<String, Value>) -> String {
    let mut out = String::new();

    if let Some(Value::Array(params)) = fields.get("$macro") {
        let list = params
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(",");
        out.push('(');
        out.push_str(&list);
        out.push(')');
    }

    if let Some(Value::String(super_type)) = fields.get("$super") {
        out.push_str(super_type);
        out.push('+');
    }

    out.push('{');
    let mut first = true;
    for (name, value) in fields {
        if name.starts_with('$') {
            continue;
        }
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(name);
        out.push(':');
        match value {
            Value::String(type_name) => out.push_str(type_name),
            Value::Object(nested) => out.push_str(&render_record(nested)),
            other => out.push_str(&other.to_string()),
        }
    }
    out.push('}');
    out
}
