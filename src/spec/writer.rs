//! Loader source rendering.
//!
//! Renders the specification tree to the nested textual form that ships as
//! the bundle's loader payload:
//!
//! ```text
//! {'':{'':[<bundle closures>,<bundle config>]},
//!  '<module>':{'':[<config sources>,<publishes closure>],'<Class>':<source>},
//!  ...}
//! ```
//!
//! Emission is byte-for-byte deterministic: modules, classes, and publish
//! entries are iterated in sorted order.

use super::{AssetAnnotation, BundleSpec, ModuleSpec};
use std::fmt::Write as _;

/// Renders the complete loader file: prologue + `.bundle(<spec>);`.
///
/// With a boot module the prologue is the boot script source applied to the
/// bundle and boot module names; without one it is the quoted bundle name,
/// the convention for "load by name, no boot hook".
pub fn render_loader(spec: &BundleSpec) -> String {
    let prologue = match &spec.boot {
        Some(boot) => format!(
            "({}('{}','{}'))",
            boot.source.trim_end(),
            escape(&spec.bundle_name),
            escape(&boot.module)
        ),
        None => format!("'{}'", escape(&spec.bundle_name)),
    };
    format!("{prologue}.bundle({});\n", render_spec(spec))
}

/// Renders the nested bundle/module specification literal.
pub fn render_spec(spec: &BundleSpec) -> String {
    let mut out = String::new();
    out.push_str("{'':{'':[");
    out.push_str(&bundle_closure(spec));
    out.push(',');
    out.push_str(spec.config_source.trim_end());
    out.push_str("]}");

    for (name, module) in &spec.modules {
        let mut configs: Vec<String> = module
            .config_sources
            .iter()
            .map(|s| s.trim_end().to_string())
            .collect();
        if !module.publishes.is_empty() {
            configs.push(publishes_closure(module));
        }

        let mut fields = vec![format!("'':[{}]", configs.join(","))];
        for (class_name, source) in &module.classes {
            fields.push(format!("'{}':{}", escape(class_name), source.trim_end()));
        }
        let _ = write!(out, ",'{}':{{{}}}", escape(name), fields.join(","));
    }

    out.push('}');
    out
}

/// The generated bundle-level configuration closure: populates `modules`,
/// `archives`, and the always-republish `publishes` sentinels on the
/// accumulator.
fn bundle_closure(spec: &BundleSpec) -> String {
    let mut out = String::from("function(bundle){bundle.modules={");
    let mut first = true;
    for (name, module) in &spec.modules {
        if !first {
            out.push(',');
        }
        first = false;
        let _ = write!(
            out,
            "'{}':'{}/{}'",
            escape(name),
            escape(&module.archive_name),
            escape(&module.archive_version)
        );
    }
    out.push_str("};bundle.archives={");
    let mut first = true;
    for (name, version) in &spec.archives {
        if !first {
            out.push(',');
        }
        first = false;
        let _ = write!(out, "'{}':'{}'", escape(name), escape(version));
    }
    let _ = write!(
        out,
        "}};bundle.publishes={{'{}':-1,'{}':-1,'{}':-1}};}}",
        BundleSpec::loader_file(),
        BundleSpec::minified_loader_file(),
        BundleSpec::metadata_file()
    );
    out
}

/// The generated module publishes closure: maps each public asset path to a
/// bare byte size, `{size,data64}`, or `{size,pixel:{height,width}}`, plus a
/// `.min.js` size entry for each minified sibling.
fn publishes_closure(module: &ModuleSpec) -> String {
    let mut entries: Vec<(String, String)> = Vec::new();
    for (path, publish) in &module.publishes {
        let value = match &publish.annotation {
            AssetAnnotation::None => publish.size.to_string(),
            AssetAnnotation::Inlined(data) => {
                format!("{{size:{},data64:'{}'}}", publish.size, escape(data))
            }
            AssetAnnotation::Dimensions { width, height } => format!(
                "{{size:{},pixel:{{height:{height},width:{width}}}}}",
                publish.size
            ),
        };
        entries.push((path.clone(), value));
        if let Some(minified) = publish.minified_size {
            let sibling = format!("{}.min.js", path.trim_end_matches(".js"));
            entries.push((sibling, minified.to_string()));
        }
    }
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    let body = entries
        .iter()
        .map(|(path, value)| format!("'{}':{}", escape(path), value))
        .collect::<Vec<_>>()
        .join(",");
    format!("function(module){{module.publishes={{{body}}};}}")
}

/// Escapes a string for embedding in a single-quoted literal.
fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
}
