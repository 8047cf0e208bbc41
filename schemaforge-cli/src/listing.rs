//! Rendering for `schemaforge list-plugins`.

use camino::Utf8Path;
use schemaforge_core::ports::ConfigStore;
use schemaforge_plugins::{BUILTIN_CATALOG, BuiltinTransformer};
use serde::Serialize;

/// A custom transformer reference configured for an API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfiguredTransformer {
    pub api: String,
    pub reference: String,
}

#[derive(Debug, Serialize)]
pub struct PluginListing {
    pub builtin: &'static [BuiltinTransformer],
    pub custom: Vec<ConfiguredTransformer>,
}

/// The built-in catalog plus every custom reference configured under
/// `<backend>/api/*/transform.conf.json`.
pub fn collect(api_dir: &Utf8Path, store: &dyn ConfigStore) -> anyhow::Result<PluginListing> {
    let mut custom = Vec::new();
    if api_dir.is_dir() {
        let mut apis: Vec<_> = fs_err::read_dir(api_dir)?
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        apis.sort();
        for api in apis {
            let Some(config) = store.read(&api_dir.join(&api))? else {
                continue;
            };
            custom.extend(config.transformers.into_iter().map(|reference| {
                ConfiguredTransformer {
                    api: api.clone(),
                    reference,
                }
            }));
        }
    }
    Ok(PluginListing {
        builtin: BUILTIN_CATALOG,
        custom,
    })
}

pub fn render_text(listing: &PluginListing) -> String {
    let mut out = String::from("Built-in transformers (pipeline order):\n\n");
    out.push_str(&format!(
        "  {:<12} {:<24} {:<14} {:<12} DESCRIPTION\n",
        "KEY", "NAME", "STAGE", "DIRECTIVE"
    ));
    out.push_str(&format!(
        "  {:<12} {:<24} {:<14} {:<12} -----------\n",
        "---", "----", "-----", "---------"
    ));
    for t in listing.builtin {
        let stage = if t.always_present {
            t.stage.as_str().to_string()
        } else {
            format!("{}*", t.stage.as_str())
        };
        out.push_str(&format!(
            "  {:<12} {:<24} {:<14} @{:<11} {}\n",
            t.key, t.name, stage, t.directive, t.description
        ));
    }
    out.push_str("\n  * included only when the schema uses its directive\n");

    out.push_str("\nCustom transformers:\n\n");
    if listing.custom.is_empty() {
        out.push_str("  (none configured)\n");
    }
    for c in &listing.custom {
        out.push_str(&format!("  {:<12} {}\n", c.api, c.reference));
    }
    out
}

/// Detail view for `schemaforge explain <key>`.
pub fn render_explanation(t: &BuiltinTransformer) -> String {
    let runs = if t.always_present {
        "always"
    } else {
        "only when the schema uses its directive"
    };
    format!(
        "{name} ({key})\n\n  Directive: @{directive}\n  Stage:     {stage}\n  Runs:      {runs}\n\n{description}\n",
        name = t.name,
        key = t.key,
        directive = t.directive,
        stage = t.stage.as_str(),
        description = t.description,
    )
}
