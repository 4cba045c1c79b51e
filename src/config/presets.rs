//! Built-in preset bundles a source can reference with `preset "name"`.

use indexmap::IndexMap;

use super::settings::{Setting, SourceSettings};

fn bundle(pairs: &[(&str, &str)]) -> SourceSettings {
    let mut settings = SourceSettings::new();
    for (key, value) in pairs {
        settings.set(key, Setting::Text(value.to_string()));
    }
    settings
}

pub fn builtin() -> IndexMap<String, SourceSettings> {
    let mut presets = IndexMap::new();

    // One request per second per registrable domain.
    presets.insert(
        "polite".to_string(),
        bundle(&[("throttle key", "$2nd_lvl_domain$"), ("throttle interval", "1")]),
    );

    let mut cached = bundle(&[("cache seconds", "3600")]);
    cached.set("use stale cache", Setting::Flag);
    presets.insert("cached".to_string(), cached);

    let mut json_api = bundle(&[("format", "json")]);
    json_api.set(
        "headers",
        Setting::Table(IndexMap::from([(
            "Accept".to_string(),
            "application/json".to_string(),
        )])),
    );
    presets.insert("json-api".to_string(), json_api);

    presets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_presets_use_canonical_keys() {
        let presets = builtin();
        let polite = presets.get("polite").unwrap();
        assert_eq!(
            polite.get("throttle-key"),
            Some(&Setting::Text("$2nd_lvl_domain$".to_string()))
        );
        assert_eq!(presets.get("cached").unwrap().get("use stale cache"), Some(&Setting::Flag));
    }
}
