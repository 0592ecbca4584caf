//! Built-in generator defaults (layer 1)

use serde_json::{json, Value};

/// Output file when none is configured
pub const DEFAULT_OUTPUT: &str = "firmware.swu";

/// Optional config file picked up from the invocation directory
pub const DEFAULT_CONFIG_FILE: &str = "swu-gen.toml";

/// Built-in default configuration values
#[derive(Debug, Clone)]
pub struct BuiltinDefaults {
    pub output: String,
    pub search_paths: Vec<String>,
    pub strict_signing: bool,
    pub signer: String,
    pub archiver: String,
    pub legacy_archiver: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            output: DEFAULT_OUTPUT.to_string(),
            search_paths: vec![".".to_string()],
            strict_signing: false,
            signer: "openssl".to_string(),
            archiver: "paxcpio".to_string(),
            legacy_archiver: "cpio".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to a JSON value for merging
    pub fn to_value(&self) -> Value {
        json!({
            "output": self.output,
            "search_paths": self.search_paths,
            "strict_signing": self.strict_signing,
            "tools": {
                "signer": self.signer,
                "archiver": self.archiver,
                "legacy_archiver": self.legacy_archiver,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_value() {
        let value = BuiltinDefaults::default().to_value();
        assert_eq!(value["output"], "firmware.swu");
        assert_eq!(value["search_paths"], json!(["."]));
        assert_eq!(value["tools"]["archiver"], "paxcpio");
        assert_eq!(value["tools"]["legacy_archiver"], "cpio");
        assert!(value.get("key").is_none());
    }
}
