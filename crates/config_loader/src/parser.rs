//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。
//!
//! 先解析为通用文档，再逐个解码 `[[sinks]]` 条目，
//! 错误信息中带上出错 sink 的下标与名称。

use contracts::{ConfigVersion, ContractError, OutputBlueprint, SinkConfig};
use serde_json::{Map, Value};
use std::fmt;

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toml => f.write_str("TOML"),
            Self::Json => f.write_str("JSON"),
        }
    }
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<OutputBlueprint, ContractError> {
    let document = match format {
        ConfigFormat::Toml => toml::from_str::<toml::Table>(content)
            .map_err(|e| syntax_error(format, e))
            .and_then(|table| serde_json::to_value(table).map_err(|e| syntax_error(format, e)))?,
        ConfigFormat::Json => {
            serde_json::from_str::<Value>(content).map_err(|e| syntax_error(format, e))?
        }
    };
    blueprint_from_document(document, format)
}

fn syntax_error<E>(format: ConfigFormat, e: E) -> ContractError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ContractError::ConfigParse {
        message: format!("{format} parse error: {e}"),
        source: Some(Box::new(e)),
    }
}

fn blueprint_from_document(
    document: Value,
    format: ConfigFormat,
) -> Result<OutputBlueprint, ContractError> {
    let Value::Object(mut root) = document else {
        return Err(ContractError::config_parse(format!(
            "{format} parse error: top level must be a table"
        )));
    };

    let version = match root.remove("version") {
        Some(value) => serde_json::from_value::<ConfigVersion>(value)
            .map_err(|e| entry_error(format, "version", e))?,
        None => ConfigVersion::default(),
    };

    let entries = match root.remove("sinks") {
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(ContractError::config_parse(format!(
                "{format} parse error: 'sinks' must be an array of tables"
            )))
        }
        None => {
            return Err(ContractError::config_parse(format!(
                "{format} parse error: missing 'sinks'"
            )))
        }
    };

    let sinks = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let location = entry_location(index, &entry);
            serde_json::from_value::<SinkConfig>(entry)
                .map_err(|e| entry_error(format, &location, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OutputBlueprint { version, sinks })
}

/// `sinks[1] ("archive")`, or just `sinks[1]` when the entry has no name
fn entry_location(index: usize, entry: &Value) -> String {
    match entry.as_object().and_then(sink_name) {
        Some(name) => format!("sinks[{index}] (\"{name}\")"),
        None => format!("sinks[{index}]"),
    }
}

fn sink_name(entry: &Map<String, Value>) -> Option<&str> {
    entry.get("name").and_then(Value::as_str)
}

fn entry_error(format: ConfigFormat, location: &str, e: serde_json::Error) -> ContractError {
    ContractError::ConfigParse {
        message: format!("{format} parse error at {location}: {e}"),
        source: Some(Box::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SinkType;

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[[sinks]]
name = "archive"
sink_type = "file"
field_names = ["id", "val"]
from_hour = 9
to_hour = "17:30"

[sinks.params]
file_name = "out.csv"
mode = "w"
"#;
        let result = parse(content, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.sinks.len(), 1);
        let sink = &bp.sinks[0];
        assert_eq!(sink.sink_type, SinkType::File);
        assert_eq!(sink.field_names, vec!["id", "val"]);
        assert_eq!(sink.from_hour.map(|t| t.to_string()).as_deref(), Some("09:00"));
        assert_eq!(sink.to_hour.map(|t| t.to_string()).as_deref(), Some("17:30"));
        assert_eq!(sink.param("mode"), Some("w"));
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "sinks": [{
                "name": "events",
                "sink_type": "kafka",
                "field_names": [],
                "params": { "topic": "events", "bootstrap_server": "localhost:9092" }
            }]
        }"#;
        let result = parse(content, ConfigFormat::Json);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        assert_eq!(result.unwrap().sinks[0].sink_type, SinkType::Queue);
    }

    #[test]
    fn test_parse_rejects_bad_hour() {
        let content = r#"
[[sinks]]
name = "console"
sink_type = "console"
field_names = []
from_hour = "25:00"
to_hour = "06:00"
"#;
        let err = parse(content, ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse(content, ConfigFormat::Toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }

    #[test]
    fn test_error_names_failing_sink() {
        let content = r#"
[[sinks]]
name = "console"
sink_type = "console"
field_names = []

[[sinks]]
name = "archive"
sink_type = "ftp"
field_names = []
"#;
        let err = parse(content, ConfigFormat::Toml).unwrap_err().to_string();
        assert!(err.contains("sinks[1] (\"archive\")"), "got: {err}");
        assert!(err.contains("ftp"), "got: {err}");
    }

    #[test]
    fn test_error_for_unnamed_sink() {
        let content = r#"{ "sinks": [ { "sink_type": "console", "field_names": [] } ] }"#;
        let err = parse(content, ConfigFormat::Json).unwrap_err().to_string();
        assert!(err.contains("JSON parse error at sinks[0]:"), "got: {err}");
        assert!(err.contains("name"), "got: {err}");
    }

    #[test]
    fn test_sinks_must_be_present() {
        let err = parse("version = \"V1\"\n", ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("missing 'sinks'"), "got: {err}");

        let err = parse(r#"{"sinks": {}}"#, ConfigFormat::Json).unwrap_err();
        assert!(err.to_string().contains("array of tables"), "got: {err}");
    }
}
