//! 配置校验模块
//!
//! 校验规则：
//! - 至少配置一个 sink
//! - sink name 非空且唯一
//! - queue_capacity >= 1
//! - from_hour / to_hour 成对出现
//! - 各 sink 类型的必填参数齐全
//! - CSV 文件 sink 的 field_names 非空
//!
//! 另有一组不阻断加载的警告 (`warnings`)。

use std::collections::HashSet;
use std::path::Path;

use contracts::{ContractError, OutputBlueprint, SinkConfig, SinkType};
use validator::{Validate, ValidationErrors};

/// 文件 sink 支持的扩展名
const FILE_EXTENSIONS: &[&str] = &["json", "csv"];

/// 各 sink 类型可选参数
const QUEUE_OPTIONAL_PARAMS: &[&str] = &["ack", "ack_timeout_ms"];
const FILE_OPTIONAL_PARAMS: &[&str] = &["output_dir"];
const QUEUE_CLIENT_PREFIX: &str = "kafka.";

/// 校验 OutputBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &OutputBlueprint) -> Result<(), ContractError> {
    validate_not_empty(blueprint)?;
    validate_sink_fields(blueprint)?;
    validate_sink_names(blueprint)?;
    for sink in &blueprint.sinks {
        validate_window(sink)?;
        validate_required_params(sink)?;
        validate_csv_fields(sink)?;
    }
    Ok(())
}

/// 收集不影响加载的配置警告
pub fn warnings(blueprint: &OutputBlueprint) -> Vec<String> {
    let mut out = Vec::new();
    for sink in &blueprint.sinks {
        if sink.sink_type == SinkType::File {
            if let Some(file_name) = sink.param("file_name") {
                let ext = file_suffix(file_name);
                if !ext.is_some_and(|e| FILE_EXTENSIONS.contains(&e.as_str())) {
                    out.push(format!(
                        "sinks[{}]: unsupported file type '{}', records will be skipped",
                        sink.name, file_name
                    ));
                }
            }
            if let Some(mode) = sink.param("mode") {
                if mode != "w" && mode != "a" {
                    out.push(format!(
                        "sinks[{}]: mode '{}' is treated as append",
                        sink.name, mode
                    ));
                }
            }
        }

        for key in sink.params.keys() {
            if !is_known_param(sink.sink_type, key) {
                out.push(format!("sinks[{}]: unknown param '{}'", sink.name, key));
            }
        }
    }
    out.sort();
    out
}

fn is_known_param(sink_type: SinkType, key: &str) -> bool {
    if sink_type.required_params().contains(&key) {
        return true;
    }
    match sink_type {
        SinkType::Queue => {
            QUEUE_OPTIONAL_PARAMS.contains(&key) || key.starts_with(QUEUE_CLIENT_PREFIX)
        }
        SinkType::File => FILE_OPTIONAL_PARAMS.contains(&key),
        SinkType::Console => false,
    }
}

/// 至少一个 sink
fn validate_not_empty(blueprint: &OutputBlueprint) -> Result<(), ContractError> {
    if blueprint.sinks.is_empty() {
        return Err(ContractError::config_validation(
            "sinks",
            "at least one sink must be configured",
        ));
    }
    Ok(())
}

/// 字段级规则 (validator derive)
fn validate_sink_fields(blueprint: &OutputBlueprint) -> Result<(), ContractError> {
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        sink.validate()
            .map_err(|e| from_validation_errors(&format!("sinks[{}]", idx), &e))?;
    }
    Ok(())
}

/// 将 ValidationErrors 转为 ContractError (取第一个字段错误)
fn from_validation_errors(prefix: &str, errors: &ValidationErrors) -> ContractError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    match fields.first() {
        Some((field, errs)) => {
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref())
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("invalid value for {}", field));
            ContractError::config_validation(format!("{}.{}", prefix, field), message)
        }
        None => ContractError::config_validation(prefix, errors.to_string()),
    }
}

/// 校验 sink name 唯一性
fn validate_sink_names(blueprint: &OutputBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for sink in &blueprint.sinks {
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}

/// 时间窗口必须成对出现
fn validate_window(sink: &SinkConfig) -> Result<(), ContractError> {
    match (&sink.from_hour, &sink.to_hour) {
        (Some(_), None) | (None, Some(_)) => Err(ContractError::config_validation(
            format!("sinks[{}].from_hour / to_hour", sink.name),
            "from_hour and to_hour must be set together",
        )),
        _ => Ok(()),
    }
}

/// 类型必填参数
fn validate_required_params(sink: &SinkConfig) -> Result<(), ContractError> {
    if let Some(key) = sink.missing_params().first() {
        return Err(ContractError::config_validation(
            format!("sinks[{}].params.{}", sink.name, key),
            format!("missing required param for {:?} sink", sink.sink_type),
        ));
    }
    Ok(())
}

/// 文件名最后一个 `.` 之后的部分（小写），`.json` 也算
fn file_suffix(file_name: &str) -> Option<String> {
    let name = Path::new(file_name).file_name()?.to_str()?;
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

/// CSV 输出需要列名
fn validate_csv_fields(sink: &SinkConfig) -> Result<(), ContractError> {
    let is_csv = sink.sink_type == SinkType::File
        && sink
            .param("file_name")
            .and_then(file_suffix)
            .is_some_and(|e| e == "csv");

    if is_csv && sink.field_names.is_empty() {
        return Err(ContractError::config_validation(
            format!("sinks[{}].field_names", sink.name),
            "csv output requires at least one field name",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfigVersion, TimeOfDay};

    fn minimal_blueprint() -> OutputBlueprint {
        OutputBlueprint {
            version: ConfigVersion::V1,
            sinks: vec![
                SinkConfig::new("archive", SinkType::File, vec!["id".into(), "val".into()])
                    .with_param("file_name", "out.csv")
                    .with_param("mode", "w"),
                SinkConfig::new("events", SinkType::Queue, vec![])
                    .with_param("topic", "events")
                    .with_param("bootstrap_server", "localhost:9092"),
                SinkConfig::new("console", SinkType::Console, vec![]),
            ],
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
        assert!(warnings(&bp).is_empty());
    }

    #[test]
    fn test_no_sinks() {
        let bp = OutputBlueprint {
            version: ConfigVersion::V1,
            sinks: vec![],
        };
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("at least one sink"), "got: {err}");
    }

    #[test]
    fn test_duplicate_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks.push(bp.sinks[2].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate sink name"), "got: {err}");
    }

    #[test]
    fn test_empty_sink_name() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].name = String::new();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
        assert!(err.contains("sinks[0].name"), "got: {err}");
    }

    #[test]
    fn test_zero_queue_capacity() {
        let mut bp = minimal_blueprint();
        bp.sinks[1].queue_capacity = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("queue_capacity must be >= 1"), "got: {err}");
    }

    #[test]
    fn test_half_window() {
        let mut bp = minimal_blueprint();
        bp.sinks[2].from_hour = TimeOfDay::from_hms(9, 0, 0);
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("must be set together"), "got: {err}");

        bp.sinks[2].to_hour = TimeOfDay::from_hms(17, 0, 0);
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_missing_required_param() {
        let mut bp = minimal_blueprint();
        bp.sinks[1].params.remove("topic");
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("sinks[events].params.topic"), "got: {err}");
    }

    #[test]
    fn test_csv_requires_field_names() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].field_names.clear();
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("field name"), "got: {err}");

        // JSON output does not need columns
        bp.sinks[0].params.insert("file_name".into(), "out.json".into());
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_warnings() {
        let mut bp = minimal_blueprint();
        bp.sinks[0].params.insert("file_name".into(), "out.txt".into());
        bp.sinks[0].params.insert("mode".into(), "append".into());
        bp.sinks[1]
            .params
            .insert("kafka.linger.ms".into(), "5".into());
        bp.sinks[2].params.insert("colour".into(), "red".into());

        assert!(validate(&bp).is_ok());
        let warnings = warnings(&bp);
        assert_eq!(warnings.len(), 3, "got: {warnings:?}");
        assert!(warnings.iter().any(|w| w.contains("unsupported file type")));
        assert!(warnings.iter().any(|w| w.contains("treated as append")));
        assert!(warnings.iter().any(|w| w.contains("unknown param 'colour'")));
    }

    #[test]
    fn test_file_suffix_follows_last_dot() {
        assert_eq!(file_suffix("out.CSV").as_deref(), Some("csv"));
        assert_eq!(file_suffix(".json").as_deref(), Some("json"));
        assert_eq!(file_suffix("dir/a.tar.json").as_deref(), Some("json"));
        assert_eq!(file_suffix("json"), None);

        let mut bp = minimal_blueprint();
        bp.sinks[0].params.insert("file_name".into(), ".csv".into());
        bp.sinks[0].field_names.clear();
        assert!(validate(&bp).is_err());

        bp.sinks[0].params.insert("file_name".into(), ".json".into());
        assert!(validate(&bp).is_ok());
        assert!(warnings(&bp).is_empty());
    }
}
