//! OutputBlueprint - Config Loader output
//!
//! 描述输出路由：每个 sink 的类型、字段列表、时间窗口与类型特定参数。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::TimeOfDay;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的输出配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 输出路由配置
    pub sinks: Vec<SinkConfig>,
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkConfig {
    /// Sink 名称
    #[validate(length(min = 1, message = "sink name cannot be empty"))]
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 字段名列表 (CSV 列顺序)
    pub field_names: Vec<String>,

    /// 时间窗口起点 (与 to_hour 成对出现)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_hour: Option<TimeOfDay>,

    /// 时间窗口终点
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_hour: Option<TimeOfDay>,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1, message = "queue_capacity must be >= 1"))]
    pub queue_capacity: usize,

    /// 队列满时的处理策略
    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

impl SinkConfig {
    /// Minimal config with no window and no params
    pub fn new(name: impl Into<String>, sink_type: SinkType, field_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            sink_type,
            field_names,
            from_hour: None,
            to_hour: None,
            queue_capacity: default_queue_capacity(),
            overflow: OverflowPolicy::default(),
            params: HashMap::new(),
        }
    }

    /// Set a type-specific parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Restrict delivery to a daily window
    pub fn with_window(mut self, from: TimeOfDay, to: TimeOfDay) -> Self {
        self.from_hour = Some(from);
        self.to_hour = Some(to);
        self
    }

    /// Look up a type-specific parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parameters required by this sink's type that are absent
    pub fn missing_params(&self) -> Vec<&'static str> {
        self.sink_type
            .required_params()
            .iter()
            .copied()
            .filter(|key| !self.params.contains_key(*key))
            .collect()
    }
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 消息队列输出 (Kafka topic)
    #[serde(alias = "kafka")]
    Queue,
    /// 终端输出
    #[serde(alias = "terminal")]
    Console,
    /// 文件输出 (JSON / CSV)
    File,
}

impl SinkType {
    /// Keys that must be present in `params` for this type
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::Queue => &["topic", "bootstrap_server"],
            Self::Console => &[],
            Self::File => &["file_name", "mode"],
        }
    }
}

/// 背压策略 (队列满时)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// 等待队列空位
    #[default]
    Block,
    /// 丢弃最新的记录
    DropNewest,
}
