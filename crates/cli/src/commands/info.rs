//! `info` command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{OutputBlueprint, SinkConfig};

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    window: Option<String>,
    field_names: Vec<String>,
    queue_capacity: usize,
    overflow: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

impl SinkInfo {
    fn from_config(sink: &SinkConfig, with_params: bool) -> Self {
        Self {
            name: sink.name.clone(),
            sink_type: format!("{:?}", sink.sink_type),
            window: window_label(sink),
            field_names: sink.field_names.clone(),
            queue_capacity: sink.queue_capacity,
            overflow: format!("{:?}", sink.overflow),
            params: if with_params {
                sink.params.clone().into_iter().collect()
            } else {
                BTreeMap::new()
            },
        }
    }
}

fn window_label(sink: &SinkConfig) -> Option<String> {
    match (sink.from_hour, sink.to_hour) {
        (Some(from), Some(to)) => Some(contracts::TimeWindow::new(from, to).to_string()),
        _ => None,
    }
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &OutputBlueprint, args: &InfoArgs) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        sinks: blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo::from_config(s, args.params))
            .collect(),
    }
}

fn print_config_info(blueprint: &OutputBlueprint, args: &InfoArgs) {
    println!("=== Record Sink Configuration ({:?}) ===\n", blueprint.version);
    println!("Sinks ({})", blueprint.sinks.len());

    for (i, sink) in blueprint.sinks.iter().enumerate() {
        let is_last = i == blueprint.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child = if is_last { "   " } else { "│  " };
        let info = SinkInfo::from_config(sink, args.params);

        println!("   {} {} ({})", prefix, info.name, info.sink_type);
        println!(
            "   {}  ├─ Window: {}",
            child,
            info.window.as_deref().unwrap_or("always")
        );
        println!(
            "   {}  ├─ Queue: {} ({})",
            child, info.queue_capacity, info.overflow
        );
        if info.params.is_empty() {
            println!("   {}  └─ Fields: {:?}", child, info.field_names);
        } else {
            println!("   {}  ├─ Fields: {:?}", child, info.field_names);
            println!("   {}  └─ Params:", child);
            for (key, value) in &info.params {
                println!("   {}       {} = {}", child, key, value);
            }
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConfigVersion, SinkType, TimeOfDay};

    #[test]
    fn test_build_config_info() {
        let blueprint = OutputBlueprint {
            version: ConfigVersion::V1,
            sinks: vec![
                SinkConfig::new("night", SinkType::Console, vec![]).with_window(
                    TimeOfDay::from_hms(22, 0, 0).unwrap(),
                    TimeOfDay::from_hms(6, 0, 0).unwrap(),
                ),
                SinkConfig::new("archive", SinkType::File, vec!["id".into()])
                    .with_param("file_name", "out.csv")
                    .with_param("mode", "w"),
            ],
        };
        let args = InfoArgs {
            config: "sinks.toml".into(),
            json: true,
            params: true,
        };

        let info = build_config_info(&blueprint, &args);
        assert_eq!(info.sinks[0].window.as_deref(), Some("22:00-06:00"));
        assert!(info.sinks[0].params.is_empty());
        assert_eq!(info.sinks[1].window, None);
        assert_eq!(
            info.sinks[1].params.keys().collect::<Vec<_>>(),
            vec!["file_name", "mode"]
        );
    }
}
