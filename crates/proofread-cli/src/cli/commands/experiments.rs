use super::super::args::{ExperimentsArgs, OutputFormat};
use super::registry_builder::build_registry;
use crate::exit_codes;
use proofread_core::config::resolve_settings;
use proofread_core::manifest::write_output;
use proofread_core::metrics_api::ExperimentKind;
use std::path::Path;

pub fn run(args: ExperimentsArgs, config: Option<&Path>) -> anyhow::Result<i32> {
    let settings = resolve_settings(config)?;
    let registry = build_registry(&settings, args.plugin_dir.as_deref());

    match args.format {
        OutputFormat::Json => write_output(
            &serde_json::json!({
                "experiments": registry.infos(),
                "load_errors": registry.load_errors(),
            }),
            None,
        )?,
        OutputFormat::Text => {
            for e in registry.experiments() {
                let kind = match e.kind() {
                    ExperimentKind::Scenario => "scenario",
                    ExperimentKind::Analysis => "analysis",
                };
                let range = e
                    .value_range()
                    .map(|r| format!("positive={} negative={}", r.positive, r.negative))
                    .unwrap_or_default();
                println!("{:<36} {:<9} {}", e.name(), kind, range);
            }
            for err in registry.load_errors() {
                println!("load error: {}", err);
            }
        }
    }
    Ok(exit_codes::SUCCESS)
}
