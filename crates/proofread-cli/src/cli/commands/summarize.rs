use super::super::args::SummarizeArgs;
use super::registry_builder::build_registry;
use crate::exit_codes;
use proofread_core::config::resolve_settings;
use proofread_core::manifest::load_manifest;
use proofread_core::report::json::write_jsonl;
use proofread_core::report::summary::{flatten_results, metric_means};
use std::path::{Path, PathBuf};

pub fn run(args: SummarizeArgs, config: Option<&Path>) -> anyhow::Result<i32> {
    let settings = resolve_settings(config)?;
    let registry = build_registry(&settings, args.plugin_dir.as_deref());

    let mut manifests = Vec::new();
    for path in expand_inputs(&args.inputs)? {
        manifests.push(load_manifest(&path)?);
    }

    let rows = flatten_results(&manifests, &registry);
    write_jsonl(&rows, &args.output)?;
    for mean in metric_means(&rows) {
        tracing::info!(
            metric = %mean.metric_name,
            mean = ?mean.mean,
            scored = mean.scored,
            failed = mean.failed,
            "metric mean"
        );
    }
    tracing::info!(
        manifests = manifests.len(),
        rows = rows.len(),
        output = %args.output.display(),
        "summary written"
    );
    Ok(exit_codes::SUCCESS)
}

/// Files are taken as given; a directory contributes its `*.json` files in name order.
fn expand_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            out.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        found.sort();
        out.extend(found);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_expand_to_sorted_json_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        let single = PathBuf::from("results/x.json");
        let paths = expand_inputs(&[dir.path().to_path_buf(), single.clone()]).unwrap();
        assert_eq!(
            paths,
            vec![dir.path().join("a.json"), dir.path().join("b.json"), single]
        );
    }
}
