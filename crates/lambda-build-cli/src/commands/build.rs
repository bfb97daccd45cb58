use std::path::{Path, PathBuf};

use anyhow::Context;
use lambda_build::{BuildReport, Builder};
use lambda_build_core::{ArtifactTarget, BuildKind, BuildParameters, LambdaBuildConfig};

use super::Overrides;

pub fn build(overrides: &Overrides) -> anyhow::Result<()> {
    let params = overrides.resolve()?;
    let builder = Builder::for_parameters(&overrides.project_dir, &params);

    for report in builder.build(&params)? {
        print_report(&report);
    }
    Ok(())
}

pub fn build_one(
    overrides: &Overrides,
    kind: BuildKind,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = overrides.load()?;
    if let Some(output) = output {
        set_artifact_path(&mut config, kind, absolute(&output)?);
    }

    let params = config.resolve(&overrides.project_dir)?;
    let target = target_for(&params, kind)?;

    let report = Builder::for_parameters(&overrides.project_dir, &params)
        .build_kind(kind, &params, target)?;
    print_report(&report);
    Ok(())
}

fn set_artifact_path(config: &mut LambdaBuildConfig, kind: BuildKind, path: PathBuf) {
    match kind {
        BuildKind::Layer => config.layer_artifact_path = Some(path),
        BuildKind::Function => config.function_artifact_path = Some(path),
        BuildKind::Package => config.artifact_path = path,
    }
}

fn target_for(params: &BuildParameters, kind: BuildKind) -> anyhow::Result<&ArtifactTarget> {
    match kind {
        BuildKind::Layer => params
            .layer
            .as_ref()
            .context("no layer artifact configured; set layer-artifact-path or pass --output"),
        BuildKind::Function => params
            .function
            .as_ref()
            .context("no function artifact configured; set function-artifact-path or pass --output"),
        BuildKind::Package => Ok(&params.package),
    }
}

/// `--output` is relative to where the command was run, not the project.
fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(cwd.join(path))
}

fn print_report(report: &BuildReport) {
    println!("Built {} artifact: {}", report.kind, report.artifact.display());
}
