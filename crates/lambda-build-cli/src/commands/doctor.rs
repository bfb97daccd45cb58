use std::fmt;
use std::path::Path;

use lambda_build_core::config::PYPROJECT_FILE;
use lambda_build_exec::{DockerCli, ProcessRunner};

use super::Overrides;

struct Check {
    name: &'static str,
    passed: bool,
    required: bool,
    detail: String,
}

impl Check {
    fn icon(&self) -> &'static str {
        match (self.passed, self.required) {
            (true, _) => "OK",
            (false, true) => "NG",
            (false, false) => "--",
        }
    }
}

struct DoctorReport {
    checks: Vec<Check>,
}

impl DoctorReport {
    fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed || !c.required)
    }
}

impl fmt::Display for DoctorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "lambda-build doctor")?;
        writeln!(f, "-------------------")?;
        for check in &self.checks {
            writeln!(f, "{:<16}{}  {}", check.name, check.icon(), check.detail)?;
        }
        Ok(())
    }
}

pub fn doctor(overrides: &Overrides) -> anyhow::Result<()> {
    let project_dir = overrides.project_dir.as_path();
    let mut checks = Vec::new();

    let params = overrides.resolve();
    let in_container = params.as_ref().is_ok_and(|p| p.in_container);
    checks.push(match &params {
        Ok(p) => Check {
            name: "config",
            passed: true,
            required: true,
            detail: config_detail(project_dir, p.in_container),
        },
        Err(e) => Check {
            name: "config",
            passed: false,
            required: true,
            detail: format!("{e:#}"),
        },
    });

    let runner = ProcessRunner::default();
    checks.push(tool_check(&runner, project_dir, "poetry", "poetry", true));

    let docker = params
        .as_ref()
        // arch-lint: allow(no-silent-result-drop) reason="a config error is already reported by the config check above"
        .ok()
        .and_then(|p| p.docker.as_ref());
    let engine = DockerCli::from_config(docker);
    checks.push(tool_check(
        &runner,
        project_dir,
        "container engine",
        engine.binary(),
        in_container,
    ));

    let report = DoctorReport { checks };
    println!();
    println!("{report}");

    if !report.all_passed() {
        anyhow::bail!("some checks failed; see above for details");
    }
    Ok(())
}

fn config_detail(project_dir: &Path, in_container: bool) -> String {
    let source = if project_dir.join(PYPROJECT_FILE).exists() {
        PYPROJECT_FILE
    } else {
        "defaults"
    };
    let mode = if in_container { "container" } else { "local" };
    format!("{source} ({mode} install)")
}

fn tool_check(
    runner: &ProcessRunner,
    project_dir: &Path,
    name: &'static str,
    binary: &str,
    required: bool,
) -> Check {
    match runner.run(&format!("{binary} --version"), project_dir) {
        Ok(version) => Check {
            name,
            passed: true,
            required,
            detail: version.trim().to_owned(),
        },
        Err(e) => Check {
            name,
            passed: false,
            required,
            detail: if required {
                let reason = e.to_string();
                let reason = reason.lines().next().unwrap_or_default();
                format!("`{binary}` not callable: {reason}")
            } else {
                format!("`{binary}` not found (only needed for container installs)")
            },
        },
    }
}
