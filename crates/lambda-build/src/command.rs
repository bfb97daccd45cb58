use lambda_build_core::{DependencyGroups, ShellIdiom};

/// Export of the locked dependency set in requirements format.
pub const EXPORT_BASE_CMD: &str = "poetry export --format=requirements.txt --with-credentials";

/// Builds the dependency export command.
///
/// Group flags are appended in the fixed order `--without`, `--with`,
/// `--only`, and only for filters that name at least one group.
pub fn export_command(groups: &DependencyGroups) -> String {
    let mut cmd = EXPORT_BASE_CMD.to_owned();

    for (flag, names) in [
        ("without", &groups.without),
        ("with", &groups.with),
        ("only", &groups.only),
    ] {
        let names: Vec<&str> = names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();
        if !names.is_empty() {
            cmd.push_str(&format!(" --{flag}={}", names.join(",")));
        }
    }

    cmd
}

/// Values for the placeholders an install template may reference.
#[derive(Debug, Clone, Copy)]
pub struct InstallPlaceholders<'a> {
    /// `{mkdir}`
    pub mkdir: &'a str,
    /// `{chain_operator}`
    pub chain_operator: &'a str,
    /// `{container_cache_dir}` and `{package_dir}`
    pub target_dir: &'a str,
    /// `{requirements}`; left untouched when `None`
    pub requirements: Option<&'a str>,
}

impl<'a> InstallPlaceholders<'a> {
    pub fn new(idiom: &ShellIdiom, target_dir: &'a str, requirements: Option<&'a str>) -> Self {
        Self {
            mkdir: idiom.mkdir,
            chain_operator: idiom.chain_operator,
            target_dir,
            requirements,
        }
    }

    fn lookup(&self, name: &str) -> Option<&'a str> {
        match name {
            "mkdir" => Some(self.mkdir),
            "chain_operator" => Some(self.chain_operator),
            "container_cache_dir" | "package_dir" => Some(self.target_dir),
            "requirements" => self.requirements,
            _ => None,
        }
    }
}

/// Substitutes known `{name}` placeholders in one pass.
///
/// Text outside placeholders, unknown `{...}` tokens, and braces in
/// substituted values are all left as they are.
pub fn render_install_command(template: &str, placeholders: &InstallPlaceholders<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let substitution = after
            .find('}')
            .and_then(|close| placeholders.lookup(&after[..close]).map(|v| (close, v)));

        match substitution {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
