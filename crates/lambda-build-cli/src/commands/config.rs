use super::Overrides;

pub fn show_config(overrides: &Overrides, json: bool) -> anyhow::Result<()> {
    let params = overrides.resolve()?;

    let rendered = if json {
        serde_json::to_string_pretty(&params)?
    } else {
        toml::to_string_pretty(&params)?
    };

    println!("{rendered}");
    Ok(())
}
