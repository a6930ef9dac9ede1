use relay_core::RelayConfig;

use crate::error::Result;

pub(crate) fn run(config: &RelayConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config)?;
    println!("{rendered}");
    Ok(())
}
