use anyhow::Result;
use clap::ArgMatches;

use crate::platform::{query_for, NvidiaSmiQuery};
use crate::ui;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = super::load_config(matches)?;

    if matches.get_flag("raw") {
        let listing = NvidiaSmiQuery::new(&config.nvidia_smi).listing()?;
        print!("{}", listing);
        return Ok(());
    }

    let records = query_for(&config).enumerate()?;
    ui::print_devices(&records, config.token.trim());
    Ok(())
}
