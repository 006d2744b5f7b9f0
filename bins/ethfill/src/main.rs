use clap::Parser;
use color_eyre::eyre::Result;
use ethfill::cmd::MainCmd;

fn main() -> Result<()> {
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        std::env::set_var("RUST_BACKTRACE", "1");
    }
    color_eyre::install()?;

    MainCmd::parse().run()?;

    Ok(())
}
