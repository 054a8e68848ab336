use clap::Parser;
use tracing::info;

use crate::core::config::Config;
use crate::core::emu::{Emulator, EMU_BUILD_DATE_TIME, EMU_NAME, EMU_VERSION};

mod core;
mod log;

#[derive(Parser)]
#[command(name = "nouwii", version, about = "Wii emulator")]
struct Args {
    /// Path to the executable image (DOL)
    dol: String,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn main() {
    let args = Args::parse();

    let logger = log::Logger::init("info");

    let config = match &args.config {
        Some(path) => Config::load(path),
        None => Config::default(),
    };
    logger.set_log_level(&config.log_level);

    info!(
        "Welcome to {} v{} compiled on {}",
        EMU_NAME, EMU_VERSION, EMU_BUILD_DATE_TIME
    );

    let mut emu = Emulator::new(&config);
    emu.reset();
    emu.load(&args.dol);
    emu.run();
}
