#[macro_use]
extern crate log;
extern crate clap;
extern crate ofswitch;
extern crate simple_logger;

use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::process;
use std::sync::Arc;

use ofswitch::app::{LearningSwitch, MacTableStore};
use ofswitch::ctl;

/// OpenFlow 1.3 learning switch controller
#[derive(Parser, Debug)]
#[command(name = "ofswitch", version, about = "OpenFlow 1.3 learning switch controller")]
struct Args {
    /// Address to listen on for switch connections
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 6633)]
    port: u16,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

pub fn main() {
    let args = Args::parse();

    if let Err(err) = SimpleLogger::new().with_level(args.log_level).env().init() {
        eprintln!("could not init logger: {}", err);
        process::exit(1);
    }

    let app = Arc::new(LearningSwitch::new(Arc::new(MacTableStore::new())));
    if let Err(err) = ctl::start_controller((args.host.as_str(), args.port), app) {
        error!("error in controller: {}", err);
        for cause in err.iter().skip(1) {
            error!("caused by: {}", cause);
        }
        process::exit(1);
    }
}
