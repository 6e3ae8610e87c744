//! Generates a VHDL entity from a CiA 306-1 compliant EDS file.
//!
//! Run `eds2vhdl -h` for usage.

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use canopen_hdl::object_directory::Mux;
use canopen_hdl::{entity, validate, EntityPlan, GeneratorOptions, ObjectDirectory};

#[derive(Parser, Debug)]
#[command(name = "eds2vhdl")]
#[command(about = "Generates a VHDL entity from a CiA 306-1 compliant EDS file")]
#[command(version)]
struct Args {
    /// EDS file
    eds: String,

    /// Adds output signal for single-clock pulse when SYNC is received
    #[arg(long)]
    sync: bool,

    /// Adds output signal for single-clock pulse when GFC is received
    #[arg(long)]
    gfc: bool,

    /// Adds output signal for TIME object
    #[arg(long)]
    timestamp: bool,

    /// Object dictionary multiplexers to expose as ports (0x101804, e.g.)
    #[arg(long, num_args = 1.., value_parser = parse_mux)]
    port: Vec<Mux>,
}

fn parse_mux(s: &str) -> Result<Mux, String> {
    canopen_hdl::util::parse_int(s).ok_or_else(|| format!("invalid multiplexer '{}'", s))
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let invocation = std::env::args().collect::<Vec<_>>().join(" ");
    let content = match fs::read_to_string(&args.eds) {
        Ok(content) => content,
        Err(err) => {
            error!("Cannot read {}: {}", args.eds, err);
            return ExitCode::FAILURE;
        }
    };

    let options = GeneratorOptions {
        sync: args.sync,
        gfc: args.gfc,
        timestamp: args.timestamp,
        extra_ports: args.port,
    };

    let output = ObjectDirectory::from_eds(&content)
        .and_then(|od| {
            validate::validate(&od)?;
            Ok(od)
        })
        .and_then(|od| EntityPlan::new(od, options))
        .and_then(|plan| {
            let text = entity::generate(&plan, &invocation)?;
            Ok((plan, text))
        });

    let (plan, text) = match output {
        Ok(ok) => ok,
        Err(err) => {
            error!("{:?}", err);
            return ExitCode::FAILURE;
        }
    };

    let path = format!("{}.vhd", plan.entity_name());
    if let Err(err) = fs::write(&path, text) {
        error!("Cannot write {}: {}", path, err);
        return ExitCode::FAILURE;
    }
    println!("{} written", path);
    ExitCode::SUCCESS
}
