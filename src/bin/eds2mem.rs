//! Generates a MEM file.
//!
//! Can be used as a generic memory generator, but targeted at CANopen EDS
//! files to be served via SDO. Run `eds2mem -h` for usage.

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use canopen_hdl::mem;

#[derive(Parser, Debug)]
#[command(name = "eds2mem")]
#[command(about = "Formats a file as a MEM image, optionally zlib-compressed")]
#[command(version)]
struct Args {
    /// Input file
    input_file: String,

    /// Output MEM file
    mem_file: String,

    /// Word size, in bytes
    #[arg(long, default_value_t = 7)]
    word: usize,

    /// Compresses the input using zlib with the given level (1-9)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=9))]
    zlib: u32,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let invocation = std::env::args().collect::<Vec<_>>().join(" ");
    let mut data = match fs::read(&args.input_file) {
        Ok(data) => data,
        Err(err) => {
            error!("Cannot read {}: {}", args.input_file, err);
            return ExitCode::FAILURE;
        }
    };

    if args.zlib > 0 {
        let before = data.len();
        data = match mem::compress(&data, args.zlib) {
            Ok(compressed) => compressed,
            Err(err) => {
                error!("Compression failed: {}", err);
                return ExitCode::FAILURE;
            }
        };
        println!("Compressed to {:.1}%", data.len() as f64 / before as f64 * 100.0);
    }

    let text = mem::render(&data, args.word, &invocation);
    if let Err(err) = fs::write(&args.mem_file, text) {
        error!("Cannot write {}: {}", args.mem_file, err);
        return ExitCode::FAILURE;
    }
    println!("{} written with {} bytes", args.mem_file, data.len());
    ExitCode::SUCCESS
}
