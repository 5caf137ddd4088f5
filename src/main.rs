use clap::{App, Arg, ArgMatches};
use std::error::Error;
use std::io::{stdin, Read};
use std::process;
use std::time::Instant;
use wspace::log::{self, Level};
use wspace::{error, info, WsVm, WsVmConfig};

fn args() -> ArgMatches {
    App::new("wspace")
        .about("a whitespace interpreter with arbitrary precision integers")
        .version("0.1.0")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .takes_value(true)
                .required(true)
                .help("whitespace source file to interpret"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .takes_value(true)
                .required(false)
                .conflicts_with("stdin")
                .help("text the program reads its characters and numbers from"),
        )
        .arg(
            Arg::new("stdin")
                .long("stdin")
                .takes_value(false)
                .required(false)
                .help("reads the program input from stdin until end of file"),
        )
        .arg(
            Arg::new("raw")
                .short('r')
                .long("raw")
                .takes_value(false)
                .required(false)
                .help("prints the decoded instruction listing instead of running the program"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .takes_value(false)
                .required(false)
                .help("prints debug information before each executed instruction"),
        )
        .arg(
            Arg::new("debug-heap")
                .short('m')
                .long("debug-heap")
                .takes_value(false)
                .required(false)
                .help("prints a heap dump after each executed instruction"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .takes_value(false)
                .required(false)
                .help("suppresses all output other than what the whitespace program is producing"),
        )
        .get_matches()
}

fn read_input(args: &ArgMatches) -> Result<String, Box<dyn Error>> {
    if args.is_present("stdin") {
        let mut input = String::new();
        stdin().read_to_string(&mut input)?;

        return Ok(input);
    }

    Ok(args.value_of("input").unwrap_or_default().to_string())
}

fn interpret(args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let file_name = args.value_of("file").unwrap_or_default();
    let raw = args.is_present("raw");
    let debug = args.is_present("debug");
    let debug_heap = args.is_present("debug-heap");
    let quiet = args.is_present("quiet");
    if debug || debug_heap {
        log::set_level(Level::Debug);
    } else if quiet {
        log::set_level(Level::Warn);
    }

    let input = read_input(args)?;
    let config = WsVmConfig::new(debug || debug_heap, debug_heap, raw, true);
    let start = Instant::now();
    let mut vm = WsVm::from_file(file_name, &input, config)?;
    let end = Instant::now();
    info!(
        "loaded {} tokens and {} labels in {} ms ({} ns)",
        vm.program().len(),
        vm.labels().len(),
        end.duration_since(start).as_millis(),
        end.duration_since(start).as_nanos()
    );

    if !raw {
        let start = Instant::now();
        vm.run()?;
        let end = Instant::now();
        info!(
            "routine took {} ms ({} ns)",
            end.duration_since(start).as_millis(),
            end.duration_since(start).as_nanos()
        );
    }

    Ok(())
}

fn main() {
    let args = args();
    if let Err(err) = interpret(&args) {
        error!("{}", err);
        process::exit(1);
    }
}
