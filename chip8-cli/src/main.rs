//! Entrypoint for CLI
use std::{env, error::Error, fs, time::Instant};

use chip8::{prelude::*, Mute, IMPL_VERSION};
use log::info;

use crate::{
    app::{steps_per_frame, Chip8App},
    config::AppConfig,
    error::AppError,
    inputmap::{default_defs, InputMap},
};

mod app;
mod clock;
mod config;
mod error;
mod inputmap;
mod terminal;

static USAGE: &str = r#"
usage: chip8 CMD FILE [ARG]

commands:
    run     Run the target ROM file in the terminal, with an optional YAML config
    exec    Execute the target ROM headless for a number of steps (default 1000),
            then print the display

examples:
    chip8 run breakout.rom
    chip8 run breakout.rom config.yaml
    chip8 exec maze.rom 2000

environment:
    RUST_LOG    log level filter, logs are written to stderr
"#;

const DEFAULT_EXEC_STEPS: usize = 1000;

fn run_terminal(filepath: &str, config_path: Option<&str>) -> Result<(), AppError> {
    let config = match config_path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    let defs = config.keys.clone().unwrap_or_else(default_defs);
    let input_map = InputMap::new(&defs, config.key_hold());

    let mut app = Chip8App::new(&config, input_map);
    app.load_rom(filepath)?;
    app.run()
}

fn run_bytecode(filepath: &str, steps: usize) -> Result<(), AppError> {
    info!("running bytecode interpreter");

    let bytecode = fs::read(filepath)?;

    let mut vm = Chip8Vm::new(Chip8Conf::default());
    vm.load_program(&bytecode)?;

    if log::log_enabled!(log::Level::Debug) {
        log::debug!("program:\n{}", vm.dump_ram(bytecode.len())?);
    }

    let timer_interval = steps_per_frame(vm.config().clock_frequency());
    let mut buzzer = Mute;

    let start = Instant::now();
    let mut result = Ok(());
    for step in 1..=steps {
        match vm.step() {
            Ok(Flow::Halt) => {
                info!("program halted at {:03X} after {step} steps", vm.pc());
                break;
            }
            Ok(Flow::KeyWait) => {
                info!("program waits for a key after {step} steps");
                break;
            }
            Ok(_) => {}
            Err(err) if err.is_recoverable() => log::warn!("{err}"),
            Err(err) => {
                result = Err(err);
                break;
            }
        }

        if step % timer_interval == 0 {
            vm.tick_timers(&mut buzzer);
        }
    }
    let end = Instant::now();

    println!(
        "time taken: {}ms",
        end.duration_since(start).as_nanos() as f64 / 1000000.0
    ); // to millis
    println!("{}", vm.dump_display()?);

    result?;

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init()?;

    match parse_args() {
        Some(Cmd::Run { filepath, config }) => run_terminal(&filepath, config.as_deref())?,
        Some(Cmd::Exec { filepath, steps }) => run_bytecode(&filepath, steps)?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(cmd) => match cmd.as_str() {
            "run" => Some(Cmd::Run {
                filepath: consume_arg(&mut args)?,
                config: args.next(),
            }),
            "exec" => Some(Cmd::Exec {
                filepath: consume_arg(&mut args)?,
                steps: match args.next() {
                    Some(arg) => arg.parse().ok()?,
                    None => DEFAULT_EXEC_STEPS,
                },
            }),
            _ => None,
        },
        None => None,
    }
}

/// Consumes the next argument, which is required.
fn consume_arg(args: &mut impl Iterator<Item = String>) -> Option<String> {
    args.next()
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Run ROM interactively in the terminal
    Run {
        filepath: String,
        config: Option<String>,
    },
    /// Run ROM headless for a fixed number of steps
    Exec { filepath: String, steps: usize },
}
