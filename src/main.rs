use std::env;
use std::error::Error;

use rusty_neumann::console::run_console;
use rusty_neumann::observer::{LogObserver, Simulation};
use rusty_neumann::system_config::{EngineConfig, EngineFactory};

const MAX_BATCH_STEPS: usize = 256;

const USAGE: &str = "Usage: rusty_neumann [config.json] [--batch EXPR]

  config.json    engine configuration (defaults to a Simple symbolic engine)
  --batch EXPR   run EXPR (e.g. 3+4) to completion and print every step";

#[derive(Debug, Default, PartialEq, Eq)]
struct Options {
    config_path: Option<String>,
    batch: Option<String>,
    help: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--batch" | "-b" => {
                let expression = args
                    .next()
                    .ok_or_else(|| "--batch needs an expression such as 3+4".to_string())?;
                options.batch = Some(expression);
            }
            "--help" | "-h" => options.help = true,
            flag if flag.starts_with('-') => return Err(format!("Unknown option '{}'", flag)),
            path => {
                if options.config_path.is_some() {
                    return Err(format!("Unexpected argument '{}'", path));
                }
                options.config_path = Some(path.to_string());
            }
        }
    }
    Ok(options)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let options = parse_args(env::args().skip(1))?;
    if options.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let factory = EngineFactory::new();
    let engine = match &options.config_path {
        Some(path) => factory.create_from_json(path)?,
        None => factory.create_from_config(EngineConfig::default())?,
    };

    match options.batch {
        Some(expression) => {
            let mut simulation = Simulation::new(engine);
            simulation.add_observer(Box::new(LogObserver));
            run_batch(&mut simulation, &expression)
        }
        None => {
            let console = engine.config().console.clone();
            run_console(Simulation::new(engine), console)
        }
    }
}

fn run_batch(simulation: &mut Simulation, expression: &str) -> Result<(), Box<dyn Error>> {
    let config = simulation.engine().config();
    println!("{} ({:?} / {:?})", config.name, config.mode, config.program);
    println!("==================================================");

    simulation.load_expression(expression)?;
    println!("{}", simulation.snapshot().summary());

    for _ in 0..MAX_BATCH_STEPS {
        let outcome = simulation.step();
        println!("{}", simulation.snapshot().summary());
        if outcome.halted_now || !outcome.advanced {
            break;
        }
    }

    println!("\nMemory:");
    for row in simulation.snapshot().memory {
        println!("  {:>5}  {}", row.address, row.content);
    }
    Ok(())
}
