use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use beadwash::sim::{write_trace_csv, Event, SimRun};
use beadwash::ProtocolEnv;

/// Beadwash CLI
#[derive(Parser)]
#[command(name = "beadwash")]
#[command(version)]
#[command(about = "Liquid-handling protocol registry and deck simulator", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all supported protocols
    ListProtocols,

    /// Describe a protocol by id (e.g., "rna-extraction-magmax")
    Describe {
        /// Protocol id to describe
        id: String,
    },

    /// Run a protocol against the simulated deck and report the trace
    Simulate {
        /// Protocol id (e.g., "rna-extraction-magmax")
        id: String,
        /// Number of sample columns to process
        #[arg(long, default_value_t = 12)]
        columns: usize,
        /// Emit the full trace as CSV to stdout
        #[arg(long)]
        csv: bool,
        /// Write the full trace as JSON to a file
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { simplelog::LevelFilter::Debug } else { simplelog::LevelFilter::Info };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    match cli.command {
        Commands::ListProtocols => {
            for p in beadwash::list_supported_protocols() {
                println!("{}\t{}", p.id, p.description);
            }
        }

        Commands::Describe { id } => cmd_describe(&id)?,

        Commands::Simulate { id, columns, csv, json } => cmd_simulate(&id, columns, csv, json)?,
    }

    Ok(())
}

fn cmd_describe(id: &str) -> anyhow::Result<()> {
    let p = beadwash::get_protocol(id)
        .with_context(|| format!("Unknown protocol: {id}. Use `beadwash list-protocols` to see valid ids."))?;
    println!("id: {}", p.id);
    println!("description: {}", p.description);
    for i in p.instruments {
        println!("instrument: {} ({})", i.name, i.mount);
    }
    for l in p.labware {
        match l.slot {
            Some(slot) => println!("labware: {} — {} (slot {})", l.label, l.name, slot),
            None => println!("labware: {} — {} (on module)", l.label, l.name),
        }
    }
    for t in p.small_tip_racks.iter().chain(p.large_tip_racks) {
        println!("tip rack: {} — {} (slot {})", t.label, t.name, t.slot);
    }
    match p.mag_module_slot {
        Some(slot) => println!("magnetic module: slot {slot}"),
        None => println!("magnetic module: none"),
    }
    match p.temp_module_slot {
        Some(slot) => println!("temperature module: slot {slot}"),
        None => println!("temperature module: none"),
    }
    Ok(())
}

fn cmd_simulate(id: &str, columns: usize, csv: bool, json: Option<PathBuf>) -> anyhow::Result<()> {
    anyhow::ensure!(columns >= 1 && columns <= 12, "columns must be between 1 and 12");
    let info = beadwash::get_protocol(id)
        .with_context(|| format!("Unknown protocol: {id}. Use `beadwash list-protocols` to see valid ids."))?;

    let sim = SimRun::new();
    let mut small = sim.small_pipette();
    let mut large = sim.large_pipette();
    let mut ctl = sim.run_control();
    let mut mag = sim.magnetic_module();
    let mut temp = sim.temperature_module();
    {
        let mut env = ProtocolEnv {
            small: &mut small,
            large: &mut large,
            ctl: &mut ctl,
            mag: &mut mag,
            temp: &mut temp,
            num_cols: columns,
        };
        (info.run)(&mut env).with_context(|| format!("simulation of {} halted", info.id))?;
    }

    let events = sim.events();

    if csv {
        write_trace_csv(&events, std::io::stdout().lock())?;
    } else {
        let pauses = events.iter().filter(|e| matches!(e, Event::Pause { .. })).count();
        let delay_secs: u64 = events
            .iter()
            .map(|e| match e {
                Event::Delay { seconds } => *seconds,
                _ => 0,
            })
            .sum();
        println!("protocol: {}", info.id);
        println!("columns: {columns}");
        println!("steps: {}", events.len());
        println!("small tips used: {}", small.tips_used());
        println!("large tips used: {}", large.tips_used());
        println!("operator pauses: {pauses}");
        println!("timed delays: {delay_secs}s total");
    }

    if let Some(path) = json {
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &events)?;
        eprintln!("trace written to {}", path.display());
    }

    Ok(())
}
