//! jigctl: bring-up and debugging tool for switching jigs
//!
//! Loads a JSON jig file (mux group plus address handlers), wires it into a
//! [`JigDriver`] and runs one command against it.

mod jig_file;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jig_handlers::{build_handlers, SimulatedHandler, SimulatedLog};
use jig_mux::{AddressHandler, JigDriver, MuxBundle, MuxGroup, Pin, PinSet, UpdateSink};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jig_file::JigFile;

#[derive(Debug, Parser)]
#[command(author, version, about = "Drive the signal switching of a test jig", long_about = None)]
struct Cli {
    /// Jig definition file (JSON)
    #[arg(short, long, default_value = "jig.json")]
    jig: PathBuf,

    /// Replace every handler with a simulated one and print what would be written
    #[arg(long)]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List every mux and the pins of each of its signals
    Signals,
    /// Switch muxes in a single hardware update, e.g. `dmm=Vout sel=TP2`
    Switch {
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,
    },
    /// Reset every mux and turn every pin off
    Reset,
    /// Assert exactly these raw pins, bypassing the muxes
    SetPins { pins: Vec<String> },
    /// Check that the jig file builds and every mux pin has a handler
    Validate,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(mux, signal)| (mux.to_string(), signal.to_string()))
        .ok_or_else(|| format!("expected MUX=SIGNAL, got {s:?}"))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jigctl=info,jig_mux=info,jig_handlers=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let jig = JigFile::load(&cli.jig)?;

    if let Commands::Signals = cli.command {
        return print_signals(&jig);
    }

    let (handlers, logs) = if cli.simulate {
        simulated_handlers(&jig)
    } else {
        (build_handlers(&jig.handlers)?, Vec::new())
    };

    let mut driver = JigDriver::new(handlers, |sink| jig.group.build(sink))
        .with_context(|| format!("failed to build jig {}", jig.group.name))?;

    match cli.command {
        Commands::Signals => {}
        Commands::Validate => {
            println!(
                "{}: {} muxes, {} pins, all covered",
                jig.group.name,
                driver.mux().len(),
                driver.all_pins().len()
            );
        }
        Commands::Switch { assignments } => {
            switch(&mut driver, &assignments)?;
            print_state(&driver);
        }
        Commands::Reset => {
            driver.reset()?;
            print_state(&driver);
        }
        Commands::SetPins { pins } => {
            let pins: PinSet = pins.into_iter().collect();
            driver.debug_set_pins(pins)?;
            print_state(&driver);
        }
    }

    for (name, log) in logs {
        for (i, write) in log.writes().iter().enumerate() {
            println!("[sim] {name} write {}: {write}", i + 1);
        }
    }

    driver.close().context("failed to close handlers")?;
    Ok(())
}

fn simulated_handlers(jig: &JigFile) -> (Vec<Box<dyn AddressHandler>>, Vec<(String, SimulatedLog)>) {
    jig.handlers
        .iter()
        .map(|config| {
            let handler = SimulatedHandler::new(config.name(), config.pins().to_vec());
            let log = (config.name().to_string(), handler.log());
            (Box::new(handler) as Box<dyn AddressHandler>, log)
        })
        .unzip()
}

fn print_signals(jig: &JigFile) -> Result<()> {
    let group = jig.group.build(UpdateSink::log())?;
    for mux in group.muxes() {
        let pins: Vec<&str> = mux.pin_list().iter().map(Pin::as_str).collect();
        println!("{} ({:?}, pins {})", mux.name(), mux.policy(), pins.join(" "));
        for (signal, pins) in mux.signal_map() {
            println!("  {:<20} {}", signal.to_string(), pins);
        }
    }
    Ok(())
}

/// Queue every assignment, dispatching them together with the last one
fn switch(driver: &mut JigDriver<MuxBundle>, assignments: &[(String, String)]) -> Result<()> {
    for (mux, signal) in assignments {
        let Some(found) = driver.mux().get(mux) else {
            bail!("jig has no mux named {mux:?}");
        };
        if found.pins_for(signal).is_none() {
            bail!("mux {mux} has no signal {signal:?}");
        }
    }

    let last = assignments.len().saturating_sub(1);
    for (i, (mux, signal)) in assignments.iter().enumerate() {
        info!(mux = %mux, signal = %signal, "switching");
        let mux = driver
            .mux_mut()
            .get_mut(mux)
            .with_context(|| format!("jig has no mux named {mux:?}"))?;
        mux.multiplex(signal.as_str(), i == last)?;
    }
    Ok(())
}

fn print_state(driver: &JigDriver<MuxBundle>) {
    for (mux, signal) in driver.all_mux_signals() {
        println!("{:<16} {}", mux, signal);
    }
    println!("active pins: {}", driver.active_pins());
}
