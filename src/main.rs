//! autowiz
//!
//! Records keyboard and mouse activity as a timestamped timeline and
//! replays it with adjustable speed and looping. Recording and playback
//! are stopped with a global hotkey chord (Escape by default).

mod capture;
mod config;
mod data;
mod error;
mod input;
mod logging;
mod playback;
mod storage;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use crossbeam_channel::bounded;
use tracing::{info, trace, warn};

use capture::{HotkeyMatcher, Recorder};
use config::Config;
use input::{InputSource, RdevSink, RdevSource};
use playback::{PlaybackEngine, PlaybackOptions};
use storage::RecordingStore;

fn main() -> Result<()> {
    let _guard = logging::init_logging()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let mut config = Config::load()?;

    match args[0].as_str() {
        "record" => {
            ensure_terms_accepted(&mut config, &args)?;
            let name = first_positional(&args[1..]);
            let armed = args.iter().any(|a| a == "--on-hotkey");
            cmd_record(&config, name.as_deref().unwrap_or(""), armed)
        }
        "play" => {
            ensure_terms_accepted(&mut config, &args)?;
            let name = first_positional(&args[1..])
                .context("Usage: autowiz play NAME [--speed X] [--loop|--no-loop]")?;
            let speed = flag_value(&args, "--speed")?
                .map(|v| {
                    v.parse::<f64>()
                        .with_context(|| format!("Invalid --speed value '{}'", v))
                })
                .transpose()?
                .unwrap_or(config.playback.speed);
            let looped = if args.iter().any(|a| a == "--loop") {
                true
            } else if args.iter().any(|a| a == "--no-loop") {
                false
            } else {
                config.playback.looped
            };
            cmd_play(&config, &name, speed, looped)
        }
        "list" => cmd_list(&config),
        "delete" => {
            let name =
                first_positional(&args[1..]).context("Usage: autowiz delete NAME")?;
            cmd_delete(&config, &name)
        }
        other => {
            print_help();
            bail!("Unknown command '{}'", other);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Start,
    Stop,
}

/// Record global input until the stop chord (or Ctrl+C), then persist.
///
/// With `armed`, capture does not begin until the record chord is pressed.
fn cmd_record(config: &Config, name: &str, armed: bool) -> Result<()> {
    let stop_chord = config.stop_chord()?;
    let source: Arc<dyn InputSource> = Arc::new(RdevSource::new());

    // Hotkeys and Ctrl+C all funnel into one control channel
    let (tx, rx) = bounded::<Signal>(4);
    let stop_tx = tx.clone();
    let _stop_hotkey = HotkeyMatcher::register(source.clone(), stop_chord.clone(), move || {
        let _ = stop_tx.try_send(Signal::Stop);
    });
    let start_tx = tx.clone();
    let _record_hotkey = HotkeyMatcher::register(source.clone(), config.record_chord()?, move || {
        let _ = start_tx.try_send(Signal::Start);
    });
    ctrlc::set_handler(move || {
        let _ = tx.try_send(Signal::Stop);
    })
    .context("Failed to install Ctrl+C handler")?;

    if armed {
        info!(
            "armed: press {} to start recording",
            chord_label(&config.hotkeys.record)
        );
        loop {
            match rx.recv().context("Control channel closed unexpectedly")? {
                Signal::Start => break,
                Signal::Stop => {
                    info!("cancelled before recording started");
                    return Ok(());
                }
            }
        }
    }

    let mut recorder = Recorder::with_stop_filter(Some(stop_chord));
    recorder.start(source.clone());

    info!(
        "recording... press {} (or Ctrl+C) to stop",
        chord_label(&config.hotkeys.stop)
    );
    loop {
        match rx.recv().context("Control channel closed unexpectedly")? {
            Signal::Stop => break,
            // Repeated record-chord presses while active are meaningless
            Signal::Start => {}
        }
    }

    recorder.stop();
    let timeline = recorder.events();
    if timeline.is_empty() {
        warn!("nothing was recorded, not saving");
        return Ok(());
    }

    let store = RecordingStore::new(config.recordings_dir()?)?;
    if !name.is_empty() && store.exists(name) {
        info!("replacing existing recording '{}'", name);
    }
    let saved = store.persist(name, &timeline)?;
    info!(
        "saved recording '{}': {} events, {:.1}s",
        saved,
        timeline.len(),
        timeline.duration()
    );
    Ok(())
}

/// Replay a persisted recording until it completes or the stop chord fires
fn cmd_play(config: &Config, name: &str, speed: f64, looped: bool) -> Result<()> {
    let store = RecordingStore::new(config.recordings_dir()?)?;
    let timeline = Arc::new(store.load(name)?);

    let source: Arc<dyn InputSource> = Arc::new(RdevSource::new());
    let sink = Arc::new(RdevSink::new());
    let mut engine = PlaybackEngine::new();

    let hotkey_stop = engine.stop_handle();
    let _stop_hotkey = HotkeyMatcher::register(source, config.stop_chord()?, move || {
        hotkey_stop.stop();
    });
    let ctrlc_stop = engine.stop_handle();
    ctrlc::set_handler(move || {
        ctrlc_stop.stop();
    })
    .context("Failed to install Ctrl+C handler")?;

    info!(
        "playing '{}' at {}x, loop {}; press {} (or Ctrl+C) to stop",
        name,
        speed,
        if looped { "on" } else { "off" },
        chord_label(&config.hotkeys.stop)
    );

    engine.start(
        timeline,
        sink,
        PlaybackOptions {
            speed,
            looped,
            quantum: config.quantum(),
        },
        Some(Box::new(|percent| trace!("progress {:.1}%", percent))),
    )?;
    engine.join()?;
    info!("playback ended");
    Ok(())
}

fn cmd_list(config: &Config) -> Result<()> {
    let store = RecordingStore::new(config.recordings_dir()?)?;
    let names = store.list()?;
    if names.is_empty() {
        println!("No recordings in {:?}", store.dir());
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn cmd_delete(config: &Config, name: &str) -> Result<()> {
    let store = RecordingStore::new(config.recordings_dir()?)?;
    store.delete(name)?;
    Ok(())
}

/// The usage terms must be acknowledged once before recording or replaying
fn ensure_terms_accepted(config: &mut Config, args: &[String]) -> Result<()> {
    if config.accepted_terms {
        return Ok(());
    }
    if args.iter().any(|a| a == "--accept-terms") {
        config.accept_terms()?;
        info!("usage terms acknowledged");
        return Ok(());
    }
    bail!(
        "autowiz synthesizes real keyboard and mouse input. You are responsible \
         for how it is used; make sure that use complies with applicable rules. \
         Re-run with --accept-terms to acknowledge this once."
    );
}

fn first_positional(args: &[String]) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--speed" {
            // Skip the flag's value
            iter.next();
        } else if !arg.starts_with('-') {
            return Some(arg.clone());
        }
    }
    None
}

fn flag_value(args: &[String], flag: &str) -> Result<Option<String>> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == flag {
            return match iter.next() {
                Some(value) => Ok(Some(value.clone())),
                None => bail!("{} requires a value", flag),
            };
        }
    }
    Ok(None)
}

fn chord_label(names: &[String]) -> String {
    names.join("+")
}

fn print_help() {
    println!("autowiz - record and replay keyboard and mouse activity");
    println!();
    println!("USAGE:");
    println!("    autowiz <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    record [NAME]     Record until the stop hotkey; save under NAME");
    println!("                      (omit NAME for a time-derived one)");
    println!("                      --on-hotkey waits for the record hotkey first");
    println!("    play NAME         Replay the named recording");
    println!("    list              List saved recordings");
    println!("    delete NAME       Delete a saved recording");
    println!();
    println!("OPTIONS:");
    println!("    --speed X         Playback speed factor (default from config)");
    println!("    --loop            Loop playback until stopped");
    println!("    --no-loop         Play a single pass");
    println!("    --accept-terms    Acknowledge the usage terms (stored in config)");
    println!("    -h, --help        Print this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG             Set log level (e.g., debug, info, warn)");
    println!("    AUTOWIZ_LOG_PATH     Override the log directory");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_positional_skips_flags() {
        let args: Vec<String> = ["--loop", "--speed", "2.0", "demo"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(first_positional(&args), Some("demo".to_string()));
    }

    #[test]
    fn test_flag_value() {
        let args: Vec<String> = ["play", "demo", "--speed", "1.5"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            flag_value(&args, "--speed").unwrap(),
            Some("1.5".to_string())
        );
        assert_eq!(flag_value(&args, "--quantum").unwrap(), None);

        let dangling: Vec<String> = ["--speed".to_string()].to_vec();
        assert!(flag_value(&dangling, "--speed").is_err());
    }
}
