//! beatword — plays one headless session with the simulated player.
//!
//! By default time is simulated and the session finishes instantly. With
//! `--realtime` the clock follows the wall clock (or the backing track, when
//! one loads) and the loop sleeps between ticks.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use beatword::audio::CpalFactory;
use beatword::autoplay::AutoPlayer;
use beatword::clock::{BeatClock, ManualTime, TimeSource};
use beatword::config::{ConfigError, GameConfig};
use beatword::run::{LogObserver, RunState, RunStatus, SessionSetup, WordItem};

/// Give up on a simulated session after this much game time.
const MAX_SIMULATED_MS: f64 = 30.0 * 60.0 * 1000.0;

const BUILTIN_WORDS: &[&str] = &[
    "pulse", "drum", "beat", "tempo", "rhythm", "groove", "swing", "snare", "kick", "hat",
    "bass", "chord", "verse", "chorus", "bridge", "synth", "loop", "sample", "reverb", "delay",
    "filter", "sweep", "drop", "build", "break", "fill", "riff", "outro",
];

/// Play a word rhythm session with a simulated player
#[derive(Parser, Debug)]
#[clap(version, about)]
struct Cli {
    /// word list, one word per line (defaults to a built-in list)
    #[clap(short = 'w', long)]
    words: Option<PathBuf>,

    /// backing track: a WAV path or an http(s) URL
    #[clap(short = 'a', long)]
    audio: Option<String>,

    /// config file (defaults to ~/.beatword/config.yaml)
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// seed for the simulated player's timing jitter
    #[clap(long, default_value_t = 42)]
    seed: u64,

    /// maximum distance of a simulated hit from its beat
    #[clap(long, default_value_t = 40.0)]
    jitter_ms: f64,

    /// run against the wall clock instead of simulated time
    #[clap(long)]
    realtime: bool,

    /// backing track volume, 0.0 to 1.0 (overrides the config)
    #[clap(long)]
    volume: Option<f32>,

    /// identifier carried into the result
    #[clap(long, default_value = "local")]
    session_id: String,
}

fn load_config(path: Option<&Path>) -> Result<GameConfig, ConfigError> {
    match path {
        Some(path) => GameConfig::load_from(path),
        None => Ok(GameConfig::load()),
    }
}

fn load_words(path: Option<&Path>) -> std::io::Result<Vec<WordItem>> {
    let Some(path) = path else {
        return Ok(BUILTIN_WORDS.iter().copied().map(WordItem::from).collect());
    };
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(WordItem::from)
        .collect())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            std::process::exit(1);
        }
    };
    if let Some(volume) = cli.volume {
        config.volume = volume;
        if let Err(e) = config.validate() {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
    let words = match load_words(cli.words.as_deref()) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("failed to read word list: {e}");
            std::process::exit(1);
        }
    };

    let simulated = (!cli.realtime).then(|| Arc::new(ManualTime::new(0.0)));
    let clock = match &simulated {
        Some(time) => BeatClock::with_sources(time.clone(), Box::new(CpalFactory)),
        None => BeatClock::new(),
    };
    let stages = config.stages.clone();
    let mut run = RunState::new(clock, config).with_observer(LogObserver);
    let tick_interval = run.tick_interval();

    let mut setup = SessionSetup::new(cli.session_id.clone(), words, stages);
    match (&cli.audio, cli.realtime) {
        (Some(source), true) => setup = setup.with_audio(source.clone()),
        (Some(_), false) => log::warn!("--audio needs --realtime; playing without music"),
        (None, _) => {}
    }
    if let Err(e) = run.init_session(setup) {
        eprintln!("cannot start session: {e}");
        std::process::exit(1);
    }
    if cli.realtime
        && cli.audio.is_some()
        && !run.clock_mut().settle_audio_load(Duration::from_secs(10))
    {
        log::warn!("backing track unavailable; using the software timer");
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        let ticks = run.clock().tick_handle();
        if let Err(e) = ctrlc::set_handler(move || {
            running.store(false, Ordering::Release);
            ticks.cancel();
        }) {
            log::warn!("cannot install Ctrl-C handler: {e}");
        }
    }

    let mut player = AutoPlayer::new(cli.seed, cli.jitter_ms);
    log::info!(
        "simulated player: seed {}, jitter up to {} ms",
        cli.seed,
        player.jitter_ms()
    );
    let started = if run.config().countdown_ms.is_some() {
        run.begin_countdown()
    } else {
        run.start()
    };
    if let Err(e) = started {
        eprintln!("cannot start session: {e}");
        std::process::exit(1);
    }

    while running.load(Ordering::Acquire) && run.status() != RunStatus::Finished {
        match &simulated {
            Some(time) => {
                time.advance_ms(tick_interval.as_secs_f64() * 1000.0);
                if time.now_ms() > MAX_SIMULATED_MS {
                    log::warn!("simulated session ran too long; stopping");
                    break;
                }
            }
            None => thread::sleep(tick_interval),
        }
        run.tick();
        if let Some(Err(e)) = player.poll(&mut run) {
            log::warn!("simulated hit rejected: {e}");
        }
    }

    if run.status() != RunStatus::Finished {
        log::info!("session interrupted at stage {}", run.stage_index());
    }
    if let Some(result) = run.compute_result() {
        match serde_yaml::to_string(&result) {
            Ok(yaml) => print!("{yaml}"),
            Err(e) => eprintln!("failed to serialize result: {e}"),
        }
    }
    run.dispose();
}
