use std::io::{stdout, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use structopt::StructOpt;
use tracing::{info, Level};

use mysynth::config::Config;
use mysynth::context::AudioContext;
use mysynth::controller::KeyboardController;
use mysynth::engine::params::{ParamChange, Parameters, Waveform};
use mysynth::engine::Engine;
use mysynth::synth::{SynthEvent, SynthSink};
use mysynth::util::log_if_error;

const POLL_INTERVAL: Duration = Duration::from_millis(10);


#[derive(StructOpt)]
struct PlayOpt {
    #[structopt(short = "c", long = "config", parse(from_os_str))]
    /// TOML file with the master volume and an optional key layout.
    config: Option<PathBuf>,

    #[structopt(short = "w", long = "waveform", default_value = "sine")]
    /// One of sine, square, sawtooth, triangle or pulse.
    waveform: Waveform,

    #[structopt(long = "pulse-width", default_value = "0.5")]
    pulse_width: f32,

    #[structopt(long = "additive")]
    /// Play a stack of detuned partials instead of a single oscillator.
    additive: bool,

    #[structopt(long = "partials", default_value = "50")]
    partials: u32,

    #[structopt(long = "spacing", default_value = "50")]
    /// Frequency offset between partials in Hz.
    partial_spacing: f32,

    #[structopt(long = "am")]
    am: bool,

    #[structopt(long = "am-freq", default_value = "250")]
    am_frequency: f32,

    #[structopt(long = "fm")]
    fm: bool,

    #[structopt(long = "fm-freq", default_value = "250")]
    fm_frequency: f32,

    #[structopt(long = "distortion", default_value = "0")]
    /// Distorted FM intensity in [0, 1].
    distorted_fm_intensity: f32,

    #[structopt(long = "lfo")]
    lfo: bool,

    #[structopt(long = "lfo-freq", default_value = "5")]
    lfo_frequency: f32,

    #[structopt(long = "crazy")]
    /// Every key press plays a random white key instead.
    crazy: bool,

    #[structopt(short = "v", parse(from_occurrences))]
    /// Log more, repeat for even more.
    verbose: u8,
}

impl PlayOpt {
    /// The command line parameters as changes on top of the defaults.
    fn parameter_changes(&self) -> Vec<ParamChange> {
        vec![
            ParamChange::Waveform(self.waveform),
            ParamChange::PulseWidth(self.pulse_width),
            ParamChange::Additive(self.additive),
            ParamChange::NumPartials(self.partials),
            ParamChange::PartialSpacing(self.partial_spacing),
            ParamChange::Am(self.am),
            ParamChange::AmFrequency(self.am_frequency),
            ParamChange::Fm(self.fm),
            ParamChange::FmFrequency(self.fm_frequency),
            ParamChange::DistortedFmIntensity(self.distorted_fm_intensity),
            ParamChange::Lfo(self.lfo),
            ParamChange::LfoFrequency(self.lfo_frequency),
            ParamChange::Crazy(self.crazy),
        ]
    }
}

#[derive(StructOpt)]
#[structopt(about = "A polyphonic synthesizer played from the computer keyboard.")]
enum SynthOpt {
    /// List the key layout.
    Keys {
        #[structopt(short = "c", long = "config", parse(from_os_str))]
        config: Option<PathBuf>,
    },

    /// Play the synth.
    Play(PlayOpt),
}


fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_toml(path),
        None => Ok(Config::default()),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Puts the terminal in raw mode for as long as it lives.
struct RawTerminal {
    enhanced: bool,
}

impl RawTerminal {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if enhanced {
            execute!(
                stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        Ok(Self { enhanced })
    }

    /// Whether key release events are reported.
    fn reports_releases(&self) -> bool {
        self.enhanced
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if self.enhanced {
            log_if_error(
                "failed to restore keyboard mode",
                execute!(stdout(), PopKeyboardEnhancementFlags),
            );
        }
        log_if_error("failed to leave raw mode", terminal::disable_raw_mode());
    }
}


fn play(opt: PlayOpt) -> Result<()> {
    let config = load_config(opt.config.as_ref())?;
    let keyboard = config.keyboard();

    let context = AudioContext::open()?;
    let mut engine = Engine::new(context, &keyboard, config.master_volume)?;

    let mut params = Parameters::default();
    for change in opt.parameter_changes() {
        params.apply(change);
        engine.handle_event(SynthEvent::ParamChange(change));
    }

    println!("Playing. Keys Z..M and Q..I are notes, F1-F10 change the sound, Esc quits.");
    stdout().flush()?;

    let term = RawTerminal::enter()?;
    if !term.reports_releases() {
        info!("terminal does not report key releases, notes are held while the key repeats");
    }
    let mut controller = KeyboardController::new(keyboard, params, term.reports_releases());

    loop {
        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if controller
                    .handle_key_event(key, Instant::now(), &mut engine)
                    .is_break()
                {
                    break;
                }
            }
        }

        let now = Instant::now();
        controller.tick(now, &mut engine);
        engine.tick_at(now);
    }

    drop(term);
    engine.shutdown();
    Ok(())
}


fn main() -> Result<()> {
    let opt = SynthOpt::from_args();

    match opt {
        SynthOpt::Keys { config } => {
            let config = load_config(config.as_ref())?;
            println!("Key layout:");
            for key in config.keyboard().keys() {
                let label = char::from_u32(key.key_code).unwrap_or('?');
                println!("{:>4} {:>8.2} Hz  {:?}  key {}", key.note, key.frequency, key.kind, label);
            }
        }

        SynthOpt::Play(playopt) => {
            init_logging(playopt.verbose);
            return play(playopt);
        }
    }

    Ok(())
}
