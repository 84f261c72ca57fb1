use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use voice_stamp::config::{JobConfig, SPEECH_SPEED_MAX, SPEECH_SPEED_MIN};
use voice_stamp::error::Result;
use voice_stamp::job::Job;
use voice_stamp::process::ToolRunner;
use voice_stamp::tools::Toolchain;

#[derive(Parser)]
#[command(
    name = "voicestamp",
    version,
    about = "Speak the elapsed time into long audio tracks"
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Input audio file(s)
    #[arg(short = 'i', long = "in", num_args = 1.., required_unless_present = "config_save")]
    inputs: Vec<PathBuf>,
    /// Output file, or a directory to write into
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,
    /// Output file name format, e.g. "{name} (voicestamped).{ext}"
    #[arg(long)]
    out_format: Option<String>,
    /// Title announcement format, e.g. "{title} by {artist}"
    #[arg(long)]
    title_format: Option<String>,
    /// Minutes between tick announcements
    #[arg(long)]
    tick_interval: Option<u32>,
    /// Minute of the first tick announcement
    #[arg(long)]
    tick_offset: Option<u32>,
    /// Added to every spoken minute value
    #[arg(long)]
    tick_add: Option<u32>,
    /// Tick announcement format, e.g. "{minutes} minutes" (empty disables ticks)
    #[arg(long)]
    tick_format: Option<String>,
    /// Speech loudness relative to the music (1.0 = same RMS amplitude)
    #[arg(long)]
    speech_volume: Option<f64>,
    /// Speech speed in words per minute
    #[arg(
        long,
        value_parser = clap::value_parser!(u32)
            .range(SPEECH_SPEED_MIN as i64..=SPEECH_SPEED_MAX as i64)
    )]
    speech_speed: Option<u32>,
    /// Load options from this TOML file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
    /// Save the effective options to this TOML file
    #[arg(long)]
    config_save: Option<PathBuf>,
    /// Report what would be done without writing anything
    #[arg(long)]
    dry_run: bool,
    /// Overwrite existing output files
    #[arg(short, long)]
    force: bool,
    /// Log every step
    #[arg(short, long)]
    verbose: bool,
    /// Stop at the first error and print its full chain
    #[arg(short, long)]
    debug: bool,
    /// Keep the working directory of each job
    #[arg(long)]
    no_cleanup: bool,
}

impl Cli {
    /// Overlay command-line values onto `config`.
    fn apply(&self, config: &mut JobConfig) {
        if let Some(v) = &self.out_format {
            config.file_out_format = v.clone();
        }
        if let Some(v) = &self.title_format {
            config.title_format = v.clone();
        }
        if let Some(v) = &self.tick_format {
            config.tick_format = v.clone();
        }
        if let Some(v) = self.tick_interval {
            config.tick_interval = v;
        }
        if let Some(v) = self.tick_offset {
            config.tick_offset = v;
        }
        if let Some(v) = self.tick_add {
            config.tick_add = v;
        }
        if let Some(v) = self.speech_volume {
            config.speech_volume_factor = v;
        }
        if let Some(v) = self.speech_speed {
            config.speech_speed = v;
        }
        config.file_out = self.out.clone();
        config.force_overwrite = self.force;
        config.dry_run_mode = self.dry_run;
        config.debug = self.debug;
        config.no_cleanup = self.no_cleanup;
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose || cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .init();
}

/// Number of failed jobs, or the first error in debug mode.
fn run(cli: &Cli) -> Result<usize> {
    let mut config = JobConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    if let Some(path) = &cli.config_save {
        config.save(path)?;
        log::info!("Saved configuration to \"{}\"", path.display());
    }

    if config.dry_run_mode {
        log::info!("Dry run: nothing will be written");
    }

    let tools = Toolchain::system(&config.tools, ToolRunner::new(config.tool_timeout()));
    let mut job = Job::new(&config, &tools);

    let mut failed = 0;
    for input in &cli.inputs {
        if !job.voice_stamp(input)? {
            failed += 1;
        }
    }
    if failed > 0 {
        log::error!("{} of {} file(s) failed", failed, cli.inputs.len());
    }
    Ok(failed)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
