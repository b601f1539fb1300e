use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use sample_chopper::session::Session;
use sample_chopper::{
    analysis, audio, parse_sample_rate, AffixPosition, NamingDirective, OnsetSettings,
    PipelineConfig, SilenceSettings,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the onset times detected in a recording
    Detect {
        input: PathBuf,
        #[command(flatten)]
        onsets: OnsetArgs,
    },
    /// Chop a recording and save the pieces through the pipeline
    Chop(ChopArgs),
}

#[derive(Args)]
struct OnsetArgs {
    #[arg(long, default_value_t = 0.3)]
    min_gap: f64,
    #[arg(long, default_value_t = 0.5)]
    max_gap: f64,
    #[arg(long, default_value_t = 0.1)]
    threshold: f32,
}

impl OnsetArgs {
    fn settings(&self) -> OnsetSettings {
        OnsetSettings {
            min_gap: self.min_gap,
            max_gap: self.max_gap,
            threshold: self.threshold,
        }
    }
}

#[derive(Args)]
struct ChopArgs {
    input: PathBuf,
    #[arg(short, long)]
    out: PathBuf,
    /// Comma separated marker times in seconds; detected when omitted
    #[arg(long, value_delimiter = ',')]
    markers: Option<Vec<f64>>,
    #[command(flatten)]
    onsets: OnsetArgs,
    /// Extra samples to save alongside the chops
    #[arg(long = "sample")]
    samples: Vec<PathBuf>,
    /// Tag a sample by its file name, as name=tag
    #[arg(long = "tag")]
    tags: Vec<String>,

    #[arg(long)]
    pack_name: Option<String>,
    #[arg(long, default_value = "prefix")]
    pack_name_position: AffixPosition,
    #[arg(long)]
    pack_folder: bool,
    #[arg(long)]
    affix_pack_name: bool,
    #[arg(long)]
    signature: Option<String>,
    #[arg(long, default_value = "prefix")]
    signature_position: AffixPosition,
    #[arg(long)]
    sign_pack: bool,
    #[arg(long)]
    sign_samples: bool,
    #[arg(long)]
    route_by_tag: bool,

    #[arg(long)]
    crop_silence: bool,
    #[arg(long, default_value_t = -40.0, allow_hyphen_values = true)]
    silence_db: f32,
    #[arg(long, default_value_t = 0.0)]
    fade_in: f64,
    #[arg(long, default_value_t = 0.0)]
    fade_out: f64,
    #[arg(long, default_value_t = 0.5)]
    silence_buffer: f64,
    #[arg(long)]
    normalize: bool,
    #[arg(long, default_value_t = -3.0, allow_hyphen_values = true)]
    target_db: f32,
    #[arg(long, default_value = "44100")]
    sample_rate: String,
}

impl ChopArgs {
    fn pipeline(&self) -> anyhow::Result<PipelineConfig> {
        Ok(PipelineConfig {
            crop_silence: self.crop_silence,
            silence: SilenceSettings {
                threshold_db: self.silence_db,
                fade_in: self.fade_in,
                fade_out: self.fade_out,
                buffer_seconds: self.silence_buffer,
            },
            normalize: self.normalize,
            target_db: self.target_db,
            target_sample_rate: parse_sample_rate(&self.sample_rate)?,
        })
    }

    fn naming(&self) -> NamingDirective {
        NamingDirective {
            pack_name: self.pack_name.clone(),
            pack_name_position: self.pack_name_position,
            create_pack_folder: self.pack_folder,
            affix_pack_name: self.affix_pack_name,
            signature: self.signature.clone(),
            signature_position: self.signature_position,
            sign_pack: self.sign_pack,
            sign_samples: self.sign_samples,
            route_by_tag: self.route_by_tag,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Detect { input, onsets } => detect(input, &onsets.settings()),
        Command::Chop(args) => chop(&args),
    }
}

fn detect(input: PathBuf, settings: &OnsetSettings) -> anyhow::Result<()> {
    let buffer = audio::load_audio_file(&input)?;
    println!(
        "Loaded {:?}: {:.2}s at {} Hz",
        input,
        buffer.duration(),
        buffer.sample_rate()
    );
    let onsets = analysis::detect_onsets(&buffer, settings);
    if onsets.is_empty() {
        println!("No onsets detected.");
    }
    for (i, t) in onsets.iter().enumerate() {
        println!("{:3}. {:.3}s", i + 1, t);
    }
    Ok(())
}

fn chop(args: &ChopArgs) -> anyhow::Result<()> {
    let config = args.pipeline()?;
    let directive = args.naming();
    let mut session = Session::new()?;

    for (path, result) in args.samples.iter().zip(session.load_samples(&args.samples[..])) {
        if let Err(e) = result {
            eprintln!("Skipping {:?}: {}", path, e);
        }
    }

    session
        .open_source(&args.input)
        .with_context(|| format!("failed to open {:?}", args.input))?;
    match &args.markers {
        Some(times) => session.set_markers(times.iter().copied())?,
        None => {
            let found = session.detect_onsets(&args.onsets.settings())?;
            println!("Detected {} onset(s)", found.len());
        }
    }
    let chopped = session.chop()?;
    println!("Chopped into {} segment(s)", chopped.len());

    for spec in &args.tags {
        let Some((name, tag)) = spec.split_once('=') else {
            bail!("--tag expects name=tag, got '{}'", spec);
        };
        let id = session
            .catalog()
            .find_by_name(name.trim())
            .map(|r| r.id)
            .with_context(|| format!("no sample named '{}'", name.trim()))?;
        session.set_tag(id, tag)?;
    }

    let report = session.save(&args.out, &config, &directive)?;
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(path) => println!("{} -> {:?}", outcome.name, path),
            Err(e) => println!("{} FAILED: {}", outcome.name, e),
        }
        for warning in &outcome.warnings {
            println!("  warning: {}", warning);
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        bail!("{} of {} sample(s) failed to save", failed, report.outcomes.len());
    }
    println!("Export complete.");
    Ok(())
}
