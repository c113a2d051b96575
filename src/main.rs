use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use studiomimic::{
    build_prompt,
    io::{save_output, SaveContext},
    AspectRatio, ClientConfig, Preset, ProviderKind, SourceImage, StudioCfg, VariationOrchestrator,
};

#[derive(Parser)]
#[command(name = "studiomimic", about = "Studio-style AI variations of a photo")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Generate variations of one image.
    Generate(GenerateArgs),
    /// List presets and their options.
    Presets,
}

#[derive(Args)]
struct GenerateArgs {
    /// Source photo (png, jpeg, webp).
    #[arg(long)]
    image: PathBuf,
    /// YAML run configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// product | portrait | cartoon | gift_hamper (anything else: generic enhance)
    #[arg(long)]
    preset: Option<String>,
    #[arg(long)]
    aspect: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    /// Preset option as key=value, repeatable (e.g. lighting=Spotlight).
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
    #[arg(long)]
    count: Option<usize>,
    /// gemini | mock
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
}

fn pick_out_dir(configured: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = configured { return dir; }
    if let Ok(dir) = std::env::var("STUDIOMIMIC_OUT_DIR") { return PathBuf::from(dir); }
    let ts = Utc::now().format("%Y%m%d_%H%M%S");
    PathBuf::from("out").join(format!("batch-{}", ts))
}

fn print_presets() {
    println!("aspect ratios: {}", AspectRatio::ALL.map(|a| a.as_str()).join(", "));
    for preset in Preset::SELECTABLE {
        println!("\n{} ({})", preset.label(), preset.as_str());
        for field in preset.option_fields() {
            println!("  {:<16} default {:?}", field.name, field.default);
            println!("  {:<16} choices: {}", "", field.choices.join(", "));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().cmd {
        Cmd::Presets => {
            print_presets();
            Ok(())
        }
        Cmd::Generate(args) => generate(args).await,
    }
}

async fn generate(args: GenerateArgs) -> Result<()> {
    let GenerateArgs { image, config, preset, aspect, notes, set, count, provider, out } = args;

    let mut cfg = match &config {
        Some(path) => StudioCfg::load(path).await?,
        None => StudioCfg::default(),
    };

    if let Some(p) = provider {
        cfg.provider.kind = match p.as_str() {
            "gemini" => ProviderKind::Gemini,
            "mock" => ProviderKind::Mock,
            other => bail!("unknown provider {other:?} (expected gemini or mock)"),
        };
    }
    if let Some(p) = preset {
        cfg.settings.switch_preset(Preset::parse(&p));
    }
    if let Some(a) = aspect {
        cfg.settings.aspect_ratio = a.parse()?;
    }
    if let Some(n) = notes {
        cfg.settings.additional_notes = n;
    }
    for kv in &set {
        let (k, v) = kv.split_once('=').with_context(|| format!("--set expects KEY=VALUE, got {kv:?}"))?;
        if !cfg.settings.set_option(k.trim(), v.trim())? {
            tracing::warn!(option = k, preset = %cfg.settings.preset(), "option not used by this preset");
        }
    }
    let count = count.unwrap_or(cfg.count);

    let source = SourceImage::from_path(&image)
        .await
        .with_context(|| format!("failed to load {}", image.display()))?;

    let client = ClientConfig::from_env(&cfg.provider);
    let orchestrator = VariationOrchestrator::new(cfg.provider.build_transport()?, client);

    let report = orchestrator.generate_batch(&source, &cfg.settings, count).await?;

    let out_dir = pick_out_dir(out.or(cfg.out_dir.clone()));
    let prompt = build_prompt(&cfg.settings);
    let ctx = SaveContext { preset: cfg.settings.preset(), prompt: &prompt, model: orchestrator.model() };
    for img in &report.images {
        let path = save_output(&out_dir, img, &ctx).await?;
        println!("{}  seed={}", path.display(), img.seed);
    }
    if report.dropped() > 0 {
        tracing::info!(dropped = report.dropped(), requested = report.requested, "some variations were not produced");
    }
    println!("Generated {} of {} variations in {}", report.images.len(), report.requested, out_dir.display());
    Ok(())
}
