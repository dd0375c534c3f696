// AIconPack command-line entry point
use aiconpack_lib::commands::{icons::generate_icon, packaging::pack_script};
use aiconpack_lib::models::{
    AppConfig, CompressLevel, GenerationRequest, IconArtifact, ImageModel, OutputFormat, PackagingOptions,
    PipelineEvent, Resolution,
};
use aiconpack_lib::{BuildPipeline, ConfigStore, ResolveStrategy};
use clap::{Parser, Subcommand, ValueEnum};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "aiconpack")]
#[command(version, about = "AI icon generation and one-click PyInstaller packaging", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate icons from a text prompt
    Generate {
        #[arg(long)]
        prompt: String,
        /// Prompt template key (flat, glyph, 3d, pixel, ios or a configured one)
        #[arg(long)]
        template: Option<String>,
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        #[arg(long)]
        size: Option<Resolution>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long, default_value_t = 1)]
        count: u32,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        prefix: Option<String>,
        /// Also write a 256x256 .ico next to each PNG
        #[arg(long)]
        ico: bool,
        /// PNG compression level 0-9
        #[arg(long)]
        compress: Option<u8>,
    },
    /// Package a Python script into an executable
    Pack(PackArgs),
    /// Inspect the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API key masked)
    Show,
    /// Print the config file location
    Path,
}

#[derive(Clone, Copy, ValueEnum)]
enum DepsMode {
    Static,
    Infer,
}

#[derive(clap::Args)]
struct PackArgs {
    script: PathBuf,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    icon: Option<PathBuf>,
    /// Build a one-folder bundle instead of a single file
    #[arg(long)]
    onedir: bool,
    #[arg(long)]
    no_console: bool,
    #[arg(long)]
    no_clean: bool,
    #[arg(long)]
    debug: bool,
    #[arg(long)]
    strip: bool,
    #[arg(long)]
    noupx: bool,
    #[arg(long)]
    upx_dir: Option<PathBuf>,
    #[arg(long = "hidden-import")]
    hidden_imports: Vec<String>,
    #[arg(long = "add-data")]
    add_data: Vec<String>,
    #[arg(long = "add-binary")]
    add_binary: Vec<String>,
    #[arg(long = "runtime-hook")]
    runtime_hooks: Vec<PathBuf>,
    #[arg(long = "exclude-module")]
    exclude_modules: Vec<String>,
    #[arg(long = "collect-all")]
    collect_all: Vec<String>,
    #[arg(long = "paths")]
    paths: Vec<PathBuf>,
    #[arg(long)]
    distpath: Option<PathBuf>,
    #[arg(long)]
    workpath: Option<PathBuf>,
    #[arg(long)]
    specpath: Option<PathBuf>,
    #[arg(long)]
    version_file: Option<PathBuf>,
    #[arg(long)]
    osx_bundle_identifier: Option<String>,
    #[arg(long, value_enum, default_value = "static")]
    deps: DepsMode,
    /// Remove the build directory and .spec file after a successful build
    #[arg(long)]
    keep_only_exe: bool,
    /// Passed to PyInstaller verbatim
    #[arg(last = true)]
    extra: Vec<String>,
}

impl PackArgs {
    fn into_options(self) -> PackagingOptions {
        let mut opts = PackagingOptions::new(self.script);
        opts.name = self.name;
        opts.icon = self.icon;
        opts.onefile = !self.onedir;
        opts.no_console = self.no_console;
        opts.clean = !self.no_clean;
        opts.debug = self.debug;
        opts.strip = self.strip;
        opts.no_upx = self.noupx;
        opts.upx_dir = self.upx_dir;
        opts.hidden_imports = self.hidden_imports;
        opts.add_data = self.add_data;
        opts.add_binary = self.add_binary;
        opts.runtime_hooks = self.runtime_hooks;
        opts.exclude_modules = self.exclude_modules;
        opts.collect_all = self.collect_all;
        opts.paths = self.paths;
        opts.dist_dir = self.distpath;
        opts.work_dir = self.workpath;
        opts.spec_dir = self.specpath;
        opts.version_file = self.version_file;
        opts.osx_bundle_identifier = self.osx_bundle_identifier;
        opts.extra_args = self.extra;
        opts
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = match ConfigStore::open_default() {
        Ok(store) => store,
        Err(e) => {
            error!("Could not load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = store.current().clone();

    let outcome = match cli.command {
        Commands::Generate {
            prompt,
            template,
            keywords,
            size,
            model,
            count,
            out,
            prefix,
            ico,
            compress,
        } => {
            let compress_level = match compress.map(CompressLevel::new).transpose() {
                Ok(level) => level,
                Err(e) => {
                    eprintln!("{}", e);
                    return ExitCode::FAILURE;
                }
            };
            let mut request = GenerationRequest::new(
                prompt,
                OutputFormat::Path {
                    output_dir: out.unwrap_or_else(|| config.icon_output_dir()),
                    filename_prefix: prefix,
                    compress_level,
                    write_ico: ico,
                },
            );
            request.template = template;
            request.keywords = keywords;
            request.resolution = size.unwrap_or_default();
            request.model = ImageModel::from(model.unwrap_or_else(|| config.image_model.clone()));
            request.count = count;
            run_generate(config, request).await
        }
        Commands::Pack(args) => run_pack(config, args).await,
        Commands::Config { action } => show_config(&store, action),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}

async fn run_generate(config: AppConfig, request: GenerationRequest) -> Result<(), String> {
    for artifact in generate_icon(config, request).await? {
        if let IconArtifact::Path { png, ico } = artifact {
            println!("{}", png.display());
            if let Some(ico) = ico {
                println!("{}", ico.display());
            }
        }
    }
    Ok(())
}

async fn run_pack(config: AppConfig, args: PackArgs) -> Result<(), String> {
    let strategy = match args.deps {
        DepsMode::Static => ResolveStrategy::Static,
        DepsMode::Infer => ResolveStrategy::Inference,
    };
    let pipeline = BuildPipeline::new(&config, strategy).keep_only_exe(args.keep_only_exe);

    let (tx, mut rx) = mpsc::channel::<PipelineEvent>(100);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::Stage { state, .. } => println!("==> {}", state.label()),
                PipelineEvent::Status { message, .. } => println!("    {}", message),
                PipelineEvent::Finished { .. } => {}
            }
        }
    });

    let report = pack_script(pipeline, args.into_options(), tx).await;
    let _ = printer.await;
    let report = report?;

    println!("{}", report.status);
    println!("Log: {}", report.log_path.display());
    if report.succeeded() {
        Ok(())
    } else {
        Err(format!("Build {} failed", report.job_id))
    }
}

fn show_config(store: &ConfigStore, action: ConfigAction) -> Result<(), String> {
    match action {
        ConfigAction::Path => println!("{}", store.path().display()),
        ConfigAction::Show => {
            let mut shown = store.current().clone();
            if shown.api_key().is_some() {
                shown.api_key = Some("********".to_string());
            }
            let text = serde_json::to_string_pretty(&shown).map_err(|e| e.to_string())?;
            println!("{}", text);
        }
    }
    Ok(())
}
