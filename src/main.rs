use clap::{Parser, Subcommand, ValueEnum};
use planemap::annot::{BodyAnnotations, parse_annotations_json};
use planemap::export::{BodyAnnot, ImportOpts, read_export, write_export};
use planemap::fmap::UnmappedPolicy;
use planemap::hierarchy::{BuildOpts, build};
use planemap::im::io::{BitDepth, load_gray_stack, load_stack, save_stack};
use planemap::reader::Refine;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "planemap", about = "Plane-local superpixel hierarchies for proofreading", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log progress (honours RUST_LOG)
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all logging
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the hierarchy from superpixel and body PNG stacks and write an export directory
    Export {
        /// Directory of superpixel PNG planes
        #[arg(long)]
        superpixels: PathBuf,

        /// Directory of body PNG planes
        #[arg(long)]
        bodies: PathBuf,

        /// Directory of 8-bit grayscale PNG planes to copy into the export
        #[arg(long)]
        gray: Option<PathBuf>,

        /// Body annotation JSON to write instead of computed orphans / non-traversing bodies
        #[arg(long)]
        annotations: Option<PathBuf>,

        /// Black out per-plane components smaller than this
        #[arg(long, default_value_t = 0)]
        min_size: usize,

        /// Relabel each plane by connected components
        #[arg(long)]
        connected: bool,

        /// Output export directory
        out: PathBuf,
    },

    /// Reconstruct a body volume from an export directory
    Import {
        /// Export directory
        dir: PathBuf,

        /// Output directory for body PNG planes
        #[arg(long)]
        out: PathBuf,

        /// Pixel depth of the written planes
        #[arg(long, value_enum, default_value_t = Depth::Rgba)]
        depth: Depth,

        /// Grow decoded bodies into background
        #[arg(long)]
        refine: bool,

        /// Fail on ids missing from the tables instead of decoding them to background
        #[arg(long)]
        strict: bool,

        /// Print the bodies annotated as glia
        #[arg(long)]
        glia: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Depth {
    #[value(name = "8")]
    Eight,
    #[value(name = "16")]
    Sixteen,
    Rgba,
}

impl From<Depth> for BitDepth {
    fn from(depth: Depth) -> Self {
        match depth {
            Depth::Eight => BitDepth::Eight,
            Depth::Sixteen => BitDepth::Sixteen,
            Depth::Rgba => BitDepth::Rgba,
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> planemap::Result<()> {
    match cli.command {
        Commands::Export {
            superpixels,
            bodies,
            gray,
            annotations,
            min_size,
            connected,
            out,
        } => {
            let sps = load_stack(&superpixels)?;
            let bodies = load_stack(&bodies)?;
            let gray = gray.as_deref().map(load_gray_stack).transpose()?;
            let record: Option<BodyAnnotations> = annotations
                .as_deref()
                .map(|p| -> planemap::Result<_> {
                    Ok(parse_annotations_json(&std::fs::read_to_string(p)?)?)
                })
                .transpose()?;

            let hier = build(&sps, &bodies, &BuildOpts { min_size, connected }, None)?;
            let annot = match &record {
                Some(record) => BodyAnnot::Record(record),
                None => BodyAnnot::FromBodies(&bodies),
            };
            write_export(&out, &hier, gray.as_ref(), Some(annot))?;
            Ok(())
        }

        Commands::Import {
            dir,
            out,
            depth,
            refine,
            strict,
            glia,
        } => {
            let opts = ImportOpts {
                refine: if refine { Refine::Uniform } else { Refine::Off },
                policy: if strict {
                    UnmappedPolicy::Strict
                } else {
                    UnmappedPolicy::Lenient
                },
                get_glia: glia,
            };
            let import = read_export(&dir, &opts)?;
            save_stack(&import.bodies, &out, "body", depth.into())?;

            if let Some(glia) = import.glia {
                for body in glia {
                    println!("{body}");
                }
            }
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
