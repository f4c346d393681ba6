//! fma-export - FMA model export tool
//!
//! Converts OBJ scenes to memory-mappable FMA model files (.fma) and writes
//! FMA material files (.mtl.fma).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use fma_export::fma_common::{material_file_name, MaterialRecord, FMA_MODEL_EXT};
use fma_export::manifest::{self, Manifest, DEFAULT_MANIFEST};
use fma_export::options::DEFAULT_MATERIAL_COMMENT;
use fma_export::output::write_atomic;
use fma_export::{
    export_scene, load_obj, parse_slot, validate_material_name, ExportOptions, GeometryMode,
};

#[derive(Parser)]
#[command(name = "fma-export")]
#[command(about = "FMA model export tool")]
#[command(version)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export an OBJ scene to an .fma model
    Model {
        /// Input OBJ file
        input: PathBuf,

        /// Output .fma file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Index layout: triangle-fan or triangle-list
        #[arg(short, long, default_value = "triangle-fan")]
        geometry: GeometryMode,

        /// Skip writing the model file
        #[arg(long)]
        no_model: bool,

        /// Also write one .mtl.fma file per material next to the model
        #[arg(long)]
        materials: bool,

        /// Comment stored after the header
        #[arg(long)]
        comment: Option<String>,
    },

    /// Write a single material file
    Material {
        /// Material name
        name: String,

        /// Output .mtl.fma file (default: <name>.mtl.fma)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Diffuse slot: 0xRRGGBBAA color or texture path
        #[arg(long)]
        diffuse: Option<String>,

        /// Normal slot: 0xRRGGBBAA color or texture path
        #[arg(long)]
        normal: Option<String>,

        /// Specular slot: 0xRRGGBBAA color or texture path
        #[arg(long)]
        specular: Option<String>,

        /// Emissive slot: 0xRRGGBBAA color or texture path
        #[arg(long)]
        emissive: Option<String>,

        #[arg(long)]
        transparent: bool,

        #[arg(long)]
        specular_exponent: Option<f32>,

        /// Comment stored after the header
        #[arg(long)]
        comment: Option<String>,
    },

    /// Build everything described by a manifest file
    Build {
        /// Path to fma-export.toml manifest
        #[arg(default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,

        /// Model output file (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate manifest without building
    Check {
        /// Path to fma-export.toml manifest
        #[arg(default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Model {
            input,
            output,
            geometry,
            no_model,
            materials,
            comment,
        } => {
            if no_model && !materials {
                anyhow::bail!("Nothing to do: --no-model without --materials");
            }
            let output = output.unwrap_or_else(|| input.with_extension(FMA_MODEL_EXT));
            tracing::info!("Converting {:?} -> {:?}", input, output);

            let mut options = ExportOptions {
                geometry,
                write_model: !no_model,
                write_materials: materials,
                ..Default::default()
            };
            if let Some(comment) = comment {
                options.model_comment = comment.into_bytes();
            }

            let scene = load_obj(&input)?;
            export_scene(&scene, &output, &options)?;
            tracing::info!("Done!");
        }

        Commands::Material {
            name,
            output,
            diffuse,
            normal,
            specular,
            emissive,
            transparent,
            specular_exponent,
            comment,
        } => {
            validate_material_name(&name)?;
            let output = output.unwrap_or_else(|| PathBuf::from(material_file_name(&name)));
            let mut record = MaterialRecord {
                transparent,
                comment: comment
                    .unwrap_or_else(|| DEFAULT_MATERIAL_COMMENT.to_string())
                    .into_bytes(),
                ..Default::default()
            };
            if let Some(value) = diffuse {
                record.diffuse = parse_slot(&value)?;
            }
            if let Some(value) = normal {
                record.normal = parse_slot(&value)?;
            }
            if let Some(value) = specular {
                record.specular = parse_slot(&value)?;
            }
            if let Some(value) = emissive {
                record.emissive = parse_slot(&value)?;
            }
            if let Some(exponent) = specular_exponent {
                record.specular_exponent = exponent;
            }

            write_atomic(&output, &record.encode()?)?;
            tracing::info!("Wrote material '{}' -> {:?}", name, output);
        }

        Commands::Build { manifest, output } => {
            tracing::debug!("Building from {:?}", manifest);
            let config = Manifest::load(&manifest)?;
            let written =
                manifest::build_all(&config, &manifest::base_dir(&manifest), output.as_deref())?;
            tracing::info!("Build complete! {} files written", written.len());
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = Manifest::load(&manifest)?;
            config.validate()?;
            config.validate_sources(&manifest::base_dir(&manifest))?;
            tracing::info!("Manifest is valid!");
        }
    }

    Ok(())
}
