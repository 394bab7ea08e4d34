use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use s1_features::config::{self, DotenvLocation, GptConfig};
use s1_features::core::{
    read_image_list, BatchPlan, Channel, ExtractOptions, FeatureExtractor, RgbComposer, RgbParams,
};
use s1_features::io::{raster, Sentinel1Product};
use s1_features::types::{FeatureOutcome, Looks, OutputFormat, Polarization, Scale};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "s1-features",
    version,
    about = "Extract features from Sentinel-1 products with ESA SNAP and GDAL"
)]
struct Cli {
    #[arg(long, value_enum, default_value = "INFO", global = true, help = "Log level")]
    loglevel: LogLevel,

    #[arg(long, global = true, help = "Read the GPT path from this .env file")]
    env_file: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        default_value = "installation",
        global = true,
        help = "Where to search for the .env file"
    )]
    dotenv_location: Location,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
#[value(rename_all = "UPPER")]
enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    fn filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Critical | LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Location {
    Installation,
    Local,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Envi,
    Gtiff,
}

#[derive(Args, Clone, Debug)]
struct ExtractArgs {
    #[arg(help = "Sentinel-1 .SAFE folder or .zip archive")]
    product: PathBuf,
    #[arg(help = "Feature folder for the output rasters")]
    feat_folder: PathBuf,
    #[arg(long, help = "Overwrite existing output files")]
    overwrite: bool,
    #[arg(long, help = "Print the gpt commands without running them")]
    dry_run: bool,
    #[arg(long, value_enum, default_value = "envi", help = "Output raster format")]
    format: Format,
}

impl ExtractArgs {
    fn options(&self) -> ExtractOptions {
        ExtractOptions {
            overwrite: self.overwrite,
            dry_run: self.dry_run,
            output_format: match self.format {
                Format::Envi => OutputFormat::Envi,
                Format::Gtiff => OutputFormat::GeoTiff,
            },
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Validate the GPT configuration and GDAL drivers")]
    Check,
    #[command(about = "Show information encoded in a product name")]
    Info {
        #[arg(help = "Sentinel-1 .SAFE folder or .zip archive")]
        product: PathBuf,
        #[arg(long, help = "Emit JSON")]
        json: bool,
    },
    #[command(about = "Extract calibrated Sigma0 intensity for one polarisation")]
    Intensity {
        #[command(flatten)]
        args: ExtractArgs,
        #[arg(help = "Polarisation (HH, HV, VV, VH)")]
        polarization: Polarization,
        #[arg(long, default_value = "1x1", help = "Speckle filter looks as <rg>x<az>, odd")]
        ml: Looks,
        #[arg(long, help = "Output in dB")]
        db: bool,
    },
    #[command(about = "Extract the incidence angle")]
    Ia {
        #[command(flatten)]
        args: ExtractArgs,
    },
    #[command(about = "Extract latitude and longitude")]
    LatLon {
        #[command(flatten)]
        args: ExtractArgs,
    },
    #[command(about = "Write the sub-swath mask")]
    SwathMask {
        #[command(flatten)]
        args: ExtractArgs,
    },
    #[command(about = "Extract all features of a product")]
    Extract {
        #[command(flatten)]
        args: ExtractArgs,
        #[arg(long, default_value = "1x1", help = "Speckle filter looks as <rg>x<az>, odd")]
        ml: Looks,
    },
    #[command(about = "Stack scaled HH/HV intensities to an 8-bit RGB GeoTIFF")]
    Rgb {
        #[arg(help = "Feature folder holding Sigma0_HH.img and Sigma0_HV.img")]
        feat_folder: PathBuf,
        #[arg(help = "Folder for the RGB image")]
        result_folder: PathBuf,
        #[arg(long, default_value_t = -30.0, allow_hyphen_values = true)]
        hh_min: f32,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        hh_max: f32,
        #[arg(long, default_value_t = -35.0, allow_hyphen_values = true)]
        hv_min: f32,
        #[arg(long, default_value_t = -5.0, allow_hyphen_values = true)]
        hv_max: f32,
        #[arg(long, default_value_t = 0)]
        new_min: u8,
        #[arg(long, default_value_t = 255)]
        new_max: u8,
        #[arg(long, default_value = "HV", help = "HH, HV or zero")]
        red: Channel,
        #[arg(long, default_value = "HH", help = "HH, HV or zero")]
        green: Channel,
        #[arg(long, default_value = "HH", help = "HH, HV or zero")]
        blue: Channel,
        #[arg(long, help = "Overwrite an existing RGB image")]
        overwrite: bool,
    },
    #[command(about = "Extract all features for every product in a list")]
    Batch {
        #[arg(help = "Text file with one product basename per line")]
        image_list: PathBuf,
        #[arg(help = "Folder with the .SAFE folders or .zip archives")]
        l1_dir: PathBuf,
        #[arg(help = "Root folder for per-product feature folders")]
        features_root: PathBuf,
        #[arg(long, default_value = "1x1")]
        ml: Looks,
        #[arg(long, default_value_t = 1, help = "Products processed in parallel")]
        jobs: usize,
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        dry_run: bool,
        #[arg(long, value_enum, default_value = "envi")]
        format: Format,
        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
    #[command(about = "Convert a GeoTIFF to ENVI (.img + .hdr)")]
    ToEnvi {
        input: PathBuf,
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.loglevel.filter())
        .format_target(false)
        .init();

    if let Err(err) = run(cli) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<GptConfig> {
    let config = match &cli.env_file {
        Some(path) => GptConfig::from_dotenv_file(path),
        None => GptConfig::load(match cli.dotenv_location {
            Location::Installation => DotenvLocation::Installation,
            Location::Local => DotenvLocation::Local,
        }),
    };
    config.context("Failed to load the GPT configuration")
}

fn report(outcome: &FeatureOutcome) {
    match outcome {
        FeatureOutcome::Written { files } => {
            for file in files {
                println!("written  {}", file.display());
            }
        }
        FeatureOutcome::Skipped { existing } => {
            for file in existing {
                println!("exists   {}", file.display());
            }
        }
        FeatureOutcome::DryRun { commands } => {
            for cmd in commands {
                println!("{}", cmd);
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Check => {
            let gpt = load_config(&cli)?;
            config::ensure_gdal().context("GDAL is not usable")?;
            println!("{}", gpt.describe());
            println!("gdal:      {}", gdal::version::VersionInfo::version_report());
        }
        Command::Info { product, json } => {
            let product = Sentinel1Product::locate(product)
                .with_context(|| format!("Cannot read product {}", product.display()))?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&product)?);
            } else {
                let name = &product.name;
                println!("product:       {}", name.basename);
                println!("mission:       {}", name.mission);
                println!("mode:          {}", name.mode);
                println!("type:          {}", name.product_type);
                println!("polarisation:  {}", name.polarisation_code);
                println!("date:          {}", name.datestring());
                println!("orbit:         {}", name.absolute_orbit);
            }
        }
        Command::Intensity {
            args,
            polarization,
            ml,
            db,
        } => {
            let extractor = FeatureExtractor::with_options(&load_config(&cli)?, args.options());
            let scale = if *db { Scale::Decibel } else { Scale::Linear };
            let outcome = extractor.intensity(&args.product, &args.feat_folder, *polarization, *ml, scale)?;
            report(&outcome);
        }
        Command::Ia { args } => {
            let extractor = FeatureExtractor::with_options(&load_config(&cli)?, args.options());
            report(&extractor.incidence_angle(&args.product, &args.feat_folder)?);
        }
        Command::LatLon { args } => {
            let extractor = FeatureExtractor::with_options(&load_config(&cli)?, args.options());
            report(&extractor.lat_lon(&args.product, &args.feat_folder)?);
        }
        Command::SwathMask { args } => {
            let extractor = FeatureExtractor::with_options(&load_config(&cli)?, args.options());
            report(&extractor.swath_mask(&args.product, &args.feat_folder)?);
        }
        Command::Extract { args, ml } => {
            let extractor = FeatureExtractor::with_options(&load_config(&cli)?, args.options());
            for (feature, outcome) in extractor.extract_all(&args.product, &args.feat_folder, *ml)? {
                log::debug!("{}: {:?}", feature, outcome);
                report(&outcome);
            }
        }
        Command::Rgb {
            feat_folder,
            result_folder,
            hh_min,
            hh_max,
            hv_min,
            hv_max,
            new_min,
            new_max,
            red,
            green,
            blue,
            overwrite,
        } => {
            let params = RgbParams {
                hh_min: *hh_min,
                hh_max: *hh_max,
                hv_min: *hv_min,
                hv_max: *hv_max,
                new_min: *new_min,
                new_max: *new_max,
                red: *red,
                green: *green,
                blue: *blue,
            };
            let outcome = RgbComposer::with_params(params).make_rgb(feat_folder, result_folder, *overwrite)?;
            report(&outcome);
        }
        Command::Batch {
            image_list,
            l1_dir,
            features_root,
            ml,
            jobs,
            overwrite,
            dry_run,
            format,
            json,
        } => {
            let options = ExtractOptions {
                overwrite: *overwrite,
                dry_run: *dry_run,
                output_format: match format {
                    Format::Envi => OutputFormat::Envi,
                    Format::Gtiff => OutputFormat::GeoTiff,
                },
            };
            let extractor = FeatureExtractor::with_options(&load_config(&cli)?, options);

            let mut plan = BatchPlan::new(l1_dir, features_root, read_image_list(image_list)?);
            plan.looks = *ml;
            plan.jobs = *jobs;

            let batch = plan.run(&extractor)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&batch)?);
            } else {
                for product in &batch.products {
                    match &product.error {
                        None => println!("ok      {}", product.basename),
                        Some(e) => println!("failed  {}: {}", product.basename, e),
                    }
                }
            }
            if batch.failed() > 0 {
                bail!("{} of {} products failed", batch.failed(), batch.products.len());
            }
        }
        Command::ToEnvi { input, output } => {
            raster::translate(input, output, OutputFormat::Envi.driver_name())?;
            println!("written  {}", output.display());
        }
    }
    Ok(())
}
