//! Feature extraction from Sentinel-1 products through SNAP graphs
//!
//! Every extraction follows the same pattern: resolve the product, check for
//! existing outputs, run one or more gpt graphs into a scratch directory inside
//! the feature folder, then copy the wanted band out of the BEAM-DIMAP result.

use crate::config::GptConfig;
use crate::core::gpt::{GptCommand, GptRunner};
use crate::core::graph::{GraphCatalog, GraphKind};
use crate::core::swath_mask::{SwathMaskBuilder, SWATH_MASK_NAME};
use crate::io::product::Sentinel1Product;
use crate::io::raster;
use crate::types::{FeatureOutcome, Looks, OutputFormat, Polarization, S1Error, S1Result, Scale};
use std::path::{Path, PathBuf};

/// Name of the product gpt writes inside the scratch directory
const SNAP_OUTPUT_STEM: &str = "tmp";

/// Folder in the feature folder where dry runs leave the rendered graphs
pub const DRY_RUN_GRAPH_DIR: &str = "graphs";

/// Behaviour shared by all extraction operations
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Replace outputs that already exist
    pub overwrite: bool,
    /// Report the gpt commands without running them
    pub dry_run: bool,
    /// Format of the finished feature files
    pub output_format: OutputFormat,
}

/// One graph execution and the band it contributes
#[derive(Debug, Clone)]
struct GraphJob {
    kind: GraphKind,
    /// Band inside `<out>.data/`
    band: String,
    /// File stem in the feature folder
    output: String,
    parameters: Vec<(String, String)>,
}

impl GraphJob {
    fn new(kind: GraphKind, output: &str) -> Self {
        Self {
            kind,
            band: kind.output_band(None),
            output: output.to_string(),
            parameters: Vec::new(),
        }
    }
}

/// Runs SNAP graphs for a product and collects the resulting feature rasters
pub struct FeatureExtractor {
    runner: GptRunner,
    catalog: GraphCatalog,
    options: ExtractOptions,
}

impl FeatureExtractor {
    pub fn new(config: &GptConfig) -> Self {
        Self::with_options(config, ExtractOptions::default())
    }

    pub fn with_options(config: &GptConfig, options: ExtractOptions) -> Self {
        Self {
            runner: GptRunner::from_config(config),
            catalog: GraphCatalog::new(config.graph_dir.clone()),
            options,
        }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Calibrated, noise-removed Sigma0 for one polarisation
    pub fn intensity<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        product_path: P,
        feat_folder: Q,
        pol: Polarization,
        looks: Looks,
        scale: Scale,
    ) -> S1Result<FeatureOutcome> {
        log::info!("Extracting intensity {} ({:?}, looks {})", pol, scale, looks);

        let product = Sentinel1Product::locate(product_path)?;
        if !product.name.has_polarization(pol) {
            let available = product
                .name
                .polarizations
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            log::error!("Product mode does not contain {} polarisation", pol);
            return Err(S1Error::MissingPolarization {
                requested: pol,
                available,
            });
        }

        // Re-validate in case the fields were set directly
        let looks = Looks::new(looks.range, looks.azimuth)?;
        let speckle = looks.is_multilook();

        let kind = GraphKind::Intensity {
            mode: product.name.mode,
            product_type: product.name.product_type,
            speckle,
            scale,
        };

        let output = kind.output_band(Some(pol));
        let mut job = GraphJob::new(kind, &output);
        job.band = output;
        job.parameters.push(("polarization".to_string(), pol.to_string()));
        if speckle {
            job.parameters.push(("looks_rg".to_string(), looks.range.to_string()));
            job.parameters.push(("looks_az".to_string(), looks.azimuth.to_string()));
        }

        self.run_jobs(&product, feat_folder.as_ref(), &[job])
    }

    /// Incidence angle, written as `IA`
    pub fn incidence_angle<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        product_path: P,
        feat_folder: Q,
    ) -> S1Result<FeatureOutcome> {
        log::info!("Extracting IA");
        let product = Sentinel1Product::locate(product_path)?;
        let job = GraphJob::new(GraphKind::IncidenceAngle, "IA");
        self.run_jobs(&product, feat_folder.as_ref(), &[job])
    }

    /// Latitude and longitude bands, written as `lat` and `lon`
    pub fn lat_lon<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        product_path: P,
        feat_folder: Q,
    ) -> S1Result<FeatureOutcome> {
        log::info!("Extracting lat/lon");
        let product = Sentinel1Product::locate(product_path)?;
        let jobs = [
            GraphJob::new(GraphKind::Latitude, "lat"),
            GraphJob::new(GraphKind::Longitude, "lon"),
        ];
        self.run_jobs(&product, feat_folder.as_ref(), &jobs)
    }

    /// Sub-swath label mask from the product annotation; does not need gpt
    pub fn swath_mask<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        product_path: P,
        feat_folder: Q,
    ) -> S1Result<FeatureOutcome> {
        log::info!("Extracting swath mask");
        let product = Sentinel1Product::locate(product_path)?;
        let feat_folder = std::path::absolute(feat_folder.as_ref())?;

        let swaths = SwathMaskBuilder::swaths_for(product.name.mode)?;
        log::debug!("swath list: {:?}", swaths);

        let out_path = self.output_path(&feat_folder, SWATH_MASK_NAME);
        log::debug!("img_path: {}", out_path.display());

        if let Some(outcome) = self.existing_outputs(std::slice::from_ref(&out_path)) {
            return Ok(outcome);
        }

        std::fs::create_dir_all(&feat_folder)?;

        if self.options.dry_run {
            log::info!("Dry-run (not performing actual processing)");
            return Ok(FeatureOutcome::DryRun {
                commands: Vec::new(),
            });
        }

        let mask = SwathMaskBuilder::for_product(&product)?;

        raster::remove_raster(&out_path)?;
        raster::write_raster(
            &out_path,
            self.options.output_format.driver_name(),
            std::slice::from_ref(&mask),
        )?;
        log::info!("Swath mask written to {}", out_path.display());

        Ok(FeatureOutcome::Written {
            files: vec![out_path],
        })
    }

    /// Everything a product provides: linear and dB intensity for each
    /// polarisation, swath mask, incidence angle and lat/lon
    pub fn extract_all<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        product_path: P,
        feat_folder: Q,
        looks: Looks,
    ) -> S1Result<Vec<(String, FeatureOutcome)>> {
        let product_path = product_path.as_ref();
        let feat_folder = feat_folder.as_ref();
        let product = Sentinel1Product::locate(product_path)?;
        log::info!("Extracting all features for {}", product.name.basename);

        let mut outcomes = Vec::new();
        for pol in &product.name.polarizations {
            for scale in [Scale::Linear, Scale::Decibel] {
                let outcome = self.intensity(product_path, feat_folder, *pol, looks, scale)?;
                let label = format!("Sigma0_{}{}", pol, scale.suffix());
                outcomes.push((label, outcome));
            }
        }

        outcomes.push((
            SWATH_MASK_NAME.to_string(),
            self.swath_mask(product_path, feat_folder)?,
        ));
        outcomes.push((
            "IA".to_string(),
            self.incidence_angle(product_path, feat_folder)?,
        ));
        outcomes.push((
            "lat_lon".to_string(),
            self.lat_lon(product_path, feat_folder)?,
        ));

        Ok(outcomes)
    }

    fn output_path(&self, feat_folder: &Path, stem: &str) -> PathBuf {
        feat_folder.join(format!("{}.{}", stem, self.options.output_format.extension()))
    }

    /// `Skipped` when every output is present and overwrite is off
    fn existing_outputs(&self, outputs: &[PathBuf]) -> Option<FeatureOutcome> {
        if !self.options.overwrite && outputs.iter().all(|p| p.is_file()) {
            log::info!("Output file already exists, use `--overwrite` to force");
            return Some(FeatureOutcome::Skipped {
                existing: outputs.to_vec(),
            });
        }
        None
    }

    fn run_jobs(
        &self,
        product: &Sentinel1Product,
        feat_folder: &Path,
        jobs: &[GraphJob],
    ) -> S1Result<FeatureOutcome> {
        let feat_folder = std::path::absolute(feat_folder)?;
        log::debug!("product:     {}", product.path.display());
        log::debug!("feat_folder: {}", feat_folder.display());
        log::debug!("datestring:  {}", product.name.datestring());

        let outputs: Vec<PathBuf> = jobs
            .iter()
            .map(|job| self.output_path(&feat_folder, &job.output))
            .collect();

        if let Some(outcome) = self.existing_outputs(&outputs) {
            return Ok(outcome);
        }

        std::fs::create_dir_all(&feat_folder)?;

        let mut commands = Vec::new();
        let mut written = Vec::new();

        for (job, output) in jobs.iter().zip(&outputs) {
            if self.options.dry_run {
                let graph_dir = feat_folder.join(DRY_RUN_GRAPH_DIR);
                std::fs::create_dir_all(&graph_dir)?;
                let graph = self.catalog.resolve(&job.kind, &graph_dir)?;
                let work_dir = feat_folder.join(SNAP_OUTPUT_STEM);
                let cmd = Self::command(product, job, &graph, &work_dir);

                log::info!("Dry-run (not performing actual processing)");
                log::info!("Executing: {}", self.runner.display(&cmd));
                commands.push(self.runner.display(&cmd));
                continue;
            }

            // Removed when dropped, on success and on error
            let scratch = tempfile::Builder::new()
                .prefix(SNAP_OUTPUT_STEM)
                .tempdir_in(&feat_folder)?;

            let graph = self.catalog.resolve(&job.kind, scratch.path())?;
            let cmd = Self::command(product, job, &graph, scratch.path());

            self.runner.run(&cmd)?;

            let data_dir = scratch.path().join(format!("{}.data", SNAP_OUTPUT_STEM));
            let band_img = data_dir.join(format!("{}.img", job.band));
            let band_hdr = raster::envi_header_path(&band_img);
            if !band_img.is_file() || !band_hdr.is_file() {
                log::error!("gpt did not produce {}", band_img.display());
                return Err(S1Error::not_found("SNAP output band", band_img));
            }
            raster::validate_raster(&band_img)?;

            raster::remove_raster(output)?;
            match self.options.output_format {
                OutputFormat::Envi => {
                    std::fs::copy(&band_img, output)?;
                    std::fs::copy(&band_hdr, raster::envi_header_path(output))?;
                }
                OutputFormat::GeoTiff => {
                    raster::translate(&band_img, output, OutputFormat::GeoTiff.driver_name())?;
                }
            }
            log::info!("Written {}", output.display());
            written.push(output.clone());
        }

        if self.options.dry_run {
            return Ok(FeatureOutcome::DryRun { commands });
        }
        Ok(FeatureOutcome::Written { files: written })
    }

    /// gpt invocation writing `<work_dir>/tmp.dim`
    fn command(
        product: &Sentinel1Product,
        job: &GraphJob,
        graph: &Path,
        work_dir: &Path,
    ) -> GptCommand {
        let snap_outfile = work_dir.join(format!("{}.dim", SNAP_OUTPUT_STEM));
        log::debug!("snap_graph_path: {}", graph.display());
        log::debug!("snap_outfile:    {}", snap_outfile.display());

        let mut cmd = GptCommand::new(graph)
            .param("inFile", product.path.display())
            .param("outFile", snap_outfile.display());
        for (key, value) in &job.parameters {
            cmd = cmd.param(key, value);
        }
        cmd
    }
}
