use crate::core::extract::FeatureExtractor;
use crate::io::product::basename_of;
use crate::types::{FeatureOutcome, Looks, S1Error, S1Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Read product basenames from a list file, one per line.
/// Blank lines and lines starting with `#` are ignored.
pub fn read_image_list<P: AsRef<Path>>(path: P) -> S1Result<Vec<String>> {
    let path = path.as_ref();
    if !path.is_file() {
        log::error!("Cannot find image list: {}", path.display());
        return Err(S1Error::not_found("image list", path));
    }

    let content = std::fs::read_to_string(path)?;
    let names: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| basename_of(line).unwrap_or_else(|| line.to_string()))
        .collect();

    log::info!("Read {} product name(s) from {}", names.len(), path.display());
    Ok(names)
}

/// Result for one product of a batch
#[derive(Debug, Clone, Serialize)]
pub struct ProductReport {
    pub basename: String,
    pub product: Option<PathBuf>,
    pub feat_folder: PathBuf,
    /// Outcome per feature, empty on failure
    pub features: Vec<(String, FeatureOutcome)>,
    pub error: Option<String>,
}

impl ProductReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcomes of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub products: Vec<ProductReport>,
    pub elapsed_seconds: f64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.products.iter().filter(|p| p.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.products.len() - self.succeeded()
    }
}

/// Products to process and where their features go
#[derive(Debug, Clone)]
pub struct BatchPlan {
    /// Folder holding the `.SAFE` folders or `.zip` archives
    pub l1_dir: PathBuf,
    /// Each product gets `<features_root>/<basename>`
    pub features_root: PathBuf,
    pub basenames: Vec<String>,
    pub looks: Looks,
    /// Products processed at the same time
    pub jobs: usize,
}

impl BatchPlan {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(l1_dir: P, features_root: Q, basenames: Vec<String>) -> Self {
        Self {
            l1_dir: l1_dir.as_ref().to_path_buf(),
            features_root: features_root.as_ref().to_path_buf(),
            basenames,
            looks: Looks::default(),
            jobs: 1,
        }
    }

    /// `<l1_dir>/<name>.SAFE`, or `<l1_dir>/<name>.zip` when only the archive exists
    pub fn product_path(&self, basename: &str) -> Option<PathBuf> {
        let safe = self.l1_dir.join(format!("{}.SAFE", basename));
        if safe.is_dir() {
            return Some(safe);
        }
        let zip = self.l1_dir.join(format!("{}.zip", basename));
        if zip.is_file() {
            return Some(zip);
        }
        None
    }

    pub fn feat_folder(&self, basename: &str) -> PathBuf {
        self.features_root.join(basename)
    }

    fn process_one(&self, extractor: &FeatureExtractor, basename: &str) -> ProductReport {
        let feat_folder = self.feat_folder(basename);
        let product = self.product_path(basename);

        let result = match &product {
            Some(path) => extractor.extract_all(path, &feat_folder, self.looks),
            None => Err(S1Error::not_found(
                "Sentinel-1 product",
                self.l1_dir.join(format!("{}.SAFE", basename)),
            )),
        };

        match result {
            Ok(features) => {
                log::info!("Finished {}", basename);
                ProductReport {
                    basename: basename.to_string(),
                    product,
                    feat_folder,
                    features,
                    error: None,
                }
            }
            Err(e) => {
                log::warn!("Failed {}: {}", basename, e);
                ProductReport {
                    basename: basename.to_string(),
                    product,
                    feat_folder,
                    features: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Run `extract_all` for every product; failures are recorded, not fatal
    pub fn run(&self, extractor: &FeatureExtractor) -> S1Result<BatchReport> {
        if self.jobs == 0 {
            return Err(S1Error::InvalidParameter("jobs must be at least 1".to_string()));
        }

        log::info!(
            "Processing {} product(s) with {} job(s)",
            self.basenames.len(),
            self.jobs
        );
        let start = Instant::now();

        #[cfg(feature = "parallel")]
        let products = {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
                .map_err(|e| S1Error::InvalidParameter(format!("Failed to build thread pool: {}", e)))?;
            pool.install(|| {
                self.basenames
                    .par_iter()
                    .map(|name| self.process_one(extractor, name))
                    .collect::<Vec<_>>()
            })
        };

        #[cfg(not(feature = "parallel"))]
        let products = self
            .basenames
            .iter()
            .map(|name| self.process_one(extractor, name))
            .collect::<Vec<_>>();

        let report = BatchReport {
            products,
            elapsed_seconds: start.elapsed().as_secs_f64(),
        };
        log::info!(
            "Batch done in {:.1}s: {} succeeded, {} failed",
            report.elapsed_seconds,
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_image_list() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("images.txt");
        std::fs::write(
            &list,
            "# winter scenes\nS1A_ONE.SAFE\n\n  S1B_TWO  \nS1A_THREE.zip\n",
        )
        .unwrap();

        let names = read_image_list(&list).unwrap();
        assert_eq!(names, vec!["S1A_ONE", "S1B_TWO", "S1A_THREE"]);
        assert!(read_image_list(dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_image_list_entries_match_basename_of() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("images.txt");
        std::fs::write(&list, "X.SAFE.SAFE
/data/L1/Y.zip
Z.SAFE/
").unwrap();

        let names = read_image_list(&list).unwrap();
        assert_eq!(names, vec!["X.SAFE", "Y", "Z"]);
        for (line, name) in ["X.SAFE.SAFE", "/data/L1/Y.zip", "Z.SAFE/"].iter().zip(&names) {
            assert_eq!(basename_of(line).as_ref(), Some(name));
        }
    }

    #[test]
    fn test_product_resolution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("A.SAFE")).unwrap();
        std::fs::write(dir.path().join("B.zip"), b"").unwrap();

        let plan = BatchPlan::new(dir.path(), "/features", vec![]);
        assert_eq!(plan.product_path("A").unwrap(), dir.path().join("A.SAFE"));
        assert_eq!(plan.product_path("B").unwrap(), dir.path().join("B.zip"));
        assert!(plan.product_path("C").is_none());
        assert_eq!(plan.feat_folder("A"), PathBuf::from("/features/A"));
    }
}
