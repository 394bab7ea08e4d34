//! Runtime configuration: location of the SNAP `gpt` executable and GDAL checks
//!
//! The `gpt` path is read from a `.env` file holding `GPT="/path/to/esa_snap/bin/gpt"`.
//! A missing file or an unusable executable is an error.

use std::path::{Path, PathBuf};

/// Name of the per-user configuration directory
pub const CONFIG_DIR_NAME: &str = "s1-features";

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no '.env' file found (searched: {searched})")]
    DotenvMissing { searched: String },

    #[error("failed to read '{path}': {reason}")]
    DotenvUnreadable { path: PathBuf, reason: String },

    #[error("the variable 'GPT' is not set in '{0}'")]
    GptUnset(PathBuf),

    #[error("GPT does not point to an executable file: {0}")]
    GptNotExecutable(PathBuf),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("GDAL driver '{0}' is not available")]
    GdalDriverMissing(&'static str),
}

/// Where to look for the `.env` file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DotenvLocation {
    /// Per-user configuration directory first, then the working directory
    #[default]
    Installation,
    /// Only the working directory
    Local,
}

impl std::str::FromStr for DotenvLocation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "installation" => Ok(DotenvLocation::Installation),
            "local" => Ok(DotenvLocation::Local),
            _ => Err(ConfigError::InvalidValue {
                key: "dotenv_location",
                value: s.to_string(),
            }),
        }
    }
}

/// Validated SNAP `gpt` configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GptConfig {
    /// Absolute path to the gpt executable
    pub gpt: PathBuf,
    /// Directory with SNAP graph XML files; built-in graphs are used when unset
    pub graph_dir: Option<PathBuf>,
    /// Parallelism passed as `gpt -q`
    pub threads: Option<usize>,
    /// Tile cache size passed as `gpt -c` (e.g. `2G`)
    pub cache_size: Option<String>,
    /// The `.env` file the values were read from, if any
    pub source: Option<PathBuf>,
}

impl GptConfig {
    /// Build a configuration directly from a gpt path
    pub fn new<P: AsRef<Path>>(gpt: P) -> Result<Self, ConfigError> {
        let gpt = gpt.as_ref().to_path_buf();
        ensure_executable(&gpt)?;
        Ok(Self {
            gpt,
            graph_dir: None,
            threads: None,
            cache_size: None,
            source: None,
        })
    }

    /// Locate a `.env` file and load it
    pub fn load(location: DotenvLocation) -> Result<Self, ConfigError> {
        Self::load_from(&dotenv_candidates(location))
    }

    /// Load the first existing file among `candidates`
    pub fn load_from(candidates: &[PathBuf]) -> Result<Self, ConfigError> {
        log::debug!("Searching for '.env' in: {:?}", candidates);

        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Self::from_dotenv_file(path),
            None => {
                let searched = candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                log::error!("Could not find a '.env' file with the GPT path");
                Err(ConfigError::DotenvMissing { searched })
            }
        }
    }

    /// Read `GPT` and the optional tuning keys from a specific `.env` file
    pub fn from_dotenv_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::debug!("Reading GPT configuration from {}", path.display());

        let unreadable = |reason: String| ConfigError::DotenvUnreadable {
            path: path.to_path_buf(),
            reason,
        };

        let iter = dotenvy::from_path_iter(path).map_err(|e| unreadable(e.to_string()))?;

        let mut gpt = None;
        let mut graph_dir = None;
        let mut threads = None;
        let mut cache_size = None;

        for item in iter {
            let (key, value) = item.map_err(|e| unreadable(e.to_string()))?;
            match key.as_str() {
                "GPT" => gpt = Some(PathBuf::from(value)),
                "SNAP_GRAPH_DIR" => graph_dir = Some(PathBuf::from(value)),
                "GPT_THREADS" => {
                    let n = value.parse::<usize>().ok().filter(|n| *n > 0).ok_or(
                        ConfigError::InvalidValue {
                            key: "GPT_THREADS",
                            value: value.clone(),
                        },
                    )?;
                    threads = Some(n);
                }
                "GPT_CACHE" => cache_size = Some(value),
                _ => {}
            }
        }

        let gpt = gpt.ok_or_else(|| ConfigError::GptUnset(path.to_path_buf()))?;
        ensure_executable(&gpt)?;
        log::debug!("GPT set to: {}", gpt.display());

        Ok(Self {
            gpt,
            graph_dir,
            threads,
            cache_size,
            source: Some(path.to_path_buf()),
        })
    }

    /// Human-readable summary for the `check` command
    pub fn describe(&self) -> String {
        let mut lines = vec![format!("gpt:       {}", self.gpt.display())];
        lines.push(format!(
            "graphs:    {}",
            self.graph_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in".to_string())
        ));
        if let Some(threads) = self.threads {
            lines.push(format!("threads:   {}", threads));
        }
        if let Some(cache) = &self.cache_size {
            lines.push(format!("cache:     {}", cache));
        }
        if let Some(source) = &self.source {
            lines.push(format!("from:      {}", source.display()));
        }
        lines.join("\n")
    }
}

/// Candidate `.env` locations in search order
pub fn dotenv_candidates(location: DotenvLocation) -> Vec<PathBuf> {
    let local = PathBuf::from(".env");
    match location {
        DotenvLocation::Installation => {
            let mut candidates = Vec::new();
            if let Some(dir) = dirs::config_dir() {
                candidates.push(dir.join(CONFIG_DIR_NAME).join(".env"));
            }
            candidates.push(local);
            candidates
        }
        DotenvLocation::Local => vec![local],
    }
}

/// The path must be a regular file, and executable on unix
fn ensure_executable(path: &Path) -> Result<(), ConfigError> {
    let metadata =
        std::fs::metadata(path).map_err(|_| ConfigError::GptNotExecutable(path.to_path_buf()))?;
    if !metadata.is_file() {
        return Err(ConfigError::GptNotExecutable(path.to_path_buf()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(ConfigError::GptNotExecutable(path.to_path_buf()));
        }
    }

    Ok(())
}

/// GDAL must provide the drivers the pipeline writes with
pub fn ensure_gdal() -> Result<(), ConfigError> {
    for driver in ["GTiff", "ENVI"] {
        if gdal::DriverManager::get_driver_by_name(driver).is_err() {
            log::error!("GDAL driver {} is not registered", driver);
            return Err(ConfigError::GdalDriverMissing(driver));
        }
    }
    log::debug!(
        "GDAL {} with {} drivers",
        gdal::version::VersionInfo::version_report(),
        gdal::DriverManager::count()
    );
    Ok(())
}
