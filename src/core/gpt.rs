use crate::config::GptConfig;
use crate::types::{S1Error, S1Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// One invocation of a SNAP graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GptCommand {
    pub graph: PathBuf,
    /// `-P<key>=<value>` graph parameters, in order
    pub parameters: Vec<(String, String)>,
}

impl GptCommand {
    pub fn new<P: AsRef<Path>>(graph: P) -> Self {
        Self {
            graph: graph.as_ref().to_path_buf(),
            parameters: Vec::new(),
        }
    }

    pub fn param<V: ToString>(mut self, key: &str, value: V) -> Self {
        self.parameters.push((key.to_string(), value.to_string()));
        self
    }

    /// Value of a graph parameter, if set
    pub fn get(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Runs SNAP's graph processing tool as a child process
#[derive(Debug, Clone)]
pub struct GptRunner {
    executable: PathBuf,
    threads: Option<usize>,
    cache_size: Option<String>,
}

impl GptRunner {
    pub fn new<P: AsRef<Path>>(executable: P) -> Self {
        Self {
            executable: executable.as_ref().to_path_buf(),
            threads: None,
            cache_size: None,
        }
    }

    /// Runner configured from a validated `.env`
    pub fn from_config(config: &GptConfig) -> Self {
        let mut runner = Self::new(&config.gpt);
        runner.threads = config.threads;
        runner.cache_size = config.cache_size.clone();
        runner
    }

    /// Parallelism for gpt (`-q`)
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Tile cache size for gpt (`-c`), e.g. `4G`
    pub fn cache_size<S: Into<String>>(mut self, size: S) -> Self {
        self.cache_size = Some(size.into());
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Argument vector passed to the executable
    pub fn args(&self, cmd: &GptCommand) -> Vec<String> {
        let mut args = vec![cmd.graph.display().to_string()];
        for (key, value) in &cmd.parameters {
            args.push(format!("-P{}={}", key, value));
        }
        if let Some(threads) = self.threads {
            args.push("-q".to_string());
            args.push(threads.to_string());
        }
        if let Some(cache) = &self.cache_size {
            args.push("-c".to_string());
            args.push(cache.clone());
        }
        args
    }

    /// Shell-like rendering of the command, for logs and dry runs
    pub fn display(&self, cmd: &GptCommand) -> String {
        let mut parts = vec![format!("\"{}\"", self.executable.display())];
        parts.extend(self.args(cmd).iter().map(|arg| quote_arg(arg)));
        parts.join(" ")
    }

    /// Execute the graph and wait for it; a non-zero exit is an error
    pub fn run(&self, cmd: &GptCommand) -> S1Result<()> {
        log::info!("Running SNAP graph: {}", cmd.graph.display());
        log::debug!("Executing: {}", self.display(cmd));

        let start = Instant::now();
        let output = Command::new(&self.executable)
            .args(self.args(cmd))
            .output()
            .map_err(|e| S1Error::Gpt {
                status: "not started".to_string(),
                stderr: format!("{}: {}", self.executable.display(), e),
            })?;
        let elapsed = start.elapsed();

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            log::debug!("gpt: {}", line);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log::error!("gpt exited with {} after {:.1}s", output.status, elapsed.as_secs_f64());
            return Err(S1Error::Gpt {
                status: output.status.to_string(),
                stderr,
            });
        }

        log::info!("gpt finished in {:.1}s", elapsed.as_secs_f64());
        Ok(())
    }
}

/// Double-quote an argument holding whitespace or quotes
fn quote_arg(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"') {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> GptCommand {
        GptCommand::new("/graphs/S1_IA.xml")
            .param("inFile", "/data/S1A.SAFE")
            .param("outFile", "/feat/tmp/tmp.dim")
    }

    #[test]
    fn test_args() {
        let runner = GptRunner::new("/opt/snap/bin/gpt").threads(4).cache_size("2G");
        assert_eq!(
            runner.args(&command()),
            vec![
                "/graphs/S1_IA.xml",
                "-PinFile=/data/S1A.SAFE",
                "-PoutFile=/feat/tmp/tmp.dim",
                "-q",
                "4",
                "-c",
                "2G"
            ]
        );
    }

    #[test]
    fn test_display_quotes_executable() {
        let runner = GptRunner::new("/opt/snap/bin/gpt");
        let shown = runner.display(&command().param("looks_rg", 3));
        assert!(shown.starts_with("\"/opt/snap/bin/gpt\" /graphs/S1_IA.xml"));
        assert!(shown.ends_with("-Plooks_rg=3"));
        assert_eq!(command().get("outFile"), Some("/feat/tmp/tmp.dim"));
        assert_eq!(command().get("looks_az"), None);
    }

    #[test]
    fn test_display_quotes_paths_with_spaces() {
        let runner = GptRunner::new("/opt/snap/bin/gpt");
        let cmd = GptCommand::new("/my graphs/S1_IA.xml")
            .param("inFile", "/data/my scenes/S1A.SAFE")
            .param("outFile", "/feat/tmp/tmp.dim");
        assert_eq!(
            runner.display(&cmd),
            "\"/opt/snap/bin/gpt\" \"/my graphs/S1_IA.xml\" \"-PinFile=/data/my scenes/S1A.SAFE\" -PoutFile=/feat/tmp/tmp.dim"
        );
        assert_eq!(quote_arg("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_missing_executable() {
        let runner = GptRunner::new("/nonexistent/gpt");
        let err = runner.run(&command()).unwrap_err();
        assert!(matches!(err, S1Error::Gpt { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit() {
        let runner = GptRunner::new("false");
        let err = runner.run(&command()).unwrap_err();
        match err {
            S1Error::Gpt { status, .. } => assert!(status.contains('1')),
            other => panic!("unexpected error: {}", other),
        }
    }
}
