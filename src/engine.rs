
use crate::errors::ConvPhaseError;

use log::{debug, info, trace, warn};
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Name of the encoded matrix inside the run directory
pub const ENGINE_INPUT_FILENAME: &str = "phase.inp";
/// Name of the main engine output inside the run directory
pub const ENGINE_OUTPUT_FILENAME: &str = "phase.out";
const ENGINE_STDOUT_FILENAME: &str = "engine.stdout";
const ENGINE_STDERR_FILENAME: &str = "engine.stderr";
/// How often a running engine is checked for completion, timeout, or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Shared flag that lets a caller abort a running engine
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>
}

impl CancellationToken {
    pub fn new() -> CancellationToken {
        Default::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Run-scoped working area for a single conversion.
/// The directory and everything the engine wrote into it are removed when this is dropped,
/// unless `keep_files` was requested.
pub struct RunContext {
    /// `None` only while being dropped
    temp_dir: Option<TempDir>,
    cancellation: CancellationToken,
    keep_files: bool
}

impl RunContext {
    /// Creates a fresh run directory.
    /// # Arguments
    /// * `parent` - optional directory to create the run directory in, default is the system temp dir
    /// * `keep_files` - if true, the directory is left on disk after the run for debugging
    pub fn new(parent: Option<&Path>, keep_files: bool) -> std::io::Result<RunContext> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("convphase-");
        let temp_dir = match parent {
            Some(p) => builder.tempdir_in(p)?,
            None => builder.tempdir()?
        };
        debug!("Created run directory {:?}", temp_dir.path());
        Ok(RunContext {
            temp_dir: Some(temp_dir),
            cancellation: CancellationToken::new(),
            keep_files
        })
    }

    /// Replaces the cancellation token with one the caller holds
    pub fn with_cancellation(mut self, token: CancellationToken) -> RunContext {
        self.cancellation = token;
        self
    }

    pub fn path(&self) -> &Path {
        match self.temp_dir.as_ref() {
            Some(td) => td.path(),
            None => Path::new("")
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        if let Some(temp_dir) = self.temp_dir.take() {
            if self.keep_files {
                let kept: PathBuf = temp_dir.keep();
                info!("Engine files kept in {:?}", kept);
            } else {
                let path = temp_dir.path().to_path_buf();
                if let Err(e) = temp_dir.close() {
                    warn!("Failed to remove run directory {:?}: {}", path, e);
                }
            }
        }
    }
}

/// Run parameters passed through to the engine
#[derive(Clone, Debug, PartialEq)]
pub struct EngineParameters {
    /// Number of main iterations
    pub iterations: usize,
    /// Thinning interval between samples
    pub thinning: usize,
    /// Burn-in iterations
    pub burn_in: usize,
    /// Fixed random seed for reproducible runs
    pub seed: Option<u64>,
    /// Minimum posterior for a confident phase call
    pub phase_threshold: f64,
    /// Minimum posterior for a confident genotype call
    pub allele_threshold: f64,
    /// Wall-clock limit for the engine, `None` waits forever
    pub timeout: Option<Duration>
}

impl Default for EngineParameters {
    fn default() -> Self {
        EngineParameters {
            iterations: 100,
            thinning: 1,
            burn_in: 100,
            seed: None,
            phase_threshold: 0.9,
            allele_threshold: 0.9,
            timeout: None
        }
    }
}

/// Capability interface for anything that can phase an encoded matrix.
pub trait PhaseEngine {
    /// Runs the engine on serialized PHASE input and returns the text of its output.
    /// # Arguments
    /// * `input` - the serialized engine input
    /// * `context` - the run directory and cancellation token for this run
    fn invoke(&self, input: &str, context: &RunContext) -> Result<String, ConvPhaseError>;
}

/// Runs a PHASE-compatible executable as a child process
#[derive(Clone, Debug)]
pub struct ExternalPhaseEngine {
    /// Executable name or path
    program: PathBuf,
    /// Arguments placed before the generated ones
    engine_args: Vec<String>,
    parameters: EngineParameters
}

impl ExternalPhaseEngine {
    pub fn new(program: PathBuf, parameters: EngineParameters) -> ExternalPhaseEngine {
        ExternalPhaseEngine {
            program,
            engine_args: vec![],
            parameters
        }
    }

    /// Adds extra arguments, placed before the generated options
    pub fn with_args(mut self, engine_args: Vec<String>) -> ExternalPhaseEngine {
        self.engine_args = engine_args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn parameters(&self) -> &EngineParameters {
        &self.parameters
    }

    /// Builds the full argument list for one invocation
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.engine_args.iter().map(OsString::from).collect();
        if let Some(seed) = self.parameters.seed {
            args.push(format!("-S{seed}").into());
        }
        args.push(format!("-p{}", self.parameters.phase_threshold).into());
        args.push(format!("-q{}", self.parameters.allele_threshold).into());
        args.push(input.as_os_str().to_owned());
        args.push(output.as_os_str().to_owned());
        args.push(self.parameters.iterations.to_string().into());
        args.push(self.parameters.thinning.to_string().into());
        args.push(self.parameters.burn_in.to_string().into());
        args
    }

    /// Waits for the child, enforcing the timeout and cancellation token.
    /// On either, the child is killed and reaped before returning.
    fn wait_bounded(&self, child: &mut std::process::Child, context: &RunContext) -> Result<ExitStatus, ConvPhaseError> {
        let start_time = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                debug!("Engine finished after {:.3} seconds with {}", start_time.elapsed().as_secs_f64(), status);
                return Ok(status);
            }

            let timed_out = match self.parameters.timeout {
                Some(limit) => start_time.elapsed() >= limit,
                None => false
            };
            let cancelled = context.is_cancelled();
            if timed_out || cancelled {
                warn!("Stopping engine process {} ({})", child.id(), if timed_out { "timeout" } else { "cancelled" });
                // the child may have exited between the checks, in which case kill reports an error we can ignore
                let _ = child.kill();
                child.wait()?;
                return Err(if timed_out {
                    ConvPhaseError::EngineTimeout { seconds: start_time.elapsed().as_secs_f64() }
                } else {
                    ConvPhaseError::EngineCancelled
                });
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

fn read_lossy(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => String::new()
    }
}

impl PhaseEngine for ExternalPhaseEngine {
    fn invoke(&self, input: &str, context: &RunContext) -> Result<String, ConvPhaseError> {
        if context.is_cancelled() {
            return Err(ConvPhaseError::EngineCancelled);
        }

        let run_dir: &Path = context.path();
        let input_path: PathBuf = run_dir.join(ENGINE_INPUT_FILENAME);
        let output_path: PathBuf = run_dir.join(ENGINE_OUTPUT_FILENAME);
        let stdout_path: PathBuf = run_dir.join(ENGINE_STDOUT_FILENAME);
        let stderr_path: PathBuf = run_dir.join(ENGINE_STDERR_FILENAME);
        std::fs::write(&input_path, input)?;

        let args = self.build_args(&input_path, &output_path);
        info!("Running {:?} {:?}", self.program, args);
        let mut child = Command::new(&self.program)
            .args(&args)
            .current_dir(run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(File::create(&stdout_path)?))
            .stderr(Stdio::from(File::create(&stderr_path)?))
            .spawn()
            .map_err(|e| ConvPhaseError::EngineUnavailable { program: self.program.clone(), source: e })?;

        let status = self.wait_bounded(&mut child, context)?;
        if !status.success() {
            return Err(ConvPhaseError::EngineExecution {
                status: status.to_string(),
                stdout: read_lossy(&stdout_path),
                stderr: read_lossy(&stderr_path)
            });
        }

        match std::fs::read_to_string(&output_path) {
            Ok(output) => {
                trace!("Engine output is {} bytes", output.len());
                Ok(output)
            },
            Err(e) => Err(ConvPhaseError::EngineExecution {
                status: format!("{status}, but output {:?} could not be read: {e}", output_path),
                stdout: read_lossy(&stdout_path),
                stderr: read_lossy(&stderr_path)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let parameters = EngineParameters {
            seed: Some(7),
            ..Default::default()
        };
        let engine = ExternalPhaseEngine::new(PathBuf::from("PHASE"), parameters)
            .with_args(vec!["-MR".to_string()]);
        let args = engine.build_args(Path::new("in.inp"), Path::new("out.out"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(args, vec!["-MR", "-S7", "-p0.9", "-q0.9", "in.inp", "out.out", "100", "1", "100"]);
    }

    #[test]
    fn test_run_context_cleanup() {
        let parent = tempfile::tempdir().unwrap();
        let run_path = {
            let context = RunContext::new(Some(parent.path()), false).unwrap();
            std::fs::write(context.path().join("scratch"), "x").unwrap();
            context.path().to_path_buf()
        };
        assert!(!run_path.exists());

        let kept_path = {
            let context = RunContext::new(Some(parent.path()), true).unwrap();
            context.path().to_path_buf()
        };
        assert!(kept_path.exists());
    }

    #[test]
    fn test_cancel_before_start() {
        let token = CancellationToken::new();
        let context = RunContext::new(None, false).unwrap().with_cancellation(token.clone());
        token.cancel();
        let engine = ExternalPhaseEngine::new(PathBuf::from("PHASE"), Default::default());
        assert!(matches!(engine.invoke("", &context), Err(ConvPhaseError::EngineCancelled)));
    }

    #[test]
    fn test_engine_unavailable() {
        let context = RunContext::new(None, false).unwrap();
        let engine = ExternalPhaseEngine::new(PathBuf::from("./definitely-not-a-phase-binary"), Default::default());
        assert!(matches!(engine.invoke("", &context), Err(ConvPhaseError::EngineUnavailable { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_failure_captures_output() {
        let context = RunContext::new(None, false).unwrap();
        let engine = ExternalPhaseEngine::new(PathBuf::from("sh"), Default::default())
            .with_args(vec!["-c".to_string(), "echo started; echo broken input >&2; exit 3".to_string()]);
        match engine.invoke("", &context) {
            Err(ConvPhaseError::EngineExecution { stdout, stderr, .. }) => {
                assert_eq!(stdout, "started");
                assert_eq!(stderr, "broken input");
            },
            other => panic!("unexpected result: {other:?}")
        };
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_timeout() {
        let context = RunContext::new(None, false).unwrap();
        let parameters = EngineParameters {
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let engine = ExternalPhaseEngine::new(PathBuf::from("sh"), parameters)
            .with_args(vec!["-c".to_string(), "sleep 10".to_string()]);
        let start = Instant::now();
        let result = engine.invoke("", &context);
        assert!(matches!(result, Err(ConvPhaseError::EngineTimeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_while_running() {
        let parent = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let context = RunContext::new(Some(parent.path()), false).unwrap().with_cancellation(token.clone());
        let run_path = context.path().to_path_buf();
        let engine = ExternalPhaseEngine::new(PathBuf::from("sh"), Default::default())
            .with_args(vec!["-c".to_string(), "sleep 10".to_string()]);

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            token.cancel();
        });
        let start = Instant::now();
        let result = engine.invoke("", &context);
        canceller.join().unwrap();
        assert!(matches!(result, Err(ConvPhaseError::EngineCancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));

        std::mem::drop(context);
        assert!(!run_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_engine_success_reads_output() {
        let context = RunContext::new(None, false).unwrap();
        // with -c, $0 is "phase" and the generated -p, -q, input, output follow as $1..$4
        let engine = ExternalPhaseEngine::new(PathBuf::from("sh"), Default::default())
            .with_args(vec!["-c".to_string(), "cat \"$3\" > \"$4\"".to_string(), "phase".to_string()]);
        let output = engine.invoke("1\n0\n", &context).unwrap();
        assert_eq!(output, "1\n0\n");
        assert!(context.path().join(ENGINE_INPUT_FILENAME).exists());
    }
}
