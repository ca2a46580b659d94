use std::{
    ffi::OsString,
    io::Read,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use log::{debug, trace, warn};

use crate::error::{Error, Result};


const POLL_INTERVAL: Duration = Duration::from_millis(20);
const STDERR_TAIL_LINES: usize = 5;

/// One external program call on behalf of a family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub family: String,
    /// Name of the tool as configured, used in messages.
    pub tool: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

/// Runs external programs for the pipeline stages.
///
/// Implementations are shared between the worker threads.
pub trait ToolRunner: Sync {
    /// Resolves a configured program to an executable path.
    fn locate(&self, program: &str) -> Result<PathBuf>;

    /// Runs the invocation and checks that it exited successfully and wrote `expected_output`.
    fn run(&self, invocation: &ToolInvocation, expected_output: &Path) -> Result<()>;

    /// Runs the invocation and returns its standard output.
    fn capture(&self, invocation: &ToolInvocation) -> Result<String>;
}

/// Runs tools as child processes, optionally killing them after a timeout.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ToolInvocation {
    pub fn new(
        family: impl Into<String>,
        tool: impl Into<String>,
        program: impl Into<PathBuf>,
    ) -> Self {
        Self {
            family: family.into(),
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The command line for log messages.
    pub fn command_line(&self) -> String {
        let mut result = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            result.push(' ');
            result.push_str(&arg.to_string_lossy());
        }
        result
    }

    fn failed(&self, status: Option<i32>, detail: impl Into<String>) -> Error {
        Error::ToolExecutionFailed {
            family: self.family.clone(),
            tool: self.tool.clone(),
            status,
            detail: detail.into(),
        }
    }
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn execute(&self, invocation: &ToolInvocation, capture_stdout: bool) -> Result<Vec<u8>> {
        debug!(
            "Family {}: running {}",
            invocation.family,
            invocation.command_line()
        );

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(if capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| invocation.failed(None, format!("unable to start: {error}")))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match self.timeout {
            Some(timeout) => {
                let start = Instant::now();
                loop {
                    match child.try_wait() {
                        Ok(Some(status)) => break status,
                        Ok(None) if start.elapsed() >= timeout => {
                            if let Err(error) = child.kill() {
                                warn!("Unable to kill {}: {error}", invocation.tool);
                            }
                            let _ = child.wait();
                            // The reader threads end once the pipes close.
                            return Err(Error::Timeout {
                                family: invocation.family.clone(),
                                tool: invocation.tool.clone(),
                                timeout,
                            });
                        }
                        Ok(None) => std::thread::sleep(POLL_INTERVAL),
                        Err(error) => {
                            return Err(invocation.failed(None, format!("unable to wait: {error}")));
                        }
                    }
                }
            }
            None => child
                .wait()
                .map_err(|error| invocation.failed(None, format!("unable to wait: {error}")))?,
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);
        trace!(
            "{} exited with {status} after writing {} bytes to stdout",
            invocation.tool,
            stdout.len()
        );

        if status.success() {
            Ok(stdout)
        } else {
            Err(invocation.failed(status.code(), failure_detail(status, &stderr)))
        }
    }
}

impl ToolRunner for ProcessRunner {
    fn locate(&self, program: &str) -> Result<PathBuf> {
        let path = resolve_executable_path(program).ok_or_else(|| Error::ToolNotFound {
            tool: program.to_string(),
        })?;
        debug!("Resolved {program} to {path:?}");
        Ok(path)
    }

    fn run(&self, invocation: &ToolInvocation, expected_output: &Path) -> Result<()> {
        self.execute(invocation, false)?;

        let written = std::fs::metadata(expected_output)
            .map(|metadata| metadata.len() > 0)
            .unwrap_or(false);
        if written {
            Ok(())
        } else {
            Err(invocation.failed(
                Some(0),
                format!("no output was written to {expected_output:?}"),
            ))
        }
    }

    fn capture(&self, invocation: &ToolInvocation) -> Result<String> {
        let stdout = self.execute(invocation, true)?;
        String::from_utf8(stdout)
            .map_err(|error| invocation.failed(Some(0), format!("output is not UTF-8: {error}")))
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Err(error) = pipe.read_to_end(&mut buffer) {
            trace!("Stopped reading tool output: {error}");
        }
        buffer
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default()
}

fn failure_detail(status: ExitStatus, stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let lines: Vec<_> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let tail = &lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..];

    if tail.is_empty() {
        format!("{status}")
    } else {
        format!("{status}: {}", tail.join(" | "))
    }
}

/// Resolves a program name the way a shell would.
///
/// Names containing a path separator are used as given, all others are searched in `PATH`.
pub fn resolve_executable_path(program: &str) -> Option<PathBuf> {
    let program = program.trim();
    if program.is_empty() {
        return None;
    }
    if program.contains(std::path::is_separator) {
        let candidate = PathBuf::from(program);
        return is_executable_file(&candidate).then_some(candidate);
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|directory| directory.join(program))
        .find(|candidate| is_executable_file(candidate))
}

fn is_executable_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|metadata| metadata.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        true
    }
}
