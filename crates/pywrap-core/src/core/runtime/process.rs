use std::{
    collections::VecDeque,
    ffi::OsStr,
    io::{self, Read},
    path::Path,
    process::{Command, Stdio},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};

const CAPTURE_CAP: usize = 1024 * 1024;
const TRUNCATED_NOTICE: &str = "[...truncated...]\n";

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs a provisioning helper (venv, pip) to completion. Stdin is closed and
/// both output streams are captured, keeping the terminal free for the
/// interpreter that runs afterwards.
///
/// # Errors
///
/// Returns an error when the program cannot be spawned or its output cannot be
/// read.
pub fn run_command<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    envs: &[(String, String)],
    cwd: &Path,
) -> Result<RunOutput> {
    let display = program.display().to_string();
    let mut child = Command::new(program)
        .args(args)
        .envs(envs.iter().map(|(key, value)| (key, value)))
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start {display}"))?;

    let stdout = child.stdout.take().map(capture_tail);
    let stderr = child.stderr.take().map(capture_tail);
    let status = child
        .wait()
        .with_context(|| format!("failed to wait for {display}"))?;

    Ok(RunOutput {
        code: status.code().unwrap_or(-1),
        stdout: collect(stdout, "stdout", &display)?,
        stderr: collect(stderr, "stderr", &display)?,
    })
}

fn capture_tail<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<io::Result<String>> {
    thread::spawn(move || {
        let mut tail = Tail::new(CAPTURE_CAP);
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return Ok(tail.into_text()),
                Ok(read) => tail.push(&buf[..read]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
    })
}

fn collect(
    handle: Option<JoinHandle<io::Result<String>>>,
    stream: &str,
    program: &str,
) -> Result<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    handle
        .join()
        .map_err(|_| anyhow!("{stream} reader for {program} panicked"))?
        .with_context(|| format!("failed to read {stream} of {program}"))
}

/// The newest `cap` bytes of a stream. pip prints the actual failure last.
struct Tail {
    bytes: VecDeque<u8>,
    cap: usize,
    dropped: bool,
}

impl Tail {
    fn new(cap: usize) -> Self {
        Self {
            bytes: VecDeque::new(),
            cap,
            dropped: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let skip = chunk.len().saturating_sub(self.cap);
        let chunk = &chunk[skip..];
        let overflow = (self.bytes.len() + chunk.len()).saturating_sub(self.cap);
        self.dropped |= skip > 0 || overflow > 0;
        self.bytes.drain(..overflow);
        self.bytes.extend(chunk);
    }

    fn into_text(self) -> String {
        let bytes = Vec::from(self.bytes);
        let text = String::from_utf8_lossy(&bytes);
        if self.dropped {
            format!("{TRUNCATED_NOTICE}{text}")
        } else {
            text.into_owned()
        }
    }
}
