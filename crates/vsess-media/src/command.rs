//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, FfmpegProgress};

/// Output target that writes to the child's stdout.
pub const PIPE_STDOUT: &str = "pipe:1";

/// Number of diagnostic stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path (or `pipe:1`)
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Create a command that writes its output to stdout.
    pub fn to_stdout(input: impl AsRef<Path>) -> Self {
        Self::new(input, PIPE_STDOUT)
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Seek before the input (keyframe-indexed, then decoded forward).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.6}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Force the output container format.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Whether the output goes to stdout.
    pub fn writes_to_stdout(&self) -> bool {
        self.output.as_os_str() == PIPE_STDOUT
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-nostdin".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking and a timeout.
///
/// Children are killed when the runner's future is dropped, so an abandoned
/// request never leaves an FFmpeg process behind.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self { timeout_secs: None }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let mut child = spawn_ffmpeg(cmd, Stdio::null())?;
        let stderr_task = spawn_stderr_reader(&mut child, progress_callback)?;

        let result = self.wait_for_completion(&mut child).await;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        result.map_err(|e| attach_stderr(e, stderr_tail))
    }

    /// Run an FFmpeg command that writes to stdout and collect the bytes.
    pub async fn run_capture(&self, cmd: &FfmpegCommand) -> MediaResult<Vec<u8>> {
        if !cmd.writes_to_stdout() {
            return Err(MediaError::internal("run_capture requires a stdout output"));
        }

        let mut child = spawn_ffmpeg(cmd, Stdio::piped())?;
        let stderr_task = spawn_stderr_reader(&mut child, |_| {})?;
        let stdout_task = spawn_stdout_reader(&mut child)?;

        let result = self.wait_for_completion(&mut child).await;
        let stderr_tail = stderr_task.await.unwrap_or_default();
        let stdout = stdout_task
            .await
            .map_err(|e| MediaError::internal(format!("stdout reader failed: {}", e)))?;

        result.map_err(|e| attach_stderr(e, stderr_tail))?;
        Ok(stdout?)
    }

    /// Wait for the child process, killing it if the timeout elapses.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let status = match self.timeout_secs {
            Some(secs) => {
                let waited = tokio::time::timeout(Duration::from_secs(secs), child.wait()).await;
                match waited {
                    Ok(status) => status?,
                    Err(_) => {
                        warn!("FFmpeg timed out after {} seconds, killing process", secs);
                        let _ = child.kill().await;
                        return Err(MediaError::Timeout(secs));
                    }
                }
            }
            None => child.wait().await?,
        };

        check_status(status)
    }
}

fn spawn_ffmpeg(cmd: &FfmpegCommand, stdout: Stdio) -> MediaResult<Child> {
    check_ffmpeg()?;

    let args = cmd.build_args();
    debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

    Ok(Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?)
}

/// Parse progress from stderr and keep the last diagnostic lines.
fn spawn_stderr_reader<F>(child: &mut Child, progress_callback: F) -> MediaResult<JoinHandle<Vec<String>>>
where
    F: Fn(FfmpegProgress) + Send + 'static,
{
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| MediaError::internal("stderr not captured"))?;

    Ok(tokio::spawn(async move {
        let mut reader = BufReader::new(stderr).lines();
        let mut current = FfmpegProgress::default();
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

        while let Ok(Some(line)) = reader.next_line().await {
            if is_progress_line(&line) {
                if let Some(progress) = current.apply_line(&line) {
                    progress_callback(progress);
                }
            } else if !line.trim().is_empty() {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }

        tail.into_iter().collect()
    }))
}

fn spawn_stdout_reader(child: &mut Child) -> MediaResult<JoinHandle<std::io::Result<Vec<u8>>>> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::internal("stdout not captured"))?;

    Ok(tokio::spawn(read_all(stdout)))
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

fn check_status(status: ExitStatus) -> MediaResult<()> {
    if status.success() {
        Ok(())
    } else {
        Err(MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            None,
            status.code(),
        ))
    }
}

fn attach_stderr(err: MediaError, tail: Vec<String>) -> MediaError {
    match err {
        MediaError::FfmpegFailed {
            message,
            stderr: None,
            exit_code,
        } if !tail.is_empty() => MediaError::FfmpegFailed {
            message,
            stderr: Some(tail.join("\n")),
            exit_code,
        },
        other => other,
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10.0)
            .video_filter("crop=100:100:0:0")
            .video_codec("libx264");

        let args = cmd.build_args();
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert!(args.contains(&"-ss".to_string()));
        assert!(args.contains(&"10.000000".to_string()));
        assert!(args.contains(&"-c:v".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
    }

    #[test]
    fn test_seek_goes_before_input() {
        let args = FfmpegCommand::to_stdout("input.mp4")
            .seek(1.5)
            .single_frame()
            .build_args();

        let seek = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        let frames = args.iter().position(|a| a == "-frames:v").unwrap();
        assert!(seek < input);
        assert!(frames > input);
    }

    #[test]
    fn test_writes_to_stdout() {
        assert!(FfmpegCommand::to_stdout("in.mp4").writes_to_stdout());
        assert!(!FfmpegCommand::new("in.mp4", "out.png").writes_to_stdout());
    }

    #[test]
    fn test_attach_stderr() {
        let err = MediaError::ffmpeg_failed("failed", None, Some(1));
        let err = attach_stderr(err, vec!["Invalid data found".to_string()]);
        match err {
            MediaError::FfmpegFailed { stderr, .. } => {
                assert_eq!(stderr.as_deref(), Some("Invalid data found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = attach_stderr(MediaError::Timeout(5), vec!["x".to_string()]);
        assert!(matches!(err, MediaError::Timeout(5)));
    }

    #[tokio::test]
    async fn test_run_capture_requires_stdout() {
        let cmd = FfmpegCommand::new("in.mp4", "out.png");
        let err = FfmpegRunner::new().run_capture(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::Internal(_)));
    }
}
