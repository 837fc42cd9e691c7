//! External media transform step (ffmpeg and ffprobe over files in a scratch directory).

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use genmedia_types::GeneratedAsset;

use crate::error::BackendError;

/// Upper bound on inputs for the multi-input operations.
pub const MAX_INPUTS: usize = 10;

/// One input file: its bytes and the extension it is written out with.
#[derive(Debug, Clone)]
pub struct TransformInput {
    pub data: Bytes,
    pub extension: String,
}

impl TransformInput {
    pub fn new(data: impl Into<Bytes>, extension: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            extension: extension.into(),
        }
    }
}

/// A post-processing operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOp {
    /// Re-encode audio to `format` (`mp3` or `wav`).
    ConvertAudio { format: String },
    /// Apply a gain in decibels, keeping the container given by `format`.
    AdjustVolume { gain_db: f64, format: String },
    /// Render a looping GIF from a video.
    CreateGif { fps: u32, width: u32 },
    /// Video track of the first input, audio track of the second.
    CombineAudioVideo,
    /// Second input (an image) drawn over the first (a video) at `x`,`y`.
    OverlayImage { x: u32, y: u32 },
    /// Inputs joined end to end into `format` (`mp4`, `mp3` or `wav`).
    Concatenate { format: String },
    /// Audio inputs mixed together, as long as the longest one.
    LayerAudio { format: String },
}

impl TransformOp {
    pub fn name(&self) -> &'static str {
        match self {
            TransformOp::ConvertAudio { .. } => "convert-audio",
            TransformOp::AdjustVolume { .. } => "adjust-volume",
            TransformOp::CreateGif { .. } => "create-gif",
            TransformOp::CombineAudioVideo => "combine-audio-video",
            TransformOp::OverlayImage { .. } => "overlay-image",
            TransformOp::Concatenate { .. } => "concatenate",
            TransformOp::LayerAudio { .. } => "layer-audio",
        }
    }

    /// How many inputs the operation takes.
    pub fn expected_inputs(&self) -> RangeInclusive<usize> {
        match self {
            TransformOp::ConvertAudio { .. }
            | TransformOp::AdjustVolume { .. }
            | TransformOp::CreateGif { .. } => 1..=1,
            TransformOp::CombineAudioVideo | TransformOp::OverlayImage { .. } => 2..=2,
            TransformOp::Concatenate { .. } | TransformOp::LayerAudio { .. } => 2..=MAX_INPUTS,
        }
    }

    /// MIME type and extension of the output.
    pub fn output_type(&self) -> (&'static str, &'static str) {
        match self {
            TransformOp::ConvertAudio { format }
            | TransformOp::AdjustVolume { format, .. }
            | TransformOp::LayerAudio { format } => audio_format(format),
            TransformOp::Concatenate { format } if format == "mp4" => ("video/mp4", "mp4"),
            TransformOp::Concatenate { format } => audio_format(format),
            TransformOp::CreateGif { .. } => ("image/gif", "gif"),
            TransformOp::CombineAudioVideo | TransformOp::OverlayImage { .. } => {
                ("video/mp4", "mp4")
            }
        }
    }

    /// ffmpeg arguments reading `inputs` and writing `output`.
    ///
    /// For `Concatenate`, `inputs` holds the single concat list file.
    pub fn ffmpeg_args(&self, inputs: &[PathBuf], output: &Path) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
            .into_iter()
            .map(String::from)
            .collect();

        if matches!(self, TransformOp::Concatenate { .. }) {
            args.extend(["-f", "concat", "-safe", "0"].into_iter().map(String::from));
        }
        for input in inputs {
            args.push("-i".into());
            args.push(input.display().to_string());
        }

        match self {
            TransformOp::ConvertAudio { format } => {
                args.push("-vn".into());
                args.extend(codec_args(format));
            }
            TransformOp::AdjustVolume { gain_db, format } => {
                args.push("-vn".into());
                args.push("-af".into());
                args.push(format!("volume={gain_db}dB"));
                args.extend(codec_args(format));
            }
            TransformOp::CreateGif { fps, width } => {
                args.push("-vf".into());
                args.push(format!(
                    "fps={fps},scale={width}:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse"
                ));
                args.extend(["-loop", "0", "-f", "gif"].into_iter().map(String::from));
            }
            TransformOp::CombineAudioVideo => {
                args.extend(
                    [
                        "-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a", "aac",
                        "-shortest", "-f", "mp4",
                    ]
                    .into_iter()
                    .map(String::from),
                );
            }
            TransformOp::OverlayImage { x, y } => {
                args.push("-filter_complex".into());
                args.push(format!("[0:v][1:v]overlay={x}:{y}"));
                args.extend(["-c:a", "copy", "-f", "mp4"].into_iter().map(String::from));
            }
            TransformOp::Concatenate { format } if format == "mp4" => {
                args.extend(["-c", "copy", "-f", "mp4"].into_iter().map(String::from));
            }
            TransformOp::Concatenate { format } => {
                args.push("-vn".into());
                args.extend(codec_args(format));
            }
            TransformOp::LayerAudio { format } => {
                args.push("-filter_complex".into());
                args.push(format!("amix=inputs={}:duration=longest", inputs.len()));
                args.extend(codec_args(format));
            }
        }
        args.push(output.display().to_string());
        args
    }
}

fn audio_format(format: &str) -> (&'static str, &'static str) {
    match format {
        "wav" => ("audio/wav", "wav"),
        _ => ("audio/mpeg", "mp3"),
    }
}

fn codec_args(format: &str) -> Vec<String> {
    let args: &[&str] = match format {
        "wav" => &["-acodec", "pcm_s16le", "-f", "wav"],
        _ => &["-codec:a", "libmp3lame", "-q:a", "2", "-f", "mp3"],
    };
    args.iter().map(|s| s.to_string()).collect()
}

/// "2" or "2 to 10".
pub fn describe_count(range: &RangeInclusive<usize>) -> String {
    if range.start() == range.end() {
        range.start().to_string()
    } else {
        format!("{} to {}", range.start(), range.end())
    }
}

/// Concat demuxer list naming each input file relative to the list itself.
fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .filter_map(|p| p.file_name())
        .map(|name| format!("file '{}'\n", name.to_string_lossy()))
        .collect()
}

#[async_trait]
pub trait MediaTransform: Send + Sync {
    async fn apply(
        &self,
        inputs: Vec<TransformInput>,
        op: &TransformOp,
        cancel: &CancellationToken,
    ) -> Result<GeneratedAsset, BackendError>;

    /// Container and stream metadata, as ffprobe reports it.
    async fn media_info(
        &self,
        input: TransformInput,
        cancel: &CancellationToken,
    ) -> Result<Value, BackendError>;
}

/// Runs the `ffmpeg` and `ffprobe` binaries.
pub struct FfmpegTransform {
    program: PathBuf,
    info_program: PathBuf,
    timeout: Duration,
}

impl FfmpegTransform {
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("ffmpeg", timeout)
    }

    pub fn with_program(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            info_program: PathBuf::from("ffprobe"),
            timeout,
        }
    }

    pub fn with_info_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.info_program = program.into();
        self
    }

    async fn run(
        &self,
        program: &Path,
        args: Vec<String>,
        label: &str,
        cancel: &CancellationToken,
    ) -> Result<Output, BackendError> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        tracing::debug!(program = %program.display(), args = ?args, "Running media tool");

        let child = cmd.spawn().map_err(|e| {
            BackendError::Transform(format!("failed to start {}: {e}", program.display()))
        })?;

        let output = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(BackendError::Transform("canceled".into()));
            }
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => return Err(BackendError::Transform(format!("process error: {e}"))),
                Err(_) => {
                    return Err(BackendError::Transform(format!(
                        "{label} timed out after {}s",
                        self.timeout.as_secs()
                    )));
                }
            },
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            return Err(BackendError::Transform(format!(
                "{label} exited with code {code}: {}",
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

/// Write `inputs` into `dir` as `input<N>.<ext>`.
async fn write_inputs(dir: &Path, inputs: Vec<TransformInput>) -> Result<Vec<PathBuf>, BackendError> {
    let mut paths = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.into_iter().enumerate() {
        let ext = input.extension.trim_start_matches('.');
        let ext = if ext.is_empty() { "bin" } else { ext };
        let path = dir.join(format!("input{i}.{ext}"));
        tokio::fs::write(&path, &input.data)
            .await
            .map_err(|e| BackendError::Transform(format!("failed to stage input: {e}")))?;
        paths.push(path);
    }
    Ok(paths)
}

fn scratch_dir() -> Result<tempfile::TempDir, BackendError> {
    tempfile::tempdir()
        .map_err(|e| BackendError::Transform(format!("failed to create work directory: {e}")))
}

#[async_trait]
impl MediaTransform for FfmpegTransform {
    async fn apply(
        &self,
        inputs: Vec<TransformInput>,
        op: &TransformOp,
        cancel: &CancellationToken,
    ) -> Result<GeneratedAsset, BackendError> {
        let expected = op.expected_inputs();
        if !expected.contains(&inputs.len()) {
            return Err(BackendError::Transform(format!(
                "{} takes {} inputs, got {}",
                op.name(),
                describe_count(&expected),
                inputs.len()
            )));
        }

        let dir = scratch_dir()?;
        let mut paths = write_inputs(dir.path(), inputs).await?;
        if matches!(op, TransformOp::Concatenate { .. }) {
            let list = dir.path().join("inputs.txt");
            tokio::fs::write(&list, concat_list(&paths))
                .await
                .map_err(|e| BackendError::Transform(format!("failed to stage input: {e}")))?;
            paths = vec![list];
        }

        let (mime, ext) = op.output_type();
        let output_path = dir.path().join(format!("output.{ext}"));
        self.run(&self.program, op.ffmpeg_args(&paths, &output_path), op.name(), cancel)
            .await?;

        let data = tokio::fs::read(&output_path).await.map_err(|e| {
            BackendError::Transform(format!("{} produced no output: {e}", op.name()))
        })?;
        if data.is_empty() {
            return Err(BackendError::Transform(format!("{} produced no output", op.name())));
        }

        tracing::info!(op = op.name(), bytes = data.len(), "Media transform finished");
        Ok(GeneratedAsset::from_bytes(data, mime))
    }

    async fn media_info(
        &self,
        input: TransformInput,
        cancel: &CancellationToken,
    ) -> Result<Value, BackendError> {
        let dir = scratch_dir()?;
        let paths = write_inputs(dir.path(), vec![input]).await?;
        let mut args: Vec<String> = [
            "-v", "error", "-print_format", "json", "-show_format", "-show_streams",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.extend(paths.iter().map(|p| p.display().to_string()));

        let output = self
            .run(&self.info_program, args, "get-media-info", cancel)
            .await?;
        serde_json::from_slice(&output.stdout).map_err(|e| {
            BackendError::InvalidResponse(format!("ffprobe printed invalid JSON: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("/work/{n}"))).collect()
    }

    #[test]
    fn test_convert_args() {
        let op = TransformOp::ConvertAudio {
            format: "wav".into(),
        };
        let args = op.ffmpeg_args(&paths(&["input0.mp3"]), Path::new("/work/output.wav"));
        assert_eq!(args.first().map(String::as_str), Some("-hide_banner"));
        assert!(args.windows(2).any(|w| w == ["-i", "/work/input0.mp3"]));
        assert!(args.windows(2).any(|w| w == ["-f", "wav"]));
        assert_eq!(args.last().map(String::as_str), Some("/work/output.wav"));
        assert!(!args.iter().any(|a| a.starts_with("pipe:")));
        assert_eq!(op.output_type(), ("audio/wav", "wav"));
    }

    #[test]
    fn test_volume_args() {
        let op = TransformOp::AdjustVolume {
            gain_db: -3.5,
            format: "mp3".into(),
        };
        let args = op.ffmpeg_args(&paths(&["input0.wav"]), Path::new("/work/output.mp3"));
        assert!(args.contains(&"volume=-3.5dB".to_string()));
        assert_eq!(op.output_type(), ("audio/mpeg", "mp3"));
    }

    #[test]
    fn test_gif_reads_video_from_file() {
        let op = TransformOp::CreateGif { fps: 10, width: 480 };
        let args = op.ffmpeg_args(&paths(&["input0.mp4"]), Path::new("/work/output.gif"));
        assert!(args.windows(2).any(|w| w == ["-i", "/work/input0.mp4"]));
        assert!(args.iter().any(|a| a.starts_with("fps=10,scale=480:-1")));
        assert_eq!(op.output_type(), ("image/gif", "gif"));
    }

    #[test]
    fn test_combine_and_overlay_args() {
        let inputs = paths(&["input0.mp4", "input1.wav"]);
        let args = TransformOp::CombineAudioVideo.ffmpeg_args(&inputs, Path::new("/work/o.mp4"));
        assert!(args.windows(4).any(|w| w == ["-map", "0:v:0", "-map", "1:a:0"]));
        assert!(args.contains(&"-shortest".to_string()));

        let op = TransformOp::OverlayImage { x: 10, y: 20 };
        let args = op.ffmpeg_args(&paths(&["input0.mp4", "input1.png"]), Path::new("/work/o.mp4"));
        assert!(args.contains(&"[0:v][1:v]overlay=10:20".to_string()));
        assert_eq!(op.output_type(), ("video/mp4", "mp4"));
        assert_eq!(op.expected_inputs(), 2..=2);
    }

    #[test]
    fn test_concatenate_uses_list_file() {
        let op = TransformOp::Concatenate {
            format: "mp4".into(),
        };
        let args = op.ffmpeg_args(&paths(&["inputs.txt"]), Path::new("/work/o.mp4"));
        assert!(args.windows(4).any(|w| w == ["-f", "concat", "-safe", "0"]));
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert_eq!(op.output_type(), ("video/mp4", "mp4"));

        let list = concat_list(&paths(&["input0.mp4", "input1.mp4"]));
        assert_eq!(list, "file 'input0.mp4'\nfile 'input1.mp4'\n");

        let audio = TransformOp::Concatenate {
            format: "wav".into(),
        };
        assert_eq!(audio.output_type(), ("audio/wav", "wav"));
    }

    #[test]
    fn test_layer_audio_mixes_every_input() {
        let op = TransformOp::LayerAudio {
            format: "mp3".into(),
        };
        let args = op.ffmpeg_args(
            &paths(&["input0.mp3", "input1.mp3", "input2.wav"]),
            Path::new("/work/o.mp3"),
        );
        assert!(args.contains(&"amix=inputs=3:duration=longest".to_string()));
        assert_eq!(op.expected_inputs(), 2..=MAX_INPUTS);
    }

    #[tokio::test]
    async fn test_inputs_written_to_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let staged = write_inputs(
            dir.path(),
            vec![
                TransformInput::new(Bytes::from_static(b"moov-at-end"), "mp4"),
                TransformInput::new(Bytes::from_static(b"x"), ""),
            ],
        )
        .await
        .unwrap();
        assert_eq!(staged[0], dir.path().join("input0.mp4"));
        assert_eq!(staged[1], dir.path().join("input1.bin"));
        assert_eq!(std::fs::read(&staged[0]).unwrap(), b"moov-at-end");
    }

    #[tokio::test]
    async fn test_wrong_input_count() {
        let transform = FfmpegTransform::new(Duration::from_secs(5));
        let err = transform
            .apply(
                vec![TransformInput::new(Bytes::from_static(b"x"), "mp4")],
                &TransformOp::CombineAudioVideo,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("takes 2 inputs, got 1"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let transform =
            FfmpegTransform::with_program("/nonexistent/ffmpeg-binary", Duration::from_secs(5));
        let err = transform
            .apply(
                vec![TransformInput::new(Bytes::from_static(b"x"), "mp4")],
                &TransformOp::CreateGif { fps: 10, width: 320 },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }

    #[tokio::test]
    async fn test_missing_info_program() {
        let transform = FfmpegTransform::new(Duration::from_secs(5))
            .with_info_program("/nonexistent/ffprobe-binary");
        let err = transform
            .media_info(
                TransformInput::new(Bytes::from_static(b"x"), "mp4"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
