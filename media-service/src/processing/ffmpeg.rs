use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::photo;
use super::{MediaProcessor, ProcessingError};
use crate::config::MediaConfig;

const AUDIO_COMMENT: &str = "Distribué par TalentZik - Plateforme musicale camerounaise";
const VIDEO_COMMENT: &str = "TalentZik - Plateforme musicale camerounaise";
const THUMBNAIL_AT_SECONDS: u32 = 3;

/// Runs the `ffmpeg`/`ffprobe` binaries with a hard timeout.
pub struct FfmpegProcessor {
    ffmpeg: String,
    ffprobe: String,
    timeout: Duration,
    watermark: PathBuf,
}

impl FfmpegProcessor {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            timeout: config.ffmpeg_timeout(),
            watermark: config.watermark_path.clone(),
        }
    }

    /// Make sure the overlay logo exists, drawing the default one if needed.
    pub async fn ensure_watermark(&self) -> Result<(), ProcessingError> {
        if tokio::fs::try_exists(&self.watermark).await? {
            return Ok(());
        }

        let path = self.watermark.clone();
        tokio::task::spawn_blocking(move || photo::write_default_watermark(&path))
            .await
            .map_err(|e| ProcessingError::Output(e.to_string()))??;

        info!("Generated default watermark at {:?}", self.watermark);
        Ok(())
    }

    async fn run(&self, program: &str, args: Vec<String>) -> Result<Vec<u8>, ProcessingError> {
        debug!("Running {} {}", program, args.join(" "));

        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessingError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProcessingError::Timeout(program.to_string(), self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("{} failed with status {}: {}", program, output.status, stderr);
            return Err(ProcessingError::Failed {
                program: program.to_string(),
                status: output.status,
                stderr: last_lines(&stderr, 5),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn probe_duration(&self, input: &Path) -> Result<i32, ProcessingError> {
        let stdout = self.run(&self.ffprobe, probe_args(input)).await?;
        let text = String::from_utf8_lossy(&stdout);
        parse_duration(&text).ok_or_else(|| ProcessingError::Output(text.trim().to_string()))
    }

    async fn watermark_audio(&self, input: &Path, output: &Path) -> Result<(), ProcessingError> {
        self.run(&self.ffmpeg, audio_watermark_args(input, output)).await?;
        Ok(())
    }

    async fn watermark_video(&self, input: &Path, output: &Path) -> Result<(), ProcessingError> {
        self.ensure_watermark().await?;
        self.run(&self.ffmpeg, video_watermark_args(input, &self.watermark, output))
            .await?;
        Ok(())
    }

    async fn thumbnail(&self, input: &Path, output: &Path) -> Result<(), ProcessingError> {
        self.run(&self.ffmpeg, thumbnail_args(input, output)).await?;
        Ok(())
    }

    async fn compress_video(
        &self,
        input: &Path,
        output: &Path,
        target_mb: u64,
        duration_seconds: Option<i32>,
    ) -> Result<(), ProcessingError> {
        let bitrate = target_bitrate_kbps(target_mb, duration_seconds);
        self.run(&self.ffmpeg, compress_args(input, output, bitrate)).await?;
        Ok(())
    }

    async fn optimize_photo(&self, input: &Path, output: &Path) -> Result<(), ProcessingError> {
        let (input, output) = (input.to_path_buf(), output.to_path_buf());
        tokio::task::spawn_blocking(move || photo::optimize(&input, &output))
            .await
            .map_err(|e| ProcessingError::Output(e.to_string()))?
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

pub fn probe_args(input: &Path) -> Vec<String> {
    let mut v = args(&[
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]);
    v.push(path_arg(input));
    v
}

pub fn audio_watermark_args(input: &Path, output: &Path) -> Vec<String> {
    let mut v = args(&["-y", "-i"]);
    v.push(path_arg(input));
    v.extend(args(&["-metadata", "title=TalentZik", "-metadata:s:a:0"]));
    v.push(format!("comment={}", AUDIO_COMMENT));
    v.extend(args(&["-acodec", "libmp3lame", "-b:a", "192k"]));
    v.push(path_arg(output));
    v
}

pub fn video_watermark_args(input: &Path, logo: &Path, output: &Path) -> Vec<String> {
    let mut v = args(&["-y", "-i"]);
    v.push(path_arg(input));
    v.push("-i".to_string());
    v.push(path_arg(logo));
    v.extend(args(&[
        "-filter_complex",
        "[0:v][1:v]overlay=W-w-10:H-h-10",
        "-c:v",
        "libx264",
        "-c:a",
        "aac",
        "-metadata",
    ]));
    v.push(format!("comment={}", VIDEO_COMMENT));
    v.push(path_arg(output));
    v
}

pub fn thumbnail_args(input: &Path, output: &Path) -> Vec<String> {
    let mut v = args(&["-y", "-ss"]);
    v.push(THUMBNAIL_AT_SECONDS.to_string());
    v.push("-i".to_string());
    v.push(path_arg(input));
    v.extend(args(&["-vframes", "1", "-f", "image2", "-vcodec", "mjpeg"]));
    v.push(path_arg(output));
    v
}

pub fn compress_args(input: &Path, output: &Path, bitrate_kbps: u32) -> Vec<String> {
    let mut v = args(&["-y", "-i"]);
    v.push(path_arg(input));
    v.extend(args(&["-c:v", "libx264", "-b:v"]));
    v.push(format!("{}k", bitrate_kbps));
    v.extend(args(&["-c:a", "aac", "-b:a", "128k", "-preset", "medium"]));
    v.push(path_arg(output));
    v
}

/// Video bitrate that fits `target_mb` over the clip, with 20% headroom.
pub fn target_bitrate_kbps(target_mb: u64, duration_seconds: Option<i32>) -> u32 {
    match duration_seconds {
        Some(duration) if duration > 0 => {
            let kbps = (target_mb as f64 * 8.0 * 1024.0) / duration as f64 * 0.8;
            (kbps as u32).max(500)
        }
        _ => 1000,
    }
}

pub fn parse_duration(stdout: &str) -> Option<i32> {
    let seconds: f64 = stdout.lines().next()?.trim().parse().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| seconds.round() as i32)
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("183.466000\n"), Some(183));
        assert_eq!(parse_duration("59.5"), Some(60));
        assert_eq!(parse_duration("N/A\n"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("-1"), None);
    }

    #[test]
    fn test_target_bitrate() {
        // 50 MB over 10 minutes
        assert_eq!(target_bitrate_kbps(50, Some(600)), 546);
        // Long clips never go below 500 kbps
        assert_eq!(target_bitrate_kbps(10, Some(3600)), 500);
        assert_eq!(target_bitrate_kbps(50, None), 1000);
        assert_eq!(target_bitrate_kbps(50, Some(0)), 1000);
    }

    #[test]
    fn test_audio_watermark_args() {
        let args = audio_watermark_args(Path::new("/m/in.wav"), Path::new("/m/out.mp3"));
        assert_eq!(&args[..3], &["-y", "-i", "/m/in.wav"]);
        assert!(args.contains(&"title=TalentZik".to_string()));
        assert!(args.contains(&format!("comment={}", AUDIO_COMMENT)));
        assert!(args.windows(2).any(|w| w == ["-b:a", "192k"]));
        assert_eq!(args.last().map(String::as_str), Some("/m/out.mp3"));
    }

    #[test]
    fn test_video_args() {
        let args = video_watermark_args(
            Path::new("in.mp4"),
            Path::new("logo.png"),
            Path::new("out.mp4"),
        );
        assert!(args.contains(&"[0:v][1:v]overlay=W-w-10:H-h-10".to_string()));
        assert!(args.windows(2).any(|w| w == ["-i", "logo.png"]));

        let thumb = thumbnail_args(Path::new("in.mp4"), Path::new("t.jpg"));
        assert_eq!(&thumb[..3], &["-y", "-ss", "3"]);
        assert!(thumb.windows(2).any(|w| w == ["-vframes", "1"]));

        let compress = compress_args(Path::new("in.mp4"), Path::new("o.mp4"), 750);
        assert!(compress.windows(2).any(|w| w == ["-b:v", "750k"]));
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\nc", 2), "b\nc");
        assert_eq!(last_lines("only", 5), "only");
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let config = MediaConfig {
            ffprobe_path: "/nonexistent/ffprobe".to_string(),
            ..MediaConfig::default()
        };
        let processor = FfmpegProcessor::new(&config);
        let err = processor.probe_duration(Path::new("x.mp3")).await.unwrap_err();
        assert!(matches!(err, ProcessingError::Spawn { .. }));
    }
}
