use crate::error::Error;
use crate::hasher;
use serde::Serialize;
use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const FFMPEG_CANDIDATES: &[&str] = &[
    "ffmpeg",
    "/usr/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/opt/homebrew/bin/ffmpeg",
];

const FFPROBE_CANDIDATES: &[&str] = &[
    "ffprobe",
    "/usr/bin/ffprobe",
    "/usr/local/bin/ffprobe",
    "/opt/homebrew/bin/ffprobe",
];

const THUMB_WIDTH: u32 = 320;
const THUMB_HEIGHT: u32 = 180;

/// Media metadata for one video file. `success=false` means the external
/// tool was unavailable or failed and only the file size is trustworthy.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub duration_secs: f64,
    pub bitrate: u64,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Thumbnail {
    pub path: PathBuf,
    pub time_offset: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FfmpegInfo {
    pub use_ffmpeg: bool,
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
    pub available: bool,
    pub version: Option<String>,
}

/// Wraps the external ffmpeg/ffprobe tools. Both are optional: when absent
/// every probe degrades to a stat-only result and thumbnail generation is
/// a no-op, without surfacing errors to the import loop.
pub struct MediaProbe {
    cache_path: PathBuf,
    use_ffmpeg: bool,
    timeout: Duration,
    ffmpeg_path: Option<PathBuf>,
    ffprobe_path: Option<PathBuf>,
}

impl MediaProbe {
    pub fn new(cache_path: &Path, use_ffmpeg: bool, timeout: Duration) -> Self {
        let ffmpeg_path = use_ffmpeg
            .then(|| locate_tool(FFMPEG_CANDIDATES))
            .flatten();
        let ffprobe_path = use_ffmpeg
            .then(|| locate_tool(FFPROBE_CANDIDATES))
            .flatten();

        match (&ffmpeg_path, &ffprobe_path) {
            (Some(ffmpeg), Some(ffprobe)) => debug!(
                "Media tools found: ffmpeg={}, ffprobe={}",
                ffmpeg.display(),
                ffprobe.display()
            ),
            _ => debug!("ffmpeg/ffprobe not available, media enrichment disabled"),
        }

        Self {
            cache_path: cache_path.to_path_buf(),
            use_ffmpeg,
            timeout,
            ffmpeg_path,
            ffprobe_path,
        }
    }

    pub fn is_available(&self) -> bool {
        self.use_ffmpeg && self.ffmpeg_path.is_some() && self.ffprobe_path.is_some()
    }

    /// Extract duration/bitrate/resolution/codec via ffprobe. Any failure
    /// (tool missing, bad exit, unparseable JSON, timeout) falls back to a
    /// stat-only result; this method never errors.
    pub fn probe(&self, path: &Path) -> ProbeResult {
        let ffprobe = match (&self.use_ffmpeg, &self.ffprobe_path) {
            (true, Some(ffprobe)) => ffprobe.clone(),
            _ => return fallback_probe(path),
        };

        match self.run_ffprobe(&ffprobe, path) {
            Ok(result) => result,
            Err(err) => {
                warn!("ffprobe failed for {}: {}", path.display(), err);
                fallback_probe(path)
            }
        }
    }

    fn run_ffprobe(&self, ffprobe: &Path, path: &Path) -> Result<ProbeResult, Error> {
        let mut cmd = Command::new(ffprobe);
        cmd.arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(path);

        let output = run_with_timeout(cmd, self.timeout)?;
        if !output.status.success() {
            return Err(Error::Probe(format!(
                "ffprobe exited with {}",
                output.status
            )));
        }

        let data: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Probe(format!("unparseable ffprobe output: {}", e)))?;
        Ok(parse_ffprobe_output(&data))
    }

    /// Generate a single thumbnail, content-addressed by the file's hash so
    /// an unchanged video reuses its existing image without another ffmpeg
    /// invocation. Returns `None` on any failure.
    pub fn generate_thumbnail(&self, path: &Path, offset_secs: f64) -> Option<PathBuf> {
        let ffmpeg = match (&self.use_ffmpeg, &self.ffmpeg_path) {
            (true, Some(ffmpeg)) => ffmpeg.clone(),
            _ => return None,
        };

        let file_hash = hasher::hash_file(path);
        let thumb_path = self.thumbs_dir().ok()?.join(format!("{}.jpg", file_hash.hex));
        if thumb_path.exists() {
            return Some(thumb_path);
        }

        self.run_ffmpeg_thumbnail(&ffmpeg, path, offset_secs, &thumb_path)
    }

    /// Sample `count` evenly spaced thumbnails across the clip. Requires a
    /// successful probe for the duration; unknown or zero duration yields
    /// an empty list.
    pub fn generate_thumbnails(&self, path: &Path, count: usize) -> Vec<Thumbnail> {
        let ffmpeg = match (&self.use_ffmpeg, &self.ffmpeg_path) {
            (true, Some(ffmpeg)) => ffmpeg.clone(),
            _ => return Vec::new(),
        };

        let info = self.probe(path);
        if !info.success || info.duration_secs <= 0.0 {
            return Vec::new();
        }

        let thumbs_dir = match self.thumbs_dir() {
            Ok(dir) => dir,
            Err(_) => return Vec::new(),
        };
        let file_hash = hasher::hash_file(path);

        let mut thumbnails = Vec::new();
        for i in 0..count {
            let offset = (info.duration_secs / (count as f64 + 1.0)) * (i as f64 + 1.0);
            let thumb_path = thumbs_dir.join(format!("{}_{}.jpg", file_hash.hex, i));

            let generated = if thumb_path.exists() {
                Some(thumb_path)
            } else {
                self.run_ffmpeg_thumbnail(&ffmpeg, path, offset, &thumb_path)
            };

            if let Some(thumb) = generated {
                thumbnails.push(Thumbnail {
                    path: thumb,
                    time_offset: offset,
                });
            }
        }
        thumbnails
    }

    fn run_ffmpeg_thumbnail(
        &self,
        ffmpeg: &Path,
        path: &Path,
        offset_secs: f64,
        thumb_path: &Path,
    ) -> Option<PathBuf> {
        let scale = format!(
            "scale={}:{}:force_original_aspect_ratio=decrease",
            THUMB_WIDTH, THUMB_HEIGHT
        );
        let mut cmd = Command::new(ffmpeg);
        cmd.arg("-ss")
            .arg(format!("{:.2}", offset_secs))
            .arg("-i")
            .arg(path)
            .arg("-vframes")
            .arg("1")
            .arg("-vf")
            .arg(scale)
            .arg("-y")
            .arg(thumb_path);

        match run_with_timeout(cmd, self.timeout) {
            Ok(output) if output.status.success() && thumb_path.exists() => {
                Some(thumb_path.to_path_buf())
            }
            Ok(output) => {
                warn!(
                    "Thumbnail generation for {} exited with {}",
                    path.display(),
                    output.status
                );
                None
            }
            Err(err) => {
                warn!("Thumbnail generation for {} failed: {}", path.display(), err);
                None
            }
        }
    }

    fn thumbs_dir(&self) -> std::io::Result<PathBuf> {
        let dir = self.cache_path.join("thumbs");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn info(&self) -> FfmpegInfo {
        FfmpegInfo {
            use_ffmpeg: self.use_ffmpeg,
            ffmpeg_path: self.ffmpeg_path.as_ref().map(|p| p.display().to_string()),
            ffprobe_path: self.ffprobe_path.as_ref().map(|p| p.display().to_string()),
            available: self.is_available(),
            version: self.version(),
        }
    }

    /// First line of `ffmpeg -version`, if the tool is present.
    pub fn version(&self) -> Option<String> {
        let ffmpeg = self.ffmpeg_path.as_ref()?;
        let mut cmd = Command::new(ffmpeg);
        cmd.arg("-version");
        let output = run_with_timeout(cmd, Duration::from_secs(5)).ok()?;
        let text = String::from_utf8_lossy(&output.stdout);
        text.lines().next().map(|line| line.trim().to_string())
    }
}

fn parse_ffprobe_output(data: &serde_json::Value) -> ProbeResult {
    let format = &data["format"];
    let empty = Vec::new();
    let streams = data["streams"].as_array().unwrap_or(&empty);

    let video_stream = streams.iter().find(|s| s["codec_type"] == "video");

    let as_f64 = |v: &serde_json::Value| -> f64 {
        v.as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| v.as_f64())
            .unwrap_or(0.0)
    };
    let as_u64 = |v: &serde_json::Value| -> u64 {
        v.as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| v.as_u64())
            .unwrap_or(0)
    };

    ProbeResult {
        duration_secs: as_f64(&format["duration"]),
        bitrate: as_u64(&format["bit_rate"]),
        size: as_u64(&format["size"]),
        width: video_stream
            .map(|s| s["width"].as_u64().unwrap_or(0) as u32)
            .unwrap_or(0),
        height: video_stream
            .map(|s| s["height"].as_u64().unwrap_or(0) as u32)
            .unwrap_or(0),
        codec: video_stream
            .and_then(|s| s["codec_name"].as_str())
            .unwrap_or("unknown")
            .to_string(),
        success: true,
    }
}

fn fallback_probe(path: &Path) -> ProbeResult {
    let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    ProbeResult {
        duration_secs: 0.0,
        bitrate: 0,
        size,
        width: 0,
        height: 0,
        codec: "unknown".to_string(),
        success: false,
    }
}

/// Resolve the first usable candidate: absolute paths must exist, bare
/// names are searched on PATH.
fn locate_tool(candidates: &[&str]) -> Option<PathBuf> {
    for candidate in candidates {
        let path = Path::new(candidate);
        if path.components().count() > 1 {
            if path.exists() {
                return Some(path.to_path_buf());
            }
        } else if let Some(found) = search_path(candidate) {
            return Some(found);
        }
    }
    None
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let exe = dir.join(format!("{}.exe", name));
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}

/// Run a command, killing it if it exceeds `timeout`. A hung external tool
/// must not block the whole import run.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<Output, Error> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    // Drain stdout on its own thread; a child writing more than the pipe
    // buffer would otherwise block and never reach try_wait's exit.
    let mut stdout_pipe = child.stdout.take();
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait()? {
            Some(status) => {
                let stdout = reader.join().unwrap_or_default();
                return Ok(Output {
                    status,
                    stdout,
                    stderr: Vec::new(),
                });
            }
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                return Err(Error::Probe(format!(
                    "command timed out after {:.0}s",
                    timeout.as_secs_f64()
                )));
            }
            None => thread::sleep(Duration::from_millis(50)),
        }
    }
}
