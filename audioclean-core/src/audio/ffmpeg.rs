//! Codec backend that shells out to an `ffmpeg` executable for MP3/FLAC output.
//!
//! Decoding and WAV output stay in-process ([`NativeCodec`]). For compressed
//! targets the waveform is written as a transient WAV inside the batch
//! [`ScratchSpace`], converted by ffmpeg into a second transient file, and
//! read back. Both files are `NamedTempFile`s, so they are removed on every
//! exit path, including ffmpeg failures.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use super::codec::{encode_wav, AudioCodec, NativeCodec};
use super::{AudioFormat, Waveform};
use crate::error::{AudioCleanError, Result};
use crate::scratch::ScratchSpace;

#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    executable: PathBuf,
    native: NativeCodec,
}

impl FfmpegCodec {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            native: NativeCodec::new(),
        }
    }

    /// Look for an executable `ffmpeg` on `PATH`.
    pub fn locate() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Look for an executable `ffmpeg` in `search_path`, a `PATH`-style list
    /// of directories.
    pub fn locate_in(search_path: impl AsRef<OsStr>) -> Option<Self> {
        let cwd = std::env::current_dir().ok()?;
        which::which_in("ffmpeg", Some(search_path), cwd)
            .ok()
            .map(Self::new)
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn transcode(
        &self,
        waveform: &Waveform,
        format: AudioFormat,
        scratch: &ScratchSpace,
    ) -> Result<Vec<u8>> {
        let mut input = scratch.temp_file(".wav")?;
        input.write_all(&encode_wav(waveform)?)?;
        input.flush()?;

        let output = scratch.temp_file(&format!(".{}", format.extension()))?;

        let mut command = Command::new(&self.executable);
        command
            .arg("-y")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(input.path())
            .args(codec_args(format))
            .arg(output.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        debug!("ffmpeg command: {:?}", command);

        let result = command.output().map_err(|e| {
            AudioCleanError::Encode(format!(
                "failed to run {}: {e}",
                self.executable.display()
            ))
        })?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AudioCleanError::Encode(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }

        Ok(std::fs::read(output.path())?)
    }
}

impl AudioCodec for FfmpegCodec {
    fn decode(&self, bytes: &[u8], format: AudioFormat) -> Result<Waveform> {
        self.native.decode(bytes, format)
    }

    fn encode(
        &self,
        waveform: &Waveform,
        format: AudioFormat,
        scratch: &ScratchSpace,
    ) -> Result<Vec<u8>> {
        match format {
            AudioFormat::Wav => self.native.encode(waveform, format, scratch),
            AudioFormat::Mp3 | AudioFormat::Flac => self.transcode(waveform, format, scratch),
        }
    }
}

fn codec_args(format: AudioFormat) -> &'static [&'static str] {
    match format {
        AudioFormat::Wav => &["-f", "wav", "-codec:a", "pcm_s16le"],
        AudioFormat::Mp3 => &["-f", "mp3", "-codec:a", "libmp3lame", "-q:a", "2"],
        AudioFormat::Flac => &["-f", "flac", "-codec:a", "flac"],
    }
}
