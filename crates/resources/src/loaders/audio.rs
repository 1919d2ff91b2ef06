use futures::FutureExt;
use futures::future::LocalBoxFuture;
use kira::sound::static_sound::StaticSoundData;
use scenekit_common::ResourceKind;
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

use crate::error::ResourceError;
use crate::loader::ResourceLoader;
use crate::options::LoadOptions;
use crate::source::AssetSource;

/// Decoded PCM audio, interleaved stereo `f32` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }
}

/// Decodes WAV and Ogg Vorbis files into [`AudioBuffer`]s.
pub struct AudioLoader {
    source: Rc<dyn AssetSource>,
}

impl AudioLoader {
    pub fn new(source: Rc<dyn AssetSource>) -> Self {
        Self { source }
    }
}

impl ResourceLoader for AudioLoader {
    type Asset = AudioBuffer;

    fn kind(&self) -> &str {
        ResourceKind::AUDIO
    }

    fn load<'a>(
        &'a self,
        url: &'a str,
        _options: &'a LoadOptions,
    ) -> LocalBoxFuture<'a, Result<AudioBuffer, ResourceError>> {
        async move {
            let bytes = self.source.fetch(url).await?;
            let sound = StaticSoundData::from_cursor(Cursor::new(bytes))
                .map_err(|e| ResourceError::load_failure(url, e))?;
            let samples = sound
                .frames
                .iter()
                .flat_map(|frame| [frame.left, frame.right])
                .collect();
            Ok(AudioBuffer {
                sample_rate: sound.sample_rate,
                channels: 2,
                samples,
            })
        }
        .boxed_local()
    }

    fn approx_size(&self, buffer: &AudioBuffer) -> usize {
        buffer.samples.len() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    /// Minimal 16-bit mono PCM WAV.
    fn wav_fixture(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[tokio::test]
    async fn decodes_wav_into_stereo_pcm() {
        let source = MemorySource::new();
        source.insert("beep.wav", wav_fixture(8000, &[0; 800]));
        let loader = AudioLoader::new(Rc::new(source));

        let buffer = loader.load("beep.wav", &LoadOptions::new()).await.unwrap();
        assert_eq!(buffer.sample_rate, 8000);
        assert_eq!(buffer.channels, 2);
        assert_eq!(buffer.frame_count(), 800);
        assert_eq!(buffer.duration().as_millis(), 100);
        assert_eq!(loader.approx_size(&buffer), 800 * 2 * 4);
    }

    #[tokio::test]
    async fn undecodable_audio_reports_url() {
        let source = MemorySource::new();
        source.insert("noise.wav", b"definitely not audio".to_vec());
        let loader = AudioLoader::new(Rc::new(source));
        let err = loader.load("noise.wav", &LoadOptions::new()).await.unwrap_err();
        assert!(matches!(err, ResourceError::LoadFailure { ref url, .. } if url == "noise.wav"));
    }

    #[test]
    fn empty_buffer_has_zero_duration() {
        let buffer = AudioBuffer {
            sample_rate: 0,
            channels: 2,
            samples: Vec::new(),
        };
        assert_eq!(buffer.duration(), Duration::ZERO);
    }
}
