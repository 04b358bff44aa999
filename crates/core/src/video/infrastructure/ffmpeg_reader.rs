use std::path::Path;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::stream::Stream;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video as DecodedFrame;
use ffmpeg_next::{codec, decoder, media};

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

type FrameResult = Result<Frame, Box<dyn std::error::Error>>;

/// Reads video files through ffmpeg and yields RGB24 [`Frame`]s.
#[derive(Default)]
pub struct FfmpegReader {
    source: Option<OpenSource>,
}

// Safety: the reader is driven from one thread at a time and never hands
// out the raw ffmpeg pointers it owns.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Container, decoder and the index of the stream being decoded.
struct OpenSource {
    input: Input,
    stream_index: usize,
    decoder: RgbDecoder,
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        self.source = None;

        let input = ffmpeg_next::format::input(path)?;
        let stream = input
            .streams()
            .best(media::Type::Video)
            .ok_or("no video stream found")?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            f64::from(rate)
        } else {
            0.0
        };
        let stream_index = stream.index();
        let total_frames = stream.frames().max(0) as usize;
        let decoder = RgbDecoder::for_stream(&stream)?;

        let metadata = VideoMetadata {
            width: decoder.width,
            height: decoder.height,
            fps,
            total_frames,
            source_path: Some(path.to_path_buf()),
        };
        log::debug!(
            "Opened {} ({}x{} @ {:.2} fps, {} frames advertised)",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames
        );

        self.source = Some(OpenSource {
            input,
            stream_index,
            decoder,
        });
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = FrameResult> + '_> {
        match self.source.as_mut() {
            Some(source) => Box::new(FrameIter {
                source,
                state: DecodeState::Reading,
            }),
            None => Box::new(std::iter::once(Err("video source is not open".into()))),
        }
    }

    fn close(&mut self) {
        if self.source.take().is_some() {
            log::debug!("Closed video source");
        }
    }
}

/// Video decoder plus the converter to packed RGB24.
struct RgbDecoder {
    decoder: decoder::Video,
    scaler: scaling::Context,
    width: u32,
    height: u32,
    next_index: usize,
}

impl RgbDecoder {
    fn for_stream(stream: &Stream<'_>) -> Result<Self, Box<dyn std::error::Error>> {
        let decoder = codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;
        let (width, height) = (decoder.width(), decoder.height());
        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;
        Ok(Self {
            decoder,
            scaler,
            width,
            height,
            next_index: 0,
        })
    }

    /// Next decoded picture, if the decoder has one ready.
    fn receive(&mut self) -> Option<FrameResult> {
        let mut decoded = DecodedFrame::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb = DecodedFrame::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb) {
            return Some(Err(e.into()));
        }

        let frame = Frame::new(
            packed_rgb(&rgb, self.width, self.height),
            self.width,
            self.height,
            self.next_index,
        );
        self.next_index += 1;
        Some(Ok(frame))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Reading,
    Draining,
    Finished,
}

/// Decodes lazily, one packet at a time.
struct FrameIter<'a> {
    source: &'a mut OpenSource,
    state: DecodeState,
}

impl FrameIter<'_> {
    /// Sends the next packet of our stream to the decoder, or EOF once the
    /// container runs out.
    fn feed(&mut self) {
        let OpenSource {
            input,
            stream_index,
            decoder,
        } = &mut *self.source;

        for (stream, packet) in input.packets() {
            if stream.index() != *stream_index {
                continue;
            }
            match decoder.decoder.send_packet(&packet) {
                Ok(()) => return,
                Err(e) => log::trace!("Skipping undecodable packet: {e}"),
            }
        }

        if let Err(e) = decoder.decoder.send_eof() {
            log::trace!("Decoder rejected EOF: {e}");
        }
        self.state = DecodeState::Draining;
    }
}

impl Iterator for FrameIter<'_> {
    type Item = FrameResult;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.state == DecodeState::Finished {
                return None;
            }
            if let Some(result) = self.source.decoder.receive() {
                if result.is_err() {
                    self.state = DecodeState::Finished;
                }
                return Some(result);
            }
            match self.state {
                DecodeState::Reading => self.feed(),
                DecodeState::Draining | DecodeState::Finished => {
                    self.state = DecodeState::Finished;
                }
            }
        }
    }
}

/// Drops the per-row padding ffmpeg may add after `width * 3` bytes.
fn packed_rgb(frame: &DecodedFrame, width: u32, height: u32) -> Vec<u8> {
    let row_bytes = width as usize * 3;
    frame
        .data(0)
        .chunks(frame.stride(0))
        .take(height as usize)
        .flat_map(|row| &row[..row_bytes])
        .copied()
        .collect()
}
