// FFmpeg frame source - Decodes the best video stream of a file to RGB24

use std::path::Path;

use ffmpeg_next as ffmpeg;
use tracing::debug;

use crate::domain::model::{Frame, VideoInfo};
use crate::error::{SightclipError, SightclipResult};
use crate::ports::{FrameSource, SourceOpener};

/// Opens video files with libavformat
pub struct FfmpegSourceOpener;

impl FfmpegSourceOpener {
    pub fn new() -> SightclipResult<Self> {
        ffmpeg::init()?;
        Ok(Self)
    }
}

impl SourceOpener for FfmpegSourceOpener {
    fn open(&self, path: &Path) -> SightclipResult<Box<dyn FrameSource>> {
        let source = FfmpegFrameSource::open(path).map_err(|e| match e {
            SightclipError::Ffmpeg(inner) => SightclipError::SourceOpen {
                path: path.display().to_string(),
                message: inner.to_string(),
            },
            other => other,
        })?;
        Ok(Box::new(source))
    }
}

pub struct FfmpegFrameSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    info: VideoInfo,
    next_index: u64,
    eof_sent: bool,
}

impl FfmpegFrameSource {
    pub fn open(path: &Path) -> SightclipResult<Self> {
        let input = ffmpeg::format::input(&path)?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| SightclipError::SourceOpen {
                path: path.display().to_string(),
                message: "file has no video track".to_string(),
            })?;
        let stream_index = stream.index();
        let fps = f64::from(stream.avg_frame_rate());
        let total_frames = stream.frames().max(0) as u64;

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context.decoder().video()?;

        let scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::Flags::BILINEAR,
        )?;

        let info = VideoInfo::new(decoder.width(), decoder.height(), fps, total_frames)?;
        debug!(path = %path.display(), ?info, "Opened video with ffmpeg");

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            info,
            next_index: 0,
            eof_sent: false,
        })
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> SightclipResult<Frame> {
        let mut rgb = ffmpeg::frame::Video::empty();
        self.scaler.run(decoded, &mut rgb)?;
        let pixels = frame_to_pixels(&rgb)?;

        let frame = Frame::from_rgb(self.next_index, rgb.width(), rgb.height(), pixels)?;
        self.next_index += 1;
        Ok(frame)
    }
}

impl FrameSource for FfmpegFrameSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> SightclipResult<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            let next = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index() == self.stream_index, packet));
            match next {
                Some((true, packet)) => self.decoder.send_packet(&packet).map_err(|e| {
                    SightclipError::Decode {
                        message: e.to_string(),
                    }
                })?,
                Some((false, _)) => {}
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }
}

/// Copy the packed RGB rows out of a possibly padded frame
fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> SightclipResult<Vec<u8>> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let row_bytes = width * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok(data[..row_bytes * height].to_vec());
    }

    let mut pixels = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        let slice = data
            .get(start..start + row_bytes)
            .ok_or_else(|| SightclipError::Decode {
                message: format!("frame row {} is out of bounds", row),
            })?;
        pixels.extend_from_slice(slice);
    }
    Ok(pixels)
}
