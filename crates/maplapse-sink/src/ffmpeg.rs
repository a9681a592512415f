#![cfg(feature = "sink-ffmpeg")]

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::encoder::FrameEncoder;
use crate::sink::SinkError;
use maplapse_types::VideoFrame;

/// MP4 container output at a fixed frame rate, one stream, MPEG-4 video.
pub struct Mp4Encoder {
    octx: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::context::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    width: u32,
    height: u32,
    pts: i64,
}

impl Mp4Encoder {
    pub fn create(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self, SinkError> {
        ffmpeg::init().map_err(to_sink_error)?;

        let mut octx = ffmpeg::format::output(&path).map_err(to_sink_error)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| SinkError::encode("mpeg4 encoder not available"))?;
        let mut ost = octx.add_stream(codec).map_err(to_sink_error)?;
        let stream_index = ost.index();

        let time_base = ffmpeg::Rational(1, fps.max(1) as i32);
        let mut video = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(to_sink_error)?;
        video.set_width(width);
        video.set_height(height);
        video.set_format(ffmpeg::format::pixel::Pixel::YUV420P);
        video.set_time_base(time_base);
        video.set_frame_rate(Some(ffmpeg::Rational(fps.max(1) as i32, 1)));
        if global_header {
            video.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = video.open_as(codec).map_err(to_sink_error)?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);

        octx.write_header().map_err(to_sink_error)?;
        // The muxer may rewrite the stream time base during write_header.
        let stream_time_base = octx
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .unwrap_or(time_base);

        let scaler = ffmpeg::software::scaling::context::Context::get(
            ffmpeg::format::pixel::Pixel::NV12,
            width,
            height,
            ffmpeg::format::pixel::Pixel::YUV420P,
            width,
            height,
            ffmpeg::software::scaling::flag::Flags::FAST_BILINEAR,
        )
        .map_err(to_sink_error)?;

        Ok(Self {
            octx,
            encoder,
            scaler,
            stream_index,
            encoder_time_base: time_base,
            stream_time_base,
            width,
            height,
            pts: 0,
        })
    }

    fn drain_packets(&mut self) -> Result<(), SinkError> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.octx)
                .map_err(to_sink_error)?;
        }
        Ok(())
    }

    fn nv12_frame(&self, frame: &VideoFrame) -> Result<ffmpeg::util::frame::Video, SinkError> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(SinkError::encode(format!(
                "frame size {}x{} does not match encoder {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        let mut raw = ffmpeg::util::frame::Video::new(
            ffmpeg::format::pixel::Pixel::NV12,
            self.width,
            self.height,
        );
        copy_plane(
            frame.luma(),
            frame.luma_stride(),
            raw.stride(0),
            self.height as usize,
            raw.data_mut(0),
        );
        let chroma_rows = (self.height as usize).div_ceil(2);
        copy_plane(
            frame.chroma(),
            frame.chroma_stride(),
            raw.stride(1),
            chroma_rows,
            raw.data_mut(1),
        );
        Ok(raw)
    }
}

impl FrameEncoder for Mp4Encoder {
    fn append(&mut self, frame: &VideoFrame) -> Result<(), SinkError> {
        let raw = self.nv12_frame(frame)?;
        let mut converted = ffmpeg::util::frame::Video::empty();
        self.scaler.run(&raw, &mut converted).map_err(to_sink_error)?;
        converted.set_pts(Some(self.pts));
        self.pts += 1;

        self.encoder.send_frame(&converted).map_err(to_sink_error)?;
        self.drain_packets()
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.encoder.send_eof().map_err(to_sink_error)?;
        self.drain_packets()?;
        self.octx.write_trailer().map_err(to_sink_error)?;
        Ok(())
    }
}

fn copy_plane(src: &[u8], src_stride: usize, dst_stride: usize, rows: usize, dst: &mut [u8]) {
    let row_bytes = src_stride.min(dst_stride);
    for row in 0..rows {
        let src_offset = row * src_stride;
        let dst_offset = row * dst_stride;
        dst[dst_offset..dst_offset + row_bytes]
            .copy_from_slice(&src[src_offset..src_offset + row_bytes]);
    }
}

fn to_sink_error(err: ffmpeg::Error) -> SinkError {
    SinkError::encode(err.to_string())
}
