//! Host and audio collaborator traits: the core calls out through these,
//! the embedder owns the window and the mixer. Dependency injection is
//! confined to this boundary; the VM itself stays a concrete struct.

use crate::error::{VmError, VmResult};
use crate::video::palette::Palette;

/// 320x200 24-bit RGB pixels the VM fills before calling `surface_ready`.
pub struct Surface {
    pub pixels: Box<[[u8; 3]; 320 * 200]>,
}

impl Default for Surface {
    fn default() -> Self {
        Surface {
            pixels: Box::new([[0u8; 3]; 320 * 200]),
        }
    }
}

pub trait HostSurface {
    fn prepare_surface(&mut self) -> VmResult<&mut Surface>;
    fn surface_ready(&mut self, surface: &Surface, delay_ms: u32);
}

/// Fills `surface` from a packed 4bpp buffer and a palette, the glue
/// `crate::vm` uses right before calling `HostSurface::surface_ready`.
pub fn render_to_surface(
    surface: &mut Surface,
    buffer: &crate::video::buffer::PackedBuffer,
    palette: &Palette,
) -> VmResult<()> {
    for y in 0..200 {
        for x in 0..320 {
            let index = buffer.get_pixel(x, y);
            let color = palette.lookup(index)?;
            let pixel = &mut surface.pixels[y as usize * 320 + x as usize];
            *pixel = [color.r, color.g, color.b];
        }
    }
    Ok(())
}

/// External audio mixer/music player, consumed through
/// `ControlSound`/`ControlMusic`. The mixer itself lives entirely with the
/// embedder; this trait is just the call boundary.
pub trait AudioSink {
    fn play_sound(&mut self, resource: u16, frequency: u8, volume: u8, channel: u8) -> VmResult<()>;
    fn stop_sound(&mut self, channel: u8) -> VmResult<()>;
    fn play_music(&mut self, resource: u16, delay: u16, offset: u8) -> VmResult<()>;
    fn set_music_delay(&mut self, delay: u16) -> VmResult<()>;
    fn stop_music(&mut self) -> VmResult<()>;
    fn stop_all(&mut self);
}

/// A no-op audio sink for headless runs (e.g. `--list-resources`, tests).
#[derive(Default)]
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn play_sound(&mut self, _resource: u16, _frequency: u8, _volume: u8, channel: u8) -> VmResult<()> {
        if channel > 3 {
            return Err(VmError::InvalidChannel(channel));
        }
        Ok(())
    }

    fn stop_sound(&mut self, channel: u8) -> VmResult<()> {
        if channel > 3 {
            return Err(VmError::InvalidChannel(channel));
        }
        Ok(())
    }

    fn play_music(&mut self, _resource: u16, _delay: u16, _offset: u8) -> VmResult<()> {
        Ok(())
    }

    fn set_music_delay(&mut self, _delay: u16) -> VmResult<()> {
        Ok(())
    }

    fn stop_music(&mut self) -> VmResult<()> {
        Ok(())
    }

    fn stop_all(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::buffer::PackedBuffer;

    #[test]
    fn render_to_surface_maps_indices_through_palette() {
        let mut buffer = PackedBuffer::new();
        buffer.set_pixel(0, 0, 1);
        let mut raw = [0u8; 32];
        raw[2] = 0x0f;
        let palette = Palette::from_bytes(&raw);
        let mut surface = Surface::default();
        render_to_surface(&mut surface, &buffer, &palette).unwrap();
        assert_eq!(surface.pixels[0], [0xff, 0x00, 0x00]);
    }

    #[test]
    fn null_audio_sink_validates_channel() {
        let mut sink = NullAudioSink;
        assert_eq!(sink.play_sound(0, 0, 0, 4), Err(VmError::InvalidChannel(4)));
        assert!(sink.play_sound(0, 0, 0, 3).is_ok());
    }
}
