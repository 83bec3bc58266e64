//! The indexed video engine: four packed 4bpp buffers, palette selection,
//! polygon rasterisation, bitmap unpacking and glyph blitting, brought
//! together behind one `VideoEngine` the VM driver drives each tic.

pub mod buffer;
pub mod font;
pub mod palette;
pub mod polygon;

use crate::error::{VmError, VmResult};
use buffer::{BufferSelection, PackedBuffer, VideoBuffers};
use palette::{Palette, PaletteTable};
use polygon::{Point, PolygonNode};

pub const BUFFER_FRONT_SENTINEL: u8 = 0xff;
pub const BUFFER_BACK_SENTINEL: u8 = 0xfe;

/// Resolve a wire-level buffer id operand (`SelectVideoBuffer`,
/// `CopyVideoBuffer`, `RenderVideoBuffer`) to a buffer selection.
pub fn resolve_buffer_id(id: u8) -> VmResult<BufferSelection> {
    match id {
        BUFFER_FRONT_SENTINEL => Ok(BufferSelection::Front),
        BUFFER_BACK_SENTINEL => Ok(BufferSelection::Back),
        0..=3 => Ok(BufferSelection::Index(id as usize)),
        other => Err(VmError::InvalidBufferID(other)),
    }
}

pub struct VideoEngine {
    buffers: VideoBuffers,
    selected_palette_id: u8,
    current_palette: Palette,
}

impl Default for VideoEngine {
    fn default() -> Self {
        VideoEngine {
            buffers: VideoBuffers::new(),
            selected_palette_id: 0,
            current_palette: Palette::from_bytes(&[0u8; 32]),
        }
    }
}

impl VideoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_palette(&mut self, palette_table: &[u8], id: u8) -> VmResult<()> {
        let table = PaletteTable::new(palette_table);
        self.current_palette = table.get(id)?;
        self.selected_palette_id = id;
        Ok(())
    }

    pub fn current_palette(&self) -> &Palette {
        &self.current_palette
    }

    pub fn select_target_buffer(&mut self, selection: BufferSelection) {
        match selection {
            BufferSelection::Front => self.buffers.set_target(self.buffers.front_id()),
            BufferSelection::Back => self.buffers.set_target(self.buffers.back_id()),
            BufferSelection::Index(id) => self.buffers.set_target(id),
        }
    }

    pub fn fill(&mut self, selection: BufferSelection, color: u8) {
        let id = self.resolve_role(selection);
        self.buffers.buffer_mut(id).fill(color);
    }

    pub fn copy(&mut self, src: BufferSelection, dst: BufferSelection, y_offset: i16) {
        let src_id = self.resolve_role(src);
        let dst_id = self.resolve_role(dst);
        if src_id == dst_id {
            return;
        }
        let src_buf = self.buffers.buffer(src_id).clone();
        self.buffers.buffer_mut(dst_id).copy_from(&src_buf, y_offset);
    }

    fn resolve_role(&self, selection: BufferSelection) -> usize {
        match selection {
            BufferSelection::Front => self.buffers.front_id(),
            BufferSelection::Back => self.buffers.back_id(),
            BufferSelection::Index(id) => id,
        }
    }

    pub fn load_bitmap_into_mask_buffer(&mut self, planar: &[u8; buffer::BUFFER_SIZE]) -> VmResult<()> {
        self.buffers.mask_buffer_mut().load_planar_bitmap(planar)
    }

    pub fn draw_polygon(
        &mut self,
        node: &PolygonNode,
        position: Point,
        zoom: i32,
    ) -> VmResult<()> {
        let target_id = self.buffers.target_id();
        if target_id == 0 {
            let mut mask_copy = self.buffers.mask_buffer().clone();
            polygon::rasterize(node, position, zoom, &mut mask_copy, None)?;
            *self.buffers.mask_buffer_mut() = mask_copy;
        } else {
            let mask = self.buffers.mask_buffer().clone();
            let target = self.buffers.buffer_mut(target_id);
            polygon::rasterize(node, position, zoom, target, Some(&mask))?;
        }
        Ok(())
    }

    pub fn draw_string(&mut self, string: &str, position: Point, color: u8) {
        let target_id = self.buffers.target_id();
        font::draw_string(self.buffers.buffer_mut(target_id), string, position, color);
    }

    /// Rotate buffer roles and return the frame to hand to the host surface:
    /// the now-current front buffer and palette.
    pub fn mark_ready(&mut self, selection: BufferSelection) -> (&PackedBuffer, &Palette) {
        self.buffers.mark_ready(selection);
        (self.buffers.front(), &self.current_palette)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_target_buffer_resolves_sentinels() {
        let mut engine = VideoEngine::new();
        let front_id = engine.buffers.front_id();
        engine.select_target_buffer(BufferSelection::Front);
        assert_eq!(engine.buffers.target_id(), front_id);
    }

    #[test]
    fn fill_and_copy_round_trip() {
        let mut engine = VideoEngine::new();
        engine.fill(BufferSelection::Index(1), 0x4);
        engine.copy(BufferSelection::Index(1), BufferSelection::Index(2), 0);
        assert_eq!(engine.buffers.buffer(2).get_pixel(0, 0), 0x4);
    }

    #[test]
    fn resolve_buffer_id_rejects_unmapped_values() {
        assert_eq!(resolve_buffer_id(4), Err(VmError::InvalidBufferID(4)));
        assert!(resolve_buffer_id(0xff).is_ok());
    }
}
