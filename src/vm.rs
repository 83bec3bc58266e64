//! The VM driver: the tic loop tying registers, threads, resource memory,
//! and the video engine together, and the per-instruction executor.
//!
//! Every actionable thread runs once per tic, in index order. Each
//! instruction is decoded into a tagged `Instruction` (`instruction::decode`)
//! and dispatched through a single `match` in `execute_instruction`, which
//! returns an explicit `Action` telling the caller whether the thread keeps
//! running, yields, or deactivates.

use tracing::{debug, trace};

use crate::cursor::ProgramCursor;
use crate::error::{VmError, VmResult};
use crate::gamepart::GamePart;
use crate::host::{render_to_surface, AudioSink, HostSurface};
use crate::input::{apply_input, InputState};
use crate::instruction::{decode, Action, Instruction, JumpRhs, PolygonSource, ThreadOp, Zoom};
use crate::registers::{RegisterBank, REG_FRAME_DURATION, REG_RANDOM_SEED, REG_RENDER_VIDEO_BUFFER_UNKNOWN, REG_SCROLL_Y};
use crate::resource::{ResourceMemory, ResourceReader, ResourceType};
use crate::thread::{ExecutionState, PauseState, ThreadTable, NUM_THREADS};
use crate::video::buffer::BUFFER_SIZE;
use crate::video::font::{self, StringTable};
use crate::video::polygon::{self, Point};
use crate::video::{resolve_buffer_id, VideoEngine, BUFFER_BACK_SENTINEL, BUFFER_FRONT_SENTINEL};

/// Hard cap on instructions executed by a single thread within one tic;
/// exceeding it is treated as a runaway program.
pub const MAX_INSTRUCTIONS_PER_TIC: usize = 10_000;

pub struct Vm {
    regs: RegisterBank,
    threads: ThreadTable,
    resources: ResourceMemory,
    video: VideoEngine,
    current_part: Option<GamePart>,
    scheduled_part: Option<GamePart>,
}

impl Vm {
    pub fn new(num_resource_descriptors: usize) -> Self {
        let mut regs = RegisterBank::new();
        regs.apply_copy_protection_bypass();
        regs.set_signed(REG_RANDOM_SEED, 0x1234);

        Vm {
            regs,
            threads: ThreadTable::new(),
            resources: ResourceMemory::new(num_resource_descriptors),
            video: VideoEngine::new(),
            current_part: None,
            scheduled_part: None,
        }
    }

    pub fn regs(&self) -> &RegisterBank {
        &self.regs
    }

    pub fn current_part(&self) -> Option<GamePart> {
        self.current_part
    }

    pub fn scheduled_part(&self) -> Option<GamePart> {
        self.scheduled_part
    }

    /// Inspect a single thread's current scheduling state.
    pub fn thread(&self, id: usize) -> &crate::thread::Thread {
        self.threads.get(id)
    }

    /// Whether resource cell `id` currently owns loaded bytes.
    pub fn resource_loaded(&self, id: u16) -> bool {
        self.resources.get(id).is_some()
    }

    /// Schedule a game part to load at the start of the next tic.
    pub fn schedule_game_part(&mut self, part: GamePart) {
        self.scheduled_part = Some(part);
    }

    fn load_scheduled_game_part(&mut self, reader: &dyn ResourceReader) -> VmResult<()> {
        let Some(part) = self.scheduled_part.take() else {
            return Ok(());
        };
        debug!(?part, "loading game part");
        self.resources.load_game_part(reader, &part.resource_ids())?;
        self.threads.reset_for_game_part();
        self.current_part = Some(part);
        Ok(())
    }

    /// Run one tic: apply a scheduled game part, fold in the input
    /// snapshot, apply deferred thread scheduling, then run every thread
    /// that is now running and active, in index order.
    pub fn run_tic(
        &mut self,
        reader: &dyn ResourceReader,
        strings: &dyn StringTable,
        input: &InputState,
        audio: &mut dyn AudioSink,
        host: &mut dyn HostSurface,
    ) -> VmResult<()> {
        self.load_scheduled_game_part(reader)?;

        let current_part = self
            .current_part
            .expect("a game part must be loaded before running a tic");
        if apply_input(&mut self.regs, input, current_part) {
            self.schedule_game_part(GamePart::PasswordEntry);
        }

        self.threads.apply_scheduled();

        let bytecode_id = current_part.resource_ids().bytecode;
        let bytecode = self
            .resources
            .get(bytecode_id)
            .expect("bytecode resource must be loaded for the current part")
            .to_vec();

        let polygons_id = current_part.resource_ids().polygons;
        let polygons = self
            .resources
            .get(polygons_id)
            .expect("polygon resource must be loaded for the current part")
            .to_vec();
        let animations = current_part
            .resource_ids()
            .animations
            .and_then(|id| self.resources.get(id))
            .map(|s| s.to_vec());

        for thread_id in 0..NUM_THREADS {
            let (pause, execution) = {
                let thread = self.threads.get(thread_id);
                (thread.pause, thread.execution)
            };
            if pause != PauseState::Running {
                continue;
            }
            let ExecutionState::Active(start_pc) = execution else {
                continue;
            };

            self.run_thread(
                thread_id,
                start_pc,
                &bytecode,
                &polygons,
                animations.as_deref(),
                reader,
                strings,
                audio,
                host,
            )?;
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_thread(
        &mut self,
        thread_id: usize,
        start_pc: u16,
        bytecode: &[u8],
        polygons: &[u8],
        animations: Option<&[u8]>,
        reader: &dyn ResourceReader,
        strings: &dyn StringTable,
        audio: &mut dyn AudioSink,
        host: &mut dyn HostSurface,
    ) -> VmResult<()> {
        self.threads.get_mut(thread_id).stack.clear();

        let mut cursor = ProgramCursor::new(bytecode);
        cursor.jump(start_pc)?;

        for _ in 0..MAX_INSTRUCTIONS_PER_TIC {
            let instruction = decode(&mut cursor)?;
            trace!(thread_id, ?instruction, "executing");

            let action = self.execute_instruction(
                thread_id,
                &instruction,
                &mut cursor,
                polygons,
                animations,
                reader,
                strings,
                audio,
                host,
            )?;

            match action {
                Action::Continue => continue,
                Action::Yield => {
                    if !self.threads.get(thread_id).stack.is_empty() {
                        return Err(VmError::YieldWithinFunction);
                    }
                    self.threads.get_mut(thread_id).execution =
                        ExecutionState::Active(cursor.position());
                    return Ok(());
                }
                Action::Deactivate => {
                    self.threads.get_mut(thread_id).execution = ExecutionState::Inactive;
                    return Ok(());
                }
            }
        }

        Err(VmError::InstructionLimitExceeded)
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_instruction(
        &mut self,
        thread_id: usize,
        instruction: &Instruction,
        cursor: &mut ProgramCursor,
        polygons: &[u8],
        animations: Option<&[u8]>,
        reader: &dyn ResourceReader,
        strings: &dyn StringTable,
        audio: &mut dyn AudioSink,
        host: &mut dyn HostSurface,
    ) -> VmResult<Action> {
        use Instruction::*;

        match *instruction {
            SetConstant { dst, value } => {
                self.regs.set_signed(dst as usize, value);
            }
            Copy { dst, src } => {
                self.regs.set_signed(dst as usize, self.regs.signed(src as usize));
            }
            Add { dst, src } => {
                let sum = self
                    .regs
                    .signed(dst as usize)
                    .wrapping_add(self.regs.signed(src as usize));
                self.regs.set_signed(dst as usize, sum);
            }
            AddConstant { dst, value } => {
                let sum = self.regs.signed(dst as usize).wrapping_add(value);
                self.regs.set_signed(dst as usize, sum);
            }
            Sub { dst, src } => {
                let diff = self
                    .regs
                    .signed(dst as usize)
                    .wrapping_sub(self.regs.signed(src as usize));
                self.regs.set_signed(dst as usize, diff);
            }
            And { dst, mask } => {
                let value = self.regs.raw(dst as usize) & mask;
                self.regs.set_raw(dst as usize, value);
            }
            Or { dst, mask } => {
                let value = self.regs.raw(dst as usize) | mask;
                self.regs.set_raw(dst as usize, value);
            }
            ShiftLeft { dst, shift } => {
                let value = self.regs.raw(dst as usize) << shift;
                self.regs.set_raw(dst as usize, value);
            }
            ShiftRight { dst, shift } => {
                let value = self.regs.raw(dst as usize) >> shift;
                self.regs.set_raw(dst as usize, value);
            }

            Jump { addr } => cursor.jump(addr)?,
            Call { addr } => {
                let return_addr = cursor.position();
                self.threads.get_mut(thread_id).stack.push(return_addr)?;
                cursor.jump(addr)?;
            }
            Return => {
                let addr = self.threads.get_mut(thread_id).stack.pop()?;
                cursor.jump(addr)?;
            }
            JumpIfNotZero { reg, addr } => {
                let value = self.regs.signed(reg as usize).wrapping_sub(1);
                self.regs.set_signed(reg as usize, value);
                if value != 0 {
                    cursor.jump(addr)?;
                }
            }
            JumpConditional {
                comparison,
                lhs_reg,
                rhs,
                addr,
            } => {
                let lhs = self.regs.signed(lhs_reg as usize);
                let rhs_value = match rhs {
                    JumpRhs::UnsignedByte(b) => b as i16,
                    JumpRhs::SignedWord(w) => w,
                    JumpRhs::Register(r) => self.regs.signed(r as usize),
                };
                if comparison.apply(lhs, rhs_value) {
                    cursor.jump(addr)?;
                }
            }

            ActivateThread { thread_id: target, addr } => {
                if target as usize >= NUM_THREADS {
                    return Err(VmError::InvalidThreadID(target));
                }
                self.threads.get_mut(target as usize).scheduled_execution =
                    Some(ExecutionState::Active(addr));
            }
            ControlThreads { start_id, end_id, op } => {
                for id in start_id..=end_id {
                    let thread = self.threads.get_mut(id as usize);
                    match op {
                        ThreadOp::Resume => thread.scheduled_pause = Some(PauseState::Running),
                        ThreadOp::Suspend => thread.scheduled_pause = Some(PauseState::Paused),
                        ThreadOp::Deactivate => {
                            thread.scheduled_execution = Some(ExecutionState::Inactive)
                        }
                    }
                }
            }
            Kill => return Ok(Action::Deactivate),
            Yield => return Ok(Action::Yield),

            SelectPalette { id } => {
                let palettes_id = self
                    .current_part
                    .expect("a game part must be loaded before running a tic")
                    .resource_ids()
                    .palettes;
                let palette_bytes = self
                    .resources
                    .get(palettes_id)
                    .expect("palette resource must be loaded");
                self.video.select_palette(palette_bytes, id)?;
            }
            SelectVideoBuffer { id } => {
                let selection = resolve_buffer_id(id)?;
                self.video.select_target_buffer(selection);
            }
            FillVideoBuffer { id, color } => {
                let selection = resolve_buffer_id(id)?;
                self.video.fill(selection, color);
            }
            CopyVideoBuffer { src, dst } => {
                let is_sentinel = matches!(src, BUFFER_FRONT_SENTINEL | BUFFER_BACK_SENTINEL);
                let scroll = if !is_sentinel && src & 0x80 != 0 {
                    self.regs.signed(REG_SCROLL_Y)
                } else {
                    0
                };
                // Bit 7 (scroll request) and bit 6 (unused) are masked off
                // a regular page index; the front/back sentinels pass
                // through untouched.
                let src_resolved = if is_sentinel { src } else { src & 0x3f };
                let src_selection = resolve_buffer_id(src_resolved)?;
                let dst_selection = resolve_buffer_id(dst)?;
                self.video.copy(src_selection, dst_selection, scroll);
            }
            RenderVideoBuffer { id } => {
                let selection = resolve_buffer_id(id)?;
                self.regs.set_signed(REG_RENDER_VIDEO_BUFFER_UNKNOWN, 0);
                let delay_ms = self.regs.unsigned(REG_FRAME_DURATION) as u32 * 20;
                let (buffer, palette) = self.video.mark_ready(selection);
                let surface = host.prepare_surface()?;
                render_to_surface(surface, buffer, palette)?;
                host.surface_ready(surface, delay_ms);
            }
            DrawString { string_id, color, x_col, y } => {
                let text = strings.get(string_id)?;
                let position = font::resolve_draw_position(x_col, y);
                self.video.draw_string(text, position, color);
            }

            ControlResources { id } => {
                if id == 0 {
                    self.resources.unload_all(reader);
                    audio.stop_all();
                } else if let Some(part) = GamePart::from_resource_id(id) {
                    self.schedule_game_part(part);
                } else {
                    self.load_individual_resource(id, reader)?;
                }
            }

            ControlSound { resource, frequency, volume, channel } => {
                if volume > 0 {
                    audio.play_sound(resource, frequency, volume, channel)?;
                } else {
                    audio.stop_sound(channel)?;
                }
            }
            ControlMusic { resource, delay, offset } => {
                if resource != 0 {
                    audio.play_music(resource, delay, offset)?;
                } else if delay != 0 {
                    audio.set_music_delay(delay)?;
                } else {
                    audio.stop_music()?;
                }
            }

            DrawBackgroundPolygon { addr, x, y } => {
                let node = polygon::parse_node(polygons, addr as usize, None)?;
                self.video
                    .draw_polygon(&node, Point::new(x as i32, y as i32), 64)?;
            }
            DrawSpritePolygon { addr, x, y, zoom, source } => {
                let table = match source {
                    PolygonSource::Polygons => polygons,
                    PolygonSource::Animations => animations.ok_or(VmError::AnimationsNotLoaded)?,
                };
                let node = polygon::parse_node(table, addr as usize, None)?;
                let zoom_value = match zoom {
                    Zoom::Default => 64,
                    Zoom::Half => 32,
                    Zoom::Double => 128,
                };
                self.video
                    .draw_polygon(&node, Point::new(x as i32, y as i32), zoom_value)?;
            }
        }

        Ok(Action::Continue)
    }

    fn load_individual_resource(&mut self, id: u16, reader: &dyn ResourceReader) -> VmResult<()> {
        let is_bitmap = reader.descriptor(id)?.res_type == ResourceType::Bitmap;
        self.resources.load_individual(reader, id)?;
        if is_bitmap {
            let bytes: [u8; BUFFER_SIZE] = *self.resources.bitmap_staging();
            self.video.load_bitmap_into_mask_buffer(&bytes)?;
        }
        Ok(())
    }
}
