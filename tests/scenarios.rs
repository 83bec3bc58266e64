//! End-to-end scenario tests assembling raw bytecode per the opcode table
//! and driving `Vm::run_tic` against an in-memory `ResourceReader`, the way
//! `res.rs`'s own tests drive `ResourceManager` against real bank files but
//! with fabricated data instead of disk I/O.

use awvm::host::{HostSurface, NullAudioSink, Surface};
use awvm::input::InputState;
use awvm::resource::{ResourceDescriptor, ResourceReader, ResourceType};
use awvm::thread::{ExecutionState, PauseState};
use awvm::video::font::StringTable;
use awvm::{GamePart, Vm, VmResult};

struct FakeReader {
    descriptors: Vec<ResourceDescriptor>,
    data: Vec<Vec<u8>>,
}

impl FakeReader {
    fn new(capacity: usize) -> Self {
        FakeReader {
            descriptors: vec![ResourceDescriptor::EMPTY; capacity],
            data: vec![Vec::new(); capacity],
        }
    }

    fn set(&mut self, id: u16, res_type: ResourceType, bytes: Vec<u8>) {
        self.descriptors[id as usize] = ResourceDescriptor {
            res_type,
            bank_id: 0,
            bank_offset: 0,
            compressed_size: bytes.len(),
            uncompressed_size: bytes.len(),
        };
        self.data[id as usize] = bytes;
    }
}

impl ResourceReader for FakeReader {
    fn descriptors(&self) -> &[ResourceDescriptor] {
        &self.descriptors
    }

    fn read_into(&self, buffer: &mut [u8], descriptor: &ResourceDescriptor) -> VmResult<()> {
        let id = self
            .descriptors
            .iter()
            .position(|d| std::ptr::eq(d, descriptor))
            .expect("descriptor belongs to this reader");
        let src = &self.data[id];
        buffer[..src.len()].copy_from_slice(src);
        Ok(())
    }
}

struct TestHost {
    surface: Surface,
}

impl TestHost {
    fn new() -> Self {
        TestHost {
            surface: Surface::default(),
        }
    }
}

impl HostSurface for TestHost {
    fn prepare_surface(&mut self) -> VmResult<&mut Surface> {
        Ok(&mut self.surface)
    }

    fn surface_ready(&mut self, _surface: &Surface, _delay_ms: u32) {}
}

struct NoStrings;

impl StringTable for NoStrings {
    fn get(&self, _id: u16) -> VmResult<&str> {
        Ok("")
    }
}

/// Build a reader with `copy_protection`'s three named resources populated
/// with `bytecode`, plus empty palette/polygon tables.
fn reader_with_copy_protection_bytecode(bytecode: Vec<u8>) -> FakeReader {
    let mut reader = FakeReader::new(0x20);
    reader.set(0x14, ResourceType::Palettes, Vec::new());
    reader.set(0x15, ResourceType::Bytecode, bytecode);
    reader.set(0x16, ResourceType::Polygons, Vec::new());
    reader
}

fn run_one_tic(vm: &mut Vm, reader: &FakeReader) {
    vm.run_tic(
        reader,
        &NoStrings,
        &InputState::default(),
        &mut NullAudioSink,
        &mut TestHost::new(),
    )
    .unwrap();
}

#[test]
fn set_and_add() {
    // SetConstant r16 = 125; AddConstant r16 += -1000; Kill
    let bytecode = vec![0x00, 16, 0x00, 0x7d, 0x03, 16, 0xfc, 0x18, 0x17];
    let reader = reader_with_copy_protection_bytecode(bytecode);

    let mut vm = Vm::new(reader.descriptors().len());
    vm.schedule_game_part(GamePart::CopyProtection);
    run_one_tic(&mut vm, &reader);

    assert_eq!(vm.regs().signed(16), -875);
    assert_eq!(vm.thread(0).execution, ExecutionState::Inactive);
}

#[test]
fn overflow_wrap() {
    // SetConstant r16 = 32767; AddConstant r16 += 1; Kill
    let bytecode = vec![0x00, 16, 0x7f, 0xff, 0x03, 16, 0x00, 0x01, 0x17];
    let reader = reader_with_copy_protection_bytecode(bytecode);

    let mut vm = Vm::new(reader.descriptors().len());
    vm.schedule_game_part(GamePart::CopyProtection);
    run_one_tic(&mut vm, &reader);

    assert_eq!(vm.regs().signed(16), i16::MIN);
}

#[test]
fn yield_then_resume() {
    // 0: SetConstant r1 = 0x0BAD   (4 bytes)
    // 4: Yield                    (1 byte)
    // 5: SetConstant r2 = 0xF00D  (4 bytes)
    // 9: Kill
    let bytecode = vec![
        0x00, 1, 0x0b, 0xad, // SetConstant r1 = 0x0BAD
        0x18, // Yield
        0x00, 2, 0xf0, 0x0d, // SetConstant r2 = 0xF00D
        0x17, // Kill
    ];
    let reader = reader_with_copy_protection_bytecode(bytecode);

    let mut vm = Vm::new(reader.descriptors().len());
    vm.schedule_game_part(GamePart::CopyProtection);

    run_one_tic(&mut vm, &reader);
    assert_eq!(vm.regs().signed(1), 0x0bad);
    assert_eq!(vm.regs().signed(2), 0);
    assert_eq!(vm.thread(0).execution, ExecutionState::Active(5));

    run_one_tic(&mut vm, &reader);
    assert_eq!(vm.regs().signed(2), 0xf00d_u16 as i16);
    assert_eq!(vm.thread(0).execution, ExecutionState::Inactive);
}

#[test]
fn loop_counter() {
    // 0: SetConstant r0 = 3        (4 bytes)
    // 4: AddConstant r7 += 1       (4 bytes)   <- loop label
    // 8: JumpIfNotZero r0, 4       (4 bytes)
    // 12: Kill
    let bytecode = vec![
        0x00, 0, 0x00, 0x03, // SetConstant r0 = 3
        0x03, 7, 0x00, 0x01, // AddConstant r7 += 1
        0x08, 0, 0x00, 0x04, // JumpIfNotZero r0, addr=4
        0x17, // Kill
    ];
    let reader = reader_with_copy_protection_bytecode(bytecode);

    let mut vm = Vm::new(reader.descriptors().len());
    vm.schedule_game_part(GamePart::CopyProtection);
    run_one_tic(&mut vm, &reader);

    assert_eq!(vm.regs().signed(7), 3);
    assert_eq!(vm.regs().signed(0), 0);
}

#[test]
fn thread_scheduling_is_deferred_by_one_tic() {
    // 0:  ActivateThread(1, 14)          (4 bytes)
    // 4:  ControlThreads(1, 1, Suspend)  (4 bytes)
    // 8:  Yield                         (1 byte)
    // 9:  ControlThreads(1, 1, Resume)   (4 bytes)
    // 13: Kill                          (1 byte)
    // 14: Kill                          (thread 1's target address)
    let bytecode = vec![
        0x06, 1, 0x00, 14, // ActivateThread(1, 14)
        0x0b, 1, 1, 1, // ControlThreads(1, 1, Suspend)
        0x18, // Yield
        0x0b, 1, 1, 0, // ControlThreads(1, 1, Resume)
        0x17, // Kill (thread 0)
        0x17, // Kill (thread 1's entry point)
    ];
    let reader = reader_with_copy_protection_bytecode(bytecode);

    let mut vm = Vm::new(reader.descriptors().len());
    vm.schedule_game_part(GamePart::CopyProtection);

    // Tic 1: thread 0 schedules thread 1's activation and suspension, then
    // yields so it keeps running next tic.
    run_one_tic(&mut vm, &reader);

    // Tic 2: the schedule from tic 1 is applied (thread 1 becomes
    // Paused/Active(14)); thread 0 resumes and requests thread 1's resume,
    // which is itself deferred to the next tic.
    run_one_tic(&mut vm, &reader);
    assert_eq!(vm.thread(1).pause, PauseState::Paused);
    assert_eq!(vm.thread(1).scheduled_pause, Some(PauseState::Running));
    assert_eq!(vm.thread(0).execution, ExecutionState::Inactive);

    // Tic 3: thread 1's resume is applied; it now runs and hits its Kill.
    run_one_tic(&mut vm, &reader);
    assert_eq!(vm.thread(1).execution, ExecutionState::Inactive);
}

#[test]
fn game_part_switch() {
    // copy_protection's thread 0: ControlResources(0x3E81) (intro_cinematic); Kill
    let copy_protection_bytecode = vec![0x19, 0x3e, 0x81, 0x17];
    let mut reader = reader_with_copy_protection_bytecode(copy_protection_bytecode);
    // intro_cinematic's own thread 0 just yields, so its post-load state is
    // observable before it would otherwise deactivate.
    reader.set(0x17, ResourceType::Palettes, Vec::new());
    reader.set(0x18, ResourceType::Bytecode, vec![0x18]);
    reader.set(0x19, ResourceType::Polygons, Vec::new());

    let mut vm = Vm::new(reader.descriptors().len());
    vm.schedule_game_part(GamePart::CopyProtection);

    run_one_tic(&mut vm, &reader);
    assert_eq!(vm.scheduled_part(), Some(GamePart::IntroCinematic));
    assert!(vm.resource_loaded(0x15));

    run_one_tic(&mut vm, &reader);
    assert_eq!(vm.current_part(), Some(GamePart::IntroCinematic));
    assert!(!vm.resource_loaded(0x15));
    assert!(vm.resource_loaded(0x18));
    assert!(matches!(vm.thread(0).execution, ExecutionState::Active(_)));
    assert_eq!(vm.thread(0).pause, PauseState::Running);
}
