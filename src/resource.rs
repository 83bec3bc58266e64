//! Resource memory: the indexed table of game-part and individually-loaded
//! resources, plus the fixed bitmap staging region.
//!
//! Resource types fall into two groups: palettes/bytecode/polygons/animations
//! load only as part of a game part switch and stay cached until the next
//! switch, while sound/music load individually and bitmaps always decompress
//! fresh into a shared staging region. On-disk decoding (MEMLIST parsing,
//! bank decompression) stays external, behind the `ResourceReader` trait —
//! this module only manages the in-memory cells.

use crate::error::{VmError, VmResult};

/// Upper bound on the number of resource descriptors a game ships with.
pub const MAX_RESOURCES: usize = 150;

/// Size of the fixed staging region bitmap loads are decompressed into.
pub const BITMAP_STAGING_SIZE: usize = planar_bitmap_size(320, 200);

pub const fn planar_bitmap_size(width: usize, height: usize) -> usize {
    width * height / 2
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceType {
    Sound,
    Music,
    Bitmap,
    Palettes,
    Bytecode,
    Polygons,
    Animations,
    Empty,
}

/// One entry of the resource descriptor table, as produced by a
/// `ResourceReader::descriptors()` call. Holds only the static facts about
/// a resource's location and size; loaded bytes live in `ResourceMemory`'s
/// cells, not here.
#[derive(Clone, Copy, Debug)]
pub struct ResourceDescriptor {
    pub res_type: ResourceType,
    pub bank_id: u8,
    pub bank_offset: u32,
    pub compressed_size: usize,
    pub uncompressed_size: usize,
}

impl ResourceDescriptor {
    pub const EMPTY: ResourceDescriptor = ResourceDescriptor {
        res_type: ResourceType::Empty,
        bank_id: 0,
        bank_offset: 0,
        compressed_size: 0,
        uncompressed_size: 0,
    };
}

/// External capability for enumerating resource descriptors and reading
/// their uncompressed bytes. Implemented outside this crate's core by a
/// MEMLIST/BANK decoder (see `bank.rs` in the binary for a concrete
/// implementation); the core only depends on this trait.
pub trait ResourceReader {
    /// Ordered descriptors, indexed by resource id (0..MAX_RESOURCES).
    fn descriptors(&self) -> &[ResourceDescriptor];

    /// Fill `buffer[..descriptor.uncompressed_size]` with the uncompressed
    /// bytes of `descriptor`.
    fn read_into(&self, buffer: &mut [u8], descriptor: &ResourceDescriptor) -> VmResult<()>;

    /// Allocate a fresh buffer and read `descriptor` into it.
    fn alloc_read(&self, descriptor: &ResourceDescriptor) -> VmResult<Vec<u8>> {
        let mut buffer = vec![0u8; descriptor.uncompressed_size];
        self.read_into(&mut buffer, descriptor)?;
        Ok(buffer)
    }

    /// Allocate and read the resource at `id`, validating bounds and the
    /// empty-descriptor marker.
    fn alloc_read_by_id(&self, id: u16) -> VmResult<Vec<u8>> {
        let descriptor = self.descriptor(id)?;
        self.alloc_read(descriptor)
    }

    fn descriptor(&self, id: u16) -> VmResult<&ResourceDescriptor> {
        let descriptor = self
            .descriptors()
            .get(id as usize)
            .ok_or(VmError::InvalidResourceID(id))?;
        if descriptor.res_type == ResourceType::Empty {
            return Err(VmError::EmptyResourceID(id));
        }
        Ok(descriptor)
    }
}

enum Cell {
    Empty,
    Owned(Vec<u8>),
}

impl Cell {
    fn as_slice(&self) -> Option<&[u8]> {
        match self {
            Cell::Empty => None,
            Cell::Owned(data) => Some(data),
        }
    }
}

/// The four resource ids a game part resolves to. `animations` is optional:
/// not every part ships a shared sprite set.
#[derive(Clone, Copy, Debug)]
pub struct GamePartResourceIds {
    pub palettes: u16,
    pub bytecode: u16,
    pub polygons: u16,
    pub animations: Option<u16>,
}

pub struct ResourceMemory {
    cells: Vec<Cell>,
    bitmap_staging: Box<[u8; BITMAP_STAGING_SIZE]>,
}

impl ResourceMemory {
    pub fn new(num_descriptors: usize) -> Self {
        let mut cells = Vec::with_capacity(num_descriptors);
        cells.resize_with(num_descriptors, || Cell::Empty);
        ResourceMemory {
            cells,
            bitmap_staging: Box::new([0u8; BITMAP_STAGING_SIZE]),
        }
    }

    pub fn get(&self, id: u16) -> Option<&[u8]> {
        self.cells.get(id as usize).and_then(Cell::as_slice)
    }

    fn free_all(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell::Empty;
        }
    }

    /// Game-part load sequence: free every owned region, then read and
    /// decompress the four resources the part names.
    pub fn load_game_part(
        &mut self,
        reader: &dyn ResourceReader,
        ids: &GamePartResourceIds,
    ) -> VmResult<(u16, u16, u16, Option<u16>)> {
        self.free_all();

        let palettes_data = reader.alloc_read_by_id(ids.palettes)?;
        let bytecode_data = reader.alloc_read_by_id(ids.bytecode)?;
        let polygons_data = reader.alloc_read_by_id(ids.polygons)?;
        let animations_data = match ids.animations {
            Some(id) => Some(reader.alloc_read_by_id(id)?),
            None => None,
        };

        self.store(ids.palettes, palettes_data);
        self.store(ids.bytecode, bytecode_data);
        self.store(ids.polygons, polygons_data);
        if let Some(id) = ids.animations {
            self.store(id, animations_data.unwrap());
        }

        Ok((ids.palettes, ids.bytecode, ids.polygons, ids.animations))
    }

    fn store(&mut self, id: u16, data: Vec<u8>) {
        if let Some(cell) = self.cells.get_mut(id as usize) {
            *cell = Cell::Owned(data);
        }
    }

    /// Load an individually-requested sound/music/bitmap resource.
    /// Returns a slice of resource memory for sound/music (cached
    /// thereafter), or of the bitmap staging region for bitmaps (always
    /// freshly overwritten).
    pub fn load_individual<'a>(
        &'a mut self,
        reader: &dyn ResourceReader,
        id: u16,
    ) -> VmResult<&'a [u8]> {
        let descriptor = *reader.descriptor(id)?;
        match descriptor.res_type {
            ResourceType::Sound | ResourceType::Music => {
                if matches!(self.cells.get(id as usize), Some(Cell::Empty)) || id as usize >= self.cells.len() {
                    let data = reader.alloc_read(&descriptor)?;
                    self.store(id, data);
                }
                Ok(self.get(id).expect("just stored"))
            }
            ResourceType::Bitmap => {
                if descriptor.uncompressed_size != BITMAP_STAGING_SIZE {
                    return Err(VmError::InvalidResourceSize);
                }
                reader.read_into(self.bitmap_staging.as_mut_slice(), &descriptor)?;
                Ok(self.bitmap_staging.as_slice())
            }
            ResourceType::Palettes
            | ResourceType::Bytecode
            | ResourceType::Polygons
            | ResourceType::Animations => Err(VmError::GamePartOnlyResourceType),
            ResourceType::Empty => Err(VmError::EmptyResourceID(id)),
        }
    }

    /// Free every cell whose descriptor type is sound or music.
    pub fn unload_all(&mut self, reader: &dyn ResourceReader) {
        for (id, cell) in self.cells.iter_mut().enumerate() {
            if let Some(descriptor) = reader.descriptors().get(id) {
                if matches!(descriptor.res_type, ResourceType::Sound | ResourceType::Music) {
                    *cell = Cell::Empty;
                }
            }
        }
    }

    pub fn bitmap_staging(&self) -> &[u8; BITMAP_STAGING_SIZE] {
        &self.bitmap_staging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeReader {
        descriptors: Vec<ResourceDescriptor>,
        data: Vec<Vec<u8>>,
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
                .unwrap();
            let src = &self.data[id];
            if buffer.len() < src.len() {
                return Err(VmError::BufferTooSmall);
            }
            buffer[..src.len()].copy_from_slice(src);
            Ok(())
        }
    }

    fn make_reader() -> FakeReader {
        let mut descriptors = vec![ResourceDescriptor::EMPTY; 4];
        let mut data = vec![Vec::new(); 4];

        descriptors[1] = ResourceDescriptor {
            res_type: ResourceType::Palettes,
            bank_id: 0,
            bank_offset: 0,
            compressed_size: 4,
            uncompressed_size: 4,
        };
        data[1] = vec![1, 2, 3, 4];

        descriptors[2] = ResourceDescriptor {
            res_type: ResourceType::Bytecode,
            bank_id: 0,
            bank_offset: 0,
            compressed_size: 2,
            uncompressed_size: 2,
        };
        data[2] = vec![0xaa, 0xbb];

        descriptors[3] = ResourceDescriptor {
            res_type: ResourceType::Polygons,
            bank_id: 0,
            bank_offset: 0,
            compressed_size: 1,
            uncompressed_size: 1,
        };
        data[3] = vec![0xcc];

        FakeReader { descriptors, data }
    }

    #[test]
    fn load_game_part_populates_named_cells_only() {
        let reader = make_reader();
        let mut mem = ResourceMemory::new(4);
        let ids = GamePartResourceIds {
            palettes: 1,
            bytecode: 2,
            polygons: 3,
            animations: None,
        };

        mem.load_game_part(&reader, &ids).unwrap();

        assert_eq!(mem.get(1), Some([1u8, 2, 3, 4].as_slice()));
        assert_eq!(mem.get(2), Some([0xaau8, 0xbb].as_slice()));
        assert_eq!(mem.get(3), Some([0xccu8].as_slice()));
        assert_eq!(mem.get(0), None);
    }

    #[test]
    fn load_game_part_is_idempotent() {
        let reader = make_reader();
        let mut mem = ResourceMemory::new(4);
        let ids = GamePartResourceIds {
            palettes: 1,
            bytecode: 2,
            polygons: 3,
            animations: None,
        };

        mem.load_game_part(&reader, &ids).unwrap();
        let first: Vec<u8> = mem.get(2).unwrap().to_vec();
        mem.load_game_part(&reader, &ids).unwrap();
        let second: Vec<u8> = mem.get(2).unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_resource_id_fails() {
        let reader = make_reader();
        let mut mem = ResourceMemory::new(4);
        assert_eq!(
            mem.load_individual(&reader, 0),
            Err(VmError::EmptyResourceID(0))
        );
    }

    #[test]
    fn game_part_only_type_rejected_from_individual_load() {
        let reader = make_reader();
        let mut mem = ResourceMemory::new(4);
        assert_eq!(
            mem.load_individual(&reader, 1),
            Err(VmError::GamePartOnlyResourceType)
        );
    }
}
