//! Disk-backed `ResourceReader`: parses `MEMLIST.BIN` into the resource
//! descriptor table and decompresses individual entries on demand from the
//! numbered `bank**` files that sit alongside it.
//!
//! `BankReader` is stateless: it never keeps decompressed bytes around
//! between calls. Caching belongs to `resource::ResourceMemory`, which sits
//! in front of whatever `ResourceReader` it is given.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{ReadBytesExt, BE};
use tracing::debug;

use awvm::error::{VmError, VmResult};
use awvm::resource::{ResourceDescriptor, ResourceReader, ResourceType};

fn res_type_from_code(code: u8) -> VmResult<ResourceType> {
    match code {
        0 => Ok(ResourceType::Sound),
        1 => Ok(ResourceType::Music),
        2 => Ok(ResourceType::Bitmap),
        3 => Ok(ResourceType::Palettes),
        4 => Ok(ResourceType::Bytecode),
        5 => Ok(ResourceType::Polygons),
        6 => Ok(ResourceType::Animations),
        _ => Err(VmError::InvalidCompressedData),
    }
}

/// Reads resource descriptors and bytes from a directory holding a
/// `memlist.bin` and its `bank00`.. companion files.
pub struct BankReader {
    descriptors: Vec<ResourceDescriptor>,
    data_dir: PathBuf,
}

impl BankReader {
    pub fn open(data_dir: &Path) -> VmResult<Self> {
        let descriptors = load_memlist(&data_dir.join("memlist.bin"))?;
        debug!(count = descriptors.len(), "loaded resource descriptors");
        Ok(BankReader {
            descriptors,
            data_dir: data_dir.to_path_buf(),
        })
    }
}

/// One `memlist.bin` record: a state byte (0 = not loaded, 0xff = end of
/// table), a type byte, two reserved words, a rank byte, the bank id, the
/// bank offset, a reserved word, the packed size, another reserved word and
/// the unpacked size. Reserved fields were originally zero-initialised
/// in-memory pointers, dumped verbatim to disk alongside the real fields.
fn load_memlist(path: &Path) -> VmResult<Vec<ResourceDescriptor>> {
    let mut file = fs::File::open(path).map_err(|_| VmError::RepositoryFailure)?;
    let mut descriptors = Vec::new();

    loop {
        let state = file.read_u8().map_err(|_| VmError::TruncatedData)?;
        if state == 0xff {
            break;
        }

        let type_code = file.read_u8().map_err(|_| VmError::TruncatedData)?;
        let _reserved0 = file.read_u16::<BE>().map_err(|_| VmError::TruncatedData)?;
        let _reserved1 = file.read_u16::<BE>().map_err(|_| VmError::TruncatedData)?;
        let _rank = file.read_u8().map_err(|_| VmError::TruncatedData)?;
        let bank_id = file.read_u8().map_err(|_| VmError::TruncatedData)?;
        let bank_offset = file.read_u32::<BE>().map_err(|_| VmError::TruncatedData)?;
        let _reserved2 = file.read_u16::<BE>().map_err(|_| VmError::TruncatedData)?;
        let compressed_size = file.read_u16::<BE>().map_err(|_| VmError::TruncatedData)? as usize;
        let _reserved3 = file.read_u16::<BE>().map_err(|_| VmError::TruncatedData)?;
        let uncompressed_size = file.read_u16::<BE>().map_err(|_| VmError::TruncatedData)? as usize;

        descriptors.push(ResourceDescriptor {
            res_type: res_type_from_code(type_code)?,
            bank_id,
            bank_offset,
            compressed_size,
            uncompressed_size,
        });
    }

    Ok(descriptors)
}

impl ResourceReader for BankReader {
    fn descriptors(&self) -> &[ResourceDescriptor] {
        &self.descriptors
    }

    fn read_into(&self, buffer: &mut [u8], descriptor: &ResourceDescriptor) -> VmResult<()> {
        if buffer.len() < descriptor.uncompressed_size {
            return Err(VmError::BufferTooSmall);
        }
        if descriptor.compressed_size > descriptor.uncompressed_size {
            return Err(VmError::InvalidResourceSize);
        }

        let path = self.data_dir.join(format!("bank{:02x}", descriptor.bank_id));
        let mut file = fs::File::open(&path).map_err(|_| VmError::RepositoryFailure)?;
        file.seek(SeekFrom::Start(descriptor.bank_offset as u64))
            .map_err(|_| VmError::RepositoryFailure)?;

        let dst = &mut buffer[..descriptor.uncompressed_size];
        if descriptor.compressed_size == descriptor.uncompressed_size {
            file.read_exact(dst).map_err(|_| VmError::TruncatedData)?;
            return Ok(());
        }

        file.read_exact(&mut dst[..descriptor.compressed_size])
            .map_err(|_| VmError::TruncatedData)?;
        unpack(dst, descriptor.compressed_size)
    }
}

/// In-place LZ decompressor ("bytekiller" format): the packed bytes sit at
/// the front of `data` (`data[..packed_len]`), and are expanded backwards
/// from `packed_len` to fill all of `data`, whose length is the target
/// uncompressed size. The packed stream's final 12 bytes hold, in order,
/// a checksum seed, a running CRC and the uncompressed size as a
/// self-check.
struct Unpacker<'a> {
    data: &'a mut [u8],
    crc: u32,
    chk: u32,
    i_buf: usize,
    o_buf: usize,
}

impl<'a> Unpacker<'a> {
    fn new(data: &'a mut [u8], packed_len: usize) -> VmResult<Self> {
        if packed_len < 12 || packed_len % 4 != 0 {
            return Err(VmError::InvalidCompressedData);
        }
        let mut i_buf = packed_len;

        i_buf -= 4;
        let data_size = BE::read_u32(&data[i_buf..i_buf + 4]) as usize;
        if data_size != data.len() {
            return Err(VmError::InvalidCompressedData);
        }
        i_buf -= 4;
        let crc = BE::read_u32(&data[i_buf..i_buf + 4]);
        i_buf -= 4;
        let chk = BE::read_u32(&data[i_buf..i_buf + 4]);

        Ok(Unpacker {
            data,
            crc: crc ^ chk,
            chk,
            i_buf,
            o_buf: data_size,
        })
    }

    fn next_bit(&mut self) -> VmResult<bool> {
        let carry = (self.chk & 1) == 1;
        self.chk >>= 1;
        if self.chk != 0 {
            return Ok(carry);
        }

        if self.i_buf == 0 {
            return Err(VmError::InvalidCompressedData);
        }
        self.i_buf -= 4;
        self.chk = BE::read_u32(&self.data[self.i_buf..self.i_buf + 4]);
        self.crc ^= self.chk;
        let carry = (self.chk & 1) == 1;
        self.chk >>= 1;
        self.chk |= 1 << 31;
        Ok(carry)
    }

    fn get_code(&mut self, num_bits: u8) -> VmResult<u16> {
        let mut code = 0u16;
        for _ in 0..num_bits {
            code <<= 1;
            code |= self.next_bit()? as u16;
        }
        Ok(code)
    }

    fn copy_literals(&mut self, num_bits: u8, add_count: u16) -> VmResult<()> {
        let count = self.get_code(num_bits)? + add_count;
        for _ in 0..count {
            if self.o_buf < self.i_buf || self.o_buf == 0 {
                return Err(VmError::InvalidCompressedData);
            }
            self.o_buf -= 1;
            self.data[self.o_buf] = self.get_code(8)? as u8;
        }
        Ok(())
    }

    fn copy_backref(&mut self, num_bits: u8, count: u16) -> VmResult<()> {
        let offset = self.get_code(num_bits)? as usize;
        for _ in 0..count {
            if self.o_buf < self.i_buf || self.o_buf == 0 {
                return Err(VmError::InvalidCompressedData);
            }
            self.o_buf -= 1;
            let src = self
                .o_buf
                .checked_add(offset)
                .filter(|&i| i < self.data.len())
                .ok_or(VmError::InvalidCompressedData)?;
            self.data[self.o_buf] = self.data[src];
        }
        Ok(())
    }

    fn run(mut self) -> VmResult<()> {
        loop {
            if self.next_bit()? {
                match self.get_code(2)? {
                    3 => self.copy_literals(8, 9)?,
                    c @ 0..=1 => self.copy_backref((c + 9) as u8, c + 3)?,
                    _ => {
                        let size = self.get_code(8)?;
                        self.copy_backref(12, size + 1)?;
                    }
                }
            } else if self.next_bit()? {
                self.copy_backref(8, 2)?;
            } else {
                self.copy_literals(3, 1)?;
            }
            if self.o_buf == 0 {
                break;
            }
        }

        if self.crc == 0 {
            Ok(())
        } else {
            Err(VmError::InvalidCompressedData)
        }
    }
}

fn unpack(data: &mut [u8], packed_len: usize) -> VmResult<()> {
    Unpacker::new(data, packed_len)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn res_type_from_code_rejects_unknown() {
        assert!(res_type_from_code(7).is_err());
        assert_eq!(res_type_from_code(3).unwrap(), ResourceType::Palettes);
    }
}
