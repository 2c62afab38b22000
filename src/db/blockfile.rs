//! The block-structured image backing the database.
//!
//! Records are byte strings stored as chains of fixed-size blocks. Each
//! block is self-describing: a type tag, the bytes in use, the next link
//! and a CRC32 over its contents. Free blocks are threaded through the
//! image on a free list and are reused, ascending-first, before the image
//! grows, so saving the same tree twice produces the same bytes.
//!
//! Opening an image validates the superblock, every non-free block's CRC
//! and the free list; a mismatch anywhere is fatal for that open.

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use crate::error::{Error, Result};
use crate::wire::{read, write};

pub const BLOCK_SIZE: usize = 4096;
/// kind (u8) + used (u16) + next (u32) + crc (u32)
const BLOCK_HEADER: usize = 11;
pub const BLOCK_DATA: usize = BLOCK_SIZE - BLOCK_HEADER;

/// Link terminator.
pub const NIL: u32 = u32::MAX;

const IMAGE_MAGIC: &[u8; 4] = b"VBLK";
const IMAGE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
enum BlockKind {
    Free = 0,
    Record = 1,
    Continuation = 2,
}

#[derive(Debug, Clone)]
struct Block {
    kind: BlockKind,
    used: u16,
    next: u32,
    data: Vec<u8>,
}

impl Block {
    fn free() -> Block {
        Block { kind: BlockKind::Free, used: 0, next: NIL, data: vec![0; BLOCK_DATA] }
    }

    fn crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[self.kind as u8]);
        hasher.update(&self.used.to_le_bytes());
        hasher.update(&self.next.to_le_bytes());
        hasher.update(&self.data);
        hasher.finalize()
    }
}

/// An in-memory block image.
#[derive(Debug, Clone)]
pub struct BlockFile {
    blocks: Vec<Block>,
    free_head: u32,
    /// Address of the root record; [`NIL`] when the image holds nothing.
    root: u32,
}

impl Default for BlockFile {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockFile {
    pub fn new() -> Self {
        Self { blocks: Vec::new(), free_head: NIL, root: NIL }
    }

    pub fn root(&self) -> u32 {
        self.root
    }

    pub fn set_root(&mut self, addr: u32) {
        self.root = addr;
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn free_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.kind == BlockKind::Free).count()
    }

    fn alloc(&mut self) -> u32 {
        if self.free_head != NIL {
            let addr = self.free_head;
            self.free_head = self.blocks[addr as usize].next;
            self.blocks[addr as usize] = Block::free();
            return addr;
        }
        self.blocks.push(Block::free());
        (self.blocks.len() - 1) as u32
    }

    /// Stores a record, chaining as many blocks as its length needs, and
    /// returns the address of its first block.
    pub fn store_record(&mut self, bytes: &[u8]) -> u32 {
        let chunks: Vec<&[u8]> = if bytes.is_empty() {
            vec![&[]]
        } else {
            bytes.chunks(BLOCK_DATA).collect()
        };
        let addrs: Vec<u32> = chunks.iter().map(|_| self.alloc()).collect();
        for (i, (chunk, addr)) in chunks.iter().zip(addrs.iter()).enumerate() {
            let block = &mut self.blocks[*addr as usize];
            block.kind = if i == 0 { BlockKind::Record } else { BlockKind::Continuation };
            block.used = chunk.len() as u16;
            block.data[..chunk.len()].copy_from_slice(chunk);
            block.data[chunk.len()..].fill(0);
            block.next = addrs.get(i + 1).copied().unwrap_or(NIL);
        }
        addrs[0]
    }

    /// Reads a record chain back into one byte string.
    pub fn read_record(&self, addr: u32) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut current = addr;
        let mut hops = 0usize;
        let mut expect_head = true;
        while current != NIL {
            if hops > self.blocks.len() {
                return Err(Error::BadFreeList);
            }
            let block = self
                .blocks
                .get(current as usize)
                .ok_or(Error::BadBlockKind { block: current })?;
            let ok_kind = if expect_head {
                block.kind == BlockKind::Record
            } else {
                block.kind == BlockKind::Continuation
            };
            if !ok_kind {
                return Err(Error::BadBlockKind { block: current });
            }
            out.extend_from_slice(&block.data[..block.used as usize]);
            current = block.next;
            expect_head = false;
            hops += 1;
        }
        Ok(out)
    }

    /// Returns a record chain's blocks to the free list.
    pub fn free_record(&mut self, addr: u32) -> Result<()> {
        let mut current = addr;
        let mut hops = 0usize;
        while current != NIL {
            if hops > self.blocks.len() {
                return Err(Error::BadFreeList);
            }
            let next = {
                let block = self
                    .blocks
                    .get(current as usize)
                    .ok_or(Error::BadBlockKind { block: current })?;
                if block.kind == BlockKind::Free {
                    return Err(Error::BadBlockKind { block: current });
                }
                block.next
            };
            self.blocks[current as usize] = Block::free();
            self.blocks[current as usize].next = self.free_head;
            self.free_head = current;
            current = next;
            hops += 1;
        }
        Ok(())
    }

    /// Frees every record block and rebuilds the free list in ascending
    /// order. Used before re-storing a mutated tree so block reuse is
    /// deterministic.
    pub fn recycle(&mut self) {
        for block in self.blocks.iter_mut() {
            *block = Block::free();
        }
        self.free_head = NIL;
        for idx in (0..self.blocks.len()).rev() {
            self.blocks[idx].next = self.free_head;
            self.free_head = idx as u32;
        }
        self.root = NIL;
    }

    /// Serializes the image: superblock, then each block with its CRC.
    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        dest.write_all(IMAGE_MAGIC)?;
        write::u32(dest, IMAGE_VERSION)?;
        write::usize_as_u32(dest, self.blocks.len())?;
        write::u32(dest, self.free_head)?;
        write::u32(dest, self.root)?;
        for block in &self.blocks {
            write::u8(dest, block.kind as u8)?;
            write::u16(dest, block.used)?;
            write::u32(dest, block.next)?;
            write::u32(dest, block.crc())?;
            dest.write_all(&block.data)?;
        }
        Ok(())
    }

    /// Deserializes and validates an image.
    pub fn read(src: &mut impl Read) -> Result<BlockFile> {
        let magic = read::array::<4>(src)?;
        if &magic != IMAGE_MAGIC {
            return Err(Error::WireFormat("block image magic mismatch"));
        }
        let version = read::u32(src)?;
        if version != IMAGE_VERSION {
            return Err(Error::WireFormat("block image version mismatch"));
        }
        let count = read::u32_as_usize(src)?;
        if count > (read::MAX_COUNTED_LEN / BLOCK_SIZE) {
            return Err(Error::WireFormat("block count out of range"));
        }
        let free_head = read::u32(src)?;
        let root = read::u32(src)?;

        let mut blocks = Vec::with_capacity(count);
        for idx in 0..count {
            let kind_raw = read::u8(src)?;
            let kind: BlockKind = num_traits::FromPrimitive::from_u8(kind_raw)
                .ok_or(Error::BadBlockKind { block: idx as u32 })?;
            let used = read::u16(src)?;
            let next = read::u32(src)?;
            let stored_crc = read::u32(src)?;
            let mut data = vec![0u8; BLOCK_DATA];
            src.read_exact(&mut data).map_err(Error::Io)?;
            if usize::from(used) > BLOCK_DATA {
                return Err(Error::BadBlockKind { block: idx as u32 });
            }
            let block = Block { kind, used, next, data };
            if kind != BlockKind::Free && block.crc() != stored_crc {
                return Err(Error::BlockCrc { block: idx as u32 });
            }
            blocks.push(block);
        }

        let file = BlockFile { blocks, free_head, root };
        file.validate_free_list()?;
        if file.root != NIL {
            let root_block = file
                .blocks
                .get(file.root as usize)
                .ok_or(Error::BadBlockKind { block: file.root })?;
            if root_block.kind != BlockKind::Record {
                return Err(Error::BadBlockKind { block: file.root });
            }
        }
        Ok(file)
    }

    /// Walks the free list checking bounds, kinds and the absence of
    /// cycles, and that it accounts for every free block.
    fn validate_free_list(&self) -> Result<()> {
        let mut seen = vec![false; self.blocks.len()];
        let mut current = self.free_head;
        let mut count = 0usize;
        while current != NIL {
            let idx = current as usize;
            let block = self.blocks.get(idx).ok_or(Error::BadFreeList)?;
            if block.kind != BlockKind::Free || seen[idx] {
                return Err(Error::BadFreeList);
            }
            seen[idx] = true;
            count += 1;
            current = block.next;
        }
        if count != self.free_count() {
            return Err(Error::BadFreeList);
        }
        Ok(())
    }
}
