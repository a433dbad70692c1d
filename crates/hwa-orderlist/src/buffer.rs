//! A loaned order-list buffer with commands growing up from the front and assets growing
//! down from the back.

use gipa2_protocol::{Command, CommandLayout, Opcode};

use crate::api::{Buffer, Submission};
use crate::asset::{asset_size, AssetRef, AssetSource, AssetTable, AssetTag};
use crate::error::{HwaError, Result};

/// Bytes kept free between the command and asset areas so a band can always be closed with
/// `BAND_DMA` and `COM_BLOCK_END`.
pub const RESERVE: usize = CommandLayout::BAND_DMA_SIZE + CommandLayout::COM_BLOCK_END_SIZE;

#[derive(Debug)]
pub struct CommandBuffer {
    buffer: Buffer,
    cmd_ptr: usize,
    asset_ptr: usize,
    head: Option<usize>,
    prev: Option<(usize, Opcode)>,
    assets: AssetTable,
}

impl CommandBuffer {
    pub fn new(mut buffer: Buffer) -> Self {
        // Asset payloads must stay 8-byte aligned relative to the buffer start.
        let capacity = buffer.data.len() & !7;
        buffer.data.truncate(capacity);
        Self {
            buffer,
            cmd_ptr: 0,
            asset_ptr: capacity,
            head: None,
            prev: None,
            assets: AssetTable::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.buffer.id
    }

    /// Address of byte 0.
    pub fn address(&self) -> u32 {
        self.buffer.address
    }

    pub fn capacity(&self) -> usize {
        self.buffer.data.len()
    }

    pub fn cmd_len(&self) -> usize {
        self.cmd_ptr
    }

    pub fn asset_offset(&self) -> usize {
        self.asset_ptr
    }

    /// Bytes of asset data, zero when no asset was ever added.
    pub fn asset_len(&self) -> usize {
        if self.assets.is_empty() {
            0
        } else {
            self.capacity() - self.asset_ptr
        }
    }

    pub fn address_of(&self, offset: usize) -> u32 {
        self.buffer.address.wrapping_add(offset as u32)
    }

    /// Whether `n` more command and asset bytes fit without touching the reserve.
    pub fn fits(&self, n: usize) -> bool {
        self.cmd_ptr + n + RESERVE <= self.asset_ptr
    }

    /// Free bytes between the areas, not counting the reserve.
    pub fn free(&self) -> usize {
        self.asset_ptr.saturating_sub(self.cmd_ptr + RESERVE)
    }

    /// Writes `cmd` at the command cursor and returns its offset.
    pub fn emit(&mut self, cmd: &Command) -> Result<usize> {
        let size = cmd.size_bytes();
        let offset = self.cmd_ptr;
        if offset + size > self.asset_ptr {
            return Err(HwaError::Overflow {
                opcode: cmd.opcode(),
                size,
            });
        }
        cmd.encode(&mut self.buffer.data[offset..self.asset_ptr])
            .map_err(HwaError::Encode)?;
        tracing::trace!(offset, opcode = %cmd.opcode(), "emit");
        self.cmd_ptr += size;
        self.prev = Some((offset, cmd.opcode()));
        Ok(offset)
    }

    /// Pads the command area with zeroes up to the next 16-byte boundary.
    pub fn align16(&mut self) {
        let aligned = (self.cmd_ptr + 15) & !15;
        let end = aligned.min(self.asset_ptr);
        self.buffer.data[self.cmd_ptr..end].fill(0);
        self.cmd_ptr = end;
    }

    /// Makes the `COM_HEAD` at `offset` current, linking the previous one to it.
    pub fn link_head(&mut self, offset: usize) {
        if let Some(old) = self.head.replace(offset) {
            let at = old + CommandLayout::COM_HEAD_NEXT_OFFSET;
            let address = self.address_of(offset);
            self.buffer.data[at..at + 4].copy_from_slice(&address.to_be_bytes());
        }
    }

    pub fn head(&self) -> Option<usize> {
        self.head
    }

    /// Offset and opcode of the most recently emitted command.
    pub fn prev(&self) -> Option<(usize, Opcode)> {
        self.prev
    }

    pub fn command_at(&self, offset: usize) -> Result<Command> {
        Command::decode(&self.buffer.data[offset..self.cmd_ptr]).map_err(HwaError::Encode)
    }

    /// Re-encodes the command at `offset` in place. The form (and so the size) must not
    /// change.
    pub fn rewrite(&mut self, offset: usize, cmd: &Command) -> Result<()> {
        let end = offset + cmd.size_bytes();
        if end > self.cmd_ptr {
            return Err(HwaError::Overflow {
                opcode: cmd.opcode(),
                size: cmd.size_bytes(),
            });
        }
        cmd.encode(&mut self.buffer.data[offset..end])
            .map_err(HwaError::Encode)?;
        Ok(())
    }

    /// Reserves an asset of `len` bytes from the tail. The payload is zeroed.
    ///
    /// Returns `None` when the asset would leave less than a `COM_BLOCK_END` between the
    /// areas.
    pub fn add_asset(
        &mut self,
        tag: AssetTag,
        source: AssetSource,
        len: usize,
        arg: i32,
    ) -> Option<AssetRef> {
        let size = asset_size(len);
        let floor = self.asset_ptr.checked_sub(size)?;
        if self.cmd_ptr + CommandLayout::COM_BLOCK_END_SIZE > floor {
            return None;
        }
        self.asset_ptr = floor;
        self.buffer.data[floor..floor + size].fill(0);
        let handle = self.assets.insert(tag, source, arg, floor, len);
        self.assets
            .write_header(&mut self.buffer.data, self.buffer.address, handle);
        let (offset, len) = self.assets.payload(handle);
        tracing::trace!(?tag, ?source, arg, len, offset, "asset");
        Some(AssetRef {
            handle,
            offset,
            len,
            address: self.address_of(offset),
        })
    }

    /// Finds an existing asset and makes it most recently used.
    pub fn find_asset(&mut self, source: AssetSource, arg: i32) -> Option<AssetRef> {
        let (handle, relinked) = self.assets.find(source, arg)?;
        if let Some(parent) = relinked {
            self.assets
                .write_header(&mut self.buffer.data, self.buffer.address, parent);
            self.assets
                .write_header(&mut self.buffer.data, self.buffer.address, handle);
        }
        let (offset, len) = self.assets.payload(handle);
        Some(AssetRef {
            handle,
            offset,
            len,
            address: self.address_of(offset),
        })
    }

    pub fn payload(&self, asset: &AssetRef) -> &[u8] {
        &self.buffer.data[asset.offset..asset.offset + asset.len]
    }

    pub fn payload_mut(&mut self, asset: &AssetRef) -> &mut [u8] {
        &mut self.buffer.data[asset.offset..asset.offset + asset.len]
    }

    pub fn assets(&self) -> &AssetTable {
        &self.assets
    }

    pub fn commands(&self) -> &[u8] {
        &self.buffer.data[..self.cmd_ptr]
    }

    pub(crate) fn commands_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.data[..self.cmd_ptr]
    }

    pub fn asset_area(&self) -> &[u8] {
        &self.buffer.data[self.asset_ptr..]
    }

    pub fn into_submission(self, from_band: i32, to_band: i32, complete: bool) -> Submission {
        let command_len = self.cmd_ptr;
        let asset_offset = if self.assets.is_empty() {
            self.buffer.data.len()
        } else {
            self.asset_ptr
        };
        Submission {
            buffer: self.buffer,
            from_band,
            to_band,
            command_len,
            asset_offset,
            complete,
        }
    }

    pub fn into_inner(self) -> Buffer {
        self.buffer
    }
}
