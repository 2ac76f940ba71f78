//! Shared Memory Module
//!
//! Anonymous memfd-backed pools for the pixel buffers the compositor
//! displays. The pool owns the descriptor and the read-write mapping;
//! both are released when the pool is destroyed.

use std::os::fd::{AsFd, OwnedFd};
use std::ptr::NonNull;

use anyhow::{Context, Result};
use rustix::fs::{ftruncate, memfd_create, MemfdFlags};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};

use crate::connection::Connection;
use crate::protocol::interfaces::{self, wl_shm, wl_shm_pool};
use crate::protocol::wire::Arg;

pub struct ShmPool {
    pub pool_id: u32,
    fd: OwnedFd,
    size: usize,
    ptr: NonNull<u8>,
}

impl ShmPool {
    /// Create a pool of `size` bytes and announce it to the compositor.
    pub fn new(conn: &mut Connection, shm_id: u32, size: usize) -> Result<Self> {
        let fd = memfd_create("rift-shm", MemfdFlags::CLOEXEC)
            .context("memfd_create failed")?;
        ftruncate(&fd, size as u64).context("failed to size shm pool")?;
        let ptr = map(&fd, size)?;

        let pool_id = conn.new_object(&interfaces::WL_SHM_POOL);
        let wire_fd = fd.try_clone().context("failed to dup shm fd")?;
        conn.send_request(
            shm_id,
            wl_shm::REQ_CREATE_POOL,
            vec![Arg::NewId(pool_id), Arg::Fd(wire_fd), Arg::Int(size as i32)],
        )?;
        Ok(Self { pool_id, fd, size, ptr })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// The mapped pool memory.
    pub fn data(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }

    /// Create a wl_buffer viewing `size`-byte rows of ARGB8888 pixels.
    pub fn create_buffer(
        &self,
        conn: &mut Connection,
        offset: i32,
        width: i32,
        height: i32,
        stride: i32,
    ) -> Result<u32> {
        let buffer = conn.new_object(&interfaces::WL_BUFFER);
        conn.send_request(
            self.pool_id,
            wl_shm_pool::REQ_CREATE_BUFFER,
            vec![
                Arg::NewId(buffer),
                Arg::Int(offset),
                Arg::Int(width),
                Arg::Int(height),
                Arg::Int(stride),
                Arg::Uint(wl_shm::FORMAT_ARGB8888),
            ],
        )?;
        Ok(buffer)
    }

    /// Grow the pool. Shrinking is forbidden by the protocol, so smaller
    /// requests are ignored.
    pub fn grow(&mut self, conn: &mut Connection, new_size: usize) -> Result<()> {
        if new_size <= self.size {
            return Ok(());
        }
        unsafe { munmap(self.ptr.as_ptr().cast(), self.size) }.context("munmap failed")?;
        ftruncate(&self.fd, new_size as u64).context("failed to grow shm pool")?;
        self.ptr = map(&self.fd, new_size)?;
        self.size = new_size;
        conn.send_request(
            self.pool_id,
            wl_shm_pool::REQ_RESIZE,
            vec![Arg::Int(new_size as i32)],
        )?;
        Ok(())
    }

    /// Send the pool destructor. The mapping itself is released on drop.
    pub fn destroy(&mut self, conn: &mut Connection) -> Result<()> {
        conn.send_destructor(self.pool_id, wl_shm_pool::REQ_DESTROY)?;
        Ok(())
    }
}

impl Drop for ShmPool {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.ptr.as_ptr().cast(), self.size);
        }
    }
}

fn map(fd: &OwnedFd, size: usize) -> Result<NonNull<u8>> {
    let ptr = unsafe {
        mmap(
            std::ptr::null_mut(),
            size,
            ProtFlags::READ | ProtFlags::WRITE,
            MapFlags::SHARED,
            fd.as_fd(),
            0,
        )
    }
    .context("failed to map shm pool")?;
    NonNull::new(ptr.cast()).context("mmap returned a null pointer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;

    #[test]
    fn pool_memory_is_readable_and_writable() {
        let (client, _server) = UnixStream::pair().unwrap();
        let mut conn = Connection::from_stream(client).unwrap();
        let shm_id = conn.new_object(&interfaces::WL_SHM);

        let mut pool = ShmPool::new(&mut conn, shm_id, 4096).unwrap();
        pool.data()[0] = 0xaa;
        pool.data()[4095] = 0x55;
        assert_eq!(pool.data()[0], 0xaa);

        let buffer = pool.create_buffer(&mut conn, 0, 32, 32, 128).unwrap();
        assert!(buffer > shm_id);

        pool.grow(&mut conn, 8192).unwrap();
        assert_eq!(pool.size(), 8192);
        // Contents survive the remap.
        assert_eq!(pool.data()[0], 0xaa);
    }
}
