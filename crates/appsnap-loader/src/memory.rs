//! Memory that backs a snapshot's buffer views
//!
//! Two kinds of backing exist:
//! - **FileMapping**: a read-only private mapping of a byte range of the
//!   snapshot file (Unix only)
//! - **AnonymousMemory**: page-aligned anonymous memory the payload was
//!   copied into, sealed read-only after the copy
//!
//! Both start on a page boundary, so an offset that is aligned within the
//! payload stays aligned in memory as long as the payload's file offset is
//! page-aligned.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

/// Host page size.
pub fn page_size() -> usize {
    #[cfg(unix)]
    {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            return size as usize;
        }
    }
    4096
}

/// Owner of the bytes a snapshot hands out.
pub enum Backing {
    /// Private read-only mapping of the file
    #[cfg(unix)]
    File(FileMapping),
    /// Anonymous copy of the payload
    Anonymous(AnonymousMemory),
}

impl Backing {
    /// Back `len` bytes of `file` starting at `offset`.
    ///
    /// With `in_memory` (or on hosts without file mappings) the bytes are
    /// copied into anonymous memory and nothing keeps referring to `file`.
    pub fn load(file: &mut File, offset: u64, len: usize, in_memory: bool) -> io::Result<Self> {
        #[cfg(unix)]
        if !in_memory {
            return FileMapping::map(file, offset, len).map(Backing::File);
        }
        #[cfg(not(unix))]
        let _ = in_memory;

        file.seek(SeekFrom::Start(offset))?;
        AnonymousMemory::fill(len, |buf| file.read_exact(buf)).map(Backing::Anonymous)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            #[cfg(unix)]
            Backing::File(mapping) => mapping.as_bytes(),
            Backing::Anonymous(memory) => memory.as_bytes(),
        }
    }

    pub fn is_file_backed(&self) -> bool {
        match self {
            #[cfg(unix)]
            Backing::File(_) => true,
            Backing::Anonymous(_) => false,
        }
    }
}

/// Read-only private mapping of part of a file.
#[cfg(unix)]
pub struct FileMapping {
    /// Page-aligned start of the mapping
    base: *mut u8,

    /// Length of the whole mapping, from `base`
    map_len: usize,

    /// Distance from `base` to the first requested byte
    delta: usize,

    /// Requested length
    len: usize,
}

// Safety: the mapping is PROT_READ and never remapped until drop.
#[cfg(unix)]
unsafe impl Send for FileMapping {}
#[cfg(unix)]
unsafe impl Sync for FileMapping {}

#[cfg(unix)]
impl FileMapping {
    /// Map `len` bytes of `file` at `offset`; `offset` need not be page-aligned.
    pub fn map(file: &File, offset: u64, len: usize) -> io::Result<Self> {
        use std::os::unix::io::AsRawFd;

        if len == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty mapping"));
        }
        let page = page_size() as u64;
        let aligned_offset = offset & !(page - 1);
        let delta = (offset - aligned_offset) as usize;
        let map_len = len
            .checked_add(delta)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "mapping too large"))?;
        let file_offset = libc::off_t::try_from(aligned_offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ,
                libc::MAP_PRIVATE,
                file.as_raw_fd(),
                file_offset,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            base: ptr as *mut u8,
            map_len,
            delta,
            len,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.base.add(self.delta), self.len) }
    }
}

#[cfg(unix)]
impl Drop for FileMapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.map_len);
        }
    }
}

/// Page-aligned anonymous memory holding a copy of a payload.
pub struct AnonymousMemory {
    base: *mut u8,
    len: usize,
}

// Safety: written once during construction, read-only afterwards.
unsafe impl Send for AnonymousMemory {}
unsafe impl Sync for AnonymousMemory {}

impl AnonymousMemory {
    /// Allocate `len` bytes, let `init` fill them, then seal them read-only.
    pub fn fill<F>(len: usize, init: F) -> io::Result<Self>
    where
        F: FnOnce(&mut [u8]) -> io::Result<()>,
    {
        if len == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty allocation"));
        }
        let memory = Self::allocate(len)?;
        // Dropping `memory` on error releases the allocation.
        init(unsafe { std::slice::from_raw_parts_mut(memory.base, len) })?;
        memory.seal()?;
        Ok(memory)
    }

    /// Copy `bytes` into fresh anonymous memory.
    pub fn copy_from(bytes: &[u8]) -> io::Result<Self> {
        Self::fill(bytes.len(), |buf| {
            buf.copy_from_slice(bytes);
            Ok(())
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.base, self.len) }
    }

    #[cfg(unix)]
    fn allocate(len: usize) -> io::Result<Self> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            base: ptr as *mut u8,
            len,
        })
    }

    #[cfg(unix)]
    fn seal(&self) -> io::Result<()> {
        let rc = unsafe { libc::mprotect(self.base as *mut libc::c_void, self.len, libc::PROT_READ) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn layout(len: usize) -> io::Result<std::alloc::Layout> {
        std::alloc::Layout::from_size_align(len, page_size())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }

    #[cfg(not(unix))]
    fn allocate(len: usize) -> io::Result<Self> {
        let ptr = unsafe { std::alloc::alloc_zeroed(Self::layout(len)?) };
        if ptr.is_null() {
            return Err(io::Error::from(io::ErrorKind::OutOfMemory));
        }
        Ok(Self { base: ptr, len })
    }

    #[cfg(not(unix))]
    fn seal(&self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for AnonymousMemory {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.len);
        }
        #[cfg(not(unix))]
        if let Ok(layout) = Self::layout(self.len) {
            unsafe { std::alloc::dealloc(self.base, layout) };
        }
    }
}
