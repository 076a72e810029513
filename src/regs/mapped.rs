use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::io::{
	FromRawFd,
};
use std::path::Path;
use std::ptr;

use libc::{
	MAP_SHARED,
	O_CLOEXEC,
	O_RDWR,
	O_SYNC,
	PROT_READ,
	PROT_WRITE,
	_SC_PAGESIZE,
	c_void,
	mmap,
	munmap,
	off_t,
	open,
	sysconf,
};

use super::RegisterBus;

/// Register window mapped from a file: a sysfs PCI resource
/// (`/sys/bus/pci/devices/<dev>/resource<N>`) or `/dev/mem`.
#[derive(Debug)]
pub struct MappedRegisters {
	ptr: ptr::NonNull<u8>, // start of the (page aligned) mapping
	map_len: usize,
	// window start inside the mapping
	skip: usize,
	len: usize,
}

impl Drop for MappedRegisters {
	fn drop(&mut self) {
		unsafe {
			let res = munmap(
				self.ptr.as_ptr() as *mut c_void,
				self.map_len,
			);
			if 0 != res {
				error!("munmap failed: {}", io::Error::last_os_error());
			}
		}
	}
}

impl MappedRegisters {
	pub fn len(&self) -> usize {
		self.len
	}

	fn window(&self) -> *mut u8 {
		unsafe { self.ptr.as_ptr().add(self.skip) }
	}
}

impl RegisterBus for MappedRegisters {
	fn read_register(&mut self, offset: usize) -> u8 {
		assert!(offset < self.len);
		let data = unsafe { ptr::read_volatile(self.window().add(offset)) };
		trace!("reg read  +0x{:02x} -> 0x{:02x}", offset, data);
		data
	}

	fn write_register(&mut self, offset: usize, data: u8) {
		assert!(offset < self.len);
		trace!("reg write +0x{:02x} <- 0x{:02x}", offset, data);
		unsafe { ptr::write_volatile(self.window().add(offset), data) }
	}
}

fn page_size() -> usize {
	let size = unsafe { sysconf(_SC_PAGESIZE) };
	if size <= 0 { 4096 } else { size as usize }
}

// TODO: exclusive open / file locking?
fn inner_open(path: &Path, base: usize, len: usize) -> crate::AResult<MappedRegisters> {
	ensure!(len > 0, "empty register window");

	let page = page_size();
	let map_base = base & !(page - 1);
	let skip = base - map_base;
	let map_len = skip + len;

	let c_path = CString::new(path.to_string_lossy().into_owned())?;

	let fd = unsafe { open(c_path.as_ptr(), O_RDWR | O_CLOEXEC | O_SYNC) };
	if -1 == fd {
		return Err(io::Error::last_os_error().into());
	}
	// now get fd managed to prevent resource leak
	let f = unsafe { fs::File::from_raw_fd(fd) };

	// regular files (sysfs resources) have a size; character devices don't
	let size = f.metadata()?.len();
	if size != 0 {
		ensure!((map_len as u64) <= size,
			"register window 0x{:x}+0x{:x} exceeds {} bytes", base, len, size
		);
	}

	let area = unsafe {
		mmap(
			ptr::null_mut(),
			map_len,
			PROT_READ | PROT_WRITE,
			MAP_SHARED,
			fd,
			map_base as off_t,
		)
	};

	if area as usize == !0usize {
		return Err(io::Error::last_os_error().into());
	}
	match ptr::NonNull::new(area as *mut u8) {
		None => bail!("mmap returned NULL"),
		Some(area) => Ok(MappedRegisters {
			ptr: area,
			map_len,
			skip,
			len,
		}),
	}
}

pub fn open_mapped_readwrite<P: AsRef<Path>>(path: P, base: usize, len: usize) -> crate::AResult<MappedRegisters> {
	let path = path.as_ref();
	with_context!(("couldn't map registers 0x{:x}+0x{:x} of {}", base, len, path.display()), {
		inner_open(path, base, len)
	})
}
