mod mapped;

pub use self::mapped::{
	MappedRegisters,
	open_mapped_readwrite,
};

/// Register access provided by the host platform.
///
/// Offsets are byte offsets relative to the base of the window the
/// implementation was opened on.
pub trait RegisterBus {
	fn read_register(&mut self, offset: usize) -> u8;
	fn write_register(&mut self, offset: usize, data: u8);

	// busy-wait for (at least) `cycles` iterations; no timer, no yield
	fn spin(&mut self, cycles: u32) {
		for _ in 0..cycles {
			std::hint::spin_loop();
		}
	}
}

impl<'a, R: ?Sized + RegisterBus> RegisterBus for &'a mut R {
	fn read_register(&mut self, offset: usize) -> u8 {
		R::read_register(*self, offset)
	}
	fn write_register(&mut self, offset: usize, data: u8) {
		R::write_register(*self, offset, data);
	}
	fn spin(&mut self, cycles: u32) {
		R::spin(*self, cycles);
	}
}

/// Registers of the OpenCores I2C master.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
	PrescaleLow,
	PrescaleHigh,
	Control,
	Data,
	CommandStatus,
}

impl Register {
	fn index(self) -> usize {
		match self {
			Register::PrescaleLow => 0,
			Register::PrescaleHigh => 1,
			Register::Control => 2,
			Register::Data => 3,
			Register::CommandStatus => 4,
		}
	}
}

/// How the controller's byte registers are spread over the bus.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum RegisterLayout {
	/// one register per 32-bit word (Wishbone byte address * 4)
	WordStride,
	/// one register per byte
	ByteStride,
}

impl RegisterLayout {
	pub fn stride(self) -> usize {
		match self {
			RegisterLayout::WordStride => 4,
			RegisterLayout::ByteStride => 1,
		}
	}

	pub fn offset(self, register: Register) -> usize {
		register.index() * self.stride()
	}
}

impl Default for RegisterLayout {
	fn default() -> Self {
		RegisterLayout::WordStride
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn word_stride_offsets() {
		let l = RegisterLayout::WordStride;
		assert_eq!(l.offset(Register::PrescaleLow), 0x0);
		assert_eq!(l.offset(Register::PrescaleHigh), 0x4);
		assert_eq!(l.offset(Register::Control), 0x8);
		assert_eq!(l.offset(Register::Data), 0xc);
		assert_eq!(l.offset(Register::CommandStatus), 0x10);
	}

	#[test]
	fn byte_stride_offsets() {
		let l = RegisterLayout::ByteStride;
		assert_eq!(l.offset(Register::Control), 0x2);
		assert_eq!(l.offset(Register::CommandStatus), 0x4);
	}
}
