use crate::prom::AddressWidth;

/// 24xx-style serial EEPROM.
///
/// A write transaction starts with the internal address (one or two
/// bytes, most significant first), followed by data stored at the address
/// counter. Reads continue at the address counter, which survives STOP.
#[derive(Clone, Debug)]
pub struct SimEeprom {
	width: AddressWidth,
	memory: Vec<u8>,
	pointer: usize,
	address_pending: usize,
	address: usize,
	reads_in_transaction: usize,
	broken_sequential_read: bool,
}

impl SimEeprom {
	/// erased (0xff) device: 256 bytes for one address byte, 32 KiB for two
	pub fn new(width: AddressWidth) -> Self {
		let size = match width {
			AddressWidth::One => 0x100,
			AddressWidth::Two => 0x8000,
		};
		SimEeprom {
			width,
			memory: vec![0xff; size],
			pointer: 0,
			address_pending: 0,
			address: 0,
			reads_in_transaction: 0,
			broken_sequential_read: false,
		}
	}

	/// Like some cheap parts: only the first byte of a sequential read is
	/// valid, later ones read as 0xff.
	pub fn with_broken_sequential_read(mut self) -> Self {
		self.broken_sequential_read = true;
		self
	}

	pub fn width(&self) -> AddressWidth {
		self.width
	}

	pub fn load(&mut self, address: usize, data: &[u8]) {
		for (i, b) in data.iter().enumerate() {
			let len = self.memory.len();
			self.memory[(address + i) % len] = *b;
		}
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub(super) fn start(&mut self, read: bool) {
		self.reads_in_transaction = 0;
		if !read {
			self.address_pending = self.width.bytes();
			self.address = 0;
		}
	}

	pub(super) fn write(&mut self, byte: u8) -> bool {
		if self.address_pending > 0 {
			self.address = (self.address << 8) | byte as usize;
			self.address_pending -= 1;
			if 0 == self.address_pending {
				self.pointer = self.address % self.memory.len();
			}
		} else {
			self.memory[self.pointer] = byte;
			self.pointer = (self.pointer + 1) % self.memory.len();
		}
		true
	}

	pub(super) fn read(&mut self) -> u8 {
		let data = if self.broken_sequential_read && self.reads_in_transaction > 0 {
			0xff
		} else {
			self.memory[self.pointer]
		};
		self.reads_in_transaction += 1;
		self.pointer = (self.pointer + 1) % self.memory.len();
		data
	}
}

/// PCA9548-style bus switch: a single control byte selects channels.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct SimMux {
	channels: u8,
}

impl SimMux {
	pub fn new() -> Self {
		SimMux::default()
	}

	pub fn channels(&self) -> u8 {
		self.channels
	}

	pub(super) fn write(&mut self, byte: u8) -> bool {
		self.channels = byte;
		true
	}

	pub(super) fn read(&mut self) -> u8 {
		self.channels
	}
}
