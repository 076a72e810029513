mod mux;

pub use self::mux::{
	MUX_ADDRESS,
	MuxChannel,
	select_mux_channel,
};

use crate::i2c::{
	DeviceAddress,
	I2cEngine,
	MAX_TRANSFER,
	TransferError,
};
use crate::regs::RegisterBus;

// E24AA025E: factory programmed EUI-48 in the upper half
pub const UID_OFFSET: u8 = 0xfa;
pub const GPO_OFFSET: u8 = 0x10;
pub const MEMORY_OFFSET: u8 = 0x00;

pub const DEFAULT_PROM_ADDRESS: DeviceAddress = DeviceAddress::masked(0x50);

/// Number of bytes needed to address the EEPROM memory; E24AA025E needs
/// one, AT24C256 two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressWidth {
	One,
	Two,
}

impl AddressWidth {
	pub fn bytes(self) -> usize {
		match self {
			AddressWidth::One => 1,
			AddressWidth::Two => 2,
		}
	}

	pub fn from_bytes(bytes: usize) -> crate::AResult<Self> {
		match bytes {
			1 => Ok(AddressWidth::One),
			2 => Ok(AddressWidth::Two),
			_ => bail!("unsupported EEPROM address width: {} bytes", bytes),
		}
	}
}

impl Default for AddressWidth {
	fn default() -> Self {
		AddressWidth::One
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromConfig {
	pub bus_address: DeviceAddress,
	pub address_width: AddressWidth,
	pub uid_offset: u8,
	pub gpo_offset: u8,
	pub memory_offset: u8,
}

impl Default for PromConfig {
	fn default() -> Self {
		PromConfig {
			bus_address: DEFAULT_PROM_ADDRESS,
			address_width: AddressWidth::default(),
			uid_offset: UID_OFFSET,
			gpo_offset: GPO_OFFSET,
			memory_offset: MEMORY_OFFSET,
		}
	}
}

pub struct Prom<R: RegisterBus> {
	engine: I2cEngine<R>,
	config: PromConfig,
}

impl<R: RegisterBus> Prom<R> {
	pub fn new(engine: I2cEngine<R>, config: PromConfig) -> Self {
		Prom {
			engine,
			config,
		}
	}

	pub fn config(&self) -> &PromConfig {
		&self.config
	}

	pub fn engine(&self) -> &I2cEngine<R> {
		&self.engine
	}

	pub fn engine_mut(&mut self) -> &mut I2cEngine<R> {
		&mut self.engine
	}

	pub fn into_engine(self) -> I2cEngine<R> {
		self.engine
	}

	// a two byte address repeats the offset in both bytes; that is what
	// the deployed devices were programmed with
	fn address_bytes(&self, offset: u8) -> ([u8; 2], usize) {
		([offset, offset], self.config.address_width.bytes())
	}

	/// Sets the EEPROM address counter to `offset` (without STOP) and reads
	/// `buf.len()` bytes from there.
	pub fn read(&mut self, offset: u8, buf: &mut [u8]) -> Result<usize, TransferError> {
		let device = self.config.bus_address;
		let (address, n) = self.address_bytes(offset);
		for b in buf.iter_mut() {
			*b = 0;
		}
		trace!("PROM read @0x{:02x}, {} bytes", offset, buf.len());
		self.engine.write(device, &address[..n], false)?;
		self.engine.read(device, buf)
	}

	pub fn read_byte(&mut self, offset: u8) -> Result<u8, TransferError> {
		let mut buf = [0u8; 1];
		self.read(offset, &mut buf)?;
		Ok(buf[0])
	}

	/// Writes `payload` at `offset` in one transaction ending with STOP;
	/// returns the number of payload bytes acknowledged.
	pub fn write(&mut self, offset: u8, payload: &[u8]) -> Result<usize, TransferError> {
		let device = self.config.bus_address;
		let (address, n) = self.address_bytes(offset);
		if n + payload.len() > MAX_TRANSFER {
			return Err(TransferError::PayloadTooLong { len: payload.len(), max: MAX_TRANSFER - n });
		}

		let mut frame = [0u8; MAX_TRANSFER];
		frame[..n].copy_from_slice(&address[..n]);
		frame[n..n + payload.len()].copy_from_slice(payload);

		trace!("PROM write @0x{:02x}: {:02x?}", offset, payload);
		match self.engine.write(device, &frame[..n + payload.len()], true) {
			Ok(written) => Ok(written - n),
			Err(TransferError::Nack { written }) => Err(TransferError::Nack { written: written.saturating_sub(n) }),
			Err(TransferError::Timeout { transferred }) => Err(TransferError::Timeout { transferred: transferred.saturating_sub(n) }),
			Err(e) => Err(e),
		}
	}

	/// Reads the first `count` bytes, one transaction per byte.
	pub fn dump(&mut self, count: usize) -> Result<Vec<(u8, u8)>, TransferError> {
		let count = count.min(0x100);
		let mut result = Vec::with_capacity(count);
		for offset in 0..count {
			let offset = offset as u8;
			result.push((offset, self.read_byte(offset)?));
		}
		Ok(result)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::i2c::EngineConfig;
	use crate::regs::RegisterLayout;
	use crate::sim::{
		SimController,
		SimEeprom,
	};

	fn prom(width: AddressWidth) -> Prom<SimController> {
		let mut sim = SimController::new(RegisterLayout::WordStride);
		sim.attach(DEFAULT_PROM_ADDRESS, SimEeprom::new(width));
		let mut engine = I2cEngine::new(sim, EngineConfig::default());
		engine.setup();
		Prom::new(engine, PromConfig { address_width: width, ..PromConfig::default() })
	}

	#[test]
	fn round_trip_one_address_byte() {
		let mut p = prom(AddressWidth::One);
		for &offset in [0x00u8, 0x10, 0x80, 0xf0].iter() {
			let payload = [offset, 0x5a, 0xa5, !offset];
			assert_eq!(p.write(offset, &payload), Ok(4));
			let mut buf = [0u8; 4];
			assert_eq!(p.read(offset, &mut buf), Ok(4));
			assert_eq!(buf, payload);
		}
	}

	#[test]
	fn round_trip_two_address_bytes() {
		let mut p = prom(AddressWidth::Two);
		for &offset in [0x00u8, 0x10, 0x7f, 0xfa].iter() {
			let payload = [0xde, 0xad, offset];
			assert_eq!(p.write(offset, &payload), Ok(3));
			let mut buf = [0u8; 3];
			assert_eq!(p.read(offset, &mut buf), Ok(3));
			assert_eq!(buf, payload);
		}
	}

	#[test]
	fn two_byte_address_repeats_offset() {
		let mut p = prom(AddressWidth::Two);
		p.write(0x12, &[0x77]).unwrap();
		let sim = p.engine().registers();
		let eeprom = sim.device(DEFAULT_PROM_ADDRESS).unwrap();
		assert_eq!(eeprom.memory()[0x1212], 0x77);
	}

	#[test]
	fn read_chains_without_stop() {
		let mut p = prom(AddressWidth::One);
		let mut buf = [0u8; 2];
		p.read(0x00, &mut buf).unwrap();
		// only the final read byte carries STOP
		assert_eq!(p.engine().registers().stop_count(), 1);
	}

	#[test]
	fn write_reports_payload_bytes_on_nack() {
		let mut p = prom(AddressWidth::One);
		// data index 0 is the address byte
		p.engine_mut().registers_mut().nack_data_byte(DEFAULT_PROM_ADDRESS, 3);
		assert_eq!(p.write(0x00, &[1, 2, 3, 4]), Err(TransferError::Nack { written: 2 }));
	}

	#[test]
	fn write_too_long_for_frame() {
		let mut p = prom(AddressWidth::Two);
		let payload = [0u8; MAX_TRANSFER - 1];
		assert_eq!(
			p.write(0x00, &payload),
			Err(TransferError::PayloadTooLong { len: MAX_TRANSFER - 1, max: MAX_TRANSFER - 2 }),
		);
	}

	#[test]
	fn missing_device_reads_zeroes() {
		let mut p = prom(AddressWidth::One);
		p.config.bus_address = DeviceAddress::masked(0x53);
		let mut buf = [0xffu8; 4];
		assert_eq!(p.read(0x00, &mut buf), Err(TransferError::Nack { written: 0 }));
		assert_eq!(buf, [0; 4]);
	}

	#[test]
	fn dump_reads_single_bytes() {
		let mut p = prom(AddressWidth::One);
		p.engine_mut().registers_mut().device_mut(DEFAULT_PROM_ADDRESS).unwrap().load(0, &[1, 2, 3]);
		let dump = p.dump(32).unwrap();
		assert_eq!(dump.len(), 32);
		assert_eq!(&dump[..4], &[(0, 1), (1, 2), (2, 3), (3, 0xff)]);
		// one STOP per byte
		assert_eq!(p.engine().registers().stop_count(), 32);
	}

	#[test]
	fn address_width_from_bytes() {
		assert_eq!(AddressWidth::from_bytes(2).unwrap(), AddressWidth::Two);
		assert!(AddressWidth::from_bytes(3).is_err());
	}
}
