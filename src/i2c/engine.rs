use std::fmt;

use crate::regs::{
	Register,
	RegisterBus,
	RegisterLayout,
};

use super::{
	Command,
	Control,
	Status,
	TransferError,
};

/// Largest payload (or read) of a single transaction.
pub const MAX_TRANSFER: usize = 16;

/// ratio of host clock to SCL
pub const DEFAULT_PRESCALE: u16 = 0x0400;

/// spin cycles between two status polls
pub const DEFAULT_POLL_DELAY: u32 = 512;

pub const DEFAULT_POLL_LIMIT: u32 = 0xffff;

// wait after enabling the core; >= 100us on a 430 soft core
const DEFAULT_SETTLE_CYCLES: u32 = 1000;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum PollLimit {
	/// give up after this many polls still showing "in progress"
	Bounded(u32),
	/// poll forever; a stuck bus hangs the caller
	Unbounded,
}

impl Default for PollLimit {
	fn default() -> Self {
		PollLimit::Bounded(DEFAULT_POLL_LIMIT)
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EngineConfig {
	pub prescale: u16,
	pub poll_delay: u32,
	pub poll_limit: PollLimit,
	pub settle_cycles: u32,
	pub layout: RegisterLayout,
}

impl Default for EngineConfig {
	fn default() -> Self {
		EngineConfig {
			prescale: DEFAULT_PRESCALE,
			poll_delay: DEFAULT_POLL_DELAY,
			poll_limit: PollLimit::default(),
			settle_cycles: DEFAULT_SETTLE_CYCLES,
			layout: RegisterLayout::default(),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
	Write,
	Read,
}

/// 7-bit I2C device address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceAddress(u8);

impl DeviceAddress {
	pub fn new(address: u8) -> crate::AResult<Self> {
		ensure!(address < 0x80, "I2C device address 0x{:02x} doesn't fit in 7 bits", address);
		Ok(DeviceAddress(address))
	}

	/// drops the highest bit, like the controller would
	pub const fn masked(address: u8) -> Self {
		DeviceAddress(address & 0x7f)
	}

	pub fn value(&self) -> u8 {
		self.0
	}

	/// first byte on the wire: address and R/W bit
	pub fn address_byte(&self, direction: Direction) -> u8 {
		match direction {
			Direction::Write => self.0 << 1,
			Direction::Read => (self.0 << 1) | 0x01,
		}
	}
}

impl fmt::Display for DeviceAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl fmt::Debug for DeviceAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "DeviceAddress(0x{:02x})", self.0)
	}
}

/// Bus state between transactions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BusState {
	/// STOP issued (or nothing happened yet); a new transaction may begin
	Stopped,
	/// a write ended without STOP; the next transaction starts with a
	/// repeated START
	Held(DeviceAddress),
}

/// Drives one addressed transfer at a time through the controller's
/// command/status register, polling for completion after every phase.
///
/// Not reentrant: all operations take `&mut self`.
pub struct I2cEngine<R: RegisterBus> {
	regs: R,
	config: EngineConfig,
	state: BusState,
	last_status: Status,
}

impl<R: RegisterBus> I2cEngine<R> {
	/// Doesn't touch the hardware; call `setup` (or `configure`) first.
	pub fn new(regs: R, config: EngineConfig) -> Self {
		I2cEngine {
			regs,
			config,
			state: BusState::Stopped,
			last_status: Status(0),
		}
	}

	pub fn config(&self) -> &EngineConfig {
		&self.config
	}

	pub fn state(&self) -> BusState {
		self.state
	}

	/// last status word seen by the poll loop
	pub fn last_status(&self) -> Status {
		self.last_status
	}

	pub fn registers(&self) -> &R {
		&self.regs
	}

	pub fn registers_mut(&mut self) -> &mut R {
		&mut self.regs
	}

	pub fn into_registers(self) -> R {
		self.regs
	}

	fn offset(&self, register: Register) -> usize {
		self.config.layout.offset(register)
	}

	fn put(&mut self, register: Register, data: u8) {
		let offset = self.offset(register);
		self.regs.write_register(offset, data);
	}

	fn get(&mut self, register: Register) -> u8 {
		let offset = self.offset(register);
		self.regs.read_register(offset)
	}

	fn command(&mut self, cmd: Command) {
		trace!("I2C command {:?}", cmd);
		self.put(Register::CommandStatus, cmd.0);
	}

	fn stop(&mut self) {
		self.command(Command::stop());
		self.state = BusState::Stopped;
	}

	/// `configure` with the prescale from the engine configuration
	pub fn setup(&mut self) {
		let prescale = self.config.prescale;
		self.configure(prescale);
	}

	pub fn configure(&mut self, prescale: u16) {
		info!("Setting up I2C core (prescale 0x{:04x})", prescale);

		self.put(Register::Control, Control::disabled().0);

		self.put(Register::PrescaleLow, prescale as u8);
		self.put(Register::PrescaleHigh, (prescale >> 8) as u8);

		if log_enabled!(log::Level::Debug) {
			let lo = self.get(Register::PrescaleLow);
			let hi = self.get(Register::PrescaleHigh);
			debug!("I2C prescale read back: low 0x{:02x}, high 0x{:02x}", lo, hi);
		}

		self.put(Register::Control, Control::enabled().0);

		let settle = self.config.settle_cycles;
		self.regs.spin(settle);
		self.state = BusState::Stopped;
	}

	// poll until "in progress" clears; the NACK/arbitration bits are only
	// valid afterwards
	fn poll_status(&mut self, delay: u32, transferred: usize) -> Result<Status, TransferError> {
		let mut polls = 0u32;
		loop {
			self.regs.spin(delay);
			let status = Status(self.get(Register::CommandStatus));
			self.last_status = status;
			if !status.is_in_progress() {
				if status.is_arbitration_lost() {
					// single-master bus assumed; only reported
					warn!("I2C arbitration lost (status {:?})", status);
				}
				debug!("I2C status {:?} after {} polls", status, polls + 1);
				return Ok(status);
			}
			polls += 1;
			if let PollLimit::Bounded(limit) = self.config.poll_limit {
				if polls >= limit {
					return Err(TransferError::Timeout { transferred });
				}
			}
		}
	}

	/// Waits for the current phase to finish; returns whether the slave
	/// acknowledged.
	pub fn poll_ack(&mut self, delay: u32) -> Result<bool, TransferError> {
		let status = self.poll_status(delay, 0)?;
		Ok(!status.is_ack_failed())
	}

	// wait for the current phase; on NACK or timeout send STOP
	fn expect_ack(&mut self, transferred: usize) -> Result<(), TransferError> {
		let delay = self.config.poll_delay;
		match self.poll_status(delay, transferred) {
			Ok(status) if !status.is_ack_failed() => Ok(()),
			Ok(_) => {
				self.stop();
				Err(TransferError::Nack { written: transferred })
			},
			Err(e) => {
				self.stop();
				Err(e)
			},
		}
	}

	fn begin(&mut self, address: DeviceAddress, direction: Direction) -> Result<(), TransferError> {
		if let BusState::Held(held) = self.state {
			debug!("I2C repeated START to {} (bus held for {})", address, held);
		}
		self.put(Register::Data, address.address_byte(direction));
		self.command(Command::start_write());

		if let Err(e) = self.expect_ack(0) {
			warn!("I2C {:?} {}: no ACK for device address, sent STOP", direction, address);
			return Err(e);
		}
		Ok(())
	}

	/// Writes `payload` to `address`; returns the number of data bytes the
	/// slave acknowledged. Without `send_stop` the bus stays held so a read
	/// can follow with a repeated START.
	pub fn write(&mut self, address: DeviceAddress, payload: &[u8], send_stop: bool) -> Result<usize, TransferError> {
		if payload.len() > MAX_TRANSFER {
			return Err(TransferError::PayloadTooLong { len: payload.len(), max: MAX_TRANSFER });
		}
		debug!("I2C write {}: {:02x?} (stop: {})", address, payload, send_stop);

		self.begin(address, Direction::Write)?;

		for (written, &byte) in payload.iter().enumerate() {
			self.put(Register::Data, byte);
			self.command(Command::write());
			if let Err(e) = self.expect_ack(written) {
				warn!("I2C write {}: aborted after {} bytes: {}", address, written, e);
				return Err(e);
			}
		}

		if send_stop {
			self.stop();
		} else {
			debug!("I2C write {}: no STOP, bus held", address);
			self.state = BusState::Held(address);
		}
		Ok(payload.len())
	}

	/// Fills `buf` from `address`. The final byte is fetched with ACK and
	/// STOP, telling the slave it was the last one.
	pub fn read(&mut self, address: DeviceAddress, buf: &mut [u8]) -> Result<usize, TransferError> {
		if buf.len() > MAX_TRANSFER {
			return Err(TransferError::PayloadTooLong { len: buf.len(), max: MAX_TRANSFER });
		}

		self.begin(address, Direction::Read)?;

		if buf.is_empty() {
			self.stop();
			return Ok(0);
		}

		let delay = self.config.poll_delay;
		let last = buf.len() - 1;
		for i in 0..buf.len() {
			self.command(Command::read(i == last));
			// the master acknowledges here, the NACK bit carries nothing
			if let Err(e) = self.poll_status(delay, i) {
				self.stop();
				warn!("I2C read {}: aborted after {} bytes: {}", address, i, e);
				return Err(e);
			}
			buf[i] = self.get(Register::Data);
		}
		self.state = BusState::Stopped;

		debug!("I2C read {}: {:02x?}", address, buf);
		Ok(buf.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sim::{
		SimController,
		SimEeprom,
	};
	use crate::prom::AddressWidth;

	const PROM: DeviceAddress = DeviceAddress::masked(0x50);

	fn engine(sim: SimController) -> I2cEngine<SimController> {
		let mut e = I2cEngine::new(sim, EngineConfig::default());
		e.setup();
		e
	}

	fn with_prom() -> SimController {
		let mut sim = SimController::new(RegisterLayout::WordStride);
		sim.attach(PROM, SimEeprom::new(AddressWidth::One));
		sim
	}

	#[test]
	fn address_bytes() {
		let a = DeviceAddress::new(0x50).unwrap();
		assert_eq!(a.address_byte(Direction::Write), 0xa0);
		assert_eq!(a.address_byte(Direction::Read), 0xa1);
		assert!(DeviceAddress::new(0x80).is_err());
		assert_eq!(DeviceAddress::masked(0xe0).value(), 0x60);
	}

	#[test]
	fn configure_programs_prescale() {
		let mut e = engine(with_prom());
		e.configure(0x1234);
		let sim = e.registers();
		assert_eq!(sim.prescale(), 0x1234);
		assert!(sim.is_core_enabled());
	}

	#[test]
	fn configure_uses_legacy_layout() {
		let sim = SimController::new(RegisterLayout::ByteStride);
		let config = EngineConfig { layout: RegisterLayout::ByteStride, ..EngineConfig::default() };
		let mut e = I2cEngine::new(sim, config);
		e.setup();
		assert_eq!(e.registers().prescale(), DEFAULT_PRESCALE);
	}

	#[test]
	fn write_counts_data_bytes_only() {
		let mut e = engine(with_prom());
		assert_eq!(e.write(PROM, &[0x00, 1, 2, 3], true), Ok(4));
		assert_eq!(e.state(), BusState::Stopped);
		assert_eq!(e.registers().stop_count(), 1);
	}

	#[test]
	fn write_nack_at_every_position() {
		for len in 0..=MAX_TRANSFER {
			let payload: Vec<u8> = (0..len as u8).collect();
			// fail_at == len: nothing injected
			for fail_at in 0..=len {
				let mut sim = with_prom();
				if fail_at < len {
					sim.nack_data_byte(PROM, fail_at);
				}
				let mut e = engine(sim);
				let result = e.write(PROM, &payload, true);
				if fail_at < len {
					let err = result.unwrap_err();
					assert_eq!(err, TransferError::Nack { written: fail_at }, "len {} NACK at {}", len, fail_at);
					assert!(err.is_nack());
					assert_eq!(err.transferred(), fail_at);
				} else {
					assert_eq!(result, Ok(len), "len {}", len);
				}
				assert_eq!(e.state(), BusState::Stopped, "len {} fail_at {}", len, fail_at);
				assert_eq!(e.registers().stop_count(), 1, "len {} fail_at {}", len, fail_at);
				assert!(e.registers().commands().last().unwrap().is_stop());
			}
		}
	}

	#[test]
	fn write_without_stop_holds_bus() {
		let mut e = engine(with_prom());
		assert_eq!(e.write(PROM, &[0x00], false), Ok(1));
		assert_eq!(e.state(), BusState::Held(PROM));
		assert_eq!(e.registers().stop_count(), 0);
	}

	#[test]
	fn write_too_long() {
		let mut e = engine(with_prom());
		let payload = [0u8; MAX_TRANSFER + 1];
		assert_eq!(
			e.write(PROM, &payload, true),
			Err(TransferError::PayloadTooLong { len: MAX_TRANSFER + 1, max: MAX_TRANSFER }),
		);
		assert!(e.registers().commands().is_empty());
	}

	#[test]
	fn absent_device_nacks_address() {
		let mut e = engine(with_prom());
		let other = DeviceAddress::new(0x53).unwrap();
		let mut buf = [0u8; 2];
		assert_eq!(e.read(other, &mut buf), Err(TransferError::Nack { written: 0 }));
		assert_eq!(e.registers().stop_count(), 1);
	}

	#[test]
	fn read_marks_last_byte() {
		let mut sim = with_prom();
		sim.device_mut(PROM).unwrap().load(0, &[9, 8, 7]);
		let mut e = engine(sim);
		e.write(PROM, &[0x00], false).unwrap();
		let mut buf = [0u8; 3];
		assert_eq!(e.read(PROM, &mut buf), Ok(3));
		assert_eq!(buf, [9, 8, 7]);

		let reads: Vec<Command> = e.registers().commands().iter().cloned().filter(|c| c.is_read()).collect();
		assert_eq!(reads.len(), 3);
		assert!(!reads[0].is_ack() && !reads[0].is_stop());
		assert!(!reads[1].is_ack() && !reads[1].is_stop());
		assert!(reads[2].is_ack() && reads[2].is_stop());
		assert_eq!(e.state(), BusState::Stopped);
	}

	#[test]
	fn empty_read_still_stops() {
		let mut e = engine(with_prom());
		assert_eq!(e.read(PROM, &mut []), Ok(0));
		assert_eq!(e.registers().stop_count(), 1);
	}

	#[test]
	fn poll_waits_for_in_progress() {
		let mut sim = with_prom();
		sim.set_busy_polls(5);
		let mut e = engine(sim);
		assert_eq!(e.write(PROM, &[0x00, 0xaa], true), Ok(2));
		assert!(!e.last_status().is_in_progress());
	}

	#[test]
	fn stuck_bus_times_out() {
		let mut sim = with_prom();
		sim.set_stuck(true);
		let config = EngineConfig { poll_limit: PollLimit::Bounded(10), ..EngineConfig::default() };
		let mut e = I2cEngine::new(sim, config);
		e.setup();
		assert_eq!(e.write(PROM, &[0x00], true), Err(TransferError::Timeout { transferred: 0 }));
		assert_eq!(e.registers().stop_count(), 1);
		assert_eq!(e.state(), BusState::Stopped);
	}

	#[test]
	fn read_stalled_mid_transfer_stops() {
		let mut sim = with_prom();
		sim.device_mut(PROM).unwrap().load(0, &[1, 2, 3, 4]);
		let config = EngineConfig { poll_limit: PollLimit::Bounded(10), ..EngineConfig::default() };
		let mut e = I2cEngine::new(sim, config);
		e.setup();
		e.registers_mut().clear_commands();
		// START plus the first two data bytes complete, byte 2 never does
		e.registers_mut().set_stuck_after(3);

		let mut buf = [0u8; 4];
		let err = e.read(PROM, &mut buf).unwrap_err();
		assert_eq!(err, TransferError::Timeout { transferred: 2 });
		assert_eq!(err.transferred(), 2);
		assert!(!err.is_nack());
		assert_eq!(&buf[..2], &[1, 2]);

		let sim = e.registers();
		assert_eq!(sim.stop_count(), 1);
		assert!(sim.commands()[0].is_start());
		assert_eq!(sim.commands().iter().filter(|c| c.is_read()).count(), 3);
		assert!(sim.commands().last().unwrap().is_stop());
		assert!(sim.spins() > 0);
		assert_eq!(e.state(), BusState::Stopped);
	}

	#[test]
	fn arbitration_lost_is_only_observed() {
		let mut sim = with_prom();
		sim.set_arbitration_lost(true);
		let mut e = engine(sim);
		assert_eq!(e.write(PROM, &[0x00, 0x01], true), Ok(2));
		assert!(e.last_status().is_arbitration_lost());
	}

	#[test]
	fn poll_ack_reports_nack() {
		let mut e = engine(with_prom());
		let absent = DeviceAddress::new(0x10).unwrap();
		e.registers_mut().write_register(0xc, absent.address_byte(Direction::Write));
		e.registers_mut().write_register(0x10, Command::start_write().0);
		assert_eq!(e.poll_ack(1), Ok(false));
	}
}
