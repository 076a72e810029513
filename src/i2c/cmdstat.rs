use std::fmt;

// control register
const CONTROL_ENABLE_CORE:  u8 = 0x80;
const CONTROL_ENABLE_IRQ:   u8 = 0x40;

// command register (write side)
const COMMAND_START:        u8 = 0x80;
const COMMAND_STOP:         u8 = 0x40;
const COMMAND_READ:         u8 = 0x20;
const COMMAND_WRITE:        u8 = 0x10;
const COMMAND_ACK:          u8 = 0x08; // "last byte" when reading
const COMMAND_IRQ_ACK:      u8 = 0x01;

// status register (read side)
const STATUS_RECEIVED_NACK: u8 = 0x80; // 0: slave acknowledged
const STATUS_BUSY:          u8 = 0x40;
const STATUS_ARB_LOST:      u8 = 0x20;
const STATUS_IN_PROGRESS:   u8 = 0x02;
const STATUS_INTERRUPT:     u8 = 0x01;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Control(pub u8);

impl Control {
	pub fn disabled() -> Self {
		Control(0)
	}

	pub fn enabled() -> Self {
		Control(CONTROL_ENABLE_CORE)
	}

	pub fn is_core_enabled(&self) -> bool {
		0 != self.0 & CONTROL_ENABLE_CORE
	}
	pub fn is_irq_enabled(&self) -> bool {
		0 != self.0 & CONTROL_ENABLE_IRQ
	}
}

impl fmt::Debug for Control {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x} (", self.0)?;
		if self.is_core_enabled() { write!(f, " [EN]")?; }
		if self.is_irq_enabled() { write!(f, " [IEN]")?; }
		write!(f, ")")
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Command(pub u8);

impl Command {
	/// START condition, then send the byte in the data register (the
	/// address byte)
	pub fn start_write() -> Self {
		*Command(0)
			.set_start()
			.set_write()
	}

	pub fn write() -> Self {
		*Command(0).set_write()
	}

	/// receive a byte; the last byte of a read also carries ACK and STOP
	pub fn read(last: bool) -> Self {
		let mut cmd = Command(0);
		cmd.set_read();
		if last {
			cmd.set_ack().set_stop();
		}
		cmd
	}

	pub fn stop() -> Self {
		*Command(0).set_stop()
	}

	pub fn is_start(&self) -> bool {
		0 != self.0 & COMMAND_START
	}
	pub fn set_start(&mut self) -> &mut Self {
		self.0 |= COMMAND_START;
		self
	}

	pub fn is_stop(&self) -> bool {
		0 != self.0 & COMMAND_STOP
	}
	pub fn set_stop(&mut self) -> &mut Self {
		self.0 |= COMMAND_STOP;
		self
	}

	pub fn is_read(&self) -> bool {
		0 != self.0 & COMMAND_READ
	}
	pub fn set_read(&mut self) -> &mut Self {
		self.0 |= COMMAND_READ;
		self
	}

	pub fn is_write(&self) -> bool {
		0 != self.0 & COMMAND_WRITE
	}
	pub fn set_write(&mut self) -> &mut Self {
		self.0 |= COMMAND_WRITE;
		self
	}

	pub fn is_ack(&self) -> bool {
		0 != self.0 & COMMAND_ACK
	}
	pub fn set_ack(&mut self) -> &mut Self {
		self.0 |= COMMAND_ACK;
		self
	}

	pub fn is_irq_ack(&self) -> bool {
		0 != self.0 & COMMAND_IRQ_ACK
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl fmt::Debug for Command {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x} (", self.0)?;
		if self.is_start() { write!(f, " [STA]")?; }
		if self.is_stop() { write!(f, " [STO]")?; }
		if self.is_read() { write!(f, " [RD]")?; }
		if self.is_write() { write!(f, " [WR]")?; }
		if self.is_ack() { write!(f, " [ACK]")?; }
		if self.is_irq_ack() { write!(f, " [IACK]")?; }
		write!(f, ")")
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Status(pub u8);

impl Status {
	/// only meaningful once `is_in_progress` is false
	pub fn is_ack_failed(&self) -> bool {
		0 != self.0 & STATUS_RECEIVED_NACK
	}
	pub fn is_busy(&self) -> bool {
		0 != self.0 & STATUS_BUSY
	}
	pub fn is_arbitration_lost(&self) -> bool {
		0 != self.0 & STATUS_ARB_LOST
	}
	pub fn is_in_progress(&self) -> bool {
		0 != self.0 & STATUS_IN_PROGRESS
	}
	pub fn is_interrupt(&self) -> bool {
		0 != self.0 & STATUS_INTERRUPT
	}

	pub(crate) fn build(nack: bool, busy: bool, arb_lost: bool, in_progress: bool) -> Self {
		let mut s = 0u8;
		if nack { s |= STATUS_RECEIVED_NACK; }
		if busy { s |= STATUS_BUSY; }
		if arb_lost { s |= STATUS_ARB_LOST; }
		if in_progress { s |= STATUS_IN_PROGRESS; }
		Status(s)
	}
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl fmt::Debug for Status {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x} (", self.0)?;
		if self.is_ack_failed() { write!(f, " [NACK]")?; } else { write!(f, " [ACK]")?; }
		if self.is_busy() { write!(f, " [BUSY]")?; }
		if self.is_arbitration_lost() { write!(f, " [AL]")?; }
		if self.is_in_progress() { write!(f, " [TIP]")?; }
		if self.is_interrupt() { write!(f, " [IF]")?; }
		write!(f, ")")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn command_bit_positions() {
		assert_eq!(Command::start_write().0, 0x90);
		assert_eq!(Command::write().0, 0x10);
		assert_eq!(Command::read(false).0, 0x20);
		assert_eq!(Command::read(true).0, 0x68);
		assert_eq!(Command::stop().0, 0x40);
		assert_eq!(Control::enabled().0, 0x80);
	}

	#[test]
	fn status_accessors() {
		let s = Status(0x80 | 0x02);
		assert!(s.is_ack_failed());
		assert!(s.is_in_progress());
		assert!(!s.is_busy());
		assert!(!s.is_arbitration_lost());

		let s = Status(0x61);
		assert!(!s.is_ack_failed());
		assert!(s.is_busy());
		assert!(s.is_arbitration_lost());
		assert!(s.is_interrupt());

		assert_eq!(Status::build(true, false, true, true).0, 0xa2);
	}

	#[test]
	fn debug_decodes_flags() {
		assert_eq!(format!("{:?}", Command::read(true)), "0x68 ( [STO] [RD] [ACK])");
		assert_eq!(format!("{:?}", Status(0x82)), "0x82 ( [NACK] [TIP])");
	}
}
