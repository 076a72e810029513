use crate::i2c::{
	Command,
	Control,
	DeviceAddress,
	Status,
};
use crate::regs::{
	Register,
	RegisterBus,
	RegisterLayout,
};

use super::{
	SimEeprom,
	SimMux,
};

#[derive(Clone, Debug)]
enum Device {
	Eeprom(SimEeprom),
	Mux(SimMux),
}

impl Device {
	fn start(&mut self, read: bool) {
		match self {
			Device::Eeprom(e) => e.start(read),
			Device::Mux(_) => (),
		}
	}

	fn write(&mut self, byte: u8) -> bool {
		match self {
			Device::Eeprom(e) => e.write(byte),
			Device::Mux(m) => m.write(byte),
		}
	}

	fn read(&mut self) -> u8 {
		match self {
			Device::Eeprom(e) => e.read(),
			Device::Mux(m) => m.read(),
		}
	}
}

#[derive(Clone, Copy, Debug)]
struct Active {
	device: usize,
	read: bool,
	data_bytes: usize,
}

/// OpenCores I2C master register model with devices on its bus.
///
/// Every phase finishes after a configurable number of "in progress"
/// polls; ACKs come from the attached devices. NACKs, arbitration loss and
/// a bus that stops completing phases can be injected.
#[derive(Clone, Debug)]
pub struct SimController {
	layout: RegisterLayout,
	prescale_low: u8,
	prescale_high: u8,
	control: u8,
	transmit: u8,
	receive: u8,

	devices: Vec<(DeviceAddress, Device)>,
	active: Option<Active>,

	nack: bool,
	busy_polls: u32,
	remaining_polls: u32,

	// fault injection
	nack_data: Vec<(DeviceAddress, usize)>,
	stuck: bool,
	stuck_after: Option<usize>,
	phases: usize,
	arbitration_lost: bool,

	commands: Vec<Command>,
	spins: u64,
}

impl SimController {
	pub fn new(layout: RegisterLayout) -> Self {
		SimController {
			layout,
			prescale_low: 0xff,
			prescale_high: 0xff,
			control: 0,
			transmit: 0,
			receive: 0,
			devices: Vec::new(),
			active: None,
			nack: false,
			busy_polls: 1,
			remaining_polls: 0,
			nack_data: Vec::new(),
			stuck: false,
			stuck_after: None,
			phases: 0,
			arbitration_lost: false,
			commands: Vec::new(),
			spins: 0,
		}
	}

	pub fn attach(&mut self, address: DeviceAddress, eeprom: SimEeprom) -> &mut Self {
		self.devices.push((address, Device::Eeprom(eeprom)));
		self
	}

	pub fn attach_mux(&mut self, address: DeviceAddress) -> &mut Self {
		self.devices.push((address, Device::Mux(SimMux::new())));
		self
	}

	pub fn device_mut(&mut self, address: DeviceAddress) -> Option<&mut SimEeprom> {
		self.devices.iter_mut().find_map(|(a, d)| match d {
			Device::Eeprom(e) if *a == address => Some(e),
			_ => None,
		})
	}

	pub fn device(&self, address: DeviceAddress) -> Option<&SimEeprom> {
		self.devices.iter().find_map(|(a, d)| match d {
			Device::Eeprom(e) if *a == address => Some(e),
			_ => None,
		})
	}

	pub fn mux(&self, address: DeviceAddress) -> Option<&SimMux> {
		self.devices.iter().find_map(|(a, d)| match d {
			Device::Mux(m) if *a == address => Some(m),
			_ => None,
		})
	}

	/// "in progress" polls before each phase completes
	pub fn set_busy_polls(&mut self, polls: u32) {
		self.busy_polls = polls;
	}

	/// NACK the data byte with index `index` (0: first byte after the
	/// address) written to `address`
	pub fn nack_data_byte(&mut self, address: DeviceAddress, index: usize) {
		self.nack_data.push((address, index));
	}

	/// keep "in progress" set forever
	pub fn set_stuck(&mut self, stuck: bool) {
		self.stuck = stuck;
	}

	/// Let the next `phases` commands complete; every later one stays in
	/// progress forever.
	pub fn set_stuck_after(&mut self, phases: usize) {
		self.stuck_after = Some(self.phases + phases);
	}

	pub fn set_arbitration_lost(&mut self, lost: bool) {
		self.arbitration_lost = lost;
	}

	pub fn prescale(&self) -> u16 {
		(self.prescale_high as u16) << 8 | self.prescale_low as u16
	}

	pub fn is_core_enabled(&self) -> bool {
		Control(self.control).is_core_enabled()
	}

	/// every command written to the command register, in order
	pub fn commands(&self) -> &[Command] {
		&self.commands
	}

	pub fn stop_count(&self) -> usize {
		self.commands.iter().filter(|c| c.is_stop()).count()
	}

	pub fn clear_commands(&mut self) {
		self.commands.clear();
	}

	pub fn spins(&self) -> u64 {
		self.spins
	}

	fn register_at(&self, offset: usize) -> Option<Register> {
		[
			Register::PrescaleLow,
			Register::PrescaleHigh,
			Register::Control,
			Register::Data,
			Register::CommandStatus,
		].iter().cloned().find(|r| self.layout.offset(*r) == offset)
	}

	fn status(&mut self) -> Status {
		let stalled = self.stuck || self.stuck_after.map_or(false, |n| self.phases > n);
		let in_progress = if stalled {
			true
		} else if self.remaining_polls > 0 {
			self.remaining_polls -= 1;
			true
		} else {
			false
		};
		Status::build(self.nack, self.active.is_some(), self.arbitration_lost, in_progress)
	}

	fn execute(&mut self, cmd: Command) {
		self.commands.push(cmd);
		self.phases += 1;
		self.remaining_polls = self.busy_polls;

		if !self.is_core_enabled() {
			warn!("sim: command {:?} while core disabled", cmd);
			self.nack = true;
			return;
		}

		if cmd.is_start() {
			// (repeated) START: transmit register holds the address byte
			let address = DeviceAddress::masked(self.transmit >> 1);
			let read = 0 != self.transmit & 0x01;
			self.active = None;
			match self.devices.iter().position(|(a, _)| *a == address) {
				Some(device) => {
					self.devices[device].1.start(read);
					self.active = Some(Active { device, read, data_bytes: 0 });
					self.nack = false;
				},
				None => {
					trace!("sim: no device at {}", address);
					self.nack = true;
				},
			}
		} else if cmd.is_write() {
			self.nack = true;
			if let Some(active) = self.active.as_mut() {
				if !active.read {
					let index = active.data_bytes;
					active.data_bytes += 1;
					let address = self.devices[active.device].0;
					self.nack = self.nack_data.contains(&(address, index))
						|| !self.devices[active.device].1.write(self.transmit);
				}
			}
		}

		if cmd.is_read() {
			self.receive = match self.active {
				Some(active) if active.read => self.devices[active.device].1.read(),
				_ => 0xff,
			};
			self.nack = false;
		}

		if cmd.is_stop() {
			self.active = None;
		}
	}
}

impl RegisterBus for SimController {
	fn read_register(&mut self, offset: usize) -> u8 {
		match self.register_at(offset) {
			Some(Register::PrescaleLow) => self.prescale_low,
			Some(Register::PrescaleHigh) => self.prescale_high,
			Some(Register::Control) => self.control,
			Some(Register::Data) => self.receive,
			Some(Register::CommandStatus) => self.status().0,
			None => {
				warn!("sim: read from unmapped register +0x{:02x}", offset);
				0xff
			},
		}
	}

	fn write_register(&mut self, offset: usize, data: u8) {
		match self.register_at(offset) {
			Some(Register::PrescaleLow) => self.prescale_low = data,
			Some(Register::PrescaleHigh) => self.prescale_high = data,
			Some(Register::Control) => self.control = data,
			Some(Register::Data) => self.transmit = data,
			Some(Register::CommandStatus) => self.execute(Command(data)),
			None => warn!("sim: write 0x{:02x} to unmapped register +0x{:02x}", data, offset),
		}
	}

	fn spin(&mut self, cycles: u32) {
		self.spins += cycles as u64;
	}
}
