use crate::bootstrap::NetworkCore;
use crate::regs::RegisterBus;

/// Plain byte registers without side effects.
#[derive(Clone, Debug)]
pub struct SimRegisters {
	regs: Vec<u8>,
}

impl SimRegisters {
	pub fn new(len: usize) -> Self {
		SimRegisters { regs: vec![0; len] }
	}

	pub fn get(&self, offset: usize) -> u8 {
		self.regs[offset]
	}
}

impl RegisterBus for SimRegisters {
	fn read_register(&mut self, offset: usize) -> u8 {
		self.regs[offset]
	}

	fn write_register(&mut self, offset: usize, data: u8) {
		self.regs[offset] = data;
	}

	fn spin(&mut self, _cycles: u32) {
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NetworkEvent {
	Reset(bool),
	Mac(u64),
	Ip(u32),
	Rarp(bool),
}

/// Network core that only remembers what it was told, in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingNetworkCore {
	events: Vec<NetworkEvent>,
}

impl RecordingNetworkCore {
	pub fn new() -> Self {
		RecordingNetworkCore::default()
	}

	pub fn events(&self) -> &[NetworkEvent] {
		&self.events
	}

	pub fn in_reset(&self) -> bool {
		self.events.iter().rev().find_map(|e| match *e {
			NetworkEvent::Reset(r) => Some(r),
			_ => None,
		}).unwrap_or(false)
	}

	pub fn mac(&self) -> Option<u64> {
		self.events.iter().rev().find_map(|e| match *e {
			NetworkEvent::Mac(m) => Some(m),
			_ => None,
		})
	}

	pub fn ip(&self) -> Option<u32> {
		self.events.iter().rev().find_map(|e| match *e {
			NetworkEvent::Ip(ip) => Some(ip),
			_ => None,
		})
	}

	pub fn rarp(&self) -> Option<bool> {
		self.events.iter().rev().find_map(|e| match *e {
			NetworkEvent::Rarp(r) => Some(r),
			_ => None,
		})
	}
}

impl NetworkCore for RecordingNetworkCore {
	fn set_reset(&mut self, asserted: bool) {
		self.events.push(NetworkEvent::Reset(asserted));
	}

	fn set_mac_address(&mut self, uid: u64) {
		self.events.push(NetworkEvent::Mac(uid));
	}

	fn set_ip_address(&mut self, ip: u32) {
		self.events.push(NetworkEvent::Ip(ip));
	}

	fn set_rarp(&mut self, enabled: bool) {
		self.events.push(NetworkEvent::Rarp(enabled));
	}
}
