use std::fmt;

use crate::codec::{
	format_ipv4,
	format_mac,
};
use crate::i2c::TransferError;
use crate::prom::Prom;
use crate::regs::RegisterBus;

const UID_BYTES: u8 = 6;

/// No usable static address: all zeroes, all ones, or forced.
pub fn compute_rarp_flag(ip: u32, force: bool) -> bool {
	force || ip == 0 || ip == 0xffff_ffff
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NetworkIdentity {
	/// lower 48 bits
	pub uid: u64,
	pub ip: u32,
	pub gpo: Option<u16>,
	pub use_rarp: bool,
}

impl fmt::Display for NetworkIdentity {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "MAC {}, IP {}", format_mac(self.uid), format_ipv4(self.ip))?;
		if let Some(gpo) = self.gpo {
			write!(f, ", GPO 0x{:04x}", gpo)?;
		}
		if self.use_rarp {
			write!(f, " [RARP]")?;
		}
		Ok(())
	}
}

pub struct Identity<'a, R: RegisterBus + 'a> {
	prom: &'a mut Prom<R>,
}

impl<'a, R: RegisterBus> Identity<'a, R> {
	pub fn new(prom: &'a mut Prom<R>) -> Self {
		Identity { prom }
	}

	/// Reads the unique ID byte by byte: a sequential read of all six
	/// bytes returns garbage on some parts (AT24C256 clones).
	pub fn read_unique_id(&mut self) -> Result<u64, TransferError> {
		let start = self.prom.config().uid_offset;
		debug!("UID location in PROM: 0x{:02x}, {} address bytes",
			start, self.prom.config().address_width.bytes());

		let mut uid = 0u64;
		for i in 0..UID_BYTES {
			let b = self.prom.read_byte(start.wrapping_add(i))?;
			uid = (uid << 8) | b as u64;
		}
		Ok(uid)
	}

	pub fn read_ip_address(&mut self) -> Result<u32, TransferError> {
		let offset = self.prom.config().memory_offset;
		let mut buf = [0u8; 4];
		self.prom.read(offset, &mut buf)?;
		Ok(u32::from_be_bytes(buf))
	}

	pub fn write_ip_address(&mut self, ip: u32) -> Result<usize, TransferError> {
		let offset = self.prom.config().memory_offset;
		info!("Writing IP address {} to PROM", format_ipv4(ip));
		self.prom.write(offset, &ip.to_be_bytes())
	}

	pub fn read_gpo(&mut self) -> Result<u16, TransferError> {
		let offset = self.prom.config().gpo_offset;
		let mut buf = [0u8; 2];
		self.prom.read(offset, &mut buf)?;
		Ok(u16::from_be_bytes(buf))
	}

	pub fn write_gpo(&mut self, gpo: u16) -> Result<usize, TransferError> {
		let offset = self.prom.config().gpo_offset;
		info!("Writing GPO value 0x{:04x} to PROM", gpo);
		self.prom.write(offset, &gpo.to_be_bytes())
	}

	/// Reads everything; a failure on any field aborts.
	pub fn resolve(&mut self, force_rarp: bool) -> Result<NetworkIdentity, TransferError> {
		let uid = self.read_unique_id()?;
		let ip = self.read_ip_address()?;
		let gpo = self.read_gpo()?;
		Ok(NetworkIdentity {
			uid,
			ip,
			gpo: Some(gpo),
			use_rarp: compute_rarp_flag(ip, force_rarp),
		})
	}
}

impl<R: RegisterBus> Prom<R> {
	pub fn identity(&mut self) -> Identity<R> {
		Identity::new(self)
	}
}
