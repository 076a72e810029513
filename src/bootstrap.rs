use std::ops::{
	Deref,
	DerefMut,
};

use crate::codec::{
	format_ipv4,
	format_mac,
};
use crate::identity::{
	NetworkIdentity,
	compute_rarp_flag,
};
use crate::prom::Prom;
use crate::regs::RegisterBus;

/// used when the EEPROM doesn't deliver a UID
pub const FALLBACK_UID: u64 = 0x020d_dba1_1644;

/// Identity registers of the downstream network core.
pub trait NetworkCore {
	fn set_reset(&mut self, asserted: bool);
	fn set_mac_address(&mut self, uid: u64);
	fn set_ip_address(&mut self, ip: u32);
	fn set_rarp(&mut self, enabled: bool);
}

impl<'a, N: ?Sized + NetworkCore> NetworkCore for &'a mut N {
	fn set_reset(&mut self, asserted: bool) {
		N::set_reset(*self, asserted);
	}
	fn set_mac_address(&mut self, uid: u64) {
		N::set_mac_address(*self, uid);
	}
	fn set_ip_address(&mut self, ip: u32) {
		N::set_ip_address(*self, ip);
	}
	fn set_rarp(&mut self, enabled: bool) {
		N::set_rarp(*self, enabled);
	}
}

/// Byte register offsets of the network core's control lines; multi-byte
/// values occupy consecutive registers (4-byte stride), most significant
/// byte first.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NetworkCoreLayout {
	pub reset: usize,
	pub mac: usize,
	pub ip: usize,
	pub rarp: usize,
}

impl Default for NetworkCoreLayout {
	fn default() -> Self {
		NetworkCoreLayout {
			reset: 0x00,
			mac: 0x04,  // 6 registers
			ip: 0x1c,   // 4 registers
			rarp: 0x2c,
		}
	}
}

impl NetworkCoreLayout {
	/// window length needed to map all registers
	pub fn len(&self) -> usize {
		*[self.reset + 4, self.mac + 6 * 4, self.ip + 4 * 4, self.rarp + 4].iter().max().unwrap_or(&0)
	}
}

pub struct RegisterNetworkCore<R: RegisterBus> {
	regs: R,
	layout: NetworkCoreLayout,
}

impl<R: RegisterBus> RegisterNetworkCore<R> {
	pub fn new(regs: R, layout: NetworkCoreLayout) -> Self {
		RegisterNetworkCore { regs, layout }
	}

	pub fn into_registers(self) -> R {
		self.regs
	}

	fn write_be(&mut self, base: usize, bytes: &[u8]) {
		for (i, b) in bytes.iter().enumerate() {
			self.regs.write_register(base + 4 * i, *b);
		}
	}
}

impl<R: RegisterBus> NetworkCore for RegisterNetworkCore<R> {
	fn set_reset(&mut self, asserted: bool) {
		let reset = self.layout.reset;
		self.regs.write_register(reset, asserted as u8);
	}

	fn set_mac_address(&mut self, uid: u64) {
		let mac = self.layout.mac;
		self.write_be(mac, &uid.to_be_bytes()[2..]);
	}

	fn set_ip_address(&mut self, ip: u32) {
		let base = self.layout.ip;
		self.write_be(base, &ip.to_be_bytes());
	}

	fn set_rarp(&mut self, enabled: bool) {
		let rarp = self.layout.rarp;
		self.regs.write_register(rarp, enabled as u8);
	}
}

/// What a UID of zero means.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ZeroUidPolicy {
	/// zero means the EEPROM couldn't be read (can't tell from a stored
	/// zero); use the fallback UID
	TreatAsUnreadable,
	Accept,
}

impl ZeroUidPolicy {
	pub fn apply(self, uid: u64, fallback: u64) -> u64 {
		match self {
			ZeroUidPolicy::TreatAsUnreadable if uid == 0 => {
				warn!("No UID from PROM, using fallback {}", format_mac(fallback));
				fallback
			},
			_ => uid,
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BootstrapConfig {
	/// don't read the IP address, always request RARP
	pub force_rarp: bool,
	pub fallback_uid: u64,
	pub zero_uid: ZeroUidPolicy,
}

impl Default for BootstrapConfig {
	fn default() -> Self {
		BootstrapConfig {
			force_rarp: false,
			fallback_uid: FALLBACK_UID,
			zero_uid: ZeroUidPolicy::TreatAsUnreadable,
		}
	}
}

/// Keeps the network core in reset while alive.
struct ResetGuard<'a, N: NetworkCore + ?Sized + 'a>(&'a mut N);

impl<'a, N: NetworkCore + ?Sized> ResetGuard<'a, N> {
	fn assert(core: &'a mut N) -> Self {
		debug!("network core: reset asserted");
		core.set_reset(true);
		ResetGuard(core)
	}
}

impl<'a, N: NetworkCore + ?Sized> Drop for ResetGuard<'a, N> {
	fn drop(&mut self) {
		self.0.set_reset(false);
		debug!("network core: reset released");
	}
}

impl<'a, N: NetworkCore + ?Sized> Deref for ResetGuard<'a, N> {
	type Target = N;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, N: NetworkCore + ?Sized> DerefMut for ResetGuard<'a, N> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

pub struct Bootstrap {
	config: BootstrapConfig,
}

impl Bootstrap {
	pub fn new(config: BootstrapConfig) -> Self {
		Bootstrap { config }
	}

	pub fn config(&self) -> &BootstrapConfig {
		&self.config
	}

	/// Programs the network core from the EEPROM. Bus errors are logged
	/// and end up as zero UID (-> fallback) or zero IP (-> RARP).
	pub fn run<R, N>(&self, prom: &mut Prom<R>, core: &mut N) -> NetworkIdentity
	where
		R: RegisterBus,
		N: NetworkCore + ?Sized,
	{
		let mut core = ResetGuard::assert(core);

		let uid = prom.identity().read_unique_id().unwrap_or_else(|e| {
			warn!("Reading UID from PROM failed: {}", e);
			0
		});
		let uid = self.config.zero_uid.apply(uid, self.config.fallback_uid);
		core.set_mac_address(uid);

		let ip = if self.config.force_rarp {
			0
		} else {
			let ip = prom.identity().read_ip_address().unwrap_or_else(|e| {
				warn!("Reading IP address from PROM failed: {}", e);
				0
			});
			core.set_ip_address(ip);
			ip
		};

		let use_rarp = compute_rarp_flag(ip, self.config.force_rarp);
		core.set_rarp(use_rarp);

		drop(core);

		info!("Network core set: MAC {}, IP {}{}",
			format_mac(uid), format_ipv4(ip), if use_rarp { " (using RARP)" } else { "" });

		NetworkIdentity {
			uid,
			ip,
			gpo: None,
			use_rarp,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::i2c::{
		DeviceAddress,
		EngineConfig,
		I2cEngine,
	};
	use crate::prom::{
		AddressWidth,
		DEFAULT_PROM_ADDRESS,
		PromConfig,
		UID_OFFSET,
	};
	use crate::regs::RegisterLayout;
	use crate::sim::{
		NetworkEvent,
		RecordingNetworkCore,
		SimController,
		SimEeprom,
		SimRegisters,
	};

	fn prom(uid: &[u8], ip: &[u8]) -> Prom<SimController> {
		let mut eeprom = SimEeprom::new(AddressWidth::One);
		eeprom.load(UID_OFFSET as usize, uid);
		eeprom.load(0, ip);
		let mut sim = SimController::new(RegisterLayout::WordStride);
		sim.attach(DEFAULT_PROM_ADDRESS, eeprom);
		let mut engine = I2cEngine::new(sim, EngineConfig::default());
		engine.setup();
		Prom::new(engine, PromConfig::default())
	}

	#[test]
	fn programs_identity_inside_reset() {
		let mut p = prom(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55], &[10, 0, 0, 1]);
		let mut core = RecordingNetworkCore::new();
		let id = Bootstrap::new(BootstrapConfig::default()).run(&mut p, &mut core);

		assert_eq!(id.uid, 0x0011_2233_4455);
		assert_eq!(id.ip, 0x0a00_0001);
		assert!(!id.use_rarp);
		assert_eq!(core.events(), &[
			NetworkEvent::Reset(true),
			NetworkEvent::Mac(0x0011_2233_4455),
			NetworkEvent::Ip(0x0a00_0001),
			NetworkEvent::Rarp(false),
			NetworkEvent::Reset(false),
		]);
	}

	#[test]
	fn zero_uid_is_treated_as_unreadable() {
		let mut p = prom(&[0; 6], &[10, 0, 0, 1]);
		let mut core = RecordingNetworkCore::new();
		let id = Bootstrap::new(BootstrapConfig::default()).run(&mut p, &mut core);
		assert_eq!(id.uid, FALLBACK_UID);
		assert_eq!(core.mac(), Some(FALLBACK_UID));
	}

	#[test]
	fn zero_uid_accepted_when_configured() {
		let mut p = prom(&[0; 6], &[10, 0, 0, 1]);
		let mut core = RecordingNetworkCore::new();
		let config = BootstrapConfig { zero_uid: ZeroUidPolicy::Accept, ..BootstrapConfig::default() };
		let id = Bootstrap::new(config).run(&mut p, &mut core);
		assert_eq!(id.uid, 0);
	}

	#[test]
	fn zero_policy() {
		assert_eq!(ZeroUidPolicy::TreatAsUnreadable.apply(0, 7), 7);
		assert_eq!(ZeroUidPolicy::TreatAsUnreadable.apply(3, 7), 3);
		assert_eq!(ZeroUidPolicy::Accept.apply(0, 7), 0);
	}

	#[test]
	fn missing_prom_degrades_to_fallback_and_rarp() {
		let p = prom(&[1, 2, 3, 4, 5, 6], &[10, 0, 0, 1]);
		let mut p = {
			let config = PromConfig { bus_address: DeviceAddress::masked(0x53), ..PromConfig::default() };
			Prom::new(p.into_engine(), config)
		};
		let mut core = RecordingNetworkCore::new();
		let id = Bootstrap::new(BootstrapConfig::default()).run(&mut p, &mut core);
		assert_eq!(id.uid, FALLBACK_UID);
		assert_eq!(id.ip, 0);
		assert!(id.use_rarp);
		assert_eq!(core.events().last(), Some(&NetworkEvent::Reset(false)));
	}

	#[test]
	fn force_rarp_skips_ip() {
		let mut p = prom(&[1, 2, 3, 4, 5, 6], &[10, 0, 0, 1]);
		let mut core = RecordingNetworkCore::new();
		let config = BootstrapConfig { force_rarp: true, ..BootstrapConfig::default() };
		let id = Bootstrap::new(config).run(&mut p, &mut core);
		assert!(id.use_rarp);
		assert_eq!(core.ip(), None);
		assert_eq!(core.rarp(), Some(true));
		// UID only: six single byte reads
		assert_eq!(p.engine().registers().stop_count(), 6);
	}

	#[test]
	fn erased_ip_requests_rarp() {
		let mut p = prom(&[1, 2, 3, 4, 5, 6], &[0xff; 4]);
		let mut core = RecordingNetworkCore::new();
		let id = Bootstrap::new(BootstrapConfig::default()).run(&mut p, &mut core);
		assert!(id.use_rarp);
		assert_eq!(core.ip(), Some(0xffff_ffff));
	}

	#[test]
	fn register_core_writes_msb_first() {
		let layout = NetworkCoreLayout::default();
		assert_eq!(layout.len(), 0x30);

		let mut core = RegisterNetworkCore::new(SimRegisters::new(layout.len()), layout);
		core.set_reset(true);
		core.set_mac_address(0x020d_dba1_1644);
		core.set_ip_address(0xc0a8_0001);
		core.set_rarp(true);

		let regs = core.into_registers();
		let mac: Vec<u8> = (0..6).map(|i| regs.get(0x04 + 4 * i)).collect();
		assert_eq!(mac, [0x02, 0x0d, 0xdb, 0xa1, 0x16, 0x44]);
		let ip: Vec<u8> = (0..4).map(|i| regs.get(0x1c + 4 * i)).collect();
		assert_eq!(ip, [0xc0, 0xa8, 0x00, 0x01]);
		assert_eq!(regs.get(0x00), 1);
		assert_eq!(regs.get(0x2c), 1);
	}
}
