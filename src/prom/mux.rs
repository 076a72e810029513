use crate::i2c::{
	DeviceAddress,
	I2cEngine,
	TransferError,
};
use crate::regs::RegisterBus;

/// PCA9548-style I2C switch in front of the EEPROM on some boards.
pub const MUX_ADDRESS: DeviceAddress = DeviceAddress::masked(0x70);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum MuxChannel {
	Channel0,
	Channel1,
	Channel2,
	Channel3,
}

impl MuxChannel {
	pub fn from_index(index: u8) -> Option<Self> {
		match index {
			0 => Some(MuxChannel::Channel0),
			1 => Some(MuxChannel::Channel1),
			2 => Some(MuxChannel::Channel2),
			3 => Some(MuxChannel::Channel3),
			_ => None,
		}
	}

	pub fn control_byte(self) -> u8 {
		match self {
			MuxChannel::Channel0 => 0x01,
			MuxChannel::Channel1 => 0x02,
			MuxChannel::Channel2 => 0x04,
			MuxChannel::Channel3 => 0x08,
		}
	}
}

pub fn select_mux_channel<R: RegisterBus>(engine: &mut I2cEngine<R>, address: DeviceAddress, channel: MuxChannel) -> Result<(), TransferError> {
	info!("Enabling I2C channel {:?} on switch {}", channel, address);
	engine.write(address, &[channel.control_byte()], true)?;
	Ok(())
}
