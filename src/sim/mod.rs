mod controller;
mod eeprom;
mod network;

pub use self::controller::SimController;
pub use self::eeprom::{
	SimEeprom,
	SimMux,
};
pub use self::network::{
	NetworkEvent,
	RecordingNetworkCore,
	SimRegisters,
};
