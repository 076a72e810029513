mod cmdstat;
mod engine;
mod error;

pub use self::cmdstat::{
	Command,
	Control,
	Status,
};

pub use self::engine::{
	BusState,
	DEFAULT_POLL_DELAY,
	DEFAULT_POLL_LIMIT,
	DEFAULT_PRESCALE,
	DeviceAddress,
	Direction,
	EngineConfig,
	I2cEngine,
	MAX_TRANSFER,
	PollLimit,
};

pub use self::error::TransferError;
