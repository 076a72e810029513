use failure::Fail;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Fail)]
pub enum TransferError {
	/// Slave didn't acknowledge; `written` data bytes (address byte not
	/// counted) were accepted before. Zero means the address phase failed.
	#[fail(display = "no ACK from slave after {} data bytes", written)]
	Nack {
		written: usize,
	},
	/// Controller still reported "transfer in progress" after the poll limit.
	#[fail(display = "I2C controller timeout after {} bytes (bus stuck?)", transferred)]
	Timeout {
		transferred: usize,
	},
	#[fail(display = "transfer of {} bytes exceeds maximum of {}", len, max)]
	PayloadTooLong {
		len: usize,
		max: usize,
	},
}

impl TransferError {
	/// data bytes transferred before the failure
	pub fn transferred(&self) -> usize {
		match *self {
			TransferError::Nack { written } => written,
			TransferError::Timeout { transferred } => transferred,
			TransferError::PayloadTooLong { .. } => 0,
		}
	}

	pub fn is_nack(&self) -> bool {
		match *self {
			TransferError::Nack { .. } => true,
			_ => false,
		}
	}
}
