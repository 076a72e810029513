fn hex_digit(c: u8) -> u8 {
	match c {
		b'0'..=b'9' => c - b'0',
		b'a'..=b'f' => c - b'a' + 10,
		b'A'..=b'F' => c - b'A' + 10,
		// not rejected: counts as '0'
		_ => 0,
	}
}

fn hex_string_to_u64(s: &str) -> u64 {
	let digits = s.as_bytes();
	let mut result = 0u64;
	for (i, &c) in digits.iter().enumerate() {
		let remaining = (digits.len() - 1 - i) as u32;
		result = result.wrapping_add((hex_digit(c) as u64).checked_shl(remaining.saturating_mul(4)).unwrap_or(0));
	}
	result
}

/// Most significant digit first; characters outside `0-9a-fA-F` count as
/// zero. Digits beyond the width of the result are dropped.
pub fn hex_string_to_u32(s: &str) -> u32 {
	hex_string_to_u64(s) as u32
}

pub fn hex_string_to_u16(s: &str) -> u16 {
	hex_string_to_u64(s) as u16
}

/// three ASCII decimal digits with leading zeros
pub fn byte_to_decimal_ascii(value: u8) -> [u8; 3] {
	[
		b'0' + value / 100,
		b'0' + (value / 10) % 10,
		b'0' + value % 10,
	]
}

/// dotted decimal, most significant byte first
pub fn format_ipv4(ip: u32) -> String {
	let mut out = String::with_capacity(15);
	for (i, byte) in ip.to_be_bytes().iter().enumerate() {
		if i > 0 {
			out.push('.');
		}
		let digits = byte_to_decimal_ascii(*byte);
		let skip = digits.iter().take(2).take_while(|&&d| d == b'0').count();
		for &d in &digits[skip..] {
			out.push(d as char);
		}
	}
	out
}

/// lower 48 bits as colon separated hex
pub fn format_mac(uid: u64) -> String {
	let bytes = uid.to_be_bytes();
	bytes[2..].iter()
		.map(|b| format!("{:02x}", b))
		.collect::<Vec<_>>()
		.join(":")
}
