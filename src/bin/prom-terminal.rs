#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate opencores_i2c_prom;
use opencores_i2c_prom::*;

use std::process::exit;

use opencores_i2c_prom::bootstrap::{
	Bootstrap,
	BootstrapConfig,
	NetworkCore,
	NetworkCoreLayout,
	RegisterNetworkCore,
};
use opencores_i2c_prom::codec::{
	format_ipv4,
	format_mac,
	hex_string_to_u16,
	hex_string_to_u32,
};
use opencores_i2c_prom::i2c::{
	DeviceAddress,
	EngineConfig,
	I2cEngine,
	PollLimit,
};
use opencores_i2c_prom::prom::{
	AddressWidth,
	MUX_ADDRESS,
	MuxChannel,
	Prom,
	PromConfig,
	select_mux_channel,
};
use opencores_i2c_prom::regs::{
	Register,
	RegisterBus,
	RegisterLayout,
	open_mapped_readwrite,
};
use opencores_i2c_prom::sim::{
	RecordingNetworkCore,
	SimController,
	SimEeprom,
};

const DUMP_SIZE: usize = 32;

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

// strict hex for configuration values; operator data goes through `codec`
fn get_hex_param(matches: &clap::ArgMatches, name: &str) -> AResult<Option<usize>> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => return Ok(None),
	};
	let digits = param.trim_start_matches("0x");
	usize::from_str_radix(digits, 16).map(Some).map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_hex_data<'a>(matches: &'a clap::ArgMatches, name: &str, max_digits: usize) -> AResult<&'a str> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	let digits = param.trim_start_matches("0x");
	ensure!(digits.len() <= max_digits, "{} takes at most {} hex digits, got {:?}", name, max_digits, param);
	if let Some(c) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
		warn!("non-hex character {:?} in {} counts as 0", c, name);
	}
	Ok(digits)
}

struct Settings {
	engine: EngineConfig,
	prom: PromConfig,
	bootstrap: BootstrapConfig,
}

fn settings(matches: &clap::ArgMatches) -> AResult<Settings> {
	let mut engine = EngineConfig::default();
	if matches.is_present("legacy") {
		engine.layout = RegisterLayout::ByteStride;
	}
	if let Some(prescale) = get_hex_param(matches, "prescale")? {
		ensure!(prescale <= 0xffff, "prescale 0x{:x} too big", prescale);
		engine.prescale = prescale as u16;
	}
	if let Some(polls) = matches.value_of("polls") {
		engine.poll_limit = if polls == "unbounded" {
			PollLimit::Unbounded
		} else {
			PollLimit::Bounded(get_param(matches, "polls")?)
		};
	}

	let mut prom = PromConfig::default();
	if let Some(address) = get_hex_param(matches, "prom")? {
		ensure!(address <= 0xff, "PROM address 0x{:x} too big", address);
		prom.bus_address = DeviceAddress::new(address as u8)?;
	}
	if matches.is_present("width") {
		prom.address_width = AddressWidth::from_bytes(get_param(matches, "width")?)?;
	}
	if let Some(uid) = get_hex_param(matches, "uid")? {
		ensure!(uid <= 0xff, "UID offset 0x{:x} too big", uid);
		prom.uid_offset = uid as u8;
	}

	let bootstrap = BootstrapConfig {
		force_rarp: matches.is_present("force_rarp"),
		..BootstrapConfig::default()
	};

	Ok(Settings { engine, prom, bootstrap })
}

fn run_command<R: RegisterBus>(
	matches: &clap::ArgMatches,
	settings: &Settings,
	prom: &mut Prom<R>,
	core: Option<&mut dyn NetworkCore>,
) -> AResult<()> {
	match matches.subcommand() {
		("id", _) => {
			let uid = prom.identity().read_unique_id()?;
			println!("UID from PROM = 0x{:012x} ({})", uid, format_mac(uid));
		},
		("read", _) => {
			let ip = prom.identity().read_ip_address()?;
			println!("IP address from PROM = 0x{:08x} ({})", ip, format_ipv4(ip));
		},
		("write", Some(sub_m)) => {
			let ip = hex_string_to_u32(get_hex_data(sub_m, "DATA", 8)?);
			let written = prom.identity().write_ip_address(ip)?;
			println!("wrote {} bytes", written);
		},
		("readgpo", _) => {
			let gpo = prom.identity().read_gpo()?;
			println!("GPO value from PROM = 0x{:04x}", gpo);
		},
		("writegpo", Some(sub_m)) => {
			let gpo = hex_string_to_u16(get_hex_data(sub_m, "DATA", 4)?);
			let written = prom.identity().write_gpo(gpo)?;
			println!("wrote {} bytes", written);
		},
		("dump", _) => {
			println!("Contents of PROM:");
			for (address, data) in prom.dump(DUMP_SIZE)? {
				println!("{:02x} {:02x}", address, data);
			}
		},
		("set", _) => {
			let core = match core {
				Some(core) => core,
				None => bail!("no network core registers given (--core)"),
			};
			let identity = Bootstrap::new(settings.bootstrap).run(prom, core);
			println!("{}", identity);
		},
		("mux", Some(sub_m)) => {
			let index: u8 = get_param(sub_m, "CHANNEL")?;
			let channel = match MuxChannel::from_index(index) {
				Some(c) => c,
				None => bail!("invalid mux channel {} (0, 1, 2 or 3)", index),
			};
			select_mux_channel(prom.engine_mut(), MUX_ADDRESS, channel)?;
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
	Ok(())
}

// factory fresh E24AA025E: UID programmed, everything else erased
fn simulated_prom(settings: &Settings) -> SimController {
	let mut eeprom = SimEeprom::new(settings.prom.address_width);
	let uid = bootstrap::FALLBACK_UID.to_be_bytes();
	eeprom.load(settings.prom.uid_offset as usize, &uid[2..]);

	let mut sim = SimController::new(settings.engine.layout);
	sim.attach(settings.prom.bus_address, eeprom);
	sim.attach_mux(MUX_ADDRESS);
	sim
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg simulate: -s --simulate "use a simulated controller and EEPROM")
		(@arg resource: -r --resource +takes_value "file to map controller registers from (sysfs PCI resource or /dev/mem)")
		(@arg base: --base +takes_value "offset of the I2C controller in the mapped file (hex)")
		(@arg core: --core +takes_value "offset of the network core identity registers in the mapped file (hex)")
		(@arg legacy: --legacy "registers at 1-byte stride instead of 4")
		(@arg prescale: --prescale +takes_value "I2C clock prescale (hex, default 0400)")
		(@arg polls: --polls +takes_value "status polls before giving up, or 'unbounded'")
		(@arg prom: --prom +takes_value "I2C address of the EEPROM (hex, default 50)")
		(@arg width: --width +takes_value "EEPROM address bytes (1 or 2)")
		(@arg uid: --uid +takes_value "offset of the unique ID in the EEPROM (hex, default fa)")
		(@arg force_rarp: --force_rarp "don't read the IP address, always use RARP")
		(@subcommand id =>
			(about: "read unique ID")
		)
		(@subcommand read =>
			(about: "read IP address from PROM")
		)
		(@subcommand write =>
			(about: "write IP address to PROM")
			(@arg DATA: +required "IP address as 8 hex digits")
		)
		(@subcommand readgpo =>
			(about: "read GPO value from PROM")
		)
		(@subcommand writegpo =>
			(about: "write GPO value to PROM")
			(@arg DATA: +required "GPO value as 4 hex digits")
		)
		(@subcommand dump =>
			(about: "dump EEPROM contents")
		)
		(@subcommand set =>
			(about: "read from PROM, set MAC and IP address")
		)
		(@subcommand mux =>
			(about: "select I2C switch channel")
			(@arg CHANNEL: +required "channel 0, 1, 2 or 3")
		)
	).get_matches();

	let settings = settings(&matches)?;

	if matches.is_present("simulate") {
		let mut engine = I2cEngine::new(simulated_prom(&settings), settings.engine);
		engine.setup();
		let mut prom = Prom::new(engine, settings.prom);
		let mut core = RecordingNetworkCore::new();
		run_command(&matches, &settings, &mut prom, Some(&mut core as &mut dyn NetworkCore))?;
		for event in core.events() {
			debug!("network core: {:?}", event);
		}
		return Ok(());
	}

	let resource = match matches.value_of("resource") {
		Some(r) => r,
		None => bail!("need --resource (or --simulate)"),
	};
	let base = get_hex_param(&matches, "base")?.unwrap_or(0);
	let len = settings.engine.layout.offset(Register::CommandStatus) + 1;
	let regs = open_mapped_readwrite(resource, base, len)?;

	let mut engine = I2cEngine::new(regs, settings.engine);
	engine.setup();
	let mut prom = Prom::new(engine, settings.prom);

	match get_hex_param(&matches, "core")? {
		Some(core_base) => {
			let layout = NetworkCoreLayout::default();
			let core_regs = open_mapped_readwrite(resource, core_base, layout.len())?;
			let mut core = RegisterNetworkCore::new(core_regs, layout);
			run_command(&matches, &settings, &mut prom, Some(&mut core as &mut dyn NetworkCore))
		},
		None => run_command(&matches, &settings, &mut prom, None),
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
