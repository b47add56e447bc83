use blemidi_codec::{DEFAULT_MAX_SYSEX, MIN_PACKET_CAPACITY};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("blemidi {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: blemidi");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("min_packet_capacity: {MIN_PACKET_CAPACITY}");
    println!("default_max_sysex: {DEFAULT_MAX_SYSEX}");
    println!("features: serde={}, cli=true", cfg!(feature = "serde"));

    Ok(SUCCESS)
}
