use clap::{Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use blocksync::logging::{info, init_tracing};
use blocksync::protocol::{self, BlockHandler, MetaHandler, RemoteMetaClient, TcpBlockConnector};
use blocksync::store::BlockService;
use blocksync::validation::Validator;
use blocksync::{Config, ConsistentHashRing, MemoryBlockStore, MetaStore, RedbBlockStore, SyncEngine};

fn cli() -> Command {
	Command::new("blocksync")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Block-based file synchronization")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.global(true)
				.help("Config file (.toml, .json or .json5)"),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::Count)
				.global(true)
				.help("More logging (-v debug, -vv trace)"),
		)
		.subcommand(
			Command::new("meta")
				.about("Run the metadata server")
				.arg(Arg::new("listen").long("listen").value_name("ADDR").help("Listen address"))
				.arg(
					Arg::new("store")
						.long("store")
						.value_name("ADDR")
						.action(ArgAction::Append)
						.help("Block store address (repeatable)"),
				),
		)
		.subcommand(
			Command::new("block")
				.about("Run a block server")
				.arg(Arg::new("listen").long("listen").value_name("ADDR").help("Listen address"))
				.arg(
					Arg::new("data-dir")
						.long("data-dir")
						.value_name("DIR")
						.help("Persist blocks here instead of keeping them in memory"),
				),
		)
		.subcommand(
			Command::new("sync")
				.about("Run one sync pass over a directory")
				.arg(Arg::new("meta").long("meta").value_name("ADDR").help("Metadata server address"))
				.arg(
					Arg::new("block-size")
						.long("block-size")
						.value_name("BYTES")
						.value_parser(clap::value_parser!(usize))
						.help("Block size in bytes"),
				)
				.arg(
					Arg::new("retries")
						.long("retries")
						.value_name("N")
						.value_parser(clap::value_parser!(u32))
						.help("Conflict retries per file"),
				)
				.arg(Arg::new("dir").required(true)),
		)
}

/// Config file and environment, then command line overrides
fn build_config(matches: &ArgMatches) -> Result<Config, Box<dyn Error>> {
	let path = matches.get_one::<String>("config").map(Path::new);
	let mut config = Config::load(path)?;

	match matches.get_count("verbose") {
		0 => {}
		1 => config.log_level = "debug".to_string(),
		_ => config.log_level = "trace".to_string(),
	}

	match matches.subcommand() {
		Some(("meta", sub)) => {
			if let Some(listen) = sub.get_one::<String>("listen") {
				config.listen_addr = listen.clone();
			}
			if let Some(stores) = sub.get_many::<String>("store") {
				config.block_store_addrs = stores.cloned().collect();
			}
		}
		Some(("block", sub)) => {
			if let Some(listen) = sub.get_one::<String>("listen") {
				config.listen_addr = listen.clone();
			}
			if let Some(dir) = sub.get_one::<String>("data-dir") {
				config.data_dir = Some(PathBuf::from(dir));
			}
		}
		Some(("sync", sub)) => {
			if let Some(meta) = sub.get_one::<String>("meta") {
				config.meta_addr = meta.clone();
			}
			if let Some(size) = sub.get_one::<usize>("block-size") {
				config.block_size = *size;
			}
			if let Some(retries) = sub.get_one::<u32>("retries") {
				config.conflict_retries = *retries;
			}
			if let Some(dir) = sub.get_one::<String>("dir") {
				config.base_dir = PathBuf::from(dir);
			}
		}
		_ => {}
	}

	config.validate()?;
	Ok(config)
}

async fn run_meta(config: &Config) -> Result<(), Box<dyn Error>> {
	let ring = ConsistentHashRing::new(&config.block_store_addrs, config.virtual_nodes)?;
	info!(
		"Metadata server for {} block store(s): {}",
		config.block_store_addrs.len(),
		config.block_store_addrs.join(", ")
	);
	let handle = MetaStore::spawn(ring);

	let listener = TcpListener::bind(&config.listen_addr).await?;
	protocol::serve(listener, Arc::new(MetaHandler::new(Arc::new(handle)))).await?;
	Ok(())
}

async fn run_block(config: &Config) -> Result<(), Box<dyn Error>> {
	let store: Arc<dyn BlockService> = match &config.data_dir {
		Some(dir) => {
			std::fs::create_dir_all(dir)?;
			let store = RedbBlockStore::open(dir)?;
			info!("Block store at {}", store.path().display());
			Arc::new(store)
		}
		None => {
			info!("Block store in memory");
			Arc::new(MemoryBlockStore::new())
		}
	};

	let listener = TcpListener::bind(&config.listen_addr).await?;
	protocol::serve(listener, Arc::new(BlockHandler::new(store))).await?;
	Ok(())
}

async fn run_sync(config: &Config) -> Result<(), Box<dyn Error>> {
	let timeout = Duration::from_secs(config.connect_timeout_secs);
	let meta = RemoteMetaClient::connect(&config.meta_addr, timeout).await?;
	let engine = SyncEngine::new(config, Arc::new(meta), Arc::new(TcpBlockConnector::new(timeout)));

	let report = engine.run().await?;
	for (name, outcome) in &report.outcomes {
		eprintln!("{}: {}", name, outcome);
	}
	eprintln!(
		"{} uploaded, {} downloaded, {} conflicts, {} skipped ({} blocks sent, {} received)",
		report.uploaded(),
		report.downloaded(),
		report.conflicts(),
		report.skipped(),
		report.blocks_uploaded,
		report.blocks_downloaded
	);
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = cli().get_matches();
	let config = build_config(&matches)?;
	init_tracing(&config.log_level);

	match matches.subcommand_name() {
		Some("meta") => run_meta(&config).await,
		Some("block") => run_block(&config).await,
		Some("sync") => run_sync(&config).await,
		_ => Ok(()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cli_definition() {
		cli().debug_assert();
	}

	#[test]
	fn test_sync_flags_override_config() {
		let matches = cli()
			.try_get_matches_from(["blocksync", "sync", "--block-size", "1024", "--retries", "2", "/tmp/x"])
			.unwrap();
		let config = build_config(&matches).unwrap();
		assert_eq!(config.block_size, 1024);
		assert_eq!(config.conflict_retries, 2);
		assert_eq!(config.base_dir, PathBuf::from("/tmp/x"));
	}

	#[test]
	fn test_meta_store_list() {
		let matches = cli()
			.try_get_matches_from(["blocksync", "meta", "--store", "a:1", "--store", "b:2"])
			.unwrap();
		let config = build_config(&matches).unwrap();
		assert_eq!(config.block_store_addrs, vec!["a:1".to_string(), "b:2".to_string()]);
	}
}

// vim: ts=4
