use clap::{Arg, ArgAction, ArgMatches, Command};
use shardkv::logging::{init_logging, level_from_verbosity};
use shardkv::{KeyValueStore, ShardConfig, ShardManager};

/// Administrative CLI for a sharded store directory.
///
/// Every command opens all shards, runs, and closes them again, so it must
/// not run against a directory that a node currently has open.
fn main() {
    let matches = create_cli().get_matches();

    let level = level_from_verbosity(matches.get_count("verbose"));
    if let Err(e) = init_logging(level, matches.get_flag("json-logs")) {
        eprintln!("Warning: logging not initialised: {}", e);
    }

    if let Err(e) = run_command(&matches) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn path_arg() -> Arg {
    Arg::new("path")
        .help("Root directory of the sharded store")
        .required(true)
        .index(1)
}

fn create_cli() -> Command {
    Command::new("shardkv-cli")
        .about("Sharded key-value store administration")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(Arg::new("disk-groups")
            .help("Number of disk groups")
            .long("disk-groups")
            .global(true)
            .value_parser(clap::value_parser!(usize))
            .default_value("1"))
        .arg(Arg::new("shards-per-group")
            .help("Shards inside each disk group")
            .long("shards-per-group")
            .global(true)
            .value_parser(clap::value_parser!(usize))
            .default_value("8"))
        .arg(Arg::new("config")
            .help("JSON shard configuration; overrides the layout flags")
            .long("config")
            .global(true))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .global(true)
            .action(ArgAction::Count))
        .arg(Arg::new("json-logs")
            .help("Emit logs as JSON")
            .long("json-logs")
            .global(true)
            .action(ArgAction::SetTrue))
        .subcommand(
            Command::new("get")
                .about("Get a value by key")
                .arg(path_arg())
                .arg(Arg::new("key").help("Key to retrieve").required(true).index(2))
        )
        .subcommand(
            Command::new("put")
                .about("Store a key-value pair")
                .arg(path_arg())
                .arg(Arg::new("key").help("Key to store").required(true).index(2))
                .arg(Arg::new("value").help("Value to store").required(true).index(3))
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a key")
                .arg(path_arg())
                .arg(Arg::new("key").help("Key to delete").required(true).index(2))
        )
        .subcommand(
            Command::new("scan")
                .about("List keys in order")
                .arg(path_arg())
                .arg(Arg::new("start")
                    .help("Start key (inclusive)")
                    .long("start")
                    .conflicts_with("prefix"))
                .arg(Arg::new("prefix")
                    .help("Only keys with this prefix")
                    .long("prefix"))
                .arg(Arg::new("limit")
                    .help("Maximum number of results")
                    .long("limit")
                    .value_parser(clap::value_parser!(usize))
                    .default_value("100"))
        )
        .subcommand(
            Command::new("stat")
                .about("Show a backing store property for every shard")
                .arg(path_arg())
                .arg(Arg::new("property")
                    .help("Property name: entries, size_on_disk, checksum, recovered")
                    .default_value("entries")
                    .index(2))
        )
        .subcommand(
            Command::new("compact")
                .about("Compact a key range on every shard")
                .arg(path_arg())
                .arg(Arg::new("start").help("Start key").long("start"))
                .arg(Arg::new("limit").help("Limit key (exclusive)").long("limit"))
        )
}

fn open_store(matches: &ArgMatches) -> Result<ShardManager, Box<dyn std::error::Error>> {
    let path = matches.get_one::<String>("path").unwrap();
    let config = match matches.get_one::<String>("config") {
        Some(config_path) => ShardConfig::from_json_file(config_path)?,
        None => ShardConfig::new(
            *matches.get_one::<usize>("disk-groups").unwrap(),
            *matches.get_one::<usize>("shards-per-group").unwrap(),
        ),
    };
    Ok(ShardManager::open(path, config)?)
}

fn run_command(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let (name, sub_matches) = matches.subcommand().ok_or("missing subcommand")?;
    let store = open_store(sub_matches)?;
    let result = match name {
        "get" => cmd_get(&store, sub_matches),
        "put" => cmd_put(&store, sub_matches),
        "delete" => cmd_delete(&store, sub_matches),
        "scan" => cmd_scan(&store, sub_matches),
        "stat" => cmd_stat(&store, sub_matches),
        "compact" => cmd_compact(&store, sub_matches),
        _ => unreachable!(),
    };
    store.close()?;
    result
}

fn cmd_get(store: &ShardManager, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let key = matches.get_one::<String>("key").unwrap();
    match store.get(key.as_bytes())? {
        Some(value) => println!("{}", String::from_utf8_lossy(&value)),
        None => return Err(format!("Key not found: {}", key).into()),
    }
    Ok(())
}

fn cmd_put(store: &ShardManager, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let key = matches.get_one::<String>("key").unwrap();
    let value = matches.get_one::<String>("value").unwrap();
    store.put(key.as_bytes(), value.as_bytes())?;
    println!("Stored {} in shard {:02}", key, store.shard_index(key.as_bytes()));
    Ok(())
}

fn cmd_delete(store: &ShardManager, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let key = matches.get_one::<String>("key").unwrap();
    store.delete(key.as_bytes())?;
    println!("Deleted {}", key);
    Ok(())
}

fn cmd_scan(store: &ShardManager, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let limit = *matches.get_one::<usize>("limit").unwrap();
    let iter = match (
        matches.get_one::<String>("start"),
        matches.get_one::<String>("prefix"),
    ) {
        (_, Some(prefix)) => store.new_iterator_with_prefix(prefix.as_bytes())?,
        (Some(start), None) => store.new_iterator_with_start(start.as_bytes())?,
        (None, None) => store.new_iterator()?,
    };

    for item in iter.take(limit) {
        let (key, value) = item?;
        println!(
            "{} = {}",
            String::from_utf8_lossy(&key),
            String::from_utf8_lossy(&value)
        );
    }
    Ok(())
}

fn cmd_stat(store: &ShardManager, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let property = matches.get_one::<String>("property").unwrap();
    print!("{}", store.stat(property)?);
    Ok(())
}

fn cmd_compact(store: &ShardManager, matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let start = matches.get_one::<String>("start").map(|s| s.as_bytes());
    let limit = matches.get_one::<String>("limit").map(|s| s.as_bytes());
    store.compact(start, limit)?;
    println!("Compacted {} shards", store.shard_count());
    Ok(())
}
