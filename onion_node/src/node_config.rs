use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Error};
use config::{Config, File as CfgFile, FileFormat as CfgFileFormat};
use serde::{de, Deserialize, Deserializer};
use serde_yaml::Value;
use clap::{Arg, ArgMatches, builder::PossibleValue, Command, ValueEnum, value_parser};
use hex::FromHex;
use onion_crypto::*;
use onion_core::onion::OnionConfig;
use onion_core::onion::symmetric_key::ONION_KEY_REFRESH_INTERVAL;
use onion_core::shared_key_cache::{KEYS_PER_SLOT, SHARED_KEY_TIMEOUT};

/// Config for threading.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
pub enum Threads {
    /// Detect number of threads automatically by the number of CPU cores.
    Auto,
    /// Exact number of threads.
    N(u16)
}

impl FromStr for Threads {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "auto" {
            Ok(Threads::Auto)
        } else {
            u16::from_str(s).map(Threads::N)
        }
    }
}

/// Specifies where to write logs.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
pub enum LogType {
    Stderr,
    Stdout,
    #[cfg(unix)]
    Syslog,
    None,
}

impl ValueEnum for LogType {
    fn value_variants<'a>() -> &'a [Self] {
        use self::LogType::*;
        #[cfg(unix)]
        return &[Stderr, Stdout, Syslog, None];
        #[cfg(not(unix))]
        return &[Stderr, Stdout, None];
    }

    fn to_possible_value<'a>(&self) -> Option<PossibleValue> {
        use self::LogType::*;
        Some(match self {
            Stderr => PossibleValue::new("Stderr"),
            Stdout => PossibleValue::new("Stdout"),
            #[cfg(unix)]
            Syslog => PossibleValue::new("Syslog"),
            None => PossibleValue::new("None")
        })
    }
}

fn de_threads<'de, D>(deserializer: D) -> Result<Threads, D::Error> where D: Deserializer<'de> {
    let s = String::deserialize(deserializer)?;

    Threads::from_str(&s)
        .map_err(|e| de::Error::custom(format!("threads: {:?}", e)))
}

fn de_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error> where D: Deserializer<'de> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

/// Config parsed from command line arguments or from config file.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeConfig {
    /// UDP address to relay onion packets on
    #[serde(rename = "udp-address")]
    pub udp_addr: SocketAddr,
    /// DHT SecretKey
    #[serde(skip_deserializing)]
    pub sk: Option<SecretKey>,
    /// True if the SecretKey was passed as an argument instead of environment
    /// variable. Necessary to print a warning since the logger backend is not
    /// initialized when we parse arguments.
    #[serde(skip_deserializing)]
    pub sk_passed_as_arg: bool,
    /// Path to the file where DHT keys are stored.
    /// Required with config.
    #[serde(rename = "keys-file")]
    pub keys_file: Option<String>,
    /// Number of threads for execution.
    #[serde(deserialize_with = "de_threads")]
    pub threads: Threads,
    /// Specifies where to write logs.
    #[serde(rename = "log-type")]
    pub log_type: LogType,
    /// How often the onion symmetric key is refreshed.
    #[serde(rename = "key-refresh-interval", deserialize_with = "de_secs")]
    pub key_refresh_interval: Duration,
    /// How long unused shared keys are cached.
    #[serde(rename = "shared-key-timeout", deserialize_with = "de_secs")]
    pub shared_key_timeout: Duration,
    /// Number of shared keys in one bucket of the cache.
    #[serde(rename = "keys-per-slot")]
    pub keys_per_slot: usize,
    /// How often packet counters are written to log. Zero disables it.
    #[serde(rename = "stats-interval", deserialize_with = "de_secs")]
    pub stats_interval: Duration,
    /// Unused fields while parsing config file
    #[serde(flatten)]
    pub unused: HashMap<String, Value>,
}

impl NodeConfig {
    /// Tunables of the onion relay.
    pub fn onion_config(&self) -> OnionConfig {
        OnionConfig {
            key_refresh_interval: self.key_refresh_interval,
            shared_key_timeout: self.shared_key_timeout,
            keys_per_slot: self.keys_per_slot,
        }
    }
}

fn create_sk_arg() -> Arg {
    Arg::new("secret-key")
        .short('s')
        .long("secret-key")
        .help("DHT secret key. Note that you should not pass the key via \
               arguments due to security reasons. Use this argument for \
               test purposes only. In the real world use the environment \
               variable instead")
        .num_args(1)
        .conflicts_with("keys-file")
        .env("ONION_SECRET_KEY")
        .hide(true)
}

fn create_keys_file_arg() -> Arg {
    Arg::new("keys-file")
        .short('k')
        .long("keys-file")
        .help("Path to the file where DHT keys are stored")
        .num_args(1)
        .required_unless_present("secret-key")
        .conflicts_with("secret-key")
}

fn app() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .args_conflicts_with_subcommands(true)
        .subcommand(Command::new("config")
            .arg(Arg::new("cfg-file")
                .index(1)
                .help("Load settings from saved config file. \
                    Config file format is YAML")
                .num_args(1)
                .required(true)))
        .subcommand(Command::new("derive-pk")
            .about("Derive PK from either --keys-file or from env:ONION_SECRET_KEY")
            .arg(create_sk_arg())
            .arg(create_keys_file_arg()))
        // here go args without subcommands
        .arg(create_sk_arg())
        .arg(create_keys_file_arg())
        .arg(Arg::new("udp-address")
            .short('u')
            .long("udp-address")
            .help("UDP address to relay onion packets on")
            .num_args(1)
            .value_parser(value_parser!(SocketAddr))
            .required(true))
        .arg(Arg::new("threads")
            .short('j')
            .long("threads")
            .help("Number of threads to use. The value 'auto' means that the \
                   number of threads will be determined automatically by the \
                   number of CPU cores")
            .num_args(1)
            .value_parser(value_parser!(Threads))
            .default_value("1"))
        .arg(Arg::new("log-type")
            .short('l')
            .long("log-type")
            .help("Where to write logs")
            .num_args(1)
            .value_parser(value_parser!(LogType))
            .default_value("Stderr"))
        .arg(Arg::new("key-refresh-interval")
            .long("key-refresh-interval")
            .help("Interval in seconds after which onion symmetric key is \
                   refreshed. Onion paths expire with the key")
            .num_args(1)
            .value_parser(value_parser!(u64).range(1..))
            .default_value("7200"))
        .arg(Arg::new("shared-key-timeout")
            .long("shared-key-timeout")
            .help("Time in seconds after which unused shared key is removed \
                   from the cache")
            .num_args(1)
            .value_parser(value_parser!(u64))
            .default_value("600"))
        .arg(Arg::new("keys-per-slot")
            .long("keys-per-slot")
            .help("Number of shared keys stored in one bucket of the cache")
            .num_args(1)
            .value_parser(value_parser!(usize))
            .default_value("4"))
        .arg(Arg::new("stats-interval")
            .long("stats-interval")
            .help("Interval in seconds to write packet counters to log. \
                   The value 0 disables it")
            .num_args(1)
            .value_parser(value_parser!(u64))
            .default_value("0"))
}

/// What the node was asked to do.
pub enum CliCommand {
    /// Run onion relay with the config.
    Run(Box<NodeConfig>),
    /// Print DHT `PublicKey` and exit.
    DerivePk(PublicKey),
}

/// Parse command line arguments.
pub fn cli_parse() -> Result<CliCommand, Error> {
    let matches = app().get_matches();

    match matches.subcommand() {
        Some(("derive-pk", m)) => run_derive_pk(m).map(CliCommand::DerivePk),
        Some(("config", m)) => run_config(m).map(|config| CliCommand::Run(Box::new(config))),
        _ => run_args(&matches).map(|config| CliCommand::Run(Box::new(config))),
    }
}

/// Parse settings from a saved file.
fn parse_config(config_path: &str) -> Result<NodeConfig, Error> {
    let config_file = Config::builder()
        .set_default("log-type", "Stderr")?
        .set_default("threads", "1")?
        .set_default("key-refresh-interval", ONION_KEY_REFRESH_INTERVAL.as_secs())?
        .set_default("shared-key-timeout", SHARED_KEY_TIMEOUT.as_secs())?
        .set_default("keys-per-slot", KEYS_PER_SLOT as u64)?
        .set_default("stats-interval", 0)?
        .add_source(CfgFile::new(config_path, CfgFileFormat::Yaml))
        .build()
        .with_context(|| format!("Can't build config file {}", config_path))?;

    let config: NodeConfig = config_file.try_deserialize()
        .context("Can't deserialize config")?;

    if config.keys_file.is_none() {
        return Err(anyhow!("Can't deserialize config: 'keys-file' is not set"));
    }

    if config.key_refresh_interval.is_zero() {
        return Err(anyhow!("Can't deserialize config: 'key-refresh-interval' should be at least 1 second"));
    }

    Ok(config)
}

/// Parse hex encoded DHT `SecretKey`.
fn parse_sk(s: &str) -> Result<SecretKey, Error> {
    let sk_bytes: [u8; PUBLICKEYBYTES] = FromHex::from_hex(s)
        .map_err(|e| anyhow!("Invalid DHT secret key: {}", e))?;
    Ok(SecretKey::from(sk_bytes))
}

fn run_derive_pk(matches: &ArgMatches) -> Result<PublicKey, Error> {
    if matches.value_source("secret-key") == Some(clap::parser::ValueSource::CommandLine) {
        return Err(anyhow!("You should not pass the secret key via arguments due to \
               security reasons. Use the environment variable instead"));
    }

    if let Some(sk) = matches.get_one::<String>("secret-key") {
        return parse_sk(sk).map(|sk| sk.public_key())
    }

    let keys_file = matches.get_one::<String>("keys-file")
        .ok_or_else(|| anyhow!("Neither secret key nor keys file is specified"))?;
    let file = std::fs::File::open(keys_file)
        .with_context(|| format!("Failed to read the keys file '{}'", keys_file))?;
    crate::keys::load_keys(file).map(|(pk, _sk)| pk)
}

fn run_config(matches: &ArgMatches) -> Result<NodeConfig, Error> {
    let config_path = matches.get_one::<String>("cfg-file")
        .ok_or_else(|| anyhow!("Config file is not specified"))?;

    parse_config(config_path)
}

fn run_args(matches: &ArgMatches) -> Result<NodeConfig, Error> {
    let udp_addr = matches.get_one::<SocketAddr>("udp-address").copied()
        .ok_or_else(|| anyhow!("UDP address is not specified"))?;

    let sk = matches.get_one::<String>("secret-key")
        .map(|s| parse_sk(s))
        .transpose()?;

    let sk_passed_as_arg = matches.value_source("secret-key") == Some(clap::parser::ValueSource::CommandLine);

    let keys_file = matches.get_one("keys-file").cloned();

    let threads = matches.get_one("threads").copied().unwrap_or(Threads::N(1));

    let log_type = matches.get_one("log-type").copied().unwrap_or(LogType::Stderr);

    let secs = |id: &str, default: Duration| matches.get_one::<u64>(id)
        .map(|secs| Duration::from_secs(*secs))
        .unwrap_or(default);

    let key_refresh_interval = secs("key-refresh-interval", ONION_KEY_REFRESH_INTERVAL);
    let shared_key_timeout = secs("shared-key-timeout", SHARED_KEY_TIMEOUT);
    let stats_interval = secs("stats-interval", Duration::from_secs(0));

    let keys_per_slot = matches.get_one::<usize>("keys-per-slot").copied()
        .unwrap_or(KEYS_PER_SLOT);

    Ok(NodeConfig {
        udp_addr,
        sk,
        sk_passed_as_arg,
        keys_file,
        threads,
        log_type,
        key_refresh_interval,
        shared_key_timeout,
        keys_per_slot,
        stats_interval,
        unused: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn args_udp() {
        let saddr = "127.0.0.1:33445";
        let matches = app().get_matches_from(vec![
            "onion-node",
            "--keys-file",
            "./keys",
            "--udp-address",
            saddr,
        ]);
        let config = run_args(&matches).unwrap();
        assert_eq!(config.keys_file.unwrap(), "./keys");
        assert_eq!(config.udp_addr, saddr.parse().unwrap());
        assert_eq!(config.threads, Threads::N(1));
        assert_eq!(config.log_type, LogType::Stderr);
        assert_eq!(config.key_refresh_interval, Duration::from_secs(7200));
        assert_eq!(config.shared_key_timeout, Duration::from_secs(600));
        assert_eq!(config.keys_per_slot, 4);
        assert_eq!(config.stats_interval, Duration::from_secs(0));
    }

    #[test]
    fn args_udp_required() {
        let matches = app().try_get_matches_from(vec![
            "onion-node",
            "--keys-file",
            "./keys",
        ]);
        assert!(matches.is_err());
    }

    #[test]
    fn args_with_secret_key() {
        let sk = "d5ff9ceafe9e1145bc807dc94b4ee911a5878705b5f9ee68f6ccc51e498f313c";
        let matches = app().get_matches_from(vec![
            "onion-node",
            "--secret-key",
            sk,
            "--udp-address",
            "127.0.0.1:33445",
        ]);
        let config = run_args(&matches).unwrap();
        assert!(config.sk_passed_as_arg);
        assert_eq!(config.sk.unwrap().as_bytes(), &<[u8; 32]>::from_hex(sk).unwrap());
        assert!(config.keys_file.is_none());
    }

    #[test]
    fn args_invalid_secret_key() {
        let matches = app().get_matches_from(vec![
            "onion-node",
            "--secret-key",
            "d5ff9cea",
            "--udp-address",
            "127.0.0.1:33445",
        ]);
        assert!(run_args(&matches).is_err());
    }

    #[test]
    fn args_keys_file_or_secret_key_required() {
        let matches = app().try_get_matches_from(vec![
            "onion-node",
            "--udp-address",
            "127.0.0.1:33445",
        ]);
        assert!(matches.is_err());
    }

    #[test]
    fn args_keys_file_and_secret_key_conflicts() {
        let matches = app().try_get_matches_from(vec![
            "onion-node",
            "--keys-file",
            "./keys",
            "--secret-key",
            "d5ff9ceafe9e1145bc807dc94b4ee911a5878705b5f9ee68f6ccc51e498f313c",
            "--udp-address",
            "127.0.0.1:33445",
        ]);
        assert!(matches.is_err());
    }

    #[test]
    fn args_onion_tunables() {
        let matches = app().get_matches_from(vec![
            "onion-node",
            "--keys-file",
            "./keys",
            "--udp-address",
            "127.0.0.1:33445",
            "--key-refresh-interval",
            "60",
            "--shared-key-timeout",
            "30",
            "--keys-per-slot",
            "8",
            "--stats-interval",
            "10",
        ]);
        let config = run_args(&matches).unwrap();
        assert_eq!(config.onion_config(), OnionConfig {
            key_refresh_interval: Duration::from_secs(60),
            shared_key_timeout: Duration::from_secs(30),
            keys_per_slot: 8,
        });
        assert_eq!(config.stats_interval, Duration::from_secs(10));
    }

    #[test]
    fn args_zero_key_refresh_interval() {
        let matches = app().try_get_matches_from(vec![
            "onion-node",
            "--keys-file",
            "./keys",
            "--udp-address",
            "127.0.0.1:33445",
            "--key-refresh-interval",
            "0",
        ]);
        assert!(matches.is_err());
    }

    #[test]
    fn args_log_type() {
        let matches = app().get_matches_from(vec![
            "onion-node",
            "--keys-file",
            "./keys",
            "--udp-address",
            "127.0.0.1:33445",
            "--log-type",
            "None"
        ]);
        let config = run_args(&matches).unwrap();
        assert_eq!(config.log_type, LogType::None);
    }

    #[test]
    fn args_threads() {
        let matches = app().get_matches_from(vec![
            "onion-node",
            "--keys-file",
            "./keys",
            "--udp-address",
            "127.0.0.1:33445",
            "--threads",
            "auto"
        ]);
        let config = run_args(&matches).unwrap();
        assert_eq!(config.threads, Threads::Auto);
    }

    #[test]
    fn args_derive_pk_keys_file() {
        let matches = app().get_matches_from(vec![
            "onion-node",
            "derive-pk",
            "--keys-file",
            "./keys",
        ]);
        let matches = matches.subcommand_matches("derive-pk").unwrap();
        assert_eq!("./keys", matches.get_one::<String>("keys-file").unwrap());
    }

    #[test]
    fn config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "udp-address: \"127.0.0.1:33445\"").unwrap();
        writeln!(file, "keys-file: \"./keys\"").unwrap();
        writeln!(file, "threads: \"auto\"").unwrap();
        writeln!(file, "key-refresh-interval: 3600").unwrap();
        writeln!(file, "unknown-key: 42").unwrap();

        let config = parse_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.udp_addr, "127.0.0.1:33445".parse().unwrap());
        assert_eq!(config.keys_file.as_deref(), Some("./keys"));
        assert_eq!(config.threads, Threads::Auto);
        assert_eq!(config.log_type, LogType::Stderr);
        assert_eq!(config.key_refresh_interval, Duration::from_secs(3600));
        assert_eq!(config.shared_key_timeout, Duration::from_secs(600));
        assert_eq!(config.keys_per_slot, 4);
        assert!(config.unused.contains_key("unknown-key"));
    }

    #[test]
    fn config_file_requires_keys_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "udp-address: \"127.0.0.1:33445\"").unwrap();

        assert!(parse_config(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn config_file_zero_key_refresh_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "udp-address: \"127.0.0.1:33445\"").unwrap();
        writeln!(file, "keys-file: \"./keys\"").unwrap();
        writeln!(file, "key-refresh-interval: 0").unwrap();

        assert!(parse_config(path.to_str().unwrap()).is_err());
    }
}
