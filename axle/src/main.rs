use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use axle_client::{Axle, Key, Keyring, StatsQuery};
use axle_core::config::{self, Config};
use axle_core::{Granularity, Stats};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

const DEFAULT_FROM: u32 = 0;
const DEFAULT_TO: u32 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (config_path, args) = split_config_flag(std::env::args().skip(1).collect())?;
    let cmd = args.first().map(String::as_str).unwrap_or("help");

    match cmd {
        "keyring" => cmd_keyring(&config_path, &args[1..]).await,
        "keyrings" => cmd_keyrings(&config_path, &args[1..]).await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("unknown command: {other}");
            print_help();
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        "\
axle - ApiAxle keyring management

USAGE:
    axle [--config <path>] <command> [args...]

COMMANDS:
    keyring <subcommand>                Manage a single keyring
      get <id>                          Show a keyring
      create <id>                       Create a keyring
      delete <id>                       Delete a keyring
      link <id> <key>                   Associate a key with a keyring
      unlink <id> <key>                 Disassociate a key from a keyring
      keys <id> [from] [to]             List keys in a keyring (default 0 10)
      stats <id> [options]              Show hit counts for a keyring

    keyrings [from] [to]                List keyrings (default 0 10)
    help                                Show this help

STATS OPTIONS:
    --from=<unix secs>                  Start of range (default: one hour ago)
    --to=<unix secs>                    End of range (default: now)
    --granularity=<g>                   seconds | minutes | hours | days (default: minutes)
    --forkey=<key>                      Only count hits made with this key
    --forapi=<api>                      Only count hits against this API

FLAGS:
    -c, --config <path>                 Config file (default: $XDG_CONFIG_HOME/axle/config.toml)

ENVIRONMENT:
    RUST_LOG                            Log filter, e.g. RUST_LOG=axle_client=debug

EXAMPLES:
    axle keyring create partners
    axle keyring link partners acme-key
    axle keyring keys partners 0 50
    axle keyring stats partners --granularity=hours --forkey=acme-key
    axle keyrings"
    );
}

/// Remove `--config <path>` / `-c <path>` / `--config=<path>` from `args`.
fn split_config_flag(args: Vec<String>) -> Result<(PathBuf, Vec<String>)> {
    let mut path = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" || arg == "-c" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow::anyhow!("--config requires a path argument"))?;
            path = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--config=") {
            path = Some(PathBuf::from(value));
        } else {
            rest.push(arg);
        }
    }
    Ok((path.unwrap_or_else(config::default_config_path), rest))
}

fn connect(config_path: &Path) -> Result<Axle> {
    let config = Config::load(config_path)?;
    tracing::info!(address = %config.service.address, "using ApiAxle service");
    Ok(Axle::connect(&config)?)
}

fn required<'a>(args: &'a [String], index: usize, usage: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("usage: {usage}"))
}

fn parse_range(args: &[String]) -> Result<(u32, u32)> {
    let from = match args.first() {
        Some(v) => v.parse().with_context(|| format!("invalid 'from': {v}"))?,
        None => DEFAULT_FROM,
    };
    let to = match args.get(1) {
        Some(v) => v.parse().with_context(|| format!("invalid 'to': {v}"))?,
        None => DEFAULT_TO,
    };
    Ok((from, to))
}

async fn cmd_keyring(config_path: &Path, args: &[String]) -> Result<()> {
    let sub = args.first().map(String::as_str).unwrap_or("help");
    let args = args.get(1..).unwrap_or_default();

    match sub {
        "get" | "show" => {
            let id = required(args, 0, "axle keyring get <id>")?;
            let ring = axle_client::get_keyring(&connect(config_path)?, id).await?;
            print_json(&keyring_json(&ring))
        }
        "create" | "add" => {
            let id = required(args, 0, "axle keyring create <id>")?;
            let mut ring = Keyring::new(&connect(config_path)?, id);
            ring.save().await?;
            print_json(&keyring_json(&ring))
        }
        "delete" | "rm" => {
            let id = required(args, 0, "axle keyring delete <id>")?;
            axle_client::delete_keyring(&connect(config_path)?, id).await?;
            println!("Keyring '{id}' deleted.");
            Ok(())
        }
        "link" => {
            let id = required(args, 0, "axle keyring link <id> <key>")?;
            let key_id = required(args, 1, "axle keyring link <id> <key>")?;
            let key = axle_client::keyring_link_key(&connect(config_path)?, id, key_id).await?;
            print_json(&key_json(&key))
        }
        "unlink" => {
            let id = required(args, 0, "axle keyring unlink <id> <key>")?;
            let key_id = required(args, 1, "axle keyring unlink <id> <key>")?;
            let key = axle_client::keyring_unlink_key(&connect(config_path)?, id, key_id).await?;
            print_json(&key_json(&key))
        }
        "keys" => {
            let id = required(args, 0, "axle keyring keys <id> [from] [to]")?;
            let (from, to) = parse_range(&args[1..])?;
            let mut keys = axle_client::keyring_keys(&connect(config_path)?, id, from, to).await?;
            keys.sort_by(|a, b| a.identifier().cmp(b.identifier()));
            print_json(&Value::Array(keys.iter().map(key_json).collect()))
        }
        "stats" => {
            let id = required(args, 0, "axle keyring stats <id> [options]")?;
            let query = parse_stats_query(&args[1..], Utc::now())?;
            let stats = axle_client::keyring_stats(&connect(config_path)?, id, &query).await?;
            print_json(&stats_json(&stats))
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("unknown keyring subcommand: {other}");
            print_help();
            std::process::exit(1);
        }
    }
}

async fn cmd_keyrings(config_path: &Path, args: &[String]) -> Result<()> {
    let (from, to) = parse_range(args)?;
    let mut rings = axle_client::keyrings(&connect(config_path)?, from, to).await?;
    rings.sort_by(|a, b| a.identifier().cmp(b.identifier()));
    print_json(&Value::Array(rings.iter().map(keyring_json).collect()))
}

fn parse_stats_query(args: &[String], now: DateTime<Utc>) -> Result<StatsQuery> {
    let mut query = StatsQuery::new(now - Duration::hours(1), now, Granularity::default());
    for arg in args {
        let Some((flag, value)) = arg.split_once('=') else {
            bail!("invalid stats option '{arg}', expected --name=value");
        };
        match flag {
            "--from" => query.from = parse_unix(value)?,
            "--to" => query.to = parse_unix(value)?,
            "--granularity" => {
                query.granularity = value.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            }
            "--forkey" => query.for_key = Some(value.to_string()),
            "--forapi" => query.for_api = Some(value.to_string()),
            other => bail!("unknown stats option '{other}'"),
        }
    }
    if query.from > query.to {
        bail!("--from must not be later than --to");
    }
    Ok(query)
}

fn parse_unix(value: &str) -> Result<DateTime<Utc>> {
    let secs: i64 = value
        .parse()
        .with_context(|| format!("invalid unix timestamp: {value}"))?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| anyhow::anyhow!("timestamp out of range: {value}"))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn keyring_json(ring: &Keyring) -> Value {
    json!({
        "identifier": ring.identifier(),
        "url": ring.url(),
        "createdAt": ring.created_at().map(|t| t.to_rfc3339()),
        "updatedAt": ring.updated_at().map(|t| t.to_rfc3339()),
    })
}

fn key_json(key: &Key) -> Value {
    json!({
        "identifier": key.identifier(),
        "url": key.url(),
        "qps": key.qps,
        "qpm": key.qpm,
        "qpd": key.qpd,
        "disabled": key.disabled,
        "createdAt": key.created_at().map(|t| t.to_rfc3339()),
        "updatedAt": key.updated_at().map(|t| t.to_rfc3339()),
    })
}

fn stats_json(stats: &Stats) -> Value {
    let mut out = Map::new();
    for (hit, series) in stats {
        let mut by_time = Map::new();
        for (at, buckets) in series {
            let counts: Map<String, Value> = buckets
                .iter()
                .map(|(code, count)| (code.to_string(), Value::from(*count)))
                .collect();
            by_time.insert(at.to_rfc3339(), Value::Object(counts));
        }
        out.insert(hit.to_string(), Value::Object(by_time));
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use axle_core::{Buckets, HitType};

    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn config_flag_is_removed() {
        let (path, rest) =
            split_config_flag(strings(&["--config", "/tmp/a.toml", "keyring", "get", "x"])).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/a.toml"));
        assert_eq!(rest, strings(&["keyring", "get", "x"]));

        let (path, rest) = split_config_flag(strings(&["keyrings", "--config=/etc/axle.toml"])).unwrap();
        assert_eq!(path, PathBuf::from("/etc/axle.toml"));
        assert_eq!(rest, strings(&["keyrings"]));
    }

    #[test]
    fn config_flag_requires_value() {
        assert!(split_config_flag(strings(&["keyrings", "-c"])).is_err());
    }

    #[test]
    fn range_defaults_and_overrides() {
        assert_eq!(parse_range(&[]).unwrap(), (0, 10));
        assert_eq!(parse_range(&strings(&["5", "25"])).unwrap(), (5, 25));
        assert!(parse_range(&strings(&["-1"])).is_err());
    }

    #[test]
    fn stats_query_defaults_to_last_hour() {
        let now = DateTime::from_timestamp(7_200, 0).unwrap();
        let query = parse_stats_query(&[], now).unwrap();
        assert_eq!(query.from.timestamp(), 3_600);
        assert_eq!(query.to, now);
        assert_eq!(query.granularity, Granularity::Minutes);
        assert!(query.for_key.is_none());
    }

    #[test]
    fn stats_query_options() {
        let now = Utc::now();
        let query = parse_stats_query(
            &strings(&["--from=60", "--to=120", "--granularity=days", "--forkey=k"]),
            now,
        )
        .unwrap();
        assert_eq!(query.from.timestamp(), 60);
        assert_eq!(query.to.timestamp(), 120);
        assert_eq!(query.granularity, Granularity::Days);
        assert_eq!(query.for_key.as_deref(), Some("k"));
    }

    #[test]
    fn stats_query_rejects_bad_input() {
        let now = Utc::now();
        assert!(parse_stats_query(&strings(&["--granularity=weeks"]), now).is_err());
        assert!(parse_stats_query(&strings(&["--from"]), now).is_err());
        assert!(parse_stats_query(&strings(&["--from=200", "--to=100"]), now).is_err());
        assert!(parse_stats_query(&strings(&["--colour=red"]), now).is_err());
    }

    #[test]
    fn entities_render_with_resource_url() {
        let axle = Axle::connect(&Config::default()).unwrap();
        let mut key = Key::new(&axle, "acme key");
        key.qps = Some(3);
        let rendered = key_json(&key);
        assert_eq!(rendered["url"], "http://127.0.0.1:3000/v1/key/acme%20key");
        assert_eq!(rendered["qps"], 3);
        assert!(rendered["createdAt"].is_null());

        let ring = Keyring::new(&axle, "partners");
        assert_eq!(
            keyring_json(&ring)["url"],
            "http://127.0.0.1:3000/v1/keyring/partners"
        );
    }

    #[test]
    fn stats_render_as_nested_objects() {
        let at = DateTime::from_timestamp(60, 0).unwrap();
        let mut buckets = Buckets::new();
        buckets.insert(200, 4);
        let mut series = BTreeMap::new();
        series.insert(at, buckets);
        let mut stats = Stats::new();
        stats.insert(HitType::Cached, series);

        let rendered = stats_json(&stats);
        assert_eq!(rendered["cached"]["1970-01-01T00:01:00+00:00"]["200"], 4);
    }
}
