//! Command line definition.
//!
//! Flags mirror the config fields; every flag is optional so the layering
//! in `cli::execute` can tell "not given" from "given the default".

use clap::{Arg, Command};

pub fn make_app() -> Command {
    Command::new("outpost")
        .about("Two-sided runtime-metrics pipeline")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .value_name("PATH")
                .help("Path to the JSON config file"),
        )
        .subcommand(
            Command::new("server")
                .about("Run the ingestion server")
                .arg(
                    Arg::new("address")
                        .short('a')
                        .long("address")
                        .value_name("HOST:PORT")
                        .help("Bind address of the HTTP server"),
                )
                .arg(
                    Arg::new("grpc_address")
                        .short('g')
                        .long("grpc-address")
                        .value_name("HOST:PORT")
                        .help("Bind address of the gRPC server (empty disables it)"),
                )
                .arg(
                    Arg::new("level")
                        .short('l')
                        .long("level")
                        .value_name("LEVEL")
                        .help("Log level"),
                )
                .arg(
                    Arg::new("store_interval")
                        .short('i')
                        .long("store-interval")
                        .value_name("SECONDS")
                        .help("Seconds between snapshot flushes"),
                )
                .arg(
                    Arg::new("file_path")
                        .short('f')
                        .long("file-path")
                        .value_name("PATH")
                        .help("Snapshot file (empty keeps metrics in memory)"),
                )
                .arg(
                    Arg::new("restore")
                        .short('r')
                        .long("restore")
                        .value_name("BOOL")
                        .help("Restore the last snapshot on startup"),
                )
                .arg(
                    Arg::new("database_dsn")
                        .short('d')
                        .long("database-dsn")
                        .value_name("DSN")
                        .help("Postgres DSN (takes precedence over the file)"),
                )
                .arg(
                    Arg::new("hash_key")
                        .short('k')
                        .long("hash-key")
                        .value_name("KEY")
                        .help("Shared secret for payload hashes (empty disables)"),
                )
                .arg(
                    Arg::new("crypto_key")
                        .short('y')
                        .long("crypto-key")
                        .value_name("PATH")
                        .help("PEM file with the RSA private key (empty disables)"),
                )
                .arg(
                    Arg::new("trusted_subnet")
                        .short('t')
                        .long("trusted-subnet")
                        .value_name("CIDR")
                        .help("Only accept requests from this subnet (empty disables)"),
                ),
        )
        .subcommand(
            Command::new("agent")
                .about("Run the collection agent")
                .arg(
                    Arg::new("address")
                        .short('a')
                        .long("address")
                        .value_name("HOST:PORT")
                        .help("Address of the ingestion server"),
                )
                .arg(
                    Arg::new("grpc_address")
                        .short('g')
                        .long("grpc-address")
                        .value_name("HOST:PORT")
                        .help("Ship over gRPC to this address instead of HTTP"),
                )
                .arg(
                    Arg::new("hash_key")
                        .short('k')
                        .long("hash-key")
                        .value_name("KEY")
                        .help("Shared secret for payload hashes (empty disables)"),
                )
                .arg(
                    Arg::new("crypto_key")
                        .short('y')
                        .long("crypto-key")
                        .value_name("PATH")
                        .help("PEM file with the RSA public key (empty disables)"),
                )
                .arg(
                    Arg::new("report_interval")
                        .short('r')
                        .long("report-interval")
                        .value_name("SECONDS")
                        .help("Seconds between shipments"),
                )
                .arg(
                    Arg::new("poll_interval")
                        .short('p')
                        .long("poll-interval")
                        .value_name("SECONDS")
                        .help("Seconds between samples"),
                )
                .arg(
                    Arg::new("rate_limit")
                        .short('l')
                        .long("rate-limit")
                        .value_name("WORKERS")
                        .help("Number of shipper workers"),
                )
                .arg(
                    Arg::new("level")
                        .long("level")
                        .value_name("LEVEL")
                        .help("Log level"),
                ),
        )
}
