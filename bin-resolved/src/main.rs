use std::collections::HashSet;
use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dns_resolver::nameserver::DnsServer;
use dns_resolver::{RecursiveResolver, Responder, UdpServer};
use dns_types::protocol::types::{Name, Rr, RrClass};
use dns_types::zone::{DomainAuthority, ZoneStore};

// the doc comments for this struct turn into the CLI help text
#[derive(Debug, Parser)]
/// A small authoritative-plus-recursive DNS name server.
///
/// With no `--remote-ip`, resolved answers from a built-in demo zone.
/// With `--remote-ip`, it instead forwards every query to that one
/// upstream server and relays the (possibly CNAME-chased) answer.
struct Args {
    /// Port to listen on; 0 selects an OS-assigned port
    #[clap(long, value_parser, default_value_t = 0)]
    port: u16,

    /// Upstream server to forward queries to, as a literal IPv4/IPv6
    /// address or "localhost". Omit to serve the built-in demo zone.
    #[clap(long, value_parser)]
    remote_ip: Option<String>,

    /// Port to reach the upstream server on
    #[clap(long, value_parser, default_value_t = 53)]
    remote_port: u16,

    /// Do not set the recursion-desired bit on outgoing upstream
    /// queries
    #[clap(long, action(clap::ArgAction::SetTrue))]
    norec: bool,
}

fn begin_logging() {
    let log_format = if let Ok(var) = env::var("RUST_LOG_FORMAT") {
        let mut set = HashSet::new();
        for s in var.split(',') {
            set.insert(s.to_string());
        }
        set
    } else {
        HashSet::new()
    };

    let logger = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(!log_format.contains("no-ansi"));

    if log_format.contains("json") {
        if log_format.contains("no-time") {
            logger.json().without_time().init();
        } else {
            logger.json().init();
        }
    } else if log_format.contains("pretty") {
        if log_format.contains("no-time") {
            logger.pretty().without_time().init();
        } else {
            logger.pretty().init();
        }
    } else if log_format.contains("compact") {
        if log_format.contains("no-time") {
            logger.compact().without_time().init();
        } else {
            logger.compact().init();
        }
    } else if log_format.contains("no-time") {
        logger.without_time().init();
    } else {
        logger.init();
    }
}

/// Parse `--remote-ip` into a concrete address, resolving the
/// `"localhost"` literal as IPv4 loopback.
fn parse_remote_ip(text: &str) -> Result<IpAddr, std::net::AddrParseError> {
    if text == "localhost" {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    text.parse()
}

/// A small demo zone so the server answers something useful out of
/// the box when run with no `--remote-ip`.
fn demo_zone() -> ZoneStore {
    let mut zone = ZoneStore::new();

    let apex = Name::from_dotted("example.test").expect("valid demo name");
    let www = Name::from_dotted("www.example.test").expect("valid demo name");
    let mail = Name::from_dotted("mail.example.test").expect("valid demo name");

    zone.add_record(Rr::a(apex.clone(), Ipv4Addr::new(192, 0, 2, 1), 3600));
    zone.add_record(Rr::a(www.clone(), Ipv4Addr::new(192, 0, 2, 1), 3600));
    zone.add_record(Rr::aaaa(apex.clone(), Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1), 3600));
    zone.add_record(Rr::cname(
        Name::from_dotted("alias.example.test").expect("valid demo name"),
        &www,
        3600,
    ));
    zone.add_record(Rr::mx(apex.clone(), 10, &mail, 3600));
    zone.add_record(Rr::a(mail, Ipv4Addr::new(192, 0, 2, 2), 3600));

    zone.add_authority(DomainAuthority {
        domain: Name::from_dotted("delegated.example.test").expect("valid demo name"),
        name: Name::from_dotted("ns1.example.test").expect("valid demo name"),
        rclass: RrClass::In,
        ips: vec![Ipv4Addr::new(192, 0, 2, 53)],
        ttl: 3600,
    });

    zone
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    begin_logging();

    let remote = match &args.remote_ip {
        Some(text) => match parse_remote_ip(text) {
            Ok(ip) => Some(ip),
            Err(error) => {
                eprintln!("invalid --remote-ip {text:?}: {error}");
                process::exit(1);
            }
        },
        None => None,
    };

    match remote {
        Some(ip) => {
            let server = DnsServer {
                ip,
                port: args.remote_port,
                conn_method: dns_resolver::nameserver::ConnMethod::Udp,
                recursive: !args.norec,
            };
            let resolver = RecursiveResolver::new(vec![server]);
            let responder = Responder::new(resolver);
            run(args.port, responder).await;
        }
        None => {
            let zone = demo_zone();
            let responder = Responder::new(zone);
            run(args.port, responder).await;
        }
    }
}

async fn run<L>(port: u16, responder: Responder<L>)
where
    L: dns_resolver::Lookup + Send + Sync + 'static,
{
    let server = match UdpServer::new(port, responder) {
        Ok(server) => server,
        Err(error) => {
            tracing::error!(?error, "could not bind DNS UDP socket");
            process::exit(1);
        }
    };

    match server.local_addr() {
        Ok(addr) => tracing::info!(%addr, "listening"),
        Err(error) => tracing::warn!(?error, "could not read local address"),
    }

    if let Err(error) = server.run().await {
        tracing::error!(?error, "UDP receive loop exited");
        process::exit(1);
    }
}
