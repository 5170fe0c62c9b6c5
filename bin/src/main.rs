use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use te_sdn_qos_routing::{QosRoutingListener, QosRoutingManager, RoutingEvent};
use te_sdn_stats::{format_ratio, RouteWeigher};
use te_sdn_topology::TopologyGraph;
use te_sdn_utils::{SystemTimer, Timer};

use crate::scenario::{Scenario, ScenarioError};

mod scenario;

/// Replays a topology and statistics scenario through the routing core and prints the resulting routes
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario file (json)
    #[arg(env, short, long)]
    scenario: PathBuf,

    /// Route selection strategy, overrides the scenario config
    #[arg(env, long)]
    strategy: Option<RouteWeigher>,

    /// Number of alternate routes, overrides the scenario config
    #[arg(env, long)]
    max_alternate_routes: Option<usize>,

    /// Print alternate routes of every connection
    #[arg(env, long)]
    alternates: bool,

    /// Print every simple route of every connection
    #[arg(env, long)]
    all_routes: bool,
}

struct EventLogger;

impl QosRoutingListener for EventLogger {
    fn on_routing_event(&self, event: &RoutingEvent) {
        match event {
            RoutingEvent::ConnectionRegistered(conn) => log::info!("[Standalone] registered {}", conn),
            RoutingEvent::ConnectionUnregistered { connection, .. } => log::info!("[Standalone] unregistered {}", connection),
            RoutingEvent::RouteInstalled(route) => log::info!("[Standalone] install {}", route),
            RoutingEvent::RouteReplacing { old, new } => log::info!("[Standalone] replace {:x} by {}", old.path_id(), new),
            RoutingEvent::RouteStatsUpdated(route) => log::debug!("[Standalone] stats of {}", route),
            RoutingEvent::RouteRemoved { connection, old } => log::info!("[Standalone] remove {:x} of {}", old.path_id(), connection),
        }
    }
}

fn run(args: Args) -> Result<(), ScenarioError> {
    let mut scenario = Scenario::load(&args.scenario)?;
    if let Some(strategy) = args.strategy {
        scenario.config.strategy = strategy;
    }
    if let Some(max) = args.max_alternate_routes {
        scenario.config.max_alternate_routes = max;
    }

    let topology = TopologyGraph::new();
    let manager = QosRoutingManager::new(scenario.config.clone());
    manager.attach(&topology);
    manager.add_listener(Arc::new(EventLogger));
    scenario.replay(&topology, &manager, SystemTimer().now_ms())?;

    let snapshot = topology.snapshot();
    println!("topology: {} nodes, {} links, {} disabled", snapshot.graph().node_count(), snapshot.graph().link_count(), snapshot.disabled_links().len());
    println!("strategy: {}", scenario.config.strategy);
    for connection in manager.registered_connections() {
        println!();
        match manager.active_route(&connection) {
            Some(route) => println!("{}", route.to_pretty_string()),
            None => println!("{}: no route", connection),
        }
        if args.alternates {
            for (i, route) in manager.alternate_routes(&connection)?.iter().enumerate() {
                println!("  alternate #{} weight {:.3} utilization {}: {}", i, route.weight(), route.data_utilization().value().map(format_ratio).unwrap_or_else(|| "n/a".to_string()), route.datapath_path());
            }
        }
        if args.all_routes {
            let routes = manager.all_routes(&connection)?;
            println!("  {} simple routes", routes.len());
            for route in routes {
                println!("  weight {:.3}: {}", route.weight(), route.datapath_path());
            }
        }
    }
    Ok(())
}

fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    if let Err(e) = run(args) {
        log::error!("[Standalone] {}", e);
        std::process::exit(1);
    }
}
