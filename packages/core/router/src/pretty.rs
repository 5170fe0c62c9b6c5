use te_sdn_identity::DatapathHop;
use te_sdn_stats::{format_ratio, FlowedLinkStats, InfoRate, Stat};

use crate::FlowedRoute;

const HEAVY_RULE: &str = "================================================================================";
const LIGHT_RULE: &str = "--------------------------------------------------------------------------------";
const LINK_ARROW: &str = "---------------> ";

fn stat_line<V>(stat: &Stat<Option<V>>, fmt: impl Fn(&V) -> String) -> String {
    match stat.value() {
        Some(value) => format!("{} ({})", fmt(value), stat.kind()),
        None => format!("n/a ({})", stat.kind()),
    }
}

fn latency_line(stat: &Stat<Option<f64>>) -> String {
    stat_line(stat, |ms| format!("{:.3} ms", ms))
}

fn ratio_line(stat: &Stat<Option<f64>>) -> String {
    stat_line(stat, |r| format_ratio(*r))
}

fn rate_line(stat: &Stat<Option<InfoRate>>) -> String {
    stat_line(stat, |rate| rate.to_string())
}

fn hop_column(hop: &DatapathHop) -> Vec<String> {
    vec![String::new(), String::new(), String::new(), format!("{} ", hop)]
}

fn link_column(stats: &FlowedLinkStats) -> Vec<String> {
    vec![latency_line(&stats.mean_latency()), ratio_line(&stats.mean_byte_loss()), rate_line(stats.throughput()), LINK_ARROW.to_string()]
}

/// Hops and links side by side, each link column showing latency, loss and throughput above an arrow
fn path_diagram(route: &FlowedRoute) -> String {
    let hops = route.datapath_path().hops();
    if route.number_of_links() == 0 {
        return hops.iter().map(|h| h.to_string()).collect::<Vec<_>>().join("");
    }

    let mut columns = Vec::with_capacity(hops.len() + route.number_of_links());
    for (hop, stats) in hops.iter().zip(route.link_stats()) {
        columns.push(hop_column(hop));
        columns.push(link_column(stats));
    }
    if let Some(last) = hops.last() {
        columns.push(hop_column(last));
    }

    let widths: Vec<usize> = columns.iter().map(|c| c.iter().map(|cell| cell.chars().count()).max().unwrap_or(0)).collect();
    let rows = columns.first().map(|c| c.len()).unwrap_or(0);
    let mut out = String::new();
    for row in 0..rows {
        for (column, width) in columns.iter().zip(widths.iter()) {
            out.push_str(&format!("{:<width$}", column[row], width = width));
        }
        out.push('\n');
    }
    out
}

impl FlowedRoute {
    /// Multi-line rendering for operators: a header with the aggregates followed by the path diagram
    pub fn to_pretty_string(&self) -> String {
        let lines = [
            "===================== Flowed-route =============================================".to_string(),
            format!("Path ID             : {:x}", self.path_id()),
            format!("Flow                : {}", self.flow()),
            format!("Connection          : {}", self.connection().connection),
            format!("Weight              : {:.3}", self.weight()),
            LIGHT_RULE.to_string(),
            format!("Latency             : {}", latency_line(self.latency())),
            format!("Byte loss           : {}", ratio_line(self.byte_loss())),
            format!("Throughput          : {}", rate_line(self.throughput())),
            format!("Data capacity       : {}", rate_line(self.data_capacity())),
            format!("Available bandwidth : {}", rate_line(&self.available_bandwidth())),
            format!("Data utilization    : {}", ratio_line(&self.data_utilization())),
            LIGHT_RULE.to_string(),
            path_diagram(self),
            HEAVY_RULE.to_string(),
        ];
        lines.join("\n")
    }
}
