//! Human-readable report formatting.

use simon_core::resources::{cpu, memory};

use crate::capacity::{CapacityReport, Share};

const POD_HEADER: [&str; 7] = [
    "NodeName",
    "Pod",
    "CPU Requests",
    "CPU Limits",
    "Memory Requests",
    "Memory Limits",
    "Fake Pod",
];

const NODE_HEADER: [&str; 9] = [
    "NodeName",
    "CPU Allocatable",
    "CPU Requests",
    "CPU Limits",
    "Memory Allocatable",
    "Memory Requests",
    "Memory Limits",
    "Pod Count",
    "Fake Node",
];

pub fn format_report(report: &CapacityReport) -> String {
    let pod_rows: Vec<Vec<String>> = report
        .pods
        .iter()
        .map(|p| {
            vec![
                p.node_name.clone(),
                p.pod.clone(),
                share(p.cpu_requests()),
                share(p.cpu_limits()),
                share(p.memory_requests()),
                share(p.memory_limits()),
                flag(p.fake),
            ]
        })
        .collect();

    let node_rows: Vec<Vec<String>> = report
        .nodes
        .iter()
        .map(|n| {
            vec![
                n.name.clone(),
                cpu(&n.allocatable).to_string(),
                share(n.cpu_requests()),
                share(n.cpu_limits()),
                memory(&n.allocatable).to_string(),
                share(n.memory_requests()),
                share(n.memory_limits()),
                n.pod_count.to_string(),
                flag(n.fake),
            ]
        })
        .collect();

    let mut out = String::new();
    out.push_str("Pod Info\n");
    out.push_str(&render_table(&POD_HEADER, &pod_rows));
    out.push('\n');
    out.push_str("Node Info\n");
    out.push_str(&render_table(&NODE_HEADER, &node_rows));
    out
}

/// `<quantity>(<integer percent>%)`
fn share(s: Share) -> String {
    format!("{}({}%)", s.amount, s.percent as i64)
}

fn flag(fake: bool) -> String {
    if fake { "√".to_string() } else { String::new() }
}

fn render_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let separator = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };

    let mut out = separator.clone();
    out.push_str(&render_row(header.iter().copied(), &widths));
    out.push_str(&separator);
    for row in rows {
        out.push_str(&render_row(row.iter().map(String::as_str), &widths));
        out.push_str(&separator);
    }
    out
}

fn render_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (cell, width) in cells.zip(widths) {
        let pad = width - cell.chars().count();
        line.push_str(&format!(" {cell}{} |", " ".repeat(pad)));
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use simon_core::constants::ANNO_FAKE;
    use simon_core::{Container, Node, ObjectMeta, Pod, Quantity};

    fn sample_report() -> CapacityReport {
        let mut node = Node::default();
        node.metadata.name = "simon-00".into();
        node.metadata.annotations.insert(ANNO_FAKE.into(), String::new());
        node.status
            .allocatable
            .insert("cpu".into(), Quantity::from_value(2));
        node.status
            .allocatable
            .insert("memory".into(), Quantity::from_value(4 << 30));

        let mut pod = Pod::default();
        pod.metadata = ObjectMeta::named("prod", "web-0");
        pod.spec.node_name = Some("simon-00".into());
        let mut container = Container {
            name: "c".into(),
            image: "img".into(),
            ..Container::default()
        };
        container
            .resources
            .requests
            .insert("cpu".into(), Quantity::from_milli(500));
        container
            .resources
            .requests
            .insert("memory".into(), Quantity::from_value(1 << 30));
        pod.spec.containers.push(container);

        CapacityReport::from_objects(&[node], &[pod])
    }

    #[test]
    fn renders_both_tables() {
        let text = format_report(&sample_report());
        assert!(text.starts_with("Pod Info\n"));
        assert!(text.contains("\nNode Info\n"));
        assert!(text.contains("| prod/web-0 "));
        assert!(text.contains("500m(25%)"));
        assert!(text.contains("1Gi(25%)"));
        assert!(text.contains("| Pod Count |"));
        assert!(text.contains("√"));
    }

    #[test]
    fn rows_line_up_with_header() {
        let text = format_report(&sample_report());
        let pod_table: Vec<&str> = text
            .lines()
            .skip(1)
            .take_while(|l| !l.is_empty())
            .collect();
        let width = pod_table[0].chars().count();
        assert!(pod_table.iter().all(|l| l.chars().count() == width));
    }

    #[test]
    fn empty_report_still_has_headers() {
        let text = format_report(&CapacityReport::default());
        assert!(text.contains("| NodeName | Pod |"));
        assert!(text.contains("| Fake Node |"));
    }
}
