//! Condensing of identical per-node output.
//!
//! Dispatch output lines look like `node3: up 12 days`. On a healthy
//! cluster most nodes print exactly the same thing, and the one node that
//! differs drowns in the repetition. Aggregation groups nodes whose output
//! is byte-identical and emits the block once under a combined
//! `node1,node2:` header.

/// Aggregate `node: text` lines.
///
/// Lines without a `node:` prefix pass through first, in input order; then
/// one block per distinct output, nodes sorted by name within and across
/// blocks.
pub fn aggregate(lines: &[String]) -> Vec<String> {
    let mut per_node: std::collections::HashMap<String, Vec<String>> =
        std::collections::HashMap::new();
    let mut out = Vec::new();
    for line in lines {
        match line.split_once(": ") {
            Some((node, text)) if !node.is_empty() && !node.contains(char::is_whitespace) => {
                per_node
                    .entry(node.to_string())
                    .or_default()
                    .push(text.to_string());
            }
            _ => out.push(line.clone()),
        }
    }
    let mut nodes: Vec<String> = per_node.keys().cloned().collect();
    nodes.sort();
    while let Some(node) = nodes.first().cloned() {
        nodes.remove(0);
        let body = per_node[&node].clone();
        let mut alike = vec![node];
        nodes.retain(|other| {
            if per_node[other] == body {
                alike.push(other.clone());
                false
            } else {
                true
            }
        });
        out.push(format!("{}:", alike.join(",")));
        out.extend(body);
    }
    out
}
