//! Knowledge graph of a finished crawl

use super::PageResult;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Referenced but never crawled (link targets, form actions, redirect hops)
    Resource,
    /// API endpoint called by a page
    Api,
    /// Crawled page
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Hyperlink,
    FormAction,
    ApiCall,
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub url: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStatistics {
    pub total_nodes: usize,
    pub total_edges: usize,
}

/// Typed node/edge view of a crawl
///
/// Nodes are keyed by URL. When the same URL is added under several types the
/// most specific wins: page over api over resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KnowledgeGraph {
    nodes: BTreeMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
    statistics: GraphStatistics,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: GraphNode) {
        match self.nodes.get(&node.url) {
            Some(existing) if existing.node_type >= node.node_type => {}
            _ => {
                self.nodes.insert(node.url.clone(), node);
            }
        }
        self.statistics.total_nodes = self.nodes.len();
    }

    pub fn add_edge(&mut self, edge: GraphEdge) {
        self.edges.push(edge);
        self.statistics.total_edges = self.edges.len();
    }

    pub fn node(&self, url: &str) -> Option<&GraphNode> {
        self.nodes.get(url)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn statistics(&self) -> GraphStatistics {
        self.statistics
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds a [`KnowledgeGraph`] from crawled pages in one pass
pub struct GraphBuilder;

impl GraphBuilder {
    pub fn build(pages: &[PageResult]) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();

        for page in pages {
            graph.add_node(GraphNode {
                url: page.url.clone(),
                node_type: NodeType::Page,
                metadata: json!({
                    "status_code": page.status,
                    "title": page.title,
                    "depth": page.depth,
                }),
            });

            for link in &page.links {
                add_resource(&mut graph, link);
                graph.add_edge(edge(&page.url, link, EdgeType::Hyperlink));
            }

            for form in &page.forms {
                add_resource(&mut graph, &form.action);
                graph.add_edge(edge(&page.url, &form.action, EdgeType::FormAction));
            }

            for endpoint in &page.api_endpoints {
                graph.add_node(GraphNode {
                    url: endpoint.url.clone(),
                    node_type: NodeType::Api,
                    metadata: json!({
                        "method": endpoint.method,
                        "source": endpoint.source,
                    }),
                });
                graph.add_edge(edge(&page.url, &endpoint.url, EdgeType::ApiCall));
            }

            for hop in page.redirect_chain.windows(2) {
                add_resource(&mut graph, &hop[0]);
                add_resource(&mut graph, &hop[1]);
                graph.add_edge(edge(&hop[0], &hop[1], EdgeType::Redirect));
            }
        }

        graph
    }
}

fn add_resource(graph: &mut KnowledgeGraph, url: &str) {
    graph.add_node(GraphNode {
        url: url.to_string(),
        node_type: NodeType::Resource,
        metadata: json!({}),
    });
}

fn edge(source: &str, target: &str, edge_type: EdgeType) -> GraphEdge {
    GraphEdge {
        source: source.to_string(),
        target: target.to_string(),
        edge_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{EndpointInfo, EndpointSource, FormData};

    fn page(url: &str, depth: u32, links: &[&str]) -> PageResult {
        let mut page = PageResult::new(url, 200, depth, None);
        page.links = links.iter().map(|l| l.to_string()).collect();
        page
    }

    #[test]
    fn test_empty_graph() {
        let graph = GraphBuilder::build(&[]);
        assert_eq!(graph.statistics(), GraphStatistics::default());
    }

    #[test]
    fn test_pages_deduplicated_by_url() {
        let pages = [
            page("https://a.com/", 0, &["https://a.com/about"]),
            page("https://a.com/about", 1, &["https://a.com/"]),
        ];
        let graph = GraphBuilder::build(&pages);

        assert_eq!(graph.statistics().total_nodes, 2);
        assert_eq!(graph.statistics().total_edges, 2);
        // Seen first as a link target, then upgraded when crawled
        assert_eq!(graph.node("https://a.com/about").unwrap().node_type, NodeType::Page);
        assert_eq!(graph.node("https://a.com/about").unwrap().metadata["depth"], 1);
    }

    #[test]
    fn test_uncrawled_link_is_resource() {
        let graph = GraphBuilder::build(&[page("https://a.com/", 0, &["https://a.com/file.pdf"])]);
        assert_eq!(
            graph.node("https://a.com/file.pdf").unwrap().node_type,
            NodeType::Resource
        );
        assert_eq!(graph.edges()[0].edge_type, EdgeType::Hyperlink);
    }

    #[test]
    fn test_forms_endpoints_and_redirects() {
        let mut root = page("https://a.com/old", 0, &[]);
        root.forms.push(FormData {
            action: "https://a.com/login".to_string(),
            method: "POST".to_string(),
            inputs: Vec::new(),
            has_file_upload: false,
        });
        root.api_endpoints.push(EndpointInfo {
            url: "https://a.com/api/users".to_string(),
            method: "GET".to_string(),
            source: EndpointSource::NetworkXhr,
        });
        root.redirect_chain = vec!["https://a.com/old".to_string(), "https://a.com/new".to_string()];

        let graph = GraphBuilder::build(&[root]);
        let types: Vec<EdgeType> = graph.edges().iter().map(|e| e.edge_type).collect();
        assert_eq!(types, [EdgeType::FormAction, EdgeType::ApiCall, EdgeType::Redirect]);

        let api = graph.node("https://a.com/api/users").unwrap();
        assert_eq!(api.node_type, NodeType::Api);
        assert_eq!(api.metadata["method"], "GET");
        assert_eq!(api.metadata["source"], "network_xhr");

        assert_eq!(graph.node("https://a.com/old").unwrap().node_type, NodeType::Page);
        assert_eq!(graph.node("https://a.com/new").unwrap().node_type, NodeType::Resource);
    }

    #[test]
    fn test_json_shape() {
        let graph = GraphBuilder::build(&[page("https://a.com/", 0, &["https://a.com/x"])]);
        let value: Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
        assert!(value["nodes"].is_object());
        assert!(value["edges"].is_array());
        assert_eq!(value["statistics"]["total_nodes"], 2);
        assert_eq!(value["nodes"]["https://a.com/"]["type"], "page");
    }
}
