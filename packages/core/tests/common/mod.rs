//! Shared fixtures for the integration tests

#![allow(dead_code)]

use anyhow::Result;
use hierarchy_core::db::MemoryStore;
use hierarchy_core::models::{Node, NodeId, Row};
use hierarchy_core::services::{Forest, Registry};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber (`RUST_LOG=hierarchy_core=debug` to see cascades)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Register `record_type` in an isolated registry and bind it to `store`
pub fn forest<'s>(store: &'s MemoryStore, record_type: &str, options: Value) -> Result<Forest<'s>> {
    init_tracing();
    let registry = Registry::new();
    registry.register_json(record_type, options)?;
    Ok(registry.forest(record_type, store)?)
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("fixture must be an object"),
    }
}

pub fn ids(nodes: &[Node]) -> Vec<NodeId> {
    nodes.iter().filter_map(|node| node.id("id")).collect()
}

pub fn id(node: &Node) -> NodeId {
    node.id("id").expect("fixture nodes are saved")
}

/// The tree shared by the strategy suites
///
/// ```text
/// root (1)           root_2 (2)       root_3 (3, site 1)
/// ├─ child (4)       └─ child_3 (6)
/// │  └─ sub_child (7)
/// └─ child_2 (5)
/// ```
pub struct Fixture {
    pub root: Node,
    pub root_2: Node,
    pub root_3: Node,
    pub child: Node,
    pub child_2: Node,
    pub child_3: Node,
    pub sub_child: Node,
}

impl Fixture {
    pub fn build(forest: &Forest<'_>) -> Result<Self> {
        let create = |parent: Option<&Node>| -> Result<Node> {
            let mut node = Node::new();
            if let Some(parent) = parent {
                node.set("parent_id", id(parent));
            }
            Ok(forest.create(node)?)
        };

        let root = create(None)?;
        let root_2 = create(None)?;
        let root_3 = forest.create(Node::new().with("site_id", 1))?;
        let child = create(Some(&root))?;
        let child_2 = create(Some(&root))?;
        let child_3 = create(Some(&root_2))?;
        let sub_child = create(Some(&child))?;

        let mut fixture = Self {
            root,
            root_2,
            root_3,
            child,
            child_2,
            child_3,
            sub_child,
        };
        fixture.reload(forest)?;
        Ok(fixture)
    }

    /// Re-read every node (cascades rewrite rows behind the in-memory copies)
    pub fn reload(&mut self, forest: &Forest<'_>) -> Result<()> {
        for node in [
            &mut self.root,
            &mut self.root_2,
            &mut self.root_3,
            &mut self.child,
            &mut self.child_2,
            &mut self.child_3,
            &mut self.sub_child,
        ] {
            forest.reload(node)?;
        }
        Ok(())
    }
}
