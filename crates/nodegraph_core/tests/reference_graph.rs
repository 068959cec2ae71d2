use nodegraph_core::db::open_db_in_memory;
use nodegraph_core::{
    Caller, EdgeChange, EntityKind, GraphConfig, GraphError, GraphService, NewNode, Node, NodeId,
    NodePatch, NodeType, QueryService, SelfReferencePolicy,
};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn create(service: &GraphService<'_>, title: &str) -> NodeId {
    service
        .create_node(&Caller::Anonymous, NewNode::new(NodeType::Note, title))
        .unwrap()
        .id
}

/// Checks reference symmetry, parent/children agreement and tree acyclicity.
fn assert_graph_consistent(conn: &Connection) {
    let nodes = QueryService::new(conn).list_nodes().unwrap();
    let by_id: HashMap<NodeId, &Node> = nodes.iter().map(|node| (node.id, node)).collect();

    for node in &nodes {
        assert_unique(&node.references);
        assert_unique(&node.referenced_by);
        assert_unique(&node.children);

        for target in &node.references {
            let target = by_id.get(target).expect("reference target exists");
            assert!(
                target.referenced_by.contains(&node.id),
                "{} -> {} missing backlink",
                node.id,
                target.id
            );
        }
        for source in &node.referenced_by {
            let source = by_id.get(source).expect("backlink source exists");
            assert!(
                source.references.contains(&node.id),
                "backlink {} <- {} without reference",
                node.id,
                source.id
            );
        }
        if let Some(parent) = node.parent {
            let parent = by_id.get(&parent).expect("parent exists");
            assert!(parent.children.contains(&node.id));
        }
        for child in &node.children {
            assert_eq!(by_id.get(child).expect("child exists").parent, Some(node.id));
        }

        let mut seen = HashSet::from([node.id]);
        let mut cursor = node.parent;
        while let Some(current) = cursor {
            assert!(seen.insert(current), "parent cycle through {current}");
            cursor = by_id[&current].parent;
        }
    }
}

fn assert_unique(ids: &[NodeId]) {
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len(), "duplicate ids in {ids:?}");
}

#[test]
fn add_reference_links_both_sides_once() {
    let conn = setup();
    let service = GraphService::try_new(&conn, GraphConfig::default()).unwrap();
    let query = QueryService::new(&conn);
    let alpha = create(&service, "Alpha");
    let beta = create(&service, "Beta");
    let caller = Caller::user("u-1");

    assert_eq!(
        service.add_reference(&caller, alpha, beta).unwrap(),
        EdgeChange::Applied
    );
    assert_eq!(
        service.add_reference(&caller, alpha, beta).unwrap(),
        EdgeChange::Unchanged
    );

    assert_eq!(query.get_node(alpha).unwrap().references, vec![beta]);
    assert_eq!(query.get_node(beta).unwrap().referenced_by, vec![alpha]);
    assert!(query.get_node(alpha).unwrap().referenced_by.is_empty());
    let backlinks = query.backlinks_of(beta).unwrap();
    assert_eq!(backlinks.len(), 1);
    assert_eq!(backlinks[0].title, "Alpha");
    assert_graph_consistent(&conn);
}

#[test]
fn remove_reference_is_idempotent() {
    let conn = setup();
    let service = GraphService::try_new(&conn, GraphConfig::default()).unwrap();
    let query = QueryService::new(&conn);
    let a = create(&service, "A");
    let b = create(&service, "B");
    let caller = Caller::Anonymous;

    assert_eq!(
        service.remove_reference(&caller, a, b).unwrap(),
        EdgeChange::Unchanged
    );
    service.add_reference(&caller, a, b).unwrap();
    service.add_reference(&caller, b, a).unwrap();
    assert!(service.remove_reference(&caller, a, b).unwrap().is_applied());
    assert_eq!(
        service.remove_reference(&caller, a, b).unwrap(),
        EdgeChange::Unchanged
    );

    let a_node = query.get_node(a).unwrap();
    let b_node = query.get_node(b).unwrap();
    assert!(a_node.references.is_empty());
    assert_eq!(a_node.referenced_by, vec![b]);
    assert_eq!(b_node.references, vec![a]);
    assert!(b_node.referenced_by.is_empty());
    assert_graph_consistent(&conn);
}

#[test]
fn deleting_referenced_node_clears_backlinks() {
    let conn = setup();
    let service = GraphService::try_new(&conn, GraphConfig::default()).unwrap();
    let query = QueryService::new(&conn);
    let caller = Caller::user("u-1");
    let alpha = create(&service, "Alpha");
    let beta = create(&service, "Beta");

    service.add_reference(&caller, alpha, beta).unwrap();
    assert_eq!(query.get_node(beta).unwrap().referenced_by, vec![alpha]);

    assert!(service.delete_node(&caller, beta).unwrap());

    assert!(query.get_node(alpha).unwrap().references.is_empty());
    match query.get_node(beta) {
        Err(GraphError::NotFound { kind, id }) => {
            assert_eq!(kind, EntityKind::Node);
            assert_eq!(id, beta);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_graph_consistent(&conn);
}

#[test]
fn deleting_parent_orphans_children_and_detaches_from_grandparent() {
    let conn = setup();
    let service = GraphService::try_new(&conn, GraphConfig::default()).unwrap();
    let query = QueryService::new(&conn);
    let caller = Caller::Anonymous;
    let root = create(&service, "Root");
    let middle = service
        .create_node(
            &caller,
            NewNode::new(NodeType::Collection, "Middle").with_parent(root),
        )
        .unwrap()
        .id;
    let leaf = service
        .create_node(&caller, NewNode::new(NodeType::Note, "Leaf").with_parent(middle))
        .unwrap()
        .id;
    service.add_reference(&caller, leaf, middle).unwrap();
    service.add_reference(&caller, middle, root).unwrap();

    service.delete_node(&caller, middle).unwrap();

    let root_node = query.get_node(root).unwrap();
    let leaf_node = query.get_node(leaf).unwrap();
    assert!(root_node.children.is_empty());
    assert!(root_node.referenced_by.is_empty());
    assert_eq!(leaf_node.parent, None);
    assert!(leaf_node.references.is_empty());
    assert_eq!(query.list_nodes().unwrap().len(), 2);
    assert_graph_consistent(&conn);
}

#[test]
fn delete_missing_node_is_not_found() {
    let conn = setup();
    let service = GraphService::try_new(&conn, GraphConfig::default()).unwrap();

    let missing = Uuid::new_v4();
    assert!(matches!(
        service.delete_node(&Caller::Anonymous, missing),
        Err(GraphError::NotFound { id, .. }) if id == missing
    ));
}

#[test]
fn reparent_rejects_cycles_and_leaves_tree_unchanged() {
    let conn = setup();
    let service = GraphService::try_new(&conn, GraphConfig::default()).unwrap();
    let query = QueryService::new(&conn);
    let caller = Caller::Anonymous;
    let a = create(&service, "A");
    let b = create(&service, "B");
    let c = create(&service, "C");
    service.reparent(&caller, b, Some(a)).unwrap();
    service.reparent(&caller, c, Some(b)).unwrap();
    let before = query.list_nodes().unwrap();

    assert!(matches!(
        service.reparent(&caller, a, Some(c)),
        Err(GraphError::Cycle { node, parent }) if node == a && parent == c
    ));
    assert!(matches!(
        service.reparent(&caller, a, Some(a)),
        Err(GraphError::Cycle { .. })
    ));
    assert!(matches!(
        service.update_node(
            &caller,
            b,
            NodePatch {
                title: Some("B renamed".to_string()),
                parent: Some(Some(c)),
                ..NodePatch::default()
            },
        ),
        Err(GraphError::Cycle { .. })
    ));

    assert_eq!(query.list_nodes().unwrap(), before);
    assert_graph_consistent(&conn);
}

#[test]
fn reparent_moves_child_between_parents_in_attachment_order() {
    let conn = setup();
    let service = GraphService::try_new(&conn, GraphConfig::default()).unwrap();
    let query = QueryService::new(&conn);
    let caller = Caller::Anonymous;
    let first = create(&service, "First");
    let second = create(&service, "Second");
    let x = create(&service, "X");
    let y = create(&service, "Y");

    service.reparent(&caller, x, Some(first)).unwrap();
    service.reparent(&caller, y, Some(first)).unwrap();
    assert_eq!(query.get_node(first).unwrap().children, vec![x, y]);
    assert_eq!(
        service.reparent(&caller, x, Some(first)).unwrap(),
        EdgeChange::Unchanged
    );

    service.reparent(&caller, x, Some(second)).unwrap();
    assert_eq!(query.get_node(first).unwrap().children, vec![y]);
    assert_eq!(query.get_node(second).unwrap().children, vec![x]);
    assert_eq!(query.get_node(x).unwrap().parent, Some(second));
    let children: Vec<_> = query
        .children_of(second)
        .unwrap()
        .into_iter()
        .map(|node| node.title)
        .collect();
    assert_eq!(children, vec!["X".to_string()]);

    service.reparent(&caller, x, None).unwrap();
    assert!(query.get_node(second).unwrap().children.is_empty());
    assert_eq!(query.get_node(x).unwrap().parent, None);
    assert_graph_consistent(&conn);
}

#[test]
fn self_reference_allowed_by_default() {
    let conn = setup();
    let service = GraphService::try_new(&conn, GraphConfig::default()).unwrap();
    let query = QueryService::new(&conn);
    let a = create(&service, "Loop");

    service.add_reference(&Caller::Anonymous, a, a).unwrap();
    let node = query.get_node(a).unwrap();
    assert_eq!(node.references, vec![a]);
    assert_eq!(node.referenced_by, vec![a]);
    assert_graph_consistent(&conn);

    service.remove_reference(&Caller::Anonymous, a, a).unwrap();
    let node = query.get_node(a).unwrap();
    assert!(node.references.is_empty());
    assert!(node.referenced_by.is_empty());
}

#[test]
fn self_reference_rejected_under_reject_policy() {
    let conn = setup();
    let config = GraphConfig {
        self_references: SelfReferencePolicy::Reject,
        ..GraphConfig::default()
    };
    let service = GraphService::try_new(&conn, config).unwrap();
    let a = create(&service, "Loop");

    assert!(matches!(
        service.add_reference(&Caller::Anonymous, a, a),
        Err(GraphError::Validation(_))
    ));
    assert!(QueryService::new(&conn)
        .get_node(a)
        .unwrap()
        .references
        .is_empty());
}

#[test]
fn edges_to_missing_nodes_fail_without_writes() {
    let conn = setup();
    let service = GraphService::try_new(&conn, GraphConfig::default()).unwrap();
    let query = QueryService::new(&conn);
    let a = create(&service, "A");
    let before = query.get_node(a).unwrap();
    let ghost = Uuid::new_v4();

    assert!(matches!(
        service.add_reference(&Caller::Anonymous, a, ghost),
        Err(GraphError::NotFound { id, .. }) if id == ghost
    ));
    assert!(matches!(
        service.remove_reference(&Caller::Anonymous, ghost, a),
        Err(GraphError::NotFound { .. })
    ));
    assert!(matches!(
        service.reparent(&Caller::Anonymous, a, Some(ghost)),
        Err(GraphError::NotFound { .. })
    ));
    assert!(matches!(
        service.create_node(
            &Caller::Anonymous,
            NewNode::new(NodeType::Note, "orphan").with_parent(ghost)
        ),
        Err(GraphError::NotFound { .. })
    ));

    assert_eq!(query.get_node(a).unwrap(), before);
    assert_eq!(query.list_nodes().unwrap().len(), 1);
}

#[test]
fn edge_changes_refresh_updated_at_but_not_created_at() {
    let conn = setup();
    let service = GraphService::try_new(&conn, GraphConfig::default()).unwrap();
    let query = QueryService::new(&conn);
    let a = create(&service, "A");
    let b = create(&service, "B");
    let before = query.get_node(b).unwrap();

    service.add_reference(&Caller::Anonymous, a, b).unwrap();

    let after = query.get_node(b).unwrap();
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at >= before.updated_at);
}

#[test]
fn mixed_operation_sequence_keeps_graph_consistent() {
    let conn = setup();
    let service = GraphService::try_new(&conn, GraphConfig::default()).unwrap();
    let caller = Caller::user("fuzz");
    let mut ids: Vec<NodeId> = (0..8).map(|i| create(&service, &format!("n{i}"))).collect();

    // Deterministic linear congruential sequence.
    let mut state: u64 = 0x5eed;
    let mut next = |bound: usize| {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((state >> 33) as usize) % bound
    };

    for step in 0..200 {
        let a = ids[next(ids.len())];
        let b = ids[next(ids.len())];
        let outcome = match next(6) {
            0 | 1 => service.add_reference(&caller, a, b).map(|_| ()),
            2 => service.remove_reference(&caller, a, b).map(|_| ()),
            3 => service.reparent(&caller, a, Some(b)).map(|_| ()),
            4 => service.reparent(&caller, a, None).map(|_| ()),
            _ => {
                if ids.len() > 3 {
                    ids.retain(|id| *id != a);
                    service.delete_node(&caller, a).map(|_| ())
                } else {
                    ids.push(create(&service, &format!("extra{step}")));
                    Ok(())
                }
            }
        };
        match outcome {
            Ok(()) | Err(GraphError::Cycle { .. }) => {}
            Err(err) => panic!("step {step} failed: {err}"),
        }
        assert_graph_consistent(&conn);
    }
}
