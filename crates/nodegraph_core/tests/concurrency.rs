use nodegraph_core::db::open_db;
use nodegraph_core::{
    Caller, GraphConfig, GraphService, NewNode, NewTask, NodeId, NodeType, QueryService,
};
use std::collections::HashMap;
use std::thread;

#[test]
fn two_connections_writing_concurrently_keep_references_symmetric() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let seed_conn = open_db(&path).unwrap();
    let seed = GraphService::try_new(&seed_conn, GraphConfig::default()).unwrap();
    let ids: Vec<NodeId> = (0..6)
        .map(|i| {
            seed.create_node(&Caller::Anonymous, NewNode::new(NodeType::Note, format!("n{i}")))
                .unwrap()
                .id
        })
        .collect();

    let writer_a = open_db(&path).unwrap();
    let writer_b = open_db(&path).unwrap();

    thread::scope(|scope| {
        let ids_a = ids.clone();
        scope.spawn(move || {
            let service = GraphService::try_new(&writer_a, GraphConfig::default()).unwrap();
            let caller = Caller::user("writer-a");
            for round in 0..40 {
                let source = ids_a[round % ids_a.len()];
                let target = ids_a[(round + 1) % ids_a.len()];
                service.add_reference(&caller, source, target).unwrap();
                if round % 3 == 0 {
                    service.remove_reference(&caller, target, source).unwrap();
                }
            }
        });

        let ids_b = ids.clone();
        scope.spawn(move || {
            let service = GraphService::try_new(&writer_b, GraphConfig::default()).unwrap();
            let caller = Caller::user("writer-b");
            for round in 0..40 {
                let source = ids_b[(round + 1) % ids_b.len()];
                let target = ids_b[round % ids_b.len()];
                service.add_reference(&caller, source, target).unwrap();
                if round % 4 == 0 {
                    service.remove_reference(&caller, target, source).unwrap();
                }
            }
        });
    });

    let nodes = QueryService::new(&seed_conn).list_nodes().unwrap();
    let by_id: HashMap<_, _> = nodes.iter().map(|node| (node.id, node)).collect();
    for node in &nodes {
        for target in &node.references {
            assert!(by_id[target].referenced_by.contains(&node.id));
        }
        for source in &node.referenced_by {
            assert!(by_id[source].references.contains(&node.id));
        }
    }
}

#[test]
fn reader_sees_task_and_daily_note_link_together() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daily.db");

    let writer_conn = open_db(&path).unwrap();
    let reader_conn = open_db(&path).unwrap();
    let writer = GraphService::try_new(&writer_conn, GraphConfig::default()).unwrap();
    let note_id = writer
        .create_daily_note(&Caller::Anonymous, "2025-03-15", "")
        .unwrap()
        .id;

    thread::scope(|scope| {
        scope.spawn(move || {
            let writer = GraphService::try_new(&writer_conn, GraphConfig::default()).unwrap();
            for i in 0..25 {
                writer
                    .create_task(
                        &Caller::Anonymous,
                        NewTask::new(format!("task {i}")).in_daily_note(note_id),
                    )
                    .unwrap();
            }
        });

        scope.spawn(move || {
            let reader = QueryService::new(&reader_conn);
            for _ in 0..25 {
                let view = reader.get_daily_note(note_id).unwrap();
                // Every listed id resolves: the link and the task commit together.
                assert_eq!(view.tasks.len(), view.note.tasks.len());
            }
        });
    });
}
