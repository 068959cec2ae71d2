//! Node repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide keyed CRUD and predicate scans over the `nodes` table.
//! - Serialize edge and tag fields as JSON arrays of opaque strings.
//!
//! # Invariants
//! - `put_node` never rewrites `created_at` of an existing row.
//! - Listing order is creation order: `created_at ASC, rowid ASC`.

use crate::model::node::{Node, NodeId, NodeType};
use crate::model::EntityKind;
use crate::repo::{
    decode_json, encode_json, ensure_connection_ready, parse_uuid, RepoError, RepoResult,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const NODE_SELECT_SQL: &str = "SELECT
    id,
    type,
    title,
    content,
    tags_json,
    supertags_json,
    parent_id,
    children_json,
    references_json,
    referenced_by_json,
    properties_json,
    created_at,
    updated_at
FROM nodes";

/// Query options for listing nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeListQuery {
    pub kind: Option<NodeType>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Keyed storage contract for node records.
pub trait NodeRepository {
    /// Loads one node, `None` when absent.
    fn get_node(&self, id: NodeId) -> RepoResult<Option<Node>>;
    /// Loads one node, `RepoError::NotFound` when absent.
    fn load_node(&self, id: NodeId) -> RepoResult<Node> {
        self.get_node(id)?.ok_or(RepoError::NotFound {
            kind: EntityKind::Node,
            id,
        })
    }
    fn node_exists(&self, id: NodeId) -> RepoResult<bool>;
    /// Inserts or replaces one node record.
    fn put_node(&self, node: &Node) -> RepoResult<()>;
    /// Removes one node record, `RepoError::NotFound` when absent.
    fn delete_node(&self, id: NodeId) -> RepoResult<()>;
    fn list_nodes(&self, query: &NodeListQuery) -> RepoResult<Vec<Node>>;
    /// Returns every node accepted by `predicate`, in listing order.
    fn scan_nodes(&self, predicate: &mut dyn FnMut(&Node) -> bool) -> RepoResult<Vec<Node>>;
}

impl<R: NodeRepository + ?Sized> NodeRepository for &R {
    fn get_node(&self, id: NodeId) -> RepoResult<Option<Node>> {
        (**self).get_node(id)
    }

    fn node_exists(&self, id: NodeId) -> RepoResult<bool> {
        (**self).node_exists(id)
    }

    fn put_node(&self, node: &Node) -> RepoResult<()> {
        (**self).put_node(node)
    }

    fn delete_node(&self, id: NodeId) -> RepoResult<()> {
        (**self).delete_node(id)
    }

    fn list_nodes(&self, query: &NodeListQuery) -> RepoResult<Vec<Node>> {
        (**self).list_nodes(query)
    }

    fn scan_nodes(&self, predicate: &mut dyn FnMut(&Node) -> bool) -> RepoResult<Vec<Node>> {
        (**self).scan_nodes(predicate)
    }
}

/// SQLite-backed node repository.
///
/// Works on a plain connection or on an open `Transaction`.
pub struct SqliteNodeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNodeRepository<'conn> {
    /// Wraps a connection already known to be migrated.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Wraps a connection after checking schema readiness.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl NodeRepository for SqliteNodeRepository<'_> {
    fn get_node(&self, id: NodeId) -> RepoResult<Option<Node>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NODE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_node_row(row)?));
        }
        Ok(None)
    }

    fn node_exists(&self, id: NodeId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM nodes WHERE id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn put_node(&self, node: &Node) -> RepoResult<()> {
        node.validate()?;

        self.conn.execute(
            "INSERT INTO nodes (
                id,
                type,
                title,
                content,
                tags_json,
                supertags_json,
                parent_id,
                children_json,
                references_json,
                referenced_by_json,
                properties_json,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                type = excluded.type,
                title = excluded.title,
                content = excluded.content,
                tags_json = excluded.tags_json,
                supertags_json = excluded.supertags_json,
                parent_id = excluded.parent_id,
                children_json = excluded.children_json,
                references_json = excluded.references_json,
                referenced_by_json = excluded.referenced_by_json,
                properties_json = excluded.properties_json,
                updated_at = excluded.updated_at;",
            params![
                node.id.to_string(),
                node.kind.as_str(),
                node.title.as_str(),
                node.content.as_str(),
                encode_json(&node.tags, "nodes.tags_json")?,
                encode_json(&node.supertags, "nodes.supertags_json")?,
                node.parent.map(|parent| parent.to_string()),
                encode_json(&node.children, "nodes.children_json")?,
                encode_json(&node.references, "nodes.references_json")?,
                encode_json(&node.referenced_by, "nodes.referenced_by_json")?,
                encode_json(&node.properties, "nodes.properties_json")?,
                node.created_at,
                node.updated_at,
            ],
        )?;
        Ok(())
    }

    fn delete_node(&self, id: NodeId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM nodes WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Node,
                id,
            });
        }
        Ok(())
    }

    fn list_nodes(&self, query: &NodeListQuery) -> RepoResult<Vec<Node>> {
        let mut sql = format!("{NODE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(kind) = query.kind {
            sql.push_str(" AND type = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }

        sql.push_str(" ORDER BY created_at ASC, rowid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next()? {
            nodes.push(parse_node_row(row)?);
        }
        Ok(nodes)
    }

    fn scan_nodes(&self, predicate: &mut dyn FnMut(&Node) -> bool) -> RepoResult<Vec<Node>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NODE_SELECT_SQL} ORDER BY created_at ASC, rowid ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut matched = Vec::new();
        while let Some(row) = rows.next()? {
            let node = parse_node_row(row)?;
            if predicate(&node) {
                matched.push(node);
            }
        }
        Ok(matched)
    }
}

fn parse_node_row(row: &Row<'_>) -> RepoResult<Node> {
    let id_text: String = row.get("id")?;
    let type_text: String = row.get("type")?;
    let kind = type_text.parse::<NodeType>().map_err(|_| {
        RepoError::InvalidData(format!("invalid node type `{type_text}` in nodes.type"))
    })?;

    let parent = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, "nodes.parent_id"))
        .transpose()?;

    let tags_json: String = row.get("tags_json")?;
    let supertags_json: String = row.get("supertags_json")?;
    let children_json: String = row.get("children_json")?;
    let references_json: String = row.get("references_json")?;
    let referenced_by_json: String = row.get("referenced_by_json")?;
    let properties_json: String = row.get("properties_json")?;

    let node = Node {
        id: parse_uuid(&id_text, "nodes.id")?,
        kind,
        title: row.get("title")?,
        content: row.get("content")?,
        tags: decode_json(&tags_json, "nodes.tags_json")?,
        supertags: decode_json(&supertags_json, "nodes.supertags_json")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        parent,
        children: decode_json(&children_json, "nodes.children_json")?,
        references: decode_json(&references_json, "nodes.references_json")?,
        referenced_by: decode_json(&referenced_by_json, "nodes.referenced_by_json")?,
        properties: decode_json(&properties_json, "nodes.properties_json")?,
    };
    node.validate()
        .map_err(|err| RepoError::InvalidData(format!("node {id_text}: {err}")))?;
    Ok(node)
}
