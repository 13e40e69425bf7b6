//! In-memory stand-in for the note server's kernel API.
//!
//! Serves the block and notebook endpoints the SDK talks to, answering with
//! the kernel's `{code, msg, data}` envelope. Blocks live in a single ordered
//! tree rooted at one seeded document.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Id of the document block every fresh kernel starts with.
pub const ROOT_DOC_ID: &str = "20210817205410-2kvfpfn";
/// Id of the notebook that holds the seeded document.
pub const NOTEBOOK_ID: &str = "20210808180117-czj9bvb";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i64,
    pub msg: String,
    pub data: Value,
}

impl Envelope {
    pub fn ok(data: Value) -> Self {
        Self {
            code: 0,
            msg: String::new(),
            data,
        }
    }

    pub fn fail(msg: impl Into<String>) -> Self {
        Self {
            code: -1,
            msg: msg.into(),
            data: Value::Null,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notebook {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub sort: i64,
    pub closed: bool,
}

#[derive(Clone, Debug)]
pub struct Block {
    pub id: String,
    pub parent_id: String,
    pub markdown: String,
    pub folded: bool,
}

#[derive(Deserialize)]
pub struct SqlQuery {
    pub query: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertBlock {
    pub data_type: String,
    pub data: String,
    #[serde(rename = "nextID", default)]
    pub next_id: String,
    #[serde(rename = "previousID", default)]
    pub previous_id: String,
    #[serde(rename = "parentID", default)]
    pub parent_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlock {
    pub id: String,
    pub data_type: String,
    pub data: String,
}

#[derive(Deserialize)]
pub struct MoveBlock {
    pub id: String,
    #[serde(rename = "nextID", default)]
    pub next_id: String,
    #[serde(rename = "previousID", default)]
    pub previous_id: String,
    #[serde(rename = "parentID", default)]
    pub parent_id: String,
}

#[derive(Deserialize)]
pub struct BlockRef {
    pub id: String,
}

#[derive(Debug, Default)]
struct Tree {
    blocks: HashMap<String, Block>,
    children: HashMap<String, Vec<String>>,
}

impl Tree {
    fn seeded() -> Self {
        let mut tree = Tree::default();
        tree.blocks.insert(
            ROOT_DOC_ID.to_string(),
            Block {
                id: ROOT_DOC_ID.to_string(),
                parent_id: String::new(),
                markdown: String::new(),
                folded: false,
            },
        );
        tree.children.insert(ROOT_DOC_ID.to_string(), Vec::new());
        tree
    }

    /// Resolve an anchor to `(parent, index)`. Precedence is next, previous,
    /// then parent (append).
    fn slot(&self, next_id: &str, previous_id: &str, parent_id: &str) -> Result<(String, usize), String> {
        let sibling_slot = |id: &str, offset: usize| -> Result<(String, usize), String> {
            let block = self.blocks.get(id).ok_or_else(|| format!("block not found [{id}]"))?;
            let siblings = self.children.get(&block.parent_id).map(Vec::as_slice).unwrap_or(&[]);
            let pos = siblings.iter().position(|s| s == id).unwrap_or(siblings.len());
            Ok((block.parent_id.clone(), pos + offset))
        };
        if !next_id.is_empty() {
            return sibling_slot(next_id, 0);
        }
        if !previous_id.is_empty() {
            return sibling_slot(previous_id, 1);
        }
        if !parent_id.is_empty() {
            if !self.blocks.contains_key(parent_id) {
                return Err(format!("block not found [{parent_id}]"));
            }
            let len = self.children.get(parent_id).map_or(0, Vec::len);
            return Ok((parent_id.to_string(), len));
        }
        Err("nextID, previousID and parentID cannot be all empty".to_string())
    }

    fn attach(&mut self, id: &str, parent: &str, index: usize) {
        let siblings = self.children.entry(parent.to_string()).or_default();
        let index = index.min(siblings.len());
        siblings.insert(index, id.to_string());
        if let Some(block) = self.blocks.get_mut(id) {
            block.parent_id = parent.to_string();
        }
    }

    fn detach(&mut self, id: &str) {
        let Some(parent) = self.blocks.get(id).map(|b| b.parent_id.clone()) else {
            return;
        };
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|s| s != id);
        }
    }

    /// True if `candidate` is `id` or lies underneath it.
    fn within(&self, candidate: &str, id: &str) -> bool {
        let mut cursor = candidate;
        while let Some(block) = self.blocks.get(cursor) {
            if block.id == id {
                return true;
            }
            cursor = &block.parent_id;
        }
        false
    }

    fn remove_subtree(&mut self, id: &str) {
        for child in self.children.remove(id).unwrap_or_default() {
            self.remove_subtree(&child);
        }
        self.blocks.remove(id);
    }

    /// Depth-first, document order.
    fn rows(&self) -> Vec<Value> {
        let mut rows = Vec::new();
        let mut stack = vec![ROOT_DOC_ID.to_string()];
        while let Some(id) = stack.pop() {
            let Some(block) = self.blocks.get(&id) else { continue };
            rows.push(json!({
                "id": block.id,
                "parent_id": block.parent_id,
                "markdown": block.markdown,
                "folded": block.folded,
            }));
            if let Some(children) = self.children.get(&id) {
                stack.extend(children.iter().rev().cloned());
            }
        }
        rows
    }
}

/// Shared kernel state.
#[derive(Debug)]
pub struct MockKernel {
    tree: RwLock<Tree>,
    notebooks: Vec<Notebook>,
    token: Option<String>,
    requests: AtomicUsize,
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Tree::seeded()),
            notebooks: vec![Notebook {
                id: NOTEBOOK_ID.to_string(),
                name: "User Guide".to_string(),
                icon: "1f4d4".to_string(),
                sort: 0,
                closed: false,
            }],
            token: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Require `Authorization: Token <token>` on every request.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Number of requests received so far, including rejected ones.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Markdown of a block, if it exists.
    pub async fn markdown(&self, id: &str) -> Option<String> {
        self.tree.read().await.blocks.get(id).map(|b| b.markdown.clone())
    }

    /// Ordered child ids of a block.
    pub async fn children(&self, id: &str) -> Vec<String> {
        self.tree.read().await.children.get(id).cloned().unwrap_or_default()
    }

    pub async fn is_folded(&self, id: &str) -> Option<bool> {
        self.tree.read().await.blocks.get(id).map(|b| b.folded)
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

pub type Kernel = Arc<MockKernel>;

pub fn app() -> Router {
    app_with(Arc::new(MockKernel::new()))
}

pub fn app_with(kernel: Kernel) -> Router {
    Router::new()
        .route("/api/sql", post(sql))
        .route("/api/block/insertBlock", post(insert_block))
        .route("/api/block/updateBlock", post(update_block))
        .route("/api/block/deleteBlock", post(delete_block))
        .route("/api/block/moveBlock", post(move_block))
        .route("/api/block/foldBlock", post(fold_block))
        .route("/api/block/unfoldBlock", post(unfold_block))
        .route("/api/notebook/lsNotebooks", post(ls_notebooks))
        .layer(middleware::from_fn_with_state(kernel.clone(), authenticate))
        .with_state(kernel)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, kernel: Kernel) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(kernel)).await
}

/// `YYYYMMDDhhmmss-xxxxxxx`, the kernel's block id shape.
pub fn new_block_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", chrono::Local::now().format("%Y%m%d%H%M%S"), &suffix[..7])
}

async fn authenticate(State(kernel): State<Kernel>, request: Request, next: Next) -> Response {
    kernel.requests.fetch_add(1, Ordering::SeqCst);
    if let Some(token) = &kernel.token {
        let expected = format!("Token {token}");
        let supplied = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if supplied != Some(expected.as_str()) {
            warn!(path = %request.uri().path(), "rejected request with bad token");
            return (StatusCode::UNAUTHORIZED, Json(Envelope::fail("Auth failed"))).into_response();
        }
    }
    next.run(request).await
}

fn check_data_type(data_type: &str) -> Result<(), Envelope> {
    match data_type {
        "markdown" | "dom" => Ok(()),
        other => Err(Envelope::fail(format!("invalid dataType [{other}]"))),
    }
}

fn op(action: &str, data: &str, id: &str, parent_id: &str, previous_id: &str, next_id: &str) -> Value {
    json!({
        "action": action,
        "data": data,
        "id": id,
        "parentID": parent_id,
        "previousID": previous_id,
        "nextID": next_id,
        "retData": null,
    })
}

fn batch(ops: Vec<Value>) -> Value {
    json!([{ "doOperations": ops, "undoOperations": null }])
}

async fn sql(State(kernel): State<Kernel>, Json(input): Json<SqlQuery>) -> Json<Envelope> {
    let query = input.query.trim();
    if query.is_empty() {
        return Json(Envelope::fail("query is empty"));
    }
    let mut rows = kernel.tree.read().await.rows();
    let lowered = query.to_ascii_lowercase();
    if let Some(limit) = lowered
        .rsplit_once(" limit ")
        .and_then(|(_, n)| n.trim().parse::<usize>().ok())
    {
        rows.truncate(limit);
    }
    debug!(query, rows = rows.len(), "sql");
    Json(Envelope::ok(Value::Array(rows)))
}

async fn insert_block(State(kernel): State<Kernel>, Json(input): Json<InsertBlock>) -> Json<Envelope> {
    if let Err(env) = check_data_type(&input.data_type) {
        return Json(env);
    }
    let mut tree = kernel.tree.write().await;
    let (parent, index) = match tree.slot(&input.next_id, &input.previous_id, &input.parent_id) {
        Ok(slot) => slot,
        Err(msg) => return Json(Envelope::fail(msg)),
    };
    let id = new_block_id();
    tree.blocks.insert(
        id.clone(),
        Block {
            id: id.clone(),
            parent_id: parent.clone(),
            markdown: input.data.clone(),
            folded: false,
        },
    );
    tree.children.insert(id.clone(), Vec::new());
    tree.attach(&id, &parent, index);
    info!(id = %id, parent = %parent, "inserted block");
    Json(Envelope::ok(batch(vec![op(
        "insert",
        &input.data,
        &id,
        &input.parent_id,
        &input.previous_id,
        &input.next_id,
    )])))
}

async fn update_block(State(kernel): State<Kernel>, Json(input): Json<UpdateBlock>) -> Json<Envelope> {
    if let Err(env) = check_data_type(&input.data_type) {
        return Json(env);
    }
    let mut tree = kernel.tree.write().await;
    let Some(block) = tree.blocks.get_mut(&input.id) else {
        return Json(Envelope::fail(format!("block not found [{}]", input.id)));
    };
    block.markdown = input.data.clone();
    let parent = block.parent_id.clone();
    info!(id = %input.id, "updated block");
    Json(Envelope::ok(batch(vec![op("update", &input.data, &input.id, &parent, "", "")])))
}

async fn delete_block(State(kernel): State<Kernel>, Json(input): Json<BlockRef>) -> Json<Envelope> {
    let mut tree = kernel.tree.write().await;
    let Some(parent) = tree.blocks.get(&input.id).map(|b| b.parent_id.clone()) else {
        return Json(Envelope::fail(format!("block not found [{}]", input.id)));
    };
    if parent.is_empty() {
        return Json(Envelope::fail("cannot delete a document block"));
    }
    tree.detach(&input.id);
    tree.remove_subtree(&input.id);
    info!(id = %input.id, "deleted block");
    Json(Envelope::ok(batch(vec![op("delete", "", &input.id, &parent, "", "")])))
}

async fn move_block(State(kernel): State<Kernel>, Json(input): Json<MoveBlock>) -> Json<Envelope> {
    let mut tree = kernel.tree.write().await;
    if !tree.blocks.contains_key(&input.id) {
        return Json(Envelope::fail(format!("block not found [{}]", input.id)));
    }
    let target = [&input.next_id, &input.previous_id, &input.parent_id]
        .into_iter()
        .find(|s| !s.is_empty());
    if let Some(target) = target {
        if tree.within(target, &input.id) {
            return Json(Envelope::fail("cannot move a block into itself"));
        }
    }
    let original = tree.blocks[&input.id].parent_id.clone();
    let original_index = tree
        .children
        .get(&original)
        .and_then(|siblings| siblings.iter().position(|s| *s == input.id))
        .unwrap_or(0);
    tree.detach(&input.id);
    let (parent, index) = match tree.slot(&input.next_id, &input.previous_id, &input.parent_id) {
        Ok(slot) => slot,
        Err(msg) => {
            tree.attach(&input.id, &original, original_index);
            return Json(Envelope::fail(msg));
        }
    };
    tree.attach(&input.id, &parent, index);
    info!(id = %input.id, parent = %parent, "moved block");
    Json(Envelope::ok(batch(vec![op(
        "move",
        "",
        &input.id,
        &input.parent_id,
        &input.previous_id,
        &input.next_id,
    )])))
}

async fn set_folded(kernel: &MockKernel, id: &str, folded: bool) -> Envelope {
    let mut tree = kernel.tree.write().await;
    match tree.blocks.get_mut(id) {
        Some(block) => {
            block.folded = folded;
            debug!(id, folded, "fold state changed");
            Envelope::ok(Value::Null)
        }
        None => Envelope::fail(format!("block not found [{id}]")),
    }
}

async fn fold_block(State(kernel): State<Kernel>, Json(input): Json<BlockRef>) -> Json<Envelope> {
    Json(set_folded(&kernel, &input.id, true).await)
}

async fn unfold_block(State(kernel): State<Kernel>, Json(input): Json<BlockRef>) -> Json<Envelope> {
    Json(set_folded(&kernel, &input.id, false).await)
}

async fn ls_notebooks(State(kernel): State<Kernel>) -> Json<Envelope> {
    Json(Envelope::ok(json!({ "notebooks": kernel.notebooks })))
}
