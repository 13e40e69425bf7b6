//! Async session tests against the mock kernel on a random port.

use std::sync::Arc;
use std::time::Duration;

use mock_server::{MockKernel, ROOT_DOC_ID};
use serde_json::json;
use siyuan_client::{
    api_session, api_session_with, Action, Anchor, ApiError, ClientError, DataType,
    SessionConfig, SiyuanApi,
};
use tokio::net::TcpListener;

async fn spawn_kernel(kernel: MockKernel) -> (String, Arc<MockKernel>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let kernel = Arc::new(kernel);
    tokio::spawn(mock_server::run_with(listener, kernel.clone()));
    (format!("http://{addr}"), kernel)
}

async fn spawn_router(app: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    format!("http://{addr}")
}

#[tokio::test]
async fn insert_block_decodes_operation_batch() {
    let (url, kernel) = spawn_kernel(MockKernel::new()).await;
    let api = SiyuanApi::new(&url, "").unwrap();

    let batches = api
        .insert_block(DataType::Markdown, "# Hi", &Anchor::parent(ROOT_DOC_ID))
        .await
        .unwrap()
        .into_data()
        .unwrap();

    assert_eq!(kernel.requests(), 1);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].do_operations.len(), 1);
    let op = &batches[0].do_operations[0];
    assert_eq!(op.action, Action::Insert);
    assert_eq!(op.data, "# Hi");
    assert_eq!(op.parent_id, ROOT_DOC_ID);
    assert_eq!(kernel.markdown(&op.id).await.as_deref(), Some("# Hi"));
}

#[tokio::test]
async fn empty_anchor_fails_without_network() {
    let (url, kernel) = spawn_kernel(MockKernel::new()).await;
    let api = SiyuanApi::new(&url, "").unwrap();

    let err = api
        .insert_block(DataType::Markdown, "x", &Anchor::default())
        .await
        .unwrap_err();
    assert!(err.is_invalid_argument());

    let err = api.move_block("b", &Anchor::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::Api(ApiError::InvalidArgument(_))));

    assert_eq!(kernel.requests(), 0);
}

#[tokio::test]
async fn block_lifecycle() {
    let (url, kernel) = spawn_kernel(MockKernel::new()).await;
    let api = SiyuanApi::new(&url, "").unwrap();

    let insert = |text: &'static str, anchor: Anchor| {
        let api = api.clone();
        async move {
            api.insert_block(DataType::Markdown, text, &anchor)
                .await
                .unwrap()
                .into_data()
                .unwrap()[0]
                .do_operations[0]
                .id
                .clone()
        }
    };
    let a = insert("a", Anchor::parent(ROOT_DOC_ID)).await;
    let b = insert("b", Anchor::previous(a.clone())).await;

    let ops = api
        .update_block(&a, DataType::Markdown, "a2")
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(ops[0].do_operations[0].action, Action::Update);
    assert_eq!(kernel.markdown(&a).await.as_deref(), Some("a2"));

    let ops = api.move_block(&b, &Anchor::next(a.clone())).await.unwrap().into_data().unwrap();
    assert_eq!(ops[0].do_operations[0].action, Action::Move);
    assert_eq!(kernel.children(ROOT_DOC_ID).await, vec![b.clone(), a.clone()]);

    api.fold_block(&a).await.unwrap().into_data().unwrap();
    assert_eq!(kernel.is_folded(&a).await, Some(true));
    api.unfold_block(&a).await.unwrap().into_data().unwrap();
    assert_eq!(kernel.is_folded(&a).await, Some(false));

    let ops = api.delete_block(&b).await.unwrap().into_data().unwrap();
    assert_eq!(ops[0].do_operations[0].action, Action::Delete);
    assert_eq!(kernel.children(ROOT_DOC_ID).await, vec![a]);
}

#[tokio::test]
async fn sql_passes_rows_through() {
    let (url, _kernel) = spawn_kernel(MockKernel::new()).await;
    let api = SiyuanApi::new(&url, "").unwrap();

    let rows = api
        .sql("select * from blocks limit 1")
        .await
        .unwrap()
        .into_data()
        .unwrap();
    assert_eq!(
        rows,
        json!([{"id": ROOT_DOC_ID, "parent_id": "", "markdown": "", "folded": false}])
    );
}

#[tokio::test]
async fn remote_failure_carries_server_message() {
    let (url, _kernel) = spawn_kernel(MockKernel::new()).await;
    let api = SiyuanApi::new(&url, "").unwrap();

    let env = api.delete_block("missing").await.unwrap();
    assert!(!env.is_success());
    let err = ClientError::from(env.into_data().unwrap_err());
    assert_eq!(err.remote_message(), Some("block not found [missing]"));
}

#[tokio::test]
async fn bad_token_surfaces_as_remote_failure() {
    let (url, _kernel) = spawn_kernel(MockKernel::new().with_token("secret")).await;

    let api = SiyuanApi::new(&url, "wrong").unwrap();
    let err = api.ls_notebooks().await.unwrap().into_data().unwrap_err();
    assert_eq!(err.remote_message(), Some("Auth failed"));

    let api = SiyuanApi::new(&url, "secret").unwrap();
    let list = api.ls_notebooks().await.unwrap().into_data().unwrap();
    assert_eq!(list.notebooks.len(), 1);
    assert!(!list.notebooks[0].close);
}

#[tokio::test]
async fn malformed_envelope_is_a_decode_error() {
    let app = axum::Router::new().route(
        "/api/sql",
        axum::routing::post(|| async { axum::Json(json!({"msg": "", "data": null})) }),
    );
    let url = spawn_router(app).await;
    let api = SiyuanApi::new(&url, "").unwrap();

    let err = api.sql("select 1").await.unwrap_err();
    assert!(matches!(err, ClientError::Api(ApiError::Deserialization(_))));
}

#[tokio::test]
async fn fold_accepts_non_null_success_data() {
    let app = axum::Router::new()
        .route(
            "/api/block/foldBlock",
            axum::routing::post(|| async { axum::Json(json!({"code": 0, "msg": "", "data": {}})) }),
        )
        .route(
            "/api/block/unfoldBlock",
            axum::routing::post(|| async {
                axum::Json(json!({"code": -1, "msg": "block not found [b]", "data": {}}))
            }),
        );
    let url = spawn_router(app).await;
    let api = SiyuanApi::new(&url, "").unwrap();

    api.fold_block("b").await.unwrap().into_data().unwrap();
    let err = ClientError::from(api.unfold_block("b").await.unwrap().into_data().unwrap_err());
    assert!(err.is_remote());
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = SiyuanApi::new(&format!("http://{addr}"), "").unwrap();
    let err = api.fold_block("b").await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}

#[tokio::test]
async fn slow_kernel_times_out() {
    let app = axum::Router::new().route(
        "/api/sql",
        axum::routing::post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            axum::Json(json!({"code": 0, "msg": "", "data": []}))
        }),
    );
    let url = spawn_router(app).await;
    let config = SessionConfig::new(&url, "").with_timeout(Duration::from_millis(100));
    let api = SiyuanApi::with_config(config).unwrap();

    let err = api.sql("select 1").await.unwrap_err();
    match err {
        ClientError::Transport(e) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn closed_session_rejects_calls() {
    let (url, kernel) = spawn_kernel(MockKernel::new()).await;
    let api = SiyuanApi::new(&url, "").unwrap();
    api.close();

    let err = api.sql("select 1").await.unwrap_err();
    assert!(matches!(err, ClientError::SessionClosed));
    assert_eq!(kernel.requests(), 0);
}

#[tokio::test]
async fn scoped_session_closes_on_exit() {
    let (url, _kernel) = spawn_kernel(MockKernel::new()).await;

    let escaped = api_session(&url, "", |api| async move {
        let count = api.ls_notebooks().await?.into_data()?.notebooks.len();
        assert_eq!(count, 1);
        Ok::<_, ClientError>(api)
    })
    .await
    .unwrap();

    assert!(escaped.is_closed());
    let err = escaped.ls_notebooks().await.unwrap_err();
    assert!(matches!(err, ClientError::SessionClosed));
}

#[tokio::test]
async fn scoped_session_closes_on_error() {
    let (url, _kernel) = spawn_kernel(MockKernel::new()).await;
    let mut leaked = None;

    let result: Result<(), ClientError> = api_session_with(SessionConfig::new(&url, ""), |api| {
        leaked = Some(api.clone());
        async move {
            api.move_block("b", &Anchor::default()).await?;
            Ok(())
        }
    })
    .await;

    assert!(result.unwrap_err().is_invalid_argument());
    assert!(leaked.unwrap().is_closed());
}

#[tokio::test]
async fn concurrent_calls_share_one_session() {
    let (url, kernel) = spawn_kernel(MockKernel::new()).await;
    let api = SiyuanApi::new(&url, "").unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let api = api.clone();
        handles.push(tokio::spawn(async move {
            api.insert_block(DataType::Markdown, &format!("block {i}"), &Anchor::parent(ROOT_DOC_ID))
                .await
                .unwrap()
                .into_data()
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(kernel.children(ROOT_DOC_ID).await.len(), 8);
    assert_eq!(kernel.requests(), 8);
}
