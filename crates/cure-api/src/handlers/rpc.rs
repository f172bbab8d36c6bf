//! JSON-RPC style entry point.
//!
//! `POST /rpc` takes `{"method": ..., "params": {...}}` and answers
//! `{"result": ...}`. Unknown methods fail body deserialization.

use axum::extract::State;
use axum::Json;
use cure_models::{Category, ImageId};
use schemars::schema::RootSchema;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiResult;
use crate::state::AppState;

/// Parameters of `categorize_image`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CategorizeImageParams {
    /// ID of the image in the viewer's store
    pub img_id: ImageId,
}

/// Remote-callable methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum RpcRequest {
    CategorizeImage(CategorizeImageParams),
}

impl RpcRequest {
    pub fn method(&self) -> &'static str {
        match self {
            RpcRequest::CategorizeImage(_) => "categorize_image",
        }
    }
}

/// Method results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcResult {
    Category(Category),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub result: RpcResult,
}

/// Dispatch one RPC call.
pub async fn rpc(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> ApiResult<Json<RpcResponse>> {
    info!(method = request.method(), "RPC call");
    let result = match request {
        RpcRequest::CategorizeImage(params) => {
            RpcResult::Category(state.categorize.categorize_image(&params.img_id).await?)
        }
    };
    Ok(Json(RpcResponse { result }))
}

/// Description of one exposed method.
#[derive(Debug, Serialize)]
pub struct MethodInfo {
    pub name: &'static str,
    pub params: RootSchema,
}

/// List exposed methods with their parameter schemas.
pub async fn rpc_methods() -> Json<Vec<MethodInfo>> {
    Json(vec![MethodInfo {
        name: "categorize_image",
        params: schema_for!(CategorizeImageParams),
    }])
}
