use crate::domain::error::AppError;
use crate::domain::vector_record::{SearchMode, SearchParams};
use crate::interfaces::state::AppState;
use actix_cors::Cors;
use actix_web::{
    delete, dev::Server, error::InternalError, get, http::StatusCode, post, web, App,
    HttpResponse, HttpServer, Responder,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use validator::Validate;

/// How many entries `/api/logs` keeps.
pub const LOG_CAPACITY: usize = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

pub struct HttpState {
    pub app_state: Arc<AppState>,
    pub logs: Arc<Mutex<Vec<LogEntry>>>,
}

#[derive(Deserialize, Validate)]
pub struct IngestRequest {
    #[validate(length(min = 1))]
    pub filename: String,
}

#[derive(Deserialize, Validate)]
pub struct VectorizeRequest {
    #[validate(length(min = 1))]
    pub job_id: String,
    #[validate(length(min = 1, max = 255))]
    pub collection: String,
}

#[derive(Deserialize, Validate)]
pub struct VectorSearchRequest {
    #[validate(length(min = 1))]
    pub collection: String,
    pub mode: SearchMode,
    #[serde(default)]
    pub idx: Option<Vec<i64>>,
    #[serde(default)]
    pub inner_id: Option<i64>,
    #[serde(default)]
    pub vector: Option<Vec<f32>>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Deserialize, Validate)]
pub struct TextSearchRequest {
    #[validate(length(min = 3))]
    pub query: String,
    #[serde(default)]
    #[validate(range(min = 1, max = 100))]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub collection: Option<String>,
}

#[derive(Deserialize)]
pub struct DumpQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    detail: String,
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::NotFound(_) | AppError::SourceNotFound(_) => StatusCode::NOT_FOUND,
        AppError::ValidationError(_)
        | AppError::SchemaError(_)
        | AppError::SourceReadError(_)
        | AppError::InsertError(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::DatabaseError(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::EmbeddingError(_)
        | AppError::ConfigError(_)
        | AppError::IoError(_)
        | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(err: &AppError) -> HttpResponse {
    let detail = match err {
        AppError::Internal(msg)
        | AppError::NotFound(msg)
        | AppError::ValidationError(msg)
        | AppError::SourceNotFound(msg)
        | AppError::SourceReadError(msg)
        | AppError::SchemaError(msg)
        | AppError::InsertError(msg)
        | AppError::DatabaseError(msg)
        | AppError::EmbeddingError(msg)
        | AppError::ConfigError(msg)
        | AppError::IoError(msg) => msg.clone(),
    };
    HttpResponse::build(status_for(err)).json(ErrorBody {
        error: err.kind(),
        detail,
    })
}

fn fail(logs: &Mutex<Vec<LogEntry>>, source: &str, context: &str, err: AppError) -> HttpResponse {
    let level = if err.is_infrastructure() { "ERROR" } else { "WARN" };
    add_log(logs, level, source, &format!("{}: {}", context, err));
    error_response(&err)
}

#[get("/healthz")]
async fn healthz() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[post("/ingest")]
async fn ingest(data: web::Data<HttpState>, req: web::Json<IngestRequest>) -> impl Responder {
    if let Err(e) = req.validate() {
        return fail(&data.logs, "Ingest", "Rejected request", e.into());
    }

    add_log(
        &data.logs,
        "INFO",
        "Ingest",
        &format!("Importing workbook: {}", req.filename),
    );

    match data
        .app_state
        .case_ingestion_use_case
        .execute(Path::new(&req.filename))
        .await
    {
        Ok(summary) => {
            add_log(
                &data.logs,
                "INFO",
                "Ingest",
                &format!(
                    "Staged {} test cases as job {}",
                    summary.imported, summary.job_id
                ),
            );
            HttpResponse::Ok().json(summary)
        }
        Err(e) => fail(&data.logs, "Ingest", "Import failed", e),
    }
}

#[post("/vectorize")]
async fn vectorize(data: web::Data<HttpState>, req: web::Json<VectorizeRequest>) -> impl Responder {
    if let Err(e) = req.validate() {
        return fail(&data.logs, "Vectorize", "Rejected request", e.into());
    }

    add_log(
        &data.logs,
        "INFO",
        "Vectorize",
        &format!("Vectorizing job {} into {}", req.job_id, req.collection),
    );

    match data
        .app_state
        .vectorize_use_case
        .execute(&req.job_id, &req.collection)
        .await
    {
        Ok(summary) => {
            add_log(
                &data.logs,
                "INFO",
                "Vectorize",
                &format!(
                    "Inserted {} vectors into {}",
                    summary.inserted, summary.collection
                ),
            );
            HttpResponse::Accepted().json(summary)
        }
        Err(e) => fail(&data.logs, "Vectorize", "Vectorization failed", e),
    }
}

#[post("/vectors/search")]
async fn vector_search(
    data: web::Data<HttpState>,
    req: web::Json<VectorSearchRequest>,
) -> impl Responder {
    if let Err(e) = req.validate() {
        return fail(&data.logs, "VectorIndex", "Rejected search", e.into());
    }

    let req = req.into_inner();
    let params = SearchParams {
        keys: req.idx,
        inner_id: req.inner_id,
        vector: req.vector,
        limit: req.limit,
    };

    match data
        .app_state
        .vector_search_use_case
        .search(&req.collection, req.mode, params)
        .await
    {
        Ok(results) => HttpResponse::Ok().json(serde_json::json!({ "results": results })),
        Err(e) => fail(&data.logs, "VectorIndex", "Search failed", e),
    }
}

#[post("/search")]
async fn text_search(data: web::Data<HttpState>, req: web::Json<TextSearchRequest>) -> impl Responder {
    if let Err(e) = req.validate() {
        return fail(&data.logs, "Search", "Rejected search", e.into());
    }

    match data
        .app_state
        .vector_search_use_case
        .search_text(&req.query, req.top_k, req.collection.as_deref())
        .await
    {
        Ok(hits) => HttpResponse::Ok().json(serde_json::json!({ "hits": hits })),
        Err(e) => fail(&data.logs, "Search", "Search failed", e),
    }
}

#[get("/vectors/collections")]
async fn list_collections(data: web::Data<HttpState>) -> impl Responder {
    match data.app_state.collection_admin_use_case.list().await {
        Ok(collections) => {
            HttpResponse::Ok().json(serde_json::json!({ "collections": collections }))
        }
        Err(e) => fail(&data.logs, "VectorIndex", "Listing collections failed", e),
    }
}

#[get("/vectors/{collection}/dump")]
async fn dump_collection(
    data: web::Data<HttpState>,
    path: web::Path<String>,
    query: web::Query<DumpQuery>,
) -> impl Responder {
    let collection = path.into_inner();
    match data
        .app_state
        .collection_admin_use_case
        .dump(&collection, query.limit)
        .await
    {
        Ok(rows) => HttpResponse::Ok().json(serde_json::json!({ "rows": rows })),
        Err(e) => fail(&data.logs, "VectorIndex", "Dump failed", e),
    }
}

#[delete("/vectors/{collection}")]
async fn drop_collection(data: web::Data<HttpState>, path: web::Path<String>) -> impl Responder {
    let collection = path.into_inner();
    match data.app_state.collection_admin_use_case.drop(&collection).await {
        Ok(dropped) => {
            add_log(
                &data.logs,
                "WARN",
                "VectorIndex",
                &format!("Dropped collection {}", dropped),
            );
            HttpResponse::Ok().json(serde_json::json!({ "dropped": dropped }))
        }
        Err(e) => fail(&data.logs, "VectorIndex", "Drop failed", e),
    }
}

#[get("/logs")]
async fn get_logs(data: web::Data<HttpState>) -> impl Responder {
    let logs = data.logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    HttpResponse::Ok().json(&*logs)
}

pub fn add_log_entry(
    logs: &Mutex<Vec<LogEntry>>,
    level: &str,
    source: &str,
    message: &str,
) -> LogEntry {
    let entry = LogEntry {
        time: Local::now().format("%H:%M:%S").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message: message.to_string(),
    };
    let mut logs = logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    logs.push(entry.clone());
    if logs.len() > LOG_CAPACITY {
        logs.remove(0);
    }
    entry
}

pub fn add_log(logs: &Mutex<Vec<LogEntry>>, level: &str, source: &str, message: &str) {
    add_log_entry(logs, level, source, message);
}

/// Malformed JSON bodies and query strings get the same error body as
/// every other rejected request.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = error_response(&AppError::ValidationError(err.to_string()));
        InternalError::from_response(err, response).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let response = error_response(&AppError::ValidationError(err.to_string()));
        InternalError::from_response(err, response).into()
    })
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(healthz)
        .service(
            web::scope("/api")
                .service(ingest)
                .service(vectorize)
                .service(vector_search)
                .service(text_search)
                .service(list_collections)
                .service(dump_collection)
                .service(drop_collection)
                .service(get_logs),
        );
}

pub fn start_server(
    app_state: Arc<AppState>,
    logs: Arc<Mutex<Vec<LogEntry>>>,
    host: &str,
    port: u16,
) -> std::io::Result<Server> {
    let state = web::Data::new(HttpState { app_state, logs });

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind((host, port))?
    .run();

    Ok(server)
}
