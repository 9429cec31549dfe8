use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::basic_auth::{check_basic_auth, unauthorized_response};
use crate::job::{Job, JobStatus};
use crate::service::WorkerService;
use crate::utils::constants::{DEFAULT_LIMIT, DEFAULT_PAGE};

#[derive(Deserialize)]
pub struct JobsQuery {
    pub status: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct JobActionRequest {
    pub action: String,
    pub job_id: String,
}

fn authorized(req: &HttpRequest, service: &WorkerService) -> bool {
    check_basic_auth(req, service.config().dashboard_auth.as_ref())
}

fn parse_status(raw: Option<&str>) -> Result<Option<JobStatus>, HttpResponse> {
    match raw {
        None => Ok(None),
        Some(raw) => match JobStatus::parse(raw) {
            Some(status) => Ok(Some(status)),
            None => Err(HttpResponse::BadRequest()
                .json(json!({"error": format!("unknown status '{raw}'")}))),
        },
    }
}

pub async fn get_stats(req: HttpRequest, service: web::Data<WorkerService>) -> impl Responder {
    if !authorized(&req, &service) {
        return unauthorized_response();
    }
    match service.job_stats().await {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(_) => HttpResponse::InternalServerError().body("Store error"),
    }
}

pub async fn list_jobs(
    req: HttpRequest,
    service: web::Data<WorkerService>,
    query: web::Query<JobsQuery>,
) -> impl Responder {
    if !authorized(&req, &service) {
        return unauthorized_response();
    }
    let status = match parse_status(query.status.as_deref()) {
        Ok(status) => status,
        Err(response) => return response,
    };
    let page = query.page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).max(1);
    let offset = (page - 1) * limit;

    match service.queue().get_jobs(status, offset, limit).await {
        Ok(jobs) => HttpResponse::Ok().json(json!({
            "jobs": jobs,
            "page": page,
            "limit": limit,
        })),
        Err(_) => HttpResponse::InternalServerError().body("Store error"),
    }
}

pub async fn get_job(
    req: HttpRequest,
    service: web::Data<WorkerService>,
    path: web::Path<String>,
) -> impl Responder {
    if !authorized(&req, &service) {
        return unauthorized_response();
    }
    let id = path.into_inner();
    match service.queue().get_job(&id).await {
        Ok(Some(job)) => HttpResponse::Ok().json(job),
        Ok(None) => HttpResponse::NotFound().json(json!({"error": "job not found"})),
        Err(_) => HttpResponse::InternalServerError().body("Store error"),
    }
}

/// Mutating job actions, dispatched by name: `retry` re-enqueues a failed
/// job, `cancel` stops a not-yet-started one, `remove` deletes the record.
pub async fn job_action(
    req: HttpRequest,
    service: web::Data<WorkerService>,
    payload: web::Json<JobActionRequest>,
) -> impl Responder {
    if !authorized(&req, &service) {
        return unauthorized_response();
    }
    let queue = service.queue();
    let outcome = match payload.action.as_str() {
        "retry" => queue.retry_job(&payload.job_id).await,
        "cancel" => queue.cancel_job(&payload.job_id).await,
        "remove" => queue.remove_job(&payload.job_id).await,
        other => {
            return HttpResponse::BadRequest()
                .json(json!({"error": format!("invalid action '{other}'")}))
        }
    };
    match outcome {
        Ok(true) => HttpResponse::Ok().json(json!({"status": "ok"})),
        Ok(false) => HttpResponse::NotFound().json(json!({"error": "job not eligible"})),
        Err(_) => HttpResponse::InternalServerError().body("Store error"),
    }
}

pub async fn list_scheduled_jobs(
    req: HttpRequest,
    service: web::Data<WorkerService>,
) -> impl Responder {
    if !authorized(&req, &service) {
        return unauthorized_response();
    }
    match service.scheduler().get_scheduled_jobs().await {
        Ok(templates) => HttpResponse::Ok().json(templates),
        Err(_) => HttpResponse::InternalServerError().body("Store error"),
    }
}

#[derive(Serialize)]
struct JobCsvRow {
    id: String,
    name: String,
    status: String,
    progress: u8,
    attempts: u32,
    created_at: String,
    completed_at: String,
    error: String,
}

impl From<&Job> for JobCsvRow {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            status: job.status.to_string(),
            progress: job.progress,
            attempts: job.attempts,
            created_at: job.created_at.to_rfc3339(),
            completed_at: job
                .completed_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            error: job.error.clone().unwrap_or_default(),
        }
    }
}

pub async fn export_jobs_csv(
    req: HttpRequest,
    service: web::Data<WorkerService>,
    query: web::Query<JobsQuery>,
) -> impl Responder {
    if !authorized(&req, &service) {
        return unauthorized_response();
    }
    let status = match parse_status(query.status.as_deref()) {
        Ok(status) => status,
        Err(response) => return response,
    };

    let jobs = match service.queue().get_jobs(status, 0, usize::MAX).await {
        Ok(jobs) => jobs,
        Err(_) => return HttpResponse::InternalServerError().body("Store error"),
    };

    let mut wtr = csv::Writer::from_writer(vec![]);
    for job in &jobs {
        let _ = wtr.serialize(JobCsvRow::from(job));
    }
    let data = wtr.into_inner().unwrap_or_default();

    HttpResponse::Ok()
        .content_type("text/csv")
        .append_header(("Content-Disposition", "attachment; filename=jobs.csv"))
        .body(data)
}
