use actix_web::web;

use crate::services::dashboard_service::{
    export_jobs_csv, get_job, get_stats, job_action, list_jobs, list_scheduled_jobs,
};

/// Mount the worker dashboard under the host application's Actix app.
///
/// The app must also register the service handle:
/// `App::new().app_data(web::Data::new(worker_service.clone()))`.
pub fn dashboard_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .route("/stats", web::get().to(get_stats))
            .route("/jobs", web::get().to(list_jobs))
            .route("/jobs/export.csv", web::get().to(export_jobs_csv))
            .route("/jobs/{id}", web::get().to(get_job))
            .route("/job_action", web::post().to(job_action))
            .route("/scheduled", web::get().to(list_scheduled_jobs)),
    );
}
