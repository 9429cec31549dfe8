mod dashboard_route;

pub use dashboard_route::dashboard_routes;
