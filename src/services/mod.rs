// Command side
pub mod workflow;

// Read side
pub mod analytics;
pub mod queries;

pub use analytics::AnalyticsService;
pub use queries::EntityQueryService;
pub use workflow::WorkflowEngine;
