pub mod analytics;
pub mod error;
pub mod store;
pub mod sync;

pub use analytics::report::{
    CartAbandonmentSummary, CustomerList, CustomerListEntry, DailyOrders, DashboardStats,
    MonthlyCohort, MonthlySales, Pagination, Report, ReportCache, TopCustomer,
};
pub use analytics::{Aggregator, CustomerQuery, DEFAULT_TOP_CUSTOMERS, MAX_LIST_LIMIT};
pub use error::{AnalyticsError, RecordError, RecordFailure, SyncError};
pub use store::{
    AnalyticsStore, DateRange, MemoryStore, PgStore, StoreError, SyncStore, TenantRegistry,
};
pub use sync::{SyncAllReport, SyncEngine, SyncResult, SyncState};
