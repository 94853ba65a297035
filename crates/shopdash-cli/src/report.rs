//! Report command handlers. Each prints the report as pretty JSON.

use chrono::NaiveDate;
use clap::Subcommand;
use serde::Serialize;
use shopdash_engine::{CustomerQuery, DateRange, DEFAULT_TOP_CUSTOMERS};

use crate::Services;

/// Sub-commands available under `report`.
#[derive(Debug, Subcommand)]
pub enum ReportCommands {
    /// Customer, product and order counts plus total revenue
    Dashboard {
        #[arg(long, default_value = "1")]
        tenant: String,
    },
    /// Orders per day, newest first
    OrdersByDate {
        #[arg(long, default_value = "1")]
        tenant: String,
        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day included (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Highest spending customers
    TopCustomers {
        #[arg(long, default_value = "1")]
        tenant: String,
        #[arg(long, default_value_t = DEFAULT_TOP_CUSTOMERS)]
        limit: usize,
    },
    /// Monthly revenue and discounts
    SalesPerformance {
        #[arg(long, default_value = "1")]
        tenant: String,
    },
    /// Monthly signup cohorts
    CustomerBehavior {
        #[arg(long, default_value = "1")]
        tenant: String,
    },
    /// Abandoned checkouts against completed orders, read live from the shop
    CartAbandonment {
        #[arg(long, default_value = "1")]
        tenant: String,
    },
    /// Paged customer list
    Customers {
        #[arg(long, default_value = "1")]
        tenant: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long)]
        search: Option<String>,
    },
}

pub(crate) async fn run(services: &Services, command: ReportCommands) -> anyhow::Result<()> {
    let aggregator = services.aggregator();

    match command {
        ReportCommands::Dashboard { tenant } => print(&aggregator.dashboard_stats(&tenant).await?),
        ReportCommands::OrdersByDate { tenant, start, end } => print(
            &aggregator
                .orders_by_date(&tenant, DateRange::new(start, end))
                .await?,
        ),
        ReportCommands::TopCustomers { tenant, limit } => {
            print(&aggregator.top_customers(&tenant, limit).await?)
        }
        ReportCommands::SalesPerformance { tenant } => {
            print(&aggregator.sales_performance(&tenant).await?)
        }
        ReportCommands::CustomerBehavior { tenant } => {
            print(&aggregator.customer_behavior(&tenant).await?)
        }
        ReportCommands::CartAbandonment { tenant } => {
            print(&aggregator.cart_abandonment(&tenant).await?)
        }
        ReportCommands::Customers {
            tenant,
            page,
            limit,
            search,
        } => {
            let query = CustomerQuery {
                page,
                limit,
                search,
            };
            print(&aggregator.customer_list(&tenant, &query).await?)
        }
    }
}

fn print<T: Serialize>(report: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
