//! Read-side reports over the finance ledger and batch items.
//!
//! Each report is split into a query that loads the rows and a pure builder
//! that aggregates them, so the aggregation can be exercised without a store.

use crate::{
    core::batch_item::{BatchItemView, get_batch_items},
    entities::{
        Batch, FinanceTransaction, NotifyStatus, TransferStatus, TxnStatus, TxnType, batch,
        category, finance_transaction,
    },
    errors::{Error, Result},
};
use chrono::{Datelike, Duration, NaiveDate};
use sea_orm::{
    FromQueryResult, JoinType, PaginatorTrait, QueryOrder, QuerySelect, RelationTrait, prelude::*,
};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt,
    str::FromStr,
};
use tracing::{debug, instrument};

/// Destination label for ledger rows without a service label
pub const NO_DESTINATION: &str = "Tanpa Tujuan";

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.len() != 10 {
        return Err(invalid_date(value, "YYYY-MM-DD"));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| invalid_date(value, "YYYY-MM-DD"))
}

/// Parses a `YYYY-MM` month into its first and last day.
pub fn parse_month(value: &str) -> Result<(NaiveDate, NaiveDate)> {
    let trimmed = value.trim();
    if trimmed.len() != 7 {
        return Err(invalid_date(value, "YYYY-MM"));
    }
    let first = NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
        .map_err(|_| invalid_date(value, "YYYY-MM"))?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    let last = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| invalid_date(value, "YYYY-MM"))?;
    Ok((first, last))
}

fn invalid_date(value: &str, expected: &'static str) -> Error {
    Error::InvalidDate {
        value: value.to_string(),
        expected,
    }
}

fn check_range(from: NaiveDate, to: NaiveDate) -> Result<()> {
    if from > to {
        return Err(Error::Validation {
            message: format!("Start date {from} is after end date {to}"),
        });
    }
    Ok(())
}

/// Bucket width for [`cashflow`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Day,
    /// Monday-aligned weeks
    Week,
    Month,
}

impl GroupBy {
    /// Key of the bucket `date` falls into.
    #[must_use]
    pub fn bucket(self, date: NaiveDate) -> String {
        match self {
            Self::Day => date.format("%Y-%m-%d").to_string(),
            Self::Week => {
                let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                monday.format("%Y-%m-%d").to_string()
            }
            Self::Month => date.format("%Y-%m").to_string(),
        }
    }
}

impl FromStr for GroupBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(Error::Validation {
                message: format!("Unknown grouping '{other}', expected day, week or month"),
            }),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        })
    }
}

/// Which rows [`allocation_summary`] includes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationType {
    #[default]
    Income,
    Expense,
    All,
}

impl AllocationType {
    const fn txn_type(self) -> Option<TxnType> {
        match self {
            Self::Income => Some(TxnType::Income),
            Self::Expense => Some(TxnType::Expense),
            Self::All => None,
        }
    }
}

impl FromStr for AllocationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "all" => Ok(Self::All),
            other => Err(Error::Validation {
                message: format!("Unknown allocation type '{other}', expected income, expense or all"),
            }),
        }
    }
}

impl fmt::Display for AllocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::All => "all",
        })
    }
}

/// One bucket of a cashflow report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CashflowPoint {
    /// Bucket label
    pub period: String,
    /// Income in the period
    pub income_total: i64,
    /// Expense in the period
    pub expense_total: i64,
    /// Income minus expense
    pub net_total: i64,
    /// Net total of this bucket and every earlier one
    pub cumulative_net: i64,
}

/// Income and expense over a date range, bucketed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CashflowReport {
    /// First day covered
    pub date_from: NaiveDate,
    /// Last day covered
    pub date_to: NaiveDate,
    /// Bucket size
    pub group_by: GroupBy,
    /// Income over the whole range
    pub income_total: i64,
    /// Expense over the whole range
    pub expense_total: i64,
    /// Income minus expense over the whole range
    pub net_total: i64,
    /// Buckets in chronological order
    pub points: Vec<CashflowPoint>,
}

/// Buckets `rows` chronologically. Void rows are skipped.
#[must_use]
pub fn build_cashflow(
    date_from: NaiveDate,
    date_to: NaiveDate,
    group_by: GroupBy,
    rows: &[finance_transaction::Model],
) -> CashflowReport {
    let mut buckets: BTreeMap<String, (i64, i64)> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.status != TxnStatus::Void) {
        let entry = buckets.entry(group_by.bucket(row.txn_date)).or_default();
        match row.txn_type {
            TxnType::Income => entry.0 += row.amount,
            TxnType::Expense => entry.1 += row.amount,
        }
    }

    let mut cumulative = 0;
    let points: Vec<CashflowPoint> = buckets
        .into_iter()
        .map(|(period, (income_total, expense_total))| {
            let net_total = income_total - expense_total;
            cumulative += net_total;
            CashflowPoint {
                period,
                income_total,
                expense_total,
                net_total,
                cumulative_net: cumulative,
            }
        })
        .collect();

    let income_total: i64 = points.iter().map(|p| p.income_total).sum();
    let expense_total: i64 = points.iter().map(|p| p.expense_total).sum();
    CashflowReport {
        date_from,
        date_to,
        group_by,
        income_total,
        expense_total,
        net_total: income_total - expense_total,
        points,
    }
}

/// Income and expense per bucket between two inclusive dates.
#[instrument(skip(db))]
pub async fn cashflow(
    db: &DatabaseConnection,
    date_from: NaiveDate,
    date_to: NaiveDate,
    group_by: GroupBy,
) -> Result<CashflowReport> {
    check_range(date_from, date_to)?;
    let rows = FinanceTransaction::find()
        .filter(finance_transaction::Column::Status.ne(TxnStatus::Void))
        .filter(finance_transaction::Column::TxnDate.between(date_from, date_to))
        .order_by_asc(finance_transaction::Column::TxnDate)
        .order_by_asc(finance_transaction::Column::Id)
        .all(db)
        .await?;
    debug!(rows = rows.len(), "Loaded cashflow rows");
    Ok(build_cashflow(date_from, date_to, group_by, &rows))
}

/// Total of one sub-type within an allocation group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubTypeTotal {
    /// Stored sub-type value
    pub sub_type: String,
    /// Sum of amounts
    pub total: i64,
    /// Number of rows
    pub tx_count: u64,
}

/// Rows sharing one destination label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationGroup {
    /// Service label, or `Tanpa Tujuan`
    pub destination: String,
    /// Sum of amounts
    pub total: i64,
    /// Number of rows
    pub tx_count: u64,
    /// Share of the grand total, two decimals
    pub percent_of_total: f64,
    /// Totals per sub-type
    pub sub_breakdown: Vec<SubTypeTotal>,
}

/// Totals per destination label over a date range
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationReport {
    /// First day covered
    pub date_from: NaiveDate,
    /// Last day covered
    pub date_to: NaiveDate,
    /// Which rows were included
    pub allocation_type: AllocationType,
    /// Sum over every group
    pub grand_total: i64,
    /// Groups, largest first
    pub groups: Vec<AllocationGroup>,
}

/// Normalized destination of a ledger row.
#[must_use]
pub fn destination_of(row: &finance_transaction::Model) -> String {
    row.service_label
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .unwrap_or(NO_DESTINATION)
        .to_string()
}

#[allow(clippy::cast_precision_loss)]
fn percent_of(total: i64, grand_total: i64) -> f64 {
    if grand_total == 0 {
        return 0.0;
    }
    (total as f64 * 10_000.0 / grand_total as f64).round() / 100.0
}

/// Groups `rows` by destination, largest group first. Void rows and rows
/// outside `allocation_type` are skipped.
#[must_use]
pub fn build_allocation(
    date_from: NaiveDate,
    date_to: NaiveDate,
    allocation_type: AllocationType,
    rows: &[finance_transaction::Model],
) -> AllocationReport {
    let wanted = allocation_type.txn_type();
    let mut by_destination: BTreeMap<String, BTreeMap<&'static str, (i64, u64)>> = BTreeMap::new();
    for row in rows
        .iter()
        .filter(|r| r.status != TxnStatus::Void)
        .filter(|r| wanted.is_none_or(|t| r.txn_type == t))
    {
        let subs = by_destination.entry(destination_of(row)).or_default();
        let entry = subs.entry(row.sub_type.as_str()).or_default();
        entry.0 += row.amount;
        entry.1 += 1;
    }

    let grand_total: i64 = by_destination
        .values()
        .flat_map(BTreeMap::values)
        .map(|(total, _)| total)
        .sum();

    let mut groups: Vec<AllocationGroup> = by_destination
        .into_iter()
        .map(|(destination, subs)| {
            let mut sub_breakdown: Vec<SubTypeTotal> = subs
                .into_iter()
                .map(|(sub_type, (total, tx_count))| SubTypeTotal {
                    sub_type: sub_type.to_string(),
                    total,
                    tx_count,
                })
                .collect();
            sub_breakdown.sort_by(|a, b| b.total.cmp(&a.total));
            let total = sub_breakdown.iter().map(|s| s.total).sum();
            AllocationGroup {
                destination,
                total,
                tx_count: sub_breakdown.iter().map(|s| s.tx_count).sum(),
                percent_of_total: percent_of(total, grand_total),
                sub_breakdown,
            }
        })
        .collect();
    groups.sort_by(|a, b| b.total.cmp(&a.total));

    AllocationReport {
        date_from,
        date_to,
        allocation_type,
        grand_total,
        groups,
    }
}

/// Totals per destination label between two inclusive dates.
#[instrument(skip(db))]
pub async fn allocation_summary(
    db: &DatabaseConnection,
    date_from: NaiveDate,
    date_to: NaiveDate,
    allocation_type: AllocationType,
) -> Result<AllocationReport> {
    check_range(date_from, date_to)?;
    let mut query = FinanceTransaction::find()
        .filter(finance_transaction::Column::Status.ne(TxnStatus::Void))
        .filter(finance_transaction::Column::TxnDate.between(date_from, date_to));
    if let Some(txn_type) = allocation_type.txn_type() {
        query = query.filter(finance_transaction::Column::TxnType.eq(txn_type));
    }
    let rows = query
        .order_by_asc(finance_transaction::Column::TxnDate)
        .order_by_asc(finance_transaction::Column::Id)
        .all(db)
        .await?;
    Ok(build_allocation(date_from, date_to, allocation_type, &rows))
}

/// Expense total of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct CategoryTotal {
    /// Category name
    pub category: String,
    /// Sum of amounts
    pub total: i64,
}

/// Totals for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySummary {
    /// `YYYY-MM`
    pub month: String,
    /// Income in the month
    pub income_total: i64,
    /// Expense in the month
    pub expense_total: i64,
    /// Income minus expense
    pub net_total: i64,
    /// Expense rows still awaiting approval
    pub pending_approvals: u64,
    /// Expense totals per category, largest first
    pub expense_by_category: Vec<CategoryTotal>,
}

/// Non-void total of one transaction type within `from..=to`.
async fn sum_amount(db: &DatabaseConnection, txn_type: TxnType, from: NaiveDate, to: NaiveDate) -> Result<i64> {
    let total = FinanceTransaction::find()
        .select_only()
        .column_as(finance_transaction::Column::Amount.sum(), "total")
        .filter(finance_transaction::Column::TxnType.eq(txn_type))
        .filter(finance_transaction::Column::Status.ne(TxnStatus::Void))
        .filter(finance_transaction::Column::TxnDate.between(from, to))
        .into_tuple::<Option<i64>>()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

/// Income, expense and per-category expense totals for one `YYYY-MM` month.
#[instrument(skip(db))]
pub async fn monthly_summary(db: &DatabaseConnection, month: &str) -> Result<MonthlySummary> {
    let (first, last) = parse_month(month)?;

    let income_total = sum_amount(db, TxnType::Income, first, last).await?;
    let expense_total = sum_amount(db, TxnType::Expense, first, last).await?;

    let pending_approvals = FinanceTransaction::find()
        .filter(finance_transaction::Column::TxnType.eq(TxnType::Expense))
        .filter(finance_transaction::Column::Status.eq(TxnStatus::PendingApproval))
        .filter(finance_transaction::Column::TxnDate.between(first, last))
        .count(db)
        .await?;

    let mut expense_by_category = FinanceTransaction::find()
        .select_only()
        .column_as(category::Column::Name, "category")
        .column_as(finance_transaction::Column::Amount.sum(), "total")
        .join(JoinType::InnerJoin, finance_transaction::Relation::Category.def())
        .filter(finance_transaction::Column::TxnType.eq(TxnType::Expense))
        .filter(finance_transaction::Column::Status.ne(TxnStatus::Void))
        .filter(finance_transaction::Column::TxnDate.between(first, last))
        .group_by(finance_transaction::Column::CategoryId)
        .group_by(category::Column::Name)
        .into_model::<CategoryTotal>()
        .all(db)
        .await?;
    expense_by_category.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));

    Ok(MonthlySummary {
        month: month.trim().to_string(),
        income_total,
        expense_total,
        net_total: income_total - expense_total,
        pending_approvals,
        expense_by_category,
    })
}

/// Everything the transfer checklist of one batch shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchChecklist {
    /// The batch itself
    pub batch: batch::Model,
    /// Items with recipient and payee
    pub items: Vec<BatchItemView>,
    /// Items transferred
    pub transferred: usize,
    /// Items notified
    pub notified: usize,
    /// Items deliberately not notified
    pub skipped: usize,
    /// Sum of every item amount
    pub total_amount: i64,
}

impl BatchChecklist {
    /// Counts and totals over `items`.
    #[must_use]
    pub fn new(batch: batch::Model, items: Vec<BatchItemView>) -> Self {
        let transferred = items
            .iter()
            .filter(|i| i.transfer_status == TransferStatus::Done)
            .count();
        let notified = items
            .iter()
            .filter(|i| i.notify_status == NotifyStatus::Sent)
            .count();
        let skipped = items
            .iter()
            .filter(|i| i.notify_status == NotifyStatus::Skipped)
            .count();
        let total_amount = items.iter().map(|i| i.amount).sum();
        Self {
            batch,
            items,
            transferred,
            notified,
            skipped,
            total_amount,
        }
    }

    /// Number of items in the batch.
    #[must_use]
    pub fn total_recipients(&self) -> usize {
        self.items.len()
    }
}

/// Checklist for `batch_id`, or `None` if the batch does not exist.
pub async fn batch_checklist(db: &DatabaseConnection, batch_id: i64) -> Result<Option<BatchChecklist>> {
    let Some(batch) = Batch::find_by_id(batch_id).one(db).await? else {
        return Ok(None);
    };
    let items = get_batch_items(db, batch_id).await?;
    Ok(Some(BatchChecklist::new(batch, items)))
}
