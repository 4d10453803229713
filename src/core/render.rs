//! Plain-text rendering of reports for the operator CLI.

use crate::{
    core::report::{AllocationReport, BatchChecklist, CashflowReport, MonthlySummary},
    entities::{NotifyStatus, TransferStatus, ZoomType},
};
use num_format::{Locale, ToFormattedString as _};
use std::fmt::Write as _;

/// Formats an amount the Indonesian way, e.g. `Rp 1.250.000`.
#[must_use]
pub fn format_rupiah(amount: i64) -> String {
    format!("Rp {}", amount.to_formatted_string(&Locale::id))
}

/// Stored value of a zoom type, for table cells.
#[must_use]
pub const fn zoom_label(zoom_type: ZoomType) -> &'static str {
    match zoom_type {
        ZoomType::None => "none",
        ZoomType::Single => "single",
        ZoomType::Family => "family",
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// The transfer checklist of one batch.
#[must_use]
pub fn format_batch_checklist(checklist: &BatchChecklist) -> String {
    let batch = &checklist.batch;
    let total = checklist.total_recipients();
    let mut out = String::new();

    let _ = writeln!(out, "EFATA Transfer Checklist");
    let _ = writeln!(out, "Batch: {}", batch.name);
    if let Some(description) = batch.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "Deskripsi: {description}");
    }
    let _ = writeln!(
        out,
        "Sabat: {} • Transport: {} • Zoom Single: {} • Zoom Family: {}",
        batch.total_saturdays,
        format_rupiah(batch.transport_rate),
        format_rupiah(batch.zoom_single_rate),
        format_rupiah(batch.zoom_family_rate),
    );
    let _ = writeln!(
        out,
        "Penerima: {total}  Transfer: {}/{total}  Notif: {}/{total} (Skip {})  Total: {}",
        checklist.transferred,
        checklist.notified,
        checklist.skipped,
        format_rupiah(checklist.total_amount),
    );
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>3}  {:<24}  {:<22}  {:>5}  {:<6}  {:<10}  {:>14}  {:<2}  {:<4}",
        "No", "Nama", "Rekening", "Sabat", "Zoom", "Tgl TF", "Jumlah", "TF", "WA"
    );

    for (index, item) in checklist.items.iter().enumerate() {
        let account = match item.payee.bank_name.as_deref() {
            Some(bank) => format!("{bank} {}", item.payee.account_number.as_deref().unwrap_or("")),
            None => "-".to_string(),
        };
        let transfer_date = item
            .transfer_at
            .map_or_else(|| "-".to_string(), |at| at.format("%-d/%-m/%Y").to_string());
        let transferred = if item.transfer_status == TransferStatus::Done { "OK" } else { "-" };
        let notified = match item.notify_status {
            NotifyStatus::Sent => "OK",
            NotifyStatus::Skipped => "SKIP",
            NotifyStatus::Pending => "-",
        };
        let _ = writeln!(
            out,
            "{:>3}  {:<24}  {:<22}  {:>5}  {:<6}  {:<10}  {:>14}  {:<2}  {:<4}",
            index + 1,
            clip(&item.recipient_name, 24),
            clip(account.trim_end(), 22),
            item.saturdays_attended,
            zoom_label(item.zoom_type),
            transfer_date,
            format_rupiah(item.amount),
            transferred,
            notified,
        );
    }
    out
}

/// Cashflow buckets with running net.
#[must_use]
pub fn format_cashflow(report: &CashflowReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Arus Kas {} s/d {} (per {})",
        report.date_from, report.date_to, report.group_by
    );
    let _ = writeln!(
        out,
        "{:<10}  {:>16}  {:>16}  {:>16}  {:>16}",
        "Periode", "Pemasukan", "Pengeluaran", "Neto", "Kumulatif"
    );
    for point in &report.points {
        let _ = writeln!(
            out,
            "{:<10}  {:>16}  {:>16}  {:>16}  {:>16}",
            point.period,
            format_rupiah(point.income_total),
            format_rupiah(point.expense_total),
            format_rupiah(point.net_total),
            format_rupiah(point.cumulative_net),
        );
    }
    let _ = writeln!(
        out,
        "{:<10}  {:>16}  {:>16}  {:>16}",
        "Total",
        format_rupiah(report.income_total),
        format_rupiah(report.expense_total),
        format_rupiah(report.net_total),
    );
    out
}

/// Allocation groups with their sub-type breakdown indented underneath.
#[must_use]
pub fn format_allocation(report: &AllocationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Alokasi {} s/d {} ({})",
        report.date_from, report.date_to, report.allocation_type
    );
    for group in &report.groups {
        let _ = writeln!(
            out,
            "{:<30}  {:>16}  {:>4} trx  {:>6.2}%",
            clip(&group.destination, 30),
            format_rupiah(group.total),
            group.tx_count,
            group.percent_of_total,
        );
        for sub in &group.sub_breakdown {
            let _ = writeln!(
                out,
                "  - {:<26}  {:>16}  {:>4} trx",
                sub.sub_type,
                format_rupiah(sub.total),
                sub.tx_count
            );
        }
    }
    let _ = writeln!(out, "Total: {}", format_rupiah(report.grand_total));
    out
}

/// Renders a monthly summary with its category breakdown.
#[must_use]
pub fn format_monthly_summary(summary: &MonthlySummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Ringkasan {}", summary.month);
    let _ = writeln!(out, "Pemasukan:   {}", format_rupiah(summary.income_total));
    let _ = writeln!(out, "Pengeluaran: {}", format_rupiah(summary.expense_total));
    let _ = writeln!(out, "Neto:        {}", format_rupiah(summary.net_total));
    let _ = writeln!(out, "Menunggu persetujuan: {}", summary.pending_approvals);
    if !summary.expense_by_category.is_empty() {
        let _ = writeln!(out, "Pengeluaran per kategori:");
        for row in &summary.expense_by_category {
            let _ = writeln!(out, "  {:<30}  {:>16}", clip(&row.category, 30), format_rupiah(row.total));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::report::{AllocationGroup, AllocationType, CashflowPoint, CategoryTotal, GroupBy, SubTypeTotal};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_format_rupiah() {
        assert_eq!(format_rupiah(1_250_000), "Rp 1.250.000");
        assert_eq!(format_rupiah(0), "Rp 0");
        assert_eq!(format_rupiah(999), "Rp 999");
    }

    #[test]
    fn test_format_cashflow_lists_every_point() {
        let report = CashflowReport {
            date_from: date(2025, 1, 1),
            date_to: date(2025, 2, 28),
            group_by: GroupBy::Month,
            income_total: 300_000,
            expense_total: 100_000,
            net_total: 200_000,
            points: vec![
                CashflowPoint {
                    period: "2025-01".to_string(),
                    income_total: 300_000,
                    expense_total: 0,
                    net_total: 300_000,
                    cumulative_net: 300_000,
                },
                CashflowPoint {
                    period: "2025-02".to_string(),
                    income_total: 0,
                    expense_total: 100_000,
                    net_total: -100_000,
                    cumulative_net: 200_000,
                },
            ],
        };
        let text = format_cashflow(&report);
        assert!(text.contains("per month"));
        assert!(text.contains("2025-01"));
        assert!(text.contains("2025-02"));
        assert!(text.contains("Rp 200.000"));
    }

    #[test]
    fn test_format_allocation_and_summary() {
        let report = AllocationReport {
            date_from: date(2025, 1, 1),
            date_to: date(2025, 1, 31),
            allocation_type: AllocationType::Income,
            grand_total: 400_000,
            groups: vec![AllocationGroup {
                destination: "Kebaktian Umum".to_string(),
                total: 400_000,
                tx_count: 3,
                percent_of_total: 100.0,
                sub_breakdown: vec![SubTypeTotal {
                    sub_type: "tithe".to_string(),
                    total: 400_000,
                    tx_count: 3,
                }],
            }],
        };
        let text = format_allocation(&report);
        assert!(text.contains("Kebaktian Umum"));
        assert!(text.contains("100.00%"));
        assert!(text.contains("- tithe"));

        let summary = MonthlySummary {
            month: "2025-01".to_string(),
            income_total: 400_000,
            expense_total: 150_000,
            net_total: 250_000,
            pending_approvals: 1,
            expense_by_category: vec![CategoryTotal {
                category: "Bantuan Sosial".to_string(),
                total: 150_000,
            }],
        };
        let text = format_monthly_summary(&summary);
        assert!(text.contains("Neto:        Rp 250.000"));
        assert!(text.contains("Bantuan Sosial"));
    }

    #[test]
    fn test_clip_counts_characters() {
        assert_eq!(clip("Élise Ñandú", 5), "Élise");
    }
}
