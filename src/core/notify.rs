//! Payment notification text sent to recipients over WhatsApp.

use crate::{
    core::{amount::zoom_allowance, render::format_rupiah},
    entities::{BatchItemModel, BatchModel, ZoomType},
};

/// Normalizes a phone number for a `wa.me` link: strips spaces, dashes and
/// parentheses, turns a local `08…` prefix into `628…` and drops a leading `+`.
#[must_use]
pub fn clean_phone(phone: &str) -> String {
    let cleaned: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect();
    if cleaned.starts_with("08") {
        format!("62{}", &cleaned[1..])
    } else if let Some(rest) = cleaned.strip_prefix('+') {
        rest.to_string()
    } else {
        cleaned
    }
}

/// Breakdown shown in the message when attendance or zoom applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountDetails {
    /// Saturdays attended
    pub saturdays_attended: i32,
    /// Batch transport rate
    pub transport_rate: i64,
    /// Zoom allowance kind
    pub zoom_type: ZoomType,
    /// Zoom allowance paid
    pub zoom_amount: i64,
}

impl AmountDetails {
    /// Breakdown of `item` under the rates of `batch`.
    #[must_use]
    pub const fn for_item(batch: &BatchModel, item: &BatchItemModel) -> Self {
        Self {
            saturdays_attended: item.saturdays_attended,
            transport_rate: batch.transport_rate,
            zoom_type: item.zoom_type,
            zoom_amount: zoom_allowance(item.zoom_type, batch.zoom_single_rate, batch.zoom_family_rate),
        }
    }
}

/// Message telling `name` that `amount` has been transferred.
#[must_use]
pub fn notification_message(
    name: &str,
    amount: i64,
    details: Option<&AmountDetails>,
    proof_url: Option<&str>,
) -> String {
    let itemized = details.filter(|d| d.saturdays_attended > 0 || d.zoom_type != ZoomType::None);

    let mut message = if let Some(details) = itemized {
        let mut lines = vec![format!("Halo {name}, dana Tuli EFATA bulan ini:")];
        if details.saturdays_attended > 0 {
            let transport_total = i64::from(details.saturdays_attended) * details.transport_rate;
            lines.push(format!(
                "- Transport {} Sabat x {} = {}",
                details.saturdays_attended,
                format_rupiah(details.transport_rate),
                format_rupiah(transport_total)
            ));
        }
        if details.zoom_type != ZoomType::None {
            let label = if details.zoom_type == ZoomType::Single { "sendiri" } else { "keluarga" };
            lines.push(format!("- Zoom ({label}) = {}", format_rupiah(details.zoom_amount)));
        }
        lines.push(format!("- *Total: {}*", format_rupiah(amount)));
        lines.push("sudah ditransfer ke rekening Anda. Mohon dicek. Terima kasih. GBU".to_string());
        lines.join("\n")
    } else {
        format!(
            "Halo {name}, dana Tuli EFATA sebesar {} sudah ditransfer ke rekening Anda. Mohon dicek. Terima kasih. GBU",
            format_rupiah(amount)
        )
    };

    if let Some(url) = proof_url {
        message.push_str(&format!("\n\nBukti transfer: {url}"));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_phone() {
        assert_eq!(clean_phone("0812-3456 (789)"), "628123456789");
        assert_eq!(clean_phone("+62 812 3456"), "628123456");
        assert_eq!(clean_phone("62812"), "62812");
        assert_eq!(clean_phone("021 555"), "021555");
        assert_eq!(clean_phone(""), "");
    }

    #[test]
    fn test_plain_message_without_breakdown() {
        let message = notification_message("Ana", 500_000, None, None);
        assert_eq!(
            message,
            "Halo Ana, dana Tuli EFATA sebesar Rp 500.000 sudah ditransfer ke rekening Anda. Mohon dicek. Terima kasih. GBU"
        );

        let zero = AmountDetails {
            saturdays_attended: 0,
            transport_rate: 25_000,
            zoom_type: ZoomType::None,
            zoom_amount: 0,
        };
        assert!(!notification_message("Ana", 0, Some(&zero), None).contains('\n'));
    }

    #[test]
    fn test_itemized_message_with_proof() {
        let details = AmountDetails {
            saturdays_attended: 3,
            transport_rate: 25_000,
            zoom_type: ZoomType::Family,
            zoom_amount: 30_000,
        };
        let message = notification_message("Budi", 105_000, Some(&details), Some("https://example.test/p.jpg"));
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines[0], "Halo Budi, dana Tuli EFATA bulan ini:");
        assert_eq!(lines[1], "- Transport 3 Sabat x Rp 25.000 = Rp 75.000");
        assert_eq!(lines[2], "- Zoom (keluarga) = Rp 30.000");
        assert_eq!(lines[3], "- *Total: Rp 105.000*");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "Bukti transfer: https://example.test/p.jpg");
    }
}
