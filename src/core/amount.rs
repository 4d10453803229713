//! Amount calculation for batch items.
//!
//! Monthly batches pay per attended Saturday plus a zoom allowance; special
//! batches pay the batch's fixed default amount and ignore attendance.

use crate::entities::{BatchKind, BatchModel, RecipientModel, ZoomType};
use crate::errors::{Error, Result};

/// Computes a monthly item amount.
///
/// `attended * transport_rate` plus the allowance for `zoom_type`.
#[must_use]
pub const fn calculate_amount(
    attended: i32,
    transport_rate: i64,
    zoom_type: ZoomType,
    zoom_single_rate: i64,
    zoom_family_rate: i64,
) -> i64 {
    attended as i64 * transport_rate + zoom_allowance(zoom_type, zoom_single_rate, zoom_family_rate)
}

/// The zoom allowance alone.
#[must_use]
pub const fn zoom_allowance(zoom_type: ZoomType, zoom_single_rate: i64, zoom_family_rate: i64) -> i64 {
    match zoom_type {
        ZoomType::None => 0,
        ZoomType::Single => zoom_single_rate,
        ZoomType::Family => zoom_family_rate,
    }
}

/// Amount an item of `batch` should carry for the given attendance and zoom type.
#[must_use]
pub const fn amount_for_batch(batch: &BatchModel, attended: i32, zoom_type: ZoomType) -> i64 {
    match batch.kind {
        BatchKind::Special => batch.default_amount,
        BatchKind::Monthly => calculate_amount(
            attended,
            batch.transport_rate,
            zoom_type,
            batch.zoom_single_rate,
            batch.zoom_family_rate,
        ),
    }
}

/// Zoom type assigned when a recipient is first added to a monthly batch.
#[must_use]
pub const fn default_zoom_type(recipient: &RecipientModel) -> ZoomType {
    if !recipient.zoom_eligible {
        ZoomType::None
    } else if recipient.family_group_id.is_some() {
        ZoomType::Family
    } else {
        ZoomType::Single
    }
}

/// Rejects attendance outside `0..=batch.total_saturdays`.
pub fn validate_attendance(batch: &BatchModel, attended: i32) -> Result<()> {
    if attended < 0 || attended > batch.total_saturdays {
        return Err(Error::InvalidAttendance {
            attended,
            total_saturdays: batch.total_saturdays,
        });
    }
    Ok(())
}

/// Rejects negative money values.
pub fn validate_non_negative(amount: i64) -> Result<()> {
    if amount < 0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::BatchStatus;
    use chrono::Utc;

    fn batch(kind: BatchKind) -> BatchModel {
        BatchModel {
            id: 1,
            kind,
            name: "Transfer Januari".to_string(),
            description: None,
            default_amount: 300_000,
            total_saturdays: 4,
            transport_rate: 25_000,
            zoom_single_rate: 50_000,
            zoom_family_rate: 30_000,
            status: BatchStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_calculate_amount() {
        assert_eq!(calculate_amount(4, 25_000, ZoomType::Single, 50_000, 30_000), 150_000);
        assert_eq!(calculate_amount(3, 25_000, ZoomType::Single, 50_000, 30_000), 125_000);
        assert_eq!(calculate_amount(2, 25_000, ZoomType::Family, 50_000, 30_000), 80_000);
        assert_eq!(calculate_amount(0, 25_000, ZoomType::None, 50_000, 30_000), 0);
    }

    #[test]
    fn test_amount_for_special_batch_ignores_attendance() {
        let special = batch(BatchKind::Special);
        assert_eq!(amount_for_batch(&special, 4, ZoomType::Single), 300_000);
        assert_eq!(amount_for_batch(&special, 0, ZoomType::None), 300_000);

        let monthly = batch(BatchKind::Monthly);
        assert_eq!(amount_for_batch(&monthly, 4, ZoomType::Single), 150_000);
    }

    #[test]
    fn test_validate_attendance_bounds() {
        let monthly = batch(BatchKind::Monthly);
        assert!(validate_attendance(&monthly, 0).is_ok());
        assert!(validate_attendance(&monthly, 4).is_ok());
        assert!(matches!(
            validate_attendance(&monthly, 5),
            Err(Error::InvalidAttendance { attended: 5, total_saturdays: 4 })
        ));
        assert!(validate_attendance(&monthly, -1).is_err());
    }

    #[test]
    fn test_default_zoom_type() {
        let now = Utc::now();
        let mut recipient = RecipientModel {
            id: 1,
            name: "Ani".to_string(),
            bank_name: None,
            account_number: None,
            whatsapp: None,
            note: None,
            transfer_to_id: None,
            family_group_id: None,
            zoom_eligible: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(default_zoom_type(&recipient), ZoomType::Single);
        recipient.family_group_id = Some(2);
        assert_eq!(default_zoom_type(&recipient), ZoomType::Family);
        recipient.zoom_eligible = false;
        assert_eq!(default_zoom_type(&recipient), ZoomType::None);
    }
}
