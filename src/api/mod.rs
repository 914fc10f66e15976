pub mod attendance;
pub mod dashboard;
pub mod day_summary;
pub mod employee;
pub mod enterprise;
pub mod pay_run;
pub mod payment;
pub mod payslip;
pub mod user;

/// Rows per multi-row write; MySQL caps a statement at 65,535 placeholders.
pub const WRITE_BATCH: usize = 1000;

/// `(page, per_page, offset)`: 1-based page, at most 100 rows.
pub fn paging(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    (page, per_page, (page - 1) * per_page)
}

#[cfg(test)]
mod tests {
    use super::{WRITE_BATCH, paging};

    #[test]
    fn test_paging_defaults_and_bounds() {
        assert_eq!(paging(None, None), (1, 20, 0));
        assert_eq!(paging(Some(3), Some(10)), (3, 10, 20));
        assert_eq!(paging(Some(0), Some(1000)), (1, 100, 0));
        assert_eq!(paging(Some(2), Some(0)), (2, 1, 1));
    }

    #[test]
    fn test_write_batch_fits_placeholder_cap() {
        // widest batched row: payslips, 7 columns
        assert!(WRITE_BATCH * 7 <= 65_535);
    }
}
