use crate::backend::catalog::ImageRecord;

use super::query::QueryParams;

/// Stable sort by numeric id prefix; unnumbered ids go last in arrival order.
pub fn order(mut records: Vec<ImageRecord>) -> Vec<ImageRecord> {
    records.sort_by_key(ImageRecord::display_order_key);
    records
}

pub fn matches_category(record: &ImageRecord, category: Option<&str>) -> bool {
    match category {
        None => true,
        Some(wanted) => record.category.as_deref() == Some(wanted),
    }
}

pub fn matches_search(record: &ImageRecord, search: Option<&str>) -> bool {
    match search {
        None => true,
        Some(term) => {
            let term = term.to_lowercase();
            record
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&term))
        }
    }
}

/// Records matching both active predicates, in input order.
///
/// Shared by the terminal gallery and the listing proxy so both agree on
/// what a query selects.
pub fn filter(ordered: &[ImageRecord], query: &QueryParams) -> Vec<ImageRecord> {
    let category = query.active_category();
    let search = query.active_search();

    ordered
        .iter()
        .filter(|r| matches_category(r, category) && matches_search(r, search))
        .cloned()
        .collect()
}
