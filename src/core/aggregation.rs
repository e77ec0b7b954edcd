//! Aggregation engine - filters expenses and groups them for display and reports.
//!
//! Grouping is invoice status → category → date, each level carrying the running sum of
//! its descendants. The functions here are pure: they never touch the store and can be
//! re-run on every snapshot.

use crate::models::{Category, ExpenseId, ExpenseRecord, InvoiceStatus, round_cents};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// Which records an aggregation keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseFilter {
    /// Earliest expense date kept (inclusive)
    pub start_date: Option<NaiveDate>,
    /// Latest expense date kept (inclusive)
    pub end_date: Option<NaiveDate>,
    /// Case-insensitive substring of the concept; blank means no search
    pub search_term: Option<String>,
    /// Keep records already included in a finalized report
    pub include_archived: bool,
}

impl ExpenseFilter {
    /// Filter for a date range that hides archived records.
    #[must_use]
    pub const fn period(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
            search_term: None,
            include_archived: false,
        }
    }
}

/// Records sharing one expense date.
#[derive(Debug, Clone, PartialEq)]
pub struct DateGroup {
    /// Expense date
    pub date: NaiveDate,
    /// Sum of the records' amounts
    pub subtotal: f64,
    /// Records in store order
    pub records: Vec<ExpenseRecord>,
}

/// Records sharing one category, split by date ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup {
    /// Category of every record below
    pub category: Category,
    /// Sum over every date group
    pub subtotal: f64,
    /// Date groups, oldest first
    pub dates: Vec<DateGroup>,
}

/// Records sharing one invoice status, split by category priority.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceGroup {
    /// With or without receipt
    pub status: InvoiceStatus,
    /// Sum over every category group
    pub subtotal: f64,
    /// Category groups in priority order
    pub categories: Vec<CategoryGroup>,
}

/// The fully grouped view of a filtered record set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedExpenses {
    /// Sum of every kept record
    pub total: f64,
    /// Invoice groups, "With Receipt" first; empty groups are omitted
    pub groups: Vec<InvoiceGroup>,
}

impl GroupedExpenses {
    /// Number of records across all groups.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records().count()
    }

    /// Whether no record survived filtering.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The group for `status`, if it has any record.
    #[must_use]
    pub fn group(&self, status: InvoiceStatus) -> Option<&InvoiceGroup> {
        self.groups.iter().find(|group| group.status == status)
    }

    /// Subtotal for `status`, zero when the group is empty.
    #[must_use]
    pub fn subtotal(&self, status: InvoiceStatus) -> f64 {
        self.group(status).map_or(0.0, |group| group.subtotal)
    }

    /// Every record in render order.
    pub fn records(&self) -> impl Iterator<Item = &ExpenseRecord> {
        self.groups.iter().flat_map(InvoiceGroup::records)
    }

    /// Receipt-bearing records ordered by category priority, then date.
    #[must_use]
    pub fn receipts_in_order(&self) -> Vec<&ExpenseRecord> {
        self.group(InvoiceStatus::WithReceipt)
            .map(|group| group.records().collect())
            .unwrap_or_default()
    }
}

impl InvoiceGroup {
    /// Every record of this group in render order.
    pub fn records(&self) -> impl Iterator<Item = &ExpenseRecord> {
        self.categories
            .iter()
            .flat_map(|category| category.dates.iter())
            .flat_map(|date| date.records.iter())
    }
}

/// Maps each tip id to the concept of the parent that links it.
fn tip_parent_concepts(records: &[ExpenseRecord]) -> HashMap<ExpenseId, &str> {
    records
        .iter()
        .filter_map(|record| {
            record
                .linked_tip_id
                .map(|tip_id| (tip_id, record.concept.as_str()))
        })
        .collect()
}

/// Applies `filter`, preserving store order.
///
/// A tip matches a search when its parent's concept does, even if its own concept does not.
#[must_use]
pub fn filter_expenses(records: &[ExpenseRecord], filter: &ExpenseFilter) -> Vec<ExpenseRecord> {
    let needle = filter
        .search_term
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase);
    let parents = tip_parent_concepts(records);

    records
        .iter()
        .filter(|record| filter.include_archived || !record.archived)
        .filter(|record| filter.start_date.is_none_or(|start| record.date >= start))
        .filter(|record| filter.end_date.is_none_or(|end| record.date <= end))
        .filter(|record| {
            needle.as_deref().is_none_or(|needle| {
                record.concept.to_lowercase().contains(needle)
                    || parents
                        .get(&record.id)
                        .is_some_and(|parent| parent.to_lowercase().contains(needle))
            })
        })
        .cloned()
        .collect()
}

/// Groups already-filtered records. Record order inside a date follows the input order.
#[must_use]
pub fn group_expenses(records: &[ExpenseRecord]) -> GroupedExpenses {
    type Tree = BTreeMap<InvoiceStatus, BTreeMap<Category, BTreeMap<NaiveDate, Vec<ExpenseRecord>>>>;

    let mut tree: Tree = BTreeMap::new();
    for record in records {
        tree.entry(record.invoice_status())
            .or_default()
            .entry(record.category)
            .or_default()
            .entry(record.date)
            .or_default()
            .push(record.clone());
    }

    let groups: Vec<InvoiceGroup> = tree
        .into_iter()
        .map(|(status, categories)| {
            let categories: Vec<CategoryGroup> = categories
                .into_iter()
                .map(|(category, dates)| {
                    let dates: Vec<DateGroup> = dates
                        .into_iter()
                        .map(|(date, records)| DateGroup {
                            date,
                            subtotal: round_cents(records.iter().map(|r| r.amount).sum()),
                            records,
                        })
                        .collect();
                    CategoryGroup {
                        category,
                        subtotal: round_cents(dates.iter().map(|d| d.subtotal).sum()),
                        dates,
                    }
                })
                .collect();
            InvoiceGroup {
                status,
                subtotal: round_cents(categories.iter().map(|c| c.subtotal).sum()),
                categories,
            }
        })
        .collect();

    GroupedExpenses {
        total: round_cents(groups.iter().map(|g| g.subtotal).sum()),
        groups,
    }
}

/// Filters then groups: the full recomputation run on every store snapshot.
#[must_use]
pub fn aggregate(records: &[ExpenseRecord], filter: &ExpenseFilter) -> GroupedExpenses {
    group_expenses(&filter_expenses(records, filter))
}
