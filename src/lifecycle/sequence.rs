use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::CategoryType;
use crate::storage::TicketDocument;

/// Per-category ticket number allocator
///
/// A cache over the store: it is rebuilt from the highest number seen per
/// category and only ever moves forward, so numbers are not reused after a
/// ticket closes while the process keeps running.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    last: Mutex<HashMap<CategoryType, u32>>,
}

impl SequenceAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator primed from the tickets currently in `document`
    #[must_use]
    pub fn from_document(document: &TicketDocument) -> Self {
        let allocator = Self::new();
        allocator.observe(document);
        allocator
    }

    /// Raise each category's counter to at least the document's maximum
    pub fn observe(&self, document: &TicketDocument) {
        let mut last = self.lock();
        for category in CategoryType::ALL {
            let seen = document.max_number(category);
            let entry = last.entry(category).or_insert(0);
            *entry = (*entry).max(seen);
        }
    }

    /// Allocate the next number for `category`
    pub fn next(&self, category: CategoryType) -> u32 {
        let mut last = self.lock();
        let entry = last.entry(category).or_insert(0);
        *entry = entry.saturating_add(1);
        *entry
    }

    /// The number [`Self::next`] would return, without allocating it
    #[must_use]
    pub fn peek(&self, category: CategoryType) -> u32 {
        self.lock()
            .get(&category)
            .copied()
            .unwrap_or(0)
            .saturating_add(1)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CategoryType, u32>> {
        self.last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TicketBuilder;

    #[test]
    fn test_sequential_numbers_from_empty() {
        let allocator = SequenceAllocator::new();
        assert_eq!(allocator.next(CategoryType::Report), 1);
        assert_eq!(allocator.next(CategoryType::Report), 2);
        assert_eq!(allocator.next(CategoryType::Report), 3);
        assert_eq!(allocator.next(CategoryType::Appeal), 1);
    }

    #[test]
    fn test_rebuilt_from_document() {
        let mut document = TicketDocument::new();
        document.insert(
            TicketBuilder::new()
                .channel("c5")
                .category(CategoryType::Report)
                .number(5)
                .build(),
        );

        let allocator = SequenceAllocator::from_document(&document);
        assert_eq!(allocator.peek(CategoryType::Report), 6);
        assert_eq!(allocator.next(CategoryType::Report), 6);
        assert_eq!(allocator.next(CategoryType::Inquiry), 1);
    }

    #[test]
    fn test_observe_never_moves_backwards() {
        let allocator = SequenceAllocator::new();
        for _ in 0..7 {
            allocator.next(CategoryType::Appeal);
        }
        allocator.observe(&TicketDocument::new());
        assert_eq!(allocator.next(CategoryType::Appeal), 8);
    }
}
