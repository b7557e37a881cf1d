// Client-side search and pagination over in-memory lists.
//
// Pages are 1-based. The current page is always inside
// [1, total_pages(len)] after `clamp`, and total_pages is 1 for an empty
// list.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Case-insensitive substring match of `term` against any of `fields`.
///
/// A blank term matches everything.
pub fn matches_search(term: &str, fields: &[&str]) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields.iter().any(|field| field.to_lowercase().contains(&needle))
}

/// Keep the items whose searchable fields match `term`, preserving order.
pub fn filter_by_search<'a, T, F>(items: &'a [T], term: &str, fields: F) -> Vec<&'a T>
where
    F: Fn(&T) -> Vec<&str>,
{
    items.iter().filter(|item| matches_search(term, &fields(item))).collect()
}

/// Page cursor over a list whose length can change underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    page_size: usize,
    current_page: usize,
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self { page_size: page_size.max(1), current_page: 1 }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.page_size).max(1)
    }

    /// Pull the current page back into range for a list of `len` items.
    pub fn clamp(&mut self, len: usize) {
        self.current_page = self.current_page.clamp(1, self.total_pages(len));
    }

    /// Jump to page 1, as after a new search term.
    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    /// Move to `page` if it exists; out-of-range requests are ignored.
    pub fn go_to(&mut self, page: usize, len: usize) -> bool {
        if page < 1 || page > self.total_pages(len) {
            return false;
        }
        self.current_page = page;
        true
    }

    pub fn next(&mut self, len: usize) -> bool {
        self.go_to(self.current_page + 1, len)
    }

    pub fn previous(&mut self, len: usize) -> bool {
        self.current_page > 1 && self.go_to(self.current_page - 1, len)
    }

    /// Index range of the current page within a list of `len` items.
    pub fn range(&self, len: usize) -> Range<usize> {
        let start = ((self.current_page - 1) * self.page_size).min(len);
        let end = (start + self.page_size).min(len);
        start..end
    }

    pub fn page<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.range(items.len())]
    }
}
